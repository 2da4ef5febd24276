use crate::error::ConfigError;
use crate::moves::{Move, NOMOVE};

pub const MIN_HASH_SIZE_MB: usize = 1;
const MAX_AGE: u8 = 127;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Bound {
    None = 0,
    Exact = 1,
    /// Fail-low: the true value is <= the stored value.
    Upper = 2,
    /// Fail-high (beta cutoff): the true value is >= the stored value.
    Lower = 3,
}

/// One cache slot. Kept small so a slot stays within a cache line; mate
/// scores are stored exactly as given, ply adjustment is the caller's job.
#[derive(Copy, Clone, Debug)]
pub struct TtEntry {
    pub key: u64,
    pub best_move: Move,
    pub value: i16,
    pub depth: u8,
    pub bound: Bound,
    pub age: u8,
    pub mate_threat: bool,
}

impl TtEntry {
    const fn empty() -> Self {
        Self {
            key: 0,
            best_move: NOMOVE,
            value: 0,
            depth: 0,
            bound: Bound::None,
            age: 0,
            mate_threat: false,
        }
    }
}

// entry plus slot overhead, the denominator for the capacity calculation
const ENTRY_STRIDE: usize = std::mem::size_of::<TtEntry>() + 8;

/// Fixed-capacity, single-slot direct-mapped cache of search results, indexed
/// by `key % capacity`. Replacement prefers deeper results and entries that
/// have survived unreferenced since a previous search (aged).
pub struct TranspositionTable {
    entries: Vec<TtEntry>,
    used: usize,
    puts: u64,
    collisions: u64,
    updates: u64,
    probes: u64,
    hits: u64,
    misses: u64,
}

impl TranspositionTable {
    pub fn new(size_mb: usize) -> Result<Self, ConfigError> {
        if size_mb < MIN_HASH_SIZE_MB {
            return Err(ConfigError::HashTooSmall {
                min: MIN_HASH_SIZE_MB,
                got: size_mb,
            });
        }
        let capacity = size_mb * 1024 * 1024 / ENTRY_STRIDE;
        log::debug!("transposition table: {size_mb} MB, {capacity} entries");
        Ok(Self {
            entries: vec![TtEntry::empty(); capacity],
            used: 0,
            puts: 0,
            collisions: 0,
            updates: 0,
            probes: 0,
            hits: 0,
            misses: 0,
        })
    }

    #[inline]
    fn slot(&self, key: u64) -> usize {
        (key % self.entries.len() as u64) as usize
    }

    /// Returns the slot's entry when its key matches. A hit freshens the
    /// entry by stepping its age toward zero.
    pub fn probe(&mut self, key: u64) -> Option<TtEntry> {
        self.probes += 1;
        let slot = self.slot(key);
        let entry = &mut self.entries[slot];
        if entry.key == key {
            self.hits += 1;
            entry.age = entry.age.saturating_sub(1);
            Some(*entry)
        } else {
            self.misses += 1;
            None
        }
    }

    pub fn store(
        &mut self,
        key: u64,
        value: i16,
        bound: Bound,
        depth: u8,
        best_move: Move,
        mate_threat: bool,
    ) {
        self.puts += 1;
        let slot = self.slot(key);
        let entry = &mut self.entries[slot];

        if entry.key == 0 {
            // empty slot
            self.used += 1;
            *entry = TtEntry {
                key,
                best_move,
                value,
                depth,
                bound,
                age: 1,
                mate_threat,
            };
        } else if key != entry.key {
            // occupied by a different position: replace only a result that is
            // shallower and has gone unreferenced since the last search
            if depth >= entry.depth && entry.age > 0 {
                self.collisions += 1;
                *entry = TtEntry {
                    key,
                    best_move,
                    value,
                    depth,
                    bound,
                    age: 1,
                    mate_threat,
                };
            }
        } else if depth > entry.depth {
            self.updates += 1;
            entry.age = 1;
            entry.mate_threat = mate_threat;
            entry.value = value;
            entry.bound = bound;
            entry.depth = depth;
            if best_move.is_some() {
                entry.best_move = best_move;
            }
        } else if depth == entry.depth {
            self.updates += 1;
            entry.age = 1;
            entry.mate_threat = mate_threat;
            // never downgrade an exact score to a bound of the same depth
            if entry.bound != Bound::Exact {
                entry.value = value;
                entry.bound = bound;
                entry.depth = depth;
            }
            if best_move.is_some() {
                entry.best_move = best_move;
            }
        } else if entry.best_move.is_none() {
            // shallower result: keep the entry, but a move hint is still
            // better than none
            entry.best_move = best_move;
        }
    }

    /// Marks every occupied slot one search older and so eligible for
    /// replacement. Called once when a new search starts.
    pub fn age_all(&mut self) {
        for entry in self.entries.iter_mut() {
            if entry.key != 0 {
                entry.age = (entry.age + 1).min(MAX_AGE);
            }
        }
    }

    pub fn clear(&mut self) {
        for entry in self.entries.iter_mut() {
            *entry = TtEntry::empty();
        }
        self.used = 0;
        self.puts = 0;
        self.collisions = 0;
        self.updates = 0;
        self.probes = 0;
        self.hits = 0;
        self.misses = 0;
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    pub fn used(&self) -> usize {
        self.used
    }

    /// Fill rate in permille, as the UCI `hashfull` field expects.
    pub fn hashfull(&self) -> usize {
        self.used * 1000 / self.entries.len()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn collisions(&self) -> u64 {
        self.collisions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moves::MoveKind;
    use crate::types::Piece;
    use sable_bitboards::Square;

    fn any_move() -> Move {
        Move::new(
            Square::E2,
            Square::E4,
            Piece::Pawn,
            Piece::Pawn,
            None,
            MoveKind::Normal,
        )
    }

    fn other_move() -> Move {
        Move::new(
            Square::G1,
            Square::F3,
            Piece::Knight,
            Piece::Pawn,
            None,
            MoveKind::Normal,
        )
    }

    #[test]
    fn rejects_undersized_tables() {
        assert_eq!(
            TranspositionTable::new(0).err(),
            Some(ConfigError::HashTooSmall { min: 1, got: 0 })
        );
        assert!(TranspositionTable::new(1).is_ok());
    }

    #[test]
    fn store_then_probe_round_trip() {
        let mut tt = TranspositionTable::new(1).unwrap();
        tt.store(42, 123, Bound::Exact, 7, any_move(), true);
        let entry = tt.probe(42).unwrap();
        assert_eq!(entry.value, 123);
        assert_eq!(entry.bound, Bound::Exact);
        assert_eq!(entry.depth, 7);
        assert_eq!(entry.best_move, any_move());
        assert!(entry.mate_threat);
        assert!(tt.probe(43).is_none());
        assert_eq!(tt.hits(), 1);
        assert_eq!(tt.misses(), 1);
    }

    #[test]
    fn collision_needs_depth_and_age() {
        let mut tt = TranspositionTable::new(1).unwrap();
        let colliding = 42 + tt.capacity() as u64;

        tt.store(42, 10, Bound::Exact, 5, any_move(), false);
        // fresh entry (age 1, never probed): deeper stores from the same
        // search may replace it once it has been aged, not before a probe
        // refreshed it to zero
        tt.probe(42);
        tt.store(colliding, 20, Bound::Exact, 9, other_move(), false);
        assert_eq!(tt.probe(42).unwrap().value, 10, "referenced entry survives");

        tt.age_all();
        tt.store(colliding, 20, Bound::Exact, 4, other_move(), false);
        assert!(tt.probe(42).is_some(), "shallower result never replaces");

        tt.age_all();
        tt.store(colliding, 20, Bound::Exact, 9, other_move(), false);
        assert_eq!(tt.probe(colliding).unwrap().value, 20, "aged entry replaced");
        assert!(tt.probe(42).is_none());
    }

    #[test]
    fn same_position_update_rules() {
        let mut tt = TranspositionTable::new(1).unwrap();

        // deeper result always replaces
        tt.store(7, 10, Bound::Upper, 3, NOMOVE, false);
        tt.store(7, 30, Bound::Exact, 5, any_move(), false);
        let entry = tt.probe(7).unwrap();
        assert_eq!((entry.value, entry.depth), (30, 5));

        // same depth: an exact score is not downgraded to a bound
        tt.store(7, 99, Bound::Lower, 5, NOMOVE, false);
        let entry = tt.probe(7).unwrap();
        assert_eq!(entry.value, 30);
        assert_eq!(entry.bound, Bound::Exact);
        // but the best move is not erased by NOMOVE either
        assert_eq!(entry.best_move, any_move());

        // shallower result keeps the score but may fill in a missing move
        tt.store(8, 1, Bound::Exact, 6, NOMOVE, false);
        tt.store(8, 2, Bound::Exact, 2, other_move(), false);
        let entry = tt.probe(8).unwrap();
        assert_eq!((entry.value, entry.depth), (1, 6));
        assert_eq!(entry.best_move, other_move());
    }

    #[test]
    fn aging_saturates_and_probing_freshens() {
        let mut tt = TranspositionTable::new(1).unwrap();
        tt.store(1, 5, Bound::Exact, 1, NOMOVE, false);
        for _ in 0..200 {
            tt.age_all();
        }
        assert_eq!(tt.probe(1).unwrap().age, 126);
        // every probe steps the age back toward zero
        assert_eq!(tt.probe(1).unwrap().age, 125);
    }

    #[test]
    fn clear_zeroes_everything() {
        let mut tt = TranspositionTable::new(1).unwrap();
        tt.store(1, 5, Bound::Exact, 1, any_move(), true);
        tt.clear();
        assert!(tt.probe(1).is_none());
        assert_eq!(tt.used(), 0);
        assert_eq!(tt.hashfull(), 0);
    }
}
