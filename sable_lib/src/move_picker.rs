use std::marker::PhantomData;

use crate::board::Board;
use crate::moves::{KillerMoves, Move, MoveList, NOMOVE, NUM_KILLER_MOVES};
use crate::types::{Piece, TypeMoveGen};

const HASH_MOVE_SCORE: i32 = 100_000;
const CAPTURE_SCORE: i32 = 50_000;
const PROMOTION_SCORE: i32 = 20_000;
const KILLER_SCORE: i32 = 6_000;

#[derive(Copy, Clone, PartialEq, Eq)]
enum Stage {
    HashMove,
    Generate,
    Yield,
}

/// Per-ply staged move source. The hash move is tried before any generation
/// (a cutoff there skips movegen entirely), then the remaining moves are
/// generated, scored and handed out best-first.
pub struct MovePicker<M: TypeMoveGen> {
    stage: Stage,
    hash_move: Move,
    killers: KillerMoves<NUM_KILLER_MOVES>,
    index: usize,
    yielded: usize,
    _mode: PhantomData<M>,
}

impl<M: TypeMoveGen> MovePicker<M> {
    pub fn new(hash_move: Move, killers: KillerMoves<NUM_KILLER_MOVES>) -> Self {
        Self {
            stage: if hash_move.is_some() {
                Stage::HashMove
            } else {
                Stage::Generate
            },
            hash_move,
            killers,
            index: 0,
            yielded: 0,
            _mode: PhantomData,
        }
    }

    /// The next move to try and its move-order index, or None when the ply is
    /// exhausted.
    pub fn next(&mut self, board: &Board, list: &mut MoveList) -> Option<(Move, usize)> {
        if self.stage == Stage::HashMove {
            self.stage = Stage::Generate;
            // a noisy-only picker must not smuggle a quiet hash move into
            // quiescence (evasions are fine)
            let fits_mode = !M::NOISY_ONLY
                || board.in_check()
                || self.hash_move.is_capture()
                || self.hash_move.promotion() != Piece::Pawn;
            if fits_mode && board.is_pseudolegal(self.hash_move) {
                let order = self.yielded;
                self.yielded += 1;
                return Some((self.hash_move, order));
            }
        }

        if self.stage == Stage::Generate {
            self.stage = Stage::Yield;
            // quiescence wants noisy moves, but evasions once in check
            if M::NOISY_ONLY && !board.in_check() {
                board.generate_noisy_moves_into(list);
            } else {
                board.generate_legal_moves_into(list);
            }
            score_moves(list, NOMOVE, &self.killers);
            self.index = 0;
        }

        while self.index < list.len() {
            let entry = list.pick(self.index);
            self.index += 1;
            // the hash move was already searched
            if entry.mv == self.hash_move {
                continue;
            }
            let order = self.yielded;
            self.yielded += 1;
            return Some((entry.mv, order));
        }
        None
    }
}

/// Move-ordering heuristic: hash move, then captures most-valuable-victim
/// first, then queen promotions, then killers ahead of the other quiets.
pub fn score_moves(list: &mut MoveList, hash_move: Move, killers: &KillerMoves<NUM_KILLER_MOVES>) {
    for entry in list.iter_mut() {
        let mv = entry.mv;
        entry.score = if mv == hash_move {
            HASH_MOVE_SCORE
        } else if let Some(victim) = mv.captured() {
            CAPTURE_SCORE + 10 * victim.value() - mv.piece().value()
        } else if mv.promotion() == Piece::Queen {
            PROMOTION_SCORE
        } else if killers.contains(&mv) {
            KILLER_SCORE
        } else {
            0
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AllMoves, NoisyMoves};

    #[test]
    fn hash_move_comes_first_and_is_not_repeated() {
        let board =
            Board::from_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1")
                .unwrap();
        let hash_move = board
            .legal_move_list()
            .into_iter()
            .find(|m| m.coords() == "e2a6")
            .unwrap();

        let mut picker = MovePicker::<AllMoves>::new(hash_move, KillerMoves::new());
        let mut list = MoveList::new();
        let mut seen = Vec::new();
        while let Some((mv, order)) = picker.next(&board, &mut list) {
            assert_eq!(order, seen.len());
            seen.push(mv);
        }
        assert_eq!(seen[0], hash_move);
        assert_eq!(
            seen.iter().filter(|&&m| m == hash_move).count(),
            1,
            "hash move must only be yielded once"
        );
        assert_eq!(seen.len(), board.legal_move_list().len());
    }

    #[test]
    fn bogus_hash_move_is_dropped() {
        let board = Board::new();
        let bogus = Move::new(
            sable_bitboards::Square::A1,
            sable_bitboards::Square::H8,
            Piece::Queen,
            Piece::Pawn,
            None,
            crate::moves::MoveKind::Normal,
        );
        let mut picker = MovePicker::<AllMoves>::new(bogus, KillerMoves::new());
        let mut list = MoveList::new();
        let mut count = 0;
        while let Some((mv, _)) = picker.next(&board, &mut list) {
            assert_ne!(mv, bogus);
            count += 1;
        }
        assert_eq!(count, 20);
    }

    #[test]
    fn captures_are_ordered_by_victim_value() {
        // white pawn can take the queen or the knight
        let board = Board::from_fen("4k3/8/8/1q1n4/2P5/8/8/4K3 w - - 0 1").unwrap();
        let mut picker = MovePicker::<NoisyMoves>::new(NOMOVE, KillerMoves::new());
        let mut list = MoveList::new();
        let (first, _) = picker.next(&board, &mut list).unwrap();
        assert_eq!(first.captured(), Some(Piece::Queen));
        let (second, _) = picker.next(&board, &mut list).unwrap();
        assert_eq!(second.captured(), Some(Piece::Knight));
        assert!(picker.next(&board, &mut list).is_none());
    }

    #[test]
    fn noisy_picker_generates_evasions_in_check() {
        let board = Board::from_fen("4k3/8/8/8/7b/8/3P4/4K3 w - - 0 1").unwrap();
        assert!(board.in_check());
        let mut picker = MovePicker::<NoisyMoves>::new(NOMOVE, KillerMoves::new());
        let mut list = MoveList::new();
        let mut count = 0;
        while picker.next(&board, &mut list).is_some() {
            count += 1;
        }
        assert_eq!(count, board.legal_move_list().len());
    }
}
