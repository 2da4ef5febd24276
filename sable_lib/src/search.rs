use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::board::Board;
use crate::config::Config;
use crate::counters::SearchCounters;
use crate::engine::ProtocolSink;
use crate::move_picker::{score_moves, MovePicker};
use crate::moves::{KillerMoves, Move, MoveKind, MoveList, RootMoveList, NOMOVE, NUM_KILLER_MOVES};
use crate::search_mode::SearchMode;
use crate::time_control::TimeControl;
use crate::transposition_table::{Bound, TranspositionTable};
use crate::types::{Color, Piece};

pub const MAX_SEARCH_DEPTH: i32 = 127;
pub const MAX_PLY: usize = 128;

pub type Value = i32;

pub const VALUE_MIN: Value = -30_000;
pub const VALUE_MAX: Value = 30_000;
pub const VALUE_NONE: Value = VALUE_MIN - 1;
pub const CHECKMATE: Value = 10_000;
pub const CHECKMATE_THRESHOLD: Value = CHECKMATE - 2 * MAX_SEARCH_DEPTH;
pub const DRAW: Value = 0;

const PAWN_VALUE: Value = 100;
const ROOK_VALUE: Value = 500;
const QUEEN_VALUE: Value = 900;

/// How often intermediate `info` lines go out, in milliseconds.
const INFO_INTERVAL_MS: u64 = 500;

#[inline]
pub fn is_checkmate_value(value: Value) -> bool {
    let abs = value.abs();
    (CHECKMATE_THRESHOLD..=CHECKMATE).contains(&abs)
}

/// Converts a root-relative mate score into distance-from-this-node before it
/// goes into the table.
#[inline]
fn value_to_tt(value: Value, ply: usize) -> Value {
    if value > CHECKMATE_THRESHOLD {
        value + ply as Value
    } else if value < -CHECKMATE_THRESHOLD {
        value - ply as Value
    } else {
        value
    }
}

/// Re-offsets a stored mate distance to the probing node's ply.
#[inline]
fn value_from_tt(value: Value, ply: usize) -> Value {
    if value > CHECKMATE_THRESHOLD {
        value - ply as Value
    } else if value < -CHECKMATE_THRESHOLD {
        value + ply as Value
    } else {
        value
    }
}

/// UCI score field: centipawns, or moves-to-mate for mate scores.
pub fn score_string(value: Value) -> String {
    if is_checkmate_value(value) {
        let moves = (CHECKMATE - value.abs() + 1) / 2;
        format!("score mate {}{moves}", if value < 0 { "-" } else { "" })
    } else {
        format!("score cp {value}")
    }
}

/// One principal variation, rebuilt backwards out of the recursion.
#[derive(Clone)]
pub struct PvLine {
    len: usize,
    moves: [Move; MAX_PLY],
}

impl PvLine {
    pub fn new() -> Self {
        Self {
            len: 0,
            moves: [NOMOVE; MAX_PLY],
        }
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn first(&self) -> Move {
        self.get(0)
    }

    pub fn get(&self, index: usize) -> Move {
        if index < self.len {
            self.moves[index]
        } else {
            NOMOVE
        }
    }

    pub fn set_single(&mut self, mv: Move) {
        self.moves[0] = mv;
        self.len = 1;
    }

    pub fn push(&mut self, mv: Move) {
        if self.len < MAX_PLY {
            self.moves[self.len] = mv;
            self.len += 1;
        }
    }
}

impl Default for PvLine {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for PvLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, mv) in self.moves[..self.len].iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{mv}")?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct SearchResult {
    pub best_move: Move,
    pub ponder_move: Move,
    pub value: Value,
    pub depth: i32,
    pub extra_depth: i32,
    pub time_ms: u64,
    /// Cleared when the search returned a move that is not legal in the
    /// input position; callers should treat the result as a diagnostic.
    pub valid: bool,
}

impl Default for SearchResult {
    fn default() -> Self {
        Self {
            best_move: NOMOVE,
            ponder_move: NOMOVE,
            value: VALUE_NONE,
            depth: 0,
            extra_depth: 0,
            time_ms: 0,
            valid: true,
        }
    }
}

/// One search worker: the iterative-deepening driver, the recursive negamax
/// and the quiescence search, plus all per-ply scratch state. Built per
/// search and dropped afterwards; the transposition table is borrowed from
/// the orchestrator.
pub struct Searcher {
    config: Config,
    mode: SearchMode,
    stop: Arc<AtomicBool>,
    clock: Arc<TimeControl>,
    sink: Arc<dyn ProtocolSink>,
    perft: bool,
    had_book_move: bool,

    board: Board,
    my_color: Color,
    /// Zobrist keys of every position before the current node: game history
    /// first, then the search path. Repetition detection scans it backwards.
    position_history: Vec<u64>,
    current_variation: Vec<Move>,

    pub counters: SearchCounters,
    pv: Vec<PvLine>,
    killers: Vec<KillerMoves<NUM_KILLER_MOVES>>,
    mate_threat: Vec<bool>,
    pub single_reply: Vec<bool>,
    move_lists: Vec<MoveList>,
    root_moves: RootMoveList,

    current_best_root_move: Move,
    current_best_root_value: Value,
    last_info_ms: u64,
}

impl Searcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        board: Board,
        game_history: Vec<u64>,
        config: Config,
        mode: SearchMode,
        stop: Arc<AtomicBool>,
        clock: Arc<TimeControl>,
        sink: Arc<dyn ProtocolSink>,
        had_book_move: bool,
    ) -> Self {
        let mode = mode.normalized();
        let perft = mode.perft || config.perft;
        let my_color = board.current_player();
        Self {
            config,
            mode,
            stop,
            clock,
            sink,
            perft,
            had_book_move,
            board,
            my_color,
            position_history: game_history,
            current_variation: Vec::with_capacity(MAX_PLY),
            counters: SearchCounters::new(),
            pv: vec![PvLine::new(); MAX_PLY + 1],
            killers: vec![KillerMoves::new(); MAX_PLY],
            mate_threat: vec![false; MAX_PLY],
            single_reply: vec![false; MAX_PLY],
            move_lists: vec![MoveList::new(); MAX_PLY],
            root_moves: RootMoveList::default(),
            current_best_root_move: NOMOVE,
            current_best_root_value: VALUE_NONE,
            last_info_ms: 0,
        }
    }

    #[inline]
    fn stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    #[inline]
    fn set_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// In-tree stop poll: external stop, hard time, node budget.
    fn should_abort(&mut self) -> bool {
        if self.stopped() {
            return true;
        }
        if self.clock.hard_reached() {
            self.set_stop();
            return true;
        }
        if self.mode.node_limit > 0 && self.counters.nodes_visited >= self.mode.node_limit {
            self.set_stop();
            return true;
        }
        false
    }

    fn soft_limit_reached(&self) -> bool {
        if self.clock.soft_reached() {
            self.set_stop();
            return true;
        }
        false
    }

    fn hard_limit_reached(&self) -> bool {
        if self.clock.hard_reached() {
            self.set_stop();
            return true;
        }
        false
    }

    fn repetitions(&self, hash: u64) -> usize {
        self.position_history.iter().filter(|&&h| h == hash).count()
    }

    /// Draw score tilted against the mover while there is still play left.
    fn contempt(&self, board: &Board) -> Value {
        -((board.game_phase() * self.config.contempt_factor as f32) as Value)
    }

    /// Static evaluation of a leaf; in perft mode it only counts.
    fn evaluate(&mut self, board: &Board) -> Value {
        self.counters.leaf_positions_evaluated += 1;
        if self.perft {
            let last_move = self.current_variation.last().copied().unwrap_or(NOMOVE);
            if last_move.is_capture() {
                self.counters.capture_counter += 1;
            }
            if last_move.kind() == MoveKind::EnPassant {
                self.counters.en_passant_counter += 1;
            }
            if board.in_check() {
                self.counters.check_counter += 1;
                if !board.has_legal_move() {
                    self.counters.check_mate_counter += 1;
                }
            }
            return 1;
        }
        board.evaluate()
    }

    #[allow(clippy::too_many_arguments)]
    fn store_tt(
        &self,
        tt: &mut TranspositionTable,
        board: &Board,
        value: Value,
        bound: Bound,
        depth: i32,
        best_move: Move,
        mate_threat: bool,
        ply: usize,
    ) {
        if !self.config.use_transposition_table || self.perft || self.stopped() {
            return;
        }
        debug_assert!((0..=MAX_SEARCH_DEPTH).contains(&depth));
        let value = value_to_tt(value, ply);
        tt.store(
            board.hash(),
            value as i16,
            bound,
            depth as u8,
            best_move,
            mate_threat,
        );
    }

    fn save_pv(&mut self, ply: usize, mv: Move) {
        let (head, tail) = self.pv.split_at_mut(ply + 1);
        let line = &mut head[ply];
        let child = &tail[0];
        line.moves[0] = mv;
        let tail_len = child.len.min(MAX_PLY - 1);
        line.moves[1..=tail_len].copy_from_slice(&child.moves[..tail_len]);
        line.len = tail_len + 1;
    }

    /// Runs the whole search and returns its result. `tt` is the
    /// orchestrator's table, locked by the worker for the duration.
    pub fn run(&mut self, tt: &mut TranspositionTable) -> SearchResult {
        self.counters.reset();
        self.clock.start(&self.mode, self.my_color);
        if self.had_book_move && self.mode.is_time_control() {
            // the move after the book needs real thinking time
            log::debug!("first move out of book, extending time budget");
            self.clock.add_extra_time(2.0);
        }
        tt.age_all();

        let result = self.iterative_deepening(tt);
        self.counters.last_search_time_ms = self.clock.elapsed_ms();
        log::debug!("search finished: {:?}", self.counters);
        result
    }

    fn iterative_deepening(&mut self, tt: &mut TranspositionTable) -> SearchResult {
        let board = self.board;
        let mut result = SearchResult::default();

        // a finished game has no move to find
        if !board.has_legal_move() {
            result.value = if board.in_check() { -CHECKMATE } else { DRAW };
            result.best_move = NOMOVE;
            return result;
        }

        self.current_best_root_move = NOMOVE;
        self.current_best_root_value = VALUE_NONE;
        self.pv[0].clear();

        let start_depth = self.mode.start_depth;

        // seed the root from the table: best move, PV chain, prior value
        if self.config.use_tt_root && self.config.use_transposition_table && !self.perft {
            if let Some(entry) = tt.probe(board.hash()) {
                self.counters.tt_hits += 1;
                self.mate_threat[0] = entry.mate_threat;
                if entry.best_move.is_some() {
                    self.current_best_root_move = entry.best_move;
                    let mut line = PvLine::new();
                    Self::tt_pv_line(tt, &board, entry.depth as i32, &mut line);
                    self.pv[0] = line;
                }
                if entry.depth as i32 >= start_depth {
                    self.current_best_root_value = value_from_tt(entry.value as Value, 0);
                }
            } else {
                self.counters.tt_misses += 1;
            }
        }

        self.generate_root_moves(&board);
        if self.root_moves.is_empty() {
            // a restriction list that matches nothing falls back to all moves
            log::warn!("restricted move list matched no legal move, ignoring it");
            self.mode.restricted_moves = None;
            self.generate_root_moves(&board);
        }

        // the TT move may be outside the restriction list
        let seeded = self.current_best_root_move;
        if seeded.is_none() || !(0..self.root_moves.len()).any(|i| self.root_moves.get(i) == seeded)
        {
            self.current_best_root_move = self.root_moves.get(0);
            self.pv[0].set_single(self.current_best_root_move);
        } else if self.pv[0].is_empty() {
            self.pv[0].set_single(seeded);
        }

        if self.root_moves.len() == 1 {
            self.single_reply[0] = true;
            // a forced move deserves some extra thought
            if self.mode.is_time_control() {
                self.clock.add_extra_time(1.5);
            }
        }

        log::debug!(
            "searching {} root moves from {} (soft {} ms, hard {} ms)",
            self.root_moves.len(),
            board.fen(),
            self.clock.soft_limit_ms(),
            self.clock.hard_limit_ms()
        );

        let mut depth = start_depth;
        loop {
            self.counters.current_iteration_depth = depth;
            self.counters.best_move_changes = 0;
            // the root is the first node of every iteration
            self.counters.nodes_visited += 1;

            let value = if self.config.use_mtdf
                && depth >= self.config.mtdf_start_depth
                && !self.perft
                && self.current_best_root_value != VALUE_NONE
            {
                self.mtdf_search(tt, &board, depth, self.current_best_root_value)
            } else if self.config.use_aspiration_window
                && depth >= self.config.aspiration_start_depth
                && !self.perft
                && self.current_best_root_value != VALUE_NONE
            {
                self.aspiration_search(tt, &board, depth, self.current_best_root_value)
            } else {
                self.search(tt, &board, depth, 0, VALUE_MIN, VALUE_MAX, true, true)
            };

            // a stopped iteration's value cannot be trusted
            if !self.stopped() {
                self.current_best_root_value = value;
                self.root_moves.push_to_head(self.pv[0].first());
            }

            self.send_iteration_info();

            if self.stopped() || self.soft_limit_reached() || self.hard_limit_reached() {
                break;
            }
            depth += 1;
            if depth > self.mode.max_depth {
                break;
            }
        }

        result.best_move = self.current_best_root_move;
        result.value = self.current_best_root_value;
        result.depth = self.counters.current_search_depth;
        result.extra_depth = self.counters.current_extra_search_depth;
        result.ponder_move = self.pv[0].get(1);
        result.time_ms = self.clock.elapsed_ms();
        result
    }

    fn generate_root_moves(&mut self, board: &Board) {
        let mut list = MoveList::new();
        board.generate_legal_moves_into(&mut list);
        let hash_move = if self.config.use_pvs_ordering {
            self.current_best_root_move
        } else {
            NOMOVE
        };
        score_moves(&mut list, hash_move, &KillerMoves::new());

        self.root_moves.clear();
        for i in 0..list.len() {
            let entry = list.pick(i);
            let keep = match &self.mode.restricted_moves {
                Some(allowed) => allowed.iter().any(|m| m == &entry.mv.coords()),
                None => true,
            };
            if keep {
                self.root_moves.add(entry.mv, VALUE_NONE);
            }
        }
    }

    /// Follows best moves through the table to rebuild a PV, bounded by the
    /// stored depth so a cycle cannot loop forever.
    fn tt_pv_line(tt: &mut TranspositionTable, board: &Board, depth: i32, line: &mut PvLine) {
        if depth < 0 {
            return;
        }
        if let Some(entry) = tt.probe(board.hash()) {
            let mv = entry.best_move;
            if mv.is_some() && board.is_pseudolegal(mv) {
                let mut child = *board;
                child.make_move(mv);
                if child.illegal_position() {
                    return;
                }
                line.push(mv);
                Self::tt_pv_line(tt, &child, depth - 1, line);
            }
        }
    }

    /// Zero-window scans around a running guess until the bounds meet.
    /// Experimental alternative to aspiration; never combined with PVS.
    fn mtdf_search(
        &mut self,
        tt: &mut TranspositionTable,
        board: &Board,
        depth: i32,
        guess: Value,
    ) -> Value {
        let mut g = guess;
        let mut upper = VALUE_MAX;
        let mut lower = VALUE_MIN;
        while lower < upper {
            let beta = if g == lower { g + 1 } else { g };
            g = self.search(tt, board, depth, 0, beta - 1, beta, true, true);
            if self.stopped() {
                break;
            }
            if g < beta {
                upper = g;
            } else {
                lower = g;
            }
        }
        g
    }

    /// Narrow window around the previous score, re-searched wider on a fail:
    /// +-30, then +-200, then the full window.
    fn aspiration_search(
        &mut self,
        tt: &mut TranspositionTable,
        board: &Board,
        depth: i32,
        best_value: Value,
    ) -> Value {
        debug_assert!(best_value != VALUE_NONE);

        let mut alpha = VALUE_MIN.max(best_value - 30);
        let mut beta = VALUE_MAX.min(best_value + 30);
        let mut value = self.search(tt, board, depth, 0, alpha, beta, true, true);

        if self.stopped() && (value <= alpha || value >= beta) {
            return best_value;
        }

        if value <= alpha {
            self.send_aspiration_info(" upperbound");
            self.counters.aspiration_researches += 1;
            // a fail low may mean a strong opponent reply was found
            self.clock.add_extra_time(1.3);
            alpha = VALUE_MIN.max(best_value - 200);
            value = self.search(tt, board, depth, 0, alpha, beta, true, true);
        } else if value >= beta {
            self.send_aspiration_info(" lowerbound");
            self.counters.aspiration_researches += 1;
            beta = VALUE_MAX.min(best_value + 200);
            value = self.search(tt, board, depth, 0, alpha, beta, true, true);
        }

        if self.stopped() && (value <= alpha || value >= beta) {
            return best_value;
        }

        if value <= alpha || value >= beta {
            self.send_aspiration_info(if value <= alpha {
                " lowerbound"
            } else {
                " upperbound"
            });
            self.counters.aspiration_researches += 1;
            if value <= alpha {
                self.clock.add_extra_time(1.3);
            }
            value = self.search(tt, board, depth, 0, VALUE_MIN, VALUE_MAX, true, true);
        }

        if self.stopped() {
            best_value
        } else {
            value
        }
    }

    /// The negamax node. Returns the score of `board` from the side to
    /// move's view; fills `pv[ply]`; a stopped search returns VALUE_MIN,
    /// which callers must not act on.
    #[allow(clippy::too_many_arguments)]
    fn search(
        &mut self,
        tt: &mut TranspositionTable,
        board: &Board,
        depth: i32,
        ply: usize,
        mut alpha: Value,
        mut beta: Value,
        pv_node: bool,
        do_null: bool,
    ) -> Value {
        let root = ply == 0;
        debug_assert!(depth <= MAX_SEARCH_DEPTH);
        debug_assert!(pv_node || alpha == beta - 1);

        self.counters.current_search_depth =
            self.counters.current_search_depth.max(ply as i32);
        self.counters.current_extra_search_depth =
            self.counters.current_extra_search_depth.max(ply as i32);

        // into quiescence on depth exhaustion; also one ply beyond the
        // iteration depth so extensions cannot explode the tree
        if depth <= 0
            || ply >= MAX_PLY - 1
            || ply as i32 - 1 >= self.counters.current_iteration_depth
        {
            return self.qsearch(tt, board, ply, alpha, beta, pv_node);
        }

        if self.should_abort() {
            return VALUE_MIN;
        }

        // repetitions inside the tree score as draws immediately; the root is
        // stricter and requires a real threefold
        if !self.perft {
            if root {
                if board.fifty_move_rule() || self.repetitions(board.hash()) >= 2 {
                    return DRAW;
                }
            } else if board.fifty_move_rule() || self.repetitions(board.hash()) >= 1 {
                return self.contempt(board);
            }
        }

        // mate distance pruning: a known shorter mate bounds this subtree
        if self.config.use_mdp && !self.perft && !root {
            alpha = alpha.max(-CHECKMATE + ply as Value);
            beta = beta.min(CHECKMATE - ply as Value);
            if alpha >= beta {
                self.counters.mate_distance_prunings += 1;
                return alpha;
            }
        }

        let mut tt_move = NOMOVE;
        if self.config.use_transposition_table && !self.perft {
            if let Some(entry) = tt.probe(board.hash()) {
                self.counters.tt_hits += 1;
                // the move and the threat flag are useful at any depth
                tt_move = entry.best_move;
                self.mate_threat[ply] = entry.mate_threat;

                if entry.depth as i32 >= depth && !root {
                    let value = value_from_tt(entry.value as Value, ply);
                    let cut = match entry.bound {
                        Bound::Exact => true,
                        Bound::Upper => !pv_node && value <= alpha,
                        Bound::Lower => !pv_node && value >= beta,
                        Bound::None => false,
                    };
                    if cut {
                        self.counters.tt_cuts += 1;
                        self.pv[ply].clear();
                        return value;
                    }
                }
                self.counters.tt_ignored += 1;
            } else {
                self.counters.tt_misses += 1;
            }
        }

        let mut bound = Bound::Upper;
        let mut best_value = VALUE_MIN;
        let mut best_move = if root {
            self.current_best_root_move
        } else {
            self.pv[ply].clear();
            tt_move
        };

        // beta pruning block: static eval, RFP, null move, razoring
        if !self.perft && !root && !pv_node && !board.in_check() && do_null {
            let static_eval = self.evaluate(board);

            // reverse futility: far above beta at the frontier, cut at once
            if self.config.use_rfp && depth == 1 {
                let margin = self.config.rfp_margin * depth;
                if static_eval - margin >= beta {
                    self.counters.rfp_prunings += 1;
                    self.store_tt(
                        tt,
                        board,
                        static_eval,
                        Bound::Lower,
                        depth,
                        best_move,
                        self.mate_threat[ply],
                        ply,
                    );
                    return static_eval - margin;
                }
            }

            // null move: give the opponent a free shot; surviving it above
            // beta ends the node and flags mate threats
            if self.config.use_nmp
                && depth >= self.config.nmp_depth
                && board.has_non_pawn_material(board.current_player())
                && !self.mate_threat[ply]
                && static_eval >= beta
            {
                let mut r = if depth > 6 { 3 } else { 2 };
                if self.config.use_verify_nmp {
                    r += 1;
                }

                let mut null_board = *board;
                null_board.make_null_move();
                self.position_history.push(board.hash());
                let mut null_value = -self.search(
                    tt,
                    &null_board,
                    (depth - r).max(0),
                    ply + 1,
                    -beta,
                    -beta + 1,
                    false,
                    false,
                );
                self.position_history.pop();

                if is_checkmate_value(null_value) {
                    self.mate_threat[ply] = true;
                }

                if self.config.use_verify_nmp
                    && depth > self.config.nmp_verification_depth
                    && null_value >= beta
                {
                    self.counters.null_move_verifications += 1;
                    null_value = self.search(
                        tt,
                        board,
                        depth - self.config.nmp_verification_depth,
                        ply,
                        alpha,
                        beta,
                        false,
                        false,
                    );
                }

                if null_value >= beta {
                    self.counters.null_move_prunings += 1;
                    self.store_tt(
                        tt,
                        board,
                        null_value,
                        Bound::Lower,
                        depth,
                        best_move,
                        self.mate_threat[ply],
                        ply,
                    );
                    return null_value;
                }
            }

            // razoring: hopeless positions drop straight into quiescence
            if self.config.use_razor_pruning
                && depth <= self.config.razor_depth
                && !self.mate_threat[ply]
                && !is_checkmate_value(alpha)
                && static_eval + self.config.razor_margin <= alpha
            {
                self.counters.razor_reductions += 1;
                return self.qsearch(tt, board, ply, alpha, beta, false);
            }
        }

        // internal iterative deepening: a PV node without a hash move runs a
        // reduced search just to get one
        if self.config.use_iid && !self.perft && pv_node && best_move.is_none() {
            self.counters.iid_searches += 1;
            let iid_depth = depth - self.config.iid_reduction;
            self.search(tt, board, iid_depth, ply, alpha, beta, true, true);
            best_move = self.pv[ply].first();
        }

        if self.stopped() {
            return VALUE_MIN;
        }

        let mut picker = if root {
            None
        } else {
            let hint = if self.config.use_pvs_ordering {
                best_move
            } else {
                NOMOVE
            };
            let killers = if self.config.use_killer_moves {
                self.killers[ply]
            } else {
                KillerMoves::new()
            };
            Some(MovePicker::<crate::types::AllMoves>::new(hint, killers))
        };

        let mut move_index = 0usize;
        let mut searched_moves = 0usize;
        loop {
            let mv = if root {
                if move_index >= self.root_moves.len() {
                    break;
                }
                self.root_moves.get(move_index)
            } else {
                match picker.as_mut().unwrap().next(board, &mut self.move_lists[ply]) {
                    Some((mv, _)) => mv,
                    None => break,
                }
            };
            let current_index = move_index;
            move_index += 1;
            self.counters.moves_generated += 1;

            if root {
                self.counters.current_root_move_number = current_index + 1;
            }

            // under-promotions other than a knight never matter
            if self.config.use_mpp
                && !self.perft
                && mv.kind() == MoveKind::Promotion
                && mv.promotion() != Piece::Queen
                && mv.promotion() != Piece::Knight
            {
                self.counters.minor_promotion_prunings += 1;
                continue;
            }

            let mut new_depth = depth - 1;
            let mut extension = 0;

            if self.config.use_extensions && !self.perft {
                let white = board.current_player().is_white();
                let push_to_seventh = mv.piece() == Piece::Pawn
                    && (if white {
                        mv.to().rank() == 6
                    } else {
                        mv.to().rank() == 1
                    });
                if self.mate_threat[ply]
                    || mv.kind() == MoveKind::Promotion
                    || push_to_seventh
                    || mv.kind() == MoveKind::Castling
                    || board.gives_check(mv)
                {
                    extension = 1;
                    new_depth += extension;
                }
            }

            // alpha pruning block: drop or reduce moves that cannot reach
            // alpha even with optimistic margins
            if !self.perft && !pv_node && extension == 0 && !board.in_check() {
                let us = board.current_player();
                let material_eval = board.material(us) - board.material(us.other());
                let move_gain = mv.captured().map(|p| p.value()).unwrap_or(0);

                if self.config.use_limited_razoring && depth == 3 {
                    if material_eval + move_gain + QUEEN_VALUE <= alpha {
                        self.counters.lr_reductions += 1;
                        new_depth = 2;
                    }
                }

                if self.config.use_extended_futility_pruning && depth == 2 {
                    if material_eval + move_gain + ROOK_VALUE <= alpha {
                        self.counters.efp_prunings += 1;
                        continue;
                    }
                }

                if self.config.use_futility_pruning && depth == 1 {
                    if material_eval + move_gain + 3 * PAWN_VALUE <= alpha {
                        if material_eval + move_gain > best_value {
                            best_value = material_eval + move_gain;
                        }
                        self.counters.fp_prunings += 1;
                        continue;
                    }
                }

                if self.config.use_lmr
                    && depth >= self.config.lmr_min_depth
                    && searched_moves >= self.config.lmr_min_moves
                {
                    self.counters.lmr_reductions += 1;
                    new_depth -= self.config.lmr_reduction;
                }
            }

            let mut child = *board;
            child.make_move(mv);
            // only hash moves can slip through here illegally
            if !root && child.illegal_position() {
                continue;
            }

            self.counters.nodes_visited += 1;
            self.current_variation.push(mv);
            self.position_history.push(board.hash());
            self.send_periodic_info(tt);

            let value = if !self.config.use_pvs || self.perft || searched_moves == 0 {
                -self.search(tt, &child, new_depth, ply + 1, -beta, -alpha, pv_node, true)
            } else {
                let mut value = -self.search(
                    tt,
                    &child,
                    new_depth,
                    ply + 1,
                    -alpha - 1,
                    -alpha,
                    false,
                    true,
                );
                if value > alpha && value < beta && !self.stopped() {
                    if root {
                        self.counters.pvs_root_researches += 1;
                    } else {
                        self.counters.pvs_researches += 1;
                    }
                    value =
                        -self.search(tt, &child, new_depth, ply + 1, -beta, -alpha, true, true);
                } else if root {
                    self.counters.pvs_root_cutoffs += 1;
                } else {
                    self.counters.pvs_cutoffs += 1;
                }
                value
            };

            searched_moves += 1;
            self.current_variation.pop();
            self.position_history.pop();

            if self.perft {
                continue;
            }

            // a stopped recursion returned garbage; anything committed before
            // the stop is still good
            if self.stopped() {
                break;
            }

            if root {
                self.root_moves.set_value(current_index, value);
            }

            if value > best_value {
                best_value = value;
                best_move = mv;

                if value >= beta && self.config.use_alphabeta_pruning {
                    if self.config.use_killer_moves && !mv.is_capture() {
                        self.killers[ply].push(mv);
                    }
                    self.counters.record_beta_cutoff(current_index);
                    bound = Bound::Lower;
                    break;
                }

                if value > alpha {
                    self.save_pv(ply, mv);
                    bound = Bound::Exact;
                    alpha = value;
                    if root {
                        self.current_best_root_move = mv;
                        self.counters.best_move_changes += 1;
                    }
                }
            }

            if root && (self.stopped() || self.soft_limit_reached() || self.hard_limit_reached())
            {
                break;
            }
        }

        // no playable move: mate or stalemate (the root was handled by the
        // driver before searching)
        if !root && searched_moves == 0 && !self.stopped() && !self.perft {
            self.counters.non_leaf_positions_evaluated += 1;
            best_value = if board.in_check() {
                -CHECKMATE + ply as Value
            } else {
                DRAW
            };
        }

        self.store_tt(
            tt,
            board,
            best_value,
            bound,
            depth,
            best_move,
            self.mate_threat[ply],
            ply,
        );
        best_value
    }

    /// Tactical extension at the horizon: stand pat, then only forcing moves
    /// until the position is quiet.
    fn qsearch(
        &mut self,
        tt: &mut TranspositionTable,
        board: &Board,
        ply: usize,
        mut alpha: Value,
        mut beta: Value,
        pv_node: bool,
    ) -> Value {
        self.counters.current_extra_search_depth =
            self.counters.current_extra_search_depth.max(ply as i32);

        // perft counts leaves here, nothing else matters
        if self.perft {
            return self.evaluate(board);
        }

        if board.fifty_move_rule() || self.repetitions(board.hash()) >= 1 {
            return self.contempt(board);
        }

        if !self.config.use_quiescence || ply >= MAX_PLY - 1 {
            return self.evaluate(board);
        }

        if self.should_abort() {
            return VALUE_MIN;
        }

        if self.config.use_mdp {
            alpha = alpha.max(-CHECKMATE + ply as Value);
            beta = beta.min(CHECKMATE - ply as Value);
            if alpha >= beta {
                self.counters.mate_distance_prunings += 1;
                return alpha;
            }
        }

        let mut tt_move = NOMOVE;
        if self.config.use_transposition_table {
            if let Some(entry) = tt.probe(board.hash()) {
                self.counters.tt_hits += 1;
                tt_move = entry.best_move;
                self.mate_threat[ply] = entry.mate_threat;

                let value = value_from_tt(entry.value as Value, ply);
                let cut = match entry.bound {
                    Bound::Exact => true,
                    Bound::Upper => !pv_node && value <= alpha,
                    Bound::Lower => !pv_node && value >= beta,
                    Bound::None => false,
                };
                if cut {
                    self.counters.tt_cuts += 1;
                    self.pv[ply].clear();
                    return value;
                }
                self.counters.tt_ignored += 1;
            } else {
                self.counters.tt_misses += 1;
            }
        }

        let mut bound = Bound::Upper;
        let mut best_value = VALUE_MIN;
        let mut best_move = tt_move;
        let in_check = board.in_check();
        self.pv[ply].clear();

        // stand pat: the mover surely has one quiet option worth the static
        // eval, so that is a floor (not while in check)
        if !in_check {
            let stand_pat = self.evaluate(board);
            best_value = stand_pat;
            if stand_pat >= beta {
                self.store_tt(
                    tt,
                    board,
                    stand_pat,
                    Bound::Lower,
                    0,
                    NOMOVE,
                    self.mate_threat[ply],
                    ply,
                );
                return stand_pat;
            }
            if stand_pat > alpha {
                alpha = stand_pat;
            }
        }

        let hint = if self.config.use_pvs_ordering {
            tt_move
        } else {
            NOMOVE
        };
        let mut picker = MovePicker::<crate::types::NoisyMoves>::new(hint, KillerMoves::new());

        let mut move_index = 0usize;
        let mut searched_moves = 0usize;
        loop {
            let mv = match picker.next(board, &mut self.move_lists[ply]) {
                Some((mv, _)) => mv,
                None => break,
            };
            let current_index = move_index;
            move_index += 1;
            self.counters.moves_generated += 1;

            if self.config.use_mpp
                && mv.kind() == MoveKind::Promotion
                && mv.promotion() != Piece::Queen
                && mv.promotion() != Piece::Knight
            {
                self.counters.minor_promotion_prunings += 1;
                continue;
            }

            // delta futility: even winning this capture plus a margin does
            // not reach alpha
            if self.config.use_qfutility_pruning && !pv_node && !in_check {
                let white = board.current_player().is_white();
                let push_to_seventh = mv.piece() == Piece::Pawn
                    && (if white {
                        mv.to().rank() == 6
                    } else {
                        mv.to().rank() == 1
                    });
                if mv.kind() != MoveKind::Promotion
                    && !push_to_seventh
                    && board.has_non_pawn_material(board.current_player())
                    && !board.gives_check(mv)
                {
                    let us = board.current_player();
                    let material_eval = board.material(us) - board.material(us.other());
                    let move_gain = mv.captured().map(|p| p.value()).unwrap_or(0);
                    let value = material_eval + move_gain + 2 * PAWN_VALUE;
                    if value <= alpha {
                        self.counters.qfp_prunings += 1;
                        if value > best_value {
                            best_value = value;
                        }
                        continue;
                    }
                }
            }

            let mut child = *board;
            child.make_move(mv);
            if child.illegal_position() {
                continue;
            }

            self.counters.nodes_visited += 1;
            self.counters.positions_non_quiet += 1;
            self.current_variation.push(mv);
            self.position_history.push(board.hash());

            let value = -self.qsearch(tt, &child, ply + 1, -beta, -alpha, pv_node);

            searched_moves += 1;
            self.current_variation.pop();
            self.position_history.pop();

            if self.stopped() {
                break;
            }

            if value > best_value {
                best_value = value;
                best_move = mv;

                if value >= beta && self.config.use_alphabeta_pruning {
                    self.counters.record_beta_cutoff(current_index);
                    bound = Bound::Lower;
                    break;
                }

                if value > alpha {
                    self.save_pv(ply, mv);
                    bound = Bound::Exact;
                    alpha = value;
                }
            }
        }

        // in check with no escape is mate; quiet positions already have the
        // stand pat as their floor
        if searched_moves == 0 && in_check && !self.stopped() {
            self.counters.non_leaf_positions_evaluated += 1;
            best_value = -CHECKMATE + ply as Value;
        }

        self.store_tt(
            tt,
            board,
            best_value,
            bound,
            0,
            best_move,
            self.mate_threat[ply],
            ply,
        );
        best_value
    }

    fn send_iteration_info(&mut self) {
        let elapsed = self.clock.elapsed_ms();
        let line = format!(
            "depth {} seldepth {} multipv 1 {} nodes {} nps {} time {} pv {}",
            self.counters.current_iteration_depth,
            self.counters.current_extra_search_depth,
            score_string(self.current_best_root_value),
            self.counters.nodes_visited,
            self.counters.nps(elapsed),
            elapsed,
            self.pv[0],
        );
        self.sink.send_info(&line);
    }

    fn send_aspiration_info(&mut self, bound: &str) {
        let elapsed = self.clock.elapsed_ms();
        let line = format!(
            "depth {} seldepth {} multipv 1 {}{} nodes {} nps {} time {} pv {}",
            self.counters.current_iteration_depth,
            self.counters.current_extra_search_depth,
            score_string(self.current_best_root_value),
            bound,
            self.counters.nodes_visited,
            self.counters.nps(elapsed),
            elapsed,
            self.pv[0],
        );
        self.sink.send_info(&line);
    }

    /// Throttled progress line while the tree is being searched.
    fn send_periodic_info(&mut self, tt: &TranspositionTable) {
        let elapsed = self.clock.elapsed_ms();
        if elapsed.saturating_sub(self.last_info_ms) < INFO_INTERVAL_MS {
            return;
        }
        self.last_info_ms = elapsed;
        let line = format!(
            "depth {} seldepth {} nodes {} nps {} time {} hashfull {}",
            self.counters.current_iteration_depth,
            self.counters.current_extra_search_depth,
            self.counters.nodes_visited,
            self.counters.nps(elapsed),
            elapsed,
            tt.hashfull(),
        );
        self.sink.send_info(&line);
        self.sink.send_info(&format!(
            "currmovenumber {}",
            self.counters.current_root_move_number
        ));
    }

    pub fn principal_variation(&self) -> &PvLine {
        &self.pv[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mate_scores_round_trip_through_tt_conversion() {
        // a mate found 9 plies from the root, stored at ply 5
        let value = CHECKMATE - 9;
        let stored = value_to_tt(value, 5);
        assert_eq!(stored, CHECKMATE - 4, "distance from the storing node");
        // probing at ply 3 re-distances it to the reader
        assert_eq!(value_from_tt(stored, 3), CHECKMATE - 7);

        let value = -CHECKMATE + 9;
        let stored = value_to_tt(value, 5);
        assert_eq!(stored, -(CHECKMATE - 4));
        assert_eq!(value_from_tt(stored, 3), -CHECKMATE + 7);

        // plain scores pass through untouched
        assert_eq!(value_to_tt(123, 40), 123);
        assert_eq!(value_from_tt(-123, 40), -123);
    }

    #[test]
    fn checkmate_band() {
        assert!(is_checkmate_value(CHECKMATE));
        assert!(is_checkmate_value(-CHECKMATE + 30));
        assert!(!is_checkmate_value(DRAW));
        assert!(!is_checkmate_value(CHECKMATE_THRESHOLD - 1));
    }

    #[test]
    fn score_strings() {
        assert_eq!(score_string(42), "score cp 42");
        assert_eq!(score_string(CHECKMATE - 3), "score mate 2");
        assert_eq!(score_string(-(CHECKMATE - 7)), "score mate -4");
    }

    #[test]
    fn pv_line_prepend() {
        let a = Move::new(
            sable_bitboards::Square::E2,
            sable_bitboards::Square::E4,
            Piece::Pawn,
            Piece::Pawn,
            None,
            MoveKind::Normal,
        );
        let b = Move::new(
            sable_bitboards::Square::E7,
            sable_bitboards::Square::E5,
            Piece::Pawn,
            Piece::Pawn,
            None,
            MoveKind::Normal,
        );
        let mut line = PvLine::new();
        line.set_single(b);
        let mut head = PvLine::new();
        head.moves[0] = a;
        head.moves[1..=1].copy_from_slice(&line.moves[..1]);
        head.len = 2;
        assert_eq!(head.first(), a);
        assert_eq!(head.get(1), b);
        assert_eq!(format!("{head}"), "e2e4 e7e5");
    }
}
