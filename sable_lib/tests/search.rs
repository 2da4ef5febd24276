//! End-to-end search behavior: mate finding, stop conditions, terminal
//! positions, and the invariants the pruning features must not break.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};

use sable_lib::board::Board;
use sable_lib::config::Config;
use sable_lib::engine::{Engine, NullSink};
use sable_lib::moves::NOMOVE;
use sable_lib::search::{SearchResult, Searcher, CHECKMATE, DRAW};
use sable_lib::search_mode::SearchMode;
use sable_lib::time_control::TimeControl;
use sable_lib::transposition_table::TranspositionTable;

fn run_search(fen: &str, mode: SearchMode, config: Config) -> (SearchResult, Searcher) {
    let board = Board::from_fen(fen).unwrap();
    let mut searcher = Searcher::new(
        board,
        Vec::new(),
        config,
        mode,
        Arc::new(AtomicBool::new(false)),
        Arc::new(TimeControl::new()),
        Arc::new(NullSink),
        false,
    );
    let mut tt = TranspositionTable::new(8).unwrap();
    let result = searcher.run(&mut tt);
    (result, searcher)
}

const STARTPOS: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
const MATE_IN_2: &str = "1r3rk1/1pnnq1bR/p1pp2B1/P2P1p2/1PP1pP2/2B3P1/5PK1/2Q4R w - - 0 1";
const MATE_IN_4: &str = "r2r1n2/pp2bk2/2p1p2p/3q4/3PN1QP/2P3R1/P4PP1/5RK1 w - - 0 1";

#[test]
fn mate_in_two_is_found_with_the_right_distance() {
    let mode = SearchMode {
        mate_in: 2,
        ..Default::default()
    };
    let (result, _) = run_search(MATE_IN_2, mode, Config::default());
    assert_eq!(result.value, CHECKMATE - 3, "mate in 2 is 3 plies away");
    let board = Board::from_fen(MATE_IN_2).unwrap();
    assert!(board.legal_move_list().contains(&result.best_move));
}

// a depth 7 search; long in a debug build
#[test]
#[ignore]
fn mate_in_four_is_found_with_the_right_distance() {
    let mode = SearchMode {
        mate_in: 4,
        ..Default::default()
    };
    let (result, _) = run_search(MATE_IN_4, mode, Config::default());
    assert_eq!(result.value, CHECKMATE - 7, "mate in 4 is 7 plies away");
}

#[test]
fn node_limit_is_respected_within_one_node() {
    let limit = 50_000;
    let (result, searcher) = run_search(STARTPOS, SearchMode::nodes(limit), Config::default());
    let nodes = searcher.counters.nodes_visited;
    assert!(
        nodes >= limit && nodes <= limit + 1,
        "expected ~{limit} nodes, searched {nodes}"
    );
    let board = Board::from_fen(STARTPOS).unwrap();
    assert!(board.legal_move_list().contains(&result.best_move));
}

// the same clamp at a five-million-node budget; slow in a debug build
#[test]
#[ignore]
fn node_limit_five_million() {
    let limit = 5_000_000;
    let (_, searcher) = run_search(STARTPOS, SearchMode::nodes(limit), Config::default());
    let nodes = searcher.counters.nodes_visited;
    assert!(nodes >= limit && nodes <= limit + 1);
}

#[test]
fn fixed_depth_stops_at_that_depth() {
    let (result, searcher) = run_search(STARTPOS, SearchMode::depth(4), Config::default());
    assert_eq!(searcher.counters.current_iteration_depth, 4);
    let board = Board::from_fen(STARTPOS).unwrap();
    assert!(board.legal_move_list().contains(&result.best_move));
    assert!(result.valid);
}

#[test]
fn stalemate_terminal_position() {
    let (result, _) = run_search(
        "7k/5Q2/6K1/8/8/8/8/8 b - - 0 1",
        SearchMode::depth(4),
        Config::default(),
    );
    assert_eq!(result.best_move, NOMOVE);
    assert_eq!(result.value, DRAW);
}

#[test]
fn checkmated_terminal_position() {
    let (result, _) = run_search(
        "rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3",
        SearchMode::depth(4),
        Config::default(),
    );
    assert_eq!(result.best_move, NOMOVE);
    assert_eq!(result.value, -CHECKMATE);
}

#[test]
fn stop_during_infinite_search() {
    let mut engine = Engine::new(
        Config {
            hash_size_mb: 8,
            ..Default::default()
        },
        Arc::new(NullSink),
    )
    .unwrap();
    let board = Board::new();
    engine.start_search(&board, SearchMode::infinite());
    std::thread::sleep(Duration::from_millis(500));
    assert!(engine.is_searching());

    let stop_started = Instant::now();
    engine.stop_search();
    let stop_took = stop_started.elapsed();

    assert!(!engine.is_searching());
    assert!(
        stop_took < Duration::from_millis(250),
        "stop took {stop_took:?}"
    );
    let result = engine.last_result().expect("a result must be available");
    assert!(board.legal_move_list().contains(&result.best_move));

    // stopping again is idempotent
    engine.stop_search();
    assert!(!engine.is_searching());
}

#[test]
fn searches_are_deterministic_on_a_fresh_table() {
    for fen in [
        STARTPOS,
        "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
    ] {
        let (a, _) = run_search(fen, SearchMode::depth(4), Config::default());
        let (b, _) = run_search(fen, SearchMode::depth(4), Config::default());
        assert_eq!(a.best_move, b.best_move, "{fen}");
        assert_eq!(a.value, b.value, "{fen}");
    }
}

#[test]
fn pv_head_is_the_best_move() {
    for depth in 1..=4 {
        let (result, searcher) = run_search(STARTPOS, SearchMode::depth(depth), Config::default());
        assert_eq!(
            searcher.principal_variation().first(),
            result.best_move,
            "depth {depth}"
        );
    }
}

#[test]
fn ponder_move_continues_the_pv() {
    let (result, searcher) = run_search(STARTPOS, SearchMode::depth(4), Config::default());
    assert_eq!(result.ponder_move, searcher.principal_variation().get(1));
}

#[test]
fn deeper_searches_visit_more_nodes() {
    let (_, shallow) = run_search(STARTPOS, SearchMode::depth(2), Config::default());
    let (_, deep) = run_search(STARTPOS, SearchMode::depth(4), Config::default());
    assert!(deep.counters.nodes_visited >= shallow.counters.nodes_visited);
}

#[test]
fn best_moves_are_legal_across_a_position_suite() {
    let suite = [
        STARTPOS,
        "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
        "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1",
        "4k3/8/8/8/8/8/4P3/4K3 w - - 0 1",
        MATE_IN_2,
    ];
    for fen in suite {
        for depth in 1..=3 {
            let (result, _) = run_search(fen, SearchMode::depth(depth), Config::default());
            let board = Board::from_fen(fen).unwrap();
            assert!(
                board.legal_move_list().contains(&result.best_move),
                "illegal best move {} in {fen} at depth {depth}",
                result.best_move
            );
        }
    }
}

#[test]
fn aspiration_windows_do_not_change_the_score() {
    let mut no_aspiration = Config::default();
    no_aspiration.use_aspiration_window = false;
    for fen in [STARTPOS, "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1"] {
        let (with, _) = run_search(fen, SearchMode::depth(3), Config::default());
        let (without, _) = run_search(fen, SearchMode::depth(3), no_aspiration.clone());
        assert_eq!(with.value, without.value, "{fen}");
    }
}

#[test]
fn pvs_does_not_change_the_score() {
    let mut no_pvs = Config::default();
    no_pvs.use_pvs = false;
    for fen in [STARTPOS, "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1"] {
        let (with, _) = run_search(fen, SearchMode::depth(3), Config::default());
        let (without, _) = run_search(fen, SearchMode::depth(3), no_pvs.clone());
        assert_eq!(with.value, without.value, "{fen}");
    }
}

#[test]
fn restricted_root_moves_are_honored() {
    let mode = SearchMode {
        max_depth: 3,
        restricted_moves: Some(vec!["a2a3".to_string()]),
        ..Default::default()
    };
    let (result, _) = run_search(STARTPOS, mode, Config::default());
    assert_eq!(result.best_move.coords(), "a2a3");
}

#[test]
fn repetition_history_produces_a_draw_score() {
    // shuffle a rook back and forth until the search sees the threefold
    let board = Board::from_fen("7k/8/8/8/8/8/R7/K7 w - - 0 1").unwrap();
    let mut history = Vec::new();
    let mut current = board;
    for coords in ["a2b2", "h8g8", "b2a2", "g8h8", "a2b2", "h8g8", "b2a2", "g8h8"] {
        history.push(current.hash());
        let mv = current
            .legal_move_list()
            .into_iter()
            .find(|m| m.coords() == coords)
            .unwrap();
        current.make_move(mv);
    }
    // the position is now on the board for the third time
    let mut searcher = Searcher::new(
        current,
        history,
        Config::default(),
        SearchMode::depth(2),
        Arc::new(AtomicBool::new(false)),
        Arc::new(TimeControl::new()),
        Arc::new(NullSink),
        false,
    );
    let mut tt = TranspositionTable::new(8).unwrap();
    let result = searcher.run(&mut tt);
    assert_eq!(result.value, DRAW);
}
