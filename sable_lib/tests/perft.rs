//! Move generation validation through the search in PERFT mode: with every
//! pruning feature disabled, the leaf counters must match the published
//! perft figures for the initial position.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use sable_lib::board::Board;
use sable_lib::config::Config;
use sable_lib::counters::SearchCounters;
use sable_lib::engine::NullSink;
use sable_lib::search::Searcher;
use sable_lib::search_mode::SearchMode;
use sable_lib::time_control::TimeControl;
use sable_lib::transposition_table::TranspositionTable;

fn perft_counters(depth: i32) -> SearchCounters {
    let mode = SearchMode {
        start_depth: depth,
        max_depth: depth,
        perft: true,
        ..Default::default()
    };
    let mut searcher = Searcher::new(
        Board::new(),
        Vec::new(),
        Config::all_features_off(),
        mode,
        Arc::new(AtomicBool::new(false)),
        Arc::new(TimeControl::new()),
        Arc::new(NullSink),
        false,
    );
    let mut tt = TranspositionTable::new(1).unwrap();
    searcher.run(&mut tt);
    searcher.counters.clone()
}

struct Expected {
    depth: i32,
    nodes: u64,
    captures: u64,
    en_passant: u64,
    checks: u64,
    mates: u64,
}

fn check(expected: Expected) {
    let counters = perft_counters(expected.depth);
    assert_eq!(
        counters.leaf_positions_evaluated, expected.nodes,
        "nodes at depth {}",
        expected.depth
    );
    assert_eq!(
        counters.capture_counter, expected.captures,
        "captures at depth {}",
        expected.depth
    );
    assert_eq!(
        counters.en_passant_counter, expected.en_passant,
        "en passant at depth {}",
        expected.depth
    );
    assert_eq!(
        counters.check_counter, expected.checks,
        "checks at depth {}",
        expected.depth
    );
    assert_eq!(
        counters.check_mate_counter, expected.mates,
        "mates at depth {}",
        expected.depth
    );
}

#[test]
fn perft_depth_1() {
    check(Expected {
        depth: 1,
        nodes: 20,
        captures: 0,
        en_passant: 0,
        checks: 0,
        mates: 0,
    });
}

#[test]
fn perft_depth_2() {
    check(Expected {
        depth: 2,
        nodes: 400,
        captures: 0,
        en_passant: 0,
        checks: 0,
        mates: 0,
    });
}

#[test]
fn perft_depth_3() {
    check(Expected {
        depth: 3,
        nodes: 8_902,
        captures: 34,
        en_passant: 0,
        checks: 12,
        mates: 0,
    });
}

#[test]
fn perft_depth_4() {
    check(Expected {
        depth: 4,
        nodes: 197_281,
        captures: 1_576,
        en_passant: 0,
        checks: 469,
        mates: 8,
    });
}

// minutes in a debug build; run with --ignored when movegen changes
#[test]
#[ignore]
fn perft_depth_5() {
    check(Expected {
        depth: 5,
        nodes: 4_865_609,
        captures: 82_719,
        en_passant: 258,
        checks: 27_351,
        mates: 347,
    });
}
