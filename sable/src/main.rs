mod uci;

use std::io::{prelude::*, stdin};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;

use sable_lib::board::Board;
use sable_lib::config::Config;
use sable_lib::engine::{Engine, ProtocolSink};
use sable_lib::moves::Move;
use sable_lib::search_mode::SearchMode;

use uci::{parse_uci_command, print_uci_options, UciCommand, UciParseError};

/// Protocol output straight to stdout, one line per call.
struct StdoutSink;

impl ProtocolSink for StdoutSink {
    fn send_info(&self, line: &str) {
        println!("info {line}");
    }

    fn send_result(&self, best_move: Move, ponder_move: Move) {
        if ponder_move.is_some() {
            println!("bestmove {best_move} ponder {ponder_move}");
        } else {
            println!("bestmove {best_move}");
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let mut engine = Engine::new(Config::default(), Arc::new(StdoutSink))?;
    let mut board = Board::new();
    let mut history: Vec<u64> = Vec::new();

    if std::env::args().nth(1).as_deref() == Some("bench") {
        return bench(&mut engine);
    }

    for line in stdin().lock().lines() {
        let cmd = match parse_uci_command(&line?) {
            Ok(cmd) => cmd,
            Err(UciParseError::Empty) => continue,
            Err(UciParseError::Other(e)) => {
                println!("{e}");
                continue;
            }
        };

        match cmd {
            UciCommand::Uci => {
                println!("id name Sable");
                println!("id author the Sable authors");
                print_uci_options();
                println!("uciok");
            }
            UciCommand::IsReady => println!("readyok"),
            UciCommand::SetOption { name, value } => {
                let outcome = match name.as_str() {
                    "Hash" => value
                        .parse::<usize>()
                        .map_err(|_| {
                            sable_lib::error::ConfigError::InvalidValue {
                                option: name.clone(),
                                value: value.clone(),
                            }
                        })
                        .and_then(|mb| engine.set_hash_size(mb)),
                    // the GUI toggles these; the engine already copes
                    "Ponder" | "OwnBook" => Ok(()),
                    _ => engine.set_option(&name, &value),
                };
                if let Err(e) = outcome {
                    println!("info string {e}");
                }
            }
            UciCommand::UciNewGame => {
                board = Board::new();
                history.clear();
                engine.new_game();
            }
            UciCommand::Position {
                board: new_board,
                history: new_history,
            } => {
                board = new_board;
                history = new_history;
            }
            UciCommand::Go(mode) => {
                engine.set_game_history(history.clone());
                engine.start_search(&board, mode);
            }
            UciCommand::Perft(depth) => {
                let start = Instant::now();
                let mut total = 0;
                for (mv, nodes) in board.divide(depth) {
                    println!("{mv}: {nodes}");
                    total += nodes;
                }
                let elapsed = start.elapsed().as_secs_f64();
                println!("Nodes: {total}\t\tNPS: {}", (total as f64 / elapsed) as u64);
            }
            UciCommand::Fen => println!("{}", board.fen()),
            UciCommand::Stop => engine.stop_search(),
            UciCommand::PonderHit => engine.ponder_hit(),
            UciCommand::Quit => {
                engine.stop_search();
                break;
            }
        }
    }
    Ok(())
}

/// Fixed-depth search from the start position, for quick speed comparisons.
fn bench(engine: &mut Engine) -> Result<()> {
    let board = Board::new();
    let start = Instant::now();
    engine.start_search(&board, SearchMode::depth(10));
    engine.wait_while_searching();
    let elapsed = start.elapsed();

    if let Some(result) = engine.last_result() {
        println!(
            "bestmove {} depth {} in {} ms ({} ms wall)",
            result.best_move,
            result.depth,
            result.time_ms,
            elapsed.as_millis()
        );
    }
    Ok(())
}
