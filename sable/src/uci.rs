use std::fmt::Display;

use sable_lib::board::Board;
use sable_lib::config::*;
use sable_lib::moves::Move;
use sable_lib::search_mode::SearchMode;

pub enum UciCommand {
    Uci,
    IsReady,
    SetOption { name: String, value: String },
    UciNewGame,
    Position { board: Board, history: Vec<u64> },
    Go(SearchMode),
    Perft(usize),
    Fen,
    Stop,
    PonderHit,
    Quit,
}

#[derive(Debug)]
pub enum UciParseError {
    Empty,
    Other(String),
}

impl Display for UciParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UciParseError::Empty => Ok(()),
            UciParseError::Other(reason) => write!(f, "{reason}"),
        }
    }
}

impl std::error::Error for UciParseError {}

/// The UCI options the engine advertises: the hash size and every feature
/// gate of the search, under their canonical names.
pub fn print_uci_options() {
    println!("option name Hash type spin default {DEFAULT_HASH_SIZE_MB} min 1 max 32768");
    println!("option name Ponder type check default true");
    println!("option name OwnBook type check default true");

    for gate in [
        "USE_ALPHABETA_PRUNING",
        "USE_PVS",
        "USE_PVS_ORDERING",
        "USE_KILLER_MOVES",
        "USE_ASPIRATION_WINDOW",
        "USE_MTDF",
        "USE_TRANSPOSITION_TABLE",
        "USE_TT_ROOT",
        "USE_MDP",
        "USE_MPP",
        "USE_RFP",
        "USE_NMP",
        "USE_VERIFY_NMP",
        "USE_RAZOR_PRUNING",
        "USE_IID",
        "USE_EXTENSIONS",
        "USE_LIMITED_RAZORING",
        "USE_EXTENDED_FUTILITY_PRUNING",
        "USE_FUTILITY_PRUNING",
        "USE_LMR",
        "USE_QUIESCENCE",
        "USE_QFUTILITY_PRUNING",
    ] {
        let default = gate != "USE_MTDF";
        println!("option name {gate} type check default {default}");
    }

    for (name, default, min, max) in [
        ("ASPIRATION_START_DEPTH", ASPIRATION_START_DEPTH, 2, 10),
        ("MTDF_START_DEPTH", MTDF_START_DEPTH, 2, 10),
        ("RFP_MARGIN", RFP_MARGIN, 0, 1000),
        ("NMP_DEPTH", NMP_DEPTH, 1, 10),
        ("NMP_VERIFICATION_DEPTH", NMP_VERIFICATION_DEPTH, 1, 10),
        ("RAZOR_DEPTH", RAZOR_DEPTH, 1, 10),
        ("RAZOR_MARGIN", RAZOR_MARGIN, 0, 2000),
        ("IID_REDUCTION", IID_REDUCTION, 1, 10),
        ("LMR_MIN_DEPTH", LMR_MIN_DEPTH, 1, 10),
        ("LMR_MIN_MOVES", LMR_MIN_MOVES as i32, 1, 30),
        ("LMR_REDUCTION", LMR_REDUCTION, 1, 5),
        ("CONTEMPT_FACTOR", CONTEMPT_FACTOR, -100, 100),
    ] {
        println!("option name {name} type spin default {default} min {min} max {max}");
    }
}

macro_rules! parse_uci_go_value {
    ($words:ident, $name:ident, $type:ty) => {
        let $name = {
            if let Some(p) = $words.iter().position(|&w| w == stringify!($name)) {
                match $words.get(p + 1) {
                    Some(n) => Some(n.parse::<$type>().map_err(|_| {
                        UciParseError::Other(format!(
                            concat!(
                                "Invalid value for ",
                                stringify!($name),
                                " in UCI go command: {}"
                            ),
                            n
                        ))
                    })?),
                    None => {
                        return Err(UciParseError::Other(String::from(concat!(
                            "Missing token in UCI go command: no value specified for ",
                            stringify!($name)
                        ))))
                    }
                }
            } else {
                None
            }
        };
    };
}

pub fn parse_uci_command(cmd: &str) -> Result<UciCommand, UciParseError> {
    let words = cmd.split_whitespace().collect::<Vec<&str>>();

    use UciCommand::*;

    let Some(word) = words.first() else {
        return Err(UciParseError::Empty);
    };

    match word.to_lowercase().as_str() {
        "uci" => Ok(Uci),
        "isready" => Ok(IsReady),
        "ucinewgame" => Ok(UciNewGame),
        "setoption" => parse_setoption(&words),
        "position" => parse_position(&words),
        "go" => parse_go(&words),
        "fen" => Ok(Fen),
        "stop" => Ok(Stop),
        "ponderhit" => Ok(PonderHit),
        "quit" => Ok(Quit),
        other => Err(UciParseError::Other(format!("Unknown UCI command: {other}"))),
    }
}

fn parse_setoption(words: &[&str]) -> Result<UciCommand, UciParseError> {
    let name = match words.get(1).copied() {
        Some("name") => words.get(2).copied().ok_or_else(|| {
            UciParseError::Other(
                "Missing token in UCI setoption command: no name specified".to_string(),
            )
        })?,
        Some(other) => {
            return Err(UciParseError::Other(format!(
                "Unexpected token in UCI setoption command: expected 'name', found {other}"
            )))
        }
        None => {
            return Err(UciParseError::Other(
                "Missing token in UCI setoption command: 'name' not found".to_string(),
            ))
        }
    };
    let value = match words.get(3).copied() {
        Some("value") => words.get(4).copied().ok_or_else(|| {
            UciParseError::Other(
                "Missing token in UCI setoption command: no value specified".to_string(),
            )
        })?,
        Some(other) => {
            return Err(UciParseError::Other(format!(
                "Unexpected token in UCI setoption command: expected 'value', found {other}"
            )))
        }
        None => {
            return Err(UciParseError::Other(
                "Missing token in UCI setoption command: 'value' not found".to_string(),
            ))
        }
    };
    Ok(UciCommand::SetOption {
        name: name.to_string(),
        value: value.to_string(),
    })
}

fn parse_position(words: &[&str]) -> Result<UciCommand, UciParseError> {
    let (mut board, moves_index) = match words.get(1) {
        Some(&"startpos") => (Board::new(), 2),
        Some(&"fen") => match words.get(2..=7) {
            Some(fen) => {
                let fen = fen.join(" ");
                let board = Board::from_fen(&fen).map_err(|e| {
                    UciParseError::Other(format!(
                        "Invalid FEN string in UCI position command: {fen} ({e})"
                    ))
                })?;
                (board, 8)
            }
            None => {
                return Err(UciParseError::Other(
                    "Incomplete or missing FEN string in UCI position command".to_string(),
                ))
            }
        },
        Some(other) => {
            return Err(UciParseError::Other(format!(
                "Invalid argument in UCI position command: {other}\n\t\
                 Valid arguments are: 'startpos', 'fen [FEN]'"
            )))
        }
        None => {
            return Err(UciParseError::Other(
                "Missing arguments in UCI position command, expected 'startpos' or 'fen'"
                    .to_string(),
            ))
        }
    };

    let mut history = Vec::new();
    match words.get(moves_index) {
        Some(&"moves") => {
            for move_string in &words[moves_index + 1..] {
                let mv = find_legal_move(&board, move_string).ok_or_else(|| {
                    UciParseError::Other(format!(
                        "Illegal move in UCI position command: {move_string}"
                    ))
                })?;
                history.push(board.hash());
                board.make_move(mv);
            }
        }
        Some(other) => {
            return Err(UciParseError::Other(format!(
                "Expected 'moves' in UCI position command, found {other}"
            )))
        }
        None => {}
    }

    Ok(UciCommand::Position { board, history })
}

/// Resolves a long-algebraic move string against the legal moves of `board`.
pub fn find_legal_move(board: &Board, coords: &str) -> Option<Move> {
    board
        .legal_move_list()
        .into_iter()
        .find(|m| m.coords() == coords)
}

fn parse_go(words: &[&str]) -> Result<UciCommand, UciParseError> {
    parse_uci_go_value!(words, wtime, i64);
    parse_uci_go_value!(words, btime, i64);
    parse_uci_go_value!(words, winc, i64);
    parse_uci_go_value!(words, binc, i64);
    parse_uci_go_value!(words, movestogo, u32);
    parse_uci_go_value!(words, depth, i32);
    parse_uci_go_value!(words, nodes, u64);
    parse_uci_go_value!(words, movetime, u64);
    parse_uci_go_value!(words, mate, u32);
    parse_uci_go_value!(words, perft, usize);

    let infinite = words.contains(&"infinite");
    let ponder = words.contains(&"ponder");

    if let Some(depth) = perft {
        if words.len() > 3 {
            return Err(UciParseError::Other(
                "Error in UCI go command: 'perft' specified along with other directives"
                    .to_string(),
            ));
        }
        return Ok(UciCommand::Perft(depth));
    }

    if infinite
        && (wtime.is_some()
            || btime.is_some()
            || winc.is_some()
            || binc.is_some()
            || movestogo.is_some()
            || depth.is_some()
            || nodes.is_some()
            || movetime.is_some()
            || mate.is_some())
    {
        return Err(UciParseError::Other(
            "Error in UCI go command: 'infinite' specified along with other search directives"
                .to_string(),
        ));
    }

    let searchmoves = words
        .iter()
        .position(|&w| w == "searchmoves")
        .map(|p| {
            words[p + 1..]
                .iter()
                .take_while(|w| looks_like_a_move(w))
                .map(|w| w.to_string())
                .collect::<Vec<_>>()
        })
        .filter(|moves| !moves.is_empty());

    // a bare `go` has no bound at all; treat it as an infinite search
    let infinite = infinite
        || (wtime.is_none()
            && btime.is_none()
            && movetime.is_none()
            && depth.is_none()
            && nodes.is_none()
            && mate.is_none()
            && !ponder);

    let mut mode = SearchMode::default();
    if let Some(depth) = depth {
        mode.max_depth = depth;
    }
    mode.move_time_ms = movetime.unwrap_or(0);
    mode.remaining_time_ms = [
        wtime.unwrap_or(0).max(0) as u64,
        btime.unwrap_or(0).max(0) as u64,
    ];
    mode.inc_ms = [
        winc.unwrap_or(0).max(0) as u64,
        binc.unwrap_or(0).max(0) as u64,
    ];
    mode.moves_to_go = movestogo.unwrap_or(0);
    mode.node_limit = nodes.unwrap_or(0);
    mode.mate_in = mate.unwrap_or(0);
    mode.infinite = infinite;
    mode.ponder = ponder;
    mode.restricted_moves = searchmoves;

    Ok(UciCommand::Go(mode))
}

fn looks_like_a_move(word: &str) -> bool {
    let bytes = word.as_bytes();
    (4..=5).contains(&bytes.len())
        && bytes[0].is_ascii_lowercase()
        && bytes[1].is_ascii_digit()
        && bytes[2].is_ascii_lowercase()
        && bytes[3].is_ascii_digit()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn go_with_clock_values() {
        let Ok(UciCommand::Go(mode)) =
            parse_uci_command("go wtime 60000 btime 58000 winc 1000 binc 1000 movestogo 20")
        else {
            panic!("expected a go command");
        };
        assert_eq!(mode.remaining_time_ms, [60_000, 58_000]);
        assert_eq!(mode.inc_ms, [1_000, 1_000]);
        assert_eq!(mode.moves_to_go, 20);
        assert!(!mode.infinite);
    }

    #[test]
    fn go_infinite_conflicts_are_rejected() {
        assert!(parse_uci_command("go infinite depth 5").is_err());
        assert!(parse_uci_command("go infinite").is_ok());
    }

    #[test]
    fn go_searchmoves_collects_moves() {
        let Ok(UciCommand::Go(mode)) = parse_uci_command("go depth 5 searchmoves e2e4 d2d4")
        else {
            panic!("expected a go command");
        };
        assert_eq!(
            mode.restricted_moves,
            Some(vec!["e2e4".to_string(), "d2d4".to_string()])
        );
    }

    #[test]
    fn position_with_moves_builds_history() {
        let Ok(UciCommand::Position { board, history }) =
            parse_uci_command("position startpos moves e2e4 e7e5 g1f3")
        else {
            panic!("expected a position command");
        };
        assert_eq!(history.len(), 3);
        assert_eq!(
            board.fen().split(' ').next().unwrap(),
            "rnbqkbnr/pppp1ppp/8/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R"
        );
    }

    #[test]
    fn illegal_moves_are_rejected() {
        assert!(parse_uci_command("position startpos moves e2e5").is_err());
    }

    #[test]
    fn castling_uses_the_king_target_notation() {
        let Ok(UciCommand::Position { board, .. }) = parse_uci_command(
            "position fen r3k2r/pppppppp/8/8/8/8/PPPPPPPP/R3K2R w KQkq - 0 1 moves e1g1",
        ) else {
            panic!("expected a position command");
        };
        assert_eq!(board.fen().split(' ').next().unwrap(), "r3k2r/pppppppp/8/8/8/8/PPPPPPPP/R4RK1");
    }
}
