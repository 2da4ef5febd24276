use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::JoinHandle;

use crate::board::Board;
use crate::book::OpeningBook;
use crate::config::Config;
use crate::error::ConfigError;
use crate::moves::Move;
use crate::search::{SearchResult, Searcher, CHECKMATE, DRAW};
use crate::search_mode::SearchMode;
use crate::time_control::TimeControl;
use crate::transposition_table::TranspositionTable;
use crate::types::Color;

/// Where the engine's protocol output goes. The UCI layer implements this
/// over stdout; tests collect the lines.
pub trait ProtocolSink: Send + Sync {
    fn send_info(&self, line: &str);
    fn send_result(&self, best_move: Move, ponder_move: Move);
}

/// Swallows everything; handy for benches and tests.
pub struct NullSink;

impl ProtocolSink for NullSink {
    fn send_info(&self, _line: &str) {}
    fn send_result(&self, _best_move: Move, _ponder_move: Move) {}
}

struct SharedState {
    last_result: Mutex<Option<SearchResult>>,
    searching: AtomicBool,
    /// The running search is a ponder search whose result must be held back.
    ponder_mode: AtomicBool,
    /// A ponder search finished; its result waits for ponderhit or stop.
    ponder_pending: AtomicBool,
}

/// Owns the transposition table and a single search worker. Control methods
/// run on the caller thread; exactly one search is active at a time, and
/// cancellation is cooperative through the shared stop flag.
pub struct Engine {
    config: Config,
    tt: Arc<Mutex<TranspositionTable>>,
    sink: Arc<dyn ProtocolSink>,
    book: Option<Box<dyn OpeningBook>>,
    had_book_move: bool,
    game_history: Vec<u64>,
    stop: Arc<AtomicBool>,
    clock: Arc<TimeControl>,
    shared: Arc<SharedState>,
    worker: Option<JoinHandle<()>>,
    current_mode: Option<SearchMode>,
    current_color: Color,
}

impl Engine {
    pub fn new(config: Config, sink: Arc<dyn ProtocolSink>) -> Result<Self, ConfigError> {
        config.validate()?;
        let tt = TranspositionTable::new(config.hash_size_mb)?;
        Ok(Self {
            config,
            tt: Arc::new(Mutex::new(tt)),
            sink,
            book: None,
            had_book_move: false,
            game_history: Vec::new(),
            stop: Arc::new(AtomicBool::new(false)),
            clock: Arc::new(TimeControl::new()),
            shared: Arc::new(SharedState {
                last_result: Mutex::new(None),
                searching: AtomicBool::new(false),
                ponder_mode: AtomicBool::new(false),
                ponder_pending: AtomicBool::new(false),
            }),
            worker: None,
            current_mode: None,
            current_color: Color::White,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Applies one named option; `HASH_SIZE` also rebuilds the table.
    pub fn set_option(&mut self, name: &str, value: &str) -> Result<(), ConfigError> {
        self.config.set_option(name, value)?;
        if name.eq_ignore_ascii_case("HASH_SIZE") {
            self.set_hash_size(self.config.hash_size_mb)?;
        }
        Ok(())
    }

    /// Rebuilds the table at the given size, dropping its contents.
    pub fn set_hash_size(&mut self, size_mb: usize) -> Result<(), ConfigError> {
        if self.is_searching() {
            log::error!("cannot resize the hash table during a search");
            return Ok(());
        }
        *self.tt.lock().unwrap() = TranspositionTable::new(size_mb)?;
        self.config.hash_size_mb = size_mb;
        Ok(())
    }

    pub fn set_book(&mut self, book: Box<dyn OpeningBook>) {
        self.book = Some(book);
    }

    /// Zobrist keys of every position of the game before the one being
    /// searched, oldest first; repetition detection needs them.
    pub fn set_game_history(&mut self, history: Vec<u64>) {
        self.game_history = history;
    }

    pub fn new_game(&mut self) {
        if self.is_searching() {
            log::error!("ucinewgame during a search is ignored");
            return;
        }
        self.tt.lock().unwrap().clear();
        self.game_history.clear();
        self.had_book_move = false;
    }

    pub fn is_searching(&self) -> bool {
        self.shared.searching.load(Ordering::Acquire)
    }

    pub fn last_result(&self) -> Option<SearchResult> {
        self.shared.last_result.lock().unwrap().clone()
    }

    /// Starts a search on a worker thread and returns once the worker is
    /// initialized. A second start while one is running is logged and
    /// ignored.
    pub fn start_search(&mut self, board: &Board, mode: SearchMode) {
        if self.is_searching() {
            log::error!("search already running - can only be started once");
            return;
        }
        // reap a finished worker from the previous search
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }

        let mode = mode.normalized();
        self.current_color = board.current_player();

        // the book answers time-controlled searches without any tree
        if let Some(result) = self.try_book_move(board, &mode) {
            *self.shared.last_result.lock().unwrap() = Some(result.clone());
            self.sink.send_result(result.best_move, result.ponder_move);
            return;
        }

        self.stop.store(false, Ordering::Release);
        self.shared.searching.store(true, Ordering::Release);
        self.shared.ponder_mode.store(mode.ponder, Ordering::Release);
        self.shared.ponder_pending.store(false, Ordering::Release);

        let had_book_move = std::mem::take(&mut self.had_book_move);
        let searcher_board = *board;
        let game_history = self.game_history.clone();
        let config = self.config.clone();
        let worker_mode = mode.clone();
        let stop = Arc::clone(&self.stop);
        let clock = Arc::clone(&self.clock);
        let sink = Arc::clone(&self.sink);
        let tt = Arc::clone(&self.tt);
        let shared = Arc::clone(&self.shared);

        let (ready_tx, ready_rx) = mpsc::channel();
        let thread_name = format!(
            "engine: {:?}{}",
            self.current_color,
            if mode.ponder { " (pondering)" } else { "" }
        );
        let handle = std::thread::Builder::new()
            .name(thread_name)
            .spawn(move || {
                let mut searcher = Searcher::new(
                    searcher_board,
                    game_history,
                    config,
                    worker_mode,
                    stop,
                    clock,
                    Arc::clone(&sink),
                    had_book_move,
                );
                // scratch state is installed; the caller may proceed
                let _ = ready_tx.send(());

                let mut result = {
                    let mut tt = tt.lock().unwrap();
                    searcher.run(&mut tt)
                };

                // a best move that is not legal in the input position is an
                // internal invariant violation; surface it but keep going
                if result.best_move.is_some()
                    && !searcher_board.legal_move_list().contains(&result.best_move)
                {
                    log::error!(
                        "search returned illegal best move {} in {}",
                        result.best_move,
                        searcher_board.fen()
                    );
                    result.valid = false;
                }

                *shared.last_result.lock().unwrap() = Some(result.clone());
                if shared.ponder_mode.load(Ordering::Acquire) {
                    // hold the result until ponderhit or stop arrives
                    log::info!("ponder search finished, waiting for ponderhit");
                    shared.ponder_pending.store(true, Ordering::Release);
                } else {
                    sink.send_result(result.best_move, result.ponder_move);
                }
                shared.searching.store(false, Ordering::Release);
            })
            .expect("failed to spawn search thread");

        // wait until the worker reports ready
        let _ = ready_rx.recv();
        self.worker = Some(handle);
        self.current_mode = Some(mode);
    }

    /// Signals the worker to stop and waits for it. The best move found so
    /// far is delivered; stopping an already-stopped engine does nothing.
    pub fn stop_search(&mut self) {
        if self.worker.is_none() {
            log::warn!("stop requested but no search is running");
            return;
        }

        let was_ponder = self
            .current_mode
            .as_ref()
            .map(|m| m.ponder)
            .unwrap_or(false);
        if was_ponder {
            // ponder miss: the result must still go out once the worker ends
            self.shared.ponder_mode.store(false, Ordering::Release);
        }

        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }

        if self.shared.ponder_pending.swap(false, Ordering::AcqRel) {
            if let Some(result) = self.last_result() {
                log::info!("pondering stopped after the search ended, sending held result");
                self.sink.send_result(result.best_move, result.ponder_move);
            }
        }
        self.current_mode = None;
        log::debug!("search thread stopped");
    }

    /// The predicted move was played. A still-running ponder search switches
    /// to the clock; a finished one delivers its held result.
    pub fn ponder_hit(&mut self) {
        match self.current_mode.as_mut() {
            None => {
                log::warn!("ponderhit with no search");
                return;
            }
            Some(mode) if !mode.ponder => {
                log::warn!("ponderhit while not pondering");
                return;
            }
            Some(mode) => mode.ponder = false,
        }
        let mode = self.current_mode.clone().unwrap();

        if self.is_searching() {
            log::info!("ponderhit, continuing under time control");
            self.shared.ponder_mode.store(false, Ordering::Release);
            self.clock.ponder_hit(&mode, self.current_color);
        } else if self.shared.ponder_pending.swap(false, Ordering::AcqRel) {
            if let Some(result) = self.last_result() {
                log::info!("ponderhit after the search ended, sending held result");
                self.sink.send_result(result.best_move, result.ponder_move);
            }
        }
    }

    /// Blocks until the current search ends on its own.
    pub fn wait_while_searching(&mut self) {
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }

    fn try_book_move(&mut self, board: &Board, mode: &SearchMode) -> Option<SearchResult> {
        if !self.config.use_book || mode.ponder || mode.perft || !mode.is_time_control() {
            return None;
        }
        let book = self.book.as_mut()?;
        let book_move = book.probe(&board.fen())?;
        if !board.legal_move_list().contains(&book_move) {
            log::warn!("book suggested illegal move {book_move}, ignoring");
            return None;
        }
        log::info!("book move {book_move}");
        self.had_book_move = true;
        Some(SearchResult {
            best_move: book_move,
            ..Default::default()
        })
    }

    /// Score for a position with no legal moves, used by callers that probe
    /// game state without searching.
    pub fn terminal_value(board: &Board) -> Option<i32> {
        if board.has_legal_move() {
            None
        } else if board.in_check() {
            Some(-CHECKMATE)
        } else {
            Some(DRAW)
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}
