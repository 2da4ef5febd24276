use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::time::Instant;

use once_cell::sync::Lazy;

use crate::search_mode::SearchMode;
use crate::types::Color;

static PROCESS_EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

#[inline]
fn now_ms() -> u64 {
    PROCESS_EPOCH.elapsed().as_millis() as u64
}

/// Safety margin subtracted from the remaining time, so low-clock games never
/// flag on protocol latency.
const OVERHEAD_MS: u64 = 1000;
/// Horizon assumed when the client gives no moves-to-go.
const DEFAULT_MOVES_TO_GO: u64 = 40;
/// Below this hard budget, shrink instead of risking an overrun.
const EMERGENCY_BUDGET_MS: u64 = 100;
const EMERGENCY_FACTOR: f64 = 0.9;

/// Converts a time-control description into soft and hard wall-clock limits
/// and answers the search's polling. All fields are atomics: the worker polls
/// while the caller thread may re-arm the clock on a ponder hit.
pub struct TimeControl {
    timed: AtomicBool,
    pondering: AtomicBool,
    fixed_move_time: AtomicBool,
    start_ms: AtomicU64,
    soft_ms: AtomicU64,
    hard_ms: AtomicU64,
    extra_ms: AtomicI64,
}

impl TimeControl {
    pub fn new() -> Self {
        Self {
            timed: AtomicBool::new(false),
            pondering: AtomicBool::new(false),
            fixed_move_time: AtomicBool::new(false),
            start_ms: AtomicU64::new(0),
            soft_ms: AtomicU64::new(0),
            hard_ms: AtomicU64::new(0),
            extra_ms: AtomicI64::new(0),
        }
    }

    /// Arms the clock for a new search.
    pub fn start(&self, mode: &SearchMode, us: Color) {
        self.start_ms.store(now_ms(), Ordering::Relaxed);
        self.extra_ms.store(0, Ordering::Relaxed);
        self.pondering.store(mode.ponder, Ordering::Relaxed);
        self.timed.store(mode.is_time_control(), Ordering::Relaxed);
        self.fixed_move_time
            .store(mode.move_time_ms > 0, Ordering::Relaxed);
        if mode.is_time_control() {
            self.configure_limits(mode, us);
        } else {
            self.soft_ms.store(0, Ordering::Relaxed);
            self.hard_ms.store(0, Ordering::Relaxed);
        }
    }

    /// The ponder move was played: restart the clock and enforce limits from
    /// now on.
    pub fn ponder_hit(&self, mode: &SearchMode, us: Color) {
        self.start_ms.store(now_ms(), Ordering::Relaxed);
        self.pondering.store(false, Ordering::Relaxed);
        if mode.is_time_control() {
            self.configure_limits(mode, us);
        }
    }

    fn configure_limits(&self, mode: &SearchMode, us: Color) {
        let hard;
        let soft;
        if mode.move_time_ms > 0 {
            hard = mode.move_time_ms;
            soft = hard;
        } else {
            let mut time_left = mode.remaining_time(us).saturating_sub(OVERHEAD_MS);
            let moves_left = if mode.moves_to_go > 0 {
                mode.moves_to_go as u64
            } else {
                DEFAULT_MOVES_TO_GO
            };
            // assume the increment keeps paying out over the horizon
            time_left += DEFAULT_MOVES_TO_GO * mode.increment(us);
            hard = time_left / moves_left;
            soft = (hard as f64 * 0.8) as u64;
        }
        self.hard_ms.store(hard, Ordering::Relaxed);
        self.soft_ms.store(soft, Ordering::Relaxed);

        if hard < EMERGENCY_BUDGET_MS {
            self.add_extra_time(EMERGENCY_FACTOR);
        }
    }

    /// Accumulates `hard * (factor - 1)` of extra budget; factors below 1
    /// shrink it. Ignored when a fixed per-move budget was given.
    pub fn add_extra_time(&self, factor: f64) {
        if self.fixed_move_time.load(Ordering::Relaxed) {
            return;
        }
        let hard = self.hard_ms.load(Ordering::Relaxed) as f64;
        let extra = (hard * (factor - 1.0)) as i64;
        self.extra_ms.fetch_add(extra, Ordering::Relaxed);
        log::debug!(
            "time extension factor {factor}: {extra} ms extra, total {} ms",
            self.extra_ms.load(Ordering::Relaxed)
        );
    }

    pub fn elapsed_ms(&self) -> u64 {
        now_ms().saturating_sub(self.start_ms.load(Ordering::Relaxed))
    }

    fn limits_apply(&self) -> bool {
        self.timed.load(Ordering::Relaxed) && !self.pondering.load(Ordering::Relaxed)
    }

    /// Polled between iterations: is starting another depth pointless?
    pub fn soft_reached(&self) -> bool {
        if !self.limits_apply() {
            return false;
        }
        let soft = self.soft_ms.load(Ordering::Relaxed) as i64;
        let extra = self.extra_ms.load(Ordering::Relaxed);
        self.elapsed_ms() as i64 >= soft + (extra as f64 * 0.8) as i64
    }

    /// Polled inside the search: stop mid-iteration?
    pub fn hard_reached(&self) -> bool {
        if !self.limits_apply() {
            return false;
        }
        let hard = self.hard_ms.load(Ordering::Relaxed) as i64;
        let extra = self.extra_ms.load(Ordering::Relaxed);
        self.elapsed_ms() as i64 >= hard + extra
    }

    pub fn hard_limit_ms(&self) -> u64 {
        self.hard_ms.load(Ordering::Relaxed)
    }

    pub fn soft_limit_ms(&self) -> u64 {
        self.soft_ms.load(Ordering::Relaxed)
    }
}

impl Default for TimeControl {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_move_time_sets_both_limits() {
        let clock = TimeControl::new();
        clock.start(&SearchMode::move_time(750), Color::White);
        assert_eq!(clock.hard_limit_ms(), 750);
        assert_eq!(clock.soft_limit_ms(), 750);
        // fixed budgets are never extended
        clock.add_extra_time(2.0);
        assert!(!clock.hard_reached());
    }

    #[test]
    fn remaining_time_derivation() {
        let clock = TimeControl::new();
        let mode = SearchMode {
            remaining_time_ms: [41_000, 41_000],
            inc_ms: [100, 100],
            moves_to_go: 0,
            ..Default::default()
        };
        clock.start(&mode, Color::White);
        // (41000 - 1000 + 40 * 100) / 40
        assert_eq!(clock.hard_limit_ms(), 1100);
        assert_eq!(clock.soft_limit_ms(), 880);
    }

    #[test]
    fn moves_to_go_shortens_the_horizon() {
        let clock = TimeControl::new();
        let mode = SearchMode {
            remaining_time_ms: [21_000, 21_000],
            moves_to_go: 10,
            ..Default::default()
        };
        clock.start(&mode, Color::Black);
        assert_eq!(clock.hard_limit_ms(), 2000);
    }

    #[test]
    fn non_time_modes_never_report_reached() {
        let clock = TimeControl::new();
        clock.start(&SearchMode::infinite(), Color::White);
        assert!(!clock.soft_reached());
        assert!(!clock.hard_reached());

        clock.start(&SearchMode::depth(6), Color::White);
        assert!(!clock.soft_reached());
        assert!(!clock.hard_reached());
    }

    #[test]
    fn pondering_suspends_limits_until_hit() {
        let clock = TimeControl::new();
        let mode = SearchMode {
            remaining_time_ms: [1_500, 1_500],
            ponder: true,
            ..Default::default()
        };
        clock.start(&mode, Color::White);
        assert!(!clock.hard_reached(), "limits must not apply while pondering");
        clock.ponder_hit(&mode, Color::White);
        // limits now apply; with a ~12ms hard budget the emergency shrink
        // also kicked in
        assert!(clock.hard_limit_ms() < EMERGENCY_BUDGET_MS);
        std::thread::sleep(std::time::Duration::from_millis(30));
        assert!(clock.hard_reached());
    }

    #[test]
    fn extensions_accumulate() {
        let clock = TimeControl::new();
        let mode = SearchMode {
            remaining_time_ms: [41_000, 41_000],
            ..Default::default()
        };
        clock.start(&mode, Color::White);
        let hard = clock.hard_limit_ms() as i64;
        clock.add_extra_time(1.5);
        clock.add_extra_time(1.3);
        let expected = (hard as f64 * 0.5) as i64 + (hard as f64 * 0.3) as i64;
        assert_eq!(clock.extra_ms.load(Ordering::Relaxed), expected);
    }
}
