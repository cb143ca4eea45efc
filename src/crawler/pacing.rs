//! Anti-blocking cadence for detail workers
//!
//! Each worker owns a `Cadence`. After every fetch it decides whether to pause
//! briefly, pause for a long time, or replace the session. The decision is a
//! pure function of the worker's counters so it can be tested without sleeping.

use crate::config::{PacingConfig, PauseRange};
use std::time::Duration;

/// Which pause follows a fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseKind {
    None,
    Short,
    Long,
}

/// What a worker does between two fetches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AfterFetch {
    pub pause: PauseKind,
    pub rotate_session: bool,
}

impl AfterFetch {
    pub const IDLE: AfterFetch = AfterFetch {
        pause: PauseKind::None,
        rotate_session: false,
    };
}

/// Per-worker fetch counters
#[derive(Debug, Clone)]
pub struct Cadence {
    long_pause_every: u32,
    rotate_session_every: u32,
    successes: u32,
    fetches: u32,
}

impl Cadence {
    pub fn new(long_pause_every: u32, rotate_session_every: u32) -> Self {
        Self {
            long_pause_every: long_pause_every.max(1),
            rotate_session_every: rotate_session_every.max(1),
            successes: 0,
            fetches: 0,
        }
    }

    /// Records one finished fetch and returns what to do before the next one
    ///
    /// # Arguments
    ///
    /// * `success` - Whether the fetch produced a record
    /// * `more_remaining` - Whether another item is waiting; when false
    ///   nothing is paused or rotated
    pub fn record(&mut self, success: bool, more_remaining: bool) -> AfterFetch {
        self.fetches += 1;
        if success {
            self.successes += 1;
        }

        if !more_remaining {
            return AfterFetch::IDLE;
        }

        let pause = if success && self.successes % self.long_pause_every == 0 {
            PauseKind::Long
        } else {
            PauseKind::Short
        };

        AfterFetch {
            pause,
            rotate_session: self.fetches % self.rotate_session_every == 0,
        }
    }

    pub fn fetches(&self) -> u32 {
        self.fetches
    }

    pub fn successes(&self) -> u32 {
        self.successes
    }
}

/// Pause windows applied by workers
#[derive(Debug, Clone, Copy)]
pub struct PauseSchedule {
    pub short: PauseRange,
    pub long: PauseRange,
}

impl PauseSchedule {
    pub fn from_config(config: &PacingConfig) -> Self {
        Self {
            short: config.short_pause_ms,
            long: config.long_pause_ms,
        }
    }

    /// Duration to sleep for a pause kind
    pub fn duration(&self, kind: PauseKind) -> Duration {
        match kind {
            PauseKind::None => Duration::ZERO,
            PauseKind::Short => self.short.sample(),
            PauseKind::Long => self.long.sample(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_pause_between_items() {
        let mut cadence = Cadence::new(50, 20);
        let action = cadence.record(true, true);
        assert_eq!(action.pause, PauseKind::Short);
        assert!(!action.rotate_session);
    }

    #[test]
    fn test_long_pause_every_k_successes() {
        let mut cadence = Cadence::new(3, 100);
        let pauses: Vec<PauseKind> = (0..6).map(|_| cadence.record(true, true).pause).collect();
        assert_eq!(
            pauses,
            vec![
                PauseKind::Short,
                PauseKind::Short,
                PauseKind::Long,
                PauseKind::Short,
                PauseKind::Short,
                PauseKind::Long
            ]
        );
    }

    #[test]
    fn test_failures_do_not_count_towards_long_pause() {
        let mut cadence = Cadence::new(2, 100);
        assert_eq!(cadence.record(true, true).pause, PauseKind::Short);
        assert_eq!(cadence.record(false, true).pause, PauseKind::Short);
        assert_eq!(cadence.record(true, true).pause, PauseKind::Long);
        assert_eq!(cadence.successes(), 2);
        assert_eq!(cadence.fetches(), 3);
    }

    #[test]
    fn test_rotation_counts_all_fetches() {
        let mut cadence = Cadence::new(100, 2);
        assert!(!cadence.record(true, true).rotate_session);
        assert!(cadence.record(false, true).rotate_session);
        assert!(!cadence.record(true, true).rotate_session);
        assert!(cadence.record(true, true).rotate_session);
    }

    #[test]
    fn test_nothing_after_final_item() {
        let mut cadence = Cadence::new(1, 1);
        assert_eq!(cadence.record(true, false), AfterFetch::IDLE);
        assert_eq!(cadence.fetches(), 1);
    }

    #[test]
    fn test_pause_schedule_durations() {
        let schedule = PauseSchedule {
            short: PauseRange::new(5, 5),
            long: PauseRange::new(9, 9),
        };
        assert_eq!(schedule.duration(PauseKind::None), Duration::ZERO);
        assert_eq!(schedule.duration(PauseKind::Short), Duration::from_millis(5));
        assert_eq!(schedule.duration(PauseKind::Long), Duration::from_millis(9));
    }
}
