//! Run-state bookkeeping for the orchestrator.
//!
//! One mutex guards the submitted/completed counters together with the
//! `initialized` flag, so a task finishing can never observe a half-seeded
//! crawl as complete.

use std::time::Instant;

/// Mutable crawl-run state, owned by the orchestrator.
#[derive(Debug, Default)]
pub(crate) struct RunState {
    /// True once every surviving seed has been submitted.
    pub initialized: bool,
    pub tasks_submitted: u64,
    pub tasks_completed: u64,
    /// Completion must be signalled exactly once per run.
    pub completion_fired: bool,
    pub start_time: Option<Instant>,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the crawl has drained: all submitted work finished and the
    /// seed set fully enqueued.
    pub fn is_drained(&self) -> bool {
        self.initialized && self.tasks_completed == self.tasks_submitted
    }

    pub fn remaining(&self) -> u64 {
        self.tasks_submitted.saturating_sub(self.tasks_completed)
    }

    pub fn percent_done(&self) -> u8 {
        if self.tasks_submitted == 0 {
            100
        } else {
            (self.tasks_completed * 100 / self.tasks_submitted) as u8
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_drained_before_initialization() {
        let state = RunState::new();
        // submitted == completed == 0, but seeding has not finished.
        assert!(!state.is_drained());
    }

    #[test]
    fn drained_once_initialized_and_counts_match() {
        let state = RunState {
            initialized: true,
            tasks_submitted: 3,
            tasks_completed: 3,
            ..RunState::new()
        };
        assert!(state.is_drained());
        assert_eq!(state.percent_done(), 100);
        assert_eq!(state.remaining(), 0);
    }
}
