use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What the next scheduler pass does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerState {
    /// Wake up from a preemptive shutdown.
    Wakeup,
    /// Evaluate and pick jobs.
    Scheduler,
    /// Check the running job.
    JobCheck,
    /// Run the shutdown procedure.
    Shutdown,
    /// No pass is planned.
    #[default]
    Nothing,
}

/// Countdown to the next scheduler pass.
///
/// The timer is measured against an injected clock: it stores when the
/// countdown started and for how long, and answers elapsed/remaining queries
/// for a given instant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IterationTimer {
    state: TimerState,
    interval_ms: u64,
    started_at: Option<DateTime<Utc>>,
    iteration_setup: bool,
}

impl IterationTimer {
    pub fn state(&self) -> TimerState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: TimerState) {
        self.state = state;
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    pub(crate) fn set_interval_ms(&mut self, interval_ms: u64) {
        self.interval_ms = interval_ms;
    }

    /// Whether a countdown is running.
    pub fn is_active(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn start(&mut self, now: DateTime<Utc>) {
        self.started_at = Some(now);
    }

    pub fn stop(&mut self) {
        self.started_at = None;
    }

    /// Milliseconds since the countdown started; zero when stopped.
    pub fn elapsed_ms(&self, now: DateTime<Utc>) -> u64 {
        self.started_at
            .map(|start| (now - start).num_milliseconds().max(0) as u64)
            .unwrap_or(0)
    }

    /// Milliseconds until the countdown fires; the full interval when stopped.
    pub fn remaining_ms(&self, now: DateTime<Utc>) -> u64 {
        self.interval_ms.saturating_sub(self.elapsed_ms(now))
    }

    /// Whether the next pass has been planned since the last one ran.
    pub fn iteration_setup(&self) -> bool {
        self.iteration_setup
    }

    pub fn set_iteration_setup(&mut self, value: bool) {
        self.iteration_setup = value;
    }
}
