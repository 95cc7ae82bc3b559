//! Async scheduler loop.
//!
//! [`IterationDriver`] sleeps until the iteration timer held in
//! [`SchedulerModuleState`] fires, then hands the pass to an
//! [`IterationHandler`]. The handler plans the following pass with
//! `setup_next_iteration`; a pass that plans nothing ends the loop.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::SchedulerResult;
use crate::state::{SchedulerModuleState, TimerState};

/// One scheduler pass.
#[async_trait]
pub trait IterationHandler: Send {
    /// Run the pass planned as `pass`.
    ///
    /// Call [`SchedulerModuleState::setup_next_iteration`] to keep the loop
    /// going. The countdown to the next pass started when this pass began.
    async fn iterate(
        &mut self,
        state: &mut SchedulerModuleState,
        pass: TimerState,
    ) -> SchedulerResult<()>;
}

/// Drives an [`IterationHandler`] at the cadence of the iteration timer.
pub struct IterationDriver<H> {
    state: SchedulerModuleState,
    handler: H,
}

impl<H: IterationHandler> IterationDriver<H> {
    pub fn new(state: SchedulerModuleState, handler: H) -> Self {
        Self { state, handler }
    }

    pub fn state(&self) -> &SchedulerModuleState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut SchedulerModuleState {
        &mut self.state
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn into_parts(self) -> (SchedulerModuleState, H) {
        (self.state, self.handler)
    }

    /// Run passes until one does not plan another, or plans nothing.
    ///
    /// Returns the number of passes run. A handler error stops the loop and
    /// is returned as is.
    pub async fn run(&mut self) -> SchedulerResult<u64> {
        let mut passes = 0u64;

        while self.state.iteration_setup() && self.state.timer_state() != TimerState::Nothing {
            let now = self.state.now();
            if !self.state.timer().is_active() {
                self.state.timer_mut().start(now);
            }
            let delay_ms = self.state.timer().remaining_ms(now);
            if delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }

            let pass = self.state.timer_state();
            let pass_start = self.state.now();
            {
                let timer = self.state.timer_mut();
                timer.set_iteration_setup(false);
                timer.start(pass_start);
            }

            log::debug!("Scheduler pass {} ({:?})", passes + 1, pass);
            if let Err(e) = self.handler.iterate(&mut self.state, pass).await {
                log::warn!("Scheduler pass {:?} failed: {}", pass, e);
                self.state.timer_mut().stop();
                return Err(e);
            }
            passes += 1;
        }

        self.state.timer_mut().stop();
        log::debug!("Scheduler loop stopped after {} passes", passes);
        Ok(passes)
    }
}
