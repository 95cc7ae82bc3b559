//! Integration tests for the async iteration loop.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};

use obs_scheduler::clock::ManualClock;
use obs_scheduler::config::IterationSettings;
use obs_scheduler::error::{SchedulerError, SchedulerResult};
use obs_scheduler::services::{IterationDriver, IterationHandler};
use obs_scheduler::state::{SchedulerModuleState, TimerState};

/// Plays back a fixed list of follow-up passes, one per call.
struct Script {
    clock: Arc<ManualClock>,
    plan: Vec<Option<(TimerState, u64)>>,
    seen: Vec<TimerState>,
    fail_on: Option<usize>,
}

impl Script {
    fn new(clock: Arc<ManualClock>, plan: Vec<Option<(TimerState, u64)>>) -> Self {
        Self {
            clock,
            plan,
            seen: Vec::new(),
            fail_on: None,
        }
    }
}

#[async_trait]
impl IterationHandler for Script {
    async fn iterate(
        &mut self,
        state: &mut SchedulerModuleState,
        pass: TimerState,
    ) -> SchedulerResult<()> {
        let index = self.seen.len();
        self.seen.push(pass);
        if self.fail_on == Some(index) {
            return Err(SchedulerError::Iteration("mount did not respond".to_string()));
        }
        // Each pass takes a simulated second.
        self.clock.advance(Duration::seconds(1));
        if let Some(Some((next, interval_ms))) = self.plan.get(index) {
            state.setup_next_iteration(*next, *interval_ms);
        }
        Ok(())
    }
}

fn module_state(clock: Arc<ManualClock>) -> SchedulerModuleState {
    SchedulerModuleState::new(clock, &IterationSettings::default())
}

fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 3, 20, 21, 0, 0).unwrap(),
    ))
}

#[tokio::test]
async fn test_runs_planned_passes_in_order() {
    let clock = clock();
    let mut state = module_state(clock.clone());
    state.setup_next_iteration(TimerState::Wakeup, 1);

    let handler = Script::new(
        clock.clone(),
        vec![
            Some((TimerState::Scheduler, 1)),
            Some((TimerState::JobCheck, 1)),
            Some((TimerState::Shutdown, 1)),
            None,
        ],
    );
    let mut driver = IterationDriver::new(state, handler);
    let passes = driver.run().await.unwrap();

    assert_eq!(passes, 4);
    assert_eq!(
        driver.handler().seen,
        vec![
            TimerState::Wakeup,
            TimerState::Scheduler,
            TimerState::JobCheck,
            TimerState::Shutdown
        ]
    );
    assert!(!driver.state().iteration_setup());
    assert!(!driver.state().timer().is_active());
}

#[tokio::test]
async fn test_slow_pass_shortens_next_wait() {
    let clock = clock();
    let mut state = module_state(clock.clone());
    state.setup_next_iteration(TimerState::Scheduler, 1);

    // A pass of one simulated second against a 1.1 s cadence leaves 100 ms.
    let handler = Script::new(
        clock.clone(),
        vec![Some((TimerState::JobCheck, 1100)), None],
    );
    let mut driver = IterationDriver::new(state, handler);

    assert_eq!(driver.run().await.unwrap(), 2);
    assert_eq!(driver.state().timer_interval_ms(), 100);
    assert_eq!(driver.state().timer_state(), TimerState::JobCheck);
}

#[tokio::test]
async fn test_nothing_planned_runs_nothing() {
    let clock = clock();
    let state = module_state(clock.clone());
    let mut driver = IterationDriver::new(state, Script::new(clock.clone(), vec![]));
    assert_eq!(driver.run().await.unwrap(), 0);
    assert!(driver.handler().seen.is_empty());

    let mut state = module_state(clock.clone());
    state.setup_next_iteration(TimerState::Nothing, 1);
    let mut driver = IterationDriver::new(state, Script::new(clock, vec![]));
    assert_eq!(driver.run().await.unwrap(), 0);
}

#[tokio::test]
async fn test_handler_error_stops_loop() {
    let clock = clock();
    let mut state = module_state(clock.clone());
    state.setup_next_iteration(TimerState::Scheduler, 1);

    let mut handler = Script::new(
        clock.clone(),
        vec![Some((TimerState::JobCheck, 1)), Some((TimerState::JobCheck, 1))],
    );
    handler.fail_on = Some(1);
    let mut driver = IterationDriver::new(state, handler);

    let err = driver.run().await.unwrap_err();
    assert!(matches!(err, SchedulerError::Iteration(_)));
    assert_eq!(driver.handler().seen.len(), 2);
    assert!(!driver.state().timer().is_active());

    let (state, handler) = driver.into_parts();
    assert_eq!(state.timer_state(), TimerState::JobCheck);
    assert_eq!(handler.seen, vec![TimerState::Scheduler, TimerState::JobCheck]);
}
