//! Process-wide scheduler state.
//!
//! [`SchedulerModuleState`] tracks the orthogonal sub-states of the scheduler
//! (run state, startup and shutdown procedures, park-wait, Ekos and INDI
//! connection, iteration timer), bounded failure counters per subsystem, the
//! preemptive shutdown wake time and the equipment profile list.
//!
//! Every setter publishes a [`ModuleStateEvent`] on a broadcast channel, and
//! only when the value actually changes.

mod failures;
mod timer;

pub use failures::{FailureCounters, Subsystem};
pub use timer::{IterationTimer, TimerState};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::astro::WeatherStatus;
use crate::clock::Clock;
use crate::config::IterationSettings;

/// Name of the profile that is always available, listed first.
pub const DEFAULT_PROFILE: &str = "Default";

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Run state of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    #[default]
    Idle,
    Startup,
    Running,
    Paused,
    Shutdown,
    Aborted,
    Loading,
}

/// Progress of the observatory startup procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartupState {
    #[default]
    Idle,
    Script,
    UnparkDome,
    UnparkingDome,
    UnparkMount,
    UnparkingMount,
    UnparkCap,
    UnparkingCap,
    Error,
    Complete,
}

/// Progress of the observatory shutdown procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownState {
    #[default]
    Idle,
    ParkCap,
    ParkingCap,
    ParkMount,
    ParkingMount,
    ParkDome,
    ParkingDome,
    Script,
    ScriptRunning,
    Error,
    Complete,
}

/// Progress of a standalone park or unpark request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParkWaitState {
    #[default]
    Idle,
    Park,
    Parking,
    Parked,
    Unpark,
    Unparking,
    Unparked,
    Error,
}

/// Connection state of the Ekos session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EkosState {
    #[default]
    Idle,
    Starting,
    Stopping,
    Ready,
}

/// Connection state of the INDI devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndiState {
    #[default]
    Idle,
    Connecting,
    Disconnecting,
    PropertyCheck,
    Ready,
}

/// What to do with a job that aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorHandlingStrategy {
    /// Retry once the other jobs are done.
    #[default]
    RestartAfterTermination,
    /// Retry right away, after the configured delay.
    RestartImmediately,
    /// Leave it aborted.
    DontRestart,
}

/// Change notification published by [`SchedulerModuleState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleStateEvent {
    SchedulerStateChanged(SchedulerState),
    StartupStateChanged(StartupState),
    ShutdownStateChanged(ShutdownState),
    ParkWaitStateChanged(ParkWaitState),
    EkosStateChanged(EkosState),
    IndiStateChanged(IndiState),
    TimerStateChanged(TimerState),
    CurrentPositionChanged(Option<usize>),
    WeatherStatusChanged(WeatherStatus),
    ProfilesChanged(Vec<String>),
    CurrentProfileChanged(String),
}

/// Scheduler-wide state machine.
pub struct SchedulerModuleState {
    clock: Arc<dyn Clock>,
    events: broadcast::Sender<ModuleStateEvent>,

    scheduler_state: SchedulerState,
    startup_state: StartupState,
    shutdown_state: ShutdownState,
    park_wait_state: ParkWaitState,
    ekos_state: EkosState,
    indi_state: IndiState,

    timer: IterationTimer,
    update_period_ms: u64,
    failures: FailureCounters,

    preemptive_shutdown_wakeup_time: Option<DateTime<Utc>>,
    current_position: Option<usize>,
    error_handling: ErrorHandlingStrategy,
    error_handling_delay: Duration,
    weather_status: WeatherStatus,

    profiles: Vec<String>,
    current_profile: String,

    current_operation_started: Option<DateTime<Utc>>,
    restart_guiding: Option<(DateTime<Utc>, Duration)>,
}

impl std::fmt::Debug for SchedulerModuleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerModuleState")
            .field("scheduler_state", &self.scheduler_state)
            .field("startup_state", &self.startup_state)
            .field("shutdown_state", &self.shutdown_state)
            .field("park_wait_state", &self.park_wait_state)
            .field("ekos_state", &self.ekos_state)
            .field("indi_state", &self.indi_state)
            .field("timer", &self.timer)
            .field("failures", &self.failures)
            .field("current_profile", &self.current_profile)
            .finish_non_exhaustive()
    }
}

impl SchedulerModuleState {
    pub fn new(clock: Arc<dyn Clock>, settings: &IterationSettings) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            clock,
            events,
            scheduler_state: SchedulerState::Idle,
            startup_state: StartupState::Idle,
            shutdown_state: ShutdownState::Idle,
            park_wait_state: ParkWaitState::Idle,
            ekos_state: EkosState::Idle,
            indi_state: IndiState::Idle,
            timer: IterationTimer::default(),
            update_period_ms: settings.update_period_ms,
            failures: FailureCounters::new(settings.max_failure_attempts),
            preemptive_shutdown_wakeup_time: None,
            current_position: None,
            error_handling: ErrorHandlingStrategy::default(),
            error_handling_delay: Duration::zero(),
            weather_status: WeatherStatus::Idle,
            profiles: vec![DEFAULT_PROFILE.to_string()],
            current_profile: DEFAULT_PROFILE.to_string(),
            current_operation_started: None,
            restart_guiding: None,
        }
    }

    /// Subscribe to change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<ModuleStateEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: ModuleStateEvent) {
        // No subscriber is not an error.
        let _ = self.events.send(event);
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // ----- Sub-states -----

    pub fn scheduler_state(&self) -> SchedulerState {
        self.scheduler_state
    }

    pub fn set_scheduler_state(&mut self, state: SchedulerState) {
        if self.scheduler_state != state {
            log::info!(
                "Scheduler state changed from {:?} to {:?}",
                self.scheduler_state,
                state
            );
            self.scheduler_state = state;
            self.emit(ModuleStateEvent::SchedulerStateChanged(state));
        }
    }

    pub fn startup_state(&self) -> StartupState {
        self.startup_state
    }

    pub fn set_startup_state(&mut self, state: StartupState) {
        if self.startup_state != state {
            self.startup_state = state;
            self.emit(ModuleStateEvent::StartupStateChanged(state));
        }
    }

    pub fn shutdown_state(&self) -> ShutdownState {
        self.shutdown_state
    }

    pub fn set_shutdown_state(&mut self, state: ShutdownState) {
        if self.shutdown_state != state {
            self.shutdown_state = state;
            self.emit(ModuleStateEvent::ShutdownStateChanged(state));
        }
    }

    pub fn park_wait_state(&self) -> ParkWaitState {
        self.park_wait_state
    }

    pub fn set_park_wait_state(&mut self, state: ParkWaitState) {
        if self.park_wait_state != state {
            self.park_wait_state = state;
            self.emit(ModuleStateEvent::ParkWaitStateChanged(state));
        }
    }

    pub fn ekos_state(&self) -> EkosState {
        self.ekos_state
    }

    pub fn set_ekos_state(&mut self, state: EkosState) {
        if self.ekos_state != state {
            log::debug!("Ekos state changed from {:?} to {:?}", self.ekos_state, state);
            self.ekos_state = state;
            self.emit(ModuleStateEvent::EkosStateChanged(state));
        }
    }

    pub fn indi_state(&self) -> IndiState {
        self.indi_state
    }

    pub fn set_indi_state(&mut self, state: IndiState) {
        if self.indi_state != state {
            log::debug!("INDI state changed from {:?} to {:?}", self.indi_state, state);
            self.indi_state = state;
            self.emit(ModuleStateEvent::IndiStateChanged(state));
        }
    }

    pub fn current_position(&self) -> Option<usize> {
        self.current_position
    }

    /// Set the index of the job the scheduler is looking at.
    pub fn set_current_position(&mut self, position: Option<usize>) {
        if self.current_position != position {
            self.current_position = position;
            self.emit(ModuleStateEvent::CurrentPositionChanged(position));
        }
    }

    pub fn weather_status(&self) -> WeatherStatus {
        self.weather_status
    }

    pub fn set_weather_status(&mut self, status: WeatherStatus) {
        if self.weather_status != status {
            self.weather_status = status;
            self.emit(ModuleStateEvent::WeatherStatusChanged(status));
        }
    }

    pub fn error_handling_strategy(&self) -> ErrorHandlingStrategy {
        self.error_handling
    }

    /// Delay before an aborted job is retried.
    pub fn error_handling_delay(&self) -> Duration {
        self.error_handling_delay
    }

    pub fn set_error_handling_strategy(&mut self, strategy: ErrorHandlingStrategy, delay: Duration) {
        self.error_handling = strategy;
        self.error_handling_delay = delay.max(Duration::zero());
    }

    // ----- Failure counters -----

    pub fn max_failure_attempts(&self) -> u32 {
        self.failures.max_attempts()
    }

    pub fn failure_counters(&self) -> &FailureCounters {
        &self.failures
    }

    /// Count a failure of `subsystem`; returns whether a retry is allowed.
    pub fn increase_failure_count(&mut self, subsystem: Subsystem) -> bool {
        let allowed = self.failures.increase(subsystem);
        if !allowed {
            log::warn!(
                "{} failed {} times, giving up",
                subsystem,
                self.failures.count(subsystem)
            );
        }
        allowed
    }

    pub fn increase_ekos_connect_failure_count(&mut self) -> bool {
        self.increase_failure_count(Subsystem::EkosConnect)
    }

    pub fn increase_indi_connect_failure_count(&mut self) -> bool {
        self.increase_failure_count(Subsystem::IndiConnect)
    }

    pub fn increase_focus_failure_count(&mut self) -> bool {
        self.increase_failure_count(Subsystem::Focus)
    }

    pub fn increase_guide_failure_count(&mut self) -> bool {
        self.increase_failure_count(Subsystem::Guide)
    }

    pub fn increase_align_failure_count(&mut self) -> bool {
        self.increase_failure_count(Subsystem::Align)
    }

    pub fn increase_capture_failure_count(&mut self) -> bool {
        self.increase_failure_count(Subsystem::Capture)
    }

    pub fn increase_parking_cap_failure_count(&mut self) -> bool {
        self.increase_failure_count(Subsystem::ParkingCap)
    }

    pub fn increase_parking_mount_failure_count(&mut self) -> bool {
        self.increase_failure_count(Subsystem::ParkingMount)
    }

    pub fn increase_parking_dome_failure_count(&mut self) -> bool {
        self.increase_failure_count(Subsystem::ParkingDome)
    }

    pub fn reset_failure_count(&mut self, subsystem: Subsystem) {
        self.failures.reset(subsystem);
    }

    /// Zero the connection, focus, guide, align and capture counters.
    pub fn reset_failure_counters(&mut self) {
        self.failures.reset_operational();
    }

    // ----- Preemptive shutdown -----

    pub fn enable_preemptive_shutdown(&mut self, wakeup_time: DateTime<Utc>) {
        self.preemptive_shutdown_wakeup_time = Some(wakeup_time);
    }

    pub fn disable_preemptive_shutdown(&mut self) {
        self.preemptive_shutdown_wakeup_time = None;
    }

    pub fn preemptive_shutdown(&self) -> bool {
        self.preemptive_shutdown_wakeup_time.is_some()
    }

    pub fn preemptive_shutdown_wakeup_time(&self) -> Option<DateTime<Utc>> {
        self.preemptive_shutdown_wakeup_time
    }

    // ----- Profiles -----

    pub fn profiles(&self) -> &[String] {
        &self.profiles
    }

    pub fn current_profile(&self) -> &str {
        &self.current_profile
    }

    /// Select a profile. Unknown names fall back to the default profile.
    pub fn set_current_profile(&mut self, name: &str) {
        self.select_profile(name, true);
    }

    fn select_profile(&mut self, name: &str, notify: bool) {
        let selected = if self.profiles.iter().any(|p| p == name) {
            name.to_string()
        } else {
            self.profiles
                .first()
                .cloned()
                .unwrap_or_else(|| DEFAULT_PROFILE.to_string())
        };
        let changed = selected != self.current_profile;
        self.current_profile = selected;
        if notify && changed {
            self.emit(ModuleStateEvent::CurrentProfileChanged(
                self.current_profile.clone(),
            ));
        }
    }

    /// Replace the profile list. The default profile stays first and the
    /// current selection is kept when it still exists.
    pub fn update_profiles(&mut self, profiles: Vec<String>) {
        let selected = self.current_profile.clone();
        let mut all = Vec::with_capacity(profiles.len() + 1);
        all.push(DEFAULT_PROFILE.to_string());
        all.extend(profiles.into_iter().filter(|p| p != DEFAULT_PROFILE));
        self.profiles = all;
        self.select_profile(&selected, false);
        self.emit(ModuleStateEvent::ProfilesChanged(self.profiles.clone()));
    }

    // ----- Operation and guiding timers -----

    /// Mark the start of the operation in progress.
    pub fn start_current_operation_timer(&mut self) {
        self.current_operation_started = Some(self.clock.now());
    }

    /// Time spent on the operation in progress; zero when none was started.
    pub fn current_operation_elapsed(&self) -> Duration {
        self.current_operation_started
            .map(|start| self.clock.now() - start)
            .unwrap_or_else(Duration::zero)
    }

    /// Plan a guiding restart after `delay`.
    pub fn start_guiding_timer(&mut self, delay: Duration) {
        self.restart_guiding = Some((self.clock.now(), delay));
    }

    pub fn cancel_guiding_timer(&mut self) {
        self.restart_guiding = None;
    }

    /// Whether a guiding restart is planned.
    pub fn is_guiding_timer_active(&self) -> bool {
        matches!(self.restart_guiding, Some((start, delay))
            if delay > Duration::zero() && start <= self.clock.now())
    }

    /// Whether the planned guiding restart is due.
    pub fn guiding_timer_expired(&self) -> bool {
        matches!(self.restart_guiding, Some((start, delay))
            if delay > Duration::zero() && self.clock.now() - start >= delay)
    }

    // ----- Iteration timer -----

    pub fn timer(&self) -> &IterationTimer {
        &self.timer
    }

    pub fn timer_mut(&mut self) -> &mut IterationTimer {
        &mut self.timer
    }

    pub fn timer_state(&self) -> TimerState {
        self.timer.state()
    }

    pub fn set_timer_state(&mut self, state: TimerState) {
        if self.timer.state() != state {
            self.timer.set_state(state);
            self.emit(ModuleStateEvent::TimerStateChanged(state));
        }
    }

    pub fn timer_interval_ms(&self) -> u64 {
        self.timer.interval_ms()
    }

    pub fn update_period_ms(&self) -> u64 {
        self.update_period_ms
    }

    pub fn iteration_setup(&self) -> bool {
        self.timer.iteration_setup()
    }

    /// Plan the next pass after the configured update period.
    pub fn setup_next_iteration_default(&mut self, next_state: TimerState) {
        self.setup_next_iteration(next_state, self.update_period_ms);
    }

    /// Plan the next pass `interval_ms` after the running countdown started.
    ///
    /// While a countdown is running the time already spent is deducted, so the
    /// pass fires `interval_ms` after the countdown start whatever happened in
    /// between. Without a countdown the full interval is used.
    pub fn setup_next_iteration(&mut self, next_state: TimerState, interval_ms: u64) {
        if self.timer.iteration_setup() {
            log::debug!(
                "Multiple setup_next_iteration calls: current {:?} {} ms, previous {:?} {} ms",
                next_state,
                interval_ms,
                self.timer.state(),
                self.timer.interval_ms()
            );
        }
        self.set_timer_state(next_state);

        let now = self.clock.now();
        if self.timer.is_active() {
            let elapsed = self.timer.elapsed_ms(now);
            self.timer.set_interval_ms(interval_ms.saturating_sub(elapsed));
            self.timer.start(now);
        } else {
            self.timer.set_interval_ms(interval_ms);
        }
        self.timer.set_iteration_setup(true);
    }
}
