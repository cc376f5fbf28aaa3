//! Unit tests for the power controller and transition executor.
//!
//! These run on the host with the `critical-section` std implementation
//! and the recording doubles from `crate::sim`.

use super::PowerController;
use crate::ble::{AdvSpeed, RadioPowerState};
use crate::config::PowerConfig;
use crate::driver::Application;
use crate::error::{ConfigError, Error};
use crate::power_logic::{PowerState, SleepAction};
use crate::sim::{RecordingApp, SimHardware, SimRadio, SimTimer};

fn controller() -> PowerController {
    PowerController::new(PowerConfig::DEFAULT)
}

fn fire(power: &PowerController, timer: &mut SimTimer, ticks: u32) {
    for _ in 0..ticks {
        power.on_timer_interrupt(timer);
    }
}

/// Plan and apply once.
fn step(
    power: &PowerController,
    radio: &mut SimRadio,
    hw: &mut SimHardware,
    app: &mut impl Application,
) -> crate::power_logic::Transition {
    let planned = power.plan(radio.power);
    power.apply(planned, radio, hw, app)
}

/// Application whose hooks query the controller they are driven by.
struct ObservingApp<'a> {
    power: &'a PowerController,
    state_on_suspend: Option<PowerState>,
    state_on_resume: Option<PowerState>,
    idle_on_resume: Option<u64>,
}

impl<'a> ObservingApp<'a> {
    fn new(power: &'a PowerController) -> Self {
        Self {
            power,
            state_on_suspend: None,
            state_on_resume: None,
            idle_on_resume: None,
        }
    }
}

impl Application for ObservingApp<'_> {
    fn resume(&mut self) {
        self.state_on_resume = Some(self.power.state());
        self.idle_on_resume = Some(self.power.snapshot().idle_ms);
    }

    fn suspend(&mut self, _target: PowerState) {
        self.state_on_suspend = Some(self.power.state());
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Tick interrupt + deferred handler
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn isr_only_records_pending_ticks() {
    let power = controller();
    let mut timer = SimTimer::default();

    fire(&power, &mut timer, 3);

    assert_eq!(timer.cleared, 3);
    assert_eq!(power.pending_ticks(), 3);
    // Nothing advanced until the main loop services the ticks.
    assert_eq!(power.snapshot().tick_count, 0);
    assert_eq!(power.state(), PowerState::Active);
}

#[test]
fn service_ticks_advances_counter_once_per_tick() {
    let power = controller();
    let mut timer = SimTimer::default();
    let mut radio = SimRadio::ready();

    fire(&power, &mut timer, 2);
    assert_eq!(power.service_ticks(&mut radio), 2);
    assert_eq!(power.pending_ticks(), 0);
    assert_eq!(power.snapshot().tick_count, 2);

    // No pending ticks: nothing happens, radio untouched.
    let stops = radio.stops;
    assert_eq!(power.service_ticks(&mut radio), 0);
    assert_eq!(radio.stops, stops);
    assert_eq!(power.snapshot().tick_count, 2);
}

#[test]
fn service_ticks_cycles_advertising_while_disconnected() {
    let power = controller();
    let mut timer = SimTimer::default();
    let mut radio = SimRadio::ready();

    fire(&power, &mut timer, 1);
    power.service_ticks(&mut radio);

    assert_eq!(radio.stops, 1);
    assert_eq!(radio.wakeups, 1);
    assert_eq!(radio.slow_starts, 1);
    assert_eq!(radio.advertising, Some(AdvSpeed::Slow));
}

#[test]
fn service_ticks_does_not_advertise_while_connected() {
    let power = controller();
    let mut timer = SimTimer::default();
    let mut radio = SimRadio::ready();

    power.on_connected();
    fire(&power, &mut timer, 10);
    power.service_ticks(&mut radio);

    let snap = power.snapshot();
    assert_eq!(snap.idle_ms, 0);
    assert_eq!(snap.last_interaction_tick, 10);
    assert_eq!(radio.slow_starts, 0);
    assert_eq!(power.state(), PowerState::Active);
}

#[test]
fn service_ticks_requests_deep_sleep_past_timeout() {
    let power = controller();
    let mut timer = SimTimer::default();
    let mut radio = SimRadio::ready();

    fire(&power, &mut timer, 3);
    power.service_ticks(&mut radio);
    assert_eq!(power.state(), PowerState::Active);

    fire(&power, &mut timer, 1);
    power.service_ticks(&mut radio);
    assert_eq!(power.state(), PowerState::DeepSleeping);
    assert_eq!(power.snapshot().idle_ms, 240_000);
}

// ═══════════════════════════════════════════════════════════════════════════
// Transition executor
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn apply_enters_deep_sleep_when_radio_ready() {
    let power = controller();
    let mut timer = SimTimer::default();
    let mut radio = SimRadio::ready();
    let mut hw = SimHardware::default();
    let mut app = RecordingApp::default();

    fire(&power, &mut timer, 4);
    power.service_ticks(&mut radio);
    radio.power = RadioPowerState::DeepSleepReady;

    let planned = power.plan(radio.power);
    let applied = power.apply(planned, &mut radio, &mut hw, &mut app);

    assert_eq!(applied.action, SleepAction::EnterDeepSleep);
    assert_eq!(hw.deep_sleeps, 1);
    assert_eq!(app.last_suspend, Some(PowerState::DeepSleeping));
    assert_eq!(power.state(), PowerState::WakingFromDeepSleep);
    // Left disconnected: slow advertising re-armed after waking.
    assert_eq!(radio.advertising, Some(AdvSpeed::Slow));

    let planned = power.plan(radio.power);
    let applied = power.apply(planned, &mut radio, &mut hw, &mut app);
    assert_eq!(applied.to, PowerState::Active);
    assert_eq!(hw.resumes, 1);
    assert_eq!(app.resumes, 1);
}

#[test]
fn apply_rechecks_radio_state_changed_since_planning() {
    let power = controller();
    let mut timer = SimTimer::default();
    let mut radio = SimRadio::ready();
    let mut hw = SimHardware::default();
    let mut app = RecordingApp::default();

    fire(&power, &mut timer, 4);
    power.service_ticks(&mut radio);

    radio.power = RadioPowerState::DeepSleepReady;
    let planned = power.plan(radio.power);
    assert_eq!(planned.action, SleepAction::EnterDeepSleep);

    // Radio starts closing an event before the executor runs.
    radio.power = RadioPowerState::EventClose;
    let applied = power.apply(planned, &mut radio, &mut hw, &mut app);

    assert_eq!(applied.action, SleepAction::None);
    assert_eq!(hw.deep_sleeps, 0);
    assert_eq!(power.state(), PowerState::DeepSleeping);
}

#[test]
fn apply_uses_reduced_clock_when_radio_not_quiesced() {
    let power = controller();
    let mut timer = SimTimer::default();
    let mut radio = SimRadio::ready();
    let mut hw = SimHardware::default();
    let mut app = RecordingApp::default();

    fire(&power, &mut timer, 4);
    power.service_ticks(&mut radio);
    radio.power = RadioPowerState::Active;

    let planned = power.plan(radio.power);
    power.apply(planned, &mut radio, &mut hw, &mut app);

    assert_eq!(hw.clock_reductions, 1);
    assert_eq!(hw.shallow_sleeps, 1);
    assert_eq!(hw.deep_sleeps, 0);
    assert!(!hw.clocks_reduced);
    assert_eq!(power.state(), PowerState::WakingFromDeepSleep);
}

#[test]
fn request_sleep_runs_shallow_sleep_then_resumes() {
    let power = controller();
    let mut radio = SimRadio::ready();
    let mut hw = SimHardware::default();
    let mut app = RecordingApp::default();

    assert!(power.request_sleep());
    assert_eq!(power.state(), PowerState::Sleeping);

    let planned = power.plan(radio.power);
    power.apply(planned, &mut radio, &mut hw, &mut app);
    assert_eq!(hw.shallow_sleeps, 1);
    assert_eq!(app.last_suspend, Some(PowerState::Sleeping));
    assert_eq!(power.state(), PowerState::WakingFromSleep);

    let planned = power.plan(radio.power);
    power.apply(planned, &mut radio, &mut hw, &mut app);
    assert_eq!(power.state(), PowerState::Active);
    assert_eq!(app.resumes, 1);
}

#[test]
fn request_sleep_refused_while_connected() {
    let power = controller();
    power.on_connected();
    assert!(!power.request_sleep());
    assert_eq!(power.state(), PowerState::Active);
}

#[test]
fn request_sleep_refused_outside_active() {
    let power = controller();
    assert!(power.request_sleep());
    assert!(!power.request_sleep());
    assert_eq!(power.state(), PowerState::Sleeping);
}

#[test]
fn apply_keeps_running_when_radio_refuses_advertising() {
    let power = controller();
    let mut timer = SimTimer::default();
    let mut radio = SimRadio::ready();
    let mut hw = SimHardware::default();
    let mut app = RecordingApp::default();
    radio.refuse_start = true;

    fire(&power, &mut timer, 4);
    power.service_ticks(&mut radio);
    radio.power = RadioPowerState::EcoOn;
    let planned = power.plan(radio.power);
    power.apply(planned, &mut radio, &mut hw, &mut app);

    assert_eq!(hw.deep_sleeps, 1);
    assert_eq!(radio.slow_starts, 0);
    assert_eq!(power.state(), PowerState::WakingFromDeepSleep);
}

#[test]
fn steady_active_does_not_touch_radio_or_hardware() {
    let power = controller();
    let mut radio = SimRadio::ready();
    let mut hw = SimHardware::default();
    let mut app = RecordingApp::default();

    for _ in 0..5 {
        let planned = power.plan(radio.power);
        power.apply(planned, &mut radio, &mut hw, &mut app);
    }
    assert_eq!(radio.slow_starts + radio.fast_starts + radio.stops, 0);
    assert_eq!(hw.shallow_sleeps + hw.deep_sleeps + hw.resumes, 0);
}

#[test]
fn hooks_can_query_controller_during_transition() {
    let power = controller();
    let mut timer = SimTimer::default();
    let mut radio = SimRadio::ready();
    let mut hw = SimHardware::default();
    let mut app = ObservingApp::new(&power);

    fire(&power, &mut timer, 4);
    power.service_ticks(&mut radio);

    step(&power, &mut radio, &mut hw, &mut app);
    assert_eq!(app.state_on_suspend, Some(PowerState::WakingFromDeepSleep));
    assert_eq!(hw.deep_sleeps, 1);

    step(&power, &mut radio, &mut hw, &mut app);
    assert_eq!(app.state_on_resume, Some(PowerState::Active));
    assert_eq!(app.idle_on_resume, Some(240_000));
    assert_eq!(power.state(), PowerState::Active);
}

#[test]
fn active_past_timeout_stops_advertising_then_rearms_slow() {
    let power = controller();
    let mut timer = SimTimer::default();
    let mut radio = SimRadio::ready();
    let mut hw = SimHardware::default();
    let mut app = RecordingApp::default();

    // Enter and leave one deep sleep so the device is Active again with the
    // idle time still past the threshold.
    fire(&power, &mut timer, 4);
    power.service_ticks(&mut radio);
    step(&power, &mut radio, &mut hw, &mut app);
    step(&power, &mut radio, &mut hw, &mut app);
    assert_eq!(power.state(), PowerState::Active);

    let stops = radio.stops;
    let slow = radio.slow_starts;
    let applied = step(&power, &mut radio, &mut hw, &mut app);

    assert_eq!(applied.from, PowerState::Active);
    assert_eq!(applied.to, PowerState::DeepSleeping);
    assert_eq!(applied.action, SleepAction::RequestDeepSleep);
    assert_eq!(radio.stops, stops + 1);
    assert_eq!(radio.slow_starts, slow + 1);
    assert_eq!(radio.advertising, Some(AdvSpeed::Slow));
    assert_eq!(power.state(), PowerState::DeepSleeping);
    // Only requested: no primitive yet.
    assert_eq!(hw.deep_sleeps, 1);
}

#[test]
fn pending_shallow_sleep_escalates_to_deep_sleep_on_timeout() {
    let power = controller();
    let mut timer = SimTimer::default();
    let mut radio = SimRadio::ready();

    assert!(power.request_sleep());
    for _ in 0..3 {
        fire(&power, &mut timer, 1);
        power.service_ticks(&mut radio);
        assert_eq!(power.state(), PowerState::Sleeping);
    }

    fire(&power, &mut timer, 1);
    power.service_ticks(&mut radio);
    assert_eq!(power.state(), PowerState::DeepSleeping);
}

#[test]
fn connect_before_sleep_is_entered_skips_resume() {
    let power = controller();
    let mut timer = SimTimer::default();
    let mut radio = SimRadio::ready();
    let mut hw = SimHardware::default();
    let mut app = RecordingApp::default();

    // Deep sleep requested but held while the radio closes an event.
    fire(&power, &mut timer, 4);
    power.service_ticks(&mut radio);
    radio.power = RadioPowerState::EventClose;
    step(&power, &mut radio, &mut hw, &mut app);
    assert_eq!(power.state(), PowerState::DeepSleeping);

    power.on_connected();
    let applied = step(&power, &mut radio, &mut hw, &mut app);

    assert_eq!(applied.to, PowerState::Active);
    assert_eq!(applied.action, SleepAction::None);
    assert_eq!(hw.resumes, 0);
    assert_eq!(app.suspends, 0);
    assert_eq!(app.resumes, 0);
}

#[test]
fn connect_after_sleep_was_entered_resumes() {
    let power = controller();
    let mut radio = SimRadio::ready();
    let mut hw = SimHardware::default();
    let mut app = RecordingApp::default();

    assert!(power.request_sleep());
    step(&power, &mut radio, &mut hw, &mut app);
    assert_eq!(power.state(), PowerState::WakingFromSleep);

    power.on_connected();
    let applied = step(&power, &mut radio, &mut hw, &mut app);
    assert_eq!(applied.action, SleepAction::Resume);
    assert_eq!(hw.resumes, 1);
    assert_eq!(app.resumes, 1);
}

// ═══════════════════════════════════════════════════════════════════════════
// Idle-timeout safety net
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn enforce_idle_timeout_only_from_active() {
    let power = controller();
    let mut timer = SimTimer::default();
    let mut radio = SimRadio::ready();

    assert!(!power.enforce_idle_timeout(&mut radio));

    // Exactly at the threshold: not yet due.
    fire(&power, &mut timer, 3);
    power.service_ticks(&mut radio);
    assert!(!power.enforce_idle_timeout(&mut radio));

    fire(&power, &mut timer, 1);
    power.service_ticks(&mut radio);
    // Already DeepSleeping via the tick handler; the hook does nothing more.
    assert!(!power.enforce_idle_timeout(&mut radio));
    assert_eq!(power.state(), PowerState::DeepSleeping);
}

#[test]
fn enforce_idle_timeout_after_wake_requests_deep_sleep_again() {
    let power = controller();
    let mut timer = SimTimer::default();
    let mut radio = SimRadio::ready();
    let mut hw = SimHardware::default();
    let mut app = RecordingApp::default();

    fire(&power, &mut timer, 4);
    power.service_ticks(&mut radio);
    for _ in 0..2 {
        let planned = power.plan(radio.power);
        power.apply(planned, &mut radio, &mut hw, &mut app);
    }
    assert_eq!(power.state(), PowerState::Active);

    let slow_before = radio.slow_starts;
    assert!(power.enforce_idle_timeout(&mut radio));
    assert_eq!(power.state(), PowerState::DeepSleeping);
    assert_eq!(radio.slow_starts, slow_before + 1);
}

// ═══════════════════════════════════════════════════════════════════════════
// Construction
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn with_timing_validates_configuration() {
    let power = PowerController::with_timing(1_000, 5_000).unwrap();
    assert_eq!(power.config().deep_sleep_timeout_ms, 5_000);

    assert_eq!(
        PowerController::with_timing(1_000, 999).err(),
        Some(Error::Config(ConfigError::TimeoutShorterThanInterval))
    );
}

#[test]
fn boots_active_with_zeroed_counters() {
    let snap = controller().snapshot();
    assert_eq!(snap.state, PowerState::Active);
    assert_eq!(snap.tick_count, 0);
    assert_eq!(snap.last_interaction_tick, 0);
    assert!(!snap.connected);
    assert_eq!(snap.idle_ms, 0);
}
