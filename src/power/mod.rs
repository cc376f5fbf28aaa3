//! Power controller - owns the application power state and applies
//! transitions under a critical section.
//!
//! Two execution contexts touch the controller:
//!
//! - **Tick interrupt**: [`PowerController::on_timer_interrupt`] only
//!   acknowledges the timer and records that a tick happened.
//! - **Main loop**: everything else - servicing recorded ticks, connection
//!   events, evaluating the policy in [`crate::power_logic`] and running the
//!   sleep primitives.
//!
//! Every read-modify-write of shared state (power state, tick counter,
//! last-interaction tick, connection flag, pending ticks) happens inside
//! `critical_section::with`, which masks the tick interrupt on target.
//!
//! nRF52840 power modes used by the firmware:
//! - System ON, CPU running: Active
//! - System ON idle (`sd_app_evt_wait`): shallow sleep
//! - System ON idle, HFXO released, low-power mode: deep sleep

use core::cell::{Cell, RefCell};

use critical_section::Mutex;

use crate::activity::ActivityTracker;
use crate::ble::{self, AdvSpeed, RadioPowerState, RadioStack};
use crate::config::PowerConfig;
use crate::driver::Application;
use crate::error::Error;
use crate::hw::{PowerPrimitives, TickTimer};
use crate::power_logic::{deep_sleep_due, evaluate, PowerInputs, PowerState, SleepAction, Transition};

#[cfg(test)]
mod tests;

/// State shared between the main loop and the tick interrupt.
struct PowerCore {
    state: PowerState,
    activity: ActivityTracker,
}

impl PowerCore {
    const fn new(interval_ms: u32) -> Self {
        Self {
            state: PowerState::Active,
            activity: ActivityTracker::new(interval_ms),
        }
    }

    fn inputs(&self, radio: RadioPowerState) -> PowerInputs {
        PowerInputs {
            connected: self.activity.is_connected(),
            idle_ms: self.activity.idle_duration_ms(),
            radio,
        }
    }

    fn deep_sleep_due(&self, timeout_ms: u32) -> bool {
        deep_sleep_due(
            self.activity.is_connected(),
            self.activity.idle_duration_ms(),
            timeout_ms,
        )
    }

    fn set_state(&mut self, to: PowerState) {
        if self.state != to {
            #[cfg(feature = "defmt")]
            defmt::info!("Power: {:?} -> {:?}", self.state, to);
            self.state = to;
        }
    }
}

/// Consistent copy of the controller's shared state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PowerSnapshot {
    pub state: PowerState,
    pub tick_count: u32,
    pub last_interaction_tick: u32,
    pub connected: bool,
    pub idle_ms: u64,
}

/// The single owner of the device-wide power mode.
///
/// `const`-constructible so the firmware can keep it in a `static` shared
/// by the tick ISR and the main task.
pub struct PowerController {
    core: Mutex<RefCell<PowerCore>>,
    pending_ticks: Mutex<Cell<u32>>,
    config: PowerConfig,
}

impl PowerController {
    pub const fn new(config: PowerConfig) -> Self {
        Self {
            core: Mutex::new(RefCell::new(PowerCore::new(config.timer_interval_ms))),
            pending_ticks: Mutex::new(Cell::new(0)),
            config,
        }
    }

    /// Controller for a custom tick period and idle threshold.
    pub fn with_timing(timer_interval_ms: u32, deep_sleep_timeout_ms: u32) -> Result<Self, Error> {
        let config = PowerConfig::new(timer_interval_ms, deep_sleep_timeout_ms)?;
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &PowerConfig {
        &self.config
    }

    /// Current application power state.
    pub fn state(&self) -> PowerState {
        critical_section::with(|cs| self.core.borrow_ref(cs).state)
    }

    pub fn snapshot(&self) -> PowerSnapshot {
        critical_section::with(|cs| {
            let core = self.core.borrow_ref(cs);
            PowerSnapshot {
                state: core.state,
                tick_count: core.activity.tick_count(),
                last_interaction_tick: core.activity.last_interaction_tick(),
                connected: core.activity.is_connected(),
                idle_ms: core.activity.idle_duration_ms(),
            }
        })
    }

    // Interrupt context

    /// Tick ISR body: acknowledge the timer and record one pending tick.
    ///
    /// Bounded work only; the tick is processed by [`Self::service_ticks`].
    pub fn on_timer_interrupt<T: TickTimer>(&self, timer: &mut T) {
        timer.clear_interrupt();
        critical_section::with(|cs| {
            let pending = self.pending_ticks.borrow(cs);
            pending.set(pending.get().saturating_add(1));
        });
    }

    /// Ticks recorded by the ISR and not yet serviced.
    pub fn pending_ticks(&self) -> u32 {
        critical_section::with(|cs| self.pending_ticks.borrow(cs).get())
    }

    // Connectivity observer

    pub fn on_connected(&self) {
        critical_section::with(|cs| self.core.borrow_ref_mut(cs).activity.on_connect());
        #[cfg(feature = "defmt")]
        defmt::info!("Power: peer connected, idle clock reset");
    }

    pub fn on_disconnected(&self) {
        critical_section::with(|cs| self.core.borrow_ref_mut(cs).activity.on_disconnect());
        #[cfg(feature = "defmt")]
        defmt::info!("Power: peer disconnected");
    }

    /// Application asks for a shallow sleep. Refused while connected or
    /// when a transition is already under way.
    pub fn request_sleep(&self) -> bool {
        critical_section::with(|cs| {
            let mut core = self.core.borrow_ref_mut(cs);
            if core.activity.is_connected() {
                #[cfg(feature = "defmt")]
                defmt::debug!("Power: sleep request ignored while connected");
                return false;
            }
            if core.state != PowerState::Active {
                return false;
            }
            core.set_state(PowerState::Sleeping);
            true
        })
    }

    // Main-loop context

    /// Deferred tick handler.
    ///
    /// For the ticks recorded since the last call: stop advertising and wake
    /// the radio, advance the tick counter, request deep sleep if the idle
    /// timeout has passed, and re-arm slow advertising while disconnected.
    /// Returns the number of ticks serviced.
    pub fn service_ticks<R: RadioStack>(&self, radio: &mut R) -> u32 {
        critical_section::with(|cs| {
            let ticks = self.pending_ticks.borrow(cs).replace(0);
            if ticks == 0 {
                return 0;
            }

            radio.stop_advertising();
            radio.request_wakeup();

            let mut core = self.core.borrow_ref_mut(cs);
            for _ in 0..ticks {
                core.activity.on_tick();
            }

            if matches!(core.state, PowerState::Active | PowerState::Sleeping)
                && core.deep_sleep_due(self.config.deep_sleep_timeout_ms)
            {
                #[cfg(feature = "defmt")]
                defmt::info!("Power: idle {} ms, requesting deep sleep", core.activity.idle_duration_ms());
                core.set_state(PowerState::DeepSleeping);
            }

            if !core.activity.is_connected() {
                ble::start_advertising_or_warn(radio, AdvSpeed::Slow);
            }
            ticks
        })
    }

    /// Decide the next transition from a consistent view of the shared state.
    pub fn plan(&self, radio: RadioPowerState) -> Transition {
        critical_section::with(|cs| {
            let core = self.core.borrow_ref(cs);
            evaluate(core.state, core.inputs(radio), self.config.deep_sleep_timeout_ms)
        })
    }

    /// Transition executor.
    ///
    /// Inside one critical section: re-read the radio power state, re-decide
    /// if anything moved since `planned` was computed, write the new state,
    /// run the hardware primitive, and re-arm slow advertising if the device
    /// is left disconnected. The shared state is released before the
    /// primitive runs, so application hooks may query the controller.
    /// Returns the transition actually applied.
    pub fn apply<R, H, A>(&self, planned: Transition, radio: &mut R, hw: &mut H, app: &mut A) -> Transition
    where
        R: RadioStack,
        H: PowerPrimitives,
        A: Application,
    {
        critical_section::with(|cs| {
            let mut core = self.core.borrow_ref_mut(cs);
            let inputs = core.inputs(radio.power_state());
            let transition = if planned.from == core.state && planned.inputs == inputs {
                planned
            } else {
                evaluate(core.state, inputs, self.config.deep_sleep_timeout_ms)
            };

            core.set_state(transition.to);
            // Hooks and primitives may read the controller back.
            drop(core);

            perform(transition.action, radio, hw, app);

            if transition.is_change() && !inputs.connected {
                ble::start_advertising_or_warn(radio, AdvSpeed::Slow);
            }
            transition
        })
    }

    /// Application-hook safety net: the same idle rule the tick handler
    /// applies, checked at main-loop cadence.
    pub fn enforce_idle_timeout<R: RadioStack>(&self, radio: &mut R) -> bool {
        critical_section::with(|cs| {
            let mut core = self.core.borrow_ref_mut(cs);
            if core.state != PowerState::Active || !core.deep_sleep_due(self.config.deep_sleep_timeout_ms) {
                return false;
            }
            core.set_state(PowerState::DeepSleeping);
            ble::start_advertising_or_warn(radio, AdvSpeed::Slow);
            true
        })
    }
}

fn perform<R, H, A>(action: SleepAction, radio: &mut R, hw: &mut H, app: &mut A)
where
    R: RadioStack,
    H: PowerPrimitives,
    A: Application,
{
    match action {
        SleepAction::None => {}
        SleepAction::Resume => {
            hw.resume_clocks();
            app.resume();
        }
        SleepAction::RequestDeepSleep => radio.stop_advertising(),
        SleepAction::EnterShallowSleep => {
            app.suspend(PowerState::Sleeping);
            hw.enter_shallow_sleep();
        }
        SleepAction::EnterReducedClockSleep => {
            app.suspend(PowerState::DeepSleeping);
            hw.reduce_clocks();
            hw.enter_shallow_sleep();
            hw.resume_clocks();
        }
        SleepAction::EnterDeepSleep => {
            app.suspend(PowerState::DeepSleeping);
            hw.enter_deep_sleep();
        }
    }
}
