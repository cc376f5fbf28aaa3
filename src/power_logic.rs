//! Application power policy - pure decision logic.
//!
//! Given the current application power state and what can be observed
//! about the world (connection, idle time, radio power state) this module
//! decides the next state and the one side effect that goes with it. It
//! performs no I/O; [`crate::power`] applies the result.

use crate::ble::RadioPowerState;

/// Application power state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerState {
    /// Normal operation.
    Active,
    /// Returned from a shallow sleep; components still to be resumed.
    WakingFromSleep,
    /// Returned from deep sleep; components still to be resumed.
    WakingFromDeepSleep,
    /// Application asked for a shallow sleep.
    Sleeping,
    /// Application asked for deep sleep; waiting on the radio to allow it.
    DeepSleeping,
}

/// Side effect attached to a transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SleepAction {
    None,
    /// Restore clocks and resume application components.
    Resume,
    /// Stop advertising; deep sleep is entered once the radio allows it.
    RequestDeepSleep,
    /// CPU sleep on the baseline clock.
    EnterShallowSleep,
    /// CPU sleep on the reduced clock, baseline restored on wake.
    EnterReducedClockSleep,
    EnterDeepSleep,
}

/// Everything the policy looks at, captured at one instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PowerInputs {
    pub connected: bool,
    pub idle_ms: u64,
    pub radio: RadioPowerState,
}

/// A decided transition, together with the inputs it was decided on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Transition {
    pub from: PowerState,
    pub to: PowerState,
    pub action: SleepAction,
    pub inputs: PowerInputs,
}

impl Transition {
    /// The state actually changes.
    pub fn is_change(&self) -> bool {
        self.from != self.to
    }
}

/// Idle-timeout rule: disconnected and idle strictly longer than the threshold.
pub fn deep_sleep_due(connected: bool, idle_ms: u64, timeout_ms: u32) -> bool {
    !connected && idle_ms > u64::from(timeout_ms)
}

/// Decide the next power state.
///
/// Ordering:
/// - a connected peer keeps the device Active (pending low-power requests
///   are cancelled without a resume, since nothing was suspended);
/// - waking states always converge to Active;
/// - the deep-sleep timeout is checked before any shallow-sleep rule;
/// - the radio's own state decides whether a requested sleep is entered;
/// - anything else leaves the state unchanged.
pub fn evaluate(state: PowerState, inputs: PowerInputs, deep_sleep_timeout_ms: u32) -> Transition {
    let (to, action) = next(state, &inputs, deep_sleep_timeout_ms);
    Transition {
        from: state,
        to,
        action,
        inputs,
    }
}

fn next(state: PowerState, inputs: &PowerInputs, timeout_ms: u32) -> (PowerState, SleepAction) {
    use PowerState::*;

    if inputs.connected {
        return match state {
            // Woke from a sleep that was entered: components were suspended.
            WakingFromSleep | WakingFromDeepSleep => (Active, SleepAction::Resume),
            // Requested but never entered: nothing was suspended.
            Active | Sleeping | DeepSleeping => (Active, SleepAction::None),
        };
    }

    match state {
        WakingFromSleep | WakingFromDeepSleep => (Active, SleepAction::Resume),
        Active | Sleeping if deep_sleep_due(inputs.connected, inputs.idle_ms, timeout_ms) => {
            (DeepSleeping, SleepAction::RequestDeepSleep)
        }
        Active => (Active, SleepAction::None),
        Sleeping if inputs.radio.allows_sleep() => (WakingFromSleep, SleepAction::EnterShallowSleep),
        Sleeping => (Sleeping, SleepAction::None),
        DeepSleeping if inputs.radio.allows_deep_sleep() => {
            (WakingFromDeepSleep, SleepAction::EnterDeepSleep)
        }
        // Radio not quiesced yet but not mid-event either: sleep on the
        // reduced clock instead.
        DeepSleeping if inputs.radio.allows_sleep() => {
            (WakingFromDeepSleep, SleepAction::EnterReducedClockSleep)
        }
        DeepSleeping => (DeepSleeping, SleepAction::None),
    }
}
