//! Bluetooth Low Energy radio interface.
//!
//! The power controller never talks to the SoftDevice directly. It sees
//! the radio stack through [`RadioStack`]:
//!
//! 1. **Advertising control** - start (fast or slow) and stop advertising.
//! 2. **Radio power state** - the stack's own low-power state, which gates
//!    whether a requested deep sleep can actually be entered.
//! 3. **Events** - connect / disconnect / stack-ready, drained without
//!    blocking once per main-loop iteration.
//!
//! The nRF52840 SoftDevice implementation lives in the firmware binary
//! (`ble/softdevice.rs`); host tests use [`crate::sim::SimRadio`].

pub mod adv_data;

use crate::config::{ADV_FAST_INTERVAL, ADV_FAST_TIMEOUT_SECS, ADV_SLOW_INTERVAL};
use crate::error::RadioError;

/// Advertising cadence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdvSpeed {
    /// Short interval, limited window - right after boot or disconnect.
    Fast,
    /// Long interval, no timeout - the idle/low-power cadence.
    Slow,
}

impl AdvSpeed {
    /// Advertising interval in 0.625 ms units.
    pub fn interval(self) -> u32 {
        match self {
            AdvSpeed::Fast => ADV_FAST_INTERVAL,
            AdvSpeed::Slow => ADV_SLOW_INTERVAL,
        }
    }

    /// Advertising timeout in 10 ms units; `None` advertises until stopped.
    pub fn timeout(self) -> Option<u16> {
        match self {
            AdvSpeed::Fast => Some(ADV_FAST_TIMEOUT_SECS * 100),
            AdvSpeed::Slow => None,
        }
    }
}

/// The radio stack's own power state.
///
/// Owned by the stack; the controller only reads it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RadioPowerState {
    /// Radio busy (connection event, fast advertising).
    Active,
    /// Initialized, nothing scheduled.
    Idle,
    /// Radio sleeping between events, baseline clock required.
    Sleep,
    /// Radio quiesced; deep sleep may be entered.
    DeepSleepReady,
    /// Crystal running, radio idle between events; deep sleep compatible.
    EcoOn,
    /// Crystal starting up.
    EcoStable,
    /// Closing a radio event - must not sleep now.
    EventClose,
    /// Anything the controller does not model.
    Unknown,
}

impl RadioPowerState {
    /// Radio confirms the system may enter deep sleep.
    pub fn allows_deep_sleep(self) -> bool {
        matches!(self, RadioPowerState::DeepSleepReady | RadioPowerState::EcoOn)
    }

    /// Radio tolerates the CPU entering a shallow sleep.
    ///
    /// An unmodeled state is not evidence for sleeping.
    pub fn allows_sleep(self) -> bool {
        !matches!(self, RadioPowerState::EventClose | RadioPowerState::Unknown)
    }

    /// Decode the raw value published by the radio task.
    pub const fn from_raw(raw: u8) -> Self {
        match raw {
            0 => RadioPowerState::Active,
            1 => RadioPowerState::Idle,
            2 => RadioPowerState::Sleep,
            3 => RadioPowerState::DeepSleepReady,
            4 => RadioPowerState::EcoOn,
            5 => RadioPowerState::EcoStable,
            6 => RadioPowerState::EventClose,
            _ => RadioPowerState::Unknown,
        }
    }

    /// Encode for publishing through an atomic.
    pub const fn to_raw(self) -> u8 {
        match self {
            RadioPowerState::Active => 0,
            RadioPowerState::Idle => 1,
            RadioPowerState::Sleep => 2,
            RadioPowerState::DeepSleepReady => 3,
            RadioPowerState::EcoOn => 4,
            RadioPowerState::EcoStable => 5,
            RadioPowerState::EventClose => 6,
            RadioPowerState::Unknown => 0xFF,
        }
    }
}

/// Events the radio stack reports to the main loop.
///
/// Each variant is handled on its own; there is no shared fall-through
/// action between them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RadioEvent {
    /// Stack finished initializing.
    StackReady,
    /// A central connected.
    Connected,
    /// The link was lost or closed.
    Disconnected,
}

/// Narrow interface to the radio / connectivity stack.
pub trait RadioStack {
    /// Begin (or switch to) advertising at the given cadence.
    fn start_advertising(&mut self, speed: AdvSpeed) -> Result<(), RadioError>;

    /// Stop advertising. Idempotent.
    fn stop_advertising(&mut self);

    /// Ask the radio subsystem to leave its deep-sleep state. Idempotent.
    fn request_wakeup(&mut self) {}

    /// Current power state of the radio subsystem.
    fn power_state(&self) -> RadioPowerState;

    /// Stack is still starting up.
    fn is_initializing(&self) -> bool;

    /// Next pending event, without blocking.
    fn poll_event(&mut self) -> Option<RadioEvent>;
}

/// Start advertising; a refusal is logged and otherwise ignored so the
/// caller keeps running.
pub(crate) fn start_advertising_or_warn<R: RadioStack>(radio: &mut R, speed: AdvSpeed) -> bool {
    match radio.start_advertising(speed) {
        Ok(()) => true,
        Err(_e) => {
            #[cfg(feature = "defmt")]
            defmt::warn!("BLE: {:?} advertising not started: {:?}", speed, _e);
            false
        }
    }
}
