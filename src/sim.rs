//! Host-side doubles for the radio, power primitives, tick timer and
//! application.
//!
//! They record what the controller asked of them so tests can check the
//! side effects of each transition without hardware.

use heapless::Deque;

use crate::ble::{AdvSpeed, RadioEvent, RadioPowerState, RadioStack};
use crate::driver::Application;
use crate::error::RadioError;
use crate::hw::{PowerPrimitives, TickTimer};
use crate::power_logic::PowerState;

/// Maximum queued radio events.
pub const SIM_EVENT_QUEUE: usize = 16;

/// Scripted radio stack.
#[derive(Debug)]
pub struct SimRadio {
    /// Power state reported to the controller.
    pub power: RadioPowerState,
    /// Stays `true` until a `StackReady` event is polled.
    pub initializing: bool,
    /// When set, every `start_advertising` call is refused.
    pub refuse_start: bool,
    /// Current advertising cadence, `None` when stopped.
    pub advertising: Option<AdvSpeed>,
    pub fast_starts: u32,
    pub slow_starts: u32,
    pub stops: u32,
    pub wakeups: u32,
    events: Deque<RadioEvent, SIM_EVENT_QUEUE>,
}

impl SimRadio {
    /// Stack still initializing; queue a [`RadioEvent::StackReady`] to finish.
    pub const fn new() -> Self {
        Self {
            power: RadioPowerState::DeepSleepReady,
            initializing: true,
            refuse_start: false,
            advertising: None,
            fast_starts: 0,
            slow_starts: 0,
            stops: 0,
            wakeups: 0,
            events: Deque::new(),
        }
    }

    /// Stack already up.
    pub fn ready() -> Self {
        let mut radio = Self::new();
        radio.initializing = false;
        radio
    }

    /// Queue an event for the next drain. Returns `false` if the queue is full.
    pub fn push_event(&mut self, event: RadioEvent) -> bool {
        self.events.push_back(event).is_ok()
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }
}

impl Default for SimRadio {
    fn default() -> Self {
        Self::new()
    }
}

impl RadioStack for SimRadio {
    fn start_advertising(&mut self, speed: AdvSpeed) -> Result<(), RadioError> {
        if self.initializing {
            return Err(RadioError::NotReady);
        }
        if self.refuse_start {
            return Err(RadioError::CommandQueueFull);
        }
        match speed {
            AdvSpeed::Fast => self.fast_starts += 1,
            AdvSpeed::Slow => self.slow_starts += 1,
        }
        self.advertising = Some(speed);
        Ok(())
    }

    fn stop_advertising(&mut self) {
        self.stops += 1;
        self.advertising = None;
    }

    fn request_wakeup(&mut self) {
        self.wakeups += 1;
    }

    fn power_state(&self) -> RadioPowerState {
        self.power
    }

    fn is_initializing(&self) -> bool {
        self.initializing
    }

    fn poll_event(&mut self) -> Option<RadioEvent> {
        let event = self.events.pop_front();
        if event == Some(RadioEvent::StackReady) {
            self.initializing = false;
        }
        event
    }
}

/// Counts calls to each power primitive.
#[derive(Debug, Default)]
pub struct SimHardware {
    pub shallow_sleeps: u32,
    pub deep_sleeps: u32,
    pub resumes: u32,
    pub clock_reductions: u32,
    /// Reduced clock currently selected.
    pub clocks_reduced: bool,
}

impl PowerPrimitives for SimHardware {
    fn enter_shallow_sleep(&mut self) {
        self.shallow_sleeps += 1;
    }

    fn enter_deep_sleep(&mut self) {
        self.deep_sleeps += 1;
    }

    fn resume_clocks(&mut self) {
        self.resumes += 1;
        self.clocks_reduced = false;
    }

    fn reduce_clocks(&mut self) {
        self.clock_reductions += 1;
        self.clocks_reduced = true;
    }
}

/// Tick timer that only remembers how it was driven.
#[derive(Debug, Default)]
pub struct SimTimer {
    pub armed_interval_ms: Option<u32>,
    pub cleared: u32,
}

impl TickTimer for SimTimer {
    fn arm(&mut self, interval_ms: u32) {
        self.armed_interval_ms = Some(interval_ms);
    }

    fn clear_interrupt(&mut self) {
        self.cleared += 1;
    }
}

/// Application double recording its hook calls.
#[derive(Debug, Default)]
pub struct RecordingApp {
    pub resumes: u32,
    pub suspends: u32,
    pub last_suspend: Option<PowerState>,
    pub runs: u32,
    pub last_state: Option<PowerState>,
}

impl Application for RecordingApp {
    fn resume(&mut self) {
        self.resumes += 1;
    }

    fn suspend(&mut self, target: PowerState) {
        self.suspends += 1;
        self.last_suspend = Some(target);
    }

    fn run(&mut self, state: PowerState) {
        self.runs += 1;
        self.last_state = Some(state);
    }
}
