//! Main loop driver.
//!
//! Ties the radio, the hardware primitives and the application to one
//! [`PowerController`]. Each iteration:
//!
//! 1. drain pending radio events (non-blocking),
//! 2. service ticks recorded by the ISR,
//! 3. plan and apply the next power transition,
//! 4. run the idle-timeout safety net and the application hook.
//!
//! The firmware calls [`Driver::run_once`] from its main task and awaits the
//! next tick or radio event in between.

use crate::ble::{self, AdvSpeed, RadioEvent, RadioStack};
use crate::hw::PowerPrimitives;
use crate::power::PowerController;
use crate::power_logic::{PowerState, Transition};

/// Application components managed alongside the power state.
///
/// All hooks default to no-ops.
pub trait Application {
    /// Called once the device is back to Active after a sleep that was
    /// actually entered. A low-power request cancelled before the CPU slept
    /// (a peer connected first) gets no `resume`, as `suspend` never ran.
    fn resume(&mut self) {}

    /// Called right before the CPU sleeps towards `target`.
    fn suspend(&mut self, _target: PowerState) {}

    /// Application work, once per main-loop iteration.
    fn run(&mut self, _state: PowerState) {}
}

impl Application for () {}

pub struct Driver<'a, R, H, A = ()> {
    power: &'a PowerController,
    radio: R,
    hw: H,
    app: A,
}

impl<'a, R, H, A> Driver<'a, R, H, A>
where
    R: RadioStack,
    H: PowerPrimitives,
    A: Application,
{
    pub fn new(power: &'a PowerController, radio: R, hw: H, app: A) -> Self {
        Self {
            power,
            radio,
            hw,
            app,
        }
    }

    /// Block until the radio stack has finished initializing, handling the
    /// events it produces meanwhile.
    pub fn wait_for_stack(&mut self) {
        while self.radio.is_initializing() {
            self.process_events();
        }
    }

    /// Handle every pending radio event. Returns how many were handled.
    pub fn process_events(&mut self) -> usize {
        let mut handled = 0;
        while let Some(event) = self.radio.poll_event() {
            self.dispatch(event);
            handled += 1;
        }
        handled
    }

    fn dispatch(&mut self, event: RadioEvent) {
        match event {
            RadioEvent::StackReady => {
                #[cfg(feature = "defmt")]
                defmt::info!("BLE: stack ready");
                ble::start_advertising_or_warn(&mut self.radio, AdvSpeed::Fast);
            }
            RadioEvent::Connected => self.power.on_connected(),
            RadioEvent::Disconnected => {
                self.power.on_disconnected();
                ble::start_advertising_or_warn(&mut self.radio, AdvSpeed::Fast);
            }
        }
    }

    /// One main-loop iteration. Returns the power state it ends in.
    pub fn run_once(&mut self) -> PowerState {
        self.process_events();
        self.power.service_ticks(&mut self.radio);
        self.step();
        self.power.enforce_idle_timeout(&mut self.radio);

        let state = self.power.state();
        self.app.run(state);
        state
    }

    /// Plan and apply one transition.
    pub fn step(&mut self) -> Transition {
        let planned = self.power.plan(self.radio.power_state());
        self.power
            .apply(planned, &mut self.radio, &mut self.hw, &mut self.app)
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    pub fn hw(&self) -> &H {
        &self.hw
    }

    pub fn app(&self) -> &A {
        &self.app
    }
}
