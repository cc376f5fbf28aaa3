//! Hardware seams used by the power controller.
//!
//! The controller only needs a handful of primitives from the chip: enter a
//! shallow or deep sleep (both return once a wake event arrives), bring the
//! clocks back afterwards, and service the periodic tick timer. The nRF52840
//! implementation is in the firmware's `board` module.

/// Low-power primitives. All calls are synchronous.
pub trait PowerPrimitives {
    /// CPU sleep with peripheral clocks retained. Returns on wake.
    fn enter_shallow_sleep(&mut self);

    /// Lowest power mode that still resumes execution. Returns on wake.
    fn enter_deep_sleep(&mut self);

    /// Restore the baseline clock configuration after a sleep.
    fn resume_clocks(&mut self);

    /// Drop to the reduced clock before a shallow sleep when the application
    /// does not need the baseline clock.
    fn reduce_clocks(&mut self) {}
}

/// The periodic wakeup timer.
pub trait TickTimer {
    /// Start periodic interrupts every `interval_ms`.
    fn arm(&mut self, interval_ms: u32);

    /// Acknowledge the pending interrupt.
    fn clear_interrupt(&mut self);
}
