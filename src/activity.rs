//! Activity tracking - tick bookkeeping and idle-time derivation.
//!
//! The tracker owns the two counters the power policy is built on:
//! the number of elapsed timer ticks since boot and the tick at which the
//! device was last known to be in use. Connected time counts as use, so
//! while a peer is connected both counters move together.

/// Tick counter plus last-interaction mark.
///
/// Invariant: `last_interaction_tick` never runs ahead of `tick_count`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ActivityTracker {
    tick_count: u32,
    last_interaction_tick: u32,
    connected: bool,
    interval_ms: u32,
}

impl ActivityTracker {
    /// Fresh tracker at boot: no ticks, no connection.
    pub const fn new(interval_ms: u32) -> Self {
        Self {
            tick_count: 0,
            last_interaction_tick: 0,
            connected: false,
            interval_ms,
        }
    }

    /// Advance time by one tick.
    pub fn on_tick(&mut self) {
        self.tick_count = self.tick_count.wrapping_add(1);
        if self.connected {
            self.last_interaction_tick = self.tick_count;
        }
    }

    /// A peer connected: restart the idle clock.
    pub fn on_connect(&mut self) {
        self.connected = true;
        self.last_interaction_tick = self.tick_count;
    }

    /// A peer disconnected. Idle time keeps accumulating from the last
    /// connected tick.
    pub fn on_disconnect(&mut self) {
        self.connected = false;
    }

    /// Whole ticks since the last interaction.
    pub fn idle_ticks(&self) -> u32 {
        self.tick_count.wrapping_sub(self.last_interaction_tick)
    }

    /// Idle time in milliseconds.
    pub fn idle_duration_ms(&self) -> u64 {
        u64::from(self.idle_ticks()) * u64::from(self.interval_ms)
    }

    pub fn tick_count(&self) -> u32 {
        self.tick_count
    }

    pub fn last_interaction_tick(&self) -> u32 {
        self.last_interaction_tick
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }
}
