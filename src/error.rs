//! Unified error type for ble-powerctl.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` (behind the `defmt` feature) for efficient
//! on-target logging.
//!
//! None of these errors stop the main loop. The power controller logs them
//! and keeps running; an embedded peripheral has nowhere to report a fatal
//! error to.

/// Top-level error type used across the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Timing configuration rejected.
    Config(ConfigError),
}

/// Reasons a [`PowerConfig`](crate::config::PowerConfig) is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Tick period of zero would never advance time.
    ZeroTimerInterval,
    /// Deep-sleep threshold below one tick can never be observed.
    TimeoutShorterThanInterval,
}

/// Radio-stack refusals, returned by
/// [`RadioStack::start_advertising`](crate::ble::RadioStack::start_advertising)
/// and logged by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RadioError {
    /// Stack has not reported ready yet.
    NotReady,
    /// Command queue towards the radio task is full.
    CommandQueueFull,
}

// Convenience conversions

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}
