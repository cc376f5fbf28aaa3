//! Application-wide constants and compile-time configuration.
//!
//! All timing parameters, advertising settings, and power thresholds
//! live here so they can be tuned in one place.

use crate::error::ConfigError;

// Power management

/// Period of the wakeup tick (ms). One tick is the controller's unit of time.
pub const TIMER_INTERVAL_MS: u32 = 60_000;

/// Idle time before the application requests deep sleep (ms).
/// The comparison is strict: idle must *exceed* this value.
pub const DEEPSLEEP_TIMEOUT_MS: u32 = 180_000;

const _: () = assert!(
    DEEPSLEEP_TIMEOUT_MS >= TIMER_INTERVAL_MS,
    "deep-sleep timeout shorter than one tick can never be observed"
);

// BLE advertising

/// Advertised device name (complete local name when it fits).
pub const DEVICE_NAME: &str = "BLE-PowerCtl";

/// Fast advertising interval (in 0.625 ms units). 32 = 20 ms.
pub const ADV_FAST_INTERVAL: u32 = 32;

/// Fast advertising window before falling back to slow advertising (seconds).
pub const ADV_FAST_TIMEOUT_SECS: u16 = 30;

/// Slow advertising interval (in 0.625 ms units). 1600 = 1 s.
pub const ADV_SLOW_INTERVAL: u32 = 1600;

/// Period at which start-up polls the radio stack while it initializes (ms).
pub const STACK_POLL_MS: u64 = 10;

// Tick timer (RTC2)

/// RTC2 prescaler. 32768 Hz / (4095 + 1) = 8 Hz counter.
pub const RTC_PRESCALER: u16 = 4095;

/// RTC2 counter frequency after prescaling (Hz).
pub const RTC_TICK_HZ: u32 = 32_768 / (RTC_PRESCALER as u32 + 1);

/// RTC counts for `interval_ms` at [`RTC_TICK_HZ`].
pub const fn rtc_counts(interval_ms: u32) -> u32 {
    // u64 keeps long intervals from overflowing before the divide.
    ((interval_ms as u64 * RTC_TICK_HZ as u64) / 1000) as u32
}

/// Validated timing configuration for the power controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PowerConfig {
    /// Tick period (ms).
    pub timer_interval_ms: u32,
    /// Idle threshold before deep sleep (ms).
    pub deep_sleep_timeout_ms: u32,
}

impl PowerConfig {
    /// Reference configuration: 1 minute tick, 3 minute idle threshold.
    pub const DEFAULT: Self = Self {
        timer_interval_ms: TIMER_INTERVAL_MS,
        deep_sleep_timeout_ms: DEEPSLEEP_TIMEOUT_MS,
    };

    /// Build a configuration, rejecting combinations where the threshold
    /// could never be observed.
    pub const fn new(timer_interval_ms: u32, deep_sleep_timeout_ms: u32) -> Result<Self, ConfigError> {
        if timer_interval_ms == 0 {
            return Err(ConfigError::ZeroTimerInterval);
        }
        if deep_sleep_timeout_ms < timer_interval_ms {
            return Err(ConfigError::TimeoutShorterThanInterval);
        }
        Ok(Self {
            timer_interval_ms,
            deep_sleep_timeout_ms,
        })
    }

    /// Number of RTC counts in one tick at [`RTC_TICK_HZ`].
    pub const fn rtc_compare_value(&self) -> u32 {
        rtc_counts(self.timer_interval_ms)
    }
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
