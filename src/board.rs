//! nRF52840 bindings for the power primitives and the tick timer.
//!
//! With the SoftDevice enabled the application may not touch the POWER or
//! CLOCK peripherals directly, so every sleep primitive goes through the
//! SoftDevice SVCs. The tick runs on RTC2 (RTC0 belongs to the SoftDevice,
//! RTC1 to the embassy time driver).

use ble_powerctl::config::{rtc_counts, RTC_PRESCALER};
use ble_powerctl::hw::{PowerPrimitives, TickTimer};
use defmt::{debug, warn};
use embassy_nrf::interrupt::{self, InterruptExt, Priority};
use embassy_nrf::pac;
use nrf_softdevice::raw;

/// RTC2 tick interrupt priority. P0, P1 and P4 are reserved by the SoftDevice.
const TICK_PRIORITY: Priority = Priority::P6;

fn check(call: &str, ret: u32) {
    if ret != raw::NRF_SUCCESS {
        warn!("Power: {} failed: {}", call, ret);
    }
}

/// Sleep primitives over the SoftDevice power and clock SVCs.
pub struct NrfPower;

impl PowerPrimitives for NrfPower {
    fn enter_shallow_sleep(&mut self) {
        check("sd_app_evt_wait", unsafe { raw::sd_app_evt_wait() });
    }

    /// System ON idle with the HFXO released and the regulator in low-power
    /// mode. System OFF is not used: waking from it resets the chip.
    fn enter_deep_sleep(&mut self) {
        check("sd_clock_hfclk_release", unsafe { raw::sd_clock_hfclk_release() });
        check("sd_power_mode_set", unsafe {
            raw::sd_power_mode_set(raw::NRF_POWER_MODES_NRF_POWER_MODE_LOWPWR as u8)
        });
        check("sd_app_evt_wait", unsafe { raw::sd_app_evt_wait() });
    }

    fn resume_clocks(&mut self) {
        check("sd_clock_hfclk_request", unsafe { raw::sd_clock_hfclk_request() });
    }

    fn reduce_clocks(&mut self) {
        check("sd_clock_hfclk_release", unsafe { raw::sd_clock_hfclk_release() });
    }
}

/// Periodic wakeup on RTC2 compare 0, cleared back to zero on every match.
pub struct Rtc2Tick;

impl Rtc2Tick {
    fn compare_value(interval_ms: u32) -> u32 {
        // 24-bit counter
        rtc_counts(interval_ms).clamp(1, 0x00FF_FFFF)
    }
}

impl TickTimer for Rtc2Tick {
    fn arm(&mut self, interval_ms: u32) {
        let rtc = pac::RTC2;
        let compare = Self::compare_value(interval_ms);

        rtc.tasks_stop().write_value(1);
        rtc.prescaler().write(|w| w.set_prescaler(RTC_PRESCALER));
        rtc.cc(0).write(|w| w.set_compare(compare));
        rtc.events_compare(0).write_value(0);
        rtc.intenset().write(|w| w.set_compare(0, true));
        rtc.tasks_clear().write_value(1);
        rtc.tasks_start().write_value(1);

        interrupt::RTC2.set_priority(TICK_PRIORITY);
        unsafe { interrupt::RTC2.enable() };
        debug!("Power: RTC2 tick armed, {} ms ({} counts)", interval_ms, compare);
    }

    fn clear_interrupt(&mut self) {
        let rtc = pac::RTC2;
        rtc.events_compare(0).write_value(0);
        rtc.tasks_clear().write_value(1);
    }
}

/// Let interrupts masked by a critical section still wake `sd_app_evt_wait`.
///
/// The executor never takes the core peripherals, so stealing SCB here does
/// not alias another owner.
pub fn enable_wake_on_pending() {
    let mut core = unsafe { cortex_m::Peripherals::steal() };
    core.SCB.set_sevonpend();
}
