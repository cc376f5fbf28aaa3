//! ble-powerctl firmware entry point (nRF52840 + SoftDevice S140).
//!
//! Boot order:
//! 1. embassy HAL with interrupt priorities compatible with the SoftDevice
//! 2. SoftDevice + GATT server, radio tasks spawned
//! 3. RTC2 tick armed, wake-on-pending enabled
//! 4. wait for the stack, then run the power controller's main loop
//!
//! The main loop runs one controller iteration, then waits for the next
//! tick or radio event while Active. In any other state it only yields, so
//! pending sleep and wake transitions are applied without delay.

#![no_std]
#![no_main]

mod board;
#[path = "ble/softdevice.rs"]
mod radio;

use ble_powerctl::ble::RadioStack;
use ble_powerctl::config::{PowerConfig, STACK_POLL_MS};
use ble_powerctl::driver::Driver;
use ble_powerctl::hw::TickTimer;
use ble_powerctl::power::PowerController;
use ble_powerctl::power_logic::PowerState;
use defmt::{info, unwrap};
use embassy_executor::Spawner;
use embassy_futures::select::select;
use embassy_futures::yield_now;
use embassy_nrf::interrupt;
use embassy_nrf::interrupt::Priority;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Timer};
use nrf_softdevice::Softdevice;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use crate::board::{NrfPower, Rtc2Tick};
use crate::radio::{Server, SoftdeviceRadio, RADIO_EVENTS};

static POWER: PowerController = PowerController::new(PowerConfig::DEFAULT);

/// Raised by the tick ISR to wake the main task.
static TICK: Signal<CriticalSectionRawMutex, ()> = Signal::new();

#[interrupt]
fn RTC2() {
    POWER.on_timer_interrupt(&mut Rtc2Tick);
    TICK.signal(());
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("ble-powerctl starting");

    let mut nrf_config = embassy_nrf::config::Config::default();
    nrf_config.gpiote_interrupt_priority = Priority::P2;
    nrf_config.time_interrupt_priority = Priority::P2;
    let _p = embassy_nrf::init(nrf_config);

    let sd = Softdevice::enable(&radio::softdevice_config());
    static SERVER: StaticCell<Server> = StaticCell::new();
    let server = SERVER.init(unwrap!(Server::new(sd)));
    unwrap!(server.bas.battery_level_set(&100));

    unwrap!(spawner.spawn(radio::softdevice_task(sd)));
    unwrap!(spawner.spawn(radio::radio_task(sd, server)));

    board::enable_wake_on_pending();
    Rtc2Tick.arm(POWER.config().timer_interval_ms);

    let mut driver = Driver::new(&POWER, SoftdeviceRadio, NrfPower, ());

    // The stack comes up in its own task; poll instead of blocking it.
    loop {
        driver.process_events();
        if !driver.radio().is_initializing() {
            break;
        }
        Timer::after(Duration::from_millis(STACK_POLL_MS)).await;
    }
    info!("Power: controller running, {:?}", POWER.config());

    loop {
        if driver.run_once() == PowerState::Active {
            select(TICK.wait(), RADIO_EVENTS.ready_to_receive()).await;
        } else {
            yield_now().await;
        }
    }
}
