//! SoftDevice S140 radio adapter (firmware only).
//!
//! The power controller runs synchronously in the main task, while the
//! SoftDevice is driven by async tasks. They meet through:
//!
//! - [`RADIO_COMMANDS`]: advertising start/stop requests from the controller,
//! - [`RADIO_EVENTS`]: stack-ready / connect / disconnect for the main loop,
//! - [`RADIO_POWER`]: the radio power state, published by the radio task.
//!
//! [`SoftdeviceRadio`] implements [`RadioStack`] over those statics, so no
//! call from the controller ever awaits.

use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use ble_powerctl::ble::adv_data::build_advertisement;
use ble_powerctl::ble::{AdvSpeed, RadioEvent, RadioPowerState, RadioStack};
use ble_powerctl::config::DEVICE_NAME;
use ble_powerctl::error::RadioError;
use defmt::{debug, info, warn};
use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use nrf_softdevice::ble::{gatt_server, peripheral};
use nrf_softdevice::{raw, Softdevice};

/// Advertising requests from the power controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, defmt::Format)]
pub enum RadioCommand {
    Advertise(AdvSpeed),
    Stop,
}

pub static RADIO_COMMANDS: Channel<CriticalSectionRawMutex, RadioCommand, 8> = Channel::new();
pub static RADIO_EVENTS: Channel<CriticalSectionRawMutex, RadioEvent, 8> = Channel::new();
static RADIO_POWER: AtomicU8 = AtomicU8::new(RadioPowerState::DeepSleepReady.to_raw());
static STACK_READY: AtomicBool = AtomicBool::new(false);

fn publish(state: RadioPowerState) {
    RADIO_POWER.store(state.to_raw(), Ordering::Release);
}

fn report(event: RadioEvent) {
    if RADIO_EVENTS.try_send(event).is_err() {
        warn!("BLE: event queue full, dropped {:?}", event);
    }
}

#[nrf_softdevice::gatt_service(uuid = "180f")]
pub struct BatteryService {
    #[characteristic(uuid = "2a19", read, notify)]
    pub battery_level: u8,
}

#[nrf_softdevice::gatt_server]
pub struct Server {
    pub bas: BatteryService,
}

/// Handle the main loop uses to reach the radio task.
pub struct SoftdeviceRadio;

impl RadioStack for SoftdeviceRadio {
    fn start_advertising(&mut self, speed: AdvSpeed) -> Result<(), RadioError> {
        if !STACK_READY.load(Ordering::Acquire) {
            return Err(RadioError::NotReady);
        }
        RADIO_COMMANDS
            .try_send(RadioCommand::Advertise(speed))
            .map_err(|_| RadioError::CommandQueueFull)
    }

    fn stop_advertising(&mut self) {
        if RADIO_COMMANDS.try_send(RadioCommand::Stop).is_err() {
            warn!("BLE: command queue full, stop dropped");
        }
    }

    fn power_state(&self) -> RadioPowerState {
        RadioPowerState::from_raw(RADIO_POWER.load(Ordering::Acquire))
    }

    fn is_initializing(&self) -> bool {
        !STACK_READY.load(Ordering::Acquire)
    }

    fn poll_event(&mut self) -> Option<RadioEvent> {
        RADIO_EVENTS.try_receive().ok()
    }
}

/// SoftDevice configuration: LFXO clock, one peripheral link.
pub fn softdevice_config() -> nrf_softdevice::Config {
    nrf_softdevice::Config {
        clock: Some(raw::nrf_clock_lf_cfg_t {
            source: raw::NRF_CLOCK_LF_SRC_XTAL as u8,
            rc_ctiv: 0,
            rc_temp_ctiv: 0,
            accuracy: raw::NRF_CLOCK_LF_ACCURACY_20_PPM as u8,
        }),
        conn_gap: Some(raw::ble_gap_conn_cfg_t {
            conn_count: 1,
            event_length: 24,
        }),
        conn_gatt: Some(raw::ble_gatt_conn_cfg_t { att_mtu: 23 }),
        gatts_attr_tab_size: Some(raw::ble_gatts_cfg_attr_tab_size_t {
            attr_tab_size: raw::BLE_GATTS_ATTR_TAB_SIZE_DEFAULT,
        }),
        gap_role_count: Some(raw::ble_gap_cfg_role_count_t {
            adv_set_count: 1,
            periph_role_count: 1,
            central_role_count: 0,
            central_sec_count: 0,
            _bitfield_1: raw::ble_gap_cfg_role_count_t::new_bitfield_1(0),
        }),
        gap_device_name: Some(raw::ble_gap_cfg_device_name_t {
            p_value: DEVICE_NAME.as_ptr() as *const u8 as _,
            current_len: DEVICE_NAME.len() as u16,
            max_len: DEVICE_NAME.len() as u16,
            write_perm: unsafe { core::mem::zeroed() },
            _bitfield_1: raw::ble_gap_cfg_device_name_t::new_bitfield_1(raw::BLE_GATTS_VLOC_STACK as u8),
        }),
        ..Default::default()
    }
}

#[embassy_executor::task]
pub async fn softdevice_task(sd: &'static Softdevice) -> ! {
    sd.run().await
}

fn next_speed(command: RadioCommand) -> Option<AdvSpeed> {
    match command {
        RadioCommand::Advertise(speed) => Some(speed),
        RadioCommand::Stop => None,
    }
}

/// Owns advertising and the connection.
///
/// Idle until the first command. Advertises at the requested cadence until
/// a central connects, a new command arrives, or the fast window expires
/// (then it drops to slow advertising on its own). While connected it
/// serves GATT and discards advertising commands.
#[embassy_executor::task]
pub async fn radio_task(sd: &'static Softdevice, server: &'static Server) {
    let adv_data = build_advertisement(DEVICE_NAME);

    STACK_READY.store(true, Ordering::Release);
    report(RadioEvent::StackReady);

    let mut speed: Option<AdvSpeed> = None;
    loop {
        let Some(current) = speed else {
            publish(RadioPowerState::DeepSleepReady);
            speed = next_speed(RADIO_COMMANDS.receive().await);
            continue;
        };

        publish(match current {
            AdvSpeed::Fast => RadioPowerState::Active,
            AdvSpeed::Slow => RadioPowerState::EcoOn,
        });
        debug!("BLE: advertising {:?}", current);

        let config = peripheral::Config {
            interval: current.interval(),
            timeout: current.timeout(),
            ..Default::default()
        };
        let adv = peripheral::ConnectableAdvertisement::ScannableUndirected {
            adv_data: &adv_data,
            scan_data: &[],
        };

        match select(
            peripheral::advertise_connectable(sd, adv, &config),
            RADIO_COMMANDS.receive(),
        )
        .await
        {
            Either::First(Ok(conn)) => {
                publish(RadioPowerState::Active);
                report(RadioEvent::Connected);

                let serve = gatt_server::run(&conn, server, |event| match event {
                    ServerEvent::Bas(BatteryServiceEvent::BatteryLevelCccdWrite { notifications }) => {
                        info!("BLE: battery notifications {}", notifications);
                    }
                });
                let discard = async {
                    loop {
                        let command = RADIO_COMMANDS.receive().await;
                        debug!("BLE: {:?} ignored while connected", command);
                    }
                };
                select(serve, discard).await;

                report(RadioEvent::Disconnected);
                speed = None;
            }
            Either::First(Err(peripheral::AdvertiseError::Timeout)) => {
                info!("BLE: fast advertising window over, slowing down");
                speed = Some(AdvSpeed::Slow);
            }
            Either::First(Err(e)) => {
                warn!("BLE: advertising failed: {:?}", e);
                speed = None;
            }
            Either::Second(command) => speed = next_speed(command),
        }
    }
}
