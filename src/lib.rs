//! Host-testable library for ble-powerctl.
//!
//! Everything the power controller decides lives here, written against
//! small traits (`RadioStack`, `PowerPrimitives`, `TickTimer`,
//! `Application`) so it runs unchanged on the nRF52840 and on the host.
//!
//! Usage: `cargo test` (host) - the `sim` module provides recording
//! doubles for every hardware seam.
//!
//! Note: The embedded binary uses main.rs with #![no_std] and #![no_main]
//! and binds these traits to the SoftDevice and the nRF52840 registers.

#![cfg_attr(not(test), no_std)]

pub mod activity;
pub mod ble;
pub mod config;
pub mod driver;
pub mod error;
pub mod hw;
pub mod power;
pub mod power_logic;
pub mod sim;

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests
// ═══════════════════════════════════════════════════════════════════════════
