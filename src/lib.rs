//! swift-device - BLE peripheral core for nRF52840.
//!
//! Everything that does not touch hardware lives in this library so it can
//! be tested on the host:
//!
//! - [`gatt`] - service provisioning, connection lifecycle, write routing
//! - [`telemetry`] - notification payloads
//! - [`command`] - single-slot command channel
//! - [`triangle`] / [`actuator`] - command to output level to duty
//!
//! Usage: `cargo test` (host) or `cargo run --release --features embedded`
//! (target, via probe-rs).
//!
//! The firmware binary in `main.rs` binds [`gatt::GattStack`] to the Nordic
//! SoftDevice and [`actuator::Actuator`] to a PWM channel.

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod actuator;
pub mod command;
pub mod config;
pub mod error;
pub mod gatt;
pub mod telemetry;
pub mod triangle;

pub use actuator::{Actuator, DutyScale, LevelDriver};
pub use command::{decode_command, CommandBuf, CommandSlot};
pub use error::{Error, StackError};
pub use gatt::peripheral::{Peripheral, Snapshot};
pub use gatt::{GattStack, StackEvent, WriteRequest};
pub use telemetry::TelemetryEmitter;
pub use triangle::triangle_level;
