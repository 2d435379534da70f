//! Application-wide constants and compile-time configuration.
//!
//! Attribute identifiers, timing parameters, and actuator scaling live
//! here so they can be tuned in one place.

// GATT service

/// Primary service UUID (vendor-specific 128-bit).
pub const SERVICE_UUID: u128 = 0x6E400001_B5A3_F393_E0A9_E50E24DCCA9E;

/// Telemetry characteristic (notify). Same base, discriminator `0x02`.
pub const NOTIFY_CHAR_UUID: u128 = 0x6E400002_B5A3_F393_E0A9_E50E24DCCA9E;

/// Command characteristic (write / write-without-response). Discriminator `0x03`.
pub const WRITE_CHAR_UUID: u128 = 0x6E400003_B5A3_F393_E0A9_E50E24DCCA9E;

/// Client Characteristic Configuration Descriptor (Bluetooth SIG assigned).
pub const CCCD_UUID: u16 = 0x2902;

/// Number of attribute handles reserved for the service.
pub const SERVICE_HANDLE_HINT: u16 = 12;

// Payloads

/// Size of a telemetry notification (bytes).
pub const TELEMETRY_LEN: usize = 10;

/// Capacity of the command slot (bytes). Longer writes are rejected.
pub const COMMAND_LEN: usize = 10;

// Timing

/// Telemetry notification period (ms).
pub const NOTIFY_PERIOD_MS: u64 = 30;

/// Command slot polling period (ms).
pub const COMMAND_POLL_MS: u64 = 100;

// Actuator

/// Number of brightness steps; levels fold over `[0, MAX_LEVEL - 1]`.
pub const MAX_LEVEL: u16 = 34;

/// Full-scale PWM duty (13-bit resolution).
pub const MAX_DUTY: u16 = 8191;

/// The on-board LED is wired active-low: full duty means off.
pub const ACTUATOR_ACTIVE_LOW: bool = true;

// BLE

/// Complete local name carried in the advertising data.
pub const DEVICE_NAME: &str = "SwiftDevice";

/// Advertising interval (in 0.625 ms units). 64 = 40 ms.
pub const BLE_ADV_INTERVAL: u32 = 64;

/// BLE connection interval range (in 1.25 ms units).
/// 6 = 7.5 ms, 12 = 15 ms.
pub const BLE_CONN_INTERVAL_MIN: u16 = 6;
pub const BLE_CONN_INTERVAL_MAX: u16 = 12;

/// BLE slave latency (number of connection events the peripheral can skip).
pub const BLE_SLAVE_LATENCY: u16 = 0;

/// BLE supervision timeout (in 10 ms units). 400 = 4 s.
pub const BLE_SUP_TIMEOUT: u16 = 400;

/// ATT MTU offered to the central (bytes).
pub const BLE_ATT_MTU: u16 = 247;

/// Largest attribute value one ATT write can carry (MTU minus opcode and handle).
pub const BLE_MAX_WRITE_LEN: u16 = BLE_ATT_MTU - 3;
