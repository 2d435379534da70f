//! Telemetry payload source for the notify characteristic.

use crate::config::TELEMETRY_LEN;

/// Fixed-size telemetry notification.
pub type TelemetryPayload = [u8; TELEMETRY_LEN];

/// Produces telemetry payloads carrying a running counter.
///
/// The counter lives as long as the emitter, so it keeps counting across
/// unsubscribe / resubscribe and reconnects.
pub struct TelemetryEmitter {
    counter: u32,
}

impl TelemetryEmitter {
    pub const fn new() -> Self {
        Self { counter: 0 }
    }

    /// Value the next payload will carry.
    pub fn counter(&self) -> u32 {
        self.counter
    }

    /// Build the next payload and advance the counter.
    ///
    /// Bytes 0..2: low 16 bits of the counter, little-endian. The rest is
    /// reserved and zero.
    pub fn next_payload(&mut self) -> TelemetryPayload {
        let mut payload = [0u8; TELEMETRY_LEN];
        payload[..2].copy_from_slice(&(self.counter as u16).to_le_bytes());
        self.counter = self.counter.wrapping_add(1);
        payload
    }
}

impl Default for TelemetryEmitter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_carries_counter_le() {
        let mut emitter = TelemetryEmitter::new();
        assert_eq!(emitter.next_payload(), [0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(emitter.next_payload(), [1, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(emitter.counter(), 2);
    }

    #[test]
    fn counter_wraps_in_payload_but_keeps_counting() {
        let mut emitter = TelemetryEmitter { counter: 0xFFFF };
        assert_eq!(emitter.next_payload()[..2], [0xFFu8, 0xFF]);
        assert_eq!(emitter.next_payload()[..2], [0x00u8, 0x00]);
        assert_eq!(emitter.counter(), 0x1_0001);
    }

    #[test]
    fn counter_wraps_at_u32_max() {
        let mut emitter = TelemetryEmitter { counter: u32::MAX };
        emitter.next_payload();
        assert_eq!(emitter.counter(), 0);
    }
}
