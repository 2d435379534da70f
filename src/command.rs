//! Single-slot command channel.
//!
//! The dispatch context overwrites the slot with every command write; the
//! actuation tick drains it. Only the most recent command survives: an
//! unconsumed value is silently replaced.

use crate::config::COMMAND_LEN;
use crate::error::Error;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::signal::Signal;

/// Zero-padded command payload as stored in the slot.
pub type CommandBuf = [u8; COMMAND_LEN];

/// Latest-value cell. Overwrite and drain are atomic with respect to each
/// other, so a reader never sees a partially written buffer.
pub struct CommandSlot<M: RawMutex> {
    latest: Signal<M, CommandBuf>,
}

impl<M: RawMutex> CommandSlot<M> {
    pub const fn new() -> Self {
        Self {
            latest: Signal::new(),
        }
    }

    /// Store `payload`, zero-padded, replacing whatever was pending.
    ///
    /// Payloads longer than [`COMMAND_LEN`] are rejected and the slot is
    /// left untouched.
    pub fn overwrite(&self, payload: &[u8]) -> Result<(), Error> {
        if payload.len() > COMMAND_LEN {
            return Err(Error::PayloadTooLong { len: payload.len() });
        }
        let mut buf = [0u8; COMMAND_LEN];
        buf[..payload.len()].copy_from_slice(payload);
        self.latest.signal(buf);
        Ok(())
    }

    /// Take the pending command without blocking.
    pub fn take(&self) -> Option<CommandBuf> {
        self.latest.try_take()
    }

    pub fn is_pending(&self) -> bool {
        self.latest.signaled()
    }
}

impl<M: RawMutex> Default for CommandSlot<M> {
    fn default() -> Self {
        Self::new()
    }
}

/// Command value carried in the first two bytes, little-endian.
pub fn decode_command(buf: &CommandBuf) -> u16 {
    u16::from_le_bytes([buf[0], buf[1]])
}
