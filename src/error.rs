//! Unified error type for swift-device.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` for efficient on-target logging.

use crate::gatt::provision::PendingOp;
use crate::gatt::{GattStatus, Request};

/// Top-level error type used across the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// A provisioning step completed with a non-OK status.
    ///
    /// The service stays non-functional until the device restarts.
    Provisioning {
        step: PendingOp,
        status: GattStatus,
    },

    /// A write payload exceeded the command slot capacity.
    PayloadTooLong { len: usize },

    /// The stack refused a request outright.
    Request { request: Request, code: StackError },

    /// An event that is not legal in the current state, or for an unknown handle.
    UnexpectedEvent,
}

/// Raw error code returned synchronously by the BLE stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StackError(pub u32);

impl Error {
    /// Transient failures are logged and forgotten; everything else is
    /// either a stall or a dropped input.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Request {
                request: Request::StartAdvertising
                    | Request::UpdateConnParams
                    | Request::ConfigureAdvertising
                    | Request::SendNotification
                    | Request::SendResponse,
                ..
            }
        )
    }
}
