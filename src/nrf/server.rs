//! SoftDevice GATT server glue - forwards attribute writes to the core.

use defmt::debug;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use nrf_softdevice::ble::gatt_server::{self, WriteOp};
use nrf_softdevice::ble::Connection;

use swift_device::{Peripheral, StackEvent, WriteRequest};

use super::stack::RadioStack;

pub struct Server {
    peripheral: &'static Peripheral<CriticalSectionRawMutex>,
    stack: &'static RadioStack,
}

impl Server {
    pub const fn new(
        peripheral: &'static Peripheral<CriticalSectionRawMutex>,
        stack: &'static RadioStack,
    ) -> Self {
        Self { peripheral, stack }
    }
}

impl gatt_server::Server for Server {
    type Event = ();

    fn on_write(
        &self,
        conn: &Connection,
        handle: u16,
        op: WriteOp,
        _offset: usize,
        data: &[u8],
    ) -> Option<Self::Event> {
        let write = WriteRequest {
            conn: conn.handle().unwrap_or_default(),
            trans_id: 0,
            handle,
            value: data,
            need_response: matches!(op, WriteOp::Request),
        };
        if let Err(e) = self.peripheral.handle_event(&StackEvent::Write(write), self.stack) {
            debug!("gatt: write to {} dropped: {:?}", handle, e);
        }
        None
    }
}
