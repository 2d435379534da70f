//! [`GattStack`] bindings for the Nordic SoftDevice.
//!
//! The SoftDevice builds a service synchronously, so provisioning goes
//! through [`ProvisioningStack`], which turns every accepted request into a
//! queued completion event. Once the table is built, [`RadioStack`] carries
//! the runtime requests for the current connection.

use core::cell::RefCell;

use defmt::{debug, info, warn};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use heapless::Deque;
use nrf_softdevice::ble::gatt_server::builder::ServiceBuilder;
use nrf_softdevice::ble::gatt_server::characteristic::{self, Attribute, Metadata};
use nrf_softdevice::ble::gatt_server::{self, NotifyValueError, RegisterError};
use nrf_softdevice::ble::{Connection, SetConnParamsError, Uuid as SdUuid};
use nrf_softdevice::{raw, RawError, Softdevice};

use swift_device::config::{BLE_MAX_WRITE_LEN, COMMAND_LEN, TELEMETRY_LEN};
use swift_device::gatt::{
    CharacteristicDef, ConnId, ConnParams, DescriptorDef, GattStack, GattStatus, Handle,
    InterfaceId, PeerAddress, Properties, ServiceDef, StackEvent, TransId, Uuid,
};
use swift_device::StackError;

/// Largest value the write characteristic accepts at the ATT layer. Any
/// write the MTU allows reaches the core, which rejects oversized commands.
const WRITE_ATTR_MAX_LEN: u16 = BLE_MAX_WRITE_LEN;

/// Stand-in service handle; the real one stays inside the builder.
const SERVICE_TOKEN: Handle = 1;

/// The SoftDevice hosts a single GATT server.
const INTERFACE: InterfaceId = 0;

const INVALID_STATE: StackError = StackError(raw::NRF_ERROR_INVALID_STATE);
const NOT_CONNECTED: StackError = StackError(raw::BLE_ERROR_INVALID_CONN_HANDLE);

fn raw_code(err: RawError) -> StackError {
    StackError(err as u32)
}

fn register_code(err: RegisterError) -> StackError {
    match err {
        RegisterError::Raw(raw) => raw_code(raw),
    }
}

fn sd_uuid(uuid: Uuid) -> SdUuid {
    match uuid {
        Uuid::Uuid16(short) => SdUuid::new_16(short),
        Uuid::Uuid128(long) => SdUuid::new_128(&long.to_le_bytes()),
    }
}

fn sd_properties(props: Properties) -> characteristic::Properties {
    let mut out = characteristic::Properties::new();
    if props.read {
        out = out.read();
    }
    if props.write {
        out = out.write();
    }
    if props.write_without_response {
        out = out.write_without_response();
    }
    if props.notify {
        out = out.notify();
    }
    if props.indicate {
        out = out.indicate();
    }
    out
}

pub struct ProvisioningStack<'a> {
    sd: RefCell<Option<&'a mut Softdevice>>,
    builder: RefCell<Option<ServiceBuilder<'a>>>,
    cccd: RefCell<Option<Handle>>,
    completions: RefCell<Deque<StackEvent<'static>, 4>>,
}

impl<'a> ProvisioningStack<'a> {
    pub fn new(sd: &'a mut Softdevice) -> Self {
        Self {
            sd: RefCell::new(Some(sd)),
            builder: RefCell::new(None),
            cccd: RefCell::new(None),
            completions: RefCell::new(Deque::new()),
        }
    }

    /// Next completion to feed back into the core, oldest first.
    pub fn next_completion(&self) -> Option<StackEvent<'static>> {
        self.completions.borrow_mut().pop_front()
    }

    fn complete(&self, event: StackEvent<'static>) -> Result<(), StackError> {
        self.completions
            .borrow_mut()
            .push_back(event)
            .map_err(|_| StackError(raw::NRF_ERROR_NO_MEM))
    }
}

impl GattStack for ProvisioningStack<'_> {
    fn register_server(&self) -> Result<(), StackError> {
        // Registration happened in `Softdevice::enable`.
        self.complete(StackEvent::Registered {
            interface: INTERFACE,
            status: GattStatus::OK,
        })
    }

    fn configure_advertising(&self) -> Result<(), StackError> {
        // Payloads are static, see `ble_task`.
        Ok(())
    }

    fn create_service(&self, _interface: InterfaceId, service: &ServiceDef) -> Result<(), StackError> {
        let sd = self.sd.borrow_mut().take().ok_or(INVALID_STATE)?;
        let builder = ServiceBuilder::new(sd, sd_uuid(service.uuid)).map_err(register_code)?;
        *self.builder.borrow_mut() = Some(builder);
        self.complete(StackEvent::ServiceCreated {
            service: SERVICE_TOKEN,
            status: GattStatus::OK,
        })
    }

    fn add_characteristic(
        &self,
        _service: Handle,
        characteristic: &CharacteristicDef,
    ) -> Result<(), StackError> {
        let mut builder = self.builder.borrow_mut();
        let builder = builder.as_mut().ok_or(INVALID_STATE)?;
        let metadata = Metadata::new(sd_properties(characteristic.properties));

        let handles = if characteristic.properties.notify {
            let attr = Attribute::new([0u8; TELEMETRY_LEN]);
            builder
                .add_characteristic(sd_uuid(characteristic.uuid), attr, metadata)
                .map_err(register_code)?
                .build()
        } else {
            let attr = Attribute::new([0u8; COMMAND_LEN]).variable_len(WRITE_ATTR_MAX_LEN);
            builder
                .add_characteristic(sd_uuid(characteristic.uuid), attr, metadata)
                .map_err(register_code)?
                .build()
        };

        if characteristic.properties.notify {
            *self.cccd.borrow_mut() = Some(handles.cccd_handle);
        }
        self.complete(StackEvent::CharacteristicAdded {
            attr: handles.value_handle,
            status: GattStatus::OK,
        })
    }

    fn add_descriptor(&self, _service: Handle, descriptor: &DescriptorDef) -> Result<(), StackError> {
        // The SoftDevice creates the CCCD together with a notify characteristic.
        let cccd = self.cccd.borrow().ok_or(INVALID_STATE)?;
        debug!("sd: CCCD {:?} already at handle {}", descriptor.uuid, cccd);
        self.complete(StackEvent::DescriptorAdded {
            attr: cccd,
            status: GattStatus::OK,
        })
    }

    fn start_service(&self, service: Handle) -> Result<(), StackError> {
        let builder = self.builder.borrow_mut().take().ok_or(INVALID_STATE)?;
        let _ = builder.build();
        self.complete(StackEvent::ServiceStarted {
            service,
            status: GattStatus::OK,
        })
    }

    fn send_notification(&self, _: InterfaceId, _: ConnId, _: Handle, _: &[u8], _: bool) -> Result<(), StackError> {
        Err(INVALID_STATE)
    }

    fn send_response(&self, _: InterfaceId, _: ConnId, _: TransId, _: GattStatus) -> Result<(), StackError> {
        Err(INVALID_STATE)
    }

    fn start_advertising(&self) -> Result<(), StackError> {
        Err(INVALID_STATE)
    }

    fn set_preferred_conn_params(&self, _: &PeerAddress, _: &ConnParams) -> Result<(), StackError> {
        Err(INVALID_STATE)
    }
}

/// Runtime requests against the current connection.
pub struct RadioStack {
    conn: Mutex<CriticalSectionRawMutex, RefCell<Option<Connection>>>,
}

impl RadioStack {
    pub const fn new() -> Self {
        Self {
            conn: Mutex::new(RefCell::new(None)),
        }
    }

    pub fn attach(&self, conn: Connection) {
        self.conn.lock(|c| *c.borrow_mut() = Some(conn));
    }

    pub fn detach(&self) {
        self.conn.lock(|c| *c.borrow_mut() = None);
    }

    fn current(&self) -> Result<Connection, StackError> {
        self.conn
            .lock(|c| c.borrow().clone())
            .ok_or(NOT_CONNECTED)
    }
}

impl GattStack for RadioStack {
    fn register_server(&self) -> Result<(), StackError> {
        Err(INVALID_STATE)
    }

    fn configure_advertising(&self) -> Result<(), StackError> {
        Err(INVALID_STATE)
    }

    fn create_service(&self, _: InterfaceId, _: &ServiceDef) -> Result<(), StackError> {
        Err(INVALID_STATE)
    }

    fn add_characteristic(&self, _: Handle, _: &CharacteristicDef) -> Result<(), StackError> {
        Err(INVALID_STATE)
    }

    fn add_descriptor(&self, _: Handle, _: &DescriptorDef) -> Result<(), StackError> {
        Err(INVALID_STATE)
    }

    fn start_service(&self, _: Handle) -> Result<(), StackError> {
        Err(INVALID_STATE)
    }

    fn send_notification(
        &self,
        _interface: InterfaceId,
        _conn: ConnId,
        handle: Handle,
        payload: &[u8],
        _confirm: bool,
    ) -> Result<(), StackError> {
        let conn = self.current()?;
        match gatt_server::notify_value(&conn, handle, payload) {
            Ok(()) => Ok(()),
            Err(NotifyValueError::Disconnected) => Err(NOT_CONNECTED),
            Err(NotifyValueError::Raw(err)) => Err(raw_code(err)),
        }
    }

    fn send_response(
        &self,
        _interface: InterfaceId,
        conn: ConnId,
        trans_id: TransId,
        _status: GattStatus,
    ) -> Result<(), StackError> {
        // Write requests are answered by the SoftDevice itself.
        debug!("sd: write response conn={} trans={} sent by stack", conn, trans_id);
        Ok(())
    }

    fn start_advertising(&self) -> Result<(), StackError> {
        // `ble_task` goes back to advertising as soon as the link drops.
        info!("sd: advertising restart queued");
        Ok(())
    }

    fn set_preferred_conn_params(&self, _peer: &PeerAddress, params: &ConnParams) -> Result<(), StackError> {
        let conn = self.current()?;
        let gap_params = raw::ble_gap_conn_params_t {
            min_conn_interval: params.min_interval,
            max_conn_interval: params.max_interval,
            slave_latency: params.latency,
            conn_sup_timeout: params.supervision_timeout,
        };
        conn.set_conn_params(gap_params).map_err(|e| match e {
            SetConnParamsError::Disconnected => NOT_CONNECTED,
            SetConnParamsError::Raw(err) => {
                warn!("sd: conn param update refused: {:?}", err);
                raw_code(err)
            }
        })
    }
}
