//! GATT server core.
//!
//! The BLE stack is an external collaborator: every request goes out
//! through [`GattStack`] and completes later as a [`StackEvent`]. This
//! module drives, in order:
//!
//! 1. **Provisioning** - register, create the service, add the notify
//!    characteristic, its CCCD, the write characteristic, start.
//! 2. **Connection lifecycle** - tracks the peer and the CCCD subscription,
//!    starting and stopping the telemetry emitter.
//! 3. **Write ingestion** - command writes land in a single-slot channel
//!    drained by the actuation tick.
//!
//! All of it is owned by [`Peripheral`](peripheral::Peripheral).

pub mod link;
pub mod peripheral;
pub mod provision;

use crate::config;
use crate::error::StackError;

/// Attribute handle assigned by the stack.
pub type Handle = u16;

/// Connection identifier assigned by the stack.
pub type ConnId = u16;

/// Identifies this server instance on the stack.
pub type InterfaceId = u8;

/// Correlates a write with its response.
pub type TransId = u32;

/// Six-byte Bluetooth device address.
pub type PeerAddress = [u8; 6];

/// ATT / stack status code reported by a completion event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GattStatus(pub u16);

impl GattStatus {
    pub const OK: GattStatus = GattStatus(0);

    pub fn is_ok(&self) -> bool {
        *self == Self::OK
    }
}

/// Attribute type identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Uuid {
    /// Bluetooth SIG assigned 16-bit UUID.
    Uuid16(u16),
    /// Vendor-specific 128-bit UUID.
    Uuid128(u128),
}

/// Attribute access permissions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Permissions {
    pub read: bool,
    pub write: bool,
}

impl Permissions {
    pub const fn new() -> Self {
        Self {
            read: false,
            write: false,
        }
    }

    pub const fn read(mut self) -> Self {
        self.read = true;
        self
    }

    pub const fn write(mut self) -> Self {
        self.write = true;
        self
    }
}

/// Characteristic properties advertised to the peer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Properties {
    pub read: bool,
    pub write: bool,
    pub write_without_response: bool,
    pub notify: bool,
    pub indicate: bool,
}

impl Properties {
    pub const fn new() -> Self {
        Self {
            read: false,
            write: false,
            write_without_response: false,
            notify: false,
            indicate: false,
        }
    }

    pub const fn read(mut self) -> Self {
        self.read = true;
        self
    }

    pub const fn write(mut self) -> Self {
        self.write = true;
        self
    }

    pub const fn write_without_response(mut self) -> Self {
        self.write_without_response = true;
        self
    }

    pub const fn notify(mut self) -> Self {
        self.notify = true;
        self
    }

    pub const fn indicate(mut self) -> Self {
        self.indicate = true;
        self
    }
}

/// Service declaration passed to [`GattStack::create_service`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ServiceDef {
    pub uuid: Uuid,
    pub primary: bool,
    pub handle_hint: u16,
}

/// Characteristic declaration passed to [`GattStack::add_characteristic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CharacteristicDef {
    pub uuid: Uuid,
    pub permissions: Permissions,
    pub properties: Properties,
}

/// Descriptor declaration passed to [`GattStack::add_descriptor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DescriptorDef {
    pub uuid: Uuid,
    pub permissions: Permissions,
}

pub const SERVICE: ServiceDef = ServiceDef {
    uuid: Uuid::Uuid128(config::SERVICE_UUID),
    primary: true,
    handle_hint: config::SERVICE_HANDLE_HINT,
};

/// Telemetry characteristic: notify only.
pub const NOTIFY_CHARACTERISTIC: CharacteristicDef = CharacteristicDef {
    uuid: Uuid::Uuid128(config::NOTIFY_CHAR_UUID),
    permissions: Permissions::new().read().write(),
    properties: Properties::new().notify(),
};

/// Subscription descriptor for the telemetry characteristic.
pub const CCCD: DescriptorDef = DescriptorDef {
    uuid: Uuid::Uuid16(config::CCCD_UUID),
    permissions: Permissions::new().read().write(),
};

/// Command characteristic: write with and without response.
pub const WRITE_CHARACTERISTIC: CharacteristicDef = CharacteristicDef {
    uuid: Uuid::Uuid128(config::WRITE_CHAR_UUID),
    permissions: Permissions::new().read().write(),
    properties: Properties::new().write().write_without_response(),
};

/// Preferred connection parameters (1.25 ms / 10 ms units).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnParams {
    pub min_interval: u16,
    pub max_interval: u16,
    pub latency: u16,
    pub supervision_timeout: u16,
}

/// 7.5 ms .. 15 ms interval, no latency, 4 s supervision timeout.
pub const PREFERRED_CONN_PARAMS: ConnParams = ConnParams {
    min_interval: config::BLE_CONN_INTERVAL_MIN,
    max_interval: config::BLE_CONN_INTERVAL_MAX,
    latency: config::BLE_SLAVE_LATENCY,
    supervision_timeout: config::BLE_SUP_TIMEOUT,
};

/// Outbound request kinds, used to tag request failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Request {
    RegisterServer,
    ConfigureAdvertising,
    CreateService,
    AddCharacteristic,
    AddDescriptor,
    StartService,
    SendNotification,
    SendResponse,
    StartAdvertising,
    UpdateConnParams,
}

/// An inbound attribute write (characteristic value or descriptor).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WriteRequest<'a> {
    pub conn: ConnId,
    pub trans_id: TransId,
    pub handle: Handle,
    pub value: &'a [u8],
    pub need_response: bool,
}

/// Events delivered by the stack's serialized dispatch context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StackEvent<'a> {
    Registered {
        interface: InterfaceId,
        status: GattStatus,
    },
    ServiceCreated {
        service: Handle,
        status: GattStatus,
    },
    /// Reported for both characteristics; identity comes from the pending request.
    CharacteristicAdded {
        attr: Handle,
        status: GattStatus,
    },
    DescriptorAdded {
        attr: Handle,
        status: GattStatus,
    },
    ServiceStarted {
        service: Handle,
        status: GattStatus,
    },
    Connected {
        conn: ConnId,
        peer: PeerAddress,
    },
    Disconnected,
    Write(WriteRequest<'a>),
    MtuExchanged {
        mtu: u16,
    },
    /// Stack-level acknowledgement of a sent notification.
    NotifyConfirmed {
        status: GattStatus,
    },
    /// Stack-level acknowledgement of a sent write response.
    ResponseSent {
        status: GattStatus,
    },
}

/// Outbound side of the BLE stack.
///
/// Every call is fire-and-forget: `Ok` means the request was accepted and
/// its completion (if any) will arrive later as a [`StackEvent`]. `Err`
/// means it was refused and nothing will follow. Implementations must not
/// deliver completions re-entrantly from inside these calls.
pub trait GattStack {
    fn register_server(&self) -> Result<(), StackError>;

    /// Load the advertising and scan response payloads.
    fn configure_advertising(&self) -> Result<(), StackError>;

    fn create_service(&self, interface: InterfaceId, service: &ServiceDef)
        -> Result<(), StackError>;

    fn add_characteristic(
        &self,
        service: Handle,
        characteristic: &CharacteristicDef,
    ) -> Result<(), StackError>;

    fn add_descriptor(&self, service: Handle, descriptor: &DescriptorDef)
        -> Result<(), StackError>;

    fn start_service(&self, service: Handle) -> Result<(), StackError>;

    fn send_notification(
        &self,
        interface: InterfaceId,
        conn: ConnId,
        handle: Handle,
        payload: &[u8],
        confirm: bool,
    ) -> Result<(), StackError>;

    /// Answer a write that asked for a response. No payload is ever attached.
    fn send_response(
        &self,
        interface: InterfaceId,
        conn: ConnId,
        trans_id: TransId,
        status: GattStatus,
    ) -> Result<(), StackError>;

    fn start_advertising(&self) -> Result<(), StackError>;

    fn set_preferred_conn_params(
        &self,
        peer: &PeerAddress,
        params: &ConnParams,
    ) -> Result<(), StackError>;
}
