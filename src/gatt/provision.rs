//! Service provisioning state machine.
//!
//! Stands up the attribute hierarchy one stack round-trip at a time:
//!
//! ```text
//! Idle -> Registered -> ServiceCreated -> NotifyCharAdded
//!      -> DescriptorAdded -> WriteCharAdded -> Started
//! ```
//!
//! Every transition is triggered by a completion event and issues exactly
//! one new request. The request is remembered as a [`PendingOp`]; a
//! completion is only accepted when it answers the outstanding request.
//! That is also how the two "characteristic added" completions are told
//! apart.
//!
//! There is no retry and no deadline. A failed step stalls the machine
//! until [`Provisioner::reset`]; [`Provisioner::awaiting`] lets a supervisor
//! notice a step that never completes.

use super::{
    GattStack, GattStatus, Handle, InterfaceId, Request, StackEvent, CCCD,
    NOTIFY_CHARACTERISTIC, SERVICE, WRITE_CHARACTERISTIC,
};
use crate::error::{Error, StackError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProvisionState {
    Idle,
    Registered,
    ServiceCreated,
    NotifyCharAdded,
    DescriptorAdded,
    WriteCharAdded,
    Started,
}

/// The request whose completion the machine is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PendingOp {
    Register,
    CreateService,
    AddNotifyCharacteristic,
    AddCccd,
    AddWriteCharacteristic,
    StartService,
}

impl PendingOp {
    fn request(self) -> Request {
        match self {
            PendingOp::Register => Request::RegisterServer,
            PendingOp::CreateService => Request::CreateService,
            PendingOp::AddNotifyCharacteristic | PendingOp::AddWriteCharacteristic => {
                Request::AddCharacteristic
            }
            PendingOp::AddCccd => Request::AddDescriptor,
            PendingOp::StartService => Request::StartService,
        }
    }
}

/// Handles assigned during provisioning. Each is set once, in order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ServiceHandleTable {
    interface: Option<InterfaceId>,
    service: Option<Handle>,
    notify_char: Option<Handle>,
    cccd: Option<Handle>,
    write_char: Option<Handle>,
}

impl ServiceHandleTable {
    pub const fn new() -> Self {
        Self {
            interface: None,
            service: None,
            notify_char: None,
            cccd: None,
            write_char: None,
        }
    }

    pub fn interface(&self) -> Option<InterfaceId> {
        self.interface
    }

    pub fn service(&self) -> Option<Handle> {
        self.service
    }

    pub fn notify_char(&self) -> Option<Handle> {
        self.notify_char
    }

    pub fn cccd(&self) -> Option<Handle> {
        self.cccd
    }

    pub fn write_char(&self) -> Option<Handle> {
        self.write_char
    }
}

pub struct Provisioner {
    state: ProvisionState,
    awaiting: Option<PendingOp>,
    handles: ServiceHandleTable,
    last_failure: Option<Error>,
}

impl Provisioner {
    pub const fn new() -> Self {
        Self {
            state: ProvisionState::Idle,
            awaiting: None,
            handles: ServiceHandleTable::new(),
            last_failure: None,
        }
    }

    pub fn state(&self) -> ProvisionState {
        self.state
    }

    pub fn handles(&self) -> &ServiceHandleTable {
        &self.handles
    }

    /// Outstanding request, if any.
    pub fn awaiting(&self) -> Option<PendingOp> {
        self.awaiting
    }

    /// Failure that stalled the machine, if any.
    pub fn last_failure(&self) -> Option<Error> {
        self.last_failure
    }

    pub fn is_started(&self) -> bool {
        self.state == ProvisionState::Started
    }

    /// Full teardown: forget every handle and go back to `Idle`.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Ask the stack to register the server.
    ///
    /// Registration may also be requested by whoever brings the stack up;
    /// the `Registered` completion is accepted in `Idle` either way.
    pub fn start(&mut self, stack: &impl GattStack) -> Result<(), Error> {
        if self.state != ProvisionState::Idle
            || self.awaiting.is_some()
            || self.last_failure.is_some()
        {
            debug!("provision: start ignored in {}", self.state);
            return Err(Error::UnexpectedEvent);
        }
        info!("provision: registering GATT server");
        self.issue(PendingOp::Register, stack.register_server())
    }

    /// Feed a provisioning completion event.
    pub fn on_event(&mut self, event: &StackEvent<'_>, stack: &impl GattStack) -> Result<(), Error> {
        if let Some(failure) = self.last_failure {
            debug!("provision: stalled by {}, dropping {}", failure, event);
            return Err(Error::UnexpectedEvent);
        }

        match (self.state, *event) {
            (ProvisionState::Idle, StackEvent::Registered { interface, status }) => {
                self.complete(PendingOp::Register, status)?;
                self.handles.interface = Some(interface);
                self.state = ProvisionState::Registered;
                info!("provision: registered, interface={}", interface);

                if let Err(code) = stack.configure_advertising() {
                    error!("provision: advertising data config failed, code={}", code.0);
                }
                self.issue(
                    PendingOp::CreateService,
                    stack.create_service(interface, &SERVICE),
                )
            }

            (ProvisionState::Registered, StackEvent::ServiceCreated { service, status }) => {
                self.complete(PendingOp::CreateService, status)?;
                self.handles.service = Some(service);
                self.state = ProvisionState::ServiceCreated;
                info!("provision: service created, handle={}", service);

                self.issue(
                    PendingOp::AddNotifyCharacteristic,
                    stack.add_characteristic(service, &NOTIFY_CHARACTERISTIC),
                )
            }

            (ProvisionState::ServiceCreated, StackEvent::CharacteristicAdded { attr, status }) => {
                self.complete(PendingOp::AddNotifyCharacteristic, status)?;
                self.handles.notify_char = Some(attr);
                self.state = ProvisionState::NotifyCharAdded;
                info!("provision: notify characteristic added, handle={}", attr);

                let service = self.service_handle()?;
                self.issue(PendingOp::AddCccd, stack.add_descriptor(service, &CCCD))
            }

            (ProvisionState::NotifyCharAdded, StackEvent::DescriptorAdded { attr, status }) => {
                self.complete(PendingOp::AddCccd, status)?;
                self.handles.cccd = Some(attr);
                self.state = ProvisionState::DescriptorAdded;
                info!("provision: CCCD added, handle={}", attr);

                let service = self.service_handle()?;
                self.issue(
                    PendingOp::AddWriteCharacteristic,
                    stack.add_characteristic(service, &WRITE_CHARACTERISTIC),
                )
            }

            (ProvisionState::DescriptorAdded, StackEvent::CharacteristicAdded { attr, status }) => {
                self.complete(PendingOp::AddWriteCharacteristic, status)?;
                self.handles.write_char = Some(attr);
                self.state = ProvisionState::WriteCharAdded;
                info!("provision: write characteristic added, handle={}", attr);

                let service = self.service_handle()?;
                self.issue(PendingOp::StartService, stack.start_service(service))
            }

            (ProvisionState::WriteCharAdded, StackEvent::ServiceStarted { service, status }) => {
                self.complete(PendingOp::StartService, status)?;
                self.state = ProvisionState::Started;
                info!("provision: service started, handle={}", service);
                Ok(())
            }

            (state, event) => {
                debug!("provision: {} not expected in {}", event, state);
                Err(Error::UnexpectedEvent)
            }
        }
    }

    /// Check that a completion answers the outstanding request and succeeded.
    fn complete(&mut self, op: PendingOp, status: GattStatus) -> Result<(), Error> {
        let answered = match self.awaiting {
            Some(pending) => pending == op,
            None => op == PendingOp::Register,
        };
        if !answered {
            debug!("provision: completion for {} while awaiting {}", op, self.awaiting);
            return Err(Error::UnexpectedEvent);
        }

        if !status.is_ok() {
            let failure = Error::Provisioning { step: op, status };
            error!("provision: {} failed, status={}", op, status.0);
            self.awaiting = Some(op);
            self.last_failure = Some(failure);
            return Err(failure);
        }
        self.awaiting = None;
        Ok(())
    }

    fn issue(&mut self, op: PendingOp, result: Result<(), StackError>) -> Result<(), Error> {
        match result {
            Ok(()) => {
                self.awaiting = Some(op);
                Ok(())
            }
            Err(code) => {
                let failure = Error::Request {
                    request: op.request(),
                    code,
                };
                error!("provision: {} request refused, code={}", op, code.0);
                self.last_failure = Some(failure);
                Err(failure)
            }
        }
    }

    fn service_handle(&self) -> Result<Handle, Error> {
        self.handles.service.ok_or(Error::UnexpectedEvent)
    }
}

impl Default for Provisioner {
    fn default() -> Self {
        Self::new()
    }
}
