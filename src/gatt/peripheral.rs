//! Owner of all shared GATT state.
//!
//! The stack's dispatch context mutates state through [`Peripheral::handle_event`];
//! the two timer contexts only read a [`Snapshot`] (notify tick) or drain the
//! command slot (actuation tick). Everything mutable sits behind one blocking
//! mutex, the command slot has its own.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;

use super::link::{ConnectionState, Link};
use super::provision::{PendingOp, ProvisionState, Provisioner, ServiceHandleTable};
use super::{ConnId, GattStack, GattStatus, Handle, InterfaceId, Request, StackEvent, WriteRequest};
use crate::actuator::{Actuator, LevelDriver};
use crate::command::CommandSlot;
use crate::error::Error;
use crate::telemetry::TelemetryEmitter;

struct Inner {
    provisioner: Provisioner,
    link: Link,
}

/// Point-in-time copy of the shared state, for the timer contexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Snapshot {
    pub provision: ProvisionState,
    pub awaiting: Option<PendingOp>,
    pub last_failure: Option<Error>,
    pub handles: ServiceHandleTable,
    pub connection: ConnectionState,
    pub emitter_running: bool,
}

impl Snapshot {
    /// Where the next telemetry notification goes, if one should go at all.
    pub fn notify_target(&self) -> Option<(InterfaceId, ConnId, Handle)> {
        if !self.emitter_running || !self.connection.notifications_enabled() {
            return None;
        }
        Some((
            self.handles.interface()?,
            self.connection.conn()?,
            self.handles.notify_char()?,
        ))
    }
}

pub struct Peripheral<M: RawMutex> {
    state: Mutex<M, RefCell<Inner>>,
    commands: CommandSlot<M>,
}

impl<M: RawMutex> Peripheral<M> {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(RefCell::new(Inner {
                provisioner: Provisioner::new(),
                link: Link::new(),
            })),
            commands: CommandSlot::new(),
        }
    }

    /// Kick off provisioning by registering the server.
    pub fn start(&self, stack: &impl GattStack) -> Result<(), Error> {
        self.state
            .lock(|cell| cell.borrow_mut().provisioner.start(stack))
    }

    /// Forget every handle, the connection and any pending command.
    pub fn reset(&self) {
        self.state.lock(|cell| {
            let mut inner = cell.borrow_mut();
            inner.provisioner.reset();
            inner.link = Link::new();
        });
        let _ = self.commands.take();
        info!("peripheral: reset");
    }

    /// Dispatch one stack event.
    ///
    /// Must be called from a single context, one event at a time. Stack
    /// requests are issued while the state lock is held, so the stack must
    /// not call back into this method synchronously.
    pub fn handle_event(&self, event: &StackEvent<'_>, stack: &impl GattStack) -> Result<(), Error> {
        self.state.lock(|cell| {
            let mut inner = cell.borrow_mut();
            let inner = &mut *inner;

            match *event {
                StackEvent::Registered { .. }
                | StackEvent::ServiceCreated { .. }
                | StackEvent::CharacteristicAdded { .. }
                | StackEvent::DescriptorAdded { .. }
                | StackEvent::ServiceStarted { .. } => inner.provisioner.on_event(event, stack),

                StackEvent::Connected { conn, peer } => {
                    inner.link.on_connect(conn, peer, stack);
                    Ok(())
                }

                StackEvent::Disconnected => {
                    inner.link.on_disconnect(stack);
                    Ok(())
                }

                StackEvent::Write(ref write) => self.on_write(inner, write, stack),

                StackEvent::MtuExchanged { mtu } => {
                    info!("peripheral: MTU exchanged, mtu={}", mtu);
                    Ok(())
                }

                StackEvent::NotifyConfirmed { status } => {
                    if !status.is_ok() {
                        error!("peripheral: notification failed, status={}", status.0);
                    }
                    Ok(())
                }

                StackEvent::ResponseSent { status } => {
                    if !status.is_ok() {
                        error!("peripheral: response failed, status={}", status.0);
                    }
                    Ok(())
                }
            }
        })
    }

    /// Route a write by handle, then answer it if the peer asked.
    ///
    /// The answer is always OK: it acknowledges the transaction, not the
    /// payload, so an oversized command still gets one.
    fn on_write(
        &self,
        inner: &mut Inner,
        write: &WriteRequest<'_>,
        stack: &impl GattStack,
    ) -> Result<(), Error> {
        let handles = *inner.provisioner.handles();

        let outcome = if handles.cccd() == Some(write.handle) {
            inner.link.on_subscription_write(write.value);
            Ok(())
        } else if handles.write_char() == Some(write.handle) {
            let stored = self.commands.overwrite(write.value);
            match stored {
                Ok(()) => trace!("peripheral: command stored, len={}", write.value.len()),
                Err(_) => warn!(
                    "peripheral: command rejected, len={} > {}",
                    write.value.len(),
                    crate::config::COMMAND_LEN
                ),
            }
            stored
        } else {
            debug!("peripheral: write to unknown handle {}", write.handle);
            return Err(Error::UnexpectedEvent);
        };

        if write.need_response {
            if let Some(interface) = handles.interface() {
                if let Err(code) =
                    stack.send_response(interface, write.conn, write.trans_id, GattStatus::OK)
                {
                    error!("peripheral: send response failed, code={}", code.0);
                }
            }
        }

        outcome
    }

    pub fn snapshot(&self) -> Snapshot {
        self.state.lock(|cell| {
            let inner = cell.borrow();
            Snapshot {
                provision: inner.provisioner.state(),
                awaiting: inner.provisioner.awaiting(),
                last_failure: inner.provisioner.last_failure(),
                handles: *inner.provisioner.handles(),
                connection: *inner.link.state(),
                emitter_running: inner.link.emitter_running(),
            }
        })
    }

    pub fn commands(&self) -> &CommandSlot<M> {
        &self.commands
    }

    /// One emitter period: send the next telemetry payload if subscribed.
    ///
    /// Returns whether a notification went out. The counter only advances
    /// when a payload is built.
    pub fn notify_tick(
        &self,
        emitter: &mut TelemetryEmitter,
        stack: &impl GattStack,
    ) -> Result<bool, Error> {
        let Some((interface, conn, handle)) = self.snapshot().notify_target() else {
            return Ok(false);
        };

        let payload = emitter.next_payload();
        match stack.send_notification(interface, conn, handle, &payload, false) {
            Ok(()) => Ok(true),
            Err(code) => {
                warn!("peripheral: notify failed, code={}", code.0);
                Err(Error::Request {
                    request: Request::SendNotification,
                    code,
                })
            }
        }
    }

    /// One consumer period: apply the latest command, if any.
    pub fn actuate_tick<A: Actuator>(&self, driver: &mut LevelDriver<A>) -> Option<u16> {
        let command = self.commands.take()?;
        Some(driver.apply(&command))
    }
}

impl<M: RawMutex> Default for Peripheral<M> {
    fn default() -> Self {
        Self::new()
    }
}
