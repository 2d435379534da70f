//! Integration tests for the swift-device host-testable core.

use std::cell::RefCell;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use swift_device::config;
use swift_device::gatt::provision::ProvisionState;
use swift_device::gatt::{
    CharacteristicDef, ConnId, ConnParams, DescriptorDef, GattStack, GattStatus, Handle,
    InterfaceId, PeerAddress, ServiceDef, TransId,
};
use swift_device::{
    Actuator, DutyScale, Error, LevelDriver, Peripheral, StackError, StackEvent,
    TelemetryEmitter, WriteRequest,
};

const OK: GattStatus = GattStatus::OK;

/// Records what the core asked of the stack. Provisioning requests are not
/// answered; the test feeds completions by hand.
#[derive(Default)]
struct Stack {
    notifications: RefCell<Vec<(ConnId, Handle, Vec<u8>)>>,
    responses: RefCell<Vec<(TransId, GattStatus)>>,
    advertising_restarts: RefCell<usize>,
}

impl GattStack for Stack {
    fn register_server(&self) -> Result<(), StackError> {
        Ok(())
    }

    fn configure_advertising(&self) -> Result<(), StackError> {
        Ok(())
    }

    fn create_service(&self, _: InterfaceId, _: &ServiceDef) -> Result<(), StackError> {
        Ok(())
    }

    fn add_characteristic(&self, _: Handle, _: &CharacteristicDef) -> Result<(), StackError> {
        Ok(())
    }

    fn add_descriptor(&self, _: Handle, _: &DescriptorDef) -> Result<(), StackError> {
        Ok(())
    }

    fn start_service(&self, _: Handle) -> Result<(), StackError> {
        Ok(())
    }

    fn send_notification(
        &self,
        _: InterfaceId,
        conn: ConnId,
        handle: Handle,
        payload: &[u8],
        _: bool,
    ) -> Result<(), StackError> {
        self.notifications
            .borrow_mut()
            .push((conn, handle, payload.to_vec()));
        Ok(())
    }

    fn send_response(
        &self,
        _: InterfaceId,
        _: ConnId,
        trans_id: TransId,
        status: GattStatus,
    ) -> Result<(), StackError> {
        self.responses.borrow_mut().push((trans_id, status));
        Ok(())
    }

    fn start_advertising(&self) -> Result<(), StackError> {
        *self.advertising_restarts.borrow_mut() += 1;
        Ok(())
    }

    fn set_preferred_conn_params(&self, _: &PeerAddress, _: &ConnParams) -> Result<(), StackError> {
        Ok(())
    }
}

#[derive(Default)]
struct Led {
    duty: Option<u16>,
}

impl Actuator for Led {
    fn set_duty(&mut self, duty: u16) {
        self.duty = Some(duty);
    }
}

fn provision(peripheral: &Peripheral<NoopRawMutex>, stack: &Stack) {
    peripheral.start(stack).expect("register request");
    for event in [
        StackEvent::Registered { interface: 1, status: OK },
        StackEvent::ServiceCreated { service: 39, status: OK },
        StackEvent::CharacteristicAdded { attr: 40, status: OK },
        StackEvent::DescriptorAdded { attr: 41, status: OK },
        StackEvent::CharacteristicAdded { attr: 42, status: OK },
        StackEvent::ServiceStarted { service: 39, status: OK },
    ] {
        peripheral.handle_event(&event, stack).expect("provisioning step");
    }
}

fn write(handle: Handle, trans_id: TransId, value: &[u8], need_response: bool) -> StackEvent<'_> {
    StackEvent::Write(WriteRequest {
        conn: 0,
        trans_id,
        handle,
        value,
        need_response,
    })
}

#[test]
fn end_to_end_session() {
    let stack = Stack::default();
    let peripheral = Peripheral::new();
    let mut emitter = TelemetryEmitter::new();
    let mut driver = LevelDriver::new(Led::default(), DutyScale::DEFAULT);

    provision(&peripheral, &stack);
    let snap = peripheral.snapshot();
    assert_eq!(snap.provision, ProvisionState::Started);
    assert_eq!(snap.handles.notify_char(), Some(40));
    assert_eq!(snap.handles.cccd(), Some(41));
    assert_eq!(snap.handles.write_char(), Some(42));

    let connect = StackEvent::Connected {
        conn: 0,
        peer: [1, 2, 3, 4, 5, 6],
    };
    peripheral.handle_event(&connect, &stack).unwrap();
    peripheral
        .handle_event(&write(41, 1, &[0x01, 0x00], false), &stack)
        .unwrap();

    for _ in 0..3 {
        assert_eq!(peripheral.notify_tick(&mut emitter, &stack), Ok(true));
    }
    let sent = stack.notifications.borrow();
    assert_eq!(sent.len(), 3);
    for (n, (conn, handle, payload)) in sent.iter().enumerate() {
        assert_eq!((*conn, *handle), (0, 40));
        assert_eq!(payload.len(), 10);
        assert_eq!(payload[0], n as u8);
        assert!(payload[1..].iter().all(|&b| b == 0));
    }

    peripheral
        .handle_event(&write(42, 2, &[0x05, 0x00], false), &stack)
        .unwrap();
    assert_eq!(peripheral.actuate_tick(&mut driver), Some(5));
    assert_eq!(driver.level(), 5);
    assert_eq!(
        driver.into_inner().duty,
        Some(DutyScale::DEFAULT.duty_for(5))
    );
}

#[test]
fn oversized_command_gets_ok_response_and_no_update() {
    let stack = Stack::default();
    let peripheral = Peripheral::new();
    let mut driver = LevelDriver::new(Led::default(), DutyScale::DEFAULT);
    provision(&peripheral, &stack);

    peripheral
        .handle_event(&write(42, 7, &[0x09, 0x00], false), &stack)
        .unwrap();
    let result = peripheral.handle_event(&write(42, 8, &[0u8; 11], true), &stack);
    assert_eq!(result, Err(Error::PayloadTooLong { len: 11 }));
    assert_eq!(*stack.responses.borrow(), [(8, OK)]);

    // The earlier command is still the one pending.
    assert_eq!(peripheral.actuate_tick(&mut driver), Some(9));
}

#[test]
fn mtu_sized_command_gets_ok_response_and_no_update() {
    let stack = Stack::default();
    let peripheral = Peripheral::new();
    let mut driver = LevelDriver::new(Led::default(), DutyScale::DEFAULT);
    provision(&peripheral, &stack);

    peripheral
        .handle_event(&write(42, 1, &[0x03, 0x00], false), &stack)
        .unwrap();
    let largest = [0x7Fu8; config::BLE_MAX_WRITE_LEN as usize];
    let result = peripheral.handle_event(&write(42, 2, &largest, true), &stack);
    assert_eq!(
        result,
        Err(Error::PayloadTooLong {
            len: config::BLE_MAX_WRITE_LEN as usize
        })
    );
    assert_eq!(*stack.responses.borrow(), [(2, OK)]);
    assert_eq!(peripheral.actuate_tick(&mut driver), Some(3));
}

#[test]
fn cccd_toggle_gates_emission_and_preserves_counter() {
    let stack = Stack::default();
    let peripheral = Peripheral::new();
    let mut emitter = TelemetryEmitter::new();
    provision(&peripheral, &stack);
    peripheral
        .handle_event(&StackEvent::Connected { conn: 0, peer: [0; 6] }, &stack)
        .unwrap();

    let mut sent = 0;
    for (value, ticks) in [([0x00u8, 0x00], 3), ([0x01, 0x00], 4), ([0x00, 0x00], 3), ([0x01, 0x00], 1)] {
        peripheral
            .handle_event(&write(41, 0, &value, false), &stack)
            .unwrap();
        for _ in 0..ticks {
            if peripheral.notify_tick(&mut emitter, &stack).unwrap() {
                sent += 1;
            }
        }
    }
    assert_eq!(sent, 5);

    let notifications = stack.notifications.borrow();
    let counters: Vec<u16> = notifications
        .iter()
        .map(|(_, _, p)| u16::from_le_bytes([p[0], p[1]]))
        .collect();
    assert_eq!(counters, [0, 1, 2, 3, 4]);
}

#[test]
fn disconnect_stops_notifications_and_readvertises() {
    let stack = Stack::default();
    let peripheral = Peripheral::new();
    let mut emitter = TelemetryEmitter::new();
    provision(&peripheral, &stack);
    peripheral
        .handle_event(&StackEvent::Connected { conn: 3, peer: [0; 6] }, &stack)
        .unwrap();
    peripheral
        .handle_event(&write(41, 0, &[0x01, 0x00], false), &stack)
        .unwrap();

    peripheral
        .handle_event(&StackEvent::Disconnected, &stack)
        .unwrap();
    assert_eq!(*stack.advertising_restarts.borrow(), 1);
    assert_eq!(peripheral.notify_tick(&mut emitter, &stack), Ok(false));

    let snap = peripheral.snapshot();
    assert_eq!(snap.connection.conn(), None);
    assert!(!snap.connection.notifications_enabled());
}

#[test]
fn provisioning_never_skips_a_step() {
    let stack = Stack::default();
    let peripheral: Peripheral<NoopRawMutex> = Peripheral::new();
    peripheral.start(&stack).unwrap();
    peripheral
        .handle_event(&StackEvent::Registered { interface: 1, status: OK }, &stack)
        .unwrap();

    // Descriptor and start completions before the service exists.
    for early in [
        StackEvent::DescriptorAdded { attr: 41, status: OK },
        StackEvent::CharacteristicAdded { attr: 40, status: OK },
        StackEvent::ServiceStarted { service: 39, status: OK },
    ] {
        assert_eq!(
            peripheral.handle_event(&early, &stack),
            Err(Error::UnexpectedEvent)
        );
    }

    let snap = peripheral.snapshot();
    assert_eq!(snap.provision, ProvisionState::Registered);
    assert_eq!(snap.handles.service(), None);
    assert_eq!(snap.handles.notify_char(), None);
    assert_eq!(snap.handles.cccd(), None);
}
