//! Connection lifecycle - the single active peer and its CCCD subscription.
//!
//! The telemetry emitter runs only between a `{0x01, 0x00}` CCCD write and
//! the matching `{0x00, 0x00}` write or a disconnect.

use super::{ConnId, GattStack, PeerAddress, PREFERRED_CONN_PARAMS};

/// CCCD value that enables notifications.
pub const CCCD_NOTIFY: [u8; 2] = [0x01, 0x00];

/// CCCD value that disables notifications and indications.
pub const CCCD_OFF: [u8; 2] = [0x00, 0x00];

/// State of the (at most one) connected peer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnectionState {
    conn: Option<ConnId>,
    peer: Option<PeerAddress>,
    notifications_enabled: bool,
}

impl ConnectionState {
    pub const fn new() -> Self {
        Self {
            conn: None,
            peer: None,
            notifications_enabled: false,
        }
    }

    pub fn conn(&self) -> Option<ConnId> {
        self.conn
    }

    pub fn peer(&self) -> Option<PeerAddress> {
        self.peer
    }

    pub fn notifications_enabled(&self) -> bool {
        self.notifications_enabled
    }
}

/// What a CCCD write did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Subscription {
    Enabled,
    Disabled,
    /// Unrecognised value; nothing changed.
    Unchanged,
}

pub struct Link {
    state: ConnectionState,
    emitter_running: bool,
}

impl Link {
    pub const fn new() -> Self {
        Self {
            state: ConnectionState::new(),
            emitter_running: false,
        }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn emitter_running(&self) -> bool {
        self.emitter_running
    }

    /// A peer connected. Any previous connection is overwritten.
    pub fn on_connect(&mut self, conn: ConnId, peer: PeerAddress, stack: &impl GattStack) {
        info!("link: client connected, conn={} peer={:?}", conn, peer);
        self.state = ConnectionState {
            conn: Some(conn),
            peer: Some(peer),
            notifications_enabled: false,
        };

        match stack.set_preferred_conn_params(&peer, &PREFERRED_CONN_PARAMS) {
            Ok(()) => info!("link: requested conn params min_int=7.5ms max_int=15ms"),
            Err(code) => error!("link: set preferred conn params failed, code={}", code.0),
        }
    }

    /// The peer went away: forget it, silence the emitter, advertise again.
    pub fn on_disconnect(&mut self, stack: &impl GattStack) {
        info!("link: client disconnected");
        self.state = ConnectionState::new();
        self.stop_emitter();

        if let Err(code) = stack.start_advertising() {
            error!("link: advertising restart failed, code={}", code.0);
        }
    }

    /// Apply a write to the telemetry CCCD.
    pub fn on_subscription_write(&mut self, value: &[u8]) -> Subscription {
        if value == CCCD_NOTIFY {
            info!("link: notify enabled");
            self.state.notifications_enabled = true;
            self.start_emitter();
            Subscription::Enabled
        } else if value == CCCD_OFF {
            info!("link: notify disabled");
            self.state.notifications_enabled = false;
            self.stop_emitter();
            Subscription::Disabled
        } else {
            debug!("link: ignoring CCCD value {=[u8]:x}", value);
            Subscription::Unchanged
        }
    }

    fn start_emitter(&mut self) {
        self.emitter_running = true;
    }

    fn stop_emitter(&mut self) {
        self.emitter_running = false;
    }
}

impl Default for Link {
    fn default() -> Self {
        Self::new()
    }
}
