//! Connection lifecycle state machine (§4.7).
//!
//! Manages the top-level connection to a device: disconnected, connecting
//! (a ping is outstanding), connected, disconnecting. Uses the action
//! pattern: methods take time as input and return actions for the driver to
//! execute against the transport. This keeps the state machine pure (no
//! I/O) and makes testing straightforward.
//!
//! # State Machine
//!
//! ```text
//! ┌──────────────┐   connect()    ┌────────────┐
//! │ Disconnected │───────────────>│ Connecting │
//! └──────────────┘                └────────────┘
//!        ^                              │
//!        │                  handle_pong │  timeout / transport error
//!        │                              ↓
//!        │                        ┌───────────┐
//!        │   disconnect() done    │ Connected │
//!        │<────────────────────── └───────────┘
//!        │                              │
//!        │                 disconnect()│
//!        │                              ↓
//!        │                      ┌────────────────┐
//!        └──────────────────────│ Disconnecting  │
//!                                └────────────────┘
//! ```
//!
//! Entry to `Connected` requires a successful ping; any transport error from
//! any state drops straight back to `Disconnected`.

use std::{
    ops::Sub,
    time::{Duration, Instant},
};

use crate::error::CoreError;

/// Time allowed for the initial ping to come back before giving up.
pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(2);

/// Actions returned by the connection state machine.
///
/// The driver executes these against the transport and the correlator:
/// - `SendPing`: issue a MUP1 `P` frame and await the matching reply
/// - `Disconnect`: tear down the transport with the given reason
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionAction {
    /// Send a MUP1 Ping frame.
    SendPing,
    /// Disconnect the transport.
    Disconnect {
        /// Reason the connection is being torn down.
        reason: String,
    },
}

/// Connection state (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport activity; the device has not been contacted.
    Disconnected,
    /// A ping has been sent and we are waiting for the matching reply.
    Connecting,
    /// Ping succeeded; the connection is usable for exchanges.
    Connected,
    /// Teardown is in progress.
    Disconnecting,
}

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Timeout for the initial ping while connecting.
    pub ping_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self { ping_timeout: DEFAULT_PING_TIMEOUT }
    }
}

/// Connection state machine.
///
/// This is a pure state machine: no I/O, no `Environment` storage. Time is
/// passed as parameters to the methods that need it. Generic over `Instant`
/// to support both real time and virtual time for deterministic testing.
#[derive(Debug, Clone)]
pub struct Connection<I = Instant>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    state: ConnectionState,
    config: ConnectionConfig,
    connecting_since: Option<I>,
}

impl<I> Connection<I>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    /// Creates a new connection in [`ConnectionState::Disconnected`].
    #[must_use]
    pub fn new(config: ConnectionConfig) -> Self {
        Self { state: ConnectionState::Disconnected, config, connecting_since: None }
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Timeout applied to the initial ping.
    #[must_use]
    pub fn ping_timeout(&self) -> Duration {
        self.config.ping_timeout
    }

    /// Begins connecting: transitions to `Connecting` and returns
    /// `[SendPing]`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidState`] unless currently `Disconnected`.
    pub fn connect(&mut self, now: I) -> Result<Vec<ConnectionAction>, CoreError> {
        if self.state != ConnectionState::Disconnected {
            return Err(CoreError::InvalidState {
                state: self.state,
                operation: "connect".to_string(),
            });
        }

        self.state = ConnectionState::Connecting;
        self.connecting_since = Some(now);
        Ok(vec![ConnectionAction::SendPing])
    }

    /// Processes a matching ping reply.
    ///
    /// Transitions `Connecting` to `Connected`. A reply while already
    /// `Connected` is a harmless no-op (heartbeat-style pings outside the
    /// initial handshake).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidState`] if called from `Disconnected` or
    /// `Disconnecting`.
    pub fn handle_pong(&mut self, _now: I) -> Result<Vec<ConnectionAction>, CoreError> {
        match self.state {
            ConnectionState::Connecting => {
                self.state = ConnectionState::Connected;
                self.connecting_since = None;
                Ok(vec![])
            },
            ConnectionState::Connected => Ok(vec![]),
            ConnectionState::Disconnected | ConnectionState::Disconnecting => {
                Err(CoreError::InvalidState {
                    state: self.state,
                    operation: "handle_pong".to_string(),
                })
            },
        }
    }

    /// Checks whether the connecting-phase ping has timed out.
    ///
    /// Call this from the timer wheel; on timeout the connection drops to
    /// `Disconnected` and `[Disconnect]` is returned.
    pub fn tick(&mut self, now: I) -> Vec<ConnectionAction> {
        if self.state != ConnectionState::Connecting {
            return vec![];
        }

        let Some(since) = self.connecting_since else { return vec![] };
        let elapsed = now - since;
        if elapsed < self.config.ping_timeout {
            return vec![];
        }

        self.state = ConnectionState::Disconnected;
        self.connecting_since = None;
        vec![ConnectionAction::Disconnect {
            reason: format!("ping timeout after {elapsed:?}"),
        }]
    }

    /// Begins a graceful disconnect, returning `[Disconnect]`.
    ///
    /// Idempotent: calling this while already `Disconnected` is a no-op.
    pub fn disconnect(&mut self, reason: impl Into<String>) -> Vec<ConnectionAction> {
        if self.state == ConnectionState::Disconnected {
            return vec![];
        }

        self.state = ConnectionState::Disconnecting;
        self.connecting_since = None;
        let action = ConnectionAction::Disconnect { reason: reason.into() };
        self.state = ConnectionState::Disconnected;
        vec![action]
    }

    /// Reports a transport-level error from any state; always drops
    /// straight to `Disconnected` (§4.7 "Any transport error →
    /// Disconnected").
    pub fn on_transport_error(&mut self, reason: impl Into<String>) -> Vec<ConnectionAction> {
        self.state = ConnectionState::Disconnected;
        self.connecting_since = None;
        vec![ConnectionAction::Disconnect { reason: reason.into() }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
    struct VirtualInstant(Duration);

    impl Sub for VirtualInstant {
        type Output = Duration;
        fn sub(self, rhs: Self) -> Duration {
            self.0 - rhs.0
        }
    }

    fn t(secs: u64) -> VirtualInstant {
        VirtualInstant(Duration::from_secs(secs))
    }

    #[test]
    fn connect_sends_ping_and_moves_to_connecting() {
        let mut conn: Connection<VirtualInstant> = Connection::new(ConnectionConfig::default());
        assert_eq!(conn.state(), ConnectionState::Disconnected);

        let actions = conn.connect(t(0)).unwrap();
        assert_eq!(conn.state(), ConnectionState::Connecting);
        assert_eq!(actions, vec![ConnectionAction::SendPing]);
    }

    #[test]
    fn connect_from_non_disconnected_state_is_rejected() {
        let mut conn: Connection<VirtualInstant> = Connection::new(ConnectionConfig::default());
        conn.connect(t(0)).unwrap();

        let result = conn.connect(t(1));
        assert!(matches!(result, Err(CoreError::InvalidState { .. })));
    }

    #[test]
    fn pong_while_connecting_completes_handshake() {
        let mut conn: Connection<VirtualInstant> = Connection::new(ConnectionConfig::default());
        conn.connect(t(0)).unwrap();

        let actions = conn.handle_pong(t(1)).unwrap();
        assert_eq!(conn.state(), ConnectionState::Connected);
        assert!(actions.is_empty());
    }

    #[test]
    fn pong_while_connected_is_a_no_op() {
        let mut conn: Connection<VirtualInstant> = Connection::new(ConnectionConfig::default());
        conn.connect(t(0)).unwrap();
        conn.handle_pong(t(1)).unwrap();

        let actions = conn.handle_pong(t(2)).unwrap();
        assert_eq!(conn.state(), ConnectionState::Connected);
        assert!(actions.is_empty());
    }

    #[test]
    fn pong_while_disconnected_is_rejected() {
        let mut conn: Connection<VirtualInstant> = Connection::new(ConnectionConfig::default());
        let result = conn.handle_pong(t(0));
        assert!(matches!(result, Err(CoreError::InvalidState { .. })));
    }

    #[test]
    fn tick_before_timeout_does_nothing() {
        let mut conn: Connection<VirtualInstant> = Connection::new(ConnectionConfig::default());
        conn.connect(t(0)).unwrap();

        let actions = conn.tick(t(1));
        assert!(actions.is_empty());
        assert_eq!(conn.state(), ConnectionState::Connecting);
    }

    #[test]
    fn tick_after_timeout_disconnects() {
        let mut conn: Connection<VirtualInstant> = Connection::new(ConnectionConfig::default());
        conn.connect(t(0)).unwrap();

        let actions = conn.tick(t(3));
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert_eq!(actions.len(), 1);
        assert!(matches!(actions[0], ConnectionAction::Disconnect { .. }));
    }

    #[test]
    fn tick_while_connected_does_nothing() {
        let mut conn: Connection<VirtualInstant> = Connection::new(ConnectionConfig::default());
        conn.connect(t(0)).unwrap();
        conn.handle_pong(t(1)).unwrap();

        let actions = conn.tick(t(100));
        assert!(actions.is_empty());
        assert_eq!(conn.state(), ConnectionState::Connected);
    }

    #[test]
    fn disconnect_is_idempotent() {
        let mut conn: Connection<VirtualInstant> = Connection::new(ConnectionConfig::default());
        assert!(conn.disconnect("not connected").is_empty());

        conn.connect(t(0)).unwrap();
        conn.handle_pong(t(1)).unwrap();
        let actions = conn.disconnect("user requested");
        assert_eq!(actions.len(), 1);
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn transport_error_drops_to_disconnected_from_any_state() {
        let mut conn: Connection<VirtualInstant> = Connection::new(ConnectionConfig::default());
        conn.connect(t(0)).unwrap();

        let actions = conn.on_transport_error("serial port unplugged");
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert_eq!(actions.len(), 1);
        assert!(matches!(actions[0], ConnectionAction::Disconnect { .. }));
    }
}
