//! Connection handshake and exchange retry behaviour wired together, the
//! way a driver in `vdsp-client` would sequence them.

use std::{
    ops::{Add, Sub},
    time::Duration,
};

use bytes::Bytes;
use vdsp_core::{
    connection::{Connection, ConnectionAction, ConnectionConfig, ConnectionState},
    correlator::{Correlator, CorrelatorAction},
    env::Environment,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct VirtualInstant(Duration);

impl Sub for VirtualInstant {
    type Output = Duration;
    fn sub(self, rhs: Self) -> Duration {
        self.0 - rhs.0
    }
}

impl Add<Duration> for VirtualInstant {
    type Output = Self;
    fn add(self, rhs: Duration) -> Self {
        Self(self.0 + rhs)
    }
}

fn t(secs: u64) -> VirtualInstant {
    VirtualInstant(Duration::from_secs(secs))
}

#[derive(Clone)]
struct FixedEnv;

impl Environment for FixedEnv {
    type Instant = VirtualInstant;

    fn now(&self) -> VirtualInstant {
        t(0)
    }

    fn sleep(&self, _duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        async {}
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        buffer.fill(0xAB);
    }
}

#[test]
fn connect_then_ping_handshake_reaches_connected() {
    let mut conn: Connection<VirtualInstant> = Connection::new(ConnectionConfig::default());

    let actions = conn.connect(t(0)).unwrap();
    assert_eq!(actions, vec![ConnectionAction::SendPing]);
    assert_eq!(conn.state(), ConnectionState::Connecting);

    conn.handle_pong(t(1)).unwrap();
    assert_eq!(conn.state(), ConnectionState::Connected);
}

#[test]
fn unanswered_ping_times_out_and_disconnects() {
    let mut conn: Connection<VirtualInstant> = Connection::new(ConnectionConfig::default());
    conn.connect(t(0)).unwrap();

    let actions = conn.tick(t(10));
    assert_eq!(conn.state(), ConnectionState::Disconnected);
    assert!(matches!(actions.as_slice(), [ConnectionAction::Disconnect { .. }]));
}

#[test]
fn exchange_retries_five_times_over_fifteen_seconds_then_times_out() {
    let env = FixedEnv;
    let mut correlator: Correlator<VirtualInstant, Bytes> = Correlator::new();

    let path = Bytes::from_static(b"/ietf-interfaces:interfaces");
    let allocated = correlator.allocate_token(&env);
    let token = correlator.submit(
        allocated,
        t(0),
        Bytes::from_static(b"GET interfaces"),
        Duration::from_secs(3),
        5,
        None,
        path.clone(),
    );

    let mut now = t(0);
    let mut retransmissions = 0;
    let mut final_action = None;
    for _ in 0..5 {
        now = now + Duration::from_secs(3);
        let actions = correlator.tick(now);
        match actions.into_iter().next() {
            Some(CorrelatorAction::Retransmit { .. }) => retransmissions += 1,
            Some(action @ CorrelatorAction::Fail { .. }) => {
                final_action = Some(action);
                break;
            },
            None => {},
        }
    }

    assert_eq!(retransmissions, 4);
    match final_action {
        Some(CorrelatorAction::Fail { token: failed_token, elapsed, resolver }) => {
            assert_eq!(failed_token, token);
            assert_eq!(elapsed, Duration::from_secs(15));
            assert_eq!(resolver, path);
        },
        other => panic!("expected a Fail action after 5 retries, got {other:?}"),
    }
    assert!(correlator.is_empty());
}
