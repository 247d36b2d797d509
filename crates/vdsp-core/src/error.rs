//! Error types for the VelocityDRIVE-SP core.
//!
//! Strongly-typed errors for the connection lifecycle and the correlator.
//! CoAP and CBOR errors from the wire stack are wrapped rather than
//! flattened, so callers can still recover the class/detail code, the
//! resource path and the token for diagnosis (§7).

use std::time::Duration;

use thiserror::Error;

use crate::connection::ConnectionState;

/// Errors the core surfaces to callers (§7).
///
/// `FrameCorrupted` is deliberately absent: checksum failures are counted on
/// [`vdsp_proto::mup1::Mup1Parser`], never raised as an error, since a
/// single garbled frame on a noisy serial line should not fail an otherwise
/// healthy connection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// The transport closed or errored; all outstanding exchanges fail with
    /// this variant.
    #[error("transport is down")]
    TransportDown,

    /// Malformed CoAP or CBOR on the wire.
    #[error("parse error: {0}")]
    ParseError(String),

    /// An exchange's deadline passed with no matching reply.
    #[error("timeout after {elapsed:?} waiting for reply to token {token:02x?}")]
    Timeout {
        /// Token of the exchange that timed out.
        token: Vec<u8>,
        /// How long the exchange waited before timing out.
        elapsed: Duration,
    },

    /// Peer returned a CoAP 4.xx response.
    #[error("client error {class}.{detail:02} for {path}")]
    ClientError {
        /// CoAP response code class (4 for 4.xx).
        class: u8,
        /// CoAP response code detail.
        detail: u8,
        /// Resource path the request targeted.
        path: String,
    },

    /// Peer returned a CoAP 5.xx response.
    #[error("server error {class}.{detail:02} for {path}")]
    ServerError {
        /// CoAP response code class (5 for 5.xx).
        class: u8,
        /// CoAP response code detail.
        detail: u8,
        /// Resource path the request targeted.
        path: String,
    },

    /// Peer sent a CoAP Reset.
    #[error("reset for {path}")]
    Reset {
        /// Resource path the request targeted.
        path: String,
    },

    /// A path did not resolve to a known SID, or a SID was not in the table.
    #[error("unknown SID: {0}")]
    UnknownSid(u32),

    /// The caller cancelled the exchange before it completed.
    #[error("exchange cancelled")]
    Cancelled,

    /// Invalid state transition attempted on the connection state machine.
    #[error("invalid state transition: cannot {operation} from {state:?}")]
    InvalidState {
        /// Current state when the error occurred.
        state: ConnectionState,
        /// Operation that was attempted.
        operation: String,
    },
}

impl CoreError {
    /// Returns true if retrying the same exchange may succeed.
    ///
    /// Timeouts on an individual MUP1/CoAP round trip are transient (§7);
    /// 4.xx/5.xx responses and resets are not — the peer has spoken.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

impl From<vdsp_proto::ProtocolError> for CoreError {
    fn from(err: vdsp_proto::ProtocolError) -> Self {
        Self::ParseError(err.to_string())
    }
}

impl From<vdsp_sid::SidError> for CoreError {
    fn from(err: vdsp_sid::SidError) -> Self {
        match err {
            vdsp_sid::SidError::UnknownSid(sid) => Self::UnknownSid(sid),
            other => Self::ParseError(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_transient() {
        assert!(
            CoreError::Timeout { token: vec![1, 2, 3, 4], elapsed: Duration::from_secs(15) }
                .is_transient()
        );
    }

    #[test]
    fn peer_responses_are_not_transient() {
        assert!(
            !CoreError::ClientError { class: 4, detail: 4, path: "/foo".to_string() }
                .is_transient()
        );
        assert!(
            !CoreError::ServerError { class: 5, detail: 0, path: "/foo".to_string() }
                .is_transient()
        );
        assert!(!CoreError::Reset { path: "/foo".to_string() }.is_transient());
        assert!(!CoreError::Cancelled.is_transient());
        assert!(!CoreError::TransportDown.is_transient());
    }

    #[test]
    fn sid_error_maps_unknown_sid_variant() {
        let err: CoreError = vdsp_sid::SidError::UnknownSid(9999).into();
        assert_eq!(err, CoreError::UnknownSid(9999));
    }

    #[test]
    fn sid_error_maps_other_variants_to_parse_error() {
        let err: CoreError = vdsp_sid::SidError::UnknownPath("/no/such/path".to_string()).into();
        assert!(matches!(err, CoreError::ParseError(_)));
    }
}
