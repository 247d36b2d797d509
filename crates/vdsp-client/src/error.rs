//! Errors surfaced by the engine and management facade.

use thiserror::Error;

/// Errors raised while driving an exchange with a VelocityDRIVE-SP device.
#[derive(Error, Debug)]
pub enum FacadeError {
    /// The connection or correlator state machine raised an error (§7).
    #[error(transparent)]
    Core(#[from] vdsp_core::CoreError),

    /// A SID table lookup or outgoing-value validation failed (§4.4).
    #[error(transparent)]
    Sid(#[from] vdsp_sid::SidError),

    /// The transport's own I/O error, flattened to a string since the
    /// concrete error type varies by backend (serial port, in-memory pipe
    /// in tests).
    #[error("transport error: {0}")]
    Transport(String),
}
