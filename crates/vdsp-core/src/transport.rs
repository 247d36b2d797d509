//! Transport abstraction (§6 "Serial transport").
//!
//! The core is transport-agnostic: it only needs a byte-oriented duplex
//! channel to feed the MUP1 framer and to write encoded frames onto. A
//! production implementation talks to a serial port at 115200 8N1; tests can
//! substitute an in-memory duplex pipe.

use std::{error::Error as StdError, future::Future};

/// A byte-oriented duplex channel the correlator reads frames from and
/// writes frames to.
///
/// Implementations are expected to be exclusive to one core instance (§5
/// "the transport is exclusive to one core instance").
pub trait Transport: Send + 'static {
    /// Error type surfaced by this transport; wrapped as
    /// [`crate::error::CoreError::TransportDown`] once exhausted.
    type Error: StdError + Send + Sync + 'static;

    /// Reads at least one byte into `buf`, returning the number of bytes
    /// read. Returns `Ok(0)` on a clean end-of-stream.
    fn read(&mut self, buf: &mut [u8]) -> impl Future<Output = Result<usize, Self::Error>> + Send;

    /// Writes the entire buffer, blocking (asynchronously) until all bytes
    /// are accepted by the underlying channel.
    fn write_all(&mut self, buf: &[u8]) -> impl Future<Output = Result<(), Self::Error>> + Send;
}
