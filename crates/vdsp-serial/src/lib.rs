//! Serial
//!
//! Production [`vdsp_core::transport::Transport`] and
//! [`vdsp_core::env::Environment`] implementations for talking to a real
//! VelocityDRIVE-SP device over UART (§6 "Serial transport").
//!
//! The core crates never touch a serial port directly; this crate is the
//! production backend that plugs into their abstractions, the same way any
//! concrete transport sits alongside a Sans-IO client without the client
//! knowing or caring how bytes actually move.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod serial;
mod system_env;

pub use serial::{PortInfo, SerialError, SerialTransport, list_ports};
pub use system_env::SystemEnv;
