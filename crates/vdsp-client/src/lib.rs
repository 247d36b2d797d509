//! Client
//!
//! Typed management operations over a VelocityDRIVE-SP device (§4.6).
//!
//! # Architecture
//!
//! [`engine::Engine`] is the driver half of the Sans-IO split: it owns the
//! transport, the MUP1 parser and the clock, and executes the actions that
//! [`vdsp_core`]'s `Connection`/`Correlator` state machines return.
//! [`facade::ManagementFacade`] sits on top, translating YANG instance paths
//! and CBOR values into the CoAP exchanges the engine runs (§4.3, §4.6).
//!
//! # Components
//!
//! - [`Engine`]: single cooperative event loop driving one device (§5)
//! - [`ManagementFacade`]: `ping`/`identify`/`yang_get`/`yang_set`/
//!   `yang_delete`/`yang_rpc`/`firmware_update`/TSN helpers (§4.6)
//! - [`Config`]: retry interval, max attempts, block size and timeouts (§4.2)
//! - [`tsn`]: pure CBOR payload builders for PTP/TAS/CBS configuration

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod config;
pub mod engine;
mod error;
pub mod facade;
pub mod tsn;

pub use config::Config;
pub use engine::Engine;
pub use error::FacadeError;
pub use facade::{IdentifyResult, ManagementFacade, Model};
pub use vdsp_core::env::Environment;
