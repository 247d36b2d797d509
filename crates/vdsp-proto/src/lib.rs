//! Wire-level protocol stack for VelocityDRIVE-SP: MUP1 framing, CoAP
//! messages and the CBOR/YANG-SID codec (§2 components F, C, B).
//!
//! Strict leaf-to-root composition (§9): `coap` depends only on `error`;
//! `cbor` depends on `error` and `vdsp-sid`; `mup1` depends only on `error`.
//! None of these modules touch a clock, an RNG or the transport — that is
//! the correlator's job, one layer up in `vdsp-core`.

pub mod cbor;
pub mod coap;
mod error;
pub mod mup1;

pub use error::{ProtocolError, Result};
