//! Static bidirectional YANG instance path <-> SID table (§3, §4.4).
//!
//! VelocityDRIVE-SP switches identify YANG schema nodes on the wire by a
//! numeric Structure IDentifier (SID) rather than their textual path, per
//! RFC 9254. This crate carries the vendor's static SID allocation and the
//! lookups the rest of the stack needs: path to SID for outgoing requests,
//! SID to path for rendering incoming payloads, and light client-side range
//! validation on leaf values before they are sent.
//!
//! The table is read-only after construction — there is no mutation API.

mod datatype;
mod entry;
mod error;
mod table;

pub use datatype::DataType;
pub use entry::{SidEntry, SidKind};
pub use error::SidError;
pub use table::SidTable;
