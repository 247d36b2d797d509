//! A single SID table row.

use crate::datatype::DataType;

/// YANG statement kind a SID identifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SidKind {
    /// `container` statement.
    Container,
    /// `list` statement.
    List,
    /// `leaf` statement.
    Leaf,
    /// `leaf-list` statement.
    LeafList,
    /// `rpc` statement.
    Rpc,
    /// `action` statement.
    Action,
}

/// One row of the static SID table (§3, §4.4).
///
/// Bijective over populated rows: every entry's `sid` and `path` are unique
/// within the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidEntry {
    /// Numeric Structure IDentifier.
    pub sid: u32,
    /// Full textual YANG instance path, e.g.
    /// `/ietf-interfaces:interfaces/interface`.
    pub path: &'static str,
    /// Statement kind.
    pub kind: SidKind,
    /// Scalar datatype, if this is a leaf or leaf-list.
    pub datatype: Option<DataType>,
    /// Name of the list's key leaf, if `kind` is [`SidKind::List`].
    pub key: Option<&'static str>,
}
