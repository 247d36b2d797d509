//! Static bidirectional SID <-> path table, loaded once at start-up.
//!
//! Real device SID allocations run to tens of thousands of rows compiled
//! from the vendor's YANG modules; this table carries a representative slice
//! of each allocated range (§4.4) sufficient to exercise every operation the
//! management facade exposes. Extending it to the full vendor set is a data
//! change, not a code change — `SidTable::from_entries` accepts any entry
//! slice.

use std::collections::HashMap;

use regex::Regex;

use crate::{
    datatype::DataType,
    entry::{SidEntry, SidKind},
    error::SidError,
};

/// `ietf-interfaces` SID range: 1000-1999.
const IETF_INTERFACES: &[SidEntry] = &[
    SidEntry {
        sid: 1000,
        path: "/ietf-interfaces:interfaces",
        kind: SidKind::Container,
        datatype: None,
        key: None,
    },
    SidEntry {
        sid: 1001,
        path: "/ietf-interfaces:interfaces/interface",
        kind: SidKind::List,
        datatype: None,
        key: Some("name"),
    },
    SidEntry {
        sid: 1002,
        path: "/ietf-interfaces:interfaces/interface/name",
        kind: SidKind::Leaf,
        datatype: Some(DataType::String),
        key: None,
    },
    SidEntry {
        sid: 1003,
        path: "/ietf-interfaces:interfaces/interface/type",
        kind: SidKind::Leaf,
        datatype: Some(DataType::IdentityRef),
        key: None,
    },
    SidEntry {
        sid: 1004,
        path: "/ietf-interfaces:interfaces/interface/enabled",
        kind: SidKind::Leaf,
        datatype: Some(DataType::Boolean),
        key: None,
    },
    SidEntry {
        sid: 1005,
        path: "/ietf-interfaces:interfaces/interface/oper-status",
        kind: SidKind::Leaf,
        datatype: Some(DataType::Enumeration),
        key: None,
    },
    SidEntry {
        sid: 1006,
        path: "/ietf-interfaces:interfaces/interface/statistics/in-octets",
        kind: SidKind::Leaf,
        datatype: Some(DataType::Unsigned { min: 0, max: u64::MAX }),
        key: None,
    },
];

/// `ieee802-dot1q-bridge` SID range: 2000-2999 (TAS/CBS).
const IEEE802_DOT1Q_BRIDGE: &[SidEntry] = &[
    SidEntry {
        sid: 2000,
        path: "/ieee802-dot1q-bridge:bridges",
        kind: SidKind::Container,
        datatype: None,
        key: None,
    },
    SidEntry {
        sid: 2001,
        path: "/ieee802-dot1q-bridge:bridges/bridge",
        kind: SidKind::List,
        datatype: None,
        key: Some("name"),
    },
    SidEntry {
        sid: 2100,
        path: "/ieee802-dot1q-bridge:bridges/bridge/component/bridge-port/gate-parameter-table",
        kind: SidKind::Container,
        datatype: None,
        key: None,
    },
    SidEntry {
        sid: 2101,
        path: "/ieee802-dot1q-bridge:bridges/bridge/component/bridge-port/gate-parameter-table/admin-cycle-time/numerator",
        kind: SidKind::Leaf,
        datatype: Some(DataType::Unsigned { min: 1, max: 1_000_000_000 }),
        key: None,
    },
    SidEntry {
        sid: 2102,
        path: "/ieee802-dot1q-bridge:bridges/bridge/component/bridge-port/gate-parameter-table/admin-cycle-time/denominator",
        kind: SidKind::Leaf,
        datatype: Some(DataType::Unsigned { min: 1_000_000_000, max: 1_000_000_000 }),
        key: None,
    },
    SidEntry {
        sid: 2103,
        path: "/ieee802-dot1q-bridge:bridges/bridge/component/bridge-port/gate-parameter-table/admin-base-time",
        kind: SidKind::Leaf,
        datatype: Some(DataType::Unsigned { min: 0, max: u64::MAX }),
        key: None,
    },
    SidEntry {
        sid: 2104,
        path: "/ieee802-dot1q-bridge:bridges/bridge/component/bridge-port/gate-parameter-table/admin-control-list",
        kind: SidKind::List,
        datatype: None,
        key: Some("index"),
    },
    SidEntry {
        sid: 2105,
        path: "/ieee802-dot1q-bridge:bridges/bridge/component/bridge-port/gate-parameter-table/admin-control-list/gate-states-value",
        kind: SidKind::Leaf,
        datatype: Some(DataType::Unsigned { min: 0, max: 255 }),
        key: None,
    },
    SidEntry {
        sid: 2106,
        path: "/ieee802-dot1q-bridge:bridges/bridge/component/bridge-port/gate-parameter-table/admin-control-list/time-interval-value",
        kind: SidKind::Leaf,
        datatype: Some(DataType::Unsigned { min: 0, max: u32::MAX as u64 }),
        key: None,
    },
    SidEntry {
        sid: 2200,
        path: "/ieee802-dot1q-bridge:bridges/bridge/component/bridge-port/queue",
        kind: SidKind::List,
        datatype: None,
        key: Some("traffic-class"),
    },
    SidEntry {
        sid: 2201,
        path: "/ieee802-dot1q-bridge:bridges/bridge/component/bridge-port/queue/idle-slope",
        kind: SidKind::Leaf,
        datatype: Some(DataType::Unsigned { min: 0, max: u32::MAX as u64 }),
        key: None,
    },
];

/// `ieee1588-ptp` SID range: 3000-3999.
const IEEE1588_PTP: &[SidEntry] = &[
    SidEntry {
        sid: 3000,
        path: "/ieee1588-ptp:ptp",
        kind: SidKind::Container,
        datatype: None,
        key: None,
    },
    SidEntry {
        sid: 3001,
        path: "/ieee1588-ptp:ptp/instances/instance",
        kind: SidKind::List,
        datatype: None,
        key: Some("instance-index"),
    },
    SidEntry {
        sid: 3002,
        path: "/ieee1588-ptp:ptp/instances/instance/default-ds/clock-identity",
        kind: SidKind::Leaf,
        datatype: Some(DataType::Binary),
        key: None,
    },
    SidEntry {
        sid: 3003,
        path: "/ieee1588-ptp:ptp/instances/instance/default-ds/domain-number",
        kind: SidKind::Leaf,
        datatype: Some(DataType::Unsigned { min: 0, max: 255 }),
        key: None,
    },
    SidEntry {
        sid: 3004,
        path: "/ieee1588-ptp:ptp/instances/instance/default-ds/priority1",
        kind: SidKind::Leaf,
        datatype: Some(DataType::Unsigned { min: 0, max: 255 }),
        key: None,
    },
    SidEntry {
        sid: 3005,
        path: "/ieee1588-ptp:ptp/instances/instance/default-ds/priority2",
        kind: SidKind::Leaf,
        datatype: Some(DataType::Unsigned { min: 0, max: 255 }),
        key: None,
    },
];

/// Vendor extension SID range: 4000-4299.
const VENDOR_EXTENSIONS: &[SidEntry] = &[
    SidEntry {
        sid: 4000,
        path: "/mchp-velocitysp-system:save-startup-config",
        kind: SidKind::Rpc,
        datatype: None,
        key: None,
    },
    SidEntry {
        sid: 4001,
        path: "/mchp-velocitysp-system:reset",
        kind: SidKind::Rpc,
        datatype: None,
        key: None,
    },
    SidEntry {
        sid: 4002,
        path: "/mchp-velocitysp-firmware:firmware-upgrade",
        kind: SidKind::Action,
        datatype: None,
        key: None,
    },
    SidEntry {
        sid: 4100,
        path: "/mchp-velocitysp-port:port-config",
        kind: SidKind::Container,
        datatype: None,
        key: None,
    },
];

/// `ietf-constrained-yang-library` SID range: 29300-29399.
const IETF_CONSTRAINED_YANG_LIBRARY: &[SidEntry] = &[
    SidEntry {
        sid: 29300,
        path: "/ietf-constrained-yang-library:yang-library",
        kind: SidKind::Container,
        datatype: None,
        key: None,
    },
    SidEntry {
        sid: 29301,
        path: "/ietf-constrained-yang-library:yang-library/content-id",
        kind: SidKind::Leaf,
        datatype: Some(DataType::String),
        key: None,
    },
    SidEntry {
        sid: 29304,
        path: "/ietf-constrained-yang-library:yang-library/checksum",
        kind: SidKind::Leaf,
        datatype: Some(DataType::String),
        key: None,
    },
];

/// Bidirectional YANG instance path <-> numeric SID map (§4.4).
///
/// Read-only after construction (§3 Lifecycles): "The SID table is
/// initialised once and treated as read-only thereafter."
#[derive(Debug, Clone)]
pub struct SidTable {
    by_sid: HashMap<u32, SidEntry>,
    by_path: HashMap<&'static str, u32>,
}

impl SidTable {
    /// Build the table from the embedded vendor allocation data (§4.4).
    #[must_use]
    pub fn embedded() -> Self {
        let mut entries = Vec::new();
        entries.extend_from_slice(IETF_INTERFACES);
        entries.extend_from_slice(IEEE802_DOT1Q_BRIDGE);
        entries.extend_from_slice(IEEE1588_PTP);
        entries.extend_from_slice(VENDOR_EXTENSIONS);
        entries.extend_from_slice(IETF_CONSTRAINED_YANG_LIBRARY);
        Self::from_entries(entries)
    }

    /// Build a table from an arbitrary entry set (used for tests and for
    /// swapping in a fuller vendor-supplied table without a code change).
    ///
    /// # Panics
    ///
    /// Debug builds assert bijectivity (invariant 5, §3): no duplicate `sid`
    /// or `path` values. Release builds silently let the later entry win,
    /// matching `HashMap::insert` semantics.
    #[must_use]
    pub fn from_entries(entries: Vec<SidEntry>) -> Self {
        let mut by_sid = HashMap::with_capacity(entries.len());
        let mut by_path = HashMap::with_capacity(entries.len());

        for entry in entries {
            debug_assert!(
                !by_sid.contains_key(&entry.sid),
                "duplicate SID in table: {}",
                entry.sid
            );
            debug_assert!(
                !by_path.contains_key(entry.path),
                "duplicate path in table: {}",
                entry.path
            );
            by_path.insert(entry.path, entry.sid);
            by_sid.insert(entry.sid, entry);
        }

        Self { by_sid, by_path }
    }

    /// Resolve a YANG instance path to its numeric SID.
    #[must_use]
    pub fn sid_for_path(&self, path: &str) -> Option<u32> {
        self.by_path.get(path).copied()
    }

    /// Resolve a numeric SID to its YANG instance path.
    #[must_use]
    pub fn path_for_sid(&self, sid: u32) -> Option<&'static str> {
        self.by_sid.get(&sid).map(|e| e.path)
    }

    /// Full entry for a SID, including kind/datatype/key metadata.
    #[must_use]
    pub fn entry(&self, sid: u32) -> Option<&SidEntry> {
        self.by_sid.get(&sid)
    }

    /// Full entry for a path.
    #[must_use]
    pub fn entry_for_path(&self, path: &str) -> Option<&SidEntry> {
        self.sid_for_path(path).and_then(|sid| self.entry(sid))
    }

    /// Search table entries whose path matches `pattern` (a regular
    /// expression).
    ///
    /// # Errors
    ///
    /// `SidError::InvalidPattern` if `pattern` does not compile.
    pub fn search(&self, pattern: &str) -> Result<Vec<&SidEntry>, SidError> {
        let re = Regex::new(pattern).map_err(|e| SidError::InvalidPattern(e.to_string()))?;
        let mut matches: Vec<&SidEntry> =
            self.by_sid.values().filter(|entry| re.is_match(entry.path)).collect();
        matches.sort_by_key(|entry| entry.sid);
        Ok(matches)
    }

    /// Validate an outgoing integer leaf value against its declared
    /// datatype/range (§4.4 "simple client-side validation").
    ///
    /// # Errors
    ///
    /// - `SidError::UnknownSid` if `sid` is not in the table
    /// - `SidError::NotALeaf` if the entry has no datatype (container/list)
    /// - `SidError::OutOfRange` if `value` falls outside the declared bounds
    pub fn validate_integer(&self, sid: u32, value: i64) -> Result<(), SidError> {
        let entry = self.entry(sid).ok_or(SidError::UnknownSid(sid))?;
        let datatype = entry.datatype.ok_or(SidError::NotALeaf(sid))?;
        datatype.validate_integer(sid, value)
    }

    /// Number of populated rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_sid.len()
    }

    /// True if the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_sid.is_empty()
    }
}

impl Default for SidTable {
    fn default() -> Self {
        Self::embedded()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn embedded_table_round_trips_interfaces_sid() {
        let table = SidTable::embedded();
        assert_eq!(table.path_for_sid(1000), Some("/ietf-interfaces:interfaces"));
        assert_eq!(table.sid_for_path("/ietf-interfaces:interfaces"), Some(1000));
    }

    #[test]
    fn embedded_table_round_trips_yang_library_checksum() {
        let table = SidTable::embedded();
        assert_eq!(
            table.path_for_sid(29304),
            Some("/ietf-constrained-yang-library:yang-library/checksum")
        );
    }

    #[test]
    fn unknown_sid_and_path_resolve_to_none() {
        let table = SidTable::embedded();
        assert_eq!(table.path_for_sid(999_999), None);
        assert_eq!(table.sid_for_path("/no/such:path"), None);
    }

    #[test]
    fn search_matches_bridge_module() {
        let table = SidTable::embedded();
        let results = table.search("ieee802-dot1q-bridge").expect("valid pattern");
        assert!(!results.is_empty());
        assert!(results.iter().all(|e| e.path.contains("ieee802-dot1q-bridge")));
    }

    #[test]
    fn search_rejects_invalid_pattern() {
        let table = SidTable::embedded();
        assert!(matches!(table.search("("), Err(SidError::InvalidPattern(_))));
    }

    #[test]
    fn validate_integer_rejects_out_of_range_gate_state() {
        let table = SidTable::embedded();
        assert!(table.validate_integer(2105, 255).is_ok());
        assert!(matches!(
            table.validate_integer(2105, 256),
            Err(SidError::OutOfRange { .. })
        ));
    }

    #[test]
    fn validate_integer_rejects_container_sid() {
        let table = SidTable::embedded();
        assert!(matches!(table.validate_integer(1000, 0), Err(SidError::NotALeaf(1000))));
    }

    proptest! {
        /// Invariant 5 (§3): for every SID present in the table,
        /// `path -> sid -> path` is identity.
        #[test]
        fn prop_sid_round_trip_identity(idx in 0..1000usize) {
            let table = SidTable::embedded();
            let mut sids: Vec<u32> = table.by_sid.keys().copied().collect();
            sids.sort_unstable();
            if sids.is_empty() {
                return Ok(());
            }
            let sid = sids[idx % sids.len()];
            let path = table.path_for_sid(sid).expect("sid in table");
            prop_assert_eq!(table.sid_for_path(path), Some(sid));
        }
    }
}
