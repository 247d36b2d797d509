//! TSN (Time-Sensitive Networking) payload builders (§4.6).
//!
//! Pure functions that assemble the CBOR payloads for PTP, TAS (802.1Qbv)
//! and CBS (802.1Qav) configuration. [`crate::facade::ManagementFacade`]
//! hands the result to `yang_set` — this module never talks to the wire.

use vdsp_proto::cbor::CborValue;

/// Denominator of a TAS cycle time: always whole seconds (§4.6).
pub const CYCLE_TIME_DENOMINATOR: u32 = 1_000_000_000;

/// Rational cycle time for a TAS gate-parameter-table, in seconds as
/// `numerator / 1_000_000_000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleTime {
    /// Numerator in nanoseconds.
    pub numerator: u32,
}

/// One entry of a TAS admin-control-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateControlEntry {
    /// 8-bit gate-state mask, one bit per traffic class 0..7 (§4.6).
    pub gate_states: u8,
    /// How long this entry holds the gate state, in nanoseconds.
    pub time_interval_ns: u32,
}

/// Builds the CBOR payload for a TAS `gate-parameter-table` (§4.6).
#[must_use]
pub fn gate_parameter_table(
    cycle_time: CycleTime,
    admin_base_time: u64,
    control_list: &[GateControlEntry],
) -> CborValue {
    let entries = control_list
        .iter()
        .map(|entry| {
            CborValue::Map(vec![
                ("gate-states-value".to_string(), CborValue::Integer(i128::from(entry.gate_states))),
                (
                    "time-interval-value".to_string(),
                    CborValue::Integer(i128::from(entry.time_interval_ns)),
                ),
            ])
        })
        .collect();

    CborValue::Map(vec![
        (
            "admin-cycle-time".to_string(),
            CborValue::Map(vec![
                ("numerator".to_string(), CborValue::Integer(i128::from(cycle_time.numerator))),
                (
                    "denominator".to_string(),
                    CborValue::Integer(i128::from(CYCLE_TIME_DENOMINATOR)),
                ),
            ]),
        ),
        ("admin-base-time".to_string(), CborValue::Integer(i128::from(admin_base_time))),
        ("admin-control-list".to_string(), CborValue::Array(entries)),
    ])
}

/// Builds the CBOR payload for a CBS `idle-slope` assignment on one queue
/// (§4.6).
#[must_use]
pub fn cbs_idle_slope(idle_slope: u32) -> CborValue {
    CborValue::Map(vec![("idle-slope".to_string(), CborValue::Integer(i128::from(idle_slope)))])
}

/// Builds the CBOR payload for a PTP instance `default-ds` configuration
/// (§4.6).
#[must_use]
pub fn ptp_default_ds(domain_number: u8, priority1: u8, priority2: u8) -> CborValue {
    CborValue::Map(vec![
        ("domain-number".to_string(), CborValue::Integer(i128::from(domain_number))),
        ("priority1".to_string(), CborValue::Integer(i128::from(priority1))),
        ("priority2".to_string(), CborValue::Integer(i128::from(priority2))),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_parameter_table_carries_fixed_denominator() {
        let value = gate_parameter_table(
            CycleTime { numerator: 1_000_000 },
            0,
            &[GateControlEntry { gate_states: 0b1111_1111, time_interval_ns: 500_000 }],
        );
        let CborValue::Map(entries) = value else { panic!("expected a map") };
        let (_, cycle_time) = entries.iter().find(|(k, _)| k == "admin-cycle-time").unwrap();
        let CborValue::Map(cycle_entries) = cycle_time else { panic!("expected a map") };
        assert!(
            cycle_entries
                .iter()
                .any(|(k, v)| k == "denominator" && *v == CborValue::Integer(1_000_000_000))
        );
    }

    #[test]
    fn control_list_entries_preserve_order() {
        let entries = [
            GateControlEntry { gate_states: 0x01, time_interval_ns: 100 },
            GateControlEntry { gate_states: 0x02, time_interval_ns: 200 },
        ];
        let value = gate_parameter_table(CycleTime { numerator: 1 }, 0, &entries);
        let CborValue::Map(top) = value else { panic!("expected a map") };
        let (_, list) = top.iter().find(|(k, _)| k == "admin-control-list").unwrap();
        let CborValue::Array(items) = list else { panic!("expected an array") };
        assert_eq!(items.len(), 2);
    }
}
