//! Leaf datatypes and simple client-side range/type validation.
//!
//! The SID table carries enough per-leaf metadata to catch obviously invalid
//! outgoing values before they reach the device (§4.4). This is not a YANG
//! schema compiler: it only understands the scalar ranges needed by the
//! leaves this table actually describes.

use crate::error::SidError;

/// Scalar YANG datatype of a leaf, as carried by a [`crate::SidEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    /// `uint8`/`uint16`/`uint32`/`uint64` with an inclusive value range.
    Unsigned {
        /// Inclusive lower bound.
        min: u64,
        /// Inclusive upper bound.
        max: u64,
    },
    /// `int8`/`int16`/`int32`/`int64` with an inclusive value range.
    Signed {
        /// Inclusive lower bound.
        min: i64,
        /// Inclusive upper bound.
        max: i64,
    },
    /// `boolean`.
    Boolean,
    /// `string`.
    String,
    /// `binary` (byte string).
    Binary,
    /// `enumeration`.
    Enumeration,
    /// `identityref`.
    IdentityRef,
    /// `instance-identifier`.
    InstanceIdentifier,
}

impl DataType {
    /// Human-readable name, used in [`SidError::TypeMismatch`].
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Unsigned { .. } => "unsigned integer",
            Self::Signed { .. } => "signed integer",
            Self::Boolean => "boolean",
            Self::String => "string",
            Self::Binary => "binary",
            Self::Enumeration => "enumeration",
            Self::IdentityRef => "identityref",
            Self::InstanceIdentifier => "instance-identifier",
        }
    }

    /// Validate a signed integer value against this datatype's range.
    ///
    /// Only meaningful for [`DataType::Unsigned`]/[`DataType::Signed`]; other
    /// variants accept any integer (range checking does not apply to them).
    ///
    /// # Errors
    ///
    /// `SidError::OutOfRange` if the value falls outside the declared bounds.
    pub fn validate_integer(&self, sid: u32, value: i64) -> Result<(), SidError> {
        match *self {
            Self::Unsigned { min, max } => {
                if value < 0 {
                    return Err(SidError::OutOfRange {
                        sid,
                        value,
                        min: i64::try_from(min).unwrap_or(i64::MAX),
                        max: i64::try_from(max).unwrap_or(i64::MAX),
                    });
                }
                let unsigned = value as u64;
                if unsigned < min || unsigned > max {
                    return Err(SidError::OutOfRange {
                        sid,
                        value,
                        min: i64::try_from(min).unwrap_or(i64::MAX),
                        max: i64::try_from(max).unwrap_or(i64::MAX),
                    });
                }
                Ok(())
            },
            Self::Signed { min, max } => {
                if value < min || value > max {
                    return Err(SidError::OutOfRange { sid, value, min, max });
                }
                Ok(())
            },
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsigned_range_rejects_out_of_bounds() {
        let dt = DataType::Unsigned { min: 0, max: 7 };
        assert!(dt.validate_integer(1, 3).is_ok());
        assert!(matches!(
            dt.validate_integer(1, 8),
            Err(SidError::OutOfRange { .. })
        ));
        assert!(matches!(
            dt.validate_integer(1, -1),
            Err(SidError::OutOfRange { .. })
        ));
    }

    #[test]
    fn signed_range_rejects_out_of_bounds() {
        let dt = DataType::Signed { min: -5, max: 5 };
        assert!(dt.validate_integer(2, -5).is_ok());
        assert!(dt.validate_integer(2, 5).is_ok());
        assert!(matches!(
            dt.validate_integer(2, 6),
            Err(SidError::OutOfRange { .. })
        ));
    }

    #[test]
    fn non_numeric_types_accept_any_integer() {
        assert!(DataType::Boolean.validate_integer(3, i64::MAX).is_ok());
        assert!(DataType::String.validate_integer(3, i64::MIN).is_ok());
    }
}
