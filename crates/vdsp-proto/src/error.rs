//! Errors for MUP1 framing, CoAP message coding and CBOR/YANG-SID coding.

use thiserror::Error;

/// Errors raised while encoding or decoding protocol bytes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// CBOR serialization failed.
    #[error("CBOR encode failed: {0}")]
    CborEncode(String),

    /// CBOR deserialization failed.
    #[error("CBOR decode failed: {0}")]
    CborDecode(String),

    /// A CoAP message was shorter than the fixed 4-byte header plus token.
    #[error("CoAP message truncated: expected at least {expected} bytes, got {actual}")]
    MessageTruncated {
        /// Minimum number of bytes required to continue decoding.
        expected: usize,
        /// Number of bytes actually available.
        actual: usize,
    },

    /// The CoAP version field was not 1.
    #[error("unsupported CoAP version {0}")]
    UnsupportedVersion(u8),

    /// A token longer than the 8 bytes RFC 7252 allows.
    #[error("CoAP token length {0} exceeds 8 bytes")]
    TokenTooLong(usize),

    /// An option delta or length could not be represented (value too large
    /// for the 2-byte extended form).
    #[error("CoAP option delta/length {0} exceeds the representable range")]
    OptionValueTooLarge(u32),

    /// A Block1/Block2 option value was longer than the 3 bytes the format
    /// allows.
    #[error("block option value too long: {0} bytes")]
    InvalidBlockOption(usize),

    /// A received Block2 fragment arrived out of order.
    #[error("unexpected block number: expected {expected}, got {got}")]
    UnexpectedBlockNum {
        /// Block number the reassembler was waiting for.
        expected: u32,
        /// Block number actually received.
        got: u32,
    },

    /// A MUP1 frame type byte did not match any known frame type.
    #[error("unknown MUP1 frame type byte: {0:#04x}")]
    UnknownFrameType(u8),
}

/// Convenience alias for this crate's fallible operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;
