//! CoAP (RFC 7252) message coding, options and block-wise transfer (§4.2).
//!
//! This module is pure encode/decode plus the stateless building blocks
//! (`Block1Splitter`, `Block2Reassembler`) block-wise transfer needs. Timing,
//! retransmission and token allocation are the correlator's job
//! (`vdsp_core::correlator`) — this module never touches a clock or an RNG.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{ProtocolError, Result};

/// CoAP content-format identifiers in use by the device (§6).
pub mod content_format {
    /// `text/plain`.
    pub const TEXT_PLAIN: u16 = 0;
    /// `application/json`.
    pub const JSON: u16 = 50;
    /// `application/cbor`.
    pub const CBOR: u16 = 60;
    /// `application/yang-data+cbor`.
    pub const YANG_DATA_CBOR: u16 = 140;
    /// `application/yang-identifiers+cbor`.
    pub const YANG_IDENTIFIERS_CBOR: u16 = 141;
    /// `application/yang-instances+cbor`.
    pub const YANG_INSTANCES_CBOR: u16 = 142;
}

/// CoAP option numbers in use by the device (§4.2, §6).
pub mod option_number {
    /// `Uri-Path`, repeated once per path segment.
    pub const URI_PATH: u16 = 11;
    /// `Content-Format`.
    pub const CONTENT_FORMAT: u16 = 12;
    /// `Uri-Query`.
    pub const URI_QUERY: u16 = 15;
    /// `Accept`.
    pub const ACCEPT: u16 = 17;
    /// `Block2`.
    pub const BLOCK2: u16 = 23;
    /// `Block1`.
    pub const BLOCK1: u16 = 27;
    /// `Size2`.
    pub const SIZE2: u16 = 28;
    /// `Size1`.
    pub const SIZE1: u16 = 60;
}

/// Default Block1/Block2 block size in bytes (SZX = 4, §4.2).
pub const DEFAULT_BLOCK_SIZE: usize = 256;

/// CoAP message type (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// Confirmable — retransmitted until acknowledged.
    Con,
    /// Non-confirmable — sent at most once.
    Non,
    /// Acknowledgement.
    Ack,
    /// Reset — the exchange is rejected/unknown at the peer.
    Rst,
}

impl MessageType {
    const fn to_bits(self) -> u8 {
        match self {
            Self::Con => 0,
            Self::Non => 1,
            Self::Ack => 2,
            Self::Rst => 3,
        }
    }

    const fn from_bits(bits: u8) -> Self {
        match bits & 0x3 {
            0 => Self::Con,
            1 => Self::Non,
            2 => Self::Ack,
            _ => Self::Rst,
        }
    }
}

/// CoAP method/response code as `class.detail` (§3, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Code {
    /// The 3-bit class (0 = request, 2 = success, 4/5 = error).
    pub class: u8,
    /// The 5-bit detail.
    pub detail: u8,
}

impl Code {
    /// `0.01 GET`.
    pub const GET: Self = Self { class: 0, detail: 1 };
    /// `0.02 POST`.
    pub const POST: Self = Self { class: 0, detail: 2 };
    /// `0.03 PUT`.
    pub const PUT: Self = Self { class: 0, detail: 3 };
    /// `0.04 DELETE`.
    pub const DELETE: Self = Self { class: 0, detail: 4 };
    /// `2.01 Created`.
    pub const CREATED: Self = Self { class: 2, detail: 1 };
    /// `2.04 Changed`.
    pub const CHANGED: Self = Self { class: 2, detail: 4 };
    /// `2.05 Content`.
    pub const CONTENT: Self = Self { class: 2, detail: 5 };
    /// `2.31 Continue` (Block1 acknowledgement).
    pub const CONTINUE: Self = Self { class: 2, detail: 31 };
    /// `4.00 Bad Request`.
    pub const BAD_REQUEST: Self = Self { class: 4, detail: 0 };
    /// `4.04 Not Found`.
    pub const NOT_FOUND: Self = Self { class: 4, detail: 4 };
    /// `5.00 Internal Server Error`.
    pub const INTERNAL_SERVER_ERROR: Self = Self { class: 5, detail: 0 };

    const fn to_byte(self) -> u8 {
        (self.class << 5) | (self.detail & 0x1F)
    }

    const fn from_byte(byte: u8) -> Self {
        Self { class: byte >> 5, detail: byte & 0x1F }
    }

    /// `true` for class 2 (success).
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.class == 2
    }

    /// `true` for class 4 (client error, not retriable, §4.2/§7).
    #[must_use]
    pub const fn is_client_error(self) -> bool {
        self.class == 4
    }

    /// `true` for class 5 (server error, not retriable, §4.2/§7).
    #[must_use]
    pub const fn is_server_error(self) -> bool {
        self.class == 5
    }
}

/// A single CoAP option, keyed by option number (§3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoapOption {
    /// Option number.
    pub number: u16,
    /// Raw option value bytes.
    pub value: Bytes,
}

impl CoapOption {
    /// Build a `Uri-Path` option for one path segment.
    #[must_use]
    pub fn uri_path(segment: &str) -> Self {
        Self { number: option_number::URI_PATH, value: Bytes::copy_from_slice(segment.as_bytes()) }
    }

    /// Build a `Content-Format` option in minimum-length unsigned-integer
    /// form (§4.2).
    #[must_use]
    pub fn content_format(format: u16) -> Self {
        Self { number: option_number::CONTENT_FORMAT, value: minimal_uint(u32::from(format)) }
    }
}

fn minimal_uint(value: u32) -> Bytes {
    let bytes = value.to_be_bytes();
    let first_nonzero = bytes.iter().position(|&b| b != 0).unwrap_or(3);
    Bytes::copy_from_slice(&bytes[first_nonzero..])
}

/// Split a path like `/ietf-interfaces:interfaces/interface` into
/// `Uri-Path` options, one per segment.
#[must_use]
pub fn uri_path_options(path: &str) -> Vec<CoapOption> {
    path.trim_matches('/').split('/').filter(|s| !s.is_empty()).map(CoapOption::uri_path).collect()
}

/// A complete CoAP message (§3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// `CON`/`NON`/`ACK`/`RST`.
    pub msg_type: MessageType,
    /// Method or response code.
    pub code: Code,
    /// 16-bit message identifier, used for deduplication/ACK matching.
    pub message_id: u16,
    /// 0-8 byte token uniquely identifying the exchange.
    pub token: Bytes,
    /// Options, need not be pre-sorted — `encode` sorts by number.
    pub options: Vec<CoapOption>,
    /// Message payload, empty if none.
    pub payload: Bytes,
}

enum OptionExt {
    None,
    One(u8),
    Two(u16),
}

fn option_nibble(value: u32) -> Result<(u8, OptionExt)> {
    if value < 13 {
        Ok((value as u8, OptionExt::None))
    } else if value < 269 {
        Ok((13, OptionExt::One((value - 13) as u8)))
    } else if value < 269 + 65536 {
        Ok((14, OptionExt::Two((value - 269) as u16)))
    } else {
        Err(ProtocolError::OptionValueTooLarge(value))
    }
}

fn encode_option(out: &mut BytesMut, delta: u16, value: &[u8]) -> Result<()> {
    let (delta_nibble, delta_ext) = option_nibble(u32::from(delta))?;
    let (len_nibble, len_ext) = option_nibble(value.len() as u32)?;
    out.put_u8((delta_nibble << 4) | len_nibble);
    match delta_ext {
        OptionExt::None => {},
        OptionExt::One(b) => out.put_u8(b),
        OptionExt::Two(v) => out.put_u16(v),
    }
    match len_ext {
        OptionExt::None => {},
        OptionExt::One(b) => out.put_u8(b),
        OptionExt::Two(v) => out.put_u16(v),
    }
    out.extend_from_slice(value);
    Ok(())
}

fn decode_option(bytes: &[u8], last_number: u16) -> Result<(CoapOption, usize)> {
    if bytes.is_empty() {
        return Err(ProtocolError::MessageTruncated { expected: 1, actual: 0 });
    }
    let first = bytes[0];
    let delta_nibble = first >> 4;
    let len_nibble = first & 0x0F;
    let mut pos = 1;

    let mut read_ext = |nibble: u8| -> Result<u32> {
        match nibble {
            0..=12 => Ok(u32::from(nibble)),
            13 => {
                let b = *bytes.get(pos).ok_or(ProtocolError::MessageTruncated {
                    expected: pos + 1,
                    actual: bytes.len(),
                })?;
                pos += 1;
                Ok(u32::from(b) + 13)
            },
            14 => {
                let hi = *bytes.get(pos).ok_or(ProtocolError::MessageTruncated {
                    expected: pos + 2,
                    actual: bytes.len(),
                })?;
                let lo = *bytes.get(pos + 1).ok_or(ProtocolError::MessageTruncated {
                    expected: pos + 2,
                    actual: bytes.len(),
                })?;
                pos += 2;
                Ok(u32::from(u16::from_be_bytes([hi, lo])) + 269)
            },
            _ => Err(ProtocolError::OptionValueTooLarge(15)),
        }
    };

    let delta = read_ext(delta_nibble)?;
    let length = read_ext(len_nibble)?;

    let length = length as usize;
    if bytes.len() < pos + length {
        return Err(ProtocolError::MessageTruncated { expected: pos + length, actual: bytes.len() });
    }
    let value = Bytes::copy_from_slice(&bytes[pos..pos + length]);
    pos += length;

    let number = last_number + delta as u16;
    Ok((CoapOption { number, value }, pos))
}

impl Message {
    /// Encode to wire bytes. Options are sorted by number first (stable, so
    /// options sharing a number keep their relative order per invariant 2).
    ///
    /// # Errors
    ///
    /// `ProtocolError::TokenTooLong` if the token exceeds 8 bytes, or
    /// `ProtocolError::OptionValueTooLarge` if an option delta/length cannot
    /// be represented.
    pub fn encode(&self) -> Result<Bytes> {
        if self.token.len() > 8 {
            return Err(ProtocolError::TokenTooLong(self.token.len()));
        }

        let mut out = BytesMut::new();
        let byte0 = (1u8 << 6) | (self.msg_type.to_bits() << 4) | (self.token.len() as u8);
        out.put_u8(byte0);
        out.put_u8(self.code.to_byte());
        out.put_u16(self.message_id);
        out.extend_from_slice(&self.token);

        let mut sorted: Vec<&CoapOption> = self.options.iter().collect();
        sorted.sort_by_key(|o| o.number);

        let mut last_number = 0u16;
        for option in sorted {
            let delta = option.number - last_number;
            encode_option(&mut out, delta, &option.value)?;
            last_number = option.number;
        }

        if !self.payload.is_empty() {
            out.put_u8(0xFF);
            out.extend_from_slice(&self.payload);
        }

        Ok(out.freeze())
    }

    /// Decode from wire bytes.
    ///
    /// # Errors
    ///
    /// `ProtocolError::MessageTruncated` if the buffer is shorter than the
    /// header demands, or `ProtocolError::UnsupportedVersion` if the version
    /// field is not 1.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 4 {
            return Err(ProtocolError::MessageTruncated { expected: 4, actual: bytes.len() });
        }
        let byte0 = bytes[0];
        let version = byte0 >> 6;
        if version != 1 {
            return Err(ProtocolError::UnsupportedVersion(version));
        }
        let msg_type = MessageType::from_bits(byte0 >> 4);
        let tkl = usize::from(byte0 & 0x0F);
        if tkl > 8 {
            return Err(ProtocolError::TokenTooLong(tkl));
        }
        let code = Code::from_byte(bytes[1]);
        let message_id = u16::from_be_bytes([bytes[2], bytes[3]]);

        let mut pos = 4;
        if bytes.len() < pos + tkl {
            return Err(ProtocolError::MessageTruncated { expected: pos + tkl, actual: bytes.len() });
        }
        let token = Bytes::copy_from_slice(&bytes[pos..pos + tkl]);
        pos += tkl;

        let mut options = Vec::new();
        let mut last_number = 0u16;
        while pos < bytes.len() {
            if bytes[pos] == 0xFF {
                pos += 1;
                break;
            }
            let (option, consumed) = decode_option(&bytes[pos..], last_number)?;
            last_number = option.number;
            pos += consumed;
            options.push(option);
        }
        let payload = Bytes::copy_from_slice(&bytes[pos..]);

        Ok(Self { msg_type, code, message_id, token, options, payload })
    }
}

/// Block1/Block2 option value: `NUM(20b) | M(1b) | SZX(3b)` (§4.2, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockOption {
    /// Zero-based block index.
    pub num: u32,
    /// `true` if more blocks follow.
    pub more: bool,
    /// Size exponent; block size is `2^(szx+4)`.
    pub szx: u8,
}

impl BlockOption {
    /// Block size in bytes for this option's `szx`.
    #[must_use]
    pub const fn size(self) -> usize {
        1usize << (self.szx as u32 + 4)
    }

    /// Resolve a block size in bytes (16..=1024, a power of two) to its SZX
    /// exponent.
    #[must_use]
    pub fn szx_for_size(block_size: usize) -> Option<u8> {
        if !(16..=1024).contains(&block_size) || !block_size.is_power_of_two() {
            return None;
        }
        Some((block_size.trailing_zeros() - 4) as u8)
    }

    /// Encode to the minimal big-endian byte form CoAP option values use.
    #[must_use]
    pub fn encode(self) -> Bytes {
        let value: u32 = (self.num << 4) | (u32::from(self.more) << 3) | u32::from(self.szx);
        let bytes = value.to_be_bytes();
        let first_nonzero = bytes.iter().position(|&b| b != 0).unwrap_or(3);
        Bytes::copy_from_slice(&bytes[first_nonzero..])
    }

    /// Decode from an option value.
    ///
    /// # Errors
    ///
    /// `ProtocolError::InvalidBlockOption` if `value` is longer than 3 bytes.
    pub fn decode(value: &[u8]) -> Result<Self> {
        if value.len() > 3 {
            return Err(ProtocolError::InvalidBlockOption(value.len()));
        }
        let mut buf = [0u8; 4];
        buf[4 - value.len()..].copy_from_slice(value);
        let raw = u32::from_be_bytes(buf);
        Ok(Self { num: raw >> 4, more: (raw >> 3) & 0x1 == 1, szx: (raw & 0x7) as u8 })
    }
}

/// Splits an outgoing payload into Block1 chunks (§4.2).
#[derive(Debug, Clone)]
pub struct Block1Splitter<'a> {
    data: &'a [u8],
    szx: u8,
}

impl<'a> Block1Splitter<'a> {
    /// Build a splitter over `data` using the given block size (must be a
    /// power of two in 16..=1024, defaults handled by the caller).
    #[must_use]
    pub fn new(data: &'a [u8], block_size: usize) -> Self {
        let szx = BlockOption::szx_for_size(block_size).unwrap_or(4);
        Self { data, szx }
    }

    /// Total number of blocks, at least 1 even for empty data.
    #[must_use]
    pub fn num_blocks(&self) -> u32 {
        let block_size = 1usize << (self.szx as u32 + 4);
        (self.data.len().div_ceil(block_size)).max(1) as u32
    }

    /// The `index`-th block's bytes and its `Block1` option value, or `None`
    /// past the end.
    #[must_use]
    pub fn block(&self, index: u32) -> Option<(&'a [u8], BlockOption)> {
        let block_size = 1usize << (self.szx as u32 + 4);
        let start = index as usize * block_size;
        if start > self.data.len() || (start == self.data.len() && index != 0) {
            return None;
        }
        let end = (start + block_size).min(self.data.len());
        let more = end < self.data.len();
        Some((&self.data[start..end], BlockOption { num: index, more, szx: self.szx }))
    }
}

/// Reassembles an incoming Block2 sequence in order (§4.2, invariant 4).
#[derive(Debug, Clone, Default)]
pub struct Block2Reassembler {
    expected_num: u32,
    buffer: BytesMut,
    complete: bool,
}

impl Block2Reassembler {
    /// A fresh reassembler awaiting block 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept the next block. Returns `true` once the transfer is complete
    /// (`M=0` received).
    ///
    /// # Errors
    ///
    /// `ProtocolError::UnexpectedBlockNum` if `block.num` is not the next
    /// expected index (invariant 4: received blocks must form a contiguous
    /// prefix).
    pub fn accept(&mut self, block: BlockOption, chunk: &[u8]) -> Result<bool> {
        if block.num != self.expected_num {
            return Err(ProtocolError::UnexpectedBlockNum { expected: self.expected_num, got: block.num });
        }
        self.buffer.extend_from_slice(chunk);
        self.expected_num += 1;
        self.complete = !block.more;
        Ok(self.complete)
    }

    /// `true` once `M=0` has been received.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.complete
    }

    /// Consume the reassembler, yielding the concatenated payload.
    #[must_use]
    pub fn into_payload(self) -> Bytes {
        self.buffer.freeze()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn sample_message() -> Message {
        Message {
            msg_type: MessageType::Con,
            code: Code::GET,
            message_id: 0x1234,
            token: Bytes::copy_from_slice(&[0xAB, 0xCD]),
            options: uri_path_options("ietf-interfaces:interfaces"),
            payload: Bytes::new(),
        }
    }

    #[test]
    fn scenario_c_encodes_uri_path_and_get_code() {
        let msg = sample_message();
        let encoded = msg.encode().expect("encodes");
        let decoded = Message::decode(&encoded).expect("decodes");
        assert_eq!(decoded.code, Code::GET);
        assert_eq!(decoded.options.len(), 1);
        assert_eq!(decoded.options[0].number, option_number::URI_PATH);
        assert_eq!(&decoded.options[0].value[..], b"ietf-interfaces:interfaces");
    }

    #[test]
    fn content_format_uses_minimum_length_form() {
        let option = CoapOption::content_format(content_format::YANG_DATA_CBOR);
        assert_eq!(&option.value[..], &[0, 140][1..]);
    }

    #[test]
    fn scenario_d_block2_reassembles_contiguous_prefix() {
        let mut reassembler = Block2Reassembler::new();
        let chunk0 = vec![1u8; 256];
        let chunk1 = vec![2u8; 256];
        let chunk2 = vec![3u8; 64];

        assert!(!reassembler.accept(BlockOption { num: 0, more: true, szx: 4 }, &chunk0).unwrap());
        assert!(!reassembler.accept(BlockOption { num: 1, more: true, szx: 4 }, &chunk1).unwrap());
        assert!(reassembler.accept(BlockOption { num: 2, more: false, szx: 4 }, &chunk2).unwrap());

        let payload = reassembler.into_payload();
        assert_eq!(payload.len(), 576);
        assert_eq!(&payload[..256], chunk0.as_slice());
        assert_eq!(&payload[256..512], chunk1.as_slice());
        assert_eq!(&payload[512..], chunk2.as_slice());
    }

    #[test]
    fn block2_rejects_out_of_order_block() {
        let mut reassembler = Block2Reassembler::new();
        let err = reassembler.accept(BlockOption { num: 1, more: true, szx: 4 }, &[0u8; 4]).unwrap_err();
        assert!(matches!(err, ProtocolError::UnexpectedBlockNum { expected: 0, got: 1 }));
    }

    #[test]
    fn block1_splitter_covers_partial_final_block() {
        let data = vec![7u8; 300];
        let splitter = Block1Splitter::new(&data, 256);
        assert_eq!(splitter.num_blocks(), 2);

        let (chunk0, opt0) = splitter.block(0).unwrap();
        assert_eq!(chunk0.len(), 256);
        assert!(opt0.more);

        let (chunk1, opt1) = splitter.block(1).unwrap();
        assert_eq!(chunk1.len(), 44);
        assert!(!opt1.more);

        assert!(splitter.block(2).is_none());
    }

    #[test]
    fn block1_splitter_yields_one_empty_block_for_empty_data() {
        let splitter = Block1Splitter::new(&[], 256);
        assert_eq!(splitter.num_blocks(), 1);
        let (chunk, opt) = splitter.block(0).unwrap();
        assert!(chunk.is_empty());
        assert!(!opt.more);
    }

    #[test]
    fn block_option_size_round_trips_szx() {
        let opt = BlockOption { num: 3, more: true, szx: 4 };
        assert_eq!(opt.size(), 256);
        let encoded = opt.encode();
        let decoded = BlockOption::decode(&encoded).unwrap();
        assert_eq!(decoded, opt);
    }

    proptest! {
        /// Invariant 2 (§3, §8): `decode(encode(m)) == m` modulo option
        /// ordering (options sharing a number keep relative order, which
        /// cannot change here since every constructed message has unique
        /// option numbers).
        #[test]
        fn prop_message_round_trip(
            token_len in 0usize..=8,
            message_id in any::<u16>(),
            path in "[a-z][a-z0-9-]{0,12}",
            payload in prop::collection::vec(any::<u8>(), 0..64),
        ) {
            let msg = Message {
                msg_type: MessageType::Con,
                code: Code::GET,
                message_id,
                token: Bytes::copy_from_slice(&vec![0xAAu8; token_len]),
                options: uri_path_options(&path),
                payload: Bytes::from(payload),
            };
            let encoded = msg.encode().expect("encodes");
            let decoded = Message::decode(&encoded).expect("decodes");
            prop_assert_eq!(decoded, msg);
        }
    }
}
