//! MUP1 (Microchip UART Protocol #1) framing (§4.1).
//!
//! Frames are ASCII-delimited: `SOF TYPE escaped-payload EOF [EOF] CHK0..CHK3`.
//! Emission is infallible; parsing is an incremental state machine that
//! accepts arbitrary byte slices and yields zero or more complete frames per
//! call. Checksum failures and oversized frames are non-fatal: they are
//! counted and reported via `tracing`, never raised as errors, matching the
//! device's own tolerance for line noise.

use bytes::{BufMut, Bytes, BytesMut};

const SOF: u8 = 0x3E; // '>'
const EOF: u8 = 0x3C; // '<'
const ESC: u8 = 0x5C; // '\'

/// Frames larger than this are abandoned mid-parse and the parser resyncs at
/// the next SOF (§4.1 "Oversized data (>1 KiB by default)").
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 1024;

/// MUP1 frame type, carried as the single byte immediately after SOF.
///
/// `Ping` is used for both directions of the ping/pong exchange (§3); the
/// wire does not distinguish them, only the management facade's request
/// context does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameType {
    /// `A` — unsolicited device announcement.
    Announce,
    /// `C` — encapsulated CoAP message.
    Coap,
    /// `P` — ping request or reply.
    Ping,
    /// `T` — trace/diagnostic output.
    Trace,
    /// `S` — system request.
    SysReq,
}

impl FrameType {
    /// The wire byte for this frame type.
    #[must_use]
    pub const fn to_byte(self) -> u8 {
        match self {
            Self::Announce => b'A',
            Self::Coap => b'C',
            Self::Ping => b'P',
            Self::Trace => b'T',
            Self::SysReq => b'S',
        }
    }

    /// Resolve a wire byte to a frame type, if recognised.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'A' => Some(Self::Announce),
            b'C' => Some(Self::Coap),
            b'P' => Some(Self::Ping),
            b'T' => Some(Self::Trace),
            b'S' => Some(Self::SysReq),
            _ => None,
        }
    }
}

/// A fully decoded MUP1 frame (§3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mup1Frame {
    /// Frame type byte.
    pub frame_type: FrameType,
    /// De-escaped payload bytes.
    pub payload: Bytes,
}

impl Mup1Frame {
    /// Build a frame from its parts.
    #[must_use]
    pub fn new(frame_type: FrameType, payload: impl Into<Bytes>) -> Self {
        Self { frame_type, payload: payload.into() }
    }
}

/// Escape a single payload byte into the output buffer, per the §4.1/§6
/// escape table. Returns `true` if the byte required escaping.
fn escape_byte(out: &mut BytesMut, byte: u8) {
    match byte {
        0x00 => {
            out.put_u8(ESC);
            out.put_u8(b'0');
        },
        0xFF => {
            out.put_u8(ESC);
            out.put_u8(b'F');
        },
        SOF | EOF | ESC => {
            out.put_u8(ESC);
            out.put_u8(byte);
        },
        other => out.put_u8(other),
    }
}

/// 16-bit one's-complement checksum with end-around carry (§4.1).
#[must_use]
pub fn checksum16(data: &[u8]) -> u16 {
    let mut sum: u32 = data.iter().map(|&b| u32::from(b)).sum();
    while sum > 0xFFFF {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    !(sum as u16)
}

/// Encode a frame to wire bytes. Infallible (§4.1 "Emission is infallible").
#[must_use]
pub fn encode(frame_type: FrameType, payload: &[u8]) -> Bytes {
    let mut body = BytesMut::with_capacity(payload.len() * 2 + 4);
    body.put_u8(SOF);
    body.put_u8(frame_type.to_byte());
    for &byte in payload {
        escape_byte(&mut body, byte);
    }
    body.put_u8(EOF);
    if payload.len() % 2 == 0 {
        body.put_u8(EOF);
    }

    let checksum = checksum16(&body);
    let mut out = BytesMut::with_capacity(body.len() + 4);
    out.extend_from_slice(&body);
    out.extend_from_slice(format!("{checksum:04X}").as_bytes());
    out.freeze()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Init,
    Sof,
    Data,
    Esc,
    Eof2,
    Chk(u8),
}

/// Incremental MUP1 parser (§4.1).
///
/// Owns no I/O; feed it bytes as they arrive from the transport and collect
/// whatever complete frames fall out. Single-owner by design (§4.7/§5): the
/// transport reader task is the only caller.
#[derive(Debug, Clone)]
pub struct Mup1Parser {
    state: State,
    max_payload_size: usize,
    frame_type: Option<FrameType>,
    payload: BytesMut,
    raw: BytesMut,
    chk_digits: [u8; 4],
    checksum_failures: u64,
}

impl Default for Mup1Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Mup1Parser {
    /// A parser with the default 1 KiB payload ceiling.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_payload_size(DEFAULT_MAX_PAYLOAD_SIZE)
    }

    /// A parser with a custom payload ceiling.
    #[must_use]
    pub fn with_max_payload_size(max_payload_size: usize) -> Self {
        Self {
            state: State::Init,
            max_payload_size,
            frame_type: None,
            payload: BytesMut::new(),
            raw: BytesMut::new(),
            chk_digits: [0; 4],
            checksum_failures: 0,
        }
    }

    /// Number of frames discarded so far due to checksum mismatch.
    #[must_use]
    pub const fn checksum_failures(&self) -> u64 {
        self.checksum_failures
    }

    /// Feed a chunk of transport bytes, returning every complete frame
    /// recovered from it, in order.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Mup1Frame> {
        let mut frames = Vec::new();
        for &byte in bytes {
            if let Some(frame) = self.push_byte(byte) {
                frames.push(frame);
            }
        }
        frames
    }

    fn begin_frame(&mut self) {
        self.payload.clear();
        self.raw.clear();
        self.raw.put_u8(SOF);
        self.frame_type = None;
    }

    fn abandon(&mut self, reason: &'static str) {
        tracing::warn!(reason, "mup1: frame abandoned, resyncing at next SOF");
        self.state = State::Init;
    }

    #[allow(clippy::too_many_lines)]
    fn push_byte(&mut self, byte: u8) -> Option<Mup1Frame> {
        loop {
            match self.state {
                State::Init => {
                    if byte == SOF {
                        self.begin_frame();
                        self.state = State::Sof;
                    }
                    return None;
                },
                State::Sof => {
                    match FrameType::from_byte(byte) {
                        Some(ft) => {
                            self.frame_type = Some(ft);
                            self.raw.put_u8(byte);
                            self.state = State::Data;
                        },
                        None => {
                            self.abandon("unknown frame type byte");
                            continue;
                        },
                    }
                    return None;
                },
                State::Data => {
                    match byte {
                        ESC => {
                            self.raw.put_u8(byte);
                            self.state = State::Esc;
                        },
                        EOF => {
                            self.raw.put_u8(byte);
                            self.state =
                                if self.payload.len() % 2 == 1 { State::Chk(0) } else { State::Eof2 };
                        },
                        SOF | 0x00 | 0xFF => {
                            self.abandon("unescaped control byte in data");
                            continue;
                        },
                        other => {
                            self.payload.put_u8(other);
                            self.raw.put_u8(other);
                            if self.payload.len() > self.max_payload_size {
                                self.abandon("payload exceeded maximum size");
                            }
                        },
                    }
                    return None;
                },
                State::Esc => {
                    let resolved = match byte {
                        b'0' => Some(0x00u8),
                        b'F' => Some(0xFFu8),
                        SOF => Some(SOF),
                        EOF => Some(EOF),
                        ESC => Some(ESC),
                        _ => None,
                    };
                    match resolved {
                        Some(resolved_byte) => {
                            self.payload.put_u8(resolved_byte);
                            self.raw.put_u8(byte);
                            self.state = State::Data;
                            if self.payload.len() > self.max_payload_size {
                                self.abandon("payload exceeded maximum size");
                            }
                        },
                        None => {
                            self.abandon("invalid escape sequence");
                            continue;
                        },
                    }
                    return None;
                },
                State::Eof2 => {
                    if byte == EOF {
                        self.raw.put_u8(byte);
                        self.state = State::Chk(0);
                    } else {
                        self.abandon("expected second EOF for even-length payload");
                        continue;
                    }
                    return None;
                },
                State::Chk(index) => {
                    self.chk_digits[index as usize] = byte;
                    if index < 3 {
                        self.state = State::Chk(index + 1);
                        return None;
                    }
                    self.state = State::Init;
                    return self.finish_frame();
                },
            }
        }
    }

    fn finish_frame(&mut self) -> Option<Mup1Frame> {
        let hex = std::str::from_utf8(&self.chk_digits).ok()?;
        let received = u16::from_str_radix(hex, 16).ok()?;
        let expected = checksum16(&self.raw);
        if received != expected {
            self.checksum_failures += 1;
            tracing::warn!(
                received,
                expected,
                "mup1: checksum mismatch, frame discarded"
            );
            return None;
        }
        let frame_type = self.frame_type?;
        Some(Mup1Frame::new(frame_type, self.payload.split().freeze()))
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn scenario_a_escapes_all_special_bytes_with_double_eof() {
        let payload = [0x00, 0xFF, 0x3E, 0x3C, 0x5C];
        let encoded = encode(FrameType::Trace, &payload);

        assert_eq!(
            &encoded[..encoded.len() - 4],
            &[
                SOF, b'T', ESC, b'0', ESC, b'F', ESC, 0x3E, ESC, 0x3C, ESC, 0x5C, EOF, EOF
            ]
        );

        let mut parser = Mup1Parser::new();
        let frames = parser.feed(&encoded);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].frame_type, FrameType::Trace);
        assert_eq!(&frames[0].payload[..], &payload);
    }

    #[test]
    fn scenario_b_ping_round_trip_has_empty_payload() {
        let encoded = encode(FrameType::Ping, &[]);
        let mut parser = Mup1Parser::new();
        let frames = parser.feed(&encoded);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].frame_type, FrameType::Ping);
        assert!(frames[0].payload.is_empty());
    }

    #[test]
    fn checksum_mismatch_is_counted_not_raised() {
        let mut encoded = encode(FrameType::Coap, b"hello").to_vec();
        let last = encoded.len() - 1;
        encoded[last] ^= 0x01;
        let mut parser = Mup1Parser::new();
        let frames = parser.feed(&encoded);
        assert!(frames.is_empty());
        assert_eq!(parser.checksum_failures(), 1);
    }

    #[test]
    fn oversized_payload_is_abandoned_and_parser_resyncs() {
        let mut parser = Mup1Parser::with_max_payload_size(4);
        let oversized = encode(FrameType::Coap, b"too long for four bytes");
        let good = encode(FrameType::Ping, b"ok");

        let mut stream = oversized.to_vec();
        stream.extend_from_slice(&good);
        let frames = parser.feed(&stream);

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].frame_type, FrameType::Ping);
        assert_eq!(&frames[0].payload[..], b"ok");
    }

    #[test]
    fn leading_garbage_before_sof_is_discarded() {
        let mut parser = Mup1Parser::new();
        let mut stream = vec![0x01, 0x02, 0x03];
        stream.extend_from_slice(&encode(FrameType::Announce, b"hi"));
        let frames = parser.feed(&stream);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].frame_type, FrameType::Announce);
    }

    #[test]
    fn parser_accepts_frames_split_across_feed_calls() {
        let encoded = encode(FrameType::Coap, b"split-me-please");
        let mid = encoded.len() / 2;
        let mut parser = Mup1Parser::new();
        let mut frames = parser.feed(&encoded[..mid]);
        assert!(frames.is_empty());
        frames.extend(parser.feed(&encoded[mid..]));
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0].payload[..], b"split-me-please");
    }

    fn arbitrary_frame_type() -> impl Strategy<Value = FrameType> {
        prop_oneof![
            Just(FrameType::Announce),
            Just(FrameType::Coap),
            Just(FrameType::Ping),
            Just(FrameType::Trace),
            Just(FrameType::SysReq),
        ]
    }

    proptest! {
        /// Invariant 1 (§3, §8): `parse(emit(type, payload)) == (type, payload)`.
        #[test]
        fn prop_round_trip_identity(
            frame_type in arbitrary_frame_type(),
            payload in prop::collection::vec(any::<u8>(), 0..2048),
        ) {
            let encoded = encode(frame_type, &payload);
            let mut parser = Mup1Parser::new();
            let frames = parser.feed(&encoded);
            prop_assert_eq!(frames.len(), 1);
            prop_assert_eq!(frames[0].frame_type, frame_type);
            prop_assert_eq!(&frames[0].payload[..], payload.as_slice());
            prop_assert_eq!(parser.checksum_failures(), 0);
        }

        /// Invariant 2 (§3): checksum of an emitted frame equals the
        /// host-computed value.
        #[test]
        fn prop_checksum_is_self_consistent(
            frame_type in arbitrary_frame_type(),
            payload in prop::collection::vec(any::<u8>(), 0..256),
        ) {
            let encoded = encode(frame_type, &payload);
            let body = &encoded[..encoded.len() - 4];
            let hex = std::str::from_utf8(&encoded[encoded.len() - 4..]).unwrap();
            let received = u16::from_str_radix(hex, 16).unwrap();
            prop_assert_eq!(checksum16(body), received);
        }
    }
}
