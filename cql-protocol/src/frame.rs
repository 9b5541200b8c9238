//! `frame` module contains general Frame functionality.
use bitflags::bitflags;
use derive_more::Display;
use thiserror::Error as ThisError;
use uuid::Uuid;

use crate::error;
use crate::frame::message_response::ResponseBody;
pub use crate::frame::traits::*;
use crate::types::UUID_LEN;

/// Number of bytes in a protocol v2 frame header.
pub const HEADER_LEN: usize = 8;
/// Largest body a frame may declare before it is treated as a framing error.
pub const MAX_BODY_LEN: usize = 256 * 1024 * 1024;

pub mod events;
pub mod frame_decoder;
pub mod message_error;
pub mod message_options;
pub mod message_query;
pub mod message_register;
pub mod message_response;
pub mod message_result;
pub mod message_startup;
pub mod message_supported;
pub mod traits;

/// Stream id reserved for frames pushed by the server.
pub const EVENT_STREAM_ID: StreamId = -1;

pub type StreamId = i8;

#[derive(Debug, Clone, PartialEq, Ord, PartialOrd, Eq, Hash)]
pub struct Frame {
    pub version: Version,
    pub direction: Direction,
    pub flags: Flags,
    pub opcode: Opcode,
    pub stream: StreamId,
    pub body: Vec<u8>,
    pub tracing_id: Option<Uuid>,
}

impl Frame {
    /// Creates a request frame with no flags set.
    pub fn new_request(opcode: Opcode, stream: StreamId, body: Vec<u8>) -> Self {
        Frame {
            version: Version::V2,
            direction: Direction::Request,
            flags: Flags::empty(),
            opcode,
            stream,
            body,
            tracing_id: None,
        }
    }

    /// Decodes the body according to the opcode. Only response opcodes of protocol v2 are
    /// supported.
    pub fn response_body(&self) -> error::Result<ResponseBody> {
        if let Version::Unknown(version) = self.version {
            return Err(error::Error::General(format!(
                "Unsupported protocol version: {version}"
            )));
        }

        ResponseBody::try_from(self.body.as_slice(), self.opcode)
    }

    #[inline]
    pub fn tracing_id(&self) -> &Option<Uuid> {
        &self.tracing_id
    }

    #[inline]
    pub fn is_event(&self) -> bool {
        self.stream == EVENT_STREAM_ID
    }

    pub fn encode(&self) -> Vec<u8> {
        let combined_version_byte = u8::from(self.version) | u8::from(self.direction);
        let flag_byte = self.flags.bits();
        let opcode_byte = u8::from(self.opcode);

        let mut v = Vec::with_capacity(HEADER_LEN + self.body.len());

        v.push(combined_version_byte);
        v.push(flag_byte);
        v.extend_from_slice(&self.stream.to_be_bytes());
        v.push(opcode_byte);

        let body_len = self.body.len() as u32;
        v.extend_from_slice(&body_len.to_be_bytes());
        v.extend_from_slice(&self.body);

        v
    }

    /// Parses a single frame from the start of `data`. Trailing bytes are left untouched and the
    /// number of bytes consumed is reported in the result. Header fields this codec doesn't know
    /// are kept as they are, so a frame is always consumed whole and the failure belongs to
    /// whoever decodes its body.
    pub fn from_buffer(data: &[u8]) -> Result<ParsedFrame, ParseFrameError> {
        if data.len() < HEADER_LEN {
            return Err(ParseFrameError::NotEnoughBytes);
        }

        let body_len = u32::from_be_bytes([data[4], data[5], data[6], data[7]]) as usize;
        if body_len > MAX_BODY_LEN {
            return Err(ParseFrameError::TooLarge(body_len));
        }

        let frame_len = HEADER_LEN + body_len;
        if data.len() < frame_len {
            return Err(ParseFrameError::NotEnoughBytes);
        }

        let version = Version::from(data[0]);
        let direction = Direction::from(data[0]);
        let flags = Flags::from_bits_truncate(data[1]);
        let stream = i8::from_be_bytes([data[2]]);
        let opcode = Opcode::from(data[3]);

        let mut body = &data[HEADER_LEN..frame_len];

        let tracing_id = if flags.contains(Flags::TRACING)
            && direction == Direction::Response
            && body.len() >= UUID_LEN
        {
            let id = Uuid::from_slice(&body[..UUID_LEN]).ok();
            body = &body[UUID_LEN..];

            id
        } else {
            None
        };

        Ok(ParsedFrame {
            frame_len,
            frame: Frame {
                version,
                direction,
                flags,
                opcode,
                stream,
                body: body.to_vec(),
                tracing_id,
            },
        })
    }
}

/// A frame parsed off the front of a buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFrame {
    /// Number of bytes the frame occupied, header included.
    pub frame_len: usize,
    pub frame: Frame,
}

#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum ParseFrameError {
    /// The buffer does not contain a whole frame yet.
    #[error("Not enough bytes")]
    NotEnoughBytes,
    #[error("Frame body too large: {0} bytes")]
    TooLarge(usize),
}

impl From<ParseFrameError> for error::Error {
    fn from(value: ParseFrameError) -> Self {
        error::Error::General(value.to_string())
    }
}

#[derive(Debug, PartialEq, Copy, Clone, Ord, PartialOrd, Eq, Hash, Display)]
pub enum Version {
    V2,
    #[display("Unknown({_0})")]
    Unknown(u8),
}

impl From<Version> for u8 {
    fn from(value: Version) -> Self {
        match value {
            Version::V2 => 2,
            Version::Unknown(version) => version & 0x0F,
        }
    }
}

impl From<u8> for Version {
    fn from(version: u8) -> Self {
        match version & 0x0F {
            2 => Version::V2,
            v => Version::Unknown(v),
        }
    }
}

#[derive(Debug, PartialEq, Copy, Clone, Ord, PartialOrd, Eq, Hash, Display)]
pub enum Direction {
    Request,
    Response,
}

impl From<Direction> for u8 {
    fn from(value: Direction) -> u8 {
        match value {
            Direction::Request => 0x00,
            Direction::Response => 0x80,
        }
    }
}

impl From<u8> for Direction {
    fn from(value: u8) -> Self {
        match value & 0x80 {
            0 => Direction::Request,
            _ => Direction::Response,
        }
    }
}

bitflags! {
    /// Frame flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct Flags: u8 {
        const COMPRESSION = 0x01;
        const TRACING = 0x02;
    }
}

impl Default for Flags {
    #[inline]
    fn default() -> Self {
        Flags::empty()
    }
}

#[derive(Debug, PartialEq, Copy, Clone, Ord, PartialOrd, Eq, Hash, Display)]
pub enum Opcode {
    Error,
    Startup,
    Ready,
    Authenticate,
    Options,
    Supported,
    Query,
    Result,
    Prepare,
    Execute,
    Register,
    Event,
    Batch,
    AuthChallenge,
    AuthResponse,
    AuthSuccess,
    /// Opcode byte outside the protocol.
    #[display("Unknown({_0:#04x})")]
    Unknown(u8),
}

impl From<Opcode> for u8 {
    fn from(value: Opcode) -> Self {
        match value {
            Opcode::Error => 0x00,
            Opcode::Startup => 0x01,
            Opcode::Ready => 0x02,
            Opcode::Authenticate => 0x03,
            Opcode::Options => 0x05,
            Opcode::Supported => 0x06,
            Opcode::Query => 0x07,
            Opcode::Result => 0x08,
            Opcode::Prepare => 0x09,
            Opcode::Execute => 0x0A,
            Opcode::Register => 0x0B,
            Opcode::Event => 0x0C,
            Opcode::Batch => 0x0D,
            Opcode::AuthChallenge => 0x0E,
            Opcode::AuthResponse => 0x0F,
            Opcode::AuthSuccess => 0x10,
            Opcode::Unknown(value) => value,
        }
    }
}

impl From<u8> for Opcode {
    fn from(value: u8) -> Self {
        match value {
            0x00 => Opcode::Error,
            0x01 => Opcode::Startup,
            0x02 => Opcode::Ready,
            0x03 => Opcode::Authenticate,
            0x05 => Opcode::Options,
            0x06 => Opcode::Supported,
            0x07 => Opcode::Query,
            0x08 => Opcode::Result,
            0x09 => Opcode::Prepare,
            0x0A => Opcode::Execute,
            0x0B => Opcode::Register,
            0x0C => Opcode::Event,
            0x0D => Opcode::Batch,
            0x0E => Opcode::AuthChallenge,
            0x0F => Opcode::AuthResponse,
            0x10 => Opcode::AuthSuccess,
            value => Opcode::Unknown(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consistency::Consistency;
    use crate::frame::message_query::BodyReqQuery;

    #[test]
    fn test_frame_version_as_byte() {
        assert_eq!(u8::from(Version::V2), 0x02);
        assert_eq!(u8::from(Version::V2) | u8::from(Direction::Response), 0x82);
    }

    #[test]
    fn test_frame_version_from() {
        assert_eq!(Version::from(0x02), Version::V2);
        assert_eq!(Version::from(0x82), Version::V2);
        assert_eq!(Version::from(0x84), Version::Unknown(4));
    }

    #[test]
    fn test_direction_from() {
        assert_eq!(Direction::from(0x02), Direction::Request);
        assert_eq!(Direction::from(0x82), Direction::Response);
    }

    #[test]
    fn test_opcode_as_byte() {
        assert_eq!(u8::from(Opcode::Error), 0x00);
        assert_eq!(u8::from(Opcode::Startup), 0x01);
        assert_eq!(u8::from(Opcode::Ready), 0x02);
        assert_eq!(u8::from(Opcode::Authenticate), 0x03);
        assert_eq!(u8::from(Opcode::Options), 0x05);
        assert_eq!(u8::from(Opcode::Supported), 0x06);
        assert_eq!(u8::from(Opcode::Query), 0x07);
        assert_eq!(u8::from(Opcode::Result), 0x08);
        assert_eq!(u8::from(Opcode::Prepare), 0x09);
        assert_eq!(u8::from(Opcode::Execute), 0x0A);
        assert_eq!(u8::from(Opcode::Register), 0x0B);
        assert_eq!(u8::from(Opcode::Event), 0x0C);
        assert_eq!(u8::from(Opcode::Batch), 0x0D);
        assert_eq!(u8::from(Opcode::AuthChallenge), 0x0E);
        assert_eq!(u8::from(Opcode::AuthResponse), 0x0F);
        assert_eq!(u8::from(Opcode::AuthSuccess), 0x10);
    }

    #[test]
    fn test_opcode_from() {
        assert_eq!(Opcode::from(0x00), Opcode::Error);
        assert_eq!(Opcode::from(0x01), Opcode::Startup);
        assert_eq!(Opcode::from(0x02), Opcode::Ready);
        assert_eq!(Opcode::from(0x08), Opcode::Result);
        assert_eq!(Opcode::from(0x0C), Opcode::Event);
        assert_eq!(Opcode::from(0x10), Opcode::AuthSuccess);
        assert_eq!(Opcode::from(0x04), Opcode::Unknown(0x04));
        assert_eq!(Opcode::from(0x11), Opcode::Unknown(0x11));
        assert_eq!(u8::from(Opcode::Unknown(0x11)), 0x11);
    }

    #[test]
    fn test_header_layout() {
        let frame = Frame::new_request(Opcode::Options, 5, vec![]);
        assert_eq!(frame.encode(), vec![0x02, 0x00, 0x05, 0x05, 0, 0, 0, 0]);
    }

    #[test]
    fn test_negative_stream_id_encoding() {
        let frame = Frame::new_request(Opcode::Register, EVENT_STREAM_ID, vec![]);
        assert_eq!(frame.encode()[2], 0xFF);
    }

    #[test]
    fn test_request_round_trip() {
        let body = BodyReqQuery::new("SELECT * FROM system.local".into(), Consistency::One)
            .serialize_to_vec();
        let frame = Frame::new_request(Opcode::Query, 42, body.clone());

        let encoded = frame.encode();
        let parsed = Frame::from_buffer(&encoded).unwrap();

        assert_eq!(parsed.frame_len, encoded.len());
        assert_eq!(parsed.frame.opcode, Opcode::Query);
        assert_eq!(parsed.frame.stream, 42);
        assert_eq!(parsed.frame.body, body);
        assert_eq!(parsed.frame, frame);
    }

    #[test]
    fn test_from_buffer_not_enough_bytes() {
        let encoded = Frame::new_request(Opcode::Query, 1, vec![1, 2, 3]).encode();

        assert_eq!(
            Frame::from_buffer(&encoded[..5]),
            Err(ParseFrameError::NotEnoughBytes)
        );
        assert_eq!(
            Frame::from_buffer(&encoded[..encoded.len() - 1]),
            Err(ParseFrameError::NotEnoughBytes)
        );
    }

    #[test]
    fn test_from_buffer_too_large() {
        let data = [0x82, 0, 1, 0x08, 0xFF, 0xFF, 0xFF, 0xFF];
        assert_eq!(
            Frame::from_buffer(&data),
            Err(ParseFrameError::TooLarge(u32::MAX as usize))
        );
    }

    #[test]
    fn test_from_buffer_leaves_trailing_bytes() {
        let mut data = Frame::new_request(Opcode::Options, 1, vec![]).encode();
        data.extend_from_slice(&[0x02, 0x00]);

        let parsed = Frame::from_buffer(&data).unwrap();
        assert_eq!(parsed.frame_len, HEADER_LEN);
    }

    #[test]
    fn test_from_buffer_keeps_unknown_opcode() {
        let data = [0x82, 0, 3, 0x04, 0, 0, 0, 2, 0xAB, 0xCD, 0x82];

        let parsed = Frame::from_buffer(&data).unwrap();
        assert_eq!(parsed.frame_len, 10);
        assert_eq!(parsed.frame.opcode, Opcode::Unknown(0x04));
        assert_eq!(parsed.frame.stream, 3);
        assert!(matches!(
            parsed.frame.response_body(),
            Err(error::Error::UnsupportedOpcode(Opcode::Unknown(0x04)))
        ));
    }

    #[test]
    fn test_from_buffer_keeps_unknown_version() {
        let data = [0x83, 0, 1, 0x02, 0, 0, 0, 0];

        let parsed = Frame::from_buffer(&data).unwrap();
        assert_eq!(parsed.frame.version, Version::Unknown(3));
        assert!(parsed.frame.response_body().is_err());
    }

    #[test]
    fn test_tracing_id_is_stripped() {
        let tracing_id = Uuid::from_u128(0x0102030405060708090a0b0c0d0e0f10);
        let mut data = vec![0x82, 0x02, 0x03, 0x08, 0, 0, 0, 20];
        data.extend_from_slice(tracing_id.as_bytes());
        data.extend_from_slice(&[0, 0, 0, 1]);

        let parsed = Frame::from_buffer(&data).unwrap();
        assert_eq!(parsed.frame.tracing_id, Some(tracing_id));
        assert_eq!(parsed.frame.body, vec![0, 0, 0, 1]);
    }
}
