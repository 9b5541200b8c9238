use std::io::Cursor;

use crate::frame::events::ServerEvent;
use crate::frame::message_error::ErrorBody;
use crate::frame::message_result::{BodyResResultSetKeyspace, ResResultBody, RowsMetadata};
use crate::frame::message_supported::BodyResSupported;
use crate::frame::{FromCursor, Opcode};
use crate::types::rows::Row;
use crate::{error, Error};

/// Decoded body of a response frame.
#[derive(Debug, PartialEq, Clone)]
#[non_exhaustive]
pub enum ResponseBody {
    Error(ErrorBody),
    Ready,
    Supported(BodyResSupported),
    Result(ResResultBody),
    Event(ServerEvent),
}

impl ResponseBody {
    /// Decodes a body according to its frame opcode. Opcodes this codec has no response shape for
    /// are rejected instead of guessed at.
    pub fn try_from(bytes: &[u8], response_type: Opcode) -> error::Result<ResponseBody> {
        let mut cursor: Cursor<&[u8]> = Cursor::new(bytes);
        match response_type {
            Opcode::Error => ErrorBody::from_cursor(&mut cursor).map(ResponseBody::Error),
            Opcode::Ready => Ok(ResponseBody::Ready),
            Opcode::Supported => {
                BodyResSupported::from_cursor(&mut cursor).map(ResponseBody::Supported)
            }
            Opcode::Result => ResResultBody::from_cursor(&mut cursor).map(ResponseBody::Result),
            Opcode::Event => ServerEvent::from_cursor(&mut cursor).map(ResponseBody::Event),
            _ => Err(Error::UnsupportedOpcode(response_type)),
        }
    }

    pub fn into_rows(self) -> Option<Vec<Row>> {
        match self {
            ResponseBody::Result(res) => res.into_rows(),
            _ => None,
        }
    }

    pub fn as_rows_metadata(&self) -> Option<&RowsMetadata> {
        match self {
            ResponseBody::Result(res) => res.as_rows_metadata(),
            _ => None,
        }
    }

    pub fn into_set_keyspace(self) -> Option<BodyResResultSetKeyspace> {
        match self {
            ResponseBody::Result(res) => res.into_set_keyspace(),
            _ => None,
        }
    }

    pub fn into_result(self) -> Option<ResResultBody> {
        match self {
            ResponseBody::Result(res) => Some(res),
            _ => None,
        }
    }

    /// Unwraps body and returns the server event.
    pub fn into_server_event(self) -> Option<ServerEvent> {
        match self {
            ResponseBody::Event(event) => Some(event),
            _ => None,
        }
    }

    pub fn into_supported(self) -> Option<BodyResSupported> {
        match self {
            ResponseBody::Supported(supported) => Some(supported),
            _ => None,
        }
    }

    pub fn into_error(self) -> Option<ErrorBody> {
        match self {
            ResponseBody::Error(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::events::{SimpleServerEvent, StatusChange, StatusChangeType};
    use crate::frame::{Frame, Serialize};
    use crate::types::CInet;
    use std::net::SocketAddr;

    #[test]
    fn ready_has_empty_content() {
        assert_eq!(
            ResponseBody::try_from(&[], Opcode::Ready).unwrap(),
            ResponseBody::Ready
        );
    }

    #[test]
    fn request_opcodes_are_unsupported() {
        for opcode in [
            Opcode::Startup,
            Opcode::Query,
            Opcode::Authenticate,
            Opcode::AuthChallenge,
            Opcode::AuthSuccess,
            Opcode::Prepare,
        ] {
            assert!(matches!(
                ResponseBody::try_from(&[], opcode),
                Err(Error::UnsupportedOpcode(op)) if op == opcode
            ));
        }
    }

    #[test]
    fn event_frame_body() {
        let event = ServerEvent::StatusChange(StatusChange {
            change_type: StatusChangeType::Up,
            addr: CInet::new("10.0.0.3:9042".parse::<SocketAddr>().unwrap()),
        });
        let frame = Frame {
            direction: crate::frame::Direction::Response,
            ..Frame::new_request(Opcode::Event, -1, event.serialize_to_vec())
        };

        assert!(frame.is_event());
        let body = frame.response_body().unwrap().into_server_event().unwrap();
        assert_eq!(body, SimpleServerEvent::StatusChange);
        assert_eq!(body, event);
    }
}
