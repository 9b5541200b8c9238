use crate::error;
use crate::frame::events::SimpleServerEvent;
use crate::frame::{Frame, FromCursor, Opcode, Serialize, StreamId};
use crate::types::{from_cursor_string_list, serialize_str_list};
use derive_more::Constructor;
use itertools::Itertools;
use std::convert::TryFrom;
use std::io::Cursor;

/// The structure which represents a body of a frame of type `register`.
#[derive(Debug, Constructor, Default, Ord, PartialOrd, Eq, PartialEq, Hash, Clone)]
pub struct BodyReqRegister {
    pub events: Vec<SimpleServerEvent>,
}

impl Serialize for BodyReqRegister {
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        let events = self.events.iter().map(|event| event.as_str());
        serialize_str_list(cursor, events);
    }
}

impl FromCursor for BodyReqRegister {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> error::Result<Self> {
        let events = from_cursor_string_list(cursor)?;
        events
            .iter()
            .map(|event| SimpleServerEvent::try_from(event.as_str()))
            .try_collect()
            .map(BodyReqRegister::new)
    }
}

impl Frame {
    /// Creates new frame of type `REGISTER`.
    pub fn new_req_register(events: Vec<SimpleServerEvent>, stream: StreamId) -> Frame {
        let register_body = BodyReqRegister::new(events);
        Frame::new_request(Opcode::Register, stream, register_body.serialize_to_vec())
    }
}
