use std::io::{Cursor, Read};

use derive_more::Constructor;

use crate::consistency::Consistency;
use crate::error;
use crate::frame::traits::FromCursor;
use crate::frame::{Frame, Opcode, Serialize, StreamId};
use crate::types::{from_cursor_str_long, serialize_str_long, CShort, INT_LEN, SHORT_LEN};

/// Query flags. Bound values, paging and serial consistency are not supported, so no flag is ever
/// set.
const QUERY_FLAGS: u8 = 0x00;

/// Structure which represents body of Query request
#[derive(Debug, PartialEq, Eq, Clone, Default, Constructor)]
pub struct BodyReqQuery {
    /// Query string.
    pub query: String,
    pub consistency: Consistency,
}

impl FromCursor for BodyReqQuery {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> error::Result<BodyReqQuery> {
        let query = from_cursor_str_long(cursor)?.to_string();
        let consistency = Consistency::try_from(CShort::from_cursor(cursor)?)?;

        let mut flags = [0];
        cursor.read_exact(&mut flags)?;

        if flags[0] != QUERY_FLAGS {
            return Err(error::Error::General(format!(
                "Unsupported query flags: {:#04x}",
                flags[0]
            )));
        }

        Ok(BodyReqQuery { query, consistency })
    }
}

impl Serialize for BodyReqQuery {
    #[inline]
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        serialize_str_long(cursor, &self.query);
        self.consistency.serialize(cursor);
        QUERY_FLAGS.serialize(cursor);
    }

    #[inline]
    fn serialize_to_vec(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(INT_LEN + self.query.len() + SHORT_LEN + 1);

        self.serialize(&mut Cursor::new(&mut buf));
        buf
    }
}

impl Frame {
    /// Creates new frame of type `query`.
    pub fn new_req_query(query: String, consistency: Consistency, stream: StreamId) -> Frame {
        let body = BodyReqQuery::new(query, consistency);
        Frame::new_request(Opcode::Query, stream, body.serialize_to_vec())
    }
}
