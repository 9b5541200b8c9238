use std::io::Cursor;

use crate::frame::*;
use crate::types::*;

const CQL_VERSION: &str = "CQL_VERSION";
const CQL_VERSION_VAL: &str = "3.0.0";

/// Body of a `STARTUP` request. Options are kept in the order they are sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyReqStartup {
    pub options: Vec<(String, String)>,
}

impl BodyReqStartup {
    pub fn new(options: Vec<(String, String)>) -> BodyReqStartup {
        BodyReqStartup { options }
    }
}

impl Default for BodyReqStartup {
    fn default() -> Self {
        BodyReqStartup::new(vec![(CQL_VERSION.into(), CQL_VERSION_VAL.into())])
    }
}

impl Serialize for BodyReqStartup {
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        serialize_str_map(cursor, &self.options);
    }
}

// Frame implementation related to BodyReqStartup

impl Frame {
    /// Creates new frame of type `startup` announcing CQL 3.0.0.
    pub fn new_req_startup(stream: StreamId) -> Frame {
        let body = BodyReqStartup::default();
        Frame::new_request(Opcode::Startup, stream, body.serialize_to_vec())
    }
}
