use std::io::Cursor;

use crate::error;
use crate::frame::{FromCursor, Serialize};
use crate::types::{from_cursor_string_multimap, serialize_str, serialize_str_list, CShort};

/// Startup options a node supports, as sent in reply to `OPTIONS`. Entries keep the order the
/// server sent them in.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct BodyResSupported {
    pub data: Vec<(String, Vec<String>)>,
}

impl BodyResSupported {
    /// Values advertised for the given option.
    pub fn get(&self, option: &str) -> Option<&[String]> {
        self.data
            .iter()
            .find(|(key, _)| key == option)
            .map(|(_, values)| values.as_slice())
    }
}

impl Serialize for BodyResSupported {
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        (self.data.len() as CShort).serialize(cursor);
        self.data.iter().for_each(|(key, value)| {
            serialize_str(cursor, key);
            serialize_str_list(cursor, value.iter().map(|s| s.as_str()));
        })
    }
}

impl FromCursor for BodyResSupported {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> error::Result<BodyResSupported> {
        from_cursor_string_multimap(cursor).map(|data| BodyResSupported { data })
    }
}
