//! Error responses a server may send instead of a result.
use std::fmt;
use std::io::Cursor;

use super::Serialize;
use crate::error;
use crate::frame::traits::FromCursor;
use crate::types::*;

/// Error returned by a server in an `ERROR` frame: an error code and a message.
#[derive(Debug, PartialEq, Eq, Clone, Hash)]
pub struct ErrorBody {
    /// `CInt` that points to a type of error.
    pub error_code: CInt,
    /// Error message string.
    pub message: String,
}

impl ErrorBody {
    /// Name of the error code as listed by the protocol.
    pub fn error_name(&self) -> &'static str {
        match self.error_code {
            0x0000 => "Server error",
            0x000A => "Protocol error",
            0x0100 => "Bad credentials",
            0x1000 => "Unavailable",
            0x1001 => "Overloaded",
            0x1002 => "Is bootstrapping",
            0x1003 => "Truncate error",
            0x1100 => "Write timeout",
            0x1200 => "Read timeout",
            0x2000 => "Syntax error",
            0x2100 => "Unauthorized",
            0x2200 => "Invalid",
            0x2300 => "Config error",
            0x2400 => "Already exists",
            0x2500 => "Unprepared",
            _ => "Unknown error",
        }
    }
}

impl fmt::Display for ErrorBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({:#06x}): {}",
            self.error_name(),
            self.error_code,
            self.message
        )
    }
}

impl Serialize for ErrorBody {
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        self.error_code.serialize(cursor);
        serialize_str(cursor, &self.message);
    }
}

impl FromCursor for ErrorBody {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> error::Result<ErrorBody> {
        let error_code = CInt::from_cursor(cursor)?;
        let message = from_cursor_str(cursor)?.to_string();

        Ok(ErrorBody {
            error_code,
            message,
        })
    }
}
