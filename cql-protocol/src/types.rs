use derive_more::Constructor;
use std::convert::TryInto;
use std::io;
use std::io::{Cursor, Read};
use std::net::{IpAddr, SocketAddr};

use crate::error::{Error, Result};
use crate::frame::traits::FromCursor;
use crate::frame::Serialize;
use crate::types::data_serialization_types::decode_inet;

pub const SHORT_LEN: usize = 2;
pub const INT_LEN: usize = 4;
pub const LONG_LEN: usize = 8;
pub const UUID_LEN: usize = 16;

pub mod data_serialization_types;
pub mod decimal;
pub mod rows;
pub mod value;

pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::types::decimal::Decimal;
    pub use crate::types::rows::Row;
    pub use crate::types::value::{Inet, Value};
}

/// Protocol `[int]`: 4-byte signed integer.
pub type CInt = i32;

impl FromCursor for CInt {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> Result<CInt> {
        let mut buff = [0; INT_LEN];
        cursor.read_exact(&mut buff)?;

        Ok(CInt::from_be_bytes(buff))
    }
}

/// Protocol `[short]`: 2-byte unsigned integer, used for string lengths, counts and type ids.
pub type CShort = u16;

impl FromCursor for CShort {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> Result<CShort> {
        let mut buff = [0; SHORT_LEN];
        cursor.read_exact(&mut buff)?;

        Ok(CShort::from_be_bytes(buff))
    }
}

#[inline]
fn convert_to_array<const S: usize>(bytes: &[u8]) -> std::result::Result<[u8; S], io::Error> {
    bytes
        .try_into()
        .map_err(|error| io::Error::new(io::ErrorKind::UnexpectedEof, error))
}

#[inline]
pub fn try_i64_from_bytes(bytes: &[u8]) -> std::result::Result<i64, io::Error> {
    Ok(i64::from_be_bytes(convert_to_array(bytes)?))
}

#[inline]
pub fn try_i32_from_bytes(bytes: &[u8]) -> std::result::Result<i32, io::Error> {
    Ok(i32::from_be_bytes(convert_to_array(bytes)?))
}

#[inline]
pub fn try_u16_from_bytes(bytes: &[u8]) -> std::result::Result<u16, io::Error> {
    Ok(u16::from_be_bytes(convert_to_array(bytes)?))
}

#[inline]
pub fn try_f32_from_bytes(bytes: &[u8]) -> std::result::Result<f32, io::Error> {
    Ok(f32::from_be_bytes(convert_to_array(bytes)?))
}

#[inline]
pub fn try_f64_from_bytes(bytes: &[u8]) -> std::result::Result<f64, io::Error> {
    Ok(f64::from_be_bytes(convert_to_array(bytes)?))
}

/// Writes a `[string]`: `[short]` length followed by UTF-8 bytes.
pub fn serialize_str(cursor: &mut Cursor<&mut Vec<u8>>, value: &str) {
    let len = value.len() as CShort;
    len.serialize(cursor);
    value.as_bytes().serialize(cursor);
}

/// Writes a `[long string]`: `[int]` length followed by UTF-8 bytes.
pub fn serialize_str_long(cursor: &mut Cursor<&mut Vec<u8>>, value: &str) {
    let len = value.len() as CInt;
    len.serialize(cursor);
    value.as_bytes().serialize(cursor);
}

pub fn serialize_str_list<'a>(
    cursor: &mut Cursor<&mut Vec<u8>>,
    list: impl ExactSizeIterator<Item = &'a str>,
) {
    let len = list.len() as CShort;
    len.serialize(cursor);

    for string in list {
        serialize_str(cursor, string);
    }
}

/// Writes a `[string map]` from an ordered list of pairs.
pub fn serialize_str_map<K: AsRef<str>, V: AsRef<str>>(
    cursor: &mut Cursor<&mut Vec<u8>>,
    map: &[(K, V)],
) {
    let len = map.len() as CShort;
    len.serialize(cursor);

    for (key, value) in map {
        serialize_str(cursor, key.as_ref());
        serialize_str(cursor, value.as_ref());
    }
}

pub fn from_cursor_str<'a>(cursor: &mut Cursor<&'a [u8]>) -> Result<&'a str> {
    let len = CShort::from_cursor(cursor)?;
    let body_bytes = cursor_next_value_ref(cursor, len as usize)?;

    std::str::from_utf8(body_bytes).map_err(Into::into)
}

pub fn from_cursor_str_long<'a>(cursor: &mut Cursor<&'a [u8]>) -> Result<&'a str> {
    let len = CInt::from_cursor(cursor)?;
    if len < 0 {
        return Err(Error::General(format!("Negative long string length: {len}")));
    }

    let body_bytes = cursor_next_value_ref(cursor, len as usize)?;

    std::str::from_utf8(body_bytes).map_err(Into::into)
}

pub fn from_cursor_string_list(cursor: &mut Cursor<&[u8]>) -> Result<Vec<String>> {
    let len = CShort::from_cursor(cursor)?;

    (0..len)
        .map(|_| from_cursor_str(cursor).map(str::to_string))
        .collect()
}

/// Reads a `[string multimap]` keeping the order pairs were sent in.
pub fn from_cursor_string_multimap(cursor: &mut Cursor<&[u8]>) -> Result<Vec<(String, Vec<String>)>> {
    let len = CShort::from_cursor(cursor)?;

    (0..len)
        .map(|_| {
            let key = from_cursor_str(cursor)?.to_string();
            let values = from_cursor_string_list(cursor)?;
            Ok((key, values))
        })
        .collect()
}

/// The structure that represents protocol `[bytes]`: `[int]` length followed by that many bytes.
/// A negative length means null.
#[derive(Debug, Clone, Hash, PartialEq, Eq, Ord, PartialOrd, Default)]
pub struct CBytes {
    bytes: Option<Vec<u8>>,
}

impl CBytes {
    #[inline]
    pub fn new(bytes: Vec<u8>) -> CBytes {
        CBytes { bytes: Some(bytes) }
    }

    /// Creates bytes that represent a null value.
    #[inline]
    pub fn new_null() -> CBytes {
        CBytes { bytes: None }
    }

    #[inline]
    pub fn as_slice(&self) -> Option<&[u8]> {
        self.bytes.as_deref()
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.bytes.is_none()
    }

    #[inline]
    pub fn into_bytes(self) -> Option<Vec<u8>> {
        self.bytes
    }
}

impl FromCursor for CBytes {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> Result<CBytes> {
        let len = CInt::from_cursor(cursor)?;
        // null value
        if len < 0 {
            return Ok(CBytes::new_null());
        }

        cursor_next_value(cursor, len as usize).map(CBytes::new)
    }
}

impl Serialize for CBytes {
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        match &self.bytes {
            Some(bytes) => {
                (bytes.len() as CInt).serialize(cursor);
                bytes.serialize(cursor);
            }
            None => (-1 as CInt).serialize(cursor),
        }
    }
}

/// Protocol `[short bytes]`: `[short]` length followed by that many bytes. Collection elements
/// are encoded this way in protocol v2.
#[derive(Debug, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Default, Constructor)]
pub struct CBytesShort {
    bytes: Vec<u8>,
}

impl CBytesShort {
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn into_plain(self) -> Vec<u8> {
        self.bytes
    }
}

impl FromCursor for CBytesShort {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> Result<CBytesShort> {
        let len = CShort::from_cursor(cursor)?;
        cursor_next_value(cursor, len as usize).map(CBytesShort::new)
    }
}

impl Serialize for CBytesShort {
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        (self.bytes.len() as CShort).serialize(cursor);
        self.bytes.serialize(cursor);
    }
}

/// Protocol `[inet]`: one length byte (4 or 16), the address bytes and an `[int]` port.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Constructor)]
pub struct CInet {
    pub addr: SocketAddr,
}

impl Serialize for CInet {
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        match self.addr.ip() {
            IpAddr::V4(v4) => {
                [4].serialize(cursor);
                v4.octets().serialize(cursor);
            }
            IpAddr::V6(v6) => {
                [16].serialize(cursor);
                v6.octets().serialize(cursor);
            }
        }

        CInt::from(self.addr.port()).serialize(cursor);
    }
}

impl FromCursor for CInet {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> Result<CInet> {
        let mut buff = [0];
        cursor.read_exact(&mut buff)?;

        let ip = decode_inet(cursor_next_value_ref(cursor, buff[0] as usize)?)?;
        let port = CInt::from_cursor(cursor)?;

        Ok(CInet::new(SocketAddr::new(ip, port as u16)))
    }
}

pub fn cursor_next_value(cursor: &mut Cursor<&[u8]>, len: usize) -> Result<Vec<u8>> {
    cursor_next_value_ref(cursor, len).map(|bytes| bytes.to_vec())
}

pub fn cursor_next_value_ref<'a>(cursor: &mut Cursor<&'a [u8]>, len: usize) -> Result<&'a [u8]> {
    let start = cursor.position() as usize;
    let data: &'a [u8] = cursor.get_ref();

    let result = start
        .checked_add(len)
        .and_then(|end| data.get(start..end))
        .ok_or_else(|| {
            Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("expected {len} bytes at position {start}"),
            ))
        })?;

    cursor.set_position((start + len) as u64);
    Ok(result)
}
