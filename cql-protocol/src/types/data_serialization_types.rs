use chrono::{DateTime, Utc};
use num_bigint::BigInt;
use std::convert::TryInto;
use std::io;
use std::net;
use uuid::Uuid;

use super::decimal::Decimal;
use crate::frame::FromCursor;
use crate::types::{
    try_f32_from_bytes, try_f64_from_bytes, try_i32_from_bytes, try_i64_from_bytes, CBytesShort,
    CShort, INT_LEN,
};

// Collections in protocol v2 use [short] counts and [short bytes] elements.

const FALSE_BYTE: u8 = 0;

#[inline]
fn invalid_data<E>(error: E) -> io::Error
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    io::Error::new(io::ErrorKind::InvalidData, error)
}

// Decodes Cassandra `ascii` data (bytes)
#[inline]
pub fn decode_ascii(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

// Decodes Cassandra `varchar` data (bytes)
#[inline]
pub fn decode_varchar(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

// Decodes Cassandra `bigint` and `counter` data (bytes)
#[inline]
pub fn decode_bigint(bytes: &[u8]) -> Result<i64, io::Error> {
    try_i64_from_bytes(bytes)
}

// Decodes Cassandra `boolean` data (bytes)
#[inline]
pub fn decode_boolean(bytes: &[u8]) -> Result<bool, io::Error> {
    bytes
        .first()
        .map(|byte| *byte != FALSE_BYTE)
        .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "no bytes were found"))
}

// Decodes Cassandra `int` data (bytes)
#[inline]
pub fn decode_int(bytes: &[u8]) -> Result<i32, io::Error> {
    try_i32_from_bytes(bytes)
}

// Decodes Cassandra `varint` data (bytes): a big-endian two's complement integer of any length.
#[inline]
pub fn decode_varint(bytes: &[u8]) -> Result<BigInt, io::Error> {
    if bytes.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "no bytes were found",
        ));
    }

    Ok(BigInt::from_signed_bytes_be(bytes))
}

// Decodes Cassandra `decimal` data (bytes): an [int] scale followed by a varint unscaled value.
pub fn decode_decimal(bytes: &[u8]) -> Result<Decimal, io::Error> {
    if bytes.len() <= INT_LEN {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("decimal needs more than {INT_LEN} bytes, got {}", bytes.len()),
        ));
    }

    let (scale, unscaled) = bytes.split_at(INT_LEN);

    let scale = try_i32_from_bytes(scale)?;
    let unscaled = decode_varint(unscaled)?;

    Ok(Decimal::new(unscaled, scale))
}

// Decodes Cassandra `double` data (bytes)
#[inline]
pub fn decode_double(bytes: &[u8]) -> Result<f64, io::Error> {
    try_f64_from_bytes(bytes)
}

// Decodes Cassandra `float` data (bytes)
#[inline]
pub fn decode_float(bytes: &[u8]) -> Result<f32, io::Error> {
    try_f32_from_bytes(bytes)
}

// Decodes Cassandra `inet` data (bytes)
pub fn decode_inet(bytes: &[u8]) -> Result<net::IpAddr, io::Error> {
    match bytes.len() {
        // v4
        4 => {
            let array: [u8; 4] = bytes.try_into().map_err(invalid_data)?;
            Ok(net::IpAddr::V4(net::Ipv4Addr::from(array)))
        }
        // v6
        16 => {
            let array: [u8; 16] = bytes.try_into().map_err(invalid_data)?;
            Ok(net::IpAddr::V6(net::Ipv6Addr::from(array)))
        }
        _ => Err(invalid_data(format!("Invalid Ip address {bytes:?}"))),
    }
}

// Decodes Cassandra `timestamp` data (bytes): milliseconds since the unix epoch, negative values
// being before it.
pub fn decode_timestamp(bytes: &[u8]) -> Result<DateTime<Utc>, io::Error> {
    let millis = try_i64_from_bytes(bytes)?;
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| invalid_data(format!("Timestamp out of range: {millis}")))
}

// Decodes Cassandra `uuid` and `timeuuid` data (bytes)
#[inline]
pub fn decode_uuid(bytes: &[u8]) -> Result<Uuid, io::Error> {
    Uuid::from_slice(bytes).map_err(invalid_data)
}

// Decodes Cassandra `list` and `set` data (bytes) into raw elements.
pub fn decode_list(bytes: &[u8]) -> Result<Vec<CBytesShort>, io::Error> {
    let mut cursor = io::Cursor::new(bytes);
    let len = CShort::from_cursor(&mut cursor).map_err(invalid_data)?;

    (0..len)
        .map(|_| CBytesShort::from_cursor(&mut cursor).map_err(invalid_data))
        .collect()
}

// Decodes Cassandra `map` data (bytes) into raw key/value pairs in wire order.
pub fn decode_map(bytes: &[u8]) -> Result<Vec<(CBytesShort, CBytesShort)>, io::Error> {
    let mut cursor = io::Cursor::new(bytes);
    let len = CShort::from_cursor(&mut cursor).map_err(invalid_data)?;

    (0..len)
        .map(|_| {
            let key = CBytesShort::from_cursor(&mut cursor).map_err(invalid_data)?;
            let value = CBytesShort::from_cursor(&mut cursor).map_err(invalid_data)?;
            Ok((key, value))
        })
        .collect()
}
