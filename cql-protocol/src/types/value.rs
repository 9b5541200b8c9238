use chrono::{DateTime, SecondsFormat, Utc};
use itertools::Itertools;
use num_bigint::BigInt;
use std::fmt;
use std::net::IpAddr;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::frame::message_result::{ColType, ColTypeOption, ColTypeOptionValue};
use crate::types::data_serialization_types::*;
use crate::types::decimal::Decimal;
use crate::types::CShort;

/// Network address column value. IPv6 addresses render as eight full 4-digit groups, with no
/// zero-run compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Inet(pub IpAddr);

impl fmt::Display for Inet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            IpAddr::V4(addr) => write!(f, "{addr}"),
            IpAddr::V6(addr) => {
                let groups = addr
                    .segments()
                    .iter()
                    .map(|segment| format!("{segment:04x}"))
                    .join(":");
                f.write_str(&groups)
            }
        }
    }
}

impl From<IpAddr> for Inet {
    fn from(value: IpAddr) -> Self {
        Inet(value)
    }
}

/// Decoded column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `ascii` and `varchar`.
    Text(String),
    /// `bigint` and `counter`.
    Bigint(i64),
    Int(i32),
    Double(f64),
    Float(f32),
    Boolean(bool),
    Blob(Vec<u8>),
    Timestamp(DateTime<Utc>),
    /// `uuid` and `timeuuid`.
    Uuid(Uuid),
    Inet(Inet),
    Varint(BigInt),
    Decimal(Decimal),
    /// `list` and `set`, in wire order.
    List(Vec<Value>),
    /// `map` entries in wire order.
    Map(Vec<(Value, Value)>),
    /// Value of a column whose type tag is not known.
    Undecoded { type_id: CShort, bytes: Vec<u8> },
}

impl Value {
    /// Decodes the bytes of a single non-null value of the given column type.
    pub fn decode(col_type: &ColTypeOption, bytes: &[u8]) -> Result<Value> {
        Ok(match col_type.id {
            ColType::Ascii => Value::Text(decode_ascii(bytes)),
            ColType::Varchar => Value::Text(decode_varchar(bytes)),
            ColType::Bigint | ColType::Counter => Value::Bigint(decode_bigint(bytes)?),
            ColType::Blob => Value::Blob(bytes.to_vec()),
            ColType::Boolean => Value::Boolean(decode_boolean(bytes)?),
            ColType::Decimal => Value::Decimal(decode_decimal(bytes)?),
            ColType::Double => Value::Double(decode_double(bytes)?),
            ColType::Float => Value::Float(decode_float(bytes)?),
            ColType::Int => Value::Int(decode_int(bytes)?),
            ColType::Timestamp => Value::Timestamp(decode_timestamp(bytes)?),
            ColType::Uuid | ColType::Timeuuid => Value::Uuid(decode_uuid(bytes)?),
            ColType::Varint => Value::Varint(decode_varint(bytes)?),
            ColType::Inet => Value::Inet(Inet(decode_inet(bytes)?)),
            ColType::List | ColType::Set => {
                let element_type = match &col_type.value {
                    Some(ColTypeOptionValue::CList(element_type))
                    | Some(ColTypeOptionValue::CSet(element_type)) => element_type,
                    _ => return Err(missing_element_type(col_type.id)),
                };

                Value::List(
                    decode_list(bytes)?
                        .iter()
                        .map(|element| Value::decode(element_type, element.as_slice()))
                        .try_collect()?,
                )
            }
            ColType::Map => {
                let (key_type, value_type) = match &col_type.value {
                    Some(ColTypeOptionValue::CMap(key_type, value_type)) => (key_type, value_type),
                    _ => return Err(missing_element_type(col_type.id)),
                };

                Value::Map(
                    decode_map(bytes)?
                        .iter()
                        .map(|(key, value)| {
                            Ok((
                                Value::decode(key_type, key.as_slice())?,
                                Value::decode(value_type, value.as_slice())?,
                            ))
                        })
                        .collect::<Result<_>>()?,
                )
            }
            ColType::Custom => return Err(Error::UnsupportedColumnType(ColType::Custom.to_string())),
            ColType::Unknown(type_id) => Value::Undecoded {
                type_id,
                bytes: bytes.to_vec(),
            },
        })
    }

    /// Looks up a map entry by key.
    pub fn map_get(&self, key: &Value) -> Option<&Value> {
        match self {
            Value::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }
}

#[inline]
fn missing_element_type(id: ColType) -> Error {
    Error::General(format!("Missing element type for {id} column"))
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(value) => f.write_str(value),
            Value::Bigint(value) => write!(f, "{value}"),
            Value::Int(value) => write!(f, "{value}"),
            Value::Double(value) => write!(f, "{value}"),
            Value::Float(value) => write!(f, "{value}"),
            Value::Boolean(value) => write!(f, "{value}"),
            Value::Blob(bytes) | Value::Undecoded { bytes, .. } => {
                write!(f, "0x{}", bytes.iter().map(|b| format!("{b:02x}")).join(""))
            }
            Value::Timestamp(value) => {
                f.write_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
            Value::Uuid(value) => write!(f, "{value}"),
            Value::Inet(value) => write!(f, "{value}"),
            Value::Varint(value) => write!(f, "{value}"),
            Value::Decimal(value) => write!(f, "{value}"),
            Value::List(values) => write!(f, "[{}]", values.iter().join(", ")),
            Value::Map(entries) => write!(
                f,
                "{{{}}}",
                entries
                    .iter()
                    .map(|(key, value)| format!("{key}: {value}"))
                    .join(", ")
            ),
        }
    }
}

macro_rules! value_conversion {
    ($t:ty, $($variant:ident),+) => {
        impl TryFrom<&Value> for $t {
            type Error = Error;

            fn try_from(value: &Value) -> Result<Self> {
                match value {
                    $(Value::$variant(inner) => Ok(inner.clone().into()),)+
                    other => Err(Error::General(format!(
                        "Cannot convert {other:?} into {}",
                        stringify!($t)
                    ))),
                }
            }
        }
    };
}

value_conversion!(String, Text);
value_conversion!(i64, Bigint, Int);
value_conversion!(i32, Int);
value_conversion!(f64, Double, Float);
value_conversion!(f32, Float);
value_conversion!(bool, Boolean);
value_conversion!(Vec<u8>, Blob);
value_conversion!(DateTime<Utc>, Timestamp);
value_conversion!(Uuid, Uuid);
value_conversion!(Inet, Inet);
value_conversion!(BigInt, Varint, Bigint, Int);
value_conversion!(Decimal, Decimal);
value_conversion!(Vec<Value>, List);
value_conversion!(Vec<(Value, Value)>, Map);

impl TryFrom<&Value> for IpAddr {
    type Error = Error;

    fn try_from(value: &Value) -> Result<Self> {
        Inet::try_from(value).map(|inet| inet.0)
    }
}
