use bitflags::bitflags;
use derive_more::{Constructor, Display};
use std::convert::{TryFrom, TryInto};
use std::io::Cursor;
use std::sync::Arc;

use crate::error;
use crate::error::Error;
use crate::frame::events::SchemaChange;
use crate::frame::{FromBytes, FromCursor, Serialize};
use crate::types::rows::Row;
use crate::types::value::Value;
use crate::types::{
    from_cursor_str, serialize_str, try_i32_from_bytes, try_u16_from_bytes, CBytes, CInt, CShort,
};

/// `ResultKind` is enum which represents types of result.
#[derive(Debug, Ord, PartialOrd, Eq, PartialEq, Copy, Clone, Hash, Display)]
pub enum ResultKind {
    /// Void result.
    Void,
    /// Rows result.
    Rows,
    /// Set keyspace result.
    SetKeyspace,
    /// Prepared result. Prepared statements are not supported, so such bodies are never decoded.
    Prepared,
    /// Schema change result.
    SchemaChange,
}

impl Serialize for ResultKind {
    #[inline]
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        CInt::from(*self).serialize(cursor);
    }
}

impl FromBytes for ResultKind {
    fn from_bytes(bytes: &[u8]) -> error::Result<ResultKind> {
        try_i32_from_bytes(bytes)
            .map_err(Into::into)
            .and_then(ResultKind::try_from)
    }
}

impl From<ResultKind> for CInt {
    fn from(value: ResultKind) -> Self {
        match value {
            ResultKind::Void => 0x0001,
            ResultKind::Rows => 0x0002,
            ResultKind::SetKeyspace => 0x0003,
            ResultKind::Prepared => 0x0004,
            ResultKind::SchemaChange => 0x0005,
        }
    }
}

impl TryFrom<CInt> for ResultKind {
    type Error = Error;

    fn try_from(value: CInt) -> Result<Self, Self::Error> {
        match value {
            0x0001 => Ok(ResultKind::Void),
            0x0002 => Ok(ResultKind::Rows),
            0x0003 => Ok(ResultKind::SetKeyspace),
            0x0004 => Ok(ResultKind::Prepared),
            0x0005 => Ok(ResultKind::SchemaChange),
            _ => Err(Error::UnexpectedResultKind(value)),
        }
    }
}

impl FromCursor for ResultKind {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> error::Result<ResultKind> {
        CInt::from_cursor(cursor)?.try_into()
    }
}

/// Decoded body of a `RESULT` response.
#[derive(Debug, PartialEq, Clone)]
pub enum ResResultBody {
    /// Void response body. It's an empty struct.
    Void,
    /// Rows response body. It represents a body of response which contains rows.
    Rows(BodyResResultRows),
    /// Set keyspace body. It represents a body of set_keyspace query and usually contains
    /// a name of just set namespace.
    SetKeyspace(BodyResResultSetKeyspace),
    /// Schema change body
    SchemaChange(SchemaChange),
}

impl ResResultBody {
    fn parse_body_from_cursor(
        cursor: &mut Cursor<&[u8]>,
        result_kind: ResultKind,
    ) -> error::Result<ResResultBody> {
        Ok(match result_kind {
            ResultKind::Void => ResResultBody::Void,
            ResultKind::Rows => ResResultBody::Rows(BodyResResultRows::from_cursor(cursor)?),
            ResultKind::SetKeyspace => {
                ResResultBody::SetKeyspace(BodyResResultSetKeyspace::from_cursor(cursor)?)
            }
            ResultKind::Prepared => {
                return Err(Error::UnexpectedResultKind(CInt::from(ResultKind::Prepared)))
            }
            ResultKind::SchemaChange => {
                ResResultBody::SchemaChange(SchemaChange::from_cursor(cursor)?)
            }
        })
    }

    /// Converts body into `Vec<Row>` if body's type is `Row` and returns `None` otherwise.
    pub fn into_rows(self) -> Option<Vec<Row>> {
        match self {
            ResResultBody::Rows(rows_body) => Some(rows_body.rows),
            _ => None,
        }
    }

    /// Returns `Some` rows metadata if frame result is of type rows and `None` otherwise
    pub fn as_rows_metadata(&self) -> Option<&RowsMetadata> {
        match self {
            ResResultBody::Rows(rows_body) => Some(&rows_body.metadata),
            _ => None,
        }
    }

    /// Unwraps body and returns BodyResResultSetKeyspace which contains an exact result of
    /// use keyspace query.
    pub fn into_set_keyspace(self) -> Option<BodyResResultSetKeyspace> {
        match self {
            ResResultBody::SetKeyspace(p) => Some(p),
            _ => None,
        }
    }

    /// Human readable description of a schema change result.
    pub fn schema_change_description(&self) -> Option<String> {
        match self {
            ResResultBody::SchemaChange(change) => Some(change.to_string()),
            _ => None,
        }
    }
}

impl FromCursor for ResResultBody {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> error::Result<ResResultBody> {
        let result_kind = ResultKind::from_cursor(cursor)?;
        ResResultBody::parse_body_from_cursor(cursor, result_kind)
    }
}

/// It represents set keyspace result body. Body contains keyspace name.
#[derive(Debug, Constructor, PartialEq, Ord, PartialOrd, Eq, Clone, Hash)]
pub struct BodyResResultSetKeyspace {
    /// It contains name of keyspace that was set.
    pub body: String,
}

impl Serialize for BodyResResultSetKeyspace {
    #[inline]
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        serialize_str(cursor, &self.body);
    }
}

impl FromCursor for BodyResResultSetKeyspace {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> error::Result<BodyResResultSetKeyspace> {
        from_cursor_str(cursor).map(|x| BodyResResultSetKeyspace::new(x.to_string()))
    }
}

/// Result of type `rows` with every value already decoded.
#[derive(Debug, PartialEq, Clone)]
pub struct BodyResResultRows {
    /// Rows metadata, shared with every decoded row.
    pub metadata: Arc<RowsMetadata>,
    /// Number of rows.
    pub rows_count: CInt,
    pub rows: Vec<Row>,
}

impl BodyResResultRows {
    fn decode_row(cursor: &mut Cursor<&[u8]>, metadata: &Arc<RowsMetadata>) -> error::Result<Row> {
        let values = metadata
            .col_specs
            .iter()
            .map(|col_spec| {
                let bytes = CBytes::from_cursor(cursor)?;
                bytes
                    .as_slice()
                    .map(|bytes| Value::decode(&col_spec.col_type, bytes))
                    .transpose()
            })
            .collect::<error::Result<Vec<_>>>()?;

        Ok(Row::new(metadata.clone(), values))
    }
}

impl FromCursor for BodyResResultRows {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> error::Result<BodyResResultRows> {
        let metadata = Arc::new(RowsMetadata::from_cursor(cursor)?);
        let rows_count = CInt::from_cursor(cursor)?;

        let rows = (0..rows_count.max(0))
            .map(|_| BodyResResultRows::decode_row(cursor, &metadata))
            .collect::<error::Result<_>>()?;

        Ok(BodyResResultRows {
            metadata,
            rows_count,
            rows,
        })
    }
}

/// Rows metadata.
#[derive(Debug, Clone, PartialEq, Ord, PartialOrd, Eq, Hash)]
pub struct RowsMetadata {
    /// Flags.
    pub flags: RowsMetadataFlags,
    /// Number of columns.
    pub columns_count: CInt,
    /// Keyspace and table shared by every column, when the server sends one.
    pub global_table_spec: Option<TableSpec>,
    /// List of column specifications.
    pub col_specs: Vec<ColSpec>,
}

impl RowsMetadata {
    /// Position of a column with the given name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.col_specs.iter().position(|spec| spec.name == name)
    }
}

impl Serialize for RowsMetadata {
    #[inline]
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        self.flags.serialize(cursor);
        self.columns_count.serialize(cursor);

        if let Some(global_table_spec) = &self.global_table_spec {
            global_table_spec.serialize(cursor);
        }

        self.col_specs.iter().for_each(|x| x.serialize(cursor));
    }
}

impl FromCursor for RowsMetadata {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> error::Result<RowsMetadata> {
        let flags = RowsMetadataFlags::from_bits_truncate(CInt::from_cursor(cursor)?);
        let columns_count = CInt::from_cursor(cursor)?;

        let has_global_table_space = flags.contains(RowsMetadataFlags::GLOBAL_TABLE_SPACE);
        let global_table_spec = if has_global_table_space {
            Some(TableSpec::from_cursor(cursor)?)
        } else {
            None
        };

        let col_specs = ColSpec::parse_colspecs(cursor, columns_count, has_global_table_space)?;

        Ok(RowsMetadata {
            flags,
            columns_count,
            global_table_spec,
            col_specs,
        })
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct RowsMetadataFlags: i32 {
        const GLOBAL_TABLE_SPACE = 0x0001;
    }
}

impl Serialize for RowsMetadataFlags {
    #[inline]
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        self.bits().serialize(cursor)
    }
}

/// Table specification.
#[derive(Debug, Clone, PartialEq, Ord, PartialOrd, Eq, Hash)]
pub struct TableSpec {
    pub ks_name: String,
    pub table_name: String,
}

impl Serialize for TableSpec {
    #[inline]
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        serialize_str(cursor, &self.ks_name);
        serialize_str(cursor, &self.table_name);
    }
}

impl FromCursor for TableSpec {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> error::Result<Self> {
        let ks_name = from_cursor_str(cursor)?.to_string();
        let table_name = from_cursor_str(cursor)?.to_string();
        Ok(TableSpec {
            ks_name,
            table_name,
        })
    }
}

/// Single column specification.
#[derive(Debug, Clone, PartialEq, Ord, PartialOrd, Eq, Hash)]
pub struct ColSpec {
    /// Only present when the global table spec flag is not set.
    pub table_spec: Option<TableSpec>,
    /// Column name
    pub name: String,
    pub col_type: ColTypeOption,
}

impl Serialize for ColSpec {
    #[inline]
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        if let Some(table_spec) = &self.table_spec {
            table_spec.serialize(cursor);
        }

        serialize_str(cursor, &self.name);
        self.col_type.serialize(cursor);
    }
}

impl ColSpec {
    pub fn parse_colspecs(
        cursor: &mut Cursor<&[u8]>,
        column_count: CInt,
        has_global_table_space: bool,
    ) -> error::Result<Vec<ColSpec>> {
        (0..column_count.max(0))
            .map(|_| {
                let table_spec = if !has_global_table_space {
                    Some(TableSpec::from_cursor(cursor)?)
                } else {
                    None
                };

                let name = from_cursor_str(cursor)?.to_string();
                let col_type = ColTypeOption::from_cursor(cursor)?;

                Ok(ColSpec {
                    table_spec,
                    name,
                    col_type,
                })
            })
            .collect::<Result<_, _>>()
    }
}

/// Column types of protocol v2.
#[derive(Debug, Clone, Display, Copy, Ord, PartialOrd, Eq, PartialEq, Hash)]
pub enum ColType {
    Custom,
    Ascii,
    Bigint,
    Blob,
    Boolean,
    Counter,
    Decimal,
    Double,
    Float,
    Int,
    Timestamp,
    Uuid,
    Varchar,
    Varint,
    Timeuuid,
    Inet,
    List,
    Map,
    Set,
    /// A tag this codec does not know. Values of such columns are kept undecoded.
    #[display("Unknown({_0:#06x})")]
    Unknown(CShort),
}

impl From<CShort> for ColType {
    fn from(value: CShort) -> Self {
        match value {
            0x0000 => ColType::Custom,
            0x0001 => ColType::Ascii,
            0x0002 => ColType::Bigint,
            0x0003 => ColType::Blob,
            0x0004 => ColType::Boolean,
            0x0005 => ColType::Counter,
            0x0006 => ColType::Decimal,
            0x0007 => ColType::Double,
            0x0008 => ColType::Float,
            0x0009 => ColType::Int,
            0x000B => ColType::Timestamp,
            0x000C => ColType::Uuid,
            0x000D => ColType::Varchar,
            0x000E => ColType::Varint,
            0x000F => ColType::Timeuuid,
            0x0010 => ColType::Inet,
            0x0020 => ColType::List,
            0x0021 => ColType::Map,
            0x0022 => ColType::Set,
            _ => ColType::Unknown(value),
        }
    }
}

impl From<ColType> for CShort {
    fn from(value: ColType) -> Self {
        match value {
            ColType::Custom => 0x0000,
            ColType::Ascii => 0x0001,
            ColType::Bigint => 0x0002,
            ColType::Blob => 0x0003,
            ColType::Boolean => 0x0004,
            ColType::Counter => 0x0005,
            ColType::Decimal => 0x0006,
            ColType::Double => 0x0007,
            ColType::Float => 0x0008,
            ColType::Int => 0x0009,
            ColType::Timestamp => 0x000B,
            ColType::Uuid => 0x000C,
            ColType::Varchar => 0x000D,
            ColType::Varint => 0x000E,
            ColType::Timeuuid => 0x000F,
            ColType::Inet => 0x0010,
            ColType::List => 0x0020,
            ColType::Map => 0x0021,
            ColType::Set => 0x0022,
            ColType::Unknown(value) => value,
        }
    }
}

impl FromBytes for ColType {
    fn from_bytes(bytes: &[u8]) -> error::Result<ColType> {
        try_u16_from_bytes(bytes)
            .map_err(Into::into)
            .map(ColType::from)
    }
}

impl Serialize for ColType {
    #[inline]
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        CShort::from(*self).serialize(cursor);
    }
}

impl FromCursor for ColType {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> error::Result<ColType> {
        CShort::from_cursor(cursor).map(ColType::from)
    }
}

/// Column type together with the element types of collections.
#[derive(Debug, Clone, PartialEq, Ord, PartialOrd, Eq, Hash)]
pub struct ColTypeOption {
    /// Id refers to `ColType`.
    pub id: ColType,
    /// Values depending on column type.
    pub value: Option<ColTypeOptionValue>,
}

impl ColTypeOption {
    /// Option of a type without nested element types.
    pub fn simple(id: ColType) -> Self {
        ColTypeOption { id, value: None }
    }

    pub fn list(element: ColTypeOption) -> Self {
        ColTypeOption {
            id: ColType::List,
            value: Some(ColTypeOptionValue::CList(Box::new(element))),
        }
    }

    pub fn set(element: ColTypeOption) -> Self {
        ColTypeOption {
            id: ColType::Set,
            value: Some(ColTypeOptionValue::CSet(Box::new(element))),
        }
    }

    pub fn map(key: ColTypeOption, value: ColTypeOption) -> Self {
        ColTypeOption {
            id: ColType::Map,
            value: Some(ColTypeOptionValue::CMap(Box::new(key), Box::new(value))),
        }
    }
}

impl Serialize for ColTypeOption {
    #[inline]
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        self.id.serialize(cursor);
        if let Some(value) = &self.value {
            value.serialize(cursor);
        }
    }
}

impl FromCursor for ColTypeOption {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> error::Result<ColTypeOption> {
        let id = ColType::from_cursor(cursor)?;
        let value = match id {
            ColType::Custom => {
                let class_name = from_cursor_str(cursor)?;
                return Err(Error::UnsupportedColumnType(format!(
                    "custom type {class_name}"
                )));
            }
            ColType::Set => {
                let col_type = ColTypeOption::from_cursor(cursor)?;
                Some(ColTypeOptionValue::CSet(Box::new(col_type)))
            }
            ColType::List => {
                let col_type = ColTypeOption::from_cursor(cursor)?;
                Some(ColTypeOptionValue::CList(Box::new(col_type)))
            }
            ColType::Map => {
                let name_type = ColTypeOption::from_cursor(cursor)?;
                let value_type = ColTypeOption::from_cursor(cursor)?;
                Some(ColTypeOptionValue::CMap(
                    Box::new(name_type),
                    Box::new(value_type),
                ))
            }
            _ => None,
        };

        Ok(ColTypeOption { id, value })
    }
}

/// Enum that represents all possible types of `value` of `ColTypeOption`.
#[derive(Debug, Clone, PartialEq, Ord, PartialOrd, Eq, Hash)]
pub enum ColTypeOptionValue {
    CSet(Box<ColTypeOption>),
    CList(Box<ColTypeOption>),
    CMap(Box<ColTypeOption>, Box<ColTypeOption>),
}

impl Serialize for ColTypeOptionValue {
    #[inline]
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        match self {
            Self::CSet(c) => c.serialize(cursor),
            Self::CList(c) => c.serialize(cursor),
            Self::CMap(v1, v2) => {
                v1.serialize(cursor);
                v2.serialize(cursor);
            }
        }
    }
}
