use std::sync::Arc;

use crate::error::{column_is_empty_err, Error, Result};
use crate::frame::message_result::{ColSpec, RowsMetadata};
use crate::types::value::Value;

/// A decoded row. Values follow the column order of the result metadata; `None` is SQL null.
#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    metadata: Arc<RowsMetadata>,
    values: Vec<Option<Value>>,
}

impl Row {
    pub fn new(metadata: Arc<RowsMetadata>, values: Vec<Option<Value>>) -> Self {
        Row { metadata, values }
    }

    #[inline]
    pub fn metadata(&self) -> &RowsMetadata {
        &self.metadata
    }

    /// Checks if a column is present in the row.
    pub fn contains_column(&self, name: &str) -> bool {
        self.metadata.column_index(name).is_some()
    }

    /// Checks for NULL for a given column. Returns false if given column does not exist.
    pub fn is_empty(&self, index: usize) -> bool {
        matches!(self.values.get(index), Some(None))
    }

    /// Checks for NULL for a given column. Returns false if given column does not exist.
    pub fn is_empty_by_name(&self, name: &str) -> bool {
        self.metadata
            .column_index(name)
            .map(|index| self.is_empty(index))
            .unwrap_or(false)
    }

    /// Value of a named column, `None` when the column is missing or null.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.metadata
            .column_index(name)
            .and_then(|index| self.get_by_index(index))
    }

    pub fn get_by_index(&self, index: usize) -> Option<&Value> {
        self.values.get(index).and_then(Option::as_ref)
    }

    /// Column specs paired with their values, in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&ColSpec, Option<&Value>)> {
        self.metadata
            .col_specs
            .iter()
            .zip(self.values.iter().map(Option::as_ref))
    }

    /// Converts the row into `(column name, value)` pairs, in column order.
    pub fn into_pairs(self) -> Vec<(String, Option<Value>)> {
        self.metadata
            .col_specs
            .iter()
            .map(|spec| spec.name.clone())
            .zip(self.values)
            .collect()
    }

    fn column_value(&self, name: &str) -> Result<Option<&Value>> {
        self.metadata
            .column_index(name)
            .map(|index| self.get_by_index(index))
            .ok_or_else(|| Error::General(format!("Column '{name}' not found")))
    }
}

/// Typed access to columns by name.
pub trait IntoRustByName<R> {
    /// Gets a value by column name. `Ok(None)` means the value is null.
    fn get_by_name(&self, name: &str) -> Result<Option<R>>;

    /// Gets a value by column name, treating null as an error.
    fn get_r_by_name(&self, name: &str) -> Result<R> {
        self.get_by_name(name)
            .and_then(|value| value.ok_or_else(|| column_is_empty_err(name)))
    }
}

impl<R> IntoRustByName<R> for Row
where
    R: for<'a> TryFrom<&'a Value, Error = Error>,
{
    fn get_by_name(&self, name: &str) -> Result<Option<R>> {
        self.column_value(name)?.map(R::try_from).transpose()
    }
}
