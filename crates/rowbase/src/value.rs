//! Dynamically typed column values and rows.

use crate::error::{OrmError, OrmResult};
use chrono::{NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use mysql_async::consts::{ColumnFlags, ColumnType};
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Character set id MySQL uses for binary strings and blobs.
const BINARY_CHARSET: u16 = 63;

/// A single column value as stored in an entity or bound into a statement.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    DateTime(NaiveDateTime),
    Date(NaiveDate),
    /// Comma-joined when escaped; used for `IN (...)` predicates.
    List(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::UInt(v) => i64::try_from(*v).ok(),
            Value::Bool(v) => Some(i64::from(*v)),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Text used when the value stands in for an identifier.
    pub fn to_ident_string(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::Int(v) => v.to_string(),
            Value::UInt(v) => v.to_string(),
            Value::Float(v) => v.to_string(),
            Value::Bool(v) => v.to_string(),
            Value::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
            Value::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::Null => String::new(),
            Value::List(items) => items
                .iter()
                .map(Value::to_ident_string)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

macro_rules! impl_from_int {
    ($variant:ident: $($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v.into())
                }
            }
        )*
    };
}

impl_from_int!(Int: i8, i16, i32, i64);
impl_from_int!(UInt: u8, u16, u32, u64);

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::UInt(v as u64)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value> + Clone> From<&[T]> for Value {
    fn from(v: &[T]) -> Self {
        Value::List(v.iter().cloned().map(Into::into).collect())
    }
}

impl From<&Value> for Value {
    fn from(v: &Value) -> Self {
        v.clone()
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(v) => serializer.serialize_bool(*v),
            Value::Int(v) => serializer.serialize_i64(*v),
            Value::UInt(v) => serializer.serialize_u64(*v),
            Value::Float(v) => serializer.serialize_f64(*v),
            Value::Text(v) => serializer.serialize_str(v),
            Value::Bytes(v) => serializer.serialize_bytes(v),
            Value::DateTime(v) => {
                serializer.serialize_str(&v.format("%Y-%m-%d %H:%M:%S").to_string())
            }
            Value::Date(v) => serializer.serialize_str(&v.format("%Y-%m-%d").to_string()),
            Value::List(items) => items.serialize(serializer),
        }
    }
}

/// One result row: column name to value, in select order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: IndexMap<String, Value>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column (builder style, handy for canned results).
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.columns.insert(column.into(), value.into());
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: Value) {
        self.columns.insert(column.into(), value);
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns.get(column)
    }

    /// Value of the column at `index` in select order.
    pub fn get_index(&self, index: usize) -> Option<&Value> {
        self.columns.get_index(index).map(|(_, v)| v)
    }

    /// Fetch a column or fail with a decode error naming it.
    pub fn try_get(&self, column: &str) -> OrmResult<&Value> {
        self.columns
            .get(column)
            .ok_or_else(|| OrmError::decode(column, "column not present in row"))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.columns.iter()
    }

    pub fn into_columns(self) -> IndexMap<String, Value> {
        self.columns
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (k, v) in &self.columns {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl IntoIterator for Row {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.into_iter()
    }
}

/// Column metadata needed to decode a text-protocol cell.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ColumnInfo {
    pub column_type: ColumnType,
    pub length: u32,
    pub flags: ColumnFlags,
    pub charset: u16,
}

impl ColumnInfo {
    pub(crate) fn from_column(column: &mysql_async::Column) -> Self {
        Self {
            column_type: column.column_type(),
            length: column.column_length(),
            flags: column.flags(),
            charset: column.character_set(),
        }
    }
}

/// Decode one cell returned by the text protocol.
///
/// One-bit `BIT` and `TINYINT(1)` columns decode to booleans.
pub(crate) fn decode_cell(
    name: &str,
    info: ColumnInfo,
    raw: mysql_async::Value,
) -> OrmResult<Value> {
    let bytes = match raw {
        mysql_async::Value::NULL => return Ok(Value::Null),
        mysql_async::Value::Bytes(bytes) => bytes,
        mysql_async::Value::Int(v) => return Ok(Value::Int(v)),
        mysql_async::Value::UInt(v) => return Ok(Value::UInt(v)),
        mysql_async::Value::Float(v) => return Ok(Value::Float(v.into())),
        mysql_async::Value::Double(v) => return Ok(Value::Float(v)),
        other => {
            return Err(OrmError::decode(
                name,
                format!("unexpected binary-protocol value {other:?}"),
            ));
        }
    };

    use ColumnType::*;
    let one_bit = info.length == 1;
    match info.column_type {
        MYSQL_TYPE_BIT if one_bit => Ok(Value::Bool(bytes.first().is_some_and(|b| *b == 1))),
        MYSQL_TYPE_TINY if one_bit => Ok(Value::Bool(text(name, &bytes)? == "1")),
        MYSQL_TYPE_BIT => Ok(Value::Bytes(bytes)),
        MYSQL_TYPE_TINY | MYSQL_TYPE_SHORT | MYSQL_TYPE_INT24 | MYSQL_TYPE_LONG
        | MYSQL_TYPE_LONGLONG | MYSQL_TYPE_YEAR => {
            let s = text(name, &bytes)?;
            if info.flags.contains(ColumnFlags::UNSIGNED_FLAG) {
                s.parse::<u64>()
                    .map(Value::UInt)
                    .map_err(|e| OrmError::decode(name, e.to_string()))
            } else {
                s.parse::<i64>()
                    .map(Value::Int)
                    .map_err(|e| OrmError::decode(name, e.to_string()))
            }
        }
        MYSQL_TYPE_FLOAT | MYSQL_TYPE_DOUBLE => text(name, &bytes)?
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|e| OrmError::decode(name, e.to_string())),
        MYSQL_TYPE_DATETIME | MYSQL_TYPE_TIMESTAMP | MYSQL_TYPE_DATETIME2
        | MYSQL_TYPE_TIMESTAMP2 => {
            let s = text(name, &bytes)?;
            if s.starts_with("0000-00-00") {
                return Ok(Value::Null);
            }
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
                .map(Value::DateTime)
                .map_err(|e| OrmError::decode(name, e.to_string()))
        }
        MYSQL_TYPE_DATE | MYSQL_TYPE_NEWDATE => {
            let s = text(name, &bytes)?;
            if s.starts_with("0000-00-00") {
                return Ok(Value::Null);
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map(Value::Date)
                .map_err(|e| OrmError::decode(name, e.to_string()))
        }
        MYSQL_TYPE_TINY_BLOB | MYSQL_TYPE_MEDIUM_BLOB | MYSQL_TYPE_LONG_BLOB | MYSQL_TYPE_BLOB
        | MYSQL_TYPE_STRING | MYSQL_TYPE_VAR_STRING | MYSQL_TYPE_VARCHAR
        | MYSQL_TYPE_GEOMETRY
            if info.charset == BINARY_CHARSET =>
        {
            Ok(Value::Bytes(bytes))
        }
        // DECIMAL stays textual so precision survives.
        _ => Ok(Value::Text(text(name, &bytes)?.to_string())),
    }
}

fn text<'a>(name: &str, bytes: &'a [u8]) -> OrmResult<&'a str> {
    std::str::from_utf8(bytes).map_err(|e| OrmError::decode(name, e.to_string()))
}

/// Convert a driver row into a [`Row`], consuming its cells.
pub(crate) fn decode_row(mut row: mysql_async::Row) -> OrmResult<Row> {
    let columns = row.columns();
    let mut out = Row::new();
    for (index, column) in columns.iter().enumerate() {
        let name = column.name_str().into_owned();
        let raw = row.take(index).unwrap_or(mysql_async::Value::NULL);
        let value = decode_cell(&name, ColumnInfo::from_column(column), raw)?;
        out.insert(name, value);
    }
    Ok(out)
}
