//! Cell values and type decoding.
//!
//! A result grid hands out raw cells (`CellValue`): text or binary payloads
//! exactly as the server sent them, with NULL kept distinct from the empty
//! string. `decode` interprets a cell by its column type oid, producing a
//! `Value`.

use serde::{Serialize, Serializer};

use super::DbError;

/// PostgreSQL type/object identifier.
pub type Oid = u32;

/// Reserved oid meaning "no type" / "no table".
pub const INVALID_OID: Oid = 0;

/// Type oids the decoder understands.
pub mod oid {
    use super::Oid;

    pub const BOOL: Oid = 16;
    pub const BYTEA: Oid = 17;
    pub const INT8: Oid = 20;
    pub const INT2: Oid = 21;
    pub const INT4: Oid = 23;
    pub const TEXT: Oid = 25;
    pub const JSON: Oid = 114;
    pub const XML: Oid = 142;
    pub const FLOAT4: Oid = 700;
    pub const FLOAT8: Oid = 701;
    pub const UNKNOWN: Oid = 705;
    pub const VARCHAR: Oid = 1043;
    pub const JSONB: Oid = 3802;

    /// SQL name of a known type oid.
    pub fn name(oid: Oid) -> Option<&'static str> {
        let name = match oid {
            BOOL => "bool",
            BYTEA => "bytea",
            INT8 => "int8",
            INT2 => "int2",
            INT4 => "int4",
            TEXT => "text",
            JSON => "json",
            XML => "xml",
            FLOAT4 => "float4",
            FLOAT8 => "float8",
            UNKNOWN => "unknown",
            VARCHAR => "varchar",
            JSONB => "jsonb",
            _ => return None,
        };
        Some(name)
    }
}

/// Transfer format of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldFormat {
    #[default]
    Text = 0,
    Binary = 1,
}

impl FieldFormat {
    pub fn from_raw(raw: i32) -> FieldFormat {
        if raw == 1 {
            FieldFormat::Binary
        } else {
            FieldFormat::Text
        }
    }
}

/// One raw cell of a result grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellValue {
    /// SQL NULL.
    Null,
    /// Text-format payload.
    Text(String),
    /// Binary-format payload.
    Binary(Vec<u8>),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Payload bytes, `None` for NULL.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            CellValue::Null => None,
            CellValue::Text(s) => Some(s.as_bytes()),
            CellValue::Binary(b) => Some(b),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(CellValue::Null)
    }
}

/// Binary payloads render in PostgreSQL's `bytea` hex form.
fn bytea_hex(bytes: &[u8]) -> String {
    format!("\\x{}", hex::encode(bytes))
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CellValue::Null => serializer.serialize_none(),
            CellValue::Text(s) => serializer.serialize_str(s),
            CellValue::Binary(b) => serializer.serialize_str(&bytea_hex(b)),
        }
    }
}

/// A cell interpreted according to its column type.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Json(serde_json::Value),
    Text(String),
    Bytes(Vec<u8>),
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Json(j) => j.serialize(serializer),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Bytes(b) => serializer.serialize_str(&bytea_hex(b)),
        }
    }
}

/// Decode one cell of column `column` whose type is `type_oid`.
///
/// Text cells follow the server's output format for each type; binary cells
/// follow the send/recv format. Types without a dedicated decoding fall back
/// to text (or bytes for binary cells). NULL decodes to `Value::Null` whatever
/// the type; any other cell of an `INVALID_OID` column has no decoding.
pub fn decode(
    type_oid: Oid,
    format: FieldFormat,
    cell: &CellValue,
    column: usize,
) -> Result<Value, DbError> {
    let bytes = match cell {
        CellValue::Null => return Ok(Value::Null),
        CellValue::Text(s) => s.as_bytes(),
        CellValue::Binary(b) => b.as_slice(),
    };

    if type_oid == INVALID_OID {
        return Err(DbError::InvalidOid {
            column,
            message: "column has no type oid".to_string(),
        });
    }

    match format {
        FieldFormat::Text => decode_text(type_oid, bytes, column),
        FieldFormat::Binary => decode_binary(type_oid, bytes, column),
    }
}

fn decode_error(column: usize, message: impl Into<String>) -> DbError {
    DbError::Decode {
        column,
        message: message.into(),
    }
}

fn decode_text(type_oid: Oid, bytes: &[u8], column: usize) -> Result<Value, DbError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| decode_error(column, format!("invalid UTF-8 in text cell: {}", e)))?;

    match type_oid {
        oid::BOOL => Ok(Value::Bool(text.starts_with('t'))),
        oid::INT2 | oid::INT4 | oid::INT8 => text
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|e| decode_error(column, format!("invalid integer '{}': {}", text, e))),
        oid::FLOAT4 | oid::FLOAT8 => parse_float(text)
            .map(Value::Float)
            .ok_or_else(|| decode_error(column, format!("invalid float '{}'", text))),
        oid::JSON | oid::JSONB => serde_json::from_str(text)
            .map(Value::Json)
            .map_err(|e| decode_error(column, format!("invalid JSON: {}", e))),
        _ => Ok(Value::Text(text.to_string())),
    }
}

/// Float text output uses `NaN`, `Infinity` and `-Infinity` for the special values.
fn parse_float(text: &str) -> Option<f64> {
    match text.trim() {
        "NaN" => Some(f64::NAN),
        "Infinity" => Some(f64::INFINITY),
        "-Infinity" => Some(f64::NEG_INFINITY),
        other => other.parse().ok(),
    }
}

fn fixed<const N: usize>(bytes: &[u8], column: usize, type_name: &str) -> Result<[u8; N], DbError> {
    bytes.try_into().map_err(|_| {
        decode_error(
            column,
            format!("{} expects {} bytes, got {}", type_name, N, bytes.len()),
        )
    })
}

fn decode_binary(type_oid: Oid, bytes: &[u8], column: usize) -> Result<Value, DbError> {
    match type_oid {
        oid::BOOL => Ok(Value::Bool(fixed::<1>(bytes, column, "bool")?[0] != 0)),
        oid::INT2 => Ok(Value::Int(i16::from_be_bytes(fixed(bytes, column, "int2")?) as i64)),
        oid::INT4 => Ok(Value::Int(i32::from_be_bytes(fixed(bytes, column, "int4")?) as i64)),
        oid::INT8 => Ok(Value::Int(i64::from_be_bytes(fixed(bytes, column, "int8")?))),
        oid::FLOAT4 => Ok(Value::Float(f32::from_be_bytes(fixed(bytes, column, "float4")?) as f64)),
        oid::FLOAT8 => Ok(Value::Float(f64::from_be_bytes(fixed(bytes, column, "float8")?))),
        oid::TEXT | oid::VARCHAR | oid::UNKNOWN | oid::XML => String::from_utf8(bytes.to_vec())
            .map(Value::Text)
            .map_err(|e| decode_error(column, format!("invalid UTF-8: {}", e))),
        oid::JSON => serde_json::from_slice(bytes)
            .map(Value::Json)
            .map_err(|e| decode_error(column, format!("invalid JSON: {}", e))),
        // jsonb binary format is a version byte followed by the JSON text
        oid::JSONB => match bytes.split_first() {
            Some((1, rest)) => serde_json::from_slice(rest)
                .map(Value::Json)
                .map_err(|e| decode_error(column, format!("invalid JSON: {}", e))),
            _ => Err(decode_error(column, "unsupported jsonb version")),
        },
        _ => Ok(Value::Bytes(bytes.to_vec())),
    }
}
