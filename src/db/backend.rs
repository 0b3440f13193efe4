//! Database client trait for abstracting the native driver.
//!
//! A `Client` is the collaborator that owns the network connection and speaks
//! the wire protocol. Everything it returns is a `RawResult`: success or
//! failure is carried in the result status, not in the `Result`. The `Err`
//! side is reserved for transport-level problems where no result exists.

use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;

use super::error::ResultError;
use super::result::{OwnedResult, RawResult};
use super::status::StatusCode;
use super::DbError;

/// A query parameter.
///
/// Parameters travel in text format with an unspecified type, leaving the
/// server to infer the type from context.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Null,
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Param {
    /// Text form sent to the server, `None` for NULL.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Param::Null => None,
            Param::Str(s) => Some(s.clone()),
            Param::Int(i) => Some(i.to_string()),
            Param::Float(f) => Some(f.to_string()),
            Param::Bool(b) => Some(if *b { "t" } else { "f" }.to_string()),
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_text() {
            Some(text) => f.write_str(&text),
            None => f.write_str("NULL"),
        }
    }
}

impl From<&str> for Param {
    fn from(s: &str) -> Self {
        Param::Str(s.to_string())
    }
}

impl From<String> for Param {
    fn from(s: String) -> Self {
        Param::Str(s)
    }
}

impl From<i64> for Param {
    fn from(i: i64) -> Self {
        Param::Int(i)
    }
}

impl From<i32> for Param {
    fn from(i: i32) -> Self {
        Param::Int(i as i64)
    }
}

impl From<f64> for Param {
    fn from(f: f64) -> Self {
        Param::Float(f)
    }
}

impl From<bool> for Param {
    fn from(b: bool) -> Self {
        Param::Bool(b)
    }
}

impl<T: Into<Param>> From<Option<T>> for Param {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Param::Null)
    }
}

/// Builder for positional parameter lists.
#[derive(Debug, Clone, Default)]
pub struct Params {
    params: Vec<Param>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a parameter.
    pub fn with(mut self, param: impl Into<Param>) -> Self {
        self.params.push(param.into());
        self
    }

    /// Appends a string parameter.
    pub fn with_str(self, value: impl Into<String>) -> Self {
        self.with(Param::Str(value.into()))
    }

    /// Appends an integer parameter.
    pub fn with_int(self, value: i64) -> Self {
        self.with(Param::Int(value))
    }

    /// Appends a float parameter.
    pub fn with_float(self, value: f64) -> Self {
        self.with(Param::Float(value))
    }

    /// Appends a boolean parameter.
    pub fn with_bool(self, value: bool) -> Self {
        self.with(Param::Bool(value))
    }

    /// Appends a NULL parameter.
    pub fn with_null(self) -> Self {
        self.with(Param::Null)
    }

    pub fn as_slice(&self) -> &[Param] {
        &self.params
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

impl AsRef<[Param]> for Params {
    fn as_ref(&self) -> &[Param] {
        &self.params
    }
}

/// Callback receiving the results of a row stream, one at a time.
///
/// Returning `ControlFlow::Break` discards the rest of the stream.
pub type RowSink<'a> = dyn FnMut(Box<dyn RawResult>) -> ControlFlow<()> + 'a;

/// Callback for notices and warnings the server sends while a query runs.
pub type NoticeReceiver = Arc<dyn Fn(ResultError) + Send + Sync>;

/// Hand a complete result to `sink` as a row stream would deliver it.
///
/// A `TUPLES_OK` result becomes one `SINGLE_TUPLE` result per row and the
/// terminating zero-row result is not delivered. Any other result is handed
/// over unchanged.
pub fn stream_rows(result: Box<dyn RawResult>, sink: &mut RowSink<'_>) {
    if result.status() != StatusCode::TuplesOk {
        let _ = sink(result);
        return;
    }
    for index in 0..result.row_count() {
        if sink(Box::new(OwnedResult::single_row(result.as_ref(), index))).is_break() {
            return;
        }
    }
}

/// Trait for native database clients.
pub trait Client: Send + Sized {
    /// Open a connection described by `conninfo` (URL or key/value form).
    fn connect(conninfo: &str) -> Result<Self, DbError>;

    /// Run `sql` with positional parameters.
    fn exec(&mut self, sql: &str, params: &[Param]) -> Result<Box<dyn RawResult>, DbError>;

    /// Run `sql`, handing each row to `sink` as its own `SINGLE_TUPLE` result.
    ///
    /// The default runs `exec` and splits the complete result; clients that
    /// can fetch rows incrementally override it.
    fn exec_each(
        &mut self,
        sql: &str,
        params: &[Param],
        sink: &mut RowSink<'_>,
    ) -> Result<(), DbError> {
        let result = self.exec(sql, params)?;
        stream_rows(result, sink);
        Ok(())
    }

    /// Create the prepared statement `name`.
    fn prepare(&mut self, name: &str, sql: &str) -> Result<Box<dyn RawResult>, DbError>;

    /// Run the prepared statement `name`.
    fn exec_prepared(
        &mut self,
        name: &str,
        params: &[Param],
    ) -> Result<Box<dyn RawResult>, DbError>;

    /// Run the prepared statement `name`, streaming rows like `exec_each`.
    fn exec_prepared_each(
        &mut self,
        name: &str,
        params: &[Param],
        sink: &mut RowSink<'_>,
    ) -> Result<(), DbError> {
        let result = self.exec_prepared(name, params)?;
        stream_rows(result, sink);
        Ok(())
    }

    /// Report parameter and column metadata of the prepared statement `name`.
    fn describe_prepared(&mut self, name: &str) -> Result<Box<dyn RawResult>, DbError>;

    /// Report column metadata of the portal `name`.
    fn describe_portal(&mut self, name: &str) -> Result<Box<dyn RawResult>, DbError>;

    /// Install `receiver` for notices and warnings, replacing any earlier one.
    fn set_notice_receiver(&mut self, receiver: NoticeReceiver);

    /// Drop and re-establish the connection with the original parameters.
    fn reset(&mut self) -> Result<(), DbError>;

    /// Release the native connection.
    fn finish(self) {}

    /// Get the backend name for logging/debugging.
    fn backend_name(&self) -> &'static str;
}
