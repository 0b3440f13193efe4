//! PostgreSQL result materialization and error classification.
//!
//! This module is the binding layer between callers and a native database
//! client:
//! - `Client` is the collaborator that speaks the wire protocol and hands back
//!   `RawResult` handles
//! - `Connection` guards the client's open/closed lifecycle
//! - `Statement` is a non-owning handle onto a prepared statement
//! - `QueryResult` materializes rows and exposes column metadata
//! - `ResultError` classifies failed results and reads their diagnostics
//!
//! Rows can also be streamed: `Connection::exec_each` hands each row over as
//! its own `SINGLE_TUPLE` result and lets the caller stop early. Notices and
//! warnings the server sends go to the receiver installed with
//! `Connection::set_notice_receiver`.
//!
//! # Architecture
//!
//! The native client reports failures through result status, not through
//! `Err`. Every result coming out of a `Connection` is therefore classified
//! first: failure statuses become `DbError::Result`, everything else becomes a
//! `QueryResult`. Status predicates and diagnostic accessors are generated
//! from static tables (`status_codes!`, `diagnostic_fields!`), so the enums
//! and their accessors cannot drift apart.
//!
//! # Type Decisions
//!
//! **Why are cells kept raw?**
//! Rows are materialized as `CellValue` (text or binary payload, or NULL)
//! exactly as the client delivered them. Interpreting a cell is a separate,
//! explicit step (`QueryResult::decode`) keyed by the column type oid.
//!
//! **Why does `Statement` hold a `Weak` reference?**
//! A statement must not keep a closed connection's client alive. Upgrading the
//! weak reference fails once the connection is dropped, and the client slot
//! is empty once it is closed; both surface as `ConnectionClosed`.

mod backend;
mod config;
mod connection;
mod diagnostic;
mod error;
mod result;
mod rows;
mod statement;
mod status;
mod value;

#[cfg(feature = "backend-postgres")]
mod postgres;

pub use backend::{stream_rows, Client, NoticeReceiver, Param, Params, RowSink};
pub use config::{ConnectionParams, DatabaseConfig, DEFAULT_URL, URL_ENV_VARS};
pub use connection::Connection;
pub use diagnostic::{DiagnosticAccessors, DiagnosticField};
pub use error::{ResultError, ResultErrorKind};
pub use result::{ColumnDesc, OwnedResult, QueryResult, RawResult};
pub use rows::{column_names, named_row, named_rows, positional_rows, row, NamedRow};
pub use statement::Statement;
pub use status::{StatusCode, StatusPredicates, STATUS_TABLE};
pub use value::{decode, oid, CellValue, FieldFormat, Oid, Value, INVALID_OID};

#[cfg(feature = "backend-postgres")]
pub use postgres::PgClient;

use thiserror::Error;

/// Database error types
#[derive(Error, Debug)]
pub enum DbError {
    #[error("connection is closed")]
    ConnectionClosed,

    #[error("Connection failed: {message}")]
    ConnectionFailure { message: String },

    #[error(transparent)]
    Result(#[from] ResultError),

    #[error("Invalid oid for column {column}: {message}")]
    InvalidOid { column: usize, message: String },

    #[error("Failed to decode column {column}: {message}")]
    Decode { column: usize, message: String },

    #[error("connection lock poisoned")]
    LockPoisoned,

    #[error("{what} index {index} out of range (0..{len})")]
    OutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },
}

impl DbError {
    /// The result error, when this is a status-driven failure.
    pub fn as_result_error(&self) -> Option<&ResultError> {
        match self {
            DbError::Result(err) => Some(err),
            _ => None,
        }
    }

    /// SQLSTATE of a status-driven failure.
    pub fn sqlstate(&self) -> Option<&str> {
        self.as_result_error().and_then(|err| err.sqlstate())
    }
}
