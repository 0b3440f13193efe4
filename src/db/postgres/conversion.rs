//! Type conversion utilities for the PostgreSQL client.
//!
//! Handles conversion between:
//! - `Param` → text-format query parameters (`TextParam`)
//! - binary cells → `CellValue` (via `RawBytes`)
//! - `postgres::Error` → `FatalError` results carrying the server's diagnostics
//! - server notices → `NonFatal` errors for the notice receiver
//! - simple-query messages and prepared-statement rows → `OwnedResult`

use std::error::Error;

use bytes::BytesMut;
use postgres::error::{DbError as PgDbError, ErrorPosition};
use postgres::types::{to_sql_checked, FromSql, IsNull, ToSql, Type};
use postgres::{Column, Row, SimpleQueryMessage};

use crate::db::backend::Param;
use crate::db::diagnostic::DiagnosticField;
use crate::db::error::ResultError;
use crate::db::result::{ColumnDesc, OwnedResult};
use crate::db::status::StatusCode;
use crate::db::value::{oid, CellValue, FieldFormat};
use crate::db::DbError;

/// A parameter sent in text format, whatever the server infers its type to be.
#[derive(Debug)]
pub struct TextParam(Option<String>);

impl From<&Param> for TextParam {
    fn from(param: &Param) -> Self {
        TextParam(param.to_text())
    }
}

impl ToSql for TextParam {
    fn to_sql(&self, _ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match &self.0 {
            Some(text) => {
                out.extend_from_slice(text.as_bytes());
                Ok(IsNull::No)
            }
            None => Ok(IsNull::Yes),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    fn encode_format(&self, _ty: &Type) -> postgres::types::Format {
        postgres::types::Format::Text
    }

    to_sql_checked!();
}

/// A cell's binary payload, accepted for every column type.
#[derive(Debug)]
pub struct RawBytes(pub Vec<u8>);

impl<'a> FromSql<'a> for RawBytes {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        Ok(RawBytes(raw.to_vec()))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

/// Turn a client error into a result or a transport failure.
///
/// Server errors keep every diagnostic field the server sent. A closed
/// connection is a transport failure; any other client-side error is reported
/// as a `FatalError` result with just a message, as libpq does.
pub fn error_to_result(err: postgres::Error) -> Result<OwnedResult, DbError> {
    if let Some(db) = err.as_db_error() {
        return Ok(server_message_to_result(db, StatusCode::FatalError));
    }

    if err.is_closed() {
        return Err(DbError::ConnectionFailure {
            message: err.to_string(),
        });
    }

    Ok(OwnedResult::new(StatusCode::FatalError)
        .with_diagnostic(DiagnosticField::Severity, "ERROR")
        .with_diagnostic(DiagnosticField::MessagePrimary, err.to_string()))
}

/// Wrap a notice or warning from the server for a notice receiver.
pub fn notice_to_error(notice: &PgDbError) -> ResultError {
    ResultError::notice(Box::new(server_message_to_result(
        notice,
        StatusCode::NonfatalError,
    )))
}

/// Copy every field of a server error or notice into a result with `status`.
fn server_message_to_result(db: &PgDbError, status: StatusCode) -> OwnedResult {
    let mut result = OwnedResult::new(status)
        .with_diagnostic(DiagnosticField::Severity, db.severity())
        .with_diagnostic(DiagnosticField::Sqlstate, db.code().code())
        .with_diagnostic(DiagnosticField::MessagePrimary, db.message());

    if let Some(severity) = db.parsed_severity() {
        result.set_diagnostic(DiagnosticField::SeverityNonlocalized, severity.to_string());
    }

    let optional = [
        (DiagnosticField::MessageDetail, db.detail()),
        (DiagnosticField::MessageHint, db.hint()),
        (DiagnosticField::Context, db.where_()),
        (DiagnosticField::SchemaName, db.schema()),
        (DiagnosticField::TableName, db.table()),
        (DiagnosticField::ColumnName, db.column()),
        (DiagnosticField::DatatypeName, db.datatype()),
        (DiagnosticField::ConstraintName, db.constraint()),
        (DiagnosticField::SourceFile, db.file()),
        (DiagnosticField::SourceFunction, db.routine()),
    ];
    for (field, value) in optional {
        if let Some(value) = value {
            result.set_diagnostic(field, value);
        }
    }

    if let Some(line) = db.line() {
        result.set_diagnostic(DiagnosticField::SourceLine, line.to_string());
    }

    match db.position() {
        Some(ErrorPosition::Original(position)) => {
            result.set_diagnostic(DiagnosticField::StatementPosition, position.to_string());
        }
        Some(ErrorPosition::Internal { position, query }) => {
            result.set_diagnostic(DiagnosticField::InternalPosition, position.to_string());
            result.set_diagnostic(DiagnosticField::InternalQuery, query.as_str());
        }
        None => {}
    }

    result
}

/// Collect simple-query messages into one result.
///
/// A multi-statement string yields the result of its last statement.
/// Simple-query cells are always text and carry no type information, so
/// columns are reported with the `unknown` type.
pub fn simple_messages_to_result(messages: Vec<SimpleQueryMessage>) -> OwnedResult {
    let mut last = OwnedResult::new(StatusCode::CommandOk);
    let mut current: Option<OwnedResult> = None;

    for message in messages {
        match message {
            SimpleQueryMessage::RowDescription(columns) => {
                current = Some(OwnedResult::new(StatusCode::TuplesOk).with_column_descs(
                    columns.iter().map(|c| ColumnDesc::new(c.name()).with_type(oid::UNKNOWN)),
                ));
            }
            SimpleQueryMessage::Row(row) => {
                let result = current.get_or_insert_with(|| {
                    OwnedResult::new(StatusCode::TuplesOk).with_column_descs(
                        row.columns()
                            .iter()
                            .map(|c| ColumnDesc::new(c.name()).with_type(oid::UNKNOWN)),
                    )
                });
                let cells = (0..row.len())
                    .map(|i| CellValue::from(row.get(i)))
                    .collect();
                result.push_row(cells);
            }
            SimpleQueryMessage::CommandComplete(_) => {
                last = current
                    .take()
                    .unwrap_or_else(|| OwnedResult::new(StatusCode::CommandOk));
            }
            _ => {}
        }
    }

    current.unwrap_or(last)
}

fn column_desc(column: &Column) -> ColumnDesc {
    ColumnDesc::new(column.name()).with_type(column.type_().oid())
}

/// Build a result from a prepared statement's columns and fetched rows.
///
/// The client requests every column in binary format.
pub fn rows_to_result(columns: &[Column], rows: &[Row]) -> Result<OwnedResult, DbError> {
    let status = if columns.is_empty() {
        StatusCode::CommandOk
    } else {
        StatusCode::TuplesOk
    };
    let mut result = OwnedResult::new(status).with_column_descs(
        columns
            .iter()
            .map(|c| column_desc(c).with_format(FieldFormat::Binary)),
    );

    for row in rows {
        result.push_row(row_cells(row)?);
    }

    Ok(result)
}

/// One streamed row as a `SINGLE_TUPLE` result.
pub fn single_row_result(columns: &[Column], row: &Row) -> Result<OwnedResult, DbError> {
    let mut result = OwnedResult::new(StatusCode::SingleTuple).with_column_descs(
        columns
            .iter()
            .map(|c| column_desc(c).with_format(FieldFormat::Binary)),
    );
    result.push_row(row_cells(row)?);
    Ok(result)
}

fn row_cells(row: &Row) -> Result<Vec<CellValue>, DbError> {
    let mut cells = Vec::with_capacity(row.len());
    for i in 0..row.len() {
        let raw: Option<RawBytes> = row.try_get(i).map_err(|e| DbError::Decode {
            column: i,
            message: e.to_string(),
        })?;
        cells.push(raw.map_or(CellValue::Null, |RawBytes(bytes)| CellValue::Binary(bytes)));
    }
    Ok(cells)
}

/// Describe a prepared statement: parameter types and columns, no rows.
pub fn describe_statement(statement: &postgres::Statement) -> OwnedResult {
    OwnedResult::new(StatusCode::CommandOk)
        .with_column_descs(statement.columns().iter().map(column_desc))
        .with_param_types(statement.params().iter().map(Type::oid).collect())
}
