//! Query results.
//!
//! `RawResult` is the accessor contract a database client must provide for a
//! result handle; it is the whole boundary this crate depends on. `OwnedResult`
//! is a plain in-memory grid implementing it, used by the bundled clients.
//! `QueryResult` wraps a successful result and layers status predicates,
//! metadata accessors, row materialization and value decoding on top.

use super::diagnostic::{DiagnosticAccessors, DiagnosticField};
use super::rows::{self, NamedRow};
use super::status::{StatusCode, StatusPredicates};
use super::value::{self, CellValue, FieldFormat, INVALID_OID, Oid, Value};
use super::DbError;

/// Positional accessors over one result handle.
///
/// Only the first six methods are required; the metadata accessors default to
/// "unknown" so minimal implementations stay minimal.
pub trait RawResult: Send + Sync {
    /// Status the result was produced with.
    fn status(&self) -> StatusCode;

    /// Number of columns.
    fn field_count(&self) -> usize;

    /// Number of rows.
    fn row_count(&self) -> usize;

    /// Name of column `col`, `None` when out of range.
    fn field_name(&self, col: usize) -> Option<&str>;

    /// Cell at (`row`, `col`), `None` when out of range.
    fn cell_value(&self, row: usize, col: usize) -> Option<&CellValue>;

    /// One diagnostic field, `None` when absent.
    fn diagnostic_field(&self, field: DiagnosticField) -> Option<&str>;

    /// Type oid of column `col`.
    fn field_type(&self, _col: usize) -> Oid {
        INVALID_OID
    }

    /// Transfer format of column `col`.
    fn field_format(&self, _col: usize) -> FieldFormat {
        FieldFormat::Text
    }

    /// Oid of the table column `col` was fetched from.
    fn field_table(&self, _col: usize) -> Oid {
        INVALID_OID
    }

    /// Attribute number of column `col` within its table, 0 when unknown.
    fn field_table_column(&self, _col: usize) -> u16 {
        0
    }

    /// Number of parameters of a described prepared statement.
    fn param_count(&self) -> usize {
        0
    }

    /// Type oid of parameter `index` of a described prepared statement.
    fn param_type(&self, _index: usize) -> Oid {
        INVALID_OID
    }
}

/// Column metadata of an `OwnedResult`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDesc {
    pub name: String,
    pub type_oid: Oid,
    pub format: FieldFormat,
    pub table_oid: Oid,
    pub table_column: u16,
}

impl ColumnDesc {
    /// A text column with unknown type and source.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_oid: INVALID_OID,
            format: FieldFormat::Text,
            table_oid: INVALID_OID,
            table_column: 0,
        }
    }

    pub fn with_type(mut self, type_oid: Oid) -> Self {
        self.type_oid = type_oid;
        self
    }

    pub fn with_format(mut self, format: FieldFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_source(mut self, table_oid: Oid, table_column: u16) -> Self {
        self.table_oid = table_oid;
        self.table_column = table_column;
        self
    }
}

/// Fully materialized result grid.
///
/// Built once by a client, immutable afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct OwnedResult {
    status: StatusCode,
    columns: Vec<ColumnDesc>,
    rows: Vec<Vec<CellValue>>,
    diagnostics: Vec<(DiagnosticField, String)>,
    param_types: Vec<Oid>,
}

impl OwnedResult {
    /// Creates an empty result with the given status.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            columns: Vec::new(),
            rows: Vec::new(),
            diagnostics: Vec::new(),
            param_types: Vec::new(),
        }
    }

    /// Row `index` of `result` as a one-row `SINGLE_TUPLE` result with the same columns.
    pub fn single_row(result: &dyn RawResult, index: usize) -> Self {
        let columns = (0..result.field_count()).map(|col| {
            ColumnDesc::new(result.field_name(col).unwrap_or_default())
                .with_type(result.field_type(col))
                .with_format(result.field_format(col))
                .with_source(result.field_table(col), result.field_table_column(col))
        });
        let mut single = Self::new(StatusCode::SingleTuple).with_column_descs(columns);
        if let Some(cells) = rows::row(result, index) {
            single.push_row(cells);
        }
        single
    }

    /// Shorthand for a `FATAL_ERROR` result carrying severity, SQLSTATE and message.
    pub fn fatal(sqlstate: &str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::FatalError)
            .with_diagnostic(DiagnosticField::Severity, "ERROR")
            .with_diagnostic(DiagnosticField::SeverityNonlocalized, "ERROR")
            .with_diagnostic(DiagnosticField::Sqlstate, sqlstate)
            .with_diagnostic(DiagnosticField::MessagePrimary, message)
    }

    /// Appends a column.
    pub fn with_column(mut self, column: ColumnDesc) -> Self {
        self.columns.push(column);
        self
    }

    /// Appends text columns by name.
    pub fn with_columns<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns.extend(names.into_iter().map(ColumnDesc::new));
        self
    }

    /// Appends described columns.
    pub fn with_column_descs<I: IntoIterator<Item = ColumnDesc>>(mut self, columns: I) -> Self {
        self.columns.extend(columns);
        self
    }

    /// Appends a row. Missing trailing cells read as NULL.
    pub fn with_row<I, V>(mut self, cells: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<CellValue>,
    {
        self.push_row(cells.into_iter().map(Into::into).collect());
        self
    }

    /// Sets one diagnostic field, replacing an earlier value for the same code.
    pub fn with_diagnostic(mut self, field: DiagnosticField, value: impl Into<String>) -> Self {
        self.set_diagnostic(field, value);
        self
    }

    /// Sets the parameter types reported by a describe.
    pub fn with_param_types(mut self, types: Vec<Oid>) -> Self {
        self.param_types = types;
        self
    }

    pub fn push_row(&mut self, mut cells: Vec<CellValue>) {
        cells.resize(self.columns.len().max(cells.len()), CellValue::Null);
        self.rows.push(cells);
    }

    pub fn set_diagnostic(&mut self, field: DiagnosticField, value: impl Into<String>) {
        let value = value.into();
        match self.diagnostics.iter_mut().find(|(f, _)| *f == field) {
            Some(entry) => entry.1 = value,
            None => self.diagnostics.push((field, value)),
        }
    }

    pub fn columns(&self) -> &[ColumnDesc] {
        &self.columns
    }
}

impl RawResult for OwnedResult {
    fn status(&self) -> StatusCode {
        self.status
    }

    fn field_count(&self) -> usize {
        self.columns.len()
    }

    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn field_name(&self, col: usize) -> Option<&str> {
        self.columns.get(col).map(|c| c.name.as_str())
    }

    fn cell_value(&self, row: usize, col: usize) -> Option<&CellValue> {
        if col >= self.columns.len() {
            return None;
        }
        self.rows.get(row).and_then(|cells| cells.get(col))
    }

    fn diagnostic_field(&self, field: DiagnosticField) -> Option<&str> {
        self.diagnostics
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, v)| v.as_str())
    }

    fn field_type(&self, col: usize) -> Oid {
        self.columns.get(col).map_or(INVALID_OID, |c| c.type_oid)
    }

    fn field_format(&self, col: usize) -> FieldFormat {
        self.columns.get(col).map_or(FieldFormat::Text, |c| c.format)
    }

    fn field_table(&self, col: usize) -> Oid {
        self.columns.get(col).map_or(INVALID_OID, |c| c.table_oid)
    }

    fn field_table_column(&self, col: usize) -> u16 {
        self.columns.get(col).map_or(0, |c| c.table_column)
    }

    fn param_count(&self) -> usize {
        self.param_types.len()
    }

    fn param_type(&self, index: usize) -> Oid {
        self.param_types.get(index).copied().unwrap_or(INVALID_OID)
    }
}

impl std::fmt::Debug for dyn RawResult + '_ {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawResult")
            .field("status", &self.status())
            .field("field_count", &self.field_count())
            .field("row_count", &self.row_count())
            .finish()
    }
}

impl StatusPredicates for dyn RawResult + '_ {
    fn status_code(&self) -> StatusCode {
        self.status()
    }
}

impl DiagnosticAccessors for dyn RawResult + '_ {
    fn field(&self, field: DiagnosticField) -> Option<&str> {
        self.diagnostic_field(field)
    }
}

/// A successful result.
///
/// Owns the client's result handle; every accessor reads through to it.
pub struct QueryResult {
    raw: Box<dyn RawResult>,
}

impl std::fmt::Debug for QueryResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryResult")
            .field("status", &self.raw.status())
            .field("field_count", &self.raw.field_count())
            .field("row_count", &self.raw.row_count())
            .finish()
    }
}

impl QueryResult {
    pub(crate) fn new(raw: Box<dyn RawResult>) -> Self {
        Self { raw }
    }

    /// The underlying client result.
    pub fn raw(&self) -> &dyn RawResult {
        self.raw.as_ref()
    }

    pub fn status(&self) -> StatusCode {
        self.raw.status()
    }

    pub fn field_count(&self) -> usize {
        self.raw.field_count()
    }

    pub fn row_count(&self) -> usize {
        self.raw.row_count()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.row_count() == 0
    }

    pub fn field_name(&self, col: usize) -> Option<&str> {
        self.raw.field_name(col)
    }

    /// Index of the first column called `name`.
    pub fn field_number(&self, name: &str) -> Option<usize> {
        (0..self.raw.field_count()).find(|&col| self.raw.field_name(col) == Some(name))
    }

    pub fn field_type(&self, col: usize) -> Result<Oid, DbError> {
        self.check_column(col)?;
        Ok(self.raw.field_type(col))
    }

    pub fn field_format(&self, col: usize) -> Result<FieldFormat, DbError> {
        self.check_column(col)?;
        Ok(self.raw.field_format(col))
    }

    /// Oid of the table column `col` was fetched from.
    ///
    /// Fails with `InvalidOid` when the column is not a simple reference to
    /// a table column.
    pub fn field_table(&self, col: usize) -> Result<Oid, DbError> {
        self.check_column(col)?;
        match self.raw.field_table(col) {
            INVALID_OID => Err(DbError::InvalidOid {
                column: col,
                message: "column is not a simple reference to a table column".to_string(),
            }),
            table => Ok(table),
        }
    }

    /// Attribute number of `col` within its source table.
    pub fn field_table_column(&self, col: usize) -> Result<u16, DbError> {
        self.check_column(col)?;
        match self.raw.field_table_column(col) {
            0 => Err(DbError::OutOfRange {
                what: "table column",
                index: col,
                len: 0,
            }),
            attnum => Ok(attnum),
        }
    }

    pub fn value(&self, row: usize, col: usize) -> Option<&CellValue> {
        self.raw.cell_value(row, col)
    }

    /// True when the cell is NULL; out-of-range cells are not NULL.
    pub fn is_null(&self, row: usize, col: usize) -> bool {
        self.raw.cell_value(row, col).is_some_and(CellValue::is_null)
    }

    pub fn param_count(&self) -> usize {
        self.raw.param_count()
    }

    pub fn param_type(&self, index: usize) -> Result<Oid, DbError> {
        let len = self.raw.param_count();
        if index >= len {
            return Err(DbError::OutOfRange {
                what: "parameter",
                index,
                len,
            });
        }
        Ok(self.raw.param_type(index))
    }

    /// Decode the cell at (`row`, `col`) by its column type.
    pub fn decode(&self, row: usize, col: usize) -> Result<Value, DbError> {
        self.check_column(col)?;
        let cell = self.raw.cell_value(row, col).ok_or(DbError::OutOfRange {
            what: "row",
            index: row,
            len: self.raw.row_count(),
        })?;
        value::decode(self.raw.field_type(col), self.raw.field_format(col), cell, col)
    }

    pub fn column_names(&self) -> Vec<String> {
        rows::column_names(self.raw())
    }

    pub fn rows(&self) -> Vec<Vec<CellValue>> {
        rows::positional_rows(self.raw())
    }

    pub fn named_rows(&self) -> Vec<NamedRow> {
        rows::named_rows(self.raw())
    }

    pub fn row(&self, index: usize) -> Option<Vec<CellValue>> {
        rows::row(self.raw(), index)
    }

    pub fn named_row(&self, index: usize) -> Option<NamedRow> {
        rows::named_row(self.raw(), index)
    }

    fn check_column(&self, col: usize) -> Result<(), DbError> {
        let len = self.raw.field_count();
        if col < len {
            Ok(())
        } else {
            Err(DbError::OutOfRange {
                what: "column",
                index: col,
                len,
            })
        }
    }
}

impl StatusPredicates for QueryResult {
    fn status_code(&self) -> StatusCode {
        self.raw.status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::value::oid;

    fn people() -> QueryResult {
        QueryResult::new(Box::new(
            OwnedResult::new(StatusCode::TuplesOk)
                .with_column(ColumnDesc::new("id").with_type(oid::INT4).with_source(16384, 1))
                .with_column(ColumnDesc::new("name").with_type(oid::TEXT))
                .with_row([Some("1"), Some("alice")])
                .with_row([Some("2"), None]),
        ))
    }

    #[test]
    fn test_dimensions() {
        let result = people();
        assert_eq!(result.field_count(), 2);
        assert_eq!(result.row_count(), 2);
        assert!(!result.is_empty());
        assert!(result.is_tuples_ok());
        assert!(!result.is_command_ok());
    }

    #[test]
    fn test_field_number() {
        let result = people();
        assert_eq!(result.field_number("name"), Some(1));
        assert_eq!(result.field_number("missing"), None);
    }

    #[test]
    fn test_null_and_out_of_range() {
        let result = people();
        assert!(result.is_null(1, 1));
        assert!(!result.is_null(0, 1));
        assert!(!result.is_null(5, 0));
        assert_eq!(result.value(5, 0), None);
        assert_eq!(result.value(0, 9), None);
    }

    #[test]
    fn test_field_table() {
        let result = people();
        assert_eq!(result.field_table(0).unwrap(), 16384);
        assert_eq!(result.field_table_column(0).unwrap(), 1);
        assert!(matches!(result.field_table(1), Err(DbError::InvalidOid { column: 1, .. })));
        assert!(result.field_table_column(1).is_err());
        assert!(matches!(result.field_type(7), Err(DbError::OutOfRange { .. })));
    }

    #[test]
    fn test_decode_by_column_type() {
        let result = people();
        assert_eq!(result.decode(0, 0).unwrap(), Value::Int(1));
        assert_eq!(result.decode(0, 1).unwrap(), Value::Text("alice".to_string()));
        assert_eq!(result.decode(1, 1).unwrap(), Value::Null);
        assert!(matches!(result.decode(9, 0), Err(DbError::OutOfRange { what: "row", .. })));
    }

    #[test]
    fn test_decode_untyped_column_is_invalid_oid() {
        let result = QueryResult::new(Box::new(
            OwnedResult::new(StatusCode::TuplesOk)
                .with_columns(["x"])
                .with_row(["1"]),
        ));
        assert!(matches!(result.decode(0, 0), Err(DbError::InvalidOid { .. })));
    }

    #[test]
    fn test_param_types() {
        let result = QueryResult::new(Box::new(
            OwnedResult::new(StatusCode::CommandOk).with_param_types(vec![oid::INT4, oid::TEXT]),
        ));
        assert_eq!(result.param_count(), 2);
        assert_eq!(result.param_type(1).unwrap(), oid::TEXT);
        assert!(result.param_type(2).is_err());
    }

    #[test]
    fn test_short_row_is_padded_with_null() {
        let raw = OwnedResult::new(StatusCode::TuplesOk)
            .with_columns(["a", "b"])
            .with_row(["only"]);
        assert_eq!(raw.cell_value(0, 1), Some(&CellValue::Null));
    }

    #[test]
    fn test_fatal_shorthand() {
        let raw = OwnedResult::fatal("42601", "syntax error");
        let raw: &dyn RawResult = &raw;
        assert!(raw.is_fatal_error());
        assert_eq!(raw.sqlstate(), Some("42601"));
        assert_eq!(raw.message(), Some("syntax error"));
        assert_eq!(raw.severity(), Some("ERROR"));
    }

    #[test]
    fn test_single_row_keeps_column_metadata() {
        let source = OwnedResult::new(StatusCode::TuplesOk)
            .with_column(
                ColumnDesc::new("id")
                    .with_type(oid::INT4)
                    .with_format(FieldFormat::Binary)
                    .with_source(16384, 1),
            )
            .with_row([CellValue::Binary(vec![0, 0, 0, 1])])
            .with_row([CellValue::Binary(vec![0, 0, 0, 2])]);

        let single = OwnedResult::single_row(&source, 1);
        assert_eq!(single.status(), StatusCode::SingleTuple);
        assert_eq!(single.row_count(), 1);
        assert_eq!(single.columns(), source.columns());
        assert_eq!(single.cell_value(0, 0), Some(&CellValue::Binary(vec![0, 0, 0, 2])));

        let past_end = OwnedResult::single_row(&source, 2);
        assert_eq!(past_end.row_count(), 0);
    }
}
