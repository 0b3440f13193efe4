use std::error::Error;

use serde::Serialize;

use super::ExecCmd;
use crate::commands::{parse_params, Execute};
use crate::db::{CellValue, Client, Connection, NamedRow, QueryResult, StatusCode, Value};

/// Cells exactly as the server sent them.
///
/// Serializes as the name-keyed rows only. The positional rows keep every
/// column when names repeat, and are what the table is drawn from.
#[derive(Debug, Default, Serialize)]
#[serde(transparent)]
pub struct RawRows {
    pub named: Vec<NamedRow>,
    #[serde(skip)]
    pub positional: Vec<Vec<CellValue>>,
}

impl RawRows {
    pub fn from_result(result: &QueryResult) -> Self {
        RawRows {
            named: result.named_rows(),
            positional: result.rows(),
        }
    }
}

/// Rows of a result, raw or decoded.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ResultRows {
    Raw(RawRows),
    /// Cells decoded by column type, in column order.
    Decoded(Vec<Vec<Value>>),
}

impl ResultRows {
    pub fn len(&self) -> usize {
        match self {
            ResultRows::Raw(rows) => rows.positional.len(),
            ResultRows::Decoded(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of running a statement
#[derive(Debug, Serialize)]
pub struct ExecResult {
    pub status: StatusCode,
    pub columns: Vec<String>,
    pub rows: ResultRows,
}

impl ExecResult {
    /// Materialize a query result, decoding cells when asked to.
    pub fn from_query_result(result: &QueryResult, decode: bool) -> Result<Self, Box<dyn Error>> {
        let rows = if decode {
            let mut decoded = Vec::with_capacity(result.row_count());
            for row in 0..result.row_count() {
                let values = (0..result.field_count())
                    .map(|col| result.decode(row, col))
                    .collect::<Result<Vec<_>, _>>()?;
                decoded.push(values);
            }
            ResultRows::Decoded(decoded)
        } else {
            ResultRows::Raw(RawRows::from_result(result))
        };

        Ok(ExecResult {
            status: result.status(),
            columns: result.column_names(),
            rows,
        })
    }
}

impl Execute for ExecCmd {
    type Output = ExecResult;

    fn execute<C: Client>(self, conn: &Connection<C>) -> Result<Self::Output, Box<dyn Error>> {
        let params = parse_params(&self.params);
        let result = conn.exec(&self.sql, &params)?;
        ExecResult::from_query_result(&result, self.decode)
    }
}
