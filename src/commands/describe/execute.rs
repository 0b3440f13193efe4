use std::error::Error;

use serde::Serialize;

use super::DescribeCmd;
use crate::commands::Execute;
use crate::db::{oid, Client, Connection, FieldFormat, Oid, QueryResult};

/// One parameter of a described statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DescribedParam {
    /// 1-based position, as in `$1`
    pub position: usize,
    pub type_oid: Oid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_name: Option<&'static str>,
}

/// One result column of a described statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DescribedColumn {
    pub name: String,
    pub type_oid: Oid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_name: Option<&'static str>,
    pub format: FieldFormat,
}

/// Parameter and column types of a prepared statement
#[derive(Debug, Serialize)]
pub struct DescribeResult {
    pub statement: String,
    pub params: Vec<DescribedParam>,
    pub columns: Vec<DescribedColumn>,
}

impl DescribeResult {
    /// Read the parameter and column descriptions out of a describe result.
    pub fn from_query_result(statement: &str, result: &QueryResult) -> Result<Self, Box<dyn Error>> {
        let params = (0..result.param_count())
            .map(|index| {
                let type_oid = result.param_type(index)?;
                Ok(DescribedParam {
                    position: index + 1,
                    type_oid,
                    type_name: oid::name(type_oid),
                })
            })
            .collect::<Result<Vec<_>, Box<dyn Error>>>()?;

        let mut columns = Vec::with_capacity(result.field_count());
        for col in 0..result.field_count() {
            let type_oid = result.field_type(col)?;
            columns.push(DescribedColumn {
                name: result.field_name(col).unwrap_or_default().to_string(),
                type_oid,
                type_name: oid::name(type_oid),
                format: result.field_format(col)?,
            });
        }

        Ok(DescribeResult {
            statement: statement.to_string(),
            params,
            columns,
        })
    }
}

impl Execute for DescribeCmd {
    type Output = DescribeResult;

    fn execute<C: Client>(self, conn: &Connection<C>) -> Result<Self::Output, Box<dyn Error>> {
        let statement = conn.prepare(&self.name, &self.sql)?;
        let result = statement.describe()?;
        DescribeResult::from_query_result(statement.name(), &result)
    }
}
