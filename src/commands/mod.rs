//! Command definitions and implementations.
//!
//! Each command is defined in its own module with:
//! - The command struct with clap attributes for CLI parsing
//! - `execute.rs` running it against a `Connection`
//! - `output.rs` formatting its result

mod describe;
mod exec;
mod prepare;

pub use describe::{DescribeCmd, DescribeResult, DescribedColumn, DescribedParam};
pub use exec::{ExecCmd, ExecResult, ResultRows};
pub use prepare::{PrepareCmd, DEFAULT_STATEMENT_NAME};

use clap::Subcommand;
use std::error::Error;

use crate::db::{Client, Connection, Param};
use crate::output::{OutputFormat, Outputable};

/// Trait for executing commands with command-specific result types.
pub trait Execute {
    type Output: Outputable;

    fn execute<C: Client>(self, conn: &Connection<C>) -> Result<Self::Output, Box<dyn Error>>;
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a SQL statement and print its rows
    Exec(ExecCmd),

    /// Prepare a named statement and run it
    Prepare(PrepareCmd),

    /// Show parameter and column types of a statement
    Describe(DescribeCmd),
}

impl Command {
    /// Execute the command and return formatted output
    pub fn run<C: Client>(
        self,
        conn: &Connection<C>,
        format: OutputFormat,
    ) -> Result<String, Box<dyn Error>> {
        match self {
            Command::Exec(cmd) => {
                let result = cmd.execute(conn)?;
                Ok(result.format(format))
            }
            Command::Prepare(cmd) => {
                let result = cmd.execute(conn)?;
                Ok(result.format(format))
            }
            Command::Describe(cmd) => {
                let result = cmd.execute(conn)?;
                Ok(result.format(format))
            }
        }
    }
}

/// Parameter values from the command line; the literal `NULL` passes SQL NULL.
pub(crate) fn parse_params(raw: &[String]) -> Vec<Param> {
    raw.iter()
        .map(|value| match value.as_str() {
            "NULL" => Param::Null,
            other => Param::Str(other.to_string()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_params() {
        let raw = vec!["1".to_string(), "NULL".to_string(), "null".to_string()];
        assert_eq!(
            parse_params(&raw),
            vec![
                Param::Str("1".to_string()),
                Param::Null,
                Param::Str("null".to_string()),
            ]
        );
    }
}
