mod execute;
mod output;

pub use execute::{DescribeResult, DescribedColumn, DescribedParam};

use clap::Args;

use super::prepare::DEFAULT_STATEMENT_NAME;

/// Prepare a statement and show its parameter and column types
#[derive(Args, Debug)]
#[command(after_help = "\
Examples:
  pqbind describe 'SELECT $1::int4 AS n, now() AS at'    # Parameter and column types
  pqbind describe 'SELECT * FROM users' -f json          # As JSON")]
pub struct DescribeCmd {
    /// SQL to prepare and describe
    pub sql: String,

    /// Statement name; an empty name uses the unnamed statement
    #[arg(short, long, default_value = DEFAULT_STATEMENT_NAME)]
    pub name: String,
}
