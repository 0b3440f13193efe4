mod execute;
mod output;

pub use execute::{ExecResult, RawRows, ResultRows};

use clap::Args;

/// Run a SQL statement and print its rows
#[derive(Args, Debug)]
#[command(after_help = "\
Examples:
  pqbind exec 'SELECT 1 AS one'                        # Simple query, text cells
  pqbind exec 'SELECT $1::int4 + 1' -p 41              # Extended protocol with a parameter
  pqbind exec 'SELECT * FROM users' --decode -f json   # Decode cells by column type")]
pub struct ExecCmd {
    /// SQL to run
    pub sql: String,

    /// Positional parameter ($1, $2, ...); `NULL` passes SQL NULL
    #[arg(short = 'p', long = "param")]
    pub params: Vec<String>,

    /// Decode cells by column type instead of printing them raw
    #[arg(short, long, default_value_t = false)]
    pub decode: bool,
}
