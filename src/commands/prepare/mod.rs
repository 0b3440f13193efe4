mod execute;

use clap::Args;

/// Name given to the statement when `--name` is not passed.
pub const DEFAULT_STATEMENT_NAME: &str = "pqbind_stmt";

/// Prepare a named statement, then execute it with the given parameters
#[derive(Args, Debug)]
#[command(after_help = "\
Examples:
  pqbind prepare 'SELECT $1::int4 * 2' -p 21             # Prepare and run once
  pqbind prepare 'SELECT * FROM users WHERE id = $1' \\
      --name by_id -p 7 --decode                         # Named statement, decoded cells")]
pub struct PrepareCmd {
    /// SQL to prepare
    pub sql: String,

    /// Statement name; an empty name uses the unnamed statement
    #[arg(short, long, default_value = DEFAULT_STATEMENT_NAME)]
    pub name: String,

    /// Positional parameter ($1, $2, ...); `NULL` passes SQL NULL
    #[arg(short = 'p', long = "param")]
    pub params: Vec<String>,

    /// Decode cells by column type instead of printing them raw
    #[arg(short, long, default_value_t = false)]
    pub decode: bool,
}
