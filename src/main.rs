use clap::Parser;

use pqbind::cli::Args;
use pqbind::db::{DatabaseConfig, PgClient};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();
    let config = DatabaseConfig::resolve(args.url.as_deref())?;
    let conn = config.connect::<PgClient>()?;
    let output = args.command.run(&conn, args.format);
    conn.close();

    println!("{}", output?);
    Ok(())
}
