use std::error::Error;

use super::PrepareCmd;
use crate::commands::{parse_params, Execute, ExecResult};
use crate::db::{Client, Connection};

impl Execute for PrepareCmd {
    type Output = ExecResult;

    fn execute<C: Client>(self, conn: &Connection<C>) -> Result<Self::Output, Box<dyn Error>> {
        let statement = conn.prepare(&self.name, &self.sql)?;
        log::debug!("prepared statement {:?}", statement.name());

        let params = parse_params(&self.params);
        let result = statement.exec(&params)?;
        ExecResult::from_query_result(&result, self.decode)
    }
}
