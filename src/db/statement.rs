//! Prepared statement handles.

use std::ops::ControlFlow;
use std::sync::Weak;

use super::backend::{Client, Param};
use super::connection::{into_query_result, stream_classified, Shared};
use super::result::QueryResult;
use super::DbError;

/// A named prepared statement on a connection.
///
/// The handle does not keep the connection alive. Once the connection is
/// closed or dropped, every call fails with `ConnectionClosed`.
pub struct Statement<C: Client> {
    name: String,
    conn: Weak<Shared<C>>,
}

impl<C: Client> Statement<C> {
    pub(crate) fn new(name: &str, conn: Weak<Shared<C>>) -> Self {
        Self {
            name: name.to_string(),
            conn,
        }
    }

    /// Name the statement was prepared under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the statement with positional parameters.
    pub fn exec(&self, params: &[Param]) -> Result<QueryResult, DbError> {
        let shared = self.conn.upgrade().ok_or(DbError::ConnectionClosed)?;
        let raw = shared.with_client(|client| {
            log::debug!("{}: exec_prepared {}", shared.backend_name(), self.name);
            client.exec_prepared(&self.name, params)
        })?;
        into_query_result(raw)
    }

    /// Run the statement, handing `each` one `SINGLE_TUPLE` result per row.
    pub fn exec_each<F>(&self, params: &[Param], each: F) -> Result<(), DbError>
    where
        F: FnMut(QueryResult) -> ControlFlow<()>,
    {
        let shared = self.conn.upgrade().ok_or(DbError::ConnectionClosed)?;
        shared.with_client(|client| {
            log::debug!("{}: exec_prepared_each {}", shared.backend_name(), self.name);
            stream_classified(each, |sink| client.exec_prepared_each(&self.name, params, sink))
        })
    }

    /// Parameter and column metadata of the statement.
    pub fn describe(&self) -> Result<QueryResult, DbError> {
        let shared = self.conn.upgrade().ok_or(DbError::ConnectionClosed)?;
        let raw = shared.with_client(|client| {
            log::debug!("{}: describe_prepared {}", shared.backend_name(), self.name);
            client.describe_prepared(&self.name)
        })?;
        into_query_result(raw)
    }
}

impl<C: Client> std::fmt::Debug for Statement<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Statement").field("name", &self.name).finish()
    }
}
