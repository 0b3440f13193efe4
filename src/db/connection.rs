//! Connection lifecycle.
//!
//! A `Connection` owns the native client behind a lock together with its
//! open/closed state: the client slot is `Some` while open and `None` once
//! closed. Every operation takes the lock, checks the slot and only then calls
//! into the client, so nothing reaches a closed client. `Statement`s hold a
//! weak reference to the same state and go through the same check.

use std::ops::ControlFlow;
use std::sync::{Arc, RwLock};

use super::backend::{Client, Param, RowSink};
use super::error::ResultError;
use super::result::{QueryResult, RawResult};
use super::statement::Statement;
use super::DbError;

/// State shared between a connection and its statements.
pub(crate) struct Shared<C> {
    /// `None` once the connection is closed.
    client: RwLock<Option<C>>,
    backend: &'static str,
}

// Manual Sync implementation: the client is only touched through the write
// lock, so it is never accessed from two threads at once.
unsafe impl<C: Send> Sync for Shared<C> {}

impl<C: Client> Shared<C> {
    /// Run `op` against the open client, or fail with `ConnectionClosed`.
    pub(crate) fn with_client<T>(
        &self,
        op: impl FnOnce(&mut C) -> Result<T, DbError>,
    ) -> Result<T, DbError> {
        let mut slot = self.client.write().map_err(|_| DbError::LockPoisoned)?;
        match slot.as_mut() {
            Some(client) => op(client),
            None => Err(DbError::ConnectionClosed),
        }
    }

    pub(crate) fn backend_name(&self) -> &'static str {
        self.backend
    }
}

/// Classify a raw result: failures become `DbError::Result`.
pub(crate) fn into_query_result(raw: Box<dyn RawResult>) -> Result<QueryResult, DbError> {
    match ResultError::classify(raw) {
        Ok(raw) => Ok(QueryResult::new(raw)),
        Err(err) => {
            log::debug!("result classified as {}", err.kind());
            Err(DbError::Result(err))
        }
    }
}

/// Drive a row stream, classifying each result before `each` sees it.
///
/// The first failure status ends the stream and is returned.
pub(crate) fn stream_classified<F>(
    mut each: F,
    run: impl FnOnce(&mut RowSink<'_>) -> Result<(), DbError>,
) -> Result<(), DbError>
where
    F: FnMut(QueryResult) -> ControlFlow<()>,
{
    let mut failure = None;
    run(&mut |raw: Box<dyn RawResult>| match into_query_result(raw) {
        Ok(result) => each(result),
        Err(err) => {
            failure = Some(err);
            ControlFlow::Break(())
        }
    })?;
    failure.map_or(Ok(()), Err)
}

/// An open (or closed) database connection.
///
/// # Examples
///
/// ```no_run
/// use pqbind::db::{Connection, PgClient};
///
/// let conn = Connection::<PgClient>::connect("postgresql://localhost/postgres")?;
/// let result = conn.exec("SELECT 1 AS one", &[])?;
/// assert_eq!(result.column_names(), vec!["one"]);
/// conn.close();
/// # Ok::<(), pqbind::db::DbError>(())
/// ```
pub struct Connection<C: Client> {
    shared: Arc<Shared<C>>,
}

impl<C: Client> Connection<C> {
    /// Open a connection through the client's native connect.
    pub fn connect(conninfo: &str) -> Result<Self, DbError> {
        let client = C::connect(conninfo)?;
        log::debug!("{}: connected", client.backend_name());
        Ok(Self::from_client(client))
    }

    /// Wrap an already connected client.
    pub fn from_client(client: C) -> Self {
        let backend = client.backend_name();
        Self {
            shared: Arc::new(Shared {
                client: RwLock::new(Some(client)),
                backend,
            }),
        }
    }

    /// Get the backend name for logging/debugging.
    pub fn backend_name(&self) -> &'static str {
        self.shared.backend_name()
    }

    /// True once `close` has been called.
    pub fn is_closed(&self) -> bool {
        match self.shared.client.read() {
            Ok(slot) => slot.is_none(),
            Err(poisoned) => poisoned.into_inner().is_none(),
        }
    }

    /// Close the connection, releasing the native client.
    ///
    /// Closing an already closed connection does nothing.
    pub fn close(&self) {
        let taken = match self.shared.client.write() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => {
                log::warn!("{}: closing after a panic while connected", self.backend_name());
                poisoned.into_inner().take()
            }
        };

        match taken {
            Some(client) => {
                log::debug!("{}: closing connection", self.backend_name());
                client.finish();
            }
            None => log::debug!("{}: connection already closed", self.backend_name()),
        }
    }

    /// Run `sql` with positional parameters.
    pub fn exec(&self, sql: &str, params: &[Param]) -> Result<QueryResult, DbError> {
        let raw = self.shared.with_client(|client| {
            log::debug!("{}: exec {}", client.backend_name(), sql);
            client.exec(sql, params)
        })?;
        into_query_result(raw)
    }

    /// Run `sql`, handing `each` one `SINGLE_TUPLE` result per row.
    ///
    /// A statement that returns no rows hands over its completion result
    /// instead. Returning `ControlFlow::Break` from `each` discards the
    /// remaining rows. `each` runs while the connection is locked, so it must
    /// not call back into this connection.
    pub fn exec_each<F>(&self, sql: &str, params: &[Param], each: F) -> Result<(), DbError>
    where
        F: FnMut(QueryResult) -> ControlFlow<()>,
    {
        self.shared.with_client(|client| {
            log::debug!("{}: exec_each {}", client.backend_name(), sql);
            stream_classified(each, |sink| client.exec_each(sql, params, sink))
        })
    }

    /// Prepare `sql` under `name`, returning a handle to the statement.
    pub fn prepare(&self, name: &str, sql: &str) -> Result<Statement<C>, DbError> {
        let raw = self.shared.with_client(|client| {
            log::debug!("{}: prepare {} as {}", client.backend_name(), name, sql);
            client.prepare(name, sql)
        })?;
        into_query_result(raw)?;
        Ok(Statement::new(name, Arc::downgrade(&self.shared)))
    }

    /// Run the prepared statement `name`.
    pub fn exec_prepared(&self, name: &str, params: &[Param]) -> Result<QueryResult, DbError> {
        let raw = self.shared.with_client(|client| {
            log::debug!("{}: exec_prepared {}", client.backend_name(), name);
            client.exec_prepared(name, params)
        })?;
        into_query_result(raw)
    }

    /// Run the prepared statement `name`, streaming rows like `exec_each`.
    pub fn exec_prepared_each<F>(
        &self,
        name: &str,
        params: &[Param],
        each: F,
    ) -> Result<(), DbError>
    where
        F: FnMut(QueryResult) -> ControlFlow<()>,
    {
        self.shared.with_client(|client| {
            log::debug!("{}: exec_prepared_each {}", client.backend_name(), name);
            stream_classified(each, |sink| client.exec_prepared_each(name, params, sink))
        })
    }

    /// Parameter and column metadata of the prepared statement `name`.
    pub fn describe_prepared(&self, name: &str) -> Result<QueryResult, DbError> {
        let raw = self.shared.with_client(|client| {
            log::debug!("{}: describe_prepared {}", client.backend_name(), name);
            client.describe_prepared(name)
        })?;
        into_query_result(raw)
    }

    /// Column metadata of the portal `name`.
    pub fn describe_portal(&self, name: &str) -> Result<QueryResult, DbError> {
        let raw = self.shared.with_client(|client| {
            log::debug!("{}: describe_portal {}", client.backend_name(), name);
            client.describe_portal(name)
        })?;
        into_query_result(raw)
    }

    /// Deliver notices and warnings from the server to `receiver`.
    ///
    /// The receiver replaces any earlier one and stays installed across
    /// `reset`.
    pub fn set_notice_receiver<F>(&self, receiver: F) -> Result<(), DbError>
    where
        F: Fn(ResultError) + Send + Sync + 'static,
    {
        self.shared.with_client(|client| {
            log::debug!("{}: notice receiver installed", client.backend_name());
            client.set_notice_receiver(Arc::new(receiver));
            Ok(())
        })
    }

    /// Re-establish the native connection.
    pub fn reset(&self) -> Result<(), DbError> {
        self.shared.with_client(|client| {
            log::debug!("{}: reset", client.backend_name());
            client.reset()
        })
    }
}

impl<C: Client> std::fmt::Debug for Connection<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("backend", &self.backend_name())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::diagnostic::DiagnosticAccessors;
    use crate::db::error::ResultErrorKind;
    use crate::db::result::OwnedResult;
    use crate::db::status::{StatusCode, StatusPredicates};
    use crate::db::value::CellValue;
    use crate::test_utils::{notice, users_result, Script, ScriptedClient};
    use rstest::{fixture, rstest};
    use std::sync::Mutex;

    #[fixture]
    fn scripted() -> (Connection<ScriptedClient>, Script) {
        let (client, script) = ScriptedClient::new();
        (Connection::from_client(client), script)
    }

    #[rstest]
    fn test_exec_returns_materializable_result(scripted: (Connection<ScriptedClient>, Script)) {
        let (conn, script) = scripted;
        script.push(users_result());

        let result = conn.exec("SELECT id, name FROM users", &[]).unwrap();
        assert!(result.is_tuples_ok());
        assert_eq!(result.column_names(), vec!["id", "name"]);
        assert_eq!(script.calls(), vec!["exec SELECT id, name FROM users"]);
    }

    #[rstest]
    fn test_exec_with_params_passes_them_through(scripted: (Connection<ScriptedClient>, Script)) {
        let (conn, script) = scripted;
        conn.exec("SELECT $1, $2", &[Param::Int(1), Param::Null]).unwrap();
        assert_eq!(script.calls(), vec!["exec SELECT $1, $2 [1, NULL]"]);
    }

    #[rstest]
    fn test_failed_result_becomes_result_error(scripted: (Connection<ScriptedClient>, Script)) {
        let (conn, script) = scripted;
        script.push(OwnedResult::fatal("42601", "syntax error"));

        let err = conn.exec("SELEC 1", &[]).unwrap_err();
        match err {
            DbError::Result(err) => {
                assert_eq!(err.kind(), ResultErrorKind::Fatal);
                assert_eq!(err.message(), Some("syntax error"));
                assert!(err.is_fatal_error());
            }
            other => panic!("Expected result error, got {:?}", other),
        }
    }

    #[rstest]
    fn test_empty_query_is_an_error(scripted: (Connection<ScriptedClient>, Script)) {
        let (conn, script) = scripted;
        script.push(OwnedResult::new(StatusCode::EmptyQuery));
        let err = conn.exec("", &[]).unwrap_err();
        assert!(matches!(
            err,
            DbError::Result(ref e) if e.kind() == ResultErrorKind::EmptyQuery
        ));
    }

    #[rstest]
    fn test_transport_failure_propagates(scripted: (Connection<ScriptedClient>, Script)) {
        let (conn, script) = scripted;
        script.push_failure("server closed the connection unexpectedly");
        let err = conn.exec("SELECT 1", &[]).unwrap_err();
        assert!(matches!(err, DbError::ConnectionFailure { .. }));
        assert!(!conn.is_closed());
    }

    #[rstest]
    fn test_close_is_idempotent(scripted: (Connection<ScriptedClient>, Script)) {
        let (conn, script) = scripted;
        assert!(!conn.is_closed());

        conn.close();
        conn.close();

        assert!(conn.is_closed());
        assert!(script.finished());
        assert_eq!(script.calls(), vec!["finish"]);
    }

    #[rstest]
    fn test_closed_connection_rejects_every_operation(
        scripted: (Connection<ScriptedClient>, Script),
    ) {
        let (conn, script) = scripted;
        conn.close();

        assert!(matches!(conn.exec("SELECT 1", &[]), Err(DbError::ConnectionClosed)));
        assert!(matches!(conn.exec_prepared("s", &[]), Err(DbError::ConnectionClosed)));
        assert!(matches!(conn.prepare("s", "SELECT 1"), Err(DbError::ConnectionClosed)));
        assert!(matches!(conn.describe_prepared("s"), Err(DbError::ConnectionClosed)));
        assert!(matches!(conn.describe_portal("p"), Err(DbError::ConnectionClosed)));
        assert!(matches!(conn.reset(), Err(DbError::ConnectionClosed)));
        assert!(matches!(
            conn.exec_each("SELECT 1", &[], |_| ControlFlow::Continue(())),
            Err(DbError::ConnectionClosed)
        ));
        assert!(matches!(
            conn.exec_prepared_each("s", &[], |_| ControlFlow::Continue(())),
            Err(DbError::ConnectionClosed)
        ));
        assert!(matches!(conn.set_notice_receiver(|_| {}), Err(DbError::ConnectionClosed)));

        // only the close itself reached the client
        assert_eq!(script.calls(), vec!["finish"]);
    }

    #[rstest]
    fn test_failed_prepare_returns_no_statement(scripted: (Connection<ScriptedClient>, Script)) {
        let (conn, script) = scripted;
        script.push(OwnedResult::fatal("42P05", "prepared statement \"s\" already exists"));
        let err = conn.prepare("s", "SELECT 1").unwrap_err();
        assert!(matches!(err, DbError::Result(_)));
    }

    #[rstest]
    fn test_reset_reaches_client(scripted: (Connection<ScriptedClient>, Script)) {
        let (conn, script) = scripted;
        conn.reset().unwrap();
        assert_eq!(script.calls(), vec!["reset"]);
    }

    #[test]
    fn test_connect_failure() {
        let err = Connection::<ScriptedClient>::connect("  ").unwrap_err();
        assert!(matches!(err, DbError::ConnectionFailure { .. }));
    }

    #[test]
    fn test_connect_and_debug() {
        let conn = Connection::<ScriptedClient>::connect("host=localhost").unwrap();
        assert_eq!(conn.backend_name(), "Scripted");
        assert_eq!(
            format!("{:?}", conn),
            "Connection { backend: \"Scripted\", closed: false }"
        );
    }

    #[rstest]
    fn test_exec_each_hands_over_single_tuples(scripted: (Connection<ScriptedClient>, Script)) {
        let (conn, script) = scripted;
        script.push(users_result());

        let mut names = Vec::new();
        conn.exec_each("SELECT id, name FROM users", &[], |result| {
            assert!(result.is_single_tuple());
            assert_eq!(result.row_count(), 1);
            names.push(result.named_rows()[0].get("name").cloned());
            ControlFlow::Continue(())
        })
        .unwrap();

        assert_eq!(
            names,
            vec![Some(CellValue::from("alice")), Some(CellValue::from("bob"))]
        );
        assert_eq!(script.calls(), vec!["exec SELECT id, name FROM users"]);
    }

    #[rstest]
    fn test_exec_each_stops_on_break(scripted: (Connection<ScriptedClient>, Script)) {
        let (conn, script) = scripted;
        script.push(users_result());

        let mut seen = 0;
        conn.exec_each("SELECT id, name FROM users", &[], |_| {
            seen += 1;
            ControlFlow::Break(())
        })
        .unwrap();
        assert_eq!(seen, 1);

        // the connection stays usable after an early stop
        conn.exec("SELECT 1", &[]).unwrap();
        assert_eq!(script.call_count(), 2);
    }

    #[rstest]
    fn test_exec_each_hands_over_command_result(scripted: (Connection<ScriptedClient>, Script)) {
        let (conn, _script) = scripted;
        let mut statuses = Vec::new();
        conn.exec_each("CREATE TABLE t (id int)", &[], |result| {
            statuses.push(result.status());
            ControlFlow::Continue(())
        })
        .unwrap();
        assert_eq!(statuses, vec![StatusCode::CommandOk]);
    }

    #[rstest]
    fn test_exec_each_returns_failure(scripted: (Connection<ScriptedClient>, Script)) {
        let (conn, script) = scripted;
        script.push(OwnedResult::fatal("42P01", "relation \"nope\" does not exist"));

        let mut called = false;
        let err = conn
            .exec_each("SELECT * FROM nope", &[Param::Int(1)], |_| {
                called = true;
                ControlFlow::Continue(())
            })
            .unwrap_err();

        assert!(!called);
        assert_eq!(err.sqlstate(), Some("42P01"));
        assert_eq!(script.calls(), vec!["exec SELECT * FROM nope [1]"]);
    }

    #[rstest]
    fn test_exec_prepared_each_streams_rows(scripted: (Connection<ScriptedClient>, Script)) {
        let (conn, script) = scripted;
        script.push(users_result());

        let mut rows = Vec::new();
        conn.exec_prepared_each("all_users", &[], |result| {
            rows.extend(result.rows());
            ControlFlow::Continue(())
        })
        .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(script.calls(), vec!["exec_prepared all_users []"]);
    }

    #[rstest]
    fn test_notices_reach_receiver(scripted: (Connection<ScriptedClient>, Script)) {
        let (conn, script) = scripted;
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        conn.set_notice_receiver(move |notice| {
            let line = format!(
                "{}: {}",
                notice.severity().unwrap_or("?"),
                notice.message().unwrap_or("")
            );
            sink.lock().unwrap().push(line);
        })
        .unwrap();

        script.push_notice(notice("NOTICE", "table \"t\" does not exist, skipping"));
        conn.exec("DROP TABLE IF EXISTS t", &[]).unwrap();

        assert_eq!(
            *received.lock().unwrap(),
            vec!["NOTICE: table \"t\" does not exist, skipping"]
        );
        assert_eq!(script.calls(), vec!["notice_receiver", "exec DROP TABLE IF EXISTS t"]);
    }

    #[rstest]
    fn test_notices_without_receiver_are_dropped(scripted: (Connection<ScriptedClient>, Script)) {
        let (conn, script) = scripted;
        script.push_notice(notice("WARNING", "there is no transaction in progress"));
        let result = conn.exec("COMMIT", &[]).unwrap();
        assert!(result.is_command_ok());
    }
}
