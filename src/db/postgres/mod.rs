//! PostgreSQL client implementation.
//!
//! This module implements `Client` on top of the synchronous `postgres`
//! crate. Parameterless statements go through the simple query protocol and
//! come back as text; statements with parameters and prepared statements use
//! the extended protocol, send parameters as text and receive binary cells.
//!
//! Streaming over the extended protocol fetches rows one at a time through
//! `query_raw`. The simple protocol hands back a statement's rows all at once,
//! so parameterless streams are split after the fact. Server notices go
//! through the connection's notice callback to whichever receiver is
//! installed at the time, or to the log when none is.

mod conversion;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use postgres::fallible_iterator::FallibleIterator;
use postgres::types::ToSql;
use postgres::NoTls;

use super::backend::{stream_rows, Client, NoticeReceiver, Param, RowSink};
use super::result::{OwnedResult, RawResult};
use super::status::StatusCode;
use super::DbError;

use conversion::TextParam;

/// PostgreSQL client backed by `postgres::Client`.
///
/// Prepared statements are tracked by name on this side, since the `postgres`
/// crate names server-side statements itself.
pub struct PgClient {
    client: postgres::Client,
    conninfo: String,
    prepared: HashMap<String, postgres::Statement>,
    notices: NoticeSlot,
}

/// Receiver shared with the connection's notice callback.
type NoticeSlot = Arc<Mutex<Option<NoticeReceiver>>>;

fn connect_error(e: impl std::fmt::Display) -> DbError {
    DbError::ConnectionFailure {
        message: format!("Failed to connect to PostgreSQL: {}", e),
    }
}

impl PgClient {
    fn open(conninfo: &str, notices: &NoticeSlot) -> Result<postgres::Client, DbError> {
        let mut config: postgres::Config = conninfo.parse().map_err(connect_error)?;

        let slot = Arc::clone(notices);
        config.notice_callback(move |notice| {
            let receiver = match slot.lock() {
                Ok(receiver) => receiver.clone(),
                Err(poisoned) => poisoned.into_inner().clone(),
            };
            match receiver {
                Some(receiver) => receiver(conversion::notice_to_error(&notice)),
                None => log::info!("PostgreSQL: {}: {}", notice.severity(), notice.message()),
            }
        });

        config.connect(NoTls).map_err(connect_error)
    }

    /// Run a prepared statement with text parameters.
    fn run(
        &mut self,
        statement: &postgres::Statement,
        params: &[Param],
    ) -> Result<Box<dyn RawResult>, DbError> {
        let texts: Vec<TextParam> = params.iter().map(TextParam::from).collect();
        let refs: Vec<&(dyn ToSql + Sync)> =
            texts.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

        match self.client.query(statement, &refs) {
            Ok(rows) => Ok(Box::new(conversion::rows_to_result(statement.columns(), &rows)?)),
            Err(e) => Ok(Box::new(conversion::error_to_result(e)?)),
        }
    }

    /// Run a prepared statement, handing rows to `sink` as they arrive.
    fn stream(
        &mut self,
        statement: &postgres::Statement,
        params: &[Param],
        sink: &mut RowSink<'_>,
    ) -> Result<(), DbError> {
        let texts: Vec<TextParam> = params.iter().map(TextParam::from).collect();
        let refs: Vec<&(dyn ToSql + Sync)> =
            texts.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

        let mut rows = match self.client.query_raw(statement, refs.iter().copied()) {
            Ok(rows) => rows,
            Err(e) => {
                let _ = sink(Box::new(conversion::error_to_result(e)?));
                return Ok(());
            }
        };

        loop {
            match rows.next() {
                Ok(Some(row)) => {
                    let result = conversion::single_row_result(statement.columns(), &row)?;
                    if sink(Box::new(result)).is_break() {
                        return Ok(());
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    let _ = sink(Box::new(conversion::error_to_result(e)?));
                    return Ok(());
                }
            }
        }

        if statement.columns().is_empty() {
            let _ = sink(Box::new(OwnedResult::new(StatusCode::CommandOk)));
        }
        Ok(())
    }

    fn unknown_statement(name: &str) -> Box<dyn RawResult> {
        Box::new(OwnedResult::fatal(
            "26000",
            format!("prepared statement \"{}\" does not exist", name),
        ))
    }
}

impl Client for PgClient {
    fn connect(conninfo: &str) -> Result<Self, DbError> {
        let notices = NoticeSlot::default();
        Ok(Self {
            client: Self::open(conninfo, &notices)?,
            conninfo: conninfo.to_string(),
            prepared: HashMap::new(),
            notices,
        })
    }

    fn exec(&mut self, sql: &str, params: &[Param]) -> Result<Box<dyn RawResult>, DbError> {
        if sql.trim().is_empty() {
            return Ok(Box::new(OwnedResult::new(StatusCode::EmptyQuery)));
        }

        if params.is_empty() {
            return match self.client.simple_query(sql) {
                Ok(messages) => Ok(Box::new(conversion::simple_messages_to_result(messages))),
                Err(e) => Ok(Box::new(conversion::error_to_result(e)?)),
            };
        }

        match self.client.prepare(sql) {
            Ok(statement) => self.run(&statement, params),
            Err(e) => Ok(Box::new(conversion::error_to_result(e)?)),
        }
    }

    fn exec_each(
        &mut self,
        sql: &str,
        params: &[Param],
        sink: &mut RowSink<'_>,
    ) -> Result<(), DbError> {
        if params.is_empty() || sql.trim().is_empty() {
            let result = self.exec(sql, params)?;
            stream_rows(result, sink);
            return Ok(());
        }

        match self.client.prepare(sql) {
            Ok(statement) => self.stream(&statement, params, sink),
            Err(e) => {
                let _ = sink(Box::new(conversion::error_to_result(e)?));
                Ok(())
            }
        }
    }

    /// The unnamed statement (`""`) may be replaced; named ones may not.
    fn prepare(&mut self, name: &str, sql: &str) -> Result<Box<dyn RawResult>, DbError> {
        if !name.is_empty() && self.prepared.contains_key(name) {
            return Ok(Box::new(OwnedResult::fatal(
                "42P05",
                format!("prepared statement \"{}\" already exists", name),
            )));
        }

        match self.client.prepare(sql) {
            Ok(statement) => {
                self.prepared.insert(name.to_string(), statement);
                Ok(Box::new(OwnedResult::new(StatusCode::CommandOk)))
            }
            Err(e) => Ok(Box::new(conversion::error_to_result(e)?)),
        }
    }

    fn exec_prepared(
        &mut self,
        name: &str,
        params: &[Param],
    ) -> Result<Box<dyn RawResult>, DbError> {
        match self.prepared.get(name).cloned() {
            Some(statement) => self.run(&statement, params),
            None => Ok(Self::unknown_statement(name)),
        }
    }

    fn exec_prepared_each(
        &mut self,
        name: &str,
        params: &[Param],
        sink: &mut RowSink<'_>,
    ) -> Result<(), DbError> {
        match self.prepared.get(name).cloned() {
            Some(statement) => self.stream(&statement, params, sink),
            None => {
                let _ = sink(Self::unknown_statement(name));
                Ok(())
            }
        }
    }

    fn describe_prepared(&mut self, name: &str) -> Result<Box<dyn RawResult>, DbError> {
        match self.prepared.get(name) {
            Some(statement) => Ok(Box::new(conversion::describe_statement(statement))),
            None => Ok(Self::unknown_statement(name)),
        }
    }

    fn describe_portal(&mut self, name: &str) -> Result<Box<dyn RawResult>, DbError> {
        Ok(Box::new(OwnedResult::fatal(
            "0A000",
            format!("describing portal \"{}\" is not supported", name),
        )))
    }

    /// Takes effect for the current connection and any after `reset`.
    fn set_notice_receiver(&mut self, receiver: NoticeReceiver) {
        let mut slot = match self.notices.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        *slot = Some(receiver);
    }

    /// Server-side statements do not survive the reconnect.
    fn reset(&mut self) -> Result<(), DbError> {
        self.client = Self::open(&self.conninfo, &self.notices)?;
        self.prepared.clear();
        Ok(())
    }

    fn finish(self) {
        if let Err(e) = self.client.close() {
            log::warn!("PostgreSQL: error while closing connection: {}", e);
        }
    }

    fn backend_name(&self) -> &'static str {
        "PostgreSQL"
    }
}
