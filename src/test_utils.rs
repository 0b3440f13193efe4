//! Shared test utilities for unit and integration tests.
//!
//! `ScriptedClient` is an in-memory `Client` that answers each call with the
//! next queued result and records every call it receives. The `Script` handle
//! stays with the test so it can queue replies and inspect the call log after
//! the client has been moved into a `Connection`. Queued notices are handed
//! to the installed notice receiver at the next call, the way a server sends
//! them while a query runs.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::db::{
    Client, DbError, DiagnosticField, NoticeReceiver, OwnedResult, Param, RawResult,
    ResultError, StatusCode,
};

#[derive(Debug)]
enum Reply {
    Result(OwnedResult),
    Failure(String),
}

#[derive(Default)]
struct ScriptState {
    replies: VecDeque<Reply>,
    notices: VecDeque<OwnedResult>,
    receiver: Option<NoticeReceiver>,
    calls: Vec<String>,
    finished: bool,
}

/// Test-side handle onto a `ScriptedClient`.
#[derive(Clone, Default)]
pub struct Script {
    state: Arc<Mutex<ScriptState>>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queue the result returned by the next call.
    pub fn push(&self, result: OwnedResult) -> &Self {
        self.lock().replies.push_back(Reply::Result(result));
        self
    }

    /// Queue a transport failure for the next call.
    pub fn push_failure(&self, message: impl Into<String>) -> &Self {
        self.lock().replies.push_back(Reply::Failure(message.into()));
        self
    }

    /// Queue a notice delivered during the next call.
    pub fn push_notice(&self, notice: OwnedResult) -> &Self {
        self.lock().notices.push_back(notice);
        self
    }

    /// Every call received so far, e.g. `"exec SELECT 1"`.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    /// True once the client has been finished.
    pub fn finished(&self) -> bool {
        self.lock().finished
    }

    /// Build a client that answers from this script.
    pub fn client(&self) -> ScriptedClient {
        ScriptedClient {
            script: self.clone(),
        }
    }

    fn answer(&self, call: String) -> Result<Box<dyn RawResult>, DbError> {
        let (reply, notices, receiver) = {
            let mut state = self.lock();
            state.calls.push(call);
            let notices: Vec<OwnedResult> = state.notices.drain(..).collect();
            (state.replies.pop_front(), notices, state.receiver.clone())
        };

        if let Some(receiver) = receiver {
            for notice in notices {
                receiver(ResultError::notice(Box::new(notice)));
            }
        }

        match reply {
            Some(Reply::Result(result)) => Ok(Box::new(result)),
            Some(Reply::Failure(message)) => Err(DbError::ConnectionFailure { message }),
            None => Ok(Box::new(OwnedResult::new(StatusCode::CommandOk))),
        }
    }
}

/// In-memory client driven by a `Script`.
pub struct ScriptedClient {
    script: Script,
}

impl ScriptedClient {
    /// A client plus the handle used to drive it.
    pub fn new() -> (Self, Script) {
        let script = Script::new();
        (script.client(), script)
    }
}

fn render_params(params: &[Param]) -> String {
    params
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl Client for ScriptedClient {
    /// Fails for an empty conninfo; anything else connects to a fresh script.
    fn connect(conninfo: &str) -> Result<Self, DbError> {
        if conninfo.trim().is_empty() {
            return Err(DbError::ConnectionFailure {
                message: "empty connection string".to_string(),
            });
        }
        Ok(Script::new().client())
    }

    fn exec(&mut self, sql: &str, params: &[Param]) -> Result<Box<dyn RawResult>, DbError> {
        if params.is_empty() {
            self.script.answer(format!("exec {}", sql))
        } else {
            self.script
                .answer(format!("exec {} [{}]", sql, render_params(params)))
        }
    }

    fn prepare(&mut self, name: &str, sql: &str) -> Result<Box<dyn RawResult>, DbError> {
        self.script.answer(format!("prepare {} {}", name, sql))
    }

    fn exec_prepared(
        &mut self,
        name: &str,
        params: &[Param],
    ) -> Result<Box<dyn RawResult>, DbError> {
        self.script
            .answer(format!("exec_prepared {} [{}]", name, render_params(params)))
    }

    fn describe_prepared(&mut self, name: &str) -> Result<Box<dyn RawResult>, DbError> {
        self.script.answer(format!("describe_prepared {}", name))
    }

    fn describe_portal(&mut self, name: &str) -> Result<Box<dyn RawResult>, DbError> {
        self.script.answer(format!("describe_portal {}", name))
    }

    fn set_notice_receiver(&mut self, receiver: NoticeReceiver) {
        let mut state = self.script.lock();
        state.calls.push("notice_receiver".to_string());
        state.receiver = Some(receiver);
    }

    fn reset(&mut self) -> Result<(), DbError> {
        self.script.answer("reset".to_string()).map(|_| ())
    }

    fn finish(self) {
        let mut state = self.script.lock();
        state.calls.push("finish".to_string());
        state.finished = true;
    }

    fn backend_name(&self) -> &'static str {
        "Scripted"
    }
}

/// A two-column, two-row `TUPLES_OK` result: `id`/`name` = 1/alice, 2/bob.
pub fn users_result() -> OwnedResult {
    OwnedResult::new(StatusCode::TuplesOk)
        .with_columns(["id", "name"])
        .with_row(["1", "alice"])
        .with_row(["2", "bob"])
}

/// A `NONFATAL_ERROR` result as the server sends for `NOTICE` or `WARNING`.
pub fn notice(severity: &str, message: impl Into<String>) -> OwnedResult {
    OwnedResult::new(StatusCode::NonfatalError)
        .with_diagnostic(DiagnosticField::Severity, severity)
        .with_diagnostic(DiagnosticField::SeverityNonlocalized, severity)
        .with_diagnostic(DiagnosticField::MessagePrimary, message)
}
