//! Status-driven errors.
//!
//! A result whose status is one of the failure codes becomes a `ResultError`.
//! The error takes ownership of the result and reads diagnostic fields from it
//! on demand; constructing the error reads nothing but the status.

use std::fmt;

use super::diagnostic::{DiagnosticAccessors, DiagnosticField};
use super::result::RawResult;
use super::status::{StatusCode, StatusPredicates};

/// Which failure a `ResultError` represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultErrorKind {
    /// The query string was empty.
    EmptyQuery,
    /// The server response could not be understood.
    BadResponse,
    /// A notice or warning the caller asked to treat as an error.
    NonFatal,
    /// The server reported an error.
    Fatal,
}

/// Failure status to error kind. Total over `StatusCode::is_failure`.
const FAILURE_KINDS: &[(StatusCode, ResultErrorKind)] = &[
    (StatusCode::EmptyQuery, ResultErrorKind::EmptyQuery),
    (StatusCode::BadResponse, ResultErrorKind::BadResponse),
    (StatusCode::NonfatalError, ResultErrorKind::NonFatal),
    (StatusCode::FatalError, ResultErrorKind::Fatal),
];

impl ResultErrorKind {
    /// Kind for a failure status, `None` for success statuses.
    pub fn for_status(status: StatusCode) -> Option<ResultErrorKind> {
        FAILURE_KINDS
            .iter()
            .find(|(code, _)| *code == status)
            .map(|(_, kind)| *kind)
    }

    pub fn name(self) -> &'static str {
        match self {
            ResultErrorKind::EmptyQuery => "empty query",
            ResultErrorKind::BadResponse => "bad response",
            ResultErrorKind::NonFatal => "non-fatal error",
            ResultErrorKind::Fatal => "fatal error",
        }
    }
}

impl fmt::Display for ResultErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A failed result and the diagnostics it carries.
pub struct ResultError {
    kind: ResultErrorKind,
    result: Box<dyn RawResult>,
}

impl ResultError {
    /// Wraps `result` when its status is a failure, handing it back otherwise.
    pub fn classify(result: Box<dyn RawResult>) -> Result<Box<dyn RawResult>, ResultError> {
        match ResultErrorKind::for_status(result.status()) {
            Some(kind) => Err(ResultError { kind, result }),
            None => Ok(result),
        }
    }

    /// Wraps a notice or warning the server sent outside any query result.
    pub fn notice(result: Box<dyn RawResult>) -> ResultError {
        ResultError {
            kind: ResultErrorKind::NonFatal,
            result,
        }
    }

    pub fn kind(&self) -> ResultErrorKind {
        self.kind
    }

    /// The result this error was raised from.
    pub fn result(&self) -> &dyn RawResult {
        self.result.as_ref()
    }

    /// Gives the originating result back to the caller.
    pub fn into_result(self) -> Box<dyn RawResult> {
        self.result
    }
}

impl DiagnosticAccessors for ResultError {
    fn field(&self, field: DiagnosticField) -> Option<&str> {
        self.result.diagnostic_field(field)
    }
}

impl StatusPredicates for ResultError {
    fn status_code(&self) -> StatusCode {
        self.result.status()
    }
}

impl fmt::Debug for ResultError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultError")
            .field("kind", &self.kind)
            .field("status", &self.result.status())
            .finish()
    }
}

impl fmt::Display for ResultError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.message() {
            Some(message) => write!(f, "{}: {}", self.kind, message),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for ResultError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::result::OwnedResult;
    use crate::db::value::CellValue;
    use rstest::rstest;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Records every diagnostic lookup made against the wrapped result.
    struct CountingDiagnostics {
        inner: OwnedResult,
        lookups: Arc<AtomicUsize>,
    }

    impl RawResult for CountingDiagnostics {
        fn status(&self) -> StatusCode {
            self.inner.status()
        }
        fn field_count(&self) -> usize {
            self.inner.field_count()
        }
        fn row_count(&self) -> usize {
            self.inner.row_count()
        }
        fn field_name(&self, col: usize) -> Option<&str> {
            self.inner.field_name(col)
        }
        fn cell_value(&self, row: usize, col: usize) -> Option<&CellValue> {
            self.inner.cell_value(row, col)
        }
        fn diagnostic_field(&self, field: DiagnosticField) -> Option<&str> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.diagnostic_field(field)
        }
    }

    fn classify(result: OwnedResult) -> Result<Box<dyn RawResult>, ResultError> {
        ResultError::classify(Box::new(result))
    }

    #[rstest]
    #[case(StatusCode::EmptyQuery, ResultErrorKind::EmptyQuery)]
    #[case(StatusCode::BadResponse, ResultErrorKind::BadResponse)]
    #[case(StatusCode::NonfatalError, ResultErrorKind::NonFatal)]
    #[case(StatusCode::FatalError, ResultErrorKind::Fatal)]
    fn test_failure_status_selects_kind(#[case] status: StatusCode, #[case] kind: ResultErrorKind) {
        let err = classify(OwnedResult::new(status)).unwrap_err();
        assert_eq!(err.kind(), kind);
        assert_eq!(err.status_code(), status);
    }

    #[rstest]
    #[case(StatusCode::CommandOk)]
    #[case(StatusCode::TuplesOk)]
    #[case(StatusCode::CopyIn)]
    #[case(StatusCode::SingleTuple)]
    fn test_success_status_passes_through(#[case] status: StatusCode) {
        let raw = classify(OwnedResult::new(status)).unwrap();
        assert_eq!(raw.status(), status);
    }

    #[test]
    fn test_table_covers_failure_codes() {
        for code in StatusCode::ALL {
            assert_eq!(ResultErrorKind::for_status(*code).is_some(), code.is_failure());
        }
    }

    #[test]
    fn test_fatal_message_is_fetched_lazily() {
        let lookups = Arc::new(AtomicUsize::new(0));
        let raw = CountingDiagnostics {
            inner: OwnedResult::fatal("42601", "syntax error"),
            lookups: Arc::clone(&lookups),
        };

        let err = ResultError::classify(Box::new(raw)).unwrap_err();
        assert_eq!(err.kind(), ResultErrorKind::Fatal);
        assert_eq!(lookups.load(Ordering::SeqCst), 0);

        assert_eq!(err.message(), Some("syntax error"));
        assert_eq!(lookups.load(Ordering::SeqCst), 1);

        assert_eq!(err.sqlstate(), Some("42601"));
        assert_eq!(lookups.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_every_field_reads_through() {
        let mut raw = OwnedResult::new(StatusCode::FatalError);
        for field in DiagnosticField::ALL {
            raw.set_diagnostic(*field, field.name().to_lowercase());
        }
        let err = classify(raw).unwrap_err();

        for field in DiagnosticField::ALL {
            assert_eq!(err.field(*field), Some(field.name().to_lowercase().as_str()));
        }
        assert_eq!(err.constraint_name(), Some("constraint_name"));
        assert_eq!(err.source_line(), Some("source_line"));
    }

    #[test]
    fn test_missing_fields_are_none() {
        let err = classify(OwnedResult::new(StatusCode::EmptyQuery)).unwrap_err();
        assert_eq!(err.message(), None);
        assert_eq!(err.detail(), None);
        assert_eq!(err.to_string(), "empty query");
    }

    #[test]
    fn test_display_includes_message() {
        let err = classify(OwnedResult::fatal("42P01", "relation \"nope\" does not exist"))
            .unwrap_err();
        assert_eq!(err.to_string(), "fatal error: relation \"nope\" does not exist");
    }

    #[test]
    fn test_error_owns_result() {
        let raw = OwnedResult::fatal("23505", "duplicate key")
            .with_columns(["id"])
            .with_diagnostic(DiagnosticField::ConstraintName, "users_pkey");
        let err = classify(raw).unwrap_err();
        assert_eq!(err.result().field_count(), 1);

        let back = err.into_result();
        assert_eq!(
            back.diagnostic_field(DiagnosticField::ConstraintName),
            Some("users_pkey")
        );
    }

    #[test]
    fn test_notice_is_non_fatal() {
        let raw = OwnedResult::new(StatusCode::NonfatalError)
            .with_diagnostic(DiagnosticField::Severity, "NOTICE")
            .with_diagnostic(DiagnosticField::MessagePrimary, "table \"t\" does not exist, skipping");
        let notice = ResultError::notice(Box::new(raw));
        assert_eq!(notice.kind(), ResultErrorKind::NonFatal);
        assert_eq!(notice.severity(), Some("NOTICE"));
        assert_eq!(
            notice.to_string(),
            "non-fatal error: table \"t\" does not exist, skipping"
        );
    }
}
