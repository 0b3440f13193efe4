//! Result status codes and the predicates derived from them.
//!
//! The set of codes is closed and mirrors libpq's `ExecStatusType`. Both the
//! enum and its predicate table are generated from a single declaration by
//! `status_codes!`, so adding a code adds exactly one predicate.

use std::fmt;

use serde::Serialize;

macro_rules! status_codes {
    ($( $(#[$doc:meta])* $variant:ident = $value:literal, $name:literal, $pred:ident; )*) => {
        /// Outcome classification of a single result.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        pub enum StatusCode {
            $( $(#[$doc])* $variant = $value, )*
        }

        impl StatusCode {
            /// Every status code, in libpq numeric order.
            pub const ALL: &'static [StatusCode] = &[$(StatusCode::$variant),*];

            /// Constant-style name (`"TUPLES_OK"`).
            pub fn name(self) -> &'static str {
                match self {
                    $( StatusCode::$variant => $name, )*
                }
            }

            /// Numeric value libpq assigns to this code.
            pub fn as_raw(self) -> i32 {
                self as i32
            }

            /// Maps a libpq numeric status back to a code.
            ///
            /// Values outside the known set are reported as `BadResponse`, the
            /// same way libpq reports a response it cannot classify.
            pub fn from_raw(raw: i32) -> StatusCode {
                match raw {
                    $( $value => StatusCode::$variant, )*
                    _ => StatusCode::BadResponse,
                }
            }
        }

        /// One predicate per status code, available on anything that carries a status.
        pub trait StatusPredicates {
            /// The status this value was produced with.
            fn status_code(&self) -> StatusCode;

            $(
                #[doc = concat!("True when the status is `", $name, "`.")]
                fn $pred(&self) -> bool {
                    self.status_code() == StatusCode::$variant
                }
            )*
        }

        /// Static table pairing each code with its predicate name.
        pub const STATUS_TABLE: &[(StatusCode, &str)] = &[$( (StatusCode::$variant, stringify!($pred)) ),*];
    };
}

status_codes! {
    /// The query string was empty.
    EmptyQuery = 0, "EMPTY_QUERY", is_empty_query;
    /// A command that returns no rows completed.
    CommandOk = 1, "COMMAND_OK", is_command_ok;
    /// A query that returns rows completed.
    TuplesOk = 2, "TUPLES_OK", is_tuples_ok;
    /// Copy-out transfer started.
    CopyOut = 3, "COPY_OUT", is_copy_out;
    /// Copy-in transfer started.
    CopyIn = 4, "COPY_IN", is_copy_in;
    /// The server's response was not understood.
    BadResponse = 5, "BAD_RESPONSE", is_bad_response;
    /// A notice or warning.
    NonfatalError = 6, "NONFATAL_ERROR", is_nonfatal_error;
    /// An error occurred.
    FatalError = 7, "FATAL_ERROR", is_fatal_error;
    /// Copy in/out transfer started (replication only).
    CopyBoth = 8, "COPY_BOTH", is_copy_both;
    /// One row of a result streamed in single-row mode.
    SingleTuple = 9, "SINGLE_TUPLE", is_single_tuple;
}

impl StatusCode {
    /// True for the codes that are turned into a `ResultError`.
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            StatusCode::EmptyQuery
                | StatusCode::BadResponse
                | StatusCode::NonfatalError
                | StatusCode::FatalError
        )
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl StatusPredicates for StatusCode {
    fn status_code(&self) -> StatusCode {
        *self
    }
}
