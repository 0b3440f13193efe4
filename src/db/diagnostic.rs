//! Diagnostic field codes attached to failed results.
//!
//! Codes follow the PostgreSQL error-field taxonomy (the single-byte
//! identifiers of the ErrorResponse message, exposed by libpq as
//! `PG_DIAG_*`). `diagnostic_fields!` generates the enum, its lookup table
//! and one lazy accessor per code on `DiagnosticAccessors`.

use std::fmt;

macro_rules! diagnostic_fields {
    ($( $(#[$doc:meta])* $variant:ident = $code:literal, $name:literal, $accessor:ident; )*) => {
        /// One named piece of error detail.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum DiagnosticField {
            $( $(#[$doc])* $variant, )*
        }

        impl DiagnosticField {
            /// Every field code, in protocol documentation order.
            pub const ALL: &'static [DiagnosticField] = &[$(DiagnosticField::$variant),*];

            /// Wire identifier of the field.
            pub fn code(self) -> u8 {
                match self {
                    $( DiagnosticField::$variant => $code, )*
                }
            }

            /// Constant-style name (`"MESSAGE_PRIMARY"`).
            pub fn name(self) -> &'static str {
                match self {
                    $( DiagnosticField::$variant => $name, )*
                }
            }

            /// Looks up a field by wire identifier.
            pub fn from_code(code: u8) -> Option<DiagnosticField> {
                match code {
                    $( $code => Some(DiagnosticField::$variant), )*
                    _ => None,
                }
            }
        }

        /// Named accessors over a diagnostic-field lookup.
        ///
        /// Each accessor is a single call to `field`; nothing is cached, so an
        /// implementor backed by a result reads only the fields a caller asks for.
        pub trait DiagnosticAccessors {
            /// Raw lookup of one diagnostic field.
            fn field(&self, field: DiagnosticField) -> Option<&str>;

            $(
                #[doc = concat!("The `", $name, "` diagnostic field.")]
                fn $accessor(&self) -> Option<&str> {
                    self.field(DiagnosticField::$variant)
                }
            )*
        }
    };
}

diagnostic_fields! {
    /// Localized severity (`ERROR`, `FATAL`, ...).
    Severity = b'S', "SEVERITY", severity;
    /// Severity, never localized.
    SeverityNonlocalized = b'V', "SEVERITY_NONLOCALIZED", severity_nonlocalized;
    /// SQLSTATE error code.
    Sqlstate = b'C', "SQLSTATE", sqlstate;
    /// Primary human-readable message.
    MessagePrimary = b'M', "MESSAGE_PRIMARY", message;
    /// Optional secondary message.
    MessageDetail = b'D', "MESSAGE_DETAIL", detail;
    /// Optional suggestion.
    MessageHint = b'H', "MESSAGE_HINT", hint;
    /// 1-based character offset into the original statement.
    StatementPosition = b'P', "STATEMENT_POSITION", statement_position;
    /// Offset into an internally generated command.
    InternalPosition = b'p', "INTERNAL_POSITION", internal_position;
    /// Text of the internally generated command.
    InternalQuery = b'q', "INTERNAL_QUERY", internal_query;
    /// Call-stack traceback.
    Context = b'W', "CONTEXT", context;
    /// Schema of the object involved.
    SchemaName = b's', "SCHEMA_NAME", schema_name;
    /// Table of the object involved.
    TableName = b't', "TABLE_NAME", table_name;
    /// Column of the object involved.
    ColumnName = b'c', "COLUMN_NAME", column_name;
    /// Data type involved.
    DatatypeName = b'd', "DATATYPE_NAME", datatype_name;
    /// Constraint involved.
    ConstraintName = b'n', "CONSTRAINT_NAME", constraint_name;
    /// Server source file reporting the error.
    SourceFile = b'F', "SOURCE_FILE", source_file;
    /// Server source line reporting the error.
    SourceLine = b'L', "SOURCE_LINE", source_line;
    /// Server routine reporting the error.
    SourceFunction = b'R', "SOURCE_FUNCTION", source_function;
}

impl fmt::Display for DiagnosticField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
