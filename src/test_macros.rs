//! Declarative macros for generating CLI, execute and output tests.
//!
//! This module provides macros to reduce boilerplate in command tests.
//! Instead of writing repetitive test functions, you can declare the test cases
//! and let the macro generate the actual test code.

/// Generate a test for default values when a command is invoked with minimal args.
#[macro_export]
macro_rules! cli_defaults_test {
    (
        command: $cmd:literal,
        variant: $variant:ident,
        required_args: [$($req_arg:literal),*],
        defaults: {
            $($def_field:ident : $def_expected:expr),* $(,)?
        } $(,)?
    ) => {
        #[rstest]
        fn test_defaults() {
            let args = Args::try_parse_from(["pqbind", $cmd, $($req_arg),*]).unwrap();
            match args.command {
                crate::commands::Command::$variant(cmd) => {
                    $(
                        assert_eq!(cmd.$def_field, $def_expected,
                            concat!("Default value mismatch for field: ", stringify!($def_field)));
                    )*
                }
                #[allow(unreachable_patterns)]
                _ => panic!(concat!("Expected ", stringify!($variant), " command")),
            }
        }
    };
}

/// Generate a single CLI option test.
#[macro_export]
macro_rules! cli_option_test {
    (
        command: $cmd:literal,
        variant: $variant:ident,
        test_name: $test_name:ident,
        args: [$($arg:literal),+],
        field: $field:ident,
        expected: $expected:expr $(,)?
    ) => {
        #[rstest]
        fn $test_name() {
            let args = Args::try_parse_from([
                "pqbind",
                $cmd,
                $($arg),+
            ]).unwrap();
            match args.command {
                crate::commands::Command::$variant(cmd) => {
                    assert_eq!(cmd.$field, $expected,
                        concat!("Field ", stringify!($field), " mismatch"));
                }
                #[allow(unreachable_patterns)]
                _ => panic!(concat!("Expected ", stringify!($variant), " command")),
            }
        }
    };
}

/// Generate a test that verifies a command requires a specific argument.
///
/// # Example
///
/// ```ignore
/// cli_required_arg_test! {
///     command: "exec",
///     test_name: test_requires_sql,
///     required_arg: "<SQL>",
/// }
/// ```
#[macro_export]
macro_rules! cli_required_arg_test {
    (
        command: $cmd:literal,
        test_name: $test_name:ident,
        required_arg: $arg:literal $(,)?
    ) => {
        #[rstest]
        fn $test_name() {
            let result = Args::try_parse_from(["pqbind", $cmd]);
            assert!(result.is_err(), concat!("Command should require ", $arg));
            assert!(
                result.unwrap_err().to_string().contains($arg),
                concat!("Error should mention ", $arg)
            );
        }
    };
}

/// Generate a test that verifies parsing fails with specific invalid args.
///
/// # Example
///
/// ```ignore
/// cli_error_test! {
///     command: "exec",
///     test_name: test_unknown_flag_rejected,
///     args: ["SELECT 1", "--limit", "0"],
/// }
/// ```
#[macro_export]
macro_rules! cli_error_test {
    (
        command: $cmd:literal,
        test_name: $test_name:ident,
        args: [$($arg:literal),+] $(,)?
    ) => {
        #[rstest]
        fn $test_name() {
            let result = Args::try_parse_from([
                "pqbind",
                $cmd,
                $($arg),+
            ]);
            assert!(result.is_err());
        }
    };
}

// =============================================================================
// Execute Test Macros
// =============================================================================

/// Generate a fixture yielding a connection over a `ScriptedClient`.
///
/// The listed results answer the client's calls in order; calls past the end
/// of the list get an empty `COMMAND_OK`.
#[macro_export]
macro_rules! scripted_fixture {
    (
        fixture_name: $name:ident,
        results: [$($result:expr),* $(,)?] $(,)?
    ) => {
        #[fixture]
        fn $name() -> (
            crate::db::Connection<crate::test_utils::ScriptedClient>,
            crate::test_utils::Script,
        ) {
            let (client, script) = crate::test_utils::ScriptedClient::new();
            $(
                script.push($result);
            )*
            (crate::db::Connection::from_client(client), script)
        }
    };
}

/// Generate a test that executes a command against a scripted fixture.
#[macro_export]
macro_rules! execute_test {
    (
        test_name: $test_name:ident,
        fixture: $fixture:ident,
        cmd: $cmd:expr,
        assertions: |$result:ident| $assertions:block $(,)?
    ) => {
        #[rstest]
        fn $test_name(
            $fixture: (
                crate::db::Connection<crate::test_utils::ScriptedClient>,
                crate::test_utils::Script,
            ),
        ) {
            use crate::commands::Execute;
            let (conn, _script) = $fixture;
            let $result = $cmd.execute(&conn).expect("Execute should succeed");
            $assertions
        }
    };
}

/// Generate a test that verifies command execution fails with a given message.
#[macro_export]
macro_rules! execute_error_test {
    (
        test_name: $test_name:ident,
        fixture: $fixture:ident,
        cmd: $cmd:expr,
        contains: $needle:literal $(,)?
    ) => {
        #[rstest]
        fn $test_name(
            $fixture: (
                crate::db::Connection<crate::test_utils::ScriptedClient>,
                crate::test_utils::Script,
            ),
        ) {
            use crate::commands::Execute;
            let (conn, _script) = $fixture;
            let err = $cmd.execute(&conn).expect_err("Execute should fail");
            assert!(
                err.to_string().contains($needle),
                "Error '{}' should contain '{}'",
                err,
                $needle
            );
        }
    };
}

/// Generate a test that verifies a command fails on a closed connection
/// without reaching the client.
#[macro_export]
macro_rules! execute_closed_test {
    (
        cmd: $cmd:expr $(,)?
    ) => {
        #[rstest]
        fn test_closed_connection() {
            use crate::commands::Execute;
            let (client, script) = crate::test_utils::ScriptedClient::new();
            let conn = crate::db::Connection::from_client(client);
            conn.close();
            let err = $cmd.execute(&conn).expect_err("Execute should fail");
            assert!(matches!(
                err.downcast_ref::<crate::db::DbError>(),
                Some(crate::db::DbError::ConnectionClosed)
            ));
            assert_eq!(script.calls(), vec!["finish"]);
        }
    };
}

// =============================================================================
// Output Test Macros
// =============================================================================

/// Generate a test that verifies table output matches expected string.
///
/// Works with rstest fixtures by accepting a fixture parameter.
///
/// # Example
/// ```ignore
/// output_table_test! {
///     test_name: test_to_table_empty,
///     fixture: empty_result,
///     fixture_type: ExecResult,
///     expected: EMPTY_TABLE_OUTPUT,
/// }
/// ```
#[macro_export]
macro_rules! output_table_test {
    (
        test_name: $test_name:ident,
        fixture: $fixture:ident,
        fixture_type: $fixture_type:ty,
        expected: $expected:expr $(,)?
    ) => {
        #[rstest]
        fn $test_name($fixture: $fixture_type) {
            use crate::output::Outputable;
            assert_eq!($fixture.to_table(), $expected);
        }
    };
}

/// Generate a test that verifies table output contains expected strings.
///
/// Use this when exact string matching is too brittle.
#[macro_export]
macro_rules! output_table_contains_test {
    (
        test_name: $test_name:ident,
        fixture: $fixture:ident,
        fixture_type: $fixture_type:ty,
        contains: [$($needle:literal),* $(,)?] $(,)?
    ) => {
        #[rstest]
        fn $test_name($fixture: $fixture_type) {
            use crate::output::Outputable;
            let output = $fixture.to_table();
            $(
                assert!(output.contains($needle), "Table output should contain: {}", $needle);
            )*
        }
    };
}

/// Generate a test that verifies JSON output is valid and contains expected fields.
///
/// # Example
/// ```ignore
/// output_json_test! {
///     test_name: test_format_json,
///     fixture: users,
///     fixture_type: ExecResult,
///     assertions: {
///         "status": "TUPLES_OK",
///     },
/// }
/// ```
#[macro_export]
macro_rules! output_json_test {
    (
        test_name: $test_name:ident,
        fixture: $fixture:ident,
        fixture_type: $fixture_type:ty,
        assertions: { $($field:literal : $expected:expr),* $(,)? } $(,)?
    ) => {
        #[rstest]
        fn $test_name($fixture: $fixture_type) {
            use crate::output::{Outputable, OutputFormat};
            let output = $fixture.format(OutputFormat::Json);
            let parsed: serde_json::Value = serde_json::from_str(&output)
                .expect("Should produce valid JSON");
            $(
                assert_eq!(parsed[$field], $expected, concat!("JSON field mismatch: ", $field));
            )*
        }
    };
}

/// Generate a test that verifies Toon output contains expected strings.
///
/// # Example
/// ```ignore
/// output_toon_test! {
///     test_name: test_format_toon,
///     fixture: users,
///     fixture_type: ExecResult,
///     contains: ["status: TUPLES_OK"],
/// }
/// ```
#[macro_export]
macro_rules! output_toon_test {
    (
        test_name: $test_name:ident,
        fixture: $fixture:ident,
        fixture_type: $fixture_type:ty,
        contains: [$($needle:literal),* $(,)?] $(,)?
    ) => {
        #[rstest]
        fn $test_name($fixture: $fixture_type) {
            use crate::output::{Outputable, OutputFormat};
            let output = $fixture.format(OutputFormat::Toon);
            $(
                assert!(output.contains($needle), concat!("Toon output should contain: ", $needle));
            )*
        }
    };
}
