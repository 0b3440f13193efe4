//! pqbind library - PostgreSQL result materialization and error classification
//!
//! Provides the connection guard, statement handles, result materializer and
//! error classifier over a native PostgreSQL client, plus the command
//! execution and output formatting infrastructure for the `pqbind` CLI.

pub mod cli;
pub mod commands;
pub mod config;
pub mod db;
pub mod output;

#[macro_use]
pub mod test_macros;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
