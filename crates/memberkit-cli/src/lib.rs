//! # memberkit-cli: memberkit Command-Line Interface
//!
//! Builds classes from YAML schemas and exercises them from the shell.
//!
//! ## Subcommands
//!
//! - `inspect`: print every class's members, slots, and dict flag
//! - `capture`: instantiate a class, optionally restore state, and print
//!   the captured state as JSON
//!
//! ## Crate Policy
//!
//! - Argument parsing lives with each subcommand; `main.rs` only dispatches.
//! - Schema loading returns a typed `SchemaError`; handlers add context with
//!   `anyhow` at I/O and parse boundaries.

pub mod capture;
pub mod inspect;
pub mod schema;
