//! CLI module for axetune - command-line interface and subcommands.
//!
//! Provides the main entry point with subcommands for running the fleet,
//! checking profiles and one-off device actions.

pub mod commands;

pub use commands::Cli;
