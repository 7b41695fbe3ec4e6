//! Command-line interface

pub mod commands;

pub use commands::{cmd_keygen, cmd_start, node_config, CliResult};
