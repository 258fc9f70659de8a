//! Library side of the `cda-etl` binary: argument types, commands, logging
//! and run summaries.

pub mod cli;
pub mod commands;
pub mod logging;
pub mod summary;
pub mod types;
