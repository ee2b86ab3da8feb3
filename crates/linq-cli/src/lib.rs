//! Linq CLI - `@symbol` translator
//!
//! Library half of the `linqc` binary: the source translator, its
//! configuration file and the subcommand implementations.

pub mod commands;
pub mod config;
pub mod translate;

pub use config::Config;
pub use translate::{SymbolTable, TranslateError, TranslateOptions, Translation, translate};
