//! CLI module - argument parsing, console output and the import command

pub mod args;
pub mod output;
pub mod run;

pub use args::Cli;
pub use output::Reporter;
pub use run::run;
