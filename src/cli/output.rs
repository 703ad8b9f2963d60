//! Console output for an import run

use console::style;
use std::fmt::Display;

const INDENT: &str = "  ";

/// Prints progress, warnings and errors with consistent prefixes
#[derive(Debug, Clone, Copy, Default)]
pub struct Reporter {
    dryrun: bool,
}

impl Reporter {
    pub fn new(dryrun: bool) -> Self {
        Self { dryrun }
    }

    pub fn is_dryrun(&self) -> bool {
        self.dryrun
    }

    fn prefix(&self) -> String {
        if self.dryrun {
            format!("{} ", style("DRYRUN").yellow())
        } else {
            String::new()
        }
    }

    /// Progress line, indented by `level` steps
    pub fn info(&self, msg: impl Display, level: usize) {
        println!("{}{}{}", self.prefix(), INDENT.repeat(level), msg);
    }

    pub fn blank(&self) {
        println!();
    }

    pub fn warn(&self, msg: impl Display) {
        eprintln!("{}{} {}", self.prefix(), style("WARN:").yellow().bold(), msg);
        log::debug!("warning reported: {}", msg);
    }

    pub fn error(&self, msg: impl Display) {
        eprintln!("{}{} {}", self.prefix(), style("ERROR:").red().bold(), msg);
        log::debug!("error reported: {}", msg);
    }
}
