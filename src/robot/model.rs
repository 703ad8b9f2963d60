//! In-memory model of a Robot Framework execution result

use chrono::NaiveDateTime;
use std::path::PathBuf;

use super::metadata::SuiteMetadata;

/// Execution status of a suite or test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Pass,
    Fail,
    Skip,
    NotRun,
    Unknown,
}

impl Status {
    /// Parse the `status` attribute of a `<status>` element
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "PASS" => Some(Status::Pass),
            "FAIL" => Some(Status::Fail),
            "SKIP" => Some(Status::Skip),
            "NOT RUN" | "NOT_RUN" => Some(Status::NotRun),
            "UNKNOWN" => Some(Status::Unknown),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pass => "PASS",
            Status::Fail => "FAIL",
            Status::Skip => "SKIP",
            Status::NotRun => "NOT RUN",
            Status::Unknown => "UNKNOWN",
        }
    }

    /// Main result label used by the web application, if the status has one
    pub fn result_main(&self) -> Option<&'static str> {
        match self {
            Status::Pass => Some("Passed"),
            Status::Fail => Some("Failed"),
            Status::Unknown => Some("Unknown"),
            Status::Skip | Status::NotRun => None,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status block shared by suites and tests
#[derive(Debug, Clone)]
pub struct Outcome {
    /// Raw status text as written in the XML (kept for error reporting)
    pub raw: String,
    pub status: Option<Status>,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    /// Text content of the `<status>` element (failure message)
    pub message: String,
}

impl Default for Outcome {
    fn default() -> Self {
        Self {
            raw: "UNKNOWN".to_string(),
            status: Some(Status::Unknown),
            start: None,
            end: None,
            message: String::new(),
        }
    }
}

/// A single test case
#[derive(Debug, Clone)]
pub struct TestCase {
    pub name: String,
    pub tags: Vec<String>,
    pub outcome: Outcome,
}

/// A test suite; leaf suites (no child suites) correspond to test files
#[derive(Debug, Clone, Default)]
pub struct Suite {
    pub name: String,
    pub source: Option<PathBuf>,
    pub doc: String,
    pub metadata: SuiteMetadata,
    pub suites: Vec<Suite>,
    pub tests: Vec<TestCase>,
    pub outcome: Outcome,
}

impl Suite {
    /// Combine the root suites of several result files under a synthetic parent,
    /// the way Robot Framework merges multiple outputs.
    pub fn combined(children: Vec<Suite>) -> Self {
        let name = children
            .iter()
            .map(|s| s.name.as_str())
            .collect::<Vec<_>>()
            .join(" & ");
        let start = children.iter().filter_map(|s| s.outcome.start).min();
        let end = children.iter().filter_map(|s| s.outcome.end).max();

        Self {
            name,
            outcome: Outcome {
                start,
                end,
                ..Outcome::default()
            },
            suites: children,
            ..Suite::default()
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.suites.is_empty()
    }

    /// Source path of the suite, falling back to its name
    pub fn source_display(&self) -> String {
        self.source
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.name.clone())
    }

    /// Total number of test cases in this suite and all children
    pub fn test_count(&self) -> usize {
        self.tests.len() + self.suites.iter().map(Suite::test_count).sum::<usize>()
    }
}

/// One parsed `output.xml`
#[derive(Debug, Clone)]
pub struct OutputFile {
    pub path: PathBuf,
    /// Value of the `generator` attribute on `<robot>`, e.g. `Robot 6.1.1 (Python 3.11.4 on linux)`
    pub generator: Option<String>,
    pub suite: Suite,
}

/// All result files of one import run
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub files: Vec<OutputFile>,
    /// Root suite; a synthetic combined suite when more than one file was parsed
    pub suite: Suite,
}

impl ExecutionResult {
    pub fn new(files: Vec<OutputFile>) -> Self {
        let suite = if files.len() == 1 {
            files[0].suite.clone()
        } else {
            Suite::combined(files.iter().map(|f| f.suite.clone()).collect())
        };
        Self { files, suite }
    }

    /// Generator string of the first file that carries one
    pub fn generator(&self) -> Option<&str> {
        self.files.iter().find_map(|f| f.generator.as_deref())
    }
}
