//! Robot Framework result input: discovery, parsing, metadata and tags

pub mod collect;
pub mod metadata;
pub mod model;
pub mod parser;

pub use collect::{collect_result_files, CollectError};
pub use metadata::{run_metadata, SuiteMetadata, TagIds};
pub use model::{ExecutionResult, Outcome, OutputFile, Status, Suite, TestCase};
pub use parser::{parse_file, ParseError};
