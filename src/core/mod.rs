//! Core module - configuration, value resolution and database records

pub mod component;
pub mod config;
pub mod records;
pub mod resolve;

pub use component::{map_component, normalize_path, DEFAULT_COMPONENT};
pub use config::{ComponentConfig, ComponentRule, ConfigError, ImportConfig};
pub use records::{CaseRecord, FileRecord, HeaderRecord, RecordError, ResultRecord};
pub use resolve::{
    CliOverrides, FileInfo, ResolveError, Resolved, Resolver, RunInfo, ValueSource, Versions,
};
