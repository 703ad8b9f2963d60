//! Import configuration file (`--config`)
//!
//! A JSON object with the optional keys `component` (alias `components`),
//! `variant`, `version_sw`, `version_hw`, `version_test`, `testtool` and
//! `tester`. `component` is either a single label for every test case or an
//! object mapping labels to a path (or list of paths) that test files must
//! contain. Mapping order is significant: the first matching label wins.

use jsonschema::validator_for;
use miette::{Diagnostic, NamedSource, SourceSpan};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Shape every configuration file must satisfy
const CONFIG_SCHEMA: &str = r##"{
    "$schema": "https://json-schema.org/draft/2020-12/schema",
    "type": "object",
    "$defs": {
        "component": {
            "oneOf": [
                { "type": "string" },
                {
                    "type": "object",
                    "additionalProperties": {
                        "oneOf": [
                            { "type": "string" },
                            { "type": "array", "items": { "type": "string" } }
                        ]
                    }
                }
            ]
        }
    },
    "properties": {
        "component": { "$ref": "#/$defs/component" },
        "components": { "$ref": "#/$defs/component" },
        "variant": { "type": "string" },
        "version_sw": { "type": "string" },
        "version_hw": { "type": "string" },
        "version_test": { "type": "string" },
        "testtool": { "type": "string" },
        "tester": { "type": "string" }
    },
    "not": { "required": ["component", "components"] },
    "additionalProperties": false
}"##;

/// JSON syntax error with source location
#[derive(Debug, Error, Diagnostic)]
#[error("Configuration file is not valid JSON: {message}")]
#[diagnostic(code(robotresults2db::config::syntax))]
pub struct ConfigSyntaxError {
    #[source_code]
    src: NamedSource<String>,

    #[label("error here")]
    span: SourceSpan,

    message: String,
}

impl ConfigSyntaxError {
    fn from_serde_error(err: &serde_json::Error, source: &str, filename: &str) -> Self {
        let offset = line_col_to_offset(source, err.line(), err.column());
        Self {
            src: NamedSource::new(filename, source.to_string()),
            span: SourceSpan::from(offset..offset.saturating_add(1)),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("The provided config file is not existing: '{}'", .0.display())]
    #[diagnostic(code(robotresults2db::config::not_found))]
    NotFound(PathBuf),

    #[error("Cannot read config file '{}': {source}", .path.display())]
    #[diagnostic(code(robotresults2db::config::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Syntax(#[from] ConfigSyntaxError),

    #[error("Error in configuration file '{}':\n  {}", .path.display(), .violations.join("\n  "))]
    #[diagnostic(
        code(robotresults2db::config::schema),
        help("Supported keys: component (string or {{label: path | [paths]}}), variant, version_sw, version_hw, version_test, testtool, tester")
    )]
    Schema {
        path: PathBuf,
        violations: Vec<String>,
    },
}

/// A label assigned to every test file whose path contains one of `paths`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentRule {
    pub label: String,
    pub paths: Vec<String>,
}

/// Component assignment from the configuration file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentConfig {
    /// Same label for every test case
    Label(String),
    /// Ordered path rules, first match wins
    Mapping(Vec<ComponentRule>),
}

/// Parsed and validated configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportConfig {
    /// Where the configuration came from, for messages
    pub path: Option<PathBuf>,

    pub component: Option<ComponentConfig>,
    pub variant: Option<String>,
    pub version_sw: Option<String>,
    pub version_hw: Option<String>,
    pub version_test: Option<String>,
    pub testtool: Option<String>,
    pub tester: Option<String>,
}

impl ImportConfig {
    /// Load and validate a configuration file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.is_file() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_json_str(&contents, &path.display().to_string())?;
        config.path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Parse and validate configuration JSON; `filename` is used in diagnostics
    pub fn from_json_str(contents: &str, filename: &str) -> Result<Self, ConfigError> {
        let value: JsonValue = serde_json::from_str(contents)
            .map_err(|e| ConfigSyntaxError::from_serde_error(&e, contents, filename))?;

        let violations = schema_violations(&value);
        if !violations.is_empty() {
            return Err(ConfigError::Schema {
                path: PathBuf::from(filename),
                violations,
            });
        }

        let raw: RawConfig =
            serde_json::from_value(value).map_err(|e| ConfigError::Schema {
                path: PathBuf::from(filename),
                violations: vec![e.to_string()],
            })?;
        Ok(raw.into())
    }

    /// Human readable origin, e.g. `configuration 'cfg.json' file provided by --config`
    pub fn origin(&self) -> String {
        match &self.path {
            Some(path) => format!("from configuration '{}' file provided by --config", path.display()),
            None => "from configuration".to_string(),
        }
    }
}

/// Configuration document as written; the schema check runs first, so
/// deserialization only fails on shapes the schema cannot express
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default, alias = "components")]
    component: Option<RawComponent>,
    #[serde(default)]
    variant: Option<String>,
    #[serde(default)]
    version_sw: Option<String>,
    #[serde(default)]
    version_hw: Option<String>,
    #[serde(default)]
    version_test: Option<String>,
    #[serde(default)]
    testtool: Option<String>,
    #[serde(default)]
    tester: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawComponent {
    Label(String),
    /// Kept as a JSON map so the rule order is the document order
    Mapping(serde_json::Map<String, JsonValue>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawPaths {
    One(String),
    Many(Vec<String>),
}

impl From<RawConfig> for ImportConfig {
    fn from(raw: RawConfig) -> Self {
        Self {
            path: None,
            component: raw.component.map(ComponentConfig::from),
            variant: raw.variant,
            version_sw: raw.version_sw,
            version_hw: raw.version_hw,
            version_test: raw.version_test,
            testtool: raw.testtool,
            tester: raw.tester,
        }
    }
}

impl From<RawComponent> for ComponentConfig {
    fn from(raw: RawComponent) -> Self {
        match raw {
            RawComponent::Label(label) => ComponentConfig::Label(label),
            RawComponent::Mapping(map) => ComponentConfig::Mapping(
                map.into_iter()
                    .map(|(label, paths)| ComponentRule {
                        label,
                        paths: match serde_json::from_value(paths) {
                            Ok(RawPaths::One(path)) => vec![path],
                            Ok(RawPaths::Many(paths)) => paths,
                            Err(_) => Vec::new(),
                        },
                    })
                    .collect(),
            ),
        }
    }
}

fn schema_violations(value: &JsonValue) -> Vec<String> {
    let schema: JsonValue = match serde_json::from_str(CONFIG_SCHEMA) {
        Ok(schema) => schema,
        Err(e) => return vec![format!("internal schema error: {}", e)],
    };
    let validator = match validator_for(&schema) {
        Ok(v) => v,
        Err(e) => return vec![format!("internal schema error: {}", e)],
    };

    validator
        .iter_errors(value)
        .map(|error| {
            let path = error.instance_path.to_string();
            if path.is_empty() {
                error.to_string()
            } else {
                format!("'{}': {}", path.trim_start_matches('/'), error)
            }
        })
        .collect()
}

/// Convert line/column to byte offset
fn line_col_to_offset(source: &str, line: usize, column: usize) -> usize {
    let line_start: usize = source
        .split_inclusive('\n')
        .take(line.saturating_sub(1))
        .map(str::len)
        .sum();
    (line_start + column.saturating_sub(1)).min(source.len().saturating_sub(1))
}
