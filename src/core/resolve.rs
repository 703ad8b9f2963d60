//! Default & override resolution
//!
//! Every value is taken from the first layer that provides a non-blank one:
//! command line, then configuration file, then XML metadata, then the
//! built-in default.

use chrono::{Local, NaiveDateTime};
use miette::Diagnostic;
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;
use uuid::{Uuid, Version};

use crate::core::component::{map_component, DEFAULT_COMPONENT};
use crate::core::config::ImportConfig;
use crate::robot::metadata::{keys, SuiteMetadata};

/// Project/variant used when nothing else provides one
pub const DEFAULT_PROJECT: &str = "ROBFW";

/// Layout of the generated software version
pub const VERSION_SW_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Branch name for main/feature line versions and unrecognized versions
pub const MAIN_BRANCH: &str = "main";

#[derive(Debug, Error, Diagnostic)]
pub enum ResolveError {
    #[error("The provided versions information is not valid: '{0}'")]
    #[diagnostic(
        code(robotresults2db::args::versions),
        help("Use at most three semicolon separated values: Software;Hardware;Test")
    )]
    InvalidVersions(String),

    #[error("The uuid provided is not valid: '{0}'")]
    #[diagnostic(
        code(robotresults2db::args::uuid),
        help("Provide a lowercase, hyphenated version 4 UUID, or omit -UUID to generate one")
    )]
    InvalidUuid(String),
}

/// Where a resolved value came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    /// Named command line argument
    CommandLine(&'static str),
    /// Configuration file, carrying its origin description
    ConfigFile(String),
    Metadata,
    Default,
}

impl ValueSource {
    pub fn is_default(&self) -> bool {
        matches!(self, ValueSource::Default)
    }
}

impl fmt::Display for ValueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueSource::CommandLine(arg) => write!(f, "from {} commandline argument", arg),
            ValueSource::ConfigFile(origin) => write!(f, "{}", origin),
            ValueSource::Metadata => write!(f, "from metadata in result file"),
            ValueSource::Default => write!(f, "default value"),
        }
    }
}

/// A value together with the layer that supplied it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub value: String,
    pub source: ValueSource,
}

impl Resolved {
    fn new(value: impl Into<String>, source: ValueSource) -> Self {
        Self {
            value: value.into(),
            source,
        }
    }
}

/// `--versions` split into its three positions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Versions {
    pub software: Option<String>,
    pub hardware: Option<String>,
    pub test: Option<String>,
}

impl Versions {
    /// Parse `Software;Hardware;Test`; blank positions stay unset
    pub fn parse(s: &str) -> Result<Self, ResolveError> {
        if s.trim().is_empty() {
            return Ok(Self::default());
        }
        let parts: Vec<&str> = s.split(';').map(str::trim).collect();
        if parts.len() > 3 {
            return Err(ResolveError::InvalidVersions(s.to_string()));
        }
        let at = |i: usize| {
            parts
                .get(i)
                .filter(|p| !p.is_empty())
                .map(|p| p.to_string())
        };
        Ok(Self {
            software: at(0),
            hardware: at(1),
            test: at(2),
        })
    }
}

/// Command line layer
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub variant: Option<String>,
    pub versions: Versions,
}

impl CliOverrides {
    pub fn new(variant: Option<&str>, versions: Option<&str>) -> Result<Self, ResolveError> {
        Ok(Self {
            variant: variant
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string),
            versions: match versions {
                Some(v) => Versions::parse(v)?,
                None => Versions::default(),
            },
        })
    }
}

/// Resolved values for the whole execution result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunInfo {
    /// Project and variant share one value
    pub project: Resolved,
    pub branch: String,
    pub version_sw: Resolved,
    pub version_hw: String,
    pub version_test: String,
}

/// Resolved values for one test file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub project: String,
    pub version_sw: String,
    pub component: Resolved,
    pub tester: String,
    pub machine: String,
    pub author: String,
    pub configfile: String,
    pub testtool: String,
}

/// Applies the layer precedence to extracted metadata
#[derive(Debug, Clone)]
pub struct Resolver<'a> {
    cli: &'a CliOverrides,
    config: Option<&'a ImportConfig>,
    /// Start of the execution; seeds the default software version
    execution_start: Option<NaiveDateTime>,
}

impl<'a> Resolver<'a> {
    pub fn new(
        cli: &'a CliOverrides,
        config: Option<&'a ImportConfig>,
        execution_start: Option<NaiveDateTime>,
    ) -> Self {
        Self {
            cli,
            config,
            execution_start,
        }
    }

    fn pick(
        &self,
        cli: Option<(&'static str, &Option<String>)>,
        from_config: impl Fn(&ImportConfig) -> &Option<String>,
        meta: &SuiteMetadata,
        key: &str,
    ) -> Option<Resolved> {
        if let Some((arg, Some(value))) = cli {
            if !value.trim().is_empty() {
                return Some(Resolved::new(value.trim(), ValueSource::CommandLine(arg)));
            }
        }
        if let Some(config) = self.config {
            if let Some(value) = from_config(config).as_deref().filter(|v| !v.trim().is_empty()) {
                return Some(Resolved::new(value, ValueSource::ConfigFile(config.origin())));
            }
        }
        meta.get_non_empty(key)
            .map(|value| Resolved::new(value, ValueSource::Metadata))
    }

    pub fn project(&self, meta: &SuiteMetadata) -> Resolved {
        self.pick(
            Some(("--variant", &self.cli.variant)),
            |c| &c.variant,
            meta,
            keys::PROJECT,
        )
        .unwrap_or_else(|| Resolved::new(DEFAULT_PROJECT, ValueSource::Default))
    }

    pub fn version_sw(&self, meta: &SuiteMetadata) -> Resolved {
        self.pick(
            Some(("--versions", &self.cli.versions.software)),
            |c| &c.version_sw,
            meta,
            keys::VERSION_SW,
        )
        .unwrap_or_else(|| Resolved::new(default_version_sw(self.execution_start), ValueSource::Default))
    }

    pub fn version_hw(&self, meta: &SuiteMetadata) -> String {
        self.pick(
            Some(("--versions", &self.cli.versions.hardware)),
            |c| &c.version_hw,
            meta,
            keys::VERSION_HW,
        )
        .map(|r| r.value)
        .unwrap_or_default()
    }

    pub fn version_test(&self, meta: &SuiteMetadata) -> String {
        self.pick(
            Some(("--versions", &self.cli.versions.test)),
            |c| &c.version_test,
            meta,
            keys::VERSION_TEST,
        )
        .map(|r| r.value)
        .unwrap_or_default()
    }

    /// Resolve the execution-level values from run metadata
    pub fn run(&self, meta: &SuiteMetadata) -> RunInfo {
        let version_sw = self.version_sw(meta);
        RunInfo {
            project: self.project(meta),
            branch: branch_from_version(&version_sw.value),
            version_sw,
            version_hw: self.version_hw(meta),
            version_test: self.version_test(meta),
        }
    }

    /// Resolve the values of one test file from its effective metadata
    pub fn file(&self, meta: &SuiteMetadata, file_path: &str, generator: Option<&str>) -> FileInfo {
        let component = self.component(meta, file_path);
        let tester = self
            .pick(None, |c| &c.tester, meta, keys::TESTER)
            .map(|r| r.value)
            .unwrap_or_default();
        let testtool = self
            .pick(None, |c| &c.testtool, meta, keys::TESTTOOL)
            .map(|r| r.value)
            .or_else(|| generator.map(str::to_string))
            .unwrap_or_default();
        let plain = |key: &str| meta.get(key).unwrap_or_default().to_string();

        FileInfo {
            project: self.project(meta).value,
            version_sw: self.version_sw(meta).value,
            component,
            tester,
            machine: plain(keys::MACHINE),
            author: plain(keys::AUTHOR),
            configfile: plain(keys::CONFIGFILE),
            testtool,
        }
    }

    /// Configured component, then XML metadata, then `unknown`
    pub fn component(&self, meta: &SuiteMetadata, file_path: &str) -> Resolved {
        if let Some(config) = self.config {
            if let Some(label) = map_component(config.component.as_ref(), file_path) {
                return Resolved::new(label, ValueSource::ConfigFile(config.origin()));
            }
        }
        meta.get_non_empty(keys::COMPONENT)
            .map(|value| Resolved::new(value, ValueSource::Metadata))
            .unwrap_or_else(|| Resolved::new(DEFAULT_COMPONENT, ValueSource::Default))
    }
}

/// Software version generated from the execution start (or now)
pub fn default_version_sw(execution_start: Option<NaiveDateTime>) -> String {
    execution_start
        .unwrap_or_else(|| Local::now().naive_local())
        .format(VERSION_SW_FORMAT)
        .to_string()
}

fn branch_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+\.)(\d+)([S,F])\d+").expect("branch pattern is valid"))
}

/// Derive the branch from a software version.
///
/// `.0F` versions (e.g. `17.0F03`) belong to the main/feature line; `.1S`,
/// `.2S`, ... name a stabilization branch (e.g. `17.1S`).
pub fn branch_from_version(version_sw: &str) -> String {
    let upper = version_sw.to_uppercase();
    match branch_regex().captures(&upper) {
        Some(caps) => {
            let branch = format!("{}{}{}", &caps[1], &caps[2], &caps[3]);
            if branch.ends_with(".0F") {
                MAIN_BRANCH.to_string()
            } else {
                branch
            }
        }
        None => MAIN_BRANCH.to_string(),
    }
}

/// Test tool information split out of a string like
/// `Robot Framework 6.1.1 (Python 3.11.4 on linux)`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestTool {
    pub name: String,
    pub version: String,
    pub python_version: String,
}

fn testtool_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"([a-zA-Z\s_]+[^\s])\s+([\d\.rcab]+)\s+\(Python\s+(.*)\)")
            .expect("testtool pattern is valid")
    })
}

impl TestTool {
    /// Parse a test tool string; unrecognized strings yield empty fields
    pub fn parse(s: &str) -> Self {
        match testtool_regex().captures(s) {
            Some(caps) => Self {
                name: caps[1].to_string(),
                version: caps[2].to_string(),
                python_version: caps[3].to_string(),
            },
            None => Self::default(),
        }
    }
}

/// Validate a caller-supplied run UUID or generate a new one
pub fn run_id(provided: Option<&str>) -> Result<String, ResolveError> {
    match provided {
        None => Ok(Uuid::new_v4().to_string()),
        Some(s) => {
            let valid = Uuid::parse_str(s)
                .map(|u| {
                    u.get_version() == Some(Version::Random)
                        && u.get_variant() == uuid::Variant::RFC4122
                        && u.hyphenated().to_string() == s
                })
                .unwrap_or(false);
            if valid {
                Ok(s.to_string())
            } else {
                Err(ResolveError::InvalidUuid(s.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{ComponentConfig, ComponentRule};
    use chrono::NaiveDate;

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_milli_opt(10, 20, 30, 123)
            .unwrap()
    }

    fn meta(pairs: &[(&str, &str)]) -> SuiteMetadata {
        let mut meta = SuiteMetadata::new();
        for (k, v) in pairs {
            meta.insert(*k, *v);
        }
        meta
    }

    #[test]
    fn test_defaults_when_nothing_provided() {
        let cli = CliOverrides::default();
        let resolver = Resolver::new(&cli, None, Some(start()));
        let run = resolver.run(&SuiteMetadata::new());

        assert_eq!(run.project.value, "ROBFW");
        assert!(run.project.source.is_default());
        assert_eq!(run.version_sw.value, "20240301_102030");
        assert!(run.version_sw.source.is_default());
        assert_eq!(run.branch, "main");
        assert_eq!(run.version_hw, "");

        let file = resolver.file(&SuiteMetadata::new(), "/t/a.robot", None);
        assert_eq!(file.component.value, "unknown");
        assert_eq!(file.project, "ROBFW");
        assert_eq!(file.version_sw, "20240301_102030");
    }

    #[test]
    fn test_metadata_beats_defaults() {
        let cli = CliOverrides::default();
        let resolver = Resolver::new(&cli, None, Some(start()));
        let m = meta(&[("project", "CAR"), ("version_sw", "19.2S04"), ("component", "Radio")]);
        let run = resolver.run(&m);
        assert_eq!(run.project.value, "CAR");
        assert_eq!(run.project.source, ValueSource::Metadata);
        assert_eq!(run.branch, "19.2S");
        assert_eq!(resolver.component(&m, "/x.robot").value, "Radio");
    }

    #[test]
    fn test_config_beats_metadata() {
        let cli = CliOverrides::default();
        let config = ImportConfig {
            variant: Some("CFGVAR".to_string()),
            version_sw: Some("2.0".to_string()),
            version_hw: Some("HW-B".to_string()),
            component: Some(ComponentConfig::Label("CfgComp".to_string())),
            ..ImportConfig::default()
        };
        let resolver = Resolver::new(&cli, Some(&config), Some(start()));
        let m = meta(&[("project", "CAR"), ("version_sw", "1.0"), ("version_hw", "HW-A"), ("component", "Radio")]);

        let run = resolver.run(&m);
        assert_eq!(run.project.value, "CFGVAR");
        assert!(matches!(run.project.source, ValueSource::ConfigFile(_)));
        assert_eq!(run.version_sw.value, "2.0");
        assert_eq!(run.version_hw, "HW-B");
        assert_eq!(resolver.component(&m, "/x.robot").value, "CfgComp");
    }

    #[test]
    fn test_cli_beats_config() {
        let cli = CliOverrides::new(Some(" CLIVAR "), Some("3.0;HW-C")).unwrap();
        let config = ImportConfig {
            variant: Some("CFGVAR".to_string()),
            version_sw: Some("2.0".to_string()),
            version_test: Some("T-1".to_string()),
            ..ImportConfig::default()
        };
        let resolver = Resolver::new(&cli, Some(&config), Some(start()));
        let run = resolver.run(&SuiteMetadata::new());

        assert_eq!(run.project.value, "CLIVAR");
        assert_eq!(run.project.source, ValueSource::CommandLine("--variant"));
        assert_eq!(run.version_sw.value, "3.0");
        assert_eq!(run.version_hw, "HW-C");
        assert_eq!(run.version_test, "T-1");
    }

    #[test]
    fn test_unmatched_mapping_falls_back() {
        let cli = CliOverrides::default();
        let config = ImportConfig {
            component: Some(ComponentConfig::Mapping(vec![ComponentRule {
                label: "Nav".to_string(),
                paths: vec!["tests/nav".to_string()],
            }])),
            ..ImportConfig::default()
        };
        let resolver = Resolver::new(&cli, Some(&config), None);
        assert_eq!(resolver.component(&SuiteMetadata::new(), "/ws/tests/nav/a.robot").value, "Nav");
        assert_eq!(resolver.component(&SuiteMetadata::new(), "/ws/tests/phone/a.robot").value, "unknown");
        assert_eq!(
            resolver.component(&meta(&[("component", "Phone")]), "/ws/tests/phone/a.robot").value,
            "Phone"
        );
    }

    #[test]
    fn test_tester_and_testtool_layers() {
        let cli = CliOverrides::default();
        let config = ImportConfig {
            tester: Some("ci-bot".to_string()),
            ..ImportConfig::default()
        };
        let resolver = Resolver::new(&cli, Some(&config), None);
        let m = meta(&[("tester", "alice"), ("machine", "rig-7")]);
        let file = resolver.file(&m, "/a.robot", Some("Robot 7.0 (Python 3.12.1 on win32)"));
        assert_eq!(file.tester, "ci-bot");
        assert_eq!(file.machine, "rig-7");
        assert_eq!(file.testtool, "Robot 7.0 (Python 3.12.1 on win32)");
    }

    #[test]
    fn test_versions_parse() {
        assert_eq!(Versions::parse("").unwrap(), Versions::default());
        let v = Versions::parse("1.0; ;T").unwrap();
        assert_eq!(v.software.as_deref(), Some("1.0"));
        assert_eq!(v.hardware, None);
        assert_eq!(v.test.as_deref(), Some("T"));
        assert!(matches!(Versions::parse("a;b;c;d"), Err(ResolveError::InvalidVersions(_))));
    }

    #[test]
    fn test_branch_from_version() {
        assert_eq!(branch_from_version("17.0F03"), "main");
        assert_eq!(branch_from_version("18.1S05"), "18.1S");
        assert_eq!(branch_from_version("v19.2s11_rc"), "19.2S");
        assert_eq!(branch_from_version("20240301_102030"), "main");
    }

    #[test]
    fn test_testtool_parse() {
        let tool = TestTool::parse("Robot Framework 6.1.1 (Python 3.11.4 on linux)");
        assert_eq!(tool.name, "Robot Framework");
        assert_eq!(tool.version, "6.1.1");
        assert_eq!(tool.python_version, "3.11.4 on linux");
        assert_eq!(TestTool::parse("handwritten"), TestTool::default());
    }

    #[test]
    fn test_run_id() {
        let generated = run_id(None).unwrap();
        assert_eq!(run_id(Some(&generated)).unwrap(), generated);
        assert!(run_id(Some("not-a-uuid")).is_err());
        assert!(run_id(Some(&generated.to_uppercase())).is_err());
        // version 1 UUID
        assert!(run_id(Some("6ba7b810-9dad-11d1-80b4-00c04fd430c8")).is_err());
    }
}
