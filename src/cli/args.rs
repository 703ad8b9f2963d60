//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser};
use std::ffi::OsString;
use std::path::PathBuf;

/// Long options that are documented with a single dash
const SINGLE_DASH_LONG: &[&str] = &["recursive", "dryrun", "append", "UUID"];

#[derive(Parser, Debug)]
#[command(name = "RobotResults2DB")]
#[command(version, disable_version_flag = true)]
#[command(about = "RobotResults2DB imports XML result files (default: output.xml) generated by the Robot Framework into a WebApp database.")]
#[command(after_help = "Component mapping, variant and versions can also be set in a JSON file given by --config.")]
pub struct Cli {
    /// Version of RobotResults2DB importer
    #[arg(short = 'v', long = "version", action = ArgAction::Version)]
    version: Option<bool>,

    /// Absolute or relative path to the result file or directory of result files to be imported
    pub resultxmlfile: PathBuf,

    /// Server which hosts the database (IP or URL), or sqlite:<path> for a local database
    pub server: String,

    /// User for database login
    pub user: String,

    /// Password for database login
    pub password: String,

    /// Database schema for database login
    pub database: String,

    /// Search the given folder recursively for result files to be imported
    #[arg(long)]
    pub recursive: bool,

    /// Just show what would be imported, do not write to the database
    #[arg(long)]
    pub dryrun: bool,

    /// Append the results to the existing execution result given by -UUID
    #[arg(long)]
    pub append: bool,

    /// UUID used to identify the import and version ID on webapp; generated when omitted
    #[arg(long = "UUID", value_name = "UUID")]
    pub uuid: Option<String>,

    /// Variant name to be set for this import
    #[arg(long, value_name = "VARIANT")]
    pub variant: Option<String>,

    /// Metadata: Versions (Software;Hardware;Test) to be set for this import
    #[arg(long, value_name = "VERSIONS")]
    pub versions: Option<String>,

    /// Configuration JSON file for component mapping information
    #[arg(long, value_name = "CONFIG")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Parse process arguments, accepting the single-dash long options
    pub fn parse_normalized() -> Self {
        Self::parse_from(normalize_args(std::env::args_os()))
    }
}

/// Rewrite `-recursive`, `-dryrun`, `-append` and `-UUID` (optionally with
/// `=value`) to their double-dash form. Everything after `--` is left alone.
pub fn normalize_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut passthrough = false;
    args.into_iter()
        .map(Into::into)
        .map(|arg| {
            if passthrough {
                return arg;
            }
            let Some(s) = arg.to_str() else {
                return arg;
            };
            if s == "--" {
                passthrough = true;
                return arg;
            }
            match s.strip_prefix('-') {
                Some(rest) if !rest.starts_with('-') => {
                    let name = rest.split_once('=').map_or(rest, |(name, _)| name);
                    if SINGLE_DASH_LONG.contains(&name) {
                        OsString::from(format!("-{}", s))
                    } else {
                        arg
                    }
                }
                _ => arg,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(normalize_args(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_normalize_single_dash_long_flags() {
        let args = normalize_args(["prog", "-recursive", "-UUID=abc", "-dryrun", "-v", "--append"]);
        assert_eq!(
            args,
            vec!["prog", "--recursive", "--UUID=abc", "--dryrun", "-v", "--append"]
        );
    }

    #[test]
    fn test_normalize_stops_at_double_dash() {
        let args = normalize_args(["prog", "--", "-recursive"]);
        assert_eq!(args, vec!["prog", "--", "-recursive"]);
    }

    #[test]
    fn test_parse_positionals_and_flags() {
        let cli = parse(&[
            "RobotResults2DB",
            "-recursive",
            "-dryrun",
            "-UUID",
            "4b5a0cf2-1c5d-4e0a-9e1f-4a4a4a4a4a4a",
            "--variant",
            "CAR",
            "--versions",
            "1.0;HW;T",
            "results",
            "db.local",
            "user",
            "secret",
            "webapp",
        ]);
        assert!(cli.recursive);
        assert!(cli.dryrun);
        assert!(!cli.append);
        assert_eq!(cli.uuid.as_deref(), Some("4b5a0cf2-1c5d-4e0a-9e1f-4a4a4a4a4a4a"));
        assert_eq!(cli.variant.as_deref(), Some("CAR"));
        assert_eq!(cli.versions.as_deref(), Some("1.0;HW;T"));
        assert_eq!(cli.resultxmlfile, PathBuf::from("results"));
        assert_eq!(cli.server, "db.local");
        assert_eq!(cli.database, "webapp");
    }

    #[test]
    fn test_missing_positionals_rejected() {
        let err = Cli::try_parse_from(["RobotResults2DB", "output.xml"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }
}
