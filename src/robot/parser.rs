//! `output.xml` parsing
//!
//! Supports the result layouts written by Robot Framework 3.x through 7.x:
//! `starttime`/`endtime` status attributes as well as the newer
//! `start`/`elapsed` pair, `<meta>` and `<metadata><item>` metadata, and tags
//! either directly under `<test>` or inside a `<tags>` wrapper.

use chrono::{NaiveDateTime, TimeDelta};
use miette::Diagnostic;
use roxmltree::{Document, Node};
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::metadata::SuiteMetadata;
use super::model::{Outcome, OutputFile, Status, Suite, TestCase};

/// Timestamp layout of Robot Framework < 7 (`20231017 10:00:00.001`)
const LEGACY_TIME_FORMAT: &str = "%Y%m%d %H:%M:%S%.f";

/// Timestamp layout of Robot Framework >= 7 (`2023-10-17T10:00:00.001000`)
const ISO_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

#[derive(Debug, Error, Diagnostic)]
pub enum ParseError {
    #[error("Cannot read result file '{}': {source}", .path.display())]
    #[diagnostic(code(robotresults2db::xml::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Result file '{}' is not well-formed XML: {source}", .path.display())]
    #[diagnostic(code(robotresults2db::xml::syntax))]
    Syntax {
        path: PathBuf,
        #[source]
        source: roxmltree::Error,
    },

    #[error("'{}' is not a Robot Framework result file (root element is <{root}>)", .path.display())]
    #[diagnostic(
        code(robotresults2db::xml::not_robot_output),
        help("Pass the output.xml written by Robot Framework, not log.html/report.html or another XML file")
    )]
    NotRobotOutput { path: PathBuf, root: String },

    #[error("Result file '{}' contains no <suite> element", .path.display())]
    #[diagnostic(code(robotresults2db::xml::missing_suite))]
    MissingSuite { path: PathBuf },
}

/// Read and parse one result file
pub fn parse_file(path: &Path) -> Result<OutputFile, ParseError> {
    let content = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_str(&content, path)
}

/// Parse result XML held in memory; `path` is only used for reporting
pub fn parse_str(content: &str, path: &Path) -> Result<OutputFile, ParseError> {
    let doc = Document::parse(content).map_err(|source| ParseError::Syntax {
        path: path.to_path_buf(),
        source,
    })?;

    let root = doc.root_element();
    if !root.has_tag_name("robot") {
        return Err(ParseError::NotRobotOutput {
            path: path.to_path_buf(),
            root: root.tag_name().name().to_string(),
        });
    }

    let suite_node = child_elements(root, "suite")
        .next()
        .ok_or_else(|| ParseError::MissingSuite {
            path: path.to_path_buf(),
        })?;

    log::debug!("parsing suite tree of {}", path.display());

    Ok(OutputFile {
        path: path.to_path_buf(),
        generator: root.attribute("generator").map(str::to_string),
        suite: parse_suite(suite_node),
    })
}

fn parse_suite(node: Node) -> Suite {
    let mut suite = Suite {
        name: node.attribute("name").unwrap_or_default().to_string(),
        source: node
            .attribute("source")
            .filter(|s| !s.is_empty())
            .map(PathBuf::from),
        ..Suite::default()
    };

    for child in node.children().filter(Node::is_element) {
        match child.tag_name().name() {
            "suite" => suite.suites.push(parse_suite(child)),
            "test" => suite.tests.push(parse_test(child)),
            "doc" => suite.doc = text_of(child),
            "meta" => insert_meta(&mut suite.metadata, child),
            "metadata" => {
                for item in child_elements(child, "item") {
                    insert_meta(&mut suite.metadata, item);
                }
            }
            "status" => suite.outcome = parse_status(child),
            _ => {}
        }
    }

    suite
}

fn insert_meta(metadata: &mut SuiteMetadata, node: Node) {
    if let Some(name) = node.attribute("name") {
        metadata.insert(name, text_of(node));
    }
}

fn parse_test(node: Node) -> TestCase {
    let mut test = TestCase {
        name: node.attribute("name").unwrap_or_default().to_string(),
        tags: Vec::new(),
        outcome: Outcome::default(),
    };

    for child in node.children().filter(Node::is_element) {
        match child.tag_name().name() {
            "tag" => test.tags.push(text_of(child)),
            "tags" => test
                .tags
                .extend(child_elements(child, "tag").map(text_of)),
            "status" => test.outcome = parse_status(child),
            _ => {}
        }
    }

    test
}

fn parse_status(node: Node) -> Outcome {
    let raw = node.attribute("status").unwrap_or("UNKNOWN").to_string();
    let status = Status::parse(&raw);

    let (start, end) = match node.attribute("start") {
        Some(start) => {
            let start = parse_timestamp(start);
            let end = start
                .zip(node.attribute("elapsed"))
                .and_then(|(s, elapsed)| end_after(s, elapsed))
                .or(start);
            (start, end)
        }
        None => (
            node.attribute("starttime").and_then(parse_timestamp),
            node.attribute("endtime").and_then(parse_timestamp),
        ),
    };

    Outcome {
        raw,
        status,
        start,
        end,
        message: text_of(node),
    }
}

/// End time from an RF 7 `elapsed` seconds value; `None` when the value is
/// negative, not finite or out of the representable range
fn end_after(start: NaiveDateTime, elapsed: &str) -> Option<NaiveDateTime> {
    let secs = elapsed
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs >= 0.0)?;
    let millis = (secs * 1000.0).round();
    if millis >= i64::MAX as f64 {
        return None;
    }
    TimeDelta::try_milliseconds(millis as i64).and_then(|delta| start.checked_add_signed(delta))
}

/// Parse either timestamp layout; `N/A` and garbage yield `None`
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, LEGACY_TIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(s, ISO_TIME_FORMAT))
        .ok()
}

fn child_elements<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children()
        .filter(move |n| n.is_element() && n.has_tag_name(name))
}

/// Concatenated text content of an element's direct text children
fn text_of(node: Node) -> String {
    node.children()
        .filter(Node::is_text)
        .filter_map(|n| n.text())
        .collect()
}
