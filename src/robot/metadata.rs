//! Metadata and tag extraction
//!
//! Suite metadata names are matched like Robot Framework's own metadata
//! dictionary: case-insensitive, ignoring spaces and underscores. Absent keys
//! simply have no entry; defaults are applied later by the resolver.

use std::collections::BTreeMap;

use super::model::Suite;

/// Metadata keys the importer understands
pub mod keys {
    pub const PROJECT: &str = "project";
    pub const VERSION_SW: &str = "version_sw";
    pub const VERSION_HW: &str = "version_hw";
    pub const VERSION_TEST: &str = "version_test";
    pub const TESTTOOL: &str = "testtool";
    pub const CONFIGFILE: &str = "configfile";
    pub const TESTER: &str = "tester";
    pub const MACHINE: &str = "machine";
    pub const AUTHOR: &str = "author";
    pub const COMPONENT: &str = "component";
}

/// Normalize a metadata name for lookup
fn normalize_key(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Key/value metadata attached to one suite
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuiteMetadata {
    /// normalized key -> (name as written, value)
    entries: BTreeMap<String, (String, String)>,
}

impl SuiteMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.entries.insert(normalize_key(&name), (name, value.into()));
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(&normalize_key(key))
            .map(|(_, value)| value.as_str())
    }

    /// Like `get`, but treats blank values as absent
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.trim().is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterate over (name as written, value)
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .values()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Return a copy of `self` with every entry of `higher` laid over it
    pub fn overlaid_with(&self, higher: &SuiteMetadata) -> SuiteMetadata {
        let mut merged = self.clone();
        for (key, entry) in &higher.entries {
            merged.entries.insert(key.clone(), entry.clone());
        }
        merged
    }
}

/// Collect run-level metadata from the root suite down the chain of first
/// children. Higher suite levels take precedence over deeper ones.
pub fn run_metadata(suite: &Suite) -> SuiteMetadata {
    let deeper = suite
        .suites
        .first()
        .map(run_metadata)
        .unwrap_or_default();
    deeper.overlaid_with(&suite.metadata)
}

/// Identifiers encoded in test tags
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagIds {
    pub issues: Vec<String>,
    pub tcids: Vec<String>,
    pub fids: Vec<String>,
}

impl TagIds {
    pub const ISSUE_PREFIX: &'static str = "ISSUE-";
    pub const TCID_PREFIX: &'static str = "TCID-";
    pub const FID_PREFIX: &'static str = "FID-";

    pub fn from_tags<S: AsRef<str>>(tags: &[S]) -> Self {
        Self {
            issues: ids_with_prefix(tags, Self::ISSUE_PREFIX),
            tcids: ids_with_prefix(tags, Self::TCID_PREFIX),
            fids: ids_with_prefix(tags, Self::FID_PREFIX),
        }
    }

    pub fn issue(&self) -> String {
        self.issues.join(";")
    }

    pub fn tcid(&self) -> String {
        self.tcids.join(";")
    }

    pub fn fid(&self) -> String {
        self.fids.join(";")
    }
}

/// Extract the identifier part of every tag starting with `prefix` (case-insensitive)
pub fn ids_with_prefix<S: AsRef<str>>(tags: &[S], prefix: &str) -> Vec<String> {
    tags.iter()
        .filter_map(|tag| strip_prefix_ignore_case(tag.as_ref().trim(), prefix))
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_lookup_is_normalized() {
        let mut meta = SuiteMetadata::new();
        meta.insert("Version SW", "1.2.3");
        meta.insert("PROJECT", "ROBFW");

        assert_eq!(meta.get(keys::VERSION_SW), Some("1.2.3"));
        assert_eq!(meta.get("versionsw"), Some("1.2.3"));
        assert_eq!(meta.get(keys::PROJECT), Some("ROBFW"));
        assert_eq!(meta.get(keys::COMPONENT), None);
    }

    #[test]
    fn test_blank_values_are_not_non_empty() {
        let mut meta = SuiteMetadata::new();
        meta.insert("component", "  ");
        assert_eq!(meta.get(keys::COMPONENT), Some("  "));
        assert_eq!(meta.get_non_empty(keys::COMPONENT), None);
    }

    #[test]
    fn test_overlay_prefers_higher() {
        let mut low = SuiteMetadata::new();
        low.insert("project", "LOW");
        low.insert("tester", "alice");
        let mut high = SuiteMetadata::new();
        high.insert("Project", "HIGH");

        let merged = low.overlaid_with(&high);
        assert_eq!(merged.get("project"), Some("HIGH"));
        assert_eq!(merged.get("tester"), Some("alice"));
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_run_metadata_walks_first_children() {
        let mut leaf = Suite::default();
        leaf.metadata.insert("project", "LEAF");
        leaf.metadata.insert("machine", "host-1");
        let mut second = Suite::default();
        second.metadata.insert("author", "ignored");
        let mut root = Suite::default();
        root.metadata.insert("project", "ROOT");
        root.suites = vec![leaf, second];

        let meta = run_metadata(&root);
        assert_eq!(meta.get("project"), Some("ROOT"));
        assert_eq!(meta.get("machine"), Some("host-1"));
        assert_eq!(meta.get("author"), None);
    }

    #[test]
    fn test_tag_ids() {
        let tags = ["TCID-1001", "ISSUE-RTC-003", "fid-REQ_7", "smoke", "TCID-1002"];
        let ids = TagIds::from_tags(&tags);
        assert_eq!(ids.tcid(), "1001;1002");
        assert_eq!(ids.issue(), "RTC-003");
        assert_eq!(ids.fid(), "REQ_7");
    }

    #[test]
    fn test_tag_prefix_must_lead() {
        let tags = ["MY-TCID-1", "TCID-", "TCID"];
        assert!(ids_with_prefix(&tags, TagIds::TCID_PREFIX).is_empty());
    }
}
