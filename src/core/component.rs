//! Component mapping from test file paths to display labels

use crate::core::config::ComponentConfig;

/// Label used when nothing else assigns a component
pub const DEFAULT_COMPONENT: &str = "unknown";

/// Normalize a path for substring matching: backslashes become slashes,
/// except a leading UNC `\\` which is kept as is.
pub fn normalize_path(path: &str) -> String {
    let path = path.trim();
    if path.is_empty() {
        return String::new();
    }
    match path.strip_prefix(r"\\") {
        Some(rest) => format!(r"\\{}", rest.replace('\\', "/")),
        None => path.replace('\\', "/"),
    }
}

/// Resolve the component label configured for a test file.
///
/// Returns `None` when the configuration does not assign one (no config, a
/// blank label, or no mapping rule matches `file_path`).
pub fn map_component(config: Option<&ComponentConfig>, file_path: &str) -> Option<String> {
    match config? {
        ComponentConfig::Label(label) => {
            let label = label.trim();
            (!label.is_empty()).then(|| label.to_string())
        }
        ComponentConfig::Mapping(rules) => {
            let file_path = normalize_path(file_path);
            rules
                .iter()
                .find(|rule| {
                    rule.paths.iter().any(|p| {
                        let pattern = normalize_path(p);
                        !pattern.is_empty() && file_path.contains(&pattern)
                    })
                })
                .map(|rule| rule.label.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ComponentRule;

    fn mapping(rules: Vec<(&str, Vec<&str>)>) -> ComponentConfig {
        ComponentConfig::Mapping(
            rules
                .into_iter()
                .map(|(label, paths)| ComponentRule {
                    label: label.to_string(),
                    paths: paths.iter().map(|p| p.to_string()).collect(),
                })
                .collect(),
        )
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(r"C:\work\tests\a.robot"), "C:/work/tests/a.robot");
        assert_eq!(normalize_path(r"\\server\share\a.robot"), r"\\server/share/a.robot");
        assert_eq!(normalize_path("  /already/posix  "), "/already/posix");
        assert_eq!(normalize_path("   "), "");
    }

    #[test]
    fn test_label_applies_to_every_file() {
        let config = ComponentConfig::Label("Radio".to_string());
        assert_eq!(map_component(Some(&config), "/a/b.robot").as_deref(), Some("Radio"));
        assert_eq!(map_component(Some(&config), r"D:\x\y.robot").as_deref(), Some("Radio"));
    }

    #[test]
    fn test_blank_label_assigns_nothing() {
        let config = ComponentConfig::Label("  ".to_string());
        assert_eq!(map_component(Some(&config), "/a/b.robot"), None);
    }

    #[test]
    fn test_mapping_first_match_wins() {
        let config = mapping(vec![
            ("Audio", vec!["tests/audio"]),
            ("Media", vec!["tests/video", "tests/audio"]),
        ]);
        assert_eq!(
            map_component(Some(&config), "/ws/tests/audio/volume.robot").as_deref(),
            Some("Audio")
        );
        assert_eq!(
            map_component(Some(&config), "/ws/tests/video/play.robot").as_deref(),
            Some("Media")
        );
    }

    #[test]
    fn test_mapping_matches_windows_paths() {
        let config = mapping(vec![("Nav", vec![r"tests\navigation"])]);
        assert_eq!(
            map_component(Some(&config), r"C:\ws\tests\navigation\route.robot").as_deref(),
            Some("Nav")
        );
    }

    #[test]
    fn test_unmatched_path_assigns_nothing() {
        let config = mapping(vec![("Nav", vec!["tests/navigation"])]);
        assert_eq!(map_component(Some(&config), "/ws/tests/phone/call.robot"), None);
        assert_eq!(map_component(None, "/ws/tests/phone/call.robot"), None);
    }
}
