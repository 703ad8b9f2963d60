//! Result file discovery

use miette::Diagnostic;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Error, Diagnostic)]
pub enum CollectError {
    #[error("Given resultxmlfile is not existing: '{}'", .0.display())]
    #[diagnostic(code(robotresults2db::input::not_found))]
    NotFound(PathBuf),

    #[error("No *.xml result file under '{}' folder", .path.display())]
    #[diagnostic(
        code(robotresults2db::input::empty_dir),
        help("Without -recursive only the folder itself is searched, not its sub folders")
    )]
    NoResultFiles { path: PathBuf, recursive: bool },

    #[error("Cannot read folder '{}': {source}", .path.display())]
    #[diagnostic(code(robotresults2db::input::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn is_xml(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("xml"))
        .unwrap_or(false)
}

/// Collect result files: the path itself if it is a file, otherwise every
/// `*.xml` in the folder (or the whole tree when `recursive`), sorted.
pub fn collect_result_files(path: &Path, recursive: bool) -> Result<Vec<PathBuf>, CollectError> {
    if !path.exists() {
        return Err(CollectError::NotFound(path.to_path_buf()));
    }
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files = Vec::new();
    if recursive {
        for entry in WalkDir::new(path)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            if is_xml(entry.path()) {
                files.push(entry.into_path());
            }
        }
    } else {
        let entries = std::fs::read_dir(path).map_err(|source| CollectError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        for entry in entries.filter_map(|e| e.ok()) {
            let entry_path = entry.path();
            if entry_path.is_file() && is_xml(&entry_path) {
                files.push(entry_path);
            }
        }
        files.sort();
    }

    if files.is_empty() {
        return Err(CollectError::NoResultFiles {
            path: path.to_path_buf(),
            recursive,
        });
    }
    Ok(files)
}
