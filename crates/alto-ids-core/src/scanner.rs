use std::fs;
use std::path::{Path, PathBuf};

use glob::Pattern;
use tracing::error;

use crate::error::Error;

/// Lists the ALTO files of one document: the `.xml` files directly inside
/// `dir`, sorted by path, minus anything matching an ignore pattern.
pub fn list_files(dir: &Path, ignore_globs: &[String]) -> Result<Vec<PathBuf>, Error> {
    let ignore_patterns: Vec<Pattern> = ignore_globs
        .iter()
        .filter_map(|glob| match Pattern::new(glob) {
            Ok(p) => Some(p),
            Err(e) => {
                error!("Invalid glob pattern '{}': {}", glob, e);
                None
            }
        })
        .collect();

    let entries = fs::read_dir(dir).map_err(|e| Error::io(dir, e))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        let path = entry.path();

        if !path.is_file() || !is_xml(&path) {
            continue;
        }
        if is_ignored(&path, &ignore_patterns) {
            continue;
        }
        files.push(path);
    }

    files.sort();
    Ok(files)
}

fn is_xml(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
}

fn is_ignored(path: &Path, patterns: &[Pattern]) -> bool {
    let file_name = path.file_name().and_then(|name| name.to_str());
    patterns.iter().any(|pattern| {
        pattern.matches_path(path) || file_name.is_some_and(|name| pattern.matches(name))
    })
}
