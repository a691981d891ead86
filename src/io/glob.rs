// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Functions to glob files.

use std::path::{Path, PathBuf};

use glob::glob;
use thiserror::Error;

/// Given a glob pattern, get all of the matches from the filesystem.
pub(crate) fn get_all_matches_from_glob(g: &str) -> Result<Vec<PathBuf>, GlobError> {
    let mut entries = vec![];
    for entry in glob(g)? {
        match entry {
            Ok(e) => entries.push(e),
            Err(e) => return Err(GlobError::GlobCrate(e)),
        }
    }
    Ok(entries)
}

/// Get every file in `dir` matching any of `patterns`, sorted by path and
/// without duplicates (a file may match more than one pattern).
pub(crate) fn get_sorted_matches_in_dir(
    dir: &Path,
    patterns: &[String],
) -> Result<Vec<PathBuf>, GlobError> {
    let escaped_dir = glob::Pattern::escape(&dir.display().to_string());
    let mut entries = vec![];
    for pattern in patterns {
        entries.extend(get_all_matches_from_glob(&format!(
            "{escaped_dir}/{pattern}"
        ))?);
    }
    entries.sort_unstable();
    entries.dedup();
    Ok(entries)
}

#[derive(Error, Debug)]
/// Error type associated with glob helper functions.
pub enum GlobError {
    #[error(transparent)]
    GlobCrate(#[from] glob::GlobError),

    #[error(transparent)]
    PatternError(#[from] glob::PatternError),
}

#[cfg(test)]
mod tests {
    use std::fs::File;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn glob_cargo() {
        let result = get_all_matches_from_glob("./Cargo*");
        assert!(result.is_ok());
        let entries = result.unwrap();
        assert!(&entries.contains(&PathBuf::from("Cargo.toml")));
    }

    #[test]
    fn test_sorted_matches_are_deduplicated() {
        let dir = tempdir().unwrap();
        for name in ["b_64.hsp", "a_64.hsp", "c_64_x.hsp", "d_128.hsp"] {
            File::create(dir.path().join(name)).unwrap();
        }
        let patterns = ["*_64.hsp".to_string(), "*_64*.hsp".to_string()];
        let result = get_sorted_matches_in_dir(dir.path(), &patterns);
        assert!(result.is_ok(), "{:?}", result.err());
        let names: Vec<_> = result
            .unwrap()
            .into_iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, ["a_64.hsp", "b_64.hsp", "c_64_x.hsp"]);
    }
}
