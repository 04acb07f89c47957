//! Recursive file discovery under a corpus root.

use super::error::{DatasetError, Result};
use glob::Pattern;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Find every file under `root` whose file name matches `query`.
///
/// The walk is recursive, follows symlinks and the result is sorted by path.
/// A root that does not exist yields an empty list; callers decide whether
/// that is fatal.
pub fn find_files(root: impl AsRef<Path>, query: &str) -> Result<Vec<PathBuf>> {
    let root = root.as_ref();
    let pattern = Pattern::new(query).map_err(|e| DatasetError::InvalidQuery {
        query: query.to_string(),
        message: e.to_string(),
    })?;
    if !root.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry.map_err(|err| DatasetError::Scan {
            root: err.path().unwrap_or(root).to_path_buf(),
            source: err.into(),
        })?;
        if entry.file_type().is_file()
            && entry
                .file_name()
                .to_str()
                .is_some_and(|name| pattern.matches(name))
        {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::find_files;
    use std::fs;

    #[test]
    fn finds_nested_matches_sorted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("spk2");
        fs::create_dir_all(&nested).expect("mkdir");
        for path in [
            dir.path().join("b-feats.npy"),
            dir.path().join("a-feats.npy"),
            dir.path().join("a-wave.npy"),
            nested.join("c-feats.npy"),
        ] {
            fs::write(path, b"").expect("touch");
        }

        let found = find_files(dir.path(), "*-feats.npy").expect("find");
        let names: Vec<_> = found
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a-feats.npy", "b-feats.npy", "spk2/c-feats.npy"]);
    }

    #[test]
    fn matching_directories_are_not_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let decoy = dir.path().join("spk1-feats.npy");
        fs::create_dir_all(&decoy).expect("mkdir");
        fs::write(decoy.join("u1-feats.npy"), b"").expect("touch");

        let found = find_files(dir.path(), "*-feats.npy").expect("find");
        assert_eq!(found, vec![decoy.join("u1-feats.npy")]);
    }

    #[test]
    fn missing_root_is_empty() {
        let found = find_files("/definitely/not/a/corpus", "*.npy").expect("find");
        assert!(found.is_empty());
    }

    #[test]
    fn invalid_query_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = find_files(dir.path(), "[").unwrap_err();
        assert!(err.to_string().contains("Invalid file query"));
    }
}
