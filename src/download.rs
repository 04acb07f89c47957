//! Resolution of checkpoint and statistics locations.
//!
//! Vocoder artifacts are often published on HuggingFace Hub. Any path taken
//! from a configuration can be local, `hf://owner/repo/file[@revision]` or a
//! plain `http(s)://` URL; remote files are cached under `~/.cache/melvc/`.

use anyhow::{Context, Result};
use hf_hub::api::sync::Api;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// `~/.cache/melvc/`, created on demand.
pub fn cache_directory() -> Result<PathBuf> {
    let home = std::env::var_os("HOME").unwrap_or_else(|| ".".into());
    let cache_dir = Path::new(&home).join(".cache").join("melvc");
    fs::create_dir_all(&cache_dir)
        .with_context(|| format!("Failed to create {}", cache_dir.display()))?;
    Ok(cache_dir)
}

/// Return a local path for `location`, downloading it first when remote.
pub fn fetch_artifact(location: &str) -> Result<PathBuf> {
    if let Some(stripped) = location.strip_prefix("hf://") {
        let (repo_id, filename, revision) = parse_hf_location(stripped)?;
        let api = Api::new()?;
        let repo = match revision {
            Some(rev) => api.repo(hf_hub::Repo::with_revision(
                repo_id,
                hf_hub::RepoType::Model,
                rev,
            )),
            None => api.repo(hf_hub::Repo::model(repo_id)),
        };
        return Ok(repo.get(&filename)?);
    }

    if location.starts_with("http://") || location.starts_with("https://") {
        return fetch_http(location);
    }

    let local = PathBuf::from(location);
    if !local.exists() {
        anyhow::bail!("No such file or directory: {location}");
    }
    Ok(local)
}

/// Sibling of an already fetched artifact: `hf://` and URL locations get the
/// same treatment as `fetch_artifact`, local paths resolve next to `anchor`.
pub fn fetch_sibling(anchor: &str, file_name: &str) -> Result<PathBuf> {
    match anchor.rsplit_once('/') {
        Some((parent, _)) if anchor.contains("://") => {
            let revision = anchor.rsplit_once('@').map(|(_, rev)| rev);
            let parent = parent.split('@').next().unwrap_or(parent);
            let sibling = match revision {
                Some(rev) if !rev.contains('/') => format!("{parent}/{file_name}@{rev}"),
                _ => format!("{parent}/{file_name}"),
            };
            fetch_artifact(&sibling)
        }
        _ => {
            let sibling = Path::new(anchor)
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(file_name);
            fetch_artifact(&sibling.to_string_lossy())
        }
    }
}

fn fetch_http(url: &str) -> Result<PathBuf> {
    let cache_path = cache_directory()?.join(cache_file_name(url));
    if cache_path.exists() {
        return Ok(cache_path);
    }

    log::info!("Downloading {url}");
    let response = ureq::get(url)
        .call()
        .map_err(|e| anyhow::anyhow!("Failed to download {url}: {e}"))?;
    let mut data = Vec::new();
    response
        .into_reader()
        .read_to_end(&mut data)
        .map_err(|e| anyhow::anyhow!("Failed to read response from {url}: {e}"))?;

    // Rename into place so a killed download never looks cached.
    let partial = cache_path.with_extension("part");
    let mut file = fs::File::create(&partial)?;
    file.write_all(&data)?;
    file.sync_all()?;
    drop(file);
    fs::rename(&partial, &cache_path)?;

    log::info!("Cached {}", cache_path.display());
    Ok(cache_path)
}

fn cache_file_name(url: &str) -> String {
    url.strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url)
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// `owner/repo/path/in/repo[@rev]`.
fn parse_hf_location(location: &str) -> Result<(String, String, Option<String>)> {
    let mut parts = location.splitn(3, '/');
    let (Some(owner), Some(repo), Some(file)) = (parts.next(), parts.next(), parts.next()) else {
        anyhow::bail!("Invalid hf:// location: {location}");
    };
    let repo_id = format!("{owner}/{repo}");
    match file.split_once('@') {
        Some((file, rev)) => Ok((repo_id, file.to_string(), Some(rev.to_string()))),
        None => Ok((repo_id, file.to_string(), None)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_hf_location_is_rejected() {
        let err = fetch_artifact("hf://only-owner").unwrap_err();
        assert!(err.to_string().contains("Invalid hf:// location"));
    }

    #[test]
    fn hf_location_splits_revision() {
        let (repo, file, rev) =
            parse_hf_location("kan-bayashi/pwg/vctk/checkpoint.safetensors@main").expect("parse");
        assert_eq!(repo, "kan-bayashi/pwg");
        assert_eq!(file, "vctk/checkpoint.safetensors");
        assert_eq!(rev.as_deref(), Some("main"));
    }

    #[test]
    fn local_paths_pass_through() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("checkpoint.safetensors");
        fs::write(&path, b"").expect("write");
        assert_eq!(fetch_artifact(&path.to_string_lossy()).expect("fetch"), path);

        let sibling = dir.path().join("config.yml");
        fs::write(&sibling, b"").expect("write");
        assert_eq!(
            fetch_sibling(&path.to_string_lossy(), "config.yml").expect("sibling"),
            sibling
        );
    }

    #[test]
    fn missing_local_path_is_reported() {
        let err = fetch_artifact("no/such/checkpoint.safetensors").unwrap_err();
        assert!(err.to_string().contains("No such file"));
    }

    #[test]
    fn cache_names_are_flat() {
        assert_eq!(
            cache_file_name("https://example.com/pwg/checkpoint.safetensors?download=1"),
            "example.com_pwg_checkpoint.safetensors_download_1"
        );
    }
}
