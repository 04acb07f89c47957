//! Utterance-id derivation from file names.

use std::path::Path;

/// How an utterance id is derived from a discovered file name.
///
/// Both sides of a paired corpus must use schemes that map matching files to
/// the same id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UttIdNaming {
    /// File name without its extension: `u1.safetensors` -> `u1`.
    Stem,
    /// File name with a modality marker removed: `u1-feats.npy` -> `u1`.
    StripSuffix(String),
}

impl UttIdNaming {
    /// Marker used by flat-array feature dumps.
    pub fn flat_feats() -> Self {
        Self::StripSuffix("-feats.npy".to_string())
    }

    /// Marker used by flat-array waveform dumps.
    pub fn flat_wave() -> Self {
        Self::StripSuffix("-wave.npy".to_string())
    }

    pub fn utt_id(&self, path: &Path) -> String {
        match self {
            Self::Stem => path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default(),
            Self::StripSuffix(suffix) => {
                let name = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                match name.strip_suffix(suffix.as_str()) {
                    Some(id) => id.to_string(),
                    None => name,
                }
            }
        }
    }

    pub fn utt_ids(&self, paths: &[impl AsRef<Path>]) -> Vec<String> {
        paths.iter().map(|path| self.utt_id(path.as_ref())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::UttIdNaming;
    use std::path::Path;

    #[test]
    fn stem_drops_extension_only() {
        let naming = UttIdNaming::Stem;
        assert_eq!(naming.utt_id(Path::new("/dump/dev/u1.safetensors")), "u1");
        assert_eq!(naming.utt_id(Path::new("/dump/dev/u1-feats.npy")), "u1-feats");
    }

    #[test]
    fn strip_suffix_removes_marker() {
        assert_eq!(
            UttIdNaming::flat_feats().utt_id(Path::new("dump/spk_001-feats.npy")),
            "spk_001"
        );
        assert_eq!(
            UttIdNaming::flat_wave().utt_id(Path::new("dump/spk_001-wave.npy")),
            "spk_001"
        );
    }

    #[test]
    fn strip_suffix_keeps_unmarked_names() {
        assert_eq!(
            UttIdNaming::flat_feats().utt_id(Path::new("dump/u2.npy")),
            "u2.npy"
        );
    }
}
