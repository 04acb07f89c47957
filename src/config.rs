//! Decode configuration.
//!
//! The configuration is a YAML document saved next to a checkpoint. Values
//! supplied on the command line are merged into the document before it is
//! deserialized, and win on key collision.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// File name searched next to the checkpoint when no config path is given.
pub const DEFAULT_CONFIG_NAME: &str = "config.yml";

/// Options forwarded to the model's inference entry point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Stop-token probability threshold.
    #[serde(default = "default_threshold")]
    pub threshold: f32,
    /// Minimum output length as a ratio of input length.
    #[serde(default)]
    pub minlenratio: f32,
    /// Maximum output length as a ratio of input length.
    #[serde(default = "default_maxlenratio")]
    pub maxlenratio: f32,
    /// Model-specific options.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

fn default_threshold() -> f32 {
    0.5
}

fn default_maxlenratio() -> f32 {
    10.0
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            minlenratio: 0.0,
            maxlenratio: default_maxlenratio(),
            extra: BTreeMap::new(),
        }
    }
}

/// Vocoder section of the decode configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VocoderConfig {
    /// Generator checkpoint (local path, `hf://` or `http(s)://`).
    pub checkpoint: String,
    /// Generator YAML; defaults to `config.yml` beside the checkpoint.
    #[serde(default)]
    pub config: Option<String>,
    /// Statistics the generator was trained with.
    pub stats: String,
    /// Adapter discriminator; `s3prl_vc` selects the S3PRL adapter.
    #[serde(default)]
    pub vocoder_type: String,
}

/// Decode configuration after command-line overrides were merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodeConfig {
    /// Registered model name.
    pub model_type: String,
    /// Constructor parameters passed verbatim to the model factory.
    #[serde(default)]
    pub model_params: Value,
    #[serde(default)]
    pub inference: InferenceConfig,
    /// `false`, null and `{}` all mean no vocoder.
    #[serde(default, deserialize_with = "falsy_as_none")]
    pub vocoder: Option<VocoderConfig>,
    /// Every other key (training options, merged CLI values, ...).
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

fn falsy_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match Value::deserialize(deserializer)? {
        Value::Null | Value::Bool(false) => Ok(None),
        Value::Mapping(section) if section.is_empty() => Ok(None),
        Value::Sequence(items) if items.is_empty() => Ok(None),
        Value::String(text) if text.is_empty() => Ok(None),
        section => serde_yaml::from_value(section)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

impl DecodeConfig {
    /// Deserialize from an already merged document.
    pub fn from_mapping(document: Mapping) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_value(Value::Mapping(document))?)
    }
}

/// Configuration generators are built from (the vocoder's own YAML).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Registered generator name.
    #[serde(default = "default_generator_type")]
    pub generator_type: String,
    /// Output sample rate in Hz.
    #[serde(default)]
    pub sampling_rate: Option<u32>,
    /// Samples produced per feature frame.
    #[serde(default)]
    pub hop_size: Option<usize>,
    #[serde(default)]
    pub generator_params: Value,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

fn default_generator_type() -> String {
    "FrameProjection".to_string()
}

/// Load a YAML document as a mapping.
///
/// # Errors
///
/// Returns an error if the file doesn't exist, isn't valid YAML or isn't a
/// mapping at the top level.
pub fn load_document(path: impl AsRef<Path>) -> anyhow::Result<Mapping> {
    let path = path.as_ref();
    if !path.exists() {
        anyhow::bail!("Config file not found: {}", path.display());
    }

    let data = fs::read_to_string(path)?;
    match serde_yaml::from_str::<Value>(&data)? {
        Value::Mapping(mapping) => Ok(mapping),
        Value::Null => Ok(Mapping::new()),
        other => anyhow::bail!(
            "Config {} must be a mapping, got {}",
            path.display(),
            value_kind(&other)
        ),
    }
}

/// Load a generator configuration file.
pub fn load_generator_config(path: impl AsRef<Path>) -> anyhow::Result<GeneratorConfig> {
    let document = load_document(path)?;
    Ok(serde_yaml::from_value(Value::Mapping(document))?)
}

/// Insert `overrides` into `document`, replacing existing keys.
pub fn merge_overrides<K, I>(document: &mut Mapping, overrides: I)
where
    K: Into<String>,
    I: IntoIterator<Item = (K, Value)>,
{
    for (key, value) in overrides {
        document.insert(Value::String(key.into()), value);
    }
}

/// Config path used when none is given explicitly: `config.yml` next to the
/// checkpoint.
pub fn default_config_path(checkpoint: &Path) -> PathBuf {
    checkpoint
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(DEFAULT_CONFIG_NAME)
}

/// Render a document as `key = value` lines, in document order.
pub fn describe(document: &Mapping) -> Vec<String> {
    document
        .iter()
        .map(|(key, value)| format!("{} = {}", render(key), render(value)))
        .collect()
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "None".to_string(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().replace('\n', " "))
            .unwrap_or_else(|_| format!("{other:?}")),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a bool",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
