//! Separation configuration types

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration for the separation backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeparationConfig {
    /// Which backend to use for separation
    pub backend: BackendType,

    /// Models to try, in order, until one loads
    pub models: Vec<ModelType>,

    /// Which stems make up the output stream
    pub stem_mix: StemMix,

    /// Model cache directory (default: `~/.cache/stemstream/models/`)
    pub model_dir: Option<PathBuf>,

    /// If set, missing models are fetched from `{download_base_url}/{filename}`
    pub download_base_url: Option<String>,

    /// Intra-op thread count for ONNX Runtime (runtime default when unset)
    pub intra_threads: Option<usize>,
}

impl Default for SeparationConfig {
    fn default() -> Self {
        Self {
            backend: BackendType::OnnxRuntime,
            models: ModelType::fallback_chain().to_vec(),
            stem_mix: StemMix::Instrumental,
            model_dir: None,
            download_base_url: None,
            intra_threads: None,
        }
    }
}

impl SeparationConfig {
    /// Validate configuration values
    pub fn validate(&mut self) {
        if self.models.is_empty() {
            log::warn!("No separation models configured, using the default chain");
            self.models = ModelType::fallback_chain().to_vec();
        }
        if self.intra_threads == Some(0) {
            self.intra_threads = None;
        }
    }
}

/// Available separation backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// Demucs model through ONNX Runtime
    #[default]
    OnnxRuntime,

    /// No model; audio is returned unchanged
    Passthrough,
}

impl BackendType {
    /// Display name for logging
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::OnnxRuntime => "ONNX Runtime",
            Self::Passthrough => "Passthrough",
        }
    }
}

/// Available separation models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelType {
    /// Hybrid Transformer Demucs, 4 stems
    #[serde(rename = "htdemucs")]
    HtDemucs,

    /// Fine-tuned Hybrid Transformer Demucs, 4 stems
    #[serde(rename = "htdemucs-ft")]
    HtDemucsFt,
}

impl ModelType {
    /// Default load order
    pub fn fallback_chain() -> &'static [Self] {
        &[Self::HtDemucs, Self::HtDemucsFt]
    }

    /// Name used in config files and logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::HtDemucs => "htdemucs",
            Self::HtDemucsFt => "htdemucs-ft",
        }
    }

    /// Model filename (must match the name used during ONNX export, since external data
    /// files reference it by name)
    pub fn filename(&self) -> &'static str {
        match self {
            Self::HtDemucs => "htdemucs.onnx",
            Self::HtDemucsFt => "htdemucs_ft.onnx",
        }
    }

    /// Whether the weights live in a separate `.onnx.data` file
    pub fn has_external_data(&self) -> bool {
        true
    }

    /// Filename of the external weights file
    pub fn data_filename(&self) -> String {
        format!("{}.data", self.filename())
    }

    /// Sample rate the model was trained at
    pub fn sample_rate(&self) -> u32 {
        44100
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which stems are summed into the output stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StemMix {
    /// Everything except vocals (karaoke)
    #[default]
    Instrumental,

    /// Vocals only
    Vocals,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SeparationConfig::default();
        assert_eq!(config.backend, BackendType::OnnxRuntime);
        assert_eq!(config.models, vec![ModelType::HtDemucs, ModelType::HtDemucsFt]);
        assert_eq!(config.stem_mix, StemMix::Instrumental);
    }

    #[test]
    fn test_yaml_names() {
        let yaml = "backend: passthrough\nmodels: [htdemucs-ft]\nstem_mix: vocals\n";
        let config: SeparationConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.backend, BackendType::Passthrough);
        assert_eq!(config.models, vec![ModelType::HtDemucsFt]);
        assert_eq!(config.stem_mix, StemMix::Vocals);
        assert!(config.model_dir.is_none());

        let written = serde_yaml::to_string(&SeparationConfig::default()).unwrap();
        assert!(written.contains("onnxruntime"));
        assert!(written.contains("- htdemucs\n"));
        assert!(written.contains("- htdemucs-ft\n"));
    }

    #[test]
    fn test_validate_restores_empty_model_list() {
        let mut config = SeparationConfig {
            models: Vec::new(),
            intra_threads: Some(0),
            ..SeparationConfig::default()
        };
        config.validate();
        assert_eq!(config.models, ModelType::fallback_chain());
        assert_eq!(config.intra_threads, None);
    }

    #[test]
    fn test_model_files() {
        assert_eq!(ModelType::HtDemucsFt.filename(), "htdemucs_ft.onnx");
        assert_eq!(ModelType::HtDemucs.data_filename(), "htdemucs.onnx.data");
        assert_eq!(ModelType::HtDemucsFt.to_string(), "htdemucs-ft");
    }
}
