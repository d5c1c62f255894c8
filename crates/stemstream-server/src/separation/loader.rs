//! Backend construction with model fallback

use stemstream_core::separation::{PassthroughBackend, Result, SeparationBackend, SeparationError};

use super::config::{BackendType, ModelType, SeparationConfig};
use super::model::ModelManager;
use super::ort_backend::OrtBackend;

/// Build the configured backend
///
/// For ONNX Runtime every configured model is tried in order; the first one
/// that loads wins. If none loads, the error lists each attempt.
pub fn load_backend(config: &SeparationConfig, stream_rate: u32) -> Result<Box<dyn SeparationBackend>> {
    match config.backend {
        BackendType::Passthrough => {
            log::warn!("Passthrough backend selected, audio will not be separated");
            Ok(Box::new(PassthroughBackend))
        }
        BackendType::OnnxRuntime => {
            let manager = model_manager(config)?;
            log::info!("Model cache: {:?}", manager.cache_dir());

            let (model, backend) = first_available(&config.models, |model| {
                let path = manager.ensure_model(model)?;
                OrtBackend::new(&path, model, config, stream_rate)
            })?;
            log::info!("Separation model {} loaded", model);
            Ok(Box::new(backend))
        }
    }
}

fn model_manager(config: &SeparationConfig) -> Result<ModelManager> {
    let manager = match &config.model_dir {
        Some(dir) => ModelManager::with_cache_dir(dir.clone()),
        None => ModelManager::new()?,
    };
    Ok(match &config.download_base_url {
        Some(url) => manager.with_download_base_url(url.clone()),
        None => manager,
    })
}

/// Try `open` for each model in order and return the first success
pub fn first_available<T, F>(models: &[ModelType], mut open: F) -> Result<(ModelType, T)>
where
    F: FnMut(ModelType) -> Result<T>,
{
    if models.is_empty() {
        return Err(SeparationError::InvalidConfig("No models configured".to_string()));
    }

    let mut attempts = Vec::with_capacity(models.len());
    for &model in models {
        log::info!("Loading model {}...", model);
        match open(model) {
            Ok(loaded) => return Ok((model, loaded)),
            Err(e) => {
                log::warn!("Failed to load model {}: {}", model, e);
                attempts.push(format!("  {}: {}", model, e));
            }
        }
    }
    Err(SeparationError::NoModelAvailable(attempts.join("\n")))
}
