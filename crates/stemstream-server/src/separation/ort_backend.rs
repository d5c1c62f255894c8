//! Demucs inference through ONNX Runtime
//!
//! The session is built once at startup and reused for every chunk. Demucs
//! takes planar stereo `[1, 2, N]` and returns `[1, stems, 2, N]` with stems
//! ordered drums, bass, other, vocals.

use std::path::Path;

use ndarray::Array3;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;

use stemstream_core::separation::{Result, SeparationBackend, SeparationError};
use stemstream_core::{deinterleave, interleave, Frame};

use super::config::{ModelType, SeparationConfig, StemMix};
use super::mixdown::{fit_length, mix_stems, resample_linear};

/// Separation backend running a Demucs ONNX model
pub struct OrtBackend {
    session: Session,
    model: ModelType,
    stem_mix: StemMix,
    stream_rate: u32,
    name: String,
}

impl OrtBackend {
    /// Load `model_path` into a new ONNX Runtime session
    pub fn new(
        model_path: &Path,
        model: ModelType,
        config: &SeparationConfig,
        stream_rate: u32,
    ) -> Result<Self> {
        log::info!("Loading ONNX model from {:?}", model_path);

        let mut builder = Session::builder()
            .map_err(|e| SeparationError::BackendInitFailed(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| SeparationError::BackendInitFailed(e.to_string()))?;

        if let Some(threads) = config.intra_threads {
            builder = builder
                .with_intra_threads(threads)
                .map_err(|e| SeparationError::BackendInitFailed(e.to_string()))?;
        }

        let session = builder.commit_from_file(model_path).map_err(|e| {
            SeparationError::BackendInitFailed(format!("Failed to load ONNX model: {}", e))
        })?;

        if stream_rate != model.sample_rate() {
            log::info!(
                "Stream runs at {} Hz, model at {} Hz; chunks will be resampled",
                stream_rate,
                model.sample_rate()
            );
        }

        Ok(Self {
            session,
            model,
            stem_mix: config.stem_mix,
            stream_rate,
            name: format!("onnxruntime/{}", model),
        })
    }

    fn infer(&mut self, left: &[f32], right: &[f32]) -> Result<(Vec<f32>, Vec<f32>)> {
        let num_samples = left.len();
        let mut input_array = Array3::<f32>::zeros((1, 2, num_samples));
        for (i, (&l, &r)) in left.iter().zip(right).enumerate() {
            input_array[[0, 0, i]] = l;
            input_array[[0, 1, i]] = r;
        }

        let input_tensor = Tensor::from_array(input_array).map_err(|e| {
            SeparationError::SeparationFailed(format!("Failed to create input tensor: {}", e))
        })?;

        let outputs = self
            .session
            .run(ort::inputs!["input" => input_tensor])
            .map_err(|e| SeparationError::SeparationFailed(format!("Inference failed: {}", e)))?;

        let output = outputs
            .iter()
            .next()
            .ok_or_else(|| SeparationError::SeparationFailed("No output tensor".to_string()))?
            .1;

        let (shape, data) = output.try_extract_tensor::<f32>().map_err(|e| {
            SeparationError::SeparationFailed(format!("Failed to extract output: {}", e))
        })?;
        let output_shape: Vec<i64> = shape.iter().copied().collect();

        mix_stems(data, &output_shape, self.stem_mix)
    }
}

impl SeparationBackend for OrtBackend {
    fn separate(&mut self, chunk: &[Frame]) -> Result<Vec<Frame>> {
        let model_rate = self.model.sample_rate();
        let (left, right) = deinterleave(chunk);

        let (left, right) = if self.stream_rate != model_rate {
            (
                resample_linear(&left, self.stream_rate, model_rate),
                resample_linear(&right, self.stream_rate, model_rate),
            )
        } else {
            (left, right)
        };

        let (mut left, mut right) = self.infer(&left, &right)?;

        if self.stream_rate != model_rate {
            left = resample_linear(&left, model_rate, self.stream_rate);
            right = resample_linear(&right, model_rate, self.stream_rate);
        }

        let left = fit_length(left, chunk.len());
        let right = fit_length(right, chunk.len());
        Ok(interleave(&left, &right))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
