//! Stem selection and sample-rate helpers around model inference

use stemstream_core::separation::{Result, SeparationError};

use super::config::StemMix;

/// Index of the vocals stem in Demucs output (drums, bass, other, vocals)
pub const VOCALS_STEM: usize = 3;

/// Sum the selected stems of a `[1, stems, 2, samples]` tensor into left/right planes
pub fn mix_stems(data: &[f32], shape: &[i64], mix: StemMix) -> Result<(Vec<f32>, Vec<f32>)> {
    let dims: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();
    if dims.len() != 4 || dims[0] < 1 || dims[1] <= VOCALS_STEM || dims[2] != 2 {
        return Err(SeparationError::SeparationFailed(format!(
            "Unexpected output shape: {:?}, expected [1, 4, 2, N]",
            shape
        )));
    }

    let (num_stems, num_channels, samples) = (dims[1], dims[2], dims[3]);
    let needed = num_stems * num_channels * samples;
    if data.len() < needed {
        return Err(SeparationError::SeparationFailed(format!(
            "Output tensor holds {} values, shape {:?} needs {}",
            data.len(),
            shape,
            needed
        )));
    }

    // Flat index into the row-major tensor, batch 0
    let flat_idx = |stem: usize, channel: usize, sample: usize| -> usize {
        sample + samples * (channel + num_channels * stem)
    };

    let stems: Vec<usize> = match mix {
        StemMix::Instrumental => (0..num_stems).filter(|&s| s != VOCALS_STEM).collect(),
        StemMix::Vocals => vec![VOCALS_STEM],
    };

    let mut left = vec![0.0f32; samples];
    let mut right = vec![0.0f32; samples];
    for &stem in &stems {
        for (i, (l, r)) in left.iter_mut().zip(right.iter_mut()).enumerate() {
            *l += data[flat_idx(stem, 0, i)];
            *r += data[flat_idx(stem, 1, i)];
        }
    }
    Ok((left, right))
}

/// Linear-interpolation resampler
pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio) as usize;
    let mut output = Vec::with_capacity(output_len);

    for i in 0..output_len {
        let src_pos = i as f64 * ratio;
        let idx = src_pos as usize;
        let frac = (src_pos - idx as f64) as f32;

        let sample = if idx + 1 < samples.len() {
            samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
        } else if idx < samples.len() {
            samples[idx]
        } else {
            0.0
        };
        output.push(sample);
    }

    output
}

/// Truncate, or extend by holding the last sample, to exactly `len` samples
pub fn fit_length(mut samples: Vec<f32>, len: usize) -> Vec<f32> {
    let hold = samples.last().copied().unwrap_or(0.0);
    samples.resize(len, hold);
    samples
}
