//! Linear crossfade ramps over the chunk overlap

/// Precomputed fade-in / fade-out ramps of `overlap_len` points each
///
/// `fade_in` runs linearly from 0.0 to 1.0 inclusive, `fade_out` is its
/// complement. Built once when the processing loop starts.
#[derive(Debug, Clone, PartialEq)]
pub struct FadeCurve {
    fade_in: Vec<f32>,
    fade_out: Vec<f32>,
}

impl FadeCurve {
    /// Build ramps for the given overlap length
    ///
    /// A single-point overlap gives `[0.0]` / `[1.0]`; a zero overlap gives
    /// empty ramps.
    pub fn new(overlap_len: usize) -> Self {
        let fade_in: Vec<f32> = match overlap_len {
            0 => Vec::new(),
            1 => vec![0.0],
            n => {
                let last = (n - 1) as f64;
                (0..n).map(|i| (i as f64 / last) as f32).collect()
            }
        };
        let fade_out = fade_in.iter().map(|&g| 1.0 - g).collect();

        Self { fade_in, fade_out }
    }

    pub fn fade_in(&self) -> &[f32] {
        &self.fade_in
    }

    pub fn fade_out(&self) -> &[f32] {
        &self.fade_out
    }

    pub fn len(&self) -> usize {
        self.fade_in.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fade_in.is_empty()
    }
}
