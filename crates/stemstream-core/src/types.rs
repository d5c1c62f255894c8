//! Core audio types shared across the engine

/// Number of interleaved channels carried by every frame
pub const CHANNELS: usize = 2;

/// One stereo sample pair
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Frame {
    pub left: f32,
    pub right: f32,
}

impl Frame {
    /// Zero-valued frame used for the initial overlap pad
    pub const SILENCE: Frame = Frame { left: 0.0, right: 0.0 };

    /// Create a frame from left/right samples
    #[inline]
    pub const fn new(left: f32, right: f32) -> Self {
        Self { left, right }
    }

    /// Same value on both channels
    #[inline]
    pub const fn mono(value: f32) -> Self {
        Self { left: value, right: value }
    }

    /// Multiply both channels by a gain
    #[inline]
    pub fn scaled(self, gain: f32) -> Self {
        Self {
            left: self.left * gain,
            right: self.right * gain,
        }
    }

    /// True if both channels are exactly zero
    #[inline]
    pub fn is_silent(&self) -> bool {
        self.left == 0.0 && self.right == 0.0
    }
}

/// Split interleaved frames into planar (left, right) buffers
pub fn deinterleave(frames: &[Frame]) -> (Vec<f32>, Vec<f32>) {
    let mut left = Vec::with_capacity(frames.len());
    let mut right = Vec::with_capacity(frames.len());
    for frame in frames {
        left.push(frame.left);
        right.push(frame.right);
    }
    (left, right)
}

/// Zip planar buffers back into frames
///
/// The shorter buffer decides the frame count.
pub fn interleave(left: &[f32], right: &[f32]) -> Vec<Frame> {
    left.iter()
        .zip(right)
        .map(|(&l, &r)| Frame::new(l, r))
        .collect()
}
