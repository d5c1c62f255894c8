//! Stream geometry configuration
//!
//! Durations are configured in seconds and converted to frame counts once at
//! startup. The conversion truncates toward zero.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default batch cap for a single pull request, in frames
pub const DEFAULT_PULL_BATCH_FRAMES: usize = 4096;

/// Errors raised while validating stream configuration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Sample rate must be positive")]
    ZeroSampleRate,

    #[error("Invalid {name}: {value} (must be finite and non-negative)")]
    InvalidDuration { name: &'static str, value: f64 },

    #[error("Chunk length is zero frames")]
    EmptyChunk,

    #[error("Hop length must be positive: chunk={chunk_len} frames, overlap={overlap_len} frames")]
    NonPositiveHop { chunk_len: usize, overlap_len: usize },

    #[error("Pull batch size must be positive")]
    ZeroPullBatch,

    #[error("Idle poll of {idle_poll_ms}ms must be positive and shorter than the {hop_ms:.1}ms hop")]
    InvalidIdlePoll { idle_poll_ms: u64, hop_ms: f64 },
}

/// Streaming parameters, fixed at process start
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Sample rate of the incoming stream in Hz
    pub sample_rate: u32,
    /// Length of each chunk handed to the separator, in seconds
    pub chunk_duration_secs: f64,
    /// Overlap carried from one chunk into the next, in seconds
    pub overlap_secs: f64,
    /// Maximum frames returned by one pull request
    pub pull_batch_frames: usize,
    /// Sleep between checks while waiting for input, in milliseconds
    pub idle_poll_ms: u64,
    /// Warn when buffered input exceeds this many seconds of audio
    pub backlog_warn_secs: f64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            chunk_duration_secs: 3.0,
            overlap_secs: 0.5,
            pull_batch_frames: DEFAULT_PULL_BATCH_FRAMES,
            idle_poll_ms: 10,
            backlog_warn_secs: 30.0,
        }
    }
}

impl StreamConfig {
    /// Convert durations to frame counts and validate them
    pub fn geometry(&self) -> Result<FrameGeometry, ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::ZeroSampleRate);
        }
        if self.pull_batch_frames == 0 {
            return Err(ConfigError::ZeroPullBatch);
        }

        let chunk_len = secs_to_frames("chunk_duration_secs", self.chunk_duration_secs, self.sample_rate)?;
        let overlap_len = secs_to_frames("overlap_secs", self.overlap_secs, self.sample_rate)?;

        let geometry = FrameGeometry::new(chunk_len, overlap_len)?;

        // A poll as long as the hop stalls the loop for a whole chunk
        let hop_ms = geometry.hop_len() as f64 * 1000.0 / self.sample_rate as f64;
        if self.idle_poll_ms == 0 || self.idle_poll_ms as f64 >= hop_ms {
            return Err(ConfigError::InvalidIdlePoll {
                idle_poll_ms: self.idle_poll_ms,
                hop_ms,
            });
        }

        Ok(geometry)
    }

    /// Idle polling interval of the processing loop
    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }

    /// Backlog warning threshold in frames
    pub fn backlog_warn_frames(&self) -> usize {
        if self.backlog_warn_secs.is_finite() && self.backlog_warn_secs > 0.0 {
            (self.backlog_warn_secs * self.sample_rate as f64) as usize
        } else {
            usize::MAX
        }
    }
}

fn secs_to_frames(name: &'static str, secs: f64, sample_rate: u32) -> Result<usize, ConfigError> {
    if !secs.is_finite() || secs < 0.0 {
        return Err(ConfigError::InvalidDuration { name, value: secs });
    }
    Ok((secs * sample_rate as f64) as usize)
}

/// Chunk layout in frames
///
/// Guarantees `hop_len = chunk_len - overlap_len > 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGeometry {
    chunk_len: usize,
    overlap_len: usize,
}

impl FrameGeometry {
    pub fn new(chunk_len: usize, overlap_len: usize) -> Result<Self, ConfigError> {
        if chunk_len == 0 {
            return Err(ConfigError::EmptyChunk);
        }
        if overlap_len >= chunk_len {
            return Err(ConfigError::NonPositiveHop { chunk_len, overlap_len });
        }
        Ok(Self { chunk_len, overlap_len })
    }

    /// Frames per chunk handed to the separator
    pub fn chunk_len(&self) -> usize {
        self.chunk_len
    }

    /// Frames carried over between consecutive chunks
    pub fn overlap_len(&self) -> usize {
        self.overlap_len
    }

    /// Fresh frames consumed (and produced) per iteration
    pub fn hop_len(&self) -> usize {
        self.chunk_len - self.overlap_len
    }
}
