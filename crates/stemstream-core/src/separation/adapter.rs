//! Call boundary between the processing loop and the separation backend

use std::panic::{self, AssertUnwindSafe};

use super::backend::SeparationBackend;
use super::error::SeparationError;
use crate::types::Frame;

/// Lifetime counters of an adapter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdapterStats {
    /// Chunks handed to the adapter
    pub chunks: u64,
    /// Chunks that fell back to passthrough
    pub fallbacks: u64,
}

/// Wraps a backend with the same-length contract and passthrough fallback
///
/// Whatever goes wrong inside the backend (an error, a chunk of the wrong
/// length, a panic) the adapter hands back an unmodified copy of the input so
/// the stream keeps flowing. It never retries.
pub struct TransformAdapter {
    backend: Box<dyn SeparationBackend>,
    stats: AdapterStats,
    last_fallback: bool,
}

impl TransformAdapter {
    pub fn new(backend: impl SeparationBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
            stats: AdapterStats::default(),
            last_fallback: false,
        }
    }

    /// Run the backend on one chunk; the result always has `chunk.len()` frames
    pub fn separate(&mut self, chunk: &[Frame]) -> Vec<Frame> {
        self.stats.chunks += 1;

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.backend.separate(chunk)));
        let result = match outcome {
            Ok(Ok(separated)) if separated.len() == chunk.len() => Ok(separated),
            Ok(Ok(separated)) => Err(SeparationError::LengthMismatch {
                expected: chunk.len(),
                actual: separated.len(),
            }),
            Ok(Err(e)) => Err(e),
            Err(payload) => Err(SeparationError::SeparationFailed(panic_message(payload.as_ref()))),
        };

        match result {
            Ok(separated) => {
                self.last_fallback = false;
                separated
            }
            Err(e) => {
                self.stats.fallbacks += 1;
                self.last_fallback = true;
                log::warn!(
                    "{} failed on chunk {}, passing audio through: {}",
                    self.backend.name(),
                    self.stats.chunks,
                    e
                );
                chunk.to_vec()
            }
        }
    }

    /// Whether the most recent call fell back to passthrough
    pub fn last_was_fallback(&self) -> bool {
        self.last_fallback
    }

    pub fn stats(&self) -> AdapterStats {
        self.stats
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("backend panicked: {}", msg)
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("backend panicked: {}", msg)
    } else {
        "backend panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::separation::{PassthroughBackend, Result};

    /// Inverts polarity, or misbehaves in the configured way
    enum TestBackend {
        Invert,
        Fail,
        Truncate,
        Panic,
    }

    impl SeparationBackend for TestBackend {
        fn separate(&mut self, chunk: &[Frame]) -> Result<Vec<Frame>> {
            match self {
                Self::Invert => Ok(chunk.iter().map(|f| f.scaled(-1.0)).collect()),
                Self::Fail => Err(SeparationError::SeparationFailed("out of memory".into())),
                Self::Truncate => Ok(chunk[1..].to_vec()),
                Self::Panic => panic!("tensor shape"),
            }
        }

        fn name(&self) -> &str {
            "test"
        }
    }

    fn chunk() -> Vec<Frame> {
        (0..8).map(|i| Frame::new(i as f32, 1.0)).collect()
    }

    #[test]
    fn test_successful_call_is_returned() {
        let mut adapter = TransformAdapter::new(TestBackend::Invert);
        let out = adapter.separate(&chunk());
        assert_eq!(out[3], Frame::new(-3.0, -1.0));
        assert!(!adapter.last_was_fallback());
        assert_eq!(adapter.stats(), AdapterStats { chunks: 1, fallbacks: 0 });
    }

    #[test]
    fn test_error_falls_back_to_input() {
        let mut adapter = TransformAdapter::new(TestBackend::Fail);
        assert_eq!(adapter.separate(&chunk()), chunk());
        assert!(adapter.last_was_fallback());
        assert_eq!(adapter.stats().fallbacks, 1);
    }

    #[test]
    fn test_wrong_length_falls_back_to_input() {
        let mut adapter = TransformAdapter::new(TestBackend::Truncate);
        assert_eq!(adapter.separate(&chunk()), chunk());
        assert!(adapter.last_was_fallback());
    }

    #[test]
    fn test_panic_falls_back_and_adapter_stays_usable() {
        let mut adapter = TransformAdapter::new(TestBackend::Panic);
        assert_eq!(adapter.separate(&chunk()), chunk());
        assert_eq!(adapter.separate(&chunk()), chunk());
        assert_eq!(adapter.stats(), AdapterStats { chunks: 2, fallbacks: 2 });
    }

    #[test]
    fn test_passthrough_backend_name() {
        let adapter = TransformAdapter::new(PassthroughBackend);
        assert_eq!(adapter.backend_name(), "passthrough");
    }
}
