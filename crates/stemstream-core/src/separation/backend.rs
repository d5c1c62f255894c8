//! Separation backend trait and the identity implementation

use super::error::Result;
use crate::types::Frame;

/// Trait for chunk-level separation engines
///
/// A backend receives one complete chunk and must return a chunk of exactly
/// the same length. Calls are independent: a backend is not expected to carry
/// any state from one chunk to the next. Calls may block for longer than the
/// audio they represent.
///
/// ## Implementing a New Backend
///
/// ```ignore
/// struct MyBackend { session: Session }
///
/// impl SeparationBackend for MyBackend {
///     fn separate(&mut self, chunk: &[Frame]) -> Result<Vec<Frame>> {
///         // 1. Convert frames to the engine's tensor layout
///         // 2. Run inference
///         // 3. Convert back to frames of the same length
///     }
///
///     fn name(&self) -> &str { "my-backend" }
/// }
/// ```
pub trait SeparationBackend: Send {
    /// Separate one chunk
    fn separate(&mut self, chunk: &[Frame]) -> Result<Vec<Frame>>;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Backend that returns its input unchanged
///
/// Used when no model is configured and to exercise the streaming pipeline
/// without an inference runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughBackend;

impl SeparationBackend for PassthroughBackend {
    fn separate(&mut self, chunk: &[Frame]) -> Result<Vec<Frame>> {
        Ok(chunk.to_vec())
    }

    fn name(&self) -> &str {
        "passthrough"
    }
}

impl<B: SeparationBackend + ?Sized> SeparationBackend for Box<B> {
    fn separate(&mut self, chunk: &[Frame]) -> Result<Vec<Frame>> {
        (**self).separate(chunk)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
