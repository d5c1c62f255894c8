//! Chunked processing engine
//!
//! [`Stitcher`] holds the overlap-add math, [`ProcessingLoop`] drives it from
//! the input queue on a dedicated thread.

mod processor;
mod stitcher;

pub use processor::{EngineEvent, ProcessingLoop, ProcessorHandle};
pub use stitcher::Stitcher;
