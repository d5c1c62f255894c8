//! Stemstream Core - Streaming engine around a batch audio separator
//!
//! Accepts a continuous stereo stream over TCP, cuts it into overlapping
//! chunks, hands each chunk to a slow separation backend and stitches the
//! results back into a continuous stream that clients pull at their own pace.
//!
//! ## Architecture
//!
//! ```text
//!  client ──push──► ConnectionHandler ──► input FrameQueue
//!                                               │
//!                                               ▼
//!                                   ProcessingLoop (1 thread)
//!                                   Stitcher + TransformAdapter
//!                                               │
//!                                               ▼
//!  client ◄──pull── ConnectionHandler ◄── output FrameQueue
//! ```

pub mod accumulator;
pub mod config;
pub mod engine;
pub mod fade;
pub mod protocol;
pub mod separation;
pub mod server;
pub mod shutdown;
pub mod types;

pub use shutdown::Shutdown;
pub use types::*;
