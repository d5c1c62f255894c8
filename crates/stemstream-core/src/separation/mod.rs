//! Separation backend seam
//!
//! The processing loop never talks to a model directly. It hands chunks to a
//! [`TransformAdapter`], which wraps whichever [`SeparationBackend`] was
//! initialised at startup and falls back to passthrough when a call fails.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                  TransformAdapter                       │
//! │  • same-length contract check                           │
//! │  • passthrough on error / panic                         │
//! └─────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │              SeparationBackend (trait)                  │
//! │  • separate() - one chunk in, one chunk out             │
//! └─────────────────────────────────────────────────────────┘
//!                              │
//!               ┌──────────────┴──────────────┐
//!               ▼                             ▼
//!   ┌─────────────────────┐        ┌─────────────────────┐
//!   │ PassthroughBackend  │        │     OrtBackend      │
//!   │     (identity)      │        │ (stemstream-server) │
//!   └─────────────────────┘        └─────────────────────┘
//! ```

mod adapter;
mod backend;
mod error;

pub use adapter::{AdapterStats, TransformAdapter};
pub use backend::{PassthroughBackend, SeparationBackend};
pub use error::{Result, SeparationError};
