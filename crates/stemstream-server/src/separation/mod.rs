//! Demucs separation backend
//!
//! ```text
//! SeparationConfig ──► load_backend ──► ModelManager (cache, optional download)
//!                           │
//!                           ├──► OrtBackend (htdemucs, then htdemucs-ft)
//!                           └──► PassthroughBackend
//! ```

mod config;
mod loader;
pub mod mixdown;
mod model;
mod ort_backend;

pub use config::{BackendType, ModelType, SeparationConfig, StemMix};
pub use loader::{first_available, load_backend};
pub use model::ModelManager;
pub use ort_backend::OrtBackend;
