//! Stemstream server: configuration, command line and the Demucs backend
//! that plug into the `stemstream-core` streaming engine.

pub mod cli;
pub mod config;
pub mod separation;

pub use cli::Cli;
pub use config::{load_config, save_config, ServerConfig};
