//! Command line arguments

use std::path::PathBuf;

use clap::Parser;

use crate::config::{default_config_path, ServerConfig};
use crate::separation::BackendType;

#[derive(Parser, Debug)]
#[command(name = "stemstream")]
#[command(author, version, about = "Streaming vocal-removal server", long_about = None)]
pub struct Cli {
    /// Config file (default: ~/.config/stemstream/config.yaml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Skip model loading and stream audio through unchanged
    #[arg(long)]
    pub passthrough: bool,

    /// Directory holding the ONNX models
    #[arg(long)]
    pub model_dir: Option<PathBuf>,

    /// Write the default configuration to the config path and exit
    #[arg(long)]
    pub write_default_config: bool,
}

impl Cli {
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(default_config_path)
    }

    /// Apply command line overrides on top of file values
    pub fn apply(&self, config: &mut ServerConfig) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if self.passthrough {
            config.separation.backend = BackendType::Passthrough;
        }
        if let Some(dir) = &self.model_dir {
            config.separation.model_dir = Some(dir.clone());
        }
    }
}
