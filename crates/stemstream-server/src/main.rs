//! stemstream - streaming vocal-removal server
//!
//! Clients push stereo audio over TCP and pull the separated stream back a
//! few seconds later.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;

use stemstream_core::accumulator::StreamBuffers;
use stemstream_core::engine::ProcessingLoop;
use stemstream_core::separation::TransformAdapter;
use stemstream_core::server::Server;
use stemstream_core::Shutdown;
use stemstream_server::separation::load_backend;
use stemstream_server::{load_config, save_config, Cli, ServerConfig};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    let config_path = cli.config_path();

    if cli.write_default_config {
        return write_default_config(&config_path);
    }

    log::info!("stemstream {} starting up", env!("CARGO_PKG_VERSION"));

    let mut config = load_config(&config_path);
    cli.apply(&mut config);

    let stream = &config.stream;
    let geometry = stream.geometry().context("Invalid stream configuration")?;
    let rate = stream.sample_rate as f64;
    log::info!("Sample rate: {} Hz, {} channels", stream.sample_rate, stemstream_core::CHANNELS);
    log::info!(
        "Chunk: {:.2}s ({} frames), overlap: {:.2}s ({} frames), hop: {:.2}s ({} frames)",
        geometry.chunk_len() as f64 / rate,
        geometry.chunk_len(),
        geometry.overlap_len() as f64 / rate,
        geometry.overlap_len(),
        geometry.hop_len() as f64 / rate,
        geometry.hop_len()
    );
    log::info!("Backend: {}", config.separation.backend.display_name());

    let backend = match load_backend(&config.separation, stream.sample_rate) {
        Ok(backend) => backend,
        Err(e) => {
            log::error!("{}", e);
            bail!("Failed to initialize separation backend");
        }
    };

    let buffers = Arc::new(StreamBuffers::new());
    let shutdown = Shutdown::new();

    let processor = ProcessingLoop::new(
        stream,
        Arc::clone(&buffers),
        TransformAdapter::new(backend),
        shutdown.clone(),
    )?
    .spawn()
    .context("Failed to spawn processing thread")?;

    let server = Server::bind(
        config.server.address(),
        buffers,
        stream.pull_batch_frames,
        shutdown.clone(),
    )?;

    let on_signal = shutdown.clone();
    ctrlc::set_handler(move || {
        log::info!("Interrupt received, shutting down");
        on_signal.trigger();
    })
    .context("Failed to install Ctrl+C handler")?;

    let result = server.run();

    shutdown.trigger();
    if processor.join().is_err() {
        log::error!("Processing thread panicked");
    }

    result?;
    log::info!("Server stopped");
    Ok(())
}

fn write_default_config(path: &Path) -> Result<()> {
    if path.exists() {
        bail!("Refusing to overwrite existing config at {:?}", path);
    }
    save_config(&ServerConfig::default(), path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}
