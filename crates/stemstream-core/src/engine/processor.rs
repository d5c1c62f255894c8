//! Background processing loop
//!
//! A single long-lived thread that moves audio from the input queue through
//! the separator into the output queue. It polls: when less than one hop of
//! input is buffered it sleeps for the idle interval and checks again.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{Receiver, Sender};

use super::stitcher::Stitcher;
use crate::accumulator::StreamBuffers;
use crate::config::{ConfigError, StreamConfig};
use crate::separation::TransformAdapter;
use crate::shutdown::Shutdown;

/// Capacity of the event channel; events are dropped when nobody drains it
const EVENT_CAPACITY: usize = 256;

/// Notifications published by the processing loop
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// One chunk went through the separator and its hop reached the output queue
    ChunkProcessed {
        /// Zero-based chunk index
        index: u64,
        /// Frames appended to the output queue
        frames: usize,
        /// Wall-clock time spent in the separator
        elapsed: Duration,
        /// Input frames still waiting after this chunk was taken
        backlog: usize,
        /// The separator failed and the chunk was passed through
        fallback: bool,
    },
    /// The loop observed shutdown and exited
    Stopped { chunks: u64 },
}

/// The processing loop and everything it owns
pub struct ProcessingLoop {
    buffers: Arc<StreamBuffers>,
    stitcher: Stitcher,
    adapter: TransformAdapter,
    shutdown: Shutdown,
    idle_poll: Duration,
    sample_rate: u32,
    backlog_warn_frames: usize,
    backlog_warned: bool,
    event_tx: Sender<EngineEvent>,
    event_rx: Receiver<EngineEvent>,
}

impl ProcessingLoop {
    /// Create a processing loop for the given stream configuration
    pub fn new(
        config: &StreamConfig,
        buffers: Arc<StreamBuffers>,
        adapter: TransformAdapter,
        shutdown: Shutdown,
    ) -> Result<Self, ConfigError> {
        let geometry = config.geometry()?;
        let (event_tx, event_rx) = crossbeam::channel::bounded(EVENT_CAPACITY);

        Ok(Self {
            buffers,
            stitcher: Stitcher::new(geometry),
            adapter,
            shutdown,
            idle_poll: config.idle_poll(),
            sample_rate: config.sample_rate,
            backlog_warn_frames: config.backlog_warn_frames(),
            backlog_warned: false,
            event_tx,
            event_rx,
        })
    }

    /// Subscribe to engine events
    pub fn events(&self) -> Receiver<EngineEvent> {
        self.event_rx.clone()
    }

    /// Spawn the loop on its own thread
    pub fn spawn(self) -> io::Result<ProcessorHandle> {
        let events = self.events();
        let thread_handle = thread::Builder::new()
            .name("stem-processor".into())
            .spawn(move || self.run())?;

        Ok(ProcessorHandle {
            events,
            thread_handle: Some(thread_handle),
        })
    }

    /// Run until shutdown is triggered
    pub fn run(mut self) {
        let geometry = self.stitcher.geometry();
        log::info!(
            "Processing thread started ({}): chunk {} frames, overlap {}, hop {}",
            self.adapter.backend_name(),
            geometry.chunk_len(),
            geometry.overlap_len(),
            geometry.hop_len()
        );

        while !self.shutdown.is_triggered() {
            if !self.process_next() {
                thread::sleep(self.idle_poll);
            }
        }

        let chunks = self.stitcher.chunks_processed();
        let stats = self.adapter.stats();
        log::info!(
            "Processing thread stopped after {} chunks ({} passed through)",
            chunks,
            stats.fallbacks
        );
        let _ = self.event_tx.try_send(EngineEvent::Stopped { chunks });
    }

    /// Process one chunk if a full hop of input is buffered
    ///
    /// Returns `false` without touching any state when there is not enough input.
    pub fn process_next(&mut self) -> bool {
        let hop_len = self.stitcher.geometry().hop_len();
        let Some(hop) = self.buffers.input.pop_exact(hop_len) else {
            return false;
        };
        let backlog = self.buffers.input.len();
        let index = self.stitcher.chunks_processed();

        let start = Instant::now();
        let adapter = &mut self.adapter;
        let output = self.stitcher.step(&hop, |chunk| adapter.separate(chunk));
        let elapsed = start.elapsed();
        let fallback = self.adapter.last_was_fallback();

        let frames = output.len();
        self.buffers.output.push(&output);

        self.report(index, frames, elapsed, backlog);
        let _ = self.event_tx.try_send(EngineEvent::ChunkProcessed {
            index,
            frames,
            elapsed,
            backlog,
            fallback,
        });
        true
    }

    fn report(&mut self, index: u64, frames: usize, elapsed: Duration, backlog: usize) {
        let rate = self.sample_rate as f64;
        let chunk_secs = self.stitcher.geometry().chunk_len() as f64 / rate;
        let hop_secs = frames as f64 / rate;

        log::debug!(
            "Processed chunk {} ({:.2}s) in {:.2}s (buffer: {:.1}s)",
            index,
            chunk_secs,
            elapsed.as_secs_f64(),
            backlog as f64 / rate
        );

        if elapsed.as_secs_f64() > hop_secs {
            log::warn!(
                "Chunk {} took {:.2}s for {:.2}s of new audio, input is piling up",
                index,
                elapsed.as_secs_f64(),
                hop_secs
            );
        }

        if backlog > self.backlog_warn_frames {
            if !self.backlog_warned {
                log::warn!(
                    "Input backlog at {:.1}s of audio; output is not being pulled fast enough",
                    backlog as f64 / rate
                );
                self.backlog_warned = true;
            }
        } else {
            self.backlog_warned = false;
        }
    }
}

/// Handle to a spawned processing loop
pub struct ProcessorHandle {
    events: Receiver<EngineEvent>,
    thread_handle: Option<JoinHandle<()>>,
}

impl ProcessorHandle {
    /// Engine events published by the loop
    pub fn events(&self) -> &Receiver<EngineEvent> {
        &self.events
    }

    /// Check if the processing thread is still running
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Wait for the thread to exit (trigger shutdown first)
    pub fn join(mut self) -> thread::Result<()> {
        match self.thread_handle.take() {
            Some(handle) => handle.join(),
            None => Ok(()),
        }
    }
}
