//! Per-client protocol state machine
//!
//! ```text
//! AwaitHeader ──0──────────► Heartbeat ───┐
//!      ▲      ──0xFFFFFFFF─► PullOutput ──┤
//!      │      ──n──────────► ReceiveAudio ┤
//!      └──────────────────────────────────┘
//! ```
//!
//! Any IO error, truncated header or short payload ends the connection.

use std::io::{BufReader, ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;

use crate::accumulator::StreamBuffers;
use crate::protocol::{self, ProtocolError, Request};
use crate::shutdown::Shutdown;

/// Per-connection counters, logged on disconnect
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionStats {
    pub heartbeats: u64,
    pub pulls: u64,
    pub pushes: u64,
    pub frames_pushed: u64,
    pub frames_pulled: u64,
}

/// Serves protocol requests for one client
pub struct ConnectionHandler {
    buffers: Arc<StreamBuffers>,
    pull_batch_frames: usize,
    shutdown: Shutdown,
    stats: ConnectionStats,
}

impl ConnectionHandler {
    pub fn new(buffers: Arc<StreamBuffers>, pull_batch_frames: usize, shutdown: Shutdown) -> Self {
        Self {
            buffers,
            pull_batch_frames,
            shutdown,
            stats: ConnectionStats::default(),
        }
    }

    pub fn stats(&self) -> ConnectionStats {
        self.stats
    }

    /// Serve requests until the peer disconnects or shutdown is triggered
    ///
    /// A clean end of stream between requests returns `Ok(())`.
    pub fn serve<R: Read, W: Write>(&mut self, reader: &mut R, writer: &mut W) -> Result<(), ProtocolError> {
        while !self.shutdown.is_triggered() {
            let Some(request) = protocol::read_request(reader)? else {
                return Ok(());
            };
            self.handle(request, reader, writer)?;
        }
        Ok(())
    }

    /// Handle a single decoded request
    pub fn handle<R: Read, W: Write>(
        &mut self,
        request: Request,
        reader: &mut R,
        writer: &mut W,
    ) -> Result<(), ProtocolError> {
        match request {
            Request::Heartbeat => {
                self.stats.heartbeats += 1;
                let available = self.buffers.output.len();
                protocol::write_count(writer, protocol::wire_count(available))?;
            }
            Request::Pull => {
                let frames = self.buffers.output.pop_up_to(self.pull_batch_frames);
                self.stats.pulls += 1;
                self.stats.frames_pulled += frames.len() as u64;
                protocol::write_frames(writer, &frames)?;
            }
            Request::Push { frames } => {
                // Nothing reaches the input queue unless the whole payload arrived
                let received = protocol::read_frames(reader, frames)?;
                self.buffers.input.push(&received);
                self.stats.pushes += 1;
                self.stats.frames_pushed += received.len() as u64;
                protocol::write_count(writer, frames)?;
            }
        }
        writer.flush()?;
        Ok(())
    }
}

/// Thread body for one accepted TCP connection
pub fn handle_client(stream: TcpStream, peer: SocketAddr, mut handler: ConnectionHandler) {
    log::info!("Client connected: {}", peer);

    let result = match stream.try_clone() {
        Ok(mut writer) => {
            let mut reader = BufReader::new(stream);
            handler.serve(&mut reader, &mut writer)
        }
        Err(e) => Err(ProtocolError::Io(e)),
    };

    let stats = handler.stats();
    match result {
        Ok(()) => {}
        Err(ProtocolError::Io(e))
            if matches!(e.kind(), ErrorKind::ConnectionReset | ErrorKind::BrokenPipe) =>
        {
            log::debug!("Client {} reset the connection", peer);
        }
        Err(e) => log::warn!("Client {} error: {}", peer, e),
    }
    log::info!(
        "Client disconnected: {} (pushed {} frames, pulled {} frames, {} heartbeats)",
        peer,
        stats.frames_pushed,
        stats.frames_pulled,
        stats.heartbeats
    );
}
