//! TCP listener and per-client threads
//!
//! The listener accepts in non-blocking mode and sleeps for a short interval
//! between polls so that a triggered [`Shutdown`] is noticed promptly. Every
//! accepted client gets its own thread running a [`ConnectionHandler`].

mod connection;

pub use connection::{handle_client, ConnectionHandler, ConnectionStats};

use std::fmt;
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thiserror::Error;

use crate::accumulator::StreamBuffers;
use crate::shutdown::Shutdown;

/// Default interval between accept polls
pub const DEFAULT_ACCEPT_POLL: Duration = Duration::from_millis(50);

/// Errors from the listener itself (client errors never surface here)
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Accepts clients and hands them the shared stream buffers
pub struct Server {
    listener: TcpListener,
    buffers: Arc<StreamBuffers>,
    pull_batch_frames: usize,
    shutdown: Shutdown,
    accept_poll: Duration,
}

impl Server {
    /// Bind the listening socket
    pub fn bind<A: ToSocketAddrs + fmt::Display>(
        addr: A,
        buffers: Arc<StreamBuffers>,
        pull_batch_frames: usize,
        shutdown: Shutdown,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(&addr).map_err(|source| ServerError::Bind {
            addr: addr.to_string(),
            source,
        })?;
        listener.set_nonblocking(true)?;

        Ok(Self {
            listener,
            buffers,
            pull_batch_frames,
            shutdown,
            accept_poll: DEFAULT_ACCEPT_POLL,
        })
    }

    /// Override the accept polling interval
    pub fn with_accept_poll(mut self, accept_poll: Duration) -> Self {
        self.accept_poll = accept_poll;
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept clients until shutdown is triggered
    pub fn run(&self) -> Result<(), ServerError> {
        log::info!("Server listening on {}", self.local_addr()?);

        let mut next_client = 0u64;
        while !self.shutdown.is_triggered() {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    next_client += 1;
                    self.spawn_client(stream, peer, next_client);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => thread::sleep(self.accept_poll),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    // Usually transient (e.g. out of file descriptors)
                    log::warn!("Accept failed: {}", e);
                    thread::sleep(self.accept_poll);
                }
            }
        }

        log::info!("Server stopped accepting connections");
        Ok(())
    }

    /// Run the accept loop on a background thread
    pub fn spawn(self) -> io::Result<JoinHandle<Result<(), ServerError>>> {
        thread::Builder::new()
            .name("stem-listener".into())
            .spawn(move || self.run())
    }

    fn spawn_client(&self, stream: TcpStream, peer: SocketAddr, id: u64) {
        // Accepted sockets inherit non-blocking mode on some platforms
        if let Err(e) = stream.set_nonblocking(false) {
            log::warn!("Dropping client {}: {}", peer, e);
            return;
        }
        if let Err(e) = stream.set_nodelay(true) {
            log::debug!("Could not disable Nagle for client {}: {}", peer, e);
        }

        let handler = ConnectionHandler::new(
            Arc::clone(&self.buffers),
            self.pull_batch_frames,
            self.shutdown.clone(),
        );
        let spawned = thread::Builder::new()
            .name(format!("stem-client-{}", id))
            .spawn(move || handle_client(stream, peer, handler));

        if let Err(e) = spawned {
            log::error!("Failed to spawn thread for client {}: {}", peer, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StreamConfig;
    use crate::engine::{EngineEvent, ProcessingLoop, ProcessorHandle};
    use crate::protocol::{decode_frames, encode_frames, HEARTBEAT, PULL};
    use crate::separation::{PassthroughBackend, TransformAdapter};
    use crate::types::Frame;
    use std::io::{Read, Write};

    struct Harness {
        addr: SocketAddr,
        buffers: Arc<StreamBuffers>,
        shutdown: Shutdown,
        processor: ProcessorHandle,
        listener: JoinHandle<Result<(), ServerError>>,
    }

    impl Harness {
        fn start(config: StreamConfig) -> Self {
            let buffers = Arc::new(StreamBuffers::new());
            let shutdown = Shutdown::new();
            let processor = ProcessingLoop::new(
                &config,
                Arc::clone(&buffers),
                TransformAdapter::new(PassthroughBackend),
                shutdown.clone(),
            )
            .unwrap()
            .spawn()
            .unwrap();

            let server = Server::bind(
                "127.0.0.1:0",
                Arc::clone(&buffers),
                config.pull_batch_frames,
                shutdown.clone(),
            )
            .unwrap()
            .with_accept_poll(Duration::from_millis(5));
            let addr = server.local_addr().unwrap();
            let listener = server.spawn().unwrap();

            Self {
                addr,
                buffers,
                shutdown,
                processor,
                listener,
            }
        }

        fn wait_for_chunks(&self, count: usize) {
            for _ in 0..count {
                let event = self
                    .processor
                    .events()
                    .recv_timeout(Duration::from_secs(10))
                    .expect("processing loop stalled");
                assert!(matches!(event, EngineEvent::ChunkProcessed { .. }));
            }
        }

        fn stop(self) {
            self.shutdown.trigger();
            self.listener.join().unwrap().unwrap();
            self.processor.join().unwrap();
        }
    }

    fn read_u32(stream: &mut TcpStream) -> u32 {
        let mut buf = [0u8; 4];
        stream.read_exact(&mut buf).unwrap();
        u32::from_le_bytes(buf)
    }

    fn push(stream: &mut TcpStream, frames: &[Frame]) -> u32 {
        let mut request = (frames.len() as u32).to_le_bytes().to_vec();
        encode_frames(frames, &mut request);
        stream.write_all(&request).unwrap();
        read_u32(stream)
    }

    fn heartbeat(stream: &mut TcpStream) -> u32 {
        stream.write_all(&HEARTBEAT.to_le_bytes()).unwrap();
        read_u32(stream)
    }

    fn pull(stream: &mut TcpStream) -> Vec<Frame> {
        stream.write_all(&PULL.to_le_bytes()).unwrap();
        let count = read_u32(stream) as usize;
        let mut payload = vec![0u8; count * 8];
        stream.read_exact(&mut payload).unwrap();
        decode_frames(&payload)
    }

    fn pull_all(stream: &mut TcpStream, expected: usize) -> Vec<Frame> {
        let mut received = Vec::new();
        while received.len() < expected {
            let batch = pull(stream);
            assert!(batch.len() <= 4096);
            if batch.is_empty() {
                break;
            }
            received.extend(batch);
        }
        received
    }

    #[test]
    fn test_three_hops_of_silence_round_trip() {
        // chunk 2.5s, overlap 0.5s at 44.1kHz: hop = 88200, overlap = 22050
        let harness = Harness::start(StreamConfig {
            chunk_duration_secs: 2.5,
            overlap_secs: 0.5,
            idle_poll_ms: 1,
            ..StreamConfig::default()
        });
        let mut client = TcpStream::connect(harness.addr).unwrap();
        assert_eq!(heartbeat(&mut client), 0);

        let silence = vec![Frame::SILENCE; 88200];
        for _ in 0..3 {
            assert_eq!(push(&mut client, &silence), 88200);
        }
        harness.wait_for_chunks(3);

        assert_eq!(heartbeat(&mut client), 264600);
        let received = pull_all(&mut client, 264600);
        assert_eq!(received.len(), 264600);
        assert!(received.iter().all(Frame::is_silent));
        assert_eq!(heartbeat(&mut client), 0);

        drop(client);
        harness.stop();
    }

    #[test]
    fn test_identity_stream_is_reconstructed_across_clients() {
        // 100 Hz: chunk 40 frames, overlap 10, hop 30
        let harness = Harness::start(StreamConfig {
            sample_rate: 100,
            chunk_duration_secs: 0.4,
            overlap_secs: 0.1,
            idle_poll_ms: 1,
            ..StreamConfig::default()
        });
        let input: Vec<Frame> = (0..300)
            .map(|i| Frame::new(i as f32 / 300.0, -(i as f32) / 300.0))
            .collect();

        let mut producer = TcpStream::connect(harness.addr).unwrap();
        for burst in input.chunks(17) {
            assert_eq!(push(&mut producer, burst) as usize, burst.len());
        }
        harness.wait_for_chunks(10);

        let mut consumer = TcpStream::connect(harness.addr).unwrap();
        let received = pull_all(&mut consumer, input.len());
        assert_eq!(received, input);

        let stats = harness.buffers.input.stats();
        assert_eq!(stats.pushed, 300);
        assert_eq!(stats.popped, 300);
        harness.stop();
    }

    #[test]
    fn test_partial_push_closes_only_that_connection() {
        let harness = Harness::start(StreamConfig {
            idle_poll_ms: 1,
            ..StreamConfig::default()
        });

        let mut bad = TcpStream::connect(harness.addr).unwrap();
        let mut request = 100u32.to_le_bytes().to_vec();
        request.extend_from_slice(&[0u8; 40]);
        bad.write_all(&request).unwrap();
        bad.shutdown(std::net::Shutdown::Write).unwrap();
        let mut rest = Vec::new();
        bad.read_to_end(&mut rest).unwrap();
        assert!(rest.is_empty());

        let mut good = TcpStream::connect(harness.addr).unwrap();
        assert_eq!(heartbeat(&mut good), 0);
        assert_eq!(push(&mut good, &[Frame::mono(0.5); 4]), 4);
        assert_eq!(harness.buffers.input.stats().pushed, 4);
        harness.stop();
    }

    #[test]
    fn test_bind_error_names_address() {
        let shutdown = Shutdown::new();
        let first = Server::bind("127.0.0.1:0", Arc::new(StreamBuffers::new()), 4096, shutdown.clone()).unwrap();
        let addr = first.local_addr().unwrap();
        let second = Server::bind(addr, Arc::new(StreamBuffers::new()), 4096, shutdown);
        assert!(matches!(second, Err(ServerError::Bind { .. })));
    }
}
