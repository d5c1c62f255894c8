//! Thread-safe frame FIFOs between the network and the processing loop
//!
//! Both the input and the output side use the same [`FrameQueue`]. Each queue
//! has its own mutex so ingest and delivery never contend with each other.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::types::Frame;

/// Lifetime counters of a queue
///
/// `pushed - popped == len` at every point where the lock is released.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Frames ever appended
    pub pushed: u64,
    /// Frames ever removed
    pub popped: u64,
}

#[derive(Debug, Default)]
struct QueueState {
    frames: VecDeque<Frame>,
    stats: QueueStats,
}

/// Unbounded FIFO of frames guarded by a mutex
#[derive(Debug, Default)]
pub struct FrameQueue {
    state: Mutex<QueueState>,
}

impl FrameQueue {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave the deque half-updated,
    // so a poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append frames at the tail
    pub fn push(&self, frames: &[Frame]) {
        let mut state = self.lock();
        state.frames.extend(frames.iter().copied());
        state.stats.pushed += frames.len() as u64;
    }

    /// Remove exactly `n` frames from the head
    ///
    /// The length check and the removal happen under one lock acquisition.
    /// Returns `None` and leaves the queue untouched when fewer than `n`
    /// frames are buffered.
    pub fn pop_exact(&self, n: usize) -> Option<Vec<Frame>> {
        let mut state = self.lock();
        if state.frames.len() < n {
            return None;
        }
        let popped: Vec<Frame> = state.frames.drain(..n).collect();
        state.stats.popped += n as u64;
        Some(popped)
    }

    /// Remove up to `n` frames from the head (possibly none)
    pub fn pop_up_to(&self, n: usize) -> Vec<Frame> {
        let mut state = self.lock();
        let take = n.min(state.frames.len());
        let popped: Vec<Frame> = state.frames.drain(..take).collect();
        state.stats.popped += take as u64;
        popped
    }

    /// Number of buffered frames
    pub fn len(&self) -> usize {
        self.lock().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().frames.is_empty()
    }

    /// Snapshot of the lifetime counters
    pub fn stats(&self) -> QueueStats {
        self.lock().stats
    }
}

/// The two queues shared by connection handlers and the processing loop
#[derive(Debug, Default)]
pub struct StreamBuffers {
    /// Frames received from clients, waiting to be processed
    pub input: FrameQueue,
    /// Processed frames waiting to be pulled
    pub output: FrameQueue,
}

impl StreamBuffers {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn ramp(start: usize, len: usize) -> Vec<Frame> {
        (start..start + len).map(|i| Frame::mono(i as f32)).collect()
    }

    #[test]
    fn test_fifo_order() {
        let queue = FrameQueue::new();
        queue.push(&ramp(0, 3));
        queue.push(&ramp(3, 2));
        assert_eq!(queue.len(), 5);
        assert_eq!(queue.pop_up_to(10), ramp(0, 5));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_pop_exact_requires_enough_frames() {
        let queue = FrameQueue::new();
        queue.push(&ramp(0, 4));

        assert!(queue.pop_exact(5).is_none());
        assert_eq!(queue.len(), 4);

        assert_eq!(queue.pop_exact(3), Some(ramp(0, 3)));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop_exact(0), Some(Vec::new()));
    }

    #[test]
    fn test_pop_up_to_is_opportunistic() {
        let queue = FrameQueue::new();
        assert!(queue.pop_up_to(4096).is_empty());

        queue.push(&ramp(0, 10));
        assert_eq!(queue.pop_up_to(4).len(), 4);
        assert_eq!(queue.pop_up_to(4096), ramp(4, 6));
    }

    #[test]
    fn test_stats_conservation() {
        let queue = FrameQueue::new();
        queue.push(&ramp(0, 100));
        queue.pop_exact(30);
        queue.pop_up_to(25);
        let stats = queue.stats();
        assert_eq!(stats.pushed, 100);
        assert_eq!(stats.popped, 55);
        assert_eq!(stats.pushed - stats.popped, queue.len() as u64);
    }

    #[test]
    fn test_concurrent_producer_consumer() {
        let queue = Arc::new(FrameQueue::new());
        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for block in 0..100 {
                    queue.push(&ramp(block * 10, 10));
                }
            })
        };

        let mut received = Vec::new();
        while received.len() < 1000 {
            if let Some(frames) = queue.pop_exact(10) {
                received.extend(frames);
            } else {
                thread::yield_now();
            }
        }
        producer.join().unwrap();

        assert_eq!(received, ramp(0, 1000));
        assert_eq!(queue.stats().popped, 1000);
    }
}
