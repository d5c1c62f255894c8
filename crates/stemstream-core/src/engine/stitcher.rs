//! Overlap-add chunk stitching
//!
//! Each step forms a chunk from the carried overlap tail plus one hop of fresh
//! input, transforms it, and emits the part of the result that does not
//! overlap the previous chunk:
//!
//! ```text
//!  input stream   ... |<-- tail -->|<------------- hop ------------->|
//!  input chunk        [  overlap   |            fresh                ]
//!  output chunk       [ faded-in   |            emitted              ]
//!                                   \___ hop_len frames to output ___/
//!  next tail                                          |<-- tail -->|
//! ```
//!
//! The next tail is cut from the *input* chunk, so the separator always sees
//! raw audio at the boundary rather than re-processing its own output.
//!
//! Only the new chunk's lead-in is faded (with `fade_in`), and that region is
//! the one dropped before emission. Nothing is blended against the previous
//! chunk's emitted samples.

use crate::config::FrameGeometry;
use crate::fade::FadeCurve;
use crate::types::Frame;

/// Overlap-add state owned by the processing loop
#[derive(Debug, Clone)]
pub struct Stitcher {
    geometry: FrameGeometry,
    fade: FadeCurve,
    overlap_tail: Vec<Frame>,
    chunks_processed: u64,
}

impl Stitcher {
    /// Start with a silent overlap tail
    pub fn new(geometry: FrameGeometry) -> Self {
        Self {
            fade: FadeCurve::new(geometry.overlap_len()),
            overlap_tail: vec![Frame::SILENCE; geometry.overlap_len()],
            geometry,
            chunks_processed: 0,
        }
    }

    pub fn geometry(&self) -> FrameGeometry {
        self.geometry
    }

    /// Number of completed steps
    pub fn chunks_processed(&self) -> u64 {
        self.chunks_processed
    }

    /// Tail that will seed the next chunk
    pub fn overlap_tail(&self) -> &[Frame] {
        &self.overlap_tail
    }

    /// Build the next input chunk from the carried tail and a fresh hop
    pub fn assemble(&self, hop: &[Frame]) -> Vec<Frame> {
        let mut chunk = Vec::with_capacity(self.geometry.chunk_len());
        chunk.extend_from_slice(&self.overlap_tail);
        chunk.extend_from_slice(hop);
        chunk
    }

    /// Fade in the overlap region of a transformed chunk
    ///
    /// No-op before the first step: there is no previous chunk to fade against.
    pub fn crossfade(&self, output_chunk: &mut [Frame]) {
        if self.chunks_processed == 0 {
            return;
        }
        for (frame, &gain) in output_chunk.iter_mut().zip(self.fade.fade_in()) {
            *frame = frame.scaled(gain);
        }
    }

    /// Run one overlap-add step
    ///
    /// `hop` must hold exactly `hop_len` frames. `transform` receives the full
    /// chunk and must return a chunk of the same length; the processing loop
    /// passes [`TransformAdapter::separate`](crate::separation::TransformAdapter::separate),
    /// which guarantees it. Returns the `hop_len` frames to append to the
    /// output stream.
    pub fn step<F>(&mut self, hop: &[Frame], transform: F) -> Vec<Frame>
    where
        F: FnOnce(&[Frame]) -> Vec<Frame>,
    {
        debug_assert_eq!(hop.len(), self.geometry.hop_len());

        let overlap_len = self.geometry.overlap_len();
        let input_chunk = self.assemble(hop);

        let mut output_chunk = transform(&input_chunk);
        debug_assert_eq!(output_chunk.len(), input_chunk.len());

        self.crossfade(&mut output_chunk);

        self.overlap_tail.clear();
        self.overlap_tail
            .extend_from_slice(&input_chunk[input_chunk.len() - overlap_len..]);

        output_chunk.drain(..overlap_len);
        self.chunks_processed += 1;
        output_chunk
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(start: usize, len: usize) -> Vec<Frame> {
        (start..start + len)
            .map(|i| Frame::new(i as f32, -(i as f32)))
            .collect()
    }

    fn geometry(chunk_len: usize, overlap_len: usize) -> FrameGeometry {
        FrameGeometry::new(chunk_len, overlap_len).unwrap()
    }

    #[test]
    fn test_first_chunk_is_seeded_with_silence() {
        let mut stitcher = Stitcher::new(geometry(10, 4));
        let mut seen = Vec::new();
        let out = stitcher.step(&ramp(1, 6), |chunk| {
            seen = chunk.to_vec();
            chunk.to_vec()
        });

        assert_eq!(seen.len(), 10);
        assert!(seen[..4].iter().all(Frame::is_silent));
        assert_eq!(&seen[4..], ramp(1, 6).as_slice());
        assert_eq!(out, ramp(1, 6));
    }

    #[test]
    fn test_tail_comes_from_input_not_output() {
        let mut stitcher = Stitcher::new(geometry(10, 4));
        stitcher.step(&ramp(0, 6), |chunk| vec![Frame::mono(9.0); chunk.len()]);
        assert_eq!(stitcher.overlap_tail(), ramp(2, 4).as_slice());

        let mut seen = Vec::new();
        stitcher.step(&ramp(6, 6), |chunk| {
            seen = chunk.to_vec();
            chunk.to_vec()
        });
        assert_eq!(seen, ramp(2, 10));
    }

    #[test]
    fn test_each_step_emits_one_hop() {
        let mut stitcher = Stitcher::new(geometry(7, 3));
        for i in 0..5 {
            let out = stitcher.step(&ramp(i * 4, 4), |chunk| chunk.to_vec());
            assert_eq!(out.len(), 4);
        }
        assert_eq!(stitcher.chunks_processed(), 5);
    }

    #[test]
    fn test_identity_reconstructs_input() {
        let mut stitcher = Stitcher::new(geometry(12, 5));
        let input = ramp(1, 7 * 6);
        let mut output = Vec::new();
        for hop in input.chunks(7) {
            output.extend(stitcher.step(hop, |chunk| chunk.to_vec()));
        }
        assert_eq!(output, input);
    }

    #[test]
    fn test_fade_touches_only_the_lead_in_after_first_chunk() {
        let mut stitcher = Stitcher::new(geometry(6, 3));

        let mut untouched = vec![Frame::mono(1.0); 6];
        stitcher.crossfade(&mut untouched);
        assert_eq!(untouched, vec![Frame::mono(1.0); 6]);

        stitcher.step(&ramp(0, 3), |chunk| chunk.to_vec());

        let mut faded = vec![Frame::new(2.0, -2.0); 6];
        stitcher.crossfade(&mut faded);
        assert_eq!(faded[0], Frame::new(0.0, 0.0));
        assert_eq!(faded[1], Frame::new(1.0, -1.0));
        assert_eq!(faded[2], Frame::new(2.0, -2.0));
        assert_eq!(&faded[3..], &[Frame::new(2.0, -2.0); 3]);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic]
    fn test_wrong_length_transform_is_a_contract_violation() {
        let mut stitcher = Stitcher::new(geometry(8, 2));
        stitcher.step(&ramp(5, 6), |chunk| chunk[..3].to_vec());
    }

    #[test]
    fn test_zero_overlap() {
        let mut stitcher = Stitcher::new(geometry(4, 0));
        let out = stitcher.step(&ramp(0, 4), |chunk| chunk.to_vec());
        assert_eq!(out, ramp(0, 4));
        assert!(stitcher.overlap_tail().is_empty());
    }

    #[test]
    fn test_single_frame_overlap() {
        let mut stitcher = Stitcher::new(geometry(4, 1));
        let mut output = Vec::new();
        for hop in ramp(0, 9).chunks(3) {
            output.extend(stitcher.step(hop, |chunk| chunk.to_vec()));
        }
        assert_eq!(output, ramp(0, 9));
    }
}
