//! Fixed-size framing for the wake word detector
//!
//! Capture delivers blocks of whatever size the driver and polling produce.
//! The detector needs exactly `frame_length` samples per call, so blocks are
//! appended to a carry-over buffer and sliced from the front.

use super::capture::{AudioBlock, StreamSpec};
use crate::{Error, Result};

/// Default detector frame length in samples
pub const DEFAULT_FRAME_LENGTH: usize = 512;

/// Exactly one detector frame of mono samples
///
/// Only [`FrameAssembler`] builds frames, so a short frame cannot exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    samples: Vec<i16>,
    sample_rate: u32,
}

impl Frame {
    /// Frame samples
    #[must_use]
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Sample rate of the frame
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of samples (always the assembler's frame length)
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Always false; present for API symmetry with `len`
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Reshapes variable-size audio blocks into detector frames
#[derive(Debug)]
pub struct FrameAssembler {
    frame_length: usize,
    sample_rate: u32,
    buffer: Vec<i16>,
}

impl FrameAssembler {
    /// Create an assembler for `frame_length`-sample frames at `sample_rate`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `frame_length` is zero
    pub fn new(frame_length: usize, sample_rate: u32) -> Result<Self> {
        if frame_length == 0 {
            return Err(Error::Config("frame length must be positive".to_string()));
        }

        Ok(Self {
            frame_length,
            sample_rate,
            buffer: Vec::with_capacity(frame_length * 2),
        })
    }

    /// Check an opened stream against the frames this assembler produces
    ///
    /// Done once per stream, not per block.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] on a channel count or sample rate mismatch
    pub fn check_spec(&self, spec: &StreamSpec) -> Result<()> {
        if spec.channels != 1 {
            return Err(Error::Config(format!(
                "detector needs mono input, stream has {} channels",
                spec.channels
            )));
        }
        if spec.sample_rate != self.sample_rate {
            return Err(Error::Config(format!(
                "detector needs {}Hz input, stream runs at {}Hz",
                self.sample_rate, spec.sample_rate
            )));
        }
        Ok(())
    }

    /// Append a block and return every complete frame, oldest first
    ///
    /// Fewer than `frame_length` samples remain buffered afterwards.
    pub fn push(&mut self, block: AudioBlock) -> Vec<Frame> {
        if block.is_empty() {
            return Vec::new();
        }

        if self.buffer.is_empty() {
            self.buffer = block.into_samples();
        } else {
            self.buffer.extend_from_slice(block.samples());
        }

        let whole = self.buffer.len() - self.buffer.len() % self.frame_length;
        let frames = self.buffer[..whole]
            .chunks_exact(self.frame_length)
            .map(|chunk| Frame {
                samples: chunk.to_vec(),
                sample_rate: self.sample_rate,
            })
            .collect();
        self.buffer.drain(..whole);

        frames
    }

    /// Samples waiting for the next frame
    #[must_use]
    pub fn pending(&self) -> &[i16] {
        &self.buffer
    }

    /// Drop buffered samples
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Samples per emitted frame
    #[must_use]
    pub const fn frame_length(&self) -> usize {
        self.frame_length
    }
}

#[cfg(test)]
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
mod tests {
    use super::*;
    use crate::voice::SAMPLE_RATE;

    fn block(samples: Vec<i16>) -> AudioBlock {
        AudioBlock::new(samples, StreamSpec::mono(SAMPLE_RATE))
    }

    fn ramp(start: i16, len: usize) -> Vec<i16> {
        (0..len).map(|i| start.wrapping_add(i as i16)).collect()
    }

    #[test]
    fn test_zero_frame_length_rejected() {
        assert!(matches!(
            FrameAssembler::new(0, SAMPLE_RATE),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_empty_block_is_noop() {
        let mut assembler = FrameAssembler::new(512, SAMPLE_RATE).unwrap();
        assembler.push(block(ramp(0, 100)));

        let frames = assembler.push(block(Vec::new()));

        assert!(frames.is_empty());
        assert_eq!(assembler.pending(), ramp(0, 100).as_slice());
    }

    #[test]
    fn test_small_blocks_accumulate_to_one_frame() {
        let mut assembler = FrameAssembler::new(512, SAMPLE_RATE).unwrap();

        assert!(assembler.push(block(ramp(0, 100))).is_empty());
        assert!(assembler.push(block(ramp(100, 50))).is_empty());
        let frames = assembler.push(block(ramp(150, 362)));

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].samples(), ramp(0, 512).as_slice());
        assert!(assembler.pending().is_empty());
    }

    #[test]
    fn test_large_block_emits_all_frames_in_order() {
        let mut assembler = FrameAssembler::new(4, SAMPLE_RATE).unwrap();

        let frames = assembler.push(block(ramp(0, 15)));

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].samples(), &[0, 1, 2, 3]);
        assert_eq!(frames[2].samples(), &[8, 9, 10, 11]);
        assert_eq!(assembler.pending(), &[12, 13, 14]);
    }

    #[test]
    fn test_exact_multiple_leaves_empty_buffer() {
        let mut assembler = FrameAssembler::new(512, SAMPLE_RATE).unwrap();
        let sizes = [300, 724, 1000, 24];
        let total: usize = sizes.iter().sum();

        let mut frames = Vec::new();
        let mut next = 0i16;
        for size in sizes {
            frames.extend(assembler.push(block(ramp(next, size))));
            next = next.wrapping_add(size as i16);
        }

        assert_eq!(frames.len(), total / 512);
        assert!(frames.iter().all(|f| f.len() == 512));
        assert!(assembler.pending().is_empty());
    }

    #[test]
    fn test_frames_plus_remainder_reproduce_input() {
        let sizes = [0, 1, 511, 512, 513, 7, 2048, 333, 0, 99];
        let mut assembler = FrameAssembler::new(512, SAMPLE_RATE).unwrap();

        let mut input = Vec::new();
        let mut output = Vec::new();
        let mut next = 0i16;
        for size in sizes {
            let samples = ramp(next, size);
            next = next.wrapping_add(size as i16);
            input.extend_from_slice(&samples);

            for frame in assembler.push(block(samples)) {
                assert_eq!(frame.len(), 512);
                output.extend_from_slice(frame.samples());
            }
            assert!(assembler.pending().len() < 512);
        }
        output.extend_from_slice(assembler.pending());

        assert_eq!(output, input);
    }

    #[test]
    fn test_check_spec() {
        let assembler = FrameAssembler::new(512, SAMPLE_RATE).unwrap();

        assert!(assembler.check_spec(&StreamSpec::mono(SAMPLE_RATE)).is_ok());
        assert!(
            assembler
                .check_spec(&StreamSpec {
                    sample_rate: SAMPLE_RATE,
                    channels: 2
                })
                .is_err()
        );
        assert!(assembler.check_spec(&StreamSpec::mono(44_100)).is_err());
    }
}
