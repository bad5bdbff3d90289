use std::borrow::Cow;

use super::features::Frame;
use crate::error::{AnalysisError, Result};

/// Slices a sample buffer into overlapping frames of `frame_length` samples,
/// `hop_size` apart.
///
/// A buffer of at least one frame yields `(len - frame_length) / hop_size + 1`
/// full frames; a shorter buffer yields a single zero-padded frame. Frames are
/// produced lazily and can also be fetched by index for parallel consumers.
#[derive(Clone, Debug)]
pub struct Framer<'a> {
    buffer: &'a [f32],
    frame_length: usize,
    hop_size: usize,
    count: usize,
    next: usize,
}

impl<'a> Framer<'a> {
    pub fn new(buffer: &'a [f32], frame_length: usize, hop_size: usize) -> Result<Self> {
        if frame_length == 0 {
            return Err(AnalysisError::invalid_config("frame_length", "must be greater than 0"));
        }
        if hop_size == 0 {
            return Err(AnalysisError::invalid_config("hop_size", "must be greater than 0"));
        }
        if hop_size > frame_length {
            return Err(AnalysisError::invalid_config(
                "hop_size",
                format!("must not exceed frame_length ({} > {})", hop_size, frame_length),
            ));
        }

        let count = if buffer.len() < frame_length {
            1
        } else {
            (buffer.len() - frame_length) / hop_size + 1
        };

        Ok(Self {
            buffer,
            frame_length,
            hop_size,
            count,
            next: 0,
        })
    }

    /// Total number of frames, independent of iteration progress.
    pub fn frame_count(&self) -> usize {
        self.count
    }

    pub fn frame_length(&self) -> usize {
        self.frame_length
    }

    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    pub fn frame(&self, index: usize) -> Option<Frame<'a>> {
        if index >= self.count {
            return None;
        }
        let start = index * self.hop_size;
        let end = start + self.frame_length;
        let samples = if end <= self.buffer.len() {
            Cow::Borrowed(&self.buffer[start..end])
        } else {
            let mut padded = vec![0.0f32; self.frame_length];
            let tail = &self.buffer[start.min(self.buffer.len())..];
            padded[..tail.len()].copy_from_slice(tail);
            Cow::Owned(padded)
        };
        Some(Frame {
            index,
            start,
            samples,
        })
    }
}

impl<'a> Iterator for Framer<'a> {
    type Item = Frame<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let frame = self.frame(self.next)?;
        self.next += 1;
        Some(frame)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.count - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Framer<'_> {}

/// Pad `frame_length / 2` zeros on both sides so that frame `i` of the padded
/// buffer is centred on sample `i * hop` of the unpadded input.
pub fn center_pad(samples: &[f32], frame_length: usize) -> Vec<f32> {
    let pad = frame_length / 2;
    let mut padded = vec![0.0f32; samples.len() + 2 * pad];
    padded[pad..pad + samples.len()].copy_from_slice(samples);
    padded
}
