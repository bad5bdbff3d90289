use serde::Serialize;
use std::borrow::Cow;

use crate::error::{AnalysisError, Result};

/// Mono PCM samples plus their sample rate. Immutable once constructed.
#[derive(Clone, Debug)]
pub struct Signal {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl Signal {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(AnalysisError::InvalidSignal("sample rate must be greater than 0".into()));
        }
        if let Some(pos) = samples.iter().position(|s| !s.is_finite()) {
            return Err(AnalysisError::InvalidSignal(format!(
                "sample {} is not finite ({})",
                pos, samples[pos]
            )));
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// A fixed-length window of samples. Borrowed when it lies fully inside the
/// signal, owned and zero-padded otherwise.
#[derive(Clone, Debug)]
pub struct Frame<'a> {
    pub index: usize,
    /// Index of the first sample in the framed buffer.
    pub start: usize,
    pub samples: Cow<'a, [f32]>,
}

/// Magnitude spectrum of one frame: `transform_size / 2 + 1` bins.
#[derive(Clone, Debug, PartialEq)]
pub struct Spectrum {
    pub magnitudes: Vec<f32>,
}

impl Spectrum {
    pub fn len(&self) -> usize {
        self.magnitudes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.magnitudes.is_empty()
    }
}

/// Time-ordered spectra plus the geometry needed to map bins and frames back
/// to Hz and seconds.
#[derive(Clone, Debug)]
pub struct Spectrogram {
    pub frames: Vec<Spectrum>,
    pub transform_size: usize,
    pub hop_size: usize,
    pub sample_rate: u32,
}

impl Spectrogram {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Centre frequency of `bin` in Hz.
    pub fn bin_frequency(&self, bin: f32) -> f32 {
        bin * self.sample_rate as f32 / self.transform_size as f32
    }

    /// Frames per second.
    pub fn frame_rate(&self) -> f32 {
        self.sample_rate as f32 / self.hop_size as f32
    }

    pub fn frame_time(&self, frame: usize) -> f32 {
        frames_to_time(frame, self.hop_size, self.sample_rate)
    }
}

/// One non-negative onset strength value per frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OnsetEnvelope {
    pub values: Vec<f32>,
}

impl OnsetEnvelope {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PitchPoint {
    /// Seconds.
    pub time: f32,
    /// Hz, always > 0.
    pub pitch: f32,
}

/// Final output of one analysis request.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AnalysisResult {
    /// Beats per minute, 0 when no tempo could be found.
    pub tempo: f32,
    /// Strictly increasing beat times in seconds.
    pub beats: Vec<f32>,
    pub pitches: Vec<PitchPoint>,
}

pub fn frames_to_time(frame: usize, hop_size: usize, sample_rate: u32) -> f32 {
    (frame as f64 * hop_size as f64 / sample_rate as f64) as f32
}
