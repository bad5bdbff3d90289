use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};

use super::features::{PitchPoint, Spectrogram, Spectrum};
use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, Result};

const LOG_FLOOR: f32 = 1e-12;

/// Dominant-peak pitch estimation, one candidate per frame.
#[derive(Clone, Debug)]
pub struct PitchTracker {
    min_hz: f32,
    max_hz: f32,
    threshold: f32,
}

impl PitchTracker {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            min_hz: config.min_pitch_hz,
            max_hz: config.max_pitch_hz,
            threshold: config.pitch_threshold,
        }
    }

    /// Pitch candidates for every frame, computed in parallel. Frames that
    /// fail the energy gate are dropped, so timestamps stay strictly increasing.
    pub fn track(&self, spectrogram: &Spectrogram, cancel: &AtomicBool) -> Result<Vec<PitchPoint>> {
        let candidates = spectrogram
            .frames
            .par_iter()
            .enumerate()
            .map(|(i, spectrum)| {
                if cancel.load(Ordering::Relaxed) {
                    return Err(AnalysisError::Cancelled);
                }
                Ok(self
                    .peak_frequency(spectrum, spectrogram.sample_rate, spectrogram.transform_size)
                    .map(|pitch| PitchPoint {
                        time: spectrogram.frame_time(i),
                        pitch,
                    }))
            })
            .collect::<Result<Vec<Option<PitchPoint>>>>()?;

        let total = candidates.len();
        let track: Vec<PitchPoint> = candidates.into_iter().flatten().collect();
        log::debug!("Pitch track: {}/{} frames voiced", track.len(), total);
        Ok(track)
    }

    /// Frequency of the strongest bin within the pitch range, refined by a
    /// parabola through the log magnitudes of the bin and its neighbours.
    ///
    /// Returns `None` when the peak's energy is below `threshold` times the
    /// frame's total spectral energy, or when the refined frequency leaves
    /// the configured range.
    pub fn peak_frequency(&self, spectrum: &Spectrum, sample_rate: u32, transform_size: usize) -> Option<f32> {
        let mags = &spectrum.magnitudes;
        if mags.is_empty() || sample_rate == 0 || transform_size == 0 {
            return None;
        }
        let bin_hz = sample_rate as f32 / transform_size as f32;
        let lo = (self.min_hz / bin_hz).ceil() as usize;
        let hi = ((self.max_hz / bin_hz).floor() as usize).min(mags.len() - 1);
        if lo > hi {
            return None;
        }

        let total: f32 = mags.iter().map(|&m| m * m).sum();
        if !(total > LOG_FLOOR) {
            return None;
        }

        let mut k = lo;
        for bin in lo..=hi {
            if mags[bin] > mags[k] {
                k = bin;
            }
        }
        let peak = mags[k];
        if peak * peak < self.threshold * total {
            return None;
        }

        let offset = if k > 0 && k + 1 < mags.len() {
            let alpha = (mags[k - 1] + LOG_FLOOR).ln();
            let beta = (peak + LOG_FLOOR).ln();
            let gamma = (mags[k + 1] + LOG_FLOOR).ln();
            let denom = alpha - 2.0 * beta + gamma;
            if denom < 0.0 {
                (0.5 * (alpha - gamma) / denom).clamp(-0.5, 0.5)
            } else {
                0.0
            }
        } else {
            0.0
        };

        let freq = (k as f32 + offset) * bin_hz;
        (freq >= self.min_hz && freq <= self.max_hz && freq > 0.0).then_some(freq)
    }
}
