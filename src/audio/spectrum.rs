use rayon::prelude::*;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::features::{Spectrogram, Spectrum};
use super::framer::Framer;
use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, Result};

/// Windowed DFT magnitude analysis.
///
/// Frames are multiplied by a periodic Hann window of `frame_length` samples,
/// zero-padded to a power-of-two transform size and transformed with a
/// planned rustfft kernel. The plan is shared across rayon workers; each call
/// uses its own buffers.
pub struct SpectralEngine {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    transform_size: usize,
}

impl SpectralEngine {
    /// Engine for the frame length and effective transform size of `config`.
    pub fn from_config(config: &AnalysisConfig) -> Result<Self> {
        Self::new(config.frame_length, config.transform_size())
    }

    /// `transform_size` must be a power of two no smaller than `frame_length`.
    pub fn new(frame_length: usize, transform_size: usize) -> Result<Self> {
        if frame_length == 0 {
            return Err(AnalysisError::invalid_config("frame_length", "must be greater than 0"));
        }
        if !transform_size.is_power_of_two() || transform_size < frame_length {
            return Err(AnalysisError::invalid_config(
                "fft_size",
                format!(
                    "transform size {} must be a power of two covering the frame ({})",
                    transform_size, frame_length
                ),
            ));
        }

        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(transform_size);

        Ok(Self {
            fft,
            window: hann_window(frame_length),
            transform_size,
        })
    }

    pub fn transform_size(&self) -> usize {
        self.transform_size
    }

    /// Number of bins in every spectrum this engine produces.
    pub fn bins(&self) -> usize {
        self.transform_size / 2 + 1
    }

    /// Magnitude spectrum of one frame. Samples beyond the window length are ignored.
    pub fn transform(&self, frame: &[f32]) -> Spectrum {
        let mut buffer = vec![Complex::new(0.0f32, 0.0); self.transform_size];
        for ((slot, &s), &w) in buffer.iter_mut().zip(frame.iter()).zip(self.window.iter()) {
            *slot = Complex::new(s * w, 0.0);
        }
        self.fft.process(&mut buffer);

        let magnitudes = buffer[..self.bins()]
            .iter()
            .map(|c| {
                let m = c.norm();
                if m.is_finite() { m } else { 0.0 }
            })
            .collect();

        Spectrum { magnitudes }
    }

    /// Transform every frame in parallel. Checks `cancel` before each frame.
    pub fn spectrogram(
        &self,
        framer: &Framer<'_>,
        sample_rate: u32,
        cancel: &AtomicBool,
    ) -> Result<Spectrogram> {
        let frames = (0..framer.frame_count())
            .into_par_iter()
            .map(|i| {
                if cancel.load(Ordering::Relaxed) {
                    return Err(AnalysisError::Cancelled);
                }
                Ok(match framer.frame(i) {
                    Some(frame) => self.transform(&frame.samples),
                    None => Spectrum { magnitudes: vec![0.0; self.bins()] },
                })
            })
            .collect::<Result<Vec<Spectrum>>>()?;

        log::debug!(
            "Spectrogram: {} frames x {} bins (transform size {})",
            frames.len(),
            self.bins(),
            self.transform_size
        );

        Ok(Spectrogram {
            frames,
            transform_size: self.transform_size,
            hop_size: framer.hop_size(),
            sample_rate,
        })
    }
}

/// Periodic Hann window: `0.5 * (1 - cos(2πi / N))`.
pub fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / size as f32).cos())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: f32, n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn zero_frame_gives_zero_spectrum() {
        let engine = SpectralEngine::new(1024, 1024).unwrap();
        let spectrum = engine.transform(&vec![0.0; 1024]);
        assert_eq!(spectrum.len(), 513);
        assert!(spectrum.magnitudes.iter().all(|&m| m == 0.0));
    }

    #[test]
    fn pads_to_power_of_two() {
        let config = AnalysisConfig {
            frame_length: 1000,
            hop_size: 500,
            fft_size: 1000,
            ..Default::default()
        };
        let engine = SpectralEngine::from_config(&config).unwrap();
        assert_eq!(engine.transform_size(), 1024);
        assert_eq!(engine.transform_size(), config.transform_size());
        assert_eq!(engine.transform(&vec![0.5; 1000]).len(), 513);
    }

    #[test]
    fn rejects_transform_that_is_not_a_covering_power_of_two() {
        for (frame_length, transform_size) in [(1000, 1000), (1024, 512), (256, 0)] {
            assert!(
                matches!(
                    SpectralEngine::new(frame_length, transform_size),
                    Err(AnalysisError::InvalidConfig { param: "fft_size", .. })
                ),
                "accepted {} / {}",
                frame_length,
                transform_size
            );
        }
    }

    #[test]
    fn sine_peaks_at_its_bin() {
        // 16 cycles per 1024 samples lands exactly on bin 16
        let engine = SpectralEngine::new(1024, 1024).unwrap();
        let spectrum = engine.transform(&sine(16.0 * 8000.0 / 1024.0, 8000.0, 1024));
        let peak = spectrum
            .magnitudes
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, 16);
        assert!(spectrum.magnitudes.iter().all(|m| m.is_finite() && *m >= 0.0));
    }

    #[test]
    fn transform_is_deterministic() {
        let engine = SpectralEngine::new(512, 512).unwrap();
        let frame = sine(440.0, 8000.0, 512);
        assert_eq!(engine.transform(&frame), engine.transform(&frame));
    }

    #[test]
    fn spectrogram_honours_cancellation() {
        let engine = SpectralEngine::new(256, 256).unwrap();
        let samples = vec![0.1f32; 4096];
        let framer = Framer::new(&samples, 256, 128).unwrap();
        let cancel = AtomicBool::new(true);
        assert!(matches!(
            engine.spectrogram(&framer, 8000, &cancel),
            Err(AnalysisError::Cancelled)
        ));

        let cancel = AtomicBool::new(false);
        let spectrogram = engine.spectrogram(&framer, 8000, &cancel).unwrap();
        assert_eq!(spectrogram.len(), framer.frame_count());
        assert_eq!(spectrogram.hop_size, 128);
    }

    #[test]
    fn hann_is_zero_at_start_and_one_in_middle() {
        let w = hann_window(8);
        assert_eq!(w[0], 0.0);
        assert!((w[4] - 1.0).abs() < 1e-6);
    }
}
