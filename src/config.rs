use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};

/// Tunables of the analysis pipeline.
///
/// Frame length, hop size and transform size are shared by every stage so that
/// frame indices line up across the spectrogram, onset envelope and pitch track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Samples per analysis frame.
    #[serde(default = "default_frame_length")]
    pub frame_length: usize,
    /// Samples between consecutive frame starts.
    #[serde(default = "default_hop_size")]
    pub hop_size: usize,
    /// Requested DFT size. Rounded up to a power of two no smaller than `frame_length`.
    #[serde(default = "default_fft_size")]
    pub fft_size: usize,
    /// Pad half a frame of zeros at both ends so frame `i` is centred on sample `i * hop_size`.
    #[serde(default = "default_true")]
    pub center: bool,

    /// Apply `ln(1 + gain * |X|)` before spectral differencing.
    #[serde(default = "default_true")]
    pub log_compression: bool,
    #[serde(default = "default_compression_gain")]
    pub compression_gain: f32,

    #[serde(default = "default_min_bpm")]
    pub min_bpm: f32,
    #[serde(default = "default_max_bpm")]
    pub max_bpm: f32,
    /// Centre of the log-normal tempo prior.
    #[serde(default = "default_start_bpm")]
    pub start_bpm: f32,
    /// Standard deviation of the tempo prior, in octaves.
    #[serde(default = "default_prior_width")]
    pub prior_width_octaves: f32,
    /// Weight of the inter-beat interval penalty in the beat tracker.
    #[serde(default = "default_tightness")]
    pub tightness: f32,
    /// Drop weak leading/trailing beats.
    #[serde(default = "default_true")]
    pub trim_beats: bool,

    #[serde(default = "default_min_pitch")]
    pub min_pitch_hz: f32,
    #[serde(default = "default_max_pitch")]
    pub max_pitch_hz: f32,
    /// Minimum share of the frame's spectral energy carried by the peak bin.
    #[serde(default = "default_pitch_threshold")]
    pub pitch_threshold: f32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            frame_length: default_frame_length(),
            hop_size: default_hop_size(),
            fft_size: default_fft_size(),
            center: true,
            log_compression: true,
            compression_gain: default_compression_gain(),
            min_bpm: default_min_bpm(),
            max_bpm: default_max_bpm(),
            start_bpm: default_start_bpm(),
            prior_width_octaves: default_prior_width(),
            tightness: default_tightness(),
            trim_beats: true,
            min_pitch_hz: default_min_pitch(),
            max_pitch_hz: default_max_pitch(),
            pitch_threshold: default_pitch_threshold(),
        }
    }
}

fn default_frame_length() -> usize { 2048 }
fn default_hop_size() -> usize { 512 }
fn default_fft_size() -> usize { 2048 }
fn default_true() -> bool { true }
fn default_compression_gain() -> f32 { 100.0 }
fn default_min_bpm() -> f32 { 40.0 }
fn default_max_bpm() -> f32 { 320.0 }
fn default_start_bpm() -> f32 { 120.0 }
fn default_prior_width() -> f32 { 1.0 }
fn default_tightness() -> f32 { 100.0 }
fn default_min_pitch() -> f32 { 50.0 }
fn default_max_pitch() -> f32 { 5000.0 }
fn default_pitch_threshold() -> f32 { 0.05 }

impl AnalysisConfig {
    /// Effective DFT size used by the spectral engine.
    pub fn transform_size(&self) -> usize {
        self.fft_size.max(self.frame_length).next_power_of_two()
    }

    /// Reject inconsistent settings before any processing happens.
    pub fn validate(&self) -> Result<()> {
        if self.frame_length == 0 {
            return Err(AnalysisError::invalid_config("frame_length", "must be greater than 0"));
        }
        if self.hop_size == 0 {
            return Err(AnalysisError::invalid_config("hop_size", "must be greater than 0"));
        }
        if self.hop_size > self.frame_length {
            return Err(AnalysisError::invalid_config(
                "hop_size",
                format!("must not exceed frame_length ({} > {})", self.hop_size, self.frame_length),
            ));
        }
        if self.fft_size == 0 {
            return Err(AnalysisError::invalid_config("fft_size", "must be greater than 0"));
        }
        positive("compression_gain", self.compression_gain)?;

        positive("min_bpm", self.min_bpm)?;
        positive("max_bpm", self.max_bpm)?;
        if self.min_bpm >= self.max_bpm {
            return Err(AnalysisError::invalid_config(
                "min_bpm",
                format!("must be below max_bpm ({} >= {})", self.min_bpm, self.max_bpm),
            ));
        }
        if !(self.min_bpm..=self.max_bpm).contains(&self.start_bpm) {
            return Err(AnalysisError::invalid_config(
                "start_bpm",
                format!("must lie within [{}, {}], got {}", self.min_bpm, self.max_bpm, self.start_bpm),
            ));
        }
        positive("prior_width_octaves", self.prior_width_octaves)?;
        positive("tightness", self.tightness)?;

        positive("min_pitch_hz", self.min_pitch_hz)?;
        positive("max_pitch_hz", self.max_pitch_hz)?;
        if self.min_pitch_hz >= self.max_pitch_hz {
            return Err(AnalysisError::invalid_config(
                "min_pitch_hz",
                format!("must be below max_pitch_hz ({} >= {})", self.min_pitch_hz, self.max_pitch_hz),
            ));
        }
        if !(0.0..=1.0).contains(&self.pitch_threshold) {
            return Err(AnalysisError::invalid_config(
                "pitch_threshold",
                format!("must lie within [0, 1], got {}", self.pitch_threshold),
            ));
        }
        Ok(())
    }
}

fn positive(param: &'static str, value: f32) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(AnalysisError::invalid_config(param, format!("must be a positive number, got {}", value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AnalysisConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.transform_size(), 2048);
    }

    #[test]
    fn transform_size_covers_frame() {
        let config = AnalysisConfig {
            frame_length: 1500,
            fft_size: 512,
            hop_size: 256,
            ..Default::default()
        };
        assert_eq!(config.transform_size(), 2048);
    }

    #[test]
    fn rejects_zero_frame_length() {
        let config = AnalysisConfig {
            frame_length: 0,
            ..Default::default()
        };
        match config.validate() {
            Err(AnalysisError::InvalidConfig { param, .. }) => assert_eq!(param, "frame_length"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn rejects_hop_larger_than_frame() {
        let config = AnalysisConfig {
            frame_length: 256,
            hop_size: 512,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(AnalysisError::InvalidConfig { param: "hop_size", .. })
        ));
    }

    #[test]
    fn rejects_inverted_ranges() {
        let tempo = AnalysisConfig {
            min_bpm: 200.0,
            max_bpm: 100.0,
            start_bpm: 150.0,
            ..Default::default()
        };
        assert!(matches!(
            tempo.validate(),
            Err(AnalysisError::InvalidConfig { param: "min_bpm", .. })
        ));

        let pitch = AnalysisConfig {
            min_pitch_hz: 5000.0,
            max_pitch_hz: 5000.0,
            ..Default::default()
        };
        assert!(matches!(
            pitch.validate(),
            Err(AnalysisError::InvalidConfig { param: "min_pitch_hz", .. })
        ));
    }

    fn rejected_param(config: AnalysisConfig) -> &'static str {
        match config.validate() {
            Err(AnalysisError::InvalidConfig { param, .. }) => param,
            other => panic!("expected InvalidConfig, got {:?}", other),
        }
    }

    #[test]
    fn rejects_zero_fft_size() {
        let config = AnalysisConfig {
            fft_size: 0,
            ..Default::default()
        };
        assert_eq!(rejected_param(config), "fft_size");
    }

    #[test]
    fn rejects_start_bpm_outside_range() {
        let below = AnalysisConfig {
            start_bpm: 30.0,
            ..Default::default()
        };
        assert_eq!(rejected_param(below), "start_bpm");

        let above = AnalysisConfig {
            start_bpm: 400.0,
            ..Default::default()
        };
        assert_eq!(rejected_param(above), "start_bpm");
    }

    #[test]
    fn rejects_non_positive_or_non_finite_scalars() {
        for bad in [0.0f32, -1.0, f32::NAN, f32::INFINITY] {
            let gain = AnalysisConfig {
                compression_gain: bad,
                ..Default::default()
            };
            assert_eq!(rejected_param(gain), "compression_gain", "gain {}", bad);

            let width = AnalysisConfig {
                prior_width_octaves: bad,
                ..Default::default()
            };
            assert_eq!(rejected_param(width), "prior_width_octaves", "width {}", bad);

            let tightness = AnalysisConfig {
                tightness: bad,
                ..Default::default()
            };
            assert_eq!(rejected_param(tightness), "tightness", "tightness {}", bad);
        }
    }

    #[test]
    fn rejects_bad_tempo_bounds() {
        let min = AnalysisConfig {
            min_bpm: 0.0,
            ..Default::default()
        };
        assert_eq!(rejected_param(min), "min_bpm");

        let max = AnalysisConfig {
            max_bpm: f32::INFINITY,
            ..Default::default()
        };
        assert_eq!(rejected_param(max), "max_bpm");
    }

    #[test]
    fn rejects_bad_pitch_bounds() {
        let min = AnalysisConfig {
            min_pitch_hz: -50.0,
            ..Default::default()
        };
        assert_eq!(rejected_param(min), "min_pitch_hz");

        let max = AnalysisConfig {
            max_pitch_hz: f32::NAN,
            ..Default::default()
        };
        assert_eq!(rejected_param(max), "max_pitch_hz");
    }

    #[test]
    fn rejects_pitch_threshold_outside_unit_interval() {
        for bad in [-0.1f32, 1.5, f32::NAN] {
            let config = AnalysisConfig {
                pitch_threshold: bad,
                ..Default::default()
            };
            assert_eq!(rejected_param(config), "pitch_threshold", "threshold {}", bad);
        }
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = toml::from_str::<AnalysisConfig>("hopsize = 256").unwrap_err();
        assert!(err.to_string().contains("hopsize"), "{}", err);
    }
}
