//! Tempo, beat and pitch extraction from mono PCM audio.
//!
//! The pipeline frames the signal, builds a Hann-windowed magnitude
//! spectrogram, derives a spectral-flux onset envelope for tempo and
//! dynamic-programming beat tracking, and picks one dominant spectral peak per
//! frame for the pitch contour.

pub mod audio;
pub mod config;
pub mod error;

pub use audio::analysis::{analyze, analyze_with_cancel};
pub use audio::features::{AnalysisResult, PitchPoint, Signal};
pub use config::AnalysisConfig;
pub use error::AnalysisError;
