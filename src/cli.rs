use clap::Parser;
use std::path::PathBuf;

use cadenza::AnalysisConfig;

#[derive(Parser, Debug)]
#[command(name = "cadenza", about = "Tempo, beat and pitch analysis for audio files")]
pub struct Cli {
    /// Input audio files (WAV, MP3, FLAC, OGG, AAC)
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Write JSON here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Pretty-print JSON
    #[arg(long)]
    pub pretty: bool,

    /// Config file (defaults to ./cadenza.toml or the user config dir)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Analysis frame length in samples
    #[arg(long)]
    pub frame_length: Option<usize>,

    /// Hop between frames in samples
    #[arg(long)]
    pub hop_size: Option<usize>,

    /// DFT size (rounded up to a power of two covering the frame)
    #[arg(long)]
    pub fft_size: Option<usize>,

    /// Frame from the first sample instead of centring frames on hop positions
    #[arg(long)]
    pub no_center: bool,

    /// Skip log compression before spectral flux
    #[arg(long)]
    pub no_log_compression: bool,

    /// Gain inside the log compression, ln(1 + gain * magnitude)
    #[arg(long)]
    pub compression_gain: Option<f32>,

    /// Lowest tempo considered (BPM)
    #[arg(long)]
    pub min_bpm: Option<f32>,

    /// Highest tempo considered (BPM)
    #[arg(long)]
    pub max_bpm: Option<f32>,

    /// Centre of the tempo prior (BPM)
    #[arg(long)]
    pub start_bpm: Option<f32>,

    /// Width of the tempo prior in octaves
    #[arg(long)]
    pub prior_width: Option<f32>,

    /// Beat tracker tempo-consistency weight
    #[arg(long)]
    pub tightness: Option<f32>,

    /// Keep weak leading/trailing beats
    #[arg(long)]
    pub no_trim: bool,

    /// Lowest reported pitch (Hz)
    #[arg(long)]
    pub min_pitch: Option<f32>,

    /// Highest reported pitch (Hz)
    #[arg(long)]
    pub max_pitch: Option<f32>,

    /// Minimum share of frame energy in the pitch peak (0.0-1.0)
    #[arg(long)]
    pub pitch_threshold: Option<f32>,
}

impl Cli {
    /// Apply explicitly given flags on top of `base`.
    pub fn apply_overrides(&self, base: &mut AnalysisConfig) {
        if let Some(v) = self.frame_length { base.frame_length = v; }
        if let Some(v) = self.hop_size { base.hop_size = v; }
        if let Some(v) = self.fft_size { base.fft_size = v; }
        if self.no_center { base.center = false; }
        if self.no_log_compression { base.log_compression = false; }
        if let Some(v) = self.compression_gain { base.compression_gain = v; }
        if let Some(v) = self.min_bpm { base.min_bpm = v; }
        if let Some(v) = self.max_bpm { base.max_bpm = v; }
        if let Some(v) = self.start_bpm { base.start_bpm = v; }
        if let Some(v) = self.prior_width { base.prior_width_octaves = v; }
        if let Some(v) = self.tightness { base.tightness = v; }
        if self.no_trim { base.trim_beats = false; }
        if let Some(v) = self.min_pitch { base.min_pitch_hz = v; }
        if let Some(v) = self.max_pitch { base.max_pitch_hz = v; }
        if let Some(v) = self.pitch_threshold { base.pitch_threshold = v; }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_only_when_given() {
        let cli = Cli::parse_from(["cadenza", "song.mp3", "--hop-size", "256", "--no-trim"]);
        let mut config = AnalysisConfig {
            start_bpm: 100.0,
            ..Default::default()
        };
        cli.apply_overrides(&mut config);
        assert_eq!(config.hop_size, 256);
        assert!(!config.trim_beats);
        assert_eq!(config.start_bpm, 100.0);
        assert_eq!(config.frame_length, 2048);
    }

    #[test]
    fn requires_an_input() {
        assert!(Cli::try_parse_from(["cadenza"]).is_err());
    }
}
