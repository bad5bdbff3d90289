use std::borrow::Cow;
use std::sync::atomic::{AtomicBool, Ordering};

use super::features::{frames_to_time, AnalysisResult, Signal};
use super::framer::{center_pad, Framer};
use super::onset::onset_strength;
use super::pitch::PitchTracker;
use super::spectrum::SpectralEngine;
use super::tempo::BeatTracker;
use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, Result};

/// Run the full pipeline on one signal.
pub fn analyze(signal: &Signal, config: &AnalysisConfig) -> Result<AnalysisResult> {
    analyze_with_cancel(signal, config, &AtomicBool::new(false))
}

/// Same as [`analyze`], returning [`AnalysisError::Cancelled`] soon after
/// `cancel` is raised. Nothing is shared between calls.
pub fn analyze_with_cancel(
    signal: &Signal,
    config: &AnalysisConfig,
    cancel: &AtomicBool,
) -> Result<AnalysisResult> {
    run(signal, config, cancel, &mut |stage| log::trace!("Finished {:?}", stage))
}

/// Pipeline stages, reported to the hook of [`run`] as each one completes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Stage {
    Spectrogram,
    Onset,
    Beats,
    Pitch,
}

pub(crate) fn run(
    signal: &Signal,
    config: &AnalysisConfig,
    cancel: &AtomicBool,
    on_stage: &mut dyn FnMut(Stage),
) -> Result<AnalysisResult> {
    config.validate()?;
    if signal.is_empty() {
        return Err(AnalysisError::EmptySignal);
    }

    let sr = signal.sample_rate();
    log::info!(
        "Analyzing {} samples @ {}Hz ({:.2}s)",
        signal.len(),
        sr,
        signal.duration()
    );

    let buffer: Cow<'_, [f32]> = if config.center {
        Cow::Owned(center_pad(signal.samples(), config.frame_length))
    } else {
        Cow::Borrowed(signal.samples())
    };
    let framer = Framer::new(&buffer, config.frame_length, config.hop_size)?;

    log::info!("Pass 1: Spectrogram ({} frames)...", framer.frame_count());
    let engine = SpectralEngine::from_config(config)?;
    let spectrogram = engine.spectrogram(&framer, sr, cancel)?;
    on_stage(Stage::Spectrogram);
    check(cancel)?;

    log::info!("Pass 2: Onset strength & beat tracking...");
    let envelope = onset_strength(&spectrogram, config.log_compression, config.compression_gain);
    on_stage(Stage::Onset);
    check(cancel)?;
    let (tempo, beat_frames) =
        BeatTracker::new(config).beat_track(envelope.as_slice(), spectrogram.frame_rate());

    let duration = signal.duration();
    let beats: Vec<f32> = beat_frames
        .into_iter()
        .map(|f| frames_to_time(f, config.hop_size, sr))
        .filter(|&t| t <= duration)
        .collect();
    on_stage(Stage::Beats);
    check(cancel)?;

    log::info!("Pass 3: Pitch tracking...");
    let pitches = PitchTracker::new(config).track(&spectrogram, cancel)?;
    on_stage(Stage::Pitch);

    if tempo == 0.0 {
        log::warn!("No rhythmic content detected, tempo = 0");
    }
    log::info!(
        "Result: tempo={:.1} BPM, beats={}, pitched frames={}/{}",
        tempo,
        beats.len(),
        pitches.len(),
        spectrogram.len()
    );

    Ok(AnalysisResult {
        tempo,
        beats,
        pitches,
    })
}

fn check(cancel: &AtomicBool) -> Result<()> {
    if cancel.load(Ordering::Relaxed) {
        Err(AnalysisError::Cancelled)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_signal_is_rejected() {
        let signal = Signal::new(Vec::new(), 44100).unwrap();
        assert_eq!(
            analyze(&signal, &AnalysisConfig::default()),
            Err(AnalysisError::EmptySignal)
        );
    }

    #[test]
    fn config_is_checked_before_signal() {
        let signal = Signal::new(Vec::new(), 44100).unwrap();
        let config = AnalysisConfig {
            frame_length: 0,
            ..Default::default()
        };
        assert!(matches!(
            analyze(&signal, &config),
            Err(AnalysisError::InvalidConfig { param: "frame_length", .. })
        ));
    }

    #[test]
    fn clip_shorter_than_a_frame_is_analyzable() {
        let signal = Signal::new(vec![0.25; 300], 44100).unwrap();
        let config = AnalysisConfig {
            center: false,
            ..Default::default()
        };
        let result = analyze(&signal, &config).unwrap();
        assert_eq!(result.tempo, 0.0);
        assert!(result.beats.is_empty());
    }

    #[test]
    fn cancelled_before_start() {
        let signal = Signal::new(vec![0.1; 44100], 44100).unwrap();
        let cancel = AtomicBool::new(true);
        assert_eq!(
            analyze_with_cancel(&signal, &AnalysisConfig::default(), &cancel),
            Err(AnalysisError::Cancelled)
        );
    }

    fn click_signal() -> Signal {
        let sr = 22050;
        let mut samples = vec![0.0f32; sr as usize * 4];
        for beat in 0..8 {
            let start = beat * sr as usize / 2;
            for s in &mut samples[start..start + 64] {
                *s = 0.8;
            }
        }
        Signal::new(samples, sr).unwrap()
    }

    #[test]
    fn cancel_between_stages_stops_the_pipeline() {
        for cancel_after in [Stage::Spectrogram, Stage::Onset, Stage::Beats] {
            let cancel = AtomicBool::new(false);
            let mut seen = Vec::new();
            let result = run(&click_signal(), &AnalysisConfig::default(), &cancel, &mut |stage| {
                seen.push(stage);
                if stage == cancel_after {
                    cancel.store(true, Ordering::Relaxed);
                }
            });
            assert_eq!(result, Err(AnalysisError::Cancelled), "after {:?}", cancel_after);
            assert_eq!(seen.last(), Some(&cancel_after));
            assert!(!seen.contains(&Stage::Pitch));
        }
    }

    #[test]
    fn uncancelled_run_reports_every_stage() {
        let cancel = AtomicBool::new(false);
        let mut seen = Vec::new();
        let result = run(&click_signal(), &AnalysisConfig::default(), &cancel, &mut |stage| {
            seen.push(stage)
        });
        assert!(result.is_ok());
        assert_eq!(
            seen,
            vec![Stage::Spectrogram, Stage::Onset, Stage::Beats, Stage::Pitch]
        );
    }
}
