use rayon::prelude::*;

use crate::config::AnalysisConfig;

/// Global tempo estimation and dynamic-programming beat placement over an
/// onset envelope.
#[derive(Clone, Debug)]
pub struct BeatTracker {
    min_bpm: f32,
    max_bpm: f32,
    start_bpm: f32,
    prior_width_octaves: f32,
    tightness: f32,
    trim: bool,
}

impl BeatTracker {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            min_bpm: config.min_bpm,
            max_bpm: config.max_bpm,
            start_bpm: config.start_bpm,
            prior_width_octaves: config.prior_width_octaves,
            tightness: config.tightness,
            trim: config.trim_beats,
        }
    }

    /// Tempo in BPM and beat positions as frame indices.
    pub fn beat_track(&self, onset_envelope: &[f32], frame_rate: f32) -> (f32, Vec<usize>) {
        let tempo = self.estimate_tempo(onset_envelope, frame_rate);
        let beats = self.track_beats(onset_envelope, frame_rate, tempo);
        (tempo, beats)
    }

    /// Estimate the global tempo from the autocorrelation of the onset
    /// envelope, weighted by a log-normal prior centred on `start_bpm`.
    ///
    /// Returns 0 for envelopes shorter than two frames or without any onset
    /// energy. When no lag in range shows positive correlation the prior's
    /// centre is returned.
    pub fn estimate_tempo(&self, onset_envelope: &[f32], frame_rate: f32) -> f32 {
        let n = onset_envelope.len();
        if n < 2 || !(frame_rate > 0.0) {
            return 0.0;
        }
        let peak = onset_envelope.iter().copied().fold(0.0f32, f32::max);
        if !(peak > 1e-10) {
            log::debug!("Onset envelope carries no energy, tempo = 0");
            return 0.0;
        }

        // Subtract mean to remove DC bias
        let mean = onset_envelope.iter().sum::<f32>() / n as f32;
        let centered: Vec<f32> = onset_envelope.iter().map(|&x| x - mean).collect();
        let energy: f32 = centered.iter().map(|&x| x * x).sum();

        let min_lag = ((60.0 * frame_rate / self.max_bpm).ceil() as usize).max(1);
        let max_lag = ((60.0 * frame_rate / self.min_bpm).floor() as usize).min(n - 1);
        if min_lag > max_lag || energy < 1e-10 {
            log::debug!(
                "No usable lag range ({}..={}) for {} frames, falling back to {} BPM",
                min_lag, max_lag, n, self.start_bpm
            );
            return self.start_bpm;
        }

        let scores: Vec<f32> = (min_lag..=max_lag)
            .into_par_iter()
            .map(|lag| {
                let corr = centered[..n - lag]
                    .iter()
                    .zip(centered[lag..].iter())
                    .map(|(&a, &b)| a * b)
                    .sum::<f32>()
                    / energy;
                corr * self.prior_weight(lag_to_bpm(lag as f32, frame_rate))
            })
            .collect();

        // Ties resolve to the shortest lag
        let mut best = 0;
        for (i, &s) in scores.iter().enumerate() {
            if s > scores[best] {
                best = i;
            }
        }
        if !(scores[best] > 0.0) {
            log::debug!("No periodicity found, falling back to {} BPM", self.start_bpm);
            return self.start_bpm;
        }

        // Parabolic interpolation around the peak for sub-frame precision
        let offset = if best > 0 && best + 1 < scores.len() {
            let (a, b, c) = (scores[best - 1], scores[best], scores[best + 1]);
            let denom = a - 2.0 * b + c;
            if denom < -1e-12 {
                (0.5 * (a - c) / denom).clamp(-0.5, 0.5)
            } else {
                0.0
            }
        } else {
            0.0
        };

        let lag = (min_lag + best) as f32 + offset;
        let bpm = lag_to_bpm(lag, frame_rate).clamp(self.min_bpm, self.max_bpm);
        log::debug!(
            "Tempo: lag {:.2} frames (range {}..={}), score {:.4}, {:.2} BPM",
            lag, min_lag, max_lag, scores[best], bpm
        );
        bpm
    }

    /// Log-normal prior over tempo: Gaussian in log2(bpm) around `start_bpm`.
    fn prior_weight(&self, bpm: f32) -> f32 {
        let octaves = (bpm / self.start_bpm).log2() / self.prior_width_octaves;
        (-0.5 * octaves * octaves).exp()
    }

    /// Place beats by dynamic programming.
    ///
    /// Each frame's cumulative score is its smoothed onset strength plus the
    /// best predecessor score minus `tightness * ln(interval / period)^2`,
    /// searched over predecessors between half and twice the beat period
    /// back. The beat sequence is recovered by backtracking from the frame
    /// with the highest cumulative score.
    pub fn track_beats(&self, onset_envelope: &[f32], frame_rate: f32, bpm: f32) -> Vec<usize> {
        let n = onset_envelope.len();
        if n < 2 || !(bpm > 0.0) || !(frame_rate > 0.0) {
            return Vec::new();
        }
        let period = 60.0 * frame_rate / bpm;
        if !(period >= 1.0) {
            return Vec::new();
        }
        if period > LONG_PERIOD_FRAMES {
            log::warn!(
                "Beat period of {:.0} frames is unusually long; beat tracking cost grows with n * period ({} frames)",
                period, n
            );
        }

        let local = local_score(onset_envelope, period);
        let max_local = local.iter().copied().fold(0.0f32, f32::max);
        if !(max_local > 0.0) {
            return Vec::new();
        }

        let far = (2.0 * period).round() as usize;
        let near = ((period / 2.0).round() as usize).max(1);

        let mut cumscore = vec![0.0f32; n];
        let mut backlink: Vec<Option<usize>> = vec![None; n];
        // No chain starts before the first noticeable onset
        let mut started = false;

        for i in 0..n {
            let mut best: Option<(f32, usize)> = None;
            if started && i >= near {
                let lo = i.saturating_sub(far);
                for j in lo..=(i - near) {
                    let ratio = ((i - j) as f32 / period).ln();
                    let score = cumscore[j] - self.tightness * ratio * ratio;
                    if best.map_or(true, |(s, _)| score > s) {
                        best = Some((score, j));
                    }
                }
            }

            match best {
                Some((score, j)) => {
                    cumscore[i] = local[i] + score;
                    backlink[i] = Some(j);
                }
                None => cumscore[i] = local[i],
            }

            if !started && local[i] >= 0.01 * max_local {
                started = true;
            }
        }

        let mut end = 0;
        for (i, &s) in cumscore.iter().enumerate() {
            if s > cumscore[end] {
                end = i;
            }
        }

        let mut beats = vec![end];
        let mut cursor = end;
        while let Some(prev) = backlink[cursor] {
            beats.push(prev);
            cursor = prev;
        }
        beats.reverse();

        if self.trim {
            trim_beats(&mut beats, &local);
        }

        log::debug!(
            "Beat tracking: period {:.2} frames, {} beats, best cumulative score {:.3}",
            period,
            beats.len(),
            cumscore[end]
        );
        beats
    }
}

/// Beat periods beyond this many frames only occur at very high frame rates.
const LONG_PERIOD_FRAMES: f32 = 2000.0;

pub fn lag_to_bpm(lag: f32, frame_rate: f32) -> f32 {
    60.0 * frame_rate / lag
}

/// Onset envelope smoothed by a Gaussian with standard deviation `period / 32`,
/// truncated at four standard deviations.
fn local_score(onset_envelope: &[f32], period: f32) -> Vec<f32> {
    let radius = (period / 8.0).ceil() as isize;
    let kernel: Vec<f32> = (-radius..=radius)
        .map(|k| {
            let x = k as f32 * 32.0 / period;
            (-0.5 * x * x).exp()
        })
        .collect();

    let n = onset_envelope.len() as isize;
    (0..n)
        .map(|i| {
            kernel
                .iter()
                .enumerate()
                .filter_map(|(k, &w)| {
                    let idx = i + k as isize - radius;
                    (0..n).contains(&idx).then(|| w * onset_envelope[idx as usize])
                })
                .sum::<f32>()
        })
        .collect()
}

/// Remove leading and trailing beats whose local score does not exceed half
/// the RMS local score over all beats.
fn trim_beats(beats: &mut Vec<usize>, local: &[f32]) {
    if beats.is_empty() {
        return;
    }
    let rms = (beats.iter().map(|&b| local[b] * local[b]).sum::<f32>() / beats.len() as f32).sqrt();
    let threshold = 0.5 * rms;

    let first = beats.iter().position(|&b| local[b] > threshold);
    let last = beats.iter().rposition(|&b| local[b] > threshold);
    match (first, last) {
        (Some(first), Some(last)) => {
            beats.truncate(last + 1);
            beats.drain(..first);
        }
        _ => beats.clear(),
    }
}
