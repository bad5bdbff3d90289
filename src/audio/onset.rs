use rayon::prelude::*;
use std::borrow::Cow;

use super::features::{OnsetEnvelope, Spectrogram};

/// Half-wave rectified spectral flux, one value per frame.
///
/// With `log_compression`, magnitudes are mapped through `ln(1 + gain * m)`
/// before differencing. The envelope is divided by its standard deviation so
/// tempo estimation does not depend on the input level. Frame 0 is always 0.
pub fn onset_strength(spectrogram: &Spectrogram, log_compression: bool, gain: f32) -> OnsetEnvelope {
    let n = spectrogram.len();
    if n == 0 {
        return OnsetEnvelope::default();
    }

    let spectra: Vec<Cow<'_, [f32]>> = if log_compression {
        spectrogram
            .frames
            .par_iter()
            .map(|s| Cow::Owned(s.magnitudes.iter().map(|&m| (gain * m).ln_1p()).collect()))
            .collect()
    } else {
        spectrogram
            .frames
            .iter()
            .map(|s| Cow::Borrowed(s.magnitudes.as_slice()))
            .collect()
    };

    let mut values: Vec<f32> = (0..n)
        .into_par_iter()
        .map(|i| {
            if i == 0 {
                return 0.0;
            }
            spectra[i]
                .iter()
                .zip(spectra[i - 1].iter())
                .map(|(cur, prev)| (cur - prev).max(0.0))
                .sum::<f32>()
        })
        .collect();

    let std = std_dev(&values);
    if std > 1e-10 && std.is_finite() {
        for v in values.iter_mut() {
            *v /= std;
        }
    }

    log::debug!("Onset envelope: {} frames, raw std {:.4}", n, std);

    OnsetEnvelope { values }
}

fn std_dev(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
    let var = values.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / n;
    var.sqrt() as f32
}
