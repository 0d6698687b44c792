//! Energy-flux onset detection
//!
//! Turns a decoded mono track into a chart:
//! 1. Slice the signal into ~50 ms windows and sum squared energy per window
//! 2. Flux = rectified energy increase between consecutive windows
//! 3. Peaks = strict local maxima of flux above half the mean flux
//! 4. Debounce peaks closer than 0.3 s, then assign each a random lane

use rand::Rng;

use super::note::{Lane, Note, NoteSchedule};
use crate::consts::*;

/// Samples per analysis window for a sample rate
pub fn window_step(sample_rate: u32) -> usize {
    (f64::from(sample_rate) * ANALYSIS_WINDOW_SECS).floor() as usize
}

/// Squared energy of `step` samples starting at `start` (past-the-end samples are zero)
fn window_energy(samples: &[f32], start: usize, step: usize) -> f64 {
    let end = start.saturating_add(step).min(samples.len());
    samples
        .get(start..end)
        .map_or(0.0, |w| w.iter().map(|&s| f64::from(s).powi(2)).sum())
}

/// Rectified energy flux, one value per window index `i >= 1`.
///
/// Stops one window short of the end, so a track needs more than two windows
/// to produce any flux at all.
pub fn energy_flux(samples: &[f32], step: usize) -> Vec<f64> {
    if step == 0 {
        return Vec::new();
    }

    let windows = samples.len() as f64 / step as f64;
    let mut flux = Vec::with_capacity(windows.max(0.0) as usize);
    let mut prev = window_energy(samples, 0, step);
    let mut i = 1usize;
    while (i as f64) < windows - 1.0 {
        let curr = window_energy(samples, i * step, step);
        flux.push((curr - prev).max(0.0));
        prev = curr;
        i += 1;
    }
    flux
}

/// Onset times (seconds) picked from a flux curve, debounced and ascending
pub fn pick_onsets(flux: &[f64]) -> Vec<f64> {
    // Need an interior point, and a mean over at least one value
    if flux.len() < 3 {
        return Vec::new();
    }

    let avg = flux.iter().sum::<f64>() / flux.len() as f64;
    let threshold = avg * PEAK_THRESHOLD_RATIO;

    let mut times = Vec::new();
    let mut last_time = f64::NEG_INFINITY;
    for k in 1..flux.len() - 1 {
        let is_peak = flux[k] > flux[k - 1] && flux[k] > flux[k + 1] && flux[k] > threshold;
        if !is_peak {
            continue;
        }
        let time = k as f64 * ONSET_TIME_SCALE;
        if time - last_time > ONSET_DEBOUNCE_SECS {
            times.push(time);
            last_time = time;
        }
    }
    times
}

/// Deterministic part of detection: onset times for a track
pub fn detect_onset_times(samples: &[f32], sample_rate: u32) -> Vec<f64> {
    let step = window_step(sample_rate);
    let flux = energy_flux(samples, step);
    pick_onsets(&flux)
}

/// Build a chart from decoded samples. Silent or very short tracks give an
/// empty schedule.
pub fn detect<R: Rng>(samples: &[f32], sample_rate: u32, rng: &mut R) -> NoteSchedule {
    let times = detect_onset_times(samples, sample_rate);
    let mut schedule = NoteSchedule::new();
    for time in times {
        schedule.push(Note::new(time, Lane::random(rng)));
    }
    log::info!(
        "Detected {} notes from {} samples at {} Hz",
        schedule.len(),
        samples.len(),
        sample_rate
    );
    schedule
}

/// Fixed-tempo chart for sources that can't be decoded up front (video)
pub fn synthetic_cadence<R: Rng>(rng: &mut R) -> NoteSchedule {
    let mut schedule = NoteSchedule::new();
    for i in 1..=CADENCE_NOTE_COUNT {
        let time = f64::from(i) * CADENCE_INTERVAL_SECS;
        schedule.push(Note::new(time, Lane::random(rng)));
    }
    schedule
}
