//! Click tone synthesis
//!
//! The click is a fixed-length sine burst at the start of each beat
//! period: 800Hz on the accented first beat of a bar, 500Hz on the rest.

use tactus_core::Sample;

/// Accented (first-of-bar) click frequency
pub const ACCENT_HZ: f64 = 800.0;

/// Normal click frequency
pub const NORMAL_HZ: f64 = 500.0;

/// Click burst length in seconds
pub const CLICK_DURATION_SECS: f64 = 0.10;

/// Samples in one click burst at the given rate
#[inline]
pub fn click_samples(sample_rate: u32) -> u64 {
    (sample_rate as f64 * CLICK_DURATION_SECS).round() as u64
}

/// Render one sample of the click voice
///
/// Pure: the output depends only on the arguments. Positions at or past
/// `click_samples` are silence, and position 0 is always 0.0 (sin 0).
#[inline]
pub fn click_sample(
    pos_in_beat: u64,
    click_samples: u64,
    freq_hz: f64,
    sample_rate: u32,
    volume: f64,
) -> Sample {
    if pos_in_beat >= click_samples {
        return 0.0;
    }

    let phase = std::f64::consts::TAU * freq_hz * pos_in_beat as f64 / sample_rate as f64;
    (volume * phase.sin()) as Sample
}
