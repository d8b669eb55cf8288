//! Engine state shared across the control/audio thread boundary
//!
//! Every shared value is a single atomic word; real-valued parameters are
//! stored as f64 bits in an `AtomicU64`. The render path re-reads them
//! every sample, so a tempo change lands on the very next sample rather
//! than the next beat boundary.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use tactus_core::{DEFAULT_BPM, MAX_BPM, MIN_BPM, beat_samples};

use crate::click::{ACCENT_HZ, click_samples};

/// Documented fallback when a beats-per-bar input is invalid
pub const FALLBACK_BEATS_PER_BAR: u32 = 4;

/// Default click volume (the control surface's 50% default)
pub const DEFAULT_VOLUME: f64 = 0.5;

/// Control-writable click parameters, read by the render path
#[derive(Debug)]
pub struct ClickParams {
    sample_rate: u32,
    /// Tempo in BPM (f64 bits)
    bpm: AtomicU64,
    /// Linear volume in [0, 1] (f64 bits)
    volume: AtomicU64,
    /// Time signature numerator
    beats_per_bar: AtomicU32,
}

impl ClickParams {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            bpm: AtomicU64::new(DEFAULT_BPM.to_bits()),
            volume: AtomicU64::new(DEFAULT_VOLUME.to_bits()),
            beats_per_bar: AtomicU32::new(FALLBACK_BEATS_PER_BAR),
        }
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Set tempo, clamped to the [`MIN_BPM`, `MAX_BPM`] control range
    pub fn set_bpm(&self, bpm: f64) {
        self.bpm
            .store(bpm.clamp(MIN_BPM, MAX_BPM).to_bits(), Ordering::Relaxed);
    }

    #[inline]
    pub fn bpm(&self) -> f64 {
        f64::from_bits(self.bpm.load(Ordering::Relaxed))
    }

    /// Set linear volume, clamped to [0, 1]
    pub fn set_volume(&self, volume: f64) {
        self.volume
            .store(volume.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    #[inline]
    pub fn volume(&self) -> f64 {
        f64::from_bits(self.volume.load(Ordering::Relaxed))
    }

    /// Set beats per bar. Zero is invalid and falls back to the
    /// documented default of 4.
    pub fn set_beats_per_bar(&self, beats: u32) {
        let beats = if beats == 0 {
            FALLBACK_BEATS_PER_BAR
        } else {
            beats
        };
        self.beats_per_bar.store(beats, Ordering::Relaxed);
    }

    #[inline]
    pub fn beats_per_bar(&self) -> u32 {
        self.beats_per_bar.load(Ordering::Relaxed)
    }

    /// Samples per beat at the current tempo
    #[inline]
    pub fn beat_samples(&self) -> u64 {
        beat_samples(self.sample_rate, self.bpm())
    }

    /// Click burst length, clamped to the beat period so a burst can
    /// never outlast its beat
    #[inline]
    pub fn click_samples(&self) -> u64 {
        click_samples(self.sample_rate).min(self.beat_samples())
    }
}

/// Render-path-owned position counters
///
/// Written only from the audio context while the engine is running.
/// [`BeatClock::reset`] is part of the stopped-state start sequence.
#[derive(Debug)]
pub struct BeatClock {
    /// Total samples rendered since the last reset
    sample_counter: AtomicU64,
    /// Completed beat boundaries since the last reset
    beat_index: AtomicU64,
    /// Click frequency cached at the last beat boundary (f64 bits)
    click_hz: AtomicU64,
}

impl BeatClock {
    pub fn new() -> Self {
        Self {
            sample_counter: AtomicU64::new(0),
            beat_index: AtomicU64::new(0),
            click_hz: AtomicU64::new(ACCENT_HZ.to_bits()),
        }
    }

    #[inline]
    pub fn samples(&self) -> u64 {
        self.sample_counter.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn beat_index(&self) -> u64 {
        self.beat_index.load(Ordering::Relaxed)
    }

    /// Frequency the current beat's burst renders at
    #[inline]
    pub fn click_hz(&self) -> f64 {
        f64::from_bits(self.click_hz.load(Ordering::Relaxed))
    }

    #[inline]
    pub(crate) fn store_samples(&self, samples: u64) {
        self.sample_counter.store(samples, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn store_beat_index(&self, index: u64) {
        self.beat_index.store(index, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn store_click_hz(&self, hz: f64) {
        self.click_hz.store(hz.to_bits(), Ordering::Relaxed);
    }

    /// Rewind to sample zero. The cached click frequency is left alone;
    /// the first boundary after a reset re-derives it.
    pub fn reset(&self) {
        self.sample_counter.store(0, Ordering::Relaxed);
        self.beat_index.store(0, Ordering::Relaxed);
    }
}

impl Default for BeatClock {
    fn default() -> Self {
        Self::new()
    }
}
