//! Tempo math and time signatures
//!
//! Beat periods are expressed in whole output samples: at 120 bpm and
//! 44.1kHz a beat is 22050 samples long. All timing downstream is driven
//! by these sample counts, never by wall-clock timers.

use std::fmt;
use std::str::FromStr;

/// Minimum tempo accepted from the control surface
pub const MIN_BPM: f64 = 30.0;

/// Maximum tempo accepted from the control surface
pub const MAX_BPM: f64 = 240.0;

/// Default tempo
pub const DEFAULT_BPM: f64 = 100.0;

/// Samples in one beat period at the given tempo
#[inline]
pub fn beat_samples(sample_rate: u32, bpm: f64) -> u64 {
    (sample_rate as f64 * 60.0 / bpm).round() as u64
}

/// Time signature (e.g., 4/4, 3/4, 6/8)
///
/// Only the numerator affects click accenting; the denominator is kept so
/// the control surface can round-trip the meter it was given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSignature {
    /// Numerator (beats per bar)
    pub numerator: u8,
    /// Denominator (note value that gets one beat)
    pub denominator: u8,
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self {
            numerator: 4,
            denominator: 4,
        }
    }
}

impl TimeSignature {
    /// Common time (4/4)
    pub const COMMON: Self = Self {
        numerator: 4,
        denominator: 4,
    };

    /// Waltz time (3/4)
    pub const WALTZ: Self = Self {
        numerator: 3,
        denominator: 4,
    };

    pub fn new(numerator: u8, denominator: u8) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Beats per bar at this time signature
    #[inline]
    pub fn beats_per_bar(&self) -> u32 {
        self.numerator as u32
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// Error parsing a "N/D" time signature string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTimeSignatureError;

impl fmt::Display for ParseTimeSignatureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid time signature")
    }
}

impl std::error::Error for ParseTimeSignatureError {}

impl FromStr for TimeSignature {
    type Err = ParseTimeSignatureError;

    /// Parse a "N/D" string. The numerator must be at least 1; the
    /// denominator must be a power-of-two note value up to 16.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (num, den) = s.trim().split_once('/').ok_or(ParseTimeSignatureError)?;
        let numerator: u8 = num.trim().parse().map_err(|_| ParseTimeSignatureError)?;
        let denominator: u8 = den.trim().parse().map_err(|_| ParseTimeSignatureError)?;

        if numerator == 0 || !matches!(denominator, 1 | 2 | 4 | 8 | 16) {
            return Err(ParseTimeSignatureError);
        }

        Ok(Self {
            numerator,
            denominator,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_beat_samples_round() {
        // beat_samples = round(sample_rate * 60 / bpm)
        assert_eq!(beat_samples(44100, 120.0), 22050);
        assert_eq!(beat_samples(44100, 100.0), 26460);
        assert_eq!(beat_samples(48000, 120.0), 24000);
        // 44100 * 60 / 70 = 37800
        assert_eq!(beat_samples(44100, 70.0), 37800);
    }

    #[test]
    fn test_beat_samples_whole_ui_range() {
        for bpm in 30..=240u32 {
            let expected = (44100.0 * 60.0 / bpm as f64).round() as u64;
            assert_eq!(beat_samples(44100, bpm as f64), expected, "bpm {bpm}");
        }
    }

    #[test]
    fn test_time_signature_parse() {
        assert_eq!("4/4".parse::<TimeSignature>(), Ok(TimeSignature::COMMON));
        assert_eq!("3/4".parse::<TimeSignature>(), Ok(TimeSignature::WALTZ));
        assert_eq!(
            " 6/8 ".parse::<TimeSignature>(),
            Ok(TimeSignature::new(6, 8))
        );
    }

    #[test]
    fn test_time_signature_parse_rejects_garbage() {
        assert!("".parse::<TimeSignature>().is_err());
        assert!("44".parse::<TimeSignature>().is_err());
        assert!("0/4".parse::<TimeSignature>().is_err());
        assert!("4/3".parse::<TimeSignature>().is_err());
        assert!("x/y".parse::<TimeSignature>().is_err());
    }

    #[test]
    fn test_time_signature_display() {
        assert_eq!(TimeSignature::WALTZ.to_string(), "3/4");
        assert_eq!(TimeSignature::default().to_string(), "4/4");
    }
}
