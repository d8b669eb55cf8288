//! tactus-audio: Audio output using cpal
//!
//! Provides the mono output stream the metronome engine renders into.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────┐     ┌──────────────┐     ┌─────────────┐
//! │ render closure│────▶│ OutputStream │────▶│ cpal Device │
//! │ (engine)      │     │ - mono buffer│     │ - output    │
//! └───────────────┘     └──────────────┘     └─────────────┘
//! ```

mod device;
mod error;
mod stream;

pub use device::*;
pub use error::*;
pub use stream::*;

use tactus_core::{BufferSize, SampleRate};

/// Output stream configuration
///
/// The stream is always logically mono; devices that only expose multi-
/// channel outputs get the same signal on every channel.
#[derive(Debug, Clone)]
pub struct AudioConfig {
    pub sample_rate: SampleRate,
    pub buffer_size: BufferSize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: SampleRate::Hz44100,
            buffer_size: BufferSize::Samples1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AudioConfig::default();
        assert_eq!(config.sample_rate, SampleRate::Hz44100);
        assert_eq!(config.buffer_size, BufferSize::Samples1024);
    }
}
