//! Output stream management

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{
    BufferSize as CpalBufferSize, Device, SampleFormat, Stream, StreamConfig,
    SupportedBufferSize, SupportedStreamConfigRange,
};

use tactus_core::Sample;

use crate::{AudioConfig, AudioError, AudioResult};

/// Render callback type: fills one block of mono frames
pub type RenderCallback = Box<dyn FnMut(&mut [Sample]) + Send + 'static>;

/// Open mono output stream
///
/// The stream starts playing on open and stops when dropped. The render
/// callback produces mono frames; they are fanned out to however many
/// channels the device actually runs with.
pub struct OutputStream {
    _stream: Stream,
    channels: u16,
    sample_rate: u32,
    block_frames: usize,
}

impl OutputStream {
    pub fn open(
        device: &Device,
        config: &AudioConfig,
        mut render: RenderCallback,
    ) -> AudioResult<Self> {
        let sample_rate = config.sample_rate.as_u32();
        let frames = config.buffer_size.as_u32();

        let supported = pick_output_config(device, sample_rate)?;
        let channels = supported.channels();

        let buffer_size = match *supported.buffer_size() {
            SupportedBufferSize::Range { min, max } => {
                CpalBufferSize::Fixed(frames.clamp(min, max))
            }
            SupportedBufferSize::Unknown => CpalBufferSize::Default,
        };

        let stream_config = StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size,
        };

        log::info!(
            "opening output stream: {} ch @ {sample_rate} Hz, {frames} frames",
            channels
        );

        // Mono scratch buffer, sized to the requested block. Larger
        // callbacks are handled in chunks so the audio thread never
        // allocates.
        let mut mono = vec![0.0 as Sample; frames as usize];
        let channels_usize = channels as usize;

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for chunk in data.chunks_mut(mono.len() * channels_usize) {
                        let frames = chunk.len() / channels_usize;
                        render(&mut mono[..frames]);

                        for (frame, &sample) in
                            chunk.chunks_mut(channels_usize).zip(mono.iter())
                        {
                            frame.fill(sample);
                        }
                    }
                },
                |err| log::error!("audio output stream error: {err}"),
                None,
            )
            .map_err(|e| AudioError::StreamBuildError(e.to_string()))?;

        stream
            .play()
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            channels,
            sample_rate,
            block_frames: frames as usize,
        })
    }

    /// Channel count the device actually runs with
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Sample rate of the stream
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Requested block size in frames
    pub fn block_frames(&self) -> usize {
        self.block_frames
    }
}

/// Pick an f32 output config supporting the requested rate, preferring the
/// lowest channel count (the signal is mono anyway)
fn pick_output_config(
    device: &Device,
    sample_rate: u32,
) -> AudioResult<cpal::SupportedStreamConfig> {
    let rate = cpal::SampleRate(sample_rate);

    let configs: Vec<SupportedStreamConfigRange> = device
        .supported_output_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .collect();

    configs
        .into_iter()
        .filter(|c| {
            c.channels() > 0
                && c.sample_format() == SampleFormat::F32
                && c.min_sample_rate() <= rate
                && c.max_sample_rate() >= rate
        })
        .min_by_key(|c| c.channels())
        .map(|c| c.with_sample_rate(rate))
        .ok_or_else(|| {
            AudioError::ConfigError(format!("no f32 output config @ {sample_rate} Hz"))
        })
}
