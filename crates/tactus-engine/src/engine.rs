//! Metronome engine: run-state lifecycle and the real-time render path

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use rtrb::{Producer, RingBuffer};

use tactus_audio::{AudioConfig, OutputStream, default_output_device, output_device_by_name};
use tactus_core::{Sample, TimeSignature};

use crate::beat::BeatReceiver;
use crate::click::{ACCENT_HZ, NORMAL_HZ, click_sample};
use crate::error::EngineResult;
use crate::params::{BeatClock, ClickParams};

/// Poll interval of the blocking wait inside [`MetronomeEngine::start`].
/// Stop latency is bounded by this interval, not instantaneous.
pub const STOP_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Beat event ring capacity; far more than a consumer needs between polls
const BEAT_RING_CAPACITY: usize = 64;

/// Engine run state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RunState {
    Stopped = 0,
    Running = 1,
}

/// Engine construction settings
#[derive(Debug, Clone, Default)]
pub struct EngineSettings {
    /// Output device name; `None` selects the system default
    pub output_device: Option<String>,
    /// Output stream configuration
    pub audio: AudioConfig,
}

/// The metronome engine
///
/// All methods take `&self`: the engine is meant to be shared (in an
/// `Arc`) between the control thread and the dedicated thread that parks
/// itself in [`MetronomeEngine::start`] for the duration of playback.
pub struct MetronomeEngine {
    settings: EngineSettings,
    params: Arc<ClickParams>,
    clock: Arc<BeatClock>,
    run_state: AtomicU8,
    beat_tx: Arc<Mutex<Producer<u64>>>,
}

impl MetronomeEngine {
    /// Create an engine plus the receiving end of its beat events
    pub fn new(settings: EngineSettings) -> (Self, BeatReceiver) {
        let (tx, rx) = RingBuffer::new(BEAT_RING_CAPACITY);
        let sample_rate = settings.audio.sample_rate.as_u32();

        let engine = Self {
            settings,
            params: Arc::new(ClickParams::new(sample_rate)),
            clock: Arc::new(BeatClock::new()),
            run_state: AtomicU8::new(RunState::Stopped as u8),
            beat_tx: Arc::new(Mutex::new(tx)),
        };

        (engine, BeatReceiver::new(rx))
    }

    // ── control surface ────────────────────────────────────────────────

    /// Set tempo in BPM, clamped to [30, 240]
    pub fn set_tempo(&self, bpm: f64) {
        self.params.set_bpm(bpm);
    }

    pub fn tempo(&self) -> f64 {
        self.params.bpm()
    }

    /// Set click volume, clamped to [0, 1]
    pub fn set_volume(&self, volume: f64) {
        self.params.set_volume(volume);
    }

    pub fn volume(&self) -> f64 {
        self.params.volume()
    }

    /// Set beats per bar; zero falls back to the documented default of 4
    pub fn set_beats_per_bar(&self, beats: u32) {
        self.params.set_beats_per_bar(beats);
    }

    pub fn beats_per_bar(&self) -> u32 {
        self.params.beats_per_bar()
    }

    /// Apply a "N/D" meter string; unparsable input falls back to 4/4
    pub fn set_time_signature(&self, meter: &str) {
        let signature: TimeSignature = meter.parse().unwrap_or_default();
        self.params.set_beats_per_bar(signature.beats_per_bar());
    }

    // ── observation ────────────────────────────────────────────────────

    /// Samples rendered since the last [`MetronomeEngine::clear`]
    pub fn position_samples(&self) -> u64 {
        self.clock.samples()
    }

    /// Beat boundaries completed since the last [`MetronomeEngine::clear`]
    pub fn beat_count(&self) -> u64 {
        self.clock.beat_index()
    }

    pub fn run_state(&self) -> RunState {
        if self.run_state.load(Ordering::Acquire) == RunState::Running as u8 {
            RunState::Running
        } else {
            RunState::Stopped
        }
    }

    pub fn is_running(&self) -> bool {
        self.run_state() == RunState::Running
    }

    // ── lifecycle ──────────────────────────────────────────────────────

    /// Rewind the beat clock to zero
    ///
    /// Part of the documented start sequence: call while stopped, before
    /// handing the engine to the thread that calls [`MetronomeEngine::start`].
    /// Calling it mid-playback would tear the render path's counters.
    pub fn clear(&self) {
        debug_assert!(!self.is_running(), "clear() while running");
        self.clock.reset();
    }

    /// Run the metronome until [`MetronomeEngine::stop`] is called
    ///
    /// Transitions Stopped→Running, opens the output stream bound to the
    /// render path, and parks the calling thread in a poll loop
    /// ([`STOP_POLL_INTERVAL`]). Returns immediately with `Ok(())` if
    /// already running, so a second stream is never opened. On
    /// stream-open failure the run state reverts to Stopped and the error
    /// is returned; retrying later is safe.
    pub fn start(&self) -> EngineResult<()> {
        if self
            .run_state
            .compare_exchange(
                RunState::Stopped as u8,
                RunState::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return Ok(());
        }

        let stream = match self.open_stream() {
            Ok(stream) => stream,
            Err(e) => {
                self.run_state
                    .store(RunState::Stopped as u8, Ordering::Release);
                return Err(e);
            }
        };

        log::info!("metronome running at {:.0} bpm", self.params.bpm());
        self.block_until_stopped();

        drop(stream);
        log::info!("metronome stopped");
        Ok(())
    }

    /// Request stop. The thread blocked in [`MetronomeEngine::start`]
    /// observes this within one poll interval and closes the stream.
    /// No-op while stopped.
    pub fn stop(&self) {
        self.run_state
            .store(RunState::Stopped as u8, Ordering::Release);
    }

    fn open_stream(&self) -> EngineResult<OutputStream> {
        let device = match self.settings.output_device.as_deref() {
            Some(name) => output_device_by_name(name)?,
            None => default_output_device()?,
        };

        let params = Arc::clone(&self.params);
        let clock = Arc::clone(&self.clock);
        let beat_tx = Arc::clone(&self.beat_tx);

        let stream = OutputStream::open(
            &device,
            &self.settings.audio,
            Box::new(move |buf| render_block(&params, &clock, &beat_tx, buf)),
        )?;

        Ok(stream)
    }

    fn block_until_stopped(&self) {
        while self.run_state.load(Ordering::Acquire) == RunState::Running as u8 {
            thread::sleep(STOP_POLL_INTERVAL);
        }
    }
}

/// Render one block of mono frames
///
/// Runs on the audio thread: no allocation, no blocking. Parameters are
/// re-read every sample, so tempo and volume edits land on the very next
/// sample. At each beat boundary the completed 1-based beat index is
/// pushed into the ring (dropped if full) and the frequency for the new
/// beat's burst is cached for the samples that follow.
fn render_block(
    params: &ClickParams,
    clock: &BeatClock,
    beat_tx: &Mutex<Producer<u64>>,
    buf: &mut [Sample],
) {
    // Uncontended in practice; were it ever held, one block of missing
    // beat events beats a stalled audio thread.
    let mut beat_tx = beat_tx.try_lock();

    for out in buf.iter_mut() {
        let beat_samples = params.beat_samples();
        if beat_samples == 0 {
            *out = 0.0;
            continue;
        }

        let t = clock.samples();
        let pos_in_beat = t % beat_samples;

        *out = click_sample(
            pos_in_beat,
            params.click_samples(),
            clock.click_hz(),
            params.sample_rate(),
            params.volume(),
        );

        clock.store_samples(t + 1);

        if pos_in_beat == 0 {
            let beat = clock.beat_index() + 1;

            if let Some(tx) = beat_tx.as_mut() {
                let _ = tx.push(beat);
            }

            clock.store_beat_index(beat);
            clock.store_click_hz(if beat % params.beats_per_bar() as u64 == 1 {
                ACCENT_HZ
            } else {
                NORMAL_HZ
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rtrb::Consumer;
    use std::f64::consts::TAU;
    use std::time::Instant;

    const RATE: u32 = 44100;

    fn harness(bpm: f64) -> (Arc<ClickParams>, BeatClock, Mutex<Producer<u64>>, Consumer<u64>) {
        let (tx, rx) = RingBuffer::new(1024);
        let params = Arc::new(ClickParams::new(RATE));
        params.set_bpm(bpm);
        (params, BeatClock::new(), Mutex::new(tx), rx)
    }

    fn render(
        params: &ClickParams,
        clock: &BeatClock,
        tx: &Mutex<Producer<u64>>,
        frames: usize,
        block: usize,
    ) -> Vec<Sample> {
        let mut out = vec![0.0; frames];
        for chunk in out.chunks_mut(block) {
            render_block(params, clock, tx, chunk);
        }
        out
    }

    fn drain(rx: &mut Consumer<u64>) -> Vec<u64> {
        let mut beats = Vec::new();
        while let Ok(beat) = rx.pop() {
            beats.push(beat);
        }
        beats
    }

    #[test]
    fn test_one_beat_period_fires_once() {
        // 120 bpm at 44.1kHz: 22050-sample beat, 4410-sample click
        let (params, clock, tx, mut rx) = harness(120.0);
        let buf = render(&params, &clock, &tx, 22050, 1024);

        assert_eq!(drain(&mut rx), vec![1]);

        // the first beat of the bar renders the 800Hz accent burst
        for (i, &s) in buf.iter().take(4410).enumerate() {
            let expected = (0.5 * (TAU * 800.0 * i as f64 / 44100.0).sin()) as Sample;
            assert_relative_eq!(s, expected, epsilon = 1e-7);
        }
        assert_eq!(buf[0], 0.0);
        assert!(buf[1..4410].iter().any(|s| s.abs() > 0.1));

        // silence from the end of the burst to the end of the beat
        assert!(buf[4410..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_beat_rate_over_ten_beats() {
        // 100 bpm: 26460-sample beat
        let (params, clock, tx, mut rx) = harness(100.0);
        render(&params, &clock, &tx, 26460 * 10, 1024);

        let beats = drain(&mut rx);
        assert_eq!(beats, (1..=10).collect::<Vec<u64>>());
        assert_eq!(clock.beat_index(), 10);
    }

    #[test]
    fn test_beat_rate_over_hundred_beats() {
        let (params, clock, tx, mut rx) = harness(100.0);
        render(&params, &clock, &tx, 26460 * 100, 1024);

        let beats = drain(&mut rx);
        assert_eq!(beats.len(), 100);
        assert_eq!(beats.last(), Some(&100));
        assert_eq!(clock.samples(), 26460 * 100);
    }

    #[test]
    fn test_accent_pattern_four_four() {
        // beats 1, 5, 9, ... accent at 800Hz; everything else 500Hz
        let (params, clock, tx, _rx) = harness(120.0);
        let buf = render(&params, &clock, &tx, 22050 * 9, 1024);

        for beat in 1..=9u64 {
            let expected_hz = if beat % 4 == 1 { 800.0 } else { 500.0 };
            let s = buf[((beat - 1) * 22050 + 1) as usize];
            let expected = (0.5 * (TAU * expected_hz / 44100.0).sin()) as Sample;
            assert_relative_eq!(s, expected, epsilon = 1e-7, max_relative = 1e-6);
        }
    }

    #[test]
    fn test_accent_pattern_three_four() {
        let (params, clock, tx, _rx) = harness(120.0);
        params.set_beats_per_bar(3);
        let buf = render(&params, &clock, &tx, 22050 * 7, 1024);

        for beat in 1..=7u64 {
            let expected_hz = if beat % 3 == 1 { 800.0 } else { 500.0 };
            let s = buf[((beat - 1) * 22050 + 1) as usize];
            let expected = (0.5 * (TAU * expected_hz / 44100.0).sin()) as Sample;
            assert_relative_eq!(s, expected, epsilon = 1e-7, max_relative = 1e-6);
        }
    }

    #[test]
    fn test_clear_rewinds_clock() {
        let (engine, mut beats) = MetronomeEngine::new(EngineSettings::default());
        engine.set_tempo(120.0);

        let mut buf = vec![0.0; 1000];
        render_block(&engine.params, &engine.clock, &engine.beat_tx, &mut buf);
        assert_eq!(engine.position_samples(), 1000);
        assert_eq!(beats.latest(), Some(1));

        engine.clear();
        assert_eq!(engine.position_samples(), 0);
        assert_eq!(engine.beat_count(), 0);

        // exactly one boundary in the next full beat period
        let mut buf = vec![0.0; 22050];
        render_block(&engine.params, &engine.clock, &engine.beat_tx, &mut buf);
        assert_eq!(beats.latest(), Some(1));
        assert_eq!(engine.beat_count(), 1);
    }

    #[test]
    fn test_meter_string_fallback() {
        let (engine, _beats) = MetronomeEngine::new(EngineSettings::default());

        engine.set_time_signature("3/4");
        assert_eq!(engine.beats_per_bar(), 3);

        // invalid input falls back to 4/4, not the previous value
        engine.set_time_signature("not a meter");
        assert_eq!(engine.beats_per_bar(), 4);

        engine.set_time_signature("6/8");
        assert_eq!(engine.beats_per_bar(), 6);
    }

    #[test]
    fn test_param_setters_clamp() {
        let (engine, _beats) = MetronomeEngine::new(EngineSettings::default());

        engine.set_tempo(1000.0);
        assert_eq!(engine.tempo(), 240.0);
        engine.set_tempo(1.0);
        assert_eq!(engine.tempo(), 30.0);

        engine.set_volume(2.0);
        assert_eq!(engine.volume(), 1.0);

        engine.set_beats_per_bar(0);
        assert_eq!(engine.beats_per_bar(), 4);
    }

    #[test]
    fn test_redundant_stop_is_noop() {
        let (engine, _beats) = MetronomeEngine::new(EngineSettings::default());
        assert!(!engine.is_running());
        engine.stop();
        assert_eq!(engine.run_state(), RunState::Stopped);
    }

    #[test]
    fn test_stop_unblocks_wait_loop_within_poll_interval() {
        let (engine, _beats) = MetronomeEngine::new(EngineSettings::default());
        let engine = Arc::new(engine);

        engine
            .run_state
            .store(RunState::Running as u8, Ordering::Release);

        let stopper = {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                engine.stop();
            })
        };

        let started = Instant::now();
        engine.block_until_stopped();
        assert!(started.elapsed() < STOP_POLL_INTERVAL * 3);

        stopper.join().unwrap();
        assert!(!engine.is_running());
    }

    #[test]
    fn test_tempo_change_lands_on_next_sample() {
        let (params, clock, tx, mut rx) = harness(120.0);
        render(&params, &clock, &tx, 11025, 1024); // half a beat
        assert_eq!(drain(&mut rx), vec![1]);

        // doubling the tempo mid-beat: the very next sample sits on a
        // boundary of the new 11025-sample period, while the old period
        // would not have fired until sample 22050
        params.set_bpm(240.0);
        render(&params, &clock, &tx, 1, 1);
        assert_eq!(drain(&mut rx), vec![2]);
    }
}
