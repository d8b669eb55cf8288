//! Beat notifications crossing from the audio thread to the control side
//!
//! A bounded wait-free SPSC ring: the render path pushes the 1-based
//! index of each completed boundary. Pushes into a full ring are dropped,
//! so a slow consumer sees coalesced beats instead of stalling the audio
//! thread.

use rtrb::Consumer;

/// Receiving end of the engine's beat events
pub struct BeatReceiver {
    rx: Consumer<u64>,
}

impl BeatReceiver {
    pub(crate) fn new(rx: Consumer<u64>) -> Self {
        Self { rx }
    }

    /// Next pending beat index, if any. Never blocks.
    pub fn poll(&mut self) -> Option<u64> {
        self.rx.pop().ok()
    }

    /// Discard everything queued, returning the most recent beat index.
    /// Useful for consumers that only care about the latest pulse.
    pub fn latest(&mut self) -> Option<u64> {
        let mut latest = None;
        while let Some(beat) = self.poll() {
            latest = Some(beat);
        }
        latest
    }
}

impl std::fmt::Debug for BeatReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BeatReceiver").finish_non_exhaustive()
    }
}
