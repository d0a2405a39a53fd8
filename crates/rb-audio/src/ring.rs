//! Audio ring buffer
//!
//! Fixed-capacity hand-off of [`AudioFrame`]s from the engine thread to the
//! audio output thread. All slots are allocated up front; pushing and
//! draining only copy samples.
//!
//! - Overrun: pushing into a full ring drops the oldest unread frame.
//! - Underrun: draining an empty ring yields silence.
//!
//! Both are counted, neither is an error, and neither side ever waits for
//! the other beyond the copy done under the ring's lock.

use parking_lot::Mutex;
use rb_core::{AudioFrame, Sample};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Counters describing ring health
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RingStats {
    pub frames_pushed: u64,
    pub frames_delivered: u64,
    pub overruns: u64,
    pub underruns: u64,
}

/// Outcome of a push
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Stored,
    /// The ring was full and its oldest frame was discarded
    DroppedOldest,
}

struct RingState {
    slots: Vec<AudioFrame>,
    head: usize,
    len: usize,
    /// Samples of the head frame already handed out by `fill`
    partial: usize,
}

struct Shared {
    state: Mutex<RingState>,
    frame_len: usize,
    capacity: usize,
    muted: Arc<AtomicBool>,
    frames_pushed: AtomicU64,
    frames_delivered: AtomicU64,
    overruns: AtomicU64,
    underruns: AtomicU64,
}

impl Shared {
    fn stats(&self) -> RingStats {
        RingStats {
            frames_pushed: self.frames_pushed.load(Ordering::Relaxed),
            frames_delivered: self.frames_delivered.load(Ordering::Relaxed),
            overruns: self.overruns.load(Ordering::Relaxed),
            underruns: self.underruns.load(Ordering::Relaxed),
        }
    }

    fn fill_level(&self) -> f32 {
        let len = self.state.lock().len;
        len as f32 / self.capacity as f32
    }
}

/// Read-only view of a ring's counters, still usable once both halves
/// have been handed to their threads
#[derive(Clone)]
pub struct RingMonitor {
    shared: Arc<Shared>,
}

impl RingMonitor {
    pub fn stats(&self) -> RingStats {
        self.shared.stats()
    }

    pub fn fill_level(&self) -> f32 {
        self.shared.fill_level()
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }
}

/// Number of frames needed to hold `buffer_ms` of audio at `frame_rate`
pub fn frames_for_duration(buffer_ms: u32, frame_rate: f64) -> usize {
    let frames = (buffer_ms as f64 * frame_rate / 1000.0).ceil() as usize;
    frames.max(2)
}

/// Create a ring of `capacity` frames, each `frame_len` interleaved samples
pub fn audio_ring(capacity: usize, frame_len: usize, channels: u16) -> (AudioProducer, AudioConsumer) {
    audio_ring_with_mute(capacity, frame_len, channels, Arc::new(AtomicBool::new(false)))
}

/// Like [`audio_ring`], sharing an externally owned mute switch
pub fn audio_ring_with_mute(
    capacity: usize,
    frame_len: usize,
    channels: u16,
    muted: Arc<AtomicBool>,
) -> (AudioProducer, AudioConsumer) {
    let capacity = capacity.max(1);
    let slots = (0..capacity)
        .map(|_| AudioFrame::silent(frame_len, channels))
        .collect();

    let shared = Arc::new(Shared {
        state: Mutex::new(RingState {
            slots,
            head: 0,
            len: 0,
            partial: 0,
        }),
        frame_len,
        capacity,
        muted,
        frames_pushed: AtomicU64::new(0),
        frames_delivered: AtomicU64::new(0),
        overruns: AtomicU64::new(0),
        underruns: AtomicU64::new(0),
    });

    tracing::debug!(
        "Audio ring created: {} frames x {} samples",
        capacity,
        frame_len
    );

    (
        AudioProducer {
            shared: Arc::clone(&shared),
        },
        AudioConsumer { shared },
    )
}

/// Engine-thread half of the ring
pub struct AudioProducer {
    shared: Arc<Shared>,
}

impl AudioProducer {
    /// Copy `frame` into the ring, dropping the oldest frame when full
    pub fn push(&mut self, frame: &AudioFrame) -> PushOutcome {
        let shared = &*self.shared;
        let outcome = {
            let mut state = shared.state.lock();
            let outcome = if state.len == shared.capacity {
                state.head = (state.head + 1) % shared.capacity;
                state.len -= 1;
                state.partial = 0;
                PushOutcome::DroppedOldest
            } else {
                PushOutcome::Stored
            };
            let tail = (state.head + state.len) % shared.capacity;
            state.slots[tail].copy_from(frame);
            state.len += 1;
            outcome
        };

        shared.frames_pushed.fetch_add(1, Ordering::Relaxed);
        if outcome == PushOutcome::DroppedOldest {
            let overruns = shared.overruns.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::trace!("Audio overrun (total {})", overruns);
        }
        outcome
    }

    /// Fraction of slots currently occupied
    pub fn fill_level(&self) -> f32 {
        self.shared.fill_level()
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    pub fn stats(&self) -> RingStats {
        self.shared.stats()
    }

    pub fn monitor(&self) -> RingMonitor {
        RingMonitor {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Audio-output half of the ring
pub struct AudioConsumer {
    shared: Arc<Shared>,
}

impl AudioConsumer {
    /// Take the oldest whole frame into `out`.
    ///
    /// Returns `false` and writes silence on underrun. Frame-level and
    /// sample-level ([`fill`](Self::fill)) draining should not be mixed: a
    /// partially filled head frame is returned whole.
    pub fn pop(&mut self, out: &mut AudioFrame) -> bool {
        let shared = &*self.shared;
        let popped = {
            let mut state = shared.state.lock();
            if state.len == 0 {
                false
            } else {
                let head = state.head;
                out.copy_from(&state.slots[head]);
                state.head = (head + 1) % shared.capacity;
                state.len -= 1;
                state.partial = 0;
                true
            }
        };

        if popped {
            shared.frames_delivered.fetch_add(1, Ordering::Relaxed);
            if shared.muted.load(Ordering::Relaxed) {
                out.fill_silence();
            }
        } else {
            out.fill_silence();
            shared.underruns.fetch_add(1, Ordering::Relaxed);
        }
        popped
    }

    /// Fill `out` with queued samples, padding with silence on underrun.
    ///
    /// Returns the number of real samples written.
    pub fn fill(&mut self, out: &mut [Sample]) -> usize {
        let shared = &*self.shared;
        let mut written = 0;
        let mut completed = 0;
        {
            let mut state = shared.state.lock();
            while written < out.len() && state.len > 0 {
                let head = state.head;
                let offset = state.partial;
                let available = shared.frame_len - offset;
                let take = available.min(out.len() - written);
                out[written..written + take]
                    .copy_from_slice(&state.slots[head].samples[offset..offset + take]);
                written += take;

                if take == available {
                    state.head = (head + 1) % shared.capacity;
                    state.len -= 1;
                    state.partial = 0;
                    completed += 1;
                } else {
                    state.partial += take;
                }
            }
        }

        if completed > 0 {
            shared.frames_delivered.fetch_add(completed, Ordering::Relaxed);
        }
        if shared.muted.load(Ordering::Relaxed) {
            out[..written].fill(0);
        }
        if written < out.len() {
            out[written..].fill(0);
            shared.underruns.fetch_add(1, Ordering::Relaxed);
        }
        written
    }

    /// Number of whole frames waiting
    pub fn queued(&self) -> usize {
        self.shared.state.lock().len
    }

    pub fn fill_level(&self) -> f32 {
        self.shared.fill_level()
    }

    pub fn stats(&self) -> RingStats {
        self.shared.stats()
    }
}
