//! Triple-buffered video hand-off
//!
//! Three [`VideoFrame`] slots are shared between one publisher (the engine
//! thread) and one reader (the render thread):
//!
//! - the publisher owns the *back* slot and draws into it in place,
//! - the *middle* slot holds the most recently published frame,
//! - the reader owns the *front* slot.
//!
//! Publishing swaps back and middle; reading swaps middle and front when a
//! newer frame is waiting. Both swaps are a single atomic exchange on a
//! packed index byte, so pixel data is never copied on the hot path and the
//! reader never observes a partially drawn frame. The per-slot mutexes are
//! never contended: a slot is only ever locked by the side that owns it.

use parking_lot::{Mutex, MutexGuard};
use rb_core::{VideoFormat, VideoFrame};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

/// Set in the shared byte when the middle slot holds an unread frame
const FRESH: u8 = 0b100;
const INDEX_MASK: u8 = 0b011;

struct Shared {
    slots: [Mutex<VideoFrame>; 3],
    /// Middle slot index plus the `FRESH` flag
    middle: AtomicU8,
    published: AtomicU64,
}

/// Create a publisher/reader pair with all slots sized for `format`
pub fn video_swapchain(format: &VideoFormat) -> (VideoPublisher, VideoReader) {
    let shared = Arc::new(Shared {
        slots: [
            Mutex::new(VideoFrame::new(format)),
            Mutex::new(VideoFrame::new(format)),
            Mutex::new(VideoFrame::new(format)),
        ],
        middle: AtomicU8::new(1),
        published: AtomicU64::new(0),
    });

    tracing::debug!(
        "Video swapchain created: {}x{} {:?}",
        format.width,
        format.height,
        format.pixel_format
    );

    (
        VideoPublisher {
            shared: Arc::clone(&shared),
            back: 0,
        },
        VideoReader {
            shared,
            front: 2,
            has_frame: false,
        },
    )
}

/// Engine-thread half
pub struct VideoPublisher {
    shared: Arc<Shared>,
    back: u8,
}

impl VideoPublisher {
    /// The slot to draw the next frame into
    pub fn back_buffer(&mut self) -> MutexGuard<'_, VideoFrame> {
        self.shared.slots[self.back as usize].lock()
    }

    /// Expose the back buffer to the reader and take the old middle slot
    pub fn publish(&mut self) {
        let previous = self
            .shared
            .middle
            .swap(self.back | FRESH, Ordering::AcqRel);
        self.back = previous & INDEX_MASK;
        self.shared.published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frames_published(&self) -> u64 {
        self.shared.published.load(Ordering::Relaxed)
    }
}

/// Render-thread half
pub struct VideoReader {
    shared: Arc<Shared>,
    front: u8,
    has_frame: bool,
}

impl VideoReader {
    /// Whether a frame newer than the one last returned is waiting
    pub fn has_new_frame(&self) -> bool {
        self.shared.middle.load(Ordering::Acquire) & FRESH != 0
    }

    /// Most recently published frame, or `None` before the first publish
    pub fn latest(&mut self) -> Option<MutexGuard<'_, VideoFrame>> {
        if self.has_new_frame() {
            let previous = self.shared.middle.swap(self.front, Ordering::AcqRel);
            self.front = previous & INDEX_MASK;
            self.has_frame = true;
        }

        if self.has_frame {
            Some(self.shared.slots[self.front as usize].lock())
        } else {
            None
        }
    }

    pub fn frames_published(&self) -> u64 {
        self.shared.published.load(Ordering::Relaxed)
    }
}
