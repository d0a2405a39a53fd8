//! Audio hand-off for retrobridge

pub mod ring;
pub mod route;

pub use ring::{
    audio_ring, audio_ring_with_mute, frames_for_duration, AudioConsumer, AudioProducer,
    PushOutcome, RingMonitor, RingStats,
};
pub use route::{AudioRoute, AudioRouter, RouteSubscription};
