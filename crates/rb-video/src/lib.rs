//! Video frame hand-off for retrobridge

pub mod swapchain;

pub use swapchain::{video_swapchain, VideoPublisher, VideoReader};
