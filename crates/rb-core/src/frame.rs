//! Audio and video frame buffers exchanged between the engine and consumers

use crate::descriptor::{EngineDescriptor, PixelFormat, VideoFormat};

/// Audio sample type (signed 16-bit, interleaved)
pub type Sample = i16;

/// A fixed-size batch of interleaved samples produced by one emulated frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    /// Session frame index that produced these samples
    pub frame_index: u64,
    pub channels: u16,
    pub samples: Vec<Sample>,
}

impl AudioFrame {
    /// Allocate a silent frame of `len` interleaved samples
    pub fn silent(len: usize, channels: u16) -> Self {
        Self {
            frame_index: 0,
            channels,
            samples: vec![0; len],
        }
    }

    /// Allocate a silent frame sized for `descriptor`
    pub fn for_descriptor(descriptor: &EngineDescriptor) -> Self {
        Self::silent(descriptor.audio_frame_len(), descriptor.audio.channels)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn is_silent(&self) -> bool {
        self.samples.iter().all(|&s| s == 0)
    }

    pub fn fill_silence(&mut self) {
        self.samples.fill(0);
    }

    /// Copy another frame into this one without reallocating when sizes match
    pub fn copy_from(&mut self, other: &AudioFrame) {
        self.frame_index = other.frame_index;
        self.channels = other.channels;
        if self.samples.len() == other.samples.len() {
            self.samples.copy_from_slice(&other.samples);
        } else {
            self.samples.clear();
            self.samples.extend_from_slice(&other.samples);
        }
    }
}

/// One picture buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    /// Session frame index that produced this picture
    pub frame_index: u64,
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    pub pixels: Vec<u8>,
}

impl VideoFrame {
    /// Allocate a black frame in `format`
    pub fn new(format: &VideoFormat) -> Self {
        Self {
            frame_index: 0,
            width: format.width,
            height: format.height,
            pixel_format: format.pixel_format,
            pixels: vec![0; format.frame_bytes()],
        }
    }

    /// Bytes per row
    pub fn stride(&self) -> usize {
        self.width as usize * self.pixel_format.bytes_per_pixel()
    }

    pub fn format(&self) -> VideoFormat {
        VideoFormat {
            width: self.width,
            height: self.height,
            pixel_format: self.pixel_format,
        }
    }

    /// Copy another frame into this one without reallocating when sizes match
    pub fn copy_from(&mut self, other: &VideoFrame) {
        self.frame_index = other.frame_index;
        self.width = other.width;
        self.height = other.height;
        self.pixel_format = other.pixel_format;
        if self.pixels.len() == other.pixels.len() {
            self.pixels.copy_from_slice(&other.pixels);
        } else {
            self.pixels.clear();
            self.pixels.extend_from_slice(&other.pixels);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::systems;

    #[test]
    fn test_audio_frame_sizing() {
        let frame = AudioFrame::for_descriptor(&systems::DS);
        assert_eq!(frame.channels, 2);
        assert_eq!(frame.len(), systems::DS.audio_frame_len());
        assert!(frame.is_silent());
    }

    #[test]
    fn test_video_frame_stride() {
        let frame = VideoFrame::new(&systems::GBC.video);
        assert_eq!(frame.stride(), 160 * 2);
        assert_eq!(frame.pixels.len(), 160 * 144 * 2);
    }

    #[test]
    fn test_copy_from_keeps_allocation() {
        let mut a = AudioFrame::silent(4, 2);
        let mut b = AudioFrame::silent(4, 2);
        b.samples.copy_from_slice(&[1, 2, 3, 4]);
        b.frame_index = 9;
        let ptr = a.samples.as_ptr();
        a.copy_from(&b);
        assert_eq!(a, b);
        assert_eq!(a.samples.as_ptr(), ptr);
    }
}
