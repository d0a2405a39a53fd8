//! Engine descriptors
//!
//! An [`EngineDescriptor`] is the immutable capability record of one engine
//! type: native timing, audio and video formats, the cheat families its
//! engine understands and the firmware assets it cannot boot without.

use crate::error::SetupError;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// System identifier (e.g. `"nes"`, `"ds"`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SystemId(pub &'static str);

impl SystemId {
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Pixel layout of a video frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Rgb565,
    Bgra8,
    Rgba8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Rgb565 => 2,
            PixelFormat::Bgra8 => 4,
            PixelFormat::Rgba8 => 4,
        }
    }
}

/// Native audio format. Samples are always signed 16-bit interleaved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

/// Native video format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoFormat {
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
}

impl VideoFormat {
    /// Size in bytes of one frame's pixel data
    pub fn frame_bytes(&self) -> usize {
        self.width as usize * self.height as usize * self.pixel_format.bytes_per_pixel()
    }
}

/// Cheat code dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CheatFamily {
    /// `AAAAAAAA:VV` plain write
    Raw,
    /// `AAAA?CC:VV` write when the current value equals `CC`
    RawCompare,
    /// NES Game Genie, 6 or 8 letters
    GameGenie,
    /// SNES Pro Action Replay, `AAAAAAVV`
    ProActionReplay,
    /// N64 GameShark, `XXXXXXXX YYYY`
    GameSharkN64,
    /// Game Boy GameShark, `01VVAAAA`
    GameSharkGbc,
    /// DS Action Replay, `XXXXXXXX YYYYYYYY`
    ActionReplayDs,
}

impl CheatFamily {
    pub const ALL: [CheatFamily; 7] = [
        CheatFamily::Raw,
        CheatFamily::RawCompare,
        CheatFamily::GameGenie,
        CheatFamily::ProActionReplay,
        CheatFamily::GameSharkN64,
        CheatFamily::GameSharkGbc,
        CheatFamily::ActionReplayDs,
    ];

    /// Family tag as supplied by hosts
    pub fn tag(&self) -> &'static str {
        match self {
            CheatFamily::Raw => "raw",
            CheatFamily::RawCompare => "raw-compare",
            CheatFamily::GameGenie => "game-genie",
            CheatFamily::ProActionReplay => "pro-action-replay",
            CheatFamily::GameSharkN64 => "gameshark-n64",
            CheatFamily::GameSharkGbc => "gameshark-gbc",
            CheatFamily::ActionReplayDs => "action-replay-ds",
        }
    }

    /// Display format. Alphanumerics are code characters, everything else
    /// is a separator.
    pub fn format(&self) -> &'static str {
        match self {
            CheatFamily::Raw => "AAAAAAAA:VV",
            CheatFamily::RawCompare => "AAAA?CC:VV",
            CheatFamily::GameGenie => "XXXXXX",
            CheatFamily::ProActionReplay => "AAAAAAVV",
            CheatFamily::GameSharkN64 => "XXXXXXXX YYYY",
            CheatFamily::GameSharkGbc => "TTVVAAAA",
            CheatFamily::ActionReplayDs => "XXXXXXXX YYYYYYYY",
        }
    }
}

impl fmt::Display for CheatFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for CheatFamily {
    type Err = crate::error::CheatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        CheatFamily::ALL
            .into_iter()
            .find(|family| family.tag() == needle)
            .ok_or_else(|| crate::error::CheatError::UnrecognizedFamily(s.to_string()))
    }
}

/// Immutable per-system capability record
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineDescriptor {
    pub system: SystemId,
    pub name: &'static str,
    /// Native frames per second
    pub frame_rate: f64,
    pub audio: AudioFormat,
    pub video: VideoFormat,
    pub cheat_families: &'static [CheatFamily],
    /// Firmware/BIOS asset keys that must be supplied to `load`
    pub required_firmware: &'static [&'static str],
    /// Extension used for battery saves
    pub save_extension: &'static str,
    /// Whether more than one instance may run in the same process
    pub reentrant: bool,
}

/// Native frame rates an engine may declare
pub const FRAME_RATE_RANGE: std::ops::RangeInclusive<f64> = 1.0..=1000.0;

impl EngineDescriptor {
    /// Reject timing and audio values the runtime cannot pace or size
    /// buffers from
    pub fn check(&self) -> Result<(), SetupError> {
        if !FRAME_RATE_RANGE.contains(&self.frame_rate) {
            return Err(SetupError::EngineInitFailure(format!(
                "{} declares frame rate {}; expected {}..={}",
                self.system,
                self.frame_rate,
                FRAME_RATE_RANGE.start(),
                FRAME_RATE_RANGE.end()
            )));
        }
        if self.audio.channels == 0 {
            return Err(SetupError::EngineInitFailure(format!(
                "{} declares zero audio channels",
                self.system
            )));
        }
        Ok(())
    }

    /// Wall-clock duration of one native frame. Out-of-range frame rates
    /// are clamped; `check` reports them.
    pub fn frame_interval(&self) -> Duration {
        let rate = if self.frame_rate.is_nan() {
            *FRAME_RATE_RANGE.end()
        } else {
            self.frame_rate
                .clamp(*FRAME_RATE_RANGE.start(), *FRAME_RATE_RANGE.end())
        };
        Duration::from_secs_f64(1.0 / rate)
    }

    /// Sample frames (per channel) produced per emulated frame
    pub fn samples_per_frame(&self) -> usize {
        (self.audio.sample_rate as f64 / self.frame_rate).round() as usize
    }

    /// Interleaved sample count of one [`crate::AudioFrame`]
    pub fn audio_frame_len(&self) -> usize {
        self.samples_per_frame() * self.audio.channels as usize
    }

    pub fn supports_cheat_family(&self, family: CheatFamily) -> bool {
        self.cheat_families.contains(&family)
    }

    pub fn preferred_audio_format(&self) -> AudioFormat {
        self.audio
    }

    pub fn preferred_video_dimensions(&self) -> (u32, u32) {
        (self.video.width, self.video.height)
    }
}

/// Descriptors of the built-in systems
pub mod systems {
    use super::*;

    pub const NES: EngineDescriptor = EngineDescriptor {
        system: SystemId("nes"),
        name: "Nintendo Entertainment System",
        frame_rate: 60.0988,
        audio: AudioFormat { sample_rate: 44100, channels: 2 },
        video: VideoFormat { width: 256, height: 240, pixel_format: PixelFormat::Rgb565 },
        cheat_families: &[CheatFamily::GameGenie, CheatFamily::Raw, CheatFamily::RawCompare],
        required_firmware: &[],
        save_extension: "sav",
        reentrant: false,
    };

    pub const SNES: EngineDescriptor = EngineDescriptor {
        system: SystemId("snes"),
        name: "Super Nintendo Entertainment System",
        frame_rate: 60.0988,
        audio: AudioFormat { sample_rate: 32040, channels: 2 },
        video: VideoFormat { width: 256, height: 224, pixel_format: PixelFormat::Rgb565 },
        cheat_families: &[CheatFamily::ProActionReplay, CheatFamily::Raw, CheatFamily::RawCompare],
        required_firmware: &[],
        save_extension: "srm",
        reentrant: false,
    };

    pub const GBC: EngineDescriptor = EngineDescriptor {
        system: SystemId("gbc"),
        name: "Game Boy Color",
        frame_rate: 59.7275,
        audio: AudioFormat { sample_rate: 48000, channels: 2 },
        video: VideoFormat { width: 160, height: 144, pixel_format: PixelFormat::Rgb565 },
        cheat_families: &[CheatFamily::GameSharkGbc, CheatFamily::Raw],
        required_firmware: &[],
        save_extension: "sav",
        reentrant: false,
    };

    pub const GBA: EngineDescriptor = EngineDescriptor {
        system: SystemId("gba"),
        name: "Game Boy Advance",
        frame_rate: 59.7275,
        audio: AudioFormat { sample_rate: 32768, channels: 2 },
        video: VideoFormat { width: 240, height: 160, pixel_format: PixelFormat::Bgra8 },
        cheat_families: &[CheatFamily::Raw, CheatFamily::RawCompare],
        required_firmware: &[],
        save_extension: "sav",
        reentrant: false,
    };

    pub const N64: EngineDescriptor = EngineDescriptor {
        system: SystemId("n64"),
        name: "Nintendo 64",
        frame_rate: 60.0,
        audio: AudioFormat { sample_rate: 44100, channels: 2 },
        video: VideoFormat { width: 640, height: 480, pixel_format: PixelFormat::Rgba8 },
        cheat_families: &[CheatFamily::GameSharkN64],
        required_firmware: &[],
        save_extension: "sav",
        reentrant: false,
    };

    pub const DS: EngineDescriptor = EngineDescriptor {
        system: SystemId("ds"),
        name: "Nintendo DS",
        frame_rate: 59.8261,
        audio: AudioFormat { sample_rate: 32768, channels: 2 },
        video: VideoFormat { width: 256, height: 384, pixel_format: PixelFormat::Bgra8 },
        cheat_families: &[CheatFamily::ActionReplayDs],
        required_firmware: &["bios7", "bios9", "firmware"],
        save_extension: "dsv",
        reentrant: false,
    };

    pub const GENESIS: EngineDescriptor = EngineDescriptor {
        system: SystemId("genesis"),
        name: "Sega Genesis",
        frame_rate: 59.9227,
        audio: AudioFormat { sample_rate: 44100, channels: 2 },
        video: VideoFormat { width: 320, height: 224, pixel_format: PixelFormat::Rgb565 },
        cheat_families: &[CheatFamily::Raw, CheatFamily::RawCompare],
        required_firmware: &[],
        save_extension: "srm",
        reentrant: false,
    };

    /// All built-in descriptors
    pub const ALL: [EngineDescriptor; 7] = [NES, SNES, GBC, GBA, N64, DS, GENESIS];

    /// Look up a built-in descriptor by system id
    pub fn find(system: &str) -> Option<EngineDescriptor> {
        ALL.into_iter().find(|d| d.system.as_str() == system)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_samples_per_frame() {
        let mut desc = systems::NES;
        desc.frame_rate = 60.0;
        desc.audio.sample_rate = 48000;
        assert_eq!(desc.samples_per_frame(), 800);
        assert_eq!(desc.audio_frame_len(), 1600);
    }

    #[test]
    fn test_descriptor_check() {
        for desc in systems::ALL {
            assert!(desc.check().is_ok(), "{}", desc.system);
        }

        let mut desc = systems::NES;
        for bad in [0.0, -60.0, f64::NAN, f64::INFINITY, 1e9] {
            desc.frame_rate = bad;
            assert!(desc.check().is_err(), "frame rate {}", bad);
            // Never panics, whatever the declared rate
            assert!(desc.frame_interval() > Duration::ZERO);
        }

        let mut desc = systems::NES;
        desc.audio.channels = 0;
        assert!(matches!(desc.check(), Err(SetupError::EngineInitFailure(_))));
    }

    #[test]
    fn test_frame_bytes() {
        assert_eq!(systems::DS.video.frame_bytes(), 256 * 384 * 4);
        assert_eq!(systems::NES.video.frame_bytes(), 256 * 240 * 2);
    }

    #[test]
    fn test_cheat_family_tags() {
        for family in CheatFamily::ALL {
            assert_eq!(family.tag().parse::<CheatFamily>().unwrap(), family);
        }
        assert_eq!("GAME-GENIE".parse::<CheatFamily>().unwrap(), CheatFamily::GameGenie);
        assert!("codebreaker".parse::<CheatFamily>().is_err());
    }

    #[test]
    fn test_find_system() {
        let ds = systems::find("ds").unwrap();
        assert_eq!(ds.required_firmware, &["bios7", "bios9", "firmware"]);
        assert!(ds.supports_cheat_family(CheatFamily::ActionReplayDs));
        assert!(!ds.supports_cheat_family(CheatFamily::GameGenie));
        assert!(systems::find("psx").is_none());
    }
}
