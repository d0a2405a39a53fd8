//! Engine adapter contract
//!
//! Every hosted engine is wrapped in one [`EngineAdapter`] implementation.
//! The bridge only ever talks to engines through this trait, and only from
//! the session's engine thread once a game is loaded.

use rb_cheats::{ActiveCheats, ApplyReport, MemoryView};
use rb_core::{
    AudioFormat, AudioFrame, BridgeError, EngineDescriptor, SetupError, StateError, VideoFrame,
};
use rb_input::InputSnapshot;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Internal failure of a wrapped engine. Ends the session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct EngineFault(pub String);

impl From<EngineFault> for BridgeError {
    fn from(fault: EngineFault) -> Self {
        BridgeError::EngineFault(fault.0)
    }
}

/// Game image handed to `load`
#[derive(Debug, Clone, Default)]
pub struct GameAsset {
    /// Where the image was read from, if anywhere
    pub path: Option<PathBuf>,
    pub data: Vec<u8>,
    /// Battery save location; loaded after boot and flushed on pause/stop
    pub battery_path: Option<PathBuf>,
}

impl GameAsset {
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self {
            data,
            ..Default::default()
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, BridgeError> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        Ok(Self {
            path: Some(path.to_path_buf()),
            data,
            battery_path: None,
        })
    }

    pub fn with_battery_save<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.battery_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// File stem of the game image, used to name save files
    pub fn title(&self) -> String {
        self.path
            .as_deref()
            .and_then(Path::file_stem)
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "untitled".to_string())
    }
}

/// Firmware/BIOS images keyed by the identifiers engines declare
#[derive(Debug, Clone, Default)]
pub struct FirmwareSet {
    assets: HashMap<String, Vec<u8>>,
}

impl FirmwareSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, data: Vec<u8>) {
        self.assets.insert(key.into(), data);
    }

    pub fn load_file<P: AsRef<Path>>(&mut self, key: &str, path: P) -> Result<(), BridgeError> {
        let data = std::fs::read(path.as_ref())?;
        tracing::debug!(
            "Firmware '{}' read from {} ({} bytes)",
            key,
            path.as_ref().display(),
            data.len()
        );
        self.insert(key, data);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.assets.get(key).map(Vec::as_slice)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.assets.contains_key(key)
    }

    /// First required asset of `descriptor` that is absent or empty
    pub fn missing(&self, descriptor: &EngineDescriptor) -> Option<&'static str> {
        descriptor
            .required_firmware
            .iter()
            .copied()
            .find(|key| self.get(key).map_or(true, <[u8]>::is_empty))
    }
}

/// Opaque engine state, tagged with the adapter's schema version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveStateBlob {
    pub schema_version: u32,
    pub data: Vec<u8>,
}

/// Buffers one frame is produced into
pub struct FrameOutput<'a> {
    pub audio: &'a mut AudioFrame,
    pub video: &'a mut VideoFrame,
    /// `false` for skipped frames; the engine may leave `video` untouched
    pub render_video: bool,
}

/// The bridge contract every engine variant implements
pub trait EngineAdapter: Send {
    fn descriptor(&self) -> &EngineDescriptor;

    /// Boot `game`. Called with every required firmware asset present.
    fn load(&mut self, game: &GameAsset, firmware: &FirmwareSet) -> Result<(), SetupError>;

    /// Release the loaded game so the adapter can be loaded again
    fn unload(&mut self);

    /// Execute exactly one frame with `input`, writing its audio and video
    /// into `out`. Must not allocate once warmed up.
    fn run_frame(
        &mut self,
        input: &InputSnapshot,
        out: &mut FrameOutput<'_>,
    ) -> Result<(), EngineFault>;

    /// Patchable view of engine memory
    fn memory(&mut self) -> &mut dyn MemoryView;

    fn serialize_state(&self) -> Result<SaveStateBlob, StateError>;

    /// Replace the engine state with `blob`. Must validate the whole blob
    /// before touching any state, so a failure leaves the engine as it was.
    fn restore_state(&mut self, blob: &SaveStateBlob) -> Result<(), StateError>;

    /// Cartridge save RAM, if the loaded game has any
    fn battery_save(&self) -> Option<Vec<u8>> {
        None
    }

    fn load_battery(&mut self, _data: &[u8]) -> Result<(), StateError> {
        Ok(())
    }

    fn preferred_audio_format(&self) -> AudioFormat {
        self.descriptor().preferred_audio_format()
    }

    fn preferred_video_dimensions(&self) -> (u32, u32) {
        self.descriptor().preferred_video_dimensions()
    }

    /// Apply `cheats` to memory, then run one frame
    fn advance_one_frame(
        &mut self,
        input: &InputSnapshot,
        cheats: &mut ActiveCheats,
        out: &mut FrameOutput<'_>,
    ) -> Result<ApplyReport, EngineFault> {
        let report = cheats.apply(self.memory());
        self.run_frame(input, out)?;
        Ok(report)
    }
}
