//! Deterministic stand-in engine
//!
//! Implements the full adapter contract for any descriptor without emulating
//! real hardware. Each frame it bumps counters in work RAM, records the
//! input it saw, draws a test pattern derived from its state and emits a
//! square wave whose pitch follows the A button. Everything it produces is a
//! pure function of its state and input, so save/restore round trips are
//! observable bit for bit.

use crate::adapter::{EngineAdapter, EngineFault, FirmwareSet, FrameOutput, GameAsset, SaveStateBlob};
use rb_cheats::{AddressSpace, MemoryView, Width};
use rb_core::{EngineDescriptor, SetupError, StateError};
use rb_input::{Buttons, InputSnapshot};

/// Save-state layout version produced by [`NullEngine`]
pub const NULL_SCHEMA_VERSION: u32 = 1;

/// Size of the work RAM address space
pub const RAM_SIZE: usize = 0x1_0000;

/// Incremented every frame
pub const FRAME_COUNTER_ADDR: u32 = 0x0000;
/// 32-bit little-endian count of frames run
pub const FRAME_TOTAL_ADDR: u32 = 0x0010;
/// Player 1 buttons seen by the last frame (32-bit)
pub const INPUT_ADDR: u32 = 0x0020;
/// Battery-backed region
pub const BATTERY_BASE: usize = 0xE000;
pub const BATTERY_SIZE: usize = 0x2000;

const STATE_LEN: usize = RAM_SIZE + 8 + 4;
const AMPLITUDE: i16 = 0x1000;

/// Work RAM plus a patchable copy of the game image
struct NullMemory {
    ram: Vec<u8>,
    rom: Vec<u8>,
}

impl NullMemory {
    fn bank(&self, space: AddressSpace) -> &[u8] {
        match space {
            AddressSpace::Main => &self.ram,
            AddressSpace::Rom => &self.rom,
        }
    }
}

impl MemoryView for NullMemory {
    fn read(&self, space: AddressSpace, address: u32, width: Width) -> Option<u32> {
        let start = address as usize;
        let bytes = self.bank(space).get(start..start + width.bytes())?;
        Some(
            bytes
                .iter()
                .rev()
                .fold(0u32, |acc, &byte| (acc << 8) | byte as u32),
        )
    }

    fn write(&mut self, space: AddressSpace, address: u32, width: Width, value: u32) -> bool {
        let bank = match space {
            AddressSpace::Main => &mut self.ram,
            AddressSpace::Rom => &mut self.rom,
        };
        let start = address as usize;
        match bank.get_mut(start..start + width.bytes()) {
            Some(bytes) => {
                for (i, byte) in bytes.iter_mut().enumerate() {
                    *byte = (value >> (8 * i)) as u8;
                }
                true
            }
            None => false,
        }
    }
}

/// Reference engine used by the host binary and the test suite
pub struct NullEngine {
    descriptor: EngineDescriptor,
    memory: NullMemory,
    loaded: bool,
    /// Frames run since boot
    frames: u64,
    /// Square wave position in samples
    phase: u32,
    /// Frame at which `run_frame` reports a fault
    fault_at: Option<u64>,
}

impl NullEngine {
    pub fn new(descriptor: EngineDescriptor) -> Self {
        Self {
            descriptor,
            memory: NullMemory {
                ram: vec![0; RAM_SIZE],
                rom: Vec::new(),
            },
            loaded: false,
            frames: 0,
            phase: 0,
            fault_at: None,
        }
    }

    /// Make the engine fail once it has run `frame` frames
    pub fn with_fault_at(mut self, frame: u64) -> Self {
        self.fault_at = Some(frame);
        self
    }

    pub fn frames_run(&self) -> u64 {
        self.frames
    }

    pub fn ram(&self) -> &[u8] {
        &self.memory.ram
    }

    fn step_memory(&mut self, input: &InputSnapshot) {
        let ram = &mut self.memory.ram;
        ram[FRAME_COUNTER_ADDR as usize] = ram[FRAME_COUNTER_ADDR as usize].wrapping_add(1);

        let total = FRAME_TOTAL_ADDR as usize;
        ram[total..total + 4].copy_from_slice(&(self.frames as u32).to_le_bytes());

        let buttons = input.players[0].buttons.bits();
        let input_addr = INPUT_ADDR as usize;
        ram[input_addr..input_addr + 4].copy_from_slice(&buttons.to_le_bytes());

        // Something worth keeping in the battery region
        let slot = BATTERY_BASE + (self.frames as usize % BATTERY_SIZE);
        ram[slot] = ram[slot].wrapping_add(ram[FRAME_COUNTER_ADDR as usize]);
    }

    fn draw(&self, out: &mut FrameOutput<'_>) {
        let seed = self.memory.ram[FRAME_COUNTER_ADDR as usize];
        let stride = out.video.stride();
        let rom_byte = self.memory.rom.first().copied().unwrap_or(0);
        for (row, line) in out.video.pixels.chunks_mut(stride.max(1)).enumerate() {
            let shade = (row as u8).wrapping_add(seed).wrapping_add(rom_byte);
            line.fill(shade);
        }
    }

    fn synthesize(&mut self, input: &InputSnapshot, out: &mut FrameOutput<'_>) {
        let channels = out.audio.channels.max(1) as usize;
        let half_period = if input.players[0].is_pressed(Buttons::A) {
            self.descriptor.audio.sample_rate / 880 / 2
        } else {
            self.descriptor.audio.sample_rate / 440 / 2
        }
        .max(1);

        for sample_frame in out.audio.samples.chunks_mut(channels) {
            let high = (self.phase / half_period) % 2 == 0;
            sample_frame.fill(if high { AMPLITUDE } else { -AMPLITUDE });
            self.phase = self.phase.wrapping_add(1);
        }
    }
}

impl EngineAdapter for NullEngine {
    fn descriptor(&self) -> &EngineDescriptor {
        &self.descriptor
    }

    fn load(&mut self, game: &GameAsset, firmware: &FirmwareSet) -> Result<(), SetupError> {
        if let Some(key) = firmware.missing(&self.descriptor) {
            return Err(SetupError::MissingFirmware(key.to_string()));
        }
        if game.data.is_empty() {
            return Err(SetupError::UnsupportedFormat("empty game image".to_string()));
        }

        self.memory.ram.fill(0);
        self.memory.rom.clear();
        self.memory.rom.extend_from_slice(&game.data);
        self.frames = 0;
        self.phase = 0;
        self.loaded = true;
        tracing::debug!(
            "Null {} engine booted {} bytes",
            self.descriptor.system,
            game.data.len()
        );
        Ok(())
    }

    fn unload(&mut self) {
        self.loaded = false;
        self.memory.rom.clear();
        self.memory.ram.fill(0);
    }

    fn run_frame(
        &mut self,
        input: &InputSnapshot,
        out: &mut FrameOutput<'_>,
    ) -> Result<(), EngineFault> {
        if !self.loaded {
            return Err(EngineFault("no game loaded".to_string()));
        }
        if self.fault_at == Some(self.frames) {
            return Err(EngineFault(format!("injected fault at frame {}", self.frames)));
        }

        self.step_memory(input);
        if out.render_video {
            self.draw(out);
        }
        self.synthesize(input, out);
        self.frames += 1;
        Ok(())
    }

    fn memory(&mut self) -> &mut dyn MemoryView {
        &mut self.memory
    }

    fn serialize_state(&self) -> Result<SaveStateBlob, StateError> {
        let mut data = Vec::with_capacity(STATE_LEN);
        data.extend_from_slice(&self.memory.ram);
        data.extend_from_slice(&self.frames.to_le_bytes());
        data.extend_from_slice(&self.phase.to_le_bytes());
        Ok(SaveStateBlob {
            schema_version: NULL_SCHEMA_VERSION,
            data,
        })
    }

    fn restore_state(&mut self, blob: &SaveStateBlob) -> Result<(), StateError> {
        if blob.schema_version != NULL_SCHEMA_VERSION {
            return Err(StateError::IncompatibleSchema {
                expected: NULL_SCHEMA_VERSION.to_string(),
                found: blob.schema_version.to_string(),
            });
        }
        if blob.data.len() != STATE_LEN {
            return Err(StateError::CorruptBlob(format!(
                "expected {} bytes, found {}",
                STATE_LEN,
                blob.data.len()
            )));
        }

        let (ram, rest) = blob.data.split_at(RAM_SIZE);
        let (frames, phase) = rest.split_at(8);
        let mut frame_bytes = [0u8; 8];
        frame_bytes.copy_from_slice(frames);
        let mut phase_bytes = [0u8; 4];
        phase_bytes.copy_from_slice(phase);

        self.memory.ram.copy_from_slice(ram);
        self.frames = u64::from_le_bytes(frame_bytes);
        self.phase = u32::from_le_bytes(phase_bytes);
        Ok(())
    }

    fn battery_save(&self) -> Option<Vec<u8>> {
        if !self.loaded {
            return None;
        }
        Some(self.memory.ram[BATTERY_BASE..BATTERY_BASE + BATTERY_SIZE].to_vec())
    }

    fn load_battery(&mut self, data: &[u8]) -> Result<(), StateError> {
        if data.len() != BATTERY_SIZE {
            return Err(StateError::CorruptBlob(format!(
                "battery save is {} bytes, expected {}",
                data.len(),
                BATTERY_SIZE
            )));
        }
        self.memory.ram[BATTERY_BASE..BATTERY_BASE + BATTERY_SIZE].copy_from_slice(data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rb_cheats::{ActiveCheats, CheatStage};
    use rb_core::descriptor::systems;
    use rb_core::{AudioFrame, VideoFrame};

    fn booted(descriptor: EngineDescriptor) -> NullEngine {
        let mut engine = NullEngine::new(descriptor);
        engine
            .load(&GameAsset::from_bytes(vec![0x42; 64]), &FirmwareSet::new())
            .unwrap();
        engine
    }

    fn run(engine: &mut NullEngine, input: &InputSnapshot) -> (AudioFrame, VideoFrame) {
        let desc = *engine.descriptor();
        let mut audio = AudioFrame::for_descriptor(&desc);
        let mut video = VideoFrame::new(&desc.video);
        let mut out = FrameOutput {
            audio: &mut audio,
            video: &mut video,
            render_video: true,
        };
        engine.run_frame(input, &mut out).unwrap();
        (audio, video)
    }

    #[test]
    fn test_requires_firmware() {
        let mut engine = NullEngine::new(systems::DS);
        let err = engine
            .load(&GameAsset::from_bytes(vec![1]), &FirmwareSet::new())
            .unwrap_err();
        assert_eq!(err, SetupError::MissingFirmware("bios7".to_string()));
    }

    #[test]
    fn test_rejects_empty_game() {
        let mut engine = NullEngine::new(systems::NES);
        let err = engine
            .load(&GameAsset::default(), &FirmwareSet::new())
            .unwrap_err();
        assert!(matches!(err, SetupError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_frame_output() {
        let mut engine = booted(systems::NES);
        let (audio, video) = run(&mut engine, &InputSnapshot::default());
        assert!(!audio.is_silent());
        assert_eq!(video.pixels.len(), systems::NES.video.frame_bytes());
        assert_eq!(engine.frames_run(), 1);
        assert_eq!(engine.ram()[FRAME_COUNTER_ADDR as usize], 1);
    }

    #[test]
    fn test_input_reaches_memory() {
        let mut engine = booted(systems::NES);
        let mut input = InputSnapshot::default();
        input.players[0].buttons = Buttons::A | Buttons::START;
        run(&mut engine, &input);
        let seen = engine
            .memory()
            .read(AddressSpace::Main, INPUT_ADDR, Width::U32)
            .unwrap();
        assert_eq!(seen, (Buttons::A | Buttons::START).bits());
    }

    #[test]
    fn test_cheat_reasserted_every_frame() {
        let mut engine = booted(systems::GBA);
        let stage = CheatStage::new(&systems::GBA);
        stage.insert("raw", "0000:63").unwrap();
        let mut cheats = ActiveCheats::new();
        cheats.sync(&stage);

        let desc = systems::GBA;
        let mut audio = AudioFrame::for_descriptor(&desc);
        let mut video = VideoFrame::new(&desc.video);
        for _ in 0..3 {
            let mut out = FrameOutput {
                audio: &mut audio,
                video: &mut video,
                render_video: false,
            };
            let report = engine
                .advance_one_frame(&InputSnapshot::default(), &mut cheats, &mut out)
                .unwrap();
            assert_eq!(report.applied, 1);
            // Cheat wrote 0x63, then the frame incremented it
            assert_eq!(engine.ram()[0], 0x64);
        }
    }

    #[test]
    fn test_state_round_trip_is_deterministic() {
        let mut engine = booted(systems::SNES);
        let idle = InputSnapshot::default();
        run(&mut engine, &idle);
        let blob = engine.serialize_state().unwrap();

        let first: Vec<_> = (0..5).map(|_| run(&mut engine, &idle)).collect();
        engine.restore_state(&blob).unwrap();
        let second: Vec<_> = (0..5).map(|_| run(&mut engine, &idle)).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_bad_blob_leaves_state_untouched() {
        let mut engine = booted(systems::SNES);
        run(&mut engine, &InputSnapshot::default());
        let before = engine.serialize_state().unwrap();

        let mut wrong_schema = before.clone();
        wrong_schema.schema_version = 99;
        assert!(matches!(
            engine.restore_state(&wrong_schema),
            Err(StateError::IncompatibleSchema { .. })
        ));

        let mut truncated = before.clone();
        truncated.data.truncate(100);
        assert!(matches!(
            engine.restore_state(&truncated),
            Err(StateError::CorruptBlob(_))
        ));

        assert_eq!(engine.serialize_state().unwrap(), before);
    }

    #[test]
    fn test_battery_round_trip() {
        let mut engine = booted(systems::GBC);
        run(&mut engine, &InputSnapshot::default());
        let battery = engine.battery_save().unwrap();
        assert_eq!(battery.len(), BATTERY_SIZE);

        let mut fresh = booted(systems::GBC);
        fresh.load_battery(&battery).unwrap();
        assert_eq!(fresh.battery_save().unwrap(), battery);
        assert!(fresh.load_battery(&[0; 4]).is_err());
    }

    #[test]
    fn test_injected_fault() {
        let mut engine = booted(systems::NES).with_fault_at(1);
        run(&mut engine, &InputSnapshot::default());

        let desc = systems::NES;
        let mut audio = AudioFrame::for_descriptor(&desc);
        let mut video = VideoFrame::new(&desc.video);
        let mut out = FrameOutput {
            audio: &mut audio,
            video: &mut video,
            render_video: true,
        };
        assert!(engine.run_frame(&InputSnapshot::default(), &mut out).is_err());
    }
}
