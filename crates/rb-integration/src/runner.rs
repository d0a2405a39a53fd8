//! Host control surface
//!
//! [`Bridge`] is what a host holds: it owns one engine adapter, drives the
//! session lifecycle, and hands out the input, cheat, save-state and
//! audio/video endpoints of the loaded session. All methods are called from
//! the host/control thread; only lifecycle hand-offs and save/restore wait on
//! the engine thread, and only until it reaches the next frame boundary.

use crate::adapter::{EngineAdapter, FirmwareSet, GameAsset, SaveStateBlob};
use crate::engine_thread::{self, Command, FrameLoop, SessionCounters};
use crate::pacing::FramePacer;
use crate::registry::{EngineInstance, InstanceLease};
use crate::savestate::{self, SaveStateManager};
use crate::session::{LifecycleOp, SessionState};
use crossbeam::channel::{self, Sender};
use rb_audio::{
    audio_ring_with_mute, frames_for_duration, AudioConsumer, AudioRoute, AudioRouter, RingMonitor,
};
use rb_cheats::{CheatHandle, CheatStage, CheatSummary};
use rb_core::config;
use rb_core::{
    AudioFormat, BridgeError, Clock, Config, EngineDescriptor, LifecycleError, Result, SetupError,
    SystemClock, VideoFormat, VideoFrame,
};
use rb_input::{InputAggregator, InputDelta, InputHandle, InputSource};
use rb_video::{video_swapchain, VideoReader};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;

/// Snapshot of session health for host display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStats {
    pub system: &'static str,
    pub state: SessionState,
    pub frames_advanced: u64,
    pub frames_dropped: u64,
    pub ticks: u64,
    /// Time owed to not-yet-advanced frames, in milliseconds
    pub drift_ms: f64,
    pub frame_interval_ms: f64,
    pub rate: f64,
    pub audio_frames_pushed: u64,
    pub audio_frames_delivered: u64,
    pub audio_overruns: u64,
    pub audio_underruns: u64,
    pub video_frames_published: u64,
    pub cheats_active: usize,
    pub cheats_applied: u64,
    pub cheats_rejected: u64,
    pub input_snapshots: u64,
    pub input_deltas: u64,
}

/// Endpoints of one loaded game
struct Session {
    commands: Sender<Command>,
    thread: Option<JoinHandle<Box<dyn EngineAdapter>>>,
    input: Arc<InputAggregator>,
    cheats: Arc<CheatStage>,
    counters: Arc<SessionCounters>,
    audio_monitor: Option<RingMonitor>,
    audio_consumer: Option<AudioConsumer>,
    video_reader: Option<VideoReader>,
    battery_path: Option<PathBuf>,
    title: String,
    audio_format: AudioFormat,
    video_format: VideoFormat,
}

/// Uniform control surface over one engine adapter
pub struct Bridge {
    config: Config,
    descriptor: EngineDescriptor,
    /// `None` while the engine thread owns the adapter
    adapter: Option<Box<dyn EngineAdapter>>,
    _lease: Option<InstanceLease>,
    clock: Arc<dyn Clock>,
    router: AudioRouter,
    saves: SaveStateManager,
    rate: f64,
    state: SessionState,
    session: Option<Session>,
}

impl Bridge {
    pub fn new(engine: impl Into<EngineInstance>, config: Config) -> Self {
        let EngineInstance { adapter, lease } = engine.into();
        let descriptor = *adapter.descriptor();
        let saves = SaveStateManager::new(descriptor.system, &config.save_states);

        tracing::info!("Bridge created for {}", descriptor.name);
        Self {
            config,
            descriptor,
            adapter: Some(adapter),
            _lease: lease,
            clock: Arc::new(SystemClock::new()),
            router: AudioRouter::new(),
            saves,
            rate: 1.0,
            state: SessionState::Unloaded,
            session: None,
        }
    }

    /// Use `clock` for pacing sessions loaded from now on
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn descriptor(&self) -> &EngineDescriptor {
        &self.descriptor
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Current lifecycle state. A session whose engine faulted reports
    /// `Stopped` even before `stop()` reclaims it.
    pub fn state(&self) -> SessionState {
        match &self.session {
            Some(session) if session.counters.faulted() => SessionState::Stopped,
            _ => self.state,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == SessionState::Running
    }

    pub fn is_paused(&self) -> bool {
        self.state() == SessionState::Paused
    }

    /// Message of the engine fault that ended the current session, if any
    pub fn last_fault(&self) -> Option<String> {
        self.session.as_ref().and_then(|s| s.counters.fault())
    }

    fn transition(&self, op: LifecycleOp) -> Result<SessionState> {
        let state = self.state();
        state.after(op).ok_or_else(|| {
            LifecycleError::InvalidTransition {
                op: op.as_str(),
                state: state.as_str(),
            }
            .into()
        })
    }

    fn session(&self) -> Result<&Session> {
        match &self.session {
            Some(session) if self.state().has_session() => Ok(session),
            _ => Err(LifecycleError::NoSession.into()),
        }
    }

    fn send(&self, command: Command) -> Result<()> {
        let session = self.session()?;
        session
            .commands
            .send(command)
            .map_err(|_| self.thread_gone())
    }

    fn thread_gone(&self) -> BridgeError {
        let reason = self
            .last_fault()
            .unwrap_or_else(|| "engine thread exited".to_string());
        BridgeError::EngineFault(reason)
    }

    /// Send a command carrying a reply channel and wait for the answer
    fn request<T>(&self, command: impl FnOnce(Sender<T>) -> Command) -> Result<T> {
        let (tx, rx) = channel::bounded(1);
        self.send(command(tx))?;
        rx.recv().map_err(|_| self.thread_gone())
    }

    /// Boot `game` and create a session. Fails without creating anything if
    /// a required firmware asset is missing or the engine refuses the game.
    pub fn load(&mut self, game: GameAsset, firmware: &FirmwareSet) -> Result<()> {
        let next = self.transition(LifecycleOp::Load)?;
        self.teardown();

        let desc = self.descriptor;
        desc.check()?;
        if let Some(key) = firmware.missing(&desc) {
            tracing::warn!("Cannot load {}: firmware '{}' missing", desc.name, key);
            return Err(SetupError::MissingFirmware(key.to_string()).into());
        }

        let mut adapter = self.adapter.take().ok_or_else(|| {
            SetupError::EngineInitFailure("engine instance was lost".to_string())
        })?;
        if let Err(e) = adapter.load(&game, firmware) {
            tracing::warn!("{} refused the game: {}", desc.name, e);
            adapter.unload();
            self.adapter = Some(adapter);
            return Err(e.into());
        }

        if let Some(path) = &game.battery_path {
            if path.exists() {
                match std::fs::read(path) {
                    Ok(data) => {
                        if let Err(e) = adapter.load_battery(&data) {
                            tracing::warn!("Ignoring battery save {}: {}", path.display(), e);
                        }
                    }
                    Err(e) => tracing::warn!("Cannot read battery save {}: {}", path.display(), e),
                }
            }
        }

        // Buffers are sized once, from what the engine asks for
        let mut sizing = desc;
        sizing.audio = adapter.preferred_audio_format();
        let (width, height) = adapter.preferred_video_dimensions();
        sizing.video.width = width;
        sizing.video.height = height;
        if let Err(e) = sizing.check() {
            tracing::warn!("{} asked for unusable buffers: {}", desc.name, e);
            adapter.unload();
            self.adapter = Some(adapter);
            return Err(e.into());
        }

        let (producer, consumer) = if self.config.audio.enabled {
            let capacity = frames_for_duration(self.config.audio.buffer_ms, sizing.frame_rate);
            let (producer, consumer) = audio_ring_with_mute(
                capacity,
                sizing.audio_frame_len(),
                sizing.audio.channels,
                self.router.mute_switch(),
            );
            (Some(producer), Some(consumer))
        } else {
            (None, None)
        };
        let audio_monitor = producer.as_ref().map(|p| p.monitor());
        let (publisher, reader) = video_swapchain(&sizing.video);

        let input = Arc::new(InputAggregator::new(self.config.input.max_players));
        let cheats = Arc::new(CheatStage::new(&desc));
        let mut pacer = FramePacer::new(&desc, &self.config.pacing);
        pacer.set_rate(self.rate);

        let frame_loop = FrameLoop::new(
            adapter,
            Arc::clone(&input),
            Arc::clone(&cheats),
            producer,
            publisher,
            pacer,
        );
        let counters = frame_loop.counters();

        let (commands, receiver) = channel::unbounded();
        let thread = engine_thread::spawn(
            frame_loop,
            Arc::clone(&self.clock),
            receiver,
            format!("rb-engine-{}", desc.system),
        )
        .map_err(|e| SetupError::EngineInitFailure(format!("cannot spawn engine thread: {}", e)))?;

        let title = game.title();
        tracing::info!("Loaded '{}' on {}", title, desc.name);
        self.session = Some(Session {
            commands,
            thread: Some(thread),
            input,
            cheats,
            counters,
            audio_monitor,
            audio_consumer: consumer,
            video_reader: Some(reader),
            battery_path: game.battery_path,
            title,
            audio_format: sizing.audio,
            video_format: sizing.video,
        });
        self.state = next;
        Ok(())
    }

    /// Begin pacing a freshly loaded session
    pub fn start(&mut self) -> Result<()> {
        let next = self.transition(LifecycleOp::Start)?;
        self.send(Command::Run)?;
        tracing::info!("Starting {}", self.descriptor.name);
        self.state = next;
        Ok(())
    }

    /// Stop advancing frames. Returns once the engine is at a frame boundary.
    pub fn pause(&mut self) -> Result<()> {
        let next = self.transition(LifecycleOp::Pause)?;
        let battery = self.request(Command::Pause)?;
        self.flush_battery(battery);
        tracing::info!("Paused {}", self.descriptor.name);
        self.state = next;
        Ok(())
    }

    pub fn resume(&mut self) -> Result<()> {
        let next = self.transition(LifecycleOp::Resume)?;
        self.send(Command::Run)?;
        tracing::info!("Resuming {}", self.descriptor.name);
        self.state = next;
        Ok(())
    }

    /// Advance exactly one frame while paused. Returns the number of frames
    /// advanced so far.
    pub fn frame_step(&mut self) -> Result<u64> {
        self.transition(LifecycleOp::Step)?;
        let frames = self.request(Command::Step)??;
        tracing::debug!("Stepped to frame {}", frames);
        Ok(frames)
    }

    /// End the session. Safe to call in any state and any number of times;
    /// once it returns the engine thread has exited and the adapter can be
    /// loaded again.
    pub fn stop(&mut self) -> Result<()> {
        let next = self
            .state()
            .after(LifecycleOp::Stop)
            .unwrap_or(SessionState::Stopped);
        if self.session.is_some() {
            tracing::info!("Stopping {}", self.descriptor.name);
            if self.config.save_states.auto_save_on_stop && self.state().has_session() {
                self.auto_save();
            }
            self.teardown();
        }
        self.state = next;
        Ok(())
    }

    fn auto_save(&self) {
        let Some(session) = &self.session else {
            return;
        };
        let path = self.saves.auto_path(&session.title);
        if let Err(e) = self.save_state(&path) {
            tracing::warn!("Automatic save state for '{}' failed: {}", session.title, e);
        }
    }

    /// Join the engine thread, flush the battery save and reclaim the
    /// adapter. Leaves the bridge `Stopped` if a session was torn down.
    fn teardown(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        self.state = SessionState::Stopped;

        let (ack_tx, ack_rx) = channel::bounded(1);
        if session.commands.send(Command::Stop(ack_tx)).is_ok() {
            let _ = ack_rx.recv();
        }

        let Some(thread) = session.thread.take() else {
            return;
        };
        match thread.join() {
            Ok(mut adapter) => {
                if let Some(path) = &session.battery_path {
                    write_battery(path, adapter.battery_save());
                }
                adapter.unload();
                self.adapter = Some(adapter);
            }
            Err(_) => {
                tracing::error!("Engine thread panicked; {} instance lost", self.descriptor.name)
            }
        }
    }

    fn flush_battery(&self, data: Option<Vec<u8>>) {
        if let Some(path) = self.session.as_ref().and_then(|s| s.battery_path.as_ref()) {
            write_battery(path, data);
        }
    }

    /// Posting handle for one input source
    pub fn input_handle(&self, source: InputSource) -> Result<InputHandle> {
        let session = self.session()?;
        Ok(InputHandle::new(Arc::clone(&session.input), source))
    }

    /// Post one input delta; `Ok(false)` if its player is out of range
    pub fn post_input(&self, delta: InputDelta) -> Result<bool> {
        Ok(self.session()?.input.post(delta))
    }

    /// Decode and activate a cheat. Takes effect at the next frame.
    pub fn add_cheat(&self, family: &str, code: &str) -> Result<CheatHandle> {
        Ok(self.session()?.cheats.insert(family, code)?)
    }

    pub fn remove_cheat(&self, handle: CheatHandle) -> Result<()> {
        Ok(self.session()?.cheats.remove(handle)?)
    }

    pub fn cheats(&self) -> Vec<CheatSummary> {
        self.session
            .as_ref()
            .map(|s| s.cheats.list())
            .unwrap_or_default()
    }

    /// Capture engine state at the next frame boundary
    pub fn snapshot(&self) -> Result<SaveStateBlob> {
        Ok(self.request(Command::Save)??)
    }

    /// Replace engine state at the next frame boundary. On error the
    /// session continues from its previous state.
    pub fn restore(&self, blob: SaveStateBlob) -> Result<()> {
        self.request(|reply| Command::Restore(blob, reply))??;
        tracing::info!("Restored state for {}", self.descriptor.name);
        Ok(())
    }

    pub fn save_state(&self, path: &Path) -> Result<()> {
        let blob = self.snapshot()?;
        self.saves.save(path, &blob)
    }

    pub fn load_state(&self, path: &Path) -> Result<()> {
        self.session()?;
        let blob = self.saves.load(path)?;
        self.restore(blob)
    }

    /// Save into numbered slot `slot` under the configured directory
    pub fn save_slot(&self, slot: u32) -> Result<PathBuf> {
        let path = self.saves.slot_path(&self.session()?.title, slot);
        self.save_state(&path)?;
        Ok(path)
    }

    pub fn load_slot(&self, slot: u32) -> Result<()> {
        let path = self.saves.slot_path(&self.session()?.title, slot);
        self.load_state(&path)
    }

    /// Where the automatic save state of the loaded game lives
    pub fn auto_state_path(&self) -> Result<PathBuf> {
        Ok(self.saves.auto_path(&self.session()?.title))
    }

    /// Restore the state kept automatically when this game was last stopped
    pub fn load_auto_state(&self) -> Result<()> {
        let path = self.auto_state_path()?;
        self.load_state(&path)
    }

    /// Set the emulation rate (1.0 nominal), within
    /// `config::MIN_RATE..=config::MAX_RATE`. Kept across sessions.
    pub fn set_rate(&mut self, rate: f64) -> Result<()> {
        if !config::rate_in_range(rate) {
            return Err(BridgeError::Config(format!(
                "emulation rate {} outside {}..={}",
                rate,
                config::MIN_RATE,
                config::MAX_RATE
            )));
        }
        self.rate = rate;
        if self.state().has_session() {
            self.send(Command::SetRate(rate))?;
        }
        Ok(())
    }

    pub fn set_fast_forward(&mut self, enabled: bool) -> Result<()> {
        let rate = if enabled {
            self.config.pacing.fast_forward_rate
        } else {
            1.0
        };
        self.set_rate(rate)
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Audio format of the loaded session, or the engine's native one
    pub fn audio_format(&self) -> AudioFormat {
        self.session
            .as_ref()
            .map_or(self.descriptor.audio, |s| s.audio_format)
    }

    pub fn video_format(&self) -> VideoFormat {
        self.session
            .as_ref()
            .map_or(self.descriptor.video, |s| s.video_format)
    }

    /// Hand the audio drain end to the audio output thread
    pub fn take_audio_consumer(&mut self) -> Option<AudioConsumer> {
        self.session.as_mut().and_then(|s| s.audio_consumer.take())
    }

    /// Hand the video read end to the render thread
    pub fn take_video_reader(&mut self) -> Option<VideoReader> {
        self.session.as_mut().and_then(|s| s.video_reader.take())
    }

    /// Copy of the latest published frame, while the reader is still held
    /// by the bridge
    pub fn current_video_frame(&mut self) -> Option<VideoFrame> {
        let reader = self.session.as_mut()?.video_reader.as_mut()?;
        let frame = reader.latest()?;
        Some(frame.clone())
    }

    pub fn audio_router(&self) -> &AudioRouter {
        &self.router
    }

    pub fn set_audio_route(&self, route: AudioRoute) {
        self.router.publish(route);
    }

    pub fn stats(&self) -> SessionStats {
        let mut stats = SessionStats {
            system: self.descriptor.system.as_str(),
            state: self.state(),
            frames_advanced: 0,
            frames_dropped: 0,
            ticks: 0,
            drift_ms: 0.0,
            frame_interval_ms: self.descriptor.frame_interval().as_secs_f64() * 1000.0,
            rate: self.rate,
            audio_frames_pushed: 0,
            audio_frames_delivered: 0,
            audio_overruns: 0,
            audio_underruns: 0,
            video_frames_published: 0,
            cheats_active: 0,
            cheats_applied: 0,
            cheats_rejected: 0,
            input_snapshots: 0,
            input_deltas: 0,
        };

        if let Some(session) = &self.session {
            let counters = &session.counters;
            stats.frames_advanced = counters.frames_advanced.load(Ordering::Relaxed);
            stats.frames_dropped = counters.frames_dropped.load(Ordering::Relaxed);
            stats.ticks = counters.ticks.load(Ordering::Relaxed);
            stats.drift_ms = counters.drift_nanos.load(Ordering::Relaxed) as f64 / 1e6;
            stats.video_frames_published = counters.video_frames.load(Ordering::Relaxed);
            stats.cheats_applied = counters.cheat_writes.load(Ordering::Relaxed);
            stats.cheats_active = session.cheats.len();
            stats.cheats_rejected = session.cheats.rejected();
            stats.input_snapshots = session.input.snapshots_taken();
            stats.input_deltas = session.input.deltas_posted();

            if let Some(monitor) = &session.audio_monitor {
                let ring = monitor.stats();
                stats.audio_frames_pushed = ring.frames_pushed;
                stats.audio_frames_delivered = ring.frames_delivered;
                stats.audio_overruns = ring.overruns;
                stats.audio_underruns = ring.underruns;
            }
        }
        stats
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn write_battery(path: &Path, data: Option<Vec<u8>>) {
    let Some(data) = data else {
        return;
    };
    match savestate::write_atomic(path, &data) {
        Ok(()) => tracing::debug!("Battery save written to {}", path.display()),
        Err(e) => tracing::warn!("Cannot write battery save {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::NullEngine;
    use rb_core::descriptor::systems;

    fn bridge(descriptor: EngineDescriptor) -> Bridge {
        let adapter: Box<dyn EngineAdapter> = Box::new(NullEngine::new(descriptor));
        Bridge::new(adapter, Config::default())
    }

    fn game() -> GameAsset {
        GameAsset::from_bytes(vec![0x11; 128])
    }

    #[test]
    fn test_missing_firmware_creates_no_session() {
        let mut bridge = bridge(systems::DS);
        let err = bridge.load(game(), &FirmwareSet::new()).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Setup(SetupError::MissingFirmware(ref key)) if key == "bios7"
        ));
        assert_eq!(bridge.state(), SessionState::Unloaded);
        assert!(matches!(
            bridge.add_cheat("action-replay-ds", "02000000 00000001"),
            Err(BridgeError::Lifecycle(LifecycleError::NoSession))
        ));
    }

    #[test]
    fn test_engine_refusal_leaves_adapter_usable() {
        let mut bridge = bridge(systems::NES);
        assert!(bridge.load(GameAsset::default(), &FirmwareSet::new()).is_err());
        assert_eq!(bridge.state(), SessionState::Unloaded);
        bridge.load(game(), &FirmwareSet::new()).unwrap();
        assert_eq!(bridge.state(), SessionState::Loaded);
    }

    #[test]
    fn test_step_while_paused() {
        let mut bridge = bridge(systems::NES);
        bridge.load(game(), &FirmwareSet::new()).unwrap();
        bridge.start().unwrap();
        bridge.pause().unwrap();

        let before = bridge.stats().frames_advanced;
        let after = bridge.frame_step().unwrap();
        assert_eq!(after, before + 1);
        assert!(bridge.current_video_frame().is_some());
        bridge.stop().unwrap();
    }

    #[test]
    fn test_invalid_rate() {
        let mut bridge = bridge(systems::NES);
        assert!(bridge.set_rate(0.0).is_err());
        assert!(bridge.set_rate(f64::INFINITY).is_err());
        assert!(bridge.set_rate(1e-30).is_err());
        assert!(bridge.set_rate(1e6).is_err());
        assert_eq!(bridge.rate(), 1.0);
        bridge.set_fast_forward(true).unwrap();
        assert_eq!(bridge.rate(), 4.0);
    }

    #[test]
    fn test_rejected_rate_keeps_session_alive() {
        let mut bridge = bridge(systems::NES);
        bridge.load(game(), &FirmwareSet::new()).unwrap();
        bridge.start().unwrap();
        assert!(bridge.set_rate(1e-30).is_err());
        bridge.pause().unwrap();
        assert_eq!(bridge.frame_step().unwrap(), bridge.stats().frames_advanced);

        bridge.set_rate(config::MIN_RATE).unwrap();
        bridge.stop().unwrap();
        bridge.load(game(), &FirmwareSet::new()).unwrap();
        assert_eq!(bridge.state(), SessionState::Loaded);
        assert_eq!(bridge.rate(), config::MIN_RATE);
    }

    #[test]
    fn test_unusable_frame_rate_refused_at_load() {
        let mut desc = systems::NES;
        desc.frame_rate = 0.0;
        let mut bridge = bridge(desc);
        let err = bridge.load(game(), &FirmwareSet::new()).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Setup(SetupError::EngineInitFailure(_))
        ));
        assert_eq!(bridge.state(), SessionState::Unloaded);
        assert!(bridge.stats().frame_interval_ms > 0.0);
    }

    #[test]
    fn test_auto_save_on_stop() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.save_states.directory = dir.path().to_path_buf();
        config.save_states.auto_save_on_stop = true;
        let adapter: Box<dyn EngineAdapter> = Box::new(NullEngine::new(systems::SNES));
        let mut bridge = Bridge::new(adapter, config);

        bridge.load(game(), &FirmwareSet::new()).unwrap();
        let path = bridge.auto_state_path().unwrap();
        bridge.start().unwrap();
        bridge.pause().unwrap();
        bridge.frame_step().unwrap();
        bridge.frame_step().unwrap();
        let before = bridge.snapshot().unwrap();
        bridge.stop().unwrap();
        assert!(path.exists());

        bridge.load(game(), &FirmwareSet::new()).unwrap();
        bridge.start().unwrap();
        bridge.pause().unwrap();
        bridge.frame_step().unwrap();
        bridge.load_auto_state().unwrap();
        assert_eq!(bridge.snapshot().unwrap(), before);
    }

    #[test]
    fn test_no_auto_save_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.save_states.directory = dir.path().to_path_buf();
        let adapter: Box<dyn EngineAdapter> = Box::new(NullEngine::new(systems::SNES));
        let mut bridge = Bridge::new(adapter, config);

        bridge.load(game(), &FirmwareSet::new()).unwrap();
        let path = bridge.auto_state_path().unwrap();
        bridge.start().unwrap();
        bridge.stop().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_battery_flushed_on_pause_and_stop() {
        let dir = tempfile::tempdir().unwrap();
        let battery = dir.path().join("game.sav");
        let mut bridge = bridge(systems::GBC);
        bridge
            .load(game().with_battery_save(&battery), &FirmwareSet::new())
            .unwrap();
        bridge.start().unwrap();
        bridge.pause().unwrap();
        assert!(battery.exists());

        bridge.frame_step().unwrap();
        bridge.stop().unwrap();
        let saved = std::fs::read(&battery).unwrap();
        assert_eq!(saved.len(), crate::engines::null::BATTERY_SIZE);
        assert_ne!(saved, vec![0; saved.len()]);
    }

    #[test]
    fn test_stats_serialize() {
        let bridge = bridge(systems::NES);
        let stats = bridge.stats();
        assert_eq!(stats.state, SessionState::Unloaded);
        let json = serde_json::to_string(&stats).unwrap();
        assert!(json.contains("\"state\":\"unloaded\""));
    }
}
