//! Engine thread
//!
//! Each loaded session owns one thread that owns the adapter. It is the only
//! thread that calls into the engine. The control thread talks to it through
//! a command channel; every command is handled between two frames, so a
//! reply doubles as the acknowledgement that the engine is quiescent.
//!
//! [`FrameLoop`] holds everything the thread needs to advance frames and can
//! also be driven directly, e.g. from a host's own vsync callback or a test
//! with a manual clock.

use crate::adapter::{EngineAdapter, EngineFault, FrameOutput, SaveStateBlob};
use crate::pacing::{FramePacer, PaceDecision};
use crossbeam::channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use rb_audio::AudioProducer;
use rb_cheats::{ActiveCheats, CheatStage};
use rb_core::{AudioFrame, Clock, StateError};
use rb_input::InputAggregator;
use rb_video::VideoPublisher;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Requests sent from the control thread
pub(crate) enum Command {
    /// Start or resume pacing from now
    Run,
    /// Stop pacing; replies with the battery save to flush
    Pause(Sender<Option<Vec<u8>>>),
    /// Advance exactly one frame; replies with the new frame index
    Step(Sender<Result<u64, EngineFault>>),
    Save(Sender<Result<SaveStateBlob, StateError>>),
    Restore(SaveStateBlob, Sender<Result<(), StateError>>),
    SetRate(f64),
    /// Leave the loop; the adapter is returned through the join handle
    Stop(Sender<()>),
}

/// Counters published by the engine thread
#[derive(Debug, Default)]
pub struct SessionCounters {
    pub frames_advanced: AtomicU64,
    pub frames_dropped: AtomicU64,
    pub ticks: AtomicU64,
    pub drift_nanos: AtomicU64,
    pub video_frames: AtomicU64,
    pub cheat_writes: AtomicU64,
    fault: Mutex<Option<String>>,
}

impl SessionCounters {
    pub fn faulted(&self) -> bool {
        self.fault.lock().is_some()
    }

    pub fn fault(&self) -> Option<String> {
        self.fault.lock().clone()
    }

    fn record_fault(&self, fault: &EngineFault) {
        tracing::error!("Engine fault, stopping session: {}", fault);
        *self.fault.lock() = Some(fault.0.clone());
    }
}

/// Per-session frame advance machinery
pub struct FrameLoop {
    adapter: Box<dyn EngineAdapter>,
    input: Arc<InputAggregator>,
    stage: Arc<CheatStage>,
    cheats: ActiveCheats,
    audio: Option<AudioProducer>,
    video: VideoPublisher,
    /// Engine writes audio here before it is copied into the ring
    scratch: AudioFrame,
    pacer: FramePacer,
    frame_index: u64,
    /// Set while the adapter is inside `advance_one_frame`; stays set if
    /// the frame was cut short by a fault
    mid_frame: bool,
    counters: Arc<SessionCounters>,
}

impl FrameLoop {
    pub fn new(
        adapter: Box<dyn EngineAdapter>,
        input: Arc<InputAggregator>,
        stage: Arc<CheatStage>,
        audio: Option<AudioProducer>,
        video: VideoPublisher,
        pacer: FramePacer,
    ) -> Self {
        let mut sizing = *adapter.descriptor();
        sizing.audio = adapter.preferred_audio_format();
        let scratch = AudioFrame::for_descriptor(&sizing);
        Self {
            adapter,
            input,
            stage,
            cheats: ActiveCheats::new(),
            audio,
            video,
            scratch,
            pacer,
            frame_index: 0,
            mid_frame: false,
            counters: Arc::new(SessionCounters::default()),
        }
    }

    pub fn counters(&self) -> Arc<SessionCounters> {
        Arc::clone(&self.counters)
    }

    /// Index of the next frame to advance
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn pacer(&self) -> &FramePacer {
        &self.pacer
    }

    pub fn active_cheats(&self) -> &ActiveCheats {
        &self.cheats
    }

    pub fn adapter(&self) -> &dyn EngineAdapter {
        self.adapter.as_ref()
    }

    /// Advance exactly one frame: take the input snapshot, pick up cheat
    /// edits, run the engine into the video back buffer and push the audio.
    pub fn advance(&mut self, render_video: bool) -> Result<(), EngineFault> {
        let frame_index = self.frame_index;
        let input = self.input.take(frame_index);
        self.cheats.sync(&self.stage);
        self.scratch.frame_index = frame_index;

        self.mid_frame = true;
        let report = {
            let mut back = self.video.back_buffer();
            back.frame_index = frame_index;
            let mut out = FrameOutput {
                audio: &mut self.scratch,
                video: &mut *back,
                render_video,
            };
            self.adapter
                .advance_one_frame(&input, &mut self.cheats, &mut out)?
        };
        self.mid_frame = false;

        if render_video {
            self.video.publish();
            self.counters.video_frames.fetch_add(1, Ordering::Relaxed);
        }
        if let Some(audio) = &mut self.audio {
            audio.push(&self.scratch);
        }

        self.frame_index += 1;
        self.counters.frames_advanced.fetch_add(1, Ordering::Relaxed);
        self.counters
            .cheat_writes
            .fetch_add(report.applied as u64, Ordering::Relaxed);
        tracing::trace!(
            "Frame {} done (render: {}, cheat writes: {})",
            frame_index,
            render_video,
            report.applied
        );
        Ok(())
    }

    /// Run every frame due at `now`
    pub fn tick(&mut self, now: Duration) -> Result<PaceDecision, EngineFault> {
        if let Some(audio) = &self.audio {
            self.pacer.observe_audio_fill(audio.fill_level());
        }

        let decision = self.pacer.tick(now);
        for i in 0..decision.frames {
            self.advance(decision.renders(i))?;
        }

        let counters = &self.counters;
        counters.ticks.store(self.pacer.ticks(), Ordering::Relaxed);
        counters
            .frames_dropped
            .store(self.pacer.frames_dropped(), Ordering::Relaxed);
        counters
            .drift_nanos
            .store(self.pacer.drift().as_nanos() as u64, Ordering::Relaxed);
        Ok(decision)
    }

    pub fn reset_pacing(&mut self, now: Duration) {
        self.pacer.reset(now);
    }

    pub fn set_rate(&mut self, rate: f64) {
        self.pacer.set_rate(rate);
        tracing::debug!("Emulation rate set to {}", self.pacer.rate());
    }

    /// Whether the last frame was interrupted before it completed
    pub fn is_mid_frame(&self) -> bool {
        self.mid_frame
    }

    /// Capture engine state. Refused if the last frame never completed.
    pub fn save_state(&self) -> Result<SaveStateBlob, StateError> {
        if self.mid_frame {
            return Err(StateError::MidFrame);
        }
        self.adapter.serialize_state()
    }

    /// Restore engine state. Held inputs stay in the aggregator and reach the
    /// engine on the next frame, as do the active cheats.
    pub fn restore_state(&mut self, blob: &SaveStateBlob) -> Result<(), StateError> {
        if self.mid_frame {
            return Err(StateError::MidFrame);
        }
        self.adapter.restore_state(blob)?;
        self.cheats.sync(&self.stage);
        tracing::debug!("State restored at frame {}", self.frame_index);
        Ok(())
    }

    pub fn battery_save(&self) -> Option<Vec<u8>> {
        self.adapter.battery_save()
    }

    pub fn into_adapter(self) -> Box<dyn EngineAdapter> {
        self.adapter
    }
}

/// Start the engine thread. Joining it yields the adapter back.
pub(crate) fn spawn(
    frame_loop: FrameLoop,
    clock: Arc<dyn Clock>,
    commands: Receiver<Command>,
    name: String,
) -> std::io::Result<JoinHandle<Box<dyn EngineAdapter>>> {
    std::thread::Builder::new()
        .name(name)
        .spawn(move || run(frame_loop, clock, commands))
}

fn run(
    mut frame_loop: FrameLoop,
    clock: Arc<dyn Clock>,
    commands: Receiver<Command>,
) -> Box<dyn EngineAdapter> {
    let counters = frame_loop.counters();
    let mut running = false;

    loop {
        let command = if running {
            let wait = frame_loop.pacer().next_deadline().saturating_sub(clock.now());
            match commands.recv_timeout(wait) {
                Ok(command) => Some(command),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        } else {
            match commands.recv() {
                Ok(command) => Some(command),
                Err(_) => break,
            }
        };

        match command {
            Some(Command::Run) => {
                frame_loop.reset_pacing(clock.now());
                running = true;
            }
            Some(Command::Pause(ack)) => {
                running = false;
                let _ = ack.send(frame_loop.battery_save());
            }
            Some(Command::Step(reply)) => {
                let result = frame_loop
                    .advance(true)
                    .map(|()| frame_loop.frame_index());
                if let Err(fault) = &result {
                    counters.record_fault(fault);
                }
                let failed = result.is_err();
                let _ = reply.send(result);
                if failed {
                    break;
                }
            }
            Some(Command::Save(reply)) => {
                let _ = reply.send(frame_loop.save_state());
            }
            Some(Command::Restore(blob, reply)) => {
                let _ = reply.send(frame_loop.restore_state(&blob));
            }
            Some(Command::SetRate(rate)) => frame_loop.set_rate(rate),
            Some(Command::Stop(ack)) => {
                let _ = ack.send(());
                break;
            }
            None => {}
        }

        if running && clock.now() >= frame_loop.pacer().next_deadline() {
            if let Err(fault) = frame_loop.tick(clock.now()) {
                counters.record_fault(&fault);
                break;
            }
        }
    }

    tracing::debug!(
        "Engine thread exiting after {} frames",
        frame_loop.frame_index()
    );
    frame_loop.into_adapter()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::NullEngine;
    use crate::adapter::{FirmwareSet, GameAsset};
    use rb_audio::audio_ring;
    use rb_core::config::PacingConfig;
    use rb_core::descriptor::systems;
    use rb_core::ManualClock;
    use rb_input::{Buttons, InputDelta, InputSource};
    use rb_video::video_swapchain;

    fn frame_loop() -> (FrameLoop, Arc<InputAggregator>, Arc<CheatStage>) {
        let desc = systems::GBA;
        let mut engine = NullEngine::new(desc);
        engine
            .load(&GameAsset::from_bytes(vec![7; 32]), &FirmwareSet::new())
            .unwrap();

        let input = Arc::new(InputAggregator::new(2));
        let stage = Arc::new(CheatStage::new(&desc));
        let (producer, _consumer) = audio_ring(8, desc.audio_frame_len(), desc.audio.channels);
        let (publisher, _reader) = video_swapchain(&desc.video);
        let pacer = FramePacer::new(
            &desc,
            &PacingConfig {
                audio_sync: false,
                ..Default::default()
            },
        );
        let frame_loop = FrameLoop::new(
            Box::new(engine),
            Arc::clone(&input),
            Arc::clone(&stage),
            Some(producer),
            publisher,
            pacer,
        );
        (frame_loop, input, stage)
    }

    #[test]
    fn test_advance_consumes_one_snapshot() {
        let (mut frame_loop, input, _) = frame_loop();
        input.post(InputDelta::press(0, InputSource::Keyboard, Buttons::A));
        input.post(InputDelta::press(0, InputSource::Overlay, Buttons::B));

        frame_loop.advance(true).unwrap();
        assert_eq!(input.snapshots_taken(), 1);
        assert_eq!(frame_loop.frame_index(), 1);
        assert_eq!(frame_loop.counters().video_frames.load(Ordering::Relaxed), 1);

        frame_loop.advance(false).unwrap();
        assert_eq!(input.snapshots_taken(), 2);
        assert_eq!(frame_loop.counters().video_frames.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_cheat_edits_picked_up_at_frame_boundary() {
        let (mut frame_loop, _, stage) = frame_loop();
        let handle = stage.insert("raw", "0000:10").unwrap();
        assert!(!frame_loop.active_cheats().contains(handle));

        frame_loop.advance(false).unwrap();
        assert!(frame_loop.active_cheats().contains(handle));
        assert_eq!(frame_loop.counters().cheat_writes.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_stall_is_bounded() {
        let (mut frame_loop, _, _) = frame_loop();
        let clock = ManualClock::new();
        frame_loop.reset_pacing(clock.now());

        clock.advance(Duration::from_secs(2));
        let decision = frame_loop.tick(clock.now()).unwrap();
        assert_eq!(decision.frames, 4);
        assert_eq!(frame_loop.frame_index(), 4);
        assert!(decision.dropped > 100);
    }

    #[test]
    fn test_thread_commands() {
        let (frame_loop, _, _) = frame_loop();
        let counters = frame_loop.counters();
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new());
        let (tx, rx) = crossbeam::channel::unbounded();
        let handle = spawn(frame_loop, clock, rx, "rb-engine-test".to_string()).unwrap();

        let (step_tx, step_rx) = crossbeam::channel::bounded(1);
        tx.send(Command::Step(step_tx)).unwrap();
        assert_eq!(step_rx.recv().unwrap(), Ok(1));

        let (save_tx, save_rx) = crossbeam::channel::bounded(1);
        tx.send(Command::Save(save_tx)).unwrap();
        let blob = save_rx.recv().unwrap().unwrap();

        let (restore_tx, restore_rx) = crossbeam::channel::bounded(1);
        tx.send(Command::Restore(blob, restore_tx)).unwrap();
        assert_eq!(restore_rx.recv().unwrap(), Ok(()));

        let (stop_tx, stop_rx) = crossbeam::channel::bounded(1);
        tx.send(Command::Stop(stop_tx)).unwrap();
        stop_rx.recv().unwrap();

        let adapter = handle.join().unwrap();
        assert_eq!(adapter.descriptor().system, systems::GBA.system);
        assert_eq!(counters.frames_advanced.load(Ordering::Relaxed), 1);
        assert!(!counters.faulted());
    }

    #[test]
    fn test_fault_ends_thread() {
        let desc = systems::NES;
        let mut engine = NullEngine::new(desc).with_fault_at(0);
        engine
            .load(&GameAsset::from_bytes(vec![1]), &FirmwareSet::new())
            .unwrap();
        let (publisher, _reader) = video_swapchain(&desc.video);
        let frame_loop = FrameLoop::new(
            Box::new(engine),
            Arc::new(InputAggregator::new(1)),
            Arc::new(CheatStage::new(&desc)),
            None,
            publisher,
            FramePacer::new(&desc, &PacingConfig::default()),
        );
        let counters = frame_loop.counters();
        let (tx, rx) = crossbeam::channel::unbounded();
        let handle = spawn(frame_loop, Arc::new(ManualClock::new()), rx, "rb-engine-fault".into()).unwrap();

        let (step_tx, step_rx) = crossbeam::channel::bounded(1);
        tx.send(Command::Step(step_tx)).unwrap();
        assert!(step_rx.recv().unwrap().is_err());

        handle.join().unwrap();
        assert!(counters.faulted());
        assert!(counters.fault().unwrap().contains("injected"));
    }

    #[test]
    fn test_state_access_refused_after_interrupted_frame() {
        let desc = systems::SNES;
        let mut engine = NullEngine::new(desc).with_fault_at(1);
        engine
            .load(&GameAsset::from_bytes(vec![3; 16]), &FirmwareSet::new())
            .unwrap();
        let (publisher, _reader) = video_swapchain(&desc.video);
        let mut frame_loop = FrameLoop::new(
            Box::new(engine),
            Arc::new(InputAggregator::new(1)),
            Arc::new(CheatStage::new(&desc)),
            None,
            publisher,
            FramePacer::new(&desc, &PacingConfig::default()),
        );

        frame_loop.advance(true).unwrap();
        let blob = frame_loop.save_state().unwrap();
        assert!(!frame_loop.is_mid_frame());

        assert!(frame_loop.advance(true).is_err());
        assert!(frame_loop.is_mid_frame());
        assert_eq!(frame_loop.save_state(), Err(StateError::MidFrame));
        assert_eq!(frame_loop.restore_state(&blob), Err(StateError::MidFrame));
        assert_eq!(frame_loop.frame_index(), 1);
    }
}
