//! Audio capture and playback.
//!
//! `AudioRecorder` owns the record/play state machine and the elapsed-time
//! counter. The platform side lives behind `AudioDevice`, with a backend
//! that drives external commands and one that keeps clips in memory.

mod command;
mod memory;

use std::future::Future;

use log::{debug, info, warn};
use tokio::sync::oneshot;

use crate::{format_elapsed, AudioBackend, ClipRef, Config, MurmurError, Result};

pub use command::CommandDevice;
pub use memory::MemoryDevice;

/// Platform service that can capture one clip at a time and play clips back.
pub trait AudioDevice {
    /// Acquires the microphone and starts buffering audio. Suspends until
    /// access is granted or denied; denial is `DeviceAccess`.
    fn start_capture(&mut self) -> impl Future<Output = Result<()>>;

    /// Finalizes the buffered audio into a single clip and releases the
    /// microphone.
    fn finish_capture(&mut self) -> impl Future<Output = Result<ClipRef>>;

    /// Force-stops an in-progress capture and drops what was buffered.
    fn abort_capture(&mut self);

    /// Plays `clip` from the start. `on_complete` fires when the clip ends
    /// on its own; it is dropped unsent if playback is stopped.
    fn start_playback(&mut self, clip: &ClipRef, on_complete: oneshot::Sender<()>) -> Result<()>;

    /// Stops playback, if any, and rewinds.
    fn stop_playback(&mut self);

    /// Frees whatever backs a clip this device produced.
    fn release_clip(&mut self, clip: &ClipRef);
}

/// Whether the microphone is currently being captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Recording,
}

#[derive(Debug)]
struct Clip {
    reference: ClipRef,
    /// Owned clips are released on discard and teardown; clips adopted from
    /// a saved murmur or handed off by `commit` are not.
    owned: bool,
}

pub struct AudioRecorder<D: AudioDevice> {
    device: D,
    state: CaptureState,
    clip: Option<Clip>,
    playing: bool,
    playback_done: Option<oneshot::Receiver<()>>,
    elapsed_secs: u64,
}

impl<D: AudioDevice> AudioRecorder<D> {
    pub fn new(device: D) -> Self {
        Self {
            device,
            state: CaptureState::Idle,
            clip: None,
            playing: false,
            playback_done: None,
            elapsed_secs: 0,
        }
    }

    /// Requests the microphone and begins recording. On failure the
    /// recorder stays idle and any existing clip is kept.
    pub async fn start_recording(&mut self) -> Result<()> {
        if self.state == CaptureState::Recording {
            return Err(MurmurError::InvalidAudioState {
                message: "Already recording".to_string(),
            });
        }

        self.stop();

        if let Err(e) = self.device.start_capture().await {
            warn!("Could not start recording: {}", e);
            return Err(e);
        }

        self.state = CaptureState::Recording;
        self.elapsed_secs = 0;
        info!("Recording started");
        Ok(())
    }

    /// Finalizes the recording into a clip, replacing any previous clip.
    pub async fn stop_recording(&mut self) -> Result<ClipRef> {
        if self.state != CaptureState::Recording {
            return Err(MurmurError::InvalidAudioState {
                message: "Not recording".to_string(),
            });
        }

        self.state = CaptureState::Idle;
        let reference = self.device.finish_capture().await?;

        self.replace_clip(Some(Clip {
            reference: reference.clone(),
            owned: true,
        }));
        info!(
            "Recording stopped after {}: {}",
            format_elapsed(self.elapsed_secs),
            reference
        );
        Ok(reference)
    }

    /// Advances the elapsed counter by one second while recording.
    pub fn tick(&mut self) {
        if self.state == CaptureState::Recording {
            self.elapsed_secs += 1;
        }
    }

    /// Starts playback of the current clip. No-op if already playing.
    pub fn play(&mut self) -> Result<()> {
        self.settle_playback();
        if self.state == CaptureState::Recording {
            return Err(MurmurError::InvalidAudioState {
                message: "Cannot play while recording".to_string(),
            });
        }
        let Some(clip) = &self.clip else {
            return Err(MurmurError::InvalidAudioState {
                message: "No clip to play".to_string(),
            });
        };
        if self.playing {
            return Ok(());
        }

        let (tx, rx) = oneshot::channel();
        self.device.start_playback(&clip.reference, tx)?;
        self.playing = true;
        self.playback_done = Some(rx);
        debug!("Playing {}", clip.reference);
        Ok(())
    }

    /// Stops and rewinds playback. No-op if not playing.
    pub fn stop(&mut self) {
        if !self.playing {
            return;
        }

        self.device.stop_playback();
        self.playing = false;
        self.playback_done = None;
        debug!("Playback stopped");
    }

    /// Resolves when the current clip finishes playing, then marks playback
    /// stopped. Returns immediately when nothing is playing.
    pub async fn wait_for_playback(&mut self) {
        if let Some(done) = self.playback_done.as_mut() {
            // A dropped sender means the device gave up on the clip.
            let _ = done.await;
            self.playing = false;
            self.playback_done = None;
            debug!("Playback finished");
        }
    }

    /// Marks playback stopped if the clip has ended on its own since the
    /// last check.
    fn settle_playback(&mut self) {
        let Some(done) = self.playback_done.as_mut() else {
            return;
        };
        // A closed channel means the device gave up on the clip.
        if matches!(done.try_recv(), Err(oneshot::error::TryRecvError::Empty)) {
            return;
        }

        self.playing = false;
        self.playback_done = None;
        debug!("Playback finished");
    }

    /// Releases the clip and resets the counter. Returns the discarded
    /// reference, or `None` when there was no clip.
    pub fn discard(&mut self) -> Option<ClipRef> {
        let clip = self.clip.as_ref()?.reference.clone();
        self.stop();
        self.replace_clip(None);
        self.elapsed_secs = 0;
        info!("Discarded clip {}", clip);
        Some(clip)
    }

    /// Points the recorder at a clip that belongs to a saved murmur, so it
    /// can be played. Adopted clips are never released by the recorder.
    pub fn adopt(&mut self, reference: ClipRef) {
        self.stop();
        self.replace_clip(Some(Clip {
            reference,
            owned: false,
        }));
        self.elapsed_secs = 0;
    }

    /// Hands the current clip over to a saved murmur and forgets it without
    /// releasing it.
    pub fn commit(&mut self) -> Option<ClipRef> {
        self.stop();
        self.elapsed_secs = 0;
        self.clip.take().map(|clip| clip.reference)
    }

    fn replace_clip(&mut self, clip: Option<Clip>) {
        if let Some(old) = self.clip.take() {
            if old.owned {
                self.device.release_clip(&old.reference);
            }
        }
        self.clip = clip;
    }

    /// Force-stops recording, stops playback and releases an owned clip,
    /// whatever state the recorder is in.
    pub fn teardown(&mut self) {
        if self.state == CaptureState::Recording {
            self.device.abort_capture();
            self.state = CaptureState::Idle;
        }
        self.stop();
        self.replace_clip(None);
        self.elapsed_secs = 0;
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == CaptureState::Recording
    }

    /// Whether a clip is playing. Picks up a clip that ended on its own.
    pub fn is_playing(&mut self) -> bool {
        self.settle_playback();
        self.playing
    }

    pub fn clip(&self) -> Option<&ClipRef> {
        self.clip.as_ref().map(|clip| &clip.reference)
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed_secs
    }

    /// Elapsed recording time as `mm:ss`.
    pub fn elapsed_display(&self) -> String {
        format_elapsed(self.elapsed_secs)
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }
}

impl<D: AudioDevice> Drop for AudioRecorder<D> {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// The device selected by `Config::audio_backend`.
pub enum ConfiguredDevice {
    Command(CommandDevice),
    Memory(MemoryDevice),
}

impl ConfiguredDevice {
    pub fn from_config(config: &Config) -> Self {
        match config.audio_backend {
            AudioBackend::Command => ConfiguredDevice::Command(CommandDevice::new(
                config.record_command.clone(),
                config.play_command.clone(),
                config.clips_dir(),
                config.clip_extension.clone(),
            )),
            AudioBackend::Memory => ConfiguredDevice::Memory(MemoryDevice::new()),
        }
    }
}

impl AudioDevice for ConfiguredDevice {
    async fn start_capture(&mut self) -> Result<()> {
        match self {
            ConfiguredDevice::Command(device) => device.start_capture().await,
            ConfiguredDevice::Memory(device) => device.start_capture().await,
        }
    }

    async fn finish_capture(&mut self) -> Result<ClipRef> {
        match self {
            ConfiguredDevice::Command(device) => device.finish_capture().await,
            ConfiguredDevice::Memory(device) => device.finish_capture().await,
        }
    }

    fn abort_capture(&mut self) {
        match self {
            ConfiguredDevice::Command(device) => device.abort_capture(),
            ConfiguredDevice::Memory(device) => device.abort_capture(),
        }
    }

    fn start_playback(&mut self, clip: &ClipRef, on_complete: oneshot::Sender<()>) -> Result<()> {
        match self {
            ConfiguredDevice::Command(device) => device.start_playback(clip, on_complete),
            ConfiguredDevice::Memory(device) => device.start_playback(clip, on_complete),
        }
    }

    fn stop_playback(&mut self) {
        match self {
            ConfiguredDevice::Command(device) => device.stop_playback(),
            ConfiguredDevice::Memory(device) => device.stop_playback(),
        }
    }

    fn release_clip(&mut self, clip: &ClipRef) {
        match self {
            ConfiguredDevice::Command(device) => device.release_clip(clip),
            ConfiguredDevice::Memory(device) => device.release_clip(clip),
        }
    }
}
