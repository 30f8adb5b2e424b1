use std::collections::HashMap;

use log::debug;
use tokio::sync::oneshot;

use super::AudioDevice;
use crate::{ClipRef, MurmurError, Result};

/// Bytes of silence synthesized for every captured clip.
const SYNTHETIC_CLIP_LEN: usize = 4410;

/// Keeps clips in process memory. Playback never ends on its own; call
/// `complete_playback` to signal the end of a clip.
#[derive(Debug, Default)]
pub struct MemoryDevice {
    deny_access: bool,
    capturing: bool,
    clips: HashMap<ClipRef, Vec<u8>>,
    next_clip: u64,
    playing: Option<ClipRef>,
    on_complete: Option<oneshot::Sender<()>>,
}

impl MemoryDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// A device whose microphone permission is always refused.
    pub fn denying_access() -> Self {
        Self {
            deny_access: true,
            ..Self::default()
        }
    }

    /// Ends the current clip as if it had played to the end.
    pub fn complete_playback(&mut self) -> bool {
        self.playing = None;
        match self.on_complete.take() {
            Some(done) => done.send(()).is_ok(),
            None => false,
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing
    }

    pub fn playing(&self) -> Option<&ClipRef> {
        self.playing.as_ref()
    }

    pub fn holds(&self, clip: &ClipRef) -> bool {
        self.clips.contains_key(clip)
    }

    pub fn clip_count(&self) -> usize {
        self.clips.len()
    }
}

impl AudioDevice for MemoryDevice {
    async fn start_capture(&mut self) -> Result<()> {
        if self.deny_access {
            return Err(MurmurError::DeviceAccess {
                message: "Microphone permission denied".to_string(),
            });
        }
        if self.capturing {
            return Err(MurmurError::InvalidAudioState {
                message: "Capture already in progress".to_string(),
            });
        }

        self.capturing = true;
        Ok(())
    }

    async fn finish_capture(&mut self) -> Result<ClipRef> {
        if !self.capturing {
            return Err(MurmurError::InvalidAudioState {
                message: "No capture in progress".to_string(),
            });
        }

        self.capturing = false;
        self.next_clip += 1;
        let clip = ClipRef::new(format!("memory://clip-{}", self.next_clip));
        self.clips.insert(clip.clone(), vec![0; SYNTHETIC_CLIP_LEN]);
        debug!("Captured {}", clip);
        Ok(clip)
    }

    fn abort_capture(&mut self) {
        self.capturing = false;
    }

    fn start_playback(&mut self, clip: &ClipRef, on_complete: oneshot::Sender<()>) -> Result<()> {
        if !self.clips.contains_key(clip) {
            return Err(MurmurError::InvalidAudioState {
                message: format!("Clip is no longer available: {}", clip),
            });
        }

        self.playing = Some(clip.clone());
        self.on_complete = Some(on_complete);
        Ok(())
    }

    fn stop_playback(&mut self) {
        self.playing = None;
        self.on_complete = None;
    }

    fn release_clip(&mut self, clip: &ClipRef) {
        if self.clips.remove(clip).is_some() {
            debug!("Released {}", clip);
        }
    }
}
