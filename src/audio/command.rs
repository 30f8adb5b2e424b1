use std::{
    io,
    path::{Component, Path, PathBuf},
    process::Stdio,
};

use chrono::Utc;
use log::{debug, error, trace, warn};
use shell_words::split;
use tokio::{
    io::AsyncReadExt,
    process::{Child, Command},
    sync::oneshot,
    task::JoinHandle,
};

use super::AudioDevice;
use crate::{ClipRef, MurmurError, Result};

struct Capture {
    child: Child,
    reader: JoinHandle<io::Result<Vec<Vec<u8>>>>,
}

/// Records by reading an external recorder's stdout and plays clips with an
/// external player. Finished clips are files under `clips_dir`.
pub struct CommandDevice {
    record_command: String,
    play_command: String,
    clips_dir: PathBuf,
    clip_extension: String,
    capture: Option<Capture>,
    playback_cancel: Option<oneshot::Sender<()>>,
}

impl CommandDevice {
    pub fn new(
        record_command: String,
        play_command: String,
        clips_dir: PathBuf,
        clip_extension: String,
    ) -> Self {
        Self {
            record_command,
            play_command,
            clips_dir,
            clip_extension,
            capture: None,
            playback_cancel: None,
        }
    }

    pub fn clips_dir(&self) -> &Path {
        &self.clips_dir
    }

    fn build_command(command_line: &str) -> Result<Command> {
        let args = split(command_line).map_err(|e| MurmurError::DeviceAccess {
            message: format!("Failed to parse audio command '{}': {}", command_line, e),
        })?;

        let Some((program, rest)) = args.split_first() else {
            return Err(MurmurError::DeviceAccess {
                message: "Empty audio command".to_string(),
            });
        };

        let mut command = Command::new(program);
        command.args(rest).stdin(Stdio::null()).kill_on_drop(true);
        Ok(command)
    }

    /// Whether `path` names a file under `clips_dir`. Paths with `..`
    /// components never do.
    fn owns_path(&self, path: &Path) -> bool {
        if path.components().any(|c| c == Component::ParentDir) {
            return false;
        }
        match (path.canonicalize(), self.clips_dir.canonicalize()) {
            (Ok(path), Ok(dir)) => path.starts_with(dir),
            _ => path.starts_with(&self.clips_dir),
        }
    }

    fn next_clip_path(&self) -> PathBuf {
        let mut path = self
            .clips_dir
            .join(format!("{}.{}", Utc::now().timestamp_millis(), self.clip_extension));
        let mut suffix = 1;
        while path.exists() {
            path = self.clips_dir.join(format!(
                "{}-{}.{}",
                Utc::now().timestamp_millis(),
                suffix,
                self.clip_extension
            ));
            suffix += 1;
        }
        path
    }
}

impl AudioDevice for CommandDevice {
    async fn start_capture(&mut self) -> Result<()> {
        if self.capture.is_some() {
            return Err(MurmurError::InvalidAudioState {
                message: "Capture already in progress".to_string(),
            });
        }

        let mut command = Self::build_command(&self.record_command)?;
        command.stdout(Stdio::piped());

        let mut child = command.spawn().map_err(|e| {
            error!("Failed to start recorder '{}': {}", self.record_command, e);
            MurmurError::DeviceAccess {
                message: format!("Failed to start recorder '{}': {}", self.record_command, e),
            }
        })?;

        let Some(mut stdout) = child.stdout.take() else {
            let _ = child.start_kill();
            return Err(MurmurError::DeviceAccess {
                message: "Recorder produced no output stream".to_string(),
            });
        };

        let reader = tokio::spawn(async move {
            let mut chunks = Vec::new();
            let mut buffer = vec![0u8; 8192];
            loop {
                let read = stdout.read(&mut buffer).await?;
                if read == 0 {
                    break;
                }
                trace!("Buffered {} bytes of audio", read);
                chunks.push(buffer[..read].to_vec());
            }
            Ok::<_, io::Error>(chunks)
        });

        debug!("Recorder started: {}", self.record_command);
        self.capture = Some(Capture { child, reader });
        Ok(())
    }

    async fn finish_capture(&mut self) -> Result<ClipRef> {
        let Some(mut capture) = self.capture.take() else {
            return Err(MurmurError::InvalidAudioState {
                message: "No capture in progress".to_string(),
            });
        };

        // The recorder may already have exited on its own (device error).
        if let Err(e) = capture.child.start_kill() {
            debug!("Recorder already exited: {}", e);
        }
        let status = capture.child.wait().await?;
        debug!("Recorder exited with {}", status);

        let chunks = capture
            .reader
            .await
            .map_err(|e| MurmurError::ApplicationError {
                message: format!("Audio reader task failed: {}", e),
            })??;

        let data = chunks.concat();
        if data.is_empty() {
            return Err(MurmurError::DeviceAccess {
                message: format!("Recorder exited ({}) without capturing audio", status),
            });
        }

        tokio::fs::create_dir_all(&self.clips_dir)
            .await
            .map_err(|_| MurmurError::DirectoryError {
                path: self.clips_dir.clone(),
            })?;

        let path = self.next_clip_path();
        tokio::fs::write(&path, &data).await?;
        debug!("Wrote {} bytes of audio to {}", data.len(), path.display());

        Ok(ClipRef::new(path.to_string_lossy()))
    }

    fn abort_capture(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            if let Err(e) = capture.child.start_kill() {
                debug!("Recorder already exited: {}", e);
            }
            capture.reader.abort();
            debug!("Recording aborted");
        }
    }

    fn start_playback(&mut self, clip: &ClipRef, on_complete: oneshot::Sender<()>) -> Result<()> {
        self.stop_playback();

        let path = PathBuf::from(clip.as_str());
        if !path.is_file() {
            return Err(MurmurError::InvalidAudioState {
                message: format!("Clip is no longer available: {}", clip),
            });
        }

        let mut command = Self::build_command(&self.play_command)?;
        command.arg(&path).stdout(Stdio::null());

        let mut child = command.spawn().map_err(|e| {
            error!("Failed to start player '{}': {}", self.play_command, e);
            MurmurError::DeviceAccess {
                message: format!("Failed to start player '{}': {}", self.play_command, e),
            }
        })?;

        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            tokio::select! {
                status = child.wait() => {
                    match status {
                        Ok(status) => debug!("Player exited with {}", status),
                        Err(e) => warn!("Failed to wait for player: {}", e),
                    }
                    let _ = on_complete.send(());
                }
                _ = cancel_rx => {
                    if let Err(e) = child.kill().await {
                        debug!("Player already exited: {}", e);
                    }
                }
            }
        });

        self.playback_cancel = Some(cancel_tx);
        Ok(())
    }

    fn stop_playback(&mut self) {
        if let Some(cancel) = self.playback_cancel.take() {
            let _ = cancel.send(());
        }
    }

    fn release_clip(&mut self, clip: &ClipRef) {
        let path = Path::new(clip.as_str());
        if !self.owns_path(path) {
            warn!("Not releasing clip outside {}: {}", self.clips_dir.display(), clip);
            return;
        }

        match std::fs::remove_file(path) {
            Ok(()) => debug!("Released clip {}", clip),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove clip {}: {}", clip, e),
        }
    }
}

impl Drop for CommandDevice {
    fn drop(&mut self) {
        self.abort_capture();
        self.stop_playback();
    }
}
