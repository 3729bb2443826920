//! Kira-backed chime
//!
//! Kira's manager is not thread-safe, so it lives on a dedicated worker
//! thread and playback is cued over a channel. The handle itself is cheap
//! to share and safe to call from any thread.

use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;

use kira::{
    manager::{AudioManager as KiraManager, AudioManagerSettings, backend::DefaultBackend},
    sound::static_sound::{StaticSoundData, StaticSoundSettings},
    Volume,
};

use super::UnlockChime;

/// Sound played when a toast batch appears.
const DEFAULT_SOURCE: &str = "assets/sounds/unlock.ogg";
/// Amplitude for the chime (0.0 - 1.0).
const CHIME_VOLUME: f64 = 0.8;

/// Chime backed by a Kira audio thread.
///
/// Construction initializes the backend and preloads the sound; if either
/// fails, the chime stays silent and every [`UnlockChime::play`] is a no-op.
pub struct KiraChime {
    cue: Option<mpsc::Sender<()>>,
    worker: Option<thread::JoinHandle<()>>,
}

impl KiraChime {
    /// Build a chime over the bundled unlock sting.
    pub fn new() -> Self {
        Self::from_file(DEFAULT_SOURCE)
    }

    /// Build a chime over a specific sound file.
    pub fn from_file(source: impl Into<PathBuf>) -> Self {
        let source = source.into();
        let (cue_tx, cue_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();
        let worker = match thread::Builder::new()
            .name("accolade-chime".into())
            .spawn(move || chime_worker(cue_rx, ready_tx, source))
        {
            Ok(handle) => handle,
            Err(e) => {
                log::warn!("could not start audio thread: {e}. Chime disabled.");
                return Self {
                    cue: None,
                    worker: None,
                };
            }
        };
        match ready_rx.recv() {
            Ok(true) => {
                log::info!("unlock chime initialized");
                Self {
                    cue: Some(cue_tx),
                    worker: Some(worker),
                }
            }
            _ => {
                // the worker logged why and has already exited
                let _ = worker.join();
                Self {
                    cue: None,
                    worker: None,
                }
            }
        }
    }

    /// Check if the audio backend came up and the sound loaded.
    pub fn is_available(&self) -> bool {
        self.cue.is_some()
    }
}

impl Default for KiraChime {
    fn default() -> Self {
        Self::new()
    }
}

impl UnlockChime for KiraChime {
    fn play(&self) {
        if let Some(cue) = &self.cue {
            if cue.send(()).is_err() {
                log::debug!("chime worker is gone; cue dropped");
            }
        }
    }
}

impl Drop for KiraChime {
    fn drop(&mut self) {
        // closing the channel lets the worker drain out and exit
        self.cue = None;
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn chime_worker(cues: mpsc::Receiver<()>, ready: mpsc::Sender<bool>, source: PathBuf) {
    let mut manager = match KiraManager::<DefaultBackend>::new(AudioManagerSettings::default()) {
        Ok(m) => m,
        Err(e) => {
            log::warn!("failed to initialize audio backend: {e}. Chime disabled.");
            let _ = ready.send(false);
            return;
        }
    };
    let sound = match StaticSoundData::from_file(&source) {
        Ok(data) => data,
        Err(e) => {
            log::warn!(
                "could not load chime sound {}: {:?}. Chime disabled.",
                source.display(),
                e
            );
            let _ = ready.send(false);
            return;
        }
    };
    let _ = ready.send(true);

    for () in cues {
        let settings = StaticSoundSettings::new().volume(Volume::Amplitude(CHIME_VOLUME));
        if let Err(e) = manager.play(sound.with_settings(settings)) {
            log::debug!("failed to play unlock chime: {:?}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_sound_file_disables_the_chime() {
        let chime = KiraChime::from_file("definitely/not/here.ogg");
        assert!(!chime.is_available());
        // playing while disabled is a harmless no-op
        chime.play();
    }
}
