use tokio::runtime::Handle;
use tracing::info;

use crate::config::EngineConfig;
use crate::device::{AudioBackend, DeviceError};
use crate::lifecycle::DeviceLifecycle;
use crate::registry::{ToneId, ToneRegistry, ToneSnapshot};
use crate::waveform::Waveform;

/// Counts for the "current settings" line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlaybackStatus {
    pub tones: usize,
    pub audible: usize,
    pub paused: bool,
}

/// Session owner of the tone registry and the global pause flag.
pub struct PlaybackController<B: AudioBackend> {
    registry: ToneRegistry<B>,
    paused: bool,
}

impl<B: AudioBackend> PlaybackController<B> {
    pub fn new(backend: B, config: EngineConfig, runtime: Handle) -> Self {
        let lifecycle = DeviceLifecycle::new(backend, runtime);
        Self {
            registry: ToneRegistry::new(lifecycle, config),
            paused: false,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// New tones honour a standing pause and fade in to silence.
    pub fn add_tone(
        &mut self,
        frequency: f32,
        waveform: Waveform,
        volume: u8,
    ) -> Result<ToneId, DeviceError> {
        self.registry.add_tone(frequency, waveform, volume, self.paused)
    }

    pub fn remove_tone(&mut self, id: ToneId) -> bool {
        self.registry.remove_tone(id)
    }

    pub fn set_volume(&mut self, id: ToneId, volume: u8) {
        self.registry.set_volume(id, volume, self.paused);
    }

    pub fn toggle(&mut self, id: ToneId) -> Option<bool> {
        self.registry.toggle(id, self.paused)
    }

    /// Silences every tone without touching volume or mute state.
    pub fn pause_all(&mut self) {
        if self.paused {
            return;
        }
        self.paused = true;
        self.registry.reapply_all(true);
        info!(tones = self.registry.len(), "playback paused");
    }

    pub fn unpause_all(&mut self) {
        if !self.paused {
            return;
        }
        self.paused = false;
        self.registry.reapply_all(false);
        info!(tones = self.registry.len(), "playback resumed");
    }

    /// Removes every tone and clears the pause.
    pub fn stop_all(&mut self) -> usize {
        self.paused = false;
        self.registry.stop_all()
    }

    pub fn tones(&self) -> Vec<ToneSnapshot> {
        self.registry.list(self.paused)
    }

    #[cfg(test)]
    pub fn tone(&self, id: ToneId) -> Option<ToneSnapshot> {
        self.registry.get(id, self.paused)
    }

    pub fn status(&self) -> PlaybackStatus {
        let tones = self.registry.list(self.paused);
        PlaybackStatus {
            tones: tones.len(),
            audible: tones.iter().filter(|tone| tone.gain > 0.0).count(),
            paused: self.paused,
        }
    }

    /// End of session: stops every device now and releases the output.
    pub fn teardown(&mut self) {
        self.registry.shutdown();
        self.paused = false;
    }
}

impl<B: AudioBackend> Drop for PlaybackController<B> {
    fn drop(&mut self) {
        self.teardown();
    }
}
