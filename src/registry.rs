use std::fmt;
use std::time::{Duration, SystemTime};

use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::device::{AudioBackend, DeviceError, GainStage, SignalSource, ToneDevice};
use crate::gain::gain;
use crate::lifecycle::{BackendDevice, DeviceLifecycle};
use crate::waveform::Waveform;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ToneId(u64);

impl fmt::Display for ToneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub struct Tone<D> {
    id: ToneId,
    frequency: f32,
    waveform: Waveform,
    volume: u8,
    enabled: bool,
    device: D,
    created_at: SystemTime,
}

impl<D> Tone<D> {
    fn snapshot(&self, paused: bool) -> ToneSnapshot {
        ToneSnapshot {
            id: self.id,
            frequency: self.frequency,
            waveform: self.waveform,
            volume: self.volume,
            enabled: self.enabled,
            gain: gain(self.volume, self.enabled, paused),
            created_at: self.created_at,
        }
    }
}

/// Detached copy of a tone's state plus the gain it is being driven to.
#[derive(Clone, Debug, PartialEq)]
pub struct ToneSnapshot {
    pub id: ToneId,
    pub frequency: f32,
    pub waveform: Waveform,
    pub volume: u8,
    pub enabled: bool,
    pub gain: f32,
    pub created_at: SystemTime,
}

/// Ordered set of live tones. The global pause flag is owned by the caller
/// and passed into every operation that recomputes gain.
pub struct ToneRegistry<B: AudioBackend> {
    tones: Vec<Tone<BackendDevice<B>>>,
    lifecycle: DeviceLifecycle<B>,
    config: EngineConfig,
    next_id: u64,
}

impl<B: AudioBackend> ToneRegistry<B> {
    pub fn new(lifecycle: DeviceLifecycle<B>, config: EngineConfig) -> Self {
        Self {
            tones: Vec::new(),
            lifecycle,
            config: config.sanitized(),
            next_id: 0,
        }
    }

    /// Creates, starts and fades in a tone. On error nothing is registered
    /// and whatever part of the device was built is released.
    pub fn add_tone(
        &mut self,
        frequency: f32,
        waveform: Waveform,
        volume: u8,
        paused: bool,
    ) -> Result<ToneId, DeviceError> {
        let mut device = self.lifecycle.create_device(waveform, frequency)?;
        device.start()?;
        device.ramp_gain(gain(volume, true, paused), self.config.fade_in);

        let id = ToneId(self.next_id);
        self.next_id += 1;
        self.tones.push(Tone {
            id,
            frequency,
            waveform,
            volume,
            enabled: true,
            device,
            created_at: SystemTime::now(),
        });
        info!(%id, frequency, %waveform, volume, paused, "tone added");
        Ok(id)
    }

    /// Returns false when `id` is unknown.
    pub fn remove_tone(&mut self, id: ToneId) -> bool {
        let Some(index) = self.position(id) else {
            debug!(%id, "remove ignored, no such tone");
            return false;
        };
        let tone = self.tones.remove(index);
        self.lifecycle
            .release(tone.device, self.config.fade_out, self.config.release_delay);
        info!(%id, "tone removed");
        true
    }

    pub fn set_volume(&mut self, id: ToneId, volume: u8, paused: bool) {
        let ramp = self.config.gain_ramp;
        if let Some(tone) = self.tone_mut(id) {
            tone.volume = volume;
            tone.apply_gain(paused, ramp);
            debug!(%id, volume, "volume changed");
        }
    }

    /// Flips the mute flag and returns the new `enabled` state. The stored
    /// volume is left alone.
    pub fn toggle(&mut self, id: ToneId, paused: bool) -> Option<bool> {
        let ramp = self.config.gain_ramp;
        let tone = self.tone_mut(id)?;
        tone.enabled = !tone.enabled;
        tone.apply_gain(paused, ramp);
        debug!(%id, enabled = tone.enabled, "tone toggled");
        Some(tone.enabled)
    }

    /// Drives every tone to its policy gain for the given pause state.
    pub fn reapply_all(&mut self, paused: bool) {
        let ramp = self.config.gain_ramp;
        for tone in &mut self.tones {
            tone.apply_gain(paused, ramp);
        }
    }

    /// Fades out and releases every tone. Returns how many were stopped.
    pub fn stop_all(&mut self) -> usize {
        let count = self.tones.len();
        for tone in self.tones.drain(..) {
            self.lifecycle
                .release(tone.device, self.config.fade_out, self.config.release_delay);
        }
        if count > 0 {
            info!(count, "all tones stopped");
        }
        count
    }

    /// Stops every device immediately, then closes the output context.
    pub fn shutdown(&mut self) {
        for mut tone in self.tones.drain(..) {
            tone.device.stop();
        }
        self.lifecycle.teardown();
    }

    pub fn list(&self, paused: bool) -> Vec<ToneSnapshot> {
        self.tones.iter().map(|tone| tone.snapshot(paused)).collect()
    }

    #[cfg(test)]
    pub fn get(&self, id: ToneId, paused: bool) -> Option<ToneSnapshot> {
        self.tones
            .iter()
            .find(|tone| tone.id == id)
            .map(|tone| tone.snapshot(paused))
    }

    pub fn len(&self) -> usize {
        self.tones.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.tones.is_empty()
    }

    fn position(&self, id: ToneId) -> Option<usize> {
        self.tones.iter().position(|tone| tone.id == id)
    }

    fn tone_mut(&mut self, id: ToneId) -> Option<&mut Tone<BackendDevice<B>>> {
        self.tones.iter_mut().find(|tone| tone.id == id)
    }
}

impl<S: SignalSource, G: GainStage> Tone<ToneDevice<S, G>> {
    fn apply_gain(&mut self, paused: bool, ramp: Duration) {
        let target = gain(self.volume, self.enabled, paused);
        self.device.ramp_gain(target, ramp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gain::MAX_GAIN;
    use crate::testing::MockBackend;
    use tokio::runtime::Handle;

    fn registry(backend: &MockBackend) -> ToneRegistry<MockBackend> {
        let lifecycle = DeviceLifecycle::new(backend.clone(), Handle::current());
        ToneRegistry::new(lifecycle, EngineConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn add_fades_in_to_policy_gain() {
        let backend = MockBackend::default();
        let mut registry = registry(&backend);
        let id = registry.add_tone(440.0, Waveform::Sine, 50, false).unwrap();

        let tones = registry.list(false);
        assert_eq!(tones.len(), 1);
        assert_eq!(tones[0].id, id);
        assert_eq!(tones[0].volume, 50);
        assert!(tones[0].enabled);
        assert_eq!(tones[0].gain, gain(50, true, false));

        let state = backend.state();
        assert!(state.sources[0].started);
        assert_eq!(
            state.gains[0].ramps,
            vec![(0.5 * MAX_GAIN, Duration::from_millis(10))]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn ids_are_unique_and_order_is_kept() {
        let backend = MockBackend::default();
        let mut registry = registry(&backend);
        let a = registry.add_tone(220.0, Waveform::Sine, 10, false).unwrap();
        let b = registry.add_tone(330.0, Waveform::Square, 20, false).unwrap();
        registry.remove_tone(a);
        let c = registry.add_tone(440.0, Waveform::Triangle, 30, false).unwrap();
        assert!(a != b && b != c && a != c);
        let order: Vec<ToneId> = registry.list(false).iter().map(|tone| tone.id).collect();
        assert_eq!(order, vec![b, c]);
    }

    #[tokio::test(start_paused = true)]
    async fn toggle_keeps_volume() {
        let backend = MockBackend::default();
        let mut registry = registry(&backend);
        let id = registry.add_tone(440.0, Waveform::Sine, 50, false).unwrap();

        assert_eq!(registry.toggle(id, false), Some(false));
        let muted = registry.get(id, false).unwrap();
        assert_eq!(muted.volume, 50);
        assert_eq!(muted.gain, 0.0);
        assert_eq!(backend.state().gains[0].value, 0.0);

        assert_eq!(registry.toggle(id, false), Some(true));
        let restored = registry.get(id, false).unwrap();
        assert_eq!(restored.volume, 50);
        assert_eq!(restored.gain, gain(50, true, false));
        assert_eq!(backend.state().gains[0].value, gain(50, true, false));
    }

    #[tokio::test(start_paused = true)]
    async fn volume_change_while_muted_stays_silent() {
        let backend = MockBackend::default();
        let mut registry = registry(&backend);
        let id = registry.add_tone(440.0, Waveform::Sine, 50, false).unwrap();
        registry.toggle(id, false);
        registry.set_volume(id, 80, false);
        assert_eq!(backend.state().gains[0].value, 0.0);
        registry.toggle(id, false);
        assert_eq!(backend.state().gains[0].value, gain(80, true, false));
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_ids_are_ignored() {
        let backend = MockBackend::default();
        let mut registry = registry(&backend);
        let id = registry.add_tone(440.0, Waveform::Sine, 50, false).unwrap();
        assert!(registry.remove_tone(id));
        assert!(!registry.remove_tone(id));
        registry.set_volume(id, 10, false);
        assert_eq!(registry.toggle(id, false), None);
        assert!(registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_start_registers_nothing() {
        let backend = MockBackend::default();
        let mut registry = registry(&backend);
        backend.state().fail_start = true;
        assert!(registry.add_tone(440.0, Waveform::Sine, 50, false).is_err());
        assert!(registry.is_empty());
        {
            let state = backend.state();
            assert!(state.sources[0].released);
            assert!(state.gains[0].released);
        }

        backend.state().fail_start = false;
        let id = registry.add_tone(440.0, Waveform::Sine, 50, false).unwrap();
        assert_eq!(id, ToneId(0));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn removal_fades_then_stops() {
        let backend = MockBackend::default();
        let mut registry = registry(&backend);
        let id = registry.add_tone(440.0, Waveform::Sine, 50, false).unwrap();
        registry.remove_tone(id);
        assert!(registry.is_empty());
        {
            let state = backend.state();
            assert_eq!(state.gains[0].value, 0.0);
            assert!(!state.sources[0].stopped);
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
        assert!(backend.state().sources[0].stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn re_adding_does_not_touch_the_outgoing_device() {
        let backend = MockBackend::default();
        let mut registry = registry(&backend);
        let old = registry.add_tone(440.0, Waveform::Sine, 50, false).unwrap();
        registry.remove_tone(old);
        let new = registry.add_tone(440.0, Waveform::Sine, 50, false).unwrap();
        assert_ne!(old, new);

        tokio::time::sleep(Duration::from_millis(25)).await;
        let state = backend.state();
        assert!(state.sources[0].stopped);
        assert!(state.sources[1].started);
        assert!(!state.sources[1].stopped);
        assert_eq!(state.gains[1].value, gain(50, true, false));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_everything_synchronously() {
        let backend = MockBackend::default();
        let mut registry = registry(&backend);
        let a = registry.add_tone(440.0, Waveform::Sine, 50, false).unwrap();
        registry.add_tone(660.0, Waveform::Square, 50, false).unwrap();
        registry.remove_tone(a);
        registry.shutdown();
        let state = backend.state();
        assert_eq!(state.live_sources(), 0);
        assert_eq!(state.contexts_closed, 1);
    }
}
