use std::collections::HashMap;

use crate::waveform::Waveform;

pub type NodeId = u64;

pub struct OscillatorVoice {
    waveform: Waveform,
    frequency: f32,
    phase: f32,
    running: bool,
}

impl OscillatorVoice {
    fn new(waveform: Waveform, frequency: f32) -> Self {
        Self {
            waveform,
            frequency,
            phase: 0.0,
            running: false,
        }
    }

    fn sample(&mut self, sample_rate: f32) -> f32 {
        let phase_delta = self.frequency / sample_rate;
        let value = self.waveform.sample(self.phase);
        self.phase = (self.phase + phase_delta).fract();
        value
    }
}

/// Per-sample linear gain ramp. The last step snaps to the target exactly.
#[derive(Clone, Copy, Debug, Default)]
pub struct GainRamp {
    current: f32,
    target: f32,
    step: f32,
    remaining: u32,
}

impl GainRamp {
    pub fn set(&mut self, value: f32) {
        self.current = value;
        self.target = value;
        self.step = 0.0;
        self.remaining = 0;
    }

    pub fn ramp_to(&mut self, target: f32, frames: u32) {
        if frames == 0 {
            self.set(target);
            return;
        }
        self.target = target;
        self.remaining = frames;
        self.step = (target - self.current) / frames as f32;
    }

    pub fn next(&mut self) -> f32 {
        if self.remaining > 0 {
            self.remaining -= 1;
            self.current = if self.remaining == 0 {
                self.target
            } else {
                self.current + self.step
            };
        }
        self.current
    }

    #[cfg(test)]
    pub fn current(&self) -> f32 {
        self.current
    }
}

/// Render graph shared between the engine handles and the audio callback.
pub struct OscillatorBank {
    voices: HashMap<NodeId, OscillatorVoice>,
    gains: HashMap<NodeId, GainRamp>,
    routes: Vec<(NodeId, NodeId)>,
    next_id: NodeId,
    sample_rate: f32,
}

impl OscillatorBank {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            voices: HashMap::new(),
            gains: HashMap::new(),
            routes: Vec::new(),
            next_id: 0,
            sample_rate: sample_rate.max(1.0),
        }
    }

    pub fn add_voice(&mut self, waveform: Waveform, frequency: f32) -> NodeId {
        let id = self.allocate();
        self.voices.insert(id, OscillatorVoice::new(waveform, frequency));
        id
    }

    pub fn add_gain(&mut self) -> NodeId {
        let id = self.allocate();
        self.gains.insert(id, GainRamp::default());
        id
    }

    /// Returns false when either node is gone.
    pub fn connect(&mut self, voice: NodeId, gain: NodeId) -> bool {
        if !self.voices.contains_key(&voice) || !self.gains.contains_key(&gain) {
            return false;
        }
        self.routes.push((voice, gain));
        true
    }

    pub fn start_voice(&mut self, voice: NodeId) -> bool {
        match self.voices.get_mut(&voice) {
            Some(state) => {
                state.running = true;
                true
            }
            None => false,
        }
    }

    /// Stopping removes the voice; a stopped oscillator is never restarted.
    pub fn remove_voice(&mut self, voice: NodeId) {
        self.voices.remove(&voice);
        self.routes.retain(|(v, _)| *v != voice);
    }

    pub fn remove_gain(&mut self, gain: NodeId) {
        self.gains.remove(&gain);
        self.routes.retain(|(_, g)| *g != gain);
    }

    pub fn set_gain(&mut self, gain: NodeId, value: f32) {
        if let Some(ramp) = self.gains.get_mut(&gain) {
            ramp.set(value);
        }
    }

    pub fn ramp_gain(&mut self, gain: NodeId, value: f32, seconds: f32) {
        let frames = (seconds.max(0.0) * self.sample_rate).round() as u32;
        if let Some(ramp) = self.gains.get_mut(&gain) {
            ramp.ramp_to(value, frames);
        }
    }

    #[cfg(test)]
    pub fn gain(&self, gain: NodeId) -> Option<GainRamp> {
        self.gains.get(&gain).copied()
    }

    #[cfg(test)]
    pub fn is_running(&self, voice: NodeId) -> bool {
        self.voices.get(&voice).is_some_and(|state| state.running)
    }

    pub fn clear(&mut self) {
        self.voices.clear();
        self.gains.clear();
        self.routes.clear();
    }

    pub fn next_sample(&mut self) -> f32 {
        let sample_rate = self.sample_rate;
        let mut mixed = 0.0;
        for (voice_id, gain_id) in &self.routes {
            let (Some(voice), Some(gain)) =
                (self.voices.get_mut(voice_id), self.gains.get_mut(gain_id))
            else {
                continue;
            };
            let level = gain.next();
            if voice.running {
                mixed += voice.sample(sample_rate) * level;
            }
        }
        mixed
    }

    fn allocate(&mut self) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}
