//! Host audio capability and the per-tone device adapter built on top of it.
//!
//! The engine never talks to an audio API directly. A backend opens one
//! [`OutputContext`] per session; the context hands out signal sources and
//! gain stages which it wires to its output. [`ToneDevice`] pairs one source
//! with one gain stage and owns both exclusively.

use std::time::Duration;

use crate::waveform::Waveform;

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("no audio output device available")]
    NoOutputDevice,
    #[error("audio device unavailable: {0}")]
    Unavailable(String),
    #[error("audio output context is closed")]
    ContextClosed,
}

/// Entry point of a host audio API.
pub trait AudioBackend {
    type Context: OutputContext;

    fn open_context(&mut self) -> Result<Self::Context, DeviceError>;
}

/// A live output: the shared capability every tone is created from.
pub trait OutputContext {
    type Source: SignalSource + 'static;
    type Gain: GainStage + 'static;

    fn create_source(
        &mut self,
        waveform: Waveform,
        frequency: f32,
    ) -> Result<Self::Source, DeviceError>;

    fn create_gain(&mut self) -> Result<Self::Gain, DeviceError>;

    /// Routes `source → gain → output`.
    fn connect(&mut self, source: &Self::Source, gain: &Self::Gain) -> Result<(), DeviceError>;

    /// Releases the output. Handles created from this context become inert.
    fn close(&mut self);
}

/// Periodic oscillator. A stopped source cannot be restarted.
pub trait SignalSource: Send + 'static {
    fn start(&mut self) -> Result<(), DeviceError>;

    /// Must be a silent no-op when already stopped or when the context has
    /// closed.
    fn stop(&mut self);
}

pub trait GainStage: Send + 'static {
    fn set_value(&mut self, value: f32);

    /// Linear ramp from the current value to `value` over `duration`.
    fn ramp_to(&mut self, value: f32, duration: Duration);
}

pub type DeviceOf<C> = ToneDevice<<C as OutputContext>::Source, <C as OutputContext>::Gain>;

/// One oscillator and its gain stage. Dropping the device stops it.
pub struct ToneDevice<S: SignalSource, G: GainStage> {
    source: S,
    gain: G,
    stopped: bool,
}

impl<S: SignalSource, G: GainStage> ToneDevice<S, G> {
    /// Builds and wires a silent, not yet started device. Any sub-resource
    /// created before a failure is dropped with the error.
    pub fn create<C>(context: &mut C, waveform: Waveform, frequency: f32) -> Result<Self, DeviceError>
    where
        C: OutputContext<Source = S, Gain = G>,
    {
        let source = context.create_source(waveform, frequency)?;
        let mut gain = context.create_gain()?;
        gain.set_value(0.0);
        context.connect(&source, &gain)?;
        Ok(Self {
            source,
            gain,
            stopped: false,
        })
    }

    pub fn start(&mut self) -> Result<(), DeviceError> {
        self.source.start()
    }

    pub fn ramp_gain(&mut self, target: f32, duration: Duration) {
        if self.stopped {
            return;
        }
        if duration.is_zero() {
            self.gain.set_value(target);
        } else {
            self.gain.ramp_to(target, duration);
        }
    }

    pub fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.source.stop();
        }
    }

    #[cfg(test)]
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }
}

impl<S: SignalSource, G: GainStage> Drop for ToneDevice<S, G> {
    fn drop(&mut self) {
        self.stop();
    }
}
