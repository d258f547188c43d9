//! Recording host capability for engine tests.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::device::{AudioBackend, DeviceError, GainStage, OutputContext, SignalSource};
use crate::waveform::Waveform;

#[derive(Debug)]
pub struct SourceRecord {
    pub waveform: Waveform,
    pub frequency: f32,
    pub started: bool,
    pub stopped: bool,
    pub stop_calls: usize,
    pub released: bool,
}

#[derive(Debug, Default)]
pub struct GainRecord {
    /// Value the stage is heading to: last set or ramp target.
    pub value: f32,
    pub ramps: Vec<(f32, Duration)>,
    pub released: bool,
}

#[derive(Debug, Default)]
pub struct MockState {
    pub contexts_opened: usize,
    pub contexts_closed: usize,
    pub sources: Vec<SourceRecord>,
    pub gains: Vec<GainRecord>,
    pub routes: Vec<(usize, usize)>,
    pub fail_open: bool,
    pub fail_source: bool,
    pub fail_gain: bool,
    pub fail_start: bool,
}

impl MockState {
    pub fn live_sources(&self) -> usize {
        self.sources
            .iter()
            .filter(|source| source.started && !source.stopped)
            .count()
    }
}

#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().expect("mock state lock")
    }

    /// Context without going through `open_context` bookkeeping.
    pub fn context(&self) -> MockContext {
        MockContext {
            state: self.state.clone(),
            closed: false,
        }
    }
}

impl AudioBackend for MockBackend {
    type Context = MockContext;

    fn open_context(&mut self) -> Result<MockContext, DeviceError> {
        let mut state = self.state();
        if state.fail_open {
            return Err(DeviceError::NoOutputDevice);
        }
        state.contexts_opened += 1;
        drop(state);
        Ok(self.context())
    }
}

pub struct MockContext {
    state: Arc<Mutex<MockState>>,
    closed: bool,
}

impl OutputContext for MockContext {
    type Source = MockSource;
    type Gain = MockGain;

    fn create_source(&mut self, waveform: Waveform, frequency: f32) -> Result<MockSource, DeviceError> {
        let mut state = self.state.lock().expect("mock state lock");
        if self.closed {
            return Err(DeviceError::ContextClosed);
        }
        if state.fail_source {
            return Err(DeviceError::Unavailable("mock source".into()));
        }
        state.sources.push(SourceRecord {
            waveform,
            frequency,
            started: false,
            stopped: false,
            stop_calls: 0,
            released: false,
        });
        Ok(MockSource {
            id: state.sources.len() - 1,
            state: self.state.clone(),
        })
    }

    fn create_gain(&mut self) -> Result<MockGain, DeviceError> {
        let mut state = self.state.lock().expect("mock state lock");
        if state.fail_gain {
            return Err(DeviceError::Unavailable("mock gain".into()));
        }
        state.gains.push(GainRecord::default());
        Ok(MockGain {
            id: state.gains.len() - 1,
            state: self.state.clone(),
        })
    }

    fn connect(&mut self, source: &MockSource, gain: &MockGain) -> Result<(), DeviceError> {
        self.state
            .lock()
            .expect("mock state lock")
            .routes
            .push((source.id, gain.id));
        Ok(())
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.state.lock().expect("mock state lock").contexts_closed += 1;
        }
    }
}

pub struct MockSource {
    id: usize,
    state: Arc<Mutex<MockState>>,
}

impl SignalSource for MockSource {
    fn start(&mut self) -> Result<(), DeviceError> {
        let mut state = self.state.lock().expect("mock state lock");
        if state.fail_start {
            return Err(DeviceError::Unavailable("mock start".into()));
        }
        state.sources[self.id].started = true;
        Ok(())
    }

    fn stop(&mut self) {
        let mut state = self.state.lock().expect("mock state lock");
        let record = &mut state.sources[self.id];
        record.stopped = true;
        record.stop_calls += 1;
    }
}

impl Drop for MockSource {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.sources[self.id].released = true;
        }
    }
}

pub struct MockGain {
    id: usize,
    state: Arc<Mutex<MockState>>,
}

impl GainStage for MockGain {
    fn set_value(&mut self, value: f32) {
        self.state.lock().expect("mock state lock").gains[self.id].value = value;
    }

    fn ramp_to(&mut self, value: f32, duration: Duration) {
        let mut state = self.state.lock().expect("mock state lock");
        let record = &mut state.gains[self.id];
        record.value = value;
        record.ramps.push((value, duration));
    }
}

impl Drop for MockGain {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.gains[self.id].released = true;
        }
    }
}
