use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::{runtime::Handle, task::JoinHandle};
use tracing::{debug, info};

use crate::device::{AudioBackend, DeviceError, DeviceOf, OutputContext, ToneDevice};
use crate::waveform::Waveform;

pub type BackendDevice<B> = DeviceOf<<B as AudioBackend>::Context>;

/// A device fading out on its own schedule. The slot is only shared with
/// the task that will stop it.
struct PendingRelease<D> {
    slot: Arc<Mutex<Option<D>>>,
    task: JoinHandle<()>,
}

/// Owns the session's single output context and every device that has left
/// the registry but is not stopped yet.
pub struct DeviceLifecycle<B: AudioBackend> {
    backend: B,
    context: Option<B::Context>,
    runtime: Handle,
    pending: Vec<PendingRelease<BackendDevice<B>>>,
}

impl<B: AudioBackend> DeviceLifecycle<B> {
    pub fn new(backend: B, runtime: Handle) -> Self {
        Self {
            backend,
            context: None,
            runtime,
            pending: Vec::new(),
        }
    }

    /// The shared context, opened on first use.
    pub fn context(&mut self) -> Result<&mut B::Context, DeviceError> {
        let context = match self.context.take() {
            Some(context) => context,
            None => {
                let context = self.backend.open_context()?;
                info!("output context acquired");
                context
            }
        };
        Ok(self.context.insert(context))
    }

    #[cfg(test)]
    pub fn has_context(&self) -> bool {
        self.context.is_some()
    }

    pub fn create_device(
        &mut self,
        waveform: Waveform,
        frequency: f32,
    ) -> Result<BackendDevice<B>, DeviceError> {
        let context = self.context()?;
        ToneDevice::create(context, waveform, frequency)
    }

    /// Fades `device` out and stops it once `delay` has passed, without
    /// blocking the caller.
    pub fn release(&mut self, mut device: BackendDevice<B>, fade_out: Duration, delay: Duration) {
        device.ramp_gain(0.0, fade_out);
        self.pending.retain(|pending| !pending.task.is_finished());
        let slot = Arc::new(Mutex::new(Some(device)));
        let task_slot = slot.clone();
        let task = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let device = task_slot.lock().ok().and_then(|mut guard| guard.take());
            if let Some(mut device) = device {
                device.stop();
            }
        });
        self.pending.push(PendingRelease { slot, task });
    }

    /// Releases still waiting for their stop.
    #[cfg(test)]
    pub fn pending_releases(&self) -> usize {
        self.pending
            .iter()
            .filter(|pending| {
                pending
                    .slot
                    .lock()
                    .map(|guard| guard.is_some())
                    .unwrap_or(false)
            })
            .count()
    }

    /// Stops every pending device now and closes the context. Repeatable.
    pub fn teardown(&mut self) {
        let cancelled = self.pending.len();
        for pending in self.pending.drain(..) {
            pending.task.abort();
            let device = pending.slot.lock().ok().and_then(|mut guard| guard.take());
            if let Some(mut device) = device {
                device.stop();
            }
        }
        if cancelled > 0 {
            debug!(cancelled, "pending releases stopped early");
        }
        if let Some(mut context) = self.context.take() {
            context.close();
            info!("output context released");
        }
    }
}

impl<B: AudioBackend> Drop for DeviceLifecycle<B> {
    fn drop(&mut self) {
        self.teardown();
    }
}
