use std::sync::{Arc, Mutex};
use std::time::Duration;

use cpal::{
    SampleFormat, Stream,
    traits::{DeviceTrait, HostTrait, StreamTrait},
};
use tracing::{debug, error, info};

use crate::device::{AudioBackend, DeviceError, GainStage, OutputContext, SignalSource};
use crate::oscillatorbank::{NodeId, OscillatorBank};
use crate::waveform::Waveform;

pub type SharedBank = Arc<Mutex<OscillatorBank>>;

const OUTPUT_CEILING: f32 = 0.98;

/// Host capability backed by the default cpal output device.
#[derive(Default)]
pub struct CpalBackend;

impl AudioBackend for CpalBackend {
    type Context = CpalContext;

    fn open_context(&mut self) -> Result<CpalContext, DeviceError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(DeviceError::NoOutputDevice)?;
        let supported = device.default_output_config().map_err(unavailable)?;
        let config = supported.config();
        let sample_rate = config.sample_rate.0 as f32;
        let bank = Arc::new(Mutex::new(OscillatorBank::new(sample_rate)));
        let stream = match supported.sample_format() {
            SampleFormat::F32 => build_stream_f32(&device, &config, bank.clone())?,
            SampleFormat::I16 => build_stream_i16(&device, &config, bank.clone())?,
            SampleFormat::U16 => build_stream_u16(&device, &config, bank.clone())?,
            format => {
                return Err(DeviceError::Unavailable(format!(
                    "unsupported sample format {format:?}"
                )));
            }
        };
        stream.play().map_err(unavailable)?;
        info!(
            device = %device.name().unwrap_or_default(),
            sample_rate,
            channels = config.channels,
            "audio output context opened"
        );
        Ok(CpalContext {
            bank,
            stream: Some(stream),
        })
    }
}

fn unavailable(err: impl std::fmt::Display) -> DeviceError {
    DeviceError::Unavailable(err.to_string())
}

pub struct CpalContext {
    bank: SharedBank,
    stream: Option<Stream>,
}

impl CpalContext {
    fn with_bank<T>(&self, f: impl FnOnce(&mut OscillatorBank) -> T) -> Result<T, DeviceError> {
        if self.stream.is_none() {
            return Err(DeviceError::ContextClosed);
        }
        let mut bank = self
            .bank
            .lock()
            .map_err(|_| DeviceError::Unavailable("render graph poisoned".into()))?;
        Ok(f(&mut bank))
    }
}

impl OutputContext for CpalContext {
    type Source = CpalSource;
    type Gain = CpalGain;

    fn create_source(&mut self, waveform: Waveform, frequency: f32) -> Result<CpalSource, DeviceError> {
        let id = self.with_bank(|bank| bank.add_voice(waveform, frequency))?;
        Ok(CpalSource {
            id,
            bank: self.bank.clone(),
        })
    }

    fn create_gain(&mut self) -> Result<CpalGain, DeviceError> {
        let id = self.with_bank(|bank| bank.add_gain())?;
        Ok(CpalGain {
            id,
            bank: self.bank.clone(),
        })
    }

    fn connect(&mut self, source: &CpalSource, gain: &CpalGain) -> Result<(), DeviceError> {
        if self.with_bank(|bank| bank.connect(source.id, gain.id))? {
            Ok(())
        } else {
            Err(DeviceError::Unavailable("graph node vanished before connect".into()))
        }
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(err) = stream.pause() {
                debug!("pausing stream on close failed: {err}");
            }
            drop(stream);
            if let Ok(mut bank) = self.bank.lock() {
                bank.clear();
            }
            info!("audio output context closed");
        }
    }
}

impl Drop for CpalContext {
    fn drop(&mut self) {
        self.close();
    }
}

pub struct CpalSource {
    id: NodeId,
    bank: SharedBank,
}

impl SignalSource for CpalSource {
    fn start(&mut self) -> Result<(), DeviceError> {
        let mut bank = self
            .bank
            .lock()
            .map_err(|_| DeviceError::Unavailable("render graph poisoned".into()))?;
        if bank.start_voice(self.id) {
            Ok(())
        } else {
            Err(DeviceError::ContextClosed)
        }
    }

    fn stop(&mut self) {
        if let Ok(mut bank) = self.bank.lock() {
            bank.remove_voice(self.id);
        }
    }
}

impl Drop for CpalSource {
    fn drop(&mut self) {
        self.stop();
    }
}

pub struct CpalGain {
    id: NodeId,
    bank: SharedBank,
}

impl GainStage for CpalGain {
    fn set_value(&mut self, value: f32) {
        if let Ok(mut bank) = self.bank.lock() {
            bank.set_gain(self.id, value);
        }
    }

    fn ramp_to(&mut self, value: f32, duration: Duration) {
        if let Ok(mut bank) = self.bank.lock() {
            bank.ramp_gain(self.id, value, duration.as_secs_f32());
        }
    }
}

impl Drop for CpalGain {
    fn drop(&mut self) {
        if let Ok(mut bank) = self.bank.lock() {
            bank.remove_gain(self.id);
        }
    }
}

fn build_stream_f32(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    bank: SharedBank,
) -> Result<Stream, DeviceError> {
    let channels = config.channels as usize;
    device
        .build_output_stream(
            config,
            move |output: &mut [f32], _| {
                fill_output_buffer(output, channels, &bank, |sample| sample, 0.0);
            },
            move |err| error!("audio stream error: {err}"),
            None,
        )
        .map_err(unavailable)
}

fn build_stream_i16(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    bank: SharedBank,
) -> Result<Stream, DeviceError> {
    let channels = config.channels as usize;
    device
        .build_output_stream(
            config,
            move |output: &mut [i16], _| {
                fill_output_buffer(
                    output,
                    channels,
                    &bank,
                    |sample| (sample * i16::MAX as f32) as i16,
                    0,
                );
            },
            move |err| error!("audio stream error: {err}"),
            None,
        )
        .map_err(unavailable)
}

fn build_stream_u16(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    bank: SharedBank,
) -> Result<Stream, DeviceError> {
    let channels = config.channels as usize;
    device
        .build_output_stream(
            config,
            move |output: &mut [u16], _| {
                fill_output_buffer(
                    output,
                    channels,
                    &bank,
                    |sample| {
                        let scaled = (sample * 0.5 + 0.5).clamp(0.0, 1.0);
                        (scaled * u16::MAX as f32) as u16
                    },
                    u16::MAX / 2 + 1,
                );
            },
            move |err| error!("audio stream error: {err}"),
            None,
        )
        .map_err(unavailable)
}

fn fill_output_buffer<T, F>(
    output: &mut [T],
    channels: usize,
    bank: &SharedBank,
    mut convert: F,
    silence: T,
) where
    F: FnMut(f32) -> T,
    T: Copy,
{
    let Ok(mut bank) = bank.lock() else {
        output.fill(silence);
        return;
    };
    for frame in output.chunks_mut(channels.max(1)) {
        let sample = bank.next_sample().clamp(-OUTPUT_CEILING, OUTPUT_CEILING);
        let value = convert(sample);
        for channel in frame {
            *channel = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bank_with_tone(level: f32) -> SharedBank {
        let mut bank = OscillatorBank::new(8.0);
        let voice = bank.add_voice(Waveform::Square, 1.0);
        let gain = bank.add_gain();
        bank.connect(voice, gain);
        bank.set_gain(gain, level);
        bank.start_voice(voice);
        Arc::new(Mutex::new(bank))
    }

    #[test]
    fn frames_are_copied_to_every_channel() {
        let bank = bank_with_tone(0.5);
        let mut output = [0.0f32; 4];
        fill_output_buffer(&mut output, 2, &bank, |sample| sample, 0.0);
        assert_eq!(output, [0.5, 0.5, 0.5, 0.5]);
    }

    #[test]
    fn output_is_clamped_below_full_scale() {
        let bank = bank_with_tone(4.0);
        let mut output = [0i16; 2];
        fill_output_buffer(&mut output, 1, &bank, |sample| (sample * i16::MAX as f32) as i16, 0);
        assert_eq!(output[0], (OUTPUT_CEILING * i16::MAX as f32) as i16);
    }

    #[test]
    fn handles_outlive_a_cleared_graph() {
        let bank: SharedBank = Arc::new(Mutex::new(OscillatorBank::new(8.0)));
        let (voice, gain) = {
            let mut guard = bank.lock().unwrap();
            (guard.add_voice(Waveform::Sine, 1.0), guard.add_gain())
        };
        let mut source = CpalSource {
            id: voice,
            bank: bank.clone(),
        };
        let mut stage = CpalGain {
            id: gain,
            bank: bank.clone(),
        };
        bank.lock().unwrap().clear();
        assert!(matches!(source.start(), Err(DeviceError::ContextClosed)));
        stage.ramp_to(0.2, Duration::from_millis(10));
        source.stop();
        assert!(bank.lock().unwrap().gain(gain).is_none());
    }
}
