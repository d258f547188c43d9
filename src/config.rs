use std::time::Duration;

use tracing::warn;

const FADE_IN: Duration = Duration::from_millis(10);
const FADE_OUT: Duration = Duration::from_millis(10);
const RELEASE_DELAY: Duration = Duration::from_millis(20);
const GAIN_RAMP: Duration = Duration::from_millis(10);

/// Timing knobs of the tone engine.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EngineConfig {
    /// Ramp from silence to the first target gain of a new tone.
    pub fade_in: Duration,
    /// Ramp to silence before a tone's source is stopped.
    pub fade_out: Duration,
    /// Delay between logical removal and stopping the source.
    pub release_delay: Duration,
    /// Ramp applied to volume, mute and pause changes on live tones.
    pub gain_ramp: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fade_in: FADE_IN,
            fade_out: FADE_OUT,
            release_delay: RELEASE_DELAY,
            gain_ramp: GAIN_RAMP,
        }
    }
}

impl EngineConfig {
    /// Stretches `release_delay` so the source is never stopped mid fade.
    pub fn sanitized(mut self) -> Self {
        if self.release_delay < self.fade_out {
            warn!(
                release_ms = self.release_delay.as_millis() as u64,
                fade_ms = self.fade_out.as_millis() as u64,
                "release delay shorter than fade-out, extending"
            );
            self.release_delay = self.fade_out;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_leave_room_for_fade_out() {
        let config = EngineConfig::default();
        assert!(config.release_delay > config.fade_out);
        assert_eq!(config.sanitized(), config);
    }

    #[test]
    fn short_release_delay_is_extended() {
        let config = EngineConfig {
            release_delay: Duration::from_millis(2),
            ..EngineConfig::default()
        }
        .sanitized();
        assert_eq!(config.release_delay, config.fade_out);
    }
}
