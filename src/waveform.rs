use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Waveform {
    Sine,
    Square,
    Triangle,
    Sawtooth,
}

impl Waveform {
    pub const VALUES: [Waveform; 4] = [
        Waveform::Sine,
        Waveform::Square,
        Waveform::Triangle,
        Waveform::Sawtooth,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Waveform::Sine => "SINE",
            Waveform::Square => "SQUARE",
            Waveform::Triangle => "TRIANGLE",
            Waveform::Sawtooth => "SAWTOOTH",
        }
    }

    /// Evaluates one period at `phase` in [0, 1). Output is in [-1, 1].
    pub fn sample(&self, phase: f32) -> f32 {
        match self {
            Waveform::Sine => (phase * std::f32::consts::TAU).sin(),
            Waveform::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
            Waveform::Sawtooth => 2.0 * (phase - 0.5),
        }
    }

    /// Polyline for the waveform buttons: one period across `width`, centred
    /// vertically in `height` with 35% amplitude. Screen space, y grows down.
    pub fn preview_points(&self, width: f32, height: f32, steps: usize) -> Vec<(f32, f32)> {
        let steps = steps.max(2);
        let center_y = height * 0.5;
        let amplitude = height * 0.35;
        (0..=steps)
            .map(|step| {
                let t = step as f32 / steps as f32;
                // Keep the final point on the last sample of the period so
                // square and sawtooth end high instead of wrapping to phase 0.
                let phase = t.min(0.9999);
                (t * width, center_y - self.sample(phase) * amplitude)
            })
            .collect()
    }
}

impl fmt::Display for Waveform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label().to_lowercase())
    }
}
