/// Full-scale gain of a single tone at 100% volume. Kept low so a handful of
/// tones summed at the output stays clear of clipping.
pub const MAX_GAIN: f32 = 0.2;

/// Target gain for a tone. Global pause wins over the mute flag, which wins
/// over volume. `volume_percent` must already be within [0, 100].
pub fn gain(volume_percent: u8, enabled: bool, global_paused: bool) -> f32 {
    if global_paused || !enabled {
        return 0.0;
    }
    (f32::from(volume_percent) / 100.0) * MAX_GAIN
}
