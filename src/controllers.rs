use macroquad::prelude::*;

pub const MAX_FREQUENCY: f32 = 20_000.0;
pub const OCTAVES: [i32; 5] = [3, 4, 5, 6, 7];
const REFERENCE_OCTAVE: i32 = 4;
const MAX_ENTRY_LEN: usize = 9;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Note {
    pub name: &'static str,
    /// Pitch in the reference octave.
    pub frequency: f32,
    pub sharp: bool,
}

const fn note(name: &'static str, frequency: f32, sharp: bool) -> Note {
    Note {
        name,
        frequency,
        sharp,
    }
}

pub const NOTES: [Note; 12] = [
    note("C", 261.63, false),
    note("C#", 277.18, true),
    note("D", 293.66, false),
    note("D#", 311.13, true),
    note("E", 329.63, false),
    note("F", 349.23, false),
    note("F#", 369.99, true),
    note("G", 392.00, false),
    note("G#", 415.30, true),
    note("A", 440.00, false),
    note("A#", 466.16, true),
    note("B", 493.88, false),
];

/// Note pitch moved to `octave`, rounded to 0.01 Hz.
pub fn transpose(note: &Note, octave: i32) -> f32 {
    let frequency = note.frequency * 2.0f32.powi(octave - REFERENCE_OCTAVE);
    (frequency * 100.0).round() / 100.0
}

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum InputError {
    #[error("'{0}' is not a number")]
    NotANumber(String),
    #[error("{0} Hz is outside 0 < f <= 20000")]
    OutOfRange(f32),
}

pub fn parse_frequency(text: &str) -> Result<f32, InputError> {
    let trimmed = text.trim();
    let value: f32 = trimmed
        .parse()
        .map_err(|_| InputError::NotANumber(trimmed.to_string()))?;
    if !value.is_finite() {
        return Err(InputError::NotANumber(trimmed.to_string()));
    }
    if value <= 0.0 || value > MAX_FREQUENCY {
        return Err(InputError::OutOfRange(value));
    }
    Ok(value)
}

pub fn clamp_volume(value: f32) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 100.0) as u8
}

/// Text entry for the frequency box. Keeps the last valid value while the
/// user is typing something that does not parse.
pub struct FrequencyField {
    text: String,
    value: f32,
}

impl FrequencyField {
    pub fn new(value: f32) -> Self {
        Self {
            text: format_frequency(value),
            value,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn is_valid(&self) -> bool {
        parse_frequency(&self.text).is_ok()
    }

    pub fn set(&mut self, value: f32) {
        self.value = value;
        self.text = format_frequency(value);
    }

    /// Applies one typed character; returns true when the value changed.
    pub fn push_char(&mut self, ch: char) -> bool {
        if !(ch.is_ascii_digit() || ch == '.') || self.text.len() >= MAX_ENTRY_LEN {
            return false;
        }
        if ch == '.' && self.text.contains('.') {
            return false;
        }
        self.text.push(ch);
        self.commit()
    }

    pub fn backspace(&mut self) -> bool {
        self.text.pop();
        self.commit()
    }

    /// Re-reads the text; invalid text leaves the value untouched.
    pub fn commit(&mut self) -> bool {
        match parse_frequency(&self.text) {
            Ok(value) if value != self.value => {
                self.value = value;
                true
            }
            _ => false,
        }
    }
}

fn format_frequency(value: f32) -> String {
    let text = format!("{value:.2}");
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

#[derive(Clone)]
pub struct KeyBinding {
    pub label: &'static str,
    pub keycode: KeyCode,
    pub note: usize,
}

#[derive(Debug, PartialEq)]
pub enum ControllerMessage {
    Note(f32),
    Octave(i32),
}

/// Computer keyboard as a one-octave note picker: Z..M row plays C..B with
/// sharps on the row above, `-` and `=` step the octave.
pub struct KeyboardController {
    bindings: Vec<KeyBinding>,
    octave: i32,
}

impl KeyboardController {
    pub fn new() -> Self {
        let bindings = vec![
            binding("Z", KeyCode::Z, 0),
            binding("S", KeyCode::S, 1),
            binding("X", KeyCode::X, 2),
            binding("D", KeyCode::D, 3),
            binding("C", KeyCode::C, 4),
            binding("V", KeyCode::V, 5),
            binding("G", KeyCode::G, 6),
            binding("B", KeyCode::B, 7),
            binding("H", KeyCode::H, 8),
            binding("N", KeyCode::N, 9),
            binding("J", KeyCode::J, 10),
            binding("M", KeyCode::M, 11),
        ];
        Self {
            bindings,
            octave: REFERENCE_OCTAVE,
        }
    }

    #[cfg(test)]
    pub fn octave(&self) -> i32 {
        self.octave
    }

    pub fn set_octave(&mut self, octave: i32) {
        self.octave = octave.clamp(OCTAVES[0], OCTAVES[OCTAVES.len() - 1]);
    }

    pub fn binding_for(&self, note: usize) -> Option<&KeyBinding> {
        self.bindings.iter().find(|binding| binding.note == note)
    }

    pub fn note_frequency(&self, note: usize) -> Option<f32> {
        NOTES.get(note).map(|note| transpose(note, self.octave))
    }

    /// Reads this frame's key presses.
    pub fn poll(&mut self) -> Vec<ControllerMessage> {
        self.handle_keys(is_key_pressed)
    }

    /// Octave changes come first, then notes in keyboard order, so the
    /// highest pressed note wins when several land in one frame.
    fn handle_keys(&mut self, pressed: impl Fn(KeyCode) -> bool) -> Vec<ControllerMessage> {
        let mut messages = Vec::new();
        if pressed(KeyCode::Minus) {
            self.set_octave(self.octave - 1);
            messages.push(ControllerMessage::Octave(self.octave));
        }
        if pressed(KeyCode::Equal) {
            self.set_octave(self.octave + 1);
            messages.push(ControllerMessage::Octave(self.octave));
        }
        for binding in &self.bindings {
            if pressed(binding.keycode) {
                if let Some(frequency) = self.note_frequency(binding.note) {
                    messages.push(ControllerMessage::Note(frequency));
                }
            }
        }
        messages
    }
}

fn binding(label: &'static str, keycode: KeyCode, note: usize) -> KeyBinding {
    KeyBinding {
        label,
        keycode,
        note,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transpose_rounds_to_cents_of_hertz() {
        assert_eq!(transpose(&NOTES[9], 4), 440.0);
        assert_eq!(transpose(&NOTES[9], 5), 880.0);
        assert_eq!(transpose(&NOTES[0], 5), 523.26);
        assert_eq!(transpose(&NOTES[11], 7), 3951.04);
    }

    #[test]
    fn frequency_bounds() {
        assert_eq!(parse_frequency("440"), Ok(440.0));
        assert_eq!(parse_frequency(" 20000 "), Ok(20_000.0));
        assert_eq!(parse_frequency("0"), Err(InputError::OutOfRange(0.0)));
        assert_eq!(parse_frequency("20000.5"), Err(InputError::OutOfRange(20_000.5)));
        assert_eq!(parse_frequency("-3"), Err(InputError::OutOfRange(-3.0)));
        assert!(matches!(parse_frequency("abc"), Err(InputError::NotANumber(_))));
        assert!(matches!(parse_frequency("inf"), Err(InputError::NotANumber(_))));
        assert!(matches!(parse_frequency(""), Err(InputError::NotANumber(_))));
    }

    #[test]
    fn volume_is_clamped() {
        assert_eq!(clamp_volume(-5.0), 0);
        assert_eq!(clamp_volume(49.6), 50);
        assert_eq!(clamp_volume(180.0), 100);
        assert_eq!(clamp_volume(f32::NAN), 0);
    }

    #[test]
    fn field_keeps_last_valid_value() {
        let mut field = FrequencyField::new(440.0);
        assert_eq!(field.text(), "440");
        assert!(field.backspace());
        assert_eq!(field.value(), 44.0);
        field.backspace();
        field.backspace();
        assert_eq!(field.text(), "");
        assert!(!field.is_valid());
        assert_eq!(field.value(), 4.0);
        assert!(field.push_char('9'));
        assert!(!field.push_char('x'));
        field.push_char('.');
        field.push_char('.');
        assert_eq!(field.text(), "9.");
        assert!(field.push_char('5'));
        assert_eq!(field.value(), 9.5);
    }

    #[test]
    fn field_formats_note_values() {
        let mut field = FrequencyField::new(440.0);
        field.set(130.82);
        assert_eq!(field.text(), "130.82");
        field.set(880.5);
        assert_eq!(field.text(), "880.5");
    }

    #[test]
    fn octave_is_bounded() {
        let mut controller = KeyboardController::new();
        controller.set_octave(12);
        assert_eq!(controller.octave(), 7);
        controller.set_octave(0);
        assert_eq!(controller.octave(), 3);
        assert_eq!(controller.note_frequency(9), Some(220.0));
        assert_eq!(controller.note_frequency(12), None);
        assert_eq!(controller.binding_for(9).map(|binding| binding.label), Some("N"));
    }

    #[test]
    fn simultaneous_keys_arrive_in_keyboard_order() {
        let mut controller = KeyboardController::new();
        let pressed = [KeyCode::M, KeyCode::Z, KeyCode::Equal];
        for _ in 0..8 {
            controller.set_octave(4);
            let messages = controller.handle_keys(|key| pressed.contains(&key));
            assert_eq!(
                messages,
                vec![
                    ControllerMessage::Octave(5),
                    ControllerMessage::Note(523.26),
                    ControllerMessage::Note(987.76),
                ]
            );
        }
    }
}
