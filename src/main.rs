mod config;
mod controllers;
mod device;
mod gain;
mod lifecycle;
mod oscillatorbank;
mod output;
mod playback;
mod registry;
#[cfg(test)]
mod testing;
mod toast;
mod waveform;

use anyhow::Context;
use config::EngineConfig;
use controllers::{
    ControllerMessage, FrequencyField, KeyboardController, NOTES, OCTAVES, clamp_volume,
    parse_frequency, transpose,
};
use macroquad::{prelude::*, text::measure_text};
use output::CpalBackend;
use playback::PlaybackController;
use registry::{ToneId, ToneSnapshot};
use toast::{ToastKind, Toasts};
use tokio::runtime::Runtime;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use waveform::Waveform;

const SCREEN_WIDTH: f32 = 1180.0;
const SCREEN_HEIGHT: f32 = 760.0;
const PANEL_TOP: f32 = 70.0;
const PANEL_HEIGHT: f32 = 300.0;
const ROW_HEIGHT: f32 = 64.0;
const MAX_VISIBLE_ROWS: usize = 4;
const DEFAULT_FREQUENCY: f32 = 440.0;
const DEFAULT_VOLUME: f32 = 50.0;

const AMBER: Color = Color {
    r: 0.98,
    g: 0.66,
    b: 0.12,
    a: 1.0,
};
const AMBER_DIM: Color = Color {
    r: 0.78,
    g: 0.52,
    b: 0.08,
    a: 0.4,
};
const BACKGROUND: Color = Color {
    r: 0.02,
    g: 0.02,
    b: 0.02,
    a: 1.0,
};
const ALERT: Color = Color {
    r: 0.92,
    g: 0.26,
    b: 0.2,
    a: 1.0,
};

#[macroquad::main(window_conf)]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    if let Err(err) = run().await {
        error!("{err:#}");
    }
}

async fn run() -> anyhow::Result<()> {
    let runtime = Runtime::new().context("starting tokio runtime")?;
    let mut playback = PlaybackController::new(
        CpalBackend,
        EngineConfig::default(),
        runtime.handle().clone(),
    );
    let mut controller = KeyboardController::new();
    let mut panel = PanelState::new();
    let mut knob_drag = KnobDragState::default();
    let mut list_scroll = ListScroll::default();
    let mut toasts = Toasts::default();
    prevent_quit();
    info!("multitone ready");

    loop {
        let dt = get_frame_time();
        let mouse = mouse_position_vec();
        let layout = compute_panel_layout();
        let tones = playback.tones();
        let mut actions = Vec::new();

        handle_text_entry(&mut panel, &mut actions);
        if !panel.frequency_focus {
            for message in controller.poll() {
                match message {
                    ControllerMessage::Note(frequency) => panel.frequency.set(frequency),
                    ControllerMessage::Octave(octave) => panel.octave = octave,
                }
            }
            handle_shortcuts(&mut actions);
        }

        clear_background(BACKGROUND);
        draw_header();
        draw_section(&layout.waveform_rect, "WAVEFORM");
        draw_section(&layout.frequency_rect, "FREQUENCY");
        draw_section(&layout.tone_rect, "NEW TONE");
        draw_section(&layout.list_rect, "ACTIVE TONES");
        draw_waveform_panel(&mut panel, &layout, mouse);
        draw_frequency_panel(&mut panel, &mut controller, &layout, mouse);
        draw_tone_panel(
            &mut panel,
            &mut knob_drag,
            &layout,
            mouse,
            playback.is_paused(),
            &mut actions,
        );
        draw_tone_list(
            &tones,
            &mut list_scroll,
            &mut knob_drag,
            &layout,
            mouse,
            &mut actions,
        );
        draw_status_line(&panel, &playback);
        draw_toasts(&toasts);

        for action in actions {
            apply_action(action, &mut playback, &panel, &mut toasts);
        }
        toasts.update(dt);

        if is_quit_requested() {
            break;
        }
        next_frame().await;
    }

    playback.teardown();
    info!("session closed");
    Ok(())
}

fn window_conf() -> Conf {
    Conf {
        window_title: "Multitone".into(),
        fullscreen: false,
        sample_count: 1,
        window_width: SCREEN_WIDTH as i32,
        window_height: SCREEN_HEIGHT as i32,
        high_dpi: false,
        ..Default::default()
    }
}

enum UiAction {
    AddTone,
    RemoveTone(ToneId),
    ToggleTone(ToneId),
    SetVolume(ToneId, u8),
    TogglePause,
    StopAll,
}

fn apply_action(
    action: UiAction,
    playback: &mut PlaybackController<CpalBackend>,
    panel: &PanelState,
    toasts: &mut Toasts,
) {
    match action {
        UiAction::AddTone => {
            let frequency = match parse_frequency(panel.frequency.text()) {
                Ok(frequency) => frequency,
                Err(err) => {
                    warn!("rejected frequency entry: {err}");
                    toasts.error("Invalid Frequency", err.to_string());
                    return;
                }
            };
            let volume = clamp_volume(panel.volume.value * 100.0);
            match playback.add_tone(frequency, panel.waveform, volume) {
                Ok(_) => toasts.info(
                    "Tone Added",
                    format!("Playing {} wave at {frequency}Hz", panel.waveform),
                ),
                Err(err) => {
                    error!("adding tone failed: {err}");
                    toasts.error("Audio Error", "Failed to start audio. Please try again.");
                }
            }
        }
        UiAction::RemoveTone(id) => {
            if playback.remove_tone(id) {
                toasts.info("Tone Removed", format!("Tone {id} stopped"));
            }
        }
        UiAction::ToggleTone(id) => {
            playback.toggle(id);
        }
        UiAction::SetVolume(id, volume) => playback.set_volume(id, volume),
        UiAction::TogglePause => {
            if playback.is_paused() {
                playback.unpause_all();
                toasts.info("Resumed", "All tones resumed");
            } else {
                playback.pause_all();
                toasts.info("Paused", "All tones paused");
            }
        }
        UiAction::StopAll => {
            let stopped = playback.stop_all();
            if stopped > 0 {
                toasts.info("Tones Stopped", format!("{stopped} tone(s) stopped"));
            }
        }
    }
}

struct PanelState {
    waveform: Waveform,
    frequency: FrequencyField,
    frequency_focus: bool,
    octave: i32,
    volume: KnobValue,
}

impl PanelState {
    fn new() -> Self {
        Self {
            waveform: Waveform::Sine,
            frequency: FrequencyField::new(DEFAULT_FREQUENCY),
            frequency_focus: false,
            octave: 4,
            volume: KnobValue {
                value: DEFAULT_VOLUME / 100.0,
            },
        }
    }
}

#[derive(Clone, Copy)]
struct KnobValue {
    value: f32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
enum KnobId {
    NewToneVolume,
    ToneVolume(ToneId),
}

#[derive(Default)]
struct KnobDragState {
    active_knob: Option<KnobId>,
    origin_value: f32,
    origin_y: f32,
}

struct PanelLayout {
    waveform_rect: Rect,
    frequency_rect: Rect,
    tone_rect: Rect,
    list_rect: Rect,
    waveform_buttons: [Rect; 4],
    entry_rect: Rect,
    octave_buttons: [Rect; 5],
    note_buttons: [Rect; 12],
    volume_knob: Rect,
    add_button: Rect,
    pause_button: Rect,
    stop_button: Rect,
}

fn compute_panel_layout() -> PanelLayout {
    let margin = 36.0;
    let gap = 18.0;
    let usable_width = SCREEN_WIDTH - margin * 2.0 - gap * 2.0;
    let widths = [0.28, 0.44, 0.28].map(|factor| usable_width * factor);

    let waveform_rect = Rect::new(margin, PANEL_TOP, widths[0], PANEL_HEIGHT);
    let frequency_rect = Rect::new(
        waveform_rect.x + waveform_rect.w + gap,
        PANEL_TOP,
        widths[1],
        PANEL_HEIGHT,
    );
    let tone_rect = Rect::new(
        frequency_rect.x + frequency_rect.w + gap,
        PANEL_TOP,
        widths[2],
        PANEL_HEIGHT,
    );
    let list_top = PANEL_TOP + PANEL_HEIGHT + 40.0;
    let list_rect = Rect::new(
        margin,
        list_top,
        SCREEN_WIDTH - margin * 2.0,
        ROW_HEIGHT * MAX_VISIBLE_ROWS as f32 + 24.0,
    );

    let button_w = (waveform_rect.w - 48.0) / 2.0;
    let button_h = (waveform_rect.h - 56.0) / 2.0;
    let waveform_buttons = std::array::from_fn(|index| {
        let col = (index % 2) as f32;
        let row = (index / 2) as f32;
        Rect::new(
            waveform_rect.x + 16.0 + col * (button_w + 16.0),
            waveform_rect.y + 20.0 + row * (button_h + 16.0),
            button_w,
            button_h,
        )
    });

    let entry_rect = Rect::new(frequency_rect.x + 16.0, frequency_rect.y + 24.0, 180.0, 40.0);
    let octave_buttons = std::array::from_fn(|index| {
        Rect::new(
            frequency_rect.x + 16.0 + index as f32 * 48.0,
            frequency_rect.y + 110.0,
            40.0,
            30.0,
        )
    });
    let note_w = (frequency_rect.w - 32.0 - 5.0 * 6.0) / 6.0;
    let note_buttons = std::array::from_fn(|index| {
        let col = (index % 6) as f32;
        let row = (index / 6) as f32;
        Rect::new(
            frequency_rect.x + 16.0 + col * (note_w + 6.0),
            frequency_rect.y + 170.0 + row * 52.0,
            note_w,
            44.0,
        )
    });

    let knob_size = 90.0;
    let volume_knob = Rect::new(
        tone_rect.x + tone_rect.w * 0.5 - knob_size * 0.5,
        tone_rect.y + 30.0,
        knob_size,
        knob_size,
    );
    let wide = tone_rect.w - 32.0;
    let add_button = Rect::new(tone_rect.x + 16.0, tone_rect.y + 160.0, wide, 36.0);
    let pause_button = Rect::new(tone_rect.x + 16.0, tone_rect.y + 206.0, wide, 32.0);
    let stop_button = Rect::new(tone_rect.x + 16.0, tone_rect.y + 248.0, wide, 32.0);

    PanelLayout {
        waveform_rect,
        frequency_rect,
        tone_rect,
        list_rect,
        waveform_buttons,
        entry_rect,
        octave_buttons,
        note_buttons,
        volume_knob,
        add_button,
        pause_button,
        stop_button,
    }
}

fn mouse_position_vec() -> Vec2 {
    let (x, y) = mouse_position();
    vec2(x, y)
}

fn handle_text_entry(panel: &mut PanelState, actions: &mut Vec<UiAction>) {
    if !panel.frequency_focus {
        while get_char_pressed().is_some() {}
        return;
    }
    while let Some(ch) = get_char_pressed() {
        panel.frequency.push_char(ch);
    }
    if is_key_pressed(KeyCode::Backspace) {
        panel.frequency.backspace();
    }
    if is_key_pressed(KeyCode::Enter) || is_key_pressed(KeyCode::KpEnter) {
        panel.frequency_focus = false;
        actions.push(UiAction::AddTone);
    }
}

fn handle_shortcuts(actions: &mut Vec<UiAction>) {
    if is_key_pressed(KeyCode::Space) {
        actions.push(UiAction::TogglePause);
    }
    if is_key_pressed(KeyCode::Escape) {
        actions.push(UiAction::StopAll);
    }
}

fn draw_header() {
    draw_text_ex(
        "MULTITONE GENERATOR",
        36.0,
        40.0,
        TextParams {
            font_size: 30,
            color: AMBER,
            ..Default::default()
        },
    );
    draw_text_ex(
        "Z-M: notes   -/=: octave   SPACE: pause   ESC: stop all",
        SCREEN_WIDTH - 520.0,
        40.0,
        TextParams {
            font_size: 16,
            color: AMBER_DIM,
            ..Default::default()
        },
    );
}

fn draw_section(rect: &Rect, label: &str) {
    draw_rectangle(
        rect.x,
        rect.y,
        rect.w,
        rect.h,
        Color::new(0.05, 0.03, 0.02, 0.65),
    );
    draw_rectangle_lines(rect.x, rect.y, rect.w, rect.h, 1.0, AMBER);
    draw_text_ex(
        label,
        rect.x + 6.0,
        rect.y - 6.0,
        TextParams {
            font_size: 18,
            color: AMBER,
            ..Default::default()
        },
    );
}

fn draw_waveform_panel(panel: &mut PanelState, layout: &PanelLayout, mouse: Vec2) {
    for (rect, waveform) in layout.waveform_buttons.iter().zip(Waveform::VALUES) {
        let active = panel.waveform == waveform;
        if draw_button(*rect, "", active, mouse) {
            panel.waveform = waveform;
        }
        let preview = Rect::new(rect.x + 12.0, rect.y + 10.0, rect.w - 24.0, rect.h - 40.0);
        draw_waveform_preview(preview, waveform, active);
        draw_centered_text(
            waveform.label(),
            Rect::new(rect.x, rect.y + rect.h - 28.0, rect.w, 24.0),
            16,
        );
    }
}

fn draw_waveform_preview(rect: Rect, waveform: Waveform, active: bool) {
    let color = if active { AMBER } else { AMBER_DIM };
    let points = waveform.preview_points(rect.w, rect.h, 48);
    for pair in points.windows(2) {
        let (x0, y0) = pair[0];
        let (x1, y1) = pair[1];
        draw_line(rect.x + x0, rect.y + y0, rect.x + x1, rect.y + y1, 2.0, color);
    }
}

fn draw_frequency_panel(
    panel: &mut PanelState,
    controller: &mut KeyboardController,
    layout: &PanelLayout,
    mouse: Vec2,
) {
    let entry = layout.entry_rect;
    if is_mouse_button_pressed(MouseButton::Left) {
        panel.frequency_focus = entry.contains(mouse);
    }
    let border = if panel.frequency.is_valid() { AMBER } else { ALERT };
    draw_rectangle(entry.x, entry.y, entry.w, entry.h, Color::new(0.02, 0.02, 0.02, 1.0));
    draw_rectangle_lines(
        entry.x,
        entry.y,
        entry.w,
        entry.h,
        if panel.frequency_focus { 2.0 } else { 1.0 },
        border,
    );
    let caret = if panel.frequency_focus { "_" } else { "" };
    draw_text_ex(
        &format!("{}{caret}", panel.frequency.text()),
        entry.x + 10.0,
        entry.y + entry.h - 12.0,
        TextParams {
            font_size: 26,
            color: AMBER,
            ..Default::default()
        },
    );
    draw_text_block(entry.x + entry.w + 12.0, entry.y + entry.h - 12.0, "Hz");
    draw_text_block(entry.x, entry.y + 74.0, "OCTAVE");

    for (rect, octave) in layout.octave_buttons.iter().zip(OCTAVES) {
        if draw_button(*rect, &octave.to_string(), panel.octave == octave, mouse) {
            panel.octave = octave;
        }
    }
    controller.set_octave(panel.octave);

    for (index, (rect, note)) in layout.note_buttons.iter().zip(NOTES.iter()).enumerate() {
        let frequency = transpose(note, panel.octave);
        let selected = (panel.frequency.value() - frequency).abs() < 0.005;
        if draw_button(*rect, note.name, selected, mouse) {
            panel.frequency.set(frequency);
        }
        if note.sharp {
            draw_rectangle_lines(rect.x + 3.0, rect.y + 3.0, rect.w - 6.0, rect.h - 6.0, 1.0, AMBER_DIM);
        }
        if let Some(binding) = controller.binding_for(index) {
            draw_text_ex(
                binding.label,
                rect.x + 4.0,
                rect.y + rect.h - 4.0,
                TextParams {
                    font_size: 12,
                    color: AMBER_DIM,
                    ..Default::default()
                },
            );
        }
    }
}

fn draw_tone_panel(
    panel: &mut PanelState,
    knob_drag: &mut KnobDragState,
    layout: &PanelLayout,
    mouse: Vec2,
    paused: bool,
    actions: &mut Vec<UiAction>,
) {
    let volume = clamp_volume(panel.volume.value * 100.0);
    draw_knob_widget(
        knob_drag,
        KnobId::NewToneVolume,
        layout.volume_knob,
        &mut panel.volume,
        "VOLUME",
        Some(&format!("{volume}%")),
        mouse,
    );
    if draw_button(layout.add_button, "ADD TONE", false, mouse) {
        actions.push(UiAction::AddTone);
    }
    let pause_label = if paused { "RESUME ALL" } else { "PAUSE ALL" };
    if draw_button(layout.pause_button, pause_label, paused, mouse) {
        actions.push(UiAction::TogglePause);
    }
    if draw_button(layout.stop_button, "STOP ALL", false, mouse) {
        actions.push(UiAction::StopAll);
    }
}

fn draw_tone_list(
    tones: &[ToneSnapshot],
    scroll: &mut ListScroll,
    knob_drag: &mut KnobDragState,
    layout: &PanelLayout,
    mouse: Vec2,
    actions: &mut Vec<UiAction>,
) {
    let rect = layout.list_rect;
    scroll.clamp(tones.len());
    if tones.is_empty() {
        draw_centered_text("NO ACTIVE TONES", rect, 20);
        return;
    }
    let mut over_knob = false;
    for (row, tone) in tones[scroll.window(tones.len())].iter().enumerate() {
        let y = rect.y + 12.0 + row as f32 * ROW_HEIGHT;
        draw_text_block(
            rect.x + 16.0,
            y + 36.0,
            &format!(
                "{:<5} {:>9.2} Hz  {:<9} GAIN {:.3}",
                tone.id.to_string(),
                tone.frequency,
                tone.waveform.label(),
                tone.gain
            ),
        );

        let switch = Rect::new(rect.x + 520.0, y + 18.0, 44.0, 24.0);
        if draw_button(switch, "", false, mouse) {
            actions.push(UiAction::ToggleTone(tone.id));
        }
        draw_toggle_switch(switch, tone.enabled, if tone.enabled { "ON" } else { "MUTE" });

        let knob_rect = Rect::new(rect.x + 600.0, y + 2.0, 56.0, 56.0);
        over_knob |= knob_rect.contains(mouse);
        let mut knob = KnobValue {
            value: f32::from(tone.volume) / 100.0,
        };
        draw_knob_widget(
            knob_drag,
            KnobId::ToneVolume(tone.id),
            knob_rect,
            &mut knob,
            "",
            None,
            mouse,
        );
        let volume = clamp_volume(knob.value * 100.0);
        if volume != tone.volume {
            actions.push(UiAction::SetVolume(tone.id, volume));
        }
        draw_text_block(knob_rect.x + knob_rect.w + 10.0, y + 36.0, &format!("{volume}%"));

        let remove = Rect::new(rect.x + rect.w - 56.0, y + 16.0, 32.0, 28.0);
        if draw_button(remove, "X", false, mouse) {
            actions.push(UiAction::RemoveTone(tone.id));
        }
    }
    if tones.len() <= MAX_VISIBLE_ROWS {
        return;
    }
    let window = scroll.window(tones.len());
    draw_text_block(
        rect.x + rect.w - 250.0,
        rect.y - 8.0,
        &format!("{}-{} OF {}", window.start + 1, window.end, tones.len()),
    );
    let up = Rect::new(rect.x + rect.w - 104.0, rect.y - 28.0, 48.0, 24.0);
    let down = Rect::new(rect.x + rect.w - 52.0, rect.y - 28.0, 48.0, 24.0);
    if draw_button(up, "UP", false, mouse) {
        scroll.scroll(-1, tones.len());
    }
    if draw_button(down, "DOWN", false, mouse) {
        scroll.scroll(1, tones.len());
    }
    let (_x, wheel) = mouse_wheel();
    if rect.contains(mouse) && !over_knob && wheel.abs() > f32::EPSILON {
        scroll.scroll(if wheel > 0.0 { -1 } else { 1 }, tones.len());
    }
}

/// First visible row of the active tone list.
#[derive(Default)]
struct ListScroll {
    offset: usize,
}

impl ListScroll {
    fn clamp(&mut self, len: usize) {
        self.offset = self.offset.min(len.saturating_sub(MAX_VISIBLE_ROWS));
    }

    fn scroll(&mut self, rows: isize, len: usize) {
        self.offset = self.offset.saturating_add_signed(rows);
        self.clamp(len);
    }

    fn window(&self, len: usize) -> std::ops::Range<usize> {
        let start = self.offset.min(len);
        start..(start + MAX_VISIBLE_ROWS).min(len)
    }
}

fn draw_status_line(panel: &PanelState, playback: &PlaybackController<CpalBackend>) {
    let status = playback.status();
    let state = if status.paused {
        "Paused".to_string()
    } else if status.tones == 0 {
        "Stopped".to_string()
    } else {
        format!("Playing {}/{}", status.audible, status.tones)
    };
    draw_text_block(
        36.0,
        SCREEN_HEIGHT - 24.0,
        &format!(
            "CURRENT {}Hz \u{2022} {} \u{2022} {state}",
            panel.frequency.text(),
            panel.waveform
        ),
    );
}

fn draw_toasts(toasts: &Toasts) {
    for (index, toast) in toasts.iter().enumerate() {
        let rect = Rect::new(SCREEN_WIDTH - 376.0, 80.0 + index as f32 * 70.0, 340.0, 60.0);
        let accent = match toast.kind {
            ToastKind::Info => AMBER,
            ToastKind::Error => ALERT,
        };
        let alpha = toast.alpha();
        draw_rectangle(rect.x, rect.y, rect.w, rect.h, Color::new(0.05, 0.03, 0.02, 0.95 * alpha));
        draw_rectangle_lines(
            rect.x,
            rect.y,
            rect.w,
            rect.h,
            1.0,
            Color::new(accent.r, accent.g, accent.b, alpha),
        );
        for (line, (text, size)) in [(&toast.title, 18u16), (&toast.description, 14u16)]
            .into_iter()
            .enumerate()
        {
            draw_text_ex(
                text,
                rect.x + 10.0,
                rect.y + 22.0 + line as f32 * 22.0,
                TextParams {
                    font_size: size,
                    color: Color::new(accent.r, accent.g, accent.b, alpha),
                    ..Default::default()
                },
            );
        }
    }
}

fn draw_button(rect: Rect, label: &str, active: bool, mouse: Vec2) -> bool {
    let hovered = rect.contains(mouse);
    let fill = if active {
        AMBER_DIM
    } else if hovered {
        Color::new(0.12, 0.08, 0.04, 1.0)
    } else {
        Color::new(0.05, 0.03, 0.02, 1.0)
    };
    draw_rectangle(rect.x, rect.y, rect.w, rect.h, fill);
    draw_rectangle_lines(rect.x, rect.y, rect.w, rect.h, 1.0, AMBER);
    if !label.is_empty() {
        draw_centered_text(label, rect, 18);
    }
    hovered && is_mouse_button_pressed(MouseButton::Left)
}

fn draw_toggle_switch(rect: Rect, on: bool, label: &str) {
    let color = if on {
        AMBER
    } else {
        Color::new(0.1, 0.08, 0.05, 1.0)
    };
    draw_rectangle(
        rect.x,
        rect.y,
        rect.w,
        rect.h,
        Color::new(0.02, 0.02, 0.02, 1.0),
    );
    draw_rectangle_lines(rect.x, rect.y, rect.w, rect.h, 1.0, AMBER);
    draw_rectangle(
        rect.x + 2.0,
        rect.y + 2.0,
        rect.w - 4.0,
        rect.h - 4.0,
        color,
    );
    draw_text_ex(
        label,
        rect.x + 4.0,
        rect.y + rect.h - 6.0,
        TextParams {
            font_size: 14,
            color: if on { BACKGROUND } else { AMBER },
            ..Default::default()
        },
    );
}

fn draw_knob_widget(
    knob_drag: &mut KnobDragState,
    knob_id: KnobId,
    rect: Rect,
    knob: &mut KnobValue,
    label: &str,
    display: Option<&str>,
    mouse: Vec2,
) {
    handle_knob_drag(knob_drag, knob_id, rect, knob, mouse);
    let center = vec2(rect.x + rect.w * 0.5, rect.y + rect.h * 0.5);
    let radius = rect.w.min(rect.h) * 0.35;
    draw_circle(
        center.x,
        center.y,
        radius + 6.0,
        Color::new(0.05, 0.03, 0.02, 1.0),
    );
    draw_circle(
        center.x,
        center.y,
        radius,
        Color::new(0.12, 0.12, 0.12, 1.0),
    );
    draw_circle_lines(center.x, center.y, radius + 6.0, 1.0, AMBER_DIM);
    let start_angle = -150.0f32.to_radians();
    let angle_range = 300.0f32.to_radians();
    // Screen y grows downward, so rotate from straight up.
    let theta = start_angle + knob.value.clamp(0.0, 1.0) * angle_range - 90.0f32.to_radians();
    let pointer = vec2(theta.cos(), theta.sin()) * radius * 0.8;
    draw_line(
        center.x,
        center.y,
        center.x + pointer.x,
        center.y + pointer.y,
        3.0,
        AMBER,
    );
    if let Some(text) = display {
        draw_centered_text(text, Rect::new(rect.x, rect.y - 12.0, rect.w, 20.0), 14);
    }
    if !label.is_empty() {
        draw_centered_text(
            label,
            Rect::new(rect.x, rect.y + rect.h + 4.0, rect.w, 18.0),
            16,
        );
    }
}

fn handle_knob_drag(
    knob_drag: &mut KnobDragState,
    knob_id: KnobId,
    rect: Rect,
    knob: &mut KnobValue,
    mouse: Vec2,
) {
    if is_mouse_button_pressed(MouseButton::Left) && rect.contains(mouse) {
        knob_drag.active_knob = Some(knob_id);
        knob_drag.origin_value = knob.value;
        knob_drag.origin_y = mouse.y;
    }
    if knob_drag.active_knob == Some(knob_id) {
        if is_mouse_button_down(MouseButton::Left) {
            let delta = (knob_drag.origin_y - mouse.y) * 0.005;
            knob.value = (knob_drag.origin_value + delta).clamp(0.0, 1.0);
        } else {
            knob_drag.active_knob = None;
        }
    }
    let (_x, wheel) = mouse_wheel();
    if rect.contains(mouse) && wheel.abs() > f32::EPSILON {
        knob.value = (knob.value + wheel.signum() * 0.01).clamp(0.0, 1.0);
    }
}

fn draw_text_block(x: f32, mut y: f32, text: &str) {
    for line in text.lines() {
        draw_text_ex(
            line,
            x,
            y,
            TextParams {
                font_size: 18,
                color: AMBER,
                ..Default::default()
            },
        );
        y += 22.0;
    }
}

fn draw_centered_text(text: &str, rect: Rect, size: u16) {
    let measure = measure_text(text, None, size, 1.0);
    let x = rect.x + rect.w * 0.5 - measure.width * 0.5;
    let y = rect.y + rect.h * 0.5 + measure.height * 0.5;
    draw_text_ex(
        text,
        x,
        y,
        TextParams {
            font_size: size,
            color: AMBER,
            ..Default::default()
        },
    );
}
