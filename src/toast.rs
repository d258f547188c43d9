use std::collections::VecDeque;

const TOAST_SECONDS: f32 = 3.0;
const MAX_TOASTS: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToastKind {
    Info,
    Error,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Toast {
    pub title: String,
    pub description: String,
    pub kind: ToastKind,
    remaining: f32,
}

impl Toast {
    /// Opacity for the last half second of the toast's life.
    pub fn alpha(&self) -> f32 {
        (self.remaining / 0.5).clamp(0.0, 1.0)
    }
}

/// Newest-last queue of timed notifications.
#[derive(Default)]
pub struct Toasts {
    items: VecDeque<Toast>,
}

impl Toasts {
    pub fn info(&mut self, title: impl Into<String>, description: impl Into<String>) {
        self.push(title.into(), description.into(), ToastKind::Info);
    }

    pub fn error(&mut self, title: impl Into<String>, description: impl Into<String>) {
        self.push(title.into(), description.into(), ToastKind::Error);
    }

    fn push(&mut self, title: String, description: String, kind: ToastKind) {
        if self.items.len() == MAX_TOASTS {
            self.items.pop_front();
        }
        self.items.push_back(Toast {
            title,
            description,
            kind,
            remaining: TOAST_SECONDS,
        });
    }

    pub fn update(&mut self, dt: f32) {
        for toast in &mut self.items {
            toast.remaining -= dt;
        }
        self.items.retain(|toast| toast.remaining > 0.0);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Toast> {
        self.items.iter()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.items.len()
    }
}
