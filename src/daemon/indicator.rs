use async_trait::async_trait;
use std::sync::Arc;

pub const HIGHLIGHT_COLOR: &str = "red";
pub const ERROR_TEXT: &str = "ERR";

#[async_trait]
pub trait IndicatorSurface: Send + Sync {
    async fn set_text(&self, text: &str);
    async fn set_color(&self, color: &str);
}

/// Projects the latest cycle outcome onto a badge.
#[derive(Clone)]
pub struct StatusIndicator {
    surface: Arc<dyn IndicatorSurface>,
}

impl StatusIndicator {
    pub fn new(surface: Arc<dyn IndicatorSurface>) -> Self {
        Self { surface }
    }

    pub async fn show_count(&self, count: usize) {
        let text = if count > 0 {
            count.to_string()
        } else {
            String::new()
        };
        self.surface.set_text(&text).await;
        self.surface.set_color(HIGHLIGHT_COLOR).await;
    }

    pub async fn show_error(&self) {
        self.surface.set_text(ERROR_TEXT).await;
        self.surface.set_color(HIGHLIGHT_COLOR).await;
    }
}

/// Used when no StatusNotifier host is reachable.
pub struct LogIndicator;

#[async_trait]
impl IndicatorSurface for LogIndicator {
    async fn set_text(&self, text: &str) {
        tracing::info!(badge = text, "Indicator updated");
    }

    async fn set_color(&self, _color: &str) {}
}

#[cfg(test)]
#[derive(Default)]
pub(crate) struct RecordingIndicator {
    pub text: std::sync::Mutex<Option<String>>,
    pub color: std::sync::Mutex<Option<String>>,
}

#[cfg(test)]
impl RecordingIndicator {
    pub fn text(&self) -> Option<String> {
        self.text.lock().unwrap().clone()
    }

    pub fn color(&self) -> Option<String> {
        self.color.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl IndicatorSurface for RecordingIndicator {
    async fn set_text(&self, text: &str) {
        *self.text.lock().unwrap() = Some(text.to_string());
    }

    async fn set_color(&self, color: &str) {
        *self.color.lock().unwrap() = Some(color.to_string());
    }
}
