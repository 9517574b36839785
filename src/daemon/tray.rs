use crate::core::models::InboundEvent;
use crate::daemon::indicator::{IndicatorSurface, ERROR_TEXT, HIGHLIGHT_COLOR};
use crate::icons::{rgba_to_argb, IconRenderer};
use anyhow::{Context, Result};
use async_trait::async_trait;
use ksni::menu::StandardItem;
use ksni::{Icon, MenuItem, ToolTip, TrayMethods};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};

const TRAY_ID: &str = "prolific-watch";

struct BadgeTray {
    text: String,
    color: String,
    renderer: IconRenderer,
    events: mpsc::UnboundedSender<InboundEvent>,
    shutdown: Arc<Notify>,
}

impl ksni::Tray for BadgeTray {
    fn id(&self) -> String {
        TRAY_ID.to_string()
    }

    fn title(&self) -> String {
        if self.text.is_empty() {
            "Prolific Watch".to_string()
        } else {
            format!("Prolific Watch ({})", self.text)
        }
    }

    fn icon_pixmap(&self) -> Vec<Icon> {
        let size = self.renderer.size() as i32;
        let pixels = self.renderer.render(&self.text, &self.color);
        vec![Icon {
            width: size,
            height: size,
            data: rgba_to_argb(&pixels),
        }]
    }

    fn tool_tip(&self) -> ToolTip {
        let description = match self.text.as_str() {
            "" => "No studies available".to_string(),
            ERROR_TEXT => "Last check failed".to_string(),
            n => format!("{n} studies available"),
        };
        ToolTip {
            title: self.title(),
            description,
            ..Default::default()
        }
    }

    fn activate(&mut self, _x: i32, _y: i32) {
        let _ = self.events.send(InboundEvent::RunNow);
    }

    fn menu(&self) -> Vec<MenuItem<Self>> {
        vec![
            StandardItem {
                label: "Refresh now".into(),
                activate: Box::new(|this: &mut Self| {
                    let _ = this.events.send(InboundEvent::RunNow);
                }),
                ..Default::default()
            }
            .into(),
            MenuItem::Separator,
            StandardItem {
                label: "Quit".into(),
                activate: Box::new(|this: &mut Self| {
                    this.shutdown.notify_one();
                }),
                ..Default::default()
            }
            .into(),
        ]
    }
}

/// StatusNotifier tray icon whose pixmap carries the badge.
pub struct TrayManager {
    handle: ksni::Handle<BadgeTray>,
}

impl TrayManager {
    pub async fn start(
        events: mpsc::UnboundedSender<InboundEvent>,
        shutdown: Arc<Notify>,
    ) -> Result<Self> {
        let tray = BadgeTray {
            text: String::new(),
            color: HIGHLIGHT_COLOR.to_string(),
            renderer: IconRenderer::new(),
            events,
            shutdown,
        };

        let handle = tray
            .spawn()
            .await
            .context("Failed to register StatusNotifier tray icon")?;

        tracing::info!("Tray icon registered");
        Ok(Self { handle })
    }

    pub async fn shutdown(&self) {
        self.handle.shutdown().await;
    }
}

#[async_trait]
impl IndicatorSurface for TrayManager {
    async fn set_text(&self, text: &str) {
        let text = text.to_string();
        self.handle.update(move |tray| tray.text = text).await;
    }

    async fn set_color(&self, color: &str) {
        let color = color.to_string();
        self.handle.update(move |tray| tray.color = color).await;
    }
}
