use crate::core::models::InboundEvent;
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use notify_rust::{Notification, Timeout};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use zbus::proxy::SignalStream;

const APP_NAME: &str = "prolific-watch";
const OPEN_ACTION: &str = "open";
const DEFAULT_ACTION: &str = "default";

const NOTIFICATIONS_BUS: &str = "org.freedesktop.Notifications";
const NOTIFICATIONS_PATH: &str = "/org/freedesktop/Notifications";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub title: String,
    pub body: String,
    pub icon: String,
}

/// Where rendered alerts go. Activations come back as events carrying the id
/// the alert was created with.
#[async_trait]
pub trait AlertSurface: Send + Sync {
    async fn create(&self, id: &str, alert: &Alert) -> Result<()>;
    async fn clear(&self, id: &str) -> Result<()>;
}

/// Live notifications, keyed by the alert id they were created for.
///
/// Entries leave when the server reports the notification closed or when the
/// alert is cleared, so the map only holds what is still on screen.
#[derive(Debug, Default)]
struct ShownAlerts {
    by_alert: HashMap<String, u32>,
}

impl ShownAlerts {
    fn insert(&mut self, alert_id: &str, notification_id: u32) {
        self.by_alert.insert(alert_id.to_string(), notification_id);
    }

    fn alert_for(&self, notification_id: u32) -> Option<&str> {
        self.by_alert
            .iter()
            .find(|(_, id)| **id == notification_id)
            .map(|(alert, _)| alert.as_str())
    }

    fn remove_alert(&mut self, alert_id: &str) -> Option<u32> {
        self.by_alert.remove(alert_id)
    }

    fn remove_notification(&mut self, notification_id: u32) -> Option<String> {
        let alert = self.alert_for(notification_id)?.to_string();
        self.by_alert.remove(&alert);
        Some(alert)
    }

    /// Maps an `ActionInvoked` signal to an activation, ignoring
    /// notifications this process did not create.
    fn resolve_action(&self, notification_id: u32, action: &str) -> Option<InboundEvent> {
        if action != DEFAULT_ACTION && action != OPEN_ACTION {
            return None;
        }
        self.alert_for(notification_id)
            .map(|alert| InboundEvent::AlertActivated(alert.to_string()))
    }
}

/// Freedesktop notifications via notify-rust.
///
/// One session-bus proxy serves every alert: a single listener task turns
/// `ActionInvoked` and `NotificationClosed` signals back into events, so no
/// per-notification waiter outlives its notification.
pub struct DesktopAlerts {
    proxy: zbus::Proxy<'static>,
    shown: Arc<Mutex<ShownAlerts>>,
}

impl DesktopAlerts {
    pub async fn start(events: mpsc::UnboundedSender<InboundEvent>) -> Result<Self> {
        let connection = zbus::Connection::session()
            .await
            .context("Failed to connect to session D-Bus")?;

        let proxy = zbus::Proxy::new(
            &connection,
            NOTIFICATIONS_BUS,
            NOTIFICATIONS_PATH,
            NOTIFICATIONS_BUS,
        )
        .await
        .context("Failed to create notifications proxy")?;

        let actions = proxy
            .receive_signal("ActionInvoked")
            .await
            .context("Failed to subscribe to ActionInvoked")?;
        let closed = proxy
            .receive_signal("NotificationClosed")
            .await
            .context("Failed to subscribe to NotificationClosed")?;

        let shown = Arc::new(Mutex::new(ShownAlerts::default()));
        tokio::spawn(listen(actions, closed, Arc::clone(&shown), events));

        Ok(Self { proxy, shown })
    }

    fn shown(&self) -> std::sync::MutexGuard<'_, ShownAlerts> {
        lock_shown(&self.shown)
    }
}

fn lock_shown(shown: &Mutex<ShownAlerts>) -> std::sync::MutexGuard<'_, ShownAlerts> {
    shown.lock().unwrap_or_else(|e| e.into_inner())
}

async fn listen(
    mut actions: SignalStream<'static>,
    mut closed: SignalStream<'static>,
    shown: Arc<Mutex<ShownAlerts>>,
    events: mpsc::UnboundedSender<InboundEvent>,
) {
    loop {
        tokio::select! {
            Some(message) = actions.next() => {
                let (notification_id, action) = match message.body().deserialize::<(u32, String)>() {
                    Ok(args) => args,
                    Err(e) => {
                        tracing::debug!(error = %e, "Unreadable ActionInvoked signal");
                        continue;
                    }
                };
                let event = lock_shown(&shown).resolve_action(notification_id, &action);
                if let Some(event) = event {
                    if events.send(event).is_err() {
                        break;
                    }
                }
            }
            Some(message) = closed.next() => {
                if let Ok((notification_id, _reason)) = message.body().deserialize::<(u32, u32)>() {
                    if let Some(alert) = lock_shown(&shown).remove_notification(notification_id) {
                        tracing::debug!(id = %alert, notification_id, "Notification closed");
                    }
                }
            }
            else => break,
        }
    }
    tracing::debug!("Notification signal listener stopped");
}

#[async_trait]
impl AlertSurface for DesktopAlerts {
    async fn create(&self, id: &str, alert: &Alert) -> Result<()> {
        let payload = alert.clone();
        let handle = tokio::task::spawn_blocking(move || {
            Notification::new()
                .summary(&payload.title)
                .body(&payload.body)
                .icon(&payload.icon)
                .appname(APP_NAME)
                .action(DEFAULT_ACTION, "Open")
                .action(OPEN_ACTION, "Open study")
                .timeout(Timeout::Never)
                .show()
        })
        .await
        .context("Notification task panicked")?
        .context("Failed to show notification")?;

        let notification_id = handle.id();
        self.shown().insert(id, notification_id);

        tracing::debug!(id, notification_id, title = %alert.title, "Notification shown");
        Ok(())
    }

    async fn clear(&self, id: &str) -> Result<()> {
        let Some(notification_id) = self.shown().remove_alert(id) else {
            return Ok(());
        };

        self.proxy
            .call_method("CloseNotification", &(notification_id,))
            .await
            .context("Failed to close notification")?;

        tracing::debug!(id, notification_id, "Notification cleared");
        Ok(())
    }
}

#[cfg(test)]
#[derive(Default)]
pub(crate) struct RecordingAlerts {
    pub created: Mutex<Vec<(String, Alert)>>,
    pub cleared: Mutex<Vec<String>>,
}

#[cfg(test)]
impl RecordingAlerts {
    pub fn created_ids(&self) -> Vec<String> {
        self.created
            .lock()
            .unwrap()
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }
}

#[cfg(test)]
#[async_trait]
impl AlertSurface for RecordingAlerts {
    async fn create(&self, id: &str, alert: &Alert) -> Result<()> {
        self.created
            .lock()
            .unwrap()
            .push((id.to_string(), alert.clone()));
        Ok(())
    }

    async fn clear(&self, id: &str) -> Result<()> {
        self.cleared.lock().unwrap().push(id.to_string());
        Ok(())
    }
}
