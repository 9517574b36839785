use crate::core::credentials::{CredentialObserver, Header, RequestMeta};
use crate::core::models::InboundEvent;
use crate::daemon::{DBUS_NAME, DBUS_PATH};
use anyhow::{Context, Result};
use tokio::sync::mpsc;
use zbus::interface;

/// Session-bus entry point for the interception host and for CLI triggers.
pub struct WatchService {
    observer: CredentialObserver,
    events: mpsc::UnboundedSender<InboundEvent>,
}

impl WatchService {
    pub fn new(observer: CredentialObserver, events: mpsc::UnboundedSender<InboundEvent>) -> Self {
        Self { observer, events }
    }

    fn dispatch(&self, event: InboundEvent) -> zbus::fdo::Result<()> {
        self.events
            .send(event)
            .map_err(|_| zbus::fdo::Error::Failed("event router has stopped".to_string()))
    }
}

#[interface(name = "com.github.prolificwatch.Daemon")]
impl WatchService {
    async fn refresh(&self) -> zbus::fdo::Result<()> {
        tracing::info!("D-Bus Refresh called");
        self.dispatch(InboundEvent::RunNow)
    }

    /// Returns `(true, headers)` when the request should be sent with the
    /// returned headers instead of its own.
    fn observe_request(
        &self,
        method: &str,
        url: &str,
        headers: Vec<(String, String)>,
    ) -> (bool, Vec<(String, String)>) {
        let request = RequestMeta {
            method: method.to_string(),
            url: url.to_string(),
            request_headers: headers
                .into_iter()
                .map(|(name, value)| Header::new(name, value))
                .collect(),
        };

        match self.observer.observe(&request).forward {
            Some(forward) => (
                true,
                forward.into_iter().map(|h| (h.name, h.value)).collect(),
            ),
            None => (false, Vec::new()),
        }
    }

    async fn activate_alert(&self, id: &str) -> zbus::fdo::Result<()> {
        self.dispatch(InboundEvent::AlertActivated(id.to_string()))
    }

    #[zbus(property)]
    fn has_credentials(&self) -> bool {
        self.observer.has_credentials()
    }

    async fn message(&self, kind: &str, argument: &str) -> zbus::fdo::Result<()> {
        match InboundEvent::from_message(kind, argument) {
            Some(event) => self.dispatch(event),
            None => {
                tracing::debug!(kind, "Ignoring unrecognized message");
                Ok(())
            }
        }
    }
}

pub async fn start_dbus_server(service: WatchService) -> Result<zbus::Connection> {
    let connection = zbus::connection::Builder::session()
        .context("Failed to connect to session D-Bus")?
        .name(DBUS_NAME)
        .context("Failed to request D-Bus name")?
        .serve_at(DBUS_PATH, service)
        .context("Failed to register D-Bus object")?
        .build()
        .await
        .context("Failed to start D-Bus server - is another daemon running?")?;

    tracing::info!(name = DBUS_NAME, path = DBUS_PATH, "D-Bus service registered");
    Ok(connection)
}
