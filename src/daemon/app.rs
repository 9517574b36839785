use crate::core::config::AppConfig;
use crate::core::credentials::CredentialObserver;
use crate::core::models::InboundEvent;
use crate::core::notifications::{AlertSurface, DesktopAlerts};
use crate::core::sound::DesktopCompanion;
use crate::core::store::{ConfigStore, JsonFileStore};
use crate::daemon::alerts::AlertEngine;
use crate::daemon::dbus::{start_dbus_server, WatchService};
use crate::daemon::indicator::{IndicatorSurface, LogIndicator, StatusIndicator};
use crate::daemon::poller::Poller;
use crate::daemon::router::{EventRouter, SystemOpener};
use crate::daemon::tray::TrayManager;
use crate::providers::ProlificSource;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};

pub async fn run() -> Result<()> {
    let config = AppConfig::load()?;
    let listing = config.listing_url()?;

    let store = Arc::new(JsonFileStore::new(config.storage_path()?));
    tracing::info!(path = %store.path().display(), "Using store");
    let config_store = ConfigStore::new(store);
    config_store.initialize().await?;

    let observer = CredentialObserver::new(config.endpoint.target_domain.clone(), listing.clone());

    let (event_tx, event_rx) = mpsc::unbounded_channel::<InboundEvent>();
    let shutdown = Arc::new(Notify::new());

    let tray = match TrayManager::start(event_tx.clone(), Arc::clone(&shutdown)).await {
        Ok(tray) => Some(Arc::new(tray)),
        Err(e) => {
            tracing::warn!(error = %e, "Tray unavailable, badge updates go to the log");
            None
        }
    };
    let surface: Arc<dyn IndicatorSurface> = match &tray {
        Some(tray) => Arc::clone(tray) as Arc<dyn IndicatorSurface>,
        None => Arc::new(LogIndicator),
    };

    let alert_surface: Arc<dyn AlertSurface> = Arc::new(DesktopAlerts::start(event_tx.clone()).await?);
    let engine = Arc::new(AlertEngine::new(
        Arc::clone(&alert_surface),
        Arc::new(DesktopCompanion::new(config.sounds_dir())),
        config_store.clone(),
        config.alerts.icon.clone(),
    ));

    let source = Arc::new(ProlificSource::new(listing, Arc::new(observer.clone()))?);
    let (poller, poller_handle) = Poller::new(
        source,
        config_store,
        StatusIndicator::new(surface),
        engine,
    );

    let _dbus_connection = start_dbus_server(WatchService::new(observer, event_tx)).await?;

    let router = EventRouter::new(
        poller_handle,
        alert_surface,
        Arc::new(SystemOpener),
        config.endpoint.study_url_base.clone(),
    );
    tokio::spawn(router.run(event_rx));
    tokio::spawn(poller.run());

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Interrupted, shutting down");
        }
        _ = shutdown.notified() => {
            tracing::info!("Quit requested");
        }
    }

    if let Some(tray) = tray {
        tray.shutdown().await;
    }
    Ok(())
}
