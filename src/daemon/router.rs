use crate::core::models::InboundEvent;
use crate::core::notifications::AlertSurface;
use crate::daemon::poller::PollerHandle;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc;

pub trait UrlOpener: Send + Sync {
    fn open(&self, url: &str) -> Result<()>;
}

pub struct SystemOpener;

impl UrlOpener for SystemOpener {
    fn open(&self, url: &str) -> Result<()> {
        open::that(url)?;
        Ok(())
    }
}

/// Dispatches external triggers: refresh requests go to the poller, alert
/// activations open the study page and dismiss the alert.
pub struct EventRouter {
    poller: PollerHandle,
    alerts: Arc<dyn AlertSurface>,
    opener: Arc<dyn UrlOpener>,
    study_url_base: String,
}

impl EventRouter {
    pub fn new(
        poller: PollerHandle,
        alerts: Arc<dyn AlertSurface>,
        opener: Arc<dyn UrlOpener>,
        study_url_base: impl Into<String>,
    ) -> Self {
        Self {
            poller,
            alerts,
            opener,
            study_url_base: study_url_base.into(),
        }
    }

    pub async fn run(self, mut events: mpsc::UnboundedReceiver<InboundEvent>) {
        while let Some(event) = events.recv().await {
            self.route(event).await;
        }
    }

    pub async fn route(&self, event: InboundEvent) {
        match event {
            InboundEvent::RunNow => {
                tracing::info!("Refresh requested");
                self.poller.run_now();
            }
            InboundEvent::AlertActivated(id) => {
                let url = self.study_url(&id);
                tracing::info!(id = %id, url = %url, "Opening study");
                if let Err(e) = self.opener.open(&url) {
                    tracing::error!(error = %e, "Failed to open browser");
                }
                if let Err(e) = self.alerts.clear(&id).await {
                    tracing::warn!(id = %id, error = %e, "Failed to clear alert");
                }
            }
        }
    }

    fn study_url(&self, id: &str) -> String {
        format!("{}{}", self.study_url_base, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::FetchError;
    use crate::core::models::Item;
    use crate::core::notifications::RecordingAlerts;
    use crate::core::sound::RecordingCompanion;
    use crate::core::store::{ConfigStore, MemoryStore};
    use crate::daemon::alerts::AlertEngine;
    use crate::daemon::indicator::{RecordingIndicator, StatusIndicator};
    use crate::daemon::poller::Poller;
    use crate::providers::ListingSource;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingOpener {
        opened: Mutex<Vec<String>>,
    }

    impl UrlOpener for RecordingOpener {
        fn open(&self, url: &str) -> Result<()> {
            self.opened.lock().unwrap().push(url.to_string());
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingSource {
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl ListingSource for CountingSource {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn fetch_listing(&self) -> Result<Vec<Item>, FetchError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    type Fixture = (
        EventRouter,
        Arc<RecordingAlerts>,
        Arc<RecordingOpener>,
        Arc<CountingSource>,
        Poller,
    );

    fn router() -> Fixture {
        let config = ConfigStore::new(Arc::new(MemoryStore::default()));
        let alerts = Arc::new(RecordingAlerts::default());
        let opener = Arc::new(RecordingOpener::default());
        let source = Arc::new(CountingSource::default());
        let engine = Arc::new(AlertEngine::new(
            alerts.clone(),
            Arc::new(RecordingCompanion::default()),
            config.clone(),
            "icon",
        ));
        let (poller, handle) = Poller::new(
            source.clone(),
            config,
            StatusIndicator::new(Arc::new(RecordingIndicator::default())),
            engine,
        );
        let router = EventRouter::new(
            handle,
            alerts.clone(),
            opener.clone(),
            "https://app.prolific.co/studies/",
        );
        (router, alerts, opener, source, poller)
    }

    #[tokio::test]
    async fn test_activation_opens_study_and_clears_alert() {
        let (router, alerts, opener, _source, _poller) = router();

        router
            .route(InboundEvent::AlertActivated("64a1f".to_string()))
            .await;

        assert_eq!(
            *opener.opened.lock().unwrap(),
            vec!["https://app.prolific.co/studies/64a1f"]
        );
        assert_eq!(*alerts.cleared.lock().unwrap(), vec!["64a1f"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_now_triggers_cycle() {
        let (router, _alerts, opener, source, poller) = router();
        tokio::spawn(poller.run());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);

        router.route(InboundEvent::RunNow).await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
        assert!(opener.opened.lock().unwrap().is_empty());
    }
}
