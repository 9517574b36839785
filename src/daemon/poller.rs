use crate::core::store::ConfigStore;
use crate::daemon::alerts::AlertEngine;
use crate::daemon::indicator::StatusIndicator;
use crate::providers::ListingSource;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Fetching,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Succeeded { count: usize },
    Failed,
}

#[derive(Debug)]
pub enum PollerCommand {
    RunNow,
    TimerFired(u64),
}

/// Cheap handle for asking the poller to run a cycle immediately.
#[derive(Clone)]
pub struct PollerHandle {
    tx: mpsc::UnboundedSender<PollerCommand>,
}

impl PollerHandle {
    pub fn run_now(&self) {
        if self.tx.send(PollerCommand::RunNow).is_err() {
            tracing::warn!("Poller is not running, ignoring refresh");
        }
    }
}

/// Owns the fetch-decide-reschedule loop.
///
/// Runs as a single task that is the only writer of its state, so cycles
/// never overlap. At most one reschedule timer is pending at any time: each
/// cycle aborts the previous timer before fetching, and a timer carries the
/// generation it was armed for so a fire queued before its cancellation is
/// dropped.
pub struct Poller {
    source: Arc<dyn ListingSource>,
    config: ConfigStore,
    indicator: StatusIndicator,
    alerts: Arc<AlertEngine>,
    tx: mpsc::UnboundedSender<PollerCommand>,
    rx: mpsc::UnboundedReceiver<PollerCommand>,
    timer: Option<JoinHandle<()>>,
    generation: u64,
    state: PollState,
}

impl Poller {
    pub fn new(
        source: Arc<dyn ListingSource>,
        config: ConfigStore,
        indicator: StatusIndicator,
        alerts: Arc<AlertEngine>,
    ) -> (Self, PollerHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = PollerHandle { tx: tx.clone() };
        let poller = Self {
            source,
            config,
            indicator,
            alerts,
            tx,
            rx,
            timer: None,
            generation: 0,
            state: PollState::Idle,
        };
        (poller, handle)
    }

    #[cfg(test)]
    pub fn state(&self) -> PollState {
        self.state
    }

    #[cfg(test)]
    pub fn has_pending_timer(&self) -> bool {
        self.timer.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Runs the first cycle immediately, then one cycle per command.
    pub async fn run(mut self) {
        tracing::info!(source = self.source.name(), "Poll loop started");
        self.cycle().await;

        while let Some(command) = self.rx.recv().await {
            match command {
                PollerCommand::RunNow => {
                    tracing::debug!("Manual refresh");
                }
                PollerCommand::TimerFired(generation) if generation != self.generation => {
                    tracing::debug!(generation, "Dropping stale timer fire");
                    continue;
                }
                PollerCommand::TimerFired(_) => {}
            }
            self.cycle().await;
        }
    }

    pub async fn cycle(&mut self) -> CycleOutcome {
        self.cancel_timer();

        self.state = PollState::Fetching;
        tracing::debug!(state = ?self.state, source = self.source.name(), "Cycle started");
        let outcome = match self.source.fetch_listing().await {
            Ok(items) => {
                let count = items.len();
                self.indicator.show_count(count).await;
                if let Err(e) = self.config.write_snapshot(&items).await {
                    tracing::warn!(error = %e, "Failed to persist results snapshot");
                }

                // Cycle completion does not wait on alerting.
                let alerts = Arc::clone(&self.alerts);
                tokio::spawn(async move {
                    alerts.announce(&items).await;
                });

                CycleOutcome::Succeeded { count }
            }
            Err(e) => {
                tracing::warn!(kind = e.kind(), error = %e, "Failed to fetch studies");
                self.indicator.show_error().await;
                CycleOutcome::Failed
            }
        };
        self.state = PollState::Idle;

        let delay = self.config.settings().await.next_delay();
        self.arm_timer(delay);
        tracing::debug!(?outcome, delay_secs = delay.as_secs(), "Cycle finished");

        outcome
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.generation = self.generation.wrapping_add(1);
    }

    fn arm_timer(&mut self, delay: Duration) {
        self.cancel_timer();
        let generation = self.generation;
        let tx = self.tx.clone();
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(PollerCommand::TimerFired(generation));
        }));
    }
}
