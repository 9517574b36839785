use crate::core::models::{format_cents, Item};
use crate::core::notifications::{Alert, AlertSurface};
use crate::core::settings::AlertMode;
use crate::core::sound::{Companion, VOICE_PHRASE};
use crate::core::store::ConfigStore;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Decides which studies are new and announces them.
///
/// `seen` only grows: once an id has been alerted it is never alerted again
/// for the life of the process. Claiming ids happens in a single critical
/// section, so overlapping announce calls cannot both alert the same id.
pub struct AlertEngine {
    seen: Mutex<HashSet<String>>,
    surface: Arc<dyn AlertSurface>,
    companion: Arc<dyn Companion>,
    config: ConfigStore,
    icon: String,
}

impl AlertEngine {
    pub fn new(
        surface: Arc<dyn AlertSurface>,
        companion: Arc<dyn Companion>,
        config: ConfigStore,
        icon: impl Into<String>,
    ) -> Self {
        Self {
            seen: Mutex::new(HashSet::new()),
            surface,
            companion,
            config,
            icon: icon.into(),
        }
    }

    /// Returns the number of alerts rendered for this batch.
    pub async fn announce(&self, items: &[Item]) -> usize {
        let fresh = self.claim_new(items);
        if fresh.is_empty() {
            return 0;
        }

        for item in &fresh {
            let alert = self.render(item);
            if let Err(e) = self.surface.create(&item.id, &alert).await {
                tracing::warn!(id = %item.id, error = %e, "Failed to render alert");
            }
        }

        let mode = self.config.settings().await.alert;
        if let Err(e) = self.play_companion(&mode).await {
            tracing::warn!(%mode, error = %e, "Alert companion failed");
        }

        tracing::info!(
            new = fresh.len(),
            seen = items.len() - fresh.len(),
            "Announced new studies"
        );
        fresh.len()
    }

    #[cfg(test)]
    pub fn has_seen(&self, id: &str) -> bool {
        self.seen().contains(id)
    }

    fn claim_new<'a>(&self, items: &'a [Item]) -> Vec<&'a Item> {
        let mut seen = self.seen();
        items
            .iter()
            .filter(|item| seen.insert(item.id.clone()))
            .collect()
    }

    fn render(&self, item: &Item) -> Alert {
        Alert {
            title: item.name.clone(),
            body: format!(
                "Hosted by {}\nReward {} | Avg. {}\nPlaces {}",
                item.researcher_name(),
                format_cents(item.reward),
                format_cents(item.average_reward_per_hour),
                item.remaining_places()
            ),
            icon: self.icon.clone(),
        }
    }

    async fn play_companion(&self, mode: &AlertMode) -> anyhow::Result<()> {
        match mode {
            AlertMode::Sound(n) => self.companion.play_sound(*n).await,
            AlertMode::Voice => self.companion.speak(VOICE_PHRASE).await,
            AlertMode::None => Ok(()),
            AlertMode::Unrecognized(raw) => {
                tracing::debug!(mode = %raw, "Unrecognized alert mode, staying silent");
                Ok(())
            }
        }
    }

    fn seen(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.seen.lock().unwrap_or_else(|e| e.into_inner())
    }
}
