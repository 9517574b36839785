use anyhow::{Context, Result};
use async_trait::async_trait;
use rodio::{Decoder, OutputStream, Sink};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

pub const VOICE_PHRASE: &str = "New studies available on Prolific.";

/// Plays the single sound or speech action that accompanies a batch of alerts.
#[async_trait]
pub trait Companion: Send + Sync {
    async fn play_sound(&self, number: u8) -> Result<()>;
    async fn speak(&self, phrase: &str) -> Result<()>;
}

pub struct DesktopCompanion {
    sounds_dir: PathBuf,
}

impl DesktopCompanion {
    pub fn new(sounds_dir: PathBuf) -> Self {
        Self { sounds_dir }
    }

    pub fn sound_path(&self, number: u8) -> PathBuf {
        self.sounds_dir.join(format!("sweet-alert-{number}.wav"))
    }
}

#[async_trait]
impl Companion for DesktopCompanion {
    async fn play_sound(&self, number: u8) -> Result<()> {
        let path = self.sound_path(number);

        // The output stream is not Send; keep it on the blocking thread.
        tokio::task::spawn_blocking(move || -> Result<()> {
            let file = File::open(&path)
                .with_context(|| format!("Failed to open sound {}", path.display()))?;
            let source = Decoder::new(BufReader::new(file))
                .with_context(|| format!("Failed to decode sound {}", path.display()))?;

            let (_stream, handle) =
                OutputStream::try_default().context("Failed to create audio output stream")?;
            let sink = Sink::try_new(&handle).context("Failed to create audio sink")?;
            sink.append(source);
            sink.sleep_until_end();
            Ok(())
        })
        .await
        .context("Sound playback task panicked")??;

        tracing::debug!(number, "Played alert sound");
        Ok(())
    }

    async fn speak(&self, phrase: &str) -> Result<()> {
        let status = tokio::process::Command::new("spd-say")
            .arg("--wait")
            .arg(phrase)
            .status()
            .await
            .context("Failed to launch spd-say")?;

        if !status.success() {
            anyhow::bail!("spd-say exited with {}", status);
        }
        tracing::debug!("Spoke alert phrase");
        Ok(())
    }
}

#[cfg(test)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CompanionCall {
    Sound(u8),
    Speech(String),
}

#[cfg(test)]
#[derive(Default)]
pub(crate) struct RecordingCompanion {
    pub calls: std::sync::Mutex<Vec<CompanionCall>>,
}

#[cfg(test)]
impl RecordingCompanion {
    pub fn calls(&self) -> Vec<CompanionCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl Companion for RecordingCompanion {
    async fn play_sound(&self, number: u8) -> Result<()> {
        self.calls.lock().unwrap().push(CompanionCall::Sound(number));
        Ok(())
    }

    async fn speak(&self, phrase: &str) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(CompanionCall::Speech(phrase.to_string()));
        Ok(())
    }
}
