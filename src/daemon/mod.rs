mod alerts;
mod app;
mod dbus;
mod indicator;
mod poller;
mod router;
mod tray;

use anyhow::Result;

pub const DBUS_NAME: &str = "com.github.prolificwatch.Daemon";
pub const DBUS_PATH: &str = "/com/github/prolificwatch/Daemon";

pub async fn run() -> Result<()> {
    tracing::info!("Starting prolific-watch daemon");
    app::run().await
}
