use crate::daemon::{DBUS_NAME, DBUS_PATH};
use anyhow::{Context, Result};

/// Asks the running watcher to check for studies now instead of waiting for
/// its next scheduled poll.
pub async fn run() -> Result<()> {
    let connection = zbus::Connection::session()
        .await
        .context("Failed to connect to session D-Bus")?;

    connection
        .call_method(Some(DBUS_NAME), DBUS_PATH, Some(DBUS_NAME), "Refresh", &())
        .await
        .context("Watcher did not answer - start it with `prolific-watch daemon`")?;

    println!("Check triggered");
    Ok(())
}
