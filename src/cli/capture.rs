use crate::core::credentials::{Header, RequestMeta};
use crate::daemon::{DBUS_NAME, DBUS_PATH};
use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Read;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Override {
    #[serde(skip_serializing_if = "Option::is_none")]
    request_headers: Option<Vec<Header>>,
}

/// Forwards one intercepted request (JSON on stdin) to the daemon and prints
/// the header override the host should apply, or `{}` for none.
pub async fn run() -> Result<()> {
    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("Failed to read request from stdin")?;

    let request: RequestMeta =
        serde_json::from_str(&input).context("Expected {method, url, requestHeaders}")?;

    let headers: Vec<(String, String)> = request
        .request_headers
        .into_iter()
        .map(|h| (h.name, h.value))
        .collect();

    let connection = zbus::Connection::session()
        .await
        .context("Failed to connect to session D-Bus")?;

    let reply = connection
        .call_method(
            Some(DBUS_NAME),
            DBUS_PATH,
            Some(DBUS_NAME),
            "ObserveRequest",
            &(request.method.as_str(), request.url.as_str(), headers),
        )
        .await
        .context("Failed to call ObserveRequest method - is the daemon running?")?;

    let (forward, replacement): (bool, Vec<(String, String)>) = reply
        .body()
        .deserialize()
        .context("Failed to deserialize response")?;

    println!("{}", serde_json::to_string(&to_override(forward, replacement))?);
    Ok(())
}

fn to_override(forward: bool, headers: Vec<(String, String)>) -> Override {
    Override {
        request_headers: forward.then(|| {
            headers
                .into_iter()
                .map(|(name, value)| Header { name, value })
                .collect()
        }),
    }
}
