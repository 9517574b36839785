use crate::core::credentials::{CredentialProvider, CredentialSet};
use crate::core::error::FetchError;
use crate::core::models::{Item, ListingResponse};
use crate::providers::ListingSource;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// Set by the client itself; replaying them would corrupt the request.
// The client decodes no content codings, so the browser's accept-encoding
// must not be replayed either.
const SKIPPED_HEADERS: &[&str] = &[
    "host",
    "content-length",
    "connection",
    "transfer-encoding",
    "accept-encoding",
];

/// Fetches the current study listing, authenticated with whatever session
/// headers the credential provider is willing to forward.
pub struct ProlificSource {
    client: reqwest::Client,
    listing: Url,
    credentials: Arc<dyn CredentialProvider>,
}

impl ProlificSource {
    pub fn new(listing: Url, credentials: Arc<dyn CredentialProvider>) -> Result<Self> {
        Self::with_timeout(listing, credentials, REQUEST_TIMEOUT)
    }

    /// A fetch that outlives `timeout` fails as a transport error, so a
    /// stalled server can never hold up the next reschedule.
    pub fn with_timeout(
        listing: Url,
        credentials: Arc<dyn CredentialProvider>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            listing,
            credentials,
        })
    }
}

#[async_trait]
impl ListingSource for ProlificSource {
    fn name(&self) -> &'static str {
        "Prolific"
    }

    async fn fetch_listing(&self) -> Result<Vec<Item>, FetchError> {
        let credentials = self
            .credentials
            .forward_headers("GET", self.listing.as_str())
            .ok_or(FetchError::NoCredentials)?;

        let response = self
            .client
            .get(self.listing.clone())
            .headers(replay_headers(&credentials))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        parse_listing(&body)
    }
}

pub(crate) fn parse_listing(body: &str) -> Result<Vec<Item>, FetchError> {
    serde_json::from_str::<ListingResponse>(body)
        .map(|r| r.results)
        .map_err(|e| FetchError::MalformedResponse(e.to_string()))
}

fn replay_headers(credentials: &CredentialSet) -> HeaderMap {
    let mut headers = HeaderMap::new();

    for header in credentials {
        if SKIPPED_HEADERS
            .iter()
            .any(|h| header.name.eq_ignore_ascii_case(h))
        {
            continue;
        }

        match (
            HeaderName::from_bytes(header.name.as_bytes()),
            HeaderValue::from_str(&header.value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            }
            _ => {
                tracing::debug!(name = %header.name, "Skipping unreplayable header");
            }
        }
    }

    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::credentials::{CredentialObserver, Header};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    const LISTING: &str = "https://www.prolific.co/api/v1/studies/?current=1";
    const LISTING_BODY: &str = r#"{"results": [{
        "id": "s1", "name": "Survey", "researcher": {"name": "Lab"},
        "reward": 1050, "average_reward_per_hour": 1200,
        "total_available_places": 10, "places_taken": 3
    }]}"#;

    struct FixedCredentials(CredentialSet);

    impl CredentialProvider for FixedCredentials {
        fn forward_headers(&self, _method: &str, _url: &str) -> Option<CredentialSet> {
            Some(self.0.clone())
        }
    }

    fn session_headers() -> CredentialSet {
        vec![
            Header::new("Accept", "application/json"),
            Header::new("Accept-Encoding", "gzip, deflate, br"),
            Header::new("Authorization", "Bearer abc"),
            Header::new("Cookie", "sessionid=xyz"),
        ]
    }

    fn response(status: &str, headers: &str, body: &[u8]) -> Vec<u8> {
        let mut out = format!(
            "HTTP/1.1 {status}\r\n{headers}content-length: {}\r\nconnection: close\r\n\r\n",
            body.len()
        )
        .into_bytes();
        out.extend_from_slice(body);
        out
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        String::from_utf8_lossy(&buf).to_ascii_lowercase()
    }

    /// Answers one request. Requests that advertise gzip get a gzip-coded
    /// body, like a real server would send.
    async fn serve_once(plain: Vec<u8>) -> (Url, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            let reply = if request.contains("accept-encoding: gzip") {
                response(
                    "200 OK",
                    "content-type: application/json\r\ncontent-encoding: gzip\r\n",
                    &[0x1f, 0x8b, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x03],
                )
            } else {
                plain
            };
            socket.write_all(&reply).await.unwrap();
            socket.shutdown().await.ok();
            request
        });
        let url = Url::parse(&format!("http://{addr}/api/v1/studies/?current=1")).unwrap();
        (url, handle)
    }

    fn source(url: Url) -> ProlificSource {
        ProlificSource::new(url, Arc::new(FixedCredentials(session_headers()))).unwrap()
    }

    #[tokio::test]
    async fn test_no_credentials_fails_without_request() {
        let url = Url::parse(LISTING).unwrap();
        let observer = Arc::new(CredentialObserver::new("prolific.co", url.clone()));
        let source = ProlificSource::new(url, observer).unwrap();

        let result = source.fetch_listing().await;
        assert!(matches!(result, Err(FetchError::NoCredentials)));
    }

    #[tokio::test]
    async fn test_fetch_sends_session_headers() {
        let (url, server) = serve_once(response(
            "200 OK",
            "content-type: application/json\r\n",
            LISTING_BODY.as_bytes(),
        ))
        .await;

        let items = source(url).fetch_listing().await.unwrap();
        let request = server.await.unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "s1");
        assert!(request.starts_with("get /api/v1/studies/?current=1 "));
        assert!(request.contains("authorization: bearer abc\r\n"));
        assert!(request.contains("cookie: sessionid=xyz\r\n"));
    }

    #[tokio::test]
    async fn test_browser_accept_encoding_not_replayed() {
        let (url, server) = serve_once(response(
            "200 OK",
            "content-type: application/json\r\n",
            LISTING_BODY.as_bytes(),
        ))
        .await;

        let result = source(url).fetch_listing().await;
        let request = server.await.unwrap();

        assert!(!request.contains("accept-encoding"));
        assert_eq!(result.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_error_status_maps_to_http() {
        for (status, code) in [("401 Unauthorized", 401), ("503 Service Unavailable", 503)] {
            let (url, server) = serve_once(response(status, "", b"nope")).await;

            let result = source(url).fetch_listing().await;
            server.await.unwrap();

            match result {
                Err(FetchError::Http { status }) => assert_eq!(status, code),
                other => panic!("expected Http({code}), got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_stalled_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            read_request(&mut socket).await;
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let url = Url::parse(&format!("http://{addr}/api/v1/studies/?current=1")).unwrap();
        let source = ProlificSource::with_timeout(
            url,
            Arc::new(FixedCredentials(session_headers())),
            Duration::from_millis(200),
        )
        .unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), source.fetch_listing())
            .await
            .expect("fetch should give up on its own");
        server.abort();

        match result {
            Err(FetchError::Transport(e)) => assert!(e.is_timeout()),
            other => panic!("expected a transport timeout, got {other:?}"),
        }
    }

    #[test]
    fn test_replay_headers_skips_transport_headers() {
        let credentials = vec![
            Header::new("Host", "www.prolific.co"),
            Header::new("Authorization", "Bearer abc"),
            Header::new("Content-Length", "0"),
            Header::new("Accept-Encoding", "gzip, deflate, br"),
            Header::new("bad header", "x"),
            Header::new("Cookie", "a=1"),
            Header::new("Cookie", "b=2"),
        ];

        let headers = replay_headers(&credentials);
        assert_eq!(headers.len(), 3);
        assert_eq!(headers.get("authorization").unwrap(), "Bearer abc");
        assert_eq!(headers.get_all("cookie").iter().count(), 2);
        assert!(headers.get("host").is_none());
        assert!(headers.get("accept-encoding").is_none());
    }

    #[test]
    fn test_parse_listing() {
        let items = parse_listing(LISTING_BODY).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].remaining_places(), 7);
    }

    #[test]
    fn test_parse_listing_malformed() {
        assert!(matches!(
            parse_listing("<html>maintenance</html>"),
            Err(FetchError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_listing(r#"{"results": "nope"}"#),
            Err(FetchError::MalformedResponse(_))
        ));
    }
}
