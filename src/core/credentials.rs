use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

const AUTHORIZATION: &str = "authorization";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Header set captured from one authenticated request, in the order it was sent.
pub type CredentialSet = Vec<Header>;

/// Metadata of an outgoing request as reported by the interception host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMeta {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub request_headers: Vec<Header>,
}

/// Headers the host should send instead of the original ones, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Observation {
    pub forward: Option<CredentialSet>,
}

/// Capability the listing fetch depends on to obtain replayable credentials.
pub trait CredentialProvider: Send + Sync {
    fn forward_headers(&self, method: &str, url: &str) -> Option<CredentialSet>;
}

/// Remembers the most recent authorization headers a real client session sent
/// to the target domain and replays them onto bare listing requests.
///
/// Shared between the D-Bus thread and the poll task, so the single stored set
/// sits behind a mutex that is never held across an await.
#[derive(Clone)]
pub struct CredentialObserver {
    target_domain: String,
    listing: Url,
    current: Arc<Mutex<Option<CredentialSet>>>,
}

impl CredentialObserver {
    pub fn new(target_domain: impl Into<String>, listing: Url) -> Self {
        Self {
            target_domain: target_domain.into().to_ascii_lowercase(),
            listing,
            current: Arc::new(Mutex::new(None)),
        }
    }

    pub fn observe(&self, request: &RequestMeta) -> Observation {
        let Ok(url) = Url::parse(&request.url) else {
            tracing::debug!(url = %request.url, "Ignoring request with unparsable URL");
            return Observation::default();
        };

        if !self.in_target_domain(&url) {
            return Observation::default();
        }

        let authorized = request
            .request_headers
            .iter()
            .any(|h| h.name.eq_ignore_ascii_case(AUTHORIZATION));

        if authorized {
            self.store(request.request_headers.clone());
            tracing::info!(
                headers = request.request_headers.len(),
                path = url.path(),
                "Captured session credentials"
            );
            return Observation::default();
        }

        if !request.method.eq_ignore_ascii_case("GET") || !self.is_listing(&url) {
            return Observation::default();
        }

        Observation {
            forward: self.current(),
        }
    }

    pub fn has_credentials(&self) -> bool {
        self.lock().is_some()
    }

    fn current(&self) -> Option<CredentialSet> {
        self.lock().clone()
    }

    fn store(&self, headers: CredentialSet) {
        *self.lock() = Some(headers);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<CredentialSet>> {
        // A poisoned guard still holds a complete header set.
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn in_target_domain(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_ascii_lowercase();
        host == self.target_domain || host.ends_with(&format!(".{}", self.target_domain))
    }

    fn is_listing(&self, url: &Url) -> bool {
        url.scheme() == self.listing.scheme()
            && url.host_str() == self.listing.host_str()
            && url.path() == self.listing.path()
    }
}

impl CredentialProvider for CredentialObserver {
    fn forward_headers(&self, method: &str, url: &str) -> Option<CredentialSet> {
        self.observe(&RequestMeta {
            method: method.to_string(),
            url: url.to_string(),
            request_headers: Vec::new(),
        })
        .forward
    }
}
