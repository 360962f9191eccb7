//! reqwest-backed transport and tracking sink.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};
use url::Url;

use crate::tracking::TrackingSink;
use crate::transport::{
    AdRequest, AdResponse, AdTransport, TransportError, TransportErrorReason, TransportResult,
};

pub const CORRELATION_HEADER: &str = "x-request-correlation";
/// `1` while the backend is still warming up.
pub const WARMUP_HEADER: &str = "x-warmup";
/// `clear` when the backend has nothing to serve.
pub const AD_TYPE_HEADER: &str = "x-adtype";
/// Optional per-response load timeout in milliseconds; overrides the body's hint.
pub const TIMEOUT_HEADER: &str = "x-ad-timeout-ms";

#[derive(Clone, Default)]
pub struct HttpTransport {
    http: Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::with_client(Client::new())
    }

    pub fn with_client(http: Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl AdTransport for HttpTransport {
    async fn send(&self, request: AdRequest) -> TransportResult {
        let res = self
            .http
            .get(&request.endpoint)
            .header(CORRELATION_HEADER, request.correlation.to_string())
            .send()
            .await
            .map_err(classify)?;

        let headers = res.headers();
        if header_is(headers, WARMUP_HEADER, "1") {
            return Err(TransportError::new(
                TransportErrorReason::WarmingUp,
                "backend warming up",
            ));
        }
        if header_is(headers, AD_TYPE_HEADER, "clear") || res.status() == StatusCode::NO_CONTENT {
            return Err(TransportError::new(TransportErrorReason::NoFill, "no fill"));
        }
        let timeout_override = match headers.get(TIMEOUT_HEADER) {
            Some(raw) => {
                let parsed = raw.to_str().ok().and_then(|v| v.trim().parse::<i64>().ok());
                match parsed {
                    Some(millis) => Some(millis),
                    None => {
                        return Err(TransportError::new(
                            TransportErrorReason::BadHeaderData,
                            format!("unparseable {TIMEOUT_HEADER} header"),
                        ))
                    }
                }
            }
            None => None,
        };

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(TransportError::new(
                TransportErrorReason::Other,
                format!("unexpected status: {status} body={body}"),
            ));
        }

        let body = res.bytes().await.map_err(classify)?;
        if body.is_empty() {
            return Err(TransportError::new(TransportErrorReason::NoFill, "empty body"));
        }
        let mut response: AdResponse = serde_json::from_slice(&body).map_err(|err| {
            TransportError::new(TransportErrorReason::BadBody, err.to_string())
        })?;
        if timeout_override.is_some() {
            response.timeout_millis = timeout_override;
        }
        debug!(
            target = "rewarded.http",
            unit_id = %request.unit_id,
            adapter = response.adapter_kind.as_deref().unwrap_or(""),
            "ad response received"
        );
        Ok(response)
    }
}

fn header_is(headers: &reqwest::header::HeaderMap, name: &str, expected: &str) -> bool {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.trim().eq_ignore_ascii_case(expected))
}

fn classify(err: reqwest::Error) -> TransportError {
    let reason = if err.is_connect() {
        TransportErrorReason::NoConnection
    } else {
        TransportErrorReason::Other
    };
    TransportError::new(reason, err.to_string())
}

/// Fires tracking and completion requests without waiting for them.
#[derive(Clone, Default)]
pub struct HttpTracker {
    http: Client,
}

impl HttpTracker {
    pub fn new() -> Self {
        Self::with_client(Client::new())
    }

    pub fn with_client(http: Client) -> Self {
        Self { http }
    }

    fn spawn_get(&self, url: String, purpose: &'static str) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(
                target = "rewarded.http",
                url = %url,
                purpose,
                "no runtime; dropping tracking request"
            );
            return;
        };
        let http = self.http.clone();
        runtime.spawn(async move {
            match http.get(&url).send().await {
                Ok(res) if res.status().is_success() => {
                    debug!(target = "rewarded.http", url = %url, purpose, "tracking request sent");
                }
                Ok(res) => {
                    warn!(
                        target = "rewarded.http",
                        url = %url,
                        purpose,
                        status = %res.status(),
                        "tracking request rejected"
                    );
                }
                Err(err) => {
                    warn!(
                        target = "rewarded.http",
                        url = %url,
                        purpose,
                        error = %err,
                        "tracking request failed"
                    );
                }
            }
        });
    }
}

impl TrackingSink for HttpTracker {
    fn fire_and_forget(&self, url: &str) {
        self.spawn_get(url.to_string(), "beacon");
    }

    fn confirm_completion(&self, url: &str, customer_id: Option<&str>) {
        match completion_target(url, customer_id) {
            Ok(target) => self.spawn_get(target, "completion"),
            Err(err) => warn!(
                target = "rewarded.http",
                url,
                error = %err,
                "invalid completion url"
            ),
        }
    }
}

/// Appends `customer_id` to the completion URL's query when present.
pub fn completion_target(url: &str, customer_id: Option<&str>) -> Result<String, url::ParseError> {
    let mut target = Url::parse(url)?;
    if let Some(customer_id) = customer_id.filter(|id| !id.is_empty()) {
        target.query_pairs_mut().append_pair("customer_id", customer_id);
    }
    Ok(target.into())
}
