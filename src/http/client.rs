use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use super::transport::{FetchReply, FetchRequest, Transport};
use crate::config::Settings;
use crate::models::{FailureKind, HttpMethod, ProbeDescriptor, ResponseRecord};

pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

#[derive(Clone)]
pub struct EgressClient {
    transport: Arc<dyn Transport>,
    settings: Arc<Settings>,
    max_body: usize,
}

impl EgressClient {
    pub fn new(transport: Arc<dyn Transport>, settings: Arc<Settings>) -> Self {
        Self {
            transport,
            settings,
            max_body: MAX_BODY_BYTES,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub async fn send(
        &self,
        method: HttpMethod,
        url: &str,
        headers: &BTreeMap<String, String>,
        body: Option<&str>,
        timeout: Option<Duration>,
    ) -> ResponseRecord {
        let start = Instant::now();
        let timeout = timeout.unwrap_or_else(|| self.settings.timeout_duration());

        let mut merged = self.settings.custom_headers.clone();
        merged.retain(|name, _| !headers.keys().any(|h| h.eq_ignore_ascii_case(name)));
        merged.extend(headers.iter().map(|(k, v)| (k.clone(), v.clone())));

        let request = FetchRequest {
            method,
            url: url.to_string(),
            headers: merged,
            body: body.map(str::to_string),
            timeout,
            follow_redirects: self.settings.follow_redirects,
        };

        let reply = tokio::time::timeout(timeout, self.transport.fetch(request)).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match reply {
            Ok(FetchReply::Success {
                status,
                headers,
                body,
                url: final_url,
            }) => ResponseRecord::new(status, headers, body, final_url, elapsed_ms).capped(self.max_body),
            Ok(FetchReply::Failure { kind, error }) => {
                debug!(%method, url, ?kind, error = %error, "probe failed");
                ResponseRecord::failure(kind, error, elapsed_ms)
            }
            Err(_) => {
                debug!(%method, url, timeout_ms = timeout.as_millis() as u64, "probe timed out");
                ResponseRecord::failure(
                    FailureKind::Timeout,
                    format!("timed out after {}ms", timeout.as_millis()),
                    elapsed_ms,
                )
            }
        }
    }

    pub async fn dispatch(&self, probe: &ProbeDescriptor) -> ResponseRecord {
        self.send(
            probe.method,
            &probe.url,
            &probe.headers,
            probe.body.as_deref(),
            probe.timeout(),
        )
        .await
    }

    pub async fn get(&self, url: &str, timeout: Option<Duration>) -> ResponseRecord {
        self.send(HttpMethod::Get, url, &BTreeMap::new(), None, timeout).await
    }
}
