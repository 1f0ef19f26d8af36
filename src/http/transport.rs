use async_trait::async_trait;
use reqwest::{Client, Method, redirect::Policy};
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::time::Duration;

use crate::models::{FailureKind, HttpMethod};

#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
    pub timeout: Duration,
    pub follow_redirects: bool,
}

#[derive(Debug, Clone)]
pub enum FetchReply {
    Success {
        status: u16,
        headers: Vec<(String, String)>,
        body: String,
        url: String,
    },
    Failure {
        kind: FailureKind,
        error: String,
    },
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, request: FetchRequest) -> FetchReply;
}

pub struct ReqwestTransport {
    follow: Client,
    manual: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, reqwest::Error> {
        let follow = Client::builder()
            .redirect(Policy::limited(10))
            .danger_accept_invalid_certs(false)
            .build()?;
        let manual = Client::builder()
            .redirect(Policy::none())
            .danger_accept_invalid_certs(false)
            .build()?;

        Ok(Self { follow, manual })
    }

    fn to_reqwest_method(method: HttpMethod) -> Method {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
            HttpMethod::Head => Method::HEAD,
            HttpMethod::Options => Method::OPTIONS,
            HttpMethod::Trace => Method::TRACE,
        }
    }

    fn failure_kind(err: &reqwest::Error) -> FailureKind {
        if err.is_timeout() {
            return FailureKind::Timeout;
        }
        if err.is_connect() {
            let chain = error_chain(err).to_lowercase();
            if chain.contains("refused") || chain.contains("reset") {
                return FailureKind::Refused;
            }
            return FailureKind::Connect;
        }
        FailureKind::Other
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn fetch(&self, request: FetchRequest) -> FetchReply {
        let client = if request.follow_redirects {
            &self.follow
        } else {
            &self.manual
        };

        let mut builder = client
            .request(Self::to_reqwest_method(request.method), &request.url)
            .timeout(request.timeout);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        match builder.send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                let url = response.url().to_string();
                let headers = response
                    .headers()
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
                    .collect();
                let body = response.text().await.unwrap_or_default();

                FetchReply::Success {
                    status,
                    headers,
                    body,
                    url,
                }
            }
            Err(e) => FetchReply::Failure {
                kind: Self::failure_kind(&e),
                error: error_chain(&e),
            },
        }
    }
}

fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
