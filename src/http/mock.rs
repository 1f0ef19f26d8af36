use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::transport::{FetchReply, FetchRequest, Transport};
use crate::models::FailureKind;

type Responder = Box<dyn Fn(&FetchRequest) -> FetchReply + Send + Sync>;

pub struct MockTransport {
    responder: Responder,
    latency: Duration,
    seen: Mutex<Vec<FetchRequest>>,
}

impl MockTransport {
    pub fn new(responder: impl Fn(&FetchRequest) -> FetchReply + Send + Sync + 'static) -> Arc<Self> {
        Self::slow(Duration::ZERO, responder)
    }

    pub fn slow(
        latency: Duration,
        responder: impl Fn(&FetchRequest) -> FetchReply + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            responder: Box::new(responder),
            latency,
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<FetchRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn fetch(&self, request: FetchRequest) -> FetchReply {
        self.seen.lock().unwrap().push(request.clone());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        (self.responder)(&request)
    }
}

pub fn ok(status: u16, body: &str) -> FetchReply {
    ok_with_headers(status, &[], body)
}

pub fn ok_with_headers(status: u16, headers: &[(&str, &str)], body: &str) -> FetchReply {
    FetchReply::Success {
        status,
        headers: headers
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        body: body.to_string(),
        url: String::new(),
    }
}

pub fn refused() -> FetchReply {
    FetchReply::Failure {
        kind: FailureKind::Refused,
        error: "tcp connect error: Connection refused (os error 111)".to_string(),
    }
}
