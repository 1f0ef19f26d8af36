use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::join_all;
use futures::stream::{self, BoxStream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::http::EgressClient;
use crate::models::{ProbeDescriptor, ResponseRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulePolicy {
    /// Pause between rounds. Never applied before the first one.
    pub delay: Duration,
    /// Probes dispatched together per round; 1 means strictly sequential.
    pub width: usize,
}

impl SchedulePolicy {
    pub fn sequential(delay: Duration) -> Self {
        Self { delay, width: 1 }
    }

    pub fn batched(width: usize, delay: Duration) -> Self {
        Self {
            delay,
            width: width.max(1),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SettledGroups(Arc<Mutex<HashSet<String>>>);

impl SettledGroups {
    pub fn settle(&self, group: &str) {
        match self.0.lock() {
            Ok(mut groups) => groups.insert(group.to_string()),
            Err(poisoned) => poisoned.into_inner().insert(group.to_string()),
        };
    }

    pub fn is_settled(&self, group: &str) -> bool {
        match self.0.lock() {
            Ok(groups) => groups.contains(group),
            Err(poisoned) => poisoned.into_inner().contains(group),
        }
    }
}

struct Pending {
    queue: VecDeque<ProbeDescriptor>,
    client: EgressClient,
    policy: SchedulePolicy,
    cancel: CancellationToken,
    settled: SettledGroups,
    started: bool,
}

impl Pending {
    fn next_batch(&mut self) -> Vec<ProbeDescriptor> {
        let mut batch = Vec::with_capacity(self.policy.width);
        while batch.len() < self.policy.width {
            let Some(probe) = self.queue.pop_front() else {
                break;
            };
            if probe.group.as_deref().is_some_and(|g| self.settled.is_settled(g)) {
                continue;
            }
            batch.push(probe);
        }
        batch
    }
}

pub struct Scheduler {
    client: EgressClient,
}

impl Scheduler {
    pub fn new(client: EgressClient) -> Self {
        Self { client }
    }

    /// Nothing is sent until the stream is polled. Cancellation is checked
    /// before every round; requests already sent are left to finish.
    pub fn run(
        &self,
        candidates: Vec<ProbeDescriptor>,
        policy: SchedulePolicy,
        cancel: CancellationToken,
        settled: SettledGroups,
    ) -> BoxStream<'static, (ProbeDescriptor, ResponseRecord)> {
        let state = Pending {
            queue: candidates.into(),
            client: self.client.clone(),
            policy,
            cancel,
            settled,
            started: false,
        };

        stream::unfold(state, |mut state| async move {
            if state.cancel.is_cancelled() {
                return None;
            }

            let batch = state.next_batch();
            if batch.is_empty() {
                return None;
            }

            if state.started && !state.policy.delay.is_zero() {
                tokio::select! {
                    _ = state.cancel.cancelled() => return None,
                    _ = tokio::time::sleep(state.policy.delay) => {}
                }
            }
            state.started = true;

            let responses = join_all(batch.iter().map(|probe| state.client.dispatch(probe))).await;
            let round: Vec<_> = batch.into_iter().zip(responses).collect();
            Some((round, state))
        })
        .flat_map(stream::iter)
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::http::mock::{MockTransport, ok, refused};
    use crate::models::Purpose;

    fn probes(n: usize) -> Vec<ProbeDescriptor> {
        (0..n)
            .map(|i| ProbeDescriptor::get(format!("http://t/{}", i), Purpose::PathDiscovery))
            .collect()
    }

    fn scheduler(transport: Arc<MockTransport>) -> Scheduler {
        Scheduler::new(EgressClient::new(transport, Arc::new(Settings::default())))
    }

    #[tokio::test]
    async fn test_sequential_order_and_failures_continue() {
        let transport = MockTransport::new(|req| if req.url.ends_with("/1") { refused() } else { ok(200, "x") });
        let results: Vec<_> = scheduler(transport.clone())
            .run(probes(3), SchedulePolicy::sequential(Duration::ZERO), CancellationToken::new(), SettledGroups::default())
            .collect()
            .await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].0.url, "http://t/0");
        assert!(!results[1].1.success);
        assert!(results[2].1.success);
        assert_eq!(transport.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_lazy_until_polled() {
        let transport = MockTransport::new(|_| ok(200, ""));
        let mut stream = scheduler(transport.clone()).run(
            probes(4),
            SchedulePolicy::sequential(Duration::ZERO),
            CancellationToken::new(),
            SettledGroups::default(),
        );
        assert!(transport.requests().is_empty());
        stream.next().await;
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_stops_new_dispatches() {
        let transport = MockTransport::new(|_| ok(200, ""));
        let cancel = CancellationToken::new();
        let mut stream = scheduler(transport.clone()).run(
            probes(10),
            SchedulePolicy::sequential(Duration::ZERO),
            cancel.clone(),
            SettledGroups::default(),
        );

        let mut seen = 0;
        while stream.next().await.is_some() {
            seen += 1;
            if seen == 3 {
                cancel.cancel();
            }
        }
        assert_eq!(seen, 3);
        assert_eq!(transport.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_settled_groups_are_skipped() {
        let transport = MockTransport::new(|_| ok(200, ""));
        let settled = SettledGroups::default();
        let candidates: Vec<_> = probes(4)
            .into_iter()
            .enumerate()
            .map(|(i, p)| p.in_group(if i < 2 { "a" } else { "b" }))
            .collect();
        let mut stream = scheduler(transport.clone()).run(
            candidates,
            SchedulePolicy::sequential(Duration::ZERO),
            CancellationToken::new(),
            settled.clone(),
        );

        let (first, _) = stream.next().await.unwrap();
        settled.settle(first.group.as_deref().unwrap());
        let rest: Vec<_> = stream.collect().await;

        assert_eq!(rest.len(), 2);
        assert!(rest.iter().all(|(p, _)| p.group.as_deref() == Some("b")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_batches_dispatch_together() {
        let transport = MockTransport::slow(Duration::from_millis(50), |_| ok(200, ""));
        let start = tokio::time::Instant::now();
        let results: Vec<_> = scheduler(transport.clone())
            .run(probes(7), SchedulePolicy::batched(3, Duration::ZERO), CancellationToken::new(), SettledGroups::default())
            .collect()
            .await;

        assert_eq!(results.len(), 7);
        assert_eq!(results[6].0.url, "http://t/6");
        assert_eq!(transport.requests().len(), 7);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(150) && elapsed < Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_between_rounds_only() {
        let transport = MockTransport::new(|_| ok(200, ""));
        let start = tokio::time::Instant::now();
        let results: Vec<_> = scheduler(transport)
            .run(probes(3), SchedulePolicy::sequential(Duration::from_millis(100)), CancellationToken::new(), SettledGroups::default())
            .collect()
            .await;

        assert_eq!(results.len(), 3);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(200) && elapsed < Duration::from_millis(300));
    }
}
