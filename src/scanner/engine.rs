use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::registry::RunRegistry;
use super::scheduler::{SchedulePolicy, Scheduler, SettledGroups};
use crate::analyzer::{Baseline, DiffThresholds};
use crate::config::{Settings, SettingsStore};
use crate::error::EngineResult;
use crate::generator::CandidateSet;
use crate::http::{EgressClient, Transport};
use crate::models::{Finding, ProbeDescriptor, ResponseRecord, RunStatus, ToolId, ToolRun};
use crate::reporter::{FindingSink, TieBreak};
use crate::signatures::SignatureRegistry;

pub enum Preparation {
    Ready,
    /// Target cannot be reached; the run ends as failed.
    Unreachable(String),
}

#[derive(Debug, Default)]
pub struct Verdict {
    pub findings: Vec<Finding>,
    /// Skip the remaining candidates in this descriptor's group.
    pub settle: bool,
    pub groups: Vec<String>,
}

impl Verdict {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn one(finding: Finding) -> Self {
        Self::many(vec![finding])
    }

    pub fn many(findings: Vec<Finding>) -> Self {
        Self {
            findings,
            ..Self::default()
        }
    }

    pub fn settled(mut self) -> Self {
        self.settle = true;
        self
    }

    pub fn settling(mut self, group: impl Into<String>) -> Self {
        self.groups.push(group.into());
        self
    }

    pub fn merge(mut self, other: Verdict) -> Self {
        self.findings.extend(other.findings);
        self.settle |= other.settle;
        self.groups.extend(other.groups);
        self
    }
}

impl From<Option<Finding>> for Verdict {
    fn from(finding: Option<Finding>) -> Self {
        finding.map(Verdict::one).unwrap_or_default()
    }
}

pub struct RunContext {
    pub target: String,
    pub settings: Arc<Settings>,
    pub registry: &'static SignatureRegistry,
    baseline: Option<Baseline>,
    early: Vec<Finding>,
    pub discovered: Vec<String>,
    pub tallies: HashMap<String, i64>,
    pub stash: HashMap<String, ResponseRecord>,
}

impl RunContext {
    pub fn new(target: impl Into<String>, settings: Arc<Settings>) -> Self {
        Self {
            target: target.into(),
            settings,
            registry: SignatureRegistry::global(),
            baseline: None,
            early: Vec::new(),
            discovered: Vec::new(),
            tallies: HashMap::new(),
            stash: HashMap::new(),
        }
    }

    pub fn thresholds(&self) -> &DiffThresholds {
        &self.settings.thresholds
    }

    /// Installs the run's baseline. A second call is ignored and returns false.
    pub fn install_baseline(&mut self, baseline: Baseline) -> bool {
        if self.baseline.is_some() {
            return false;
        }
        self.baseline = Some(baseline);
        true
    }

    pub fn baseline(&self) -> Option<&Baseline> {
        self.baseline.as_ref()
    }

    pub fn baseline_record(&self, name: &str) -> Option<&ResponseRecord> {
        self.baseline.as_ref().and_then(|b| b.get(name))
    }

    pub fn emit(&mut self, finding: Finding) {
        self.early.push(finding);
    }

    pub fn tally(&mut self, key: &str) -> i64 {
        let count = self.tallies.entry(key.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    fn take_early(&mut self) -> Vec<Finding> {
        std::mem::take(&mut self.early)
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn id(&self) -> ToolId;

    fn target(&self) -> &str;

    fn config(&self) -> Value;

    fn validate(&self) -> EngineResult<()>;

    fn policy(&self, settings: &Settings) -> SchedulePolicy {
        SchedulePolicy::sequential(settings.delay_duration())
    }

    fn tie_break(&self) -> TieBreak {
        TieBreak::Insertion
    }

    async fn prepare(&self, _client: &EgressClient, _ctx: &mut RunContext) -> Preparation {
        Preparation::Ready
    }

    fn candidates(&self, ctx: &RunContext) -> Vec<ProbeDescriptor>;

    fn classify(&self, ctx: &mut RunContext, probe: &ProbeDescriptor, response: &ResponseRecord) -> Verdict;

    /// Post-pass aggregation. Not called when the run was cancelled.
    async fn finish(&self, _client: &EgressClient, _ctx: &mut RunContext) -> Vec<Finding> {
        Vec::new()
    }
}

pub struct Engine {
    transport: Arc<dyn Transport>,
    settings: Arc<SettingsStore>,
    registry: Arc<RunRegistry>,
    show_progress: bool,
}

impl Engine {
    pub fn new(transport: Arc<dyn Transport>, settings: Arc<SettingsStore>, registry: Arc<RunRegistry>) -> Self {
        Self {
            transport,
            settings,
            registry,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn registry(&self) -> &RunRegistry {
        &self.registry
    }

    pub fn egress(&self) -> EgressClient {
        EgressClient::new(Arc::clone(&self.transport), self.settings.snapshot())
    }

    pub async fn run(&self, tool: &dyn Tool, cancel: CancellationToken) -> EngineResult<ToolRun> {
        tool.validate()?;
        let _active = self.registry.begin(tool.id())?;

        let started = Instant::now();
        let settings = self.settings.snapshot();
        let client = EgressClient::new(Arc::clone(&self.transport), Arc::clone(&settings));
        let mut run = ToolRun::start(tool.id(), tool.target(), tool.config());
        let mut ctx = RunContext::new(tool.target(), Arc::clone(&settings));
        let mut sink = FindingSink::new(tool.tie_break());

        info!(tool = %tool.id(), target = tool.target(), "run started");

        if let Preparation::Unreachable(reason) = tool.prepare(&client, &mut ctx).await {
            warn!(tool = %tool.id(), reason = %reason, "target unreachable");
            sink.extend(ctx.take_early());
            run.note = Some("target unreachable".to_string());
            return Ok(self.conclude(run, RunStatus::Failed, &sink, started));
        }
        sink.extend(ctx.take_early());

        let mut set = CandidateSet::new();
        set.extend(tool.candidates(&ctx));
        let candidates = set.into_vec();
        if candidates.is_empty() {
            run.note = Some("no candidates".to_string());
            return Ok(self.conclude(run, RunStatus::Completed, &sink, started));
        }

        let policy = tool.policy(&settings);
        debug!(tool = %tool.id(), candidates = candidates.len(), width = policy.width, "dispatching");

        let pb = self.create_progress_bar(candidates.len());
        let settled = SettledGroups::default();
        let mut stream = Scheduler::new(client.clone()).run(candidates, policy, cancel.clone(), settled.clone());

        while let Some((probe, response)) = stream.next().await {
            run.dispatched += 1;
            if !response.success {
                run.failed += 1;
            }

            let verdict = tool.classify(&mut ctx, &probe, &response);
            if verdict.settle {
                if let Some(group) = probe.group.as_deref() {
                    settled.settle(group);
                }
            }
            for group in &verdict.groups {
                settled.settle(group);
            }
            sink.extend(verdict.findings);
            sink.extend(ctx.take_early());

            pb.set_message(probe.label.clone());
            pb.inc(1);
        }
        pb.finish_and_clear();

        let status = if cancel.is_cancelled() {
            RunStatus::Cancelled
        } else {
            let extra = tool.finish(&client, &mut ctx).await;
            sink.extend(extra);
            sink.extend(ctx.take_early());
            RunStatus::Completed
        };

        if run.dispatched > 0 && run.failed == run.dispatched {
            run.note = Some("target unreachable".to_string());
        }

        Ok(self.conclude(run, status, &sink, started))
    }

    fn conclude(&self, mut run: ToolRun, status: RunStatus, sink: &FindingSink, started: Instant) -> ToolRun {
        run.finalize(status, sink.drain(), started.elapsed().as_millis() as u64);
        info!(
            tool = %run.tool,
            status = %run.status,
            findings = run.findings.len(),
            dispatched = run.dispatched,
            failed = run.failed,
            "run finished"
        );
        self.registry.store(run.clone());
        run
    }

    fn create_progress_bar(&self, total: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }
}
