//! Concurrent duplicate calls for idempotency probes.
//!
//! Workers are released together and each call is bounded by the plan's
//! deadline. A failing or slow call never cancels its siblings: the probe
//! always waits for every worker so the full set of outcomes is reported.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Barrier, mpsc};

use crate::domain::ConcurrencyPlan;
use crate::error::{Error, Result};
use crate::http::client::Transport;
use crate::http::request::OutboundRequest;
use crate::http::response::HttpResponse;

#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    /// Worker that issued the call.
    pub worker: usize,
    pub result: Result<HttpResponse>,
}

/// Outcomes in completion order.
#[derive(Debug, Clone, Default)]
pub struct ProbeReport {
    pub outcomes: Vec<ProbeOutcome>,
    pub elapsed_ms: u128,
}

impl ProbeReport {
    pub fn responses(&self) -> Vec<HttpResponse> {
        self.outcomes
            .iter()
            .filter_map(|outcome| outcome.result.as_ref().ok().cloned())
            .collect()
    }

    pub fn errors(&self) -> Vec<Error> {
        self.outcomes
            .iter()
            .filter_map(|outcome| outcome.result.as_ref().err().cloned())
            .collect()
    }

    /// Multiset of `(status, body)` pairs among successful calls.
    pub fn distinct_outcomes(&self) -> BTreeMap<(u16, String), usize> {
        let mut counts = BTreeMap::new();
        for response in self.responses() {
            *counts
                .entry((response.status, response.body_text()))
                .or_insert(0) += 1;
        }
        counts
    }
}

pub async fn probe_idempotent(
    transport: Arc<dyn Transport>,
    template: OutboundRequest,
    plan: ConcurrencyPlan,
) -> ProbeReport {
    let worker_count = plan.level.max(1);
    let started = Instant::now();
    let barrier = Arc::new(Barrier::new(worker_count));
    let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel();

    tracing::info!(
        method = %template.method,
        url = %template.url,
        concurrency = worker_count,
        "starting idempotency probe"
    );

    let mut handles = Vec::with_capacity(worker_count);
    for worker in 0..worker_count {
        let transport = transport.clone();
        let request = template.clone();
        let barrier = barrier.clone();
        let outcome_tx = outcome_tx.clone();
        let timeout = plan.timeout;

        let handle = tokio::spawn(async move {
            barrier.wait().await;
            let url = request.url.clone();
            let result = match tokio::time::timeout(timeout, transport.send(request)).await {
                Ok(result) => result,
                Err(_) => Err(Error::ProbeTimeout {
                    uri: url,
                    timeout_ms: timeout.as_millis() as u64,
                }),
            };
            let _ = outcome_tx.send(ProbeOutcome { worker, result });
        });
        handles.push((worker, handle));
    }
    drop(outcome_tx);

    let mut crashed = Vec::new();
    for (worker, handle) in handles {
        if let Err(err) = handle.await {
            crashed.push(ProbeOutcome {
                worker,
                result: Err(Error::Transport(format!("Probe worker crashed: {err}"))),
            });
        }
    }

    let mut outcomes = Vec::with_capacity(worker_count);
    while let Some(outcome) = outcome_rx.recv().await {
        outcomes.push(outcome);
    }
    outcomes.extend(crashed);

    let report = ProbeReport {
        outcomes,
        elapsed_ms: started.elapsed().as_millis(),
    };
    tracing::info!(
        calls = report.outcomes.len(),
        errors = report.errors().len(),
        elapsed_ms = report.elapsed_ms as u64,
        "finished idempotency probe"
    );
    report
}
