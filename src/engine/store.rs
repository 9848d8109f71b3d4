//! Ordered pool of single-use expectations.
//!
//! Expectations sharing method, URI and service form a FIFO queue. A request
//! is served by the head of its queue only; when the head rejects the
//! request's headers, cookies or body the request fails instead of trying
//! later entries, so a mis-ordered setup is reported rather than masked.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::domain::{Expectation, ExpectationKey, MockRequest, MockResponse};
use crate::engine::body;
use crate::error::{Error, Result};

#[derive(Default)]
struct Queue {
    pending: VecDeque<(u64, Expectation)>,
    served: usize,
}

#[derive(Default)]
struct StoreState {
    queues: HashMap<ExpectationKey, Queue>,
    next_seq: u64,
}

#[derive(Default)]
pub struct ExpectationStore {
    state: Mutex<StoreState>,
}

impl ExpectationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends an independent single-use entry to the queue for its key.
    pub fn register(&self, expectation: Expectation) {
        let key = expectation.key();
        tracing::debug!(expectation = %expectation.describe(), "registered expectation");

        let mut state = self.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        state
            .queues
            .entry(key)
            .or_default()
            .pending
            .push_back((seq, expectation));
    }

    /// Pops the head expectation for the request's key if its constraints hold.
    pub fn consume(&self, request: &MockRequest) -> Result<MockResponse> {
        let key = ExpectationKey::new(&request.method, &request.uri, &request.service);

        let mut state = self.lock();
        let Some(queue) = state.queues.get_mut(&key) else {
            return Err(Error::NoExpectation {
                method: key.method,
                uri: key.uri,
                service: key.service,
                exhausted: false,
            });
        };

        let Some((_, head)) = queue.pending.front() else {
            return Err(Error::NoExpectation {
                method: key.method,
                uri: key.uri,
                service: key.service,
                exhausted: queue.served > 0,
            });
        };

        if let Err(reason) = check_constraints(head, request) {
            return Err(Error::UnexpectedRequest {
                method: key.method,
                uri: key.uri,
                service: key.service,
                reason,
            });
        }

        let response = head.response();
        queue.pending.pop_front();
        queue.served += 1;

        Ok(response)
    }

    /// Fails listing every unconsumed expectation in registration order.
    pub fn assert_drained(&self) -> Result<()> {
        let state = self.lock();
        let mut pending: Vec<&(u64, Expectation)> = state
            .queues
            .values()
            .flat_map(|queue| queue.pending.iter())
            .collect();

        if pending.is_empty() {
            return Ok(());
        }

        pending.sort_by_key(|(seq, _)| *seq);
        Err(Error::PendingExpectations(
            pending
                .into_iter()
                .map(|(_, expectation)| expectation.describe())
                .collect(),
        ))
    }

    pub fn pending_count(&self) -> usize {
        self.lock()
            .queues
            .values()
            .map(|queue| queue.pending.len())
            .sum()
    }

    pub fn reset(&self) {
        *self.lock() = StoreState::default();
    }
}

fn check_constraints(expectation: &Expectation, request: &MockRequest) -> std::result::Result<(), String> {
    for (name, expected) in &expectation.request_headers {
        let actual = request.header(name);
        if actual != Some(expected.as_str()) {
            return Err(format!(
                "header {name} expected: {expected}, received: {}",
                actual.unwrap_or("<none>")
            ));
        }
    }

    for (name, expected) in &expectation.request_cookies {
        let actual = request.cookies.get(name);
        if actual != Some(expected) {
            return Err(format!(
                "cookie {name} expected: {expected}, received: {}",
                actual.map_or("<none>", String::as_str)
            ));
        }
    }

    if let Some(spec) = &expectation.request_body {
        body::compare(spec, &request.body, request.content_type()).map_err(|err| err.to_string())?;
    }

    Ok(())
}
