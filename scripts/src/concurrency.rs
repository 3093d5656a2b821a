//! Bounds on simultaneous chain transactions, and coordination between the
//! concurrently running items of a release

use std::{collections::HashMap, sync::Arc};

use tokio::{
    sync::{watch, OwnedSemaphorePermit, Semaphore},
    task::JoinSet,
};
use tracing::error;

use crate::{errors::ReleaseError, types::RunSummary};

/// A counting gate admitting at most a fixed number of in-flight transactions
///
/// A permit is held from submission of a transaction until its confirmation.
#[derive(Clone, Debug)]
pub struct AdmissionGate {
    /// The permits available to transactions
    permits: Arc<Semaphore>,
    /// The total number of permits
    max_in_flight: usize,
}

impl AdmissionGate {
    /// A gate admitting `max_in_flight` transactions at once, and at least one
    pub fn new(max_in_flight: usize) -> Self {
        let max_in_flight = max_in_flight.max(1);
        Self {
            permits: Arc::new(Semaphore::new(max_in_flight)),
            max_in_flight,
        }
    }

    /// The total number of transactions admitted at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    /// The number of transactions that could be admitted right now
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Wait for a free slot, holding it until the returned permit is dropped
    pub async fn admit(&self) -> Result<OwnedSemaphorePermit, ReleaseError> {
        self.permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ReleaseError::Aborted("admission gate closed".to_string()))
    }
}

/// Per-item completion signals, letting an item wait on the outcome of
/// another item of the same run
#[derive(Clone, Debug)]
pub struct Completions {
    /// One channel per item: `None` while running, then whether it succeeded
    signals: Arc<HashMap<String, watch::Sender<Option<bool>>>>,
}

impl Completions {
    /// Signals for the given items, all initially running
    pub fn new(names: impl IntoIterator<Item = String>) -> Self {
        let signals = names
            .into_iter()
            .map(|name| (name, watch::Sender::new(None)))
            .collect();
        Self {
            signals: Arc::new(signals),
        }
    }

    /// Record the outcome of an item
    pub fn complete(&self, name: &str, succeeded: bool) {
        if let Some(signal) = self.signals.get(name) {
            signal.send_replace(Some(succeeded));
        }
    }

    /// Wait for the outcome of an item; `None` if the item is not tracked
    pub async fn wait(&self, name: &str) -> Option<bool> {
        let mut rx = self.signals.get(name)?.subscribe();
        let outcome = rx.wait_for(Option::is_some).await.ok()?;
        *outcome
    }

    /// A guard recording the outcome of `name`, as a failure if dropped unfinished
    pub fn guard(&self, name: &str) -> CompletionGuard {
        CompletionGuard {
            completions: self.clone(),
            name: name.to_string(),
            finished: false,
        }
    }
}

/// Records an item's outcome exactly once
#[derive(Debug)]
pub struct CompletionGuard {
    /// The signals the outcome is recorded in
    completions: Completions,
    /// The item
    name: String,
    /// Whether the outcome was recorded
    finished: bool,
}

impl CompletionGuard {
    /// Record the outcome of the item
    pub fn finish(mut self, succeeded: bool) {
        self.completions.complete(&self.name, succeeded);
        self.finished = true;
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if !self.finished {
            self.completions.complete(&self.name, false);
        }
    }
}

/// Drain a set of indexed tasks into a summary ordered like `names`
///
/// A task that panicked is reported as failed.
pub async fn join_ordered<T: 'static>(
    mut tasks: JoinSet<(usize, Result<T, ReleaseError>)>,
    names: Vec<String>,
) -> RunSummary<T> {
    let mut results: Vec<Option<Result<T, ReleaseError>>> = names.iter().map(|_| None).collect();

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, result)) => results[index] = Some(result),
            Err(e) => error!("release task failed to complete: {e}"),
        }
    }

    let outcomes = names
        .into_iter()
        .zip(results)
        .map(|(name, result)| {
            let result = result.unwrap_or_else(|| {
                Err(ReleaseError::Aborted(format!("task for {name} did not complete")))
            });
            (name, result)
        })
        .collect();

    RunSummary { outcomes }
}
