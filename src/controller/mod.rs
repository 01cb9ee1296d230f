//! Reconcilers for the Temporal CRDs
//!
//! Both reconcilers follow the same pass shape: fetch the latest object,
//! snapshot it, run the body under the pass deadline, record the outcome in
//! conditions, persist one patch, and turn the outcome into an [`Action`].

mod cluster;
mod namespace;
mod patch;

use std::sync::Arc;
use std::time::Duration;

use kube::runtime::controller::Action;
use kube::Client;
use tracing::{debug, warn};

pub use cluster::{cluster_error_policy, reconcile_cluster};
pub use namespace::{namespace_error_policy, reconcile_namespace};
pub use patch::{HasStatus, PatchHelper};

use crate::config::ReconcileSettings;
use crate::crd::conditions::{mark_error, mark_success, REASON_RECONCILE_ERROR, REASON_VALIDATION_FAILED};
use crate::index::{DependencyIndex, ObjectKey};
use crate::retry::BackoffTracker;
use crate::store::{KubeObjectStore, ObjectStore};
use crate::temporal::{HttpClientFactory, TemporalClientFactory};
use crate::Error;

/// Result of a reconcile body that did not fail
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Converged; wait for the next change
    Success,
    /// Not converged yet, nothing wrong; check again after the delay
    Requeue(Duration),
    /// Nothing left to do for this object (deleted, or spec rewritten)
    Finished,
}

/// Shared state for every reconcile pass
pub struct Context {
    /// Kubernetes object access
    pub store: Arc<dyn ObjectStore>,
    /// Opens Temporal clients
    pub temporal: Arc<dyn TemporalClientFactory>,
    /// Cluster to namespace dependency index
    pub index: Arc<DependencyIndex>,
    /// Reconciler tunables
    pub settings: ReconcileSettings,
    /// Per-object failure history
    pub backoff: BackoffTracker,
}

impl Context {
    /// Create a builder for constructing a Context
    pub fn builder(client: Client) -> ContextBuilder {
        ContextBuilder::new(client)
    }

    /// Context over test doubles
    #[cfg(test)]
    pub fn for_testing(
        store: Arc<dyn ObjectStore>,
        temporal: Arc<dyn TemporalClientFactory>,
        index: Arc<DependencyIndex>,
        settings: ReconcileSettings,
    ) -> Self {
        Self {
            store,
            temporal,
            index,
            backoff: BackoffTracker::new(settings.backoff.clone()),
            settings,
        }
    }

    /// Record the outcome of a pass and pick the next action
    ///
    /// Successes clear the object's backoff history. Permanent errors wait
    /// for a spec change; others are handed to the controller's error
    /// policy.
    fn action_for(&self, backoff_key: &str, result: Result<Outcome, Error>) -> Result<Action, Error> {
        match result {
            Ok(outcome) => {
                self.backoff.reset(backoff_key);
                Ok(match outcome {
                    Outcome::Success | Outcome::Finished => Action::await_change(),
                    Outcome::Requeue(delay) => Action::requeue(delay),
                })
            }
            Err(e) if e.is_permanent() => {
                warn!(error = %e, "reconcile blocked until the object changes");
                Ok(Action::await_change())
            }
            Err(e) => Err(e),
        }
    }

    /// Requeue delay after a failed pass
    fn backoff_action(&self, backoff_key: &str) -> Action {
        let delay = self.backoff.next_delay(backoff_key);
        debug!(key = %backoff_key, failures = self.backoff.failures(backoff_key), ?delay, "backing off");
        Action::requeue(delay)
    }
}

/// Builder for constructing [`Context`] instances
///
/// ```ignore
/// let ctx = Context::builder(client)
///     .settings(ReconcileSettings::default().concurrency(8))
///     .build()?;
/// ```
pub struct ContextBuilder {
    client: Client,
    store: Option<Arc<dyn ObjectStore>>,
    temporal: Option<Arc<dyn TemporalClientFactory>>,
    index: Option<Arc<DependencyIndex>>,
    settings: ReconcileSettings,
}

impl ContextBuilder {
    fn new(client: Client) -> Self {
        Self {
            client,
            store: None,
            temporal: None,
            index: None,
            settings: ReconcileSettings::default(),
        }
    }

    /// Set the reconciler tunables
    pub fn settings(mut self, settings: ReconcileSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Share an existing dependency index
    pub fn index(mut self, index: Arc<DependencyIndex>) -> Self {
        self.index = Some(index);
        self
    }

    /// Override the object store
    pub fn store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Override the Temporal client factory
    pub fn temporal(mut self, temporal: Arc<dyn TemporalClientFactory>) -> Self {
        self.temporal = Some(temporal);
        self
    }

    /// Build the Context
    pub fn build(self) -> Result<Context, Error> {
        let temporal = match self.temporal {
            Some(t) => t,
            None => Arc::new(HttpClientFactory::new(self.settings.pass_timeout)?),
        };
        Ok(Context {
            store: self
                .store
                .unwrap_or_else(|| Arc::new(KubeObjectStore::new(self.client.clone()))),
            temporal,
            index: self.index.unwrap_or_default(),
            backoff: BackoffTracker::new(self.settings.backoff.clone()),
            settings: self.settings,
        })
    }
}

/// Write the outcome of a pass into the object's conditions
///
/// Requeues and finished passes leave conditions alone.
fn record_conditions<K: HasStatus>(object: &mut K, result: &Result<Outcome, Error>) {
    match result {
        Ok(Outcome::Success) => mark_success(object.conditions_mut()),
        Ok(Outcome::Requeue(_)) | Ok(Outcome::Finished) => {}
        Err(e) => {
            let reason = match e {
                Error::Validation { .. } => REASON_VALIDATION_FAILED,
                _ => REASON_RECONCILE_ERROR,
            };
            mark_error(object.conditions_mut(), reason, e.to_string());
        }
    }
}

/// Run a pass body under the configured deadline
async fn with_deadline<F>(ctx: &Context, key: &ObjectKey, body: F) -> Result<Outcome, Error>
where
    F: std::future::Future<Output = Result<Outcome, Error>>,
{
    let after = ctx.settings.pass_timeout;
    tokio::time::timeout(after, body)
        .await
        .unwrap_or_else(|_| {
            Err(Error::Timeout {
                object: key.to_string(),
                after,
            })
        })
}

/// Fold a persistence failure into the pass result
///
/// A failed body keeps its own error; the write failure is only logged.
fn merge_persist(result: Result<Outcome, Error>, persisted: Result<(), Error>) -> Result<Outcome, Error> {
    match (result, persisted) {
        (result, Ok(())) => result,
        (Ok(_), Err(e)) => Err(e),
        (Err(body), Err(e)) => {
            warn!(error = %e, "failed to persist status after failed pass");
            Err(body)
        }
    }
}
