//! Runtime settings for the reconcilers
//!
//! Values come from CLI flags (with environment fallbacks) in `main.rs`;
//! [`ReconcileSettings::default`] matches the flag defaults so tests and
//! embedders get the same behaviour.

use std::time::Duration;

use crate::retry::RetryConfig;

/// Default number of objects reconciled in parallel per controller
pub const DEFAULT_CONCURRENCY: u16 = 4;

/// Default deadline for a single reconcile pass
pub const DEFAULT_PASS_TIMEOUT: Duration = Duration::from_secs(60);

/// Default poll interval while a namespace waits for its cluster to become ready
pub const DEFAULT_CLUSTER_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Default upper bound for error backoff
pub const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(300);

/// Tunables shared by the cluster and namespace reconcilers
#[derive(Clone, Debug)]
pub struct ReconcileSettings {
    /// Maximum concurrent reconciles per controller (0 = unbounded)
    pub concurrency: u16,
    /// Deadline applied to every reconcile pass
    pub pass_timeout: Duration,
    /// Fixed requeue delay while a referenced cluster is not ready
    pub cluster_poll_interval: Duration,
    /// Backoff policy for failed passes
    pub backoff: RetryConfig,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            pass_timeout: DEFAULT_PASS_TIMEOUT,
            cluster_poll_interval: DEFAULT_CLUSTER_POLL_INTERVAL,
            backoff: RetryConfig {
                max_delay: DEFAULT_BACKOFF_MAX,
                ..RetryConfig::default()
            },
        }
    }
}

impl ReconcileSettings {
    /// Set the per-controller concurrency
    pub fn concurrency(mut self, concurrency: u16) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set the reconcile pass deadline
    pub fn pass_timeout(mut self, timeout: Duration) -> Self {
        self.pass_timeout = timeout;
        self
    }

    /// Set the cluster readiness poll interval
    pub fn cluster_poll_interval(mut self, interval: Duration) -> Self {
        self.cluster_poll_interval = interval;
        self
    }

    /// Set the maximum error backoff delay
    pub fn backoff_max(mut self, max: Duration) -> Self {
        self.backoff.max_delay = max;
        self
    }
}
