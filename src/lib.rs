//! Temporal operator - CRD-driven Kubernetes operator for Temporal
//!
//! Two custom resources are kept converged:
//!
//! - `TemporalCluster` describes the deployment topology of a Temporal
//!   server. The operator derives the Services and Deployments it owns.
//! - `TemporalNamespace` is a namespace inside a running cluster. The
//!   operator registers it through the cluster's frontend and keeps its
//!   custom search attributes in sync.
//!
//! # Modules
//!
//! - [`crd`] - Custom Resource Definitions and the condition ledger
//! - [`defaults`] - Spec defaulting for TemporalCluster
//! - [`resource`] - Builders for the child objects a cluster owns
//! - [`temporal`] - Temporal server client and search attribute drift
//! - [`index`] - Cluster to namespace dependency index
//! - [`store`] - Kubernetes object access behind a trait
//! - [`controller`] - Reconcilers
//! - [`config`] - Reconciler tunables
//! - [`retry`] - Backoff policies
//! - [`error`] - Error types for the operator

#![deny(missing_docs)]

pub mod config;
pub mod controller;
pub mod crd;
pub mod defaults;
pub mod error;
pub mod index;
pub mod resource;
pub mod retry;
pub mod store;
pub mod temporal;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Field manager used for server-side apply
pub const FIELD_MANAGER: &str = "temporal-operator";
