//! Integration tests for the Temporal operator
//!
//! These tests run against a real API server (kind) and tell the story of
//! how platform operators interact with Temporal resources.
//!
//! # Test Organization
//!
//! - `crd_operations`: Stories about creating, reading, updating, and deleting
//!   TemporalCluster and TemporalNamespace resources through the Kubernetes API
//!
//! - `cluster_lifecycle`: Stories about the cluster reconciler deriving the
//!   Services and Deployments a TemporalCluster owns
//!
//! # Running These Tests
//!
//! ```bash
//! cargo test --test kind -- --ignored
//! ```

mod cluster_lifecycle;
mod crd_operations;
mod helpers;
