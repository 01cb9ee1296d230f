//! End-of-pass persistence
//!
//! A [`PatchHelper`] snapshots an object before the reconcile body runs and
//! turns whatever the body changed into a single [`ObjectPatch`].

use kube::{Resource, ResourceExt};

use crate::crd::{
    Condition, TemporalCluster, TemporalClusterStatus, TemporalNamespace, TemporalNamespaceStatus,
};
use crate::store::ObjectPatch;

/// Object with a status subresource
pub trait HasStatus: Resource {
    /// Status type
    type Status: Clone + Default + PartialEq;

    /// Current status, if any
    fn status(&self) -> Option<&Self::Status>;

    /// Status, created empty when missing
    fn status_mut(&mut self) -> &mut Self::Status;

    /// Conditions in the status, created empty when missing
    fn conditions_mut(&mut self) -> &mut Vec<Condition>;
}

impl HasStatus for TemporalCluster {
    type Status = TemporalClusterStatus;

    fn status(&self) -> Option<&Self::Status> {
        self.status.as_ref()
    }

    fn status_mut(&mut self) -> &mut Self::Status {
        self.status.get_or_insert_with(Default::default)
    }

    fn conditions_mut(&mut self) -> &mut Vec<Condition> {
        &mut self.status_mut().conditions
    }
}

impl HasStatus for TemporalNamespace {
    type Status = TemporalNamespaceStatus;

    fn status(&self) -> Option<&Self::Status> {
        self.status.as_ref()
    }

    fn status_mut(&mut self) -> &mut Self::Status {
        self.status.get_or_insert_with(Default::default)
    }

    fn conditions_mut(&mut self) -> &mut Vec<Condition> {
        &mut self.status_mut().conditions
    }
}

/// Pre-pass snapshot of the fields a pass may change
#[derive(Clone, Debug)]
pub struct PatchHelper<S> {
    resource_version: Option<String>,
    finalizers: Vec<String>,
    status: Option<S>,
}

impl<S: Clone + PartialEq> PatchHelper<S> {
    /// Snapshot `object`
    pub fn snapshot<K: HasStatus<Status = S>>(object: &K) -> Self {
        Self {
            resource_version: object.resource_version(),
            finalizers: object.finalizers().to_vec(),
            status: object.status().cloned(),
        }
    }

    /// Patch taking the snapshot to `object`'s current state
    pub fn diff<K: HasStatus<Status = S>>(&self, object: &K) -> ObjectPatch<S> {
        let finalizers = (object.finalizers() != self.finalizers.as_slice())
            .then(|| object.finalizers().to_vec());
        let status = object
            .status()
            .filter(|current| self.status.as_ref() != Some(*current))
            .cloned();
        ObjectPatch {
            resource_version: self.resource_version.clone(),
            finalizers,
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{conditions, ClusterReference, TemporalNamespaceSpec};

    fn sample() -> TemporalNamespace {
        let mut obj = TemporalNamespace::new(
            "payments",
            TemporalNamespaceSpec {
                cluster_ref: ClusterReference {
                    name: "prod".to_string(),
                    namespace: None,
                },
                ..Default::default()
            },
        );
        obj.metadata.namespace = Some("apps".to_string());
        obj.metadata.resource_version = Some("3".to_string());
        obj
    }

    #[test]
    fn test_untouched_object_yields_empty_patch() {
        let obj = sample();
        let helper = PatchHelper::snapshot(&obj);
        let patch = helper.diff(&obj);
        assert!(patch.is_empty());
        assert_eq!(patch.resource_version.as_deref(), Some("3"));
    }

    /// Story: Finalizer and status changes made anywhere in the pass are
    /// collected into one patch.
    #[test]
    fn story_diff_collects_finalizer_and_status_changes() {
        let mut obj = sample();
        let helper = PatchHelper::snapshot(&obj);

        obj.add_finalizer();
        conditions::mark_success(obj.conditions_mut());

        let patch = helper.diff(&obj);
        assert_eq!(
            patch.finalizers,
            Some(vec![crate::crd::DELETION_FINALIZER.to_string()])
        );
        let status = patch.status.unwrap();
        assert!(conditions::is_condition_true(
            &status.conditions,
            conditions::CONDITION_RECONCILE_SUCCESS
        ));
    }

    #[test]
    fn test_only_status_change_leaves_finalizers_alone() {
        let mut obj = sample();
        obj.add_finalizer();
        let helper = PatchHelper::snapshot(&obj);

        conditions::mark_error(obj.conditions_mut(), "ReconcileError", "boom");
        let patch = helper.diff(&obj);
        assert!(patch.finalizers.is_none());
        assert!(patch.status.is_some());
    }
}
