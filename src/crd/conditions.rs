//! Condition ledger for TemporalCluster and TemporalNamespace status
//!
//! Conditions are keyed by type. Writing a condition whose status, reason and
//! message already match is a no-op, and `lastTransitionTime` only moves when
//! the status flips.

use super::types::{Condition, ConditionStatus};

/// Overall readiness; the contract dependents gate on
pub const CONDITION_READY: &str = "Ready";
/// Last pass completed without error
pub const CONDITION_RECONCILE_SUCCESS: &str = "ReconcileSuccess";
/// Last pass failed
pub const CONDITION_RECONCILE_ERROR: &str = "ReconcileError";

/// Reason set alongside a successful pass
pub const REASON_RECONCILE_SUCCESS: &str = "ReconcileSuccess";
/// Reason set alongside a failed pass
pub const REASON_RECONCILE_ERROR: &str = "ReconcileError";
/// The remote namespace is registered and in sync
pub const REASON_NAMESPACE_CREATED: &str = "NamespaceCreated";
/// Every enabled service deployment is ready
pub const REASON_SERVICES_READY: &str = "ServicesReady";
/// At least one service deployment is still rolling out
pub const REASON_SERVICES_NOT_READY: &str = "ServicesNotReady";
/// The spec failed validation and needs a user fix
pub const REASON_VALIDATION_FAILED: &str = "ValidationFailed";

/// Find a condition by type
pub fn find_condition<'a>(conditions: &'a [Condition], type_: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.type_ == type_)
}

/// True when the condition of the given type exists with status `True`
pub fn is_condition_true(conditions: &[Condition], type_: &str) -> bool {
    find_condition(conditions, type_).is_some_and(|c| c.status == ConditionStatus::True)
}

/// Insert or replace a condition, returning whether anything changed
///
/// An existing entry keeps its `lastTransitionTime` unless the status differs.
pub fn set_condition(conditions: &mut Vec<Condition>, condition: Condition) -> bool {
    match conditions.iter_mut().find(|c| c.type_ == condition.type_) {
        Some(existing) => {
            if existing.status == condition.status
                && existing.reason == condition.reason
                && existing.message == condition.message
            {
                return false;
            }
            if existing.status != condition.status {
                existing.last_transition_time = condition.last_transition_time;
            }
            existing.status = condition.status;
            existing.reason = condition.reason;
            existing.message = condition.message;
            true
        }
        None => {
            conditions.push(condition);
            true
        }
    }
}

/// Remove a condition by type, returning whether it was present
pub fn remove_condition(conditions: &mut Vec<Condition>, type_: &str) -> bool {
    let before = conditions.len();
    conditions.retain(|c| c.type_ != type_);
    conditions.len() != before
}

/// Record a successful pass: `ReconcileSuccess=True`, clearing `ReconcileError`
pub fn mark_success(conditions: &mut Vec<Condition>) {
    set_condition(
        conditions,
        Condition::new(
            CONDITION_RECONCILE_SUCCESS,
            ConditionStatus::True,
            REASON_RECONCILE_SUCCESS,
            "",
        ),
    );
    remove_condition(conditions, CONDITION_RECONCILE_ERROR);
}

/// Record a failed pass: `ReconcileError=True` with the error message
pub fn mark_error(conditions: &mut Vec<Condition>, reason: &str, message: impl Into<String>) {
    set_condition(
        conditions,
        Condition::new(
            CONDITION_RECONCILE_ERROR,
            ConditionStatus::True,
            reason,
            message,
        ),
    );
    set_condition(
        conditions,
        Condition::new(
            CONDITION_RECONCILE_SUCCESS,
            ConditionStatus::False,
            reason,
            "",
        ),
    );
}
