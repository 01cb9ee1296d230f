//! TemporalNamespace reconciliation
//!
//! Pass order:
//! 1. fetch the latest object (gone: drop it from the index and stop)
//! 2. gate on the referenced cluster being ready
//! 3. deletion: delete remotely, then release the finalizer
//! 4. keep the finalizer in line with `allowDeletion`
//! 5. register, falling back to update when the namespace already exists
//! 6. converge custom search attributes
//!
//! No remote call is made before the cluster gate passes, except that a
//! deleting namespace whose cluster is gone releases its finalizer without
//! contacting anything.

use std::sync::Arc;

use kube::runtime::controller::Action;
use kube::ResourceExt;
use tracing::{debug, error, info, instrument, warn};

use super::{merge_persist, record_conditions, with_deadline, Context, HasStatus, Outcome, PatchHelper};
use crate::crd::conditions::{set_condition, CONDITION_READY, REASON_NAMESPACE_CREATED};
use crate::crd::{Condition, ConditionStatus, TemporalCluster, TemporalNamespace};
use crate::index::ObjectKey;
use crate::temporal::{reconcile_search_attributes, NamespaceRequest, TemporalClient};
use crate::Error;

fn backoff_key(key: &ObjectKey) -> String {
    format!("TemporalNamespace/{key}")
}

/// Reconcile a TemporalNamespace
#[instrument(skip(namespace, ctx), fields(namespace = %namespace.name_any(), object_namespace = %namespace.namespace().unwrap_or_default()))]
pub async fn reconcile_namespace(namespace: Arc<TemporalNamespace>, ctx: Arc<Context>) -> Result<Action, Error> {
    let key = ObjectKey::of(namespace.as_ref());
    let Some(mut current) = ctx.store.get_namespace(&key.namespace, &key.name).await? else {
        debug!("namespace no longer exists");
        ctx.index.remove(&key);
        ctx.backoff.reset(&backoff_key(&key));
        return Ok(Action::await_change());
    };
    ctx.index.upsert(&current);

    let helper = PatchHelper::snapshot(&current);
    let result = with_deadline(&ctx, &key, reconcile_pass(&mut current, &ctx)).await;
    record_conditions(&mut current, &result);

    let patch = helper.diff(&current);
    let persisted = if patch.is_empty() {
        Ok(())
    } else {
        ctx.store.patch_namespace(&key.namespace, &key.name, &patch).await
    };

    ctx.action_for(&backoff_key(&key), merge_persist(result, persisted))
}

async fn reconcile_pass(namespace: &mut TemporalNamespace, ctx: &Context) -> Result<Outcome, Error> {
    let cluster_key = namespace.cluster_key();
    let cluster = match ctx
        .store
        .get_cluster(&cluster_key.namespace, &cluster_key.name)
        .await?
    {
        Some(cluster) => cluster,
        None if namespace.is_deleting() => {
            if namespace.remove_finalizer() {
                info!(cluster = %cluster_key, "cluster is gone, releasing namespace without remote deletion");
            }
            return Ok(Outcome::Finished);
        }
        None => {
            return Err(Error::MissingCluster {
                object: namespace.object_key().to_string(),
                cluster: cluster_key.to_string(),
            })
        }
    };

    if !cluster.is_ready() {
        debug!(cluster = %cluster_key, "cluster not ready, polling");
        return Ok(Outcome::Requeue(ctx.settings.cluster_poll_interval));
    }

    if namespace.is_deleting() {
        if namespace.has_finalizer() {
            delete_remote(namespace, &cluster, ctx).await?;
            namespace.remove_finalizer();
        }
        return Ok(Outcome::Finished);
    }

    let changed = if namespace.spec.allow_deletion {
        namespace.add_finalizer()
    } else {
        namespace.remove_finalizer()
    };
    if changed {
        debug!(allow_deletion = namespace.spec.allow_deletion, "deletion finalizer updated");
    }

    let client = ctx.temporal.connect(&cluster).await?;
    let converged = converge(client.as_ref(), &cluster, namespace).await;
    client.close().await;
    converged?;

    set_condition(
        namespace.conditions_mut(),
        Condition::new(
            CONDITION_READY,
            ConditionStatus::True,
            REASON_NAMESPACE_CREATED,
            "namespace registered",
        ),
    );
    Ok(Outcome::Success)
}

async fn delete_remote(
    namespace: &TemporalNamespace,
    cluster: &TemporalCluster,
    ctx: &Context,
) -> Result<(), Error> {
    let name = namespace.name_any();
    let client = ctx.temporal.connect(cluster).await?;
    let deleted = client.delete_namespace(&name).await;
    client.close().await;

    match deleted {
        Ok(()) => {
            info!(%name, "deleted remote namespace");
            Ok(())
        }
        Err(e) if e.is_not_found() => {
            debug!(%name, "remote namespace already absent");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

async fn converge(
    client: &dyn TemporalClient,
    cluster: &TemporalCluster,
    namespace: &TemporalNamespace,
) -> Result<(), Error> {
    let request = NamespaceRequest::new(cluster, namespace);
    match client.register_namespace(&request).await {
        Ok(()) => info!(name = %request.namespace, "registered namespace"),
        Err(e) if e.is_already_exists() => {
            client.update_namespace(&request).await?;
            debug!(name = %request.namespace, "updated existing namespace");
        }
        Err(e) => return Err(e),
    }

    reconcile_search_attributes(
        client,
        &request.namespace,
        &namespace.spec.custom_search_attributes,
    )
    .await?;
    Ok(())
}

/// Error policy for the TemporalNamespace controller
pub fn namespace_error_policy(namespace: Arc<TemporalNamespace>, error: &Error, ctx: Arc<Context>) -> Action {
    if error.is_permanent() {
        warn!(?error, namespace = %namespace.name_any(), "reconciliation blocked");
    } else {
        error!(?error, namespace = %namespace.name_any(), "reconciliation failed");
    }
    ctx.backoff_action(&backoff_key(&ObjectKey::of(namespace.as_ref())))
}
