//! [`TemporalClient`] over the frontend's HTTP API
//!
//! The frontend serves its HTTP API on the service's `httpPort`, which the
//! defaults normalizer always sets. Clusters with mTLS enabled cannot be
//! reached by this client; connecting to one is a validation error that
//! waits for the cluster spec to change.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use kube::ResourceExt;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{NamespaceRequest, SearchAttributeType, TemporalClient, TemporalClientFactory};
use crate::crd::{TemporalCluster, TemporalService};
use crate::error::RemoteErrorKind;
use crate::Error;

/// Per-request timeout when none is configured
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Map an HTTP status to a remote failure kind
pub fn classify_status(status: StatusCode) -> RemoteErrorKind {
    match status {
        StatusCode::CONFLICT => RemoteErrorKind::AlreadyExists,
        StatusCode::NOT_FOUND => RemoteErrorKind::NotFound,
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => RemoteErrorKind::Unavailable,
        s if s.is_server_error() => RemoteErrorKind::Unavailable,
        _ => RemoteErrorKind::Rejected,
    }
}

/// Protobuf JSON form of a duration
fn proto_duration(duration: Duration) -> String {
    format!("{}s", duration.as_secs())
}

/// Base URL of a cluster's frontend HTTP API
pub fn frontend_url(cluster: &TemporalCluster) -> Result<String, Error> {
    let key = cluster.object_key();
    if cluster.spec.mtls_enabled() {
        return Err(Error::validation(
            &key,
            "mTLS-enabled clusters are not reachable over the frontend HTTP API",
        ));
    }
    let port = cluster
        .spec
        .services
        .as_ref()
        .and_then(|s| s.get(TemporalService::Frontend))
        .and_then(|f| f.http_port)
        .ok_or_else(|| Error::validation(&key, "frontend httpPort is not set"))?;
    Ok(format!(
        "http://{}.{}.svc:{}",
        cluster.child_name("frontend"),
        cluster.namespace().unwrap_or_default(),
        port
    ))
}

/// Opens [`HttpTemporalClient`]s sharing one connection pool
#[derive(Clone)]
pub struct HttpClientFactory {
    http: reqwest::Client,
}

impl HttpClientFactory {
    /// Factory whose requests time out after `timeout`
    pub fn new(timeout: Duration) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::internal("http client", e.to_string()))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl TemporalClientFactory for HttpClientFactory {
    async fn connect(&self, cluster: &TemporalCluster) -> Result<Box<dyn TemporalClient>, Error> {
        let base_url = frontend_url(cluster)?;
        debug!(cluster = %cluster.object_key(), %base_url, "opening temporal client");
        Ok(Box::new(HttpTemporalClient {
            http: self.http.clone(),
            base_url,
        }))
    }
}

/// Client for one cluster's frontend
pub struct HttpTemporalClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterBody<'a> {
    #[serde(flatten)]
    request: &'a NamespaceRequest,
    workflow_execution_retention_period: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchAttributesResponse {
    #[serde(default)]
    custom_attributes: BTreeMap<String, SearchAttributeType>,
}

fn update_body(request: &NamespaceRequest) -> serde_json::Value {
    serde_json::json!({
        "updateInfo": {
            "description": request.description.clone().unwrap_or_default(),
            "ownerEmail": request.owner_email.clone().unwrap_or_default(),
            "data": request.data,
        },
        "config": {
            "workflowExecutionRetentionTtl": proto_duration(request.retention),
        },
    })
}

impl HttpTemporalClient {
    async fn call<B: Serialize + ?Sized>(
        &self,
        operation: &str,
        target: &str,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<reqwest::Response, Error> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.request(method, &url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            Error::remote(operation, target, RemoteErrorKind::Unavailable, e.to_string())
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(Error::remote(
            operation,
            target,
            classify_status(status),
            format!("HTTP {status}: {message}"),
        ))
    }

    async fn call_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        target: &str,
        path: &str,
    ) -> Result<T, Error> {
        self.call::<()>(operation, target, Method::GET, path, None)
            .await?
            .json()
            .await
            .map_err(|e| Error::serialization(format!("{operation} for {target}: {e}")))
    }
}

#[async_trait]
impl TemporalClient for HttpTemporalClient {
    async fn register_namespace(&self, request: &NamespaceRequest) -> Result<(), Error> {
        let body = RegisterBody {
            request,
            workflow_execution_retention_period: proto_duration(request.retention),
        };
        self.call(
            "register namespace",
            &request.namespace,
            Method::POST,
            "/api/v1/namespaces",
            Some(&body),
        )
        .await?;
        Ok(())
    }

    async fn update_namespace(&self, request: &NamespaceRequest) -> Result<(), Error> {
        let path = format!("/api/v1/namespaces/{}/update", request.namespace);
        self.call(
            "update namespace",
            &request.namespace,
            Method::POST,
            &path,
            Some(&update_body(request)),
        )
        .await?;
        Ok(())
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<(), Error> {
        let path = format!("/api/v1/namespaces/{namespace}");
        self.call::<()>("delete namespace", namespace, Method::DELETE, &path, None)
            .await?;
        Ok(())
    }

    async fn list_search_attributes(
        &self,
        namespace: &str,
    ) -> Result<BTreeMap<String, SearchAttributeType>, Error> {
        let path = format!("/api/v1/namespaces/{namespace}/search-attributes");
        let response: SearchAttributesResponse = self
            .call_json("list search attributes", namespace, &path)
            .await?;
        Ok(response.custom_attributes)
    }

    async fn add_search_attributes(
        &self,
        namespace: &str,
        attributes: &BTreeMap<String, SearchAttributeType>,
    ) -> Result<(), Error> {
        let path = format!("/api/v1/namespaces/{namespace}/search-attributes");
        let body = serde_json::json!({
            "namespace": namespace,
            "searchAttributes": attributes,
        });
        self.call("add search attributes", namespace, Method::POST, &path, Some(&body))
            .await?;
        Ok(())
    }

    async fn remove_search_attributes(&self, namespace: &str, names: &[String]) -> Result<(), Error> {
        let path = format!("/api/v1/namespaces/{namespace}/search-attributes/remove");
        let body = serde_json::json!({
            "namespace": namespace,
            "searchAttributes": names,
        });
        self.call("remove search attributes", namespace, Method::POST, &path, Some(&body))
            .await?;
        Ok(())
    }

    /// Nothing to release: connections live in the factory's shared
    /// reqwest pool and idle ones are reaped by the pool itself.
    async fn close(&self) {
        debug!(base_url = %self.base_url, "closing temporal client");
    }
}
