//! Supporting types shared by the Temporal CRDs

use std::time::Duration;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Logical Temporal services, in the order their child objects are built
pub const TEMPORAL_SERVICES: [TemporalService; 4] = [
    TemporalService::Frontend,
    TemporalService::History,
    TemporalService::Matching,
    TemporalService::Worker,
];

/// A logical Temporal server service
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TemporalService {
    /// Public gRPC/HTTP API
    Frontend,
    /// Workflow state and history shards
    History,
    /// Task queue dispatch
    Matching,
    /// Internal system workflows
    Worker,
}

impl TemporalService {
    /// Lowercase service name as used by the server's `SERVICES` env and in object names
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Frontend => "frontend",
            Self::History => "history",
            Self::Matching => "matching",
            Self::Worker => "worker",
        }
    }
}

impl std::fmt::Display for TemporalService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-service deployment settings
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSpec {
    /// Number of replicas
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    /// gRPC port the service listens on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i32>,

    /// Ringpop membership port
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub membership_port: Option<i32>,

    /// Optional HTTP API port (frontend only)
    #[serde(rename = "httpPort", default, skip_serializing_if = "Option::is_none")]
    pub http_port: Option<i32>,
}

/// Settings for each Temporal service
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServicesSpec {
    /// Frontend service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frontend: Option<ServiceSpec>,

    /// History service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<ServiceSpec>,

    /// Matching service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matching: Option<ServiceSpec>,

    /// Internal worker service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker: Option<ServiceSpec>,
}

impl ServicesSpec {
    /// Settings for one logical service, if declared
    pub fn get(&self, service: TemporalService) -> Option<&ServiceSpec> {
        match service {
            TemporalService::Frontend => self.frontend.as_ref(),
            TemporalService::History => self.history.as_ref(),
            TemporalService::Matching => self.matching.as_ref(),
            TemporalService::Worker => self.worker.as_ref(),
        }
    }

    /// Mutable slot for one logical service
    pub fn slot_mut(&mut self, service: TemporalService) -> &mut Option<ServiceSpec> {
        match service {
            TemporalService::Frontend => &mut self.frontend,
            TemporalService::History => &mut self.history,
            TemporalService::Matching => &mut self.matching,
            TemporalService::Worker => &mut self.worker,
        }
    }
}

/// Persistence store selection
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PersistenceSpec {
    /// Name of the datastore used for workflow state
    #[serde(default)]
    pub default_store: String,

    /// Name of the datastore used for visibility (defaults to the default store)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility_store: Option<String>,
}

/// Certificate lifetimes for the cert-manager mTLS provider
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CertificatesDurationSpec {
    /// Root CA certificate lifetime
    #[serde(rename = "rootCACertificate", default, skip_serializing_if = "Option::is_none")]
    pub root_ca_certificate: Option<KubeDuration>,

    /// Intermediate CA certificates lifetime
    #[serde(rename = "intermediateCAsCertificates", default, skip_serializing_if = "Option::is_none")]
    pub intermediate_cas_certificates: Option<KubeDuration>,

    /// Client certificates lifetime
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_certificates: Option<KubeDuration>,

    /// Frontend certificate lifetime
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frontend_certificate: Option<KubeDuration>,

    /// Internode certificate lifetime
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internode_certificate: Option<KubeDuration>,
}

/// Mutual TLS policy
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MTLSSpec {
    /// Certificate provider; only `cert-manager` is supported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    /// How often workloads reload rotated certificates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_interval: Option<KubeDuration>,

    /// Certificate lifetimes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificates_duration: Option<CertificatesDurationSpec>,
}

/// mTLS provider name that enables certificate management
pub const CERT_MANAGER_PROVIDER: &str = "cert-manager";

impl MTLSSpec {
    /// True when certificates are issued by cert-manager
    pub fn cert_manager_enabled(&self) -> bool {
        self.provider.as_deref() == Some(CERT_MANAGER_PROVIDER)
    }
}

/// Temporal Web UI deployment
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct UISpec {
    /// Deploy the UI
    #[serde(default)]
    pub enabled: bool,

    /// UI image tag
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,

    /// UI image repository
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,
}

/// Admin tools deployment (tctl / temporal CLI pod)
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct AdminToolsSpec {
    /// Deploy the admin tools pod
    #[serde(default)]
    pub enabled: bool,

    /// Admin tools image repository (tagged with the cluster version)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,
}

/// Reference from a TemporalNamespace to its TemporalCluster
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct ClusterReference {
    /// Name of the TemporalCluster
    pub name: String,

    /// Namespace of the TemporalCluster (defaults to the referencing object's namespace)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl ClusterReference {
    /// Namespace the reference resolves to, given the referencing object's namespace
    pub fn resolve_namespace<'a>(&'a self, own_namespace: &'a str) -> &'a str {
        match self.namespace.as_deref() {
            Some(ns) if !ns.is_empty() => ns,
            _ => own_namespace,
        }
    }
}

/// Observed state of one Temporal service
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct ServiceStatus {
    /// Service name
    pub name: String,
    /// Version the service is running
    pub version: String,
    /// Whether all replicas are ready
    pub ready: bool,
}

/// Condition status following Kubernetes conventions
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionStatus {
    /// Condition is true
    True,
    /// Condition is false
    False,
    /// Condition status is unknown
    #[default]
    Unknown,
}

impl std::fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::True => write!(f, "True"),
            Self::False => write!(f, "False"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Kubernetes-style condition for status reporting
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct Condition {
    /// Type of condition (e.g., Ready, ReconcileError)
    #[serde(rename = "type")]
    pub type_: String,

    /// Status of the condition (True, False, Unknown)
    pub status: ConditionStatus,

    /// Machine-readable reason for the condition
    pub reason: String,

    /// Human-readable message
    #[serde(default)]
    pub message: String,

    /// Last time the condition status changed
    #[serde(rename = "lastTransitionTime")]
    pub last_transition_time: DateTime<Utc>,
}

impl Condition {
    /// Create a new condition with the current timestamp
    pub fn new(
        type_: impl Into<String>,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            type_: type_.into(),
            status,
            reason: reason.into(),
            message: message.into(),
            last_transition_time: Utc::now(),
        }
    }
}

/// A duration in the Kubernetes `metav1.Duration` string form ("1h0m0s", "87600h")
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct KubeDuration(pub Duration);

impl KubeDuration {
    /// Duration of the given number of hours
    pub const fn from_hours(hours: u64) -> Self {
        Self(Duration::from_secs(hours * 3600))
    }

    /// The wrapped duration
    pub fn as_duration(&self) -> Duration {
        self.0
    }
}

impl std::fmt::Display for KubeDuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let total = self.0.as_secs();
        let millis = self.0.subsec_millis();
        let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
        if total == 0 && millis == 0 {
            return write!(f, "0s");
        }
        if total == 0 {
            return write!(f, "{millis}ms");
        }
        if hours > 0 {
            write!(f, "{hours}h{minutes}m")?;
        } else if minutes > 0 {
            write!(f, "{minutes}m")?;
        }
        if millis > 0 {
            write!(f, "{seconds}.{millis:03}s")
        } else {
            write!(f, "{seconds}s")
        }
    }
}

impl std::str::FromStr for KubeDuration {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || crate::Error::serialization(format!("invalid duration {s:?}"));
        let input = s.trim();
        if input.is_empty() {
            return Err(invalid());
        }
        if input == "0" {
            return Ok(Self::default());
        }

        let mut total = 0f64;
        let mut rest = input;
        while !rest.is_empty() {
            let number_len = rest
                .find(|c: char| !(c.is_ascii_digit() || c == '.'))
                .ok_or_else(invalid)?;
            if number_len == 0 {
                return Err(invalid());
            }
            let (number, tail) = rest.split_at(number_len);
            let value: f64 = number.parse().map_err(|_| invalid())?;
            let unit_len = tail
                .find(|c: char| c.is_ascii_digit() || c == '.')
                .unwrap_or(tail.len());
            let (unit, next) = tail.split_at(unit_len);
            let scale = match unit {
                "h" => 3600.0,
                "m" => 60.0,
                "s" => 1.0,
                "ms" => 0.001,
                _ => return Err(invalid()),
            };
            total += value * scale;
            rest = next;
        }
        // Overflowing or non-finite totals are rejected instead of panicking
        Duration::try_from_secs_f64(total)
            .map(Self)
            .map_err(|_| invalid())
    }
}

impl Serialize for KubeDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for KubeDuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl JsonSchema for KubeDuration {
    fn schema_name() -> String {
        "Duration".to_string()
    }

    fn json_schema(gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        String::json_schema(gen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_formats_like_kubernetes() {
        assert_eq!(KubeDuration::from_hours(1).to_string(), "1h0m0s");
        assert_eq!(KubeDuration::from_hours(87600).to_string(), "87600h0m0s");
        assert_eq!(KubeDuration(Duration::from_secs(90)).to_string(), "1m30s");
        assert_eq!(KubeDuration(Duration::from_secs(5)).to_string(), "5s");
        assert_eq!(KubeDuration(Duration::from_millis(250)).to_string(), "250ms");
        assert_eq!(KubeDuration::default().to_string(), "0s");
    }

    #[test]
    fn test_duration_parses_kubernetes_forms() {
        let parse = |s: &str| s.parse::<KubeDuration>().map(|d| d.0);
        assert_eq!(parse("1h0m0s").ok(), Some(Duration::from_secs(3600)));
        assert_eq!(parse("87600h").ok(), Some(Duration::from_secs(87600 * 3600)));
        assert_eq!(parse("72h30m").ok(), Some(Duration::from_secs(72 * 3600 + 1800)));
        assert_eq!(parse("1.5h").ok(), Some(Duration::from_secs(5400)));
        assert_eq!(parse("0").ok(), Some(Duration::ZERO));
        assert!(parse("").is_err());
        assert!(parse("10 days").is_err());
        assert!(parse("h").is_err());
        assert!(parse("5d").is_err());
    }

    /// Story: An absurd retention from a user is a parse error, so a single
    /// bad object cannot take down the watcher
    #[test]
    fn story_out_of_range_duration_is_rejected() {
        assert!("99999999999999999999999h".parse::<KubeDuration>().is_err());
        assert!(format!("{}h", "9".repeat(400)).parse::<KubeDuration>().is_err());

        let result: Result<KubeDuration, _> = serde_json::from_str("\"99999999999999999999999h\"");
        let err = result.unwrap_err().to_string();
        assert!(err.contains("invalid duration"), "unexpected error: {err}");
    }

    #[test]
    fn test_duration_serde_uses_strings() {
        let json = serde_json::to_string(&KubeDuration::from_hours(8766)).unwrap();
        assert_eq!(json, "\"8766h0m0s\"");
        let back: KubeDuration = serde_json::from_str(&json).unwrap();
        assert_eq!(back, KubeDuration::from_hours(8766));
    }

    #[test]
    fn test_cluster_reference_namespace_defaults_to_own() {
        let local = ClusterReference {
            name: "prod".to_string(),
            namespace: None,
        };
        assert_eq!(local.resolve_namespace("apps"), "apps");

        let empty = ClusterReference {
            name: "prod".to_string(),
            namespace: Some(String::new()),
        };
        assert_eq!(empty.resolve_namespace("apps"), "apps");

        let remote = ClusterReference {
            name: "prod".to_string(),
            namespace: Some("temporal".to_string()),
        };
        assert_eq!(remote.resolve_namespace("apps"), "temporal");
    }

    #[test]
    fn test_services_spec_lookup() {
        let mut services = ServicesSpec::default();
        assert!(services.get(TemporalService::History).is_none());
        *services.slot_mut(TemporalService::History) = Some(ServiceSpec {
            replicas: Some(3),
            ..Default::default()
        });
        assert_eq!(
            services.get(TemporalService::History).and_then(|s| s.replicas),
            Some(3)
        );
    }

    #[test]
    fn test_mtls_enabled_only_for_cert_manager() {
        let mut mtls = MTLSSpec::default();
        assert!(!mtls.cert_manager_enabled());
        mtls.provider = Some("linkerd".to_string());
        assert!(!mtls.cert_manager_enabled());
        mtls.provider = Some(CERT_MANAGER_PROVIDER.to_string());
        assert!(mtls.cert_manager_enabled());
    }
}
