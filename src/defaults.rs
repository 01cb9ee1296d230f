//! Policy defaults for TemporalCluster specs
//!
//! [`reconcile_defaults`] only fills fields the user left unset. It never
//! clears or overrides an explicit value, so a normalized spec is a fixed
//! point.

use crate::crd::{
    AdminToolsSpec, CertificatesDurationSpec, KubeDuration, ServiceSpec, ServicesSpec,
    TemporalClusterSpec, TemporalService, UISpec, TEMPORAL_SERVICES,
};

/// Temporal server version used when none is set
pub const DEFAULT_TEMPORAL_VERSION: &str = "1.23.0";
/// Temporal server image used when none is set
pub const DEFAULT_TEMPORAL_IMAGE: &str = "temporalio/server";
/// Web UI version used when none is set
pub const DEFAULT_UI_VERSION: &str = "2.25.0";
/// Web UI image used when none is set
pub const DEFAULT_UI_IMAGE: &str = "temporalio/ui";
/// Admin tools image used when none is set
pub const DEFAULT_ADMINTOOLS_IMAGE: &str = "temporalio/admin-tools";

const DEFAULT_REFRESH_INTERVAL: KubeDuration = KubeDuration::from_hours(1);
const DEFAULT_ROOT_CA_DURATION: KubeDuration = KubeDuration::from_hours(87600);
const DEFAULT_INTERMEDIATE_CA_DURATION: KubeDuration = KubeDuration::from_hours(43830);
const DEFAULT_LEAF_DURATION: KubeDuration = KubeDuration::from_hours(8766);

/// Frontend HTTP API port used when none is set
pub const DEFAULT_FRONTEND_HTTP_PORT: i32 = 7243;

/// Default (rpc, membership) ports for a service
pub fn default_ports(service: TemporalService) -> (i32, i32) {
    match service {
        TemporalService::Frontend => (7233, 6933),
        TemporalService::History => (7234, 6934),
        TemporalService::Matching => (7235, 6935),
        TemporalService::Worker => (7239, 6939),
    }
}

/// Fill unset fields with policy defaults, returning whether the spec changed
pub fn reconcile_defaults(spec: &mut TemporalClusterSpec) -> bool {
    let before = spec.clone();

    if spec.version.is_empty() {
        spec.version = DEFAULT_TEMPORAL_VERSION.to_string();
    }
    if spec.image.is_empty() {
        spec.image = DEFAULT_TEMPORAL_IMAGE.to_string();
    }

    let services = spec.services.get_or_insert_with(ServicesSpec::default);
    for service in TEMPORAL_SERVICES {
        let (port, membership_port) = default_ports(service);
        let slot = services.slot_mut(service).get_or_insert_with(ServiceSpec::default);
        slot.replicas.get_or_insert(1);
        slot.port.get_or_insert(port);
        slot.membership_port.get_or_insert(membership_port);
        if service == TemporalService::Frontend {
            slot.http_port.get_or_insert(DEFAULT_FRONTEND_HTTP_PORT);
        }
    }

    let persistence = &mut spec.persistence;
    if persistence.visibility_store.as_deref().map_or(true, str::is_empty) {
        persistence.visibility_store = Some(persistence.default_store.clone());
    }

    let ui = spec.ui.get_or_insert_with(UISpec::default);
    if ui.version.is_empty() {
        ui.version = DEFAULT_UI_VERSION.to_string();
    }
    if ui.image.is_empty() {
        ui.image = DEFAULT_UI_IMAGE.to_string();
    }

    let admintools = spec.admintools.get_or_insert_with(AdminToolsSpec::default);
    if admintools.image.is_empty() {
        admintools.image = DEFAULT_ADMINTOOLS_IMAGE.to_string();
    }

    if let Some(mtls) = spec.mtls.as_mut().filter(|m| m.cert_manager_enabled()) {
        mtls.refresh_interval.get_or_insert(DEFAULT_REFRESH_INTERVAL);
        let durations = mtls
            .certificates_duration
            .get_or_insert_with(CertificatesDurationSpec::default);
        durations.root_ca_certificate.get_or_insert(DEFAULT_ROOT_CA_DURATION);
        durations
            .intermediate_cas_certificates
            .get_or_insert(DEFAULT_INTERMEDIATE_CA_DURATION);
        durations.client_certificates.get_or_insert(DEFAULT_LEAF_DURATION);
        durations.frontend_certificate.get_or_insert(DEFAULT_LEAF_DURATION);
        durations.internode_certificate.get_or_insert(DEFAULT_LEAF_DURATION);
    }

    *spec != before
}
