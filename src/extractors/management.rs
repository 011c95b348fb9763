use serde_json::Value;

use super::Scope;
use crate::config::ManagementInfo;
use crate::parsers::embedded_json::parse_certificate;
use crate::provenance::{detect_platform, resolve_provider, ProviderEvidence};

static ENROLLMENT_BLOCKS: [&str; 4] = ["mdm_enrollment", "mdm", "enrollment", "mdm_info"];
static CERTIFICATE_FIELDS: [&str; 2] = ["mdm_certificate", "certificate"];

pub static ADE_ENROLLMENT: &str = "Automated Device Enrollment";
pub static USER_APPROVED_ENROLLMENT: &str = "User Approved Enrollment";
pub static MANUAL_ENROLLMENT: &str = "Manual Enrollment";

pub fn extract_management(record: &Value) -> ManagementInfo {
    let scope = Scope::new(record, &ENROLLMENT_BLOCKS);

    let installed_from_dep = scope.bool(&["installed_from_dep", "dep_enrolled", "is_dep"]);
    let user_approved = scope.bool(&["user_approved", "user_approved_enrollment"]);
    let is_enrolled = scope.bool(&["enrolled", "is_enrolled", "mdm_enrolled"]) || installed_from_dep;
    let server_url = scope.string(&[
        "server_url",
        "enrollment_server_url",
        "mdm_server_url",
        "discovery_service_url",
    ]);

    let enrollment_type = scope.string(&["enrollment_type"]).or_else(|| {
        let derived = if installed_from_dep {
            ADE_ENROLLMENT
        } else if user_approved {
            USER_APPROVED_ENROLLMENT
        } else if is_enrolled {
            MANUAL_ENROLLMENT
        } else {
            return None;
        };
        Some(derived.to_string())
    });

    let certificate = scope.object(&CERTIFICATE_FIELDS).map(|row| parse_certificate(&row));
    let explicit = certificate
        .as_ref()
        .and_then(|cert| cert.provider.clone())
        .or_else(|| scope.string(&["provider", "mdm_provider"]));

    let evidence = ProviderEvidence {
        explicit: explicit.as_deref(),
        issuer: certificate.as_ref().and_then(|cert| cert.issuer.as_deref()),
        server_url: server_url.as_deref(),
    };
    let found = resolve_provider(&evidence);

    ManagementInfo {
        is_enrolled,
        installed_from_dep,
        user_approved,
        enrollment_type,
        server_url,
        provider: found.as_ref().map(|m| m.vendor.clone()),
        provider_signal: found.map(|m| m.signal),
        certificate,
        is_mac: detect_platform(record).is_mac(),
    }
}
