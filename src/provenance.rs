use serde::Serialize;
use serde_json::Value;

use crate::errors::NormalizeError;
use crate::fields;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    MacOs,
    #[default]
    Windows,
}

impl Platform {
    pub fn is_mac(self) -> bool {
        self == Platform::MacOs
    }
}

static MAC_EXACT: [&str; 2] = ["macos", "darwin"];
static MAC_SUBSTRINGS: [&str; 2] = ["macos", "mac os"];

static OS_CONTAINERS: [&str; 4] = ["os_version", "system", "system_info", "identity"];

#[derive(Debug)]
enum PlatformSignal {
    // decides alone when present
    ExplicitField(&'static [&'static str]),
    ExclusiveBlock(&'static [&'static str]),
}

static PLATFORM_SIGNALS: [PlatformSignal; 2] = [
    PlatformSignal::ExplicitField(&["platform", "os_platform", "os_name", "os"]),
    PlatformSignal::ExclusiveBlock(&["btmdb_health", "secure_token_users", "platform_sso_users"]),
];

fn names_mac(value: &str) -> bool {
    let lower = value.trim().to_lowercase();
    MAC_EXACT.contains(&lower.as_str()) || MAC_SUBSTRINGS.iter().any(|needle| lower.contains(needle))
}

impl PlatformSignal {
    fn evaluate(&self, record: &Value) -> Option<Platform> {
        match self {
            PlatformSignal::ExplicitField(names) => {
                let explicit = fields::string(record, names).or_else(|| {
                    OS_CONTAINERS.iter().find_map(|container| {
                        fields::object(record, &[*container]).and_then(|block| fields::string(&block, names))
                    })
                })?;
                Some(if names_mac(&explicit) {
                    Platform::MacOs
                } else {
                    Platform::Windows
                })
            }
            PlatformSignal::ExclusiveBlock(names) => {
                fields::get_any(record, names).map(|_| Platform::MacOs)
            }
        }
    }
}

pub fn detect_platform(record: &Value) -> Platform {
    PLATFORM_SIGNALS
        .iter()
        .find_map(|signal| signal.evaluate(record))
        .unwrap_or_default()
}

pub fn is_mac(record: &Value) -> bool {
    detect_platform(record).is_mac()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ProviderSignal {
    ExplicitField,
    CertificateIssuerPattern,
    ServerUrlPattern,
}

impl ProviderSignal {
    pub const fn confidence(self) -> u8 {
        match self {
            ProviderSignal::ExplicitField => 3,
            ProviderSignal::CertificateIssuerPattern => 2,
            ProviderSignal::ServerUrlPattern => 1,
        }
    }
}

// strongest first
pub static PROVIDER_SIGNALS: [ProviderSignal; 3] = [
    ProviderSignal::ExplicitField,
    ProviderSignal::CertificateIssuerPattern,
    ProviderSignal::ServerUrlPattern,
];

static ISSUER_PATTERNS: [(&str, &str); 18] = [
    ("micromdm", "MicroMDM"),
    ("nanomdm", "NanoMDM"),
    ("jamf", "Jamf Pro"),
    ("kandji", "Kandji"),
    ("mosyle", "Mosyle"),
    ("simplemdm", "SimpleMDM"),
    ("addigy", "Addigy"),
    ("fleetdm", "Fleet"),
    ("fleet device management", "Fleet"),
    ("microsoft intune", "Microsoft Intune"),
    ("intune", "Microsoft Intune"),
    ("airwatch", "Workspace ONE"),
    ("workspace one", "Workspace ONE"),
    ("jumpcloud", "JumpCloud"),
    ("hexnode", "Hexnode"),
    ("meraki", "Cisco Meraki"),
    ("filewave", "FileWave"),
    ("manageengine", "ManageEngine"),
];

static URL_PATTERNS: [(&str, &str); 16] = [
    ("jamfcloud.com", "Jamf Pro"),
    ("kandji.io", "Kandji"),
    ("mosyle.com", "Mosyle"),
    ("simplemdm.com", "SimpleMDM"),
    ("addigy.com", "Addigy"),
    ("fleetdm.com", "Fleet"),
    ("manage.microsoft.com", "Microsoft Intune"),
    ("awmdm.com", "Workspace ONE"),
    ("airwatch", "Workspace ONE"),
    ("jumpcloud.com", "JumpCloud"),
    ("hexnode.com", "Hexnode"),
    ("meraki.com", "Cisco Meraki"),
    ("filewave", "FileWave"),
    ("manageengine", "ManageEngine"),
    ("micromdm", "MicroMDM"),
    ("nanomdm", "NanoMDM"),
];

static EXPLICIT_PLACEHOLDERS: [&str; 4] = ["", "unknown", "none", "n/a"];

#[derive(Debug, Clone, Copy, Default)]
pub struct ProviderEvidence<'a> {
    pub explicit: Option<&'a str>,
    pub issuer: Option<&'a str>,
    pub server_url: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderMatch {
    pub vendor: String,
    pub signal: ProviderSignal,
}

fn lookup(table: &[(&str, &'static str)], haystack: &str) -> Option<&'static str> {
    let lower = haystack.to_lowercase();
    table
        .iter()
        .find(|(needle, _)| lower.contains(needle))
        .map(|(_, vendor)| *vendor)
}

impl ProviderSignal {
    fn evaluate(self, evidence: &ProviderEvidence<'_>) -> Option<String> {
        match self {
            ProviderSignal::ExplicitField => evidence
                .explicit
                .map(str::trim)
                .filter(|v| !EXPLICIT_PLACEHOLDERS.contains(&v.to_lowercase().as_str()))
                .map(str::to_string),
            ProviderSignal::CertificateIssuerPattern => evidence
                .issuer
                .and_then(|issuer| lookup(&ISSUER_PATTERNS, issuer))
                .map(str::to_string),
            ProviderSignal::ServerUrlPattern => evidence
                .server_url
                .and_then(|url| lookup(&URL_PATTERNS, url))
                .map(str::to_string),
        }
    }
}

pub fn try_resolve_provider(evidence: &ProviderEvidence<'_>) -> Result<ProviderMatch, NormalizeError> {
    PROVIDER_SIGNALS
        .iter()
        .find_map(|&signal| {
            signal
                .evaluate(evidence)
                .map(|vendor| ProviderMatch { vendor, signal })
        })
        .ok_or(NormalizeError::AmbiguousProvenance("provider"))
}

pub fn resolve_provider(evidence: &ProviderEvidence<'_>) -> Option<ProviderMatch> {
    try_resolve_provider(evidence).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn explicit_platform_field() {
        assert_eq!(detect_platform(&json!({"platform": "darwin"})), Platform::MacOs);
        assert_eq!(detect_platform(&json!({"osName": "macOS"})), Platform::MacOs);
        assert_eq!(detect_platform(&json!({"os_name": "Mac OS X 10.15"})), Platform::MacOs);
        assert_eq!(
            detect_platform(&json!({"os_name": "Microsoft Windows 11 Pro"})),
            Platform::Windows
        );
    }

    #[test]
    fn explicit_field_inside_os_block() {
        let record = json!({"os_version": {"platform": "darwin", "name": "macOS"}});
        assert!(is_mac(&record));
    }

    #[test]
    fn explicit_field_beats_exclusive_blocks() {
        let record = json!({"platform": "windows", "btmdb_health": {"status": "ok"}});
        assert!(!is_mac(&record));
    }

    #[test]
    fn exclusive_blocks_imply_mac() {
        assert!(is_mac(&json!({"secureTokenUsers": ["admin"]})));
        assert!(is_mac(&json!({"btmdb_health": {"status": "ok"}})));
        assert!(!is_mac(&json!({"hostname": "desk-01"})));
        assert!(!is_mac(&json!(null)));
    }

    #[test]
    fn signals_are_ranked_by_confidence() {
        let ranks: Vec<u8> = PROVIDER_SIGNALS.iter().map(|s| s.confidence()).collect();
        let mut sorted = ranks.clone();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        assert_eq!(ranks, sorted);
    }

    #[test]
    fn explicit_provider_wins_over_url() {
        let evidence = ProviderEvidence {
            explicit: Some("Acme MDM"),
            issuer: None,
            server_url: Some("https://acme.jamfcloud.com/mdm"),
        };
        let found = resolve_provider(&evidence).unwrap();
        assert_eq!(found.vendor, "Acme MDM");
        assert_eq!(found.signal, ProviderSignal::ExplicitField);
    }

    #[test]
    fn issuer_beats_url() {
        let evidence = ProviderEvidence {
            explicit: Some("unknown"),
            issuer: Some("CN=MicroMDM CA"),
            server_url: Some("https://corp.kandji.io/mdm"),
        };
        let found = resolve_provider(&evidence).unwrap();
        assert_eq!(found.vendor, "MicroMDM");
        assert_eq!(found.signal, ProviderSignal::CertificateIssuerPattern);
    }

    #[test]
    fn url_fragment_match() {
        let evidence = ProviderEvidence {
            server_url: Some("https://enterpriseenrollment.manage.microsoft.com/EnrollmentServer"),
            ..Default::default()
        };
        assert_eq!(resolve_provider(&evidence).unwrap().vendor, "Microsoft Intune");
    }

    #[test]
    fn generic_fragments_do_not_match() {
        let evidence = ProviderEvidence {
            explicit: Some("  "),
            issuer: Some("Corporate Root CA"),
            server_url: Some("https://mdm.us-east-1.amazonaws.com/mdm/checkin"),
        };
        assert_eq!(resolve_provider(&evidence), None);
        assert_eq!(
            try_resolve_provider(&evidence),
            Err(NormalizeError::AmbiguousProvenance("provider"))
        );
    }
}
