pub mod config;
pub mod errors;
pub mod extractors;
pub mod fields;
pub mod normalizer;
pub mod output;
pub mod parsers;
pub mod provenance;

pub use config::{
    CertificateInfo, CertificateSource, DeviceReport, IdentityInfo, ManagementInfo, NetworkInfo,
    SystemInfo,
};
pub use errors::NormalizeError;
pub use extractors::identity::extract_identity;
pub use extractors::management::extract_management;
pub use extractors::network::extract_network;
pub use extractors::system::extract_system;
pub use extractors::{extract_report, MODULES};
pub use normalizer::{normalize_keys, normalize_record, to_camel_case};
pub use parsers::boolean::parse_bool;
pub use parsers::embedded_json::{parse_certificate, repair_embedded_json, REPAIR_RULES};
pub use parsers::structured_text::parse_structured_text;
pub use parsers::timestamp::{format_date, format_date_at, ParsedTimestamp};
pub use provenance::{detect_platform, is_mac, resolve_provider, Platform, ProviderEvidence, ProviderSignal};
