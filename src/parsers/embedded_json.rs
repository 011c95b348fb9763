use std::borrow::Cow;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{CertificateInfo, CertificateSource};
use crate::errors::NormalizeError;
use crate::fields;
use crate::normalizer::normalize_keys;
use crate::parsers::timestamp::format_date;

const FORMAT: &str = "embedded-json";

#[derive(Debug)]
pub struct RepairRule {
    pub name: &'static str,
    pattern: &'static str,
    replacement: &'static str,
    compiled: OnceLock<Regex>,
}

impl RepairRule {
    const fn new(name: &'static str, pattern: &'static str, replacement: &'static str) -> Self {
        Self {
            name,
            pattern,
            replacement,
            compiled: OnceLock::new(),
        }
    }

    fn regex(&self) -> &Regex {
        self.compiled
            .get_or_init(|| Regex::new(self.pattern).expect("valid repair rule regex"))
    }

    pub fn apply<'t>(&self, text: &'t str) -> Cow<'t, str> {
        self.regex().replace_all(text, self.replacement)
    }
}

/// Order is part of the contract.
pub static REPAIR_RULES: [RepairRule; 6] = [
    RepairRule::new("semicolon_escaped_quote_comma", r#"([^\\])";\\","#, r#"$1","#),
    RepairRule::new("semicolon_newline", r#"([^\\])";[ \t]*(?:\r?\n|\\n)"#, "$1\",\n"),
    RepairRule::new("semicolon_before_delimiter", r#"([^\\])";\s*([,\}\]])"#, r#"$1"$2"#),
    // string literals are matched whole and written back untouched
    RepairRule::new(
        "literal_newline_between_tokens",
        r#"("(?:[^"\\]|\\.)*")|([\{\[,])(?:\s*\\n)+\s*("(?:[^"\\]|\\.)*"|[\}\]])"#,
        "$1$2$3",
    ),
    RepairRule::new("semicolon_between_members", r#"([^\\])"\s*;\s*""#, r#"$1",""#),
    RepairRule::new("trailing_comma", r#"("(?:[^"\\]|\\.)*")|,\s*([\}\]])"#, "$1$2"),
];

// decode once if double-encoded, then cut out the {...} span
fn isolate_document(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let decoded = if trimmed.starts_with('"') {
        serde_json::from_str::<String>(trimmed).unwrap_or_else(|_| trimmed.to_string())
    } else {
        trimmed.to_string()
    };
    let start = decoded.find('{')?;
    let end = decoded.rfind('}')?;
    (start < end).then(|| decoded[start..=end].to_string())
}

pub fn repair_embedded_json(raw: &str) -> Option<String> {
    let mut text = isolate_document(raw)?;
    for rule in REPAIR_RULES.iter() {
        if let Cow::Owned(fixed) = rule.apply(&text) {
            if fixed != text {
                debug!(rule = rule.name, "applied embedded json repair");
                text = fixed;
            }
        }
    }
    Some(text)
}

pub fn try_parse_embedded_json(raw: &str) -> Result<Value, NormalizeError> {
    let repaired = repair_embedded_json(raw)
        .ok_or_else(|| NormalizeError::malformed(FORMAT, 0, "no JSON object found"))?;
    serde_json::from_str::<Value>(&repaired)
        .map_err(|e| NormalizeError::malformed(FORMAT, e.column(), e.to_string()))
        .and_then(|value| {
            if value.is_object() {
                Ok(value)
            } else {
                Err(NormalizeError::malformed(FORMAT, 0, "document is not an object"))
            }
        })
}

static PROVIDER: [&str; 2] = ["provider", "mdm_provider"];
static ISSUER: [&str; 2] = ["certificate_issuer", "issuer"];
static SUBJECT: [&str; 2] = ["certificate_subject", "subject"];
static EXPIRY: [&str; 4] = ["certificate_expiry", "expiry", "not_valid_after", "expiration_date"];
static PUSH_TOPIC: [&str; 2] = ["push_topic", "topic"];
static SCEP_URL: [&str; 1] = ["scep_url"];

/// Certificate details from the repaired `output` document, or from the row
/// itself when it cannot be repaired.
pub fn parse_certificate(cert: &Value) -> CertificateInfo {
    let output = match fields::get(cert, "output") {
        Some(Value::String(s)) => match try_parse_embedded_json(s) {
            Ok(doc) => Some(normalize_keys(&doc)),
            Err(e) => {
                warn!("certificate output unrepairable, reading row fields directly: {}", e);
                None
            }
        },
        Some(doc @ Value::Object(_)) => Some(normalize_keys(doc)),
        _ => None,
    };

    let pick = |names: &[&str]| {
        output
            .as_ref()
            .and_then(|doc| fields::string(doc, names))
            .or_else(|| fields::string(cert, names))
    };
    let expiry_raw = output
        .as_ref()
        .and_then(|doc| fields::get_any(doc, &EXPIRY))
        .or_else(|| fields::get_any(cert, &EXPIRY));

    CertificateInfo {
        provider: pick(&PROVIDER),
        issuer: pick(&ISSUER),
        subject: pick(&SUBJECT),
        expiry: expiry_raw.map(|raw| format_date(Some(raw), false)),
        push_topic: pick(&PUSH_TOPIC),
        scep_url: pick(&SCEP_URL),
        source: if output.is_some() {
            CertificateSource::EmbeddedJson
        } else {
            CertificateSource::DirectFields
        },
    }
}
