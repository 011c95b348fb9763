pub mod identity;
pub mod management;
pub mod network;
pub mod system;

use std::borrow::Cow;

use anyhow::{anyhow, Result};
use serde_json::Value;

use crate::config::DeviceReport;
use crate::fields;
use crate::normalizer::normalize_record;
use crate::parsers::boolean::parse_bool_opt;
use crate::parsers::timestamp::{format_date, ParsedTimestamp};
use crate::provenance::detect_platform;

pub static MODULES: [&str; 4] = ["identity", "system", "management", "network"];

/// Build a report from one raw agent record with the named modules filled in.
pub fn extract_report<S: AsRef<str>>(raw: &Value, modules: &[S]) -> Result<DeviceReport> {
    let record = normalize_record(raw);
    let mut report = DeviceReport {
        device_id: fields::string(
            &record,
            &["device_id", "uuid", "hardware_uuid", "serial_number", "hostname"],
        ),
        platform: detect_platform(&record),
        ..Default::default()
    };

    for module in modules {
        match module.as_ref() {
            "identity" => report.identity = Some(identity::extract_identity(&record)),
            "system" => report.system = Some(system::extract_system(&record)),
            "management" => report.management = Some(management::extract_management(&record)),
            "network" => report.network = Some(network::extract_network(&record)),
            other => return Err(anyhow!("Unknown module: {}", other)),
        }
    }
    Ok(report)
}

// module block first, record root second
pub(crate) struct Scope<'a> {
    block: Option<Cow<'a, Value>>,
    root: &'a Value,
}

impl<'a> Scope<'a> {
    pub(crate) fn new(root: &'a Value, block_names: &[&str]) -> Self {
        Self {
            block: fields::object(root, block_names),
            root,
        }
    }

    fn layers(&self) -> impl Iterator<Item = &Value> {
        self.block.as_deref().into_iter().chain(std::iter::once(self.root))
    }

    pub(crate) fn get(&self, names: &[&str]) -> Option<&Value> {
        self.layers().find_map(|layer| fields::get_any(layer, names))
    }

    pub(crate) fn string(&self, names: &[&str]) -> Option<String> {
        self.get(names).and_then(fields::text)
    }

    pub(crate) fn bool(&self, names: &[&str]) -> bool {
        parse_bool_opt(self.get(names))
    }

    pub(crate) fn u64(&self, names: &[&str]) -> Option<u64> {
        self.get(names).and_then(fields::number)
    }

    pub(crate) fn count(&self, names: &[&str]) -> usize {
        self.u64(names).map(|n| n as usize).unwrap_or(0)
    }

    pub(crate) fn object(&self, names: &[&str]) -> Option<Cow<'_, Value>> {
        self.get(names).and_then(fields::object_of)
    }

    pub(crate) fn records(&self, names: &[&str]) -> Vec<Value> {
        self.get(names).map(fields::records_of).unwrap_or_default()
    }

    pub(crate) fn string_list(&self, names: &[&str]) -> Vec<String> {
        self.get(names).map(fields::strings_of).unwrap_or_default()
    }

    pub(crate) fn timestamp(&self, names: &[&str]) -> Option<ParsedTimestamp> {
        self.get(names).map(|raw| format_date(Some(raw), false))
    }
}

pub(crate) fn os_details(scope: &Scope<'_>) -> (Option<String>, Option<String>, Option<String>) {
    let os = scope.object(&["os_version", "os_info", "operating_system"]);
    let from_os = |names: &[&str]| os.as_deref().and_then(|block| fields::string(block, names));

    let name = from_os(&["name", "caption"])
        .or_else(|| scope.string(&["os_name", "os_caption", "product_name"]));
    let version = from_os(&["version"])
        .or_else(|| scope.string(&["os_version", "os_release", "product_version"]));
    let build = from_os(&["build", "build_number"])
        .or_else(|| scope.string(&["os_build", "build_number", "build_version"]));
    (name, version, build)
}
