use serde_json::Value;

use super::{os_details, Scope};
use crate::config::{ServiceRecord, SystemInfo, UpdateRecord};
use crate::fields;
use crate::parsers::timestamp::format_date;

static SYSTEM_BLOCKS: [&str; 3] = ["system", "system_info", "hardware"];

// ServiceControllerStatus, as emitted when PowerShell serializes the enum
static SERVICE_STATUS: [&str; 7] = [
    "Stopped",
    "StartPending",
    "StopPending",
    "Running",
    "ContinuePending",
    "PausePending",
    "Paused",
];
// ServiceStartMode
static START_TYPES: [&str; 5] = ["Boot", "System", "Automatic", "Manual", "Disabled"];

pub fn extract_system(record: &Value) -> SystemInfo {
    let scope = Scope::new(record, &SYSTEM_BLOCKS);
    let (os_name, os_version, os_build) = os_details(&scope);

    let updates: Vec<UpdateRecord> = scope
        .records(&["updates", "hotfixes", "installed_updates"])
        .iter()
        .map(update_record)
        .collect();
    let services: Vec<ServiceRecord> = scope
        .records(&["services", "windows_services"])
        .iter()
        .map(service_record)
        .collect();

    SystemInfo {
        os_name,
        os_version,
        os_build,
        architecture: scope.string(&["arch", "architecture", "os_architecture", "cpu_type"]),
        cpu_brand: scope.string(&["cpu_brand", "processor", "cpu_name"]),
        cpu_cores: scope.count(&[
            "cpu_logical_cores",
            "number_of_logical_processors",
            "logical_processors",
            "cpu_cores",
        ]),
        memory_bytes: scope.u64(&["physical_memory", "total_physical_memory", "memory_bytes"]),
        uptime_seconds: scope
            .u64(&["uptime_seconds", "uptime"])
            .or_else(|| {
                scope
                    .object(&["uptime"])
                    .and_then(|block| fields::u64(&block, &["total_seconds", "seconds"]))
            }),
        boot_time: scope.timestamp(&["boot_time", "last_boot_up_time", "last_boot_time"]),
        update_count: updates.len(),
        updates,
        service_count: services.len(),
        running_service_count: services.iter().filter(|s| s.is_running).count(),
        services,
    }
}

fn update_record(row: &Value) -> UpdateRecord {
    UpdateRecord {
        id: fields::string(row, &["hot_fix_id", "HotFixID", "hotfix_id", "kb", "update_id"]),
        title: fields::string(row, &["title", "display_name", "name"]),
        description: fields::string(row, &["description"]),
        installed_on: fields::get_any(row, &["installed_on", "install_date", "date"])
            .map(|raw| format_date(Some(raw), false)),
        installed_by: fields::string(row, &["installed_by"]),
    }
}

// name or numeric code
fn enum_name(value: Option<&Value>, names: &[&str], offset: u64) -> Option<String> {
    let value = value?;
    if let Value::Number(_) = value {
        let code = fields::number(value)?;
        return code
            .checked_sub(offset)
            .and_then(|idx| names.get(idx as usize))
            .map(|name| name.to_string())
            .or_else(|| fields::text(value));
    }
    fields::text(value)
}

fn service_record(row: &Value) -> ServiceRecord {
    let status = enum_name(fields::get_any(row, &["status", "state"]), &SERVICE_STATUS, 1);
    let start_type = enum_name(fields::get_any(row, &["start_type", "start_mode"]), &START_TYPES, 0);
    ServiceRecord {
        name: fields::string(row, &["name", "service_name"]),
        display_name: fields::string(row, &["display_name"]),
        is_running: status.as_deref().is_some_and(|s| s.eq_ignore_ascii_case("running")),
        status,
        start_type,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::normalize_record;
    use serde_json::json;

    #[test]
    fn windows_system_with_structured_text_rows() {
        let raw = json!({
            "osName": "Microsoft Windows 11 Pro",
            "osVersion": "10.0.22631",
            "architecture": "64-bit",
            "processor": "Intel(R) Core(TM) i7-1185G7",
            "numberOfLogicalProcessors": 8,
            "totalPhysicalMemory": 34359738368u64,
            "lastBootUpTime": "/Date(1709649000000)/",
            "updates": [
                "@{HotFixID=KB5034765; Description=Security Update; InstalledOn=2/13/2024 12:00:00 AM; InstalledBy=NT AUTHORITY\\SYSTEM}",
                {"hotFixId": "KB5034441", "description": "Update", "installedOn": "2024-01-09"}
            ],
            "services": [
                {"name": "Spooler", "displayName": "Print Spooler", "status": 4, "startType": 2},
                "@{Name=WinDefend; DisplayName=\"Microsoft Defender; Antivirus\"; Status=Stopped; StartType=Manual}"
            ]
        });
        let info = extract_system(&normalize_record(&raw));

        assert_eq!(info.os_name.as_deref(), Some("Microsoft Windows 11 Pro"));
        assert_eq!(info.cpu_cores, 8);
        assert_eq!(info.memory_bytes, Some(34359738368));
        assert_eq!(info.boot_time.unwrap().text, "Mar 5, 2024, 14:30");

        assert_eq!(info.update_count, 2);
        assert_eq!(info.updates[0].id.as_deref(), Some("KB5034765"));
        assert_eq!(info.updates[0].installed_by.as_deref(), Some("NT AUTHORITY\\SYSTEM"));
        assert_eq!(info.updates[0].installed_on.as_ref().unwrap().text, "Feb 13, 2024, 00:00");
        assert_eq!(info.updates[1].id.as_deref(), Some("KB5034441"));

        assert_eq!(info.service_count, 2);
        assert_eq!(info.running_service_count, 1);
        let spooler = &info.services[0];
        assert_eq!(spooler.status.as_deref(), Some("Running"));
        assert_eq!(spooler.start_type.as_deref(), Some("Automatic"));
        assert!(spooler.is_running);
        let defender = &info.services[1];
        assert_eq!(defender.display_name.as_deref(), Some("Microsoft Defender; Antivirus"));
        assert_eq!(defender.start_type.as_deref(), Some("Manual"));
        assert!(!defender.is_running);
    }

    #[test]
    fn macos_system_block() {
        let raw = json!({
            "system_info": {
                "cpu_brand": "Apple M2 Pro",
                "cpu_logical_cores": "12",
                "physical_memory": "34359738368",
                "cpu_type": "arm64e"
            },
            "uptime": {"total_seconds": "86400"},
            "os_version": {"name": "macOS", "version": "14.4.1", "build": "23E224"}
        });
        let info = extract_system(&normalize_record(&raw));
        assert_eq!(info.cpu_brand.as_deref(), Some("Apple M2 Pro"));
        assert_eq!(info.cpu_cores, 12);
        assert_eq!(info.memory_bytes, Some(34359738368));
        assert_eq!(info.architecture.as_deref(), Some("arm64e"));
        assert_eq!(info.os_build.as_deref(), Some("23E224"));
        assert_eq!(info.uptime_seconds, Some(86400));
        assert!(info.updates.is_empty());
        assert_eq!(info.service_count, 0);
    }

    #[test]
    fn unknown_status_codes_fall_back_to_text() {
        assert_eq!(enum_name(Some(&json!(42)), &SERVICE_STATUS, 1).as_deref(), Some("42"));
        assert_eq!(enum_name(Some(&json!(0)), &SERVICE_STATUS, 1).as_deref(), Some("0"));
        assert_eq!(enum_name(Some(&json!("Paused")), &SERVICE_STATUS, 1).as_deref(), Some("Paused"));
        assert_eq!(enum_name(None, &START_TYPES, 0), None);
    }
}
