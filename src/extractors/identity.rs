use serde_json::Value;

use super::{os_details, Scope};
use crate::config::{BtmdbHealth, IdentityInfo, PlatformSsoUser};
use crate::fields;
use crate::parsers::boolean::parse_bool_opt;
use crate::parsers::timestamp::format_date;
use crate::provenance::detect_platform;

static IDENTITY_BLOCKS: [&str; 3] = ["identity", "system_info", "device"];

pub fn extract_identity(record: &Value) -> IdentityInfo {
    let scope = Scope::new(record, &IDENTITY_BLOCKS);
    let platform = detect_platform(record);
    let (os_name, os_version, os_build) = os_details(&scope);

    let secure_token_users = secure_token_users(&scope);
    let platform_sso_users: Vec<PlatformSsoUser> = scope
        .get(&["platform_sso_users"])
        .map(platform_sso_users)
        .unwrap_or_default();

    IdentityInfo {
        hostname: scope.string(&["hostname", "host_name", "dns_host_name"]),
        computer_name: scope.string(&["computer_name", "local_hostname", "cs_name"]),
        serial_number: scope.string(&["hardware_serial", "serial_number", "serial"]),
        hardware_uuid: scope.string(&["hardware_uuid", "uuid", "system_uuid"]),
        model: scope.string(&["hardware_model", "model"]),
        manufacturer: scope.string(&["hardware_vendor", "manufacturer", "vendor"]),
        os_name,
        os_version,
        os_build,
        platform,
        is_mac: platform.is_mac(),
        console_user: scope.string(&["console_user", "logged_in_user", "last_logged_in_user", "username"]),
        last_login: scope.timestamp(&["last_login", "login_time"]),
        last_seen: scope.timestamp(&["last_seen", "last_seen_at", "last_check_in"]),
        btmdb_health: scope.object(&["btmdb_health"]).map(|block| btmdb_health(&block)),
        secure_token_user_count: secure_token_users.len(),
        secure_token_users,
        platform_sso_user_count: platform_sso_users.len(),
        platform_sso_users,
    }
}

fn btmdb_health(block: &Value) -> BtmdbHealth {
    BtmdbHealth {
        status: fields::string(block, &["status", "health"]),
        item_count: fields::count(block, &["item_count", "items", "entry_count"]),
        has_errors: fields::bool(block, &["has_errors", "corrupted", "errors"]),
        last_checked: fields::get_any(block, &["last_checked", "checked_at", "timestamp"])
            .map(|raw| format_date(Some(raw), false)),
    }
}

// rows with an explicit token flag are kept only when it is set
fn secure_token_users(scope: &Scope<'_>) -> Vec<String> {
    let Some(value) = scope.get(&["secure_token_users"]) else {
        return Vec::new();
    };
    let rows = fields::records_of(value);
    if rows.is_empty() {
        return fields::strings_of(value);
    }
    rows.iter()
        .filter(|row| {
            fields::get_any(row, &["secure_token", "has_secure_token", "enabled"])
                .map_or(true, |flag| parse_bool_opt(Some(flag)))
        })
        .filter_map(|row| fields::string(row, &["username", "user", "name"]))
        .collect()
}

fn platform_sso_users(value: &Value) -> Vec<PlatformSsoUser> {
    let rows = fields::records_of(value);
    if rows.is_empty() {
        return fields::strings_of(value)
            .into_iter()
            .map(|username| PlatformSsoUser {
                username: Some(username),
                ..Default::default()
            })
            .collect();
    }
    rows.iter()
        .map(|row| PlatformSsoUser {
            username: fields::string(row, &["username", "user", "login_name"]),
            registered: fields::bool(row, &["registered", "is_registered", "registration_completed"]),
            login_type: fields::string(row, &["login_type", "authentication_method"]),
        })
        .collect()
}
