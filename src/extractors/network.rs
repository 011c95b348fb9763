use serde_json::Value;

use super::Scope;
use crate::config::{NetworkInfo, NetworkInterface};
use crate::fields;

static NETWORK_BLOCKS: [&str; 2] = ["network", "network_info"];
static UP_STATES: [&str; 4] = ["up", "connected", "active", "running"];

static ADDRESS_FIELDS: [&str; 8] = [
    "IPAddress",
    "ipv4",
    "ipv4_address",
    "ipv4_addresses",
    "ip_address",
    "address",
    "addresses",
    "ip_addresses",
];
static IPV6_FIELDS: [&str; 2] = ["ipv6", "ipv6_addresses"];

pub fn extract_network(record: &Value) -> NetworkInfo {
    let scope = Scope::new(record, &NETWORK_BLOCKS);

    let mut interfaces: Vec<NetworkInterface> = scope
        .records(&["interfaces", "network_interfaces", "interface_details", "adapters"])
        .iter()
        .map(interface)
        .collect();
    merge_address_rows(&mut interfaces, &scope.records(&["interface_addresses"]));

    let primary_ipv4 = scope
        .string(&["primary_ip", "primary_ipv4"])
        .or_else(|| {
            interfaces
                .iter()
                .flat_map(|iface| iface.ipv4.iter())
                .find(|addr| is_routable_v4(addr))
                .cloned()
        });

    let firewall_enabled = scope.bool(&["firewall_enabled"])
        || scope.object(&["firewall", "alf"]).is_some_and(|fw| {
            fields::bool(&fw, &["enabled"]) || fields::count(&fw, &["global_state"]) > 0
        });

    NetworkInfo {
        interface_count: interfaces.len(),
        interfaces,
        primary_ipv4,
        dns_servers: scope.string_list(&["dns_servers", "dns_server_addresses", "nameservers"]),
        wifi_ssid: scope.string(&["wifi_ssid", "ssid"]).or_else(|| {
            scope
                .object(&["wifi_status", "wifi"])
                .and_then(|wifi| fields::string(&wifi, &["ssid", "network_name"]))
        }),
        firewall_enabled,
    }
}

fn interface(row: &Value) -> NetworkInterface {
    let mut iface = NetworkInterface {
        name: fields::string(row, &["interface", "name", "interface_alias"]),
        mac: fields::string(row, &["mac", "mac_address"]),
        is_up: fields::bool(row, &["is_up", "up", "enabled"])
            || fields::string(row, &["status", "state", "oper_status"])
                .is_some_and(|s| UP_STATES.contains(&s.to_lowercase().as_str())),
        kind: fields::string(row, &["type", "interface_type", "media_type"]),
        ..Default::default()
    };
    for name in ADDRESS_FIELDS.iter().chain(IPV6_FIELDS.iter()) {
        if let Some(value) = fields::get(row, name) {
            for addr in fields::strings_of(value) {
                push_address(&mut iface, &addr);
            }
        }
    }
    iface
}

// osquery interface_addresses rows
fn merge_address_rows(interfaces: &mut Vec<NetworkInterface>, rows: &[Value]) {
    for row in rows {
        let Some(addr) = fields::string(row, &["address", "ip_address"]) else {
            continue;
        };
        let name = fields::string(row, &["interface", "name"]);
        let idx = match interfaces.iter().position(|iface| iface.name == name) {
            Some(idx) => idx,
            None => {
                interfaces.push(NetworkInterface {
                    name,
                    ..Default::default()
                });
                interfaces.len() - 1
            }
        };
        push_address(&mut interfaces[idx], &addr);
    }
}

fn push_address(iface: &mut NetworkInterface, raw: &str) {
    // drop prefix length and IPv6 zone
    let addr = raw.split('/').next().unwrap_or(raw);
    let addr = addr.split('%').next().unwrap_or(addr).trim();
    if addr.is_empty() {
        return;
    }
    let list = if addr.contains(':') {
        &mut iface.ipv6
    } else {
        &mut iface.ipv4
    };
    if !list.iter().any(|known| known == addr) {
        list.push(addr.to_string());
    }
}

fn is_routable_v4(addr: &str) -> bool {
    !addr.starts_with("127.") && !addr.starts_with("169.254.") && addr != "0.0.0.0"
}
