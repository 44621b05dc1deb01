// SPDX-License-Identifier: MIT

//! Type definitions for router-side state

use serde::Serialize;

/// One address-list entry as reported by the router
///
/// `id` is the router-native rule identifier (`.id`, e.g. `*1A`), opaque to
/// everything except a subsequent remove command.
#[derive(Debug, Clone, Serialize)]
pub struct AddressListEntry {
    pub id: String,
    pub ip: String,
    pub list: String,
    pub comment: String,
    /// Relative expiry in router-native form (`1d2h3m4s`), if set
    pub timeout: Option<String>,
    pub creation_time: Option<String>,
    /// Entries added by the router itself (timeout-managed) are dynamic
    pub dynamic: bool,
}

/// Identity and resource snapshot of a router
#[derive(Debug, Clone, Serialize)]
pub struct RouterInfo {
    pub identity: String,
    pub version: String,
    pub board_name: String,
    pub model: Option<String>,
    pub serial_number: Option<String>,
    pub uptime: String,
    pub cpu_load: u64,
    pub free_memory: u64,
    pub total_memory: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_list_entry_creation() {
        let entry = AddressListEntry {
            id: "*1A".to_string(),
            ip: "8.8.8.8".to_string(),
            list: "catwaf-banned".to_string(),
            comment: "catwaf: brute force".to_string(),
            timeout: Some("1h".to_string()),
            creation_time: Some("jan/01/2026 00:00:00".to_string()),
            dynamic: false,
        };

        assert_eq!(entry.id, "*1A");
        assert_eq!(entry.ip, "8.8.8.8");
        assert!(!entry.dynamic);
    }

    #[test]
    fn test_entry_serializes_to_json() {
        let entry = AddressListEntry {
            id: "*2".to_string(),
            ip: "1.1.1.1".to_string(),
            list: "catwaf-banned".to_string(),
            comment: String::new(),
            timeout: None,
            creation_time: None,
            dynamic: true,
        };

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["ip"], "1.1.1.1");
        assert_eq!(json["timeout"], serde_json::Value::Null);
        assert_eq!(json["dynamic"], true);
    }
}
