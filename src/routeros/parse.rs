// SPDX-License-Identifier: MIT

//! RouterOS response parsing helpers

use super::connection::Row;
use super::types::{AddressListEntry, RouterInfo};

/// Normalizes `/ip/firewall/address-list/print` rows
///
/// Rows without an `address` attribute are skipped; everything else gets
/// sensible defaults so a sparse reply never fails the caller.
pub(crate) fn parse_address_list(rows: &[Row]) -> Vec<AddressListEntry> {
    let mut out = Vec::new();
    for row in rows {
        if let Some(address) = row.get("address") {
            out.push(AddressListEntry {
                id: row.get(".id").cloned().unwrap_or_default(),
                ip: address.clone(),
                list: row.get("list").cloned().unwrap_or_default(),
                comment: row.get("comment").cloned().unwrap_or_default(),
                timeout: row.get("timeout").cloned(),
                creation_time: row.get("creation-time").cloned(),
                dynamic: row.get("dynamic").is_some_and(|v| v == "true"),
            });
        }
    }
    out
}

/// Builds a `RouterInfo` snapshot from identity/resource/routerboard rows
///
/// The routerboard rows are optional (CHR instances trap on the command).
pub(crate) fn parse_router_info(
    identity: &[Row],
    resource: &[Row],
    routerboard: Option<&[Row]>,
) -> RouterInfo {
    let empty = Row::new();
    let identity_row = identity.first().unwrap_or(&empty);
    let resource_row = resource
        .iter()
        .find(|r| r.contains_key("version"))
        .unwrap_or(&empty);
    let board_row = routerboard.and_then(|rows| rows.first());

    RouterInfo {
        identity: identity_row
            .get("name")
            .cloned()
            .unwrap_or_else(|| "unknown".to_string()),
        version: resource_row
            .get("version")
            .cloned()
            .unwrap_or_else(|| "unknown".to_string()),
        board_name: resource_row
            .get("board-name")
            .cloned()
            .unwrap_or_else(|| "unknown".to_string()),
        model: board_row.and_then(|r| r.get("model").cloned()),
        serial_number: board_row.and_then(|r| r.get("serial-number").cloned()),
        uptime: resource_row
            .get("uptime")
            .cloned()
            .unwrap_or_else(|| "0s".to_string()),
        cpu_load: resource_row
            .get("cpu-load")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0),
        free_memory: resource_row
            .get("free-memory")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0),
        total_memory: resource_row
            .get("total-memory")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_parse_address_list_complete() {
        let rows = vec![row(&[
            (".id", "*1A"),
            ("address", "8.8.8.8"),
            ("list", "catwaf-banned"),
            ("comment", "catwaf: bot"),
            ("timeout", "23h59m"),
            ("creation-time", "jan/01/2026 00:00:00"),
            ("dynamic", "true"),
        ])];

        let entries = parse_address_list(&rows);

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, "*1A");
        assert_eq!(entries[0].ip, "8.8.8.8");
        assert_eq!(entries[0].list, "catwaf-banned");
        assert_eq!(entries[0].comment, "catwaf: bot");
        assert_eq!(entries[0].timeout.as_deref(), Some("23h59m"));
        assert!(entries[0].dynamic);
    }

    #[test]
    fn test_parse_address_list_missing_values() {
        let rows = vec![row(&[("address", "1.2.3.4")])];

        let entries = parse_address_list(&rows);

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].ip, "1.2.3.4");
        assert_eq!(entries[0].id, "");
        assert_eq!(entries[0].comment, "");
        assert!(entries[0].timeout.is_none());
        assert!(!entries[0].dynamic);
    }

    #[test]
    fn test_parse_address_list_skips_rows_without_address() {
        let rows = vec![row(&[(".id", "*1")]), row(&[("address", "5.6.7.8")])];
        let entries = parse_address_list(&rows);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].ip, "5.6.7.8");
    }

    #[test]
    fn test_parse_address_list_empty() {
        assert!(parse_address_list(&[]).is_empty());
    }

    #[test]
    fn test_parse_router_info_complete() {
        let identity = vec![row(&[("name", "edge-1")])];
        let resource = vec![row(&[
            ("version", "7.15.3"),
            ("board-name", "RB5009"),
            ("uptime", "1w2d"),
            ("cpu-load", "7"),
            ("free-memory", "524288000"),
            ("total-memory", "1073741824"),
        ])];
        let board = vec![row(&[("model", "RB5009UG+S+"), ("serial-number", "HC123")])];

        let info = parse_router_info(&identity, &resource, Some(&board));

        assert_eq!(info.identity, "edge-1");
        assert_eq!(info.version, "7.15.3");
        assert_eq!(info.board_name, "RB5009");
        assert_eq!(info.model.as_deref(), Some("RB5009UG+S+"));
        assert_eq!(info.serial_number.as_deref(), Some("HC123"));
        assert_eq!(info.cpu_load, 7);
        assert_eq!(info.total_memory, 1_073_741_824);
    }

    #[test]
    fn test_parse_router_info_defaults() {
        let info = parse_router_info(&[], &[], None);
        assert_eq!(info.identity, "unknown");
        assert_eq!(info.version, "unknown");
        assert_eq!(info.uptime, "0s");
        assert_eq!(info.cpu_load, 0);
        assert!(info.model.is_none());
    }
}
