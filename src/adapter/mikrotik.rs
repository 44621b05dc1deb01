// SPDX-License-Identifier: MIT

//! MikroTik RouterOS adapter
//!
//! Enforces bans as entries on a firewall address-list. Every operation opens
//! a fresh connection, logs in, does its work, and closes; RouterOS handles
//! short-lived API sessions cheaply and a stale pooled socket on a router
//! that just rebooted is worse than the extra handshake.

use std::collections::HashSet;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use ipnetwork::IpNetwork;
use secrecy::ExposeSecret;

use super::timefmt::seconds_to_router_time;
use super::types::{ActionResult, InfoResult, ListResult, SyncResult, TestResult};
use super::RouterAdapter;
use crate::config::RouterConfig;
use crate::error::Result;
use crate::policy::{is_whitelisted, parse_whitelist};
use crate::reconcile::compute_diff;
use crate::routeros::{
    parse_address_list, parse_router_info, AddressListEntry, RouterInfo, RouterOsConnection,
};
use crate::store::{ActionStatus, Backends, RuleAction, RuleActionLogEntry};

const ADDRESS_LIST_PRINT: &str = "/ip/firewall/address-list/print";
const ADDRESS_LIST_ADD: &str = "/ip/firewall/address-list/add";
const ADDRESS_LIST_REMOVE: &str = "/ip/firewall/address-list/remove";

/// Comment attached to rules created by reconciliation
const SYNC_COMMENT: &str = "Sync from CatWAF";

pub struct MikroTikAdapter {
    config: RouterConfig,
    whitelist: Vec<IpNetwork>,
    backends: Backends,
}

impl MikroTikAdapter {
    #[must_use]
    pub fn new(config: RouterConfig, backends: Backends) -> Self {
        let whitelist = parse_whitelist(&config.whitelist);
        tracing::debug!(
            "Adapter for router '{}' ({}): list={}, whitelist={} network(s), dry_run={}",
            config.name,
            config.endpoint(),
            config.address_list,
            whitelist.len(),
            config.dry_run
        );
        Self {
            config,
            whitelist,
            backends,
        }
    }

    /// Connects and authenticates; the decrypted password only lives for the
    /// duration of the login exchange
    async fn open_session(&self) -> Result<RouterOsConnection> {
        let mut conn = RouterOsConnection::connect(&self.config).await?;
        let password = self.backends.credentials.decrypt(&self.config.password)?;
        conn.login(&self.config.username, password.expose_secret())
            .await?;
        Ok(conn)
    }

    async fn audit(&self, entry: RuleActionLogEntry) {
        if let Err(e) = self.backends.audit.append(entry).await {
            tracing::warn!(
                "Failed to record rule action for router {}: {}",
                self.config.id,
                e
            );
        }
    }

    fn comment_for(&self, comment: &str) -> String {
        format!("{}: {}", self.config.comment_prefix, comment)
    }

    /// Shared add path; `triggered_by` distinguishes API calls from sync
    async fn add_rule(
        &self,
        ip: &str,
        duration_secs: Option<u64>,
        comment: &str,
        triggered_by: &str,
    ) -> ActionResult {
        let started = Instant::now();

        if is_whitelisted(ip, &self.whitelist) {
            let message = format!("{ip} is whitelisted and will not be blocked");
            tracing::debug!("{}: {}", self.config.name, message);
            self.audit(RuleActionLogEntry {
                router_id: self.config.id,
                action: RuleAction::Add,
                ip: Some(ip.to_string()),
                status: ActionStatus::Failed,
                error: Some(message.clone()),
                duration_ms: started.elapsed().as_millis() as u64,
                rule_id: None,
                triggered_by: triggered_by.to_string(),
            })
            .await;
            return ActionResult::fail(message);
        }

        if self.config.dry_run {
            let message = format!("DRY RUN: would block {ip} on {}", self.config.name);
            tracing::info!("{}", message);
            self.audit(RuleActionLogEntry {
                router_id: self.config.id,
                action: RuleAction::Add,
                ip: Some(ip.to_string()),
                status: ActionStatus::Success,
                error: None,
                duration_ms: started.elapsed().as_millis() as u64,
                rule_id: None,
                triggered_by: triggered_by.to_string(),
            })
            .await;
            return ActionResult::ok(None, message);
        }

        match self.add_rule_on_router(ip, duration_secs, comment).await {
            Ok((rule_id, existed)) => {
                if let Some(id) = &rule_id {
                    let expires_at = duration_secs
                        .map(|secs| Utc::now() + chrono::Duration::seconds(secs as i64));
                    if let Err(e) = self
                        .backends
                        .rule_cache
                        .upsert(self.config.id, ip, id, expires_at)
                        .await
                    {
                        tracing::warn!("Failed to cache rule id for {}: {}", ip, e);
                    }
                }
                let message = if existed {
                    format!("{ip} is already blocked on {}", self.config.name)
                } else {
                    format!("Blocked {ip} on {}", self.config.name)
                };
                tracing::info!("{}", message);
                self.audit(RuleActionLogEntry {
                    router_id: self.config.id,
                    action: RuleAction::Add,
                    ip: Some(ip.to_string()),
                    status: ActionStatus::Success,
                    error: None,
                    duration_ms: started.elapsed().as_millis() as u64,
                    rule_id: rule_id.clone(),
                    triggered_by: triggered_by.to_string(),
                })
                .await;
                ActionResult::ok(rule_id, message)
            }
            Err(e) => {
                let message = e.to_string();
                tracing::error!(
                    "Failed to block {} on {}: {}",
                    ip,
                    self.config.name,
                    message
                );
                self.audit(RuleActionLogEntry {
                    router_id: self.config.id,
                    action: RuleAction::Add,
                    ip: Some(ip.to_string()),
                    status: ActionStatus::Failed,
                    error: Some(message.clone()),
                    duration_ms: started.elapsed().as_millis() as u64,
                    rule_id: None,
                    triggered_by: triggered_by.to_string(),
                })
                .await;
                ActionResult::fail(message)
            }
        }
    }

    /// Returns the rule id and whether the entry already existed
    async fn add_rule_on_router(
        &self,
        ip: &str,
        duration_secs: Option<u64>,
        comment: &str,
    ) -> Result<(Option<String>, bool)> {
        let mut conn = self.open_session().await?;

        let existing = conn
            .execute(
                ADDRESS_LIST_PRINT,
                &[("?list", &self.config.address_list), ("?address", ip)],
            )
            .await?;
        if let Some(row) = existing.first() {
            let rule_id = row.get(".id").cloned();
            conn.close().await;
            return Ok((rule_id, true));
        }

        let rendered = self.comment_for(comment);
        let timeout = duration_secs.map(seconds_to_router_time);
        let mut params: Vec<(&str, &str)> = vec![
            ("list", &self.config.address_list),
            ("address", ip),
            ("comment", &rendered),
        ];
        if let Some(t) = &timeout {
            params.push(("timeout", t));
        }

        let rows = conn.execute(ADDRESS_LIST_ADD, &params).await?;
        conn.close().await;

        let rule_id = rows.iter().find_map(|r| r.get("ret").cloned());
        Ok((rule_id, false))
    }

    /// Shared remove path
    async fn remove_rule(&self, ip: &str, triggered_by: &str) -> ActionResult {
        let started = Instant::now();

        if self.config.dry_run {
            let message = format!("DRY RUN: would unblock {ip} on {}", self.config.name);
            tracing::info!("{}", message);
            self.audit(RuleActionLogEntry {
                router_id: self.config.id,
                action: RuleAction::Remove,
                ip: Some(ip.to_string()),
                status: ActionStatus::Success,
                error: None,
                duration_ms: started.elapsed().as_millis() as u64,
                rule_id: None,
                triggered_by: triggered_by.to_string(),
            })
            .await;
            return ActionResult::ok(None, message);
        }

        match self.remove_rule_on_router(ip).await {
            Ok(count) => {
                if let Err(e) = self.backends.rule_cache.delete(self.config.id, ip).await {
                    tracing::warn!("Failed to drop cached rule id for {}: {}", ip, e);
                }
                let message = if count == 0 {
                    format!("{ip} was not blocked on {}", self.config.name)
                } else {
                    format!("Unblocked {ip} on {}", self.config.name)
                };
                tracing::info!("{}", message);
                self.audit(RuleActionLogEntry {
                    router_id: self.config.id,
                    action: RuleAction::Remove,
                    ip: Some(ip.to_string()),
                    status: ActionStatus::Success,
                    error: None,
                    duration_ms: started.elapsed().as_millis() as u64,
                    rule_id: None,
                    triggered_by: triggered_by.to_string(),
                })
                .await;
                ActionResult::ok(None, message)
            }
            Err(e) => {
                let message = e.to_string();
                tracing::error!(
                    "Failed to unblock {} on {}: {}",
                    ip,
                    self.config.name,
                    message
                );
                self.audit(RuleActionLogEntry {
                    router_id: self.config.id,
                    action: RuleAction::Remove,
                    ip: Some(ip.to_string()),
                    status: ActionStatus::Failed,
                    error: Some(message.clone()),
                    duration_ms: started.elapsed().as_millis() as u64,
                    rule_id: None,
                    triggered_by: triggered_by.to_string(),
                })
                .await;
                ActionResult::fail(message)
            }
        }
    }

    /// Removes every matching entry; returns how many were removed
    async fn remove_rule_on_router(&self, ip: &str) -> Result<usize> {
        let mut conn = self.open_session().await?;

        let rows = conn
            .execute(
                ADDRESS_LIST_PRINT,
                &[("?list", &self.config.address_list), ("?address", ip)],
            )
            .await?;
        let ids: Vec<String> = rows.iter().filter_map(|r| r.get(".id").cloned()).collect();

        for id in &ids {
            conn.execute(ADDRESS_LIST_REMOVE, &[(".id", id)]).await?;
        }
        conn.close().await;
        Ok(ids.len())
    }

    async fn fetch_rules(&self) -> Result<Vec<AddressListEntry>> {
        let mut conn = self.open_session().await?;
        let rows = conn
            .execute(ADDRESS_LIST_PRINT, &[("?list", &self.config.address_list)])
            .await?;
        conn.close().await;
        Ok(parse_address_list(&rows))
    }

    async fn probe_identity(&self) -> Result<String> {
        let mut conn = self.open_session().await?;
        let rows = conn.execute("/system/identity/print", &[]).await?;
        conn.close().await;
        Ok(rows
            .first()
            .and_then(|r| r.get("name"))
            .cloned()
            .unwrap_or_else(|| "unknown".to_string()))
    }

    async fn fetch_info(&self) -> Result<RouterInfo> {
        let mut conn = self.open_session().await?;
        let identity = conn.execute("/system/identity/print", &[]).await?;
        let resource = conn.execute("/system/resource/print", &[]).await?;
        // CHR instances have no routerboard and trap on this command
        let routerboard = conn.execute("/system/routerboard/print", &[]).await.ok();
        conn.close().await;
        Ok(parse_router_info(
            &identity,
            &resource,
            routerboard.as_deref(),
        ))
    }
}

#[async_trait]
impl RouterAdapter for MikroTikAdapter {
    async fn test_connection(&self) -> TestResult {
        let started = Instant::now();
        match self.probe_identity().await {
            Ok(identity) => {
                let latency_ms = started.elapsed().as_millis() as u64;
                tracing::debug!(
                    "Connection test for '{}' succeeded in {}ms (identity: {})",
                    self.config.name,
                    latency_ms,
                    identity
                );
                TestResult {
                    success: true,
                    message: format!("Connected to {identity}"),
                    latency_ms,
                    identity: Some(identity),
                }
            }
            Err(e) => {
                let latency_ms = started.elapsed().as_millis() as u64;
                tracing::warn!("Connection test for '{}' failed: {}", self.config.name, e);
                TestResult {
                    success: false,
                    message: e.to_string(),
                    latency_ms,
                    identity: None,
                }
            }
        }
    }

    async fn add_drop_rule(
        &self,
        ip: &str,
        duration_secs: Option<u64>,
        comment: &str,
    ) -> ActionResult {
        self.add_rule(ip, duration_secs, comment, "api").await
    }

    async fn remove_drop_rule(&self, ip: &str) -> ActionResult {
        self.remove_rule(ip, "api").await
    }

    async fn list_drop_rules(&self) -> ListResult {
        match self.fetch_rules().await {
            Ok(rules) => ListResult {
                message: format!(
                    "{} rule(s) in {}",
                    rules.len(),
                    self.config.address_list
                ),
                success: true,
                rules,
            },
            Err(e) => {
                tracing::warn!("Failed to list rules on '{}': {}", self.config.name, e);
                ListResult {
                    success: false,
                    rules: Vec::new(),
                    message: e.to_string(),
                }
            }
        }
    }

    async fn sync_rules(&self, should_be_blocked: &HashSet<String>) -> SyncResult {
        let started = Instant::now();

        let current: HashSet<String> = match self.fetch_rules().await {
            Ok(rules) => rules.into_iter().map(|r| r.ip).collect(),
            Err(e) => {
                let message = format!("Failed to list current rules: {e}");
                tracing::error!("Sync aborted for '{}': {}", self.config.name, message);
                self.audit(RuleActionLogEntry {
                    router_id: self.config.id,
                    action: RuleAction::BulkSync,
                    ip: None,
                    status: ActionStatus::Failed,
                    error: Some(message.clone()),
                    duration_ms: started.elapsed().as_millis() as u64,
                    rule_id: None,
                    triggered_by: "sync".to_string(),
                })
                .await;
                return SyncResult {
                    success: false,
                    added: 0,
                    removed: 0,
                    errors: vec![message.clone()],
                    message,
                };
            }
        };

        let diff = compute_diff(should_be_blocked, &current, &self.whitelist);
        tracing::debug!(
            "Sync plan for '{}': {} to add, {} to remove",
            self.config.name,
            diff.to_add.len(),
            diff.to_remove.len()
        );

        let mut added = 0u32;
        let mut removed = 0u32;
        let mut errors = Vec::new();

        for ip in &diff.to_add {
            let result = self.add_rule(ip, None, SYNC_COMMENT, "sync").await;
            if result.success {
                added += 1;
            } else {
                errors.push(format!("Add {ip}: {}", result.message));
            }
        }
        for ip in &diff.to_remove {
            let result = self.remove_rule(ip, "sync").await;
            if result.success {
                removed += 1;
            } else {
                errors.push(format!("Remove {ip}: {}", result.message));
            }
        }

        let success = errors.is_empty();
        let message = format!("Sync complete: {added} added, {removed} removed");
        tracing::info!("{}: {}", self.config.name, message);
        self.audit(RuleActionLogEntry {
            router_id: self.config.id,
            action: RuleAction::BulkSync,
            ip: None,
            status: if success {
                ActionStatus::Success
            } else {
                ActionStatus::Failed
            },
            error: if errors.is_empty() {
                None
            } else {
                Some(errors.join("; "))
            },
            duration_ms: started.elapsed().as_millis() as u64,
            rule_id: None,
            triggered_by: "sync".to_string(),
        })
        .await;

        SyncResult {
            success,
            added,
            removed,
            errors,
            message,
        }
    }

    async fn get_info(&self) -> InfoResult {
        match self.fetch_info().await {
            Ok(info) => InfoResult {
                success: true,
                info: Some(info),
                error: None,
            },
            Err(e) => {
                tracing::warn!("Failed to read info from '{}': {}", self.config.name, e);
                InfoResult {
                    success: false,
                    info: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}
