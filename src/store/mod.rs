// SPDX-License-Identifier: MIT

//! Collaborator ports
//!
//! The relational ban/config store, the audit log, the rule cache, and
//! credential decryption all live outside this crate. These traits are the
//! seams the embedding application implements; `store::memory` provides
//! in-memory implementations for tests and small deployments.

pub mod memory;

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::Serialize;

use crate::config::RouterConfig;
use crate::error::Result;

/// What a rule-action audit row records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    Add,
    Remove,
    BulkSync,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Success,
    Failed,
}

/// One audit row per discrete router operation
///
/// Written by the adapter for every add/remove branch taken (including
/// dry-run and policy rejections) and once per bulk sync. Never read back
/// by this crate.
#[derive(Debug, Clone, Serialize)]
pub struct RuleActionLogEntry {
    pub router_id: i64,
    pub action: RuleAction,
    /// None for bulk operations
    pub ip: Option<String>,
    pub status: ActionStatus,
    pub error: Option<String>,
    pub duration_ms: u64,
    pub rule_id: Option<String>,
    /// What initiated the operation (`api`, `sync`)
    pub triggered_by: String,
}

/// Authoritative ban source: the set of IPs that should currently be blocked
#[async_trait]
pub trait BanSource: Send + Sync {
    /// Returns not-expired bans only
    async fn get_active_bans(&self) -> Result<HashSet<String>>;
}

/// Router configuration records
#[async_trait]
pub trait RouterConfigStore: Send + Sync {
    async fn get_router_config(&self, id: i64) -> Result<Option<RouterConfig>>;

    async fn list_enabled(&self) -> Result<Vec<RouterConfig>>;

    /// Persists the outcome of a connection test back onto the record
    async fn update_test_status(
        &self,
        id: i64,
        success: bool,
        error: Option<String>,
        tested_at: DateTime<Utc>,
    ) -> Result<()>;
}

/// Decrypts the stored password blob
///
/// The key lives outside this crate; the plaintext comes back wrapped in
/// `SecretString` and is only exposed for the duration of one login.
pub trait CredentialDecryptor: Send + Sync {
    fn decrypt(&self, encrypted: &str) -> Result<SecretString>;
}

/// Audit log sink
#[async_trait]
pub trait RuleActionLog: Send + Sync {
    async fn append(&self, entry: RuleActionLogEntry) -> Result<()>;
}

/// Best-effort cache mapping (router, ip) to the router-native rule id
///
/// Never consulted for reconciliation correctness; it only accelerates
/// lookups and debugging.
#[async_trait]
pub trait RuleCacheStore: Send + Sync {
    async fn upsert(
        &self,
        router_id: i64,
        ip: &str,
        rule_id: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<()>;

    async fn delete(&self, router_id: i64, ip: &str) -> Result<()>;
}

/// Bundle of collaborator handles threaded through adapters and the manager
#[derive(Clone)]
pub struct Backends {
    pub bans: Arc<dyn BanSource>,
    pub routers: Arc<dyn RouterConfigStore>,
    pub credentials: Arc<dyn CredentialDecryptor>,
    pub audit: Arc<dyn RuleActionLog>,
    pub rule_cache: Arc<dyn RuleCacheStore>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_entry_serializes_to_json() {
        let entry = RuleActionLogEntry {
            router_id: 3,
            action: RuleAction::BulkSync,
            ip: None,
            status: ActionStatus::Failed,
            error: Some("Add 8.8.8.8: timeout".to_string()),
            duration_ms: 412,
            rule_id: None,
            triggered_by: "sync".to_string(),
        };

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["action"], "bulk_sync");
        assert_eq!(json["status"], "failed");
        assert_eq!(json["ip"], serde_json::Value::Null);
        assert_eq!(json["duration_ms"], 412);
    }
}
