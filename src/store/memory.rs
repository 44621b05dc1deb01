// SPDX-License-Identifier: MIT

//! In-memory implementations of the collaborator ports
//!
//! Used by the integration tests and by embedders that keep authoritative
//! state elsewhere (or nowhere, for the audit log in dev setups).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use tokio::sync::Mutex;

use super::{
    ActionStatus, BanSource, CredentialDecryptor, RouterConfigStore, RuleActionLog,
    RuleActionLogEntry, RuleCacheStore,
};
use crate::config::RouterConfig;
use crate::error::Result;

/// Ban source backed by a mutable in-memory set
#[derive(Default)]
pub struct MemoryBanSource {
    bans: Mutex<HashSet<String>>,
}

impl MemoryBanSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_bans<I: IntoIterator<Item = String>>(&self, ips: I) {
        let mut bans = self.bans.lock().await;
        *bans = ips.into_iter().collect();
    }

    pub async fn ban(&self, ip: &str) {
        self.bans.lock().await.insert(ip.to_string());
    }

    pub async fn unban(&self, ip: &str) {
        self.bans.lock().await.remove(ip);
    }
}

#[async_trait]
impl BanSource for MemoryBanSource {
    async fn get_active_bans(&self) -> Result<HashSet<String>> {
        Ok(self.bans.lock().await.clone())
    }
}

/// Outcome of the last connection test, as persisted by the manager
#[derive(Debug, Clone)]
pub struct TestStatus {
    pub success: bool,
    pub error: Option<String>,
    pub tested_at: DateTime<Utc>,
}

/// Router config store backed by a map
#[derive(Default)]
pub struct MemoryRouterConfigStore {
    routers: Mutex<HashMap<i64, RouterConfig>>,
    test_status: Mutex<HashMap<i64, TestStatus>>,
}

impl MemoryRouterConfigStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, config: RouterConfig) {
        self.routers.lock().await.insert(config.id, config);
    }

    pub async fn last_test_status(&self, id: i64) -> Option<TestStatus> {
        self.test_status.lock().await.get(&id).cloned()
    }
}

#[async_trait]
impl RouterConfigStore for MemoryRouterConfigStore {
    async fn get_router_config(&self, id: i64) -> Result<Option<RouterConfig>> {
        Ok(self.routers.lock().await.get(&id).cloned())
    }

    async fn list_enabled(&self) -> Result<Vec<RouterConfig>> {
        let mut enabled: Vec<RouterConfig> = self
            .routers
            .lock()
            .await
            .values()
            .filter(|r| r.enabled)
            .cloned()
            .collect();
        enabled.sort_by_key(|r| r.id);
        Ok(enabled)
    }

    async fn update_test_status(
        &self,
        id: i64,
        success: bool,
        error: Option<String>,
        tested_at: DateTime<Utc>,
    ) -> Result<()> {
        self.test_status.lock().await.insert(
            id,
            TestStatus {
                success,
                error,
                tested_at,
            },
        );
        Ok(())
    }
}

/// Pass-through decryptor for configs that store plaintext passwords
/// (development and test setups)
#[derive(Default)]
pub struct PlainCredentials;

impl PlainCredentials {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl CredentialDecryptor for PlainCredentials {
    fn decrypt(&self, encrypted: &str) -> Result<SecretString> {
        Ok(SecretString::from(encrypted.to_string()))
    }
}

/// Audit sink that keeps entries in memory (and mirrors them to tracing)
#[derive(Default)]
pub struct MemoryRuleActionLog {
    entries: Mutex<Vec<RuleActionLogEntry>>,
}

impl MemoryRuleActionLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entries(&self) -> Vec<RuleActionLogEntry> {
        self.entries.lock().await.clone()
    }

    pub async fn failed_entries(&self) -> Vec<RuleActionLogEntry> {
        self.entries
            .lock()
            .await
            .iter()
            .filter(|e| e.status == ActionStatus::Failed)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl RuleActionLog for MemoryRuleActionLog {
    async fn append(&self, entry: RuleActionLogEntry) -> Result<()> {
        tracing::debug!(
            "Rule action: router={} action={:?} ip={:?} status={:?} ({}ms)",
            entry.router_id,
            entry.action,
            entry.ip,
            entry.status,
            entry.duration_ms
        );
        self.entries.lock().await.push(entry);
        Ok(())
    }
}

/// Rule-id cache backed by a map
#[derive(Default)]
pub struct MemoryRuleCache {
    rules: Mutex<HashMap<(i64, String), (String, Option<DateTime<Utc>>)>>,
}

impl MemoryRuleCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, router_id: i64, ip: &str) -> Option<(String, Option<DateTime<Utc>>)> {
        self.rules
            .lock()
            .await
            .get(&(router_id, ip.to_string()))
            .cloned()
    }

    pub async fn len(&self) -> usize {
        self.rules.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rules.lock().await.is_empty()
    }
}

#[async_trait]
impl RuleCacheStore for MemoryRuleCache {
    async fn upsert(
        &self,
        router_id: i64,
        ip: &str,
        rule_id: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.rules.lock().await.insert(
            (router_id, ip.to_string()),
            (rule_id.to_string(), expires_at),
        );
        Ok(())
    }

    async fn delete(&self, router_id: i64, ip: &str) -> Result<()> {
        self.rules.lock().await.remove(&(router_id, ip.to_string()));
        Ok(())
    }
}

/// Builds a [`super::Backends`] bundle entirely from memory stores
#[must_use]
pub fn memory_backends() -> (
    super::Backends,
    Arc<MemoryBanSource>,
    Arc<MemoryRouterConfigStore>,
    Arc<MemoryRuleActionLog>,
    Arc<MemoryRuleCache>,
) {
    let bans = Arc::new(MemoryBanSource::new());
    let routers = Arc::new(MemoryRouterConfigStore::new());
    let audit = Arc::new(MemoryRuleActionLog::new());
    let rule_cache = Arc::new(MemoryRuleCache::new());
    let backends = super::Backends {
        bans: bans.clone(),
        routers: routers.clone(),
        credentials: Arc::new(PlainCredentials::new()),
        audit: audit.clone(),
        rule_cache: rule_cache.clone(),
    };
    (backends, bans, routers, audit, rule_cache)
}
