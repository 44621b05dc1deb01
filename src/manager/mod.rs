// SPDX-License-Identifier: MIT

//! Router manager
//!
//! Owns the adapter registry and fans operations out across every enabled
//! router. Per-router outcomes are collected into a map keyed by router id;
//! one unreachable device never fails the batch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::{stream, StreamExt};
use tokio::sync::Mutex;
use tokio::time::timeout;

use crate::adapter::{create_adapter, ActionResult, RouterAdapter, SyncResult, TestResult};
use crate::error::Result;
use crate::store::Backends;

/// Routers touched concurrently during a fan-out
const FANOUT_CONCURRENCY: usize = 4;

/// Upper bound on one adapter operation during a fan-out
///
/// Generous on purpose: a sync pass against a large diff runs many commands
/// over one connection. The connection-level timeouts catch dead routers
/// long before this fires.
const OPERATION_TIMEOUT: Duration = Duration::from_secs(60);

pub struct RouterManager {
    backends: Backends,
    /// Cached adapters by router id; invalidated on config change
    adapters: Mutex<HashMap<i64, Arc<dyn RouterAdapter>>>,
}

impl RouterManager {
    #[must_use]
    pub fn new(backends: Backends) -> Self {
        Self {
            backends,
            adapters: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the adapter for a router, building and caching it on demand
    ///
    /// None when the router does not exist, is disabled, or its record fails
    /// validation. Store errors also come back as None: callers treat an
    /// unavailable router and an unknown router the same way.
    pub async fn get_adapter(&self, id: i64) -> Option<Arc<dyn RouterAdapter>> {
        if let Some(adapter) = self.adapters.lock().await.get(&id) {
            return Some(adapter.clone());
        }

        let config = match self.backends.routers.get_router_config(id).await {
            Ok(Some(config)) => config,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Failed to load router {}: {}", id, e);
                return None;
            }
        };
        if !config.enabled {
            tracing::debug!("Router {} ('{}') is disabled", id, config.name);
            return None;
        }
        if let Err(e) = config.validate() {
            tracing::error!("Invalid configuration for router {}: {}", id, e);
            return None;
        }

        let adapter = create_adapter(config, self.backends.clone());
        self.adapters.lock().await.insert(id, adapter.clone());
        Some(adapter)
    }

    /// Drops the cached adapter so the next use re-reads the config
    pub async fn invalidate(&self, id: i64) {
        self.adapters.lock().await.remove(&id);
    }

    /// Adapters for every enabled router, in id order
    async fn enabled_adapters(&self) -> Result<Vec<(i64, Arc<dyn RouterAdapter>)>> {
        let configs = self.backends.routers.list_enabled().await?;
        let mut out = Vec::with_capacity(configs.len());
        for config in configs {
            let id = config.id;
            if let Some(adapter) = self.get_adapter(id).await {
                out.push((id, adapter));
            }
        }
        Ok(out)
    }

    /// Blocks `ip` on every enabled router
    pub async fn add_drop_rule_to_all(
        &self,
        ip: &str,
        duration_secs: Option<u64>,
        comment: &str,
    ) -> Result<HashMap<i64, ActionResult>> {
        let adapters = self.enabled_adapters().await?;
        tracing::debug!("Blocking {} on {} router(s)", ip, adapters.len());

        let results = stream::iter(adapters)
            .map(|(id, adapter)| async move {
                let outcome = timeout(
                    OPERATION_TIMEOUT,
                    adapter.add_drop_rule(ip, duration_secs, comment),
                )
                .await
                .unwrap_or_else(|_| {
                    ActionResult::fail(format!(
                        "operation timed out after {}s",
                        OPERATION_TIMEOUT.as_secs()
                    ))
                });
                (id, outcome)
            })
            .buffer_unordered(FANOUT_CONCURRENCY)
            .collect::<HashMap<_, _>>()
            .await;
        Ok(results)
    }

    /// Unblocks `ip` on every enabled router
    pub async fn remove_drop_rule_from_all(
        &self,
        ip: &str,
    ) -> Result<HashMap<i64, ActionResult>> {
        let adapters = self.enabled_adapters().await?;
        tracing::debug!("Unblocking {} on {} router(s)", ip, adapters.len());

        let results = stream::iter(adapters)
            .map(|(id, adapter)| async move {
                let outcome = timeout(OPERATION_TIMEOUT, adapter.remove_drop_rule(ip))
                    .await
                    .unwrap_or_else(|_| {
                        ActionResult::fail(format!(
                            "operation timed out after {}s",
                            OPERATION_TIMEOUT.as_secs()
                        ))
                    });
                (id, outcome)
            })
            .buffer_unordered(FANOUT_CONCURRENCY)
            .collect::<HashMap<_, _>>()
            .await;
        Ok(results)
    }

    /// Reconciles every enabled router against the active ban set
    ///
    /// The ban set is fetched once and shared across routers. A ban-source
    /// failure aborts the whole pass: syncing routers against a wrong or
    /// empty set would remove every legitimate block.
    pub async fn sync_all(&self) -> Result<HashMap<i64, SyncResult>> {
        let bans = self.backends.bans.get_active_bans().await?;
        let adapters = self.enabled_adapters().await?;
        tracing::info!(
            "Syncing {} active ban(s) to {} router(s)",
            bans.len(),
            adapters.len()
        );

        let bans = &bans;
        let results = stream::iter(adapters)
            .map(|(id, adapter)| async move {
                let outcome = timeout(OPERATION_TIMEOUT, adapter.sync_rules(bans))
                    .await
                    .unwrap_or_else(|_| {
                        let message = format!(
                            "operation timed out after {}s",
                            OPERATION_TIMEOUT.as_secs()
                        );
                        SyncResult {
                            success: false,
                            added: 0,
                            removed: 0,
                            errors: vec![message.clone()],
                            message,
                        }
                    });
                (id, outcome)
            })
            .buffer_unordered(FANOUT_CONCURRENCY)
            .collect::<HashMap<_, _>>()
            .await;
        Ok(results)
    }

    /// Tests one router's connectivity and persists the outcome
    pub async fn test_connection(&self, id: i64) -> Option<TestResult> {
        let adapter = self.get_adapter(id).await?;
        let result = match timeout(OPERATION_TIMEOUT, adapter.test_connection()).await {
            Ok(result) => result,
            Err(_) => TestResult {
                success: false,
                message: format!(
                    "operation timed out after {}s",
                    OPERATION_TIMEOUT.as_secs()
                ),
                latency_ms: OPERATION_TIMEOUT.as_millis() as u64,
                identity: None,
            },
        };

        let error = if result.success {
            None
        } else {
            Some(result.message.clone())
        };
        if let Err(e) = self
            .backends
            .routers
            .update_test_status(id, result.success, error, Utc::now())
            .await
        {
            tracing::warn!("Failed to persist test status for router {}: {}", id, e);
        }
        Some(result)
    }
}
