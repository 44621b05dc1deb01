// SPDX-License-Identifier: MIT

//! Router adapters
//!
//! An adapter owns everything vendor-specific about enforcing bans on one
//! router: session handling, rule shape, and idempotency quirks. The manager
//! only ever talks to the [`RouterAdapter`] trait, so adding a vendor means
//! adding one module and one factory arm.

mod mikrotik;
mod timefmt;
mod types;

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{RouterConfig, RouterType};
use crate::store::Backends;

pub use mikrotik::MikroTikAdapter;
pub use timefmt::seconds_to_router_time;
pub use types::{ActionResult, InfoResult, ListResult, SyncResult, TestResult};

/// Vendor-neutral surface for enforcing bans on one router
///
/// Methods never return `Err`: every outcome, including connection failures,
/// comes back as a result struct with `success: false`. The manager fans out
/// over many routers and must keep going when one device is down.
#[async_trait]
pub trait RouterAdapter: Send + Sync {
    /// Connects, authenticates, and reads the router identity
    async fn test_connection(&self) -> TestResult;

    /// Blocks `ip`, with an optional lifetime in seconds (None is permanent)
    ///
    /// Idempotent: re-adding an already-blocked IP succeeds and reports the
    /// existing rule id. Whitelisted IPs are rejected without touching the
    /// router.
    async fn add_drop_rule(&self, ip: &str, duration_secs: Option<u64>, comment: &str)
        -> ActionResult;

    /// Unblocks `ip`, removing every matching rule
    ///
    /// Removing an IP that is not blocked succeeds.
    async fn remove_drop_rule(&self, ip: &str) -> ActionResult;

    /// Lists the managed address-list
    async fn list_drop_rules(&self) -> ListResult;

    /// Converges the router on `should_be_blocked` in one pass
    async fn sync_rules(&self, should_be_blocked: &HashSet<String>) -> SyncResult;

    /// Identity/resource snapshot for the dashboard
    async fn get_info(&self) -> InfoResult;
}

/// Instantiates the adapter for a router record
#[must_use]
pub fn create_adapter(config: RouterConfig, backends: Backends) -> Arc<dyn RouterAdapter> {
    match config.router_type {
        RouterType::Mikrotik => Arc::new(MikroTikAdapter::new(config, backends)),
    }
}
