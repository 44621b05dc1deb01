// SPDX-License-Identifier: MIT

//! # CatWAF Router Sync
//!
//! Firewall rule synchronization for the CatWAF dashboard.
//!
//! This library pushes the dashboard's active ban set out to MikroTik
//! routers over the RouterOS binary API, keeping a firewall address-list on
//! each device converged with the bans the WAF has decided on.
//!
//! ## Main modules
//! - `adapter`: vendor adapters and the adapter trait
//! - `config`: router configuration records
//! - `error`: error types
//! - `manager`: adapter registry and multi-router fan-out
//! - `policy`: whitelist and reserved-space protection
//! - `reconcile`: ban-set/address-list diffing
//! - `routeros`: RouterOS API protocol and connection handling
//! - `store`: collaborator ports (bans, configs, audit, credentials)
//! - `prelude`: commonly used types and traits

mod adapter;
mod config;
mod error;
mod manager;
mod policy;
mod reconcile;
mod routeros;
mod store;
pub mod prelude;

// Re-export commonly used types
/// Application configuration
pub use config::{Config, RouterConfig, RouterType};

/// Application error and result type
pub use error::{AppError, Result};

/// Adapter trait, factory, and result types
pub use adapter::{
    create_adapter, ActionResult, InfoResult, ListResult, MikroTikAdapter, RouterAdapter,
    SyncResult, TestResult,
};

/// RouterOS duration rendering
pub use adapter::seconds_to_router_time;

/// Multi-router fan-out
pub use manager::RouterManager;

/// Whitelist policy
pub use policy::{is_whitelisted, parse_whitelist};

/// Reconciliation diffing
pub use reconcile::{compute_diff, RulesDiff};

/// Router-side state types
pub use routeros::{AddressListEntry, RouterInfo};

/// Collaborator ports and audit types
pub use store::{
    ActionStatus, Backends, BanSource, CredentialDecryptor, RouterConfigStore, RuleAction,
    RuleActionLog, RuleActionLogEntry, RuleCacheStore,
};

/// In-memory store implementations
pub use store::memory;

/// RouterOS wire protocol length encoding (public for tests)
pub use routeros::protocol::{decode_length, decode_sentence, encode_length, encode_sentence};
