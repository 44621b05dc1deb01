// SPDX-License-Identifier: MIT

//! Prelude module for convenient imports
//!
//! This module re-exports commonly used types and traits for convenient use.
//! Users of the library can import everything they need with:
//!
//! ```rust
//! use catwaf_router_sync::prelude::*;
//! ```

// Core types
pub use crate::config::{Config, RouterConfig, RouterType};
pub use crate::error::{AppError, Result};

// Adapter surface
pub use crate::adapter::{
    create_adapter, ActionResult, InfoResult, ListResult, RouterAdapter, SyncResult, TestResult,
};

// Fan-out
pub use crate::manager::RouterManager;

// Reconciliation
pub use crate::reconcile::{compute_diff, RulesDiff};

// Router-side state
pub use crate::routeros::{AddressListEntry, RouterInfo};

// Collaborator ports
pub use crate::store::{
    ActionStatus, Backends, BanSource, CredentialDecryptor, RouterConfigStore, RuleAction,
    RuleActionLog, RuleActionLogEntry, RuleCacheStore,
};
