// SPDX-License-Identifier: MIT

//! Adapter result types
//!
//! Every public adapter method returns one of these instead of raising: the
//! manager fans out across many routers and one bad device must never abort
//! the others. `success: false` covers both real failures and deliberate
//! policy rejections; the message says which.

use serde::Serialize;

use crate::routeros::{AddressListEntry, RouterInfo};

/// Outcome of a single add/remove operation
#[derive(Debug, Clone, Serialize)]
pub struct ActionResult {
    pub success: bool,
    /// Router-native rule id, when the operation produced or found one
    pub rule_id: Option<String>,
    pub message: String,
}

impl ActionResult {
    pub(crate) fn ok(rule_id: Option<String>, message: impl Into<String>) -> Self {
        Self {
            success: true,
            rule_id,
            message: message.into(),
        }
    }

    pub(crate) fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            rule_id: None,
            message: message.into(),
        }
    }
}

/// Outcome of a connection test
#[derive(Debug, Clone, Serialize)]
pub struct TestResult {
    pub success: bool,
    pub message: String,
    pub latency_ms: u64,
    /// Router identity name, when the test got far enough to read it
    pub identity: Option<String>,
}

/// Outcome of listing the managed address-list
///
/// Safe to poll: a query failure comes back as `success: false` with an
/// empty rule list, never as an error.
#[derive(Debug, Clone, Serialize)]
pub struct ListResult {
    pub success: bool,
    pub rules: Vec<AddressListEntry>,
    pub message: String,
}

/// Outcome of one reconciliation pass against one router
#[derive(Debug, Clone, Serialize)]
pub struct SyncResult {
    pub success: bool,
    pub added: u32,
    pub removed: u32,
    pub errors: Vec<String>,
    pub message: String,
}

/// Best-effort identity/resource snapshot
#[derive(Debug, Clone, Serialize)]
pub struct InfoResult {
    pub success: bool,
    pub info: Option<RouterInfo>,
    pub error: Option<String>,
}
