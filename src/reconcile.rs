// SPDX-License-Identifier: MIT

//! Reconciliation diffing
//!
//! Full set difference between the authoritative ban set and the router's
//! reported address-list. Deliberately not incremental: address-lists are
//! small and routers get touched out-of-band, so deriving the diff from a
//! fresh listing every pass is the correct trade.

use std::collections::HashSet;

use ipnetwork::IpNetwork;

use crate::policy::is_whitelisted;

/// Minimal add/remove operations to converge a router on the ban set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RulesDiff {
    pub to_add: Vec<String>,
    pub to_remove: Vec<String>,
}

impl RulesDiff {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// Computes the reconciliation diff
///
/// `to_add` is filtered through the whitelist even though `add_drop_rule`
/// rejects whitelisted IPs again on its own. Output is sorted so operation
/// order is deterministic regardless of set iteration order.
#[must_use]
pub fn compute_diff(
    should_be_blocked: &HashSet<String>,
    currently_blocked: &HashSet<String>,
    whitelist: &[IpNetwork],
) -> RulesDiff {
    let mut to_add: Vec<String> = should_be_blocked
        .difference(currently_blocked)
        .filter(|ip| !is_whitelisted(ip, whitelist))
        .cloned()
        .collect();
    let mut to_remove: Vec<String> = currently_blocked
        .difference(should_be_blocked)
        .cloned()
        .collect();

    to_add.sort();
    to_remove.sort();

    RulesDiff { to_add, to_remove }
}
