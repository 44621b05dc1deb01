// SPDX-License-Identifier: MIT

//! Configuration for managed routers
//!
//! Router records are authored by the dashboard's CRUD layer; this module
//! defines their shape, JSON/env loading, and validation. The core treats a
//! `RouterConfig` as an immutable snapshot for the duration of one operation.

use serde::{Deserialize, Serialize};


/// Default configuration values
pub mod defaults {
    /// RouterOS API port (plain TCP)
    pub const API_PORT: u16 = 8728;
    /// RouterOS API port (TLS)
    pub const API_PORT_TLS: u16 = 8729;
    pub const ADDRESS_LIST: &str = "catwaf-banned";
    pub const COMMENT_PREFIX: &str = "catwaf";
}

/// Environment variable names used by the loader
pub mod env_vars {
    pub const ROUTERS_CONFIG: &str = "ROUTERS_CONFIG";
}

/// Router vendor discriminator
///
/// Only MikroTik exists today; the adapter factory keys on this so further
/// vendors plug in without touching the manager or reconciliation code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouterType {
    Mikrotik,
}

fn default_true() -> bool {
    true
}

fn default_address_list() -> String {
    defaults::ADDRESS_LIST.to_string()
}

fn default_comment_prefix() -> String {
    defaults::COMMENT_PREFIX.to_string()
}

/// Configuration for a single managed router
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    pub id: i64,
    pub router_type: RouterType,
    pub name: String,
    pub host: String,
    /// API port; defaults to 8728 (plain) or 8729 (TLS) when absent
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub use_tls: bool,
    /// Verify the router's TLS certificate. Off by default: routers almost
    /// always run self-signed certificates.
    #[serde(default)]
    pub verify_tls: bool,
    pub username: String,
    /// Encrypted password blob; opaque here, decrypted through the
    /// `CredentialDecryptor` port just before login.
    pub password: String,
    #[serde(default = "default_address_list")]
    pub address_list: String,
    /// CIDR subnets or bare IPs that must never be blocked
    #[serde(default)]
    pub whitelist: Vec<String>,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default = "default_comment_prefix")]
    pub comment_prefix: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl RouterConfig {
    /// Effective API port, falling back to the transport default
    #[must_use]
    pub fn api_port(&self) -> u16 {
        self.port.unwrap_or(if self.use_tls {
            defaults::API_PORT_TLS
        } else {
            defaults::API_PORT
        })
    }

    /// `host:port` endpoint string
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.api_port())
    }

    /// Validates router configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Router name cannot be empty".to_string());
        }

        if self.host.trim().is_empty() {
            return Err(format!("Host cannot be empty for router '{}'", self.name));
        }

        if self.username.trim().is_empty() {
            return Err(format!(
                "Username cannot be empty for router '{}'",
                self.name
            ));
        }

        if self.address_list.trim().is_empty() {
            return Err(format!(
                "Address-list name cannot be empty for router '{}'",
                self.name
            ));
        }

        Ok(())
    }
}

/// Application-wide configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub routers: Vec<RouterConfig>,
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// `ROUTERS_CONFIG` holds a JSON array of router records. Entries that
    /// fail validation are logged and dropped; one bad record must not stop
    /// the remaining routers from being synchronized.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let routers: Vec<RouterConfig> =
            if let Ok(config_json) = std::env::var(env_vars::ROUTERS_CONFIG) {
                serde_json::from_str(&config_json).unwrap_or_else(|e| {
                    tracing::warn!("Failed to parse ROUTERS_CONFIG: {}. Using empty list.", e);
                    vec![]
                })
            } else {
                tracing::warn!("No router configuration found. Nothing will be synchronized.");
                vec![]
            };

        let routers: Vec<RouterConfig> = routers
            .into_iter()
            .filter(|router| match router.validate() {
                Ok(()) => true,
                Err(e) => {
                    tracing::error!("Invalid router configuration: {}", e);
                    tracing::warn!("Skipping invalid router: {}", router.name);
                    false
                }
            })
            .collect();

        Config { routers }
    }
}
