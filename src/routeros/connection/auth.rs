// SPDX-License-Identifier: MIT

//! RouterOS authentication

use md5::compute as md5_compute;

use super::RouterOsConnection;
use crate::error::{AppError, Result};

impl RouterOsConnection {
    /// Authenticates the connection
    ///
    /// Sends the plaintext `/login` of RouterOS 6.43+ first. A `!trap` reply
    /// is an [`AppError::Authentication`], distinct from network failures. A
    /// `=ret=` challenge in the reply means a pre-6.43 router; those get the
    /// legacy MD5 challenge-response exchange.
    pub(crate) async fn login(&mut self, username: &str, password: &str) -> Result<()> {
        tracing::trace!("Attempting login for user: {}", username);
        let reply = self
            .execute_raw("/login", &[("name", username), ("password", password)])
            .await?;

        if let Some(message) = reply.trap_message() {
            tracing::trace!("Login failed with message: {}", message);
            return Err(AppError::Authentication(message));
        }

        let challenge_hex = reply
            .rows
            .iter()
            .find_map(|row| row.get("ret").cloned());

        let Some(challenge_hex) = challenge_hex else {
            tracing::debug!("Login successful");
            return Ok(());
        };

        // Legacy challenge-response method (pre-6.43)
        tracing::trace!("Challenge received, length: {}", challenge_hex.len());
        let challenge = hex::decode(&challenge_hex)
            .map_err(|e| AppError::Protocol(format!("invalid login challenge: {e}")))?;

        // MD5 of 0x00 + password + challenge
        let mut data = Vec::with_capacity(1 + password.len() + challenge.len());
        data.push(0u8);
        data.extend_from_slice(password.as_bytes());
        data.extend_from_slice(&challenge);
        let digest = md5_compute(&data);
        let mut response = String::from("00");
        response.push_str(&hex::encode(digest.0));

        let reply = self
            .execute_raw("/login", &[("name", username), ("response", &response)])
            .await?;
        if let Some(message) = reply.trap_message() {
            tracing::trace!("Legacy login failed with message: {}", message);
            return Err(AppError::Authentication(message));
        }

        tracing::debug!("Login successful (legacy method)");
        Ok(())
    }
}
