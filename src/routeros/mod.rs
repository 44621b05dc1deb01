// SPDX-License-Identifier: MIT

//! MikroTik RouterOS API client module
//!
//! Wire framing, connection lifecycle, and response normalization for the
//! RouterOS binary API.

mod connection;
mod parse;
pub mod protocol;
mod tls;
mod types;

pub(crate) use connection::RouterOsConnection;
pub(crate) use parse::{parse_address_list, parse_router_info};
pub use types::{AddressListEntry, RouterInfo};
