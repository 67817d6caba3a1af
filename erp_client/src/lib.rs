//! ERP RPC client.
//!
//! Provides:
//! - [`ErpClient`]: the narrow collaborator interface the gateway dispatches
//!   through (authenticate + execute a named method on a named model)
//! - [`OdooClient`]: JSON-RPC implementation for Odoo-compatible servers with
//!   retry, timeout, and an LRU response cache for read-mostly calls

mod cache;
mod core;
mod odoo;

pub use cache::ResponseCache;
pub use core::{ErpClient, ErpError, ErpResult, Kwargs, RecordId};
pub use odoo::{OdooClient, OdooConfig};
