//! ERP MCP gateway.
//!
//! Exposes an Odoo-compatible ERP's record operations as MCP tools behind a
//! bearer-credential authorization gate. The interesting parts live in the
//! member crates ([`emg_auth`], [`emg_mcp`], [`erp_client`]); this crate is
//! the HTTP surface and wiring.

pub mod config;
pub mod server;
pub mod state;

pub use config::{AppConfig, CliArgs, LogFormat};
pub use server::router;
pub use state::AppState;
