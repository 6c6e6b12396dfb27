//! Core library for the portal client.
//!
//! Holds the session store and everything it depends on: the HTTP
//! transport, the identity and system models, configuration, and the
//! route guard. The CLI in `portal-cli` is a thin shell over this crate.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod utils;
