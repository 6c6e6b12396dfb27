//! REST API client module for the portal backend.
//!
//! This module provides the `SessionTransport` contract the session store
//! depends on, and `ApiClient`, its reqwest implementation. Authentication
//! rides on a session cookie the server sets on login and clears on logout.

pub mod client;
pub mod error;
pub mod transport;

pub use client::ApiClient;
pub use error::TransportError;
pub use transport::{Ack, ApiResponse, SessionTransport};
