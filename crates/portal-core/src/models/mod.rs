//! Data models for portal entities.
//!
//! - `Identity`, `Role`, `Permissions`, `Capability`: the authenticated user
//! - `ProfileUpdate`: partial profile sent to the update endpoint
//! - `System`, `SystemCard`: external systems linked from the dashboard

pub mod identity;
pub mod system;

pub use identity::{role_label, Capability, Identity, Permissions, ProfileUpdate, Role};
pub use system::{dashboard_cards, System, SystemCard};
