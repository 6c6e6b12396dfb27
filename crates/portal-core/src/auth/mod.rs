//! Session management: the state store, the route guard, error
//! normalization and local persistence of the session cookie.

pub mod credentials;
pub mod error;
pub mod guard;
pub mod session;
pub mod store;

pub use credentials::CredentialStore;
pub use error::{normalize, ErrorKind, Operation, SessionError};
pub use guard::{GuardDecision, Navigation, RouteGuard};
pub use session::{Session, SessionData};
pub use store::{Phase, SessionState, SessionStore, StoreOptions};
