//! Session store: the single owner of the authenticated identity.
//!
//! The store holds `SessionState` in a watch channel so the presentation
//! layer can observe it, serializes every mutating operation through one
//! async gate, and emits `Navigation` intents instead of navigating itself.
//!
//! Lifecycle: `Uninitialized` → `Hydrating` → `Authenticated` | `Anonymous`.
//! Later operations flip `loading` while they run and settle back into one
//! of the two terminal phases.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::error::{normalize, ErrorKind, Operation, SessionError, MSG_TIMEOUT};
use super::guard::{Navigation, RouteGuard};
use crate::api::{SessionTransport, TransportError};
use crate::config::SystemUrls;
use crate::models::{dashboard_cards, Identity, ProfileUpdate, System, SystemCard};

/// Hard ceiling on the startup hydration
pub const INIT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Minimum time the initial loading screen stays up, to avoid flicker.
/// Cosmetic only.
pub const SETTLE_DELAY: Duration = Duration::from_millis(300);

/// Buffer size for the navigation intent channel.
/// Intents are dropped (with a warning) if the shell stops draining it.
const NAVIGATION_BUFFER_SIZE: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Uninitialized,
    Hydrating,
    Authenticated,
    Anonymous,
}

/// Snapshot of the process-wide session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionState {
    pub identity: Option<Identity>,
    /// A mutating operation is in flight
    pub loading: bool,
    pub error: Option<SessionError>,
    /// True until the first hydration settles or the ceiling elapses
    pub initializing: bool,
    pub phase: Phase,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            identity: None,
            loading: false,
            error: None,
            initializing: true,
            phase: Phase::Uninitialized,
        }
    }
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    /// Capability check. No session means no capability.
    pub fn check_permission(&self, name: &str) -> bool {
        self.identity.as_ref().map(|u| u.can(name)).unwrap_or(false)
    }
}

#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub init_timeout: Duration,
    pub settle_delay: Duration,
    pub guard: RouteGuard,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            init_timeout: INIT_TIMEOUT,
            settle_delay: SETTLE_DELAY,
            guard: RouteGuard::default(),
        }
    }
}

pub struct SessionStore {
    transport: Arc<dyn SessionTransport>,
    state: watch::Sender<SessionState>,
    /// Single-flight gate for mutating operations (FIFO)
    gate: Mutex<()>,
    navigation: mpsc::Sender<Navigation>,
    started: AtomicBool,
    /// Last profile fetch was refused with `Unauthorized`
    rejected: AtomicBool,
    options: StoreOptions,
}

impl SessionStore {
    /// Create a store and the receiving end of its navigation intents.
    pub fn new(transport: Arc<dyn SessionTransport>) -> (Self, mpsc::Receiver<Navigation>) {
        Self::with_options(transport, StoreOptions::default())
    }

    pub fn with_options(
        transport: Arc<dyn SessionTransport>,
        options: StoreOptions,
    ) -> (Self, mpsc::Receiver<Navigation>) {
        let (state, _) = watch::channel(SessionState::default());
        let (tx, rx) = mpsc::channel(NAVIGATION_BUFFER_SIZE);
        let store = Self {
            transport,
            state,
            gate: Mutex::new(()),
            navigation: tx,
            started: AtomicBool::new(false),
            rejected: AtomicBool::new(false),
            options,
        };
        (store, rx)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.state.borrow().identity.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn check_permission(&self, name: &str) -> bool {
        self.state.borrow().check_permission(name)
    }

    pub fn guard(&self) -> &RouteGuard {
        &self.options.guard
    }

    /// True when the server refused the session cookie on the last profile
    /// fetch. Timeouts and other failures leave this false.
    pub fn session_rejected(&self) -> bool {
        self.rejected.load(Ordering::SeqCst)
    }

    /// Dashboard cards for the current identity, `None` when signed out.
    pub fn dashboard(&self, urls: &SystemUrls) -> Option<Vec<SystemCard>> {
        self.state
            .borrow()
            .identity
            .as_ref()
            .map(|user| dashboard_cards(user, urls))
    }

    /// Request navigation to an external system if the identity may open it.
    pub fn open_system(&self, system: System, urls: &SystemUrls) -> Option<Navigation> {
        let card = {
            let state = self.state.borrow();
            SystemCard::new(system, state.identity.as_ref()?, urls)
        };
        let nav = card.open()?;
        info!(system = %system, "Opening external system");
        self.navigate(nav.clone());
        Some(nav)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn update<F: FnOnce(&mut SessionState)>(&self, f: F) {
        self.state.send_modify(f);
    }

    fn navigate(&self, nav: Navigation) {
        debug!(destination = nav.target(), "Navigation requested");
        if let Err(e) = self.navigation.try_send(nav) {
            warn!(error = %e, "Navigation intent dropped");
        }
    }

    /// Enter the busy sub-state. Must be called with the gate held.
    fn begin(&self) {
        self.update(|s| {
            s.loading = true;
            s.error = None;
            if s.phase == Phase::Uninitialized {
                s.phase = Phase::Hydrating;
            }
        });
    }

    /// Leave the busy sub-state, recording `err` for display.
    fn fail(&self, err: SessionError) -> SessionError {
        self.update(|s| {
            s.loading = false;
            s.error = Some(err.clone());
        });
        err
    }

    async fn fetch_profile(&self) -> Result<Identity, SessionError> {
        let response = self
            .transport
            .get_profile()
            .await
            .and_then(|r| r.into_result())
            .map_err(|e| normalize(&e, Operation::Profile))?;

        response.into_payload().ok_or_else(|| {
            normalize(
                &TransportError::Local("no user data received".to_string()),
                Operation::Profile,
            )
        })
    }

    /// Fetch the canonical identity and settle the state on the outcome.
    /// Failures clear the identity; `Unauthorized` is not recorded when
    /// `quiet_unauthorized` is set, since session expiry is not a user error.
    async fn refresh_locked(&self, quiet_unauthorized: bool) -> Result<Identity, SessionError> {
        match self.fetch_profile().await {
            Ok(user) => {
                debug!(user_id = %user.id, role = user.role.as_str(), "Profile loaded");
                self.rejected.store(false, Ordering::SeqCst);
                let stored = user.clone();
                self.update(|s| {
                    s.identity = Some(stored);
                    s.phase = Phase::Authenticated;
                    s.loading = false;
                    s.error = None;
                });
                Ok(user)
            }
            Err(e) => {
                if e.is_unauthorized() {
                    self.rejected.store(true, Ordering::SeqCst);
                }
                let record = !(quiet_unauthorized && e.is_unauthorized());
                self.update(|s| {
                    s.identity = None;
                    s.phase = Phase::Anonymous;
                    s.loading = false;
                    s.error = if record { Some(e.clone()) } else { None };
                });
                Err(e)
            }
        }
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Startup hydration. Runs once per store; `initializing` flips to false
    /// when hydration settles (after the cosmetic delay) or when the ceiling
    /// elapses, whichever comes first.
    ///
    /// The ceiling includes time spent queued behind other operations. On
    /// expiry the pending fetch is abandoned; the session becomes Anonymous
    /// only if no other operation settled it in the meantime.
    pub async fn initialize(&self, path: &str) -> Phase {
        if self.started.swap(true, Ordering::SeqCst) {
            debug!("Session store already initialized");
            return self.state.borrow().phase;
        }

        let deadline = Instant::now() + self.options.init_timeout;
        let entered = AtomicBool::new(false);

        match tokio::time::timeout_at(deadline, self.hydrate_inner(path, &entered)).await {
            Ok(_) => {
                let settle = (Instant::now() + self.options.settle_delay).min(deadline);
                tokio::time::sleep_until(settle).await;
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.options.init_timeout.as_millis() as u64,
                    "Session hydration timed out"
                );
                // Dropping the hydration future released the gate if it held it
                let owned_gate = entered.load(Ordering::SeqCst);
                self.update(|s| {
                    if owned_gate {
                        s.loading = false;
                    }
                    if matches!(s.phase, Phase::Uninitialized | Phase::Hydrating) {
                        s.identity = None;
                        s.phase = Phase::Anonymous;
                        s.error = Some(SessionError::new(
                            ErrorKind::NetworkUnreachable,
                            MSG_TIMEOUT,
                        ));
                    }
                });
            }
        }

        self.update(|s| s.initializing = false);
        let phase = self.state.borrow().phase;
        info!(phase = ?phase, "Session initialized");
        phase
    }

    /// Load the identity from the profile endpoint. Never fails: any error
    /// leaves the session Anonymous. Redirects depend on `path`: signed-in
    /// users on a signed-out page go to the dashboard, and an expired
    /// session outside the public pages goes to login.
    pub async fn hydrate(&self, path: &str) -> Option<Identity> {
        self.hydrate_inner(path, &AtomicBool::new(false)).await
    }

    /// `entered` is set once the gate is held.
    async fn hydrate_inner(&self, path: &str, entered: &AtomicBool) -> Option<Identity> {
        let _gate = self.gate.lock().await;
        entered.store(true, Ordering::SeqCst);
        self.begin();

        match self.refresh_locked(true).await {
            Ok(user) => {
                if self.options.guard.is_guest_only(path) {
                    self.navigate(Navigation::Dashboard);
                }
                Some(user)
            }
            Err(e) => {
                if e.is_unauthorized() {
                    debug!(path = path, "No valid session");
                    if !self.options.guard.is_public(path) {
                        self.navigate(Navigation::Login);
                    }
                } else {
                    warn!(kind = ?e.kind, error = %e, "Failed to load profile");
                }
                None
            }
        }
    }

    /// Authenticate, then take the profile endpoint as the source of truth
    /// for the identity. Requests the dashboard on success.
    pub async fn login(&self, correo: &str, password: &str) -> Result<Identity, SessionError> {
        let correo = correo.trim();
        if correo.is_empty() || password.is_empty() {
            let err = SessionError::new(ErrorKind::Validation, "email and password required");
            self.update(|s| s.error = Some(err.clone()));
            return Err(err);
        }

        let _gate = self.gate.lock().await;
        self.begin();

        if let Err(e) = self
            .transport
            .login(correo, password)
            .await
            .and_then(|r| r.into_result())
        {
            let err = normalize(&e, Operation::Login);
            error!(kind = ?err.kind, error = %err, "Login failed");
            return Err(self.fail(err));
        }

        let user = self.refresh_locked(false).await.inspect_err(|e| {
            error!(kind = ?e.kind, error = %e, "Login succeeded but profile could not be loaded");
        })?;

        info!(user_id = %user.id, "Login successful");
        self.navigate(Navigation::Dashboard);
        Ok(user)
    }

    /// Close the session. Local state is cleared whatever the server says.
    pub async fn logout(&self) {
        let _gate = self.gate.lock().await;
        self.begin();

        if let Err(e) = self.transport.logout().await {
            warn!(error = %e, "Logout request failed, clearing session anyway");
        }

        self.update(|s| {
            s.identity = None;
            s.phase = Phase::Anonymous;
            s.loading = false;
            s.error = None;
        });
        info!("Logged out");
        self.navigate(Navigation::Login);
    }

    /// Ask the server to send a password change link. Returns the server's
    /// confirmation message, if any.
    pub async fn request_password_reset(
        &self,
        correo: &str,
    ) -> Result<Option<String>, SessionError> {
        let correo = correo.trim();
        if correo.is_empty() {
            let err = SessionError::new(ErrorKind::Validation, "email required");
            self.update(|s| s.error = Some(err.clone()));
            return Err(err);
        }

        let _gate = self.gate.lock().await;
        self.begin();

        match self
            .transport
            .request_password_reset(correo)
            .await
            .and_then(|r| r.into_result())
        {
            Ok(resp) => {
                self.update(|s| s.loading = false);
                info!("Password reset requested");
                Ok(resp.message().map(str::to_string))
            }
            Err(e) => {
                let err = normalize(&e, Operation::RequestReset);
                warn!(kind = ?err.kind, error = %err, "Password reset request failed");
                Err(self.fail(err))
            }
        }
    }

    /// Set a new password using the token from the reset link.
    pub async fn confirm_password_reset(
        &self,
        token: &str,
        password: &str,
        confirm_password: &str,
    ) -> Result<Option<String>, SessionError> {
        if password != confirm_password {
            let err = SessionError::new(ErrorKind::Validation, "passwords do not match");
            self.update(|s| s.error = Some(err.clone()));
            return Err(err);
        }

        let _gate = self.gate.lock().await;
        self.begin();

        match self
            .transport
            .confirm_password_reset(token, password, confirm_password)
            .await
            .and_then(|r| r.into_result())
        {
            Ok(resp) => {
                self.update(|s| s.loading = false);
                info!("Password changed");
                Ok(resp.message().map(str::to_string))
            }
            Err(e) => {
                let err = normalize(&e, Operation::ConfirmReset);
                warn!(kind = ?err.kind, error = %err, "Password change failed");
                Err(self.fail(err))
            }
        }
    }

    /// Send a partial profile, then reload the canonical identity instead
    /// of trusting the partial payload.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<Identity, SessionError> {
        let _gate = self.gate.lock().await;
        self.begin();

        if let Err(e) = self
            .transport
            .update_profile(update)
            .await
            .and_then(|r| r.into_result())
        {
            let err = normalize(&e, Operation::UpdateProfile);
            warn!(kind = ?err.kind, error = %err, "Profile update failed");
            if err.is_unauthorized() {
                self.rejected.store(true, Ordering::SeqCst);
                self.update(|s| {
                    s.identity = None;
                    s.phase = Phase::Anonymous;
                });
                self.navigate(Navigation::Login);
            }
            return Err(self.fail(err));
        }

        let user = self.refresh_locked(false).await.inspect_err(|e| {
            if e.is_unauthorized() {
                self.navigate(Navigation::Login);
            }
        })?;
        info!(user_id = %user.id, "Profile updated");
        Ok(user)
    }
}
