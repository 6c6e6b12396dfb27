//! Pre-render route gate.
//!
//! The guard only looks at whether a session cookie is present. It never
//! decodes it; an invalid cookie is caught later when hydration fails with
//! `Unauthorized`.

use serde::Serialize;

pub const LOGIN_PATH: &str = "/login";
pub const DASHBOARD_PATH: &str = "/dashboard";

/// Navigation intent emitted for the presentation layer to act on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "to", content = "url", rename_all = "lowercase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum Navigation {
    Login,
    Dashboard,
    /// Open an external system as a new navigation target
    External(String),
}

impl Navigation {
    pub fn target(&self) -> &str {
        match self {
            Navigation::Login => LOGIN_PATH,
            Navigation::Dashboard => DASHBOARD_PATH,
            Navigation::External(url) => url,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(Navigation),
}

/// Route classification used by the guard and by hydration redirects.
#[derive(Debug, Clone)]
pub struct RouteGuard {
    /// Reachable without a session (login and password reset pages)
    public: Vec<String>,
    /// Signed-out pages; a signed-in user is sent to the dashboard instead
    guest_only: Vec<String>,
}

impl Default for RouteGuard {
    fn default() -> Self {
        Self {
            public: vec![
                "/".to_string(),
                LOGIN_PATH.to_string(),
                "/olvide-password".to_string(),
                "/forget-password".to_string(),
            ],
            guest_only: vec!["/".to_string(), LOGIN_PATH.to_string()],
        }
    }
}

/// `/` matches only itself; other routes also match their sub-paths.
fn route_matches(route: &str, path: &str) -> bool {
    if route == "/" {
        return path == "/";
    }
    match path.strip_prefix(route) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Drop query string and fragment, and any trailing slash.
fn normalize_path(path: &str) -> &str {
    let path = path.split(&['?', '#'][..]).next().unwrap_or(path);
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}

impl RouteGuard {
    pub fn new(public: Vec<String>, guest_only: Vec<String>) -> Self {
        Self { public, guest_only }
    }

    pub fn is_public(&self, path: &str) -> bool {
        let path = normalize_path(path);
        self.public.iter().any(|r| route_matches(r, path))
    }

    pub fn is_guest_only(&self, path: &str) -> bool {
        let path = normalize_path(path);
        self.guest_only.iter().any(|r| route_matches(r, path))
    }

    /// Decide from cookie presence and the requested path.
    pub fn check(&self, has_cookie: bool, path: &str) -> GuardDecision {
        if !has_cookie && !self.is_public(path) {
            GuardDecision::Redirect(Navigation::Login)
        } else if has_cookie && self.is_guest_only(path) {
            GuardDecision::Redirect(Navigation::Dashboard)
        } else {
            GuardDecision::Allow
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_cookie_on_protected_path_goes_to_login() {
        let guard = RouteGuard::default();
        assert_eq!(
            guard.check(false, "/dashboard"),
            GuardDecision::Redirect(Navigation::Login)
        );
        assert_eq!(
            guard.check(false, "/flota/vehiculos"),
            GuardDecision::Redirect(Navigation::Login)
        );
    }

    #[test]
    fn test_cookie_on_login_goes_to_dashboard() {
        let guard = RouteGuard::default();
        assert_eq!(
            guard.check(true, "/login"),
            GuardDecision::Redirect(Navigation::Dashboard)
        );
        assert_eq!(
            guard.check(true, "/"),
            GuardDecision::Redirect(Navigation::Dashboard)
        );
    }

    #[test]
    fn test_cookie_on_dashboard_is_allowed() {
        let guard = RouteGuard::default();
        assert_eq!(guard.check(true, "/dashboard"), GuardDecision::Allow);
        assert_eq!(guard.check(true, "/dashboard/"), GuardDecision::Allow);
    }

    #[test]
    fn test_reset_pages_are_public_either_way() {
        let guard = RouteGuard::default();
        assert_eq!(guard.check(false, "/olvide-password"), GuardDecision::Allow);
        assert_eq!(guard.check(false, "/forget-password?token=abc"), GuardDecision::Allow);
        assert_eq!(guard.check(true, "/olvide-password"), GuardDecision::Allow);
        assert_eq!(guard.check(false, "/login"), GuardDecision::Allow);
    }

    #[test]
    fn test_prefix_matching_respects_segments() {
        let guard = RouteGuard::default();
        assert!(guard.is_public("/login/sso"));
        assert!(!guard.is_public("/loginx"));
        assert!(!guard.is_public("/dashboard"));
        assert!(guard.is_public(""));
    }

    #[test]
    fn test_navigation_targets() {
        assert_eq!(Navigation::Login.target(), "/login");
        assert_eq!(Navigation::Dashboard.target(), "/dashboard");
        assert_eq!(
            Navigation::External("http://flota.local".to_string()).target(),
            "http://flota.local"
        );
    }
}
