//! HTTP client for the portal API.
//!
//! `ApiClient` implements `SessionTransport` over reqwest. A shared cookie
//! jar carries the session cookie the server sets on login, so no call
//! handles credentials explicitly after that.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::{header, Client, Method, Url};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use super::transport::{
    Ack, ApiResponse, LoginRequest, ResetConfirmation, ResetRequest, SessionTransport,
    CONFIRM_RESET_PATH, LOGIN_PATH, LOGOUT_PATH, PROFILE_PATH, REQUEST_RESET_PATH,
    UPDATE_PROFILE_PATH,
};
use super::TransportError;
use crate::config::Config;
use crate::models::{Identity, ProfileUpdate};

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// API client for the portal backend.
/// Clone is cheap - the reqwest client and the cookie jar are both shared.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    jar: Arc<Jar>,
    base_url: Url,
    cookie_name: String,
}

impl ApiClient {
    /// Create a new API client against `base_url`
    pub fn new(base_url: Url, cookie_name: &str) -> Result<Self> {
        let jar = Arc::new(Jar::default());

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .cookie_provider(jar.clone())
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            jar,
            base_url,
            cookie_name: cookie_name.to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.api_base_url()?, config.cookie_name())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Join an endpoint path onto the base URL, keeping any base path prefix.
    fn endpoint(&self, path: &str) -> Result<Url, TransportError> {
        let joined = format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path);
        Url::parse(&joined)
            .map_err(|e| TransportError::Local(format!("Invalid URL {}: {}", joined, e)))
    }

    // ===== Session cookie =====

    /// Current session cookie as a `name=value` pair, if the jar holds one.
    /// The value is opaque and never interpreted.
    pub fn session_cookie(&self) -> Option<String> {
        let header = self.jar.cookies(&self.base_url)?;
        let header = header.to_str().ok()?;
        find_cookie(header, &self.cookie_name)
            .map(|value| format!("{}={}", self.cookie_name, value))
    }

    /// Presence check only: the cookie's contents are not validated.
    pub fn has_session_cookie(&self) -> bool {
        self.session_cookie().is_some()
    }

    /// Put a previously saved `name=value` pair back into the jar.
    pub fn restore_session_cookie(&self, cookie: &str) {
        self.jar.add_cookie_str(cookie, &self.base_url);
        debug!(url = %self.base_url, "Session cookie restored");
    }

    // ===== Request plumbing =====

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, TransportError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(TransportError::from_status(status, &body))
        }
    }

    async fn send<B, T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, TransportError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        let mut request = self.client.request(method.clone(), url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            warn!(method = %method, path = path, error = %e, "Request failed without a response");
            TransportError::from_reqwest(&e)
        })?;

        let response = Self::check_response(response).await.map_err(|e| {
            debug!(
                method = %method,
                path = path,
                status = ?e.status(),
                "Request returned an error status"
            );
            e
        })?;

        response
            .json()
            .await
            .map_err(|e| TransportError::InvalidResponse(format!("{} {}: {}", method, path, e)))
    }
}

/// Find a cookie value by name in a `Cookie` header (`a=1; b=2`).
/// Empty values count as absent.
pub fn find_cookie<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}

#[async_trait]
impl SessionTransport for ApiClient {
    async fn login(&self, correo: &str, password: &str) -> Result<Ack, TransportError> {
        let body = LoginRequest { correo, password };
        self.send(Method::POST, LOGIN_PATH, Some(&body)).await
    }

    async fn logout(&self) -> Result<(), TransportError> {
        let url = self.endpoint(LOGOUT_PATH)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(&e))?;
        Self::check_response(response).await?;
        Ok(())
    }

    async fn get_profile(&self) -> Result<ApiResponse<Identity>, TransportError> {
        self.send::<(), _>(Method::GET, PROFILE_PATH, None).await
    }

    async fn request_password_reset(&self, correo: &str) -> Result<Ack, TransportError> {
        let body = ResetRequest { correo };
        self.send(Method::POST, REQUEST_RESET_PATH, Some(&body)).await
    }

    async fn confirm_password_reset(
        &self,
        token: &str,
        password: &str,
        confirm_password: &str,
    ) -> Result<Ack, TransportError> {
        let body = ResetConfirmation {
            token,
            password,
            confirm_password,
        };
        self.send(Method::POST, CONFIRM_RESET_PATH, Some(&body)).await
    }

    async fn update_profile(&self, update: &ProfileUpdate) -> Result<Ack, TransportError> {
        self.send(Method::PUT, UPDATE_PROFILE_PATH, Some(update)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> ApiClient {
        ApiClient::new(Url::parse(base).expect("url"), "token").expect("client")
    }

    #[test]
    fn test_find_cookie() {
        assert_eq!(find_cookie("token=abc", "token"), Some("abc"));
        assert_eq!(find_cookie("theme=dark; token=abc.def", "token"), Some("abc.def"));
        assert_eq!(find_cookie("theme=dark", "token"), None);
        assert_eq!(find_cookie("token=", "token"), None);
        assert_eq!(find_cookie("mytoken=x", "token"), None);
        assert_eq!(find_cookie("", "token"), None);
    }

    #[test]
    fn test_endpoint_keeps_base_prefix() {
        let c = client("http://localhost:4000/backend/");
        assert_eq!(
            c.endpoint(PROFILE_PATH).expect("url").as_str(),
            "http://localhost:4000/backend/api/usuarios/perfil"
        );

        let c = client("http://localhost:4000");
        assert_eq!(
            c.endpoint(LOGIN_PATH).expect("url").as_str(),
            "http://localhost:4000/api/usuarios/login"
        );
    }

    #[test]
    fn test_session_cookie_roundtrip_through_jar() {
        let c = client("http://localhost:4000");
        assert!(!c.has_session_cookie());

        c.restore_session_cookie("token=opaque-value");
        assert!(c.has_session_cookie());
        assert_eq!(c.session_cookie().as_deref(), Some("token=opaque-value"));

        // Clones share the jar
        let other = c.clone();
        assert!(other.has_session_cookie());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_no_response() {
        // Nothing listens on port 1
        let c = client("http://127.0.0.1:1");

        let err = c.get_profile().await.expect_err("should fail");
        assert!(matches!(err, TransportError::NoResponse(_)), "got {:?}", err);
        assert_eq!(err.status(), None);

        let err = c.login("ana@example.com", "x").await.expect_err("should fail");
        assert!(matches!(err, TransportError::NoResponse(_)), "got {:?}", err);
    }

    #[test]
    fn test_other_cookies_do_not_count() {
        let c = client("http://localhost:4000");
        c.restore_session_cookie("theme=dark");
        assert!(!c.has_session_cookie());
    }
}
