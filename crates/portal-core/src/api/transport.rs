//! Transport contract consumed by the session store.
//!
//! Every call carries the session cookie automatically and speaks JSON.
//! Implementations report failures as a raw `TransportError`; translating
//! those into user-facing errors is the normalizer's job, not theirs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::TransportError;
use crate::models::{Identity, ProfileUpdate};

pub const LOGIN_PATH: &str = "/api/usuarios/login";
pub const LOGOUT_PATH: &str = "/api/usuarios/logout";
pub const PROFILE_PATH: &str = "/api/usuarios/perfil";
pub const REQUEST_RESET_PATH: &str = "/api/usuarios/solicitar-cambio-password";
pub const CONFIRM_RESET_PATH: &str = "/api/usuarios/cambiar-password";
pub const UPDATE_PROFILE_PATH: &str = "/api/usuarios/actualizar-perfil";

/// Response envelope shared by every endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mensaje: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usuario: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

/// Envelope whose payload is not interpreted
pub type Ack = ApiResponse<serde_json::Value>;

impl<T> ApiResponse<T> {
    pub fn ok(payload: Option<T>) -> Self {
        Self {
            success: true,
            mensaje: None,
            message: None,
            usuario: payload,
            data: None,
        }
    }

    pub fn rejected(message: &str) -> Self {
        Self {
            success: false,
            mensaje: None,
            message: Some(message.to_string()),
            usuario: None,
            data: None,
        }
    }

    /// Server message, `mensaje` first
    pub fn message(&self) -> Option<&str> {
        self.mensaje
            .as_deref()
            .or(self.message.as_deref())
            .filter(|m| !m.trim().is_empty())
    }

    /// Payload, read from `usuario` and then `data`
    pub fn into_payload(self) -> Option<T> {
        self.usuario.or(self.data)
    }

    /// Turn `success: false` into a `Rejected` failure.
    pub fn into_result(self) -> Result<Self, TransportError> {
        if self.success {
            Ok(self)
        } else {
            Err(TransportError::Rejected {
                message: self.message().map(str::to_string),
            })
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub correo: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResetRequest<'a> {
    pub correo: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResetConfirmation<'a> {
    pub token: &'a str,
    pub password: &'a str,
    #[serde(rename = "confirmarPassword")]
    pub confirm_password: &'a str,
}

/// Authenticated calls against the portal API.
#[async_trait]
pub trait SessionTransport: Send + Sync {
    /// `POST /api/usuarios/login`
    async fn login(&self, correo: &str, password: &str) -> Result<Ack, TransportError>;

    /// `GET /api/usuarios/logout`
    async fn logout(&self) -> Result<(), TransportError>;

    /// `GET /api/usuarios/perfil`
    async fn get_profile(&self) -> Result<ApiResponse<Identity>, TransportError>;

    /// `POST /api/usuarios/solicitar-cambio-password`
    async fn request_password_reset(&self, correo: &str) -> Result<Ack, TransportError>;

    /// `POST /api/usuarios/cambiar-password`
    async fn confirm_password_reset(
        &self,
        token: &str,
        password: &str,
        confirm_password: &str,
    ) -> Result<Ack, TransportError>;

    /// `PUT /api/usuarios/actualizar-perfil`
    async fn update_profile(&self, update: &ProfileUpdate) -> Result<Ack, TransportError>;
}
