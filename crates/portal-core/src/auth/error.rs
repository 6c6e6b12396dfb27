//! Translation of raw transport failures into user-facing session errors.
//!
//! `normalize` is the only place error text is decided. Every session
//! store operation routes its failures through it.

use serde::Serialize;
use thiserror::Error;

use crate::api::TransportError;

/// Closed taxonomy of session failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum ErrorKind {
    Unauthorized,
    Forbidden,
    NotFound,
    RateLimited,
    Validation,
    NetworkUnreachable,
    Unknown,
}

/// Operation a failure came from. Picks the default message when the
/// server does not provide one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Login,
    Profile,
    RequestReset,
    ConfirmReset,
    UpdateProfile,
}

impl Operation {
    fn unauthorized_default(&self) -> &'static str {
        match self {
            Operation::Login => "invalid credentials",
            Operation::RequestReset => "no account with this email",
            Operation::Profile => "session expired",
            _ => "session expired or invalid credentials",
        }
    }

    fn not_found_default(&self) -> &'static str {
        match self {
            Operation::RequestReset => "no account with this email",
            _ => "resource not found",
        }
    }

    /// Message for a `success: false` envelope with no message of its own.
    fn rejection_default(&self) -> &'static str {
        match self {
            Operation::Login => "invalid credentials",
            Operation::Profile => "could not load user profile",
            Operation::RequestReset => "could not request a password change",
            Operation::ConfirmReset => "could not change the password",
            Operation::UpdateProfile => "could not update the profile",
        }
    }
}

pub const MSG_NETWORK: &str = "cannot reach server, check connectivity";
pub const MSG_FORBIDDEN: &str = "insufficient permissions";
pub const MSG_RATE_LIMITED: &str = "too many requests, wait before retrying";
pub const MSG_VALIDATION: &str = "invalid request";
pub const MSG_SERVER: &str = "server error, try again later";
pub const MSG_TIMEOUT: &str = "server did not answer in time";

/// Normalized failure: a taxonomy kind and the message to display.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{message}")]
pub struct SessionError {
    pub kind: ErrorKind,
    pub message: String,
}

impl SessionError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.kind == ErrorKind::Unauthorized
    }
}

/// Map a transport failure to a session error. First matching rule wins.
pub fn normalize(failure: &TransportError, op: Operation) -> SessionError {
    use ErrorKind::*;

    let with_default = |message: &Option<String>, default: &str| {
        message.clone().unwrap_or_else(|| default.to_string())
    };

    match failure {
        TransportError::NoResponse(_) => SessionError::new(NetworkUnreachable, MSG_NETWORK),
        TransportError::Status { status, message } => match status {
            401 => SessionError::new(
                Unauthorized,
                with_default(message, op.unauthorized_default()),
            ),
            403 => SessionError::new(Forbidden, MSG_FORBIDDEN),
            404 => SessionError::new(NotFound, with_default(message, op.not_found_default())),
            429 => SessionError::new(RateLimited, MSG_RATE_LIMITED),
            400 => SessionError::new(Validation, with_default(message, MSG_VALIDATION)),
            _ => SessionError::new(Unknown, with_default(message, MSG_SERVER)),
        },
        // A success-false login is a credential failure; everywhere else it
        // is a local failure carrying the server's message.
        TransportError::Rejected { message } => {
            let kind = match op {
                Operation::Login => Unauthorized,
                _ => Unknown,
            };
            SessionError::new(kind, with_default(message, op.rejection_default()))
        }
        TransportError::InvalidResponse(msg) | TransportError::Local(msg) => {
            SessionError::new(Unknown, msg.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16, message: Option<&str>) -> TransportError {
        TransportError::Status {
            status: code,
            message: message.map(str::to_string),
        }
    }

    #[test]
    fn test_unauthorized_keeps_server_message() {
        let err = normalize(&status(401, Some("Credenciales inválidas")), Operation::Login);
        assert_eq!(err.kind, ErrorKind::Unauthorized);
        assert_eq!(err.message, "Credenciales inválidas");
    }

    #[test]
    fn test_unauthorized_defaults_depend_on_operation() {
        assert_eq!(
            normalize(&status(401, None), Operation::Login).message,
            "invalid credentials"
        );
        assert_eq!(
            normalize(&status(401, None), Operation::RequestReset).message,
            "no account with this email"
        );
        assert_eq!(
            normalize(&status(401, None), Operation::Profile).message,
            "session expired"
        );
    }

    #[test]
    fn test_no_response_is_network_unreachable() {
        let err = normalize(
            &TransportError::NoResponse("connection refused".to_string()),
            Operation::Login,
        );
        assert_eq!(err.kind, ErrorKind::NetworkUnreachable);
        assert_eq!(err.message, MSG_NETWORK);
    }

    #[test]
    fn test_fixed_messages_ignore_body() {
        let err = normalize(&status(403, Some("nope")), Operation::UpdateProfile);
        assert_eq!(err, SessionError::new(ErrorKind::Forbidden, MSG_FORBIDDEN));

        let err = normalize(&status(429, Some("slow")), Operation::RequestReset);
        assert_eq!(err, SessionError::new(ErrorKind::RateLimited, MSG_RATE_LIMITED));
    }

    #[test]
    fn test_not_found() {
        let err = normalize(&status(404, None), Operation::RequestReset);
        assert_eq!(err.kind, ErrorKind::NotFound);
        assert_eq!(err.message, "no account with this email");

        let err = normalize(&status(404, Some("Usuario no existente")), Operation::RequestReset);
        assert_eq!(err.message, "Usuario no existente");
    }

    #[test]
    fn test_validation_and_other_statuses() {
        assert_eq!(
            normalize(&status(400, None), Operation::ConfirmReset),
            SessionError::new(ErrorKind::Validation, MSG_VALIDATION)
        );
        let mismatch = status(400, Some("Las contraseñas no coinciden"));
        assert_eq!(
            normalize(&mismatch, Operation::ConfirmReset).message,
            "Las contraseñas no coinciden"
        );
        assert_eq!(
            normalize(&status(500, None), Operation::Profile),
            SessionError::new(ErrorKind::Unknown, MSG_SERVER)
        );
        assert_eq!(
            normalize(&status(502, Some("Bad gateway")), Operation::Profile).message,
            "Bad gateway"
        );
    }

    #[test]
    fn test_rejected_envelope() {
        let rejected = TransportError::Rejected { message: None };
        assert_eq!(
            normalize(&rejected, Operation::Login),
            SessionError::new(ErrorKind::Unauthorized, "invalid credentials")
        );
        assert_eq!(normalize(&rejected, Operation::UpdateProfile).kind, ErrorKind::Unknown);
    }

    #[test]
    fn test_local_error_keeps_its_message() {
        let err = normalize(
            &TransportError::Local("no user data received".to_string()),
            Operation::Profile,
        );
        assert_eq!(err, SessionError::new(ErrorKind::Unknown, "no user data received"));
    }

    #[test]
    fn test_display_is_message() {
        let err = SessionError::new(ErrorKind::Forbidden, MSG_FORBIDDEN);
        assert_eq!(err.to_string(), MSG_FORBIDDEN);
    }
}
