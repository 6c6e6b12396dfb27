use serde::Deserialize;
use thiserror::Error;

/// Raw failure reported by a transport call, before normalization.
///
/// `NoResponse` and `Status` must stay distinct: the normalizer treats an
/// unreachable server differently from one that answered with an error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The HTTP layer never received a response (connect error, timeout).
    #[error("No response received: {0}")]
    NoResponse(String),

    /// The server answered with a non-success status.
    #[error("Status {status}: {}", message.as_deref().unwrap_or("<no message>"))]
    Status { status: u16, message: Option<String> },

    /// The server answered 2xx but the envelope carried `success: false`.
    #[error("Request rejected: {}", message.as_deref().unwrap_or("<no message>"))]
    Rejected { message: Option<String> },

    /// The response arrived but its body could not be decoded.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Failure raised locally, with no HTTP status attached.
    #[error("{0}")]
    Local(String),
}

/// Maximum length for error response bodies kept in messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    mensaje: Option<String>,
    message: Option<String>,
}

impl TransportError {
    /// Truncate a response body to avoid carrying excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let cut = (0..=MAX_ERROR_BODY_LENGTH)
                .rev()
                .find(|i| body.is_char_boundary(*i))
                .unwrap_or(0);
            format!("{}... (truncated, {} total bytes)", &body[..cut], body.len())
        }
    }

    /// Extract the display message of an error body, if it has one.
    /// Only `mensaje`/`message` of a JSON object count; anything else is ignored.
    pub fn body_message(body: &str) -> Option<String> {
        let parsed: ErrorBody = serde_json::from_str(body).ok()?;
        parsed
            .mensaje
            .or(parsed.message)
            .filter(|m| !m.trim().is_empty())
            .map(|m| Self::truncate_body(&m))
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        TransportError::Status {
            status: status.as_u16(),
            message: Self::body_message(body),
        }
    }

    /// Classify a reqwest failure. Anything that carries a status came back
    /// from the server; everything else means no response was received.
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            TransportError::Status {
                status: status.as_u16(),
                message: None,
            }
        } else if err.is_decode() {
            TransportError::InvalidResponse(err.to_string())
        } else if err.is_builder() {
            TransportError::Local(err.to_string())
        } else {
            TransportError::NoResponse(err.to_string())
        }
    }

    /// HTTP status, when the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_message_prefers_mensaje() {
        let body = r#"{"success": false, "mensaje": "Usuario bloqueado", "message": "Blocked"}"#;
        assert_eq!(
            TransportError::body_message(body).as_deref(),
            Some("Usuario bloqueado")
        );
    }

    #[test]
    fn test_body_message_falls_back_to_message() {
        let body = r#"{"success": false, "message": "Credenciales inválidas"}"#;
        assert_eq!(
            TransportError::body_message(body).as_deref(),
            Some("Credenciales inválidas")
        );
    }

    #[test]
    fn test_body_message_ignores_non_json_and_blank() {
        assert_eq!(TransportError::body_message("<html>502</html>"), None);
        assert_eq!(TransportError::body_message(""), None);
        assert_eq!(TransportError::body_message(r#"{"message": "  "}"#), None);
        assert_eq!(TransportError::body_message(r#""just text""#), None);
    }

    #[test]
    fn test_from_status_keeps_code_and_message() {
        let err = TransportError::from_status(
            reqwest::StatusCode::TOO_MANY_REQUESTS,
            r#"{"message": "slow down"}"#,
        );
        assert_eq!(err.status(), Some(429));
        assert_eq!(
            err,
            TransportError::Status {
                status: 429,
                message: Some("slow down".to_string())
            }
        );
    }

    #[test]
    fn test_truncate_body_respects_char_boundaries() {
        let long = "é".repeat(400);
        let truncated = TransportError::truncate_body(&long);
        assert!(truncated.contains("truncated, 800 total bytes"));
    }
}
