//! Error types for the Fieldcall core library.
//!
//! Every fallible operation in the session engine returns [`FieldcallError`].
//! Only two categories ever force a session transition: media access failures
//! and unexpected transport closes. Everything else is absorbed by the
//! controller and surfaced as an advisory notification.
//!
//! # Error Codes Reference
//!
//! | Code Range | Category | Description |
//! |------------|----------|-------------|
//! | E1001-E1099 | Validation | Missing or malformed user input |
//! | E2001-E2099 | Config | Environment, config file, and validation errors |
//! | E3001-E3099 | Session | State machine, role and request status errors |
//! | E4001-E4099 | Network | Directory service request failures |
//! | E5001-E5099 | Media | Capture device and peer connection errors |
//! | E6001-E6099 | Signaling | Malformed signals and channel transport errors |
//! | E9001-E9099 | General | Internal, IO, and serialization errors |

use std::fmt;
use thiserror::Error;
use tracing::{error, warn};

/// The main error type for the Fieldcall core library.
#[derive(Debug, Error)]
pub enum FieldcallError {
    // ========================================================================
    // Validation Errors (E1001-E1099)
    // ========================================================================
    /// A required field was empty or malformed
    #[error("[E1001] Validation error: {0}")]
    ValidationError(String),

    // ========================================================================
    // Configuration Errors (E2001-E2099)
    // ========================================================================
    /// Required environment variable is missing
    #[error("[E2001] Missing environment variable: {0}")]
    MissingEnvVar(String),

    /// Configuration file parse error
    #[error("[E2002] Failed to parse configuration: {0}")]
    ConfigParseError(String),

    /// Invalid configuration value
    #[error("[E2003] Invalid configuration value for '{key}': {message}")]
    InvalidConfigValue { key: String, message: String },

    // ========================================================================
    // Session Errors (E3001-E3099)
    // ========================================================================
    /// A session is already owned by this client
    #[error("[E3001] A session is already active: {0}")]
    SessionAlreadyActive(String),

    /// The operation needs a session that does not exist
    #[error("[E3002] No active session")]
    NoActiveSession,

    /// The operation is not valid for the current session kind or state
    #[error("[E3003] Invalid session transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// The referenced video request is unknown to this client
    #[error("[E3004] Video request not found: {0}")]
    RequestNotFound(String),

    /// The video request is not in the status the operation requires
    #[error("[E3005] Video request '{request_id}' is {actual}, expected {expected}")]
    InvalidRequestStatus {
        request_id: String,
        expected: String,
        actual: String,
    },

    /// The local actor's role may not perform this action
    #[error("[E3006] Action '{action}' is not permitted for role {role}")]
    RoleNotPermitted { action: String, role: String },

    // ========================================================================
    // Network Errors (E4001-E4099)
    // ========================================================================
    /// The remote call failed before a response arrived
    #[error("[E4001] Network error: {0}")]
    NetworkError(String),

    /// The remote service answered with a non-success status
    #[error("[E4002] Remote service returned {status}: {message}")]
    ApiStatus { status: u16, message: String },

    /// The response body could not be decoded
    #[error("[E4003] Failed to parse API response: {0}")]
    ApiParseError(String),

    /// The bearer credential was rejected
    #[error("[E4004] Authentication failed: {0}")]
    ApiAuthenticationFailed(String),

    /// The remote service could not be reached
    #[error("[E4005] Remote service unavailable: {0}")]
    ApiServiceUnavailable(String),

    /// The request timed out
    #[error("[E4006] Request timed out after {0} seconds")]
    RequestTimeout(u64),

    // ========================================================================
    // Media Errors (E5001-E5099)
    // ========================================================================
    /// Camera or microphone permission denied, or device unavailable
    #[error("[E5001] Media access failed: {0}")]
    MediaAccessError(String),

    /// The peer connection primitive rejected an operation
    #[error("[E5002] Peer connection error: {0}")]
    PeerConnectionError(String),

    // ========================================================================
    // Signaling Errors (E6001-E6099)
    // ========================================================================
    /// Malformed or unexpected signal
    #[error("[E6001] Signaling error: {0}")]
    SignalingError(String),

    /// The signaling channel closed without an explicit end
    #[error("[E6002] Signaling channel closed: {0}")]
    TransportClosed(String),

    /// The signaling channel could not be opened
    #[error("[E6003] Failed to open signaling channel: {0}")]
    ChannelConnectFailed(String),

    // ========================================================================
    // General Errors (E9001-E9099)
    // ========================================================================
    /// Internal error (catch-all for unexpected conditions)
    #[error("[E9001] Internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("[E9002] IO error: {0}")]
    IoError(String),

    /// Serialization/deserialization error
    #[error("[E9003] Serialization error: {0}")]
    SerializationError(String),
}

/// Result type alias for Fieldcall operations.
pub type FieldcallResult<T> = Result<T, FieldcallError>;

// ============================================================================
// From trait implementations for seamless error propagation
// ============================================================================

impl From<reqwest::Error> for FieldcallError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FieldcallError::RequestTimeout(30)
        } else if err.is_connect() {
            FieldcallError::ApiServiceUnavailable(err.to_string())
        } else if err.is_status() {
            match err.status() {
                Some(status) if status.as_u16() == 401 || status.as_u16() == 403 => {
                    FieldcallError::ApiAuthenticationFailed(status.to_string())
                }
                Some(status) => FieldcallError::ApiStatus {
                    status: status.as_u16(),
                    message: err.to_string(),
                },
                None => FieldcallError::NetworkError(err.to_string()),
            }
        } else if err.is_decode() {
            FieldcallError::ApiParseError(err.to_string())
        } else {
            FieldcallError::NetworkError(err.to_string())
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for FieldcallError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match err {
            WsError::ConnectionClosed | WsError::AlreadyClosed => {
                FieldcallError::TransportClosed("connection closed".to_string())
            }
            WsError::Io(io_err) => FieldcallError::TransportClosed(io_err.to_string()),
            other => FieldcallError::SignalingError(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for FieldcallError {
    fn from(err: serde_json::Error) -> Self {
        FieldcallError::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for FieldcallError {
    fn from(err: std::io::Error) -> Self {
        FieldcallError::IoError(err.to_string())
    }
}

impl From<config::ConfigError> for FieldcallError {
    fn from(err: config::ConfigError) -> Self {
        match err {
            config::ConfigError::NotFound(key) => FieldcallError::InvalidConfigValue {
                key,
                message: "Key not found".to_string(),
            },
            config::ConfigError::FileParse { uri, cause } => FieldcallError::ConfigParseError(
                format!("Failed to parse {}: {}", uri.unwrap_or_default(), cause),
            ),
            config::ConfigError::Type {
                origin,
                unexpected,
                expected,
                key,
            } => FieldcallError::InvalidConfigValue {
                key: key.unwrap_or_else(|| origin.map(|o| o.to_string()).unwrap_or_default()),
                message: format!("Expected {}, got {}", expected, unexpected),
            },
            _ => FieldcallError::ConfigParseError(err.to_string()),
        }
    }
}

// ============================================================================
// Error categorization helpers
// ============================================================================

impl FieldcallError {
    pub fn is_validation_error(&self) -> bool {
        matches!(self, FieldcallError::ValidationError(_))
    }

    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            FieldcallError::MissingEnvVar(_)
                | FieldcallError::ConfigParseError(_)
                | FieldcallError::InvalidConfigValue { .. }
        )
    }

    pub fn is_session_error(&self) -> bool {
        matches!(
            self,
            FieldcallError::SessionAlreadyActive(_)
                | FieldcallError::NoActiveSession
                | FieldcallError::InvalidTransition { .. }
                | FieldcallError::RequestNotFound(_)
                | FieldcallError::InvalidRequestStatus { .. }
                | FieldcallError::RoleNotPermitted { .. }
        )
    }

    /// Returns true for every failure of a Directory Client call.
    pub fn is_network_error(&self) -> bool {
        matches!(
            self,
            FieldcallError::NetworkError(_)
                | FieldcallError::ApiStatus { .. }
                | FieldcallError::ApiParseError(_)
                | FieldcallError::ApiAuthenticationFailed(_)
                | FieldcallError::ApiServiceUnavailable(_)
                | FieldcallError::RequestTimeout(_)
        )
    }

    pub fn is_media_error(&self) -> bool {
        matches!(
            self,
            FieldcallError::MediaAccessError(_) | FieldcallError::PeerConnectionError(_)
        )
    }

    pub fn is_signaling_error(&self) -> bool {
        matches!(
            self,
            FieldcallError::SignalingError(_)
                | FieldcallError::TransportClosed(_)
                | FieldcallError::ChannelConnectFailed(_)
        )
    }

    /// Returns true if this error is transient and a manual retry might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FieldcallError::NetworkError(_)
                | FieldcallError::ApiServiceUnavailable(_)
                | FieldcallError::RequestTimeout(_)
                | FieldcallError::ChannelConnectFailed(_)
        ) || matches!(self, FieldcallError::ApiStatus { status, .. } if *status >= 500)
    }

    /// Returns true if the controller must leave its current state because of this error.
    pub fn forces_transition(&self) -> bool {
        matches!(
            self,
            FieldcallError::MediaAccessError(_) | FieldcallError::TransportClosed(_)
        )
    }

    /// Returns an error code suitable for logging or external reporting.
    pub fn error_code(&self) -> &'static str {
        match self {
            FieldcallError::ValidationError(_) => "E1001",
            FieldcallError::MissingEnvVar(_) => "E2001",
            FieldcallError::ConfigParseError(_) => "E2002",
            FieldcallError::InvalidConfigValue { .. } => "E2003",
            FieldcallError::SessionAlreadyActive(_) => "E3001",
            FieldcallError::NoActiveSession => "E3002",
            FieldcallError::InvalidTransition { .. } => "E3003",
            FieldcallError::RequestNotFound(_) => "E3004",
            FieldcallError::InvalidRequestStatus { .. } => "E3005",
            FieldcallError::RoleNotPermitted { .. } => "E3006",
            FieldcallError::NetworkError(_) => "E4001",
            FieldcallError::ApiStatus { .. } => "E4002",
            FieldcallError::ApiParseError(_) => "E4003",
            FieldcallError::ApiAuthenticationFailed(_) => "E4004",
            FieldcallError::ApiServiceUnavailable(_) => "E4005",
            FieldcallError::RequestTimeout(_) => "E4006",
            FieldcallError::MediaAccessError(_) => "E5001",
            FieldcallError::PeerConnectionError(_) => "E5002",
            FieldcallError::SignalingError(_) => "E6001",
            FieldcallError::TransportClosed(_) => "E6002",
            FieldcallError::ChannelConnectFailed(_) => "E6003",
            FieldcallError::Internal(_) => "E9001",
            FieldcallError::IoError(_) => "E9002",
            FieldcallError::SerializationError(_) => "E9003",
        }
    }

    /// Returns a user-friendly suggestion for how to resolve this error.
    pub fn user_suggestion(&self) -> Option<&'static str> {
        match self {
            FieldcallError::MissingEnvVar(_) => {
                Some("Create a .env file or set the environment variable")
            }
            FieldcallError::ApiAuthenticationFailed(_) => {
                Some("Sign in again and set FIELDCALL_TOKEN to the new access token")
            }
            FieldcallError::ApiServiceUnavailable(_) | FieldcallError::RequestTimeout(_) => {
                Some("Check that the consultation service is reachable (api.base_url)")
            }
            FieldcallError::MediaAccessError(_) => {
                Some("Allow camera and microphone access, then start the call again")
            }
            FieldcallError::InvalidRequestStatus { .. } => {
                Some("Refresh the request list; the request may have changed")
            }
            FieldcallError::SessionAlreadyActive(_) => {
                Some("End the current session before starting another one")
            }
            _ => None,
        }
    }

    /// Log this error with appropriate severity level.
    pub fn log(&self) {
        let code = self.error_code();
        let suggestion = self.user_suggestion();

        if self.is_transient() {
            warn!(
                error_code = %code,
                suggestion = suggestion,
                "Transient error occurred: {}",
                self
            );
        } else {
            error!(
                error_code = %code,
                suggestion = suggestion,
                "Error occurred: {}",
                self
            );
        }
    }
}

// ============================================================================
// User-friendly error formatting for CLI
// ============================================================================

/// Format an error for CLI display with its suggestion.
pub struct CliErrorDisplay<'a> {
    error: &'a FieldcallError,
    show_suggestion: bool,
}

impl<'a> CliErrorDisplay<'a> {
    pub fn new(error: &'a FieldcallError) -> Self {
        Self {
            error,
            show_suggestion: true,
        }
    }

    pub fn without_suggestion(mut self) -> Self {
        self.show_suggestion = false;
        self
    }
}

impl<'a> fmt::Display for CliErrorDisplay<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.error)?;

        if self.show_suggestion {
            if let Some(suggestion) = self.error.user_suggestion() {
                writeln!(f)?;
                writeln!(f, "  Suggestion: {}", suggestion)?;
            }
        }

        if self.error.is_transient() {
            writeln!(f)?;
            writeln!(f, "  This error may be temporary. Try the command again.")?;
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FieldcallError::ValidationError("topic is required".to_string());
        assert!(err.to_string().contains("E1001"));
        assert!(err.to_string().contains("topic is required"));

        let err = FieldcallError::InvalidRequestStatus {
            request_id: "req-1".to_string(),
            expected: "accepted".to_string(),
            actual: "pending".to_string(),
        };
        assert!(err.to_string().contains("E3005"));
        assert!(err.to_string().contains("req-1"));
    }

    #[test]
    fn test_error_categorization() {
        let net = FieldcallError::ApiStatus {
            status: 500,
            message: "boom".to_string(),
        };
        assert!(net.is_network_error());
        assert!(!net.is_media_error());
        assert!(!net.is_signaling_error());

        let media = FieldcallError::MediaAccessError("denied".to_string());
        assert!(media.is_media_error());
        assert!(!media.is_network_error());

        let closed = FieldcallError::TransportClosed("reset".to_string());
        assert!(closed.is_signaling_error());

        assert!(FieldcallError::NoActiveSession.is_session_error());
        assert!(FieldcallError::MissingEnvVar("X".to_string()).is_config_error());
    }

    #[test]
    fn test_only_media_and_transport_force_transitions() {
        assert!(FieldcallError::MediaAccessError("denied".to_string()).forces_transition());
        assert!(FieldcallError::TransportClosed("drop".to_string()).forces_transition());

        assert!(!FieldcallError::ValidationError("x".to_string()).forces_transition());
        assert!(!FieldcallError::NetworkError("x".to_string()).forces_transition());
        assert!(!FieldcallError::SignalingError("x".to_string()).forces_transition());
        assert!(!FieldcallError::PeerConnectionError("x".to_string()).forces_transition());
    }

    #[test]
    fn test_is_transient() {
        assert!(FieldcallError::NetworkError("reset".to_string()).is_transient());
        assert!(FieldcallError::RequestTimeout(30).is_transient());
        assert!(FieldcallError::ApiStatus {
            status: 503,
            message: "unavailable".to_string()
        }
        .is_transient());

        assert!(!FieldcallError::ApiStatus {
            status: 404,
            message: "missing".to_string()
        }
        .is_transient());
        assert!(!FieldcallError::ApiAuthenticationFailed("401".to_string()).is_transient());
        assert!(!FieldcallError::MediaAccessError("denied".to_string()).is_transient());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            FieldcallError::ValidationError(String::new()).error_code(),
            "E1001"
        );
        assert_eq!(FieldcallError::NoActiveSession.error_code(), "E3002");
        assert_eq!(
            FieldcallError::MediaAccessError(String::new()).error_code(),
            "E5001"
        );
        assert_eq!(
            FieldcallError::TransportClosed(String::new()).error_code(),
            "E6002"
        );
    }

    #[test]
    fn test_cli_display_includes_suggestion() {
        let err = FieldcallError::MediaAccessError("permission denied".to_string());
        let rendered = CliErrorDisplay::new(&err).to_string();
        assert!(rendered.contains("E5001"));
        assert!(rendered.contains("Suggestion"));

        let rendered = CliErrorDisplay::new(&err).without_suggestion().to_string();
        assert!(!rendered.contains("Suggestion"));
    }
}
