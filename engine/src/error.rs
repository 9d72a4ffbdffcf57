//! Error types for the Tally engine.

use thiserror::Error;

/// Broad category of an [`Error`], used to decide how a failure is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing endpoint or credentials. Reported once, never retried.
    Configuration,
    /// A single save or sync call failed. Recovered by queueing or retaining.
    Transient,
    /// Camera, decoder or torch unavailable. The control degrades to disabled.
    Capability,
    /// Local persistence unavailable. Degrades to in-memory behavior.
    Storage,
    /// Malformed server response.
    Protocol,
    /// User input rejected before any call was made.
    Validation,
    /// Action requires admin privileges.
    Authorization,
}

/// All possible errors from the Tally engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Configuration errors
    #[error("cannot sync queued items without API access")]
    NoApiAccess,

    #[error("missing API URL")]
    MissingApiUrl,

    #[error("not signed in")]
    NotAuthenticated,

    // Transport errors
    #[error("network error: {0}")]
    Network(String),

    #[error("{0}")]
    Api(String),

    // Protocol errors
    #[error("API response is not JSON. Check Web App access. {snippet}")]
    NonJsonResponse { snippet: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    // Capability errors
    #[error("camera scanning is not available on this device")]
    CameraUnsupported,

    #[error("barcode scanner library not available")]
    DecoderUnavailable,

    #[error("camera error: {0}")]
    Camera(String),

    #[error("flashlight not available on this camera")]
    TorchUnavailable,

    // Storage errors
    #[error("storage unavailable: {0}")]
    Storage(String),

    // Validation errors
    #[error("missing barcode")]
    MissingBarcode,

    #[error("missing room")]
    MissingRoom,

    #[error("admin privileges required")]
    NotAdmin,
}

impl Error {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NoApiAccess | Error::MissingApiUrl | Error::NotAuthenticated => {
                ErrorKind::Configuration
            }
            Error::Network(_) | Error::Api(_) => ErrorKind::Transient,
            Error::NonJsonResponse { .. } | Error::InvalidResponse(_) => ErrorKind::Protocol,
            Error::CameraUnsupported
            | Error::DecoderUnavailable
            | Error::Camera(_)
            | Error::TorchUnavailable => ErrorKind::Capability,
            Error::Storage(_) => ErrorKind::Storage,
            Error::MissingBarcode | Error::MissingRoom => ErrorKind::Validation,
            Error::NotAdmin => ErrorKind::Authorization,
        }
    }

    /// Whether a failed save with this error should be kept for a later sync.
    ///
    /// Protocol errors count as save failures for retry purposes.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transient | ErrorKind::Protocol)
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = Error::NoApiAccess;
        assert_eq!(
            err.to_string(),
            "cannot sync queued items without API access"
        );

        let err = Error::NonJsonResponse {
            snippet: "<html> denied".into(),
        };
        assert_eq!(
            err.to_string(),
            "API response is not JSON. Check Web App access. <html> denied"
        );

        let err = Error::Api("Unauthorized".into());
        assert_eq!(err.to_string(), "Unauthorized");
    }

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(Error::MissingApiUrl.kind(), ErrorKind::Configuration);
        assert_eq!(Error::Network("reset".into()).kind(), ErrorKind::Transient);
        assert_eq!(
            Error::InvalidResponse("eof".into()).kind(),
            ErrorKind::Protocol
        );
        assert_eq!(Error::TorchUnavailable.kind(), ErrorKind::Capability);
        assert_eq!(Error::Storage("quota".into()).kind(), ErrorKind::Storage);
    }

    #[test]
    fn protocol_errors_are_retryable() {
        assert!(Error::NonJsonResponse {
            snippet: String::new()
        }
        .is_retryable());
        assert!(Error::Network("offline".into()).is_retryable());
        assert!(!Error::NotAuthenticated.is_retryable());
        assert!(!Error::MissingRoom.is_retryable());
    }
}
