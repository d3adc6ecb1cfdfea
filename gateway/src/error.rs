//! Error types for the telemetry gateway

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Main error type for the gateway
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Metrics error
    #[error("metrics error: {0}")]
    Metrics(String),

    /// A sink bound to a channel failed
    #[error("sink for channel '{channel}' failed: {message}")]
    Sink { channel: String, message: String },

    /// A polling cycle aborted
    #[error(transparent)]
    Poll(#[from] PollError),
}

/// Stage of a polling cycle at which it aborted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStage {
    Authenticate,
    Fetch,
    Reshape,
}

impl PollStage {
    /// Label used for metrics and log fields
    pub fn as_str(&self) -> &'static str {
        match self {
            PollStage::Authenticate => "authenticate",
            PollStage::Fetch => "fetch",
            PollStage::Reshape => "reshape",
        }
    }
}

/// Error that aborts a polling cycle
///
/// Any variant ends the cycle: nothing is emitted and the next attempt
/// happens on the next scheduled tick.
#[derive(Error, Debug)]
pub enum PollError {
    /// Session login failed
    #[error("{vendor}: authentication failed: {message}")]
    Auth { vendor: String, message: String },

    /// Device state request failed (network, timeout or non-2xx status)
    #[error("{vendor}: fetch failed: {message}")]
    Fetch { vendor: String, message: String },

    /// Response could not be turned into enriched records
    #[error("{vendor}: reshape failed: {message}")]
    Reshape { vendor: String, message: String },
}

impl PollError {
    pub fn auth(vendor: &str, message: impl Into<String>) -> Self {
        PollError::Auth {
            vendor: vendor.to_string(),
            message: message.into(),
        }
    }

    pub fn fetch(vendor: &str, message: impl Into<String>) -> Self {
        PollError::Fetch {
            vendor: vendor.to_string(),
            message: message.into(),
        }
    }

    pub fn reshape(vendor: &str, message: impl Into<String>) -> Self {
        PollError::Reshape {
            vendor: vendor.to_string(),
            message: message.into(),
        }
    }

    /// Stage at which the cycle aborted
    pub fn stage(&self) -> PollStage {
        match self {
            PollError::Auth { .. } => PollStage::Authenticate,
            PollError::Fetch { .. } => PollStage::Fetch,
            PollError::Reshape { .. } => PollStage::Reshape,
        }
    }

    /// Vendor tag of the adapter that failed
    pub fn vendor(&self) -> &str {
        match self {
            PollError::Auth { vendor, .. }
            | PollError::Fetch { vendor, .. }
            | PollError::Reshape { vendor, .. } => vendor,
        }
    }
}

/// Error type for sink operations
#[derive(Error, Debug)]
pub enum SinkError {
    /// Initialization failed
    #[error("initialization failed: {0}")]
    Init(String),

    /// Write rejected by the destination
    #[error("send failed: {0}")]
    Send(String),

    /// Destination unreachable
    #[error("connection error: {0}")]
    Connection(String),

    /// Shutdown error
    #[error("shutdown error: {0}")]
    Shutdown(String),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match &self {
            GatewayError::Config(_) | GatewayError::Serialization(_) => StatusCode::BAD_REQUEST,
            GatewayError::Sink { .. } | GatewayError::Poll(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Io(_) | GatewayError::Metrics(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}
