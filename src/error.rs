// error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArchiverError {
    /// The archiver answered with an empty body. Queries may choose to ignore it.
    #[error("response is empty")]
    EmptyResponse,

    #[error("failed to parse the PB format response")]
    FailedToParse,

    #[error("response from Archiver Appliance might be illegal payload type")]
    IllegalPayloadType,

    #[error("illegal field name: {0}")]
    IllegalFieldName(String),

    #[error("Invalid request: {message}")]
    InvalidRequest {
        message: String,
        context: String,
        validation_errors: Vec<String>,
    },

    #[error("function {name}: {reason}")]
    InvalidFunction { name: String, reason: String },

    #[error("Server error: {message} (status: {status})")]
    ServerError {
        message: String,
        status: u16,
        body: Option<String>,
    },

    #[error("target = {target:?}: {source}")]
    Target {
        target: String,
        #[source]
        source: Box<ArchiverError>,
    },

    #[error("Task failed: {0}")]
    Task(String),

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    ReqwestError(#[from] reqwest::Error),

    #[error(transparent)]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    UrlError(#[from] url::ParseError),
}

impl ArchiverError {
    /// Returns true if the error, or the error wrapped by a target context, is the
    /// empty-response sentinel
    pub fn is_empty_response(&self) -> bool {
        match self {
            Self::EmptyResponse => true,
            Self::Target { source, .. } => source.is_empty_response(),
            _ => false,
        }
    }

    /// Returns true if the error indicates a problem with the request itself
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidRequest { .. }
                | Self::InvalidFunction { .. }
                | Self::IllegalFieldName(_)
                | Self::UrlError(_)
        )
    }

    /// Wraps the error with the target it was produced for
    pub fn for_target<T: Into<String>>(self, target: T) -> Self {
        Self::Target {
            target: target.into(),
            source: Box::new(self),
        }
    }

    pub fn invalid_request<T: Into<String>>(message: T, context: T, errors: Vec<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
            context: context.into(),
            validation_errors: errors,
        }
    }
}

/// Result type alias for ArchiverError
pub type Result<T> = std::result::Result<T, ArchiverError>;
