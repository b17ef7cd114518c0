use serde::Deserialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Conflicts the API reports with a stable error code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictKind {
    DuplicateInvitation,
    DuplicateEmail,
    DuplicateOrganization,
    ShiftFull,
    Other(String),
}

impl ConflictKind {
    pub fn from_code(code: &str) -> Self {
        match code {
            "DUPLICATE_INVITATION" => ConflictKind::DuplicateInvitation,
            "DUPLICATE_EMAIL" => ConflictKind::DuplicateEmail,
            "DUPLICATE_ORGANIZATION" => ConflictKind::DuplicateOrganization,
            "SHIFT_FULL" => ConflictKind::ShiftFull,
            other => ConflictKind::Other(other.to_string()),
        }
    }
}

/// Failures of a single API request. Nothing here is retried.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("not authenticated")]
    Unauthorized,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict {kind:?}: {message}")]
    Conflict { kind: ConflictKind, message: String },

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("server error (status {0})")]
    Server(u16),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("could not decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ApiError {
    /// Maps a non-success status and its body to an error.
    pub fn from_response(status: u16, body: &str) -> Self {
        let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
        let message = parsed
            .message
            .clone()
            .unwrap_or_else(|| "Something went wrong".to_string());

        match status {
            401 => ApiError::Unauthorized,
            403 => ApiError::Forbidden(message),
            404 => ApiError::NotFound(message),
            409 => ApiError::Conflict {
                kind: parsed
                    .code
                    .as_deref()
                    .map(ConflictKind::from_code)
                    .unwrap_or_else(|| ConflictKind::Other(String::new())),
                message,
            },
            400..=499 => match parsed.code.as_deref().map(ConflictKind::from_code) {
                Some(ConflictKind::Other(_)) | None => ApiError::BadRequest(message),
                Some(kind) => ApiError::Conflict { kind, message },
            },
            _ => ApiError::Server(status),
        }
    }

    /// Text for the one-shot notification shown to the operator. Server
    /// errors carry no message.
    pub fn notification(&self) -> Option<String> {
        match self {
            ApiError::Unauthorized => Some("Your session has expired. Please sign in again.".to_string()),
            ApiError::Conflict { kind, message } => Some(match kind {
                ConflictKind::DuplicateInvitation => {
                    "An invitation has already been sent to this organization.".to_string()
                }
                ConflictKind::DuplicateEmail => {
                    "This email address is already registered.".to_string()
                }
                ConflictKind::DuplicateOrganization => {
                    "An organization with this name already exists.".to_string()
                }
                ConflictKind::ShiftFull => "This shift is already fully staffed.".to_string(),
                ConflictKind::Other(_) => message.clone(),
            }),
            ApiError::Forbidden(message)
            | ApiError::NotFound(message)
            | ApiError::BadRequest(message) => Some(message.clone()),
            ApiError::Server(_) => None,
            ApiError::Transport(_) | ApiError::Decode(_) => {
                Some("Something went wrong".to_string())
            }
        }
    }

    pub fn clears_credentials(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("role {role} may not {capability}")]
    Forbidden { role: String, capability: String },
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Notification text, if the failure should be shown at all.
    pub fn notification(&self) -> Option<String> {
        match self {
            Error::Api(err) => err.notification(),
            Error::Validation(msg) => Some(msg.clone()),
            Error::Forbidden { .. } => Some(self.to_string()),
            _ => Some("Something went wrong".to_string()),
        }
    }
}
