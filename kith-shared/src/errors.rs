use serde::{Deserialize, Serialize};

/// Application error codes following the pattern E{area}{sequence}
///
/// Ranges:
/// - E0xxx: Shared/gateway errors
/// - E1xxx: Session errors
/// - E2xxx: Social graph errors
/// - E3xxx: Feed errors
/// - E4xxx: Conversation/message errors
/// - E5xxx: Notification errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Shared/gateway (E0xxx)
    InternalError,
    ValidationError,
    NotFound,
    PermissionDenied,
    Unavailable,
    DecodeError,

    // Session (E1xxx)
    NotSignedIn,

    // Social graph (E2xxx)
    ProfileNotFound,
    FriendRequestNotFound,
    CannotFriendSelf,

    // Feed (E3xxx)
    PostNotFound,
    EmptyPost,
    ImageUploadFailed,

    // Messaging (E4xxx)
    ConversationNotFound,
    NoConversationSelected,

    // Notification (E5xxx)
    NotificationNotFound,
}

impl ErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            // Shared/gateway
            Self::InternalError => "E0001",
            Self::ValidationError => "E0002",
            Self::NotFound => "E0003",
            Self::PermissionDenied => "E0004",
            Self::Unavailable => "E0005",
            Self::DecodeError => "E0006",

            // Session
            Self::NotSignedIn => "E1001",

            // Social graph
            Self::ProfileNotFound => "E2001",
            Self::FriendRequestNotFound => "E2002",
            Self::CannotFriendSelf => "E2003",

            // Feed
            Self::PostNotFound => "E3001",
            Self::EmptyPost => "E3002",
            Self::ImageUploadFailed => "E3003",

            // Messaging
            Self::ConversationNotFound => "E4001",
            Self::NoConversationSelected => "E4002",

            // Notification
            Self::NotificationNotFound => "E5001",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Known { code: ErrorCode, message: String },

    #[error("internal error")]
    Internal(#[from] anyhow::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Known {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PermissionDenied, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unavailable, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DecodeError, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Stable code string, used by the UI layer to branch on error kinds.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Known { code, .. } => code.code(),
            Self::Internal(_) => ErrorCode::InternalError.code(),
            Self::Validation(_) => ErrorCode::ValidationError.code(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Known {
                code: ErrorCode::NotFound,
                ..
            }
        )
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(ErrorCode::DecodeError, err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(ErrorCode::InternalError.code(), "E0001");
        assert_eq!(ErrorCode::NotSignedIn.code(), "E1001");
        assert_eq!(ErrorCode::FriendRequestNotFound.code(), "E2002");
        assert_eq!(ErrorCode::ConversationNotFound.code(), "E4001");
    }

    #[test]
    fn helper_constructors_carry_code() {
        let err = AppError::not_found("no such post");
        assert_eq!(err.code(), "E0003");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "no such post");

        let err = AppError::validation("userId is missing");
        assert_eq!(err.code(), "E0002");
    }
}
