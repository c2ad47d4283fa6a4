use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error response structure sent to clients
///
/// Every failing endpoint answers with the same JSON shape:
/// ```
/// {
///   "status": "fail",
///   "message": "Module not found"
/// }
/// ```
///
/// `HttpError` is what handlers and the subscription manager return;
/// this struct is only the wire format.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub message: String,
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(s) => write!(f, "{}", s),
            Err(_) => Err(fmt::Error),
        }
    }
}

/// Fixed user-facing error messages
///
/// Keeping them in one enum means handlers, the manager and the tests all
/// agree on the exact text.
#[derive(Debug, PartialEq)]
pub enum ErrorMessage {
    // Authentication errors
    InvalidToken,
    TokenNotProvided,
    UserNotAuthenticated,
    UserNoLongerExist,

    // Authorization errors
    PermissionDenied,

    // Lookup errors
    ModuleNotFound,
    CourseNotFound,
    LessonNotFound,
    SubscriptionNotFound,
    InvalidPage,

    // Validation errors
    ModuleRequired,
    CourseRequired,
    VideoHostNotAllowed(String), // Contains the allowed hosts, comma separated

    // Conflicts
    CourseAlreadyAttached,
    SubscriptionExists,

    //Else
    ServerError,
}

impl fmt::Display for ErrorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            ErrorMessage::InvalidToken => "Token is invalid or expired".to_string(),
            ErrorMessage::TokenNotProvided => {
                "You are not logged in, please provide a token".to_string()
            }
            ErrorMessage::UserNotAuthenticated => {
                "Authentication required. Please log in.".to_string()
            }
            ErrorMessage::UserNoLongerExist => {
                "User belonging to this token no longer exists".to_string()
            }
            ErrorMessage::PermissionDenied => {
                "You are not allowed to perform this action".to_string()
            }
            ErrorMessage::ModuleNotFound => "Module not found".to_string(),
            ErrorMessage::CourseNotFound => "Course not found".to_string(),
            ErrorMessage::LessonNotFound => "Lesson not found".to_string(),
            ErrorMessage::SubscriptionNotFound => "Subscription not found".to_string(),
            ErrorMessage::InvalidPage => "Invalid page.".to_string(),
            ErrorMessage::ModuleRequired => {
                "a module must be specified for a module subscription (для подписки на модуль необходимо указать модуль)".to_string()
            }
            ErrorMessage::CourseRequired => {
                "a course must be specified for a course subscription (для подписки на курс необходимо указать курс)".to_string()
            }
            ErrorMessage::VideoHostNotAllowed(hosts) => {
                format!("video links are only allowed from: {}", hosts)
            }
            ErrorMessage::CourseAlreadyAttached => {
                "This module already has a course".to_string()
            }
            ErrorMessage::SubscriptionExists => {
                "An identical subscription already exists".to_string()
            }
            ErrorMessage::ServerError => "Server Error. Please try again later".to_string(),
        };
        write!(f, "{}", message)
    }
}

/// Internal HTTP error type used throughout the application
///
/// Bundles the client message with its status code so the two never drift
/// apart. Handlers return `Result<T, HttpError>` and axum turns the error
/// into a response through `IntoResponse`.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpError {
    pub message: String,
    pub status: StatusCode,
}

impl HttpError {
    /// 500: persistence or transport failures
    pub fn server_error(message: impl Into<String>) -> Self {
        HttpError {
            message: message.into(),
            status: StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 400: invalid input, including cross-field validation
    pub fn bad_request(message: impl Into<String>) -> Self {
        HttpError {
            message: message.into(),
            status: StatusCode::BAD_REQUEST,
        }
    }

    /// 409: a unique index rejected the write
    pub fn unique_constraint_violation(message: impl Into<String>) -> Self {
        HttpError {
            message: message.into(),
            status: StatusCode::CONFLICT,
        }
    }

    /// 401: no identity, or the identity could not be verified
    ///
    /// Note: despite the name, 401 means "unauthenticated".
    pub fn unauthorized(message: impl Into<String>) -> Self {
        HttpError {
            message: message.into(),
            status: StatusCode::UNAUTHORIZED,
        }
    }

    /// 403: the identity is known but its role does not allow the action
    pub fn forbidden(message: impl Into<String>) -> Self {
        HttpError {
            message: message.into(),
            status: StatusCode::FORBIDDEN,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        HttpError {
            message: message.into(),
            status: StatusCode::NOT_FOUND,
        }
    }

    /// Map a database error for a write that may hit a unique index
    ///
    /// Unique violations become 409 with `conflict`, everything else is logged
    /// and hidden behind the generic server error.
    pub fn from_db(context: &str, err: sqlx::Error, conflict: ErrorMessage) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return HttpError::unique_constraint_violation(conflict.to_string());
            }
        }
        tracing::error!("DB error, {}: {}", context, err);
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    }

    pub fn into_http_response(self) -> Response {
        let json_response = Json(ErrorResponse {
            status: "fail".to_string(),
            message: self.message.clone(),
        });

        (self.status, json_response).into_response()
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HttpError: message: {}, status: {}",
            self.message, self.status
        )
    }
}

impl std::error::Error for HttpError {}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        self.into_http_response()
    }
}
