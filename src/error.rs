use actix_web::http::header::ContentType;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("{0}")]
    Validation(String),
    #[error("No image returned: {0}")]
    EmptyResult(String),
    #[error("{0}")]
    Upstream(String),
    #[error("{0}")]
    NotFound(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        AppError::Upstream(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Configuration(_) | AppError::EmptyResult(_) | AppError::Upstream(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Configuration(_) => "configuration",
            AppError::Validation(_) => "validation",
            AppError::EmptyResult(_) => "empty_result",
            AppError::Upstream(_) => "upstream",
            AppError::NotFound(_) => "not_found",
        }
    }
}

impl From<image::ImageError> for AppError {
    fn from(err: image::ImageError) -> Self {
        AppError::Upstream(format!("Image codec error: {err}"))
    }
}

impl From<base64::DecodeError> for AppError {
    fn from(err: base64::DecodeError) -> Self {
        AppError::Upstream(format!("Invalid base64 image payload: {err}"))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Upstream(format!("Database error: {err}"))
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Upstream(format!("Image worker task failed: {err}"))
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub message: String,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<Vec<String>>,
}

/// Error returned from HTTP handlers: an [`AppError`] plus the summary line
/// the endpoint reports for it.
#[derive(Debug)]
pub struct ApiError {
    pub summary: &'static str,
    pub source: AppError,
    pub include_stack: bool,
}

impl ApiError {
    pub fn new(summary: &'static str, source: AppError) -> Self {
        Self {
            summary,
            source,
            include_stack: false,
        }
    }

    pub fn with_stack(mut self) -> Self {
        self.include_stack = true;
        self
    }

    fn envelope(&self) -> ErrorEnvelope {
        // Validation and lookup failures report their own message as the summary.
        let message = match &self.source {
            AppError::Validation(message) | AppError::NotFound(message) => message.clone(),
            _ => self.summary.to_string(),
        };
        let stack = self.include_stack.then(|| {
            vec![
                format!("{}: {}", self.source.kind(), self.source),
                format!("while handling: {}", self.summary),
            ]
        });
        ErrorEnvelope {
            message,
            error: self.source.to_string(),
            stack,
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.summary, self.source)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        self.source.status_code()
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .json(self.envelope())
    }
}
