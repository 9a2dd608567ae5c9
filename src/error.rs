//! Error taxonomy for the OCR and solver boundaries, plus HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Failure of the OCR adapter. Carries no partial result.
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Failed to extract text from image")]
    Recognition(#[source] anyhow::Error),

    #[error("Failed to extract text from image URL")]
    RecognitionFromUrl(#[source] anyhow::Error),
}

/// Failure of the solver adapter.
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("Problem text is empty")]
    EmptyProblem,

    /// Model unreachable, credential rejected, or the response body was unusable.
    #[error("Failed to solve math problem")]
    Request(#[source] anyhow::Error),

    /// Model answered, but not with a usable `MathSolution`.
    #[error("Model returned an invalid solution: {0}")]
    InvalidSolution(String),
}

/// Every way a request can end short of a 200.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("No image file provided")]
    NoImage,

    #[error("File too large. Maximum size is 10MB.")]
    FileTooLarge,

    #[error("Only image files are allowed")]
    NotAnImage,

    #[error("{0}")]
    InvalidUpload(String),

    #[error("Could not extract text from image. Please ensure the image contains clear, readable text.")]
    NoTextDetected,

    #[error(transparent)]
    Ocr(#[from] OcrError),

    #[error(transparent)]
    Solver(#[from] SolverError),

    #[error("Route not found")]
    RouteNotFound,

    #[error("Internal server error")]
    Internal,
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NoImage
            | AppError::FileTooLarge
            | AppError::NotAnImage
            | AppError::InvalidUpload(_)
            | AppError::NoTextDetected => StatusCode::BAD_REQUEST,
            AppError::RouteNotFound => StatusCode::NOT_FOUND,
            AppError::Ocr(_) | AppError::Solver(_) | AppError::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Client-facing body. Adapter failures get a generic headline with the
    /// adapter's own message as detail; source chains stay in the logs.
    pub fn body(&self) -> ErrorBody {
        match self {
            AppError::Ocr(_) | AppError::Solver(_) => ErrorBody {
                error: "Failed to process math problem".to_string(),
                details: Some(self.to_string()),
            },
            _ => ErrorBody {
                error: self.to_string(),
                details: None,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Ocr(e) => tracing::error!("OCR failed: {}", error_chain(e)),
            AppError::Solver(e) => tracing::error!("Solver failed: {}", error_chain(e)),
            AppError::Internal => tracing::error!("Unhandled error"),
            _ => tracing::debug!("Client error: {}", self),
        }

        (self.status_code(), Json(self.body())).into_response()
    }
}

/// Render an error and all of its sources on one line.
fn error_chain(e: &(dyn std::error::Error + 'static)) -> String {
    let mut out = e.to_string();
    let mut source = e.source();
    while let Some(s) = source {
        out.push_str(": ");
        out.push_str(&s.to_string());
        source = s.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_map_to_400() {
        for err in [
            AppError::NoImage,
            AppError::FileTooLarge,
            AppError::NotAnImage,
            AppError::NoTextDetected,
        ] {
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
            assert!(err.body().details.is_none());
        }
        assert_eq!(AppError::RouteNotFound.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_adapter_errors_carry_details() {
        let err = AppError::from(OcrError::Recognition(anyhow::anyhow!("corrupt png")));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = err.body();
        assert_eq!(body.error, "Failed to process math problem");
        assert_eq!(body.details.as_deref(), Some("Failed to extract text from image"));

        let err = AppError::from(OcrError::RecognitionFromUrl(anyhow::anyhow!("404")));
        assert_eq!(
            err.body().details.as_deref(),
            Some("Failed to extract text from image URL")
        );
    }

    #[test]
    fn test_source_chain_rendering() {
        let err = SolverError::Request(anyhow::anyhow!("connection refused"));
        assert_eq!(
            error_chain(&err),
            "Failed to solve math problem: connection refused"
        );
    }
}
