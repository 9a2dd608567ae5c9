//! OCR → solver pipeline behind the solve endpoints.

use crate::error::AppError;
use crate::ocr::{self, ExtractedText, OcrInput, OcrProvider};
use crate::solver::{MathSolution, MathSolver};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// One uploaded image. Lives for a single request.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Successful solve payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveResponse {
    pub success: bool,
    pub original_image: String,
    pub extracted_text: String,
    pub solution: MathSolution,
}

/// Both adapters, built once at startup and shared by every request.
#[derive(Clone)]
pub struct Pipeline {
    ocr: Arc<dyn OcrProvider>,
    solver: Arc<dyn MathSolver>,
}

impl Pipeline {
    pub fn new(ocr: Arc<dyn OcrProvider>, solver: Arc<dyn MathSolver>) -> Self {
        Self { ocr, solver }
    }

    /// Solve the problem shown in an uploaded image.
    pub async fn solve_upload(&self, upload: ImageUpload) -> Result<SolveResponse, AppError> {
        info!(
            "Processing image: {} ({}, {} bytes)",
            upload.filename,
            upload.content_type,
            upload.data.len()
        );
        let input = OcrInput::Bytes {
            filename: upload.filename,
            content_type: Some(upload.content_type),
            data: upload.data,
        };
        self.run(input).await
    }

    /// Solve the problem shown in an image at `url`.
    pub async fn solve_url(&self, url: String) -> Result<SolveResponse, AppError> {
        info!("Processing image URL: {}", url);
        let input = OcrInput::Url {
            filename: url.clone(),
            url,
        };
        self.run(input).await
    }

    async fn run(&self, input: OcrInput) -> Result<SolveResponse, AppError> {
        let text = match ocr::extract_text(self.ocr.as_ref(), &input).await? {
            ExtractedText::Text(text) => text,
            ExtractedText::NoText => return Err(AppError::NoTextDetected),
        };

        let solution = self.solver.solve(&text).await?;

        Ok(SolveResponse {
            success: true,
            original_image: input.filename().to_string(),
            extracted_text: text,
            solution,
        })
    }
}
