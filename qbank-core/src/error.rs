use snafu::prelude::*;
use uuid::Uuid;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum QbankError {
    #[snafu(display("Unsupported file `{}` with media type `{}`", name, media_type))]
    UnsupportedFormat { name: String, media_type: String },
    #[snafu(display("Pdfium `{}` error {}", stage, source))]
    Pdfium {
        source: pdfium_render::prelude::PdfiumError,
        stage: String,
    },
    #[snafu(display("Extract text on `{}` error: {}", stage, message))]
    ExtractionFailure { stage: String, message: String },
    #[snafu(display("No text extracted from `{}`, the file may be encrypted or empty", name))]
    EmptyExtraction { name: String },
    #[snafu(display(
        "No questions recognized, questions need a number (1.) and lettered options (A.), or a standard spreadsheet layout"
    ))]
    NoQuestionsFound,
    #[snafu(display("Task cancelled"))]
    Cancelled,
    #[snafu(display("Image `{}` error: {}", stage, source))]
    Image {
        source: image::ImageError,
        stage: String,
    },
    #[snafu(display("Workbook read error: {}", source))]
    Workbook { source: calamine::Error },
    #[snafu(display("Csv read error: {}", source))]
    Csv { source: csv::Error },
    #[snafu(display("OCR `{}` error: {}", stage, message))]
    Ocr { stage: String, message: String },
    #[snafu(display("Read `{}` error: {}", path, source))]
    IoRead {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Background worker `{}` error: {}", stage, source))]
    Join {
        source: tokio::task::JoinError,
        stage: String,
    },
    #[snafu(display("Decode json for `{}` error: {}", stage, source))]
    Json {
        source: serde_json::Error,
        stage: String,
    },
    #[snafu(display("Invalid grade {}, expected 0..=5", grade))]
    InvalidGrade { grade: u8 },
    #[snafu(display("Task {} not found", id))]
    TaskNotFound { id: Uuid },
    #[snafu(display("Task {} is not waiting for a decision", id))]
    NoPendingDecision { id: Uuid },
    #[snafu(display("Question {} not found", id))]
    QuestionNotFound { id: Uuid },
}

/// Coarse classification used by callers to decide how an error is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    UnsupportedFormat,
    ExtractionFailure,
    EmptyExtraction,
    NoQuestionsFound,
    Cancelled,
    Internal,
}

impl QbankError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            QbankError::UnsupportedFormat { .. } => ErrorCategory::UnsupportedFormat,
            QbankError::Pdfium { .. }
            | QbankError::ExtractionFailure { .. }
            | QbankError::Image { .. }
            | QbankError::Workbook { .. }
            | QbankError::Csv { .. }
            | QbankError::Ocr { .. } => ErrorCategory::ExtractionFailure,
            QbankError::EmptyExtraction { .. } => ErrorCategory::EmptyExtraction,
            QbankError::NoQuestionsFound => ErrorCategory::NoQuestionsFound,
            QbankError::Cancelled => ErrorCategory::Cancelled,
            _ => ErrorCategory::Internal,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, QbankError::Cancelled)
    }
}
