use std::{path::PathBuf, process::Stdio};

use async_trait::async_trait;
use snafu::ResultExt;
use tokio::{io::AsyncWriteExt, process::Command};
use tracing::*;

use crate::{
    consts::DEFAULT_OCR_LANGUAGES,
    error::*,
    preprocess::PreparedImage,
    task::TaskContext,
};

/// Turns a prepared image into raw line-oriented text.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, image: &PreparedImage, ctx: &TaskContext)
    -> Result<String, QbankError>;
}

/// OCR through the `tesseract` command line, image on stdin and text on stdout.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    binary: PathBuf,
    languages: String,
}

impl Default for TesseractCli {
    fn default() -> Self {
        Self::new("tesseract", DEFAULT_OCR_LANGUAGES)
    }
}

impl TesseractCli {
    pub fn new(binary: impl Into<PathBuf>, languages: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            languages: languages.into(),
        }
    }

    async fn run(&self, image: &PreparedImage) -> Result<String, QbankError> {
        let mut child = Command::new(&self.binary)
            .args(["stdin", "stdout", "-l", &self.languages])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| QbankError::Ocr {
                stage: "spawn".to_string(),
                message: format!("{}: {}", self.binary.display(), err),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&image.bytes)
                .await
                .context(IoReadSnafu { path: "tesseract stdin" })?;
        }

        let output = child.wait_with_output().await.context(IoReadSnafu {
            path: "tesseract stdout",
        })?;
        if !output.status.success() {
            return Err(QbankError::Ocr {
                stage: "recognize".to_string(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl OcrEngine for TesseractCli {
    #[instrument(skip_all, fields(task = %ctx.id, languages = %self.languages))]
    async fn recognize(
        &self,
        image: &PreparedImage,
        ctx: &TaskContext,
    ) -> Result<String, QbankError> {
        ctx.checkpoint()?;
        ctx.report("Recognizing text");

        // dropping the child on cancel kills the process
        tokio::select! {
            result = self.run(image) => result,
            _ = ctx.cancel.cancelled() => Err(QbankError::Cancelled),
        }
    }
}
