use std::sync::Arc;

use snafu::{OptionExt, ResultExt, ensure};
use tokio::task;
use tracing::*;

use crate::{
    config::PipelineConfig,
    document::{DocumentKind, RawDocument},
    error::*,
    extract::{TextExtractor, join_pages},
    ocr::OcrEngine,
    preprocess::ImagePreprocessor,
    question::{ParsedQuestion, parse_grid, parse_text, read_grid},
    task::TaskContext,
};

/// Routes one document to the right extractor and parser.
#[derive(Clone)]
pub struct ImportPipeline {
    config: PipelineConfig,
    extractor: Option<TextExtractor>,
    preprocessor: ImagePreprocessor,
    ocr: Option<Arc<dyn OcrEngine>>,
}

impl ImportPipeline {
    /// A pipeline that only handles spreadsheets until an extractor and an OCR
    /// engine are attached.
    pub fn new(config: PipelineConfig) -> Self {
        let preprocessor = ImagePreprocessor::new(config.preprocess.clone());
        Self {
            config,
            extractor: None,
            preprocessor,
            ocr: None,
        }
    }

    pub fn with_extractor(mut self, extractor: TextExtractor) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn with_ocr(mut self, ocr: Arc<dyn OcrEngine>) -> Self {
        self.ocr = Some(ocr);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    #[instrument(skip_all, fields(task = %ctx.id, file = %doc.name))]
    pub async fn run(
        &self,
        doc: &RawDocument,
        ctx: &TaskContext,
    ) -> Result<Vec<ParsedQuestion>, QbankError> {
        ctx.checkpoint()?;
        let kind = doc.kind();
        info!("import {:?} document of {} bytes", kind, doc.size());

        let questions = match kind {
            DocumentKind::Pdf => {
                ctx.report("Extracting text");
                let text = self.pdf_text(doc, ctx).await?;
                self.structure_text(doc, &text, ctx)?
            }
            DocumentKind::Image => {
                let text = self.image_text(doc, ctx).await?;
                self.structure_text(doc, &text, ctx)?
            }
            DocumentKind::Spreadsheet | DocumentKind::Csv => {
                ctx.report("Reading spreadsheet");
                let doc = doc.clone();
                let mode = self.config.sheet_mode;
                let grid = task::spawn_blocking(move || read_grid(&doc, mode))
                    .await
                    .context(JoinSnafu { stage: "read-grid" })??;
                ctx.checkpoint()?;
                parse_grid(&grid)
            }
            DocumentKind::Unknown => {
                return UnsupportedFormatSnafu {
                    name: doc.name.as_str(),
                    media_type: doc.media_type.as_str(),
                }
                .fail();
            }
        };

        ensure!(!questions.is_empty(), NoQuestionsFoundSnafu);
        info!("recognized {} questions", questions.len());
        Ok(questions)
    }

    async fn pdf_text(&self, doc: &RawDocument, ctx: &TaskContext) -> Result<String, QbankError> {
        let extractor = self.extractor.as_ref().context(ExtractionFailureSnafu {
            stage: "pdf",
            message: "no pdf extractor configured",
        })?;
        let pages = extractor.extract(doc.payload.clone(), None, ctx).await?;
        Ok(join_pages(&pages))
    }

    async fn image_text(&self, doc: &RawDocument, ctx: &TaskContext) -> Result<String, QbankError> {
        let ocr = self.ocr.as_ref().context(OcrSnafu {
            stage: "engine",
            message: "no OCR engine configured",
        })?;

        ctx.report("Enhancing image");
        let preprocessor = self.preprocessor.clone();
        let payload = doc.payload.clone();
        let prepared = task::spawn_blocking(move || preprocessor.prepare(&payload))
            .await
            .context(JoinSnafu { stage: "preprocess" })?;
        ctx.checkpoint()?;

        ocr.recognize(&prepared, ctx).await
    }

    fn structure_text(
        &self,
        doc: &RawDocument,
        text: &str,
        ctx: &TaskContext,
    ) -> Result<Vec<ParsedQuestion>, QbankError> {
        ctx.checkpoint()?;
        ensure!(
            !text.trim().is_empty(),
            EmptyExtractionSnafu {
                name: doc.name.as_str()
            }
        );
        ctx.report("Structuring questions");
        Ok(parse_text(text))
    }
}
