use std::time::Instant;

use bytes::Bytes;
use glam::Vec2;
use pdfium_render::prelude::{PdfDocument, Pdfium};
use snafu::ResultExt;
use tokio::{
    sync::{
        mpsc::{self, Receiver, Sender},
        oneshot,
    },
    task,
};
use tracing::*;

use crate::{
    config::ExtractConfig,
    consts::*,
    error::*,
    task::TaskContext,
};

use super::{PageGeometry, PageSource, PageText, TextFragment, extract_pages};

struct ExtractRequest {
    payload: Bytes,
    password: Option<String>,
    ctx: TaskContext,
    reply: oneshot::Sender<Result<Vec<PageText>, QbankError>>,
    span: Span,
}

/// Handle to the pdfium worker.
///
/// Pdfium is bound once inside a dedicated blocking thread; every extraction
/// request is queued to that thread and answered over a oneshot channel.
#[derive(Clone)]
pub struct TextExtractor {
    queue: Sender<ExtractRequest>,
}

impl TextExtractor {
    /// Start the worker. Must be called inside a tokio runtime.
    pub fn spawn(config: ExtractConfig) -> Self {
        let (queue, rx) = mpsc::channel::<ExtractRequest>(MAX_PENDING_EXTRACTIONS);

        task::spawn_blocking(move || pdf_worker(rx, config));

        Self { queue }
    }

    /// Extract reconstructed text for every page of a PDF.
    #[instrument(skip_all, fields(task = %ctx.id))]
    pub async fn extract(
        &self,
        payload: Bytes,
        password: Option<String>,
        ctx: &TaskContext,
    ) -> Result<Vec<PageText>, QbankError> {
        ctx.checkpoint()?;

        let (reply, response) = oneshot::channel();
        let request = ExtractRequest {
            payload,
            password,
            ctx: ctx.clone(),
            reply,
            span: Span::current(),
        };
        self.queue
            .send(request)
            .await
            .map_err(|_| worker_unavailable())?;

        tokio::select! {
            result = response => result.map_err(|_| worker_unavailable())?,
            _ = ctx.cancel.cancelled() => Err(QbankError::Cancelled),
        }
    }
}

fn worker_unavailable() -> QbankError {
    QbankError::ExtractionFailure {
        stage: "pdf-worker".to_string(),
        message: "pdfium worker is not running".to_string(),
    }
}

fn bind_pdfium(config: &ExtractConfig) -> Result<Pdfium, QbankError> {
    let lib_path = config
        .pdfium_library_path
        .as_ref()
        .map(|path| path.to_string_lossy().into_owned())
        .or_else(|| std::env::var(PDFIUM_LIB_PATH_ENV_NAME).ok());

    let bindings = match lib_path {
        Some(path) => {
            info!("bind pdfium from {path}");
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&path))
        }
        None => {
            info!("bind pdfium from system library");
            Pdfium::bind_to_system_library()
        }
    }
    .context(PdfiumSnafu {
        stage: "load-dyn-lib",
    })?;

    Ok(Pdfium::new(bindings))
}

fn pdf_worker(mut rx: Receiver<ExtractRequest>, config: ExtractConfig) {
    let pdfium = bind_pdfium(&config).map_err(|err| {
        error!("init pdfium error: {}", err);
        err.to_string()
    });

    while let Some(request) = rx.blocking_recv() {
        let result = match &pdfium {
            Ok(pdfium) => request.run(pdfium, &config),
            Err(message) => Err(QbankError::ExtractionFailure {
                stage: "load-dyn-lib".to_string(),
                message: message.clone(),
            }),
        };
        // the caller may have stopped waiting after a cancel
        let _ = request.reply.send(result);
    }
}

impl ExtractRequest {
    fn run(&self, pdfium: &Pdfium, config: &ExtractConfig) -> Result<Vec<PageText>, QbankError> {
        let _guard = self.span.enter();
        self.ctx.checkpoint()?;

        let start = Instant::now();
        let document = pdfium
            .load_pdf_from_byte_slice(&self.payload, self.password.as_deref())
            .context(PdfiumSnafu { stage: "load-pdf" })?;
        let pages = PdfiumPages { document };
        info!("extract pdf with {} pages", pages.page_count());

        let result = extract_pages(&pages, config, &self.ctx);
        info!("extract pdf cost {}ms", start.elapsed().as_millis());
        result
    }
}

struct PdfiumPages<'a> {
    document: PdfDocument<'a>,
}

impl PageSource for PdfiumPages<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn page(&self, index: usize) -> Result<PageGeometry, QbankError> {
        let page = self
            .document
            .pages()
            .get(index as _)
            .context(PdfiumSnafu { stage: "load-page" })?;
        let text = page.text().context(PdfiumSnafu { stage: "page-text" })?;

        let fragments = text
            .segments()
            .iter()
            .map(|segment| {
                let bounds = segment.bounds();
                let origin = Vec2::new(bounds.left.value, bounds.bottom.value);
                let size = Vec2::new(
                    bounds.right.value - bounds.left.value,
                    bounds.top.value - bounds.bottom.value,
                );
                TextFragment::new(segment.text(), origin, size)
            })
            .collect();

        Ok(PageGeometry {
            height: page.height().value,
            fragments,
        })
    }
}
