mod layout;
mod pdf;

use rayon::prelude::*;
use tracing::*;

use crate::{config::ExtractConfig, error::QbankError, task::TaskContext};

pub use layout::{PageGeometry, PageText, TextFragment, reconstruct};
pub use pdf::TextExtractor;

/// Anything that can hand out page geometry one page at a time.
pub trait PageSource {
    fn page_count(&self) -> usize;

    fn page(&self, index: usize) -> Result<PageGeometry, QbankError>;
}

/// Extract reconstructed text for every page of `source`, batch by batch.
///
/// A failing page yields empty text. Cancellation is observed before each
/// batch; a cancelled extraction returns [`QbankError::Cancelled`].
pub fn extract_pages<S: PageSource + ?Sized>(
    source: &S,
    config: &ExtractConfig,
    ctx: &TaskContext,
) -> Result<Vec<PageText>, QbankError> {
    let total = source.page_count();
    let batch_size = config.page_batch_size.max(1);
    let mut pages = Vec::with_capacity(total);

    for start in (0..total).step_by(batch_size) {
        ctx.checkpoint()?;
        let end = usize::min(start + batch_size, total);

        let geometry = (start..end)
            .map(|index| match source.page(index) {
                Ok(page) => (index, page),
                Err(err) => {
                    warn!("extract page {} error, treating as empty: {}", index + 1, err);
                    (index, PageGeometry::default())
                }
            })
            .collect::<Vec<_>>();

        let batch = geometry
            .into_par_iter()
            .map(|(index, page)| {
                let mut text = reconstruct(&page, config);
                if config.auto_clean_text {
                    text = plsfix::fix_text(&text, None);
                }
                PageText { index, text }
            })
            .collect::<Vec<_>>();
        pages.extend(batch);

        debug!("pages {}-{} of {} processed", start + 1, end, total);
        ctx.report(format!("pages {}–{} of {} processed", start + 1, end, total));
    }

    ctx.checkpoint()?;
    Ok(pages)
}

/// Join page texts in page order.
pub fn join_pages(pages: &[PageText]) -> String {
    pages.iter().map(|page| page.text.as_str()).collect()
}
