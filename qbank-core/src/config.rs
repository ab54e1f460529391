use std::path::{Path, PathBuf};

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use snafu::ResultExt;

use crate::{
    consts::*,
    error::{IoReadSnafu, JsonSnafu, QbankError},
};

/// Configuration for PDF text extraction and layout reconstruction
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(default)]
#[serde(default)]
pub struct ExtractConfig {
    /// Pages per batch; batches run sequentially, pages in a batch in parallel
    pub page_batch_size: usize,
    /// Fraction of page height dropped at the top and at the bottom
    pub header_footer_margin: f32,
    /// Vertical delta (in fragment heights) that starts a new line
    pub line_break_ratio: f32,
    /// Horizontal gap (in fragment heights) that inserts a space
    pub space_gap_ratio: f32,
    /// Repair mojibake and strip control characters from extracted text
    pub auto_clean_text: bool,
    /// Directory containing the pdfium dynamic library
    #[builder(setter(into, strip_option))]
    pub pdfium_library_path: Option<PathBuf>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            page_batch_size: PAGE_BATCH_SIZE,
            header_footer_margin: HEADER_FOOTER_MARGIN,
            line_break_ratio: LINE_BREAK_RATIO,
            space_gap_ratio: SPACE_GAP_RATIO,
            auto_clean_text: true,
            pdfium_library_path: None,
        }
    }
}

/// Configuration for the OCR image preprocessing step
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(default)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Contrast boost on the `-255..=255` scale
    pub contrast: f32,
    /// JPEG quality of the encoded output
    pub jpeg_quality: u8,
    /// Apply an Otsu threshold after the contrast boost
    pub binarize: bool,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            contrast: DEFAULT_CONTRAST,
            jpeg_quality: JPEG_QUALITY,
            binarize: false,
        }
    }
}

/// Which sheets of a workbook feed the tabular parser
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SheetMode {
    #[default]
    First,
    All,
}

#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(default)]
#[serde(default)]
pub struct PipelineConfig {
    pub extract: ExtractConfig,
    pub preprocess: PreprocessConfig,
    pub sheet_mode: SheetMode,
    #[builder(setter(into))]
    pub ocr_languages: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            extract: ExtractConfig::default(),
            preprocess: PreprocessConfig::default(),
            sheet_mode: SheetMode::default(),
            ocr_languages: DEFAULT_OCR_LANGUAGES.to_string(),
        }
    }
}

impl PipelineConfig {
    /// Load a configuration from a JSON file; missing fields keep their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, QbankError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).context(IoReadSnafu {
            path: path.to_string_lossy(),
        })?;
        serde_json::from_str(&content).context(JsonSnafu { stage: "config" })
    }
}
