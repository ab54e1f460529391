use std::path::Path;

use bytes::Bytes;
use snafu::ResultExt;

use crate::error::{IoReadSnafu, QbankError};

/// Parser path a document is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Image,
    Spreadsheet,
    Csv,
    Unknown,
}

/// An uploaded file: display name, declared media type and raw bytes.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub name: String,
    pub media_type: String,
    pub payload: Bytes,
}

impl RawDocument {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            payload: payload.into(),
        }
    }

    /// Read a file from disk, guessing the media type from its extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, QbankError> {
        let path = path.as_ref();
        let payload = std::fs::read(path).context(IoReadSnafu {
            path: path.to_string_lossy(),
        })?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        let media_type = media_type_for_name(&name).to_string();

        Ok(Self::new(name, media_type, payload))
    }

    pub fn size(&self) -> usize {
        self.payload.len()
    }

    /// Resolve the parser path from the declared type, the extension and the payload.
    pub fn kind(&self) -> DocumentKind {
        let media_type = self.media_type.to_ascii_lowercase();
        let name = self.name.to_ascii_lowercase();

        if media_type == "application/pdf" || self.payload.starts_with(b"%PDF") {
            DocumentKind::Pdf
        } else if media_type.starts_with("image/") {
            DocumentKind::Image
        } else if name.ends_with(".csv") || media_type.contains("csv") {
            DocumentKind::Csv
        } else if [".xlsx", ".xls", ".xlsm", ".ods"]
            .iter()
            .any(|ext| name.ends_with(ext))
            || media_type.contains("sheet")
            || media_type.contains("excel")
        {
            DocumentKind::Spreadsheet
        } else if name.ends_with(".pdf") {
            DocumentKind::Pdf
        } else {
            DocumentKind::Unknown
        }
    }
}

fn media_type_for_name(name: &str) -> &'static str {
    let extension = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "gif" => "image/gif",
        "tif" | "tiff" => "image/tiff",
        "csv" => "text/csv",
        "xlsx" | "xlsm" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "xls" => "application/vnd.ms-excel",
        "ods" => "application/vnd.oasis.opendocument.spreadsheet",
        _ => "application/octet-stream",
    }
}
