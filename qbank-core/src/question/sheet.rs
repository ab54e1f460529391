use std::io::Cursor;

use calamine::{Reader, open_workbook_auto_from_rs};
use snafu::ResultExt;
use tracing::*;

use crate::{
    config::SheetMode,
    document::{DocumentKind, RawDocument},
    error::*,
};

use super::tabular::is_header;

pub type Grid = Vec<Vec<String>>;

/// Load the cell grid of a CSV file or a workbook.
///
/// With [`SheetMode::All`] every sheet is appended in order; header rows of the
/// sheets after the first are dropped.
pub fn read_grid(doc: &RawDocument, mode: SheetMode) -> Result<Grid, QbankError> {
    match doc.kind() {
        DocumentKind::Csv => read_csv(&doc.payload),
        DocumentKind::Spreadsheet => read_workbook(&doc.payload, mode),
        _ => UnsupportedFormatSnafu {
            name: doc.name.as_str(),
            media_type: doc.media_type.as_str(),
        }
        .fail(),
    }
}

fn read_csv(payload: &[u8]) -> Result<Grid, QbankError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(payload);

    let mut grid = Vec::new();
    for record in reader.byte_records() {
        let record = record.context(CsvSnafu)?;
        grid.push(
            record
                .iter()
                .map(|cell| String::from_utf8_lossy(cell).into_owned())
                .collect(),
        );
    }
    Ok(grid)
}

fn read_workbook(payload: &[u8], mode: SheetMode) -> Result<Grid, QbankError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(payload)).context(WorkbookSnafu)?;

    let names = workbook.sheet_names();
    let names = match mode {
        SheetMode::First => names.into_iter().take(1).collect::<Vec<_>>(),
        SheetMode::All => names,
    };

    let mut grid = Grid::new();
    for (index, name) in names.iter().enumerate() {
        let range = workbook.worksheet_range(name).context(WorkbookSnafu)?;
        let mut rows = range
            .rows()
            .map(|row| row.iter().map(|cell| cell.to_string()).collect::<Vec<_>>())
            .peekable();

        if index > 0 && rows.peek().is_some_and(|row| is_header(row)) {
            rows.next();
        }
        let before = grid.len();
        grid.extend(rows);
        debug!("sheet `{}` contributed {} rows", name, grid.len() - before);
    }

    Ok(grid)
}
