use super::{ParsedQuestion, answer_index, patterns::*};

const HEADER_KEYWORDS: [&str; 3] = ["question", "题目", "题干"];

pub(super) fn is_header(row: &[String]) -> bool {
    row.iter().any(|cell| {
        let cell = cell.to_lowercase();
        HEADER_KEYWORDS.iter().any(|keyword| cell.contains(keyword))
    })
}

/// Parse a row/column grid into questions by inferring column roles.
///
/// The answer column is the right-most cell (past the stem) holding an answer
/// token; cells before it are options, cells after it form the explanation.
pub fn parse_grid(grid: &[Vec<String>]) -> Vec<ParsedQuestion> {
    let rows = match grid.first() {
        Some(first) if is_header(first) => &grid[1..],
        _ => grid,
    };

    rows.iter().filter_map(|row| parse_row(row)).collect()
}

fn parse_row(row: &[String]) -> Option<ParsedQuestion> {
    let cells = row
        .iter()
        .map(|cell| cell.trim())
        .filter(|cell| !cell.is_empty())
        .collect::<Vec<_>>();
    if cells.len() < 2 {
        return None;
    }

    let stem = strip_cell_question_number(cells[0]);
    let answer = (1..cells.len())
        .rev()
        .find_map(|k| cell_answer(cells[k]).map(|letters| (k, letters)));

    let (options, answer, explanation) = match answer {
        Some((k, letters)) => (&cells[1..k], answer_index(&letters), cells[k + 1..].join(" ")),
        None if cells.len() >= 3 => (&cells[1..], 0, String::new()),
        None => return None,
    };

    let options = options
        .iter()
        .map(|option| strip_cell_option_marker(option).to_string())
        .collect();

    ParsedQuestion::new(stem, options, answer, explanation)
}
