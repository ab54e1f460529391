mod parser;
mod patterns;
mod sheet;
mod tabular;
pub mod wire;

use serde::{Deserialize, Serialize};

use crate::consts::{MAX_OPTIONS, MIN_OPTIONS};

pub use parser::{Draft, ParserState, finish, parse_text, step};
pub use sheet::read_grid;
pub use tabular::parse_grid;

/// A multiple-choice question recovered from a document.
///
/// Always holds between two and five options and an answer index that points
/// at one of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedQuestion {
    #[serde(rename = "question")]
    pub stem: String,
    pub options: Vec<String>,
    pub answer_index: usize,
    pub explanation: String,
}

impl ParsedQuestion {
    /// Build a question, or `None` when the stem is blank or fewer than two
    /// options remain. Options past the fifth are dropped and an answer index
    /// outside the options falls back to the first option.
    pub fn new(
        stem: impl Into<String>,
        options: Vec<String>,
        answer_index: usize,
        explanation: impl Into<String>,
    ) -> Option<Self> {
        let stem = stem.into().trim().to_string();
        let mut options = options
            .into_iter()
            .map(|option| option.trim().to_string())
            .collect::<Vec<_>>();
        if stem.is_empty() || options.len() < MIN_OPTIONS {
            return None;
        }
        options.truncate(MAX_OPTIONS);

        let answer_index = if answer_index < options.len() {
            answer_index
        } else {
            0
        };

        Some(Self {
            stem,
            options,
            answer_index,
            explanation: explanation.into().trim().to_string(),
        })
    }

    pub fn answer(&self) -> &str {
        &self.options[self.answer_index]
    }
}

/// Map an answer token (`A`..`E` or `1`..`4`) to an option index.
///
/// Only the first character is considered, so `"B,C"` maps to `1`.
pub fn answer_index(token: &str) -> usize {
    match token.trim().chars().next().map(|c| c.to_ascii_uppercase()) {
        Some(c @ 'A'..='E') => c as usize - 'A' as usize,
        Some(c @ '1'..='4') => c as usize - '1' as usize,
        _ => 0,
    }
}
