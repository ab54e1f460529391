//! The canonical question record as exchanged with a delegated generator.

use serde::Deserialize;
use serde_json::{Value, json};
use snafu::ResultExt;
use tracing::*;

use crate::error::*;

use super::ParsedQuestion;

/// Strict JSON schema of a generator response: an array of question records
/// with all four fields required.
pub fn response_schema() -> Value {
    json!({
        "type": "array",
        "items": {
            "type": "object",
            "properties": {
                "question": { "type": "string" },
                "options": { "type": "array", "items": { "type": "string" } },
                "answerIndex": { "type": "integer" },
                "explanation": { "type": "string" }
            },
            "required": ["question", "options", "answerIndex", "explanation"]
        }
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireQuestion {
    question: String,
    options: Vec<String>,
    answer_index: i64,
    #[serde(default)]
    explanation: String,
}

/// Decode a generator response into questions.
///
/// A stream cut off before the closing `]` is closed and retried once. Records
/// that break the question invariants are dropped.
pub fn parse_response(text: &str) -> Result<Vec<ParsedQuestion>, QbankError> {
    let text = text.trim();
    let records = match serde_json::from_str::<Vec<WireQuestion>>(text) {
        Ok(records) => records,
        Err(err) if text.starts_with('[') && !text.ends_with(']') => {
            warn!("response is not valid json, trying to close the array: {}", err);
            let closed = format!("{}]", text.trim_end_matches(','));
            serde_json::from_str::<Vec<WireQuestion>>(&closed)
                .context(JsonSnafu { stage: "response" })?
        }
        Err(err) => return Err(err).context(JsonSnafu { stage: "response" }),
    };

    let total = records.len();
    let questions = records
        .into_iter()
        .filter_map(|record| {
            let index = usize::try_from(record.answer_index).ok()?;
            if index >= record.options.len() {
                return None;
            }
            ParsedQuestion::new(record.question, record.options, index, record.explanation)
        })
        .collect::<Vec<_>>();

    if questions.len() < total {
        debug!("dropped {} invalid records", total - questions.len());
    }
    Ok(questions)
}
