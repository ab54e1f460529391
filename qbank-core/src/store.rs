use std::sync::{Arc, RwLock};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use snafu::OptionExt;
use uuid::Uuid;

use crate::{
    error::{QbankError, QuestionNotFoundSnafu},
    question::ParsedQuestion,
    srs::{Grade, SrsRecord, schedule},
};

/// A question owned by the question bank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredQuestion {
    pub id: Uuid,
    #[serde(flatten)]
    pub question: ParsedQuestion,
    pub source_file: String,
    pub subject: String,
    pub added_at: DateTime<Utc>,
    pub srs: Option<SrsRecord>,
}

/// A stored source document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAsset {
    pub id: Uuid,
    pub name: String,
    pub subject: String,
    pub size: usize,
    pub added_at: DateTime<Utc>,
    pub sort_key: i64,
    pub favorite: bool,
    #[serde(skip)]
    pub content: Bytes,
}

/// Destination of imported questions.
pub trait QuestionStore: Send + Sync {
    /// Append one import's questions in a single step and return how many were added.
    fn merge(&self, source_file: &str, subject: &str, questions: Vec<ParsedQuestion>) -> usize;

    /// Apply a review grade to a question's schedule.
    fn review(&self, id: Uuid, grade: Grade, now: DateTime<Utc>)
    -> Result<SrsRecord, QbankError>;

    /// Questions of `subject` whose review is due at `now`.
    fn due(&self, subject: &str, now: DateTime<Utc>) -> Vec<StoredQuestion>;

    fn list(&self) -> Vec<StoredQuestion>;
}

/// Destination of stored documents.
pub trait AssetStore: Send + Sync {
    fn find_by_name(&self, subject: &str, name: &str) -> Option<StoredAsset>;

    /// Insert `asset` at the end of its subject's order unless a same-named
    /// asset already exists in that subject, which is returned instead.
    fn insert_new(&self, asset: StoredAsset) -> Option<StoredAsset>;

    /// Insert or replace by id.
    fn upsert(&self, asset: StoredAsset);

    fn get(&self, id: Uuid) -> Option<StoredAsset>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryQuestionBank {
    questions: Arc<RwLock<Vec<StoredQuestion>>>,
}

impl MemoryQuestionBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.questions.read().map(|q| q.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl QuestionStore for MemoryQuestionBank {
    fn merge(&self, source_file: &str, subject: &str, questions: Vec<ParsedQuestion>) -> usize {
        let added_at = Utc::now();
        let stored = questions
            .into_iter()
            .map(|question| StoredQuestion {
                id: Uuid::new_v4(),
                question,
                source_file: source_file.to_string(),
                subject: subject.to_string(),
                added_at,
                srs: None,
            })
            .collect::<Vec<_>>();
        let count = stored.len();

        let mut bank = self.questions.write().unwrap_or_else(|e| e.into_inner());
        bank.extend(stored);
        count
    }

    fn review(
        &self,
        id: Uuid,
        grade: Grade,
        now: DateTime<Utc>,
    ) -> Result<SrsRecord, QbankError> {
        let mut bank = self.questions.write().unwrap_or_else(|e| e.into_inner());
        let stored = bank
            .iter_mut()
            .find(|q| q.id == id)
            .context(QuestionNotFoundSnafu { id })?;

        let record = schedule(stored.srs.as_ref(), grade, now);
        stored.srs = Some(record.clone());
        Ok(record)
    }

    fn due(&self, subject: &str, now: DateTime<Utc>) -> Vec<StoredQuestion> {
        let bank = self.questions.read().unwrap_or_else(|e| e.into_inner());
        bank.iter()
            .filter(|q| q.subject == subject)
            .filter(|q| q.srs.as_ref().is_some_and(|srs| srs.is_due(now)))
            .cloned()
            .collect()
    }

    fn list(&self) -> Vec<StoredQuestion> {
        self.questions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryAssetLibrary {
    assets: Arc<RwLock<Vec<StoredAsset>>>,
}

impl MemoryAssetLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list(&self) -> Vec<StoredAsset> {
        self.assets
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl AssetStore for MemoryAssetLibrary {
    fn find_by_name(&self, subject: &str, name: &str) -> Option<StoredAsset> {
        let assets = self.assets.read().unwrap_or_else(|e| e.into_inner());
        assets
            .iter()
            .find(|a| a.subject == subject && a.name == name)
            .cloned()
    }

    fn insert_new(&self, mut asset: StoredAsset) -> Option<StoredAsset> {
        let mut assets = self.assets.write().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = assets
            .iter()
            .find(|a| a.subject == asset.subject && a.name == asset.name)
        {
            return Some(existing.clone());
        }

        asset.sort_key = assets
            .iter()
            .filter(|a| a.subject == asset.subject)
            .map(|a| a.sort_key + 1)
            .max()
            .unwrap_or_default();
        assets.push(asset);
        None
    }

    fn upsert(&self, asset: StoredAsset) {
        let mut assets = self.assets.write().unwrap_or_else(|e| e.into_inner());
        match assets.iter_mut().find(|a| a.id == asset.id) {
            Some(existing) => *existing = asset,
            None => assets.push(asset),
        }
    }

    fn get(&self, id: Uuid) -> Option<StoredAsset> {
        let assets = self.assets.read().unwrap_or_else(|e| e.into_inner());
        assets.iter().find(|a| a.id == id).cloned()
    }
}
