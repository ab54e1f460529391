use std::sync::Arc;

use chrono::Utc;
use dashmap::{DashMap, mapref::one::RefMut};
use futures::future::join_all;
use snafu::{OptionExt, ensure};
use tokio::sync::{oneshot, watch};
use tracing::{Instrument, *};
use uuid::Uuid;

use crate::{
    document::RawDocument,
    error::*,
    pipeline::ImportPipeline,
    store::{AssetStore, QuestionStore, StoredAsset},
};

use super::{
    CancelHandle, DuplicateDecision, ImportTask, ProgressFn, TaskContext, TaskKind, TaskStatus,
};

struct TaskEntry {
    state: watch::Sender<ImportTask>,
    cancel: CancelHandle,
    decision: Option<oneshot::Sender<DuplicateDecision>>,
}

impl TaskEntry {
    /// Cancelled or already finished; nothing may be merged or reported anymore.
    fn is_settled(&self) -> bool {
        self.cancel.is_cancelled() || self.state.borrow().status.is_terminal()
    }

    fn snapshot(&self) -> ImportTask {
        self.state.borrow().clone()
    }
}

type Registry = Arc<DashMap<Uuid, TaskEntry>>;

/// Runs imports as independent background jobs.
///
/// Every job owns one registry entry; status changes, the final merge and
/// cancellation all take that entry's lock, so a cancelled job never merges.
#[derive(Clone)]
pub struct ImportOrchestrator {
    tasks: Registry,
    pipeline: ImportPipeline,
    questions: Arc<dyn QuestionStore>,
    assets: Arc<dyn AssetStore>,
}

impl ImportOrchestrator {
    pub fn new(
        pipeline: ImportPipeline,
        questions: Arc<dyn QuestionStore>,
        assets: Arc<dyn AssetStore>,
    ) -> Self {
        Self {
            tasks: Arc::new(DashMap::new()),
            pipeline,
            questions,
            assets,
        }
    }

    fn register(&self, task: ImportTask) -> TaskContext {
        let id = task.id;
        let cancel = CancelHandle::new();
        let (state, _) = watch::channel(task);
        self.tasks.insert(
            id,
            TaskEntry {
                state,
                cancel: cancel.clone(),
                decision: None,
            },
        );

        let tasks = self.tasks.clone();
        let progress: ProgressFn = Arc::new(move |message| {
            update(&tasks, id, |task| task.progress_message = message);
        });
        TaskContext::new(id, cancel, progress)
    }

    /// Start extracting questions from `doc` into `subject`.
    pub fn submit_questions(&self, doc: RawDocument, subject: impl Into<String>) -> ImportTask {
        let task = ImportTask::new(&doc.name, subject, TaskKind::QuestionImport);
        let snapshot = task.clone();
        let ctx = self.register(task);

        let tasks = self.tasks.clone();
        let pipeline = self.pipeline.clone();
        let store = self.questions.clone();
        let subject = snapshot.subject.clone();
        let span = info_span!("import", task = %snapshot.id, file = %doc.name);

        tokio::spawn(
            async move {
                let id = ctx.id;
                match pipeline.run(&doc, &ctx).await {
                    Ok(questions) => {
                        let found = questions.len();
                        update(&tasks, id, |task| {
                            task.found_count = Some(found);
                            task.progress_message = format!("Recognized {found} questions");
                        });
                        let Some(entry) = tasks.get_mut(&id) else {
                            return;
                        };
                        if entry.is_settled() {
                            info!("task settled before merge, dropping {found} questions");
                            return;
                        }
                        let added = store.merge(&doc.name, &subject, questions);
                        entry.state.send_modify(|task| {
                            task.status = TaskStatus::Completed;
                            task.result_count = Some(added);
                            task.progress_message = format!("Imported {added} questions");
                        });
                        info!("merged {added} questions");
                    }
                    Err(err) => settle_with_error(&tasks, id, err),
                }
            }
            .instrument(span),
        );

        snapshot
    }

    /// Start storing `doc` in the asset library under `subject`.
    ///
    /// A same-named asset in the same subject suspends the job in
    /// [`TaskStatus::AwaitingDecision`] until [`ImportOrchestrator::decide`].
    pub fn submit_asset(&self, doc: RawDocument, subject: impl Into<String>) -> ImportTask {
        let task = ImportTask::new(&doc.name, subject, TaskKind::AssetStorage);
        let snapshot = task.clone();
        let ctx = self.register(task);

        let tasks = self.tasks.clone();
        let assets = self.assets.clone();
        let subject = snapshot.subject.clone();
        let span = info_span!("store", task = %snapshot.id, file = %doc.name);

        tokio::spawn(
            async move {
                let id = ctx.id;
                if let Err(err) = store_asset(&tasks, assets.as_ref(), doc, &subject, &ctx).await {
                    settle_with_error(&tasks, id, err);
                }
            }
            .instrument(span),
        );

        snapshot
    }

    /// Resume a job suspended on a duplicate asset.
    pub fn decide(&self, id: Uuid, decision: DuplicateDecision) -> Result<(), QbankError> {
        let mut entry = self.tasks.get_mut(&id).context(TaskNotFoundSnafu { id })?;
        let sender = entry
            .decision
            .take()
            .context(NoPendingDecisionSnafu { id })?;

        entry.state.send_modify(|task| {
            task.status = TaskStatus::Processing;
            task.progress_message = "Resuming".to_string();
        });
        // the job only goes away after a cancel, which already settled the task
        let _ = sender.send(decision);
        Ok(())
    }

    /// Request cancellation. The task is marked cancelled at once; the job stops
    /// at its next checkpoint without merging.
    pub fn cancel(&self, id: Uuid) -> Result<ImportTask, QbankError> {
        let mut entry = self.tasks.get_mut(&id).context(TaskNotFoundSnafu { id })?;
        if entry.state.borrow().status.is_terminal() {
            return Ok(entry.snapshot());
        }

        entry.cancel.cancel();
        entry.decision.take();
        entry.state.send_modify(|task| {
            task.status = TaskStatus::Cancelled;
            task.progress_message = "Cancelled".to_string();
        });
        info!("task {id} cancelled");
        Ok(entry.snapshot())
    }

    /// Cancel a task if it is still running and forget it.
    pub fn remove(&self, id: Uuid) -> Option<ImportTask> {
        let _ = self.cancel(id);
        self.tasks.remove(&id).map(|(_, entry)| entry.snapshot())
    }

    pub fn get(&self, id: Uuid) -> Option<ImportTask> {
        self.tasks.get(&id).map(|entry| entry.snapshot())
    }

    /// All tasks, newest first.
    pub fn list(&self) -> Vec<ImportTask> {
        let mut tasks = self
            .tasks
            .iter()
            .map(|entry| entry.snapshot())
            .collect::<Vec<_>>();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        tasks
    }

    /// Watch a task's snapshots as they change.
    pub fn subscribe(&self, id: Uuid) -> Result<watch::Receiver<ImportTask>, QbankError> {
        let entry = self.tasks.get(&id).context(TaskNotFoundSnafu { id })?;
        Ok(entry.state.subscribe())
    }

    /// Resolve once the task reaches a terminal state.
    pub async fn wait(&self, id: Uuid) -> Result<ImportTask, QbankError> {
        let mut rx = self.subscribe(id)?;
        let task = rx
            .wait_for(|task| task.status.is_terminal())
            .await
            .map(|task| task.clone());
        task.ok().context(TaskNotFoundSnafu { id })
    }

    /// Wait for every registered task.
    pub async fn wait_all(&self) -> Vec<Result<ImportTask, QbankError>> {
        let ids = self.tasks.iter().map(|entry| *entry.key()).collect::<Vec<_>>();
        join_all(ids.into_iter().map(|id| self.wait(id))).await
    }
}

fn update(tasks: &Registry, id: Uuid, modify: impl FnOnce(&mut ImportTask)) {
    if let Some(entry) = tasks.get_mut(&id) {
        if entry.is_settled() {
            return;
        }
        entry.state.send_modify(modify);
    }
}

fn settle_with_error(tasks: &Registry, id: Uuid, err: QbankError) {
    let Some(entry) = tasks.get_mut(&id) else {
        return;
    };
    if entry.state.borrow().status.is_terminal() {
        return;
    }

    if err.is_cancelled() {
        entry.state.send_modify(|task| {
            task.status = TaskStatus::Cancelled;
            task.progress_message = "Cancelled".to_string();
        });
        return;
    }

    warn!("task {id} failed: {err}");
    entry.state.send_modify(|task| {
        task.status = TaskStatus::Error;
        task.progress_message = "Failed".to_string();
        task.error_message = Some(err.to_string());
    });
}

/// The task's entry, unless it was cancelled or has already finished.
fn live_entry(tasks: &Registry, id: Uuid) -> Result<RefMut<'_, Uuid, TaskEntry>, QbankError> {
    let entry = tasks.get_mut(&id).context(TaskNotFoundSnafu { id })?;
    ensure!(!entry.is_settled(), CancelledSnafu);
    Ok(entry)
}

fn complete_store(entry: &TaskEntry) {
    entry.state.send_modify(|task| {
        task.status = TaskStatus::Completed;
        task.result_count = Some(1);
        task.progress_message = "Stored".to_string();
    });
}

async fn store_asset(
    tasks: &Registry,
    assets: &dyn AssetStore,
    doc: RawDocument,
    subject: &str,
    ctx: &TaskContext,
) -> Result<(), QbankError> {
    ctx.checkpoint()?;
    let id = ctx.id;

    let existing = match assets.find_by_name(subject, &doc.name) {
        Some(existing) => existing,
        None => {
            let entry = live_entry(tasks, id)?;
            let asset = StoredAsset {
                id: Uuid::new_v4(),
                name: doc.name.clone(),
                subject: subject.to_string(),
                size: doc.size(),
                added_at: Utc::now(),
                sort_key: 0,
                favorite: false,
                content: doc.payload.clone(),
            };
            match assets.insert_new(asset) {
                None => {
                    complete_store(&entry);
                    return Ok(());
                }
                // a same-named import got there first
                Some(existing) => existing,
            }
        }
    };

    await_decision(tasks, &doc, ctx).await?;

    let entry = live_entry(tasks, id)?;
    assets.upsert(StoredAsset {
        name: doc.name.clone(),
        subject: subject.to_string(),
        size: doc.size(),
        added_at: Utc::now(),
        content: doc.payload.clone(),
        ..existing
    });
    complete_store(&entry);
    Ok(())
}

/// Suspend in `AwaitingDecision` until the duplicate is resolved; `Cancel`,
/// a dropped decision or a task cancel all end the job.
async fn await_decision(
    tasks: &Registry,
    doc: &RawDocument,
    ctx: &TaskContext,
) -> Result<(), QbankError> {
    let (sender, receiver) = oneshot::channel();
    {
        let mut entry = live_entry(tasks, ctx.id)?;
        entry.decision = Some(sender);
        entry.state.send_modify(|task| {
            task.status = TaskStatus::AwaitingDecision;
            task.progress_message = format!("`{}` already exists", doc.name);
        });
    }
    info!("duplicate asset, waiting for a decision");

    let decision = tokio::select! {
        decision = receiver => decision.unwrap_or(DuplicateDecision::Cancel),
        _ = ctx.cancel.cancelled() => DuplicateDecision::Cancel,
    };
    ensure!(decision == DuplicateDecision::Overwrite, CancelledSnafu);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use bytes::Bytes;
    use chrono::DateTime;
    use tokio::sync::Notify;

    use super::*;
    use crate::{
        config::PipelineConfig,
        ocr::OcrEngine,
        preprocess::PreparedImage,
        question::ParsedQuestion,
        srs::{Grade, SrsRecord},
        store::{MemoryAssetLibrary, MemoryQuestionBank, StoredQuestion},
    };

    const QUESTION_TEXT: &str = "1. Sky?\nA. Blue\nB. Red\n答案：A";

    /// OCR that blocks until the test opens the gate, ignoring cancellation.
    struct GatedOcr(Arc<Notify>);

    #[async_trait]
    impl OcrEngine for GatedOcr {
        async fn recognize(
            &self,
            _image: &PreparedImage,
            _ctx: &TaskContext,
        ) -> Result<String, QbankError> {
            self.0.notified().await;
            Ok(QUESTION_TEXT.to_string())
        }
    }

    struct Fixture {
        orchestrator: ImportOrchestrator,
        bank: MemoryQuestionBank,
        library: MemoryAssetLibrary,
        gate: Arc<Notify>,
    }

    fn fixture() -> Fixture {
        let gate = Arc::new(Notify::new());
        let bank = MemoryQuestionBank::new();
        let library = MemoryAssetLibrary::new();
        let pipeline = ImportPipeline::new(PipelineConfig::default())
            .with_ocr(Arc::new(GatedOcr(gate.clone())));
        let orchestrator =
            ImportOrchestrator::new(pipeline, Arc::new(bank.clone()), Arc::new(library.clone()));
        Fixture {
            orchestrator,
            bank,
            library,
            gate,
        }
    }

    fn csv(name: &str) -> RawDocument {
        RawDocument::new(name, "text/csv", "Sky?,Blue,Red,A\nSea?,Green,Blue,B\n".as_bytes().to_vec())
    }

    fn scan() -> RawDocument {
        RawDocument::new("scan.png", "image/png", Vec::new())
    }

    fn stored(name: &str, sort_key: i64, content: &'static [u8]) -> StoredAsset {
        StoredAsset {
            id: Uuid::new_v4(),
            name: name.to_string(),
            subject: "math".to_string(),
            size: content.len(),
            added_at: Utc::now(),
            sort_key,
            favorite: true,
            content: Bytes::from_static(content),
        }
    }

    async fn awaiting_decision(orchestrator: &ImportOrchestrator, id: Uuid) {
        let mut rx = orchestrator.subscribe(id).unwrap();
        rx.wait_for(|task| task.status == TaskStatus::AwaitingDecision)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_question_import_merges_once() -> Result<(), Box<dyn std::error::Error>> {
        let f = fixture();

        let task = f.orchestrator.submit_questions(csv("bank.csv"), "geo");
        assert_eq!(task.status, TaskStatus::Processing);
        let done = f.orchestrator.wait(task.id).await?;

        assert_eq!(done.status, TaskStatus::Completed);
        assert_eq!(done.found_count, Some(2));
        assert_eq!(done.result_count, Some(2));
        assert_eq!(f.bank.len(), 2);
        assert!(f.bank.list().iter().all(|q| q.subject == "geo"));
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_import_reports_error() -> Result<(), Box<dyn std::error::Error>> {
        let f = fixture();
        let doc = RawDocument::new("notes.docx", "application/octet-stream", Vec::new());

        let task = f.orchestrator.submit_questions(doc, "geo");
        let done = f.orchestrator.wait(task.id).await?;

        assert_eq!(done.status, TaskStatus::Error);
        assert!(done.error_message.is_some_and(|m| m.contains("notes.docx")));
        assert!(f.bank.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_cancelled_import_never_merges() -> Result<(), Box<dyn std::error::Error>> {
        let f = fixture();

        let task = f.orchestrator.submit_questions(scan(), "geo");
        let cancelled = f.orchestrator.cancel(task.id)?;
        assert_eq!(cancelled.status, TaskStatus::Cancelled);

        f.gate.notify_one();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let done = f.orchestrator.wait(task.id).await?;
        assert_eq!(done.status, TaskStatus::Cancelled);
        assert_eq!(done.progress_message, "Cancelled");
        assert!(f.bank.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_imports_are_additive() -> Result<(), Box<dyn std::error::Error>> {
        let f = fixture();

        f.orchestrator.submit_questions(csv("a.csv"), "geo");
        f.orchestrator.submit_questions(csv("b.csv"), "geo");
        f.orchestrator.submit_questions(scan(), "geo");
        f.gate.notify_one();

        let results = f.orchestrator.wait_all().await;
        assert!(results.iter().all(|r| r.as_ref().is_ok_and(|t| t.status == TaskStatus::Completed)));
        assert_eq!(f.bank.len(), 5);
        Ok(())
    }

    #[tokio::test]
    async fn test_new_asset_gets_next_sort_key() -> Result<(), Box<dyn std::error::Error>> {
        let f = fixture();
        f.library.upsert(stored("old.pdf", 3, b"old"));

        let task = f.orchestrator.submit_asset(csv("new.csv"), "math");
        let done = f.orchestrator.wait(task.id).await?;

        assert_eq!(done.status, TaskStatus::Completed);
        let asset = f.library.find_by_name("math", "new.csv").ok_or("asset missing")?;
        assert_eq!(asset.sort_key, 4);
        assert!(!asset.favorite);
        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_overwrite_keeps_order_and_favorite()
    -> Result<(), Box<dyn std::error::Error>> {
        let f = fixture();
        let original = stored("paper.pdf", 7, b"v1");
        f.library.upsert(original.clone());

        let doc = RawDocument::new("paper.pdf", "application/pdf", b"version two".to_vec());
        let task = f.orchestrator.submit_asset(doc, "math");
        awaiting_decision(&f.orchestrator, task.id).await;
        f.orchestrator.decide(task.id, DuplicateDecision::Overwrite)?;
        let done = f.orchestrator.wait(task.id).await?;

        assert_eq!(done.status, TaskStatus::Completed);
        let asset = f.library.get(original.id).ok_or("asset missing")?;
        assert_eq!(asset.sort_key, 7);
        assert!(asset.favorite);
        assert_eq!(asset.size, 11);
        assert_eq!(asset.content, Bytes::from_static(b"version two"));
        assert_eq!(f.library.list().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_cancel_leaves_asset() -> Result<(), Box<dyn std::error::Error>> {
        let f = fixture();
        let original = stored("paper.pdf", 7, b"v1");
        f.library.upsert(original.clone());

        let doc = RawDocument::new("paper.pdf", "application/pdf", b"version two".to_vec());
        let task = f.orchestrator.submit_asset(doc, "math");
        awaiting_decision(&f.orchestrator, task.id).await;
        f.orchestrator.decide(task.id, DuplicateDecision::Cancel)?;
        let done = f.orchestrator.wait(task.id).await?;

        assert_eq!(done.status, TaskStatus::Cancelled);
        assert!(done.error_message.is_none());
        assert_eq!(f.library.get(original.id), Some(original));
        Ok(())
    }

    #[tokio::test]
    async fn test_decide_without_pending_decision() -> Result<(), Box<dyn std::error::Error>> {
        let f = fixture();
        let task = f.orchestrator.submit_questions(csv("a.csv"), "geo");
        f.orchestrator.wait(task.id).await?;

        let err = f
            .orchestrator
            .decide(task.id, DuplicateDecision::Overwrite)
            .unwrap_err();
        assert!(matches!(err, QbankError::NoPendingDecision { .. }));

        let err = f
            .orchestrator
            .decide(Uuid::new_v4(), DuplicateDecision::Overwrite)
            .unwrap_err();
        assert!(matches!(err, QbankError::TaskNotFound { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_list_and_remove() -> Result<(), Box<dyn std::error::Error>> {
        let f = fixture();
        let first = f.orchestrator.submit_questions(csv("a.csv"), "geo");
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = f.orchestrator.submit_questions(scan(), "geo");

        let ids = f.orchestrator.list().iter().map(|t| t.id).collect::<Vec<_>>();
        assert_eq!(ids, vec![second.id, first.id]);

        let removed = f.orchestrator.remove(second.id).ok_or("task missing")?;
        assert_eq!(removed.status, TaskStatus::Cancelled);
        assert!(f.orchestrator.get(second.id).is_none());
        assert!(f.orchestrator.wait(second.id).await.is_err());
        Ok(())
    }

    /// Records the task's found count as seen at merge time.
    #[derive(Default)]
    struct WatchingBank {
        bank: MemoryQuestionBank,
        watched: std::sync::Mutex<Option<watch::Receiver<ImportTask>>>,
        seen: std::sync::Mutex<Vec<(TaskStatus, Option<usize>)>>,
    }

    impl QuestionStore for WatchingBank {
        fn merge(&self, source_file: &str, subject: &str, questions: Vec<ParsedQuestion>) -> usize {
            if let Some(rx) = self.watched.lock().unwrap().as_ref() {
                let task = rx.borrow();
                self.seen.lock().unwrap().push((task.status, task.found_count));
            }
            self.bank.merge(source_file, subject, questions)
        }

        fn review(
            &self,
            id: Uuid,
            grade: Grade,
            now: DateTime<Utc>,
        ) -> Result<SrsRecord, QbankError> {
            self.bank.review(id, grade, now)
        }

        fn due(&self, subject: &str, now: DateTime<Utc>) -> Vec<StoredQuestion> {
            self.bank.due(subject, now)
        }

        fn list(&self) -> Vec<StoredQuestion> {
            self.bank.list()
        }
    }

    #[tokio::test]
    async fn test_found_count_set_before_merge() -> Result<(), Box<dyn std::error::Error>> {
        let gate = Arc::new(Notify::new());
        let bank = Arc::new(WatchingBank::default());
        let pipeline = ImportPipeline::new(PipelineConfig::default())
            .with_ocr(Arc::new(GatedOcr(gate.clone())));
        let orchestrator =
            ImportOrchestrator::new(pipeline, bank.clone(), Arc::new(MemoryAssetLibrary::new()));

        let task = orchestrator.submit_questions(scan(), "geo");
        *bank.watched.lock().unwrap() = Some(orchestrator.subscribe(task.id)?);
        gate.notify_one();
        let done = orchestrator.wait(task.id).await?;

        assert_eq!(done.found_count, Some(1));
        assert_eq!(
            *bank.seen.lock().unwrap(),
            vec![(TaskStatus::Processing, Some(1))]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_same_name_assets_store_once() -> Result<(), Box<dyn std::error::Error>>
    {
        let f = fixture();

        let first = f.orchestrator.submit_asset(csv("paper.csv"), "math");
        let second = f.orchestrator.submit_asset(csv("paper.csv"), "math");
        let mut statuses = Vec::new();
        for id in [first.id, second.id] {
            let mut rx = f.orchestrator.subscribe(id)?;
            let task = rx
                .wait_for(|t| t.status.is_terminal() || t.status == TaskStatus::AwaitingDecision)
                .await?
                .clone();
            statuses.push(task.status);
        }
        statuses.sort_by_key(|status| *status == TaskStatus::Completed);

        assert_eq!(statuses, vec![TaskStatus::AwaitingDecision, TaskStatus::Completed]);
        assert_eq!(f.library.list().len(), 1);
        Ok(())
    }
}
