// SPDX-License-Identifier: MIT

//! Resumable execution engine
//!
//! Drives a run through the registered stages in order. A stage may ask to
//! suspend; the engine then persists a checkpoint and hands control back to
//! the caller. `resume_run` re-enters the same stage with the caller's answer
//! and continues forward until the next suspension or completion.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use super::checkpoint::{Checkpoint, CheckpointStore, RunStatus};
use super::error::FlowError;
use super::interrupt::{InterruptPayload, Resume};
use super::stage::{StageContext, StageOutcome, StageRegistry};
use super::state::SharedState;

/// Caller-facing view of a run after an engine operation
#[derive(Debug, Clone, Serialize)]
pub struct RunReport<S> {
    pub run_id: String,
    pub status: RunStatus,
    pub position: usize,
    pub paused_stage: Option<String>,
    pub state: S,
    pub interrupt: Option<InterruptPayload>,
    pub error: Option<String>,
}

impl<S: SharedState> RunReport<S> {
    fn from_checkpoint(checkpoint: Checkpoint) -> Result<Self, FlowError> {
        Ok(Self {
            state: S::restore(checkpoint.state)?,
            run_id: checkpoint.run_id,
            status: checkpoint.status,
            position: checkpoint.position,
            paused_stage: checkpoint.paused_stage,
            interrupt: checkpoint.interrupt,
            error: checkpoint.error,
        })
    }
}

/// Where a run is, and which stored version it was loaded from
struct Cursor {
    run_id: String,
    position: usize,
    version: u64,
    created_at: DateTime<Utc>,
}

/// Checkpointed, linear stage executor
pub struct Engine<S: SharedState> {
    registry: StageRegistry<S>,
    store: Arc<dyn CheckpointStore>,
    run_ttl: Option<Duration>,
}

impl<S: SharedState> Engine<S> {
    pub fn new(registry: StageRegistry<S>, store: Arc<dyn CheckpointStore>) -> Result<Self, FlowError> {
        if registry.is_empty() {
            return Err(FlowError::config("pipeline has no stages"));
        }
        log::info!("Engine ready with stages: {:?}", registry.sequence());
        Ok(Self {
            registry,
            store,
            run_ttl: None,
        })
    }

    /// Expire runs whose last checkpoint is older than `ttl`
    pub fn with_run_ttl(mut self, ttl: Duration) -> Self {
        self.run_ttl = Some(ttl);
        self
    }

    /// Start a run under a generated id
    pub async fn create_run(&self, initial: S::Update) -> Result<RunReport<S>, FlowError> {
        let run_id = format!("plan-{}", Uuid::new_v4());
        self.start_run(&run_id, initial).await
    }

    /// Start a run under a caller-chosen id
    pub async fn start_run(
        &self,
        run_id: &str,
        initial: S::Update,
    ) -> Result<RunReport<S>, FlowError> {
        if self.store.load(run_id).await?.is_some() {
            return Err(FlowError::RunExists(run_id.to_string()));
        }

        let mut state = S::default();
        state.apply(initial)?;

        log::info!("Starting run {}", run_id);
        let cursor = Cursor {
            run_id: run_id.to_string(),
            position: 0,
            version: 0,
            created_at: Utc::now(),
        };
        self.drive(cursor, state, None).await
    }

    /// Continue a suspended run, handing `resume` to the stage that paused it
    pub async fn resume_run(&self, run_id: &str, resume: Resume) -> Result<RunReport<S>, FlowError> {
        let checkpoint = self
            .store
            .load(run_id)
            .await?
            .ok_or_else(|| FlowError::RunNotFound(run_id.to_string()))?;

        match checkpoint.status {
            RunStatus::AwaitingApproval => {}
            RunStatus::Complete => return Err(FlowError::AlreadyComplete(run_id.to_string())),
            status => {
                return Err(FlowError::NotSuspended {
                    run_id: run_id.to_string(),
                    status,
                })
            }
        }

        log::info!(
            "Resuming run {} at stage {:?} (position {})",
            run_id,
            checkpoint.paused_stage,
            checkpoint.position
        );

        let cursor = Cursor {
            run_id: checkpoint.run_id,
            position: checkpoint.position,
            version: checkpoint.version,
            created_at: checkpoint.created_at,
        };
        let state = S::restore(checkpoint.state)?;
        self.drive(cursor, state, Some(resume)).await
    }

    /// Read-only view of a run
    pub async fn get_run(&self, run_id: &str) -> Result<Option<RunReport<S>>, FlowError> {
        match self.store.load(run_id).await? {
            Some(checkpoint) => Ok(Some(RunReport::from_checkpoint(checkpoint)?)),
            None => Ok(None),
        }
    }

    pub async fn list_runs(&self) -> Result<Vec<String>, FlowError> {
        Ok(self.store.list().await?)
    }

    /// Drop runs older than the configured TTL; no TTL means nothing expires
    pub async fn prune_expired(&self) -> Result<usize, FlowError> {
        // A TTL reaching past the earliest representable time expires nothing
        match self.run_ttl.and_then(|ttl| Utc::now().checked_sub_signed(ttl)) {
            Some(cutoff) => self.prune_older_than(cutoff).await,
            None => Ok(0),
        }
    }

    /// Drop runs whose last checkpoint predates `cutoff`
    pub async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, FlowError> {
        let mut removed = 0;
        for run_id in self.store.list().await? {
            let stale = self
                .store
                .load(&run_id)
                .await?
                .is_some_and(|c| c.updated_at < cutoff);
            if stale && self.store.delete(&run_id).await? {
                removed += 1;
            }
        }
        if removed > 0 {
            log::info!("Pruned {} expired run(s)", removed);
        }
        Ok(removed)
    }

    async fn drive(
        &self,
        mut cursor: Cursor,
        mut state: S,
        mut resume: Option<Resume>,
    ) -> Result<RunReport<S>, FlowError> {
        loop {
            let Some(stage) = self.registry.get(cursor.position) else {
                log::info!("Run {} complete", cursor.run_id);
                return self
                    .commit(&cursor, RunStatus::Complete, state, None, None, None)
                    .await;
            };

            log::info!(
                "Run {} executing stage {} ({}/{})",
                cursor.run_id,
                stage.name(),
                cursor.position + 1,
                self.registry.len()
            );

            let ctx = StageContext {
                run_id: &cursor.run_id,
                state: &state,
                resume: resume.as_ref(),
            };

            match stage.run(ctx).await {
                StageOutcome::Continue(update) => {
                    // Merge into a copy so a rejected update leaves state untouched
                    let mut next = state.clone();
                    if let Err(e) = next.apply(update) {
                        let message = format!("stage '{}' returned an invalid update: {}", stage.name(), e);
                        log::error!("Run {} failed: {}", cursor.run_id, message);
                        return self
                            .commit(&cursor, RunStatus::Failed, state, None, None, Some(message))
                            .await;
                    }
                    state = next;
                    resume = None;
                    cursor.position += 1;
                }
                StageOutcome::Suspend(payload) => {
                    log::info!(
                        "Run {} suspended at stage {} (checkpoint {})",
                        cursor.run_id,
                        stage.name(),
                        payload.checkpoint
                    );
                    let paused = Some(stage.name().to_string());
                    return self
                        .commit(
                            &cursor,
                            RunStatus::AwaitingApproval,
                            state,
                            paused,
                            Some(payload),
                            None,
                        )
                        .await;
                }
            }
        }
    }

    async fn commit(
        &self,
        cursor: &Cursor,
        status: RunStatus,
        state: S,
        paused_stage: Option<String>,
        interrupt: Option<InterruptPayload>,
        error: Option<String>,
    ) -> Result<RunReport<S>, FlowError> {
        let checkpoint = Checkpoint {
            run_id: cursor.run_id.clone(),
            status,
            position: cursor.position,
            paused_stage: paused_stage.clone(),
            state: state.snapshot()?,
            interrupt: interrupt.clone(),
            error: error.clone(),
            version: cursor.version + 1,
            created_at: cursor.created_at,
            updated_at: Utc::now(),
        };
        self.store.save(checkpoint).await?;

        Ok(RunReport {
            run_id: cursor.run_id.clone(),
            status,
            position: cursor.position,
            paused_stage,
            state,
            interrupt,
            error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::checkpoint::InMemoryCheckpointStore;
    use crate::flow::stage::{FnStage, Stage};
    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use tokio::sync::Barrier;

    crate::shared_state! {
        #[derive(PartialEq)]
        pub struct Trail, update TrailUpdate {
            input: String => replace,
            visited: Vec<String> => append,
            answer: Option<String> => replace,
        }
    }

    fn visit(name: &'static str) -> Arc<dyn Stage<Trail>> {
        Arc::new(FnStage::new(name, move |_ctx: StageContext<'_, Trail>| {
            StageOutcome::Continue(TrailUpdate {
                visited: Some(vec![name.to_string()]),
                ..Default::default()
            })
        }))
    }

    /// Suspends until resumed, then records the answer
    fn gate(name: &'static str) -> Arc<dyn Stage<Trail>> {
        Arc::new(FnStage::new(name, move |ctx: StageContext<'_, Trail>| {
            match ctx.resume {
                None => StageOutcome::Suspend(
                    InterruptPayload::new(name, "Approve?").with("visited", &ctx.state.visited),
                ),
                Some(resume) => StageOutcome::Continue(TrailUpdate {
                    visited: Some(vec![name.to_string()]),
                    answer: Some(Some(resume.value().to_string())),
                    ..Default::default()
                }),
            }
        }))
    }

    fn engine(stages: Vec<Arc<dyn Stage<Trail>>>) -> (Engine<Trail>, InMemoryCheckpointStore) {
        let store = InMemoryCheckpointStore::new();
        let mut registry = StageRegistry::new();
        for stage in stages {
            registry.register(stage).unwrap();
        }
        let engine = Engine::new(registry, Arc::new(store.clone())).unwrap();
        (engine, store)
    }

    fn start() -> TrailUpdate {
        TrailUpdate {
            input: Some("go".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_pipeline_rejected() {
        let result = Engine::<Trail>::new(
            StageRegistry::new(),
            Arc::new(InMemoryCheckpointStore::new()),
        );
        assert_eq!(result.err().map(|e| e.code()), Some("CONFIG_ERROR"));
    }

    #[tokio::test]
    async fn test_runs_to_completion_without_gates() {
        let (engine, _) = engine(vec![visit("a"), visit("b"), visit("c")]);
        let report = engine.create_run(start()).await.unwrap();

        assert_eq!(report.status, RunStatus::Complete);
        assert_eq!(report.position, 3);
        assert_eq!(report.state.visited, vec!["a", "b", "c"]);
        assert_eq!(report.state.input, "go");
        assert!(report.run_id.starts_with("plan-"));
    }

    #[tokio::test]
    async fn test_suspends_without_advancing() {
        let (engine, store) = engine(vec![visit("a"), gate("g"), visit("b")]);
        let report = engine.create_run(start()).await.unwrap();

        assert_eq!(report.status, RunStatus::AwaitingApproval);
        assert_eq!(report.position, 1);
        assert_eq!(report.paused_stage.as_deref(), Some("g"));
        let payload = report.interrupt.unwrap();
        assert_eq!(payload.checkpoint, "g");
        assert_eq!(payload.get("visited"), Some(&json!(["a"])));

        let stored = store.load(&report.run_id).await.unwrap().unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.position, 1);
    }

    #[tokio::test]
    async fn test_resume_reenters_paused_stage() {
        let (engine, _) = engine(vec![visit("a"), gate("g"), visit("b")]);
        let run_id = engine.create_run(start()).await.unwrap().run_id;

        let report = engine
            .resume_run(&run_id, Resume::new(json!({"ok": 1})))
            .await
            .unwrap();

        assert_eq!(report.status, RunStatus::Complete);
        assert_eq!(report.state.visited, vec!["a", "g", "b"]);
        assert_eq!(report.state.answer.as_deref(), Some(r#"{"ok":1}"#));
    }

    #[tokio::test]
    async fn test_resume_value_not_leaked_to_later_stages() {
        let (engine, _) = engine(vec![gate("g1"), gate("g2")]);
        let run_id = engine.create_run(start()).await.unwrap().run_id;

        let report = engine.resume_run(&run_id, Resume::approve()).await.unwrap();
        assert_eq!(report.status, RunStatus::AwaitingApproval);
        assert_eq!(report.paused_stage.as_deref(), Some("g2"));
        assert_eq!(report.position, 1);
    }

    #[tokio::test]
    async fn test_positions_are_monotonic() {
        let (engine, _) = engine(vec![
            visit("a"),
            gate("g1"),
            visit("b"),
            gate("g2"),
            visit("c"),
        ]);
        let first = engine.create_run(start()).await.unwrap();
        let second = engine
            .resume_run(&first.run_id, Resume::approve())
            .await
            .unwrap();
        let third = engine
            .resume_run(&first.run_id, Resume::approve())
            .await
            .unwrap();

        assert_eq!(
            vec![first.position, second.position, third.position],
            vec![1, 3, 5]
        );
        assert_eq!(third.status, RunStatus::Complete);
    }

    #[tokio::test]
    async fn test_rejected_resumes_do_not_mutate() {
        let (engine, store) = engine(vec![visit("a")]);
        let run_id = engine.create_run(start()).await.unwrap().run_id;
        let before = store.load(&run_id).await.unwrap();

        let err = engine
            .resume_run(&run_id, Resume::approve())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "ALREADY_COMPLETE");
        assert_eq!(store.load(&run_id).await.unwrap(), before);

        let err = engine
            .resume_run("missing", Resume::approve())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "RUN_NOT_FOUND");
        assert!(store.load("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_run_is_read_only() {
        let (engine, store) = engine(vec![visit("a"), gate("g")]);
        let run_id = engine.create_run(start()).await.unwrap().run_id;
        let before = store.load(&run_id).await.unwrap();

        for _ in 0..3 {
            let view = engine.get_run(&run_id).await.unwrap().unwrap();
            assert_eq!(view.status, RunStatus::AwaitingApproval);
            assert_eq!(view.position, 1);
            assert_eq!(view.state.visited, vec!["a"]);
        }
        assert_eq!(store.load(&run_id).await.unwrap(), before);
        assert!(engine.get_run("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_start_run_with_existing_id() {
        let (engine, _) = engine(vec![gate("g")]);
        engine.start_run("trip-1", start()).await.unwrap();
        let err = engine.start_run("trip-1", start()).await.unwrap_err();
        assert_eq!(err.code(), "RUN_EXISTS");
    }

    /// Hand-written state whose merge rejects one field value
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    struct Strict {
        items: Vec<String>,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct StrictUpdate {
        items: Option<Vec<String>>,
    }

    impl SharedState for Strict {
        type Update = StrictUpdate;

        fn schema() -> crate::flow::state::StateSchema {
            crate::flow::state::StateSchema::new()
                .field("items", crate::flow::state::MergeRule::Append)
        }

        fn apply(&mut self, update: StrictUpdate) -> Result<(), FlowError> {
            for item in update.items.unwrap_or_default() {
                if item == "bogus" {
                    return Err(FlowError::schema_mismatch("undeclared field 'bogus'"));
                }
                self.items.push(item);
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_schema_mismatch_fails_run_without_corrupting_state() {
        let push = |item: &'static str| -> Arc<dyn Stage<Strict>> {
            Arc::new(FnStage::new(item, move |_ctx: StageContext<'_, Strict>| {
                StageOutcome::Continue(StrictUpdate {
                    items: Some(vec![format!("{}-ok", item), item.to_string()]),
                })
            }))
        };
        let registry = StageRegistry::new()
            .with(push("fine"))
            .unwrap()
            .with(push("bogus"))
            .unwrap();
        let engine = Engine::new(registry, Arc::new(InMemoryCheckpointStore::new())).unwrap();

        let report = engine.create_run(StrictUpdate::default()).await.unwrap();
        assert_eq!(report.status, RunStatus::Failed);
        assert_eq!(report.position, 1);
        assert_eq!(report.state.items, vec!["fine-ok", "fine"]);
        assert!(report.error.unwrap().contains("bogus"));

        let err = engine
            .resume_run(&report.run_id, Resume::approve())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NOT_SUSPENDED");
    }

    /// Waits for a peer before finishing its resumed invocation
    struct RendezvousGate {
        barrier: Arc<Barrier>,
    }

    #[async_trait]
    impl Stage<Trail> for RendezvousGate {
        fn name(&self) -> &str {
            "rendezvous"
        }

        async fn run(&self, ctx: StageContext<'_, Trail>) -> StageOutcome<TrailUpdate> {
            if ctx.resume.is_none() {
                return StageOutcome::Suspend(InterruptPayload::new("rendezvous", "Approve?"));
            }
            self.barrier.wait().await;
            StageOutcome::Continue(TrailUpdate::default())
        }
    }

    #[tokio::test]
    async fn test_racing_resumes_conflict() {
        let gate: Arc<dyn Stage<Trail>> = Arc::new(RendezvousGate {
            barrier: Arc::new(Barrier::new(2)),
        });
        let (engine, store) = engine(vec![gate, visit("after")]);
        let run_id = engine.create_run(start()).await.unwrap().run_id;

        let (a, b) = tokio::join!(
            engine.resume_run(&run_id, Resume::approve()),
            engine.resume_run(&run_id, Resume::approve())
        );

        let codes: Vec<_> = [&a, &b]
            .iter()
            .map(|r| r.as_ref().err().map(|e| e.code()))
            .collect();
        assert!(codes.contains(&None));
        assert!(codes.contains(&Some("CONFLICT")));

        let stored = store.load(&run_id).await.unwrap().unwrap();
        assert_eq!(stored.status, RunStatus::Complete);
        assert_eq!(stored.version, 2);
    }

    #[tokio::test]
    async fn test_prune_older_than() {
        let (engine, store) = engine(vec![gate("g")]);
        engine.start_run("old", start()).await.unwrap();

        let past = Utc::now() - Duration::hours(1);
        assert_eq!(engine.prune_older_than(past).await.unwrap(), 0);
        assert_eq!(store.len().await, 1);

        let future = Utc::now() + Duration::seconds(1);
        assert_eq!(engine.prune_older_than(future).await.unwrap(), 1);
        assert!(engine.get_run("old").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_prune_with_unreachable_cutoff() {
        let (engine, _) = engine(vec![visit("a")]);
        let engine = engine.with_run_ttl(Duration::MAX);
        engine.create_run(start()).await.unwrap();
        assert_eq!(engine.prune_expired().await.unwrap(), 0);
        assert_eq!(engine.list_runs().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_prune_without_ttl_keeps_everything() {
        let (engine, _) = engine(vec![visit("a")]);
        engine.create_run(start()).await.unwrap();
        assert_eq!(engine.prune_expired().await.unwrap(), 0);
        assert_eq!(engine.list_runs().await.unwrap().len(), 1);
    }
}
