// SPDX-License-Identifier: MIT

//! Stages and the ordered stage registry

use async_trait::async_trait;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use super::error::FlowError;
use super::interrupt::{InterruptPayload, Resume};
use super::state::SharedState;

/// What a stage sees when invoked
pub struct StageContext<'a, S> {
    pub run_id: &'a str,
    /// State as of the start of this invocation
    pub state: &'a S,
    /// Present only when re-entering the stage that suspended
    pub resume: Option<&'a Resume>,
}

impl<S> Clone for StageContext<'_, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S> Copy for StageContext<'_, S> {}

/// Result of a stage invocation
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome<U> {
    /// Merge the partial update and move to the next stage
    Continue(U),
    /// Pause the run until the caller resumes it
    Suspend(InterruptPayload),
}

/// A named unit of work in the pipeline
///
/// Stages never persist anything themselves and never fail: problems are
/// reported through the partial update.
#[async_trait]
pub trait Stage<S: SharedState>: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, ctx: StageContext<'_, S>) -> StageOutcome<S::Update>;
}

/// Adapter turning a plain function into a stage
pub struct FnStage<S, F> {
    name: String,
    func: F,
    _state: PhantomData<fn(&S)>,
}

impl<S, F> FnStage<S, F>
where
    S: SharedState,
    F: Fn(StageContext<'_, S>) -> StageOutcome<S::Update> + Send + Sync,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
            _state: PhantomData,
        }
    }
}

#[async_trait]
impl<S, F> Stage<S> for FnStage<S, F>
where
    S: SharedState,
    F: Fn(StageContext<'_, S>) -> StageOutcome<S::Update> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: StageContext<'_, S>) -> StageOutcome<S::Update> {
        (self.func)(ctx)
    }
}

/// Fixed, linear order of stages
pub struct StageRegistry<S: SharedState> {
    stages: Vec<Arc<dyn Stage<S>>>,
}

impl<S: SharedState> StageRegistry<S> {
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Append a stage; names must be unique
    pub fn register(&mut self, stage: Arc<dyn Stage<S>>) -> Result<(), FlowError> {
        if self.position_of(stage.name()).is_some() {
            return Err(FlowError::DuplicateStage(stage.name().to_string()));
        }
        log::debug!("Registered stage {}: {}", self.stages.len(), stage.name());
        self.stages.push(stage);
        Ok(())
    }

    /// Builder-style `register`
    pub fn with(mut self, stage: Arc<dyn Stage<S>>) -> Result<Self, FlowError> {
        self.register(stage)?;
        Ok(self)
    }

    /// Stage names in execution order
    pub fn sequence(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn get(&self, position: usize) -> Option<&Arc<dyn Stage<S>>> {
        self.stages.get(position)
    }

    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.stages.iter().position(|s| s.name() == name)
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl<S: SharedState> Default for StageRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: SharedState> fmt::Debug for StageRegistry<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageRegistry")
            .field("stages", &self.sequence())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    crate::shared_state! {
        pub struct Counter, update CounterUpdate {
            hits: Vec<String> => append,
        }
    }

    fn noop(name: &str) -> Arc<dyn Stage<Counter>> {
        Arc::new(FnStage::new(name, |_ctx: StageContext<'_, Counter>| {
            StageOutcome::Continue(CounterUpdate::default())
        }))
    }

    #[test]
    fn test_register_keeps_order() {
        let mut registry = StageRegistry::new();
        registry.register(noop("parse")).unwrap();
        registry.register(noop("research")).unwrap();
        registry.register(noop("budget")).unwrap();

        assert_eq!(registry.sequence(), vec!["parse", "research", "budget"]);
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.position_of("research"), Some(1));
        assert_eq!(registry.get(2).map(|s| s.name()), Some("budget"));
        assert!(registry.get(3).is_none());
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let registry = StageRegistry::new().with(noop("parse")).unwrap();
        let err = registry.with(noop("parse")).unwrap_err();
        assert!(matches!(err, FlowError::DuplicateStage(ref n) if n == "parse"));
        assert_eq!(err.code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_empty_registry() {
        let registry: StageRegistry<Counter> = StageRegistry::default();
        assert!(registry.is_empty());
        assert!(registry.sequence().is_empty());
    }

    #[tokio::test]
    async fn test_fn_stage_sees_context() {
        let stage = FnStage::new("echo", |ctx: StageContext<'_, Counter>| {
            let mut hits = vec![ctx.run_id.to_string()];
            if ctx.resume.is_some() {
                hits.push("resumed".to_string());
            }
            StageOutcome::Continue(CounterUpdate { hits: Some(hits) })
        });

        let state = Counter::default();
        let resume = Resume::approve();
        let outcome = stage
            .run(StageContext {
                run_id: "run-1",
                state: &state,
                resume: Some(&resume),
            })
            .await;

        match outcome {
            StageOutcome::Continue(update) => {
                assert_eq!(update.hits, Some(vec!["run-1".into(), "resumed".into()]))
            }
            StageOutcome::Suspend(_) => panic!("expected continue"),
        }
    }
}
