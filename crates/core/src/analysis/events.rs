use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::analysis::AnalysisId;
use crate::domain::record::UserId;
use crate::errors::AnalysisError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStage {
    Idle,
    Fetching,
    Analyzing,
    Correlating,
    GeneratingInsights,
    GeneratingRecommendations,
    Scoring,
    Persisting,
    Done,
    Failed,
}

impl AnalysisStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Analyzing => "analyzing",
            Self::Correlating => "correlating",
            Self::GeneratingInsights => "generating_insights",
            Self::GeneratingRecommendations => "generating_recommendations",
            Self::Scoring => "scoring",
            Self::Persisting => "persisting",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Stages only move forward one step at a time; any live stage may fail.
    pub fn can_advance_to(self, next: AnalysisStage) -> bool {
        use AnalysisStage::*;

        if next == Failed {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (Idle, Fetching)
                | (Fetching, Analyzing)
                | (Analyzing, Correlating)
                | (Correlating, GeneratingInsights)
                | (GeneratingInsights, GeneratingRecommendations)
                | (GeneratingRecommendations, Scoring)
                | (Scoring, Persisting)
                | (Persisting, Done)
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome {
    Entered,
    Completed,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisEvent {
    pub event_id: String,
    pub analysis_id: AnalysisId,
    pub user_id: UserId,
    pub stage: AnalysisStage,
    pub outcome: StageOutcome,
    pub metadata: BTreeMap<String, String>,
    pub occurred_at: DateTime<Utc>,
}

impl AnalysisEvent {
    pub fn new(
        analysis_id: AnalysisId,
        user_id: UserId,
        stage: AnalysisStage,
        outcome: StageOutcome,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            analysis_id,
            user_id,
            stage,
            outcome,
            metadata: BTreeMap::new(),
            occurred_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

pub trait AnalysisEventSink: Send + Sync {
    fn emit(&self, event: AnalysisEvent);
}

#[derive(Clone, Default)]
pub struct InMemoryEventSink {
    events: Arc<Mutex<Vec<AnalysisEvent>>>,
}

impl InMemoryEventSink {
    pub fn events(&self) -> Vec<AnalysisEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn stages(&self) -> Vec<AnalysisStage> {
        self.events().into_iter().map(|event| event.stage).collect()
    }
}

impl AnalysisEventSink for InMemoryEventSink {
    fn emit(&self, event: AnalysisEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

/// Default sink: every stage change becomes a structured log line.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingEventSink;

impl AnalysisEventSink for TracingEventSink {
    fn emit(&self, event: AnalysisEvent) {
        match event.outcome {
            StageOutcome::Failed => tracing::warn!(
                event_name = "analysis.stage",
                analysis_id = %event.analysis_id,
                user_id = %event.user_id,
                stage = event.stage.as_str(),
                outcome = "failed",
                metadata = ?event.metadata,
                "analysis stage failed"
            ),
            _ => tracing::info!(
                event_name = "analysis.stage",
                analysis_id = %event.analysis_id,
                user_id = %event.user_id,
                stage = event.stage.as_str(),
                outcome = ?event.outcome,
                metadata = ?event.metadata,
                "analysis stage changed"
            ),
        }
    }
}

/// Walks one analysis through its stages and reports each move to the sink.
pub(crate) struct StageTracker {
    analysis_id: AnalysisId,
    user_id: UserId,
    current: AnalysisStage,
    sink: Arc<dyn AnalysisEventSink>,
}

impl StageTracker {
    pub(crate) fn new(
        analysis_id: AnalysisId,
        user_id: UserId,
        sink: Arc<dyn AnalysisEventSink>,
    ) -> Self {
        Self { analysis_id, user_id, current: AnalysisStage::Idle, sink }
    }

    pub(crate) fn current(&self) -> AnalysisStage {
        self.current
    }

    pub(crate) fn advance(&mut self, next: AnalysisStage) -> Result<(), AnalysisError> {
        self.advance_with(next, BTreeMap::new())
    }

    pub(crate) fn advance_with(
        &mut self,
        next: AnalysisStage,
        metadata: BTreeMap<String, String>,
    ) -> Result<(), AnalysisError> {
        if !self.current.can_advance_to(next) {
            return Err(AnalysisError::InvalidStageTransition { from: self.current, to: next });
        }
        self.current = next;

        let outcome = match next {
            AnalysisStage::Done => StageOutcome::Completed,
            _ => StageOutcome::Entered,
        };
        let mut event =
            AnalysisEvent::new(self.analysis_id.clone(), self.user_id.clone(), next, outcome);
        event.metadata = metadata;
        self.sink.emit(event);
        Ok(())
    }

    /// Records the failure against the stage that was running. No-op once terminal.
    pub(crate) fn fail(&mut self, error: &AnalysisError) {
        if !self.current.can_advance_to(AnalysisStage::Failed) {
            return;
        }
        let failed_in = self.current;
        self.current = AnalysisStage::Failed;
        self.sink.emit(
            AnalysisEvent::new(
                self.analysis_id.clone(),
                self.user_id.clone(),
                AnalysisStage::Failed,
                StageOutcome::Failed,
            )
            .with_metadata("failed_in", failed_in.as_str())
            .with_metadata("error_class", error.error_class())
            .with_metadata("error", error.to_string()),
        );
    }
}
