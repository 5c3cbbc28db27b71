//! Run requests, reports and results

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::GraphError;
use crate::vertex::VertexId;

/// Lifecycle of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    NotStarted,
    Running,
    Completed,
    Failed,
}

/// What happened to one scheduled vertex during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "error", rename_all = "snake_case")]
pub enum VertexOutcome {
    Built,
    Errored(String),
    /// Stopped because a sibling in the same layer failed
    Cancelled,
    /// Cut off by a routing decision
    Skipped,
    NotAttempted,
}

impl VertexOutcome {
    pub fn is_built(&self) -> bool {
        matches!(self, VertexOutcome::Built)
    }

    pub fn is_errored(&self) -> bool {
        matches!(self, VertexOutcome::Errored(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, VertexOutcome::Cancelled)
    }

    /// Marker used when a requested output has no value
    pub fn marker(&self) -> String {
        match self {
            VertexOutcome::Built => "built".to_string(),
            VertexOutcome::Errored(message) => format!("errored: {message}"),
            VertexOutcome::Cancelled => "cancelled".to_string(),
            VertexOutcome::Skipped => "skipped".to_string(),
            VertexOutcome::NotAttempted => "not attempted".to_string(),
        }
    }
}

/// Per-vertex outcomes of one `process()` call
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    /// Layers as they were executed, after any rescheduling
    pub layers: Vec<Vec<VertexId>>,
    outcomes: Vec<(VertexId, VertexOutcome)>,
    /// Position of each vertex in `outcomes`
    #[serde(skip)]
    index: HashMap<VertexId, usize>,
}

impl RunReport {
    /// Start a report with every scheduled vertex not attempted
    pub fn new(run_id: Uuid, scheduled: impl IntoIterator<Item = VertexId>) -> Self {
        let mut report = Self {
            run_id,
            started_at: Utc::now(),
            finished_at: None,
            status: RunStatus::Running,
            layers: Vec::new(),
            outcomes: Vec::new(),
            index: HashMap::new(),
        };
        for id in scheduled {
            report.set(&id, VertexOutcome::NotAttempted);
        }
        report
    }

    pub fn set(&mut self, id: &VertexId, outcome: VertexOutcome) {
        match self.index.get(id) {
            Some(&pos) => self.outcomes[pos].1 = outcome,
            None => {
                self.index.insert(id.clone(), self.outcomes.len());
                self.outcomes.push((id.clone(), outcome));
            }
        }
    }

    pub fn outcome(&self, id: &VertexId) -> Option<&VertexOutcome> {
        self.index.get(id).map(|&pos| &self.outcomes[pos].1)
    }

    pub fn outcomes(&self) -> &[(VertexId, VertexOutcome)] {
        &self.outcomes
    }

    /// Ids whose outcome matches `predicate`
    pub fn ids_where(&self, predicate: impl Fn(&VertexOutcome) -> bool) -> Vec<VertexId> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| predicate(outcome))
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub(crate) fn finish(&mut self, status: RunStatus) {
        self.status = status;
        self.finished_at = Some(Utc::now());
    }
}

/// Driver-side description of a run
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    /// Value handed to the input vertex as `input_value`
    pub input_value: Option<Value>,
    /// Per-vertex `input_value` overrides
    pub inputs: HashMap<VertexId, Value>,
    pub start: Option<VertexId>,
    pub stop: Option<VertexId>,
    /// Vertices to report; empty means every output vertex
    pub outputs: Vec<VertexId>,
}

impl RunRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input_value(mut self, value: Value) -> Self {
        self.input_value = Some(value);
        self
    }

    pub fn with_input(mut self, id: impl Into<VertexId>, value: Value) -> Self {
        self.inputs.insert(id.into(), value);
        self
    }

    pub fn start_from(mut self, id: impl Into<VertexId>) -> Self {
        self.start = Some(id.into());
        self
    }

    pub fn stop_at(mut self, id: impl Into<VertexId>) -> Self {
        self.stop = Some(id.into());
        self
    }

    pub fn with_output(mut self, id: impl Into<VertexId>) -> Self {
        self.outputs.push(id.into());
        self
    }
}

/// Result for one requested output vertex
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputResult {
    pub vertex_id: VertexId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OutputResult {
    pub fn is_ok(&self) -> bool {
        self.value.is_some()
    }
}

/// Outcome of [`Graph::run`](crate::Graph::run)
#[derive(Debug)]
pub struct RunResult {
    pub run_id: Uuid,
    pub outputs: Vec<OutputResult>,
    pub report: RunReport,
    /// Error that ended the run early
    pub failure: Option<GraphError>,
}

impl RunResult {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    pub fn output(&self, id: &VertexId) -> Option<&OutputResult> {
        self.outputs.iter().find(|output| &output.vertex_id == id)
    }
}
