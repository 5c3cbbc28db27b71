//! Error types for the graph engine
//!
//! Construction errors abort graph creation. Build errors abort the current
//! run but leave the graph reusable.

use std::time::Duration;

use thiserror::Error;

use crate::vertex::VertexId;

/// Boxed error returned by component builds
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn join_ids(ids: &[VertexId]) -> String {
    ids.iter()
        .map(VertexId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors raised while building, scheduling or running a graph
#[derive(Debug, Error)]
pub enum GraphError {
    /// An edge references a vertex id that is not in the graph
    #[error("Edge {source_id} -> {target_id} references missing vertex {missing}")]
    MissingVertex {
        source_id: VertexId,
        target_id: VertexId,
        missing: VertexId,
    },

    /// A vertex has no incident edge in a multi-vertex graph
    #[error("Vertex {0} is not connected to any other vertex")]
    DisconnectedVertex(VertexId),

    /// Two vertices share the same id
    #[error("Duplicate vertex id: {0}")]
    DuplicateVertex(VertexId),

    /// More than one input vertex was scheduled
    #[error("Only one input vertex is allowed, found: {}", join_ids(.0))]
    MultipleEntryPoints(Vec<VertexId>),

    /// Scheduling stalled on a cycle
    #[error("Schedule deadlocked on a cycle, unresolved vertices: {}", join_ids(.0))]
    CycleDeadlock(Vec<VertexId>),

    /// A component build failed
    #[error("Vertex {vertex_id} failed in layer {layer}: {message}")]
    VertexBuild {
        vertex_id: VertexId,
        layer: usize,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Lookup of an unknown vertex id
    #[error("Vertex not found: {0}")]
    VertexNotFound(VertexId),

    /// No factory can build the declared component type
    #[error("No component registered for type {type_name} (vertex {vertex_id})")]
    UnknownComponent {
        vertex_id: VertexId,
        type_name: String,
    },

    /// Both start and stop bounds were given
    #[error("Only one of start vertex ({start}) and stop vertex ({stop}) may be set")]
    ConflictingBounds { start: VertexId, stop: VertexId },

    /// The graph payload could not be decoded
    #[error("Invalid graph payload: {0}")]
    InvalidPayload(String),

    /// The whole run exceeded the configured timeout
    #[error("Run timed out after {0:?}")]
    RunTimeout(Duration),

    /// State re-activation kept adding layers
    #[error("Run exceeded {0} layers")]
    MaxLayersExceeded(usize),

    /// Invalid engine configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl GraphError {
    /// Create a missing vertex error for an edge
    pub fn missing_vertex(
        source_id: impl Into<VertexId>,
        target_id: impl Into<VertexId>,
        missing: impl Into<VertexId>,
    ) -> Self {
        Self::MissingVertex {
            source_id: source_id.into(),
            target_id: target_id.into(),
            missing: missing.into(),
        }
    }

    /// Wrap a component error with the failing vertex and layer
    pub fn vertex_build(vertex_id: impl Into<VertexId>, layer: usize, source: BoxError) -> Self {
        Self::VertexBuild {
            vertex_id: vertex_id.into(),
            layer,
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Create a build error without an underlying source
    pub fn vertex_build_message(
        vertex_id: impl Into<VertexId>,
        layer: usize,
        message: impl Into<String>,
    ) -> Self {
        Self::VertexBuild {
            vertex_id: vertex_id.into(),
            layer,
            message: message.into(),
            source: None,
        }
    }

    /// Create a payload error
    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Self::InvalidPayload(message.into())
    }

    /// Create a config error
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }

    /// Check if the error aborts graph construction
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            GraphError::MissingVertex { .. }
                | GraphError::DisconnectedVertex(_)
                | GraphError::DuplicateVertex(_)
                | GraphError::UnknownComponent { .. }
                | GraphError::InvalidPayload(_)
        )
    }

    /// Check if the error came from a component build
    pub fn is_build_error(&self) -> bool {
        matches!(self, GraphError::VertexBuild { .. })
    }

    /// The vertex the error is attached to, if any
    pub fn vertex_id(&self) -> Option<&VertexId> {
        match self {
            GraphError::MissingVertex { missing, .. } => Some(missing),
            GraphError::DisconnectedVertex(id)
            | GraphError::DuplicateVertex(id)
            | GraphError::VertexNotFound(id) => Some(id),
            GraphError::VertexBuild { vertex_id, .. }
            | GraphError::UnknownComponent { vertex_id, .. } => Some(vertex_id),
            _ => None,
        }
    }

    /// The layer index of a build failure
    pub fn layer(&self) -> Option<usize> {
        match self {
            GraphError::VertexBuild { layer, .. } => Some(*layer),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for GraphError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidPayload(err.to_string())
    }
}
