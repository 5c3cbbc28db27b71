//! flowgraph-engine: layered, cycle-tolerant execution of component graphs
//!
//! A flow is a directed graph of components wired port to port. The engine
//! validates the graph, computes a layered schedule (every vertex in a layer
//! can build concurrently), and executes it layer by layer on tokio.
//!
//! - `Graph`: owns vertices and edges, runs and merges live edits
//! - `Scheduler`: start/stop selection, cycle-tolerant Kahn layering,
//!   refinement, input-first ordering and build-time tie-breaks
//! - `cycle`: back-edge and cycle-membership analysis
//! - `StateBus`: run-scoped named state that re-activates watchers
//! - `Component`: the async build boundary, with a registry and a
//!   session-scoped cache
//!
//! # Example
//!
//! ```rust,ignore
//! use flowgraph_engine::{Graph, GraphPayload, NodeData, RunRequest};
//!
//! let payload = GraphPayload::new()
//!     .node(NodeData::new("in", "ChatInput"))
//!     .node(NodeData::new("out", "ChatOutput"))
//!     .edge("in", "out");
//! let mut graph = Graph::new(payload, registry)?;
//! let result = graph.run(RunRequest::new().with_input_value(json!("hi"))).await?;
//! ```

pub mod adjacency;
pub mod component;
pub mod config;
pub mod cycle;
pub mod edge;
pub mod error;
pub mod graph;
pub mod payload;
pub mod report;
pub mod run_state;
pub mod schedule;
pub mod state_bus;
pub mod vertex;
pub mod visualization;

// Re-exports for convenience
pub use adjacency::AdjacencyMaps;
pub use component::{
    value_to_text, BuildContext, BuildOutput, Component, ComponentCache, ComponentFactory,
    ComponentRegistry, SharedComponent,
};
pub use config::EngineConfig;
pub use cycle::{find_all_cycle_edges, find_cycle_edge, find_cycle_vertices, has_cycle};
pub use edge::Edge;
pub use error::{BoxError, GraphError};
pub use graph::{Graph, UpdateSummary};
pub use payload::{EdgeData, GraphPayload, NodeData};
pub use report::{OutputResult, RunReport, RunRequest, RunResult, RunStatus, VertexOutcome};
pub use run_state::RunState;
pub use schedule::{refine_layers, Schedule, Scheduler};
pub use state_bus::{StateBus, StateHandle, Subscriber};
pub use vertex::{BuildStatus, Capabilities, Port, Vertex, VertexId, VertexKind};
