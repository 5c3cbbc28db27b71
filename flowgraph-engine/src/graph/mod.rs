//! Graph - owner of vertices, edges and everything derived from them
//!
//! A graph is built from a [`GraphPayload`], validated, and then driven
//! either as a whole through [`Graph::run`]/[`Graph::process`] or vertex by
//! vertex through [`Graph::should_run_vertex`]. Live edits are merged in
//! place with [`Graph::update`].
//!
//! ```text
//!  payload ─► vertices + edges ─► adjacency maps + cycle set
//!                                         │
//!                         prepare(start, stop) ─► Schedule + RunState
//!                                         │
//!                               process() layer by layer
//! ```

mod executor;
mod merge;

pub use merge::UpdateSummary;

use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::adjacency::AdjacencyMaps;
use crate::component::{ComponentCache, ComponentRegistry, SharedComponent};
use crate::config::EngineConfig;
use crate::cycle::find_cycle_vertices;
use crate::edge::{push_unique, Edge};
use crate::error::GraphError;
use crate::payload::{EdgeData, GraphPayload};
use crate::report::{RunReport, RunStatus};
use crate::run_state::RunState;
use crate::schedule::{Schedule, Scheduler};
use crate::state_bus::{StateBus, Subscriber};
use crate::vertex::{BuildStatus, Vertex, VertexId};
use crate::visualization;

/// A validated workflow graph
pub struct Graph {
    flow_id: Uuid,
    config: EngineConfig,
    vertices: HashMap<VertexId, Vertex>,
    order: Vec<VertexId>,
    edges: Vec<Edge>,
    maps: AdjacencyMaps,
    cycle_vertices: HashSet<VertexId>,
    components: HashMap<VertexId, SharedComponent>,
    registry: Arc<ComponentRegistry>,
    cache: Arc<ComponentCache>,
    bus: Arc<StateBus>,
    schedule: Option<Schedule>,
    run_state: RunState,
    run_id: Uuid,
    status: RunStatus,
    /// Vertices cut off by routing in the current run
    inactivated: HashSet<VertexId>,
    /// Port chosen by each routing vertex in the current run
    routes: HashMap<VertexId, String>,
    /// `input_value` overrides for the current run
    run_inputs: HashMap<VertexId, Value>,
    last_report: Option<RunReport>,
    runs: usize,
    updates: usize,
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("flow_id", &self.flow_id)
            .field("vertices", &self.order)
            .field("edges", &self.edges.len())
            .field("cycle_vertices", &self.cycle_vertices.len())
            .field("status", &self.status)
            .finish()
    }
}

impl Graph {
    /// Build a graph with a private component cache and default config
    pub fn new(payload: GraphPayload, registry: Arc<ComponentRegistry>) -> Result<Self, GraphError> {
        Self::from_payload(
            payload,
            registry,
            Arc::new(ComponentCache::new()),
            EngineConfig::default(),
        )
    }

    /// Parse a JSON payload and build a graph from it
    pub fn from_json(
        json: &str,
        registry: Arc<ComponentRegistry>,
        cache: Arc<ComponentCache>,
        config: EngineConfig,
    ) -> Result<Self, GraphError> {
        Self::from_payload(GraphPayload::from_json(json)?, registry, cache, config)
    }

    /// Build and validate a graph
    ///
    /// Fails on duplicate ids, edges to unknown vertices, unknown component
    /// types, and isolated vertices in a multi-vertex graph.
    pub fn from_payload(
        payload: GraphPayload,
        registry: Arc<ComponentRegistry>,
        cache: Arc<ComponentCache>,
        config: EngineConfig,
    ) -> Result<Self, GraphError> {
        config.validate()?;

        let mut vertices = HashMap::new();
        let mut order = Vec::new();
        let mut components = HashMap::new();
        for node in payload.nodes {
            let id = VertexId::new(node.id.clone());
            if vertices.contains_key(&id) {
                return Err(GraphError::DuplicateVertex(id));
            }
            let component = cache.get_or_instantiate(&node, &registry)?;
            components.insert(id.clone(), component);
            vertices.insert(id.clone(), Vertex::from_node(node));
            order.push(id);
        }

        let mut edges = Vec::new();
        for data in payload.edges {
            let edge = resolve_edge(&vertices, data)?;
            if !push_unique(&mut edges, edge) {
                debug!("Dropping duplicate edge");
            }
        }
        validate_connectivity(&order, &edges)?;

        let mut graph = Self {
            flow_id: Uuid::new_v4(),
            config,
            vertices,
            order,
            edges,
            maps: AdjacencyMaps::default(),
            cycle_vertices: HashSet::new(),
            components,
            registry,
            cache,
            bus: Arc::new(StateBus::new()),
            schedule: None,
            run_state: RunState::default(),
            run_id: Uuid::new_v4(),
            status: RunStatus::NotStarted,
            inactivated: HashSet::new(),
            routes: HashMap::new(),
            run_inputs: HashMap::new(),
            last_report: None,
            runs: 0,
            updates: 0,
        };
        graph.rebuild_maps();

        info!(
            flow_id = %graph.flow_id,
            vertices = graph.order.len(),
            edges = graph.edges.len(),
            cyclic = graph.is_cyclic(),
            "Graph built"
        );
        Ok(graph)
    }

    /// Recompute adjacency, the cycle set and run bookkeeping
    fn rebuild_maps(&mut self) {
        self.maps = AdjacencyMaps::build(&self.order, &self.edges);
        let pairs: Vec<(VertexId, VertexId)> = self.edges.iter().map(Edge::pair).collect();
        self.cycle_vertices = find_cycle_vertices(&pairs).into_iter().collect();
        self.run_state = RunState::new(self.cycle_vertices.clone());
        self.schedule = None;
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    pub fn flow_id(&self) -> Uuid {
        self.flow_id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn vertex(&self, id: &VertexId) -> Option<&Vertex> {
        self.vertices.get(id)
    }

    /// Vertices in declaration order
    pub fn vertices(&self) -> impl Iterator<Item = &Vertex> {
        self.order.iter().filter_map(|id| self.vertices.get(id))
    }

    pub fn vertex_ids(&self) -> &[VertexId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn adjacency(&self) -> &AdjacencyMaps {
        &self.maps
    }

    pub fn predecessors(&self, id: &VertexId) -> &[VertexId] {
        self.maps.predecessors(id)
    }

    pub fn successors(&self, id: &VertexId) -> &[VertexId] {
        self.maps.successors(id)
    }

    pub fn in_degree(&self, id: &VertexId) -> usize {
        self.maps.in_degree(id)
    }

    pub fn cycle_vertices(&self) -> &HashSet<VertexId> {
        &self.cycle_vertices
    }

    pub fn is_cyclic(&self) -> bool {
        !self.cycle_vertices.is_empty()
    }

    pub fn input_vertices(&self) -> Vec<VertexId> {
        self.vertices().filter(|v| v.is_input()).map(|v| v.id().clone()).collect()
    }

    pub fn output_vertices(&self) -> Vec<VertexId> {
        self.vertices().filter(|v| v.is_output()).map(|v| v.id().clone()).collect()
    }

    /// Vertices without successors
    pub fn terminal_vertices(&self) -> Vec<VertexId> {
        self.order
            .iter()
            .filter(|id| self.maps.successors(id).is_empty())
            .cloned()
            .collect()
    }

    /// Schedule of the prepared run, if any
    pub fn schedule(&self) -> Option<&Schedule> {
        self.schedule.as_ref()
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn run_state(&self) -> &RunState {
        &self.run_state
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn state_bus(&self) -> &Arc<StateBus> {
        &self.bus
    }

    pub fn component_cache(&self) -> &Arc<ComponentCache> {
        &self.cache
    }

    pub fn last_report(&self) -> Option<&RunReport> {
        self.last_report.as_ref()
    }

    /// Number of `process()` calls so far
    pub fn run_count(&self) -> usize {
        self.runs
    }

    /// Number of merges applied so far
    pub fn update_count(&self) -> usize {
        self.updates
    }

    /// Vertices skipped by routing in the current run
    pub fn inactivated_vertices(&self) -> &HashSet<VertexId> {
        &self.inactivated
    }

    pub fn get_vertex_result(&self, id: &VertexId) -> Option<&Value> {
        self.vertices.get(id).and_then(Vertex::result)
    }

    // =========================================================================
    // Scheduling
    // =========================================================================

    fn build_times(&self) -> HashMap<VertexId, Duration> {
        self.vertices
            .iter()
            .map(|(id, vertex)| (id.clone(), vertex.avg_build_time()))
            .collect()
    }

    fn scheduler(&self) -> Scheduler<'_> {
        Scheduler::new(&self.maps, &self.cycle_vertices)
            .with_inputs(self.input_vertices())
            .with_build_times(self.build_times())
            .with_cycle_tolerance(self.config.cycle_tolerant)
            .with_build_time_sort(self.config.sort_by_build_time)
    }

    /// Vertices needed to reach `id`, or everything downstream of it when
    /// `is_start`
    pub fn sort_up_to_vertex(&self, id: &VertexId, is_start: bool) -> Result<Vec<VertexId>, GraphError> {
        self.scheduler().sort_up_to_vertex(id, is_start)
    }

    /// Compute the schedule for the next run and reset run bookkeeping
    ///
    /// At most one of `start` and `stop` may be given.
    pub fn prepare(&mut self, start: Option<&VertexId>, stop: Option<&VertexId>) -> Result<&Schedule, GraphError> {
        let schedule = self.scheduler().schedule(start, stop)?;

        self.reset_inactivated();
        self.run_state.prepare(&self.maps, schedule.vertex_ids().cloned());
        self.open_run_scope();

        debug!(
            run_id = %self.run_id,
            layers = schedule.len(),
            start = ?start,
            stop = ?stop,
            "Prepared run"
        );
        let schedule = self.schedule.insert(schedule);
        Ok(&*schedule)
    }

    /// Fresh run id and state scope with the current subscribers
    fn open_run_scope(&mut self) {
        self.bus.end_run(self.run_id);
        self.run_id = Uuid::new_v4();

        let subscribers = self
            .vertices()
            .filter_map(|vertex| {
                let watch = vertex.watch_name()?;
                let downstream = self.maps.descendants(vertex.id());
                let mut activation = vec![vertex.id().clone()];
                activation.extend(
                    self.maps
                        .in_order(&downstream)
                        .into_iter()
                        .filter(|id| id != vertex.id()),
                );
                Some(Subscriber {
                    vertex_id: vertex.id().clone(),
                    watch: watch.to_string(),
                    activation,
                })
            })
            .collect();
        self.bus.begin_run(self.run_id, subscribers);
    }

    fn reset_inactivated(&mut self) {
        for id in self.inactivated.drain() {
            if let Some(vertex) = self.vertices.get_mut(&id) {
                if vertex.status().is_skipped() {
                    vertex.set_status(BuildStatus::Pending);
                }
            }
        }
        self.routes.clear();
    }

    // =========================================================================
    // Vertex-driven stepping
    // =========================================================================

    /// Claim `id` for execution when it is pending and unblocked
    ///
    /// Prepares a full run first when nothing has been prepared yet.
    pub fn should_run_vertex(&mut self, id: &VertexId) -> bool {
        self.ensure_prepared() && self.run_state.should_run_vertex(id)
    }

    fn ensure_prepared(&mut self) -> bool {
        if self.schedule.is_none() {
            if let Err(err) = self.prepare(None, None) {
                warn!(error = %err, "Could not prepare a run");
                return false;
            }
        }
        true
    }

    // =========================================================================
    // State bus
    // =========================================================================

    /// Write `name` in the current run and re-activate its watchers
    ///
    /// Returns the ids put back into the pending set. Prepares a full run
    /// first when nothing has been prepared yet.
    pub fn update_state(&mut self, name: &str, value: Value, caller: &VertexId) -> Vec<VertexId> {
        if !self.ensure_prepared() {
            return Vec::new();
        }
        let activated = self.bus.update_state(self.run_id, name, value, caller);
        self.apply_activation(&activated);
        activated
    }

    /// Append to the log of `name` and re-activate its watchers
    pub fn append_state(&mut self, name: &str, value: Value, caller: &VertexId) -> Vec<VertexId> {
        if !self.ensure_prepared() {
            return Vec::new();
        }
        let activated = self.bus.append_state(self.run_id, name, value, caller);
        self.apply_activation(&activated);
        activated
    }

    pub fn get_state(&self, name: &str) -> Option<Value> {
        self.bus.get_state(self.run_id, name)
    }

    pub fn state_log(&self, name: &str) -> Vec<Value> {
        self.bus.state_log(self.run_id, name)
    }

    fn apply_activation(&mut self, activated: &[VertexId]) {
        // applied directly here, so drop the copy queued for process()
        self.bus.take_activated(self.run_id);
        if !activated.is_empty() {
            self.run_state.activate(&self.maps, activated);
        }
    }

    // =========================================================================
    // Routing
    // =========================================================================

    /// Skip everything only reachable from `router` through ports other than
    /// `port`
    ///
    /// Successors are skipped transitively once all of their predecessors
    /// are skipped. Returns the newly skipped ids.
    pub(crate) fn mark_branch(&mut self, router: &VertexId, port: &str) -> Vec<VertexId> {
        self.routes.insert(router.clone(), port.to_string());

        let chosen: HashSet<&VertexId> = self
            .edges
            .iter()
            .filter(|e| &e.source == router && e.source_port == port)
            .map(|e| &e.target)
            .collect();
        let mut stack: Vec<VertexId> = Vec::new();
        for edge in &self.edges {
            if &edge.source == router
                && edge.source_port != port
                && !chosen.contains(&edge.target)
                && &edge.target != router
                && !stack.contains(&edge.target)
            {
                stack.push(edge.target.clone());
            }
        }

        let mut skipped = Vec::new();
        while let Some(id) = stack.pop() {
            if !self.inactivated.insert(id.clone()) {
                continue;
            }
            if let Some(vertex) = self.vertices.get_mut(&id) {
                vertex.set_status(BuildStatus::Skipped);
            }
            self.run_state.skip(&id);

            let children: Vec<VertexId> = self
                .maps
                .successors(&id)
                .iter()
                .filter(|child| *child != router && !self.inactivated.contains(*child))
                .filter(|child| {
                    self.maps
                        .predecessors(child)
                        .iter()
                        .all(|p| self.inactivated.contains(p))
                })
                .cloned()
                .collect();
            stack.extend(children);
            skipped.push(id);
        }

        if !skipped.is_empty() {
            debug!(router = %router, port, skipped = ?skipped, "Routing skipped branch");
        }
        skipped
    }

    /// Whether an edge carries data in the current run
    fn edge_is_live(&self, edge: &Edge) -> bool {
        if self.inactivated.contains(&edge.source) {
            return false;
        }
        match self.routes.get(&edge.source) {
            Some(port) => port == &edge.source_port,
            None => true,
        }
    }

    // =========================================================================
    // Visualization
    // =========================================================================

    /// Mermaid flowchart of the graph structure
    pub fn to_mermaid(&self) -> String {
        visualization::render_graph(self, false)
    }

    /// Mermaid flowchart coloured by build status
    pub fn to_mermaid_with_status(&self) -> String {
        visualization::render_graph(self, true)
    }
}

fn resolve_edge(vertices: &HashMap<VertexId, Vertex>, data: EdgeData) -> Result<Edge, GraphError> {
    let source = VertexId::new(data.source);
    let target = VertexId::new(data.target);
    for endpoint in [&source, &target] {
        if !vertices.contains_key(endpoint) {
            return Err(GraphError::missing_vertex(&source, &target, endpoint));
        }
    }
    Ok(Edge::new(source, data.source_port, target, data.target_port))
}

/// A graph with more than one vertex may not contain isolated vertices
fn validate_connectivity(order: &[VertexId], edges: &[Edge]) -> Result<(), GraphError> {
    if order.len() <= 1 {
        return Ok(());
    }
    let connected: HashSet<&VertexId> = edges.iter().flat_map(|e| [&e.source, &e.target]).collect();
    match order.iter().find(|id| !connected.contains(id)) {
        Some(id) => Err(GraphError::DisconnectedVertex(id.clone())),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{BuildContext, BuildOutput, Component};
    use crate::error::BoxError;
    use crate::payload::NodeData;
    use async_trait::async_trait;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl Component for Echo {
        async fn build(&self, ctx: BuildContext) -> Result<BuildOutput, BoxError> {
            Ok(BuildOutput::value(json!(ctx.text_input().unwrap_or_default())))
        }
    }

    fn registry() -> Arc<ComponentRegistry> {
        let mut registry = ComponentRegistry::new();
        registry.register_fallback(|_| Arc::new(Echo) as SharedComponent);
        Arc::new(registry)
    }

    fn id(s: &str) -> VertexId {
        VertexId::from(s)
    }

    fn chain(ids: &[&str]) -> GraphPayload {
        let mut payload = GraphPayload::new();
        for v in ids {
            payload = payload.node(NodeData::new(*v, "Echo"));
        }
        for pair in ids.windows(2) {
            payload = payload.edge(pair[0], pair[1]);
        }
        payload
    }

    #[test]
    fn test_graph_is_send_sync() {
        static_assertions::assert_impl_all!(Graph: Send, Sync);
    }

    #[test]
    fn test_missing_vertex() {
        let payload = chain(&["A", "B"]).edge("B", "ghost");
        let err = Graph::new(payload, registry()).unwrap_err();
        match err {
            GraphError::MissingVertex { missing, .. } => assert_eq!(missing, id("ghost")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_disconnected_vertex() {
        let payload = chain(&["A", "B"]).node(NodeData::new("lonely", "Echo"));
        let err = Graph::new(payload, registry()).unwrap_err();
        assert!(matches!(err, GraphError::DisconnectedVertex(ref v) if v == &id("lonely")));
        assert!(err.is_construction_error());
    }

    #[test]
    fn test_single_vertex_needs_no_edges() {
        let graph = Graph::new(GraphPayload::new().node(NodeData::new("solo", "Echo")), registry()).unwrap();
        assert_eq!(graph.len(), 1);
        assert!(!graph.is_cyclic());
    }

    #[test]
    fn test_duplicate_vertex() {
        let payload = chain(&["A", "B"]).node(NodeData::new("A", "Echo"));
        assert!(matches!(
            Graph::new(payload, registry()),
            Err(GraphError::DuplicateVertex(_))
        ));
    }

    #[test]
    fn test_unknown_component() {
        let payload = GraphPayload::new().node(NodeData::new("x", "Nope"));
        let err = Graph::new(payload, Arc::new(ComponentRegistry::new())).unwrap_err();
        assert!(matches!(err, GraphError::UnknownComponent { .. }));
    }

    #[test]
    fn test_duplicate_edges_dropped_parallel_ports_kept() {
        let payload = chain(&["A", "B"])
            .edge("A", "B")
            .edge_data(EdgeData::new("A", "B").with_ports("output", "extra"));
        let graph = Graph::new(payload, registry()).unwrap();
        assert_eq!(graph.edges().len(), 2);
        assert_eq!(graph.in_degree(&id("B")), 1);
        assert_eq!(graph.successors(&id("A")), &[id("B")]);
    }

    #[test]
    fn test_cycle_vertices_derived() {
        let payload = chain(&["A", "B", "C"]).edge("C", "A");
        let graph = Graph::new(payload, registry()).unwrap();
        assert!(graph.is_cyclic());
        assert_eq!(graph.cycle_vertices().len(), 3);
    }

    #[test]
    fn test_sort_up_to_vertex() {
        let graph = Graph::new(chain(&["A", "B", "C", "D", "E"]), registry()).unwrap();
        assert_eq!(
            graph.sort_up_to_vertex(&id("C"), false).unwrap(),
            vec![id("A"), id("B"), id("C")]
        );
        assert_eq!(
            graph.sort_up_to_vertex(&id("B"), true).unwrap(),
            vec![id("B"), id("C"), id("D"), id("E")]
        );
        assert!(matches!(
            graph.sort_up_to_vertex(&id("Z"), false),
            Err(GraphError::VertexNotFound(_))
        ));
    }

    #[test]
    fn test_should_run_vertex_drives_chain() {
        let mut graph = Graph::new(chain(&["A", "B", "C"]), registry()).unwrap();
        assert!(!graph.should_run_vertex(&id("B")));
        assert!(graph.should_run_vertex(&id("A")));
        assert!(graph.should_run_vertex(&id("B")));
        assert!(graph.should_run_vertex(&id("C")));
        assert!(graph.run_state().vertices_to_run().is_empty());
    }

    #[test]
    fn test_prepare_with_stop_restricts_pending_set() {
        let mut graph = Graph::new(chain(&["A", "B", "C", "D"]), registry()).unwrap();
        let layers = graph.prepare(None, Some(&id("B"))).unwrap().layers().to_vec();
        assert_eq!(layers, vec![vec![id("A")], vec![id("B")]]);
        assert!(!graph.run_state().is_pending(&id("C")));
    }

    #[test]
    fn test_update_state_reactivates_watchers() {
        let payload = GraphPayload::new()
            .node(NodeData::new("X", "SetState").with_param("name", json!("other")))
            .node(NodeData::new("Y", "Listen").with_param("name", json!("topic")))
            .node(NodeData::new("Z", "Echo"))
            .edge("X", "Y")
            .edge("Y", "Z");
        let mut graph = Graph::new(payload, registry()).unwrap();
        for v in ["X", "Y", "Z"] {
            assert!(graph.should_run_vertex(&id(v)));
        }

        let activated = graph.update_state("topic", json!("fresh"), &id("X"));
        assert_eq!(activated, vec![id("Y"), id("Z")]);
        assert!(graph.run_state().is_pending(&id("Y")));
        assert!(graph.run_state().is_pending(&id("Z")));
        assert_eq!(graph.get_state("topic"), Some(json!("fresh")));
        assert!(graph.state_bus().take_activated(graph.run_id()).is_empty());

        graph.append_state("log", json!(1), &id("X"));
        assert_eq!(graph.state_log("log"), vec![json!(1)]);
    }

    #[test]
    fn test_reactivated_watcher_waits_for_pending_upstream() {
        let payload = GraphPayload::new()
            .node(NodeData::new("in", "TextInput"))
            .node(NodeData::new("x", "Echo"))
            .node(NodeData::new("y", "Listen").with_param("name", json!("topic")))
            .node(NodeData::new("z", "Echo"))
            .edge("in", "x")
            .edge("x", "y")
            .edge("y", "z");
        let mut graph = Graph::new(payload, registry()).unwrap();
        assert!(graph.should_run_vertex(&id("in")));

        let activated = graph.update_state("topic", json!("early"), &id("in"));
        assert_eq!(activated, vec![id("y"), id("z")]);
        assert!(graph.run_state().is_pending(&id("x")));
        assert!(!graph.should_run_vertex(&id("y")));

        assert!(graph.should_run_vertex(&id("x")));
        assert!(graph.should_run_vertex(&id("y")));
        assert!(graph.should_run_vertex(&id("z")));
    }

    #[test]
    fn test_mark_branch_skips_transitively() {
        // router -a-> left -> join, router -b-> right -> join, right -> tail
        let payload = GraphPayload::new()
            .node(NodeData::new("router", "Router"))
            .node(NodeData::new("left", "Echo"))
            .node(NodeData::new("right", "Echo"))
            .node(NodeData::new("tail", "Echo"))
            .node(NodeData::new("join", "Echo"))
            .edge_data(EdgeData::new("router", "left").with_ports("a", "input"))
            .edge_data(EdgeData::new("router", "right").with_ports("b", "input"))
            .edge("right", "tail")
            .edge("left", "join")
            .edge("right", "join");
        let mut graph = Graph::new(payload, registry()).unwrap();
        graph.prepare(None, None).unwrap();

        let mut skipped = graph.mark_branch(&id("router"), "a");
        skipped.sort();
        assert_eq!(skipped, vec![id("right"), id("tail")]);
        assert!(!graph.run_state().is_pending(&id("right")));
        assert!(graph.run_state().is_pending(&id("join")));
        assert_eq!(
            graph.vertex(&id("tail")).map(Vertex::status),
            Some(BuildStatus::Skipped)
        );

        graph.prepare(None, None).unwrap();
        assert!(graph.inactivated_vertices().is_empty());
        assert_eq!(
            graph.vertex(&id("tail")).map(Vertex::status),
            Some(BuildStatus::Pending)
        );
    }
}
