//! Vertex model
//!
//! A vertex is the scheduling unit wrapping one component instance. It is
//! owned by its [`Graph`](crate::Graph) and referenced everywhere else by
//! [`VertexId`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use crate::payload::NodeData;

/// Unique identifier for a vertex in the graph
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VertexId(pub String);

impl VertexId {
    /// Create a new VertexId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for VertexId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for VertexId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&VertexId> for VertexId {
    fn from(id: &VertexId) -> Self {
        id.clone()
    }
}

impl std::fmt::Display for VertexId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Behavioural variant of a vertex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VertexKind {
    /// Plain transform
    #[default]
    Ordinary,
    /// Entry point fed by the caller
    Input,
    /// Result sink reported back to the caller
    Output,
    /// Publishes to or watches the state bus
    Stateful,
    /// Chooses which outgoing port carries on
    Routing,
}

/// Scheduling flags derived from a [`VertexKind`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub is_input: bool,
    pub is_output: bool,
    pub is_state: bool,
    pub is_routing: bool,
}

impl VertexKind {
    /// Resolve a kind from a component type name
    ///
    /// Unknown names fall back to [`VertexKind::Ordinary`].
    pub fn from_type_name(type_name: &str) -> Self {
        match type_name {
            "ChatInput" | "TextInput" => VertexKind::Input,
            "ChatOutput" | "TextOutput" => VertexKind::Output,
            "SetState" | "GetState" | "Listen" | "Notify" => VertexKind::Stateful,
            "ConditionalRouter" | "Router" => VertexKind::Routing,
            name if name.ends_with("Input") => VertexKind::Input,
            name if name.ends_with("Output") => VertexKind::Output,
            name if name.ends_with("Router") => VertexKind::Routing,
            _ => VertexKind::Ordinary,
        }
    }

    /// Capability table
    pub const fn capabilities(self) -> Capabilities {
        match self {
            VertexKind::Ordinary => Capabilities {
                is_input: false,
                is_output: false,
                is_state: false,
                is_routing: false,
            },
            VertexKind::Input => Capabilities {
                is_input: true,
                is_output: false,
                is_state: false,
                is_routing: false,
            },
            VertexKind::Output => Capabilities {
                is_input: false,
                is_output: true,
                is_state: false,
                is_routing: false,
            },
            VertexKind::Stateful => Capabilities {
                is_input: false,
                is_output: false,
                is_state: true,
                is_routing: false,
            },
            VertexKind::Routing => Capabilities {
                is_input: false,
                is_output: false,
                is_state: false,
                is_routing: true,
            },
        }
    }
}

/// Build status of a vertex within the current run
///
/// - `Pending`: not built in this run (or reset)
/// - `Active`: build in flight
/// - `Built`: holds a result
/// - `Errored`: last build failed
/// - `Skipped`: cut off by a routing decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    #[default]
    Pending,
    Active,
    Built,
    Errored,
    Skipped,
}

impl BuildStatus {
    /// Check if the vertex holds a built result
    pub fn is_built(&self) -> bool {
        matches!(self, BuildStatus::Built)
    }

    /// Check if the vertex was skipped by routing
    pub fn is_skipped(&self) -> bool {
        matches!(self, BuildStatus::Skipped)
    }
}

/// Declared input or output port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    pub name: String,
    #[serde(default)]
    pub types: Vec<String>,
}

impl Port {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            types: Vec::new(),
        }
    }

    pub fn with_types(mut self, types: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.types = types.into_iter().map(Into::into).collect();
        self
    }
}

/// A scheduling unit owned by a graph
#[derive(Debug, Clone)]
pub struct Vertex {
    id: VertexId,
    type_name: String,
    display_name: String,
    kind: VertexKind,
    capabilities: Capabilities,
    inputs: Vec<Port>,
    outputs: Vec<Port>,
    params: Map<String, Value>,
    definition: NodeData,
    frozen: bool,
    status: BuildStatus,
    result: Option<Value>,
    bindings: HashMap<String, Value>,
    build_times: VecDeque<Duration>,
}

impl Vertex {
    /// Create a vertex from its node definition
    pub fn from_node(node: NodeData) -> Self {
        let kind = node
            .kind
            .unwrap_or_else(|| VertexKind::from_type_name(&node.type_name));
        Self {
            id: VertexId::new(node.id.clone()),
            type_name: node.type_name.clone(),
            display_name: node.display_name.clone().unwrap_or_else(|| node.id.clone()),
            kind,
            capabilities: kind.capabilities(),
            inputs: node.inputs.clone(),
            outputs: node.outputs.clone(),
            params: node.params.clone(),
            frozen: node.frozen,
            definition: node,
            status: BuildStatus::Pending,
            result: None,
            bindings: HashMap::new(),
            build_times: VecDeque::new(),
        }
    }

    pub fn id(&self) -> &VertexId {
        &self.id
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn kind(&self) -> VertexKind {
        self.kind
    }

    pub fn is_input(&self) -> bool {
        self.capabilities.is_input
    }

    pub fn is_output(&self) -> bool {
        self.capabilities.is_output
    }

    pub fn is_state(&self) -> bool {
        self.capabilities.is_state
    }

    pub fn is_routing(&self) -> bool {
        self.capabilities.is_routing
    }

    pub fn inputs(&self) -> &[Port] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Port] {
        &self.outputs
    }

    pub fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    /// Node definition this vertex was built from
    pub fn definition(&self) -> &NodeData {
        &self.definition
    }

    /// State bus name a stateful vertex watches (`params.name`)
    pub fn watch_name(&self) -> Option<&str> {
        if !self.is_state() {
            return None;
        }
        self.params.get("name").and_then(Value::as_str)
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn status(&self) -> BuildStatus {
        self.status
    }

    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    /// Inputs resolved for the most recent build
    pub fn bindings(&self) -> &HashMap<String, Value> {
        &self.bindings
    }

    /// Mean of the recorded build durations, zero when none
    pub fn avg_build_time(&self) -> Duration {
        if self.build_times.is_empty() {
            return Duration::ZERO;
        }
        let total: Duration = self.build_times.iter().sum();
        total / self.build_times.len() as u32
    }

    pub(crate) fn set_status(&mut self, status: BuildStatus) {
        self.status = status;
    }

    pub(crate) fn set_bindings(&mut self, bindings: HashMap<String, Value>) {
        self.bindings = bindings;
    }

    pub(crate) fn clear_bindings(&mut self) {
        self.bindings.clear();
    }

    pub(crate) fn record_build(&mut self, value: Value, elapsed: Duration, history: usize) {
        self.status = BuildStatus::Built;
        self.result = Some(value);
        if history == 0 {
            return;
        }
        self.build_times.push_back(elapsed);
        while self.build_times.len() > history {
            self.build_times.pop_front();
        }
    }

    /// Forget the result and go back to pending
    pub(crate) fn reset(&mut self) {
        self.status = BuildStatus::Pending;
        self.result = None;
        self.bindings.clear();
    }

    /// Swap in a new definition, keeping run history
    pub(crate) fn apply_definition(&mut self, node: NodeData) {
        let build_times = std::mem::take(&mut self.build_times);
        let status = self.status;
        let result = self.result.take();
        *self = Vertex::from_node(node);
        self.build_times = build_times;
        self.status = status;
        self.result = result;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_vertex_id_conversions() {
        let id = VertexId::from("chat_input");
        assert_eq!(id.as_str(), "chat_input");
        assert_eq!(id.to_string(), "chat_input");
        assert_eq!(VertexId::from(String::from("x")), VertexId::new("x"));
    }

    #[test]
    fn test_kind_from_type_name() {
        assert_eq!(VertexKind::from_type_name("ChatInput"), VertexKind::Input);
        assert_eq!(VertexKind::from_type_name("TextOutput"), VertexKind::Output);
        assert_eq!(VertexKind::from_type_name("Listen"), VertexKind::Stateful);
        assert_eq!(VertexKind::from_type_name("ConditionalRouter"), VertexKind::Routing);
        assert_eq!(VertexKind::from_type_name("FileInput"), VertexKind::Input);
        assert_eq!(VertexKind::from_type_name("OpenAIModel"), VertexKind::Ordinary);
    }

    #[test]
    fn test_capability_table() {
        assert!(VertexKind::Input.capabilities().is_input);
        assert!(VertexKind::Output.capabilities().is_output);
        assert!(VertexKind::Stateful.capabilities().is_state);
        assert!(VertexKind::Routing.capabilities().is_routing);
        assert_eq!(VertexKind::Ordinary.capabilities(), Capabilities::default());
    }

    #[test]
    fn test_explicit_kind_overrides_type_name() {
        let node = NodeData::new("x", "ChatInput").with_kind(VertexKind::Ordinary);
        let vertex = Vertex::from_node(node);
        assert!(!vertex.is_input());
    }

    #[test]
    fn test_watch_name_only_for_stateful() {
        let listener = Vertex::from_node(NodeData::new("l", "Listen").with_param("name", json!("topic")));
        assert_eq!(listener.watch_name(), Some("topic"));

        let plain = Vertex::from_node(NodeData::new("p", "Prompt").with_param("name", json!("topic")));
        assert_eq!(plain.watch_name(), None);
    }

    #[test]
    fn test_avg_build_time_bounded_history() {
        let mut vertex = Vertex::from_node(NodeData::new("v", "Prompt"));
        assert_eq!(vertex.avg_build_time(), Duration::ZERO);

        vertex.record_build(json!(1), Duration::from_millis(100), 2);
        vertex.record_build(json!(2), Duration::from_millis(300), 2);
        assert_eq!(vertex.avg_build_time(), Duration::from_millis(200));

        vertex.record_build(json!(3), Duration::from_millis(500), 2);
        assert_eq!(vertex.avg_build_time(), Duration::from_millis(400));
        assert_eq!(vertex.result(), Some(&json!(3)));
        assert!(vertex.status().is_built());
    }

    #[test]
    fn test_apply_definition_keeps_result() {
        let mut vertex = Vertex::from_node(NodeData::new("v", "Prompt"));
        vertex.record_build(json!("old"), Duration::from_millis(10), 5);

        vertex.apply_definition(NodeData::new("v", "Prompt").with_param("template", json!("{x}")));
        assert_eq!(vertex.params().get("template"), Some(&json!("{x}")));
        assert_eq!(vertex.result(), Some(&json!("old")));

        vertex.reset();
        assert_eq!(vertex.status(), BuildStatus::Pending);
        assert!(vertex.result().is_none());
    }
}
