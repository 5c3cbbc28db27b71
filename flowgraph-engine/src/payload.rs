//! Graph definition payload
//!
//! The node/edge structure a graph is constructed from. It is usually
//! decoded from JSON:
//!
//! ```json
//! {
//!   "nodes": [
//!     { "id": "in", "type": "ChatInput" },
//!     { "id": "out", "type": "ChatOutput" }
//!   ],
//!   "edges": [
//!     { "source": "in", "source_port": "message", "target": "out", "target_port": "input" }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::GraphError;
use crate::vertex::{Port, VertexKind};

fn default_source_port() -> String {
    "output".to_string()
}

fn default_target_port() -> String {
    "input".to_string()
}

/// Node descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    pub id: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Overrides the kind derived from `type_name`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<VertexKind>,
    #[serde(default)]
    pub inputs: Vec<Port>,
    #[serde(default)]
    pub outputs: Vec<Port>,
    #[serde(default)]
    pub params: Map<String, Value>,
    #[serde(default)]
    pub frozen: bool,
}

impl NodeData {
    pub fn new(id: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            type_name: type_name.into(),
            display_name: None,
            kind: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
            params: Map::new(),
            frozen: false,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_kind(mut self, kind: VertexKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    pub fn with_input(mut self, port: Port) -> Self {
        self.inputs.push(port);
        self
    }

    pub fn with_output(mut self, port: Port) -> Self {
        self.outputs.push(port);
        self
    }

    pub fn frozen(mut self, frozen: bool) -> Self {
        self.frozen = frozen;
        self
    }
}

/// Edge descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeData {
    pub source: String,
    #[serde(default = "default_source_port")]
    pub source_port: String,
    pub target: String,
    #[serde(default = "default_target_port")]
    pub target_port: String,
}

impl EdgeData {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            source_port: default_source_port(),
            target: target.into(),
            target_port: default_target_port(),
        }
    }

    pub fn with_ports(mut self, source_port: impl Into<String>, target_port: impl Into<String>) -> Self {
        self.source_port = source_port.into();
        self.target_port = target_port.into();
        self
    }
}

/// Complete graph definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphPayload {
    #[serde(default)]
    pub nodes: Vec<NodeData>,
    #[serde(default)]
    pub edges: Vec<EdgeData>,
}

impl GraphPayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a payload from JSON text
    pub fn from_json(json: &str) -> Result<Self, GraphError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, GraphError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn node(mut self, node: NodeData) -> Self {
        self.nodes.push(node);
        self
    }

    /// Add an edge on the default `output` -> `input` ports
    pub fn edge(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.edges.push(EdgeData::new(source, target));
        self
    }

    pub fn edge_data(mut self, edge: EdgeData) -> Self {
        self.edges.push(edge);
        self
    }
}
