//! Directed, port-to-port connections between vertices

use serde::{Deserialize, Serialize};

use crate::vertex::VertexId;

/// Edge from a source output port to a target input port
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub source: VertexId,
    pub source_port: String,
    pub target: VertexId,
    pub target_port: String,
}

impl Edge {
    pub fn new(
        source: impl Into<VertexId>,
        source_port: impl Into<String>,
        target: impl Into<VertexId>,
        target_port: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            source_port: source_port.into(),
            target: target.into(),
            target_port: target_port.into(),
        }
    }

    /// `(source, target)` pair used by the cycle analyzer
    pub fn pair(&self) -> (VertexId, VertexId) {
        (self.source.clone(), self.target.clone())
    }

    pub fn touches(&self, id: &VertexId) -> bool {
        &self.source == id || &self.target == id
    }

    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }
}

/// Append `edge` unless an identical edge is already present
pub(crate) fn push_unique(edges: &mut Vec<Edge>, edge: Edge) -> bool {
    if edges.contains(&edge) {
        return false;
    }
    edges.push(edge);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_duplicates_dropped() {
        let mut edges = Vec::new();
        assert!(push_unique(&mut edges, Edge::new("a", "out", "b", "in")));
        assert!(!push_unique(&mut edges, Edge::new("a", "out", "b", "in")));
        // Same pair on another port is a distinct edge
        assert!(push_unique(&mut edges, Edge::new("a", "out", "b", "context")));
        assert_eq!(edges.len(), 2);
    }

    #[test]
    fn test_touches_and_self_loop() {
        let edge = Edge::new("a", "out", "a", "in");
        assert!(edge.is_self_loop());
        assert!(edge.touches(&VertexId::from("a")));
        assert!(!edge.touches(&VertexId::from("b")));
    }
}
