//! In-place merge of a freshly built graph into a live one

use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info};

use super::Graph;
use crate::edge::{push_unique, Edge};
use crate::error::GraphError;
use crate::payload::GraphPayload;
use crate::vertex::VertexId;

/// Ids touched by a merge, each list in declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateSummary {
    pub added: Vec<VertexId>,
    pub removed: Vec<VertexId>,
    pub changed: Vec<VertexId>,
    pub unchanged: Vec<VertexId>,
}

impl UpdateSummary {
    /// Whether the merge left the graph structurally untouched
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

fn incident<'a>(edges: &'a [Edge], id: &VertexId) -> HashSet<&'a Edge> {
    edges.iter().filter(|e| e.touches(id)).collect()
}

impl Graph {
    /// Merge `other` into this graph
    ///
    /// Removed vertices go with their edges and new vertices are added
    /// before their edges. A common vertex with the same definition and the
    /// same incident edges keeps its status and result. A changed vertex takes
    /// the new definition, edges and component and is reset unless frozen;
    /// its non-frozen neighbours lose their input bindings.
    pub fn update(&mut self, other: Graph) -> Result<UpdateSummary, GraphError> {
        let Graph {
            vertices: mut other_vertices,
            order: other_order,
            edges: other_edges,
            components: mut other_components,
            ..
        } = other;

        let previous_edges = self.edges.clone();
        let existing: HashSet<VertexId> = self.order.iter().cloned().collect();
        let incoming: HashSet<VertexId> = other_order.iter().cloned().collect();
        let mut summary = UpdateSummary {
            removed: self.order.iter().filter(|id| !incoming.contains(*id)).cloned().collect(),
            added: other_order.iter().filter(|id| !existing.contains(*id)).cloned().collect(),
            ..Default::default()
        };

        for id in &summary.removed {
            self.vertices.remove(id);
            self.components.remove(id);
            self.cache.invalidate(id);
            self.inactivated.remove(id);
            self.edges.retain(|e| !e.touches(id));
            self.order.retain(|v| v != id);
        }

        for id in &summary.added {
            if let Some(vertex) = other_vertices.remove(id) {
                self.vertices.insert(id.clone(), vertex);
                self.order.push(id.clone());
            }
            if let Some(component) = other_components.remove(id) {
                self.components.insert(id.clone(), component);
            }
        }
        for edge in &other_edges {
            let is_new = summary.added.iter().any(|id| edge.touches(id));
            if is_new && self.vertices.contains_key(&edge.source) && self.vertices.contains_key(&edge.target) {
                push_unique(&mut self.edges, edge.clone());
            }
        }

        let common: Vec<VertexId> = self
            .order
            .iter()
            .filter(|id| existing.contains(*id) && incoming.contains(*id))
            .cloned()
            .collect();
        for id in common {
            let Some(theirs) = other_vertices.remove(&id) else {
                continue;
            };
            let mine_edges = incident(&previous_edges, &id);
            let their_edges = incident(&other_edges, &id);
            let same_definition = self
                .vertices
                .get(&id)
                .is_some_and(|v| v.definition() == theirs.definition());
            if same_definition && mine_edges == their_edges {
                summary.unchanged.push(id);
                continue;
            }

            let neighbours: HashSet<VertexId> = mine_edges
                .iter()
                .chain(their_edges.iter())
                .flat_map(|e| [e.source.clone(), e.target.clone()])
                .filter(|n| n != &id)
                .collect();
            let replacement: Vec<Edge> = their_edges.into_iter().cloned().collect();

            self.edges.retain(|e| !e.touches(&id));
            for edge in replacement {
                if self.vertices.contains_key(&edge.source) && self.vertices.contains_key(&edge.target) {
                    push_unique(&mut self.edges, edge);
                }
            }
            if let Some(component) = other_components.remove(&id) {
                self.components.insert(id.clone(), component);
            }
            if let Some(vertex) = self.vertices.get_mut(&id) {
                vertex.apply_definition(theirs.definition().clone());
                if !vertex.is_frozen() {
                    vertex.reset();
                }
            }
            for neighbour in neighbours {
                if let Some(vertex) = self.vertices.get_mut(&neighbour) {
                    if !vertex.is_frozen() {
                        vertex.clear_bindings();
                    }
                }
            }
            debug!(vertex = %id, "Vertex definition changed");
            summary.changed.push(id);
        }

        self.rebuild_maps();
        self.reset_inactivated();
        self.updates += 1;

        info!(
            flow_id = %self.flow_id,
            added = summary.added.len(),
            removed = summary.removed.len(),
            changed = summary.changed.len(),
            unchanged = summary.unchanged.len(),
            "Graph updated"
        );
        Ok(summary)
    }

    /// Build a graph from `payload` with this graph's registry, cache and
    /// config, then merge it
    pub fn update_from_payload(&mut self, payload: GraphPayload) -> Result<UpdateSummary, GraphError> {
        let other = Graph::from_payload(
            payload,
            std::sync::Arc::clone(&self.registry),
            std::sync::Arc::clone(&self.cache),
            self.config.clone(),
        )?;
        self.update(other)
    }
}
