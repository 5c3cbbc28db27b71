//! Derived adjacency indexes
//!
//! Rebuilt as a whole whenever vertices or edges change.

use std::collections::{HashMap, HashSet};

use crate::edge::Edge;
use crate::vertex::VertexId;

/// Predecessor, successor, in-degree and parent→children maps
#[derive(Debug, Clone, Default)]
pub struct AdjacencyMaps {
    order: Vec<VertexId>,
    predecessors: HashMap<VertexId, Vec<VertexId>>,
    successors: HashMap<VertexId, Vec<VertexId>>,
    in_degree: HashMap<VertexId, usize>,
    parent_child: HashMap<VertexId, Vec<VertexId>>,
}

impl AdjacencyMaps {
    /// Build the maps; neighbour lists hold each vertex once, in edge order
    pub fn build(vertex_ids: &[VertexId], edges: &[Edge]) -> Self {
        let mut predecessors: HashMap<VertexId, Vec<VertexId>> = HashMap::new();
        let mut successors: HashMap<VertexId, Vec<VertexId>> = HashMap::new();

        for edge in edges {
            let preds = predecessors.entry(edge.target.clone()).or_default();
            if !preds.contains(&edge.source) {
                preds.push(edge.source.clone());
            }
            let succs = successors.entry(edge.source.clone()).or_default();
            if !succs.contains(&edge.target) {
                succs.push(edge.target.clone());
            }
        }

        let in_degree = vertex_ids
            .iter()
            .map(|id| (id.clone(), predecessors.get(id).map_or(0, Vec::len)))
            .collect();
        let parent_child = vertex_ids
            .iter()
            .map(|id| (id.clone(), successors.get(id).cloned().unwrap_or_default()))
            .collect();

        Self {
            order: vertex_ids.to_vec(),
            predecessors,
            successors,
            in_degree,
            parent_child,
        }
    }

    /// Vertex ids in declaration order
    pub fn order(&self) -> &[VertexId] {
        &self.order
    }

    pub fn contains(&self, id: &VertexId) -> bool {
        self.in_degree.contains_key(id)
    }

    pub fn predecessors(&self, id: &VertexId) -> &[VertexId] {
        self.predecessors.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn successors(&self, id: &VertexId) -> &[VertexId] {
        self.successors.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn in_degree(&self, id: &VertexId) -> usize {
        self.in_degree.get(id).copied().unwrap_or(0)
    }

    pub fn children(&self, id: &VertexId) -> &[VertexId] {
        self.parent_child.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn predecessor_map(&self) -> &HashMap<VertexId, Vec<VertexId>> {
        &self.predecessors
    }

    pub fn successor_map(&self) -> &HashMap<VertexId, Vec<VertexId>> {
        &self.successors
    }

    /// `id` and everything reachable from it
    pub fn descendants(&self, id: &VertexId) -> HashSet<VertexId> {
        self.reach(id, |v| self.successors(v), &HashSet::new())
    }

    /// `id` and everything that reaches it, never walking through `excluded`
    pub fn ancestors(&self, id: &VertexId, excluded: &HashSet<VertexId>) -> HashSet<VertexId> {
        self.reach(id, |v| self.predecessors(v), excluded)
    }

    fn reach<'a, F>(&'a self, start: &VertexId, next: F, excluded: &HashSet<VertexId>) -> HashSet<VertexId>
    where
        F: Fn(&VertexId) -> &'a [VertexId],
    {
        let mut seen = HashSet::from([start.clone()]);
        let mut stack = vec![start.clone()];
        while let Some(current) = stack.pop() {
            for neighbour in next(&current) {
                if excluded.contains(neighbour) {
                    continue;
                }
                if seen.insert(neighbour.clone()) {
                    stack.push(neighbour.clone());
                }
            }
        }
        seen
    }

    /// Filter `ids` down to declaration order
    pub fn in_order(&self, ids: &HashSet<VertexId>) -> Vec<VertexId> {
        self.order.iter().filter(|id| ids.contains(*id)).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> AdjacencyMaps {
        let ids: Vec<VertexId> = ["A", "B", "C", "D"].map(VertexId::from).to_vec();
        let edges = vec![
            Edge::new("A", "out", "B", "in"),
            Edge::new("A", "out", "B", "extra"),
            Edge::new("B", "out", "C", "in"),
            Edge::new("C", "out", "D", "in"),
        ];
        AdjacencyMaps::build(&ids, &edges)
    }

    #[test]
    fn test_neighbours_are_unique() {
        let maps = chain();
        assert_eq!(maps.successors(&VertexId::from("A")), &[VertexId::from("B")]);
        assert_eq!(maps.in_degree(&VertexId::from("B")), 1);
        assert_eq!(maps.in_degree(&VertexId::from("A")), 0);
        assert!(maps.children(&VertexId::from("D")).is_empty());
        assert!(maps.contains(&VertexId::from("D")));
    }

    #[test]
    fn test_reachability() {
        let maps = chain();
        let down = maps.descendants(&VertexId::from("B"));
        assert_eq!(maps.in_order(&down), ["B", "C", "D"].map(VertexId::from).to_vec());

        let up = maps.ancestors(&VertexId::from("C"), &HashSet::new());
        assert_eq!(maps.in_order(&up), ["A", "B", "C"].map(VertexId::from).to_vec());

        let excluded = HashSet::from([VertexId::from("B")]);
        let cut = maps.ancestors(&VertexId::from("C"), &excluded);
        assert_eq!(maps.in_order(&cut), vec![VertexId::from("C")]);
    }
}
