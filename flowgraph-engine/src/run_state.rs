//! Run bookkeeping for vertex-at-a-time driving
//!
//! `run_map` maps a vertex to the pending vertices waiting on it;
//! `run_predecessors` holds, per pending vertex, the predecessors it still
//! waits for.

use std::collections::{HashMap, HashSet};

use crate::adjacency::AdjacencyMaps;
use crate::vertex::VertexId;

/// Pending set plus the dependency maps used by `should_run_vertex`
#[derive(Debug, Clone, Default)]
pub struct RunState {
    run_map: HashMap<VertexId, Vec<VertexId>>,
    run_predecessors: HashMap<VertexId, Vec<VertexId>>,
    vertices_to_run: HashSet<VertexId>,
    ran_at_least_once: HashSet<VertexId>,
    cycle_vertices: HashSet<VertexId>,
    /// Every graph predecessor of a scheduled vertex, resolved or not
    predecessors: HashMap<VertexId, Vec<VertexId>>,
    /// Declaration order of the scheduled vertices
    order: Vec<VertexId>,
}

impl RunState {
    pub fn new(cycle_vertices: HashSet<VertexId>) -> Self {
        Self {
            cycle_vertices,
            ..Default::default()
        }
    }

    /// Start a run over `to_run`, keeping only dependencies inside it
    pub fn prepare(&mut self, maps: &AdjacencyMaps, to_run: impl IntoIterator<Item = VertexId>) {
        self.vertices_to_run = to_run.into_iter().collect();
        self.ran_at_least_once.clear();
        self.run_map.clear();
        self.run_predecessors.clear();
        self.predecessors.clear();
        self.order.clear();

        for id in maps.order() {
            if !self.vertices_to_run.contains(id) {
                continue;
            }
            self.order.push(id.clone());
            self.predecessors.insert(id.clone(), maps.predecessors(id).to_vec());
            let preds: Vec<VertexId> = maps
                .predecessors(id)
                .iter()
                .filter(|p| self.vertices_to_run.contains(*p))
                .cloned()
                .collect();
            for pred in &preds {
                self.run_map.entry(pred.clone()).or_default().push(id.clone());
            }
            self.run_predecessors.insert(id.clone(), preds);
        }
    }

    /// Put `ids` back into the pending set
    ///
    /// A re-activated vertex waits on its re-activated predecessors and on
    /// any predecessor that is still pending in the current run.
    pub fn activate(&mut self, maps: &AdjacencyMaps, ids: &[VertexId]) {
        let activated: HashSet<&VertexId> = ids.iter().collect();
        let still_pending = self.vertices_to_run.clone();
        for id in ids {
            self.vertices_to_run.insert(id.clone());
            if !self.predecessors.contains_key(id) {
                self.predecessors.insert(id.clone(), maps.predecessors(id).to_vec());
                self.order.push(id.clone());
            }
            let preds: Vec<VertexId> = maps
                .predecessors(id)
                .iter()
                .filter(|p| activated.contains(p) || still_pending.contains(*p))
                .cloned()
                .collect();
            for pred in &preds {
                let waiting = self.run_map.entry(pred.clone()).or_default();
                if !waiting.contains(id) {
                    waiting.push(id.clone());
                }
            }
            self.run_predecessors.insert(id.clone(), preds);
        }
    }

    /// Pending and not waiting on anything unresolved
    ///
    /// A cycle member whose remaining predecessors are all cycle members may
    /// go ahead once the loop has been entered, that is once one of its
    /// predecessors has run. When nothing else can make progress the first
    /// such member in declaration order is released as the loop root.
    pub fn is_vertex_runnable(&self, id: &VertexId) -> bool {
        if !self.vertices_to_run.contains(id) {
            return false;
        }
        if self.waiting(id).is_empty() {
            return true;
        }
        if !self.waits_only_on_loop(id) {
            return false;
        }
        self.loop_entered(id) || self.loop_root(id)
    }

    fn waiting(&self, id: &VertexId) -> &[VertexId] {
        self.run_predecessors.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    fn waits_only_on_loop(&self, id: &VertexId) -> bool {
        self.cycle_vertices.contains(id)
            && self.waiting(id).iter().all(|p| self.cycle_vertices.contains(p))
    }

    fn loop_entered(&self, id: &VertexId) -> bool {
        self.predecessors
            .get(id)
            .is_some_and(|preds| preds.iter().any(|p| self.ran_at_least_once.contains(p)))
    }

    fn loop_root(&self, id: &VertexId) -> bool {
        let mut pending = self.order.iter().filter(|v| self.vertices_to_run.contains(*v));
        let stalled = pending.clone().all(|v| {
            !self.waiting(v).is_empty() && !(self.waits_only_on_loop(v) && self.loop_entered(v))
        });
        stalled && pending.find(|v| self.waits_only_on_loop(v)) == Some(id)
    }

    /// Claim `id` if it is runnable
    pub fn should_run_vertex(&mut self, id: &VertexId) -> bool {
        if !self.is_vertex_runnable(id) {
            return false;
        }
        self.mark_done(id);
        true
    }

    /// Remove `id` from the pending set and release its dependents
    pub fn mark_done(&mut self, id: &VertexId) {
        self.vertices_to_run.remove(id);
        self.ran_at_least_once.insert(id.clone());
        self.remove_from_predecessors(id);
    }

    /// Stop dependents from waiting on `id`
    pub fn remove_from_predecessors(&mut self, id: &VertexId) {
        if let Some(dependents) = self.run_map.get(id) {
            for dependent in dependents {
                if let Some(waiting) = self.run_predecessors.get_mut(dependent) {
                    waiting.retain(|p| p != id);
                }
            }
        }
    }

    /// Drop `id` from the pending set without running it
    pub fn skip(&mut self, id: &VertexId) {
        self.vertices_to_run.remove(id);
        self.remove_from_predecessors(id);
    }

    pub fn is_pending(&self, id: &VertexId) -> bool {
        self.vertices_to_run.contains(id)
    }

    pub fn has_run(&self, id: &VertexId) -> bool {
        self.ran_at_least_once.contains(id)
    }

    pub fn vertices_to_run(&self) -> &HashSet<VertexId> {
        &self.vertices_to_run
    }

    pub fn run_map(&self) -> &HashMap<VertexId, Vec<VertexId>> {
        &self.run_map
    }

    pub fn run_predecessors(&self) -> &HashMap<VertexId, Vec<VertexId>> {
        &self.run_predecessors
    }

    pub fn cycle_vertices(&self) -> &HashSet<VertexId> {
        &self.cycle_vertices
    }
}
