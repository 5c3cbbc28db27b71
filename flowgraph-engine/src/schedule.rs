//! Layered scheduling
//!
//! Turns the vertex set into an ordered list of layers. Every vertex in a
//! layer can be built concurrently; layers run one after another.
//!
//! ```text
//!  select (start/stop) ─► Kahn layering ─► refine ─► inputs first ─► tie-break
//!                         (cycle tolerant)   (single pass)          (avg build time)
//! ```

use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::debug;

use crate::adjacency::AdjacencyMaps;
use crate::error::GraphError;
use crate::vertex::VertexId;

/// Ordered layers of vertex ids
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schedule {
    layers: Vec<Vec<VertexId>>,
}

impl Schedule {
    pub fn new(layers: Vec<Vec<VertexId>>) -> Self {
        Self { layers }
    }

    pub fn layers(&self) -> &[Vec<VertexId>] {
        &self.layers
    }

    pub fn first_layer(&self) -> &[VertexId] {
        self.layers.first().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn remaining_layers(&self) -> &[Vec<VertexId>] {
        self.layers.get(1..).unwrap_or(&[])
    }

    /// All scheduled ids, layer by layer
    pub fn vertex_ids(&self) -> impl Iterator<Item = &VertexId> {
        self.layers.iter().flatten()
    }

    pub fn layer_of(&self, id: &VertexId) -> Option<usize> {
        self.layers.iter().position(|layer| layer.contains(id))
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn into_layers(self) -> Vec<Vec<VertexId>> {
        self.layers
    }
}

/// Computes layered schedules over a graph's adjacency maps
#[derive(Debug, Clone)]
pub struct Scheduler<'a> {
    maps: &'a AdjacencyMaps,
    cycle_vertices: &'a HashSet<VertexId>,
    inputs: HashSet<VertexId>,
    build_times: HashMap<VertexId, Duration>,
    cycle_tolerant: bool,
    sort_by_build_time: bool,
}

impl<'a> Scheduler<'a> {
    pub fn new(maps: &'a AdjacencyMaps, cycle_vertices: &'a HashSet<VertexId>) -> Self {
        Self {
            maps,
            cycle_vertices,
            inputs: HashSet::new(),
            build_times: HashMap::new(),
            cycle_tolerant: true,
            sort_by_build_time: true,
        }
    }

    /// Vertices flagged `is_input`
    pub fn with_inputs(mut self, inputs: impl IntoIterator<Item = VertexId>) -> Self {
        self.inputs = inputs.into_iter().collect();
        self
    }

    /// Average build time per vertex, used for the in-layer tie-break
    pub fn with_build_times(mut self, build_times: HashMap<VertexId, Duration>) -> Self {
        self.build_times = build_times;
        self
    }

    pub fn with_cycle_tolerance(mut self, enabled: bool) -> Self {
        self.cycle_tolerant = enabled;
        self
    }

    pub fn with_build_time_sort(mut self, enabled: bool) -> Self {
        self.sort_by_build_time = enabled;
        self
    }

    fn is_cyclic(&self) -> bool {
        !self.cycle_vertices.is_empty()
    }

    /// Whether a start/stop bound on `id` must be promoted to a loop entry
    fn restarts_loop(&self, id: &VertexId) -> bool {
        self.cycle_tolerant && self.is_cyclic() && self.cycle_vertices.contains(id)
    }

    fn ensure_known(&self, id: &VertexId) -> Result<(), GraphError> {
        if self.maps.contains(id) {
            Ok(())
        } else {
            Err(GraphError::VertexNotFound(id.clone()))
        }
    }

    /// Vertices needed to run up to `id`, or from `id` onwards when `is_start`
    ///
    /// Returned in declaration order.
    pub fn sort_up_to_vertex(&self, id: &VertexId, is_start: bool) -> Result<Vec<VertexId>, GraphError> {
        self.ensure_known(id)?;
        if is_start {
            return Ok(self.maps.in_order(&self.maps.descendants(id)));
        }
        let mut excluded = HashSet::new();
        if !self.is_cyclic() {
            excluded = self.maps.descendants(id);
            excluded.remove(id);
        }
        Ok(self.maps.in_order(&self.maps.ancestors(id, &excluded)))
    }

    /// Full pipeline over the whole graph or a start/stop bounded part of it
    pub fn schedule(&self, start: Option<&VertexId>, stop: Option<&VertexId>) -> Result<Schedule, GraphError> {
        let (selected, root) = match (start, stop) {
            (Some(start), Some(stop)) => {
                return Err(GraphError::ConflictingBounds {
                    start: start.clone(),
                    stop: stop.clone(),
                })
            }
            (_, Some(stop)) if self.maps.contains(stop) && self.restarts_loop(stop) => {
                debug!(vertex = %stop, "Stop vertex is inside a cycle, restarting the loop from it");
                (self.sort_up_to_vertex(stop, true)?, Some(stop))
            }
            (_, Some(stop)) => (self.sort_up_to_vertex(stop, false)?, None),
            (Some(start), None) => {
                let selected = self.sort_up_to_vertex(start, true)?;
                let root = self.restarts_loop(start).then_some(start);
                (selected, root)
            }
            (None, None) => (self.maps.order().to_vec(), None),
        };
        self.schedule_selected(&selected, root)
    }

    /// Schedule exactly the given ids, ignoring unknown ones
    pub fn schedule_subset(&self, ids: &[VertexId]) -> Result<Schedule, GraphError> {
        let wanted: HashSet<VertexId> = ids.iter().cloned().collect();
        let selected = self.maps.in_order(&wanted);
        self.schedule_selected(&selected, None)
    }

    fn schedule_selected(&self, selected: &[VertexId], root: Option<&VertexId>) -> Result<Schedule, GraphError> {
        let layers = self.layered_topological_sort(selected, root)?;
        let layers = refine_layers(layers, self.maps);
        let mut layers = self.sort_inputs_first(layers)?;
        if self.sort_by_build_time {
            self.sort_layers_by_build_time(&mut layers);
        }
        debug!(
            layers = layers.len(),
            vertices = selected.len(),
            "Computed schedule"
        );
        Ok(Schedule::new(layers))
    }

    /// Kahn's algorithm over `selected`
    ///
    /// `root` seeds layer 0 alone with its incoming edges ignored. With cycle
    /// tolerance, a cycle member whose unmet predecessors are all cycle
    /// members runs as soon as one of its predecessors has run, and a stalled
    /// round releases the first such member as a root.
    pub fn layered_topological_sort(
        &self,
        selected: &[VertexId],
        root: Option<&VertexId>,
    ) -> Result<Vec<Vec<VertexId>>, GraphError> {
        let in_selection: HashSet<&VertexId> = selected.iter().collect();
        let mut unmet: HashMap<&VertexId, usize> = selected
            .iter()
            .map(|id| {
                let count = if Some(id) == root {
                    0
                } else {
                    self.maps
                        .predecessors(id)
                        .iter()
                        .filter(|p| in_selection.contains(p))
                        .count()
                };
                (id, count)
            })
            .collect();

        let mut ran: HashSet<&VertexId> = HashSet::new();
        let mut layers: Vec<Vec<VertexId>> = Vec::new();
        let mut ready: Vec<&VertexId> = selected.iter().filter(|id| unmet[id] == 0).collect();

        while ran.len() < selected.len() {
            if ready.is_empty() {
                let released = selected
                    .iter()
                    .find(|id| !ran.contains(id) && self.loop_ready(id, &in_selection, &ran));
                match released {
                    Some(id) if self.cycle_tolerant => {
                        debug!(vertex = %id, "Releasing cycle member as a root");
                        ready.push(id);
                    }
                    _ => {
                        let unresolved = selected
                            .iter()
                            .filter(|id| !ran.contains(id))
                            .cloned()
                            .collect();
                        return Err(GraphError::CycleDeadlock(unresolved));
                    }
                }
            }

            ran.extend(ready.iter().copied());
            let mut candidates: Vec<&VertexId> = Vec::new();
            for id in &ready {
                for succ in self.maps.successors(id) {
                    if !in_selection.contains(succ) || ran.contains(succ) {
                        continue;
                    }
                    if let Some(count) = unmet.get_mut(succ) {
                        *count = count.saturating_sub(1);
                    }
                    if !candidates.contains(&succ) {
                        candidates.push(succ);
                    }
                }
            }

            let next = candidates
                .into_iter()
                .filter(|succ| {
                    unmet.get(succ).copied() == Some(0)
                        || (self.cycle_tolerant && self.loop_ready(succ, &in_selection, &ran))
                })
                .collect();

            layers.push(ready.iter().map(|id| (*id).clone()).collect());
            ready = next;
        }

        Ok(layers)
    }

    /// Cycle member whose outstanding predecessors are all cycle members
    fn loop_ready(&self, id: &VertexId, in_selection: &HashSet<&VertexId>, ran: &HashSet<&VertexId>) -> bool {
        self.cycle_vertices.contains(id)
            && self
                .maps
                .predecessors(id)
                .iter()
                .filter(|p| in_selection.contains(p) && !ran.contains(p))
                .all(|p| self.cycle_vertices.contains(p))
    }

    /// Move the single input vertex into its own first layer
    fn sort_inputs_first(&self, layers: Vec<Vec<VertexId>>) -> Result<Vec<Vec<VertexId>>, GraphError> {
        let inputs: Vec<VertexId> = layers
            .iter()
            .flatten()
            .filter(|id| self.inputs.contains(*id))
            .cloned()
            .collect();

        if inputs.len() > 1 {
            return Err(GraphError::MultipleEntryPoints(inputs));
        }
        let Some(input) = inputs.into_iter().next() else {
            return Ok(layers);
        };

        let scheduled: HashSet<&VertexId> = layers.iter().flatten().collect();
        if self
            .maps
            .predecessors(&input)
            .iter()
            .any(|p| scheduled.contains(p))
        {
            debug!(vertex = %input, "Input vertex has scheduled predecessors, keeping its layer");
            return Ok(layers);
        }

        let mut reordered = vec![vec![input.clone()]];
        reordered.extend(
            layers
                .into_iter()
                .map(|layer| layer.into_iter().filter(|id| id != &input).collect::<Vec<_>>())
                .filter(|layer| !layer.is_empty()),
        );
        Ok(reordered)
    }

    /// Stable sort of every layer by ascending average build time
    fn sort_layers_by_build_time(&self, layers: &mut [Vec<VertexId>]) {
        for layer in layers.iter_mut() {
            layer.sort_by_key(|id| self.build_times.get(id).copied().unwrap_or_default());
        }
    }
}

/// Push every vertex down to just above its earliest successor
///
/// Single pass against the unrefined layer assignment. Vertices without a
/// scheduled successor stay where they are. Empty layers are dropped.
pub fn refine_layers(layers: Vec<Vec<VertexId>>, maps: &AdjacencyMaps) -> Vec<Vec<VertexId>> {
    let layer_of: HashMap<&VertexId, usize> = layers
        .iter()
        .enumerate()
        .flat_map(|(index, layer)| layer.iter().map(move |id| (id, index)))
        .collect();

    let mut staying: Vec<Vec<VertexId>> = vec![Vec::new(); layers.len()];
    let mut moved: Vec<Vec<VertexId>> = vec![Vec::new(); layers.len()];

    for (index, layer) in layers.iter().enumerate() {
        for id in layer {
            let earliest_successor = maps
                .successors(id)
                .iter()
                .filter_map(|succ| layer_of.get(succ).copied())
                .min();
            let target = earliest_successor.map_or(index, |layer| layer.saturating_sub(1));
            if target > index {
                moved[target].push(id.clone());
            } else {
                staying[index].push(id.clone());
            }
        }
    }

    staying
        .into_iter()
        .zip(moved)
        .map(|(mut layer, mut incoming)| {
            layer.append(&mut incoming);
            layer
        })
        .filter(|layer| !layer.is_empty())
        .collect()
}
