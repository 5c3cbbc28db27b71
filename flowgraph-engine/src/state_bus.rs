//! Run-scoped shared state with subscriber re-activation
//!
//! Values are keyed by `(run_id, name)`. Stateful vertices subscribe to a
//! name for the duration of a run; writing that name re-activates every
//! other subscriber plus its downstream successors.
//!
//! ```text
//!   build task ──update_state("topic")──► StateBus ─┐
//!                                                    │ one lock: read subscribers,
//!                                                    │ queue activations
//!   process() ◄──────────take_activated()───────────┘
//! ```

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::vertex::VertexId;

/// A stateful vertex watching a state name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscriber {
    pub vertex_id: VertexId,
    pub watch: String,
    /// The vertex itself followed by its transitive successors
    pub activation: Vec<VertexId>,
}

#[derive(Debug, Default)]
struct RunScope {
    values: HashMap<String, Value>,
    logs: HashMap<String, Vec<Value>>,
    subscribers: Vec<Subscriber>,
    activated: Vec<VertexId>,
}

impl RunScope {
    fn notify(&mut self, name: &str, caller: &VertexId) -> Vec<VertexId> {
        let mut seen = HashSet::new();
        let mut activated = Vec::new();
        for subscriber in &self.subscribers {
            if subscriber.watch != name || &subscriber.vertex_id == caller {
                continue;
            }
            for id in &subscriber.activation {
                if seen.insert(id.clone()) {
                    activated.push(id.clone());
                }
            }
        }
        for id in &activated {
            if !self.activated.contains(id) {
                self.activated.push(id.clone());
            }
        }
        activated
    }
}

/// Named values scoped to a run id
#[derive(Debug, Default)]
pub struct StateBus {
    runs: Mutex<HashMap<Uuid, RunScope>>,
}

impl StateBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a run scope with its subscribers
    pub fn begin_run(&self, run_id: Uuid, subscribers: Vec<Subscriber>) {
        debug!(%run_id, subscribers = subscribers.len(), "Opening state scope");
        let scope = RunScope {
            subscribers,
            ..Default::default()
        };
        self.runs.lock().insert(run_id, scope);
    }

    /// Drop everything recorded for a run
    pub fn end_run(&self, run_id: Uuid) {
        self.runs.lock().remove(&run_id);
    }

    /// Overwrite `name` and re-activate its watchers
    ///
    /// Returns the ids added back to the pending set. Writes to a run that
    /// is not open are dropped.
    pub fn update_state(&self, run_id: Uuid, name: &str, value: Value, caller: &VertexId) -> Vec<VertexId> {
        let mut runs = self.runs.lock();
        let Some(scope) = runs.get_mut(&run_id) else {
            warn!(%run_id, name, caller = %caller, "State update for a closed run ignored");
            return Vec::new();
        };
        scope.values.insert(name.to_string(), value);
        let activated = scope.notify(name, caller);
        debug!(%run_id, name, caller = %caller, activated = activated.len(), "State updated");
        activated
    }

    /// Append to the log of `name` and re-activate its watchers
    pub fn append_state(&self, run_id: Uuid, name: &str, value: Value, caller: &VertexId) -> Vec<VertexId> {
        let mut runs = self.runs.lock();
        let Some(scope) = runs.get_mut(&run_id) else {
            warn!(%run_id, name, caller = %caller, "State append for a closed run ignored");
            return Vec::new();
        };
        scope.logs.entry(name.to_string()).or_default().push(value);
        let activated = scope.notify(name, caller);
        debug!(%run_id, name, caller = %caller, activated = activated.len(), "State appended");
        activated
    }

    /// Latest value written with [`update_state`](Self::update_state)
    pub fn get_state(&self, run_id: Uuid, name: &str) -> Option<Value> {
        self.runs
            .lock()
            .get(&run_id)
            .and_then(|scope| scope.values.get(name).cloned())
    }

    /// Values appended under `name`, oldest first
    pub fn state_log(&self, run_id: Uuid, name: &str) -> Vec<Value> {
        self.runs
            .lock()
            .get(&run_id)
            .and_then(|scope| scope.logs.get(name).cloned())
            .unwrap_or_default()
    }

    /// Drain the activations queued since the last call
    pub fn take_activated(&self, run_id: Uuid) -> Vec<VertexId> {
        self.runs
            .lock()
            .get_mut(&run_id)
            .map(|scope| std::mem::take(&mut scope.activated))
            .unwrap_or_default()
    }
}

/// State access handed to a building component
#[derive(Debug, Clone)]
pub struct StateHandle {
    bus: Arc<StateBus>,
    run_id: Uuid,
    caller: VertexId,
}

impl StateHandle {
    pub fn new(bus: Arc<StateBus>, run_id: Uuid, caller: VertexId) -> Self {
        Self { bus, run_id, caller }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.bus.get_state(self.run_id, name)
    }

    pub fn log(&self, name: &str) -> Vec<Value> {
        self.bus.state_log(self.run_id, name)
    }

    pub fn update(&self, name: &str, value: Value) -> Vec<VertexId> {
        self.bus.update_state(self.run_id, name, value, &self.caller)
    }

    pub fn append(&self, name: &str, value: Value) -> Vec<VertexId> {
        self.bus.append_state(self.run_id, name, value, &self.caller)
    }
}
