//! Layer-by-layer execution
//!
//! Each layer is a hard barrier: every vertex in it is spawned onto a
//! [`JoinSet`] (bounded by a semaphore of `parallelism` permits) and the
//! layer completes only when every task has resolved. The first failure
//! cancels the layer's token; siblings still in flight resolve as cancelled.

use futures::FutureExt;
use serde_json::Value;
use std::any::Any;
use std::collections::{HashMap, HashSet, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::Graph;
use crate::component::{BuildContext, BuildOutput, SharedComponent};
use crate::error::{BoxError, GraphError};
use crate::report::{OutputResult, RunReport, RunRequest, RunResult, RunStatus, VertexOutcome};
use crate::state_bus::StateHandle;
use crate::vertex::{BuildStatus, VertexId};

/// How a single build task resolved
enum TaskOutcome {
    Built(BuildOutput, Duration),
    Failed(BoxError),
    Cancelled,
}

impl Graph {
    /// Execute the prepared schedule, preparing a full run if needed
    ///
    /// On a build failure the run stops after the failing layer and the
    /// error names the vertex and layer. Results of vertices built so far
    /// are kept, and the report of the run is available from
    /// [`last_report`](Graph::last_report) either way.
    pub async fn process(&mut self) -> Result<RunReport, GraphError> {
        if self.schedule.is_none() {
            self.prepare(None, None)?;
        }
        let schedule = self.schedule.take().unwrap_or_default();
        let run_id = self.run_id;
        let mut report = RunReport::new(run_id, schedule.vertex_ids().cloned());

        self.status = RunStatus::Running;
        self.runs += 1;
        info!(
            %run_id,
            layers = schedule.len(),
            vertices = report.outcomes().len(),
            "Starting run"
        );

        let layers: VecDeque<Vec<VertexId>> = schedule.into_layers().into();
        let outcome = match self.config.run_timeout {
            Some(limit) => match timeout(limit, self.run_layers(layers, &mut report)).await {
                Ok(result) => result,
                Err(_) => Err(GraphError::RunTimeout(limit)),
            },
            None => self.run_layers(layers, &mut report).await,
        };
        self.release_active(&mut report);

        match outcome {
            Ok(()) => {
                self.status = RunStatus::Completed;
                report.finish(RunStatus::Completed);
                info!(%run_id, layers = report.layers.len(), "Run completed");
                self.last_report = Some(report.clone());
                Ok(report)
            }
            Err(err) => {
                self.status = RunStatus::Failed;
                report.finish(RunStatus::Failed);
                error!(%run_id, error = %err, "Run failed");
                self.last_report = Some(report);
                Err(err)
            }
        }
    }

    /// Prepare, process and collect the requested outputs
    ///
    /// Build failures, timeouts and runaway re-activation are reported in
    /// [`RunResult::failure`]; scheduling errors are returned directly.
    pub async fn run(&mut self, request: RunRequest) -> Result<RunResult, GraphError> {
        let RunRequest {
            input_value,
            inputs,
            start,
            stop,
            outputs,
        } = request;

        self.run_inputs = inputs;
        if let Some(value) = input_value {
            for id in self.input_vertices() {
                self.run_inputs.entry(id).or_insert_with(|| value.clone());
            }
        }

        if let Err(err) = self.prepare(start.as_ref(), stop.as_ref()) {
            self.run_inputs.clear();
            return Err(err);
        }
        let processed = self.process().await;
        self.run_inputs.clear();

        let (report, failure) = match processed {
            Ok(report) => (report, None),
            Err(err) => match self.last_report.clone() {
                Some(report) if report.run_id == self.run_id => (report, Some(err)),
                _ => return Err(err),
            },
        };

        let targets = if !outputs.is_empty() {
            outputs
        } else {
            let declared = self.output_vertices();
            if declared.is_empty() {
                self.terminal_vertices()
            } else {
                declared
            }
        };
        let outputs = targets
            .into_iter()
            .map(|id| self.output_result(id, &report))
            .collect();

        Ok(RunResult {
            run_id: report.run_id,
            outputs,
            report,
            failure,
        })
    }

    /// Stored result of `vertex_id`, or a marker saying why there is none
    ///
    /// Vertices outside this run report whatever an earlier run left.
    fn output_result(&self, vertex_id: VertexId, report: &RunReport) -> OutputResult {
        let outcome = report.outcome(&vertex_id);
        let stored = match outcome {
            None | Some(VertexOutcome::Built) => self.get_vertex_result(&vertex_id),
            Some(_) => None,
        };
        if let Some(value) = stored {
            return OutputResult {
                vertex_id,
                value: Some(value.clone()),
                error: None,
            };
        }
        let error = match outcome {
            Some(outcome) => outcome.marker(),
            None if self.vertices.contains_key(&vertex_id) => VertexOutcome::NotAttempted.marker(),
            None => format!("unknown vertex '{vertex_id}'"),
        };
        OutputResult {
            vertex_id,
            value: None,
            error: Some(error),
        }
    }

    async fn run_layers(
        &mut self,
        mut pending: VecDeque<Vec<VertexId>>,
        report: &mut RunReport,
    ) -> Result<(), GraphError> {
        let mut index = 0;
        while let Some(layer) = pending.pop_front() {
            if index >= self.config.max_layers {
                return Err(GraphError::MaxLayersExceeded(self.config.max_layers));
            }

            let mut runnable = Vec::with_capacity(layer.len());
            for id in layer {
                if self.inactivated.contains(&id) {
                    report.set(&id, VertexOutcome::Skipped);
                } else if self.is_reusable(&id) {
                    debug!(vertex = %id, "Frozen vertex already built, reusing result");
                    self.run_state.mark_done(&id);
                    report.set(&id, VertexOutcome::Built);
                } else {
                    runnable.push(id);
                }
            }

            report.layers.push(runnable.clone());
            self.execute_layer(index, runnable, report).await?;

            let activated = self.bus.take_activated(self.run_id);
            if !activated.is_empty() {
                pending = self.reschedule(&activated, pending)?;
            }
            index += 1;
        }
        Ok(())
    }

    fn is_reusable(&self, id: &VertexId) -> bool {
        self.vertices
            .get(id)
            .is_some_and(|v| v.is_frozen() && v.status().is_built() && v.result().is_some())
    }

    /// Merge re-activated vertices into the remaining work
    fn reschedule(
        &mut self,
        activated: &[VertexId],
        pending: VecDeque<Vec<VertexId>>,
    ) -> Result<VecDeque<Vec<VertexId>>, GraphError> {
        self.run_state.activate(&self.maps, activated);

        let mut ids: Vec<VertexId> = pending.into_iter().flatten().collect();
        for id in activated {
            if self.inactivated.remove(id) {
                if let Some(vertex) = self.vertices.get_mut(id) {
                    vertex.set_status(BuildStatus::Pending);
                }
            }
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }

        let schedule = self.scheduler().schedule_subset(&ids)?;
        debug!(
            activated = ?activated,
            layers = schedule.len(),
            "Rescheduled remaining work after state update"
        );
        Ok(schedule.into_layers().into())
    }

    async fn execute_layer(
        &mut self,
        layer: usize,
        ids: Vec<VertexId>,
        report: &mut RunReport,
    ) -> Result<(), GraphError> {
        if ids.is_empty() {
            return Ok(());
        }
        debug!(layer, vertices = ?ids, "Executing layer");

        let cancel = CancellationToken::new();
        let semaphore = Arc::new(Semaphore::new(self.config.parallelism));
        let mut tasks = JoinSet::new();
        let mut in_flight: HashSet<VertexId> = HashSet::new();

        for id in &ids {
            let component = self
                .components
                .get(id)
                .cloned()
                .ok_or_else(|| GraphError::VertexNotFound(id.clone()))?;
            let ctx = self.build_context(id, layer, cancel.child_token())?;
            if let Some(vertex) = self.vertices.get_mut(id) {
                vertex.set_bindings(ctx.inputs.clone());
                vertex.set_status(BuildStatus::Active);
            }
            in_flight.insert(id.clone());

            let token = cancel.clone();
            let semaphore = Arc::clone(&semaphore);
            let vertex_id = id.clone();
            tasks.spawn(async move {
                let outcome = tokio::select! {
                    biased;
                    _ = token.cancelled() => TaskOutcome::Cancelled,
                    result = build_with_permit(component, ctx, semaphore) => match result {
                        Ok((output, elapsed)) => TaskOutcome::Built(output, elapsed),
                        Err(err) => TaskOutcome::Failed(err),
                    },
                };
                (vertex_id, outcome)
            });
        }

        let mut failure: Option<GraphError> = None;
        while let Some(joined) = tasks.join_next().await {
            let (vertex_id, outcome) = match joined {
                Ok(resolved) => resolved,
                Err(err) => {
                    warn!(layer, error = %err, "Build task did not complete");
                    continue;
                }
            };
            in_flight.remove(&vertex_id);

            match outcome {
                TaskOutcome::Built(output, elapsed) => {
                    debug!(vertex = %vertex_id, ?elapsed, "Vertex built");
                    self.record_success(&vertex_id, output, elapsed);
                    report.set(&vertex_id, VertexOutcome::Built);
                }
                TaskOutcome::Failed(err) => {
                    if let Some(vertex) = self.vertices.get_mut(&vertex_id) {
                        vertex.set_status(BuildStatus::Errored);
                    }
                    report.set(&vertex_id, VertexOutcome::Errored(err.to_string()));
                    if failure.is_none() {
                        error!(vertex = %vertex_id, layer, error = %err, "Vertex build failed, cancelling layer");
                        cancel.cancel();
                        failure = Some(GraphError::vertex_build(vertex_id, layer, err));
                    } else {
                        warn!(vertex = %vertex_id, layer, error = %err, "Additional build failure in layer");
                    }
                }
                TaskOutcome::Cancelled => {
                    warn!(vertex = %vertex_id, layer, "Vertex build cancelled");
                    if let Some(vertex) = self.vertices.get_mut(&vertex_id) {
                        vertex.set_status(BuildStatus::Pending);
                    }
                    report.set(&vertex_id, VertexOutcome::Cancelled);
                }
            }
        }

        for id in in_flight {
            if let Some(vertex) = self.vertices.get_mut(&id) {
                vertex.set_status(BuildStatus::Pending);
            }
            report.set(&id, VertexOutcome::Cancelled);
        }

        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Everything a component sees for one build
    fn build_context(
        &self,
        id: &VertexId,
        layer: usize,
        cancel: CancellationToken,
    ) -> Result<BuildContext, GraphError> {
        let vertex = self
            .vertices
            .get(id)
            .ok_or_else(|| GraphError::VertexNotFound(id.clone()))?;

        let mut params = vertex.params().clone();
        if let Some(value) = self.run_inputs.get(id) {
            params.insert("input_value".to_string(), value.clone());
        }

        let mut collected: HashMap<String, Vec<Value>> = HashMap::new();
        for edge in self.edges.iter().filter(|e| &e.target == id) {
            if !self.edge_is_live(edge) {
                continue;
            }
            if let Some(value) = self.vertices.get(&edge.source).and_then(|v| v.result()) {
                collected
                    .entry(edge.target_port.clone())
                    .or_default()
                    .push(value.clone());
            }
        }
        let inputs = collected
            .into_iter()
            .map(|(port, mut values)| {
                let value = if values.len() == 1 {
                    values.remove(0)
                } else {
                    Value::Array(values)
                };
                (port, value)
            })
            .collect();

        Ok(BuildContext {
            vertex_id: id.clone(),
            layer,
            params,
            inputs,
            cancel,
            state: StateHandle::new(Arc::clone(&self.bus), self.run_id, id.clone()),
        })
    }

    fn record_success(&mut self, id: &VertexId, output: BuildOutput, elapsed: Duration) {
        let BuildOutput { value, route } = output;
        let history = self.config.build_time_history;
        let mut is_routing = false;
        if let Some(vertex) = self.vertices.get_mut(id) {
            is_routing = vertex.is_routing();
            vertex.record_build(value, elapsed, history);
        }
        self.run_state.mark_done(id);

        if let (true, Some(port)) = (is_routing, route) {
            self.mark_branch(id, &port);
        }
    }

    /// Vertices left active by an aborted run go back to pending
    fn release_active(&mut self, report: &mut RunReport) {
        for (id, vertex) in self.vertices.iter_mut() {
            if vertex.status() == BuildStatus::Active {
                vertex.set_status(BuildStatus::Pending);
                report.set(id, VertexOutcome::Cancelled);
            }
        }
    }
}

/// Acquire a permit and build, turning panics into errors
async fn build_with_permit(
    component: SharedComponent,
    ctx: BuildContext,
    semaphore: Arc<Semaphore>,
) -> Result<(BuildOutput, Duration), BoxError> {
    let _permit = semaphore.acquire_owned().await?;
    let started = Instant::now();
    match AssertUnwindSafe(component.build(ctx)).catch_unwind().await {
        Ok(result) => result.map(|output| (output, started.elapsed())),
        Err(panic) => Err(format!("component panicked: {}", panic_message(panic.as_ref())).into()),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
