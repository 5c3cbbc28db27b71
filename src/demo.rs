//! # Demo Components
//!
//! A small text-processing component set so graph payloads can be run from
//! the command line. Each type name maps to one component; unknown type
//! names are rejected when the graph is built.
//!
//! | Type name                 | Behaviour                                        |
//! |---------------------------|--------------------------------------------------|
//! | `ChatInput`, `TextInput`  | Emits `input_value` (or `params.value`)          |
//! | `ChatOutput`, `TextOutput`| Passes its input through                         |
//! | `Echo`                    | Passes its input through                         |
//! | `Uppercase`               | Upper-cases its input                            |
//! | `Concat`                  | Joins every input in port order                  |
//! | `Prompt`                  | Fills `{port}` placeholders in `params.template` |
//! | `ConditionalRouter`       | Routes to `true`/`false` on `params.contains`    |
//! | `SetState`                | Writes its input to state `params.name`          |
//! | `GetState`                | Reads state `params.name`                        |
//! | `Delay`                   | Sleeps `params.millis`, then passes through      |
//! | `Fail`                    | Always fails with `params.message`               |

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use flowgraph_engine::{
    value_to_text, BoxError, BuildContext, BuildOutput, Component, ComponentRegistry,
    SharedComponent,
};

// =============================================================================
// INPUT / OUTPUT
// =============================================================================

/// Entry point of a flow
struct TextInput;

#[async_trait]
impl Component for TextInput {
    async fn build(&self, ctx: BuildContext) -> Result<BuildOutput, BoxError> {
        let value = ctx
            .param("input_value")
            .or_else(|| ctx.param("value"))
            .cloned()
            .unwrap_or_else(|| json!(""));
        Ok(BuildOutput::value(value))
    }
}

/// Pass-through used for outputs and plain relays
struct Echo;

#[async_trait]
impl Component for Echo {
    async fn build(&self, ctx: BuildContext) -> Result<BuildOutput, BoxError> {
        let value = match ctx.inputs.len() {
            0 => ctx.param("input_value").cloned().unwrap_or(Value::Null),
            1 => ctx.inputs.values().next().cloned().unwrap_or(Value::Null),
            _ => json!(ctx.text_input().unwrap_or_default()),
        };
        Ok(BuildOutput::value(value))
    }
}

// =============================================================================
// TEXT
// =============================================================================

struct Uppercase;

#[async_trait]
impl Component for Uppercase {
    async fn build(&self, ctx: BuildContext) -> Result<BuildOutput, BoxError> {
        let text = ctx.text_input().unwrap_or_default();
        Ok(BuildOutput::value(json!(text.to_uppercase())))
    }
}

struct Concat;

#[async_trait]
impl Component for Concat {
    async fn build(&self, ctx: BuildContext) -> Result<BuildOutput, BoxError> {
        let separator = ctx.param_str("separator").unwrap_or(" ");
        let mut ports: Vec<&String> = ctx.inputs.keys().collect();
        ports.sort();
        let joined = ports
            .into_iter()
            .filter_map(|port| ctx.input(port))
            .map(value_to_text)
            .collect::<Vec<_>>()
            .join(separator);
        Ok(BuildOutput::value(json!(joined)))
    }
}

struct Prompt;

#[async_trait]
impl Component for Prompt {
    async fn build(&self, ctx: BuildContext) -> Result<BuildOutput, BoxError> {
        let Some(template) = ctx.param_str("template") else {
            return Ok(BuildOutput::value(json!(ctx.text_input().unwrap_or_default())));
        };
        let mut rendered = template.to_string();
        for (port, value) in &ctx.inputs {
            rendered = rendered.replace(&format!("{{{port}}}"), &value_to_text(value));
        }
        Ok(BuildOutput::value(json!(rendered)))
    }
}

// =============================================================================
// ROUTING
// =============================================================================

/// Continues on `true` when the input contains `params.contains`
struct ConditionalRouter;

#[async_trait]
impl Component for ConditionalRouter {
    async fn build(&self, ctx: BuildContext) -> Result<BuildOutput, BoxError> {
        let text = ctx.text_input().unwrap_or_default();
        let needle = ctx
            .param_str("contains")
            .ok_or("ConditionalRouter needs a 'contains' parameter")?;
        let port = if text.contains(needle) { "true" } else { "false" };
        debug!(vertex = %ctx.vertex_id, port, "Routing");
        Ok(BuildOutput::routed(json!(text), port))
    }
}

// =============================================================================
// STATE
// =============================================================================

struct SetState;

#[async_trait]
impl Component for SetState {
    async fn build(&self, ctx: BuildContext) -> Result<BuildOutput, BoxError> {
        let name = ctx
            .param_str("name")
            .ok_or("SetState needs a 'name' parameter")?;
        let value = json!(ctx.text_input().unwrap_or_default());
        if ctx.state.get(name).as_ref() != Some(&value) {
            ctx.state.update(name, value.clone());
        }
        Ok(BuildOutput::value(value))
    }
}

struct GetState;

#[async_trait]
impl Component for GetState {
    async fn build(&self, ctx: BuildContext) -> Result<BuildOutput, BoxError> {
        let name = ctx
            .param_str("name")
            .ok_or("GetState needs a 'name' parameter")?;
        let value = ctx
            .state
            .get(name)
            .or_else(|| ctx.text_input().map(Value::String))
            .unwrap_or(Value::Null);
        Ok(BuildOutput::value(value))
    }
}

// =============================================================================
// CONTROL
// =============================================================================

struct Delay;

#[async_trait]
impl Component for Delay {
    async fn build(&self, ctx: BuildContext) -> Result<BuildOutput, BoxError> {
        let millis = ctx.param("millis").and_then(Value::as_u64).unwrap_or(100);
        tokio::select! {
            _ = ctx.cancel.cancelled() => Err("delay cancelled".into()),
            _ = tokio::time::sleep(Duration::from_millis(millis)) => {
                Ok(BuildOutput::value(json!(ctx.text_input().unwrap_or_default())))
            }
        }
    }
}

struct Fail;

#[async_trait]
impl Component for Fail {
    async fn build(&self, ctx: BuildContext) -> Result<BuildOutput, BoxError> {
        let message = ctx.param_str("message").unwrap_or("component failed");
        Err(message.to_string().into())
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Registry with every demo component
pub fn demo_registry() -> Arc<ComponentRegistry> {
    let mut registry = ComponentRegistry::new();
    registry
        .register("ChatInput", |_| Arc::new(TextInput) as SharedComponent)
        .register("TextInput", |_| Arc::new(TextInput) as SharedComponent)
        .register("ChatOutput", |_| Arc::new(Echo) as SharedComponent)
        .register("TextOutput", |_| Arc::new(Echo) as SharedComponent)
        .register("Echo", |_| Arc::new(Echo) as SharedComponent)
        .register("Uppercase", |_| Arc::new(Uppercase) as SharedComponent)
        .register("Concat", |_| Arc::new(Concat) as SharedComponent)
        .register("Prompt", |_| Arc::new(Prompt) as SharedComponent)
        .register("ConditionalRouter", |_| Arc::new(ConditionalRouter) as SharedComponent)
        .register("SetState", |_| Arc::new(SetState) as SharedComponent)
        .register("GetState", |_| Arc::new(GetState) as SharedComponent)
        .register("Delay", |_| Arc::new(Delay) as SharedComponent)
        .register("Fail", |_| Arc::new(Fail) as SharedComponent);
    Arc::new(registry)
}

// =============================================================================
// UNIT TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use flowgraph_engine::{
        ComponentCache, EdgeData, EngineConfig, Graph, GraphError, GraphPayload, NodeData,
        RunRequest, VertexId,
    };

    fn graph(payload: GraphPayload) -> Graph {
        Graph::from_payload(
            payload,
            demo_registry(),
            Arc::new(ComponentCache::new()),
            EngineConfig::default().with_parallelism(4),
        )
        .unwrap()
    }

    fn id(s: &str) -> VertexId {
        VertexId::from(s)
    }

    #[tokio::test]
    async fn test_prompt_pipeline() {
        let payload = GraphPayload::new()
            .node(NodeData::new("in", "ChatInput"))
            .node(NodeData::new("prompt", "Prompt").with_param("template", json!("Q: {input}")))
            .node(NodeData::new("upper", "Uppercase"))
            .node(NodeData::new("out", "ChatOutput"))
            .edge("in", "prompt")
            .edge("prompt", "upper")
            .edge("upper", "out");
        let mut graph = graph(payload);

        let result = graph
            .run(RunRequest::new().with_input_value(json!("why?")))
            .await
            .unwrap();
        assert_eq!(result.output(&id("out")).unwrap().value, Some(json!("Q: WHY?")));
    }

    #[tokio::test]
    async fn test_router_takes_one_branch() {
        let payload = GraphPayload::new()
            .node(NodeData::new("in", "TextInput"))
            .node(NodeData::new("router", "ConditionalRouter").with_param("contains", json!("yes")))
            .node(NodeData::new("up", "Uppercase"))
            .node(NodeData::new("plain", "Echo"))
            .edge_data(EdgeData::new("router", "up").with_ports("true", "input"))
            .edge_data(EdgeData::new("router", "plain").with_ports("false", "input"))
            .edge("in", "router");
        let mut graph = graph(payload);

        let result = graph
            .run(
                RunRequest::new()
                    .with_input_value(json!("yes please"))
                    .with_output("up")
                    .with_output("plain"),
            )
            .await
            .unwrap();
        assert_eq!(result.output(&id("up")).unwrap().value, Some(json!("YES PLEASE")));
        assert!(!result.output(&id("plain")).unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_state_round_trip() {
        let payload = GraphPayload::new()
            .node(NodeData::new("in", "TextInput"))
            .node(NodeData::new("set", "SetState").with_param("name", json!("topic")))
            .node(NodeData::new("get", "GetState").with_param("name", json!("topic")))
            .node(NodeData::new("out", "TextOutput"))
            .edge("in", "set")
            .edge("set", "get")
            .edge("get", "out");
        let mut graph = graph(payload);

        let result = graph
            .run(RunRequest::new().with_input_value(json!("rust")))
            .await
            .unwrap();
        assert_eq!(result.output(&id("out")).unwrap().value, Some(json!("rust")));
    }

    #[tokio::test]
    async fn test_fail_reports_build_error() {
        let payload = GraphPayload::new()
            .node(NodeData::new("in", "TextInput"))
            .node(NodeData::new("boom", "Fail").with_param("message", json!("nope")))
            .node(NodeData::new("out", "TextOutput"))
            .edge("in", "boom")
            .edge("boom", "out");
        let mut graph = graph(payload);

        let result = graph.run(RunRequest::new()).await.unwrap();
        match result.failure {
            Some(GraphError::VertexBuild { ref vertex_id, ref message, .. }) => {
                assert_eq!(vertex_id, &id("boom"));
                assert!(message.contains("nope"));
            }
            ref other => panic!("unexpected failure: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_type_rejected() {
        let payload = GraphPayload::new().node(NodeData::new("x", "Nonexistent"));
        let err = Graph::new(payload, demo_registry()).unwrap_err();
        assert!(matches!(err, GraphError::UnknownComponent { .. }));
    }
}
