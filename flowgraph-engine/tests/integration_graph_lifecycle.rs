//! Graph lifecycle integration tests
//!
//! Construction from JSON payloads, validation failures, vertex-driven
//! stepping, live merges against a running session, and rendering.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use flowgraph_engine::{
    BoxError, BuildContext, BuildOutput, BuildStatus, Component, ComponentCache,
    ComponentRegistry, EngineConfig, Graph, GraphError, GraphPayload, NodeData, RunRequest,
    SharedComponent, VertexId,
};

struct Upper;

#[async_trait]
impl Component for Upper {
    async fn build(&self, ctx: BuildContext) -> Result<BuildOutput, BoxError> {
        let text = ctx.text_input().unwrap_or_default();
        Ok(BuildOutput::value(json!(text.to_uppercase())))
    }
}

fn registry() -> Arc<ComponentRegistry> {
    let mut registry = ComponentRegistry::new();
    registry.register_fallback(|_| Arc::new(Upper) as SharedComponent);
    Arc::new(registry)
}

fn id(s: &str) -> VertexId {
    VertexId::from(s)
}

const FLOW: &str = r#"{
    "nodes": [
        {"id": "chat_input", "type": "ChatInput"},
        {"id": "prompt", "type": "Prompt", "params": {"template": "{input}"}},
        {"id": "chat_output", "type": "ChatOutput", "display_name": "Answer"}
    ],
    "edges": [
        {"source": "chat_input", "target": "prompt"},
        {"source": "prompt", "target": "chat_output", "target_port": "message"}
    ]
}"#;

fn from_json(json: &str) -> Result<Graph, GraphError> {
    Graph::from_json(
        json,
        registry(),
        Arc::new(ComponentCache::new()),
        EngineConfig::default(),
    )
}

// =============================================================================
// Construction
// =============================================================================

#[test]
fn test_graph_from_json() {
    let graph = from_json(FLOW).unwrap();
    assert_eq!(graph.vertex_ids(), &[id("chat_input"), id("prompt"), id("chat_output")]);
    assert_eq!(graph.input_vertices(), vec![id("chat_input")]);
    assert_eq!(graph.output_vertices(), vec![id("chat_output")]);
    assert_eq!(graph.edges()[0].source_port, "output");
    assert_eq!(graph.edges()[1].target_port, "message");
    assert_eq!(graph.vertex(&id("chat_output")).unwrap().display_name(), "Answer");
    assert_eq!(graph.terminal_vertices(), vec![id("chat_output")]);
}

#[test]
fn test_construction_errors() {
    let missing = r#"{"nodes": [{"id": "a", "type": "X"}], "edges": [{"source": "a", "target": "b"}]}"#;
    let err = from_json(missing).unwrap_err();
    assert!(matches!(err, GraphError::MissingVertex { .. }));
    assert_eq!(err.vertex_id(), Some(&id("b")));

    let disconnected = r#"{
        "nodes": [{"id": "a", "type": "X"}, {"id": "b", "type": "X"}, {"id": "c", "type": "X"}],
        "edges": [{"source": "a", "target": "b"}]
    }"#;
    assert!(matches!(
        from_json(disconnected),
        Err(GraphError::DisconnectedVertex(v)) if v == id("c")
    ));

    assert!(matches!(from_json("{not json"), Err(GraphError::InvalidPayload(_))));

    let bad_config = Graph::from_json(
        FLOW,
        registry(),
        Arc::new(ComponentCache::new()),
        EngineConfig::default().with_max_layers(0),
    );
    assert!(matches!(bad_config, Err(GraphError::ConfigError(_))));
}

#[tokio::test]
async fn test_two_inputs_rejected_at_schedule_time() {
    let payload = GraphPayload::new()
        .node(NodeData::new("in1", "ChatInput"))
        .node(NodeData::new("in2", "TextInput"))
        .node(NodeData::new("join", "Prompt"))
        .edge("in1", "join")
        .edge("in2", "join");
    let mut graph = Graph::new(payload, registry()).unwrap();

    let err = graph.run(RunRequest::new()).await.unwrap_err();
    match err {
        GraphError::MultipleEntryPoints(ids) => assert_eq!(ids, vec![id("in1"), id("in2")]),
        other => panic!("unexpected error: {other}"),
    }

    // bounding the run to one input is fine
    let result = graph
        .run(RunRequest::new().with_input("in1", json!("ok")).stop_at("in1"))
        .await
        .unwrap();
    assert!(result.is_success());
}

// =============================================================================
// Vertex-driven stepping
// =============================================================================

#[test]
fn test_should_run_vertex_in_dependency_order() {
    let mut graph = from_json(FLOW).unwrap();
    assert!(!graph.should_run_vertex(&id("chat_output")));
    assert!(!graph.should_run_vertex(&id("prompt")));
    assert!(graph.should_run_vertex(&id("chat_input")));
    assert!(!graph.should_run_vertex(&id("chat_input")));
    assert!(graph.should_run_vertex(&id("prompt")));
    assert!(graph.should_run_vertex(&id("chat_output")));
    assert!(!graph.should_run_vertex(&id("ghost")));
}

// =============================================================================
// Live merge
// =============================================================================

#[tokio::test]
async fn test_update_with_same_definition_twice() {
    let mut graph = from_json(FLOW).unwrap();
    let result = graph
        .run(RunRequest::new().with_input_value(json!("hi")))
        .await
        .unwrap();
    assert_eq!(result.output(&id("chat_output")).unwrap().value, Some(json!("HI")));

    let statuses: Vec<BuildStatus> = graph.vertices().map(|v| v.status()).collect();
    for _ in 0..2 {
        let summary = graph
            .update_from_payload(GraphPayload::from_json(FLOW).unwrap())
            .unwrap();
        assert!(summary.is_noop());
    }
    let after: Vec<BuildStatus> = graph.vertices().map(|v| v.status()).collect();
    assert_eq!(statuses, after);
    assert_eq!(graph.get_vertex_result(&id("chat_output")), Some(&json!("HI")));
}

#[tokio::test]
async fn test_update_reuses_cached_components() {
    let cache = Arc::new(ComponentCache::new());
    let mut graph = Graph::from_json(FLOW, registry(), Arc::clone(&cache), EngineConfig::default()).unwrap();
    assert_eq!(cache.misses(), 3);

    let edited = FLOW.replace("\"{input}\"", "\"{input}!\"");
    graph
        .update_from_payload(GraphPayload::from_json(&edited).unwrap())
        .unwrap();
    assert_eq!(cache.misses(), 4);
    assert_eq!(cache.hits(), 2);
    assert_eq!(cache.len(), 3);
}

#[tokio::test]
async fn test_rerun_after_edit_rebuilds_changed_vertex() {
    let mut graph = from_json(FLOW).unwrap();
    graph
        .run(RunRequest::new().with_input_value(json!("one")))
        .await
        .unwrap();

    let edited = FLOW.replace("\"{input}\"", "\"changed\"");
    let summary = graph
        .update_from_payload(GraphPayload::from_json(&edited).unwrap())
        .unwrap();
    assert_eq!(summary.changed, vec![id("prompt")]);
    assert_eq!(graph.vertex(&id("prompt")).unwrap().status(), BuildStatus::Pending);
    assert!(graph.vertex(&id("chat_output")).unwrap().bindings().is_empty());

    let result = graph
        .run(RunRequest::new().with_input_value(json!("two")))
        .await
        .unwrap();
    assert_eq!(result.output(&id("chat_output")).unwrap().value, Some(json!("TWO")));
    assert_eq!(graph.run_count(), 2);
    assert_eq!(graph.update_count(), 1);
}

// =============================================================================
// Rendering
// =============================================================================

#[tokio::test]
async fn test_mermaid_rendering() {
    let mut graph = from_json(FLOW).unwrap();
    let plain = graph.to_mermaid();
    assert!(plain.starts_with("graph TD\n"));
    assert!(plain.contains("    chat_input([\"chat_input\"])"));
    assert!(plain.contains("    chat_output[[\"Answer\"]]"));
    assert!(plain.contains("    chat_input --> prompt"));
    assert!(plain.contains("    prompt -- \"message\" --> chat_output"));
    assert!(!plain.contains("classDef"));

    graph.process().await.unwrap();
    let coloured = graph.to_mermaid_with_status();
    assert!(coloured.contains(":::built"));
    assert!(coloured.contains("classDef built"));
}
