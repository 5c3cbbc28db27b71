//! Component boundary
//!
//! The engine treats a component as an opaque unit that resolves to a value
//! or an error. Components are instantiated from a [`ComponentRegistry`]
//! through a session-scoped [`ComponentCache`].

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::{BoxError, GraphError};
use crate::payload::NodeData;
use crate::state_bus::StateHandle;
use crate::vertex::VertexId;

/// Everything a component sees while building
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub vertex_id: VertexId,
    /// Index of the layer being executed
    pub layer: usize,
    pub params: Map<String, Value>,
    /// Predecessor results keyed by target port
    pub inputs: HashMap<String, Value>,
    /// Cancelled when a sibling in the same layer fails
    pub cancel: CancellationToken,
    pub state: StateHandle,
}

impl BuildContext {
    pub fn input(&self, port: &str) -> Option<&Value> {
        self.inputs.get(port)
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }

    /// Text of the first input in port order, or `input_value`
    pub fn text_input(&self) -> Option<String> {
        let mut ports: Vec<_> = self.inputs.keys().collect();
        ports.sort();
        ports
            .first()
            .and_then(|port| self.inputs.get(*port))
            .or_else(|| self.params.get("input_value"))
            .map(value_to_text)
    }
}

/// Render a value as plain text
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(value_to_text).collect::<Vec<_>>().join("\n"),
        other => other.to_string(),
    }
}

/// Value produced by a build
#[derive(Debug, Clone, PartialEq)]
pub struct BuildOutput {
    pub value: Value,
    /// Output port a routing vertex continues on
    pub route: Option<String>,
}

impl BuildOutput {
    pub fn value(value: Value) -> Self {
        Self { value, route: None }
    }

    pub fn routed(value: Value, port: impl Into<String>) -> Self {
        Self {
            value,
            route: Some(port.into()),
        }
    }
}

/// A pipeline component
///
/// # Example
///
/// ```ignore
/// struct Upper;
///
/// #[async_trait]
/// impl Component for Upper {
///     async fn build(&self, ctx: BuildContext) -> Result<BuildOutput, BoxError> {
///         let text = ctx.text_input().unwrap_or_default();
///         Ok(BuildOutput::value(json!(text.to_uppercase())))
///     }
/// }
/// ```
#[async_trait]
pub trait Component: Send + Sync {
    async fn build(&self, ctx: BuildContext) -> Result<BuildOutput, BoxError>;
}

pub type SharedComponent = Arc<dyn Component>;

/// Creates a component for a node definition
pub type ComponentFactory = Arc<dyn Fn(&NodeData) -> SharedComponent + Send + Sync>;

/// Maps component type names to factories
#[derive(Clone, Default)]
pub struct ComponentRegistry {
    factories: HashMap<String, ComponentFactory>,
    fallback: Option<ComponentFactory>,
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<_> = self.factories.keys().collect();
        types.sort();
        f.debug_struct("ComponentRegistry")
            .field("types", &types)
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory for a type name
    pub fn register<F>(&mut self, type_name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&NodeData) -> SharedComponent + Send + Sync + 'static,
    {
        self.factories.insert(type_name.into(), Arc::new(factory));
        self
    }

    /// Register a factory used for every unregistered type name
    pub fn register_fallback<F>(&mut self, factory: F) -> &mut Self
    where
        F: Fn(&NodeData) -> SharedComponent + Send + Sync + 'static,
    {
        self.fallback = Some(Arc::new(factory));
        self
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    /// Instantiate the component for a node
    pub fn instantiate(&self, node: &NodeData) -> Result<SharedComponent, GraphError> {
        let factory = self
            .factories
            .get(&node.type_name)
            .or(self.fallback.as_ref())
            .ok_or_else(|| GraphError::UnknownComponent {
                vertex_id: VertexId::new(node.id.clone()),
                type_name: node.type_name.clone(),
            })?;
        Ok(factory(node))
    }
}

/// Instantiated components for one flow session
///
/// An entry is reused while the node definition it was built from is
/// unchanged.
#[derive(Default)]
pub struct ComponentCache {
    entries: Mutex<HashMap<VertexId, (NodeData, SharedComponent)>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl std::fmt::Debug for ComponentCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentCache")
            .field("len", &self.len())
            .field("hits", &self.hits())
            .field("misses", &self.misses())
            .finish()
    }
}

impl ComponentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached component for `node` or instantiate a new one
    pub fn get_or_instantiate(
        &self,
        node: &NodeData,
        registry: &ComponentRegistry,
    ) -> Result<SharedComponent, GraphError> {
        let id = VertexId::new(node.id.clone());
        let mut entries = self.entries.lock();
        if let Some((cached, component)) = entries.get(&id) {
            if cached == node {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(Arc::clone(component));
            }
        }
        let component = registry.instantiate(node)?;
        self.misses.fetch_add(1, Ordering::Relaxed);
        entries.insert(id, (node.clone(), Arc::clone(&component)));
        Ok(component)
    }

    pub fn invalidate(&self, id: &VertexId) {
        self.entries.lock().remove(id);
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> usize {
        self.misses.load(Ordering::Relaxed)
    }
}
