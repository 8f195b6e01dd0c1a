//! The script data model: nodes, graphs and scripts.
//!
//! A [`Script`] is a document: a collection of named [`Graph`]s, one of which
//! is the designated main graph. A [`Graph`] is an unordered collection of
//! [`Node`]s keyed by [`NodeKey`]. A [`Node`] is a bag of typed property
//! maps, including the edges stored on its input sockets.
//!
//! Models are immutable during matching and diffing; only
//! [`patch`](crate::patch) mutates them.

use std::collections::{BTreeMap, BTreeSet};

use crate::core::{Edge, GraphKey, NodeKey, PropertyMap, TextureRef};
use crate::value::Value;

/// A node, modeled as a collection of typed property maps:
///
/// - [`values`](Node::values): plain property values (positions, attributes,
///   socket defaults),
/// - [`node_refs`](Node::node_refs): references to other nodes (e.g. parent
///   pointers),
/// - [`graph_refs`](Node::graph_refs): references to graphs (e.g. the
///   sub-graph backing a group node),
/// - [`texture_refs`](Node::texture_refs): opaque texture references,
/// - [`input_refs`](Node::input_refs): input edges keyed by destination
///   socket name, with unconnected sockets set to [`Edge::invalid`].
///
/// Nodes of the same type within a document always carry the same set of
/// property keys across all five maps; per-property diffing relies on this.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Node {
    /// Plain property values.
    #[serde(rename = "node_values")]
    pub values: PropertyMap<Value>,
    /// References to other nodes.
    #[serde(rename = "node_references")]
    pub node_refs: PropertyMap<NodeKey>,
    /// References to graphs.
    #[serde(rename = "graph_references")]
    pub graph_refs: PropertyMap<GraphKey>,
    /// References to textures.
    #[serde(rename = "texture_references")]
    pub texture_refs: PropertyMap<TextureRef>,
    /// Input edges, keyed by destination socket name.
    #[serde(rename = "input_references")]
    pub input_refs: PropertyMap<Edge>,
}

impl Node {
    /// The value stored under `name`, if any.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Inserts or overwrites the value property `name`.
    pub fn set_value(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    /// Inserts or overwrites the node reference property `name`.
    pub fn set_node_ref(&mut self, name: impl Into<String>, target: impl Into<NodeKey>) {
        self.node_refs.insert(name.into(), target.into());
    }

    /// Inserts or overwrites the graph reference property `name`.
    pub fn set_graph_ref(&mut self, name: impl Into<String>, target: impl Into<GraphKey>) {
        self.graph_refs.insert(name.into(), target.into());
    }

    /// Inserts or overwrites the texture reference property `name`.
    pub fn set_texture_ref(&mut self, name: impl Into<String>, target: TextureRef) {
        self.texture_refs.insert(name.into(), target);
    }

    /// Inserts or overwrites the input edge on `socket`.
    pub fn set_input(&mut self, socket: impl Into<String>, edge: Edge) {
        self.input_refs.insert(socket.into(), edge);
    }

    /// Total number of properties across all five maps.
    #[must_use]
    pub fn property_count(&self) -> usize {
        self.values.len()
            + self.node_refs.len()
            + self.graph_refs.len()
            + self.texture_refs.len()
            + self.input_refs.len()
    }

    /// Whether the node carries no properties at all.
    ///
    /// For a node diff this means "no changes".
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.property_count() == 0
    }
}

/// A named, unordered collection of nodes.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Graph {
    /// The nodes of the graph, keyed by node id.
    pub nodes: BTreeMap<NodeKey, Node>,
}

impl Graph {
    /// The node with the given id, if present.
    #[must_use]
    pub fn node(&self, id: &NodeKey) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Mutable access to the node with the given id, if present.
    pub fn node_mut(&mut self, id: &NodeKey) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    /// Inserts `node` under `id`, replacing any previous node with that id.
    pub fn insert_node(&mut self, id: impl Into<NodeKey>, node: Node) {
        self.nodes.insert(id.into(), node);
    }

    /// Removes and returns the node with the given id.
    pub fn remove_node(&mut self, id: &NodeKey) -> Option<Node> {
        self.nodes.remove(id)
    }
}

/// A document: a collection of graphs, keyed by graph id.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Script {
    /// The graphs of the script, keyed by graph id.
    pub graphs: BTreeMap<GraphKey, Graph>,
}

impl Script {
    /// Well-known id of the designated main graph of a document.
    pub const MAIN_GRAPH: &'static str = "nd_Main";

    /// The graph with the given id, if present.
    #[must_use]
    pub fn graph(&self, id: &GraphKey) -> Option<&Graph> {
        self.graphs.get(id)
    }

    /// Mutable access to the graph with the given id, if present.
    pub fn graph_mut(&mut self, id: &GraphKey) -> Option<&mut Graph> {
        self.graphs.get_mut(id)
    }

    /// Inserts `graph` under `id`, replacing any previous graph with that id.
    pub fn insert_graph(&mut self, id: impl Into<GraphKey>, graph: Graph) {
        self.graphs.insert(id.into(), graph);
    }

    /// Removes and returns the graph with the given id.
    pub fn remove_graph(&mut self, id: &GraphKey) -> Option<Graph> {
        self.graphs.remove(id)
    }

    /// The designated main graph, if present.
    #[must_use]
    pub fn main_graph(&self) -> Option<&Graph> {
        self.graphs.get(&GraphKey::new(Self::MAIN_GRAPH))
    }
}

/// Host-supplied node typing.
///
/// Matching only ever pairs nodes of equal type, and the graph edit cost is a
/// histogram distance over types, but the engine does not prescribe where the
/// type lives on a node; the host injects that knowledge here.
pub trait NodeTyper {
    /// The type name of `node`, or `None` if the node carries no type
    /// information.
    fn node_type<'n>(&self, node: &'n Node) -> Option<&'n str>;
}

/// Types nodes by a designated string-valued property, with an optional
/// group-name fallback for container node types.
///
/// Generic group nodes all share the same host type; falling back to the
/// group name keeps differently-named groups from matching each other.
#[derive(Clone, Debug)]
pub struct KeyTyper {
    type_property: String,
    group_fallback: Option<(String, BTreeSet<String>)>,
}

impl KeyTyper {
    /// Creates a typer reading the node type from `type_property`.
    pub fn new(type_property: impl Into<String>) -> Self {
        Self {
            type_property: type_property.into(),
            group_fallback: None,
        }
    }

    /// For nodes whose type is one of `group_types`, read the type from
    /// `group_property` instead.
    #[must_use]
    pub fn with_group_fallback(
        mut self,
        group_property: impl Into<String>,
        group_types: impl IntoIterator<Item = String>,
    ) -> Self {
        self.group_fallback = Some((group_property.into(), group_types.into_iter().collect()));
        self
    }
}

impl NodeTyper for KeyTyper {
    fn node_type<'n>(&self, node: &'n Node) -> Option<&'n str> {
        let ty = node.value(&self.type_property)?.as_str()?;
        if let Some((group_property, group_types)) = &self.group_fallback {
            if group_types.contains(ty) {
                return node.value(group_property)?.as_str();
            }
        }
        Some(ty)
    }
}
