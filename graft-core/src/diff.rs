//! Structural change sets between two versions of a model.
//!
//! Diffing consumes the matchings produced by [`matching`](crate::matching):
//! a version-side object with no ancestor match becomes an `Add`, an
//! ancestor-side object with no version match becomes a `Del`, and a matched
//! pair whose properties differ becomes an `Edit` keyed by the *ancestor*
//! id. References inside diffs are always expressed in ancestor ids where a
//! match exists, which makes a diff independently applicable to the
//! ancestor.

use std::collections::BTreeMap;

use crate::core::{Edge, GraphKey, NodeKey, PropertyMap, TextureRef};
use crate::matching::{match_nodes, RefMatch};
use crate::script::{Graph, Node, NodeTyper, Script};
use crate::value::Value;

/// The kind of change recorded against an id.
#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// The object exists only in the version.
    Add,
    /// The object exists only in the ancestor.
    Del,
    /// The object exists in both and its content differs.
    Edit,
    /// No change.
    None,
}

/// A partial node carrying only changed properties.
pub type NodeDiff = Node;

/// A change recorded against a node id.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "operation", content = "diff", rename_all = "lowercase")]
pub enum NodeChange {
    /// A complete node, with references renamed to ancestor ids where a
    /// match exists.
    Add(Node),
    /// The complete deleted node, verbatim from the ancestor.
    Del(Node),
    /// Only the differing properties, keyed by the ancestor id.
    Edit(NodeDiff),
}

impl NodeChange {
    /// The change kind.
    #[must_use]
    pub fn operation(&self) -> Operation {
        match self {
            NodeChange::Add(_) => Operation::Add,
            NodeChange::Del(_) => Operation::Del,
            NodeChange::Edit(_) => Operation::Edit,
        }
    }

    /// The node payload carried by the change.
    #[must_use]
    pub fn diff(&self) -> &Node {
        match self {
            NodeChange::Add(node) | NodeChange::Del(node) | NodeChange::Edit(node) => node,
        }
    }
}

/// The changes to the nodes of a graph, keyed by node id.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct GraphDiff {
    /// Per-node changes.
    pub nodes: BTreeMap<NodeKey, NodeChange>,
}

impl GraphDiff {
    /// Whether the diff records no changes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// A change recorded against a graph id.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "operation", content = "diff", rename_all = "lowercase")]
pub enum GraphChange {
    /// A complete graph, with references inside its nodes renamed to
    /// ancestor ids where a match exists.
    Add(Graph),
    /// The complete deleted graph, verbatim from the ancestor.
    Del(Graph),
    /// Only the changed nodes, keyed by the ancestor id.
    Edit(GraphDiff),
}

impl GraphChange {
    /// The change kind.
    #[must_use]
    pub fn operation(&self) -> Operation {
        match self {
            GraphChange::Add(_) => Operation::Add,
            GraphChange::Del(_) => Operation::Del,
            GraphChange::Edit(_) => Operation::Edit,
        }
    }
}

/// The changes to the graphs of a script, keyed by graph id.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ScriptDiff {
    /// Per-graph changes.
    pub graphs: BTreeMap<GraphKey, GraphChange>,
}

impl ScriptDiff {
    /// Whether the diff records no changes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graphs.is_empty()
    }
}

fn diff_values(
    ancestor: &PropertyMap<Value>,
    version: &PropertyMap<Value>,
) -> PropertyMap<Value> {
    let mut diff = PropertyMap::new();
    for (name, version_value) in version {
        if ancestor.get(name) != Some(version_value) {
            diff.insert(name.clone(), version_value.clone());
        }
    }
    diff
}

fn diff_node_refs(
    ancestor: &PropertyMap<NodeKey>,
    version: &PropertyMap<NodeKey>,
    node_matches: &RefMatch<NodeKey>,
) -> PropertyMap<NodeKey> {
    let mut diff = PropertyMap::new();
    for (name, version_ref) in version {
        match node_matches.to_ancestor(version_ref) {
            // The referenced node is new in the version: keep its id verbatim.
            None => {
                diff.insert(name.clone(), version_ref.clone());
            }
            Some(translated) => {
                if ancestor.get(name) != Some(translated) {
                    diff.insert(name.clone(), translated.clone());
                }
            }
        }
    }
    diff
}

fn diff_graph_refs(
    ancestor: &PropertyMap<GraphKey>,
    version: &PropertyMap<GraphKey>,
    graph_matches: &RefMatch<GraphKey>,
) -> PropertyMap<GraphKey> {
    let mut diff = PropertyMap::new();
    for (name, version_ref) in version {
        match graph_matches.to_ancestor(version_ref) {
            None => {
                diff.insert(name.clone(), version_ref.clone());
            }
            Some(translated) => {
                if ancestor.get(name) != Some(translated) {
                    diff.insert(name.clone(), translated.clone());
                }
            }
        }
    }
    diff
}

fn diff_texture_refs(
    ancestor: &PropertyMap<TextureRef>,
    version: &PropertyMap<TextureRef>,
) -> PropertyMap<TextureRef> {
    let mut diff = PropertyMap::new();
    for (name, version_ref) in version {
        if ancestor.get(name) != Some(version_ref) {
            diff.insert(name.clone(), version_ref.clone());
        }
    }
    diff
}

fn diff_input_refs(
    ancestor: &PropertyMap<Edge>,
    version: &PropertyMap<Edge>,
    node_matches: &RefMatch<NodeKey>,
) -> PropertyMap<Edge> {
    let mut diff = PropertyMap::new();
    for (socket, version_edge) in version {
        match node_matches.to_ancestor(&version_edge.node) {
            None => {
                diff.insert(socket.clone(), version_edge.clone());
            }
            Some(source) => {
                let translated = Edge {
                    node: source.clone(),
                    socket: version_edge.socket.clone(),
                };
                if ancestor.get(socket) != Some(&translated) {
                    diff.insert(socket.clone(), translated);
                }
            }
        }
    }
    diff
}

/// Computes the partial node holding the properties that differ between a
/// matched pair of nodes.
///
/// References are compared after translating the version side to ancestor
/// ids through the matches; a reference to an unmatched (new) object is kept
/// verbatim. Returns an empty diff for equivalent nodes.
#[must_use]
pub fn diff_nodes(
    ancestor: &Node,
    version: &Node,
    node_matches: &RefMatch<NodeKey>,
    graph_matches: &RefMatch<GraphKey>,
) -> NodeDiff {
    NodeDiff {
        values: diff_values(&ancestor.values, &version.values),
        node_refs: diff_node_refs(&ancestor.node_refs, &version.node_refs, node_matches),
        graph_refs: diff_graph_refs(&ancestor.graph_refs, &version.graph_refs, graph_matches),
        texture_refs: diff_texture_refs(&ancestor.texture_refs, &version.texture_refs),
        input_refs: diff_input_refs(&ancestor.input_refs, &version.input_refs, node_matches),
    }
}

/// Rewrites every reference inside `node` to the ancestor-side id when a
/// match exists.
///
/// `Add` payloads may point at objects that already exist in the ancestor
/// under a different id; renaming makes the carried node independently
/// applicable to the ancestor.
fn rename_node(
    node: &mut Node,
    node_matches: &RefMatch<NodeKey>,
    graph_matches: &RefMatch<GraphKey>,
) {
    for target in node.node_refs.values_mut() {
        if let Some(ancestor) = node_matches.to_ancestor(target) {
            *target = ancestor.clone();
        }
    }
    for target in node.graph_refs.values_mut() {
        if let Some(ancestor) = graph_matches.to_ancestor(target) {
            *target = ancestor.clone();
        }
    }
    for edge in node.input_refs.values_mut() {
        if let Some(ancestor) = node_matches.to_ancestor(&edge.node) {
            edge.node = ancestor.clone();
        }
    }
}

/// Rewrites the graph references of every node in an added graph. Node
/// references stay verbatim: an added graph's nodes are all new.
fn rename_graph(graph: &mut Graph, graph_matches: &RefMatch<GraphKey>) {
    let node_matches = RefMatch::new();
    for node in graph.nodes.values_mut() {
        rename_node(node, &node_matches, graph_matches);
    }
}

/// Computes the per-node change set between two matched graphs.
///
/// Version-side nodes without an ancestor match become `Add`s carrying a
/// renamed copy; matched pairs with a non-empty node diff become `Edit`s
/// keyed by the ancestor id; ancestor-side nodes without a version match
/// become `Del`s. Returns an empty diff for equivalent graphs.
#[must_use]
pub fn diff_graphs(
    ancestor: &Graph,
    version: &Graph,
    node_matches: &RefMatch<NodeKey>,
    graph_matches: &RefMatch<GraphKey>,
) -> GraphDiff {
    let mut diff = GraphDiff::default();

    for (version_id, version_node) in &version.nodes {
        match node_matches.to_ancestor(version_id) {
            None => {
                let mut added = version_node.clone();
                rename_node(&mut added, node_matches, graph_matches);
                diff.nodes.insert(version_id.clone(), NodeChange::Add(added));
            }
            Some(ancestor_id) => {
                let ancestor_node = &ancestor.nodes[ancestor_id];
                let node_diff = diff_nodes(ancestor_node, version_node, node_matches, graph_matches);
                if !node_diff.is_empty() {
                    diff.nodes
                        .insert(ancestor_id.clone(), NodeChange::Edit(node_diff));
                }
            }
        }
    }

    for (ancestor_id, ancestor_node) in &ancestor.nodes {
        if !node_matches.has_match_in_version(ancestor_id) {
            diff.nodes
                .insert(ancestor_id.clone(), NodeChange::Del(ancestor_node.clone()));
        }
    }
    diff
}

/// Computes the per-graph change set between two scripts.
///
/// Node matches are computed freshly for every matched graph pair. Returns
/// an empty diff for equivalent scripts.
#[must_use]
pub fn diff_scripts(
    ancestor: &Script,
    version: &Script,
    graph_matches: &RefMatch<GraphKey>,
    typer: &impl NodeTyper,
) -> ScriptDiff {
    let mut diff = ScriptDiff::default();

    for (version_id, version_graph) in &version.graphs {
        match graph_matches.to_ancestor(version_id) {
            None => {
                let mut added = version_graph.clone();
                rename_graph(&mut added, graph_matches);
                diff.graphs
                    .insert(version_id.clone(), GraphChange::Add(added));
            }
            Some(ancestor_id) => {
                let ancestor_graph = &ancestor.graphs[ancestor_id];
                let node_matches = match_nodes(ancestor_graph, version_graph, graph_matches, typer);
                let graph_diff =
                    diff_graphs(ancestor_graph, version_graph, &node_matches, graph_matches);
                if !graph_diff.is_empty() {
                    diff.graphs
                        .insert(ancestor_id.clone(), GraphChange::Edit(graph_diff));
                }
            }
        }
    }

    for (ancestor_id, ancestor_graph) in &ancestor.graphs {
        if !graph_matches.has_match_in_version(ancestor_id) {
            diff.graphs
                .insert(ancestor_id.clone(), GraphChange::Del(ancestor_graph.clone()));
        }
    }
    diff
}

/// Discards from `diff2` every node `Add` whose carried content is
/// structurally equal to an `Add` in `diff1` under the same graph.
///
/// Two versions that received the same insertion produce identical `Add`s on
/// both sides; dropping the duplicate shrinks `diff2` without changing merge
/// semantics.
pub fn remove_common_adds(diff1: &ScriptDiff, diff2: &mut ScriptDiff) {
    for (graph_id, change1) in &diff1.graphs {
        if let (GraphChange::Edit(graph_diff1), Some(GraphChange::Edit(graph_diff2))) =
            (change1, diff2.graphs.get_mut(graph_id))
        {
            remove_common_node_adds(graph_diff1, graph_diff2);
        }
    }
}

/// Graph-level counterpart of [`remove_common_adds`].
pub fn remove_common_node_adds(diff1: &GraphDiff, diff2: &mut GraphDiff) {
    let adds: Vec<&Node> = diff1
        .nodes
        .values()
        .filter_map(|change| match change {
            NodeChange::Add(node) => Some(node),
            _ => None,
        })
        .collect();

    diff2.nodes.retain(|_, change| match change {
        NodeChange::Add(node) => !adds.iter().any(|add| *add == node),
        _ => true,
    });
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;
    use crate::core::RefId;
    use crate::matching::match_graphs;
    use crate::script::KeyTyper;

    fn typer() -> KeyTyper {
        KeyTyper::new("type")
    }

    fn typed_node(node_type: &str) -> Node {
        let mut node = Node::default();
        node.set_value("type", node_type);
        node
    }

    /// Diff two scripts end to end, matching graphs first.
    fn script_diff(ancestor: &Script, version: &Script) -> ScriptDiff {
        let graph_matches = match_graphs(ancestor, version, &typer());
        diff_scripts(ancestor, version, &graph_matches, &typer())
    }

    #[test]
    fn identical_scripts_diff_empty() {
        let mut graph = Graph::default();
        let mut node = typed_node("A");
        node.set_value("x", 0.0);
        graph.insert_node("n1", node);
        let mut script = Script::default();
        script.insert_graph(Script::MAIN_GRAPH, graph);

        let diff = script_diff(&script, &script);
        assert!(diff.is_empty());
        // The canonical serialization of a no-op diff.
        assert_eq!(serde_json::to_value(&diff).unwrap(), json!({}));
    }

    #[test]
    fn single_property_edit() {
        let mut ancestor_node = typed_node("A");
        ancestor_node.set_value("x", 0i64);
        let mut version_node = typed_node("A");
        version_node.set_value("x", 5i64);

        let mut ancestor_graph = Graph::default();
        ancestor_graph.insert_node("n", ancestor_node);
        let mut version_graph = Graph::default();
        version_graph.insert_node("n", version_node);

        let mut ancestor = Script::default();
        ancestor.insert_graph(Script::MAIN_GRAPH, ancestor_graph);
        let mut version = Script::default();
        version.insert_graph(Script::MAIN_GRAPH, version_graph);

        let diff = script_diff(&ancestor, &version);
        let GraphChange::Edit(graph_diff) = &diff.graphs[&GraphKey::new(Script::MAIN_GRAPH)]
        else {
            panic!("expected an edit on the main graph");
        };
        let NodeChange::Edit(node_diff) = &graph_diff.nodes[&NodeKey::new("n")] else {
            panic!("expected an edit on n");
        };
        assert_eq!(node_diff.property_count(), 1);
        assert_eq!(node_diff.value("x"), Some(&Value::Int(5)));
    }

    #[test]
    fn added_node_back_reference_is_renamed() {
        // Ancestor has n1; version has m1 (matched to n1) plus a new m2
        // whose parent points at m1. The add must carry parent = n1.
        let mut ancestor_graph = Graph::default();
        let mut n1 = typed_node("A");
        n1.set_node_ref("parent", NodeKey::invalid());
        ancestor_graph.insert_node("n1", n1.clone());

        let mut version_graph = Graph::default();
        version_graph.insert_node("m1", n1);
        let mut m2 = typed_node("B");
        m2.set_node_ref("parent", NodeKey::new("m1"));
        version_graph.insert_node("m2", m2);

        let node_matches = match_nodes(
            &ancestor_graph,
            &version_graph,
            &RefMatch::new(),
            &typer(),
        );
        let diff = diff_graphs(
            &ancestor_graph,
            &version_graph,
            &node_matches,
            &RefMatch::new(),
        );

        assert_eq!(diff.nodes.len(), 1);
        let NodeChange::Add(added) = &diff.nodes[&NodeKey::new("m2")] else {
            panic!("expected an add for m2");
        };
        assert_eq!(added.node_refs["parent"], NodeKey::new("n1"));
    }

    #[test]
    fn edge_is_rename_invariant() {
        // a.in <- b.out in the ancestor; the version renames b to c but
        // keeps the wiring. The diff must be empty.
        let mut ancestor_graph = Graph::default();
        let mut a = typed_node("A");
        a.set_input("in", Edge::new("b", "out"));
        ancestor_graph.insert_node("a", a.clone());
        ancestor_graph.insert_node("b", typed_node("B"));

        let mut version_graph = Graph::default();
        let mut a2 = typed_node("A");
        a2.set_input("in", Edge::new("c", "out"));
        version_graph.insert_node("a", a2);
        version_graph.insert_node("c", typed_node("B"));

        let node_matches = match_nodes(
            &ancestor_graph,
            &version_graph,
            &RefMatch::new(),
            &typer(),
        );
        assert_eq!(
            node_matches.to_ancestor(&NodeKey::new("c")),
            Some(&NodeKey::new("b"))
        );
        let diff = diff_graphs(
            &ancestor_graph,
            &version_graph,
            &node_matches,
            &RefMatch::new(),
        );
        assert!(diff.is_empty());
    }

    #[test]
    fn unmatched_nodes_become_adds_and_dels() {
        let mut ancestor_graph = Graph::default();
        ancestor_graph.insert_node("old", typed_node("A"));
        let mut version_graph = Graph::default();
        version_graph.insert_node("new", typed_node("B"));

        let node_matches = match_nodes(
            &ancestor_graph,
            &version_graph,
            &RefMatch::new(),
            &typer(),
        );
        let diff = diff_graphs(
            &ancestor_graph,
            &version_graph,
            &node_matches,
            &RefMatch::new(),
        );

        assert_eq!(diff.nodes[&NodeKey::new("new")].operation(), Operation::Add);
        assert_eq!(diff.nodes[&NodeKey::new("old")].operation(), Operation::Del);
    }

    #[test]
    fn deleted_graph_is_carried_verbatim() {
        let mut gone = Graph::default();
        gone.insert_node("n", typed_node("A"));
        let mut ancestor = Script::default();
        ancestor.insert_graph("gone", gone.clone());
        let version = Script::default();

        let diff = script_diff(&ancestor, &version);
        assert_eq!(
            diff.graphs[&GraphKey::new("gone")],
            GraphChange::Del(gone)
        );
    }

    #[test]
    fn added_graph_renames_graph_refs() {
        // The version adds a group graph and a node pointing at the *renamed*
        // main graph; the carried payload must reference the ancestor id.
        let mut ancestor = Script::default();
        let mut main = Graph::default();
        main.insert_node("n", typed_node("A"));
        ancestor.insert_graph("main_v1", main.clone());

        let mut version = Script::default();
        version.insert_graph("main_v2", main);
        let mut group = Graph::default();
        let mut pointer = typed_node("B");
        pointer.set_graph_ref("target", GraphKey::new("main_v2"));
        group.insert_node("p", pointer);
        version.insert_graph("group", group);

        let graph_matches = match_graphs(&ancestor, &version, &typer());
        assert_eq!(
            graph_matches.to_ancestor(&GraphKey::new("main_v2")),
            Some(&GraphKey::new("main_v1"))
        );

        let diff = diff_scripts(&ancestor, &version, &graph_matches, &typer());
        let GraphChange::Add(added) = &diff.graphs[&GraphKey::new("group")] else {
            panic!("expected an add for the group graph");
        };
        assert_eq!(
            added.nodes[&NodeKey::new("p")].graph_refs["target"],
            GraphKey::new("main_v1")
        );
    }

    #[test]
    fn change_wire_shapes() {
        let mut node = Node::default();
        node.set_value("x", 1i64);
        let change = NodeChange::Add(node);
        let json = serde_json::to_value(&change).unwrap();
        assert_eq!(json["operation"], json!("add"));
        assert_eq!(json["diff"]["node_values"], json!({"x": 1}));

        let back: NodeChange = serde_json::from_value(json).unwrap();
        assert_eq!(back, change);

        let graph_change = GraphChange::Edit(GraphDiff::default());
        let json = serde_json::to_value(&graph_change).unwrap();
        assert_eq!(json, json!({"operation": "edit", "diff": {}}));
    }

    #[test]
    fn remove_common_adds_drops_identical_insertions() {
        let mut inserted = typed_node("K");
        inserted.set_value("x", 1.0);

        let mut graph_diff1 = GraphDiff::default();
        graph_diff1
            .nodes
            .insert(NodeKey::new("k1"), NodeChange::Add(inserted.clone()));
        let mut graph_diff2 = GraphDiff::default();
        graph_diff2
            .nodes
            .insert(NodeKey::new("k2"), NodeChange::Add(inserted.clone()));
        // A differing add survives.
        let mut other = typed_node("K");
        other.set_value("x", 2.0);
        graph_diff2
            .nodes
            .insert(NodeKey::new("k3"), NodeChange::Add(other));

        let mut diff1 = ScriptDiff::default();
        diff1
            .graphs
            .insert(GraphKey::new("g"), GraphChange::Edit(graph_diff1));
        let mut diff2 = ScriptDiff::default();
        diff2
            .graphs
            .insert(GraphKey::new("g"), GraphChange::Edit(graph_diff2));

        remove_common_adds(&diff1, &mut diff2);

        let GraphChange::Edit(reduced) = &diff2.graphs[&GraphKey::new("g")] else {
            panic!("edit expected");
        };
        assert!(!reduced.nodes.contains_key(&NodeKey::new("k2")));
        assert!(reduced.nodes.contains_key(&NodeKey::new("k3")));
    }

    #[test]
    fn remove_common_adds_ignores_other_operations() {
        let mut graph_diff1 = GraphDiff::default();
        graph_diff1
            .nodes
            .insert(NodeKey::new("n"), NodeChange::Del(typed_node("K")));
        let mut graph_diff2 = GraphDiff::default();
        graph_diff2
            .nodes
            .insert(NodeKey::new("n"), NodeChange::Del(typed_node("K")));

        let mut diff1 = ScriptDiff::default();
        diff1
            .graphs
            .insert(GraphKey::new("g"), GraphChange::Edit(graph_diff1));
        let mut diff2 = ScriptDiff::default();
        diff2
            .graphs
            .insert(GraphKey::new("g"), GraphChange::Edit(graph_diff2.clone()));

        remove_common_adds(&diff1, &mut diff2);
        assert_eq!(diff2.graphs[&GraphKey::new("g")], GraphChange::Edit(graph_diff2));
    }

    #[test]
    fn missing_ancestor_property_counts_as_change() {
        let ancestor = typed_node("A");
        let mut version = typed_node("A");
        version.set_value("fresh", 1i64);

        let diff = diff_nodes(&ancestor, &version, &RefMatch::new(), &RefMatch::new());
        assert_eq!(diff.value("fresh"), Some(&Value::Int(1)));
    }
}
