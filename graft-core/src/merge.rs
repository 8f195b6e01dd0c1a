//! Three-way merge of concurrent change sets over a common ancestor.
//!
//! Two diffs conflict when they disagree about the same id: one side deletes
//! what the other edits, or both edit the same property (or socket) to
//! different values. Conflicts are a normal data-level outcome surfaced in
//! the merge result, never an error; when any are found the result field is
//! left as the untouched ancestor and must not be read.

use crate::core::{GraphKey, NodeKey, PropertyMap};
use crate::diff::{GraphChange, GraphDiff, NodeChange, ScriptDiff};
use crate::patch::{apply_graph_diff, apply_script_diff, ApplyError};
use crate::script::{Graph, Script};

/// How two concurrent changes to the same id disagree.
#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// The first diff deletes the object, the second edits it.
    DelEdit,
    /// The first diff edits the object, the second deletes it.
    EditDel,
    /// Both diffs edit the object and assign different values to at least
    /// one shared property or socket.
    EditEdit,
}

/// A conflicting pair of changes to a single node.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct NodeConflict {
    /// The conflict kind.
    #[serde(rename = "type")]
    pub kind: ConflictKind,
    /// The id of the conflicted node.
    pub node: NodeKey,
    /// Conflicting property names. Non-empty only for `edit_edit`.
    pub properties: Vec<String>,
    /// Conflicting socket names. Non-empty only for `edit_edit`.
    pub edges: Vec<String>,
}

/// A conflicting pair of changes to a single graph.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct GraphConflict {
    /// The conflict kind.
    #[serde(rename = "type")]
    pub kind: ConflictKind,
    /// The id of the conflicted graph.
    pub graph: GraphKey,
    /// The node conflicts found inside the graph. Non-empty only for
    /// `edit_edit`.
    pub nodes: Vec<NodeConflict>,
}

/// The outcome of merging two graph diffs over a common ancestor.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GraphMergeResult {
    /// The merged graph. Undefined when there are conflicts.
    pub result: Graph,
    /// The conflicts that prevented the merge, if any.
    pub conflicts: Vec<NodeConflict>,
}

impl GraphMergeResult {
    /// Whether the merge failed due to conflicts.
    #[must_use]
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }
}

/// The outcome of merging two script diffs over a common ancestor.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ScriptMergeResult {
    /// The merged script. Undefined when there are conflicts.
    pub result: Script,
    /// The conflicts that prevented the merge, if any.
    pub conflicts: Vec<GraphConflict>,
}

impl ScriptMergeResult {
    /// Whether the merge failed due to conflicts.
    #[must_use]
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }
}

/// Collects the keys assigned different values by the two maps.
fn conflicting_keys<P: PartialEq>(
    map1: &PropertyMap<P>,
    map2: &PropertyMap<P>,
    out: &mut Vec<String>,
) {
    for (name, value1) in map1 {
        if map2.get(name).is_some_and(|value2| value2 != value1) {
            out.push(name.clone());
        }
    }
}

/// Finds the node-level conflicts between two graph diffs over the same
/// ancestor.
///
/// `add/add`, `del/del` and non-overlapping edits never conflict.
#[must_use]
pub fn node_conflicts(diff1: &GraphDiff, diff2: &GraphDiff) -> Vec<NodeConflict> {
    let mut conflicts = Vec::new();
    for (node_id, change1) in &diff1.nodes {
        let Some(change2) = diff2.nodes.get(node_id) else {
            continue;
        };
        match (change1, change2) {
            (NodeChange::Del(_), NodeChange::Edit(_)) => conflicts.push(NodeConflict {
                kind: ConflictKind::DelEdit,
                node: node_id.clone(),
                properties: Vec::new(),
                edges: Vec::new(),
            }),
            (NodeChange::Edit(_), NodeChange::Del(_)) => conflicts.push(NodeConflict {
                kind: ConflictKind::EditDel,
                node: node_id.clone(),
                properties: Vec::new(),
                edges: Vec::new(),
            }),
            (NodeChange::Edit(node_diff1), NodeChange::Edit(node_diff2)) => {
                let mut properties = Vec::new();
                conflicting_keys(&node_diff1.values, &node_diff2.values, &mut properties);
                conflicting_keys(&node_diff1.node_refs, &node_diff2.node_refs, &mut properties);
                conflicting_keys(
                    &node_diff1.graph_refs,
                    &node_diff2.graph_refs,
                    &mut properties,
                );
                conflicting_keys(
                    &node_diff1.texture_refs,
                    &node_diff2.texture_refs,
                    &mut properties,
                );
                let mut edges = Vec::new();
                conflicting_keys(&node_diff1.input_refs, &node_diff2.input_refs, &mut edges);

                if !properties.is_empty() || !edges.is_empty() {
                    conflicts.push(NodeConflict {
                        kind: ConflictKind::EditEdit,
                        node: node_id.clone(),
                        properties,
                        edges,
                    });
                }
            }
            _ => {}
        }
    }
    conflicts
}

/// Finds the graph-level conflicts between two script diffs over the same
/// ancestor. For a pair of graph edits the node conflicts are computed
/// recursively; the graph conflict is recorded only if there are any.
#[must_use]
pub fn graph_conflicts(diff1: &ScriptDiff, diff2: &ScriptDiff) -> Vec<GraphConflict> {
    let mut conflicts = Vec::new();
    for (graph_id, change1) in &diff1.graphs {
        let Some(change2) = diff2.graphs.get(graph_id) else {
            continue;
        };
        match (change1, change2) {
            (GraphChange::Del(_), GraphChange::Edit(_)) => conflicts.push(GraphConflict {
                kind: ConflictKind::DelEdit,
                graph: graph_id.clone(),
                nodes: Vec::new(),
            }),
            (GraphChange::Edit(_), GraphChange::Del(_)) => conflicts.push(GraphConflict {
                kind: ConflictKind::EditDel,
                graph: graph_id.clone(),
                nodes: Vec::new(),
            }),
            (GraphChange::Edit(graph_diff1), GraphChange::Edit(graph_diff2)) => {
                let nodes = node_conflicts(graph_diff1, graph_diff2);
                if !nodes.is_empty() {
                    conflicts.push(GraphConflict {
                        kind: ConflictKind::EditEdit,
                        graph: graph_id.clone(),
                        nodes,
                    });
                }
            }
            _ => {}
        }
    }
    conflicts
}

/// Three-way merge of two graph diffs over their common ancestor.
///
/// When no conflicts are detected both diffs are applied to a copy of the
/// ancestor; the application order is immaterial because non-conflicting
/// diffs touch disjoint properties.
pub fn merge_graphs(
    ancestor: &Graph,
    diff1: &GraphDiff,
    diff2: &GraphDiff,
) -> Result<GraphMergeResult, ApplyError> {
    let conflicts = node_conflicts(diff1, diff2);
    let mut result = ancestor.clone();
    if conflicts.is_empty() {
        apply_graph_diff(&mut result, diff1)?;
        apply_graph_diff(&mut result, diff2)?;
    }
    Ok(GraphMergeResult { result, conflicts })
}

/// Three-way merge of two script diffs over their common ancestor.
pub fn merge_scripts(
    ancestor: &Script,
    diff1: &ScriptDiff,
    diff2: &ScriptDiff,
) -> Result<ScriptMergeResult, ApplyError> {
    let conflicts = graph_conflicts(diff1, diff2);
    let mut result = ancestor.clone();
    if conflicts.is_empty() {
        apply_script_diff(&mut result, diff1)?;
        apply_script_diff(&mut result, diff2)?;
    }
    Ok(ScriptMergeResult { result, conflicts })
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;
    use crate::diff::NodeDiff;
    use crate::script::Node;
    use crate::value::Value;

    fn node_with(name: &str, value: impl Into<Value>) -> Node {
        let mut node = Node::default();
        node.set_value(name, value);
        node
    }

    fn edit_of(name: &str, value: impl Into<Value>) -> NodeChange {
        NodeChange::Edit(node_with(name, value))
    }

    fn graph_diff_of(node_id: &str, change: NodeChange) -> GraphDiff {
        let mut diff = GraphDiff::default();
        diff.nodes.insert(NodeKey::new(node_id), change);
        diff
    }

    fn script_diff_of(graph_id: &str, change: GraphChange) -> ScriptDiff {
        let mut diff = ScriptDiff::default();
        diff.graphs.insert(GraphKey::new(graph_id), change);
        diff
    }

    #[test]
    fn delete_against_edit_conflicts() {
        let diff1 = graph_diff_of("n", NodeChange::Del(Node::default()));
        let diff2 = graph_diff_of("n", edit_of("x", 1i64));

        let conflicts = node_conflicts(&diff1, &diff2);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind, ConflictKind::DelEdit);
        assert_eq!(conflicts[0].node, NodeKey::new("n"));

        let reversed = node_conflicts(&diff2, &diff1);
        assert_eq!(reversed[0].kind, ConflictKind::EditDel);
    }

    #[test]
    fn same_property_different_value_conflicts() {
        let diff1 = graph_diff_of("n", edit_of("x", 1i64));
        let diff2 = graph_diff_of("n", edit_of("x", 2i64));

        let conflicts = node_conflicts(&diff1, &diff2);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind, ConflictKind::EditEdit);
        assert_eq!(conflicts[0].properties, vec!["x".to_owned()]);
        assert!(conflicts[0].edges.is_empty());
    }

    #[test]
    fn same_property_same_value_is_fine() {
        let diff1 = graph_diff_of("n", edit_of("x", 1i64));
        let diff2 = graph_diff_of("n", edit_of("x", 1i64));
        assert!(node_conflicts(&diff1, &diff2).is_empty());
    }

    #[test]
    fn disjoint_edits_do_not_conflict() {
        let diff1 = graph_diff_of("n", edit_of("x", 1i64));
        let diff2 = graph_diff_of("n", edit_of("y", 2i64));
        assert!(node_conflicts(&diff1, &diff2).is_empty());
    }

    #[test]
    fn concurrent_adds_do_not_conflict() {
        let diff1 = graph_diff_of("n", NodeChange::Add(node_with("x", 1i64)));
        let diff2 = graph_diff_of("n", NodeChange::Add(node_with("x", 2i64)));
        assert!(node_conflicts(&diff1, &diff2).is_empty());
    }

    #[test]
    fn conflicting_sockets_are_reported_as_edges() {
        let mut edit1 = NodeDiff::default();
        edit1.set_input("in", crate::core::Edge::new("a", "out"));
        let mut edit2 = NodeDiff::default();
        edit2.set_input("in", crate::core::Edge::new("b", "out"));

        let diff1 = graph_diff_of("n", NodeChange::Edit(edit1));
        let diff2 = graph_diff_of("n", NodeChange::Edit(edit2));

        let conflicts = node_conflicts(&diff1, &diff2);
        assert_eq!(conflicts[0].kind, ConflictKind::EditEdit);
        assert!(conflicts[0].properties.is_empty());
        assert_eq!(conflicts[0].edges, vec!["in".to_owned()]);
    }

    #[test]
    fn merge_applies_both_diffs() {
        let mut ancestor = Graph::default();
        ancestor.insert_node("n", node_with("x", 0i64));

        let diff1 = graph_diff_of("n", edit_of("x", 1i64));
        let diff2 = graph_diff_of("m", NodeChange::Add(node_with("y", 2i64)));

        let merge = merge_graphs(&ancestor, &diff1, &diff2).unwrap();
        assert!(!merge.has_conflicts());
        assert_eq!(
            merge.result.node(&NodeKey::new("n")).unwrap().value("x"),
            Some(&Value::Int(1))
        );
        assert!(merge.result.node(&NodeKey::new("m")).is_some());
    }

    #[test]
    fn merge_is_symmetric_without_conflicts() {
        let mut ancestor = Graph::default();
        ancestor.insert_node("n", node_with("x", 0i64));
        ancestor.insert_node("m", node_with("y", 0i64));

        let diff1 = graph_diff_of("n", edit_of("x", 1i64));
        let diff2 = graph_diff_of("m", edit_of("y", 2i64));

        let forward = merge_graphs(&ancestor, &diff1, &diff2).unwrap();
        let backward = merge_graphs(&ancestor, &diff2, &diff1).unwrap();
        assert!(!forward.has_conflicts());
        assert_eq!(forward.result, backward.result);
    }

    #[test]
    fn conflicted_merge_leaves_ancestor_untouched() {
        let mut ancestor = Script::default();
        let mut graph = Graph::default();
        graph.insert_node("n", node_with("x", 0i64));
        ancestor.insert_graph("g", graph);

        let diff1 = script_diff_of("g", GraphChange::Edit(graph_diff_of("n", edit_of("x", 1i64))));
        let diff2 = script_diff_of("g", GraphChange::Edit(graph_diff_of("n", edit_of("x", 2i64))));

        let merge = merge_scripts(&ancestor, &diff1, &diff2).unwrap();
        assert!(merge.has_conflicts());
        assert_eq!(merge.result, ancestor);
        assert_eq!(merge.conflicts[0].kind, ConflictKind::EditEdit);
        assert_eq!(merge.conflicts[0].graph, GraphKey::new("g"));
        assert_eq!(merge.conflicts[0].nodes[0].node, NodeKey::new("n"));
    }

    #[test]
    fn graph_level_delete_edit_conflict() {
        let diff1 = script_diff_of("g", GraphChange::Del(Graph::default()));
        let diff2 = script_diff_of("g", GraphChange::Edit(graph_diff_of("n", edit_of("x", 1i64))));

        let conflicts = graph_conflicts(&diff1, &diff2);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind, ConflictKind::DelEdit);
        assert!(conflicts[0].nodes.is_empty());
    }

    #[test]
    fn conflict_wire_shape() {
        let conflict = NodeConflict {
            kind: ConflictKind::DelEdit,
            node: NodeKey::new("n"),
            properties: Vec::new(),
            edges: Vec::new(),
        };
        assert_eq!(
            serde_json::to_value(&conflict).unwrap(),
            json!({"type": "del_edit", "node": "n", "properties": [], "edges": []})
        );

        let graph_conflict = GraphConflict {
            kind: ConflictKind::EditEdit,
            graph: GraphKey::new("g"),
            nodes: vec![conflict],
        };
        let json = serde_json::to_value(&graph_conflict).unwrap();
        assert_eq!(json["type"], json!("edit_edit"));
        assert_eq!(json["graph"], json!("g"));
        assert_eq!(json["nodes"][0]["node"], json!("n"));
    }

    #[test]
    fn merge_result_wire_shape() {
        let merge = GraphMergeResult::default();
        let json = serde_json::to_value(&merge).unwrap();
        assert_eq!(json, json!({"result": {}, "conflicts": []}));
    }

    #[test]
    fn repeated_merge_is_identical() {
        let mut ancestor = Graph::default();
        ancestor.insert_node("n", node_with("x", 0i64));
        let diff1 = graph_diff_of("n", edit_of("x", 1i64));
        let diff2 = graph_diff_of("m", NodeChange::Add(node_with("y", 2i64)));

        let first = merge_graphs(&ancestor, &diff1, &diff2).unwrap();
        let second = merge_graphs(&ancestor, &diff1, &diff2).unwrap();
        assert_eq!(first, second);
    }
}
