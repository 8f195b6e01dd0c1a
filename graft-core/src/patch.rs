//! Application of change sets to the data model.
//!
//! Apply is the only operation that mutates a model. Applying the diff of
//! `(ancestor, version)` to the ancestor reproduces the version up to the id
//! renaming chosen by the matching.

use thiserror::Error;

use crate::core::{GraphKey, NodeKey};
use crate::diff::{GraphChange, GraphDiff, NodeChange, NodeDiff, ScriptDiff};
use crate::script::{Graph, Node, Script};

/// An error in applying a diff: an id named by the diff is absent from the
/// target model.
///
/// A diff produced against the model it is applied to never fails; this
/// surfaces mismatched inputs (e.g. a diff file replayed onto the wrong
/// ancestor).
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ApplyError {
    /// A node id named by the diff does not exist in the target graph.
    #[error("node {0} does not exist in the target graph")]
    MissingNode(NodeKey),
    /// A graph id named by the diff does not exist in the target script.
    #[error("graph {0} does not exist in the target script")]
    MissingGraph(GraphKey),
}

/// Merges the partial property maps of `diff` into `node`, overwriting
/// existing properties and inserting new ones.
pub fn apply_node_diff(node: &mut Node, diff: &NodeDiff) {
    node.values
        .extend(diff.values.iter().map(|(k, v)| (k.clone(), v.clone())));
    node.node_refs
        .extend(diff.node_refs.iter().map(|(k, v)| (k.clone(), v.clone())));
    node.graph_refs
        .extend(diff.graph_refs.iter().map(|(k, v)| (k.clone(), v.clone())));
    node.texture_refs
        .extend(diff.texture_refs.iter().map(|(k, v)| (k.clone(), v.clone())));
    node.input_refs
        .extend(diff.input_refs.iter().map(|(k, v)| (k.clone(), v.clone())));
}

/// Applies a graph diff: inserts added nodes, removes deleted ones and
/// merges edits into the existing nodes.
///
/// The keys of a well-formed diff are disjoint across change kinds, so the
/// final state does not depend on iteration order.
pub fn apply_graph_diff(graph: &mut Graph, diff: &GraphDiff) -> Result<(), ApplyError> {
    for (node_id, change) in &diff.nodes {
        match change {
            NodeChange::Add(node) => {
                graph.insert_node(node_id.clone(), node.clone());
            }
            NodeChange::Del(_) => {
                graph
                    .remove_node(node_id)
                    .ok_or_else(|| ApplyError::MissingNode(node_id.clone()))?;
            }
            NodeChange::Edit(node_diff) => {
                let node = graph
                    .node_mut(node_id)
                    .ok_or_else(|| ApplyError::MissingNode(node_id.clone()))?;
                apply_node_diff(node, node_diff);
            }
        }
    }
    Ok(())
}

/// Applies a script diff: inserts added graphs, removes deleted ones and
/// recurses into edited ones.
pub fn apply_script_diff(script: &mut Script, diff: &ScriptDiff) -> Result<(), ApplyError> {
    for (graph_id, change) in &diff.graphs {
        match change {
            GraphChange::Add(graph) => {
                script.insert_graph(graph_id.clone(), graph.clone());
            }
            GraphChange::Del(_) => {
                script
                    .remove_graph(graph_id)
                    .ok_or_else(|| ApplyError::MissingGraph(graph_id.clone()))?;
            }
            GraphChange::Edit(graph_diff) => {
                let graph = script
                    .graph_mut(graph_id)
                    .ok_or_else(|| ApplyError::MissingGraph(graph_id.clone()))?;
                apply_graph_diff(graph, graph_diff)?;
            }
        }
    }
    Ok(())
}
