//! Structural three-way versioning for node-graph documents.
//!
//! This crate contains the core engine: the data model for node-graph
//! documents ([`Script`] → [`Graph`] → [`Node`]), the matching algorithm
//! that aligns objects between two versions without stable identifiers, the
//! diff engine that turns matchings into compact change sets, and the
//! three-way merge with conflict detection.
//!
//! The engine is pure and synchronous: it performs no I/O and mutates models
//! only through [`patch`]. Host-specific knowledge is injected at two seams:
//! the [`NodeTyper`] that tells the matcher what a node's type is, and the
//! serialization boundary, which the `graft` CLI drives with `serde_json`.

// Unstable check, may cause false positives.
// https://github.com/rust-lang/rust-clippy/issues/5112
#![warn(clippy::debug_assert_with_mut_call)]
#![warn(missing_docs)]

pub mod core;
pub mod diff;
pub mod matching;
pub mod merge;
pub mod patch;
pub mod render;
pub mod script;
pub mod value;

pub use crate::core::{Edge, GraphKey, NodeKey, PropertyMap, RefId, TextureRef};
pub use crate::diff::{
    diff_graphs, diff_nodes, diff_scripts, remove_common_adds, remove_common_node_adds,
    GraphChange, GraphDiff, NodeChange, NodeDiff, Operation, ScriptDiff,
};
pub use crate::matching::{
    match_graphs, match_nodes, match_objects, MatchPass, RefMatch, GRAPH_MATCH_THRESHOLD,
    NODE_MATCH_THRESHOLD,
};
pub use crate::merge::{
    graph_conflicts, merge_graphs, merge_scripts, node_conflicts, ConflictKind, GraphConflict,
    GraphMergeResult, NodeConflict, ScriptMergeResult,
};
pub use crate::patch::{apply_graph_diff, apply_node_diff, apply_script_diff, ApplyError};
pub use crate::render::{Color, Painter, Palette};
pub use crate::script::{Graph, KeyTyper, Node, NodeTyper, Script};
pub use crate::value::Value;
