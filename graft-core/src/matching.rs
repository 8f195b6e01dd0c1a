//! Greedy minimum-edit-cost matching between unordered collections.
//!
//! Documents carry no stable identifiers across versions, so diffing first
//! has to reconstruct which ancestor object corresponds to which version
//! object. [`match_objects`] performs a greedy assignment: it repeatedly
//! scans all remaining (ancestor, version) pairs for the cheapest one under
//! the current [`MatchPass`], records it if it beats the pass threshold, and
//! otherwise falls through to the next pass.
//!
//! [`match_graphs`] and [`match_nodes`] instantiate the algorithm with the
//! edit-cost heuristics for graphs (node-type histogram distance, threshold
//! 0.65) and nodes (normalized changed-property count, threshold 0.35).

use std::collections::{BTreeMap, BTreeSet};

use itertools::Itertools;

use crate::core::{GraphKey, NodeKey, RefId};
use crate::diff::diff_nodes;
use crate::script::{Graph, Node, NodeTyper, Script};

/// Threshold above which two graphs are considered unrelated.
pub const GRAPH_MATCH_THRESHOLD: f64 = 0.65;

/// Threshold above which two nodes are considered unrelated.
pub const NODE_MATCH_THRESHOLD: f64 = 0.35;

/// Bidirectional map of matched identifiers between an ancestor and a
/// version of a document.
///
/// Always contains the identity pair for the invalid sentinel, so
/// reference-translation code never has to special-case unconnected
/// references.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefMatch<R: RefId> {
    ancestor_to_version: BTreeMap<R, R>,
    version_to_ancestor: BTreeMap<R, R>,
}

impl<R: RefId> Default for RefMatch<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RefId> RefMatch<R> {
    /// Creates a match map holding only the identity pair of the invalid
    /// sentinel.
    #[must_use]
    pub fn new() -> Self {
        let mut matches = Self {
            ancestor_to_version: BTreeMap::new(),
            version_to_ancestor: BTreeMap::new(),
        };
        matches.add_match(R::invalid(), R::invalid());
        matches
    }

    /// Records a new `(ancestor, version)` match. Both directions are updated
    /// together.
    pub fn add_match(&mut self, ancestor: R, version: R) {
        self.ancestor_to_version
            .insert(ancestor.clone(), version.clone());
        self.version_to_ancestor.insert(version, ancestor);
    }

    /// Maps an ancestor reference to its match in the version, if any.
    #[must_use]
    pub fn to_version(&self, ancestor: &R) -> Option<&R> {
        self.ancestor_to_version.get(ancestor)
    }

    /// Maps a version reference to its match in the ancestor, if any.
    #[must_use]
    pub fn to_ancestor(&self, version: &R) -> Option<&R> {
        self.version_to_ancestor.get(version)
    }

    /// Whether the given ancestor reference has a match in the version.
    #[must_use]
    pub fn has_match_in_version(&self, ancestor: &R) -> bool {
        self.ancestor_to_version.contains_key(ancestor)
    }

    /// Whether the given version reference has a match in the ancestor.
    #[must_use]
    pub fn has_match_in_ancestor(&self, version: &R) -> bool {
        self.version_to_ancestor.contains_key(version)
    }

    /// Iterates over all `(ancestor, version)` pairs, including the identity
    /// pair of the invalid sentinel.
    pub fn iter(&self) -> impl Iterator<Item = (&R, &R)> {
        self.ancestor_to_version.iter()
    }

    /// Number of recorded pairs, including the identity pair.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ancestor_to_version.len()
    }

    /// Whether no pairs beyond the identity pair have been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }
}

/// Edit cost between two identified objects, given the matches accumulated
/// so far. Costs are non-negative and may be `+∞`.
pub type CostFn<'f, R> = Box<dyn Fn(&R, &R, &RefMatch<R>) -> f64 + 'f>;

/// One pass of the matching algorithm: an edit-cost function together with
/// the cutoff above which candidate pairs are rejected.
///
/// Passing several passes lets cheaper heuristics claim the easy pairs
/// before more permissive ones take over.
pub struct MatchPass<'f, R: RefId> {
    cost: CostFn<'f, R>,
    threshold: f64,
}

impl<'f, R: RefId> MatchPass<'f, R> {
    /// Creates a pass from a cost function and its threshold.
    pub fn new(cost: impl Fn(&R, &R, &RefMatch<R>) -> f64 + 'f, threshold: f64) -> Self {
        Self {
            cost: Box::new(cost),
            threshold,
        }
    }

    /// The cutoff above which candidate pairs are rejected.
    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

/// Greedily matches the objects of two keyed collections.
///
/// Each step scans all remaining (ancestor, version) pairs for the one
/// minimizing the current pass's cost function; a cost of zero
/// short-circuits the scan. If the minimum beats the pass threshold the pair
/// is recorded and removed from the pools, otherwise the algorithm advances
/// to the next pass. Within a step the accumulated [`RefMatch`] is
/// read-only, so every candidate cost is a pure function of the step-start
/// state.
///
/// # Panics
///
/// Panics if `passes` is empty.
pub fn match_objects<R, T>(
    ancestor: &BTreeMap<R, T>,
    version: &BTreeMap<R, T>,
    passes: &[MatchPass<'_, R>],
) -> RefMatch<R>
where
    R: RefId,
{
    assert!(!passes.is_empty(), "match_objects requires at least one pass");

    let mut matches = RefMatch::new();
    let mut ancestor_pool: BTreeSet<&R> = ancestor.keys().collect();
    let mut version_pool: BTreeSet<&R> = version.keys().collect();

    let mut remaining = passes.iter();
    let mut pass = remaining.next().expect("at least one pass");

    while !ancestor_pool.is_empty() && !version_pool.is_empty() {
        let mut best_cost = f64::INFINITY;
        let mut best_pair = None;
        for (&version_id, &ancestor_id) in version_pool.iter().cartesian_product(&ancestor_pool) {
            let cost = (pass.cost)(ancestor_id, version_id, &matches);
            debug_assert!(cost >= 0.0, "negative edit cost");
            if cost <= best_cost {
                best_cost = cost;
                best_pair = Some((ancestor_id, version_id));
            }
            // Zero is the minimum; no better candidate can exist.
            if cost == 0.0 {
                break;
            }
        }

        if best_cost < pass.threshold {
            let (ancestor_id, version_id) =
                best_pair.expect("a candidate exists below the threshold");
            matches.add_match(ancestor_id.clone(), version_id.clone());
            ancestor_pool.remove(ancestor_id);
            version_pool.remove(version_id);
        } else {
            match remaining.next() {
                Some(next) => pass = next,
                None => break,
            }
        }
    }
    matches
}

/// Edit cost between two graphs: the per-node-type histogram difference,
/// normalized by the ancestor's node count.
///
/// An empty ancestor graph only matches an empty version graph.
pub fn graph_edit_cost(ancestor: &Graph, version: &Graph, typer: &impl NodeTyper) -> f64 {
    if ancestor.nodes.is_empty() {
        return if version.nodes.is_empty() {
            0.0
        } else {
            f64::INFINITY
        };
    }

    let mut ancestor_count: BTreeMap<&str, i64> = BTreeMap::new();
    for node in ancestor.nodes.values() {
        *ancestor_count
            .entry(typer.node_type(node).unwrap_or(""))
            .or_default() += 1;
    }

    // Types present only in the version are tallied separately.
    let mut version_only: BTreeMap<&str, i64> = BTreeMap::new();
    for node in version.nodes.values() {
        let node_type = typer.node_type(node).unwrap_or("");
        match ancestor_count.get_mut(node_type) {
            Some(count) => *count -= 1,
            None => *version_only.entry(node_type).or_default() += 1,
        }
    }

    let cost: i64 = ancestor_count
        .values()
        .chain(version_only.values())
        .map(|count| count.abs())
        .sum();
    cost as f64 / ancestor.nodes.len() as f64
}

/// Edit cost between two nodes: `+∞` for nodes of different types, otherwise
/// the number of differing properties (references compared after translating
/// through the accumulated matches) normalized by the ancestor's total
/// property count.
pub fn node_edit_cost(
    ancestor: &Node,
    version: &Node,
    node_matches: &RefMatch<NodeKey>,
    graph_matches: &RefMatch<GraphKey>,
    typer: &impl NodeTyper,
) -> f64 {
    if typer.node_type(ancestor) != typer.node_type(version) {
        return f64::INFINITY;
    }
    let total = ancestor.property_count();
    if total == 0 {
        return 0.0;
    }
    let changed = diff_nodes(ancestor, version, node_matches, graph_matches).property_count();
    changed as f64 / total as f64
}

/// Matches the graphs of two scripts (single pass, histogram edit cost,
/// threshold [`GRAPH_MATCH_THRESHOLD`]).
pub fn match_graphs(
    ancestor: &Script,
    version: &Script,
    typer: &impl NodeTyper,
) -> RefMatch<GraphKey> {
    let pass = MatchPass::new(
        |ancestor_id: &GraphKey, version_id: &GraphKey, _: &RefMatch<GraphKey>| {
            graph_edit_cost(
                &ancestor.graphs[ancestor_id],
                &version.graphs[version_id],
                typer,
            )
        },
        GRAPH_MATCH_THRESHOLD,
    );
    match_objects(&ancestor.graphs, &version.graphs, &[pass])
}

/// Matches the nodes of two graphs (single pass, normalized
/// changed-property edit cost, threshold [`NODE_MATCH_THRESHOLD`]).
///
/// `graph_matches` must be the graph matching under which `ancestor` and
/// `version` were paired, so that graph references translate correctly.
pub fn match_nodes(
    ancestor: &Graph,
    version: &Graph,
    graph_matches: &RefMatch<GraphKey>,
    typer: &impl NodeTyper,
) -> RefMatch<NodeKey> {
    let pass = MatchPass::new(
        |ancestor_id: &NodeKey, version_id: &NodeKey, node_matches: &RefMatch<NodeKey>| {
            node_edit_cost(
                &ancestor.nodes[ancestor_id],
                &version.nodes[version_id],
                node_matches,
                graph_matches,
                typer,
            )
        },
        NODE_MATCH_THRESHOLD,
    );
    match_objects(&ancestor.nodes, &version.nodes, &[pass])
}
