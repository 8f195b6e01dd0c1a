//! Visual patches: recolor changed nodes so a host editor can display a
//! diff or merge in place.
//!
//! The painter mutates a model that already has the diff applied, inserting
//! two marker properties on every affected node: a "use custom color" flag
//! and a color triple. Deleted nodes are re-inserted as tombstones carrying
//! their deletion color, with input edges cleared so the tombstone does not
//! re-wire the graph.

use crate::diff::{GraphChange, GraphDiff, NodeChange, ScriptDiff};
use crate::script::{Graph, Node, Script};
use crate::value::Value;

/// An RGB triple in the host's `0..=1` float convention.
pub type Color = [f64; 3];

/// Node colors per change kind.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Palette {
    /// Color for added nodes.
    pub add: Color,
    /// Color for deleted nodes (tombstones).
    pub del: Color,
    /// Color for edited nodes.
    pub edit: Color,
}

impl Palette {
    /// Default palette for a single diff, or the first diff of a merge.
    pub const PRIMARY: Palette = Palette {
        add: [0.01, 0.4, 0.03],
        del: [0.44, 0.06, 0.05],
        edit: [0.57, 0.43, 0.85],
    };

    /// Palette distinguishing changes coming from the second diff of a
    /// merge.
    pub const SECONDARY: Palette = Palette {
        add: [1.0, 0.88, 0.39],
        del: [0.86, 0.45, 0.21],
        edit: [0.53, 0.82, 0.97],
    };

    /// High-contrast palette for nodes changed concurrently by both diffs
    /// of a merge.
    pub const CONCURRENT: Palette = Palette {
        add: [0.8, 1.0, 0.0],
        del: [1.0, 0.0, 0.8],
        edit: [0.0, 0.0, 1.0],
    };
}

impl Default for Palette {
    fn default() -> Self {
        Self::PRIMARY
    }
}

/// Writes change-kind marker colors into a model.
///
/// The marker property names follow the host's attribute convention and are
/// configurable.
#[derive(Clone, Debug)]
pub struct Painter {
    /// Property receiving the "use custom color" flag.
    pub flag_property: String,
    /// Property receiving the color triple.
    pub color_property: String,
    /// Palette for a single diff, or the first diff of a merge.
    pub primary: Palette,
    /// Palette for the second diff of a merge.
    pub secondary: Palette,
    /// Palette for nodes changed by both diffs of a merge.
    pub concurrent: Palette,
}

impl Default for Painter {
    fn default() -> Self {
        Self {
            flag_property: "a.use_custom_color".to_owned(),
            color_property: "a.color".to_owned(),
            primary: Palette::PRIMARY,
            secondary: Palette::SECONDARY,
            concurrent: Palette::CONCURRENT,
        }
    }
}

impl Painter {
    fn color_node(&self, node: &mut Node, color: Color) {
        node.set_value(self.flag_property.clone(), Value::Int(1));
        node.set_value(self.color_property.clone(), Value::FloatArray(color.to_vec()));
    }

    /// Colors every node affected by `diff` in a graph that already has the
    /// diff applied. Deleted nodes are re-inserted as tombstones.
    pub fn paint_graph_diff(&self, graph: &mut Graph, diff: &GraphDiff, palette: Palette) {
        for (node_id, change) in &diff.nodes {
            if let NodeChange::Del(deleted) = change {
                graph.insert_node(node_id.clone(), deleted.clone());
            }
            let Some(node) = graph.node_mut(node_id) else {
                continue;
            };
            match change {
                NodeChange::Add(_) => self.color_node(node, palette.add),
                NodeChange::Del(_) => {
                    self.color_node(node, palette.del);
                    node.input_refs.clear();
                }
                NodeChange::Edit(_) => self.color_node(node, palette.edit),
            }
        }
    }

    /// Colors every node affected by `diff` in a script that already has
    /// the diff applied. Added and deleted graphs are left unpainted; the
    /// editor shows them whole.
    pub fn paint_script_diff(&self, script: &mut Script, diff: &ScriptDiff, palette: Palette) {
        for (graph_id, change) in &diff.graphs {
            if let GraphChange::Edit(graph_diff) = change {
                if let Some(graph) = script.graph_mut(graph_id) {
                    self.paint_graph_diff(graph, graph_diff, palette);
                }
            }
        }
    }

    /// Colors a merged script: the primary palette for `diff1`, the
    /// secondary palette for `diff2`, and the concurrent palette on nodes
    /// touched by both.
    pub fn paint_merge(&self, script: &mut Script, diff1: &ScriptDiff, diff2: &ScriptDiff) {
        self.paint_script_diff(script, diff1, self.primary);
        self.paint_script_diff(script, diff2, self.secondary);

        for (graph_id, change1) in &diff1.graphs {
            let (GraphChange::Edit(graph_diff1), Some(GraphChange::Edit(graph_diff2))) =
                (change1, diff2.graphs.get(graph_id))
            else {
                continue;
            };
            let Some(graph) = script.graph_mut(graph_id) else {
                continue;
            };
            for (node_id, change) in &graph_diff1.nodes {
                if !graph_diff2.nodes.contains_key(node_id) {
                    continue;
                }
                let Some(node) = graph.node_mut(node_id) else {
                    continue;
                };
                match change {
                    NodeChange::Add(_) => self.color_node(node, self.concurrent.add),
                    NodeChange::Del(_) => self.color_node(node, self.concurrent.del),
                    NodeChange::Edit(_) => self.color_node(node, self.concurrent.edit),
                }
            }
        }
    }
}
