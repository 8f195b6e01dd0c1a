//! Diff two scripts on the command line.

use std::time::Instant;

use clio::{Input, Output};
use graft_core::{
    apply_script_diff, diff_scripts, match_graphs, GraphChange, NodeChange, Painter, Palette,
    ScriptDiff,
};
use tracing::info;

use crate::script_io::{read_script, write_json, OutputArgs};
use crate::{CliError, TyperArgs};

/// Arguments for the `diff` subcommand.
#[derive(Debug, clap::Args)]
pub struct DiffArgs {
    /// Ancestor-side script (json).
    #[arg(value_parser)]
    pub ancestor: Input,

    /// Version-side script (json).
    #[arg(value_parser)]
    pub version: Input,

    /// Output configuration.
    #[command(flatten)]
    pub output: OutputArgs,

    /// Write a copy of the patched model recolored by change kind.
    #[arg(short = 'b', long, value_parser, help_heading = "Output")]
    pub paint: Option<Output>,

    /// Value property names excluded from edits (e.g. UI positions).
    #[arg(long, help_heading = "Filtering")]
    pub ignore: Vec<String>,

    /// Node-typing configuration.
    #[command(flatten)]
    pub typer: TyperArgs,
}

impl DiffArgs {
    /// Runs the `diff` subcommand.
    pub fn run(&mut self) -> Result<(), CliError> {
        let ancestor = read_script(&mut self.ancestor)?;
        let version = read_script(&mut self.version)?;
        let typer = self.typer.typer();

        let start = Instant::now();
        let graph_matches = match_graphs(&ancestor, &version, &typer);
        let mut diff = diff_scripts(&ancestor, &version, &graph_matches, &typer);
        if !self.ignore.is_empty() {
            ignore_value_properties(&mut diff, &self.ignore);
        }
        info!(
            elapsed = ?start.elapsed(),
            changed_graphs = diff.graphs.len(),
            "computed diff"
        );

        self.output.write_json(&diff)?;

        if let Some(paint_output) = &mut self.paint {
            let mut painted = ancestor;
            apply_script_diff(&mut painted, &diff)?;
            Painter::default().paint_script_diff(&mut painted, &diff, Palette::PRIMARY);
            write_json(paint_output, &painted, self.output.indent)?;
        }
        Ok(())
    }
}

/// Strips the given value-property names from every edit in the diff,
/// dropping node entries (and graph edits) that become empty.
///
/// Hosts store UI state such as node positions in ordinary value properties;
/// ignoring them keeps layout noise out of the change set.
fn ignore_value_properties(diff: &mut ScriptDiff, ignores: &[String]) {
    for change in diff.graphs.values_mut() {
        let GraphChange::Edit(graph_diff) = change else {
            continue;
        };
        for node_change in graph_diff.nodes.values_mut() {
            if let NodeChange::Edit(node_diff) = node_change {
                for name in ignores {
                    node_diff.values.remove(name);
                }
            }
        }
        graph_diff
            .nodes
            .retain(|_, change| !matches!(change, NodeChange::Edit(diff) if diff.is_empty()));
    }
    diff.graphs
        .retain(|_, change| !matches!(change, GraphChange::Edit(diff) if diff.is_empty()));
}

#[cfg(test)]
mod test {
    use graft_core::{GraphDiff, GraphKey, Node, NodeDiff, NodeKey};

    use super::*;

    #[test]
    fn ignore_drops_noise_only_edits() {
        let mut noisy = NodeDiff::default();
        noisy.set_value("v.x", 10.0);
        let mut real = NodeDiff::default();
        real.set_value("v.x", 10.0);
        real.set_value("v.freq", 440.0);

        let mut graph_diff = GraphDiff::default();
        graph_diff
            .nodes
            .insert(NodeKey::new("noisy"), NodeChange::Edit(noisy));
        graph_diff
            .nodes
            .insert(NodeKey::new("real"), NodeChange::Edit(real));
        graph_diff
            .nodes
            .insert(NodeKey::new("added"), NodeChange::Add(Node::default()));

        let mut diff = ScriptDiff::default();
        diff.graphs
            .insert(GraphKey::new("g"), GraphChange::Edit(graph_diff));

        ignore_value_properties(&mut diff, &["v.x".to_owned()]);

        let GraphChange::Edit(graph_diff) = &diff.graphs[&GraphKey::new("g")] else {
            panic!("expected edit");
        };
        // The noise-only edit is gone, the real edit lost its noise entry,
        // adds are untouched.
        assert!(!graph_diff.nodes.contains_key(&NodeKey::new("noisy")));
        let NodeChange::Edit(real) = &graph_diff.nodes[&NodeKey::new("real")] else {
            panic!("expected edit");
        };
        assert!(real.value("v.x").is_none());
        assert!(real.value("v.freq").is_some());
        assert!(graph_diff.nodes.contains_key(&NodeKey::new("added")));
    }

    #[test]
    fn ignore_drops_empty_graph_edits() {
        let mut noisy = NodeDiff::default();
        noisy.set_value("v.x", 1.0);
        let mut graph_diff = GraphDiff::default();
        graph_diff
            .nodes
            .insert(NodeKey::new("n"), NodeChange::Edit(noisy));
        let mut diff = ScriptDiff::default();
        diff.graphs
            .insert(GraphKey::new("g"), GraphChange::Edit(graph_diff));

        ignore_value_properties(&mut diff, &["v.x".to_owned()]);
        assert!(diff.is_empty());
    }
}
