//! Three-way merge two diffs over a common ancestor on the command line.

use std::time::Instant;

use clio::{Input, Output};
use graft_core::{merge_scripts, remove_common_adds, Painter};
use tracing::{info, warn};

use crate::script_io::{read_script, read_script_diff, write_json, OutputArgs};
use crate::CliError;

/// Arguments for the `merge` subcommand.
#[derive(Debug, clap::Args)]
pub struct MergeArgs {
    /// Ancestor script (json).
    #[arg(value_parser)]
    pub ancestor: Input,

    /// First version's diff against the ancestor (json).
    #[arg(value_parser)]
    pub diff1: Input,

    /// Second version's diff against the ancestor (json).
    #[arg(value_parser)]
    pub diff2: Input,

    /// Output configuration.
    #[command(flatten)]
    pub output: OutputArgs,

    /// Write the merged model recolored by change origin.
    #[arg(short = 'b', long, value_parser, help_heading = "Output")]
    pub paint: Option<Output>,
}

impl MergeArgs {
    /// Runs the `merge` subcommand.
    pub fn run(&mut self) -> Result<(), CliError> {
        let ancestor = read_script(&mut self.ancestor)?;
        let diff1 = read_script_diff(&mut self.diff1)?;
        let mut diff2 = read_script_diff(&mut self.diff2)?;

        let start = Instant::now();
        // Concurrent identical insertions collapse to one.
        remove_common_adds(&diff1, &mut diff2);
        let merge = merge_scripts(&ancestor, &diff1, &diff2)?;
        info!(elapsed = ?start.elapsed(), "merged scripts");

        if merge.has_conflicts() {
            warn!(conflicts = merge.conflicts.len(), "merge failed");
            self.output.write_json(&merge.conflicts)?;
        } else {
            self.output.write_json(&merge.result)?;
        }

        if let Some(paint_output) = &mut self.paint {
            let mut painted = merge.result;
            Painter::default().paint_merge(&mut painted, &diff1, &diff2);
            write_json(paint_output, &painted, self.output.indent)?;
        }
        Ok(())
    }
}
