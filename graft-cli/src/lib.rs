//! Command line tools for graft scripts.
//!
//! This library provides utilities for the `graft` CLI.
//!
//! ## CLI Usage
//!
//! The CLI provides two subcommands:
//!
//! - `diff` for diffing two script files.
//! - `merge` for three-way merging two diffs over a common ancestor.
//!
//! ### Diff
//!
//! Diff two scripts, writing the change set as JSON.
//!
//! Usage: `graft diff [OPTIONS] <ANCESTOR> <VERSION>`
//!
//! ```text
//! Options:
//!   -o, --output <OUTPUT>  Output file, '-' for stdout [default: -]
//!   -i, --indent <INDENT>  Indentation size used for JSON output [default: 4]
//!   -b, --paint <PAINT>    Write a copy of the patched model recolored by change kind
//!       --ignore <IGNORE>  Value property names excluded from edits
//!   -v, --verbose...       Increase logging verbosity
//!   -q, --quiet...         Decrease logging verbosity
//! ```
//!
//! ### Merge
//!
//! Merge two diffs over their common ancestor, writing the merged script on
//! success or the conflict report otherwise.
//!
//! Usage: `graft merge [OPTIONS] <ANCESTOR> <DIFF1> <DIFF2>`
//!
//! ```text
//! Options:
//!   -o, --output <OUTPUT>  Output file, '-' for stdout [default: -]
//!   -i, --indent <INDENT>  Indentation size used for JSON output [default: 4]
//!   -b, --paint <PAINT>    Write the merged model recolored by change origin
//!   -v, --verbose...       Increase logging verbosity
//!   -q, --quiet...         Decrease logging verbosity
//! ```

use clap::{crate_version, Parser};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use graft_core::KeyTyper;
use thiserror::Error;

pub mod diff;
pub mod merge;
pub mod script_io;

/// CLI arguments.
#[derive(Parser, Debug)]
#[clap(version = crate_version!(), long_about = None)]
#[clap(about = "Structural diff and merge for node-graph documents.")]
pub struct CliArgs {
    /// The command to be run.
    #[command(subcommand)]
    pub command: CliCommand,
    /// Verbosity.
    #[command(flatten)]
    pub verbose: Verbosity<InfoLevel>,
}

/// The CLI subcommands.
#[derive(Debug, clap::Subcommand)]
#[non_exhaustive]
pub enum CliCommand {
    /// Diff two scripts.
    Diff(diff::DiffArgs),
    /// Three-way merge two diffs over a common ancestor.
    Merge(merge::MergeArgs),
}

/// Error type for the CLI.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CliError {
    /// Error reading input or writing output.
    #[error("Error reading or writing file.")]
    Io(#[from] std::io::Error),
    /// Error parsing or serializing JSON.
    #[error("Error parsing script JSON.")]
    Json(#[from] serde_json::Error),
    /// A diff names ids that are absent from the model it is applied to.
    #[error("Diff does not fit the target model.")]
    Apply(#[from] graft_core::ApplyError),
}

/// Node-typing configuration shared by the subcommands.
///
/// The defaults follow the host convention the documents were exported with:
/// the type lives in a designated value property, and generic group nodes
/// are typed by their group name instead.
#[derive(Debug, clap::Args)]
pub struct TyperArgs {
    /// Property holding a node's type name.
    #[arg(long, default_value = "v.node_name", help_heading = "Typing")]
    pub type_property: String,

    /// Property holding the group name used as the type of group nodes.
    #[arg(long, default_value = "p.group_name", help_heading = "Typing")]
    pub group_property: String,

    /// Node types treated as generic groups, typed by their group name.
    #[arg(
        long = "group-type",
        default_values_t = [String::from("ShaderNodeGroup"), String::from("GeometryNodeGroup")],
        help_heading = "Typing"
    )]
    pub group_types: Vec<String>,
}

impl TyperArgs {
    /// Builds the node typer injected into matching.
    #[must_use]
    pub fn typer(&self) -> KeyTyper {
        KeyTyper::new(self.type_property.clone())
            .with_group_fallback(self.group_property.clone(), self.group_types.iter().cloned())
    }
}
