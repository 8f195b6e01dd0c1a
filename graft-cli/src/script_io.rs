//! Input/output arguments for the graft CLI.

use std::io::{BufReader, Write};

use clio::{Input, Output};
use graft_core::{Script, ScriptDiff};
use serde::Serialize;

use crate::CliError;

/// Arguments controlling where and how JSON results are written.
#[derive(Debug, clap::Args)]
pub struct OutputArgs {
    /// Output file, '-' for stdout.
    #[arg(
        short,
        long,
        value_parser,
        default_value = "-",
        help_heading = "Output"
    )]
    pub output: Output,

    /// Indentation size used for JSON output.
    #[arg(short = 'i', long, default_value_t = 4, help_heading = "Output")]
    pub indent: usize,
}

impl OutputArgs {
    /// Serializes `value` to the configured output.
    pub fn write_json<T: Serialize>(&mut self, value: &T) -> Result<(), CliError> {
        write_json(&mut self.output, value, self.indent)
    }
}

/// Serializes `value` as indented JSON to `output`.
pub fn write_json<T: Serialize>(
    output: &mut Output,
    value: &T,
    indent: usize,
) -> Result<(), CliError> {
    let indent = b" ".repeat(indent);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(&indent);
    let mut serializer = serde_json::Serializer::with_formatter(&mut *output, formatter);
    value.serialize(&mut serializer)?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}

/// Reads a script from a JSON input.
pub fn read_script(input: &mut Input) -> Result<Script, CliError> {
    Ok(serde_json::from_reader(BufReader::new(input))?)
}

/// Reads a script diff from a JSON input.
pub fn read_script_diff(input: &mut Input) -> Result<ScriptDiff, CliError> {
    Ok(serde_json::from_reader(BufReader::new(input))?)
}
