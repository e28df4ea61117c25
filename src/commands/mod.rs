//! Command implementations behind the binary
//!
//! - `filter`: rewrite a stream, optionally removing paths
//! - `check`: parse and validate a stream without writing anything
//!
//! Both extend [`Pipeline`](crate::Pipeline) and end by printing the
//! session report through [`print_report`].

pub mod check;
pub mod filter;

use crate::areas::pipeline::Report;
use crate::artifacts::core::warning::Severity;
use anyhow::Context;
use colored::Colorize;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

/// Open `path` for reading, or standard input when there is none
pub(crate) fn open_input(path: Option<&Path>) -> anyhow::Result<Box<dyn BufRead>> {
    Ok(match path {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("cannot open {}", path.display()))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(io::stdin())),
    })
}

/// Print every warning of `report` followed by a one-line summary
pub fn print_report(report: &Report, writer: &mut dyn Write) -> io::Result<()> {
    for warning in &report.warnings {
        let label = match warning.severity() {
            Severity::Info => "info".cyan(),
            Severity::Warn => "warning".yellow(),
            Severity::Error => "error".red(),
        };
        writeln!(writer, "{label}: {} ({})", warning.kind, warning.position)?;
    }

    writeln!(
        writer,
        "{} commands, {} commits dropped, {} pruned, {} blobs dropped, {} warnings",
        report.commands,
        report.dropped.len(),
        report.pruned.len(),
        report.blobs_dropped,
        report.warnings.len()
    )
}
