use crate::areas::pipeline::{Pipeline, Report};
use crate::commands::open_input;
use std::io;
use std::path::Path;

impl Pipeline {
    /// Parse and validate `input` without writing it anywhere
    ///
    /// Hooks still run, so a check reports what a filter would do.
    pub fn check(&mut self, input: Option<&Path>) -> anyhow::Result<Report> {
        let reader = open_input(input)?;
        Ok(self.run(reader, io::sink())?)
    }
}
