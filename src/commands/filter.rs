use crate::areas::hooks::{Action, Verdict};
use crate::areas::pipeline::{Pipeline, Report};
use crate::artifacts::data::body::BlobBody;
use crate::artifacts::objects::blob::Blob;
use crate::commands::open_input;
use anyhow::Context;
use bstr::BString;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::Path;

impl Pipeline {
    /// Rewrite `input` into `output`
    ///
    /// Standard input and standard output stand in for a missing path.
    pub fn filter(&mut self, input: Option<&Path>, output: Option<&Path>) -> anyhow::Result<Report> {
        let reader = open_input(input)?;
        let report = match output {
            Some(path) => {
                let file = File::create(path)
                    .with_context(|| format!("cannot create {}", path.display()))?;
                self.run(reader, BufWriter::new(file))?
            }
            None => self.run(reader, BufWriter::new(io::stdout().lock()))?,
        };
        Ok(report)
    }
}

/// Filename hook removing every path at or below one of `prefixes`
pub fn drop_paths(prefixes: Vec<BString>) -> impl FnMut(&[u8]) -> anyhow::Result<Action> + 'static {
    move |path| {
        let dropped = prefixes.iter().any(|prefix| is_under(path, prefix));
        Ok(if dropped { Action::Veto } else { Action::Keep })
    }
}

/// Blob hook removing blobs whose declared size exceeds `limit`
///
/// Delimited blobs declare no size and are always kept.
pub fn drop_blobs_over(
    limit: u64,
) -> impl FnMut(&mut Blob, &mut BlobBody<'_>) -> anyhow::Result<Verdict> + 'static {
    move |_, body| {
        Ok(match body.declared_len() {
            Some(len) if len > limit => Verdict::Drop,
            _ => Verdict::Keep,
        })
    }
}

fn is_under(path: &[u8], prefix: &[u8]) -> bool {
    let prefix = prefix.strip_suffix(b"/").unwrap_or(prefix);
    path == prefix || (path.starts_with(prefix) && path.get(prefix.len()) == Some(&b'/'))
}
