#![allow(dead_code)]

use bit_rewrite::{Config, Hooks, Pipeline, Report};
use fake::Fake;
use fake::faker::internet::en::SafeEmail;
use fake::faker::lorem::en::Word;
use fake::faker::name::en::{FirstName, LastName};

pub const DATE: &str = "1700000000 +0000";

/// A random `Name <email> date` identity
pub fn ident() -> String {
    format!(
        "{} {} <{}> {DATE}",
        FirstName().fake::<String>(),
        LastName().fake::<String>(),
        SafeEmail().fake::<String>()
    )
}

/// A random two-component path made of lowercase words
pub fn path() -> String {
    format!(
        "{}/{}.txt",
        Word().fake::<String>(),
        Word().fake::<String>()
    )
}

/// Builds fast-export streams the way `git fast-export` lays them out
#[derive(Debug, Default)]
pub struct StreamBuilder {
    out: String,
    next_mark: u64,
}

impl StreamBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn mark(&mut self) -> u64 {
        self.next_mark += 1;
        self.next_mark
    }

    /// Append a blob followed by the optional blank line
    pub fn blob(&mut self, content: &str) -> u64 {
        let mark = self.mark();
        self.out.push_str(&format!(
            "blob\nmark :{mark}\ndata {}\n{content}\n",
            content.len()
        ));
        mark
    }

    /// Append a commit; the first parent becomes `from`, the rest `merge`
    pub fn commit(&mut self, branch: &str, parents: &[u64], message: &str, changes: &[String]) -> u64 {
        let mark = self.mark();
        let who = ident();
        self.out.push_str(&format!(
            "commit refs/heads/{branch}\nmark :{mark}\nauthor {who}\ncommitter {who}\ndata {}\n{message}\n",
            message.len() + 1
        ));
        if let Some((from, merges)) = parents.split_first() {
            self.out.push_str(&format!("from :{from}\n"));
            for merge in merges {
                self.out.push_str(&format!("merge :{merge}\n"));
            }
        }
        for change in changes {
            self.out.push_str(change);
            self.out.push('\n');
        }
        self.out.push('\n');
        mark
    }

    pub fn raw(&mut self, text: &str) -> &mut Self {
        self.out.push_str(text);
        self
    }

    pub fn build(&self) -> String {
        self.out.clone()
    }
}

pub fn modify(mark: u64, path: &str) -> String {
    format!("M 100644 :{mark} {path}")
}

pub fn rewrite(input: &str, config: Config, hooks: Hooks) -> (String, Report) {
    let mut pipeline = Pipeline::new(config, hooks).unwrap();
    let mut output = Vec::new();
    let report = pipeline.run(input.as_bytes(), &mut output).unwrap();
    (String::from_utf8(output).unwrap(), report)
}

/// Commit marks of the output in the order they were written
pub fn commit_marks(output: &str) -> Vec<u64> {
    output
        .split("commit refs/")
        .skip(1)
        .filter_map(|commit| {
            commit
                .lines()
                .find_map(|line| line.strip_prefix("mark :"))
                .and_then(|mark| mark.parse().ok())
        })
        .collect()
}
