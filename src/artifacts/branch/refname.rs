use crate::artifacts::branch::INVALID_REFNAME_REGEX;
use bstr::{BStr, BString};
use regex::bytes::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static INVALID_REFNAME: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(INVALID_REFNAME_REGEX).ok());

/// Whether git would accept `name` as a reference name
pub fn is_valid_refname(name: &[u8]) -> bool {
    if name.is_empty() {
        return false;
    }
    match INVALID_REFNAME.as_ref() {
        Some(re) => !re.is_match(name),
        None => true,
    }
}

/// Remembers which names were already checked so each one is reported once
#[derive(Debug, Default)]
pub struct RefnameChecker {
    seen: HashSet<BString>,
}

impl RefnameChecker {
    /// Check `name` the first time it is seen
    ///
    /// # Returns
    ///
    /// `true` if the name is new and invalid
    pub fn report(&mut self, name: &BStr) -> bool {
        if self.seen.contains(name) {
            return false;
        }
        self.seen.insert(name.to_owned());
        !is_valid_refname(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("refs/heads/main")]
    #[case("refs/heads/feature/x-1")]
    #[case("refs/tags/v1.0")]
    #[case("v1.0")]
    fn accepts_ordinary_names(#[case] name: &str) {
        assert!(is_valid_refname(name.as_bytes()));
    }

    #[rstest]
    #[case("")]
    #[case("refs/heads/.hidden")]
    #[case("refs/heads/a..b")]
    #[case("/refs/heads/main")]
    #[case("refs/heads/main/")]
    #[case("refs//heads")]
    #[case("refs/heads/main.lock")]
    #[case("refs/heads/main.")]
    #[case("refs/heads/a@{1}")]
    #[case("@")]
    #[case("refs/heads/with space")]
    #[case("refs/heads/star*")]
    #[case("refs/heads/tilde~1")]
    fn rejects_what_git_rejects(#[case] name: &str) {
        assert!(!is_valid_refname(name.as_bytes()));
    }

    #[test]
    fn reports_each_name_once() {
        let mut checker = RefnameChecker::default();
        assert!(checker.report(BStr::new("bad name")));
        assert!(!checker.report(BStr::new("bad name")));
        assert!(!checker.report(BStr::new("refs/heads/main")));
    }
}
