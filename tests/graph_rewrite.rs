use bit_rewrite::{Action, Config, Hooks, NodeKey, PrunePolicy, Verdict};
use pretty_assertions::assert_eq;

mod common;

use common::{StreamBuilder, commit_marks, modify};

fn drop_marked(word: &'static str) -> Hooks {
    let mut hooks = Hooks::new();
    hooks
        .on_commit(move |commit| {
            Ok(if commit.message.bytes.starts_with(word.as_bytes()) {
                Verdict::Drop
            } else {
                Verdict::Keep
            })
        })
        .unwrap();
    hooks
}

fn node(mark: u64) -> NodeKey {
    NodeKey::Mark(bit_rewrite::artifacts::objects::mark::Mark::new(mark).unwrap())
}

#[test]
fn dropping_a_run_of_commits_links_the_survivors() {
    //   1 - 2x - 3x - 4x - 5
    let mut stream = StreamBuilder::new();
    let blob = stream.blob("content\n");
    let first = stream.commit("main", &[], "keep", &[modify(blob, "a")]);
    let mut tip = first;
    for _ in 0..3 {
        tip = stream.commit("main", &[tip], "skip", &[modify(blob, &common::path())]);
    }
    let last = stream.commit("main", &[tip], "keep", &[modify(blob, "b")]);

    let (output, report) = common::rewrite(&stream.build(), Config::default(), drop_marked("skip"));

    assert_eq!(commit_marks(&output), vec![first, last]);
    assert!(output.contains(&format!("mark :{last}\n")));
    assert!(output.contains(&format!("from :{first}\nM 100644 :{blob} b\n")));
    assert_eq!(report.dropped.len(), 3);
}

#[test]
fn merge_keeps_both_sides_when_one_survives_through_an_ancestor() {
    //   A ---------- D
    //    \          /
    //     B --- Cx -
    let mut stream = StreamBuilder::new();
    let blob = stream.blob("content\n");
    let a = stream.commit("main", &[], "keep a", &[modify(blob, "a")]);
    let b = stream.commit("side", &[a], "keep b", &[modify(blob, "b")]);
    let c = stream.commit("side", &[b], "skip c", &[modify(blob, "c")]);
    let d = stream.commit("main", &[a, c], "keep d", &[modify(blob, "d")]);

    let (output, report) = common::rewrite(&stream.build(), Config::default(), drop_marked("skip"));

    assert_eq!(commit_marks(&output), vec![a, b, d]);
    assert!(output.contains(&format!("from :{a}\nmerge :{b}\n")));
    assert!(report.no_longer_merges.is_empty());
}

#[test]
fn commit_orphaned_by_drops_is_pruned_under_roots_policy() {
    let mut stream = StreamBuilder::new();
    let blob = stream.blob("content\n");
    let a = stream.commit("main", &[], "skip a", &[modify(blob, "a")]);
    let b = stream.commit("main", &[a], "keep b", &[modify(blob, "secret/b")]);
    let c = stream.commit("main", &[b], "keep c", &[modify(blob, "c")]);
    let mut hooks = drop_marked("skip");
    hooks
        .on_filename(|path| {
            Ok(if path.starts_with(b"secret/") {
                Action::Veto
            } else {
                Action::Keep
            })
        })
        .unwrap();
    let config = Config::default().with_prune_empty(PrunePolicy::Roots);

    let (output, report) = common::rewrite(&stream.build(), config, hooks);

    assert_eq!(commit_marks(&output), vec![c]);
    assert_eq!(report.dropped, vec![node(a)]);
    assert_eq!(report.pruned, vec![node(b)]);
    assert!(!output.contains("from"));
}

#[test]
fn empty_merge_that_still_merges_is_not_pruned() {
    let mut stream = StreamBuilder::new();
    let blob = stream.blob("content\n");
    let a = stream.commit("main", &[], "a", &[modify(blob, "a")]);
    let b = stream.commit("side", &[a], "b", &[modify(blob, "b")]);
    let merge = stream.commit("main", &[a, b], "merge", &[]);
    let config = Config::default().with_prune_empty(PrunePolicy::Auto);

    let (output, report) = common::rewrite(&stream.build(), config, Hooks::new());

    assert_eq!(commit_marks(&output), vec![a, b, merge]);
    assert!(report.pruned.is_empty());
}

#[test]
fn unmarked_commits_continue_their_branch_implicitly() {
    let who = "A <a@example.com> 1700000000 +0000";
    let input = format!(
        "commit refs/heads/main\ncommitter {who}\ndata 5\nkeep\n\n\
         commit refs/heads/main\ncommitter {who}\ndata 5\nskip\n\n\
         commit refs/heads/main\ncommitter {who}\ndata 5\nkeep\n\n"
    );

    let (output, report) = common::rewrite(&input, Config::default(), drop_marked("skip"));

    assert_eq!(
        output,
        format!(
            "commit refs/heads/main\ncommitter {who}\ndata 5\nkeep\n\n\
             commit refs/heads/main\ncommitter {who}\ndata 5\nkeep\n\n"
        )
    );
    assert_eq!(report.dropped, vec![NodeKey::Anonymous(2)]);
    assert!(report.warnings.is_empty());
}

#[test]
fn unmarked_parent_on_another_branch_is_reported() {
    let who = "A <a@example.com> 1700000000 +0000";
    let input = format!(
        "commit refs/heads/main\ncommitter {who}\ndata 5\nkeep\n\n\
         commit refs/heads/main\nmark :1\ncommitter {who}\ndata 5\nskip\n\n\
         commit refs/heads/other\nmark :2\ncommitter {who}\ndata 5\nkeep\nfrom :1\n\n"
    );

    let (output, report) = common::rewrite(&input, Config::default(), drop_marked("skip"));

    assert!(report.has_errors());
    assert_eq!(commit_marks(&output), vec![2]);
    assert!(!output.contains("from"));
}
