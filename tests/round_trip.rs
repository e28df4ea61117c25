use bit_rewrite::{Config, Hooks};
use pretty_assertions::assert_eq;
use rstest::rstest;

mod common;

const FULL_STREAM: &str = r#"feature done
option git --quiet
blob
mark :1
original-oid 1111111111111111111111111111111111111111
data <<EOF
line one
line two
EOF

blob
mark :2
data 3
bin
reset refs/heads/main
commit refs/heads/main
mark :3
original-oid 2222222222222222222222222222222222222222
author A U Thor <author@example.com> 1700000000 +0100
committer C O Mitter <committer@example.com> 1700000100 -0500
encoding ISO-8859-1
data 8
initial
M 100644 :1 "with space.txt"
M 100755 :2 bin/run
M 120000 inline link
data 6
target
M 100644 :1 "caf\303\251.txt"

commit refs/heads/main
mark :4
committer C O Mitter <committer@example.com> 1700000200 +0000
data 7
rename
from :3
R bin/run bin/start
C link link2
D "with space.txt"
N :1 :3

tag v1.0
mark :5
from :4
tagger T Agger <tagger@example.com> 1700000300 +0000
data 8
release

alias
mark :6
to :4

reset refs/heads/stable
from :6

ls :4 bin/start
cat-blob :1
get-mark :4
checkpoint

progress finished
done
"#;

#[test]
fn every_command_survives_a_rewrite_unchanged() {
    let (output, report) = common::rewrite(FULL_STREAM, Config::default(), Hooks::new());

    assert_eq!(output, FULL_STREAM);
    assert!(report.warnings.is_empty(), "{:?}", report.warnings);
    assert_eq!(report.removed_commits(), 0);
}

#[test]
fn generated_history_is_reproduced() {
    let mut stream = common::StreamBuilder::new();
    let mut parents = Vec::new();
    for i in 0..20 {
        let blob = stream.blob(&format!("revision {i}\n"));
        let change = common::modify(blob, &common::path());
        let commit = stream.commit("main", &parents, &format!("commit {i}"), &[change]);
        parents = vec![commit];
    }
    let input = stream.build();

    let (output, report) = common::rewrite(&input, Config::default(), Hooks::new());

    assert_eq!(output, input);
    assert_eq!(report.commands, 40);
}

#[rstest]
#[case(true, "M 100644 :1 \"caf\\303\\251\"\n")]
#[case(false, "M 100644 :1 café\n")]
fn non_ascii_paths_follow_quoting_preference(#[case] quote: bool, #[case] expected: &str) {
    let input = "blob\nmark :1\ndata 0\n\
                 commit refs/heads/main\n\
                 committer A <a@example.com> 1700000000 +0000\n\
                 data 0\n\
                 M 100644 :1 \"caf\\303\\251\"\n\n";
    let config = Config::default().with_quote_non_ascii(quote);

    let (output, _) = common::rewrite(input, config, Hooks::new());

    assert!(output.contains(expected), "{output}");
}

#[test]
fn commit_without_terminating_blank_line_gains_one() {
    let input = "commit refs/heads/main\n\
                 committer A <a@example.com> 1700000000 +0000\n\
                 data 3\nmsg\
                 progress next\n";

    let (output, _) = common::rewrite(input, Config::default(), Hooks::new());

    assert_eq!(
        output,
        "commit refs/heads/main\n\
         committer A <a@example.com> 1700000000 +0000\n\
         data 3\nmsg\n\
         progress next\n"
    );
}

#[test]
fn paths_with_inner_quotes_stay_quoted() {
    let input = r#"blob
mark :1
data 1
x
commit refs/heads/main
mark :2
committer A <a@example.com> 1700000000 +0000
data 0
M 100644 :1 "a\"b"
R "a\"b" "say \"hi\""

ls :2 "say \"hi\""
"#;

    let (output, report) = common::rewrite(input, Config::default(), Hooks::new());

    assert_eq!(output, input);
    assert!(report.warnings.is_empty(), "{:?}", report.warnings);
}
