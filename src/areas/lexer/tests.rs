use super::*;
use crate::artifacts::codec::date::Date;
use crate::artifacts::codec::integer::IntegerError;
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::io::Read;

fn lexer(input: &str) -> Lexer<&[u8]> {
    Lexer::new(input.as_bytes())
}

fn next(lexer: &mut Lexer<&[u8]>) -> Command {
    lexer.next_command().unwrap().command
}

fn parse_kind(input: &str) -> ParseError {
    let mut lexer = lexer(input);
    loop {
        match lexer.next_command() {
            Ok(parsed) if parsed.command == Command::Done(Done::Eof) => {
                panic!("expected a parse error")
            }
            Ok(_) => continue,
            Err(err) => return err.parse_kind().cloned().expect("parse error"),
        }
    }
}

#[test]
fn blob_payload_is_streamed_on_demand() {
    let mut lexer = lexer("blob\nmark :1\ndata 5\nhello\nblob\ndata 2\nhi");

    let Command::Blob(blob) = next(&mut lexer) else {
        panic!("expected blob");
    };
    assert_eq!(blob.mark, Mark::new(1));
    assert_eq!(blob.declared_len(), Some(5));

    let mut payload = String::new();
    lexer
        .data_reader()
        .unwrap()
        .read_to_string(&mut payload)
        .unwrap();
    assert_eq!(payload, "hello");
    assert!(lexer.finish_data().unwrap());

    assert!(matches!(next(&mut lexer), Command::Blob(_)));
    assert_eq!(next(&mut lexer), Command::Done(Done::Eof));
}

#[test]
fn unread_payload_is_skipped() {
    let mut lexer = lexer("blob\ndata <<END\nline one\nline two\nEND\n\nprogress next\n");

    assert!(matches!(next(&mut lexer), Command::Blob(_)));
    assert_eq!(
        next(&mut lexer),
        Command::Progress(Progress::new("next".into()))
    );
}

#[test]
fn delimited_payload_streams_line_by_line() {
    let mut lexer = lexer("blob\ndata <<EOF\nab\ncd\nEOF\n");
    next(&mut lexer);

    let mut reader = lexer.data_reader().unwrap();
    let mut buf = [0u8; 2];
    let mut seen = Vec::new();
    loop {
        let n = reader.read(&mut buf).unwrap();
        if n == 0 {
            break;
        }
        seen.extend_from_slice(&buf[..n]);
    }
    assert_eq!(seen, b"ab\ncd\n".to_vec());
}

#[test]
fn full_commit() {
    let input = "\
commit refs/heads/main
mark :3
original-oid 0123456789abcdef0123456789abcdef01234567
author A U Thor <author@example.com> 1700000000 +0100
committer C O Mitter <committer@example.com> 1700000001 -0200
encoding iso-8859-1
data 8
message
from :1
merge :2
M 100644 :1 \"with space\"
M 755 inline run.sh
data 3
ls
D gone.txt
R \"old name\" new
C src dst
N :1 :2
deleteall
ls \"a b\"
cat-blob :1

";
    let mut lexer = lexer(input);
    let Command::Commit(commit) = next(&mut lexer) else {
        panic!("expected commit");
    };

    assert_eq!(commit.branch, "refs/heads/main");
    assert_eq!(commit.mark, Mark::new(3));
    assert!(commit.original_oid.is_some());
    assert_eq!(commit.author.as_ref().unwrap().email, "author@example.com");
    assert_eq!(commit.committer.name, Some("C O Mitter".into()));
    assert_eq!(commit.encoding, Some("iso-8859-1".into()));
    assert_eq!(commit.message.bytes, "message\n");
    assert_eq!(commit.from, Some(ObjectRef::Mark(Mark::new(1).unwrap())));
    assert_eq!(commit.merges.len(), 1);

    let paths: Vec<_> = commit
        .file_changes()
        .flat_map(|change| change.paths())
        .map(|path| path.to_string())
        .collect();
    assert_eq!(
        paths,
        vec!["with space", "run.sh", "gone.txt", "old name", "new", "src", "dst"]
    );
    assert_eq!(commit.changes.len(), 9);
    assert!(matches!(
        commit.changes[7],
        ChangeLine::Ls(Ls { root: None, .. })
    ));
    assert_eq!(next(&mut lexer), Command::Done(Done::Eof));
}

#[test]
fn commit_ends_at_next_command_without_blank_line() {
    let mut lexer = lexer(
        "commit refs/heads/main\ncommitter <c> 0 +0000\ndata 0\nM 644 :1 a\nprogress hi\n",
    );
    let Command::Commit(commit) = next(&mut lexer) else {
        panic!("expected commit");
    };
    assert_eq!(commit.changes.len(), 1);
    assert_eq!(lexer.state(), LexerState::AwaitCommand);
    assert!(matches!(next(&mut lexer), Command::Progress(_)));
}

#[test]
fn blank_after_message_counts_as_terminator() {
    let mut lexer = lexer("commit refs/heads/main\ncommitter <c> 0 +0000\ndata 2\nm\n\nprogress x\n");
    let Command::Commit(commit) = next(&mut lexer) else {
        panic!("expected commit");
    };
    assert!(!commit.message.trailing_lf);
    assert!(matches!(next(&mut lexer), Command::Progress(_)));
}

#[test]
fn comments_are_skipped() {
    let mut lexer = lexer("# leading\nprogress one\n# between\ncheckpoint\n");
    assert!(matches!(next(&mut lexer), Command::Progress(_)));
    assert_eq!(next(&mut lexer), Command::Checkpoint);
}

#[test]
fn date_format_feature_switches_parsing() {
    let mut lexer = lexer(
        "feature date-format=rfc2822\n\
         commit refs/heads/main\n\
         committer C <c> Tue, 1 Jul 2003 10:52:37 +0200\n\
         data 0\n\n",
    );
    assert!(matches!(next(&mut lexer), Command::Feature(_)));
    assert_eq!(lexer.date_format(), DateFormat::Rfc2822);

    let Command::Commit(commit) = next(&mut lexer) else {
        panic!("expected commit");
    };
    assert!(matches!(commit.committer.date, Date::Rfc2822 { .. }));
}

#[test]
fn reset_takes_optional_from_and_blank_line() {
    let mut lexer = lexer("reset refs/heads/a\nfrom :1\n\nreset refs/heads/b\nprogress p\n");

    let parsed = lexer.next_command().unwrap();
    assert_eq!(
        parsed.command,
        Command::Reset(Reset::new(
            "refs/heads/a".into(),
            Some(ObjectRef::Mark(Mark::new(1).unwrap()))
        ))
    );
    assert!(parsed.trailing_lf);

    let parsed = lexer.next_command().unwrap();
    assert_eq!(
        parsed.command,
        Command::Reset(Reset::new("refs/heads/b".into(), None))
    );
    assert!(!parsed.trailing_lf);
    assert!(matches!(next(&mut lexer), Command::Progress(_)));
}

#[test]
fn tag_without_tagger_needs_permission() {
    let input = "tag v1\nfrom :1\ndata 0\n";
    assert_eq!(parse_kind(input), ParseError::ExpectedTagger);

    let config = Config {
        allow_missing_tagger: true,
        ..Config::default()
    };
    let mut lexer = Lexer::with_config(input.as_bytes(), &config);
    let Command::Tag(tag) = lexer.next_command().unwrap().command else {
        panic!("expected tag");
    };
    assert_eq!(tag.tagger, None);
    assert_eq!(lexer.take_warnings().len(), 1);
}

#[test]
fn alias_and_small_commands() {
    let mut lexer = lexer(
        "alias\nmark :5\nto :1\n\nls :1 some/path\ncat-blob :2\nget-mark :3\noption git --quiet\ndone\nprogress unreachable\n",
    );
    assert_eq!(
        next(&mut lexer),
        Command::Alias(Alias::new(
            Mark::new(5).unwrap(),
            ObjectRef::Mark(Mark::new(1).unwrap())
        ))
    );
    assert!(matches!(next(&mut lexer), Command::Ls(Ls { root: Some(_), .. })));
    assert!(matches!(next(&mut lexer), Command::CatBlob(_)));
    assert!(matches!(next(&mut lexer), Command::GetMark(_)));
    assert!(matches!(next(&mut lexer), Command::Option(_)));
    assert_eq!(next(&mut lexer), Command::Done(Done::Explicit));
    assert_eq!(lexer.state(), LexerState::Done);
    assert_eq!(next(&mut lexer), Command::Done(Done::Eof));
}

#[test]
fn zero_padded_mode_warns() {
    let mut lexer = lexer("commit refs/heads/main\ncommitter <c> 0 +0000\ndata 0\nM 0100644 :1 a\n\n");
    next(&mut lexer);
    let warnings = lexer.take_warnings();
    assert_eq!(warnings.len(), 1);
    assert!(matches!(
        warnings[0].kind,
        WarningKind::ZeroPaddedMode { .. }
    ));
}

#[rstest]
#[case("\n", ParseError::UnexpectedBlank)]
#[case("frobnicate\n", ParseError::UnsupportedCommand("frobnicate".into()))]
#[case("blob extra\n", ParseError::UnsupportedCommand("blob extra".into()))]
#[case("commit refs/heads/main\ndata 0\n", ParseError::ExpectedCommitter)]
#[case("blob\nmark :0\ndata 0\n", ParseError::ZeroMark)]
#[case("blob\nmark 1\ndata 0\n", ParseError::MarkMissingColon)]
#[case("blob\ndata +1\nx\n", ParseError::Integer(IntegerError::ForbiddenSign))]
#[case("blob\nmark :1\n", ParseError::ExpectedData)]
#[case("commit refs/heads/main\ncommitter <c> 0 +0000\ndata 10\nshort", ParseError::DataUnexpectedEof)]
#[case("commit refs/heads/main\ncommitter <c> 0 +0000\ndata <<EOF\nnever closed\n", ParseError::UnterminatedData("EOF".into()))]
#[case("ls \"path\"\n", ParseError::LsWithoutRoot)]
#[case("feature date-format=julian\n", ParseError::UnknownDateFormat("julian".into()))]
#[case("alias\nto :1\n", ParseError::ExpectedAliasMark)]
fn rejections(#[case] input: &str, #[case] expected: ParseError) {
    assert_eq!(parse_kind(input), expected);
}

#[test]
fn errors_carry_the_offending_line() {
    let mut lexer = lexer("checkpoint\n\n\n");
    let parsed = lexer.next_command().unwrap();
    assert!(parsed.trailing_lf);

    let err = lexer.next_command().unwrap_err();
    assert_eq!(err.parse_kind(), Some(&ParseError::UnexpectedBlank));
    let position = err.position().unwrap();
    assert_eq!(position.command, 2);
    assert_eq!(position.line, 3);
    assert_eq!(position.offset, 12);
}

#[test]
fn truncated_blob_fails_while_streaming() {
    let mut lexer = lexer("blob\ndata 10\nabc");
    next(&mut lexer);
    let err = lexer.next_command().unwrap_err();
    assert_eq!(err.parse_kind(), Some(&ParseError::DataUnexpectedEof));
}

fn read_in_pieces(lexer: &mut Lexer<&[u8]>, piece: usize) -> (Vec<u8>, usize) {
    let mut reader = lexer.data_reader().unwrap();
    let mut buf = vec![0u8; piece];
    let mut seen = Vec::new();
    let mut largest = 0;
    loop {
        let n = reader.read(&mut buf).unwrap();
        if n == 0 {
            return (seen, largest);
        }
        largest = largest.max(n);
        seen.extend_from_slice(&buf[..n]);
    }
}

#[test]
fn long_delimited_line_is_read_in_bounded_pieces() {
    let line = "x".repeat(100_000);
    let input = format!("blob\ndata <<EOF\n{line}\nEOF\n\nprogress after\n");
    let mut lexer = lexer(&input);
    next(&mut lexer);

    let (seen, largest) = read_in_pieces(&mut lexer, 16);

    assert_eq!(seen, format!("{line}\n").into_bytes());
    assert!(largest <= 16);
    assert!(lexer.finish_data().unwrap());
    assert_eq!(
        next(&mut lexer),
        Command::Progress(Progress::new("after".into()))
    );
}

#[rstest]
#[case("EOF", "EOFX\nEOF \nxEOF\nEOF\n", "EOFX\nEOF \nxEOF\n")]
#[case("EOF", "EO\nEOF", "EO\n")]
#[case("", "a\n\n", "a\n")]
fn delimiter_must_fill_the_whole_line(#[case] delim: &str, #[case] body: &str, #[case] expected: &str) {
    let input = format!("blob\ndata <<{delim}\n{body}");
    let mut lexer = lexer(&input);
    next(&mut lexer);

    let (seen, _) = read_in_pieces(&mut lexer, 3);

    assert_eq!(String::from_utf8(seen).unwrap(), expected);
}

#[rstest]
#[case("data 9\n123456789\n")]
#[case("data <<EOF\n12345\n6789\nEOF\n")]
fn inline_data_over_threshold_is_rejected(#[case] data: &str) {
    let input = format!("commit refs/heads/main\ncommitter <c> 0 +0000\ndata 0\nM 644 inline a\n{data}\n");
    let config = Config::default().with_big_data_threshold(8);
    let mut lexer = Lexer::with_config(input.as_bytes(), &config);

    let err = lexer.next_command().unwrap_err();

    assert_eq!(
        err.parse_kind(),
        Some(&ParseError::InlineDataTooLarge { limit: 8 })
    );
}

#[test]
fn inline_data_at_threshold_is_kept() {
    let input = "commit refs/heads/main\ncommitter <c> 0 +0000\ndata 0\nM 644 inline a\ndata 8\n12345678\n\n";
    let config = Config::default().with_big_data_threshold(8);
    let mut lexer = Lexer::with_config(input.as_bytes(), &config);

    let Command::Commit(commit) = next(&mut lexer) else {
        panic!("expected commit");
    };
    assert_eq!(commit.changes.len(), 1);
    assert!(lexer.take_warnings().is_empty());
}
