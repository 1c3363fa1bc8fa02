#[path = "common/mod.rs"]
mod common;

use combo_etl::{
    for_each_normalized_line, normalize_line, ChunkReader, ComboETL, Delimiter, LineParser, ParseFailure,
    ParseOutcome, PipelineError, PipelineOptions, Placement, Schema,
};
use common::*;
use std::fs;

fn parser(placement: Placement, delimiter: Delimiter) -> LineParser {
    LineParser::new(&Schema { placement, delimiter }).unwrap()
}

fn parsed(email: &str, poh: &str) -> ParseOutcome {
    ParseOutcome::Parsed { email: email.to_string(), poh: poh.to_string() }
}

/// Split placements break on the first delimiter only and trim both fields.
#[test]
fn split_placements_split_once() {
    let p = parser(Placement::EmailPoh, Delimiter::Char(':'));
    assert_eq!(p.parse("user@x.com:pw:with:colons"), parsed("user@x.com", "pw:with:colons"));
    assert_eq!(p.parse("user@x.com:"), parsed("user@x.com", ""));
    assert_eq!(p.parse("no-delimiter-here"), ParseOutcome::Failed(ParseFailure::DelimiterNotFound));

    let p = parser(Placement::EmailPoh, Delimiter::Char(' '));
    assert_eq!(p.parse("user@x.com   pw"), parsed("user@x.com", "pw"));

    let p = parser(Placement::PohEmail, Delimiter::Char(';'));
    assert_eq!(p.parse("secret ; user@x.com"), parsed("user@x.com", "secret"));
    assert_eq!(p.parse("a;b;user@x.com"), parsed("b;user@x.com", "a"));
}

/// The middle placement recovers only the email; poh is always empty.
#[test]
fn middle_placement_has_empty_poh() {
    let p = parser(Placement::UnknownEmailUnknown, Delimiter::Char(' '));
    assert_eq!(p.parse("foo bar@x.com baz qux"), parsed("bar@x.com", ""));
    assert_eq!(p.parse("id  bob@y.org 2020-01-01"), parsed("bob@y.org", ""));
    assert_eq!(p.parse("bob@y.org"), ParseOutcome::Failed(ParseFailure::NoEmailMatch));
    assert_eq!(p.parse("nothing to see"), ParseOutcome::Failed(ParseFailure::NoEmailMatch));

    for line in ["a b@c.de f", "x  y@z.io  w", "1 q@w.com 2 3"] {
        match p.parse(line) {
            ParseOutcome::Parsed { poh, .. } => assert_eq!(poh, ""),
            other => panic!("expected a record for {line:?}, got {other:?}"),
        }
    }
}

/// The email placement takes the line verbatim and never fails.
#[test]
fn email_only_placement_never_fails() {
    let p = parser(Placement::EmailOnly, Delimiter::NotApplicable);
    assert_eq!(p.parse("user@x.com"), parsed("user@x.com", ""));
    assert_eq!(p.parse("whatever: this is"), parsed("whatever: this is", ""));
    assert_eq!(p.parse(""), parsed("", ""));
}

#[test]
fn undetermined_placement_always_fails() {
    let p = parser(Placement::NotApplicable, Delimiter::NotApplicable);
    assert_eq!(p.parse("user@x.com:pw"), ParseOutcome::Failed(ParseFailure::UndeterminedPlacement));
    assert!(p.parse("").is_failed());
}

/// A delimited placement without a delimiter rejects every line instead of guessing.
#[test]
fn delimited_placement_without_delimiter_fails_every_line() {
    for placement in [Placement::EmailPoh, Placement::PohEmail, Placement::UnknownEmailUnknown] {
        let p = parser(placement, Delimiter::NotApplicable);
        assert_eq!(p.parse("user@x.com:pw"), ParseOutcome::Failed(ParseFailure::SchemaWithoutDelimiter));
    }
}

/// Truncation counts characters, not bytes, and trims after cutting.
#[test]
fn normalize_truncates_then_trims() {
    assert_eq!(normalize_line("ééé", 2), "éé");
    assert_eq!(normalize_line("  ab  ", 4), "ab");
    assert_eq!(normalize_line("ab", 10), "ab");
    assert_eq!(normalize_line("user@example.com:secretpassword", 20), "user@example.com:sec");

    let p = parser(Placement::EmailPoh, Delimiter::Char(':'));
    let line = "user@example.com:secretpassword";
    assert_eq!(p.parse(normalize_line(line, 20)), parsed("user@example.com", "sec"));
    assert_eq!(p.parse(normalize_line(line, 16)), ParseOutcome::Failed(ParseFailure::DelimiterNotFound));
}

/// A clean chunk comes back as exactly one record per line, in order, and an empty
/// error list.
#[test]
fn clean_chunk_round_trips() {
    let tmp = tempfile::tempdir().unwrap();
    let input = tmp.path().join("input");
    let logs = tmp.path().join("logs");
    let out = tmp.path().join("parsed");

    let lines: Vec<String> = (0..50).map(|i| format!("user{i}@x.com:secret{i}")).collect();
    let refs: Vec<&str> = lines.iter().map(|s| s.as_str()).collect();
    write_gz_lines(&input.join("0007.txt.gz"), &refs);

    let etl = ComboETL::new().progress(false);
    etl.detect_schema(&input, &logs).unwrap();
    let stats = etl.parse(&input, &logs, &out).unwrap();

    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].chunk, "0007");
    assert_eq!((stats[0].lines, stats[0].records, stats[0].errors), (50, 50, 0));

    let records = read_lines(&out.join("0007").join("records.tsv"));
    assert_eq!(records.len(), 50);
    for (i, row) in records.iter().enumerate() {
        assert_eq!(row, &format!("user{i}@x.com\tsecret{i}"));
    }
    assert!(read_lines(&out.join("0007").join("error_indices.txt")).is_empty());
}

/// Every line lands in exactly one of the two artifacts.
#[test]
fn records_plus_errors_equal_lines() {
    let tmp = tempfile::tempdir().unwrap();
    let input = tmp.path().join("input");
    let logs = tmp.path().join("logs");
    let out = tmp.path().join("parsed");
    write_gz_lines(
        &input.join("0001.txt.gz"),
        &["a@x.com:p1", "garbage", "b@x.com:p2", "", "  c@x.com:p3  "],
    );

    let etl = ComboETL::new().progress(false);
    let artifacts = etl.detect_schema(&input, &logs).unwrap();
    assert_eq!(artifacts[0].schema, Schema { placement: Placement::EmailPoh, delimiter: Delimiter::Char(':') });

    let stats = etl.parse(&input, &logs, &out).unwrap();
    assert_eq!(stats[0].records + stats[0].errors, stats[0].lines);

    let records = read_lines(&out.join("0001").join("records.tsv"));
    assert_eq!(records, vec!["a@x.com\tp1", "b@x.com\tp2", "c@x.com\tp3"]);
    let errors = read_lines(&out.join("0001").join("error_indices.txt"));
    assert_eq!(errors, vec!["1", "3"]);
}

/// Invalid UTF-8 is replaced, not fatal; CRLF endings are stripped.
#[test]
fn lossy_decoding_and_crlf() {
    let tmp = tempfile::tempdir().unwrap();
    let input = tmp.path().join("input");
    let logs = tmp.path().join("logs");
    let out = tmp.path().join("parsed");
    write_raw(&input.join("0001.txt"), b"a@x.com:p\xffw\r\nb@x.com:pw2\r\n");

    let etl = ComboETL::new().progress(false);
    etl.detect_schema(&input, &logs).unwrap();
    etl.parse(&input, &logs, &out).unwrap();

    let records = read_lines(&out.join("0001").join("records.tsv"));
    assert_eq!(records, vec!["a@x.com\tp\u{FFFD}w", "b@x.com\tpw2"]);
}

/// The parser honors whatever the artifact says, including a hand-edited one.
#[test]
fn parse_uses_artifact_schema() {
    let tmp = tempfile::tempdir().unwrap();
    let input = tmp.path().join("input");
    let logs = tmp.path().join("logs");
    let out = tmp.path().join("parsed");
    write_gz_lines(&input.join("0001.txt.gz"), &["pw|a@x.com", "pw|b@x.com"]);
    fs::create_dir_all(&logs).unwrap();
    fs::write(
        logs.join("0001.txt.json"),
        r#"{"filename":"0001.txt.gz","schema":{"placement":"n/a","delimiter":"n/a"}}"#,
    )
    .unwrap();

    let stats = ComboETL::new().progress(false).parse(&input, &logs, &out).unwrap();
    assert_eq!((stats[0].records, stats[0].errors), (0, 2));
    assert_eq!(read_lines(&out.join("0001").join("error_indices.txt")), vec!["0", "1"]);
}

/// Parsing without a schema artifact is fatal for the run.
#[test]
fn missing_schema_is_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    let input = tmp.path().join("input");
    let logs = tmp.path().join("logs");
    let out = tmp.path().join("parsed");
    write_gz_lines(&input.join("0001.txt.gz"), &["a@x.com:pw"]);
    fs::create_dir_all(&logs).unwrap();

    let err = ComboETL::new().progress(false).parse(&input, &logs, &out).unwrap_err();
    assert!(
        matches!(err.downcast_ref::<PipelineError>(), Some(PipelineError::MissingSchema { .. })),
        "unexpected error: {err:#}"
    );
    assert!(!out.join("0001").join("records.tsv").exists());
}

/// An unsupported container stops the run; chunks sorted before it keep their output.
#[test]
fn unsupported_format_is_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    let input = tmp.path().join("input");
    let logs = tmp.path().join("logs");
    write_gz_lines(&input.join("0000.txt.gz"), &["a@x.com:pw"]);
    write_raw(&input.join("0001.txt.bz2"), b"not really bzip2");

    let err = ComboETL::new().progress(false).detect_schema(&input, &logs).unwrap_err();
    assert!(
        matches!(err.downcast_ref::<PipelineError>(), Some(PipelineError::UnsupportedFormat { .. })),
        "unexpected error: {err:#}"
    );
    assert!(logs.join("0000.txt.json").is_file());
    assert!(!logs.join("0001.txt.json").exists());
}

/// Re-running a stage replaces its artifacts with identical content.
#[test]
fn rerun_is_idempotent() {
    let tmp = tempfile::tempdir().unwrap();
    let input = tmp.path().join("input");
    let logs = tmp.path().join("logs");
    let out = tmp.path().join("parsed");
    write_zst_lines(&input.join("0001.txt.zst"), &["pw;a@x.com", "junk", "pw2;b@x.com"]);

    let etl = ComboETL::new().progress(false);
    etl.detect_schema(&input, &logs).unwrap();
    etl.parse(&input, &logs, &out).unwrap();
    let first = read_lines(&out.join("0001").join("records.tsv"));

    etl.detect_schema(&input, &logs).unwrap();
    etl.parse(&input, &logs, &out).unwrap();
    let second = read_lines(&out.join("0001").join("records.tsv"));

    assert_eq!(first, vec!["a@x.com\tpw", "b@x.com\tpw2"]);
    assert_eq!(first, second);
    assert_eq!(read_lines(&out.join("0001").join("error_indices.txt")), vec!["1"]);
}

/// Split placements never emit a record with an empty email; the email placement
/// still takes blank lines verbatim.
#[test]
fn empty_email_side_is_a_failure() {
    let p = parser(Placement::EmailPoh, Delimiter::Char(':'));
    assert_eq!(p.parse(":pw"), ParseOutcome::Failed(ParseFailure::EmptyEmail));
    assert_eq!(p.parse("  :pw"), ParseOutcome::Failed(ParseFailure::EmptyEmail));

    let p = parser(Placement::PohEmail, Delimiter::Char('|'));
    assert_eq!(p.parse("pw|"), ParseOutcome::Failed(ParseFailure::EmptyEmail));
    assert_eq!(p.parse("pw| "), ParseOutcome::Failed(ParseFailure::EmptyEmail));
    assert_eq!(p.parse("|a@x.com"), parsed("a@x.com", ""));

    let p = parser(Placement::EmailOnly, Delimiter::NotApplicable);
    assert!(!p.parse("").is_failed());
}

/// A `\tpw` row never reaches records.tsv; the line is counted as an error instead.
#[test]
fn empty_email_lines_land_in_error_indices() {
    let tmp = tempfile::tempdir().unwrap();
    let input = tmp.path().join("input");
    let logs = tmp.path().join("logs");
    let out = tmp.path().join("parsed");
    write_gz_lines(&input.join("0001.txt.gz"), &["a@x.com:p1", ":orphan", "b@x.com:p2"]);

    let etl = ComboETL::new().progress(false);
    etl.detect_schema(&input, &logs).unwrap();
    let stats = etl.parse(&input, &logs, &out).unwrap();
    assert_eq!((stats[0].records, stats[0].errors), (2, 1));
    assert_eq!(read_lines(&out.join("0001").join("records.tsv")), vec!["a@x.com\tp1", "b@x.com\tp2"]);
    assert_eq!(read_lines(&out.join("0001").join("error_indices.txt")), vec!["1"]);
}

/// An artifact written for another file is refused rather than applied.
#[test]
fn schema_for_another_chunk_is_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    let input = tmp.path().join("input");
    let logs = tmp.path().join("logs");
    let out = tmp.path().join("parsed");
    write_gz_lines(&input.join("0001.txt.gz"), &["a@x.com:p1"]);
    fs::create_dir_all(&logs).unwrap();
    fs::write(
        logs.join("0001.txt.json"),
        r#"{"filename":"0001.txt.zst","schema":{"placement":"poh:email","delimiter":"|"}}"#,
    )
    .unwrap();

    let err = ComboETL::new().progress(false).parse(&input, &logs, &out).unwrap_err();
    match err.downcast_ref::<PipelineError>() {
        Some(PipelineError::SchemaMismatch { chunk, found, .. }) => {
            assert_eq!(chunk, "0001.txt.gz");
            assert_eq!(found, "0001.txt.zst");
        }
        _ => panic!("unexpected error: {err:#}"),
    }
    assert!(!out.join("0001").join("records.tsv").exists());
}

/// Two containers of the same chunk would share artifacts and output directories,
/// so both core stages refuse the directory before writing anything.
#[test]
fn duplicate_chunk_ids_are_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let input = tmp.path().join("input");
    let logs = tmp.path().join("logs");
    let out = tmp.path().join("parsed");
    write_gz_lines(&input.join("0001.txt.gz"), &["a@x.com:p1", "b@x.com:p2"]);
    write_zst_lines(&input.join("0001.txt.zst"), &["q1|c@x.com", "q2|d@x.com"]);

    let etl = ComboETL::new().progress(false);
    let err = etl.detect_schema(&input, &logs).unwrap_err();
    match err.downcast_ref::<PipelineError>() {
        Some(PipelineError::DuplicateChunkId { id, first, second }) => {
            assert_eq!(id, "0001");
            assert_eq!(first, "0001.txt.gz");
            assert_eq!(second, "0001.txt.zst");
        }
        _ => panic!("unexpected error: {err:#}"),
    }
    assert!(!logs.join("0001.txt.json").exists());

    // a range that selects only one of them is refused too
    let err = etl.clone().index_range(Some(0), Some(1)).parse(&input, &logs, &out).unwrap_err();
    assert!(matches!(err.downcast_ref::<PipelineError>(), Some(PipelineError::DuplicateChunkId { .. })));
    assert!(!out.join("0001").exists());
}

/// `\n`, `\r\n` and a lone `\r` all end a line, so no CR leaks into a row.
#[test]
fn every_newline_convention_ends_a_line() {
    let tmp = tempfile::tempdir().unwrap();
    let input = tmp.path().join("input");
    let logs = tmp.path().join("logs");
    let out = tmp.path().join("parsed");
    write_raw(&input.join("0001.txt"), b"a@x.com:p1\rb@x.com:p2\r\nc@x.com:p3\nd@x.com:p4\r");

    let etl = ComboETL::new().progress(false);
    etl.detect_schema(&input, &logs).unwrap();
    let stats = etl.parse(&input, &logs, &out).unwrap();
    assert_eq!((stats[0].lines, stats[0].errors), (4, 0));
    assert_eq!(
        read_lines(&out.join("0001").join("records.tsv")),
        vec!["a@x.com\tp1", "b@x.com\tp2", "c@x.com\tp3", "d@x.com\tp4"]
    );
}

/// A `\r\n` pair straddling two buffer fills is still one terminator.
#[test]
fn crlf_across_buffer_boundary() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("0001.txt");
    let long = "x".repeat(8 * 1024 - 1);
    write_raw(&path, format!("{long}\r\nnext\r\n").as_bytes());

    let mut rdr = ChunkReader::open(&path, 8 * 1024).unwrap();
    let mut buf = String::new();
    let mut lines = Vec::new();
    while rdr.read_line(&mut buf).unwrap() > 0 {
        lines.push(buf.clone());
    }
    assert_eq!(lines, vec![long, "next".to_string()]);
}

/// With a character cap only a bounded prefix of each line is kept, and reading
/// resumes cleanly at the next line.
#[test]
fn huge_line_is_capped_while_reading() {
    let tmp = tempfile::tempdir().unwrap();
    let input = tmp.path().join("input");
    let logs = tmp.path().join("logs");
    let out = tmp.path().join("parsed");
    let huge = format!("user@example.com:{}", "p".repeat(1_000_000));
    write_raw(&input.join("0001.txt"), format!("{huge}\nb@x.com:pw\n").as_bytes());

    let mut rdr = ChunkReader::open(&input.join("0001.txt"), 8 * 1024).unwrap().with_char_cap(20);
    let mut buf = String::new();
    rdr.read_line(&mut buf).unwrap();
    assert!(buf.len() <= 80, "kept {} bytes", buf.len());
    assert!(buf.starts_with("user@example.com:ppp"));
    rdr.read_line(&mut buf).unwrap();
    assert_eq!(buf, "b@x.com:pw");

    let etl = ComboETL::new().progress(false).max_line_length(20);
    etl.detect_schema(&input, &logs).unwrap();
    etl.parse(&input, &logs, &out).unwrap();
    assert_eq!(read_lines(&out.join("0001").join("records.tsv")), vec!["user@example.com\tppp", "b@x.com\tpw"]);
}

/// Multi-byte characters survive the byte cap intact up to the character cap.
#[test]
fn byte_cap_keeps_whole_characters() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("0001.txt");
    write_raw(&path, format!("{}\n", "😀é".repeat(50)).as_bytes());

    let mut seen = Vec::new();
    for_each_normalized_line(&path, 8 * 1024, 7, |_, line| {
        seen.push(line.to_string());
        Ok(())
    })
    .unwrap();
    assert_eq!(seen, vec!["😀é😀é😀é😀".to_string()]);
}

/// Builder settings reach the options the stages run with.
#[test]
fn builder_settings_are_applied() {
    let tmp = tempfile::tempdir().unwrap();
    let input = tmp.path().join("input");
    let logs = tmp.path().join("logs");
    let out = tmp.path().join("parsed");
    write_gz_lines(&input.join("0001.txt.gz"), &["a@x.com:p1", "b@x.com:p2"]);

    let etl = ComboETL::new().progress(false).progress_label("nightly").io_buffers(1024, 64 * 1024);
    assert_eq!(etl.options().read_buffer_bytes, 8 * 1024);
    assert_eq!(etl.options().write_buffer_bytes, 64 * 1024);
    assert_eq!(etl.options().progress_label.as_deref(), Some("nightly"));
    etl.detect_schema(&input, &logs).unwrap();
    assert_eq!(etl.parse(&input, &logs, &out).unwrap()[0].records, 2);

    let bad = ComboETL::with_options(PipelineOptions::default().with_progress(false).with_max_line_length(0));
    let err = bad.detect_schema(&input, &logs).unwrap_err();
    assert!(matches!(err.downcast_ref::<PipelineError>(), Some(PipelineError::InvalidConfig(_))));
}
