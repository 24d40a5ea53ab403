//! Integration tests for fix application
//!
//! Drives `apply_fixes` against real files in a temp directory, covering
//! drift tracking across several fixes in one file.

use fixbase::{apply_fixes, AutofixError, FixRegex, Position, RuleMatch, RuleMatchMap};
use proptest::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

fn matched(rule: &str, path: &Path, start: (usize, usize), end: (usize, usize)) -> RuleMatch {
    RuleMatch::new(
        rule,
        path,
        Position::new(start.0, start.1),
        Position::new(end.0, end.1),
    )
}

#[test]
fn test_two_fixes_in_one_file() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "a.txt", "foo bar\nbaz foo\n");

    let map: RuleMatchMap = vec![
        matched("use-qux", &path, (1, 1), (1, 4)).with_fix("qux"),
        matched("use-qux", &path, (2, 5), (2, 8)).with_fix("qux"),
    ]
    .into_iter()
    .collect();

    let report = apply_fixes(&map, false).unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "qux bar\nbaz qux\n");
    assert_eq!(report.modified_count(), 1);
    assert!(report.modified_files.contains(&path));
    assert!(report.previews.is_empty());
}

#[test]
fn test_same_line_fixes_track_column_drift() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "a.txt", "foo foo foo\n");

    let map: RuleMatchMap = vec![
        matched("grow", &path, (1, 1), (1, 4)).with_fix("quux"),
        matched("grow", &path, (1, 5), (1, 8)).with_fix("quux"),
        matched("grow", &path, (1, 9), (1, 12)).with_fix("q"),
    ]
    .into_iter()
    .collect();

    apply_fixes(&map, false).unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "quux quux q\n");
}

#[test]
fn test_inserted_lines_shift_later_matches() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "a.txt", "alpha\nbeta\ngamma\n");

    let map: RuleMatchMap = vec![
        matched("split", &path, (1, 1), (1, 6)).with_fix("al\npha"),
        matched("rename", &path, (3, 1), (3, 6)).with_fix("GAMMA"),
    ]
    .into_iter()
    .collect();

    apply_fixes(&map, false).unwrap();

    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "al\npha\nbeta\nGAMMA\n"
    );
}

#[test]
fn test_removed_lines_shift_later_matches() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "a.rs", "let a = 1;\ndbg!(a);\nlet b = 2;\nlet c = 3;\n");

    let map: RuleMatchMap = vec![
        matched("join", &path, (1, 11), (2, 9)).with_fix(" // joined"),
        matched("rename", &path, (4, 5), (4, 6)).with_fix("d"),
    ]
    .into_iter()
    .collect();

    apply_fixes(&map, false).unwrap();

    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "let a = 1; // joined\nlet b = 2;\nlet d = 3;\n"
    );
}

#[test]
fn test_fix_that_empties_a_line_removes_it() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "a.txt", "keep\ndrop me\nkeep too\nlast\n");

    let map: RuleMatchMap = vec![
        matched("drop", &path, (2, 1), (2, 8))
            .with_fix_regex(FixRegex::new(r"drop me()", r"\1")),
        matched("rename", &path, (4, 1), (4, 5)).with_fix("LAST"),
    ]
    .into_iter()
    .collect();

    apply_fixes(&map, false).unwrap();

    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "keep\nkeep too\nLAST\n"
    );
}

#[test]
fn test_empty_replacement_is_config_error() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "a.txt", "keep\ndrop me\n");

    let map: RuleMatchMap =
        vec![matched("drop", &path, (2, 1), (2, 8)).with_fix_regex(FixRegex::new(".*", ""))]
            .into_iter()
            .collect();

    assert!(matches!(
        apply_fixes(&map, false),
        Err(AutofixError::MissingRegexFields { .. })
    ));
    assert_eq!(fs::read_to_string(&path).unwrap(), "keep\ndrop me\n");
}

#[test]
fn test_regex_count_limits_replacements() {
    let dir = TempDir::new().unwrap();
    let once = write_file(&dir, "once.txt", "a a a\n");
    let all = write_file(&dir, "all.txt", "a a a\n");
    let unbounded = write_file(&dir, "unbounded.txt", "a a a\n");

    let map: RuleMatchMap = vec![
        matched("once", &once, (1, 1), (1, 6)).with_fix_regex(FixRegex::new("a", "b").with_count(1)),
        matched("all", &all, (1, 1), (1, 6)).with_fix_regex(FixRegex::new("a", "b").with_count(0)),
        matched("unbounded", &unbounded, (1, 1), (1, 6)).with_fix_regex(FixRegex::new("a", "b")),
    ]
    .into_iter()
    .collect();

    let report = apply_fixes(&map, false).unwrap();

    assert_eq!(report.modified_count(), 3);
    assert_eq!(fs::read_to_string(&once).unwrap(), "b a a\n");
    assert_eq!(fs::read_to_string(&all).unwrap(), "b b b\n");
    assert_eq!(fs::read_to_string(&unbounded).unwrap(), "b b b\n");
}

#[test]
fn test_regex_only_touches_spanned_lines() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "a.py", "x = 1\nx = 2\nx = 3\n");

    let map: RuleMatchMap = vec![matched("rename", &path, (2, 1), (2, 6))
        .with_fix_regex(FixRegex::new(r"x = (\d)", r"y = \1"))]
    .into_iter()
    .collect();

    apply_fixes(&map, false).unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "x = 1\ny = 2\nx = 3\n");
}

#[test]
fn test_literal_fix_wins_over_regex() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "a.txt", "old\n");

    let map: RuleMatchMap = vec![matched("both", &path, (1, 1), (1, 4))
        .with_fix("literal")
        .with_fix_regex(FixRegex::new("old", "regex"))]
    .into_iter()
    .collect();

    apply_fixes(&map, false).unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "literal\n");
}

#[test]
fn test_dry_run_leaves_files_untouched() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "a.txt", "foo bar\nbaz foo\n");

    let map: RuleMatchMap = vec![
        matched("use-qux", &path, (1, 1), (1, 4)).with_fix("qux"),
        matched("use-qux", &path, (2, 5), (2, 8)).with_fix("qux"),
    ]
    .into_iter()
    .collect();

    let report = apply_fixes(&map, true).unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "foo bar\nbaz foo\n");
    assert_eq!(report.modified_count(), 0);
    assert_eq!(report.previews.len(), 2);
    assert_eq!(report.previews[0].fixed_lines, vec!["qux bar".to_string()]);
    assert_eq!(report.previews[1].fixed_lines, vec!["baz qux".to_string()]);
    assert_eq!(report.previews[1].start_line, 2);
}

#[test]
fn test_matches_without_fixes_are_skipped() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "a.txt", "foo\n");

    let map: RuleMatchMap = vec![
        matched("no-fix", &path, (1, 1), (1, 4)),
        matched("blank-fix", &path, (1, 1), (1, 4)).with_fix("   "),
    ]
    .into_iter()
    .collect();

    let report = apply_fixes(&map, false).unwrap();

    assert_eq!(report.modified_count(), 0);
    assert_eq!(fs::read_to_string(&path).unwrap(), "foo\n");
}

#[test]
fn test_invalid_regex_names_file_and_pattern() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "a.txt", "foo\n");

    let map: RuleMatchMap = vec![matched("bad", &path, (1, 1), (1, 4))
        .with_fix_regex(FixRegex::new("(unclosed", "x"))]
    .into_iter()
    .collect();

    match apply_fixes(&map, false) {
        Err(AutofixError::RegexModify {
            path: failed,
            pattern,
            ..
        }) => {
            assert_eq!(failed, path);
            assert_eq!(pattern, "(unclosed");
        }
        other => panic!("expected RegexModify, got {:?}", other),
    }
}

#[test]
fn test_missing_file_is_modify_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("gone.txt");

    let map: RuleMatchMap = vec![matched("r", &path, (1, 1), (1, 2)).with_fix("x")]
        .into_iter()
        .collect();

    assert!(matches!(
        apply_fixes(&map, false),
        Err(AutofixError::Modify { .. })
    ));
}

#[test]
fn test_fixes_from_results_document() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "app.py", "import os\nprint(os.name)\n");

    let json = r#"{
      "results": [
        {
          "check_id": "prefer-pathlib",
          "path": "app.py",
          "start": {"line": 2, "col": 7, "offset": 16},
          "end": {"line": 2, "col": 14, "offset": 23},
          "extra": {"message": "use platform", "fix": "platform.system()\n"}
        }
      ]
    }"#;
    let mut map = RuleMatchMap::from_json(json).unwrap();
    map.rebase(dir.path());

    apply_fixes(&map, false).unwrap();

    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "import os\nprint(platform.system())\n"
    );
}

/// Apply single-line fixes one at a time, each against a file holding
/// only that fix, reading every position from the untouched original.
fn apply_independently(original: &str, fixes: &[(usize, usize, usize, String)]) -> String {
    let mut lines: Vec<String> = original.split('\n').map(str::to_string).collect();
    // Rightmost first so original columns stay valid.
    let mut ordered: Vec<_> = fixes.iter().collect();
    ordered.sort_by(|a, b| (b.0, b.1).cmp(&(a.0, a.1)));
    for (line, start, end, fix) in ordered {
        let chars: Vec<char> = lines[*line].chars().collect();
        let prefix: String = chars[..*start].iter().collect();
        let suffix: String = chars[*end..].iter().collect();
        lines[*line] = format!("{prefix}{fix}{suffix}");
    }
    lines.join("\n")
}

proptest! {
    #[test]
    fn prop_sequential_fixes_match_independent_application(
        words in prop::collection::vec("[a-z]{1,6}", 2..6),
        line_count in 1usize..4,
        replacements in prop::collection::vec("[A-Z]{1,8}", 12),
    ) {
        let dir = TempDir::new().unwrap();
        let line = words.join(" ");
        let original = format!("{}\n", vec![line.clone(); line_count].join("\n"));
        let path = write_file(&dir, "p.txt", &original);

        // One fix per word, left to right, on every line.
        let mut fixes = Vec::new();
        let mut matches = Vec::new();
        let mut next = 0;
        for row in 0..line_count {
            let mut col = 0;
            for word in &words {
                let fix = replacements[next % replacements.len()].clone();
                next += 1;
                let end = col + word.len();
                matches.push(
                    matched("w", &path, (row + 1, col + 1), (row + 1, end + 1)).with_fix(fix.clone()),
                );
                fixes.push((row, col, end, fix));
                col = end + 1;
            }
        }
        let map: RuleMatchMap = matches.into_iter().collect();

        apply_fixes(&map, false).unwrap();

        prop_assert_eq!(
            fs::read_to_string(&path).unwrap(),
            apply_independently(&original, &fixes)
        );
    }
}
