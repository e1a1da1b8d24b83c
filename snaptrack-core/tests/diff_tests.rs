// Tests for the diff stage

use snaptrack_core::diff::{DiffStats, diff_stats, generate_diff};

fn changed_lines(diff: &str) -> (Vec<&str>, Vec<&str>) {
    let added = diff
        .lines()
        .filter(|l| l.starts_with('+') && !l.starts_with("+++"))
        .collect();
    let removed = diff
        .lines()
        .filter(|l| l.starts_with('-') && !l.starts_with("---"))
        .collect();
    (added, removed)
}

#[test]
fn test_identical_text_has_no_changes() {
    let text = "<html>\n<body>\n<p>Hello</p>\n</body>\n</html>\n";

    let diff = generate_diff(text, text, false);
    let (added, removed) = changed_lines(&diff);

    assert!(added.is_empty());
    assert!(removed.is_empty());
    assert!(diff_stats(text, text).is_unchanged());
}

#[test]
fn test_disjoint_text_removes_all_old_and_adds_all_new() {
    let old = "alpha\nbeta\ngamma\n";
    let new = "one\ntwo\n";

    let diff = generate_diff(old, new, false);
    let (added, removed) = changed_lines(&diff);

    assert_eq!(removed, vec!["-alpha", "-beta", "-gamma"]);
    assert_eq!(added, vec!["+one", "+two"]);
    assert_eq!(diff_stats(old, new), DiffStats { added: 2, removed: 3 });
}

#[test]
fn test_single_line_change_keeps_context() {
    let old = "a\nb\nc\nd\ne\n";
    let new = "a\nb\nC\nd\ne\n";

    let diff = generate_diff(old, new, false);

    assert!(diff.starts_with("--- previous\n+++ latest\n"));
    assert!(diff.contains("@@"));
    assert!(diff.contains("\n-c\n"));
    assert!(diff.contains("\n+C\n"));
    assert!(diff.contains("\n a\n"));
    assert_eq!(diff_stats(old, new), DiffStats { added: 1, removed: 1 });
}

#[test]
fn test_colored_diff_marks_lines() {
    colored::control::set_override(true);

    let diff = generate_diff("old line\n", "new line\n", true);

    assert!(diff.contains("\u{1b}[32m+new line"));
    assert!(diff.contains("\u{1b}[31m-old line"));
    assert!(diff.contains("--- previous\n"));

    colored::control::unset_override();
}
