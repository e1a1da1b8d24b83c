use colored::Colorize;
use similar::{ChangeTag, TextDiff};

/// Unchanged lines shown around each hunk
pub const CONTEXT_LINES: usize = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffStats {
    pub added: usize,
    pub removed: usize,
}

impl DiffStats {
    pub fn is_unchanged(&self) -> bool {
        self.added == 0 && self.removed == 0
    }
}

/// Line-based unified diff from `old_text` to `new_text`.
///
/// Returns an empty string when both texts are identical. With `with_color`, added lines
/// are green and removed lines red; the `---`/`+++` headers stay plain.
pub fn generate_diff(old_text: &str, new_text: &str, with_color: bool) -> String {
    let diff = TextDiff::from_lines(old_text, new_text);
    let unified = diff
        .unified_diff()
        .context_radius(CONTEXT_LINES)
        .header("previous", "latest")
        .to_string();

    if !with_color {
        return unified;
    }

    let mut colored_diff = String::with_capacity(unified.len());
    for line in unified.lines() {
        if line.starts_with('+') && !line.starts_with("+++") {
            colored_diff.push_str(&line.green().to_string());
        } else if line.starts_with('-') && !line.starts_with("---") {
            colored_diff.push_str(&line.red().to_string());
        } else {
            colored_diff.push_str(line);
        }
        colored_diff.push('\n');
    }
    colored_diff
}

pub fn diff_stats(old_text: &str, new_text: &str) -> DiffStats {
    let diff = TextDiff::from_lines(old_text, new_text);
    let mut stats = DiffStats::default();
    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Insert => stats.added += 1,
            ChangeTag::Delete => stats.removed += 1,
            ChangeTag::Equal => {}
        }
    }
    stats
}
