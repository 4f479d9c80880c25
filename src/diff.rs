use crate::colors;
use colored::Colorize;
use similar::{ChangeTag, TextDiff};

/// Context lines shown around each change when rendering
const CONTEXT_LINES: usize = 3;

/// A unified diff between two versions of a file, kept line by line so it
/// can be rendered compactly for terminal previews.
#[derive(Debug, Clone)]
pub struct UnifiedDiff {
    pub file_path: String,
    lines: Vec<DiffLine>,
}

#[derive(Debug, Clone)]
struct DiffLine {
    old_line: Option<usize>,
    new_line: Option<usize>,
    tag: ChangeTag,
    content: String,
}

impl UnifiedDiff {
    /// Diff two texts line by line.
    pub fn from_texts(file_path: impl Into<String>, old_text: &str, new_text: &str) -> Self {
        let diff = TextDiff::from_lines(old_text, new_text);
        let mut lines = Vec::new();
        let (mut old_line, mut new_line) = (1, 1);

        for change in diff.iter_all_changes() {
            let (old_num, new_num) = match change.tag() {
                ChangeTag::Equal => {
                    let nums = (Some(old_line), Some(new_line));
                    old_line += 1;
                    new_line += 1;
                    nums
                }
                ChangeTag::Insert => {
                    let nums = (None, Some(new_line));
                    new_line += 1;
                    nums
                }
                ChangeTag::Delete => {
                    let nums = (Some(old_line), None);
                    old_line += 1;
                    nums
                }
            };

            lines.push(DiffLine {
                old_line: old_num,
                new_line: new_num,
                tag: change.tag(),
                content: change.value().trim_end_matches('\n').to_string(),
            });
        }

        UnifiedDiff {
            file_path: file_path.into(),
            lines,
        }
    }

    /// Counts as "+a, -d".
    pub fn summary(&self) -> String {
        let additions = self
            .lines
            .iter()
            .filter(|l| l.tag == ChangeTag::Insert)
            .count();
        let deletions = self
            .lines
            .iter()
            .filter(|l| l.tag == ChangeTag::Delete)
            .count();
        format!("+{}, -{}", additions, deletions)
    }

    pub fn has_changes(&self) -> bool {
        self.lines.iter().any(|l| l.tag != ChangeTag::Equal)
    }

    /// Render for the terminal, collapsing unchanged runs so large files
    /// stay readable. Colored +/- markers, line numbers on the left.
    pub fn render(&self) -> String {
        let mut keep = vec![false; self.lines.len()];
        for (idx, line) in self.lines.iter().enumerate() {
            if line.tag != ChangeTag::Equal {
                let from = idx.saturating_sub(CONTEXT_LINES);
                let to = (idx + CONTEXT_LINES + 1).min(self.lines.len());
                for flag in keep.iter_mut().take(to).skip(from) {
                    *flag = true;
                }
            }
        }

        let mut out = String::new();
        out.push_str(
            &format!("--- {} ({})\n", self.file_path, self.summary())
                .truecolor(colors::OVERLAY0.0, colors::OVERLAY0.1, colors::OVERLAY0.2)
                .to_string(),
        );

        let mut last_kept = true;
        for (idx, line) in self.lines.iter().enumerate() {
            if !keep[idx] {
                if last_kept {
                    out.push_str(
                        &"  ...\n"
                            .truecolor(colors::OVERLAY0.0, colors::OVERLAY0.1, colors::OVERLAY0.2)
                            .to_string(),
                    );
                }
                last_kept = false;
                continue;
            }
            last_kept = true;

            let number = line
                .new_line
                .or(line.old_line)
                .map(|n| format!("{:>4}", n))
                .unwrap_or_else(|| "    ".to_string());

            let rendered = match line.tag {
                ChangeTag::Insert => format!("{} + {}\n", number, line.content)
                    .truecolor(colors::GREEN.0, colors::GREEN.1, colors::GREEN.2)
                    .to_string(),
                ChangeTag::Delete => format!("{} - {}\n", number, line.content)
                    .truecolor(colors::RED.0, colors::RED.1, colors::RED.2)
                    .to_string(),
                ChangeTag::Equal => format!("{}   {}\n", number, line.content)
                    .truecolor(colors::TEXT.0, colors::TEXT.1, colors::TEXT.2)
                    .to_string(),
            };
            out.push_str(&rendered);
        }

        out
    }
}
