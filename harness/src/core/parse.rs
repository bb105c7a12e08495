//! Splits an act response into `FILE:` blocks.

use crate::core::types::FileEdit;

/// Line prefix that opens a new file block.
pub const FILE_MARKER: &str = "FILE:";

/// Parse `FILE: <path>` blocks out of `response`, in order of appearance.
///
/// Only the leading marker is stripped: a later `FILE:` inside the line stays
/// part of the path. Lines before the first marker are dropped. Each block's
/// content is its lines joined with `\n`, with trailing whitespace trimmed.
/// Returns an empty vector when no marker is present; callers must treat that
/// as an error.
pub fn parse_file_edits(response: &str) -> Vec<FileEdit> {
    let mut edits = Vec::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for line in response.lines() {
        if let Some(rest) = line.strip_prefix(FILE_MARKER) {
            if let Some((path, lines)) = current.take() {
                edits.push(finish(path, &lines));
            }
            current = Some((rest.trim().to_string(), Vec::new()));
        } else if let Some((_, lines)) = current.as_mut() {
            lines.push(line);
        }
    }

    if let Some((path, lines)) = current {
        edits.push(finish(path, &lines));
    }
    edits
}

fn finish(path: String, lines: &[&str]) -> FileEdit {
    let content = lines.join("\n").trim_end().to_string();
    FileEdit { path, content }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_blocks_in_order() {
        let edits = parse_file_edits("FILE: a.txt\nhello\nFILE: b/b.txt\nworld\nline2");
        assert_eq!(
            edits,
            vec![
                FileEdit::new("a.txt", "hello"),
                FileEdit::new("b/b.txt", "world\nline2"),
            ]
        );
    }

    #[test]
    fn no_marker_yields_no_edits() {
        assert!(parse_file_edits("Sure! Here is what I would change.\n").is_empty());
        assert!(parse_file_edits("").is_empty());
    }

    #[test]
    fn preamble_before_first_marker_is_discarded() {
        let edits = parse_file_edits("Here you go:\n\nFILE: docker/Dockerfile\nFROM python:3.11\n");
        assert_eq!(
            edits,
            vec![FileEdit::new("docker/Dockerfile", "FROM python:3.11")]
        );
    }

    #[test]
    fn trims_path_and_trailing_content_whitespace() {
        let edits = parse_file_edits("FILE:   README.md  \n# Title\n\n  body  \n\n\n");
        assert_eq!(edits, vec![FileEdit::new("README.md", "# Title\n\n  body")]);
    }

    #[test]
    fn keeps_leading_blank_lines_and_indentation() {
        let edits = parse_file_edits("FILE: x.py\n\n    pass");
        assert_eq!(edits, vec![FileEdit::new("x.py", "\n    pass")]);
    }

    #[test]
    fn repeated_paths_are_not_deduplicated() {
        let edits = parse_file_edits("FILE: a\none\nFILE: a\ntwo");
        assert_eq!(
            edits,
            vec![FileEdit::new("a", "one"), FileEdit::new("a", "two")]
        );
    }

    #[test]
    fn marker_must_start_the_line() {
        let edits = parse_file_edits("FILE: a\n  FILE: not-a-marker\nend");
        assert_eq!(edits, vec![FileEdit::new("a", "  FILE: not-a-marker\nend")]);
    }

    #[test]
    fn only_leading_marker_is_stripped_from_path() {
        let edits = parse_file_edits("FILE: a/FILE:b\nx");
        assert_eq!(edits, vec![FileEdit::new("a/FILE:b", "x")]);
    }

    #[test]
    fn empty_block_has_empty_content() {
        let edits = parse_file_edits("FILE: a\nFILE: b\nx");
        assert_eq!(edits, vec![FileEdit::new("a", ""), FileEdit::new("b", "x")]);
    }

    #[test]
    fn handles_crlf_line_endings() {
        let edits = parse_file_edits("FILE: a.txt\r\nhello\r\nworld\r\n");
        assert_eq!(edits, vec![FileEdit::new("a.txt", "hello\nworld")]);
    }
}
