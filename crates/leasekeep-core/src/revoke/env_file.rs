//! Blanking a variable inside an environment file
//!
//! The edit is line based. A matching line keeps its indentation, any
//! `export` prefix, the key, the spacing before `=` and any trailing
//! comment; only the value goes. Every other line is copied byte for byte,
//! line endings included.

use std::fs;
use std::io;
use std::path::Path;

use super::traits::{RevokeError, RevokeResult};
use crate::fs_atomic::atomic_rewrite;

/// Blank `variable` in the env file at `path`.
///
/// Returns whether the file changed. A missing file has nothing left to
/// revoke and returns `Ok(false)`.
pub fn blank_variable(path: &Path, variable: &str) -> RevokeResult<bool> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(RevokeError::io(path, e)),
    };

    match blank_variable_in(&content, variable) {
        Some(updated) => {
            atomic_rewrite(path, updated.as_bytes()).map_err(|e| RevokeError::io(path, e))?;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Pure form of [`blank_variable`]: `None` when nothing needed changing.
pub fn blank_variable_in(content: &str, variable: &str) -> Option<String> {
    if variable.is_empty() {
        return None;
    }

    let mut changed = false;
    let mut out = String::with_capacity(content.len());

    for line in content.split_inclusive('\n') {
        match blank_line(line, variable) {
            Some(blanked) if blanked != line => {
                changed = true;
                out.push_str(&blanked);
            }
            _ => out.push_str(line),
        }
    }

    changed.then_some(out)
}

fn blank_line(line: &str, variable: &str) -> Option<String> {
    let (body, ending) = split_ending(line);

    let rest = body.trim_start_matches([' ', '\t']);
    let indent = &body[..body.len() - rest.len()];

    let (export, rest) = match rest.strip_prefix("export") {
        Some(after) if after.starts_with([' ', '\t']) => {
            let trimmed = after.trim_start_matches([' ', '\t']);
            (&rest[..rest.len() - trimmed.len()], trimmed)
        }
        _ => ("", rest),
    };

    let name_end = rest
        .find(|c: char| c == '=' || c == ' ' || c == '\t')
        .unwrap_or(rest.len());
    if &rest[..name_end] != variable {
        return None;
    }

    let after_name = &rest[name_end..];
    let value_side = after_name.trim_start_matches([' ', '\t']);
    let spacing = &after_name[..after_name.len() - value_side.len()];
    let value = value_side.strip_prefix('=')?;

    Some(format!(
        "{indent}{export}{variable}{spacing}={comment}{ending}",
        comment = trailing_comment(value),
    ))
}

fn split_ending(line: &str) -> (&str, &str) {
    if let Some(body) = line.strip_suffix("\r\n") {
        (body, "\r\n")
    } else if let Some(body) = line.strip_suffix('\n') {
        (body, "\n")
    } else {
        (line, "")
    }
}

/// The comment after a value, including the whitespace that separates it
fn trailing_comment(value: &str) -> &str {
    let unquoted = value.trim_start_matches([' ', '\t']);
    let lead = value.len() - unquoted.len();

    let scan_from = match unquoted.chars().next() {
        Some(quote @ ('"' | '\'')) => match closing_quote(&unquoted[1..], quote) {
            Some(end) => lead + 1 + end + 1,
            None => return "",
        },
        _ => 0,
    };
    let quoted = scan_from > 0;

    let tail = &value[scan_from..];
    for (i, c) in tail.char_indices() {
        if c != '#' {
            continue;
        }
        let before = &tail[..i];
        // Unquoted values may contain '#'; only " #" starts a comment there
        if before.ends_with([' ', '\t']) || (quoted && before.is_empty()) {
            let start = before.trim_end_matches([' ', '\t']).len();
            return &tail[start..];
        }
    }
    ""
}

fn closing_quote(s: &str, quote: char) -> Option<usize> {
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' && quote == '"' {
            escaped = true;
        } else if c == quote {
            return Some(i);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn blank(content: &str, variable: &str) -> String {
        blank_variable_in(content, variable).unwrap_or_else(|| content.to_string())
    }

    #[test]
    fn test_plain_assignment() {
        assert_eq!(blank("TOKEN=abc\n", "TOKEN"), "TOKEN=\n");
    }

    #[test]
    fn test_export_prefix_and_indent_kept() {
        assert_eq!(blank("  export TOKEN=abc\n", "TOKEN"), "  export TOKEN=\n");
        assert_eq!(blank("export\tTOKEN=abc", "TOKEN"), "export\tTOKEN=");
    }

    #[test]
    fn test_trailing_comment_kept() {
        assert_eq!(blank("TOKEN=abc # from vault\n", "TOKEN"), "TOKEN= # from vault\n");
        assert_eq!(blank("TOKEN=\"a # b\"  # note\n", "TOKEN"), "TOKEN=  # note\n");
        assert_eq!(blank("TOKEN='x'#c\n", "TOKEN"), "TOKEN=#c\n");
    }

    #[test]
    fn test_hash_inside_unquoted_value_is_not_a_comment() {
        assert_eq!(blank("TOKEN=abc#def\n", "TOKEN"), "TOKEN=\n");
    }

    #[test]
    fn test_escaped_quote_in_double_quoted_value() {
        assert_eq!(blank("TOKEN=\"a\\\"b\" # c\n", "TOKEN"), "TOKEN= # c\n");
    }

    #[test]
    fn test_unterminated_quote_drops_everything() {
        assert_eq!(blank("TOKEN=\"abc # c\n", "TOKEN"), "TOKEN=\n");
    }

    #[test]
    fn test_spacing_before_equals_kept() {
        assert_eq!(blank("TOKEN = abc\n", "TOKEN"), "TOKEN =\n");
    }

    #[test]
    fn test_other_lines_untouched() {
        let content = "# header\r\nTOKEN_OLD=1\r\nTOKEN=2\r\n\r\nOTHER=3";
        assert_eq!(
            blank(content, "TOKEN"),
            "# header\r\nTOKEN_OLD=1\r\nTOKEN=\r\n\r\nOTHER=3"
        );
    }

    #[test]
    fn test_prefix_match_is_not_a_match() {
        assert_eq!(blank_variable_in("TOKEN_2=abc\n", "TOKEN"), None);
        assert_eq!(blank_variable_in("exportTOKEN=abc\n", "TOKEN"), None);
    }

    #[test]
    fn test_already_blank_is_unchanged() {
        assert_eq!(blank_variable_in("TOKEN=\n", "TOKEN"), None);
        assert_eq!(blank_variable_in("TOKEN= # keep\n", "TOKEN"), None);
    }

    #[test]
    fn test_duplicate_assignments_all_blanked() {
        assert_eq!(blank("TOKEN=a\nX=1\nTOKEN=b\n", "TOKEN"), "TOKEN=\nX=1\nTOKEN=\n");
    }

    #[test]
    fn test_missing_file_is_not_an_error() {
        let dir = tempdir().unwrap();
        let changed = blank_variable(&dir.path().join(".env"), "TOKEN").unwrap();
        assert!(!changed);
    }

    #[test]
    fn test_file_rewrite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, "A=1\nexport TOKEN=secret\n").unwrap();

        assert!(blank_variable(&path, "TOKEN").unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "A=1\nexport TOKEN=\n");
        assert!(!blank_variable(&path, "TOKEN").unwrap());
    }
}
