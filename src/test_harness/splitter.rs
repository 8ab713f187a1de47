//! Quote-aware SQL statement splitting
//!
//! Splits a script on `;` while respecting single quotes, double quotes and
//! backslash escapes, then drops `--` comment lines and empty statements.

/// Marker for single-line comments removed from split statements
pub const LINE_COMMENT_MARKER: &str = "--";

/// Split a script into individual statements
///
/// Statements are trimmed, lose one trailing `;`, and have every line whose
/// trimmed content starts with `--` removed. Statements that end up empty are
/// dropped. An unterminated quote swallows the rest of the input, which is
/// still returned as the last statement.
pub fn split_statements(script: &str) -> Vec<String> {
    let mut in_single_quote = false;
    let mut in_double_quote = false;
    let mut escape = false;
    let mut begin = 0;
    let mut raw = Vec::new();

    for (index, ch) in script.char_indices() {
        match ch {
            '\'' if !escape => in_single_quote = !in_single_quote,
            '"' if !escape => in_double_quote = !in_double_quote,
            ';' if !in_single_quote && !in_double_quote => {
                raw.push(&script[begin..index]);
                begin = index + ch.len_utf8();
            }
            _ => {}
        }

        if escape {
            escape = false;
        } else if ch == '\\' {
            escape = true;
        }
    }
    raw.push(&script[begin..]);

    raw.into_iter().filter_map(clean_statement).collect()
}

fn clean_statement(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_suffix(';').unwrap_or(trimmed);

    let kept: Vec<&str> = trimmed
        .split('\n')
        .filter(|line| !line.trim().starts_with(LINE_COMMENT_MARKER))
        .collect();
    let statement = kept.join("\n").trim().to_string();

    if statement.is_empty() {
        None
    } else {
        Some(statement)
    }
}
