//! Lexical scan of `use = ...` declarations.
//!
//! Only the top-level block of a route module is scanned: everything before
//! the first table header. The scan never parses TOML, so a module with a
//! syntax error further down still reports its imports.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::ScanError;

/// Matches one basic (`"..."`) or literal (`'...'`) string.
static STRING_LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""((?:[^"\\]|\\.)*)"|'([^']*)'"#).unwrap());

/// Collect the references named by top-level `use` declarations, in order.
pub fn scan_imports(text: &str) -> Result<Vec<String>, ScanError> {
    let mut imports = Vec::new();
    // (line the list started on, accumulated text)
    let mut pending: Option<(usize, String)> = None;

    for (index, raw) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = strip_comment(raw);

        if let Some((start, mut buffer)) = pending.take() {
            buffer.push(' ');
            buffer.push_str(line);
            if find_unquoted(line, ']').is_some() {
                imports.extend(literals(&buffer));
            } else {
                pending = Some((start, buffer));
            }
            continue;
        }

        let trimmed = line.trim();
        if trimmed.starts_with('[') {
            break;
        }

        let Some(value) = use_value(trimmed) else {
            continue;
        };

        if value.starts_with('"') || value.starts_with('\'') {
            let found = literals(value);
            if found.len() != 1 {
                return Err(ScanError::Malformed { line: line_no });
            }
            imports.extend(found);
        } else if let Some(list) = value.strip_prefix('[') {
            if find_unquoted(list, ']').is_some() {
                imports.extend(literals(list));
            } else {
                pending = Some((line_no, list.to_string()));
            }
        } else {
            return Err(ScanError::Malformed { line: line_no });
        }
    }

    match pending {
        Some((line, _)) => Err(ScanError::Unterminated { line }),
        None => Ok(imports),
    }
}

/// The right-hand side of `use = ...`, if `line` is such a declaration.
fn use_value(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("use")?;
    let rest = rest.trim_start().strip_prefix('=')?;
    Some(rest.trim())
}

fn literals(text: &str) -> Vec<String> {
    STRING_LITERAL
        .captures_iter(text)
        .filter_map(|caps| {
            caps.get(1)
                .map(|m| unescape(m.as_str()))
                .or_else(|| caps.get(2).map(|m| m.as_str().to_string()))
        })
        .collect()
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Drop a trailing `# comment`, ignoring `#` inside strings.
fn strip_comment(line: &str) -> &str {
    match find_unquoted(line, '#') {
        Some(pos) => &line[..pos],
        None => line,
    }
}

/// Byte offset of the first `target` outside a string literal.
fn find_unquoted(line: &str, target: char) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (pos, c) in line.char_indices() {
        match quote {
            Some('"') if escaped => escaped = false,
            Some('"') if c == '\\' => escaped = true,
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == target => return Some(pos),
            None => {}
        }
    }
    None
}
