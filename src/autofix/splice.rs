//! Text splicing for literal and regex fixes.
//!
//! File contents are split on `\n` only, so a trailing newline shows up as
//! a final empty line and joining with `\n` restores the original bytes.
//! The rewritten middle block is split on any line terminator and loses a
//! trailing one, which is how a fix that empties a line removes it.

use crate::autofix::errors::SpliceError;
use crate::autofix::offsets::Span;
use regex::Regex;

pub(crate) const SPLIT_CHAR: char = '\n';

/// New file contents plus the lines produced by the fix itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FixedContent {
    pub contents: String,
    pub fixed_lines: Vec<String>,
    /// Line count after the fix minus line count before it
    pub line_delta: isize,
}

pub(crate) fn split_contents(contents: &str) -> Vec<&str> {
    contents.split(SPLIT_CHAR).collect()
}

/// Line boundaries recognised inside a spliced block: `\n`, `\r`, vertical
/// tab, form feed, the file/group/record separators, NEL and the Unicode
/// line and paragraph separators.
const LINE_BREAKS: [char; 10] = [
    '\n', '\r', '\x0b', '\x0c', '\x1c', '\x1d', '\x1e', '\u{85}', '\u{2028}', '\u{2029}',
];

/// Split a block on any of [`LINE_BREAKS`] (`\r\n` counts as one break),
/// dropping a trailing terminator.
pub(crate) fn split_block(block: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut rest = block;
    while !rest.is_empty() {
        match rest.char_indices().find(|(_, c)| LINE_BREAKS.contains(c)) {
            Some((i, c)) => {
                lines.push(rest[..i].to_string());
                let terminator = if rest[i..].starts_with("\r\n") {
                    2
                } else {
                    c.len_utf8()
                };
                rest = &rest[i + terminator..];
            }
            None => {
                lines.push(rest.to_string());
                break;
            }
        }
    }
    lines
}

/// Byte index of the `col`-th character, clamped to the end of the line.
fn char_boundary(line: &str, col: usize) -> usize {
    line.char_indices()
        .nth(col)
        .map_or(line.len(), |(index, _)| index)
}

fn line_at<'a>(lines: &[&'a str], index: usize) -> Result<&'a str, SpliceError> {
    lines
        .get(index)
        .copied()
        .ok_or(SpliceError::LineOutOfRange {
            line: index as isize + 1,
            line_count: lines.len(),
        })
}

fn assemble(lines: &[&str], span: &Span, middle: &[String]) -> FixedContent {
    let before = &lines[..span.start_line];
    let after = lines.get(span.end_line + 1..).unwrap_or_default();

    let mut out: Vec<&str> = Vec::with_capacity(before.len() + middle.len() + after.len());
    out.extend_from_slice(before);
    out.extend(middle.iter().map(String::as_str));
    out.extend_from_slice(after);

    FixedContent {
        line_delta: out.len() as isize - lines.len() as isize,
        contents: out.join("\n"),
        fixed_lines: middle.to_vec(),
    }
}

/// Replace the text between the span's start and end columns with `fix`.
pub(crate) fn literal_fix(
    contents: &str,
    span: &Span,
    fix: &str,
) -> Result<FixedContent, SpliceError> {
    let lines = split_contents(contents);
    let start_text = line_at(&lines, span.start_line)?;
    let end_text = line_at(&lines, span.end_line)?;

    let prefix = &start_text[..char_boundary(start_text, span.start_col)];
    let suffix = &end_text[char_boundary(end_text, span.end_col)..];
    let middle = split_block(&format!("{prefix}{fix}{suffix}"));

    Ok(assemble(&lines, span, &middle))
}

/// Run a bounded substitution over the whole lines the span covers.
/// `count == 0` replaces every occurrence.
pub(crate) fn regex_fix(
    contents: &str,
    span: &Span,
    regex: &Regex,
    replacement: &str,
    count: usize,
) -> Result<FixedContent, SpliceError> {
    let lines = split_contents(contents);
    line_at(&lines, span.start_line)?;
    let end_line = span.end_line.min(lines.len() - 1);
    let span = Span { end_line, ..*span };

    let context = lines[span.start_line..=span.end_line].join("\n");
    let replaced = regex.replacen(&context, count, replacement);
    let middle = split_block(&replaced);

    Ok(assemble(&lines, &span, &middle))
}

/// Translate a `\1` / `\g<name>` style replacement template into the
/// `${1}` / `${name}` syntax of the regex crate. Literal `$` is escaped.
pub(crate) fn translate_replacement(template: &str) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '$' => out.push_str("$$"),
            '\\' => match chars.peek().copied() {
                Some(d) if d.is_ascii_digit() => {
                    let mut group = String::new();
                    while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                        group.push(d);
                        chars.next();
                        if group.len() == 2 {
                            break;
                        }
                    }
                    out.push_str(&format!("${{{group}}}"));
                }
                Some('g') => {
                    chars.next();
                    if chars.peek() == Some(&'<') {
                        chars.next();
                        let name: String = chars.by_ref().take_while(|&c| c != '>').collect();
                        out.push_str(&format!("${{{name}}}"));
                    } else {
                        out.push_str("\\g");
                    }
                }
                Some('n') => {
                    chars.next();
                    out.push('\n');
                }
                Some('t') => {
                    chars.next();
                    out.push('\t');
                }
                Some('\\') => {
                    chars.next();
                    out.push('\\');
                }
                _ => out.push('\\'),
            },
            other => out.push(other),
        }
    }
    out
}
