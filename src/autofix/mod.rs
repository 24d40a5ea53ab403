//! Autofix patch engine.
//!
//! Rewrites files in place to apply the fixes carried by match records.
//! Application is a single top-to-bottom pass per file: every match for a
//! file (across all rules) must be delivered in increasing line order, and
//! spans must not overlap. Earlier edits shift later ones; [`FileOffsets`]
//! tracks that drift. Out-of-order or overlapping matches are outside this
//! contract and will land at wrong positions.

pub mod errors;
pub mod offsets;
mod splice;

pub use errors::{AutofixError, SpliceError};
pub use offsets::{FileOffsets, Span};

use crate::edit::FileRewrite;
use crate::rule_match::{RuleMatch, RuleMatchMap};
use regex::Regex;
use splice::FixedContent;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};

/// Lines a fix would produce, reported instead of writing in dry-run mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixPreview {
    pub rule_id: String,
    pub path: PathBuf,
    /// 1-indexed start line of the originating match
    pub start_line: usize,
    pub fixed_lines: Vec<String>,
}

/// Outcome of one fix-application pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixReport {
    pub modified_files: BTreeSet<PathBuf>,
    /// Populated only in dry-run mode
    pub previews: Vec<FixPreview>,
}

impl FixReport {
    pub fn modified_count(&self) -> usize {
        self.modified_files.len()
    }
}

/// A validated fix directive.
enum FixDirective<'a> {
    Literal(&'a str),
    Regex {
        pattern: &'a str,
        replacement: String,
        count: usize,
    },
}

impl<'a> FixDirective<'a> {
    /// `None` when the match carries no fix at all.
    fn from_match(rule_match: &'a RuleMatch) -> Result<Option<Self>, AutofixError> {
        if let Some(fix) = rule_match.literal_fix() {
            return Ok(Some(FixDirective::Literal(fix)));
        }
        let Some(fix_regex) = &rule_match.fix_regex else {
            return Ok(None);
        };

        let (Some(pattern), Some(replacement)) = (
            fix_regex.regex.as_deref().filter(|s| !s.is_empty()),
            fix_regex.replacement.as_deref().filter(|s| !s.is_empty()),
        ) else {
            return Err(AutofixError::MissingRegexFields {
                rule_id: rule_match.rule_id.clone(),
            });
        };

        let count = match &fix_regex.count {
            None => 0,
            Some(value) => parse_count(value).ok_or_else(|| AutofixError::InvalidCount {
                rule_id: rule_match.rule_id.clone(),
                value: value.to_string(),
            })?,
        };

        Ok(Some(FixDirective::Regex {
            pattern,
            replacement: splice::translate_replacement(replacement),
            count,
        }))
    }
}

/// Accept a non-negative integer, given as a JSON number or a numeric string.
fn parse_count(value: &serde_json::Value) -> Option<usize> {
    match value {
        serde_json::Value::Null => Some(0),
        serde_json::Value::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn compute_fix(
    rule_match: &RuleMatch,
    offsets: &FileOffsets,
    directive: &FixDirective<'_>,
) -> Result<(String, FixedContent, Span), SpliceError> {
    let contents = fs::read_to_string(&rule_match.path)?;
    let span = offsets.locate(rule_match)?;
    let fixed = match directive {
        FixDirective::Literal(fix) => splice::literal_fix(&contents, &span, fix)?,
        FixDirective::Regex {
            pattern,
            replacement,
            count,
        } => {
            let regex = Regex::new(pattern)?;
            splice::regex_fix(&contents, &span, &regex, replacement, *count)?
        }
    };
    Ok((contents, fixed, span))
}

/// Apply every fix in `rule_matches`, rule by rule, match by match.
///
/// With `dry_run` no file is touched; each fix is computed against the
/// file as it is on disk and reported as a [`FixPreview`]. Otherwise
/// files are rewritten after every fix and the report lists each file
/// that changed.
///
/// Fails fast: the first error aborts the pass. Files already rewritten
/// stay rewritten.
pub fn apply_fixes(rule_matches: &RuleMatchMap, dry_run: bool) -> Result<FixReport, AutofixError> {
    let mut report = FixReport::default();
    let mut offsets_by_file: HashMap<PathBuf, FileOffsets> = HashMap::new();

    for (rule_id, matches) in rule_matches.iter() {
        for rule_match in matches {
            let Some(directive) = FixDirective::from_match(rule_match)? else {
                continue;
            };
            let path = &rule_match.path;

            let mut offsets = if dry_run {
                FileOffsets::new(rule_match.start.line)
            } else {
                offsets_by_file
                    .get(path)
                    .copied()
                    .unwrap_or_else(|| FileOffsets::new(rule_match.start.line))
            };
            offsets.enter_line(rule_match.start.line);

            let wrap = |source: SpliceError| match &directive {
                FixDirective::Literal(_) => AutofixError::Modify {
                    path: path.clone(),
                    source,
                },
                FixDirective::Regex { pattern, .. } => AutofixError::RegexModify {
                    path: path.clone(),
                    pattern: pattern.to_string(),
                    source,
                },
            };

            let (before, fixed, span) =
                compute_fix(rule_match, &offsets, &directive).map_err(wrap)?;
            debug!(
                rule = rule_id,
                path = %path.display(),
                line = rule_match.start.line,
                line_delta = fixed.line_delta,
                "computed fix"
            );

            if dry_run {
                report.previews.push(FixPreview {
                    rule_id: rule_id.to_string(),
                    path: path.clone(),
                    start_line: rule_match.start.line,
                    fixed_lines: fixed.fixed_lines,
                });
                continue;
            }

            let result = FileRewrite::new(path.clone(), &before, fixed.contents)
                .apply()
                .map_err(|e| wrap(e.into()))?;
            debug!(?result, "wrote fix");

            match directive {
                FixDirective::Literal(fix) => {
                    offsets.record_literal(&span, fixed.line_delta, fix.chars().count())
                }
                FixDirective::Regex { .. } => offsets.record_regex(fixed.line_delta),
            }
            offsets_by_file.insert(path.clone(), offsets);
            report.modified_files.insert(path.clone());
        }
    }

    match report.modified_count() {
        0 => info!("no files modified."),
        1 => info!("successfully modified 1 file."),
        n => info!("successfully modified {n} files."),
    }

    Ok(report)
}
