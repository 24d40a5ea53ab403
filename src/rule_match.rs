//! Match records produced by the analysis engine.
//!
//! The engine is an opaque producer; this module only knows the shape of
//! its JSON results document and how to group matches by rule. A match may
//! carry a literal `fix` or a `fix_regex` directive which the
//! [`autofix`](crate::autofix) engine applies.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

#[derive(Error, Debug)]
pub enum RuleMatchError {
    #[error("failed to read results from {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse results JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to read matched lines from {path}: {source}")]
    Lines {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A location in a source file. `line` and `col` are 1-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub col: usize,
    #[serde(default)]
    pub offset: usize,
}

impl Position {
    pub fn new(line: usize, col: usize) -> Self {
        Self {
            line,
            col,
            offset: 0,
        }
    }
}

/// A regex substitution directive attached to a match.
///
/// `count` stays a raw JSON value: a malformed count is a configuration
/// error reported when the fix is applied, not when results are loaded.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FixRegex {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<serde_json::Value>,
}

impl FixRegex {
    pub fn new(regex: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            regex: Some(regex.into()),
            replacement: Some(replacement.into()),
            count: None,
        }
    }

    pub fn with_count(mut self, count: u64) -> Self {
        self.count = Some(serde_json::Value::from(count));
        self
    }
}

/// A located finding for a single rule.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleMatch {
    pub rule_id: String,
    pub path: PathBuf,
    pub start: Position,
    /// Exclusive end position.
    pub end: Position,
    pub message: String,
    pub fix: Option<String>,
    pub fix_regex: Option<FixRegex>,
}

impl RuleMatch {
    pub fn new(
        rule_id: impl Into<String>,
        path: impl Into<PathBuf>,
        start: Position,
        end: Position,
    ) -> Self {
        Self {
            rule_id: rule_id.into(),
            path: path.into(),
            start,
            end,
            message: String::new(),
            fix: None,
            fix_regex: None,
        }
    }

    pub fn with_fix(mut self, fix: impl Into<String>) -> Self {
        self.fix = Some(fix.into());
        self
    }

    pub fn with_fix_regex(mut self, fix_regex: FixRegex) -> Self {
        self.fix_regex = Some(fix_regex);
        self
    }

    /// The literal fix, right-trimmed. Blank fixes count as absent.
    pub fn literal_fix(&self) -> Option<&str> {
        self.fix
            .as_deref()
            .map(str::trim_end)
            .filter(|fix| !fix.is_empty())
    }

    /// Read the source lines spanned by this match, terminators included.
    /// Relative paths are resolved against `root`.
    pub fn read_lines(&self, root: &Path) -> Result<Vec<String>, RuleMatchError> {
        let start = self.start.line.saturating_sub(1);
        if self.start.line == 0 && self.end.line == 0 {
            // empty file
            return Ok(Vec::new());
        }

        let lines_err = |source| RuleMatchError::Lines {
            path: self.path.clone(),
            source,
        };
        let file = fs::File::open(root.join(&self.path)).map_err(lines_err)?;
        let mut reader = BufReader::new(file);
        let mut lines = Vec::new();
        let mut buf = Vec::new();
        let mut index = 0;
        while index < self.end.line {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).map_err(lines_err)? == 0 {
                break;
            }
            if index >= start {
                lines.push(String::from_utf8_lossy(&buf).into_owned());
            }
            index += 1;
        }
        Ok(lines)
    }

    /// Capture what baseline comparison needs from the file as it is now.
    pub fn fingerprint(&self, root: &Path) -> Result<MatchFingerprint, RuleMatchError> {
        let lines = self.read_lines(root)?;
        Ok(MatchFingerprint {
            rule_id: self.rule_id.clone(),
            path: self.path.clone(),
            lines_hash: lines_hash(&lines),
            lines,
        })
    }
}

fn lines_hash(lines: &[String]) -> u64 {
    xxh3_64(lines.join("\n").as_bytes())
}

/// Identity of a finding independent of where in the file it sits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchFingerprint {
    pub rule_id: String,
    pub path: PathBuf,
    pub lines: Vec<String>,
    pub lines_hash: u64,
}

impl MatchFingerprint {
    pub fn is_baseline_equivalent(&self, other: &MatchFingerprint) -> bool {
        self.rule_id == other.rule_id
            && self.path == other.path
            && self.lines_hash == other.lines_hash
            && self.lines == other.lines
    }
}

/// Matches grouped by rule id, in first-seen rule order.
///
/// Fix application walks rules in this order and each rule's matches in
/// sequence. Callers must deliver matches so that, per file, they are
/// visited top to bottom.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleMatchMap {
    groups: Vec<(String, Vec<RuleMatch>)>,
}

impl RuleMatchMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, rule_match: RuleMatch) {
        match self
            .groups
            .iter_mut()
            .find(|(rule_id, _)| *rule_id == rule_match.rule_id)
        {
            Some((_, matches)) => matches.push(rule_match),
            None => self
                .groups
                .push((rule_match.rule_id.clone(), vec![rule_match])),
        }
    }

    pub fn get(&self, rule_id: &str) -> Option<&[RuleMatch]> {
        self.groups
            .iter()
            .find(|(id, _)| id == rule_id)
            .map(|(_, matches)| matches.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[RuleMatch])> {
        self.groups
            .iter()
            .map(|(rule_id, matches)| (rule_id.as_str(), matches.as_slice()))
    }

    pub fn matches(&self) -> impl Iterator<Item = &RuleMatch> {
        self.groups.iter().flat_map(|(_, matches)| matches.iter())
    }

    pub fn len(&self) -> usize {
        self.groups.iter().map(|(_, matches)| matches.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fingerprint every match against the files as they currently are.
    pub fn fingerprints(&self, root: &Path) -> Result<Vec<MatchFingerprint>, RuleMatchError> {
        self.matches().map(|m| m.fingerprint(root)).collect()
    }

    /// Resolve relative match paths against `root`.
    pub fn rebase(&mut self, root: &Path) {
        for (_, matches) in &mut self.groups {
            for rule_match in matches {
                if rule_match.path.is_relative() {
                    rule_match.path = root.join(&rule_match.path);
                }
            }
        }
    }

    /// Drop every match equivalent to a baseline fingerprint.
    ///
    /// Returns the number of matches removed. Rules left without matches
    /// are dropped as well.
    pub fn remove_baseline(
        &mut self,
        root: &Path,
        baseline: &[MatchFingerprint],
    ) -> Result<usize, RuleMatchError> {
        let mut removed = 0;
        for (_, matches) in &mut self.groups {
            let mut kept = Vec::with_capacity(matches.len());
            for rule_match in matches.drain(..) {
                let fingerprint = rule_match.fingerprint(root)?;
                if baseline
                    .iter()
                    .any(|base| base.is_baseline_equivalent(&fingerprint))
                {
                    removed += 1;
                } else {
                    kept.push(rule_match);
                }
            }
            *matches = kept;
        }
        self.groups.retain(|(_, matches)| !matches.is_empty());
        Ok(removed)
    }

    /// Parse the analysis engine's JSON results document.
    pub fn from_json(input: &str) -> Result<Self, RuleMatchError> {
        let doc: ResultsDocument = serde_json::from_str(input)?;
        let mut map = Self::new();
        for result in doc.results {
            map.push(result.into());
        }
        Ok(map)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, RuleMatchError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| RuleMatchError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&contents)
    }

    pub fn to_json(&self) -> Result<String, RuleMatchError> {
        let doc = ResultsDocument {
            results: self.matches().map(RawResult::from).collect(),
        };
        Ok(serde_json::to_string_pretty(&doc)?)
    }
}

impl FromIterator<RuleMatch> for RuleMatchMap {
    fn from_iter<I: IntoIterator<Item = RuleMatch>>(iter: I) -> Self {
        let mut map = Self::new();
        for rule_match in iter {
            map.push(rule_match);
        }
        map
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ResultsDocument {
    #[serde(default)]
    results: Vec<RawResult>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RawResult {
    check_id: String,
    path: PathBuf,
    start: Position,
    end: Position,
    #[serde(default)]
    extra: RawExtra,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RawExtra {
    #[serde(default)]
    message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fix_regex: Option<FixRegex>,
}

impl From<RawResult> for RuleMatch {
    fn from(raw: RawResult) -> Self {
        Self {
            rule_id: raw.check_id,
            path: raw.path,
            start: raw.start,
            end: raw.end,
            message: raw.extra.message,
            fix: raw.extra.fix,
            fix_regex: raw.extra.fix_regex,
        }
    }
}

impl From<&RuleMatch> for RawResult {
    fn from(rule_match: &RuleMatch) -> Self {
        Self {
            check_id: rule_match.rule_id.clone(),
            path: rule_match.path.clone(),
            start: rule_match.start,
            end: rule_match.end,
            extra: RawExtra {
                message: rule_match.message.clone(),
                fix: rule_match.fix.clone(),
                fix_regex: rule_match.fix_regex.clone(),
            },
        }
    }
}
