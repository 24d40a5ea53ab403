use crate::edit::EditError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AutofixError {
    #[error("rule {rule_id}: 'regex' and 'replacement' values required when using 'fix-regex'")]
    MissingRegexFields { rule_id: String },

    #[error(
        "rule {rule_id}: optional 'count' value must be an integer when using 'fix-regex' (got {value})"
    )]
    InvalidCount { rule_id: String, value: String },

    #[error("unable to modify file {path}: {source}")]
    Modify {
        path: PathBuf,
        #[source]
        source: SpliceError,
    },

    #[error("unable to use regex to modify file {path} with fix-regex '{pattern}': {source}")]
    RegexModify {
        path: PathBuf,
        pattern: String,
        #[source]
        source: SpliceError,
    },
}

/// Failure while reading, splicing or writing a single file.
#[derive(Error, Debug)]
pub enum SpliceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line} is outside the file ({line_count} lines)")]
    LineOutOfRange { line: isize, line_count: usize },

    #[error("column {col} is before the start of line {line}")]
    NegativeColumn { line: usize, col: isize },

    #[error("match ends on line {end_line}, before it starts on line {start_line}")]
    InvertedSpan { start_line: usize, end_line: usize },

    #[error("invalid regex: {0}")]
    InvalidRegex(#[from] regex::Error),

    #[error(transparent)]
    Edit(#[from] EditError),
}
