use std::fmt;
use std::io;

use thiserror::Error;

use crate::header::Scope;
use crate::types::{FieldKind, Number};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Type(#[from] TypeError),
    #[error(transparent)]
    Merge(#[from] MergeError),
    #[error(
        "conflicting declarations for {scope} field '{id}': \
         {existing_kind}/{existing_number} vs {incoming_kind}/{incoming_number}"
    )]
    SchemaConflict {
        scope: Scope,
        id: String,
        existing_kind: FieldKind,
        existing_number: Number,
        incoming_kind: FieldKind,
        incoming_number: Number,
    },
    #[error("invalid header line '{line}': {reason}")]
    Header { line: String, reason: String },
    #[error("invalid merge strategy line '{line}': {reason}")]
    Strategy { line: String, reason: String },
    #[error("unknown sample '{0}'")]
    UnknownSample(String),
    #[error("internal invariant violated: {0}")]
    SerializationInvariant(String),
    #[error("sort buffer already serialized")]
    AlreadySpilled,
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Compression(#[from] niffler::Error),
}

impl Error {
    /// Attach a 1-based line number to a parse error. Other errors pass through unchanged.
    pub fn at_line(self, line: usize) -> Self {
        match self {
            Error::Parse(e) => Error::Parse(e.at_line(line)),
            e => e,
        }
    }
}

/// The logical column of a data line.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Field {
    Chrom,
    Pos,
    Id,
    Ref,
    Alt,
    Qual,
    Filter,
    Info,
    Format,
    Sample(usize),
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Chrom => f.write_str("CHROM"),
            Field::Pos => f.write_str("POS"),
            Field::Id => f.write_str("ID"),
            Field::Ref => f.write_str("REF"),
            Field::Alt => f.write_str("ALT"),
            Field::Qual => f.write_str("QUAL"),
            Field::Filter => f.write_str("FILTER"),
            Field::Info => f.write_str("INFO"),
            Field::Format => f.write_str("FORMAT"),
            Field::Sample(idx) => write!(f, "sample #{}", idx + 1),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Error)]
#[error(
    "failed to parse {field}{}, column {} ('{text}'): {reason}",
    line_suffix(.line),
    .column + 1
)]
pub struct ParseError {
    pub field: Field,
    pub text: String,
    pub column: usize,
    pub line: Option<usize>,
    pub reason: String,
}

fn line_suffix(line: &Option<usize>) -> String {
    line.map(|l| format!(" at line {}", l)).unwrap_or_default()
}

impl ParseError {
    pub fn new(field: Field, text: &str, column: usize, reason: impl Into<String>) -> Self {
        ParseError {
            field,
            text: text.to_owned(),
            column,
            line: None,
            reason: reason.into(),
        }
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum TypeError {
    #[error("no {scope} type declared for field '{id}'")]
    UnknownField { scope: Scope, id: String },
    #[error("cannot read '{text}' as {kind} for field '{id}'")]
    Coercion {
        id: String,
        kind: FieldKind,
        text: String,
    },
    #[error("field '{id}' expects {expected} values, got {found}")]
    Arity {
        id: String,
        expected: usize,
        found: usize,
    },
    #[error("flag '{id}' does not take a value, got '{text}'")]
    FlagWithValue { id: String, text: String },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MergeError {
    #[error("nothing to merge")]
    NoInputs,
    #[error("cannot merge records at different positions: {expected} vs {found}")]
    PositionMismatch { expected: String, found: String },
    #[error("field '{id}' must match across inputs, found '{first}' and '{second}'")]
    Conflict {
        id: String,
        first: String,
        second: String,
    },
    #[error("policy '{policy}' cannot combine {kind} field '{id}'")]
    Unsupported {
        id: String,
        kind: FieldKind,
        policy: String,
    },
    #[error("field '{id}' has {first} values in one input and {second} in another")]
    LengthMismatch {
        id: String,
        first: usize,
        second: usize,
    },
    #[error("reference alleles '{first}' and '{second}' are incompatible")]
    Reference { first: String, second: String },
    #[error("no {scope} type for field '{id}' in the merged header")]
    UnknownField { scope: Scope, id: String },
    #[error("input #{input} is not one of the {inputs} merged inputs")]
    UnknownInput { input: usize, inputs: usize },
    #[error("input #{input} declares {expected} samples but its record has {found}")]
    SampleCount {
        input: usize,
        expected: usize,
        found: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_message() {
        let e = ParseError::new(Field::Pos, "x", 5, "not a number");
        assert_eq!(e.to_string(), "failed to parse POS, column 6 ('x'): not a number");
        let e: Error = e.into();
        assert_eq!(
            e.at_line(12).to_string(),
            "failed to parse POS at line 12, column 6 ('x'): not a number"
        );
    }
}
