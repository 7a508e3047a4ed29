use thiserror::Error;

/// Syntax error produced by the query parser.
///
/// The query is never partially executed: the first grammar violation
/// aborts the whole request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("query syntax error at offset {offset}: {message}")]
pub struct ParseError {
    pub offset: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

/// Error produced while lowering a parsed query against the schema.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("unknown field: {0}")]
    UnknownField(String),

    #[error("ambiguous field name: {0}")]
    AmbiguousField(String),

    #[error("unknown namespace prefix: {0}")]
    UnknownPrefix(String),

    #[error("field {field} does not support range queries")]
    RangeUnsupported { field: String },

    #[error("invalid {expected} literal for {field}: {literal}")]
    BadLiteral {
        field: String,
        expected: &'static str,
        literal: String,
    },

    #[error("malformed path pattern: {0}")]
    BadPath(String),

    #[error("invalid sort specification: {0}")]
    BadSort(String),
}

/// Error produced while evaluating a compiled predicate tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("query execution exceeded its deadline")]
    DeadlineExceeded,

    #[error("invalid wildcard pattern: {0}")]
    BadPattern(String),
}

/// Umbrella error for the full search pipeline.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error("invalid authority filter: {0}")]
    Filter(String),
}
