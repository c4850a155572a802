//! Error kinds for the execution pipeline.
//!
//! Mirrors the teacher's `ErrorCode` / `RwError` split: [`ErrorCode`] is the
//! plain enum of error kinds named in spec.md §7, and [`OpteryxError`] wraps
//! one with the context the spec's §7 "user-visible failures" paragraph
//! requires (the offending token range, and the plan node where the error
//! surfaced).

use std::fmt;

use thiserror::Error;

/// A byte-offset range into the original SQL text, threaded through from the
/// bound AST so an error can still point at the offending token once it
/// reaches the optimizer or executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceSpan {
    pub start: usize,
    pub end: usize,
}

impl SourceSpan {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// The error kinds enumerated in spec.md §7, grouped by the collaborator
/// that raises them. `SyntaxError`, `IOError`, `CorruptData`, and `AuthError`
/// are raised by out-of-scope collaborators (parser, connectors) but are
/// kept here so this crate can propagate them untranslated, annotated with
/// the scan node id, as §7 requires.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ErrorCode {
    #[error("syntax error: {0}")]
    SyntaxError(String),

    #[error("unresolved identifier: {0}")]
    UnresolvedIdentifier(String),
    #[error("ambiguous column: {0}")]
    AmbiguousColumn(String),
    #[error("unsupported syntax: {0}")]
    UnsupportedSyntax(String),
    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    #[error("cast error: {0}")]
    CastError(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("out of memory: {0}")]
    OutOfMemory(String),
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),
    #[error("query cancelled")]
    Cancelled,
    #[error("query timed out")]
    Timeout,

    #[error("I/O error: {0}")]
    IOError(String),
    #[error("corrupt data: {0}")]
    CorruptData(String),
    #[error("authentication error: {0}")]
    AuthError(String),

    #[error("internal error: {0}")]
    InternalError(String),
}

/// An `ErrorCode` plus the context needed to render a user-visible failure:
/// the offending token range (when known) and the plan/operator node id
/// where the error occurred.
#[derive(Error, Debug, Clone, PartialEq)]
pub struct OpteryxError {
    pub code: ErrorCode,
    pub span: Option<SourceSpan>,
    pub node_id: Option<u32>,
}

impl OpteryxError {
    pub fn new(code: ErrorCode) -> Self {
        Self { code, span: None, node_id: None }
    }

    pub fn with_span(mut self, span: SourceSpan) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_node(mut self, node_id: u32) -> Self {
        self.node_id = Some(node_id);
        self
    }
}

impl fmt::Display for OpteryxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code)?;
        if let Some(node_id) = self.node_id {
            write!(f, " (at node #{node_id})")?;
        }
        if let Some(span) = self.span {
            write!(f, " [{}..{}]", span.start, span.end)?;
        }
        Ok(())
    }
}

impl From<ErrorCode> for OpteryxError {
    fn from(code: ErrorCode) -> Self {
        OpteryxError::new(code)
    }
}

pub type Result<T> = std::result::Result<T, OpteryxError>;

/// Shorthand for `Err(ErrorCode::InternalError(..).into())`, matching the
/// frequency with which the teacher's own executors construct an
/// `InternalError` for "this should not happen" conditions.
#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        $crate::error::OpteryxError::from($crate::error::ErrorCode::InternalError(format!($($arg)*)))
    };
}
