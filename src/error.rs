use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Error as JsonError;
use thiserror::Error;

/// The single error type for every fallible operation in the crate.
///
/// Variants split into two classes. Recoverable refusals leave the model
/// untouched and are expected in normal editing (an incompatible drag, a
/// script with an unsupported construct). Fatal corruption variants indicate
/// persisted state or an in-memory graph that violates a structural
/// invariant, and callers should discard the offending workspace rather than
/// retry. [`TangleError::is_recoverable`] encodes the split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum TangleError {
    #[error("incompatible connection at socket '{socket}': {detail}")]
    ConnectionIncompatible { socket: String, detail: String },
    #[error("socket '{socket}' already holds a connection")]
    SocketAlreadyOccupied { socket: String },
    #[error("unknown node kind '{0}'")]
    UnknownNodeKind(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("malformed shape state on '{kind}' node: {detail}")]
    MalformedShapeState { kind: String, detail: String },
    #[error("unknown clause kind '{0}' in marker chain")]
    UnknownClauseKind(String),
    #[error("unsupported syntax at {line}:{column}: {construct}")]
    UnsupportedSyntax {
        construct: String,
        line: usize,
        column: usize,
    },
    #[error("reference to undefined name '{name}' at {line}:{column}")]
    UndefinedReference {
        name: String,
        line: usize,
        column: usize,
    },
    #[error("procedure '{0}' still has live call sites")]
    DanglingProcedureReference(String),
    #[error("another definition already uses the name '{0}'")]
    DuplicateProcedure(String),
    #[error("malformed graph: {0}")]
    MalformedGraph(String),
    #[error("(de)serialization error: {0}")]
    Serialization(String),
}

impl TangleError {
    /// Whether the caller may keep using the workspace after this error.
    ///
    /// Recoverable errors are refusals: the mutation or parse was rejected
    /// before any state changed. Everything else signals corruption.
    pub fn is_recoverable(&self) -> bool {
        match self {
            TangleError::ConnectionIncompatible { .. } => true,
            TangleError::SocketAlreadyOccupied { .. } => true,
            TangleError::UnknownNodeKind(_) => true,
            TangleError::NotFound(_) => true,
            TangleError::MalformedShapeState { .. } => false,
            TangleError::UnknownClauseKind(_) => false,
            TangleError::UnsupportedSyntax { .. } => true,
            TangleError::UndefinedReference { .. } => true,
            TangleError::DanglingProcedureReference(_) => true,
            TangleError::DuplicateProcedure(_) => true,
            TangleError::MalformedGraph(_) => false,
            TangleError::Serialization(_) => false,
        }
    }

    /// Shorthand for the parser's located rejection of a construct.
    pub fn unsupported(construct: impl Into<String>, line: usize, column: usize) -> TangleError {
        TangleError::UnsupportedSyntax {
            construct: construct.into(),
            line,
            column,
        }
    }

    /// Shorthand for a located reference to an undeclared name.
    pub fn undefined(name: impl Into<String>, line: usize, column: usize) -> TangleError {
        TangleError::UndefinedReference {
            name: name.into(),
            line,
            column,
        }
    }
}

impl From<JsonError> for TangleError {
    fn from(src: JsonError) -> TangleError {
        TangleError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

impl From<fmt::Error> for TangleError {
    fn from(src: fmt::Error) -> TangleError {
        TangleError::MalformedGraph(format!("emit buffer write failed: {src}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverability_split() {
        assert!(TangleError::ConnectionIncompatible {
            socket: "VALUE".into(),
            detail: "Number vs Boolean".into()
        }
        .is_recoverable());
        assert!(TangleError::unsupported("class declaration", 3, 1).is_recoverable());
        assert!(TangleError::undefined("score", 1, 5).is_recoverable());
        assert!(!TangleError::UnknownClauseKind("while_block".into()).is_recoverable());
        assert!(!TangleError::MalformedGraph("socket points at missing node".into()).is_recoverable());
    }

    #[test]
    fn test_located_errors_render_position() {
        let err = TangleError::unsupported("'var' declaration", 4, 12);
        assert_eq!(
            err.to_string(),
            "unsupported syntax at 4:12: 'var' declaration"
        );
        let err = TangleError::undefined("speed", 2, 1);
        assert!(err.to_string().contains("2:1"));
    }

    #[test]
    fn test_serde_round_trip() {
        let err = TangleError::UndefinedReference {
            name: "lives".into(),
            line: 9,
            column: 3,
        };
        let json = serde_json::to_string(&err).unwrap();
        let back: TangleError = serde_json::from_str(&json).unwrap();
        assert_eq!(err, back);
    }
}
