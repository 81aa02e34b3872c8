//! Error types.
//!
//! Malformed markup is never an error: the parser always degrades to the most
//! literal reading. These variants cover contract violations (a handler asked
//! a node for something it does not carry) and the I/O and option loading done
//! at the edges of the crate.

use thiserror::Error;

use crate::ast::NodeId;

/// Errors raised by tree operations, renderers and option loading.
#[derive(Debug, Error)]
pub enum Error {
    /// A node was not of the kind the operation requires.
    #[error("node {node} is {found}, expected {expected}")]
    UnexpectedNode {
        node: NodeId,
        expected: &'static str,
        found: &'static str,
    },

    /// A node lacks a child the operation requires.
    #[error("{kind} node {node} has no {child} child")]
    MissingChild {
        node: NodeId,
        kind: &'static str,
        child: &'static str,
    },

    /// A footnote reference points at a label with no definition.
    #[error("footnote [^{0}] has no definition")]
    UnknownFootnote(String),

    /// Options could not be deserialized.
    #[error("invalid options: {0}")]
    InvalidOptions(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Creates an unexpected-node error.
    pub fn unexpected(node: NodeId, expected: &'static str, found: &'static str) -> Self {
        Self::UnexpectedNode {
            node,
            expected,
            found,
        }
    }

    /// Creates a missing-child error.
    pub fn missing_child(node: NodeId, kind: &'static str, child: &'static str) -> Self {
        Self::MissingChild { node, kind, child }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
