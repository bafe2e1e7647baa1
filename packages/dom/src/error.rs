use crate::document::NodeId;
use thiserror::Error;

pub type ParseResult<T> = Result<T, ParseError>;
pub type PatchResult<T> = Result<T, PatchError>;

/// Markup that could not be tokenized or parsed. Fatal for the update that
/// carried it: a broken payload is never partially applied.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unexpected end of markup at byte {pos}")]
    UnexpectedEof { pos: usize },

    #[error("malformed tag at byte {pos}: {detail}")]
    MalformedTag { pos: usize, detail: String },

    #[error("mismatched closing tag at byte {pos}: expected </{expected}>, found </{found}>")]
    MismatchedClose {
        pos: usize,
        expected: String,
        found: String,
    },

    #[error("closing tag </{found}> at byte {pos} has no open element")]
    UnexpectedClose { pos: usize, found: String },

    #[error("malformed attribute at byte {pos}: {detail}")]
    MalformedAttribute { pos: usize, detail: String },
}

impl ParseError {
    pub fn malformed_tag(pos: usize, detail: impl Into<String>) -> Self {
        ParseError::MalformedTag {
            pos,
            detail: detail.into(),
        }
    }

    pub fn malformed_attribute(pos: usize, detail: impl Into<String>) -> Self {
        ParseError::MalformedAttribute {
            pos,
            detail: detail.into(),
        }
    }
}

/// Reconciliation failure. Mutation is node-by-node, so a mid-patch failure
/// leaves a clean prefix of the update applied and the rest of the tree
/// untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatchError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("node {node:?} is not part of the document")]
    DetachedNode { node: NodeId },

    #[error("node {node:?} is not an element")]
    NotAnElement { node: NodeId },
}
