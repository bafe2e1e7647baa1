use std::fmt;
use thiserror::Error;

pub type MergeResult<T> = Result<T, MergeError>;

/// One step into a render tree, used to report where a merge went wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Positional dynamic slot.
    Slot(usize),
    /// Keyed list entry.
    Key(String),
    /// Component table entry.
    Component(i32),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Slot(i) => write!(f, "{}", i),
            PathSegment::Key(k) => write!(f, "k[{}]", k),
            PathSegment::Component(id) => write!(f, "c[{}]", id),
        }
    }
}

/// Path from the tree root to the node a diff operation was touching.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffPath(Vec<PathSegment>);

impl DiffPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, segment: PathSegment) {
        self.0.push(segment);
    }

    pub fn pop(&mut self) {
        self.0.pop();
    }

    /// Snapshot of the current position, for embedding in an error.
    pub fn capture(&self) -> DiffPath {
        self.clone()
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for DiffPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "<root>");
        }
        for (i, seg) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{}", seg)?;
        }
        Ok(())
    }
}

/// Structural violations found while decoding or merging a diff.
///
/// Every variant is fatal to the update that carried the diff; the caller
/// keeps its previous tree untouched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MergeError {
    #[error("malformed diff payload at {path}: {detail}")]
    MalformedPayload { path: DiffPath, detail: String },

    #[error("slot type mismatch at {path}: cannot merge a tree into a leaf without replacement statics")]
    SlotTypeMismatch { path: DiffPath },

    #[error("component link {id} at {path} does not resolve to a literal static template")]
    DanglingLink { id: i32, path: DiffPath },

    #[error("component {id} links to itself")]
    SelfLink { id: i32 },

    #[error("unknown component {id} referenced at {path}")]
    UnknownComponent { id: i32, path: DiffPath },

    #[error("dynamic slot {index} at {path} has no value to render")]
    MissingSlot { path: DiffPath, index: usize },

    #[error("component {id} participates in a render cycle")]
    ComponentCycle { id: i32 },
}

impl MergeError {
    pub fn malformed(path: &DiffPath, detail: impl Into<String>) -> Self {
        MergeError::MalformedPayload {
            path: path.capture(),
            detail: detail.into(),
        }
    }
}
