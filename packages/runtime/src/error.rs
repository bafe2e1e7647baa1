use crate::protocol::TransportError;
use thiserror::Error;
use veneer_dom::PatchError;
use veneer_rendered::MergeError;

pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors surfaced by the runtime. A merge or patch failure is fatal to the
/// update that carried it — the affected view transitions to `Errored` —
/// but never to the runtime as a whole.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("unknown view {0:?}")]
    UnknownView(String),

    #[error("view {0:?} already exists")]
    DuplicateView(String),

    #[error("join payload for view {0:?} must carry literal statics only")]
    NonLiteralJoin(String),

    #[error("malformed diff: {0}")]
    Merge(#[from] MergeError),

    #[error("patch failed: {0}")]
    Patch(#[from] PatchError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}
