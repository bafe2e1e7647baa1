//! Wire protocol payload shapes and the transport seam.
//!
//! The transport itself — connection management, framing, reconnect policy —
//! is the embedder's concern: the runtime only calls [`Transport::send`]
//! and receives inbound messages through `Runtime::handle_message`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Identifier of a logical view, as carried on the wire and in the
/// child-view boundary marker attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViewId(pub String);

impl ViewId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ViewId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ViewId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Messages the runtime pushes to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join (or re-join) a view. The fingerprint of the current tree is
    /// sent on re-joins so the server can skip unchanged statics.
    Join {
        view: ViewId,
        #[serde(skip_serializing_if = "Option::is_none")]
        fingerprint: Option<String>,
    },
    /// A user interaction, correlated by `ref_id` with its eventual
    /// acknowledgement.
    Event {
        view: ViewId,
        kind: String,
        event: String,
        value: Value,
        #[serde(rename = "ref")]
        ref_id: u64,
    },
    /// Release a view's channel. Never retried.
    Leave { view: ViewId },
}

/// Messages the embedder delivers from the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Successful join: a full render payload (literal statics only) plus
    /// events to dispatch after the first patch.
    JoinOk { view: ViewId, rendered: Value },
    /// Incremental update.
    Diff { view: ViewId, diff: Value },
    /// Acknowledgement of a client event, optionally carrying a diff to
    /// merge before the lock releases.
    Ack {
        view: ViewId,
        #[serde(rename = "ref")]
        ref_id: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        diff: Option<Value>,
    },
    /// Server-side failure of the view.
    Error { view: ViewId, reason: String },
    /// The view's channel closed.
    Close { view: ViewId },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport is closed")]
    Closed,

    #[error("transport failure: {0}")]
    Failed(String),
}

/// Outbound half of the duplex connection.
pub trait Transport {
    fn send(&mut self, message: ClientMessage) -> Result<(), TransportError>;
}
