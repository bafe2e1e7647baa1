//! # Veneer Runtime
//!
//! The view lifecycle layer: one [`Runtime`] per socket connection owns the
//! document, the view registry, the ref/lock scheduler, the hook registry
//! and the transport. Views move through
//! `Disconnected -> Joining -> Joined -> {Disconnected, Errored}`; diffs
//! merge into each view's render state, serialize, and patch the document;
//! client events correlate with server acknowledgements through monotonic
//! refs.
//!
//! Everything is single-threaded and cooperative: the embedder feeds
//! inbound [`ServerMessage`]s to [`Runtime::handle_message`], reports DOM
//! events through [`Runtime::dispatch_event`], and drives timers with
//! [`Runtime::tick`].

pub mod error;
pub mod hooks;
pub mod protocol;
pub mod runtime;
pub mod view;


#[cfg(test)]
mod tests_lifecycle;


pub use error::{RuntimeError, RuntimeResult};
pub use hooks::{Hook, HookContext, HookRegistry};
pub use protocol::{ClientMessage, ServerMessage, Transport, TransportError, ViewId};
pub use runtime::Runtime;
pub use view::{View, ViewState};
