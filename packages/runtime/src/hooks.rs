//! Behavior hooks: user code bound to elements by a string tag.
//!
//! A hook definition registers under a tag; the runtime instantiates one
//! hook per bound element and drives its lifecycle:
//! `mounted -> (before_update/updated)* -> destroyed`, with
//! `disconnected`/`reconnected` around connection loss. `destroyed` always
//! fires before the element is removed and before `mounted` fires for any
//! replacement at the same position.
//!
//! Both closures and trait implementations normalize into one adapter at
//! registration time ([`HookRegistry::register`] takes any factory), so
//! dispatch is a plain dynamic call with no capability probing.

use crate::protocol::ViewId;
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;
use veneer_dom::{Document, NodeId};

/// Context handed to every hook entry point: a read view of the document,
/// the element the hook is bound to, and a handle to push events upstream
/// and subscribe to inbound events for this element's lifetime.
pub struct HookContext<'a> {
    pub doc: &'a Document,
    pub element: NodeId,
    pub view: &'a ViewId,
    pushes: &'a mut Vec<(String, Value)>,
    subscriptions: &'a mut Vec<String>,
}

impl<'a> HookContext<'a> {
    pub(crate) fn new(
        doc: &'a Document,
        element: NodeId,
        view: &'a ViewId,
        pushes: &'a mut Vec<(String, Value)>,
        subscriptions: &'a mut Vec<String>,
    ) -> Self {
        Self {
            doc,
            element,
            view,
            pushes,
            subscriptions,
        }
    }

    /// Push an event to the server on behalf of this hook's element.
    pub fn push_event(&mut self, event: impl Into<String>, payload: Value) {
        self.pushes.push((event.into(), payload));
    }

    /// Subscribe to inbound events of the given name. The subscription
    /// lives exactly as long as the hook's element.
    pub fn subscribe(&mut self, event: impl Into<String>) {
        self.subscriptions.push(event.into());
    }

    /// Convenience accessor for the bound element's attribute.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.doc.attr(self.element, name)
    }
}

/// A behavior bound to an element. Every entry point is optional.
pub trait Hook {
    fn mounted(&mut self, _ctx: &mut HookContext<'_>) {}
    fn before_update(&mut self, _ctx: &mut HookContext<'_>) {}
    fn updated(&mut self, _ctx: &mut HookContext<'_>) {}
    fn disconnected(&mut self, _ctx: &mut HookContext<'_>) {}
    fn reconnected(&mut self, _ctx: &mut HookContext<'_>) {}
    fn destroyed(&mut self, _ctx: &mut HookContext<'_>) {}
    /// An inbound event this hook subscribed to.
    fn handle_event(&mut self, _name: &str, _payload: &Value, _ctx: &mut HookContext<'_>) {}
}

type HookFactory = Box<dyn Fn() -> Box<dyn Hook>>;

/// Tag-to-definition registry. Resolution happens once at bind time.
#[derive(Default)]
pub struct HookRegistry {
    factories: HashMap<String, HookFactory>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook definition under a tag.
    pub fn register<F, H>(&mut self, tag: impl Into<String>, factory: F)
    where
        F: Fn() -> H + 'static,
        H: Hook + 'static,
    {
        self.factories
            .insert(tag.into(), Box::new(move || Box::new(factory())));
    }

    /// Instantiate the hook for a tag, if one is registered.
    pub fn instantiate(&self, tag: &str) -> Option<Box<dyn Hook>> {
        match self.factories.get(tag) {
            Some(factory) => Some(factory()),
            None => {
                warn!(tag, "no hook registered for behavior tag");
                None
            }
        }
    }

    pub fn is_registered(&self, tag: &str) -> bool {
        self.factories.contains_key(tag)
    }
}

/// A hook instance bound to one element.
pub(crate) struct BoundHook {
    pub instance: Box<dyn Hook>,
    pub subscriptions: Vec<String>,
}

impl BoundHook {
    pub fn new(instance: Box<dyn Hook>) -> Self {
        Self {
            instance,
            subscriptions: Vec::new(),
        }
    }

    pub fn subscribed_to(&self, event: &str) -> bool {
        self.subscriptions.iter().any(|name| name == event)
    }
}
