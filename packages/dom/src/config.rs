//! Marker-attribute and class-name configuration.
//!
//! The reconciler and runtime read element-level opt-in markers (update
//! strategy, debounce/throttle intervals, lock propagation, ignored
//! attributes). The exact marker names are an external configuration
//! surface: embedders rename them here without touching any semantics.

use serde::{Deserialize, Serialize};

/// How a container element treats its children during a patch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateStrategy {
    /// Full child reconciliation.
    #[default]
    Replace,
    /// New keyed children land after existing ones; existing keys update
    /// in place and missing keys are not removed.
    Append,
    /// Mirror of `Append`: new keyed children land first.
    Prepend,
    /// Children are left alone entirely after first mount.
    Ignore,
}

impl UpdateStrategy {
    pub fn from_marker(value: &str) -> Option<Self> {
        match value {
            "replace" => Some(UpdateStrategy::Replace),
            "append" => Some(UpdateStrategy::Append),
            "prepend" => Some(UpdateStrategy::Prepend),
            "ignore" => Some(UpdateStrategy::Ignore),
            _ => None,
        }
    }
}

/// Attribute and class names the runtime recognizes on elements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomConfig {
    /// Identity attribute; a matching value beats positional matching.
    pub id_attr: String,
    /// Stable key of an entry inside a keyed container.
    pub key_attr: String,
    /// Behavior tag binding an element to a registered hook.
    pub hook_attr: String,
    /// Marks an element as the boundary of a nested, independently-managed
    /// view; its value is the child view id.
    pub view_attr: String,
    /// Container update strategy marker (`replace|append|prepend|ignore`).
    pub update_attr: String,
    /// Descendants carrying this marker share their ancestor's lock.
    pub lock_attr: String,
    /// Comma-separated attribute patterns to leave untouched on patch;
    /// a trailing `*` matches any suffix.
    pub ignore_attrs_attr: String,
    /// Debounce interval marker, milliseconds.
    pub debounce_attr: String,
    /// Throttle interval marker, milliseconds.
    pub throttle_attr: String,
    /// Marks a form for one-shot value recovery after a reconnect; the
    /// value is the event name pushed with the recovered fields.
    pub auto_recover_attr: String,
    /// Class applied to a locked element while its ref is outstanding.
    pub loading_class: String,
    /// Class applied to the view root while the view is disconnected.
    pub disconnected_class: String,
    /// Class applied to the view root when the view errored.
    pub error_class: String,
}

impl Default for DomConfig {
    fn default() -> Self {
        Self {
            id_attr: "id".into(),
            key_attr: "data-key".into(),
            hook_attr: "data-hook".into(),
            view_attr: "data-view".into(),
            update_attr: "data-update".into(),
            lock_attr: "data-lock".into(),
            ignore_attrs_attr: "data-ignore-attrs".into(),
            debounce_attr: "data-debounce".into(),
            throttle_attr: "data-throttle".into(),
            auto_recover_attr: "data-auto-recover".into(),
            loading_class: "vn-loading".into(),
            disconnected_class: "vn-disconnected".into(),
            error_class: "vn-error".into(),
        }
    }
}
