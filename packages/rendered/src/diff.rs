//! Diff payload decoding.
//!
//! Diffs arrive as JSON objects whose keys are short tokens: numeric string
//! keys `"0".."N"` address dynamic slots, `"s"` carries replacement statics
//! (or, inside the component table, a signed integer link), `"c"` the
//! component table, `"k"` a keyed-list block and `"e"` a list of
//! `[name, payload]` events to dispatch after the patch.
//!
//! Decoding is strict: unknown reserved keys, mixed keyed/positional
//! content and non-object payloads surface as [`MergeError::MalformedPayload`]
//! with the offending path.

use crate::error::{DiffPath, MergeError, MergeResult, PathSegment};
use crate::tree::ComponentId;
use indexmap::IndexMap;
use serde_json::Value;

/// Reserved payload keys.
pub const KEY_STATICS: &str = "s";
pub const KEY_COMPONENTS: &str = "c";
pub const KEY_KEYED: &str = "k";
pub const KEY_EVENTS: &str = "e";
/// Inside a `"k"` block: the entry map.
pub const KEY_ENTRIES: &str = "e";
/// Inside a `"k"` block: explicit retained key order.
pub const KEY_RETAIN: &str = "r";
/// Inside a `"k"` block: entry count after merge.
pub const KEY_COUNT: &str = "n";
/// Inside a `"k"` block: reusable per-entry static templates.
pub const KEY_TEMPLATES: &str = "p";

/// Replacement statics for a tree node.
#[derive(Debug, Clone, PartialEq)]
pub enum StaticsDiff {
    Literal(Vec<String>),
    /// Signed component link; only legal inside the component table.
    Link(i32),
}

/// Change to one dynamic slot.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotDiff {
    Leaf(String),
    Tree(TreeDiff),
    Component(ComponentId),
}

/// Statics of one keyed entry in a diff.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryStatics {
    Literal(Vec<String>),
    /// Index into the keyed block's template table.
    Template(u32),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyedEntryDiff {
    pub statics: Option<EntryStatics>,
    pub dynamics: IndexMap<usize, SlotDiff>,
}

/// Keyed-list block of a diff. Entries merge by key (additive); removal and
/// reordering are signaled only through the explicit `retain` list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyedDiff {
    pub entries: IndexMap<String, KeyedEntryDiff>,
    pub retain: Option<Vec<String>>,
    pub count: Option<usize>,
    pub templates: IndexMap<u32, Vec<String>>,
}

/// Partial change to one tree node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TreeDiff {
    pub statics: Option<StaticsDiff>,
    pub dynamics: IndexMap<usize, SlotDiff>,
    pub keyed: Option<KeyedDiff>,
}

impl TreeDiff {
    pub fn is_empty(&self) -> bool {
        self.statics.is_none() && self.dynamics.is_empty() && self.keyed.is_none()
    }
}

/// A complete update payload: the root tree diff, the component table diff
/// and any events to dispatch once the DOM patch has been applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RootDiff {
    pub tree: TreeDiff,
    pub components: IndexMap<i32, TreeDiff>,
    pub events: Vec<(String, Value)>,
}

impl RootDiff {
    /// Decode a wire payload.
    pub fn from_value(value: &Value) -> MergeResult<RootDiff> {
        let mut path = DiffPath::root();
        let obj = expect_object(value, &path)?;

        let mut root = RootDiff::default();
        for (key, entry) in obj {
            match key.as_str() {
                KEY_COMPONENTS => {
                    let comps = expect_object(entry, &path)?;
                    for (id_key, cdiff) in comps {
                        let id = parse_component_key(id_key, &path)?;
                        path.push(PathSegment::Component(id));
                        let decoded = decode_tree(cdiff, &mut path, true)?;
                        path.pop();
                        root.components.insert(id, decoded);
                    }
                }
                KEY_EVENTS => {
                    root.events = decode_events(entry, &path)?;
                }
                _ => {}
            }
        }
        root.tree = decode_tree_fields(obj, &mut path, false)?;
        Ok(root)
    }

    /// True when every statics field in the payload is a literal array — the
    /// requirement for join responses.
    pub fn literal_statics_only(&self) -> bool {
        fn tree_ok(diff: &TreeDiff) -> bool {
            if matches!(diff.statics, Some(StaticsDiff::Link(_))) {
                return false;
            }
            diff.dynamics.values().all(|slot| match slot {
                SlotDiff::Tree(t) => tree_ok(t),
                _ => true,
            })
        }
        tree_ok(&self.tree) && self.components.values().all(tree_ok)
    }
}

fn expect_object<'v>(
    value: &'v Value,
    path: &DiffPath,
) -> MergeResult<&'v serde_json::Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| MergeError::malformed(path, "expected a JSON object"))
}

fn parse_component_key(key: &str, path: &DiffPath) -> MergeResult<i32> {
    let id: i32 = key
        .parse()
        .map_err(|_| MergeError::malformed(path, format!("component key {:?} is not an integer", key)))?;
    if id <= 0 {
        return Err(MergeError::malformed(
            path,
            format!("component key {} must be positive", id),
        ));
    }
    Ok(id)
}

fn decode_tree(value: &Value, path: &mut DiffPath, component_scope: bool) -> MergeResult<TreeDiff> {
    let obj = expect_object(value, path)?;
    decode_tree_fields(obj, path, component_scope)
}

fn decode_tree_fields(
    obj: &serde_json::Map<String, Value>,
    path: &mut DiffPath,
    component_scope: bool,
) -> MergeResult<TreeDiff> {
    let mut diff = TreeDiff::default();

    for (key, entry) in obj {
        if let Ok(index) = key.parse::<usize>() {
            path.push(PathSegment::Slot(index));
            let slot = decode_slot(entry, path)?;
            path.pop();
            diff.dynamics.insert(index, slot);
            continue;
        }
        match key.as_str() {
            KEY_STATICS => {
                diff.statics = Some(decode_statics(entry, path, component_scope)?);
            }
            KEY_KEYED => {
                diff.keyed = Some(decode_keyed(entry, path)?);
            }
            // Root-level reserved keys handled by the caller.
            KEY_COMPONENTS | KEY_EVENTS if path.is_root() => {}
            other => {
                return Err(MergeError::malformed(
                    path,
                    format!("unknown reserved key {:?}", other),
                ));
            }
        }
    }

    if diff.keyed.is_some() && !diff.dynamics.is_empty() {
        return Err(MergeError::malformed(
            path,
            "diff mixes keyed entries and positional slots on one container",
        ));
    }
    Ok(diff)
}

fn decode_statics(value: &Value, path: &DiffPath, component_scope: bool) -> MergeResult<StaticsDiff> {
    match value {
        Value::Array(parts) => Ok(StaticsDiff::Literal(decode_string_array(parts, path)?)),
        Value::Number(n) => {
            if !component_scope {
                return Err(MergeError::malformed(
                    path,
                    "statics link is only valid inside the component table",
                ));
            }
            let id = n
                .as_i64()
                .filter(|id| *id != 0 && i32::try_from(*id).is_ok())
                .ok_or_else(|| MergeError::malformed(path, "statics link must be a nonzero i32"))?;
            Ok(StaticsDiff::Link(id as i32))
        }
        _ => Err(MergeError::malformed(
            path,
            "statics must be an array of fragments or an integer link",
        )),
    }
}

fn decode_slot(value: &Value, path: &mut DiffPath) -> MergeResult<SlotDiff> {
    match value {
        Value::String(text) => Ok(SlotDiff::Leaf(text.clone())),
        Value::Number(n) => {
            let id = n
                .as_i64()
                .filter(|id| *id > 0 && i32::try_from(*id).is_ok())
                .ok_or_else(|| {
                    MergeError::malformed(path, "slot component reference must be a positive i32")
                })?;
            Ok(SlotDiff::Component(ComponentId(id as i32)))
        }
        Value::Object(_) => Ok(SlotDiff::Tree(decode_tree(value, path, false)?)),
        _ => Err(MergeError::malformed(
            path,
            "slot must be a string, a component id or a nested diff",
        )),
    }
}

fn decode_keyed(value: &Value, path: &mut DiffPath) -> MergeResult<KeyedDiff> {
    let obj = expect_object(value, path)?;
    let mut keyed = KeyedDiff::default();

    for (key, entry) in obj {
        match key.as_str() {
            KEY_ENTRIES => {
                let entries = expect_object(entry, path)?;
                for (entry_key, entry_value) in entries {
                    path.push(PathSegment::Key(entry_key.clone()));
                    let decoded = decode_keyed_entry(entry_value, path)?;
                    path.pop();
                    keyed.entries.insert(entry_key.clone(), decoded);
                }
            }
            KEY_RETAIN => {
                let parts = entry
                    .as_array()
                    .ok_or_else(|| MergeError::malformed(path, "retain must be an array of keys"))?;
                let mut retain = Vec::with_capacity(parts.len());
                for part in parts {
                    let key = part
                        .as_str()
                        .ok_or_else(|| MergeError::malformed(path, "retain keys must be strings"))?;
                    retain.push(key.to_string());
                }
                keyed.retain = Some(retain);
            }
            KEY_COUNT => {
                let count = entry
                    .as_u64()
                    .ok_or_else(|| MergeError::malformed(path, "entry count must be an unsigned integer"))?;
                keyed.count = Some(count as usize);
            }
            KEY_TEMPLATES => {
                let templates = expect_object(entry, path)?;
                for (tid_key, statics) in templates {
                    let tid: u32 = tid_key.parse().map_err(|_| {
                        MergeError::malformed(path, format!("template id {:?} is not an integer", tid_key))
                    })?;
                    let parts = statics.as_array().ok_or_else(|| {
                        MergeError::malformed(path, "template statics must be an array")
                    })?;
                    keyed
                        .templates
                        .insert(tid, decode_string_array(parts, path)?);
                }
            }
            other => {
                return Err(MergeError::malformed(
                    path,
                    format!("unknown keyed-block key {:?}", other),
                ));
            }
        }
    }
    Ok(keyed)
}

fn decode_keyed_entry(value: &Value, path: &mut DiffPath) -> MergeResult<KeyedEntryDiff> {
    let obj = expect_object(value, path)?;
    let mut entry = KeyedEntryDiff::default();

    for (key, field) in obj {
        if let Ok(index) = key.parse::<usize>() {
            path.push(PathSegment::Slot(index));
            let slot = decode_slot(field, path)?;
            path.pop();
            entry.dynamics.insert(index, slot);
            continue;
        }
        match key.as_str() {
            KEY_STATICS => match field {
                Value::Array(parts) => {
                    entry.statics = Some(EntryStatics::Literal(decode_string_array(parts, path)?));
                }
                Value::Number(n) => {
                    let tid = n.as_u64().and_then(|t| u32::try_from(t).ok()).ok_or_else(|| {
                        MergeError::malformed(path, "entry template reference must be a u32")
                    })?;
                    entry.statics = Some(EntryStatics::Template(tid));
                }
                _ => {
                    return Err(MergeError::malformed(
                        path,
                        "entry statics must be an array or a template id",
                    ));
                }
            },
            other => {
                return Err(MergeError::malformed(
                    path,
                    format!("unknown keyed-entry key {:?}", other),
                ));
            }
        }
    }
    Ok(entry)
}

fn decode_events(value: &Value, path: &DiffPath) -> MergeResult<Vec<(String, Value)>> {
    let items = value
        .as_array()
        .ok_or_else(|| MergeError::malformed(path, "events must be an array"))?;
    let mut events = Vec::with_capacity(items.len());
    for item in items {
        let pair = item
            .as_array()
            .filter(|pair| pair.len() == 2)
            .ok_or_else(|| MergeError::malformed(path, "each event must be a [name, payload] pair"))?;
        let name = pair[0]
            .as_str()
            .ok_or_else(|| MergeError::malformed(path, "event name must be a string"))?;
        events.push((name.to_string(), pair[1].clone()));
    }
    Ok(events)
}

fn decode_string_array(parts: &[Value], path: &DiffPath) -> MergeResult<Vec<String>> {
    let mut out = Vec::with_capacity(parts.len());
    for part in parts {
        let text = part
            .as_str()
            .ok_or_else(|| MergeError::malformed(path, "static fragments must be strings"))?;
        out.push(text.to_string());
    }
    Ok(out)
}
