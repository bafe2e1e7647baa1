//! The runtime object and the view state machine transitions.
//!
//! One `Runtime` per socket connection. All per-connection state — the view
//! registry, the ref counter, the document — lives here with an explicit
//! lifecycle rather than in module-level globals, so independent runtimes
//! coexist (tests construct several side by side).
//!
//! Processing is strictly ordered per view: `handle_message` applies a diff
//! to completion — merge, serialize, patch, lifecycle callbacks, event
//! dispatch — before returning, so a queued next diff for the same view
//! can never interleave.

use crate::error::{RuntimeError, RuntimeResult};
use crate::hooks::{BoundHook, Hook, HookContext, HookRegistry};
use crate::protocol::{ClientMessage, ServerMessage, Transport, ViewId};
use crate::view::{View, ViewState};
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};
use veneer_dom::reconciler::{patch, patch_node, AttrFilter, PatchContext, PatchObserver, PatchReport};
use veneer_dom::{Document, DomConfig, NodeId};
use veneer_rendered::{Rendered, RootDiff};
use veneer_scheduler::{AckOutcome, EventKind, EventRef, ScheduleDecision, Scheduler, TimerKey, TimerSpec};

/// Everything needed to push one client event, stored with deferred timers.
#[derive(Debug, Clone)]
struct PendingPush {
    view: ViewId,
    kind: EventKind,
    event: String,
    value: Value,
}

enum PatchTarget {
    /// Replace the view root's content.
    Root,
    /// Replay buffered outer markup against one element.
    Node(NodeId),
}

/// Client runtime for one socket connection.
pub struct Runtime {
    config: DomConfig,
    document: Document,
    views: IndexMap<String, View>,
    scheduler: Scheduler<NodeId, PendingPush>,
    registry: HookRegistry,
    ignore: AttrFilter,
    transport: Box<dyn Transport>,
    /// All elements locked under a ref: the event source plus descendants
    /// carrying the lock-propagation marker.
    ref_scopes: HashMap<u64, Vec<NodeId>>,
}

impl Runtime {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self::with_config(transport, DomConfig::default())
    }

    pub fn with_config(transport: Box<dyn Transport>, config: DomConfig) -> Self {
        Self {
            config,
            document: Document::new(),
            views: IndexMap::new(),
            scheduler: Scheduler::new(),
            registry: HookRegistry::new(),
            ignore: AttrFilter::new(),
            transport,
            ref_scopes: HashMap::new(),
        }
    }

    pub fn config(&self) -> &DomConfig {
        &self.config
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Mutable document access for embedder setup (creating view containers,
    /// reporting focus changes).
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn hooks_mut(&mut self) -> &mut HookRegistry {
        &mut self.registry
    }

    /// Runtime-wide ignore-attribute rules, applied on top of per-element
    /// markers.
    pub fn set_ignore_attrs(&mut self, filter: AttrFilter) {
        self.ignore = filter;
    }

    pub fn view(&self, id: &ViewId) -> Option<&View> {
        self.views.get(id.as_str())
    }

    fn view_mut(&mut self, id: &ViewId) -> RuntimeResult<&mut View> {
        self.views
            .get_mut(id.as_str())
            .ok_or_else(|| RuntimeError::UnknownView(id.0.clone()))
    }

    /// Register a view rooted at an existing element and send its join
    /// request.
    pub fn mount(&mut self, id: impl Into<ViewId>, root: NodeId) -> RuntimeResult<()> {
        let id = id.into();
        if self.views.contains_key(id.as_str()) {
            return Err(RuntimeError::DuplicateView(id.0));
        }
        self.views
            .insert(id.0.clone(), View::new(id.clone(), root, None));
        self.join(&id)
    }

    /// Send a join request. On re-joins the current tree fingerprint rides
    /// along so the server can skip unchanged statics.
    pub fn join(&mut self, id: &ViewId) -> RuntimeResult<()> {
        let view = self.view_mut(id)?;
        if matches!(view.state, ViewState::Joining | ViewState::Joined) {
            return Ok(());
        }
        view.state = ViewState::Joining;
        let fingerprint = view.join_fingerprint();
        let message = ClientMessage::Join {
            view: id.clone(),
            fingerprint,
        };
        self.transport.send(message)?;
        Ok(())
    }

    /// Re-join after a disconnect or error. The transport owns backoff;
    /// this is the runtime half of the reconnect handshake.
    pub fn reconnect(&mut self, id: &ViewId) -> RuntimeResult<()> {
        self.join(id)
    }

    /// Process one inbound server message to completion.
    pub fn handle_message(&mut self, message: ServerMessage, now_ms: u64) -> RuntimeResult<()> {
        match message {
            ServerMessage::JoinOk { view, rendered } => self.handle_join_ok(&view, &rendered, now_ms),
            ServerMessage::Diff { view, diff } => self.handle_diff(&view, &diff),
            ServerMessage::Ack { view, ref_id, diff } => self.handle_ack(&view, ref_id, diff),
            ServerMessage::Error { view, reason } => self.handle_server_error(&view, &reason),
            ServerMessage::Close { view } => self.handle_close(&view),
        }
    }

    fn handle_join_ok(&mut self, id: &ViewId, payload: &Value, now_ms: u64) -> RuntimeResult<()> {
        self.view_mut(id)?;
        let result = self.try_join_ok(id, payload, now_ms);
        if result.is_err() {
            self.mark_errored(id);
        }
        result
    }

    fn try_join_ok(&mut self, id: &ViewId, payload: &Value, now_ms: u64) -> RuntimeResult<()> {
        let decoded = RootDiff::from_value(payload)?;
        if !decoded.literal_statics_only() {
            return Err(RuntimeError::NonLiteralJoin(id.0.clone()));
        }

        // A join response replaces the tree wholesale.
        let rendered = Rendered::default().merge(&decoded)?;
        let markup = rendered.to_markup()?;

        let report = self.apply_patch(id, PatchTarget::Root, &markup)?;

        {
            let view = self.view_mut(id)?;
            view.rendered = rendered;
            view.state = ViewState::Joined;
            view.join_count += 1;
        }
        let root = self.view_mut(id)?.root;
        let disconnected_class = self.config.disconnected_class.clone();
        let error_class = self.config.error_class.clone();
        self.document.remove_class(root, &disconnected_class);
        self.document.remove_class(root, &error_class);

        self.process_report(id, report)?;
        self.run_reconnected_hooks(id);
        self.restore_focus(id);
        self.recover_forms_once(id, now_ms)?;

        // Patch-then-notify: join events go out only after the DOM settled.
        self.dispatch_view_events(id, &decoded.events)?;
        debug!(view = %id, "view joined");
        Ok(())
    }

    fn handle_diff(&mut self, id: &ViewId, diff: &Value) -> RuntimeResult<()> {
        let view = self.view_mut(id)?;
        if !view.is_joined() {
            debug!(view = %id, "dropping diff for non-joined view");
            return Ok(());
        }
        let result = self.try_diff(id, diff);
        if result.is_err() {
            self.mark_errored(id);
        }
        result
    }

    fn try_diff(&mut self, id: &ViewId, diff: &Value) -> RuntimeResult<()> {
        let decoded = RootDiff::from_value(diff)?;
        let view = self.view_mut(id)?;
        let next = view.rendered.merge(&decoded)?;
        let markup = next.to_markup()?;
        view.rendered = next;

        let report = self.apply_patch(id, PatchTarget::Root, &markup)?;
        self.process_report(id, report)?;

        // Events embedded in the diff dispatch strictly after the patch.
        self.dispatch_view_events(id, &decoded.events)?;
        Ok(())
    }

    fn handle_ack(&mut self, id: &ViewId, ref_id: u64, diff: Option<Value>) -> RuntimeResult<()> {
        match self.scheduler.ack(EventRef(ref_id)) {
            AckOutcome::Stale => {
                // Only the most recent ref on an element matters.
                self.ref_scopes.remove(&ref_id);
                debug!(view = %id, ref_id, "ignoring stale acknowledgement");
                Ok(())
            }
            AckOutcome::Acked { element, buffered } => {
                let scope = self.ref_scopes.remove(&ref_id).unwrap_or_default();
                let mut replays: Vec<(NodeId, String)> = Vec::new();
                if let Some(markup) = buffered {
                    replays.push((element, markup));
                }
                let loading = self.config.loading_class.clone();
                self.document.remove_class(element, &loading);
                for extra in scope {
                    if extra == element {
                        continue;
                    }
                    if let Some(unlocked) = self.scheduler.unlock_element(extra) {
                        if let Some(markup) = unlocked.buffered {
                            replays.push((extra, markup));
                        }
                    }
                    self.document.remove_class(extra, &loading);
                }

                if let Some(diff) = diff {
                    // The embedded diff re-renders the whole view now that
                    // the lock is gone; buffered markup is superseded.
                    self.handle_diff(id, &diff)
                } else {
                    for (node, markup) in replays {
                        if !self.document.contains(node) {
                            continue;
                        }
                        let report = self.apply_patch(id, PatchTarget::Node(node), &markup)?;
                        self.process_report(id, report)?;
                    }
                    Ok(())
                }
            }
        }
    }

    fn handle_server_error(&mut self, id: &ViewId, reason: &str) -> RuntimeResult<()> {
        warn!(view = %id, reason, "server reported view error");
        self.view_mut(id)?;
        self.mark_errored(id);
        Ok(())
    }

    /// The view's channel closed: transition to `Disconnected`, remember
    /// the focused element for a restoration attempt on reconnect, and run
    /// `disconnected` on every bound hook.
    fn handle_close(&mut self, id: &ViewId) -> RuntimeResult<()> {
        let root = {
            let view = self.view_mut(id)?;
            view.state = ViewState::Disconnected;
            view.root
        };
        let disconnected_class = self.config.disconnected_class.clone();
        self.document.add_class(root, &disconnected_class);

        // Outstanding refs died with the connection; their locks must not
        // survive into the rejoin patch.
        let locked: Vec<NodeId> = self.scheduler.locked_elements().collect();
        let loading = self.config.loading_class.clone();
        for node in locked {
            if self.is_inside_view(node, root) {
                self.scheduler.unlock_element(node);
                self.document.remove_class(node, &loading);
            }
        }

        if let Some(focused) = self.document.focused() {
            if self.is_inside_view(focused, root) {
                let selection = self.document.selection();
                let view = self.view_mut(id)?;
                view.saved_focus = Some(focused);
                view.saved_selection = selection;
                self.document.set_focus(None);
            }
        }

        let mut pushes = Vec::new();
        {
            let Self { document, views, .. } = self;
            if let Some(view) = views.get_mut(id.as_str()) {
                let nodes: Vec<NodeId> = view.hooks.keys().copied().collect();
                for node in nodes {
                    if let Some(bound) = view.hooks.get_mut(&node) {
                        run_hook(document, &view.id, node, bound, &mut pushes, |hook, ctx| {
                            hook.disconnected(ctx)
                        });
                    }
                    view.disconnected_hooks.insert(node);
                }
            }
        }
        // The channel is gone; hook pushes made during disconnect are moot.
        drop(pushes);
        debug!(view = %id, "view disconnected");
        Ok(())
    }

    /// Destroy a view: children first (leaves before parent), `destroyed`
    /// on every bound hook, then release the channel and drop the view.
    pub fn destroy_view(&mut self, id: &ViewId) -> RuntimeResult<()> {
        self.destroy_view_inner(id, true)
    }

    /// Tear down every view owned by this runtime.
    pub fn destroy_all(&mut self) -> RuntimeResult<()> {
        let roots: Vec<ViewId> = self
            .views
            .values()
            .filter(|view| view.parent.is_none())
            .map(|view| view.id.clone())
            .collect();
        for id in roots {
            self.destroy_view(&id)?;
        }
        Ok(())
    }

    fn destroy_view_inner(&mut self, id: &ViewId, send_leave: bool) -> RuntimeResult<()> {
        let Some(view) = self.views.get(id.as_str()) else {
            return Ok(());
        };
        let children: Vec<ViewId> = view.children.iter().cloned().collect();
        for child in children {
            self.destroy_view_inner(&child, send_leave)?;
        }

        let mut pushes = Vec::new();
        {
            let Self { document, views, .. } = self;
            if let Some(view) = views.get_mut(id.as_str()) {
                for (node, mut bound) in view.hooks.drain() {
                    run_hook(document, &view.id, node, &mut bound, &mut pushes, |hook, ctx| {
                        hook.destroyed(ctx)
                    });
                }
            }
        }
        drop(pushes);

        if let Some(view) = self.views.get(id.as_str()) {
            let root = view.root;
            let parent = view.parent.clone();
            self.scheduler.cancel_element(root);
            for node in self.document.descendant_elements(root) {
                self.scheduler.cancel_element(node);
            }
            if let Some(parent) = parent {
                if let Some(parent_view) = self.views.get_mut(parent.as_str()) {
                    parent_view.children.shift_remove(id);
                }
            }
        }

        if send_leave {
            // A leave in flight is never retried; a dead transport is fine.
            if let Err(err) = self.transport.send(ClientMessage::Leave { view: id.clone() }) {
                debug!(view = %id, %err, "leave not delivered");
            }
        }
        self.views.shift_remove(id.as_str());
        debug!(view = %id, "view destroyed");
        Ok(())
    }

    /// A user interaction observed by the embedder. Debounce/throttle
    /// markers on the element decide whether the push happens now or on a
    /// later [`Runtime::tick`].
    pub fn dispatch_event(
        &mut self,
        element: NodeId,
        kind: EventKind,
        event: &str,
        value: Value,
        key: Option<&str>,
        now_ms: u64,
    ) -> RuntimeResult<()> {
        let Some(view_id) = self.owning_view(element) else {
            warn!(?element, "event from element outside any view");
            return Ok(());
        };
        let Some(view) = self.views.get(view_id.as_str()) else {
            return Ok(());
        };
        if !view.is_joined() {
            // Errored/disconnected views suspend event dispatch entirely.
            debug!(view = %view_id, "dropping event while view is not joined");
            return Ok(());
        }

        let spec = self.timer_spec(element);
        let payload = PendingPush {
            view: view_id,
            kind,
            event: event.to_string(),
            value,
        };
        if spec.is_immediate() {
            return self.push_now(element, payload, now_ms);
        }

        let mut timer_key = TimerKey::new(element, event);
        if matches!(kind, EventKind::KeyDown | EventKind::KeyUp) {
            if let Some(key) = key {
                timer_key = timer_key.with_key(key);
            }
        }
        let blocked = self.scheduler.is_locked(element);
        match self
            .scheduler
            .schedule(timer_key, spec, blocked, payload.clone(), now_ms)
        {
            ScheduleDecision::FireNow => self.push_now(element, payload, now_ms),
            ScheduleDecision::Deferred { .. }
            | ScheduleDecision::Coalesced
            | ScheduleDecision::Blocked => Ok(()),
        }
    }

    /// Blur/submit path: cancel the element's pending timers and push any
    /// uncommitted value immediately.
    pub fn flush_element(&mut self, element: NodeId, now_ms: u64) -> RuntimeResult<()> {
        for fire in self.scheduler.flush(element, now_ms) {
            self.push_now(fire.element, fire.payload, now_ms)?;
        }
        Ok(())
    }

    /// Drive due debounce/throttle timers.
    pub fn tick(&mut self, now_ms: u64) -> RuntimeResult<()> {
        for fire in self.scheduler.advance(now_ms) {
            self.push_now(fire.element, fire.payload, now_ms)?;
        }
        Ok(())
    }

    fn push_now(&mut self, element: NodeId, push: PendingPush, now_ms: u64) -> RuntimeResult<()> {
        let Some(view) = self.views.get(push.view.as_str()) else {
            return Ok(());
        };
        if !view.is_joined() {
            debug!(view = %push.view, "dropping deferred push for non-joined view");
            return Ok(());
        }
        if !self.document.contains(element) {
            return Ok(());
        }

        let ref_id = self.scheduler.next_ref();
        self.scheduler.track(ref_id, element, push.kind, now_ms);

        // Lock the source element plus descendants opted into propagation,
        // and mark them visually loading.
        let mut scope = vec![element];
        for node in self.document.descendant_elements(element) {
            if self.document.attr(node, &self.config.lock_attr).is_some() {
                scope.push(node);
            }
        }
        let loading = self.config.loading_class.clone();
        for node in &scope {
            self.scheduler.lock(*node, ref_id);
            self.document.add_class(*node, &loading);
        }
        self.ref_scopes.insert(ref_id.0, scope);

        self.transport.send(ClientMessage::Event {
            view: push.view,
            kind: push.kind.as_str().to_string(),
            event: push.event,
            value: push.value,
            ref_id: ref_id.0,
        })?;
        Ok(())
    }

    // Patching plumbing.

    fn apply_patch(
        &mut self,
        id: &ViewId,
        target: PatchTarget,
        markup: &str,
    ) -> RuntimeResult<PatchReport> {
        let locked: HashSet<NodeId> = self.scheduler.locked_elements().collect();
        let mut pushes: Vec<(String, Value)> = Vec::new();

        let report = {
            let Self {
                config,
                document,
                views,
                ignore,
                ..
            } = self;
            let view = views
                .get_mut(id.as_str())
                .ok_or_else(|| RuntimeError::UnknownView(id.0.clone()))?;
            let root = view.root;
            let mut observer = HookObserver {
                hooks: &mut view.hooks,
                view: id.clone(),
                pushes: &mut pushes,
            };
            let mut ctx = PatchContext {
                config,
                locked: &locked,
                ignore,
                observer: &mut observer,
            };
            match target {
                PatchTarget::Root => patch(document, root, markup, &mut ctx)?,
                PatchTarget::Node(node) => patch_node(document, node, markup, &mut ctx)?,
            }
        };

        for (element, markup) in &report.deferred {
            self.scheduler.buffer_patch(*element, markup.clone());
        }
        for node in &report.removed_nodes {
            self.scheduler.cancel_element(*node);
        }
        {
            let view = self.view_mut(id)?;
            for node in &report.removed_nodes {
                view.disconnected_hooks.remove(node);
            }
        }
        self.send_hook_pushes(id, pushes)?;
        Ok(report)
    }

    /// Act on a patch report: bind and mount new hooks, notify updated
    /// ones, mount new child views and tear down discarded ones.
    fn process_report(&mut self, id: &ViewId, report: PatchReport) -> RuntimeResult<()> {
        let mut pushes: Vec<(String, Value)> = Vec::new();
        {
            let Self {
                config,
                document,
                views,
                registry,
                ..
            } = self;
            let view = views
                .get_mut(id.as_str())
                .ok_or_else(|| RuntimeError::UnknownView(id.0.clone()))?;

            for node in &report.created_hooks {
                let Some(tag) = document.attr(*node, &config.hook_attr) else {
                    continue;
                };
                let Some(instance) = registry.instantiate(tag) else {
                    continue;
                };
                let mut bound = BoundHook::new(instance);
                run_hook(document, &view.id, *node, &mut bound, &mut pushes, |hook, ctx| {
                    hook.mounted(ctx)
                });
                view.hooks.insert(*node, bound);
            }

            for node in &report.updated_hooks {
                if let Some(bound) = view.hooks.get_mut(node) {
                    run_hook(document, &view.id, *node, bound, &mut pushes, |hook, ctx| {
                        hook.updated(ctx)
                    });
                }
            }
        }
        self.send_hook_pushes(id, pushes)?;

        for boundary in &report.mounted_views {
            self.mount_child_view(id, *boundary)?;
        }
        for child in &report.removed_views {
            let child_id = ViewId::new(child.clone());
            self.destroy_view_inner(&child_id, true)?;
        }
        Ok(())
    }

    /// A markup subtree flagged as an independent view boundary mounts as
    /// its own view with a back-reference to its parent.
    fn mount_child_view(&mut self, parent: &ViewId, boundary: NodeId) -> RuntimeResult<()> {
        let Some(child_id) = self
            .document
            .attr(boundary, &self.config.view_attr)
            .map(|id| ViewId::new(id.to_string()))
        else {
            return Ok(());
        };
        if self.views.contains_key(child_id.as_str()) {
            return Ok(());
        }
        self.views.insert(
            child_id.0.clone(),
            View::new(child_id.clone(), boundary, Some(parent.clone())),
        );
        if let Some(parent_view) = self.views.get_mut(parent.as_str()) {
            parent_view.children.insert(child_id.clone());
        }
        self.join(&child_id)
    }

    fn run_reconnected_hooks(&mut self, id: &ViewId) {
        let mut pushes = Vec::new();
        {
            let Self { document, views, .. } = self;
            let Some(view) = views.get_mut(id.as_str()) else {
                return;
            };
            if view.join_count <= 1 {
                view.disconnected_hooks.clear();
                return;
            }
            // Symmetry: only hooks that observed `disconnected` reconnect.
            let nodes: Vec<NodeId> = view.disconnected_hooks.drain().collect();
            for node in nodes {
                if let Some(bound) = view.hooks.get_mut(&node) {
                    run_hook(document, &view.id, node, bound, &mut pushes, |hook, ctx| {
                        hook.reconnected(ctx)
                    });
                }
            }
        }
        let _ = self.send_hook_pushes(id, pushes);
    }

    fn restore_focus(&mut self, id: &ViewId) {
        let Ok(view) = self.view_mut(id) else {
            return;
        };
        let (focus, selection) = (view.saved_focus.take(), view.saved_selection.take());
        if let Some(node) = focus {
            if self.document.contains(node) {
                self.document.set_focus(Some(node));
                self.document.set_selection(selection);
            }
        }
    }

    /// One-shot form recovery, scoped by join_count so a reconnect recovers
    /// each form once rather than on every re-render.
    fn recover_forms_once(&mut self, id: &ViewId, now_ms: u64) -> RuntimeResult<()> {
        let (root, due) = {
            let view = self.view_mut(id)?;
            let due = view.join_count > 1 && view.recovered_at_join < view.join_count;
            if due {
                view.recovered_at_join = view.join_count;
            }
            (view.root, due)
        };
        if !due {
            return Ok(());
        }

        let mut recoveries: Vec<(NodeId, String, Value)> = Vec::new();
        for node in self.document.descendant_elements(root) {
            if self.document.tag(node) != Some("form") {
                continue;
            }
            let Some(event) = self.document.attr(node, &self.config.auto_recover_attr) else {
                continue;
            };
            let event = if event.is_empty() { "recover" } else { event };
            let fields = self.form_fields(node);
            if !fields.is_empty() {
                recoveries.push((node, event.to_string(), Value::Object(fields)));
            }
        }

        for (form, event, value) in recoveries {
            let push = PendingPush {
                view: id.clone(),
                kind: EventKind::Form,
                event,
                value,
            };
            self.push_now(form, push, now_ms)?;
        }
        Ok(())
    }

    fn form_fields(&self, form: NodeId) -> serde_json::Map<String, Value> {
        let mut fields = serde_json::Map::new();
        for node in self.document.descendant_elements(form) {
            if !matches!(self.document.tag(node), Some("input" | "textarea" | "select")) {
                continue;
            }
            let Some(name) = self.document.attr(node, "name") else {
                continue;
            };
            let value = self.document.attr(node, "value").unwrap_or_default();
            fields.insert(name.to_string(), Value::String(value.to_string()));
        }
        fields
    }

    /// Dispatch server events to hooks that subscribed to them, strictly
    /// after the patch that carried them.
    fn dispatch_view_events(&mut self, id: &ViewId, events: &[(String, Value)]) -> RuntimeResult<()> {
        if events.is_empty() {
            return Ok(());
        }
        let mut pushes = Vec::new();
        {
            let Self { document, views, .. } = self;
            let Some(view) = views.get_mut(id.as_str()) else {
                return Ok(());
            };
            for (name, payload) in events {
                let mut handled = false;
                for (node, bound) in view.hooks.iter_mut() {
                    if !bound.subscribed_to(name) {
                        continue;
                    }
                    handled = true;
                    run_hook(document, &view.id, *node, bound, &mut pushes, |hook, ctx| {
                        hook.handle_event(name, payload, ctx)
                    });
                }
                if !handled {
                    debug!(view = %id, event = name, "server event had no subscriber");
                }
            }
        }
        self.send_hook_pushes(id, pushes)
    }

    /// Hook-originated pushes ride the event channel with a correlation
    /// ref but no lock or pending tracking.
    fn send_hook_pushes(&mut self, id: &ViewId, pushes: Vec<(String, Value)>) -> RuntimeResult<()> {
        for (event, value) in pushes {
            let ref_id = self.scheduler.next_ref();
            self.transport.send(ClientMessage::Event {
                view: id.clone(),
                kind: "hook".to_string(),
                event,
                value,
                ref_id: ref_id.0,
            })?;
        }
        Ok(())
    }

    fn mark_errored(&mut self, id: &ViewId) {
        let error_class = self.config.error_class.clone();
        if let Some(view) = self.views.get_mut(id.as_str()) {
            view.state = ViewState::Errored;
            let root = view.root;
            self.document.add_class(root, &error_class);
        }
    }

    fn timer_spec(&self, element: NodeId) -> TimerSpec {
        let read = |attr: &str| {
            self.document
                .attr(element, attr)
                .map(|value| value.trim().parse::<u64>().unwrap_or(0))
        };
        TimerSpec {
            debounce_ms: read(&self.config.debounce_attr),
            throttle_ms: read(&self.config.throttle_attr),
        }
    }

    /// The view owning an element: the nearest ancestor (or self) that is
    /// some view's root.
    fn owning_view(&self, element: NodeId) -> Option<ViewId> {
        let mut cursor = Some(element);
        while let Some(node) = cursor {
            for view in self.views.values() {
                if view.root == node {
                    return Some(view.id.clone());
                }
            }
            cursor = self.document.parent(node);
        }
        None
    }

    fn is_inside_view(&self, node: NodeId, root: NodeId) -> bool {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if current == root {
                return true;
            }
            cursor = self.document.parent(current);
        }
        false
    }
}

/// Run one hook entry point with a fresh context, folding any new event
/// subscriptions back into the binding.
fn run_hook(
    doc: &Document,
    view: &ViewId,
    node: NodeId,
    bound: &mut BoundHook,
    pushes: &mut Vec<(String, Value)>,
    entry: impl FnOnce(&mut dyn Hook, &mut HookContext<'_>),
) {
    let mut subscriptions = Vec::new();
    {
        let mut ctx = HookContext::new(doc, node, view, pushes, &mut subscriptions);
        entry(bound.instance.as_mut(), &mut ctx);
    }
    bound.subscriptions.extend(subscriptions);
}

/// Bridges the reconciler's in-flight callbacks onto bound hooks:
/// `before_update` ahead of an element's mutation, `destroyed` ahead of
/// its removal.
struct HookObserver<'a> {
    hooks: &'a mut HashMap<NodeId, BoundHook>,
    view: ViewId,
    pushes: &'a mut Vec<(String, Value)>,
}

impl PatchObserver for HookObserver<'_> {
    fn before_update(&mut self, doc: &Document, node: NodeId) {
        if let Some(bound) = self.hooks.get_mut(&node) {
            run_hook(doc, &self.view, node, bound, self.pushes, |hook, ctx| {
                hook.before_update(ctx)
            });
        }
    }

    fn discarded(&mut self, doc: &Document, node: NodeId) {
        if let Some(mut bound) = self.hooks.remove(&node) {
            run_hook(doc, &self.view, node, &mut bound, self.pushes, |hook, ctx| {
                hook.destroyed(ctx)
            });
        }
    }
}
