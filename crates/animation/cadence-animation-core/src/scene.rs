//! Scene: owns targets, the active animatable list and registered groups, and
//! drives them once per host frame.
//!
//! Methods:
//! - targets: add_target, remove_target, target, target_mut, property_value
//! - animatables: begin_direct_animation, stop_animation, stop_animatable, reset_animatable,
//!   go_to_frame_animatable, sync_animatable_with, sort_active_animatables
//! - tick (animate every animatable → resolve compositor → write back → dispatch events)
//! - subscribe / unsubscribe
//!
//! Group playback lives in [`playback`](crate::playback).

use std::fmt;
use std::sync::Arc;

use cadence_api_core::{PropertyPath, Value};
use log::{debug, trace, warn};

use crate::animatable::Animatable;
use crate::binding::{AnimationTarget, TargetResolver};
use crate::compositor::Compositor;
use crate::config::Config;
use crate::error::AnimationError;
use crate::events::{AnimationEvent, Change, Outputs};
use crate::group::AnimationGroup;
use crate::ids::{AnimatableId, GroupId, IdAllocator, SubscriptionId, TargetId};
use crate::runtime::{RuntimeAnimation, WriteContext};
use crate::scratch::Scratch;
use crate::target::TargetKind;
use crate::track::Track;

/// Callback invoked for every event dispatched by the scene.
///
/// Handlers receive the scene mutably and may start, stop or reconfigure
/// animations; events raised from inside a handler are dispatched in the same flush.
pub type EventHandler = Box<dyn FnMut(&mut Scene, &AnimationEvent)>;

struct TargetEntry {
    id: TargetId,
    serialized_id: String,
    kind: TargetKind,
    target: Box<dyn AnimationTarget>,
}

pub struct Scene {
    cfg: Config,
    ids: IdAllocator,
    targets: Vec<TargetEntry>,
    pub(crate) animatables: Vec<Animatable>,
    pub(crate) groups: Vec<AnimationGroup>,
    pub(crate) compositor: Compositor,
    scratch: Scratch,
    animation_time_ms: f64,
    /// When false, `tick` leaves every animation untouched.
    pub animations_enabled: bool,
    outputs: Outputs,
    handlers: Vec<(SubscriptionId, EventHandler)>,
    pending_events: Vec<AnimationEvent>,
    pending_unsubscribes: Vec<SubscriptionId>,
    dispatching: bool,
}

impl fmt::Debug for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scene")
            .field("cfg", &self.cfg)
            .field("targets", &self.targets.len())
            .field("animatables", &self.animatables)
            .field("groups", &self.groups)
            .field("animation_time_ms", &self.animation_time_ms)
            .field("handlers", &self.handlers.len())
            .finish_non_exhaustive()
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Scene {
    pub fn new(cfg: Config) -> Self {
        Self {
            scratch: Scratch::new(&cfg),
            compositor: Compositor::with_capacity(cfg.scratch_bindings),
            cfg,
            ids: IdAllocator::new(),
            targets: Vec::new(),
            animatables: Vec::new(),
            groups: Vec::new(),
            animation_time_ms: 0.0,
            animations_enabled: true,
            outputs: Outputs::default(),
            handlers: Vec::new(),
            pending_events: Vec::new(),
            pending_unsubscribes: Vec::new(),
            dispatching: false,
        }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Accumulated scene animation time in milliseconds.
    pub fn animation_time_ms(&self) -> f64 {
        self.animation_time_ms
    }

    /// Outputs of the last tick plus events raised since.
    pub fn outputs(&self) -> &Outputs {
        &self.outputs
    }

    pub(crate) fn alloc_group_id(&mut self) -> GroupId {
        self.ids.alloc_group()
    }

    // ---------- targets ----------

    /// Register a target under `serialized_id`, the id used by serialized groups.
    pub fn add_target(
        &mut self,
        serialized_id: impl Into<String>,
        kind: TargetKind,
        target: impl AnimationTarget + 'static,
    ) -> TargetId {
        let id = self.ids.alloc_target();
        self.targets.push(TargetEntry {
            id,
            serialized_id: serialized_id.into(),
            kind,
            target: Box::new(target),
        });
        id
    }

    /// Stop every animation of the target and remove it from the scene.
    pub fn remove_target(&mut self, id: TargetId) -> Option<Box<dyn AnimationTarget>> {
        let pos = self.targets.iter().position(|t| t.id == id)?;
        self.stop_animation(id, None);
        self.compositor.forget_target(id);
        Some(self.targets.remove(pos).target)
    }

    pub fn target(&self, id: TargetId) -> Option<&(dyn AnimationTarget + 'static)> {
        self.targets
            .iter()
            .find(|t| t.id == id)
            .map(|t| t.target.as_ref())
    }

    pub fn target_mut(&mut self, id: TargetId) -> Option<&mut (dyn AnimationTarget + 'static)> {
        self.targets
            .iter_mut()
            .find(|t| t.id == id)
            .map(|t| t.target.as_mut())
    }

    pub fn target_kind(&self, id: TargetId) -> Option<TargetKind> {
        self.targets.iter().find(|t| t.id == id).map(|t| t.kind)
    }

    /// Every registered target id, in registration order.
    pub fn target_ids(&self) -> impl Iterator<Item = TargetId> + '_ {
        self.targets.iter().map(|t| t.id)
    }

    /// Current value of `property` on `target`.
    pub fn property_value(&self, target: TargetId, property: &str) -> Option<Value> {
        let path = PropertyPath::parse(property).ok()?;
        let target = self.target(target)?;
        let slot = target.bind_property(&path)?;
        target.read(slot)
    }

    // ---------- animatables ----------

    pub fn animatables(&self) -> &[Animatable] {
        &self.animatables
    }

    pub fn animatable(&self, id: AnimatableId) -> Option<&Animatable> {
        self.animatables.iter().find(|a| a.id() == id)
    }

    pub fn animatable_mut(&mut self, id: AnimatableId) -> Option<&mut Animatable> {
        self.animatables.iter_mut().find(|a| a.id() == id)
    }

    pub(crate) fn animatable_index(&self, id: AnimatableId) -> Option<usize> {
        self.animatables.iter().position(|a| a.id() == id)
    }

    /// Active animatables driving `target`.
    pub fn animatables_for_target(&self, target: TargetId) -> Vec<AnimatableId> {
        self.animatables
            .iter()
            .filter(|a| a.target() == target)
            .map(Animatable::id)
            .collect()
    }

    /// Play `animations` on `target` over `[from, to]`.
    ///
    /// Fails without creating anything when the target is unknown, a track is empty
    /// or a track's property is not exposed by the target.
    pub fn begin_direct_animation(
        &mut self,
        target: TargetId,
        animations: &[Arc<Track>],
        from: f32,
        to: f32,
        loop_animation: bool,
        speed_ratio: f32,
    ) -> Result<AnimatableId, AnimationError> {
        let entry = self
            .targets
            .iter()
            .find(|t| t.id == target)
            .ok_or(AnimationError::UnknownTarget(target))?;
        let runtimes = animations
            .iter()
            .map(|a| RuntimeAnimation::new(Arc::clone(a), target, entry.target.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        let id = self.ids.alloc_animatable();
        let mut animatable = Animatable::new(id, target, from, to, loop_animation, speed_ratio);
        animatable.append_animations(runtimes);
        debug!(
            "begin animatable {:?} on '{}' [{from}, {to}] loop={loop_animation} speed={speed_ratio}",
            id, entry.serialized_id
        );
        self.animatables.push(animatable);
        Ok(id)
    }

    /// Stop the animations of `target`, all or only those animating `property`.
    ///
    /// Animatables left without runtime animations are removed and raise their end events.
    pub fn stop_animation(&mut self, target: TargetId, property: Option<&str>) {
        for id in self.animatables_for_target(target) {
            self.stop_animatable(id, property);
        }
    }

    /// Stop one animatable, optionally only its runtimes animating `property`.
    pub fn stop_animatable(&mut self, id: AnimatableId, property: Option<&str>) {
        let Some(animatable) = self.animatable_mut(id) else {
            return;
        };
        if animatable.remove_runtimes(property) {
            self.end_animatable(id, true, true);
        }
        self.flush_events();
    }

    /// Go back to the start of the range and restore the original property values.
    pub fn reset_animatable(&mut self, id: AnimatableId) -> Result<(), AnimationError> {
        let settings = self.cfg.interp_settings();
        let idx = self.animatable_index(id)
            .ok_or(AnimationError::UnknownAnimatable(id))?;
        let target_id = self.animatables[idx].target();
        let entry = self
            .targets
            .iter_mut()
            .find(|t| t.id == target_id)
            .ok_or(AnimationError::UnknownTarget(target_id))?;
        self.animatables[idx].reset(
            entry.target.as_mut(),
            &mut self.compositor,
            &mut self.outputs.changes,
            settings,
        );
        Ok(())
    }

    /// Jump an animatable to `frame`; playback continues from there on the next tick.
    pub fn go_to_frame_animatable(&mut self, id: AnimatableId, frame: f32, use_weight: bool) {
        self.seek_animatable(id, frame, use_weight);
        self.apply_compositor();
    }

    pub(crate) fn seek_animatable(&mut self, id: AnimatableId, frame: f32, use_weight: bool) {
        let settings = self.cfg.interp_settings();
        let Some(idx) = self.animatable_index(id) else {
            return;
        };
        let target_id = self.animatables[idx].target();
        let Some(entry) = self.targets.iter_mut().find(|t| t.id == target_id) else {
            return;
        };
        self.animatables[idx].go_to_frame(
            frame,
            use_weight,
            entry.target.as_mut(),
            &mut self.compositor,
            &mut self.outputs.changes,
            settings,
        );
    }

    /// Make `id` follow the playhead of `root` (or run freely with `None`).
    ///
    /// The animatable moves to the end of the active list so its root is
    /// evaluated first within a tick.
    pub fn sync_animatable_with(&mut self, id: AnimatableId, root: Option<AnimatableId>) {
        let Some(idx) = self.animatable_index(id) else {
            return;
        };
        let mut animatable = self.animatables.remove(idx);
        animatable.set_sync_root(root.filter(|r| *r != id));
        self.animatables.push(animatable);
    }

    /// Stable sort of the active list by play order.
    pub fn sort_active_animatables(&mut self) {
        self.animatables.sort_by_key(|a| a.play_order);
    }

    /// Remove an animatable from the active list (or only mark it ended when
    /// `remove` is false) and raise the end events.
    pub(crate) fn end_animatable(&mut self, id: AnimatableId, remove: bool, raise_end: bool) {
        let Some(idx) = self.animatable_index(id) else {
            return;
        };
        let animatable = &mut self.animatables[idx];
        if animatable.has_ended() && !remove {
            return;
        }
        animatable.mark_ended();
        let target = animatable.target();
        let link = animatable.group();
        if remove {
            self.animatables.remove(idx);
        }
        trace!("animatable {:?} ended (removed={remove})", id);
        if raise_end {
            self.emit(AnimationEvent::AnimatableEnded {
                animatable: id,
                target,
            });
        }
        if let Some(link) = link {
            self.on_group_member_ended(link, id, target, raise_end);
        }
    }

    // ---------- tick ----------

    /// Advance every active animatable by `delta_ms` of host time.
    ///
    /// Raw values of every animation are computed before weighted properties are
    /// composited and written back; events are dispatched after the write-back.
    pub fn tick(&mut self, delta_ms: f64) -> &Outputs {
        self.scratch.begin_frame();
        self.outputs.clear();

        if self.animations_enabled && !self.animatables.is_empty() {
            let delta = if self.cfg.use_constant_delta_time {
                self.cfg.constant_delta_ms
            } else {
                delta_ms * self.cfg.animation_time_scale
            };
            self.animation_time_ms += delta;
            self.step_animatables();
            self.apply_compositor();
        }

        self.flush_events();
        &self.outputs
    }

    fn step_animatables(&mut self) {
        let now = self.animation_time_ms;
        let settings = self.cfg.interp_settings();
        let mut order = std::mem::take(&mut self.scratch.order);
        let mut fired = std::mem::take(&mut self.scratch.fired);
        order.extend(self.animatables.iter().map(Animatable::id));

        for &id in &order {
            // Earlier animatables may have been stopped by group bookkeeping this tick.
            let Some(idx) = self.animatable_index(id) else {
                continue;
            };
            let sync = self.animatables[idx]
                .sync_root()
                .and_then(|root| self.animatable(root))
                .map(Animatable::sync_state);
            let target_id = self.animatables[idx].target();
            let Some(entry) = self.targets.iter_mut().find(|t| t.id == target_id) else {
                continue;
            };

            fired.clear();
            let mut ctx = WriteContext {
                target: entry.target.as_mut(),
                compositor: &mut self.compositor,
                changes: &mut self.outputs.changes,
                settings,
                is_additive: false,
            };
            let step = self.animatables[idx].animate(now, sync, &mut ctx, &mut fired);

            for event in fired.drain(..) {
                self.emit(AnimationEvent::KeyframeReached {
                    animatable: id,
                    target: target_id,
                    track: event.track,
                    name: event.name,
                    frame: event.frame,
                });
            }
            if step.looped {
                self.on_animatable_looped(id);
            }
            if !step.running {
                let remove = self.animatable(id).map_or(true, |a| a.dispose_on_end);
                self.end_animatable(id, remove, true);
            }
        }

        order.clear();
        self.scratch.order = order;
        self.scratch.fired = fired;
    }

    /// Resolve every weighted property touched since the last resolve and write it back.
    pub(crate) fn apply_compositor(&mut self) {
        if self.compositor.is_empty() {
            return;
        }
        let mut resolved = std::mem::take(&mut self.scratch.resolved);
        self.compositor.resolve_into(&mut resolved);
        for (key, value) in resolved.drain(..) {
            let Some(entry) = self.targets.iter_mut().find(|t| t.id == key.target) else {
                continue;
            };
            entry.target.write(key.slot, value);
            self.outputs.changes.push(Change {
                target: key.target,
                slot: key.slot,
                value,
            });
        }
        self.scratch.resolved = resolved;
    }

    fn on_animatable_looped(&mut self, id: AnimatableId) {
        let Some(animatable) = self.animatable(id) else {
            return;
        };
        let target = animatable.target();
        let link = animatable.group();
        self.emit(AnimationEvent::AnimatableLooped {
            animatable: id,
            target,
        });
        if let Some(link) = link {
            self.on_group_member_looped(link, target);
        }
    }

    // ---------- events ----------

    pub(crate) fn emit(&mut self, event: AnimationEvent) {
        self.pending_events.push(event);
    }

    /// Register a handler for every event the scene raises.
    pub fn subscribe(
        &mut self,
        handler: impl FnMut(&mut Scene, &AnimationEvent) + 'static,
    ) -> SubscriptionId {
        let id = self.ids.alloc_subscription();
        self.handlers.push((id, Box::new(handler)));
        id
    }

    /// Remove a handler. Safe to call from inside a handler; it stops receiving
    /// events immediately.
    pub fn unsubscribe(&mut self, id: SubscriptionId) {
        if self.dispatching {
            self.pending_unsubscribes.push(id);
        }
        self.handlers.retain(|(h, _)| *h != id);
    }

    /// Dispatch queued events to subscribers and record them in the outputs.
    ///
    /// Re-entrant calls (from inside a handler) only queue; the outer flush
    /// delivers everything raised meanwhile.
    pub(crate) fn flush_events(&mut self) {
        if self.dispatching || self.pending_events.is_empty() {
            return;
        }
        self.dispatching = true;
        let mut handlers = std::mem::take(&mut self.handlers);
        let limit = self.cfg.max_events_per_tick;
        let mut dispatched = 0usize;

        while !self.pending_events.is_empty() {
            if dispatched >= limit {
                warn!(
                    "event dispatch limit of {limit} reached; dropping {} events",
                    self.pending_events.len()
                );
                self.pending_events.clear();
                break;
            }
            let mut batch = std::mem::take(&mut self.pending_events);
            batch.truncate(limit - dispatched);
            for event in &batch {
                dispatched += 1;
                for (id, handler) in handlers.iter_mut() {
                    if self.pending_unsubscribes.contains(id) {
                        continue;
                    }
                    handler(self, event);
                }
            }
            self.outputs.events.extend(batch);
        }

        handlers.append(&mut self.handlers);
        let unsubscribed = std::mem::take(&mut self.pending_unsubscribes);
        handlers.retain(|(id, _)| !unsubscribed.contains(id));
        self.handlers = handlers;
        self.dispatching = false;
    }

    /// Stop every group and animatable and drop all groups.
    pub fn dispose(&mut self) {
        let ids: Vec<_> = self.groups.iter().filter_map(AnimationGroup::id).collect();
        for id in ids {
            if let Err(err) = self.stop_group(id, true) {
                warn!("dispose: could not stop group {id:?}: {err}");
            }
        }
        self.animatables.clear();
        self.groups.clear();
        self.pending_events.clear();
        debug!("scene disposed");
    }
}

impl TargetResolver for Scene {
    fn resolve_node(&self, id: &str) -> Option<TargetId> {
        self.targets
            .iter()
            .find(|t| t.kind != TargetKind::MorphTarget && t.serialized_id == id)
            .map(|t| t.id)
    }

    fn resolve_morph_target(&self, id: &str) -> Option<TargetId> {
        self.targets
            .iter()
            .find(|t| t.kind == TargetKind::MorphTarget && t.serialized_id == id)
            .map(|t| t.id)
    }

    fn serialized_id(&self, target: TargetId) -> Option<&str> {
        self.targets
            .iter()
            .find(|t| t.id == target)
            .map(|t| t.serialized_id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::PropertyTarget;
    use crate::track::{Keyframe, KeyframeEvent, LoopMode};
    use cadence_api_core::DataType;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn ramp(keys: &[(f32, f32)]) -> Arc<Track> {
        let mut t = Track::new("ramp", "x", 60.0, DataType::Float, LoopMode::Cycle).unwrap();
        t.set_keys(keys.iter().map(|(f, v)| Keyframe::new(*f, *v)).collect())
            .unwrap();
        Arc::new(t)
    }

    fn scene_with_node() -> (Scene, TargetId) {
        let mut scene = Scene::default();
        let node = scene.add_target(
            "node",
            TargetKind::Node,
            PropertyTarget::new("node").with_property("x", 0.0),
        );
        (scene, node)
    }

    #[test]
    fn unknown_target_or_property_is_rejected() {
        let (mut scene, node) = scene_with_node();
        let err = scene
            .begin_direct_animation(TargetId(99), &[ramp(&[(0.0, 0.0), (60.0, 1.0)])], 0.0, 60.0, false, 1.0)
            .unwrap_err();
        assert!(matches!(err, AnimationError::UnknownTarget(_)));

        let mut t = Track::new("y", "y", 60.0, DataType::Float, LoopMode::Cycle).unwrap();
        t.set_keys(vec![Keyframe::new(0.0, 1.0)]).unwrap();
        let err = scene
            .begin_direct_animation(node, &[Arc::new(t)], 0.0, 60.0, false, 1.0)
            .unwrap_err();
        assert!(matches!(err, AnimationError::UnboundProperty { .. }));
        assert!(scene.animatables().is_empty());
    }

    #[test]
    fn tick_writes_values_and_ends_animatable() {
        let (mut scene, node) = scene_with_node();
        let id = scene
            .begin_direct_animation(node, &[ramp(&[(0.0, 0.0), (60.0, 60.0)])], 0.0, 60.0, false, 1.0)
            .unwrap();
        scene.tick(0.0);
        scene.tick(500.0);
        let x = scene.property_value(node, "x").unwrap().as_float().unwrap();
        assert!((x - 30.0).abs() < 1e-3);

        let outputs = scene.tick(600.0);
        assert!(outputs.events.contains(&AnimationEvent::AnimatableEnded {
            animatable: id,
            target: node
        }));
        assert!(scene.animatable(id).is_none());
        assert_eq!(scene.property_value(node, "x"), Some(Value::Float(60.0)));
    }

    #[test]
    fn handlers_see_events_and_may_stop_animations() {
        let (mut scene, node) = scene_with_node();
        let mut track = (*ramp(&[(0.0, 0.0), (60.0, 60.0)])).clone();
        track.add_event(KeyframeEvent::new(30.0, "half", false));
        let id = scene
            .begin_direct_animation(node, &[Arc::new(track)], 0.0, 60.0, true, 1.0)
            .unwrap();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        scene.subscribe(move |scene, event| {
            if let AnimationEvent::KeyframeReached { animatable, name, .. } = event {
                sink.borrow_mut().push(name.clone());
                scene.stop_animatable(*animatable, None);
            }
        });

        scene.tick(0.0);
        scene.tick(600.0);
        assert_eq!(seen.borrow().as_slice(), ["half"]);
        assert!(scene.animatable(id).is_none());
        assert!(scene
            .outputs()
            .events
            .iter()
            .any(|e| matches!(e, AnimationEvent::AnimatableEnded { .. })));
    }

    #[test]
    fn unsubscribe_inside_handler() {
        let (mut scene, node) = scene_with_node();
        scene
            .begin_direct_animation(node, &[ramp(&[(0.0, 0.0), (10.0, 1.0)])], 0.0, 10.0, true, 1.0)
            .unwrap();
        let count = Rc::new(RefCell::new(0));
        let c = Rc::clone(&count);
        let slot: Rc<RefCell<Option<SubscriptionId>>> = Rc::new(RefCell::new(None));
        let own = Rc::clone(&slot);
        let id = scene.subscribe(move |scene, _| {
            *c.borrow_mut() += 1;
            if let Some(id) = *own.borrow() {
                scene.unsubscribe(id);
            }
        });
        *slot.borrow_mut() = Some(id);

        scene.tick(0.0);
        for _ in 0..5 {
            scene.tick(400.0);
        }
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn resolver_separates_morph_targets() {
        let mut scene = Scene::default();
        let node = scene.add_target("a", TargetKind::Node, PropertyTarget::new("a"));
        let morph = scene.add_target("a", TargetKind::MorphTarget, PropertyTarget::new("a"));
        assert_eq!(scene.resolve_node("a"), Some(node));
        assert_eq!(scene.resolve_morph_target("a"), Some(morph));
        assert_eq!(scene.serialized_id(morph), Some("a"));
        assert_eq!(scene.resolve_node("missing"), None);
    }

    #[test]
    fn time_scale_and_disabled_animations() {
        let cfg = Config {
            animation_time_scale: 0.5,
            ..Config::default()
        };
        let mut scene = Scene::new(cfg);
        let node = scene.add_target("n", TargetKind::Node, PropertyTarget::new("n").with_property("x", 0.0));
        scene
            .begin_direct_animation(node, &[ramp(&[(0.0, 0.0), (60.0, 60.0)])], 0.0, 60.0, false, 1.0)
            .unwrap();
        scene.tick(0.0);
        scene.tick(1000.0);
        let x = scene.property_value(node, "x").unwrap().as_float().unwrap();
        assert!((x - 30.0).abs() < 1e-3);

        scene.animations_enabled = false;
        scene.tick(1000.0);
        let x = scene.property_value(node, "x").unwrap().as_float().unwrap();
        assert!((x - 30.0).abs() < 1e-3);
    }

    #[test]
    fn dispose_stops_playing_groups_and_clears_state() {
        let (mut scene, node) = scene_with_node();
        let mut group = AnimationGroup::new("g");
        group.add_targeted_animation(ramp(&[(0.0, 0.0), (60.0, 60.0)]), node);
        let gid = scene.add_animation_group(group);
        scene
            .start_group(gid, crate::playback::GroupStart::looping())
            .unwrap();
        scene.tick(0.0);
        assert!(!scene.animatables().is_empty());

        scene.dispose();
        assert!(scene.groups().is_empty());
        assert!(scene.animatables().is_empty());
        let outputs = scene.tick(100.0);
        assert!(outputs.events.is_empty());
        assert!(outputs.changes.is_empty());
    }
}
