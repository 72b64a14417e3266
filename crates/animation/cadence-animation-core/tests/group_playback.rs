use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use cadence_animation_core::{
    AnimationEvent, AnimationGroup, AnimationGroupMask, DataType, GroupId, GroupStart, Keyframe,
    KeyframeEvent, LoopMode, MaskMode, PropertyTarget, Scene, TargetId, TargetKind, Track,
};

fn approx(a: f32, b: f32, eps: f32) {
    assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
}

fn track(fps: f32, keys: &[(f32, f32)]) -> Track {
    let mut t = Track::new("t", "value", fps, DataType::Float, LoopMode::Cycle).unwrap();
    t.set_keys(keys.iter().map(|&(f, v)| Keyframe::new(f, v)).collect())
        .unwrap();
    t
}

fn node(scene: &mut Scene, name: &str, value: f32) -> TargetId {
    scene.add_target(
        name,
        TargetKind::Node,
        PropertyTarget::new(name).with_property("value", value),
    )
}

fn value(scene: &Scene, target: TargetId) -> f32 {
    scene
        .property_value(target, "value")
        .and_then(|v| v.as_float())
        .unwrap()
}

/// Group with one `value` ramp per target, frame == value.
fn ramp_group(scene: &mut Scene, name: &str, targets: &[(TargetId, f32)]) -> GroupId {
    let mut group = AnimationGroup::new(name);
    for &(target, last) in targets {
        group.add_targeted_animation(Arc::new(track(10.0, &[(0.0, 0.0), (last, last)])), target);
    }
    scene.add_animation_group(group)
}

fn has_group_ended(events: &[AnimationEvent], id: GroupId) -> bool {
    events
        .iter()
        .any(|e| matches!(e, AnimationEvent::GroupEnded { group } if *group == id))
}

/// it should play a ramp to its midpoint and clamp to the last key once the run ends
#[test]
fn group_plays_then_clamps_and_ends() {
    let mut scene = Scene::default();
    let n = node(&mut scene, "box", 0.0);
    let mut group = AnimationGroup::new("ramp");
    group.add_targeted_animation(Arc::new(track(1.0, &[(0.0, 0.0), (10.0, 100.0)])), n);
    let gid = scene.add_animation_group(group);
    scene.start_group(gid, GroupStart::default()).unwrap();
    assert!(matches!(
        scene.outputs().events.as_slice(),
        [AnimationEvent::GroupPlayed { group }] if *group == gid
    ));

    scene.tick(0.0);
    scene.tick(5000.0);
    approx(scene.group_current_frame(gid).unwrap(), 5.0, 1e-4);
    approx(value(&scene, n), 50.0, 1e-3);
    assert!(scene.group(gid).unwrap().is_playing());
    assert_eq!(scene.animatables().len(), 1);

    let events = scene.tick(6000.0).events.clone();
    approx(value(&scene, n), 100.0, 1e-4);
    assert!(has_group_ended(&events, gid));
    assert!(events
        .iter()
        .any(|e| matches!(e, AnimationEvent::TargetedAnimationEnded { index: 0, .. })));
    assert!(!scene.group(gid).unwrap().is_started());
    assert!(scene.animatables().is_empty());
}

/// it should blend two weighted groups into their weighted average
#[test]
fn weighted_groups_blend() {
    let mut scene = Scene::default();
    let n = node(&mut scene, "n", 0.0);
    let mut a = AnimationGroup::new("a");
    a.add_targeted_animation(Arc::new(track(60.0, &[(0.0, 10.0), (60.0, 10.0)])), n);
    a.set_weight(0.3);
    let mut b = AnimationGroup::new("b");
    b.add_targeted_animation(Arc::new(track(60.0, &[(0.0, 20.0), (60.0, 20.0)])), n);
    b.set_weight(0.7);
    let a = scene.add_animation_group(a);
    let b = scene.add_animation_group(b);
    scene.start_group(a, GroupStart::looping()).unwrap();
    scene.start_group(b, GroupStart::looping()).unwrap();

    scene.tick(0.0);
    scene.tick(16.0);
    approx(value(&scene, n), 17.0, 1e-4);

    // a lone half-weighted group is filled up with the original value
    scene.stop_group(b, true).unwrap();
    scene.set_group_weight(a, 0.5).unwrap();
    scene.tick(16.0);
    approx(value(&scene, n), 5.0, 1e-4);
}

/// it should layer additive groups on top of the blended base
#[test]
fn additive_group_layers_on_base() {
    let mut scene = Scene::default();
    let n = node(&mut scene, "n", 0.0);
    let mut base = AnimationGroup::new("base");
    base.add_targeted_animation(Arc::new(track(30.0, &[(0.0, 100.0), (30.0, 100.0)])), n);
    base.set_weight(1.0);
    let mut layer = AnimationGroup::new("layer");
    layer.add_targeted_animation(Arc::new(track(30.0, &[(0.0, 10.0), (30.0, 10.0)])), n);
    layer.set_weight(0.5);
    let base = scene.add_animation_group(base);
    let layer = scene.add_animation_group(layer);
    scene.start_group(base, GroupStart::looping()).unwrap();
    scene
        .start_group(
            layer,
            GroupStart {
                is_additive: Some(true),
                ..GroupStart::looping()
            },
        )
        .unwrap();
    assert!(scene.group(layer).unwrap().is_additive());

    scene.tick(0.0);
    approx(value(&scene, n), 105.0, 1e-4);
}

/// it should raise a group loop only once every member has looped
#[test]
fn group_loop_waits_for_every_member() {
    let mut scene = Scene::default();
    let a = node(&mut scene, "a", 0.0);
    let b = node(&mut scene, "b", 0.0);
    let gid = ramp_group(&mut scene, "g", &[(a, 10.0), (b, 20.0)]);
    scene.start_group(gid, GroupStart::looping()).unwrap();

    let group_loops = |events: &[AnimationEvent]| {
        events
            .iter()
            .filter(|e| matches!(e, AnimationEvent::GroupLooped { .. }))
            .count()
    };
    let member_loops = |events: &[AnimationEvent]| {
        events
            .iter()
            .filter(|e| matches!(e, AnimationEvent::TargetedAnimationLooped { .. }))
            .count()
    };

    scene.tick(0.0);
    scene.tick(500.0);
    let events = scene.tick(500.0).events.clone();
    assert_eq!(member_loops(&events), 1);
    assert_eq!(group_loops(&events), 0);

    scene.tick(500.0);
    let events = scene.tick(500.0).events.clone();
    assert_eq!(member_loops(&events), 2);
    assert_eq!(group_loops(&events), 1);
}

/// it should fire repeating markers every loop and one-shot markers once
#[test]
fn keyframe_markers_across_loops() {
    let mut scene = Scene::default();
    let n = node(&mut scene, "n", 0.0);
    let mut t = track(10.0, &[(0.0, 0.0), (10.0, 10.0)]);
    t.add_event(KeyframeEvent::new(5.0, "tick", false));
    t.add_event(KeyframeEvent::new(3.0, "once", true));
    scene
        .begin_direct_animation(n, &[Arc::new(t)], 0.0, 10.0, true, 1.0)
        .unwrap();

    let mut names = Vec::new();
    scene.tick(0.0);
    for _ in 0..7 {
        for event in &scene.tick(400.0).events {
            if let AnimationEvent::KeyframeReached { name, .. } = event {
                names.push(name.clone());
            }
        }
    }
    assert_eq!(names.iter().filter(|n| *n == "once").count(), 1);
    assert_eq!(names.iter().filter(|n| *n == "tick").count(), 3);
}

/// it should freeze while paused and continue after a restart
#[test]
fn pause_and_restart() {
    let mut scene = Scene::default();
    let n = node(&mut scene, "n", 0.0);
    let gid = ramp_group(&mut scene, "g", &[(n, 100.0)]);
    scene.start_group(gid, GroupStart::default()).unwrap();
    scene.tick(0.0);
    scene.tick(1000.0);
    approx(value(&scene, n), 10.0, 1e-4);

    scene.pause_group(gid).unwrap();
    assert!(scene.group(gid).unwrap().is_paused());
    assert!(!scene.group(gid).unwrap().is_playing());
    scene.tick(1000.0);
    scene.tick(1000.0);
    approx(value(&scene, n), 10.0, 1e-4);

    scene.restart_group(gid).unwrap();
    scene.tick(1000.0);
    // the tick that registered the pause still counted as playing time
    approx(value(&scene, n), 20.0, 1e-4);
}

/// it should seek immediately and keep playing from the sought frame
#[test]
fn go_to_frame_then_continue() {
    let mut scene = Scene::default();
    let n = node(&mut scene, "n", 0.0);
    let gid = ramp_group(&mut scene, "g", &[(n, 100.0)]);
    scene.start_group(gid, GroupStart::default()).unwrap();
    scene.tick(0.0);

    scene.go_to_frame_group(gid, 50.0, false).unwrap();
    approx(value(&scene, n), 50.0, 1e-4);
    scene.tick(1000.0);
    approx(value(&scene, n), 60.0, 1e-4);
}

/// it should restore original values on reset and restart the clock
#[test]
fn reset_playing_group() {
    let mut scene = Scene::default();
    let n = node(&mut scene, "n", 0.0);
    let gid = ramp_group(&mut scene, "g", &[(n, 100.0)]);
    scene.start_group(gid, GroupStart::default()).unwrap();
    scene.tick(0.0);
    scene.tick(3000.0);
    approx(value(&scene, n), 30.0, 1e-4);

    scene.reset_group(gid).unwrap();
    approx(value(&scene, n), 0.0, 1e-6);
    scene.tick(500.0);
    approx(value(&scene, n), 0.0, 1e-4);
    scene.tick(1000.0);
    approx(value(&scene, n), 10.0, 1e-4);
}

/// it should apply frame 0 to a stopped group on reset and leave it stopped
#[test]
fn reset_stopped_group() {
    let mut scene = Scene::default();
    let n = node(&mut scene, "n", 42.0);
    let mut group = AnimationGroup::new("g");
    group.add_targeted_animation(Arc::new(track(10.0, &[(0.0, 5.0), (10.0, 15.0)])), n);
    let gid = scene.add_animation_group(group);

    scene.reset_group(gid).unwrap();
    approx(value(&scene, n), 5.0, 1e-6);
    assert!(!scene.group(gid).unwrap().is_started());
    assert!(scene.animatables().is_empty());
}

/// it should keep the playhead continuous when the speed changes mid-run
#[test]
fn speed_change_is_continuous() {
    let mut scene = Scene::default();
    let n = node(&mut scene, "n", 0.0);
    let gid = ramp_group(&mut scene, "g", &[(n, 100.0)]);
    scene.start_group(gid, GroupStart::default()).unwrap();
    scene.tick(0.0);
    scene.tick(1000.0);
    approx(value(&scene, n), 10.0, 1e-4);

    scene.set_group_speed_ratio(gid, 2.0).unwrap();
    scene.tick(1000.0);
    approx(value(&scene, n), 30.0, 1e-3);
}

/// it should map a follower's range onto its root's playhead
#[test]
fn synced_animatable_follows_root() {
    let mut scene = Scene::default();
    let a = node(&mut scene, "a", 0.0);
    let b = node(&mut scene, "b", 0.0);
    let root = scene
        .begin_direct_animation(a, &[Arc::new(track(10.0, &[(0.0, 0.0), (10.0, 10.0)]))], 0.0, 10.0, true, 1.0)
        .unwrap();
    let follower = scene
        .begin_direct_animation(b, &[Arc::new(track(10.0, &[(0.0, 0.0), (20.0, 20.0)]))], 0.0, 20.0, true, 1.0)
        .unwrap();
    scene.sync_animatable_with(root, None);
    scene.sync_animatable_with(follower, Some(root));
    assert_eq!(scene.animatables().last().unwrap().id(), follower);

    scene.tick(0.0);
    scene.tick(500.0);
    approx(value(&scene, a), 5.0, 1e-4);
    approx(value(&scene, b), 10.0, 1e-4);
}

/// it should ramp from the current value when blending is enabled
#[test]
fn blending_eases_in() {
    let mut scene = Scene::default();
    let n = node(&mut scene, "n", 100.0);
    let mut group = AnimationGroup::new("g");
    group.set_enable_blending(true);
    group.set_blending_speed(0.5);
    group.add_targeted_animation(Arc::new(track(10.0, &[(0.0, 0.0), (10.0, 0.0)])), n);
    let gid = scene.add_animation_group(group);
    scene.start_group(gid, GroupStart::looping()).unwrap();

    let mut seen = Vec::new();
    for delta in [0.0, 100.0, 100.0, 100.0] {
        scene.tick(delta);
        seen.push(value(&scene, n));
    }
    approx(seen[0], 100.0, 1e-4);
    approx(seen[1], 50.0, 1e-4);
    approx(seen[2], 0.0, 1e-4);
    approx(seen[3], 0.0, 1e-4);
}

/// it should pause masked-out targets and keep the decision stable across syncs
#[test]
fn mask_sync_is_idempotent() {
    let mut scene = Scene::default();
    let a = node(&mut scene, "a", 0.0);
    let b = node(&mut scene, "b", 0.0);
    let gid = ramp_group(&mut scene, "g", &[(a, 10.0), (b, 10.0)]);
    scene
        .set_group_mask(gid, Some(AnimationGroupMask::new(["a"], MaskMode::Include)))
        .unwrap();
    scene.start_group(gid, GroupStart::looping()).unwrap();

    let paused = |scene: &Scene| -> Vec<(TargetId, bool)> {
        scene
            .animatables()
            .iter()
            .map(|x| (x.target(), x.is_paused()))
            .collect()
    };
    let first = paused(&scene);
    assert_eq!(first, vec![(a, false), (b, true)]);
    scene.sync_group_with_mask(gid, false).unwrap();
    assert_eq!(paused(&scene), first);
    scene.sync_group_with_mask(gid, true).unwrap();
    assert_eq!(paused(&scene), first);

    scene.tick(0.0);
    scene.tick(500.0);
    approx(value(&scene, a), 5.0, 1e-4);
    approx(value(&scene, b), 0.0, 1e-6);

    scene.remove_unmasked_animations(gid).unwrap();
    let group = scene.group(gid).unwrap();
    assert_eq!(group.targeted_animations().len(), 1);
    assert_eq!(group.targeted_animations()[0].target, a);
    assert_eq!(group.animatables().len(), 1);
    assert_eq!(scene.animatables().len(), 1);
}

/// it should end the group once only masked members are left
#[test]
fn masked_members_do_not_hold_the_group_open() {
    let mut scene = Scene::default();
    let a = node(&mut scene, "a", 0.0);
    let b = node(&mut scene, "b", 0.0);
    let gid = ramp_group(&mut scene, "g", &[(a, 10.0), (b, 10.0)]);
    scene
        .set_group_mask(gid, Some(AnimationGroupMask::new(["b"], MaskMode::Exclude)))
        .unwrap();
    scene.start_group(gid, GroupStart::default()).unwrap();

    scene.tick(0.0);
    let events = scene.tick(1500.0).events.clone();
    assert!(has_group_ended(&events, gid));
    assert!(scene.animatables().is_empty());
    approx(value(&scene, b), 0.0, 1e-6);
}

/// it should let a handler stop the group that raised the event
#[test]
fn handler_stops_group_on_loop() {
    let mut scene = Scene::default();
    let a = node(&mut scene, "a", 0.0);
    let b = node(&mut scene, "b", 0.0);
    let gid = ramp_group(&mut scene, "g", &[(a, 10.0), (b, 10.0)]);
    scene.start_group(gid, GroupStart::looping()).unwrap();

    let calls = Rc::new(RefCell::new(0));
    let seen = Rc::clone(&calls);
    scene.subscribe(move |scene, event| {
        if let AnimationEvent::TargetedAnimationLooped { group, .. } = event {
            *seen.borrow_mut() += 1;
            scene.stop_group(*group, false).unwrap();
        }
    });

    scene.tick(0.0);
    scene.tick(600.0);
    let events = scene.tick(600.0).events.clone();
    assert_eq!(*calls.borrow(), 2);
    assert!(has_group_ended(&events, gid));
    assert!(!scene.group(gid).unwrap().is_started());
    assert!(scene.animatables().is_empty());
}

/// it should stop only the animations of the given property
#[test]
fn stop_animation_by_property() {
    let mut scene = Scene::default();
    let n = scene.add_target(
        "n",
        TargetKind::Node,
        PropertyTarget::new("n")
            .with_property("value", 0.0)
            .with_property("other", 0.0),
    );
    let mut other = Track::new("o", "other", 10.0, DataType::Float, LoopMode::Cycle).unwrap();
    other
        .set_keys(vec![Keyframe::new(0.0, 0.0), Keyframe::new(10.0, 1.0)])
        .unwrap();
    let id = scene
        .begin_direct_animation(
            n,
            &[Arc::new(track(10.0, &[(0.0, 0.0), (10.0, 10.0)])), Arc::new(other)],
            0.0,
            10.0,
            true,
            1.0,
        )
        .unwrap();

    scene.stop_animation(n, Some("other"));
    let animatable = scene.animatable(id).unwrap();
    assert_eq!(animatable.runtime_animations().len(), 1);
    assert_eq!(animatable.runtime_animations()[0].target_property(), "value");

    scene.stop_animation(n, None);
    assert!(scene.animatable(id).is_none());
    assert!(scene
        .outputs()
        .events
        .iter()
        .any(|e| matches!(e, AnimationEvent::AnimatableEnded { animatable, .. } if *animatable == id)));
}

/// it should stop and remove a disposed group
#[test]
fn dispose_group_removes_it() {
    let mut scene = Scene::default();
    let n = node(&mut scene, "n", 0.0);
    let gid = ramp_group(&mut scene, "g", &[(n, 10.0)]);
    scene.start_group(gid, GroupStart::looping()).unwrap();
    scene.tick(0.0);

    let group = scene.dispose_group(gid).unwrap();
    assert!(group.is_disposed());
    assert!(group.targeted_animations().is_empty());
    assert!(scene.group(gid).is_none());
    assert!(scene.animatables().is_empty());
    assert!(scene.start_group(gid, GroupStart::default()).is_err());
}

/// it should skip entries whose property the target lacks
#[test]
fn unbindable_entries_are_skipped() {
    let mut scene = Scene::default();
    let good = node(&mut scene, "good", 0.0);
    let bare = scene.add_target("bare", TargetKind::Node, PropertyTarget::new("bare"));
    let gid = ramp_group(&mut scene, "g", &[(good, 10.0), (bare, 10.0)]);
    scene.start_group(gid, GroupStart::default()).unwrap();
    assert_eq!(scene.group(gid).unwrap().animatables().len(), 1);

    let only_bare = ramp_group(&mut scene, "bare_only", &[(bare, 10.0)]);
    scene.start_group(only_bare, GroupStart::default()).unwrap();
    assert!(!scene.group(only_bare).unwrap().is_started());
}
