use std::sync::Arc;

use cadence_animation_core::{
    AdditiveOptions, AnimationGroup, DataType, Keyframe, LoopMode, PropertyTarget, Scene,
    TargetId, TargetKind, Track, NO_WEIGHT,
};

fn track(name: &str, keys: &[(f32, f32)]) -> Arc<Track> {
    let mut t = Track::new(name, "value", 30.0, DataType::Float, LoopMode::Cycle).unwrap();
    t.set_keys(keys.iter().map(|&(f, v)| Keyframe::new(f, v)).collect())
        .unwrap();
    Arc::new(t)
}

fn frames(t: &Track) -> Vec<f32> {
    t.keys().iter().map(|k| k.frame).collect()
}

fn values(t: &Track) -> Vec<f32> {
    t.keys().iter().filter_map(|k| k.value.as_float()).collect()
}

fn group(name: &str, entries: &[(Arc<Track>, TargetId)]) -> AnimationGroup {
    let mut g = AnimationGroup::new(name);
    for (t, target) in entries {
        g.add_targeted_animation(Arc::clone(t), *target);
    }
    g
}

/// it should merge groups under `<first>_merged` with the union range and dispose the sources
#[test]
fn merge_groups_unions_ranges() {
    let mut groups = vec![
        group("walk", &[(track("a", &[(0.0, 0.0), (10.0, 1.0)]), TargetId(0))]),
        group("wave", &[(track("b", &[(5.0, 0.0), (20.0, 1.0)]), TargetId(1))]),
    ];
    let merged = AnimationGroup::merge_animation_groups(&mut groups, true, true, None).unwrap();

    assert_eq!(merged.name, "walk_merged");
    assert_eq!((merged.from(), merged.to()), (0.0, 20.0));
    assert_eq!(merged.targeted_animations().len(), 2);
    assert_eq!(merged.weight(), NO_WEIGHT);
    for ta in merged.targeted_animations() {
        assert_eq!(ta.animation.first_frame(), Some(0.0));
        assert_eq!(ta.animation.last_frame(), Some(20.0));
    }
    assert!(groups.iter().all(AnimationGroup::is_disposed));
    assert!(AnimationGroup::merge_animation_groups(&mut [], false, false, None).is_none());
}

/// it should keep the sources and their ranges without dispose or normalize
#[test]
fn merge_groups_without_normalize() {
    let a = track("a", &[(0.0, 0.0), (10.0, 1.0)]);
    let mut groups = vec![
        group("walk", &[(Arc::clone(&a), TargetId(0))]),
        group("wave", &[(track("b", &[(5.0, 0.0), (20.0, 1.0)]), TargetId(1))]),
    ];
    let merged = AnimationGroup::merge_animation_groups(&mut groups, false, false, Some(0.5)).unwrap();
    assert_eq!(merged.weight(), 0.5);
    assert_eq!((merged.from(), merged.to()), (0.0, 20.0));
    assert!(Arc::ptr_eq(&merged.targeted_animations()[0].animation, &a));
    assert_eq!(frames(&a), vec![0.0, 10.0]);
    assert!(groups.iter().all(|g| !g.is_disposed()));
}

/// it should merge registered groups and drop the sources from the scene
#[test]
fn merge_groups_in_scene() {
    let mut scene = Scene::default();
    let n = scene.add_target("n", TargetKind::Node, PropertyTarget::new("n").with_property("value", 0.0));
    let a = scene.add_animation_group(group("a", &[(track("a", &[(0.0, 0.0), (10.0, 1.0)]), n)]));
    let b = scene.add_animation_group(group("b", &[(track("b", &[(5.0, 0.0), (20.0, 1.0)]), n)]));

    let merged = scene
        .merge_animation_groups(&[a, b, a], true, true, None)
        .unwrap()
        .unwrap();
    assert_eq!(scene.groups().len(), 1);
    let group = scene.group(merged).unwrap();
    assert_eq!(group.name, "a_merged");
    assert_eq!(group.targeted_animations().len(), 2);
    assert_eq!((group.from(), group.to()), (0.0, 20.0));
    assert!(scene.group(a).is_none());
    assert_eq!(scene.group_by_name("a_merged"), Some(merged));
}

/// it should leave a track untouched when clipping its full key range
#[test]
fn clipping_the_full_range_is_identity() {
    let original = track("t", &[(0.0, 1.0), (10.0, 2.0), (20.0, 4.0)]);
    let snapshot = (*original).clone();
    let mut g = group("g", &[(original, TargetId(0))]);
    g.clip_keys_in_place(0, 2, true);
    assert_eq!(*g.targeted_animations()[0].animation, snapshot);
    assert_eq!((g.from(), g.to()), (0.0, 20.0));
}

/// it should rebase clipped keys to frame 0 without touching the source group
#[test]
fn clip_keys_copies_on_write() {
    let source = group("walk", &[(track("t", &[(5.0, 1.0), (10.0, 2.0), (20.0, 4.0)]), TargetId(0))]);
    let clip = AnimationGroup::clip_keys(&source, 1, 2, Some("walk_end"), false);

    assert_eq!(clip.name, "walk_end");
    let clipped = &clip.targeted_animations()[0].animation;
    assert_eq!(frames(clipped), vec![0.0, 10.0]);
    assert_eq!(values(clipped), vec![2.0, 4.0]);
    assert_eq!((clip.from(), clip.to()), (0.0, 10.0));
    assert_eq!(frames(&source.targeted_animations()[0].animation), vec![5.0, 10.0, 20.0]);
}

/// it should insert boundary keys when clipping by frame
#[test]
fn clip_frames_inserts_boundaries() {
    let source = group("g", &[(track("t", &[(0.0, 0.0), (10.0, 10.0)]), TargetId(0))]);
    let clip = AnimationGroup::clip_frames(&source, 2.0, 6.0, None, false);
    let clipped = &clip.targeted_animations()[0].animation;
    assert_eq!(clip.name, "g");
    assert_eq!(frames(clipped), vec![0.0, 4.0]);
    assert_eq!(values(clipped), vec![2.0, 6.0]);

    // entries with no key in the window are dropped
    let empty = AnimationGroup::clip_frames(&source, 20.0, 30.0, None, false);
    assert!(empty.targeted_animations().is_empty());
}

/// it should pad every track to the group range with its boundary keys
#[test]
fn normalize_pads_tracks() {
    let mut g = group(
        "g",
        &[
            (track("short", &[(5.0, 1.0), (10.0, 2.0)]), TargetId(0)),
            (track("long", &[(0.0, 0.0), (20.0, 1.0)]), TargetId(1)),
        ],
    );
    g.normalize(None, None);
    let short = &g.targeted_animations()[0].animation;
    assert_eq!(frames(short), vec![0.0, 5.0, 10.0, 20.0]);
    assert_eq!(values(short), vec![1.0, 1.0, 2.0, 2.0]);
    assert_eq!(frames(&g.targeted_animations()[1].animation), vec![0.0, 20.0]);

    g.normalize(Some(-5.0), Some(25.0));
    assert_eq!((g.from(), g.to()), (-5.0, 25.0));
    assert_eq!(g.targeted_animations()[1].animation.first_frame(), Some(-5.0));
}

/// it should not leak edits into other groups sharing a track
#[test]
fn shared_tracks_are_copied_on_edit() {
    let shared = track("t", &[(5.0, 1.0), (10.0, 2.0)]);
    let untouched = group("a", &[(Arc::clone(&shared), TargetId(0))]);
    let mut edited = group("b", &[(Arc::clone(&shared), TargetId(0))]);
    edited.normalize(Some(0.0), Some(30.0));
    assert_eq!(frames(&untouched.targeted_animations()[0].animation), vec![5.0, 10.0]);
    assert_eq!(frames(&edited.targeted_animations()[0].animation), vec![0.0, 5.0, 10.0, 30.0]);

    let deep = untouched.clone_group("deep", true);
    assert!(!Arc::ptr_eq(&deep.targeted_animations()[0].animation, &shared));
    let shallow = untouched.clone_group("shallow", false);
    assert!(Arc::ptr_eq(&shallow.targeted_animations()[0].animation, &shared));
}

/// it should convert a clone to deltas and leave the source absolute
#[test]
fn additive_conversion_of_a_clone() {
    let mut source = group("pose", &[(track("t", &[(0.0, 10.0), (10.0, 20.0), (20.0, 40.0)]), TargetId(0))]);
    let options = AdditiveOptions {
        reference_frame: 0.0,
        clone_original: true,
        cloned_name: Some("pose_additive".into()),
        ..AdditiveOptions::default()
    };
    let additive = AnimationGroup::make_animation_additive(&mut source, &options).unwrap();

    assert_eq!(additive.name, "pose_additive");
    assert!(additive.is_additive());
    assert_eq!(values(&additive.targeted_animations()[0].animation), vec![0.0, 10.0, 30.0]);
    assert!(!source.is_additive());
    assert_eq!(values(&source.targeted_animations()[0].animation), vec![10.0, 20.0, 40.0]);
}

/// it should restrict in-place conversion to a named range
#[test]
fn additive_conversion_in_a_range() {
    let mut t = Track::new("t", "value", 30.0, DataType::Float, LoopMode::Cycle).unwrap();
    t.set_keys(vec![
        Keyframe::new(0.0, 10.0),
        Keyframe::new(10.0, 20.0),
        Keyframe::new(20.0, 40.0),
    ])
    .unwrap();
    t.create_range("tail", 10.0, 20.0);
    let mut source = group("pose", &[(Arc::new(t), TargetId(0))]);
    let options = AdditiveOptions {
        reference_frame: 10.0,
        range: Some("tail".into()),
        ..AdditiveOptions::default()
    };
    assert!(AnimationGroup::make_animation_additive(&mut source, &options).is_none());
    assert!(source.is_additive());
    assert_eq!(values(&source.targeted_animations()[0].animation), vec![10.0, 0.0, 20.0]);
}

/// it should shrink the group range to the tracks left after a removal
#[test]
fn removing_an_entry_shrinks_the_range() {
    let short = track("short", &[(0.0, 0.0), (10.0, 1.0)]);
    let long = track("long", &[(0.0, 0.0), (50.0, 1.0)]);
    let mut g = group("g", &[(Arc::clone(&short), TargetId(0)), (Arc::clone(&long), TargetId(1))]);
    assert_eq!((g.from(), g.to()), (0.0, 50.0));

    g.remove_targeted_animation(&long);
    assert_eq!((g.from(), g.to()), (0.0, 10.0));

    g.normalize(None, None);
    assert_eq!(frames(&g.targeted_animations()[0].animation), vec![0.0, 10.0]);

    let mut groups = vec![g, group("other", &[(track("o", &[(2.0, 0.0), (4.0, 1.0)]), TargetId(2))])];
    let merged = AnimationGroup::merge_animation_groups(&mut groups, false, false, None).unwrap();
    assert_eq!((merged.from(), merged.to()), (0.0, 10.0));
}
