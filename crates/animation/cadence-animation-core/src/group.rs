//! Animation groups: a set of (track, target) pairs played together.
//!
//! This module holds the group data model and the pure-data operations
//! (normalize, clone, merge, clip, additive conversion). Playback lives on
//! [`Scene`](crate::scene::Scene), which owns the animatables a started group drives.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::ids::{AnimatableId, GroupId, TargetId};
use crate::mask::AnimationGroupMask;
use crate::runtime::NO_WEIGHT;
use crate::track::Track;

/// One track bound to one target inside a group.
#[derive(Clone, Debug)]
pub struct TargetedAnimation {
    pub animation: Arc<Track>,
    pub target: TargetId,
}

/// Options for [`AnimationGroup::make_animation_additive`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdditiveOptions {
    pub reference_frame: f32,
    /// Named range on each track restricting the converted keys.
    pub range: Option<String>,
    /// Convert a clone and leave the source untouched.
    pub clone_original: bool,
    pub cloned_name: Option<String>,
}

#[derive(Debug)]
pub struct AnimationGroup {
    pub name: String,
    pub(crate) id: Option<GroupId>,
    targeted_animations: Vec<TargetedAnimation>,
    pub(crate) animatables: Vec<AnimatableId>,
    from: f32,
    to: f32,
    pub(crate) speed_ratio: f32,
    pub(crate) loop_animation: bool,
    pub(crate) is_additive: bool,
    pub(crate) weight: f32,
    pub(crate) play_order: i32,
    enable_blending: Option<bool>,
    blending_speed: Option<f32>,
    pub(crate) is_started: bool,
    pub(crate) is_paused: bool,
    pub(crate) mask: Option<AnimationGroupMask>,
    pub(crate) num_active_animatables: usize,
    /// Animatables created by the last start.
    pub(crate) started_count: usize,
    pub(crate) loop_flags: Vec<bool>,
    pub(crate) loop_count: usize,
    disposed: bool,
    pub metadata: Option<serde_json::Value>,
    pub tags: Vec<String>,
}

impl AnimationGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            targeted_animations: Vec::new(),
            animatables: Vec::new(),
            from: f32::MAX,
            to: -f32::MAX,
            speed_ratio: 1.0,
            loop_animation: false,
            is_additive: false,
            weight: NO_WEIGHT,
            play_order: 0,
            enable_blending: None,
            blending_speed: None,
            is_started: false,
            is_paused: false,
            mask: None,
            num_active_animatables: 0,
            started_count: 0,
            loop_flags: Vec::new(),
            loop_count: 0,
            disposed: false,
            metadata: None,
            tags: Vec::new(),
        }
    }

    /// Scene id once the group has been added to a scene.
    pub fn id(&self) -> Option<GroupId> {
        self.id
    }

    pub fn targeted_animations(&self) -> &[TargetedAnimation] {
        &self.targeted_animations
    }

    /// Animatables currently driven by this group (empty unless started).
    pub fn animatables(&self) -> &[AnimatableId] {
        &self.animatables
    }

    pub fn from(&self) -> f32 {
        self.from
    }

    pub fn to(&self) -> f32 {
        self.to
    }

    pub fn speed_ratio(&self) -> f32 {
        self.speed_ratio
    }

    pub fn loop_animation(&self) -> bool {
        self.loop_animation
    }

    pub fn is_additive(&self) -> bool {
        self.is_additive
    }

    pub fn weight(&self) -> f32 {
        self.weight
    }

    pub fn play_order(&self) -> i32 {
        self.play_order
    }

    pub fn is_started(&self) -> bool {
        self.is_started
    }

    pub fn is_paused(&self) -> bool {
        self.is_paused
    }

    pub fn is_playing(&self) -> bool {
        self.is_started && !self.is_paused
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn mask(&self) -> Option<&AnimationGroupMask> {
        self.mask.as_ref()
    }

    /// Edit the mask; call `Scene::sync_group_with_mask` afterwards on a playing group.
    pub fn mask_mut(&mut self) -> Option<&mut AnimationGroupMask> {
        self.mask.as_mut()
    }

    pub fn enable_blending(&self) -> Option<bool> {
        self.enable_blending
    }

    pub fn blending_speed(&self) -> Option<f32> {
        self.blending_speed
    }

    /// Configuration setters. For a group playing in a scene use the `Scene::set_group_*`
    /// variants, which also update the running animatables.
    pub fn set_speed_ratio(&mut self, speed_ratio: f32) {
        self.speed_ratio = speed_ratio;
    }

    pub fn set_loop_animation(&mut self, loop_animation: bool) {
        self.loop_animation = loop_animation;
    }

    pub fn set_is_additive(&mut self, is_additive: bool) {
        self.is_additive = is_additive;
    }

    pub fn set_weight(&mut self, weight: f32) {
        self.weight = weight;
    }

    pub fn set_play_order(&mut self, play_order: i32) {
        self.play_order = play_order;
    }

    /// Apply a blending flag to every current and future track of the group.
    pub fn set_enable_blending(&mut self, enable: bool) {
        self.enable_blending = Some(enable);
        for ta in &mut self.targeted_animations {
            Arc::make_mut(&mut ta.animation).enable_blending = enable;
        }
    }

    /// Apply a blending speed to every current and future track of the group.
    pub fn set_blending_speed(&mut self, speed: f32) {
        self.blending_speed = Some(speed);
        for ta in &mut self.targeted_animations {
            Arc::make_mut(&mut ta.animation).blending_speed = speed;
        }
    }

    /// Add a track/target pair; widens the group range to cover the track's keys.
    /// Returns the index of the new entry.
    pub fn add_targeted_animation(&mut self, mut animation: Arc<Track>, target: TargetId) -> usize {
        if let (Some(first), Some(last)) = (animation.first_frame(), animation.last_frame()) {
            self.from = self.from.min(first);
            self.to = self.to.max(last);
        }
        if let Some(enable) = self.enable_blending {
            Arc::make_mut(&mut animation).enable_blending = enable;
        }
        if let Some(speed) = self.blending_speed {
            Arc::make_mut(&mut animation).blending_speed = speed;
        }
        self.targeted_animations
            .push(TargetedAnimation { animation, target });
        self.loop_flags.push(false);
        self.targeted_animations.len() - 1
    }

    /// Remove every entry using `animation` (compared by identity) and shrink the
    /// range to the remaining tracks.
    pub fn remove_targeted_animation(&mut self, animation: &Arc<Track>) {
        self.retain_targeted(|ta| !Arc::ptr_eq(&ta.animation, animation));
        self.recompute_range();
    }

    /// Tightest `[from, to]` over the contained tracks' keys.
    fn recompute_range(&mut self) {
        let (from, to) = self
            .targeted_animations
            .iter()
            .filter_map(|ta| ta.animation.first_frame().zip(ta.animation.last_frame()))
            .fold((f32::MAX, -f32::MAX), |(lo, hi), (first, last)| {
                (lo.min(first), hi.max(last))
            });
        self.from = from;
        self.to = to;
    }

    /// Keep the entries for which `keep` returns true.
    ///
    /// Returns the new index of every previous entry (`None` when removed).
    pub(crate) fn retain_targeted(
        &mut self,
        mut keep: impl FnMut(&TargetedAnimation) -> bool,
    ) -> Vec<Option<usize>> {
        let mut next = 0;
        let remap: Vec<Option<usize>> = self
            .targeted_animations
            .iter()
            .map(|ta| {
                keep(ta).then(|| {
                    next += 1;
                    next - 1
                })
            })
            .collect();
        let flags = remap
            .iter()
            .zip(&self.loop_flags)
            .filter_map(|(r, flag)| r.map(|_| *flag))
            .collect();
        let mut index = 0;
        self.targeted_animations.retain(|_| {
            index += 1;
            remap[index - 1].is_some()
        });
        self.loop_flags = flags;
        remap
    }

    /// Extend every track to cover `[begin, end]` (defaults: the group range) by
    /// duplicating its first / last key, then set the group range to it.
    pub fn normalize(&mut self, begin: Option<f32>, end: Option<f32>) {
        let begin = begin.unwrap_or(self.from);
        let end = end.unwrap_or(self.to);

        for ta in &mut self.targeted_animations {
            let needs_start = ta.animation.first_frame().is_some_and(|f| f > begin);
            let needs_end = ta.animation.last_frame().is_some_and(|f| f < end);
            if !needs_start && !needs_end {
                continue;
            }
            let keys = Arc::make_mut(&mut ta.animation).keys_mut();
            if needs_start {
                let start = keys[0].at_frame(begin);
                keys.insert(0, start);
            }
            if needs_end {
                let last = keys[keys.len() - 1].at_frame(end);
                keys.push(last);
            }
        }

        self.from = begin;
        self.to = end;
    }

    /// Copy of this group's configuration and entries under `new_name`.
    ///
    /// With `clone_animations` every track is deep-copied; otherwise tracks are shared.
    pub fn clone_group(&self, new_name: impl Into<String>, clone_animations: bool) -> AnimationGroup {
        self.clone_group_with_targets(new_name, clone_animations, |t| t)
    }

    /// [`clone_group`](Self::clone_group) with every target mapped through `convert`.
    pub fn clone_group_with_targets(
        &self,
        new_name: impl Into<String>,
        clone_animations: bool,
        convert: impl Fn(TargetId) -> TargetId,
    ) -> AnimationGroup {
        let mut group = AnimationGroup::new(new_name);
        group.speed_ratio = self.speed_ratio;
        group.loop_animation = self.loop_animation;
        group.is_additive = self.is_additive;
        group.weight = self.weight;
        group.play_order = self.play_order;
        group.enable_blending = self.enable_blending;
        group.blending_speed = self.blending_speed;
        group.mask = self.mask.clone();
        group.metadata = self.metadata.clone();
        group.tags = self.tags.clone();

        for ta in &self.targeted_animations {
            let animation = if clone_animations {
                Arc::new((*ta.animation).clone())
            } else {
                Arc::clone(&ta.animation)
            };
            group.add_targeted_animation(animation, convert(ta.target));
        }
        group.from = self.from;
        group.to = self.to;
        group
    }

    /// Drop every entry and mark the group disposed. A group registered with a
    /// scene should be disposed through `Scene::dispose_group`, which stops it first.
    pub fn dispose(&mut self) {
        self.targeted_animations.clear();
        self.animatables.clear();
        self.loop_flags.clear();
        self.loop_count = 0;
        self.is_started = false;
        self.is_paused = false;
        self.disposed = true;
    }

    /// Combine several groups into one named `<first>_merged`.
    ///
    /// The union range is computed before any normalization. `weight` defaults to
    /// the first group's weight. Returns `None` for an empty slice.
    pub fn merge_animation_groups(
        groups: &mut [AnimationGroup],
        dispose_source: bool,
        normalize: bool,
        weight: Option<f32>,
    ) -> Option<AnimationGroup> {
        let first = groups.first()?;
        let weight = weight.unwrap_or(first.weight);
        let mut merged = AnimationGroup::new(format!("{}_merged", first.name));
        merged.weight = weight;

        let begin = groups.iter().map(|g| g.from).fold(f32::MAX, f32::min);
        let end = groups.iter().map(|g| g.to).fold(-f32::MAX, f32::max);

        for group in groups.iter_mut() {
            if normalize {
                group.normalize(Some(begin), Some(end));
            }
            for ta in &group.targeted_animations {
                merged.add_targeted_animation(Arc::clone(&ta.animation), ta.target);
            }
            if dispose_source {
                group.dispose();
            }
        }
        Some(merged)
    }

    /// Clone `source` (sharing tracks) and keep only keys `from_key..=to_key` of every track.
    pub fn clip_keys(
        source: &AnimationGroup,
        from_key: usize,
        to_key: usize,
        name: Option<&str>,
        dont_clone_animations: bool,
    ) -> AnimationGroup {
        let mut group = source.clone_group(name.unwrap_or(&source.name), false);
        group.clip_keys_in_place(from_key, to_key, dont_clone_animations);
        group
    }

    pub fn clip_keys_in_place(&mut self, from_key: usize, to_key: usize, dont_clone_animations: bool) {
        self.clip_in_place(from_key as f32, to_key as f32, dont_clone_animations, false);
    }

    /// Clone `source` (sharing tracks) and keep only the frames in `[from_frame, to_frame]`.
    pub fn clip_frames(
        source: &AnimationGroup,
        from_frame: f32,
        to_frame: f32,
        name: Option<&str>,
        dont_clone_animations: bool,
    ) -> AnimationGroup {
        let mut group = source.clone_group(name.unwrap_or(&source.name), false);
        group.clip_frames_in_place(from_frame, to_frame, dont_clone_animations);
        group
    }

    pub fn clip_frames_in_place(&mut self, from_frame: f32, to_frame: f32, dont_clone_animations: bool) {
        self.clip_in_place(from_frame, to_frame, dont_clone_animations, true);
    }

    /// Keep the keys selected by index (or by frame, inserting boundary keys), rebase
    /// them so each track starts at frame 0, drop tracks left empty and reset the range.
    ///
    /// Tracks shared with other groups are copied before being modified; with
    /// `dont_clone_animations` a track owned only by this group is edited in place.
    pub fn clip_in_place(&mut self, start: f32, end: f32, dont_clone_animations: bool, use_frame: bool) {
        let mut from = f32::MAX;
        let mut to = -f32::MAX;

        self.targeted_animations.retain_mut(|ta| {
            if !dont_clone_animations {
                ta.animation = Arc::new((*ta.animation).clone());
            }
            let track = Arc::make_mut(&mut ta.animation);
            if use_frame {
                track.create_key_for_frame(start);
                track.create_key_for_frame(end);
            }

            let mut start_frame = None;
            let clipped: Vec<_> = track
                .keys()
                .iter()
                .enumerate()
                .filter(|(k, key)| {
                    if use_frame {
                        key.frame >= start && key.frame <= end
                    } else {
                        *k as f32 >= start && *k as f32 <= end
                    }
                })
                .map(|(_, key)| {
                    let base = *start_frame.get_or_insert(key.frame);
                    key.at_frame(key.frame - base)
                })
                .collect();

            let (Some(first), Some(last)) = (clipped.first(), clipped.last()) else {
                return false;
            };
            from = from.min(first.frame);
            to = to.max(last.frame);
            *track.keys_mut() = clipped;
            true
        });

        self.loop_flags = vec![false; self.targeted_animations.len()];
        self.from = from;
        self.to = to;
    }

    /// Convert every track to deltas against the pose at `reference_frame` and mark the group additive.
    pub fn make_additive(&mut self, reference_frame: f32, range: Option<&str>) {
        for ta in &mut self.targeted_animations {
            Arc::make_mut(&mut ta.animation).make_additive(reference_frame, range);
        }
        self.is_additive = true;
    }

    /// Additive conversion per `options`.
    ///
    /// With `clone_original` the source is left untouched and the converted clone
    /// (named `cloned_name`, or the source name) is returned. Otherwise the source
    /// is converted in place and `None` is returned.
    pub fn make_animation_additive(
        source: &mut AnimationGroup,
        options: &AdditiveOptions,
    ) -> Option<AnimationGroup> {
        let range = options.range.as_deref();
        if options.clone_original {
            let name = options.cloned_name.as_deref().unwrap_or(&source.name);
            let mut group = source.clone_group(name, false);
            group.make_additive(options.reference_frame, range);
            Some(group)
        } else {
            source.make_additive(options.reference_frame, range);
            None
        }
    }
}
