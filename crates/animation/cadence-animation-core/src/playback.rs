//! Group playback on a [`Scene`]: start / pause / play / restart / stop / reset,
//! seeking, weights, synchronization, masking and the end / loop barriers that
//! turn per-animatable events into group events.

use std::sync::Arc;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::animatable::{Animatable, GroupLink};
use crate::error::AnimationError;
use crate::events::AnimationEvent;
use crate::group::AnimationGroup;
use crate::ids::{AnimatableId, GroupId, TargetId};
use crate::mask::AnimationGroupMask;
use crate::scene::Scene;

/// Parameters for [`Scene::start_group`]. `None` ranges fall back to the group range.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GroupStart {
    pub loop_animation: bool,
    pub speed_ratio: f32,
    pub from: Option<f32>,
    pub to: Option<f32>,
    pub is_additive: Option<bool>,
}

impl Default for GroupStart {
    fn default() -> Self {
        Self {
            loop_animation: false,
            speed_ratio: 1.0,
            from: None,
            to: None,
            is_additive: None,
        }
    }
}

impl GroupStart {
    pub fn looping() -> Self {
        Self {
            loop_animation: true,
            ..Self::default()
        }
    }
}

impl Scene {
    // ---------- registry ----------

    pub fn add_animation_group(&mut self, mut group: AnimationGroup) -> GroupId {
        let id = self.alloc_group_id();
        group.id = Some(id);
        debug!("add animation group '{}' as {:?}", group.name, id);
        self.groups.push(group);
        id
    }

    pub fn groups(&self) -> &[AnimationGroup] {
        &self.groups
    }

    pub fn group(&self, id: GroupId) -> Option<&AnimationGroup> {
        self.groups.iter().find(|g| g.id == Some(id))
    }

    pub fn group_mut(&mut self, id: GroupId) -> Option<&mut AnimationGroup> {
        self.groups.iter_mut().find(|g| g.id == Some(id))
    }

    pub fn group_by_name(&self, name: &str) -> Option<GroupId> {
        self.groups.iter().find(|g| g.name == name).and_then(|g| g.id)
    }

    fn group_index(&self, id: GroupId) -> Result<usize, AnimationError> {
        self.groups
            .iter()
            .position(|g| g.id == Some(id))
            .ok_or(AnimationError::UnknownGroup(id))
    }

    // ---------- lifecycle ----------

    /// Create one animatable per targeted animation and start playing.
    ///
    /// No-op when the group is already started or has no targeted animations.
    /// Entries whose target is missing or lacks the animated property are skipped.
    pub fn start_group(&mut self, id: GroupId, opts: GroupStart) -> Result<(), AnimationError> {
        let gi = self.group_index(id)?;
        let group = &self.groups[gi];
        if group.is_started || group.targeted_animations().is_empty() {
            return Ok(());
        }
        let from = opts.from.unwrap_or(group.from());
        let to = opts.to.unwrap_or(group.to());
        let is_additive = opts.is_additive.unwrap_or(group.is_additive);
        let weight = group.weight;
        let play_order = group.play_order;
        let name = group.name.clone();
        let entries: Vec<(Arc<_>, TargetId)> = group
            .targeted_animations()
            .iter()
            .map(|ta| (Arc::clone(&ta.animation), ta.target))
            .collect();

        let mut created = Vec::with_capacity(entries.len());
        for (index, (animation, target)) in entries.into_iter().enumerate() {
            let begun = self.begin_direct_animation(
                target,
                &[animation],
                from,
                to,
                opts.loop_animation,
                opts.speed_ratio,
            );
            match begun {
                Ok(aid) => {
                    if let Some(animatable) = self.animatable_mut(aid) {
                        animatable.set_weight(weight);
                        animatable.play_order = play_order;
                        animatable.is_additive = is_additive;
                        animatable.group = Some(GroupLink { group: id, index });
                    }
                    created.push(aid);
                }
                Err(err) => warn!("animation group '{name}': skipping entry {index}: {err}"),
            }
        }

        if created.is_empty() {
            warn!("animation group '{name}': no entry could be bound, not starting");
            return Ok(());
        }

        let group = &mut self.groups[gi];
        let targeted = group.targeted_animations().len();
        group.speed_ratio = opts.speed_ratio;
        group.loop_animation = opts.loop_animation;
        group.is_additive = is_additive;
        group.started_count = created.len();
        group.num_active_animatables = created.len();
        group.animatables = created;
        group.loop_flags = vec![false; targeted];
        group.loop_count = 0;
        group.is_started = true;
        group.is_paused = false;
        debug!(
            "start group '{name}' [{from}, {to}] with {} animatables",
            group.started_count
        );

        self.sync_group_with_mask(id, false)?;
        self.sort_active_animatables();
        self.emit(AnimationEvent::GroupPlayed { group: id });
        self.flush_events();
        Ok(())
    }

    pub fn pause_group(&mut self, id: GroupId) -> Result<(), AnimationError> {
        let gi = self.group_index(id)?;
        if !self.groups[gi].is_started {
            return Ok(());
        }
        self.groups[gi].is_paused = true;
        self.for_each_group_animatable(gi, |a| a.pause());
        self.emit(AnimationEvent::GroupPaused { group: id });
        self.flush_events();
        Ok(())
    }

    /// Resume a started group (optionally changing its loop flag), or start it from scratch.
    pub fn play_group(&mut self, id: GroupId, loop_animation: Option<bool>) -> Result<(), AnimationError> {
        let gi = self.group_index(id)?;
        let group = &self.groups[gi];
        if group.is_started && !group.animatables.is_empty() {
            if let Some(looping) = loop_animation {
                self.set_group_loop_animation(id, looping)?;
            }
            self.restart_group(id)
        } else {
            let opts = GroupStart {
                loop_animation: loop_animation.unwrap_or(group.loop_animation),
                speed_ratio: group.speed_ratio,
                ..GroupStart::default()
            };
            self.stop_group(id, false)?;
            self.start_group(id, opts)
        }
    }

    /// Resume every animatable of a started group; masked targets stay paused.
    pub fn restart_group(&mut self, id: GroupId) -> Result<(), AnimationError> {
        let gi = self.group_index(id)?;
        if !self.groups[gi].is_started {
            return Ok(());
        }
        self.for_each_group_animatable(gi, |a| a.restart());
        self.sync_group_with_mask(id, false)?;
        self.groups[gi].is_paused = false;
        self.emit(AnimationEvent::GroupPlayed { group: id });
        self.flush_events();
        Ok(())
    }

    /// Stop every animatable of the group. With `skip_on_end` no end events are raised.
    pub fn stop_group(&mut self, id: GroupId, skip_on_end: bool) -> Result<(), AnimationError> {
        let gi = self.group_index(id)?;
        if !self.groups[gi].is_started {
            return Ok(());
        }
        let list = self.groups[gi].animatables.clone();
        for aid in list {
            if let Some(animatable) = self.animatable_mut(aid) {
                animatable.remove_runtimes(None);
            }
            self.end_animatable(aid, true, !skip_on_end);
        }
        let gi = self.group_index(id)?;
        let group = &mut self.groups[gi];
        group.animatables.clear();
        group.is_started = false;
        group.is_paused = false;
        debug!("stopped group '{}'", group.name);
        self.flush_events();
        Ok(())
    }

    /// Restore the values the group's animations started from.
    ///
    /// A group that is not playing is briefly started, sought to frame 0 and stopped.
    pub fn reset_group(&mut self, id: GroupId) -> Result<(), AnimationError> {
        let gi = self.group_index(id)?;
        if !self.groups[gi].is_started {
            self.play_group(id, None)?;
            self.go_to_frame_group(id, 0.0, false)?;
            return self.stop_group(id, true);
        }
        for aid in self.groups[gi].animatables.clone() {
            self.reset_animatable(aid)?;
        }
        Ok(())
    }

    /// Seek every animatable of a started group to `frame`.
    pub fn go_to_frame_group(&mut self, id: GroupId, frame: f32, use_weight: bool) -> Result<(), AnimationError> {
        let gi = self.group_index(id)?;
        if !self.groups[gi].is_started {
            return Ok(());
        }
        for aid in self.groups[gi].animatables.clone() {
            self.seek_animatable(aid, frame, use_weight);
        }
        self.apply_compositor();
        Ok(())
    }

    /// Playhead of the group's first animatable.
    pub fn group_current_frame(&self, id: GroupId) -> Option<f32> {
        let group = self.group(id)?;
        let first = group.animatables.first()?;
        self.animatable(*first).map(|a| a.master_frame())
    }

    // ---------- live configuration ----------

    pub fn set_weight_for_all_animatables(&mut self, id: GroupId, weight: f32) -> Result<(), AnimationError> {
        let gi = self.group_index(id)?;
        self.for_each_group_animatable(gi, |a| a.set_weight(weight));
        Ok(())
    }

    /// Make every animatable of the group follow `root` (or run freely with `None`).
    pub fn sync_all_animations_with(&mut self, id: GroupId, root: Option<AnimatableId>) -> Result<(), AnimationError> {
        let gi = self.group_index(id)?;
        for aid in self.groups[gi].animatables.clone() {
            self.sync_animatable_with(aid, root);
        }
        Ok(())
    }

    pub fn set_group_speed_ratio(&mut self, id: GroupId, speed_ratio: f32) -> Result<(), AnimationError> {
        let gi = self.group_index(id)?;
        self.groups[gi].speed_ratio = speed_ratio;
        self.for_each_group_animatable(gi, |a| a.set_speed_ratio(speed_ratio));
        Ok(())
    }

    pub fn set_group_loop_animation(&mut self, id: GroupId, looping: bool) -> Result<(), AnimationError> {
        let gi = self.group_index(id)?;
        self.groups[gi].loop_animation = looping;
        self.for_each_group_animatable(gi, |a| a.loop_animation = looping);
        Ok(())
    }

    pub fn set_group_is_additive(&mut self, id: GroupId, additive: bool) -> Result<(), AnimationError> {
        let gi = self.group_index(id)?;
        self.groups[gi].is_additive = additive;
        self.for_each_group_animatable(gi, |a| a.is_additive = additive);
        Ok(())
    }

    pub fn set_group_weight(&mut self, id: GroupId, weight: f32) -> Result<(), AnimationError> {
        let gi = self.group_index(id)?;
        self.groups[gi].weight = weight;
        self.for_each_group_animatable(gi, |a| a.set_weight(weight));
        Ok(())
    }

    /// Set the play order of the group and its animatables and re-sort the active list.
    pub fn set_group_play_order(&mut self, id: GroupId, play_order: i32) -> Result<(), AnimationError> {
        let gi = self.group_index(id)?;
        self.groups[gi].play_order = play_order;
        self.for_each_group_animatable(gi, |a| a.play_order = play_order);
        self.sort_active_animatables();
        Ok(())
    }

    fn for_each_group_animatable(&mut self, gi: usize, mut f: impl FnMut(&mut Animatable)) {
        let ids = &self.groups[gi].animatables;
        for animatable in self.animatables.iter_mut().filter(|a| ids.contains(&a.id())) {
            f(animatable);
        }
    }

    // ---------- masking ----------

    pub fn set_group_mask(&mut self, id: GroupId, mask: Option<AnimationGroupMask>) -> Result<(), AnimationError> {
        let gi = self.group_index(id)?;
        self.groups[gi].mask = mask;
        self.sync_group_with_mask(id, false)
    }

    fn retains(&self, mask: Option<&AnimationGroupMask>, target: TargetId) -> bool {
        match mask {
            None => true,
            Some(mask) if mask.disabled => true,
            Some(mask) => self
                .target(target)
                .is_some_and(|t| mask.retains_target(t.name())),
        }
    }

    /// Resume animatables whose target the mask retains and pause the others.
    ///
    /// Without a mask (and without `force_update`) every animatable counts as active.
    pub fn sync_group_with_mask(&mut self, id: GroupId, force_update: bool) -> Result<(), AnimationError> {
        let gi = self.group_index(id)?;
        let group = &self.groups[gi];
        if group.mask.is_none() && !force_update {
            self.groups[gi].num_active_animatables = self.groups[gi].animatables.len();
            return Ok(());
        }

        let decisions: Vec<(AnimatableId, bool)> = group
            .animatables
            .iter()
            .filter_map(|aid| {
                let target = self.animatable(*aid)?.target();
                Some((*aid, self.retains(group.mask.as_ref(), target)))
            })
            .collect();

        let mut active = 0;
        for (aid, retained) in decisions {
            let Some(animatable) = self.animatable_mut(aid) else {
                continue;
            };
            if retained {
                active += 1;
                if animatable.is_paused() {
                    animatable.restart();
                }
            } else if !animatable.is_paused() {
                animatable.pause();
            }
        }
        self.groups[gi].num_active_animatables = active;
        Ok(())
    }

    /// Drop every animatable and targeted animation whose target the mask excludes.
    pub fn remove_unmasked_animations(&mut self, id: GroupId) -> Result<(), AnimationError> {
        let gi = self.group_index(id)?;
        let Some(mask) = self.groups[gi].mask.clone() else {
            return Ok(());
        };
        if mask.disabled {
            return Ok(());
        }

        let excluded: Vec<AnimatableId> = self.groups[gi]
            .animatables
            .iter()
            .copied()
            .filter(|aid| {
                self.animatable(*aid)
                    .is_some_and(|a| !self.retains(Some(&mask), a.target()))
            })
            .collect();
        for aid in &excluded {
            if let Some(idx) = self.animatable_index(*aid) {
                self.animatables.remove(idx);
            }
        }

        let keep: Vec<bool> = self.groups[gi]
            .targeted_animations()
            .iter()
            .map(|ta| self.retains(Some(&mask), ta.target))
            .collect();
        let group = &mut self.groups[gi];
        group.animatables.retain(|aid| !excluded.contains(aid));
        group.started_count = group.started_count.saturating_sub(excluded.len());
        let mut index = 0;
        let remap = group.retain_targeted(|_| {
            index += 1;
            keep[index - 1]
        });

        for animatable in self.animatables.iter_mut() {
            let Some(link) = animatable.group.as_mut().filter(|l| l.group == id) else {
                continue;
            };
            match remap.get(link.index).copied().flatten() {
                Some(new_index) => link.index = new_index,
                None => animatable.group = None,
            }
        }
        debug!("group {:?}: removed {} unmasked animatables", id, excluded.len());
        Ok(())
    }

    // ---------- disposal / merge ----------

    /// Stop the group, drop its entries and remove it from the scene.
    pub fn dispose_group(&mut self, id: GroupId) -> Result<AnimationGroup, AnimationError> {
        self.stop_group(id, false)?;
        let gi = self.group_index(id)?;
        let mut group = self.groups.remove(gi);
        group.dispose();
        Ok(group)
    }

    /// Merge registered groups into a new registered group named `<first>_merged`.
    ///
    /// With `dispose_source` the sources are stopped, disposed and removed from the scene.
    pub fn merge_animation_groups(
        &mut self,
        ids: &[GroupId],
        dispose_source: bool,
        normalize: bool,
        weight: Option<f32>,
    ) -> Result<Option<GroupId>, AnimationError> {
        let mut positions = Vec::with_capacity(ids.len());
        for id in ids {
            let pos = self.group_index(*id)?;
            if !positions.contains(&pos) {
                positions.push(pos);
            }
        }
        if dispose_source {
            for id in ids {
                self.stop_group(*id, true)?;
            }
        }

        let mut taken: Vec<AnimationGroup> = positions
            .iter()
            .map(|&p| std::mem::replace(&mut self.groups[p], AnimationGroup::new("")))
            .collect();
        let merged =
            AnimationGroup::merge_animation_groups(&mut taken, dispose_source, normalize, weight);
        for (pos, group) in positions.into_iter().zip(taken) {
            self.groups[pos] = group;
        }
        if dispose_source {
            self.groups
                .retain(|g| !g.id.is_some_and(|id| ids.contains(&id)));
        }
        Ok(merged.map(|group| self.add_animation_group(group)))
    }

    // ---------- aggregation ----------

    pub(crate) fn on_group_member_looped(&mut self, link: GroupLink, target: TargetId) {
        self.emit(AnimationEvent::TargetedAnimationLooped {
            group: link.group,
            index: link.index,
            target,
        });
        let Ok(gi) = self.group_index(link.group) else {
            return;
        };
        let group = &mut self.groups[gi];
        match group.loop_flags.get_mut(link.index) {
            Some(flag) if !*flag => *flag = true,
            _ => return,
        }
        group.loop_count += 1;
        if group.loop_count >= group.num_active_animatables {
            group.loop_count = 0;
            group.loop_flags.fill(false);
            self.emit(AnimationEvent::GroupLooped { group: link.group });
        }
    }

    /// Remove a finished member; once only masked members remain the group ends.
    pub(crate) fn on_group_member_ended(
        &mut self,
        link: GroupLink,
        animatable: AnimatableId,
        target: TargetId,
        raise_end: bool,
    ) {
        if raise_end {
            self.emit(AnimationEvent::TargetedAnimationEnded {
                group: link.group,
                index: link.index,
                target,
            });
        }
        let Ok(gi) = self.group_index(link.group) else {
            return;
        };
        let group = &mut self.groups[gi];
        group.animatables.retain(|a| *a != animatable);
        let inactive = group.started_count.saturating_sub(group.num_active_animatables);
        if !group.is_started || group.animatables.len() > inactive {
            return;
        }

        group.is_started = false;
        group.is_paused = false;
        let leftovers = std::mem::take(&mut group.animatables);
        debug!("group '{}' ended", group.name);
        for aid in leftovers {
            if let Some(idx) = self.animatable_index(aid) {
                self.animatables.remove(idx);
            }
        }
        if raise_end {
            self.emit(AnimationEvent::GroupEnded { group: link.group });
        }
    }
}
