//! An animatable drives every runtime animation of one target with a shared
//! clock, range, speed, weight and loop flag.

use crate::binding::AnimationTarget;
use crate::compositor::Compositor;
use crate::config::InterpSettings;
use crate::events::Change;
use crate::ids::{AnimatableId, GroupId, TargetId};
use crate::runtime::{FiredEvent, Playback, RuntimeAnimation, SyncRoot, WriteContext, NO_WEIGHT};

/// Back-reference from an animatable to the group entry that created it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GroupLink {
    pub group: GroupId,
    /// Index of the targeted animation inside the group.
    pub index: usize,
}

/// Result of one `animate` call.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct AnimatableStep {
    pub running: bool,
    pub looped: bool,
}

#[derive(Debug)]
pub struct Animatable {
    id: AnimatableId,
    target: TargetId,
    runtimes: Vec<RuntimeAnimation>,
    pub from_frame: f32,
    pub to_frame: f32,
    pub loop_animation: bool,
    speed_ratio: f32,
    weight: f32,
    previous_weight: f32,
    pub play_order: i32,
    pub is_additive: bool,
    pub dispose_on_end: bool,
    paused: bool,
    animation_started: bool,
    ended: bool,
    local_delay_offset: Option<f64>,
    paused_delay: Option<f64>,
    manual_jump_delay: Option<f64>,
    frame_to_sync_from_jump: Option<f32>,
    go_to_frame: Option<f32>,
    sync_root: Option<AnimatableId>,
    pub(crate) group: Option<GroupLink>,
}

impl Animatable {
    pub fn new(
        id: AnimatableId,
        target: TargetId,
        from_frame: f32,
        to_frame: f32,
        loop_animation: bool,
        speed_ratio: f32,
    ) -> Self {
        Self {
            id,
            target,
            runtimes: Vec::new(),
            from_frame,
            to_frame,
            loop_animation,
            speed_ratio,
            weight: NO_WEIGHT,
            previous_weight: NO_WEIGHT,
            play_order: 0,
            is_additive: false,
            dispose_on_end: true,
            paused: false,
            animation_started: false,
            ended: false,
            local_delay_offset: None,
            paused_delay: None,
            manual_jump_delay: None,
            frame_to_sync_from_jump: None,
            go_to_frame: None,
            sync_root: None,
            group: None,
        }
    }

    pub fn id(&self) -> AnimatableId {
        self.id
    }

    pub fn target(&self) -> TargetId {
        self.target
    }

    pub fn runtime_animations(&self) -> &[RuntimeAnimation] {
        &self.runtimes
    }

    pub fn append_animations(&mut self, runtimes: impl IntoIterator<Item = RuntimeAnimation>) {
        self.runtimes.extend(runtimes);
    }

    pub fn runtime_by_target_property(&self, property: &str) -> Option<&RuntimeAnimation> {
        self.runtimes.iter().find(|r| r.target_property() == property)
    }

    /// Current frame of the first runtime animation, or 0 when there is none.
    pub fn master_frame(&self) -> f32 {
        self.runtimes.first().map_or(0.0, |r| r.current_frame())
    }

    pub fn group(&self) -> Option<GroupLink> {
        self.group
    }

    pub fn sync_root(&self) -> Option<AnimatableId> {
        self.sync_root
    }

    pub(crate) fn set_sync_root(&mut self, root: Option<AnimatableId>) {
        self.sync_root = root;
    }

    pub(crate) fn sync_state(&self) -> SyncRoot {
        SyncRoot {
            master_frame: self.master_frame(),
            from: self.from_frame,
            to: self.to_frame,
        }
    }

    pub fn speed_ratio(&self) -> f32 {
        self.speed_ratio
    }

    /// Change speed without a jump in the playhead.
    pub fn set_speed_ratio(&mut self, speed_ratio: f32) {
        for runtime in &mut self.runtimes {
            runtime.prepare_for_speed_ratio_change(speed_ratio);
        }
        self.speed_ratio = speed_ratio;
        if let Some(frame) = self.go_to_frame {
            self.schedule_jump(frame);
        }
    }

    pub fn weight(&self) -> f32 {
        self.weight
    }

    /// `-1` disables weighting (direct writes); other values are used as given.
    pub fn set_weight(&mut self, weight: f32) {
        self.weight = weight;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn animation_started(&self) -> bool {
        self.animation_started
    }

    pub fn has_ended(&self) -> bool {
        self.ended
    }

    pub(crate) fn mark_ended(&mut self) {
        self.ended = true;
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn restart(&mut self) {
        self.paused = false;
    }

    pub fn enable_blending(&mut self, blending_speed: f32) {
        for runtime in &mut self.runtimes {
            runtime.enable_blending = true;
            runtime.blending_speed = blending_speed;
        }
    }

    pub fn disable_blending(&mut self) {
        for runtime in &mut self.runtimes {
            runtime.enable_blending = false;
        }
    }

    /// Remove runtimes, all or only those animating `property`. Returns true when none remain.
    pub fn remove_runtimes(&mut self, property: Option<&str>) -> bool {
        match property {
            Some(p) => self.runtimes.retain(|r| r.target_property() != p),
            None => self.runtimes.clear(),
        }
        self.runtimes.is_empty()
    }

    fn write_context<'a>(
        &self,
        target: &'a mut dyn AnimationTarget,
        compositor: &'a mut Compositor,
        changes: &'a mut Vec<Change>,
        settings: InterpSettings,
    ) -> WriteContext<'a> {
        WriteContext {
            target,
            compositor,
            changes,
            settings,
            is_additive: self.is_additive,
        }
    }

    /// Restart the clock; runtimes go back to frame 0 and restore the original values.
    pub fn reset(
        &mut self,
        target: &mut dyn AnimationTarget,
        compositor: &mut Compositor,
        changes: &mut Vec<Change>,
        settings: InterpSettings,
    ) {
        let mut ctx = self.write_context(target, compositor, changes, settings);
        for runtime in &mut self.runtimes {
            runtime.reset(true, &mut ctx);
        }
        self.local_delay_offset = None;
        self.paused_delay = None;
        self.ended = false;
    }

    fn schedule_jump(&mut self, frame: f32) {
        let Some(first) = self.runtimes.first() else {
            return;
        };
        let fps = first.frames_per_second();
        let sync_from = *self
            .frame_to_sync_from_jump
            .get_or_insert(first.current_frame());
        let delay = if self.speed_ratio == 0.0 {
            0.0
        } else {
            f64::from((frame - sync_from) / fps * 1000.0) / f64::from(self.speed_ratio)
        };
        self.manual_jump_delay = Some(-delay);
    }

    /// Jump every runtime to `frame` and move the clock so playback continues from there.
    pub fn go_to_frame(
        &mut self,
        frame: f32,
        use_weight: bool,
        target: &mut dyn AnimationTarget,
        compositor: &mut Compositor,
        changes: &mut Vec<Change>,
        settings: InterpSettings,
    ) {
        self.schedule_jump(frame);
        let weight = if use_weight { self.weight } else { NO_WEIGHT };
        let mut ctx = self.write_context(target, compositor, changes, settings);
        for runtime in &mut self.runtimes {
            runtime.go_to_frame(frame, weight, &mut ctx);
        }
        self.go_to_frame = Some(frame);
    }

    /// Advance to scene time `delay_ms`.
    pub fn animate(
        &mut self,
        delay_ms: f64,
        sync: Option<SyncRoot>,
        ctx: &mut WriteContext<'_>,
        fired: &mut Vec<FiredEvent>,
    ) -> AnimatableStep {
        if self.paused {
            self.animation_started = false;
            if self.paused_delay.is_none() {
                self.paused_delay = Some(delay_ms);
            }
            return AnimatableStep {
                running: true,
                looped: false,
            };
        }

        match self.local_delay_offset {
            None => {
                self.local_delay_offset = Some(delay_ms);
                self.paused_delay = None;
            }
            Some(ref mut offset) => {
                if let Some(paused_at) = self.paused_delay.take() {
                    *offset += delay_ms - paused_at;
                }
            }
        }
        let mut offset = self.local_delay_offset.unwrap_or(delay_ms);
        if let Some(jump) = self.manual_jump_delay.take() {
            offset += jump;
            self.frame_to_sync_from_jump = None;
        }
        self.local_delay_offset = Some(offset);
        let elapsed = delay_ms - offset;
        self.go_to_frame = None;

        if self.weight == 0.0 && self.previous_weight == 0.0 {
            return AnimatableStep {
                running: true,
                looped: false,
            };
        }
        self.previous_weight = self.weight;

        let playback = Playback {
            from: self.from_frame,
            to: self.to_frame,
            looping: self.loop_animation,
            speed_ratio: self.speed_ratio,
            weight: self.weight,
            sync,
        };
        ctx.is_additive = self.is_additive;

        let mut step = AnimatableStep::default();
        for runtime in &mut self.runtimes {
            let outcome = runtime.animate(elapsed, &playback, ctx, fired);
            step.running |= outcome.running;
            step.looped |= outcome.looped;
        }
        self.animation_started = step.running;
        step
    }
}
