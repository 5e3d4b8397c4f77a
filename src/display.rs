//! ActivityDisplay (§4.C): ordered stacks on one display, singleton-role
//! caching, and windowing-mode resolution.

use crate::ids::{DisplayId, StackId};
use crate::stack::{ActivityType, WindowingMode};

/// Device capability flags gating windowing-mode resolution (§4.C).
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceCapabilities {
    pub multi_window: bool,
    pub split_screen: bool,
    pub freeform: bool,
    pub picture_in_picture: bool,
}

/// A windowing-mode hint source, used by `resolve_windowing_mode`'s
/// preference chain: options-hint -> task -> activity -> display default.
#[derive(Debug, Clone, Copy)]
pub enum ModeHint {
    FullscreenOrSplitSecondary,
    Mode(WindowingMode),
    None,
}

#[derive(Debug)]
pub struct ActivityDisplay {
    pub id: DisplayId,
    /// Bottom -> top visibility order.
    pub stacks: Vec<StackId>,
    pub home_stack: Option<StackId>,
    pub recents_stack: Option<StackId>,
    pub pinned_stack: Option<StackId>,
    pub split_primary_stack: Option<StackId>,
    pub default_windowing_mode: WindowingMode,
    pub capabilities: DeviceCapabilities,
}

impl ActivityDisplay {
    pub fn new(id: DisplayId, capabilities: DeviceCapabilities) -> Self {
        Self {
            id,
            stacks: Vec::new(),
            home_stack: None,
            recents_stack: None,
            pinned_stack: None,
            split_primary_stack: None,
            default_windowing_mode: WindowingMode::Fullscreen,
            capabilities,
        }
    }

    pub fn singleton_for(&self, activity_type: ActivityType) -> Option<StackId> {
        match activity_type {
            ActivityType::Home => self.home_stack,
            ActivityType::Recents => self.recents_stack,
            _ => None,
        }
    }

    pub fn singleton_for_mode(&self, mode: WindowingMode) -> Option<StackId> {
        match mode {
            WindowingMode::Pinned => self.pinned_stack,
            WindowingMode::SplitPrimary => self.split_primary_stack,
            _ => None,
        }
    }

    pub fn set_singleton(&mut self, activity_type: ActivityType, mode: WindowingMode, stack: StackId) {
        match activity_type {
            ActivityType::Home => self.home_stack = Some(stack),
            ActivityType::Recents => self.recents_stack = Some(stack),
            _ => {}
        }
        match mode {
            WindowingMode::Pinned => self.pinned_stack = Some(stack),
            WindowingMode::SplitPrimary => self.split_primary_stack = Some(stack),
            _ => {}
        }
    }

    pub fn clear_singleton_if(&mut self, stack: StackId) {
        if self.home_stack == Some(stack) {
            self.home_stack = None;
        }
        if self.recents_stack == Some(stack) {
            self.recents_stack = None;
        }
        if self.pinned_stack == Some(stack) {
            self.pinned_stack = None;
        }
        if self.split_primary_stack == Some(stack) {
            self.split_primary_stack = None;
        }
    }

    /// `resolve_windowing_mode` (§4.C). `mode_hint` is the options-hint;
    /// `task_mode`/`activity_mode` are the task's and activity's own
    /// windowing mode if already assigned.
    pub fn resolve_windowing_mode(
        &self,
        mode_hint: ModeHint,
        task_mode: Option<WindowingMode>,
        activity_mode: Option<WindowingMode>,
        resizeable: bool,
    ) -> WindowingMode {
        let preferred = match mode_hint {
            ModeHint::Mode(m) => Some(m),
            ModeHint::FullscreenOrSplitSecondary => {
                if self.split_primary_stack.is_some() {
                    Some(WindowingMode::SplitSecondary)
                } else {
                    Some(WindowingMode::Fullscreen)
                }
            }
            ModeHint::None => task_mode.or(activity_mode),
        };

        let mut mode = preferred.unwrap_or(self.default_windowing_mode);

        // Special case: FULLSCREEN_OR_SPLIT_SECONDARY falls back to
        // FULLSCREEN when no split-primary exists (handled above).
        // Conversely, plain FULLSCREEN for a resizeable activity is
        // promoted to SPLIT_SECONDARY when a primary already exists.
        if mode == WindowingMode::Fullscreen
            && resizeable
            && self.split_primary_stack.is_some()
            && !matches!(mode_hint, ModeHint::Mode(WindowingMode::Fullscreen))
        {
            mode = WindowingMode::SplitSecondary;
        }

        self.clamp_to_capabilities(mode)
    }

    fn clamp_to_capabilities(&self, mode: WindowingMode) -> WindowingMode {
        match mode {
            WindowingMode::Freeform if !self.capabilities.freeform => WindowingMode::Fullscreen,
            WindowingMode::SplitPrimary | WindowingMode::SplitSecondary
                if !self.capabilities.split_screen =>
            {
                WindowingMode::Fullscreen
            }
            WindowingMode::Pinned if !self.capabilities.picture_in_picture => {
                WindowingMode::Fullscreen
            }
            other => other,
        }
    }

    /// `position_child_at` (§4.C): clamp `candidate` downward until
    /// pinned-topmost and always-on-top-above-non ordering holds, then
    /// move the stack there. Returns the final index.
    pub fn position_child_at(
        &mut self,
        stack: StackId,
        candidate: usize,
        always_on_top: impl Fn(StackId) -> bool,
        rank_of: impl Fn(StackId) -> u8,
    ) -> usize {
        self.stacks.retain(|s| *s != stack);
        let this_rank = rank_of(stack).max(if always_on_top(stack) { 1 } else { 0 });
        let mut idx = candidate.min(self.stacks.len());
        // Walk down past any stack that must stay above `stack`.
        while idx > 0 && rank_of(self.stacks[idx - 1]) > this_rank {
            idx -= 1;
        }
        // Walk up past any stack that must stay below `stack`.
        while idx < self.stacks.len() && rank_of(self.stacks[idx]) < this_rank {
            idx += 1;
        }
        self.stacks.insert(idx, stack);
        idx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use generational_arena::Arena;

    fn did() -> DisplayId {
        let mut arena: Arena<()> = Arena::new();
        DisplayId(arena.insert(()))
    }

    #[test]
    fn fullscreen_or_split_secondary_falls_back_without_primary() {
        let display = ActivityDisplay::new(did(), DeviceCapabilities::default());
        let mode = display.resolve_windowing_mode(
            ModeHint::FullscreenOrSplitSecondary,
            None,
            None,
            true,
        );
        assert_eq!(mode, WindowingMode::Fullscreen);
    }

    #[test]
    fn resizeable_fullscreen_promotes_to_split_secondary_when_primary_exists() {
        let mut arena: Arena<()> = Arena::new();
        let mut display = ActivityDisplay::new(did(), DeviceCapabilities {
            split_screen: true,
            ..Default::default()
        });
        display.split_primary_stack = Some(crate::ids::StackId(arena.insert(())));
        let mode = display.resolve_windowing_mode(ModeHint::None, None, None, true);
        assert_eq!(mode, WindowingMode::SplitSecondary);
    }

    #[test]
    fn freeform_clamped_to_fullscreen_without_capability() {
        let display = ActivityDisplay::new(did(), DeviceCapabilities::default());
        let mode = display.resolve_windowing_mode(
            ModeHint::Mode(WindowingMode::Freeform),
            None,
            None,
            false,
        );
        assert_eq!(mode, WindowingMode::Fullscreen);
    }

    #[test]
    fn pinned_stack_always_lands_on_top() {
        let mut arena: Arena<()> = Arena::new();
        let mut display = ActivityDisplay::new(did(), DeviceCapabilities::default());
        let s1 = crate::ids::StackId(arena.insert(()));
        let s2 = crate::ids::StackId(arena.insert(()));
        let pinned = crate::ids::StackId(arena.insert(()));
        display.stacks = vec![s1, s2];
        let rank_of = |s: StackId| if s == pinned { 2 } else { 0 };
        display.position_child_at(pinned, 0, |_| false, rank_of);
        assert_eq!(display.stacks.last().copied(), Some(pinned));
    }
}
