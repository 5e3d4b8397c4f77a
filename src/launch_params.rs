//! LaunchParamsController: chain-of-responsibility over registered
//! modifiers that refine an activity's starting bounds, display, and
//! windowing mode (§4.H).

use crate::ids::{ActivityId, DisplayId};
use crate::stack::WindowingMode;

/// A modifier's verdict on one `onCalculate` pass (§4.H).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModifierResult {
    /// Defer entirely to modifiers earlier in the chain (LIFO order);
    /// this modifier has nothing to say about this launch.
    Skip,
    /// This modifier's answer is final; stop walking the chain.
    Done,
    /// Keep this modifier's writes to `out`, but let earlier-registered
    /// modifiers refine them further.
    Continue,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Bounds {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

/// The output buffer modifiers write into. Later (earlier-registered,
/// since the chain runs LIFO) modifiers see and may overwrite the
/// fields set by modifiers that ran before them.
#[derive(Debug, Clone, Default)]
pub struct LaunchParams {
    pub display: Option<DisplayId>,
    pub windowing_mode: Option<WindowingMode>,
    pub bounds: Option<Bounds>,
}

pub trait LaunchParamsModifier {
    /// `activity` is `None` for a brand-new activity not yet created
    /// (the initial placement decision in `begin_start_activity`), `Some`
    /// when recalculating params for an activity that already exists.
    fn on_calculate(
        &self,
        activity: Option<ActivityId>,
        current: &LaunchParams,
        out: &mut LaunchParams,
    ) -> ModifierResult;
}

/// Registration order is oldest-first; evaluation order is LIFO, i.e.
/// the most-recently-registered modifier runs first (§4.H).
#[derive(Default)]
pub struct LaunchParamsController {
    modifiers: Vec<Box<dyn LaunchParamsModifier + Send + Sync>>,
}

impl LaunchParamsController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, modifier: Box<dyn LaunchParamsModifier + Send + Sync>) {
        self.modifiers.push(modifier);
    }

    /// Run the full chain. Returns the accumulated `LaunchParams`.
    /// A `Done` verdict stops the walk immediately; `Skip` leaves `out`
    /// untouched by that modifier and moves to the next one; `Continue`
    /// keeps walking so earlier-registered modifiers may refine further.
    pub fn calculate(&self, activity: Option<ActivityId>, current: &LaunchParams) -> LaunchParams {
        let mut out = current.clone();
        for modifier in self.modifiers.iter().rev() {
            match modifier.on_calculate(activity, current, &mut out) {
                ModifierResult::Done => break,
                ModifierResult::Continue | ModifierResult::Skip => continue,
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use generational_arena::Arena;

    fn aid() -> Option<ActivityId> {
        let mut arena: Arena<()> = Arena::new();
        Some(ActivityId(arena.insert(())))
    }

    struct AlwaysSkip;
    impl LaunchParamsModifier for AlwaysSkip {
        fn on_calculate(&self, _: Option<ActivityId>, _: &LaunchParams, _: &mut LaunchParams) -> ModifierResult {
            ModifierResult::Skip
        }
    }

    struct SetsFullscreenAndDone;
    impl LaunchParamsModifier for SetsFullscreenAndDone {
        fn on_calculate(&self, _: Option<ActivityId>, _: &LaunchParams, out: &mut LaunchParams) -> ModifierResult {
            out.windowing_mode = Some(WindowingMode::Fullscreen);
            ModifierResult::Done
        }
    }

    struct SetsFreeformAndContinue;
    impl LaunchParamsModifier for SetsFreeformAndContinue {
        fn on_calculate(&self, _: Option<ActivityId>, _: &LaunchParams, out: &mut LaunchParams) -> ModifierResult {
            out.windowing_mode = Some(WindowingMode::Freeform);
            ModifierResult::Continue
        }
    }

    #[test]
    fn empty_chain_returns_current_unchanged() {
        let controller = LaunchParamsController::new();
        let current = LaunchParams::default();
        let out = controller.calculate(aid(), &current);
        assert_eq!(out.windowing_mode, None);
    }

    #[test]
    fn skip_falls_through_to_earlier_registered_modifier() {
        let mut controller = LaunchParamsController::new();
        controller.register(Box::new(SetsFullscreenAndDone));
        controller.register(Box::new(AlwaysSkip));
        let out = controller.calculate(aid(), &LaunchParams::default());
        assert_eq!(out.windowing_mode, Some(WindowingMode::Fullscreen));
    }

    #[test]
    fn done_stops_the_chain_immediately() {
        let mut controller = LaunchParamsController::new();
        controller.register(Box::new(SetsFreeformAndContinue));
        controller.register(Box::new(SetsFullscreenAndDone));
        let out = controller.calculate(aid(), &LaunchParams::default());
        assert_eq!(out.windowing_mode, Some(WindowingMode::Fullscreen));
    }

    #[test]
    fn most_recently_registered_runs_first() {
        let mut controller = LaunchParamsController::new();
        controller.register(Box::new(SetsFreeformAndContinue));
        controller.register(Box::new(SetsFullscreenAndDone));
        // SetsFullscreenAndDone registered last -> runs first -> wins
        // with Done before SetsFreeformAndContinue ever executes.
        let out = controller.calculate(aid(), &LaunchParams::default());
        assert_eq!(out.windowing_mode, Some(WindowingMode::Fullscreen));
    }
}
