//! Stack record (§3) and the windowing/activity-type vocabulary it
//! carries. The pause/resume choreography itself (`resume_top_activity`,
//! §4.B) lives on `SupervisorState` in `supervisor.rs`, since it needs
//! simultaneous access to the task and activity arenas that a `Stack`
//! does not own directly (§9 arena-with-indices redesign).

use crate::ids::{ActivityId, DisplayId, TaskId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowingMode {
    Fullscreen,
    Freeform,
    Pinned,
    SplitPrimary,
    SplitSecondary,
    Undefined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityType {
    Standard,
    Home,
    Recents,
    Undefined,
}

#[derive(Debug, Default)]
pub struct StackQueues {
    pub waiting_visible: Vec<ActivityId>,
    pub stopping: Vec<ActivityId>,
    pub going_to_sleep: Vec<ActivityId>,
    pub finishing: Vec<ActivityId>,
    pub waiting_activity_launched: Vec<LaunchWaiter>,
    pub waiting_activity_visible: Vec<ActivityId>,
}

/// One blocked caller of `start_activity_may_wait` (§4.D, §5). Woken by
/// the supervisor's condition variable when `target` settles.
#[derive(Debug, Clone, Copy)]
pub struct LaunchWaiter {
    pub target: ActivityId,
    pub wait_id: u64,
}

#[derive(Debug)]
pub struct Stack {
    pub id: crate::ids::StackId,
    pub display: DisplayId,
    /// Bottom -> top.
    pub tasks: Vec<TaskId>,
    pub windowing_mode: WindowingMode,
    pub activity_type: ActivityType,
    /// Most-recently-used ordering of every activity ever hosted here.
    pub lru: Vec<ActivityId>,
    pub queues: StackQueues,
    pub resumed_activity: Option<ActivityId>,
    pub pausing_activity: Option<ActivityId>,
}

impl Stack {
    pub fn new(
        id: crate::ids::StackId,
        display: DisplayId,
        windowing_mode: WindowingMode,
        activity_type: ActivityType,
    ) -> Self {
        Self {
            id,
            display,
            tasks: Vec::new(),
            windowing_mode,
            activity_type,
            lru: Vec::new(),
            queues: StackQueues::default(),
            resumed_activity: None,
            pausing_activity: None,
        }
    }

    pub fn touch_lru(&mut self, activity: ActivityId) {
        self.lru.retain(|a| *a != activity);
        self.lru.push(activity);
    }

    pub fn remove_from_lru(&mut self, activity: ActivityId) {
        self.lru.retain(|a| *a != activity);
    }

    pub fn push_task_on_top(&mut self, task: TaskId) {
        self.tasks.push(task);
    }

    pub fn remove_task(&mut self, task: TaskId) {
        self.tasks.retain(|t| *t != task);
    }

    pub fn top_task(&self) -> Option<TaskId> {
        self.tasks.last().copied()
    }

    /// Invariant check (§8.1 #1): at most one RESUMED, at most one
    /// PAUSING, and they are never the same activity.
    pub fn check_single_resumed_invariant(&self) -> bool {
        match (self.resumed_activity, self.pausing_activity) {
            (Some(r), Some(p)) => r != p,
            _ => true,
        }
    }

    /// Sort ordering used by `ActivityDisplay::position_child_at` (§4.C):
    /// pinned stacks topmost, always-on-top below pinned, everything
    /// else below that. Returns a rank where a smaller number is lower
    /// in the visual stack (bottom -> top order).
    pub fn position_rank(&self, always_on_top: bool) -> u8 {
        match self.windowing_mode {
            WindowingMode::Pinned => 2,
            _ if always_on_top => 1,
            _ => 0,
        }
    }
}
