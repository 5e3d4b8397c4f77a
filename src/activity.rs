//! Activity record and its per-activity state machine (§4.A).

use chrono::{DateTime, Utc};

use crate::external::Intent;
use crate::ids::{ActivityId, ProcessId, TaskId};

/// `ActivityState`, drawn from §3's nine-value set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityState {
    Initializing,
    Resumed,
    Pausing,
    Paused,
    Stopping,
    Stopped,
    Finishing,
    Destroying,
    Destroyed,
}

impl ActivityState {
    /// "An activity is *in history* iff its state is not DESTROYED" (§3).
    pub fn in_history(self) -> bool {
        !matches!(self, ActivityState::Destroyed)
    }
}

/// Why an activity finished, carried through to the result the caller
/// of `start_activity_may_wait` observes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    UserRequested,
    TaskToFront,
    /// "2nd-crash" (§4.A, §7 CrashFatal).
    SecondCrash,
    ProcessDied,
}

#[derive(Debug)]
pub struct Activity {
    pub id: ActivityId,
    pub task: TaskId,
    pub process: Option<ProcessId>,
    pub component: String,
    pub intent: Intent,
    pub saved_state: Option<Vec<u8>>,
    pub results: Vec<Vec<u8>>,
    pub new_intents: Vec<Intent>,
    pub visible: bool,
    pub sleeping: bool,
    /// First process-death-during-transition sets this; a second one in
    /// the same launch attempt is fatal (§4.A, §7).
    pub launch_failed: bool,
    pub last_launch_time: Option<DateTime<Utc>>,
    pub launch_count: u32,
    pub state: ActivityState,
    pub finish_reason: Option<FinishReason>,
}

impl Activity {
    pub fn new(id: ActivityId, task: TaskId, component: String, intent: Intent) -> Self {
        Self {
            id,
            task,
            process: None,
            component,
            intent,
            saved_state: None,
            results: Vec::new(),
            new_intents: Vec::new(),
            visible: false,
            sleeping: false,
            launch_failed: false,
            last_launch_time: None,
            launch_count: 0,
            state: ActivityState::Initializing,
            finish_reason: None,
        }
    }

    /// `schedule_launch` (§4.A). Precondition: INITIALIZING or DESTROYED
    /// (restart). `not_resumed` is true for "launch into background"
    /// (e.g. TASK_TO_FRONT without bringing the activity forward).
    pub fn schedule_launch(&mut self, process: ProcessId, not_resumed: bool, now: DateTime<Utc>) {
        debug_assert!(matches!(
            self.state,
            ActivityState::Initializing | ActivityState::Destroyed
        ));
        self.process = Some(process);
        self.last_launch_time = Some(now);
        self.launch_count += 1;
        self.state = if not_resumed {
            ActivityState::Stopped
        } else {
            ActivityState::Resumed
        };
    }

    /// `schedule_pause` (§4.A). Precondition RESUMED -> PAUSING. The
    /// deadline timer itself is owned by the stack/supervisor layer
    /// (§5); this just performs the state edge.
    pub fn schedule_pause(&mut self) {
        debug_assert_eq!(self.state, ActivityState::Resumed);
        self.state = ActivityState::Pausing;
    }

    /// Deadline expiry forces PAUSED with a logged warning (§4.A) — the
    /// caller (stack) does the logging; this crosses the state edge.
    pub fn force_pause_timeout(&mut self) {
        if self.state == ActivityState::Pausing {
            self.state = ActivityState::Paused;
        }
    }

    /// `complete_pause` (§4.A): PAUSING -> PAUSED.
    pub fn complete_pause(&mut self) {
        debug_assert_eq!(self.state, ActivityState::Pausing);
        self.state = ActivityState::Paused;
    }

    pub fn schedule_stop(&mut self) {
        debug_assert!(matches!(self.state, ActivityState::Paused));
        self.state = ActivityState::Stopping;
    }

    pub fn complete_stop(&mut self) {
        debug_assert_eq!(self.state, ActivityState::Stopping);
        self.state = ActivityState::Stopped;
    }

    pub fn schedule_destroy(&mut self) {
        self.state = ActivityState::Destroying;
    }

    pub fn complete_destroy(&mut self) {
        self.state = ActivityState::Destroyed;
    }

    /// `schedule_result`: enqueue a result, delivered at next resume or
    /// immediately if RESUMED (§4.A).
    pub fn schedule_result(&mut self, result: Vec<u8>) {
        self.results.push(result);
    }

    /// `schedule_new_intent`: same delivery rule as results.
    pub fn schedule_new_intent(&mut self, intent: Intent) {
        self.new_intents.push(intent);
    }

    /// Whether queued results/new-intents should be delivered right now
    /// rather than waiting for the next resume.
    pub fn delivers_immediately(&self) -> bool {
        self.state == ActivityState::Resumed
    }

    /// Move to FINISHING; destroy is deferred by the stack (§4.B).
    pub fn mark_finishing(&mut self, reason: FinishReason) {
        self.finish_reason = Some(reason);
        self.state = ActivityState::Finishing;
    }

    /// First failure during a transition sets `launch_failed` and
    /// triggers a restart; the second failure within the same launch
    /// attempt is fatal (§4.A, §7 CrashFatal, reason "2nd-crash").
    ///
    /// Returns `true` if this was the fatal second failure.
    pub fn on_process_death_during_transition(&mut self) -> bool {
        if self.launch_failed {
            self.mark_finishing(FinishReason::SecondCrash);
            true
        } else {
            self.launch_failed = true;
            self.state = ActivityState::Initializing;
            self.process = None;
            false
        }
    }

    /// Reset the two-strikes counter; called when a launch attempt
    /// completes successfully.
    pub fn reset_launch_failed(&mut self) {
        self.launch_failed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use generational_arena::Arena;

    fn mk_id() -> ActivityId {
        let mut arena: Arena<()> = Arena::new();
        ActivityId(arena.insert(()))
    }

    fn mk_task_id() -> TaskId {
        let mut arena: Arena<()> = Arena::new();
        TaskId(arena.insert(()))
    }

    fn mk_proc_id() -> ProcessId {
        let mut arena: Arena<()> = Arena::new();
        ProcessId(arena.insert(()))
    }

    fn fresh() -> Activity {
        Activity::new(mk_id(), mk_task_id(), "pkg/.Main".into(), Intent::default())
    }

    #[test]
    fn launch_resumes_by_default() {
        let mut a = fresh();
        a.schedule_launch(mk_proc_id(), false, Utc::now());
        assert_eq!(a.state, ActivityState::Resumed);
    }

    #[test]
    fn launch_not_resumed_lands_stopped() {
        let mut a = fresh();
        a.schedule_launch(mk_proc_id(), true, Utc::now());
        assert_eq!(a.state, ActivityState::Stopped);
    }

    #[test]
    fn pause_then_complete_reaches_paused() {
        let mut a = fresh();
        a.schedule_launch(mk_proc_id(), false, Utc::now());
        a.schedule_pause();
        assert_eq!(a.state, ActivityState::Pausing);
        a.complete_pause();
        assert_eq!(a.state, ActivityState::Paused);
    }

    #[test]
    fn pause_timeout_forces_paused() {
        let mut a = fresh();
        a.schedule_launch(mk_proc_id(), false, Utc::now());
        a.schedule_pause();
        a.force_pause_timeout();
        assert_eq!(a.state, ActivityState::Paused);
    }

    #[test]
    fn first_process_death_retries_not_fatal() {
        let mut a = fresh();
        a.schedule_launch(mk_proc_id(), false, Utc::now());
        let fatal = a.on_process_death_during_transition();
        assert!(!fatal);
        assert_eq!(a.state, ActivityState::Initializing);
        assert!(a.launch_failed);
    }

    #[test]
    fn second_process_death_in_same_attempt_is_fatal() {
        let mut a = fresh();
        a.schedule_launch(mk_proc_id(), false, Utc::now());
        assert!(!a.on_process_death_during_transition());
        assert!(a.on_process_death_during_transition());
        assert_eq!(a.state, ActivityState::Finishing);
        assert_eq!(a.finish_reason, Some(FinishReason::SecondCrash));
    }

    #[test]
    fn destroyed_is_not_in_history_others_are() {
        assert!(!ActivityState::Destroyed.in_history());
        assert!(ActivityState::Resumed.in_history());
        assert!(ActivityState::Stopped.in_history());
    }

    #[test]
    fn queued_result_delivers_immediately_only_when_resumed() {
        let mut a = fresh();
        a.schedule_launch(mk_proc_id(), true, Utc::now());
        a.schedule_result(vec![1]);
        assert!(!a.delivers_immediately());
        a.state = ActivityState::Resumed;
        assert!(a.delivers_immediately());
    }
}
