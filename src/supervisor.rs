//! The central coordinator: one arena per owned record kind (§9), guarded
//! by a single lock with condition-variable blocking waits (§5). This is
//! the module that actually performs `resume_top_activity` and
//! `start_activity_may_wait`, since both need simultaneous mutable access
//! to stacks, tasks and activities that no single record owns.

use std::sync::Arc;

use generational_arena::Arena;
use log::{debug, info, warn};
use parking_lot::{Condvar, Mutex};

use crate::app_errors::{AppErrors, CrashOutcome};
use crate::clock::Clock;
use crate::config::{CrashPolicy, SupervisorConfig};
use crate::display::{ActivityDisplay, DeviceCapabilities, ModeHint};
use crate::error::{Result, SupervisorError};
use crate::external::{
    ActivityInfo, ApplicationThread, BroadcastDispatcher, CrashReportSink, DisplayListener, Intent,
    LowMemoryKiller, PackageResolver, ProcessLauncher, StorageService, WindowManager,
};
use crate::ids::{ActivityId, DisplayId, ProcessId, StackId, TaskId, UserId};
use crate::launch_params::{LaunchParams, LaunchParamsController, LaunchParamsModifier};
use crate::process::{ProcessRecord, ProcessRegistry, ProcessState};
use crate::stack::{ActivityType, LaunchWaiter, Stack, WindowingMode};
use crate::task::Task;
use crate::user::UserController;

use crate::activity::{Activity, ActivityState, FinishReason};

/// Bundle of the host-supplied collaborator seams (§6). Held as trait
/// objects so the supervisor never depends on a concrete rendering,
/// packaging, or RPC stack.
pub struct Collaborators {
    pub package_resolver: Arc<dyn PackageResolver>,
    pub window_manager: Arc<dyn WindowManager>,
    pub process_launcher: Arc<dyn ProcessLauncher>,
    pub application_thread: Arc<dyn ApplicationThread>,
    pub storage_service: Arc<dyn StorageService>,
    pub broadcast_dispatcher: Arc<dyn BroadcastDispatcher>,
    pub low_memory_killer: Arc<dyn LowMemoryKiller>,
    pub crash_report_sink: Arc<dyn CrashReportSink>,
    pub display_listener: Arc<dyn DisplayListener>,
}

/// Outcome of a heavyweight-process interception check (§4.D).
pub struct HeavyweightSwitchRequest {
    pub incoming: ActivityId,
    pub blocking_process: ProcessId,
}

/// Outcome of `shutdown_locked` (§4.D): whether every RESUMED activity
/// acknowledged its pause within the bound, or had to be force-paused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShutdownResult {
    pub timedout: bool,
}

/// Everything the single supervisor lock protects (§5, §9). No field here
/// is ever mutated without holding `Supervisor::state`'s mutex.
pub struct SupervisorState {
    pub activities: Arena<Activity>,
    pub tasks: Arena<Task>,
    pub stacks: Arena<Stack>,
    pub displays: Arena<ActivityDisplay>,
    /// Mints stable `ProcessId`s for `processes`, which itself is a flat
    /// registry rather than an owning arena (§4.E).
    process_ids: Arena<()>,
    pub processes: ProcessRegistry,
    pub app_errors: AppErrors,
    pub users: UserController,
    pub launch_params: LaunchParamsController,
    /// At most one heavyweight process may run at a time (§4.D, §8.1 #7).
    pub heavyweight_process: Option<ProcessId>,
    next_wait_id: u64,
}

impl SupervisorState {
    fn new(config: &SupervisorConfig) -> Self {
        Self {
            activities: Arena::new(),
            tasks: Arena::new(),
            stacks: Arena::new(),
            displays: Arena::new(),
            process_ids: Arena::new(),
            processes: ProcessRegistry::default(),
            app_errors: AppErrors::default(),
            users: UserController::new(config.max_running_users),
            launch_params: LaunchParamsController::new(),
            heavyweight_process: None,
            next_wait_id: 0,
        }
    }

    pub fn mint_process_id(&mut self) -> ProcessId {
        ProcessId(self.process_ids.insert(()))
    }

    fn alloc_wait_id(&mut self) -> u64 {
        self.next_wait_id += 1;
        self.next_wait_id
    }

    // ── Display / stack setup ──────────────────────────────────────────

    pub fn create_display(&mut self, capabilities: DeviceCapabilities) -> DisplayId {
        let id = self
            .displays
            .insert_with(|index| ActivityDisplay::new(DisplayId(index), capabilities));
        id_from_index(id)
    }

    /// Create a stack on `display`. Home/Recents/Pinned/SplitPrimary are
    /// singleton roles per display; creating a second one is an error
    /// (§4.C). Low-level constructor — most callers want
    /// `get_or_create_stack`, which never errors on a singleton conflict.
    pub fn create_stack(
        &mut self,
        display: DisplayId,
        windowing_mode: WindowingMode,
        activity_type: ActivityType,
    ) -> Result<StackId> {
        {
            let disp = self
                .displays
                .get(display.0)
                .ok_or(SupervisorError::UnknownDisplay(display))?;
            if disp.singleton_for(activity_type).is_some() || disp.singleton_for_mode(windowing_mode).is_some()
            {
                return Err(SupervisorError::ConfigurationError);
            }
        }

        let stack_id = id_from_index(
            self.stacks
                .insert_with(|index| Stack::new(StackId(index), display, windowing_mode, activity_type)),
        );

        let disp = self
            .displays
            .get_mut(display.0)
            .ok_or(SupervisorError::UnknownDisplay(display))?;
        disp.stacks.push(stack_id);
        disp.set_singleton(activity_type, windowing_mode, stack_id);
        Ok(stack_id)
    }

    /// `ActivityDisplay::get_or_create_stack` (§4.C): return the cached
    /// singleton for a Home/Recents/Pinned/SplitPrimary role if one
    /// exists, else the topmost existing stack that already matches
    /// `windowing_mode`/`activity_type`, else create a fresh one. This is
    /// the placement half of "H computes placement -> C selects/creates
    /// a stack" (§2 data flow) that `begin_start_activity` drives.
    pub fn get_or_create_stack(
        &mut self,
        collaborators: &Collaborators,
        display: DisplayId,
        windowing_mode: WindowingMode,
        activity_type: ActivityType,
    ) -> Result<StackId> {
        {
            let disp = self
                .displays
                .get(display.0)
                .ok_or(SupervisorError::UnknownDisplay(display))?;
            if let Some(existing) = disp.singleton_for(activity_type) {
                return Ok(existing);
            }
            if let Some(existing) = disp.singleton_for_mode(windowing_mode) {
                return Ok(existing);
            }
            if let Some(existing) = disp.stacks.iter().rev().copied().find(|s| {
                self.stacks
                    .get(s.0)
                    .map(|st| st.windowing_mode == windowing_mode && st.activity_type == activity_type)
                    .unwrap_or(false)
            }) {
                return Ok(existing);
            }
        }

        let stack_id = id_from_index(
            self.stacks
                .insert_with(|index| Stack::new(StackId(index), display, windowing_mode, activity_type)),
        );
        let disp = self
            .displays
            .get_mut(display.0)
            .ok_or(SupervisorError::UnknownDisplay(display))?;
        disp.stacks.push(stack_id);
        disp.set_singleton(activity_type, windowing_mode, stack_id);
        collaborators.display_listener.on_stack_order_changed(display);
        debug!("created stack {:?} ({:?}/{:?}) on display {:?}", stack_id, windowing_mode, activity_type, display);
        Ok(stack_id)
    }

    // ── Activity/task bookkeeping ───────────────────────────────────────

    fn stack_of_task(&self, task: TaskId) -> Result<StackId> {
        Ok(self
            .tasks
            .get(task.0)
            .ok_or(SupervisorError::UnknownTask(task))?
            .stack)
    }

    fn clear_queues_for(&mut self, stack_id: StackId, activity: ActivityId) {
        if let Some(stack) = self.stacks.get_mut(stack_id.0) {
            stack.queues.stopping.retain(|a| *a != activity);
            stack.queues.finishing.retain(|a| *a != activity);
            stack.queues.going_to_sleep.retain(|a| *a != activity);
            stack.queues.waiting_visible.retain(|a| *a != activity);
        }
    }

    /// `resume_top_activity` (§4.B): the five-step pause/resume
    /// choreography. Returns the activity that ended up RESUMED, if any.
    ///
    /// 1. Find the top, in-history, non-finishing activity of the top task
    ///    of `stack`.
    /// 2. If something else in the stack is RESUMED, pause it first and
    ///    return early (resume continues once the pause completes).
    /// 3. If the candidate is already RESUMED, this is a no-op.
    /// 4. If the candidate's hosting process is not attached yet, leave it
    ///    INITIALIZING and return — `attach_application` re-drives this
    ///    once the process's thread handle exists.
    /// 5. Otherwise schedule its launch/resume, update the stack's
    ///    single-resumed bookkeeping, and wake blocked waiters.
    pub fn resume_top_activity(
        &mut self,
        collaborators: &Collaborators,
        stack_id: StackId,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<Option<ActivityId>> {
        let top_task = self
            .stacks
            .get(stack_id.0)
            .ok_or(SupervisorError::UnknownStack(stack_id))?
            .top_task();
        let Some(task_id) = top_task else {
            return Ok(None);
        };
        let task = self
            .tasks
            .get(task_id.0)
            .ok_or(SupervisorError::UnknownTask(task_id))?;
        let candidate = task
            .activities
            .iter()
            .rev()
            .copied()
            .find(|a| {
                self.activities
                    .get(a.0)
                    .map(|act| act.state.in_history() && act.state != ActivityState::Finishing)
                    .unwrap_or(false)
            });
        let Some(candidate) = candidate else {
            return Ok(None);
        };

        let stack = self.stacks.get_mut(stack_id.0).ok_or(SupervisorError::UnknownStack(stack_id))?;

        if let Some(currently_resumed) = stack.resumed_activity {
            if currently_resumed != candidate {
                debug!("pausing {:?} before resuming {:?}", currently_resumed, candidate);
                stack.pausing_activity = Some(currently_resumed);
                stack.resumed_activity = None;
                stack.queues.going_to_sleep.push(currently_resumed);
                if let Some(act) = self.activities.get_mut(currently_resumed.0) {
                    act.schedule_pause();
                }
                collaborators
                    .application_thread
                    .schedule_pause_activity(currently_resumed, false)
                    .ok();
                return Ok(None);
            }
            // Candidate is already resumed: no-op.
            return Ok(Some(candidate));
        }

        let process = self.activities.get(candidate.0).and_then(|a| a.process);
        let attached = process
            .and_then(|p| self.processes.get(p))
            .map(|p| p.attached)
            .unwrap_or(false);

        let act = self
            .activities
            .get_mut(candidate.0)
            .ok_or(SupervisorError::UnknownActivity(candidate))?;
        match act.state {
            ActivityState::Paused | ActivityState::Stopped | ActivityState::Stopping => {
                act.state = ActivityState::Resumed;
                act.reset_launch_failed();
            }
            ActivityState::Initializing | ActivityState::Destroyed => {
                if !attached {
                    // Process start was already requested by
                    // `begin_start_activity`; defer until it attaches
                    // (§4.B step 4 — "request a process start ... mark T
                    // for resume-on-attach, return").
                    debug!("deferring resume of {:?}: hosting process not attached yet", candidate);
                    return Ok(None);
                }
                let process = process.ok_or(SupervisorError::ProcessStartFailed)?;
                act.schedule_launch(process, false, now);
                collaborators.application_thread.schedule_launch_activity(candidate).ok();
            }
            ActivityState::Resumed => {}
            other => {
                warn!("resume_top_activity found candidate {:?} in unexpected state {:?}", candidate, other);
            }
        }

        let act = self
            .activities
            .get_mut(candidate.0)
            .ok_or(SupervisorError::UnknownActivity(candidate))?;
        act.visible = true;
        collaborators.window_manager.set_visibility(candidate, true);

        self.clear_queues_for(stack_id, candidate);
        let stack = self.stacks.get_mut(stack_id.0).ok_or(SupervisorError::UnknownStack(stack_id))?;
        stack.resumed_activity = Some(candidate);
        stack.pausing_activity = None;
        stack.touch_lru(candidate);
        stack.queues.waiting_activity_visible.retain(|a| *a != candidate);
        info!("activity {:?} resumed on stack {:?}", candidate, stack_id);
        Ok(Some(candidate))
    }

    /// Completion of a pause started by `resume_top_activity` step 2:
    /// recomputes visibility (multi-window stacks stay visible behind the
    /// new top; fullscreen stacks don't), advances the paused activity
    /// accordingly, then re-drives resume so the new top activity
    /// actually comes forward (§4.A, §4.B).
    pub fn complete_pause_and_continue(
        &mut self,
        collaborators: &Collaborators,
        stack_id: StackId,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<Option<ActivityId>> {
        let stack = self.stacks.get_mut(stack_id.0).ok_or(SupervisorError::UnknownStack(stack_id))?;
        if let Some(pausing) = stack.pausing_activity.take() {
            stack.queues.going_to_sleep.retain(|a| *a != pausing);
            let stays_visible = matches!(
                stack.windowing_mode,
                WindowingMode::SplitPrimary | WindowingMode::SplitSecondary | WindowingMode::Freeform | WindowingMode::Pinned
            );
            stack.queues.waiting_visible.push(pausing);

            if let Some(act) = self.activities.get_mut(pausing.0) {
                act.complete_pause();
                act.visible = stays_visible;
            }
            collaborators.window_manager.set_visibility(pausing, stays_visible);
            // Visibility is applied synchronously in this crate (no async
            // WindowManager acknowledgment modeled), so the wait resolves
            // immediately.
            if let Some(stack) = self.stacks.get_mut(stack_id.0) {
                stack.queues.waiting_visible.retain(|a| *a != pausing);
            }

            let should_stop = self
                .activities
                .get(pausing.0)
                .map(|a| a.state == ActivityState::Paused && !a.visible)
                .unwrap_or(false);
            if should_stop {
                if let Some(act) = self.activities.get_mut(pausing.0) {
                    act.schedule_stop();
                }
                collaborators.application_thread.schedule_stop_activity(pausing).ok();
                if let Some(stack) = self.stacks.get_mut(stack_id.0) {
                    stack.queues.stopping.push(pausing);
                }
            }
        }
        self.resume_top_activity(collaborators, stack_id, now)
    }

    /// Create a new task with a single root activity and push it onto
    /// `stack`'s top, mirroring the platform's normal "start a fresh
    /// task" path (§4.B launch flow, simplified — task-affinity reuse is
    /// left to the `PackageResolver`/caller per §1 Non-goals).
    pub fn new_task_with_root_activity(
        &mut self,
        stack_id: StackId,
        user: UserId,
        info: &ActivityInfo,
        intent: Intent,
    ) -> Result<(TaskId, ActivityId)> {
        let task_id = id_from_index(self.tasks.insert_with(|index| {
            Task::new(TaskId(index), stack_id, intent.clone(), None, user)
        }));
        let activity_id = id_from_index(self.activities.insert_with(|index| {
            Activity::new(ActivityId(index), task_id, info.component.clone(), intent)
        }));
        self.tasks
            .get_mut(task_id.0)
            .ok_or(SupervisorError::UnknownTask(task_id))?
            .push(activity_id);

        let stack = self
            .stacks
            .get_mut(stack_id.0)
            .ok_or(SupervisorError::UnknownStack(stack_id))?;
        stack.push_task_on_top(task_id);
        stack.touch_lru(activity_id);
        Ok((task_id, activity_id))
    }

    /// Attach a freshly-started process and re-drive resume on every
    /// stack hosting one of its INITIALIZING activities (§4.B step 4,
    /// §4.D). Goes through `resume_top_activity` rather than setting
    /// state directly, so the single-resumed choreography (pausing a
    /// stack's current top first, if any) still runs.
    pub fn attach_application(
        &mut self,
        collaborators: &Collaborators,
        process_key: (&str, u32),
        pid: u32,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<()> {
        let process = self
            .processes
            .find_by_key_mut(process_key.0, process_key.1)
            .ok_or(SupervisorError::ProcessStartFailed)?;
        process.pid = Some(pid);
        process.attached = true;
        process.state = ProcessState::Top;
        process.recompute_adj();
        let process_id = process.id;

        let pending: std::collections::HashSet<StackId> = self
            .activities
            .iter()
            .filter(|(_, a)| a.process == Some(process_id) && a.state == ActivityState::Initializing)
            .filter_map(|(_, a)| self.tasks.get(a.task.0).map(|t| t.stack))
            .collect();
        for stack_id in pending {
            self.resume_top_activity(collaborators, stack_id, now)?;
        }
        Ok(())
    }

    /// `start_activity_may_wait`'s synchronous half (§4.D). Resolves the
    /// intent, runs it through the §4.H launch-params chain, picks or
    /// creates a stack via `get_or_create_stack` (§4.C), starts or reuses
    /// a process, builds a task, and returns a wait token describing what
    /// the caller should block on. The blocking itself happens in
    /// `Supervisor::start_activity_may_wait` via the condition variable,
    /// since `SupervisorState` never sleeps while holding the lock.
    pub fn begin_start_activity(
        &mut self,
        collaborators: &Collaborators,
        display: DisplayId,
        user: UserId,
        mut intent: Intent,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<(ActivityId, StackId, u64)> {
        let info = collaborators
            .package_resolver
            .resolve_intent(&mut intent, user)
            .ok_or(SupervisorError::ResolveFailed)?;

        if info.heavyweight {
            if let Some(existing) = self.heavyweight_process {
                if !self.is_same_package(existing, &info) {
                    return Err(SupervisorError::PermissionDenied);
                }
            }
        }

        let process_id = match self.processes.find_by_key(&info.process_name, info.uid) {
            Some(p) => p.id,
            None => {
                collaborators
                    .process_launcher
                    .start_process(&info.process_name, info.uid)
                    .map_err(|_| SupervisorError::ProcessStartFailed)?;
                let id = self.mint_process_id();
                self.processes
                    .processes
                    .push(ProcessRecord::new(id, info.process_name.clone(), info.uid, now));
                id
            }
        };

        if info.heavyweight {
            self.heavyweight_process = Some(process_id);
        }

        // §4.H: let registered modifiers refine display/windowing-mode
        // before §4.C resolves the concrete stack. `None` activity id —
        // this activity doesn't exist yet.
        let params = self.launch_params.calculate(None, &LaunchParams::default());
        let mode_hint = params.windowing_mode.map(ModeHint::Mode).unwrap_or(ModeHint::None);
        let target_display = params.display.unwrap_or(display);
        let windowing_mode = {
            let disp = self
                .displays
                .get(target_display.0)
                .ok_or(SupervisorError::UnknownDisplay(target_display))?;
            disp.resolve_windowing_mode(mode_hint, None, None, info.resizeable)
        };

        let stack_id = self.get_or_create_stack(collaborators, target_display, windowing_mode, info.activity_type)?;

        let (_, activity_id) = self.new_task_with_root_activity(stack_id, user, &info, intent)?;
        if let Some(act) = self.activities.get_mut(activity_id.0) {
            act.process = Some(process_id);
        }

        let wait_id = self.alloc_wait_id();
        let stack = self.stacks.get_mut(stack_id.0).ok_or(SupervisorError::UnknownStack(stack_id))?;
        stack.queues.waiting_activity_launched.push(LaunchWaiter {
            target: activity_id,
            wait_id,
        });
        stack.queues.waiting_activity_visible.push(activity_id);

        self.resume_top_activity(collaborators, stack_id, now)?;
        Ok((activity_id, stack_id, wait_id))
    }

    fn is_same_package(&self, process: ProcessId, info: &ActivityInfo) -> bool {
        self.processes
            .get(process)
            .map(|p| p.process_name == info.process_name)
            .unwrap_or(false)
    }

    /// True once the wait recorded by `begin_start_activity` has
    /// resolved: the target activity reached RESUMED (launched) or
    /// FINISHING/DESTROYED (failed outright, e.g. TASK_TO_FRONT
    /// short-circuit, §9 Open Question — resolved in DESIGN.md to also
    /// release `WaitingActivityLaunched` so callers never block forever
    /// on a finished target).
    pub fn wait_resolved(&self, stack_id: StackId, wait_id: u64) -> Option<bool> {
        let stack = self.stacks.get(stack_id.0)?;
        let waiter = stack
            .queues
            .waiting_activity_launched
            .iter()
            .find(|w| w.wait_id == wait_id)?;
        let act = self.activities.get(waiter.target.0)?;
        match act.state {
            ActivityState::Resumed | ActivityState::Paused | ActivityState::Stopped => Some(true),
            ActivityState::Finishing | ActivityState::Destroying | ActivityState::Destroyed => Some(false),
            _ => None,
        }
    }

    pub fn clear_wait(&mut self, stack_id: StackId, wait_id: u64) {
        if let Some(stack) = self.stacks.get_mut(stack_id.0) {
            stack.queues.waiting_activity_launched.retain(|w| w.wait_id != wait_id);
        }
    }

    /// `finish_activity` (§4.B, §3): moves `activity` through
    /// FINISHING -> DESTROYING -> DESTROYED, removes it from its task,
    /// and destroys the task if that was its last activity. Destroy is
    /// performed immediately rather than deferred until a successor
    /// resumes or a timeout fires — this crate's synchronous model has
    /// no background timer thread, so "successor resumed" is satisfied
    /// inline by re-driving `resume_top_activity` right after.
    pub fn finish_activity(
        &mut self,
        collaborators: &Collaborators,
        activity: ActivityId,
        reason: FinishReason,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<()> {
        let task_id = self
            .activities
            .get(activity.0)
            .ok_or(SupervisorError::UnknownActivity(activity))?
            .task;
        let stack_id = self.stack_of_task(task_id)?;

        if let Some(act) = self.activities.get_mut(activity.0) {
            if act.state != ActivityState::Finishing {
                act.mark_finishing(reason);
            }
        }
        if let Some(stack) = self.stacks.get_mut(stack_id.0) {
            stack.queues.finishing.push(activity);
            if stack.resumed_activity == Some(activity) {
                stack.resumed_activity = None;
            }
            if stack.pausing_activity == Some(activity) {
                stack.pausing_activity = None;
            }
            stack.remove_from_lru(activity);
        }

        collaborators.application_thread.schedule_destroy_activity(activity).ok();
        if let Some(act) = self.activities.get_mut(activity.0) {
            act.schedule_destroy();
            act.complete_destroy();
        }
        self.clear_queues_for(stack_id, activity);

        let task_empty = self
            .tasks
            .get_mut(task_id.0)
            .map(|t| t.remove(activity))
            .unwrap_or(false);
        if task_empty {
            if let Some(stack) = self.stacks.get_mut(stack_id.0) {
                stack.remove_task(task_id);
            }
            self.tasks.remove(task_id.0);
            debug!("task {:?} destroyed: last activity {:?} finished", task_id, activity);
        }

        self.resume_top_activity(collaborators, stack_id, now)?;
        Ok(())
    }

    /// `handle_app_died` (§4.E, §7, §9 open question): every activity
    /// hosted by `process` takes the two-strikes rule, except an
    /// activity in its task's root position while `restarting` is true —
    /// that one is exempt, since the platform keeps the root activity
    /// record alive across an in-flight process restart rather than
    /// tearing it down. The process record is torn down either way.
    pub fn handle_app_died(
        &mut self,
        collaborators: &Collaborators,
        process: ProcessId,
        restarting: bool,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Vec<(ActivityId, bool)> {
        let mut outcomes = Vec::new();
        let affected: Vec<ActivityId> = self
            .activities
            .iter()
            .filter(|(_, a)| a.process == Some(process))
            .map(|(_, a)| a.id)
            .collect();
        for activity_id in affected {
            let task_id = self.activities.get(activity_id.0).map(|a| a.task);
            let is_root = match task_id {
                Some(t) => self
                    .tasks
                    .get(t.0)
                    .map(|task| task.activities.first() == Some(&activity_id))
                    .unwrap_or(false),
                None => false,
            };
            if restarting && is_root {
                debug!("exempting root activity {:?} from app-death: process is restarting", activity_id);
                continue;
            }

            let was_mid_transition = self
                .activities
                .get(activity_id.0)
                .map(|a| matches!(a.state, ActivityState::Initializing | ActivityState::Pausing | ActivityState::Stopping))
                .unwrap_or(false);
            if was_mid_transition {
                let fatal = self
                    .activities
                    .get_mut(activity_id.0)
                    .map(|a| a.on_process_death_during_transition())
                    .unwrap_or(false);
                if fatal {
                    let _ = self.finish_activity(collaborators, activity_id, FinishReason::SecondCrash, now);
                }
                outcomes.push((activity_id, fatal));
            } else {
                let _ = self.finish_activity(collaborators, activity_id, FinishReason::ProcessDied, now);
                outcomes.push((activity_id, true));
            }
        }
        if self.heavyweight_process == Some(process) {
            self.heavyweight_process = None;
        }
        self.processes.processes.retain(|p| p.id != process);
        outcomes
    }

    /// Record a crash through `AppErrors` and report it via the sink
    /// (§4.F, §11 crash dump plumbing). A process `MarkedBad` has every
    /// activity it hosts finished (§4.F/§7: "its activities are
    /// finished"); `GrantedServiceRetry`/`Recorded` leave them running.
    pub fn record_crash(
        &mut self,
        collaborators: &Collaborators,
        process: ProcessId,
        policy: &CrashPolicy,
        now: chrono::DateTime<chrono::Utc>,
        message: String,
        stack_trace: String,
    ) -> Result<CrashOutcome> {
        let record = self
            .processes
            .get(process)
            .ok_or(SupervisorError::UnknownProcess(process))?;
        let key = record.key();
        let persistent = record.persistent;
        let isolated = if record.isolated { Some(process) } else { None };
        let state = record.state;

        let report = crate::external::CrashReport {
            process,
            message: message.clone(),
            stack: stack_trace.clone(),
        };
        collaborators.crash_report_sink.report(report.clone());

        let outcome = self
            .app_errors
            .record_crash(key.clone(), isolated, state, persistent, now, policy, report);

        if outcome == CrashOutcome::MarkedBad {
            if let Some(p) = self.processes.get_mut(process) {
                p.bad = true;
            }
            let affected: Vec<ActivityId> = self
                .activities
                .iter()
                .filter(|(_, a)| a.process == Some(process))
                .map(|(_, a)| a.id)
                .collect();
            for activity_id in affected {
                let _ = self.finish_activity(collaborators, activity_id, FinishReason::ProcessDied, now);
            }
        }
        Ok(outcome)
    }

    /// Bring `stack` into split-primary and reflow an eligible secondary
    /// stack into split-secondary (§4.C activation side effects).
    pub fn activate_split_screen(
        &mut self,
        collaborators: &Collaborators,
        primary: StackId,
        secondary: Option<StackId>,
    ) -> Result<()> {
        let display_id = self.stacks.get(primary.0).ok_or(SupervisorError::UnknownStack(primary))?.display;
        {
            let stack = self.stacks.get_mut(primary.0).ok_or(SupervisorError::UnknownStack(primary))?;
            stack.windowing_mode = WindowingMode::SplitPrimary;
        }
        let disp = self.displays.get_mut(display_id.0).ok_or(SupervisorError::UnknownDisplay(display_id))?;
        disp.set_singleton(ActivityType::Standard, WindowingMode::SplitPrimary, primary);

        if let Some(secondary_id) = secondary {
            let stack = self.stacks.get_mut(secondary_id.0).ok_or(SupervisorError::UnknownStack(secondary_id))?;
            stack.windowing_mode = WindowingMode::SplitSecondary;
        }
        collaborators.display_listener.on_stack_order_changed(display_id);
        Ok(())
    }

    /// Dismiss split-screen: the primary reverts to fullscreen and no
    /// longer occupies the singleton split-primary slot; any secondary
    /// stacks revert too. The home stack is repositioned directly behind
    /// the topmost fullscreen stack, since it's no longer pinned beneath
    /// a split-primary occupant (§4.C).
    pub fn dismiss_split_screen(&mut self, collaborators: &Collaborators, primary: StackId) -> Result<()> {
        let display_id = self.stacks.get(primary.0).ok_or(SupervisorError::UnknownStack(primary))?.display;
        {
            let stack = self.stacks.get_mut(primary.0).ok_or(SupervisorError::UnknownStack(primary))?;
            stack.windowing_mode = WindowingMode::Fullscreen;
        }
        {
            let disp = self.displays.get_mut(display_id.0).ok_or(SupervisorError::UnknownDisplay(display_id))?;
            disp.clear_singleton_if(primary);
        }

        let secondaries: Vec<StackId> = {
            let disp = self.displays.get(display_id.0).ok_or(SupervisorError::UnknownDisplay(display_id))?;
            disp.stacks
                .iter()
                .copied()
                .filter(|s| {
                    self.stacks
                        .get(s.0)
                        .map(|st| st.windowing_mode == WindowingMode::SplitSecondary)
                        .unwrap_or(false)
                })
                .collect()
        };
        for s in secondaries {
            if let Some(stack) = self.stacks.get_mut(s.0) {
                stack.windowing_mode = WindowingMode::Fullscreen;
            }
        }

        let home = self.displays.get(display_id.0).and_then(|d| d.home_stack);
        if let Some(home_id) = home {
            // One below the current top: `stacks.len() - 1` is home's own
            // slot (still present), so the slot directly beneath whatever
            // ends up on top once home is pulled out is one less than that.
            let behind_top = self
                .displays
                .get(display_id.0)
                .map(|d| d.stacks.len().saturating_sub(1))
                .unwrap_or(1)
                .saturating_sub(1);
            let stacks = &self.stacks;
            if let Some(disp) = self.displays.get_mut(display_id.0) {
                disp.position_child_at(home_id, behind_top, |_| false, |s| {
                    stacks.get(s.0).map(|st| st.position_rank(false)).unwrap_or(0)
                });
            }
            collaborators.display_listener.on_stack_order_changed(display_id);
        }

        collaborators.display_listener.on_split_screen_mode_dismissed(display_id);
        Ok(())
    }
}

fn id_from_index<T>(index: generational_arena::Index) -> T
where
    T: From<generational_arena::Index>,
{
    T::from(index)
}

macro_rules! impl_from_index {
    ($name:ident) => {
        impl From<generational_arena::Index> for $name {
            fn from(index: generational_arena::Index) -> Self {
                $name(index)
            }
        }
    };
}

impl_from_index!(ActivityId);
impl_from_index!(TaskId);
impl_from_index!(StackId);
impl_from_index!(DisplayId);

/// Public entry point: the supervisor lock plus the condition variable
/// that blocking calls wait on (§5). Every public method acquires
/// `state`, does its bookkeeping, and releases before any blocking wait.
/// Collaborator calls (`ApplicationThread::schedule_*`, `WindowManager`,
/// `DisplayListener`) happen while `state` is held — they model a
/// synchronous, non-blocking RPC acknowledgment (§6), not real transport
/// I/O, so a `Collaborators` implementation backed by an actual IPC
/// channel must hand off the blocking part of the call to another thread
/// rather than call back into `Supervisor` from inside one of these
/// traits, which would deadlock on the non-reentrant lock.
pub struct Supervisor {
    state: Mutex<SupervisorState>,
    condvar: Condvar,
    clock: Arc<dyn Clock>,
    collaborators: Collaborators,
    config: SupervisorConfig,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig, clock: Arc<dyn Clock>, collaborators: Collaborators) -> Self {
        Self {
            state: Mutex::new(SupervisorState::new(&config)),
            condvar: Condvar::new(),
            clock,
            collaborators,
            config,
        }
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&mut SupervisorState) -> R) -> R {
        let mut guard = self.state.lock();
        let result = f(&mut guard);
        self.condvar.notify_all();
        result
    }

    pub fn create_display(&self, capabilities: DeviceCapabilities) -> DisplayId {
        self.with_state(|s| s.create_display(capabilities))
    }

    pub fn create_stack(&self, display: DisplayId, mode: WindowingMode, activity_type: ActivityType) -> Result<StackId> {
        self.with_state(|s| s.create_stack(display, mode, activity_type))
    }

    /// Register a §4.H launch-params modifier. Evaluation order is LIFO:
    /// the most recently registered modifier runs first against every
    /// subsequent `start_activity_may_wait`/`start_activities` call.
    pub fn register_launch_params_modifier(&self, modifier: Box<dyn LaunchParamsModifier + Send + Sync>) {
        self.with_state(|s| s.launch_params.register(modifier));
    }

    /// `start_activity_may_wait` (§4.D, §5): resolves placement via §4.H
    /// and §4.C, then blocks the calling thread until the launched
    /// activity settles or `config.deadlines.launch` elapses, whichever
    /// comes first.
    pub fn start_activity_may_wait(&self, display: DisplayId, user: UserId, intent: Intent) -> Result<ActivityId> {
        let now = self.clock.now();
        let (activity_id, stack_id, wait_id) = {
            let mut guard = self.state.lock();
            let result = guard.begin_start_activity(&self.collaborators, display, user, intent, now);
            self.condvar.notify_all();
            result?
        };

        let mut guard = self.state.lock();
        loop {
            if let Some(resolved) = guard.wait_resolved(stack_id, wait_id) {
                guard.clear_wait(stack_id, wait_id);
                return if resolved {
                    Ok(activity_id)
                } else {
                    Err(SupervisorError::LaunchFailed(activity_id))
                };
            }
            let timed_out = self.condvar.wait_for(&mut guard, self.config.deadlines.launch).timed_out();
            if timed_out {
                guard.clear_wait(stack_id, wait_id);
                return Err(SupervisorError::Timeout);
            }
        }
    }

    /// `start_activities` batch variant (§4.D): same resolution/process
    /// path as `start_activity_may_wait`, but synchronous and not waited
    /// on individually — the caller is expected to inspect the returned
    /// ids rather than block.
    pub fn start_activities(&self, display: DisplayId, user: UserId, intents: Vec<Intent>) -> Result<Vec<ActivityId>> {
        let now = self.clock.now();
        self.with_state(|s| {
            intents
                .into_iter()
                .map(|intent| {
                    s.begin_start_activity(&self.collaborators, display, user, intent, now)
                        .map(|(a, _, _)| a)
                })
                .collect()
        })
    }

    pub fn attach_application(&self, process_name: &str, uid: u32, pid: u32) -> Result<()> {
        let now = self.clock.now();
        self.with_state(|s| s.attach_application(&self.collaborators, (process_name, uid), pid, now))
    }

    pub fn resume_top_activity(&self, stack_id: StackId) -> Result<Option<ActivityId>> {
        let now = self.clock.now();
        self.with_state(|s| s.resume_top_activity(&self.collaborators, stack_id, now))
    }

    pub fn complete_pause(&self, stack_id: StackId) -> Result<Option<ActivityId>> {
        let now = self.clock.now();
        self.with_state(|s| s.complete_pause_and_continue(&self.collaborators, stack_id, now))
    }

    /// Finish `activity` through the public API (back navigation, a
    /// caller-requested finish, TASK_TO_FRONT short-circuit, etc.),
    /// driving it through FINISHING -> DESTROYING -> DESTROYED and
    /// destroying its task if this was the last activity in it (§3, §4.B).
    pub fn finish_activity(&self, activity: ActivityId, reason: FinishReason) -> Result<()> {
        let now = self.clock.now();
        self.with_state(|s| s.finish_activity(&self.collaborators, activity, reason, now))
    }

    pub fn handle_app_died(&self, process: ProcessId, restarting: bool) -> Vec<(ActivityId, bool)> {
        let now = self.clock.now();
        self.with_state(|s| s.handle_app_died(&self.collaborators, process, restarting, now))
    }

    pub fn record_crash(&self, process: ProcessId, message: String, stack_trace: String) -> Result<CrashOutcome> {
        let now = self.clock.now();
        let policy = self.config.crash_policy.clone();
        self.with_state(|s| s.record_crash(&self.collaborators, process, &policy, now, message, stack_trace))
    }

    pub fn activate_split_screen(&self, primary: StackId, secondary: Option<StackId>) -> Result<()> {
        self.with_state(|s| s.activate_split_screen(&self.collaborators, primary, secondary))
    }

    pub fn dismiss_split_screen(&self, primary: StackId) -> Result<()> {
        self.with_state(|s| s.dismiss_split_screen(&self.collaborators, primary))
    }

    /// `shutdown_locked` (§4.D): pause every currently-RESUMED activity on
    /// the way down, bounded by `timeout`. An activity whose
    /// `ApplicationThread` never acknowledges the pause (a hung/ANR'd
    /// app) is force-paused instead via `force_pause_timeout`, and the
    /// result reports `timedout = true`.
    pub fn shutdown_locked(&self, timeout: std::time::Duration) -> ShutdownResult {
        let deadline = self.clock.now()
            + chrono::Duration::from_std(timeout).unwrap_or_else(|_| chrono::Duration::zero());
        let mut guard = self.state.lock();
        let stack_ids: Vec<StackId> = guard.stacks.iter().map(|(i, _)| StackId(i)).collect();
        let mut timedout = false;

        for stack_id in stack_ids {
            let resumed = guard.stacks.get(stack_id.0).and_then(|s| s.resumed_activity);
            let Some(activity) = resumed else { continue };

            if self.clock.now() >= deadline {
                timedout = true;
            }
            let acked = self
                .collaborators
                .application_thread
                .schedule_pause_activity(activity, false)
                .is_ok();
            if let Some(act) = guard.activities.get_mut(activity.0) {
                act.schedule_pause();
            }
            if acked {
                if let Some(act) = guard.activities.get_mut(activity.0) {
                    act.complete_pause();
                }
            } else {
                timedout = true;
                if let Some(act) = guard.activities.get_mut(activity.0) {
                    act.force_pause_timeout();
                }
                warn!("shutdown_locked: {:?} did not ack pause within {:?}, forcing PAUSED", activity, timeout);
            }
            if let Some(stack) = guard.stacks.get_mut(stack_id.0) {
                stack.resumed_activity = None;
                stack.pausing_activity = None;
            }
        }

        drop(guard);
        self.condvar.notify_all();
        ShutdownResult { timedout }
    }

    // ── User lifecycle (§4.G) ────────────────────────────────────────────

    pub fn start_user(&self, user: UserId) -> Result<Vec<UserId>> {
        self.with_state(|s| s.users.start_user(user))
    }

    /// Two-phase stop: drives the user-stopping broadcast, then the
    /// shutdown broadcast, then `finish_user_stop` (§4.G, §5). Driven
    /// synchronously here since broadcast delivery in this crate is a
    /// single dispatcher call rather than an async fan-out.
    pub fn stop_user(&self, user: UserId, force: bool) -> Result<()> {
        let outcome = self.with_state(|s| s.users.begin_stop(user, force))?;
        if outcome != crate::user::UserOpError::Ok {
            return Err(SupervisorError::UserOpInvalid);
        }
        self.collaborators.broadcast_dispatcher.broadcast_intent("ACTION_USER_STOPPING", user);
        self.with_state(|s| s.users.on_stopping_broadcast_complete(user))?;
        self.collaborators.broadcast_dispatcher.broadcast_intent("ACTION_SHUTDOWN", user);
        self.with_state(|s| s.users.finish_user_stop(user));
        Ok(())
    }

    /// User switch protocol (§4.G): freeze the screen, fan out
    /// `onUserSwitching`-equivalent broadcasts, then bring the new user
    /// to the foreground in USER_BACKGROUND -> USER_FOREGROUND ->
    /// USER_SWITCHED order.
    pub fn switch_user(&self, target: UserId) -> Result<()> {
        self.collaborators.window_manager.start_freezing_screen();
        let previous = self.with_state(|s| s.users.begin_switch(target))?;

        self.collaborators.broadcast_dispatcher.broadcast_intent("ACTION_USER_BACKGROUND", previous);
        self.collaborators.window_manager.set_current_user(target, &[target]);
        self.collaborators.broadcast_dispatcher.broadcast_intent("ACTION_USER_FOREGROUND", target);
        self.collaborators.broadcast_dispatcher.broadcast_intent("ACTION_USER_SWITCHED", target);

        self.with_state(|s| s.users.complete_switch(target))?;
        self.collaborators.window_manager.stop_freezing_screen();
        Ok(())
    }

    pub fn unlock_user(&self, user: UserId, token: &[u8]) -> Result<()> {
        if !self.collaborators.storage_service.unlock_user_key(user, token) {
            return Err(SupervisorError::PermissionDenied);
        }
        self.with_state(|s| s.users.unlock(user))?;
        self.collaborators.broadcast_dispatcher.broadcast_intent("ACTION_USER_UNLOCKED", user);
        Ok(())
    }

    /// Write the OOM-adjustment/minfree tables to the low-memory-killer
    /// sysfs seam, reflecting the configured memory profile (§4.E).
    pub fn publish_oom_tables(&self) {
        let table = crate::process::compute_minfree_table(&self.config.memory_profile);
        let adjustments: Vec<i32> = table.iter().map(|(adj, _)| *adj).collect();
        let minfree: Vec<u64> = table.iter().map(|(_, pages)| *pages).collect();
        self.collaborators.low_memory_killer.write_adj_minfree(&adjustments, &minfree);
    }
}
