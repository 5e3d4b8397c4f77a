//! Narrow collaborator traits (§6). The supervisor consumes these; it
//! never constructs a window, resolves a package, or writes to a real
//! kernel sysfs node itself. A `testing`-feature `fakes` module supplies
//! deterministic in-memory implementations for the test suite.

use crate::ids::{ActivityId, DisplayId, ProcessId, UserId};
use crate::stack::ActivityType;

/// An opaque, resolved application component. The supervisor treats the
/// contents as inert data; only the package resolver understands intents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityInfo {
    pub component: String,
    pub process_name: String,
    pub uid: u32,
    /// Declared "cannot save state" flag (§4.D heavyweight-process rule).
    pub heavyweight: bool,
    pub resizeable: bool,
    /// Home/Recents/Standard role, used by `get_or_create_stack` to pick
    /// or create the right singleton stack (§4.C).
    pub activity_type: ActivityType,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Intent {
    pub resolved_component: Option<String>,
    pub data: String,
}

/// `resolve_intent(intent, resolved_type, flags, user) -> ActivityInfo?` (§6).
///
/// The core caches the resolved component back into the intent to
/// guarantee idempotent replay (§8 round-trip law).
pub trait PackageResolver: Send + Sync {
    fn resolve_intent(&self, intent: &mut Intent, user: UserId) -> Option<ActivityInfo>;
}

/// Window/Surface manager (§6). Rendering itself is out of scope (§1);
/// the supervisor only needs to tell it what's visible and when to
/// bracket a batch of layout changes atomically.
pub trait WindowManager: Send + Sync {
    fn set_visibility(&self, activity: ActivityId, visible: bool);
    fn defer_surface_layout(&self);
    fn continue_surface_layout(&self);
    fn dismiss_keyguard(&self);
    fn start_freezing_screen(&self);
    fn stop_freezing_screen(&self);
    fn lock_now(&self);
    fn set_current_user(&self, user: UserId, profile_ids: &[UserId]);
}

/// `start_process(processName, appInfo, hostingType, hostingName) ->
/// ProcessRecord` (§6). Returns a handle the caller correlates with the
/// `ProcessId` minted by `ProcessRegistry`; actual process creation is a
/// host concern outside this crate (§1 Non-goals: no OS-level packaging).
pub trait ProcessLauncher: Send + Sync {
    fn start_process(&self, process_name: &str, uid: u32) -> Result<(), crate::error::SupervisorError>;
    fn kill_process(&self, process: ProcessId, pid: u32);
}

/// Per-process application thread RPC surface (§6). Every call can fail
/// with a remote-exception-equivalent `Result::Err`, matching §9's
/// "Exception-as-control-flow" redesign note.
pub trait ApplicationThread: Send + Sync {
    fn schedule_launch_activity(&self, activity: ActivityId) -> Result<(), ()>;
    fn schedule_pause_activity(&self, activity: ActivityId, finishing: bool) -> Result<(), ()>;
    fn schedule_stop_activity(&self, activity: ActivityId) -> Result<(), ()>;
    fn schedule_destroy_activity(&self, activity: ActivityId) -> Result<(), ()>;
    fn schedule_crash(&self, message: &str);
}

/// Storage service (§6): user key unlock.
pub trait StorageService: Send + Sync {
    fn unlock_user_key(&self, user: UserId, token: &[u8]) -> bool;
    fn is_user_key_unlocked(&self, user: UserId) -> bool;
}

/// Broadcast dispatcher (§6), used only for user lifecycle broadcasts.
pub trait BroadcastDispatcher: Send + Sync {
    fn broadcast_intent(&self, action: &str, user: UserId);
}

/// Low-memory-killer sysfs contract (§6, §4.E): two comma-separated
/// integer lists (adjustments, page-count minfree thresholds) plus a
/// reserve kilobyte count. Modeled as a trait rather than literal file
/// I/O so the supervisor stays host-agnostic and testable; a production
/// embedder backs this with the real `/sys/module/lowmemorykiller/...`
/// writes.
pub trait LowMemoryKiller: Send + Sync {
    fn write_adj_minfree(&self, adjustments: &[i32], minfree_pages: &[u64]);
    fn write_extra_free_kbytes(&self, kbytes: u64);
}

/// Registrable sink for crash/ANR reports (§7 Recovery policy, §11
/// Crash dump plumbing). The UI layer that shows these to a user is out
/// of scope (§1); this is the narrowest useful seam.
#[derive(Debug, Clone)]
pub struct CrashReport {
    pub process: ProcessId,
    pub message: String,
    pub stack: String,
}

pub trait CrashReportSink: Send + Sync {
    fn report(&self, report: CrashReport);
}

/// Notified of `ActivityDisplay` ordering changes: a stack reshuffle via
/// `position_child_at`, or a split-screen dismissal (§4.C). Separate from
/// `WindowManager` because a host may want to react to order changes
/// (e.g. recents UI) without owning surface placement itself.
pub trait DisplayListener: Send + Sync {
    fn on_stack_order_changed(&self, display: DisplayId);
    fn on_split_screen_mode_dismissed(&self, display: DisplayId);
}
