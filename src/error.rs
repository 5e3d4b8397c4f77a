//! Error taxonomy (§7).
//!
//! Split by recoverability rather than by exit code: transient faults are
//! handled locally with bounded retries by the caller of this crate;
//! persistent faults are surfaced as activity finishes (§7 Recovery
//! policy).

use thiserror::Error;

use crate::ids::{ActivityId, DisplayId, ProcessId, StackId, TaskId, UserId};

#[derive(Error, Debug)]
pub enum SupervisorError {
    // ── Caller-facing faults (§7) ─────────────────────────────────────
    #[error("permission denied for requested operation")]
    PermissionDenied,

    #[error("intent malformed or carried a file-descriptor payload")]
    BadIntent,

    #[error("package resolver returned no activity for the intent")]
    ResolveFailed,

    #[error("process start failed, activity remains INITIALIZING")]
    ProcessStartFailed,

    #[error("application thread reported a remote failure for activity {0:?}")]
    LaunchFailed(ActivityId),

    #[error("activity {0:?} crashed twice during the same launch attempt")]
    CrashFatal(ActivityId),

    #[error("process {0:?} exceeded the quick-crash policy and was marked bad")]
    QuotaExceeded(ProcessId),

    #[error("requested user operation is not valid for the system or current user")]
    UserOpInvalid,

    #[error("bounded wait exceeded its deadline")]
    Timeout,

    // ── Arena/lookup faults (internal consistency, not spec-level) ────
    #[error("unknown activity: {0:?}")]
    UnknownActivity(ActivityId),

    #[error("unknown task: {0:?}")]
    UnknownTask(TaskId),

    #[error("unknown stack: {0:?}")]
    UnknownStack(StackId),

    #[error("unknown display: {0:?}")]
    UnknownDisplay(DisplayId),

    #[error("unknown process: {0:?}")]
    UnknownProcess(ProcessId),

    #[error("unknown user: {0:?}")]
    UnknownUser(UserId),

    // ── Configuration invariants (§4.C) ────────────────────────────────
    #[error("attempted to create a second singleton stack of a role that already exists")]
    ConfigurationError,
}

pub type Result<T> = std::result::Result<T, SupervisorError>;
