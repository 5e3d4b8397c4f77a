//! AppErrors: crash/ANR accounting, bad-process list, quick-crash
//! detection (§4.F).

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::config::CrashPolicy;
use crate::external::CrashReport;
use crate::ids::ProcessId;
use crate::process::ProcessState;

#[derive(Debug, Clone, Default)]
pub struct CrashCount {
    pub window_start: Option<DateTime<Utc>>,
    pub count: u32,
}

#[derive(Debug, Clone)]
pub struct BadProcessEntry {
    pub report: CrashReport,
    /// Surfaced to the dialog layer per §4.F's bound-foreground-service
    /// exception; this crate does not own the dialog itself (§1).
    pub is_restartable_for_service: bool,
}

type ProcUid = (String, u32);

#[derive(Default)]
pub struct AppErrors {
    pub crash_times: HashMap<ProcUid, DateTime<Utc>>,
    pub crash_times_persistent: HashMap<ProcUid, DateTime<Utc>>,
    pub crash_show_dialog_times: HashMap<ProcUid, DateTime<Utc>>,
    pub crash_counts: HashMap<ProcUid, CrashCount>,
    pub bad_processes: HashMap<ProcUid, BadProcessEntry>,
    /// Isolated processes have no persistent identity; tracked only by
    /// `ProcessId` so they can never collide with a named process and
    /// are never added to `bad_processes` (§4.F).
    pub isolated_crash_times: HashMap<ProcessId, DateTime<Utc>>,
}

/// Outcome of recording a crash, used by the caller to decide what to do
/// to the process's activities (§4.F, §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrashOutcome {
    Recorded,
    MarkedBad,
    /// Granted the BOUND_FOREGROUND_SERVICE exception: one more retry
    /// even though the quick-crash limit was exceeded.
    GrantedServiceRetry,
}

impl AppErrors {
    /// Explicit process restart resets `crash_times` (not
    /// `crash_times_persistent`, which only a user command resets) (§4.F).
    pub fn reset_on_restart(&mut self, key: &ProcUid) {
        self.crash_times.remove(key);
        self.crash_counts.remove(key);
    }

    pub fn reset_persistent(&mut self, key: &ProcUid) {
        self.crash_times_persistent.remove(key);
    }

    /// Record a crash and apply the quick-crash rule.
    ///
    /// Isolated processes bypass the bad-process list entirely. A
    /// persistent process's crash count is still recorded for
    /// diagnostics, but it is never marked bad.
    pub fn record_crash(
        &mut self,
        key: ProcUid,
        isolated_id: Option<ProcessId>,
        process_state: ProcessState,
        persistent: bool,
        now: DateTime<Utc>,
        policy: &CrashPolicy,
        report: CrashReport,
    ) -> CrashOutcome {
        if let Some(id) = isolated_id {
            self.isolated_crash_times.insert(id, now);
            return CrashOutcome::Recorded;
        }

        let last_crash = self.crash_times.insert(key.clone(), now);
        self.crash_times_persistent.insert(key.clone(), now);

        let entry = self.crash_counts.entry(key.clone()).or_default();
        let window_expired = entry
            .window_start
            .map(|start| now - start > chrono::Duration::from_std(policy.reset_interval).unwrap())
            .unwrap_or(true);
        if window_expired {
            entry.window_start = Some(now);
            entry.count = 1;
        } else {
            entry.count += 1;
        }

        let quick = last_crash
            .map(|t| now - t < chrono::Duration::from_std(policy.min_crash_interval).unwrap())
            .unwrap_or(false);
        let over_limit = entry.count > policy.max_crashes_in_window;

        if persistent {
            // Persistent processes are never marked bad; the count is
            // still recorded above for diagnostic dumping (§4.F).
            return CrashOutcome::Recorded;
        }

        if quick || over_limit {
            if process_state == ProcessState::BoundForegroundService
                && policy.bound_foreground_service_extra_retry > 0
                && !self.bad_processes.contains_key(&key)
            {
                return CrashOutcome::GrantedServiceRetry;
            }
            self.bad_processes.insert(
                key,
                BadProcessEntry {
                    report,
                    is_restartable_for_service: process_state == ProcessState::BoundForegroundService,
                },
            );
            return CrashOutcome::MarkedBad;
        }

        CrashOutcome::Recorded
    }

    pub fn is_bad(&self, key: &ProcUid) -> bool {
        self.bad_processes.contains_key(key)
    }

    /// Broadcasts to a bad process are refused (§4.F, §7 QuotaExceeded).
    pub fn broadcasts_refused(&self, key: &ProcUid) -> bool {
        self.is_bad(key)
    }
}
