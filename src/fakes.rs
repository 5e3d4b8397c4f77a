//! In-memory fakes of the §6 collaborator traits, gated behind the
//! `testing` feature so downstream integration tests can embed this
//! crate without standing up a real package manager, window server, or
//! process host.

use std::sync::Mutex;

use crate::error::SupervisorError;
use crate::external::{
    ActivityInfo, ApplicationThread, BroadcastDispatcher, CrashReport, CrashReportSink, DisplayListener,
    Intent, LowMemoryKiller, PackageResolver, ProcessLauncher, StorageService, WindowManager,
};
use crate::ids::{ActivityId, DisplayId, ProcessId, UserId};

/// Resolves every intent to one fixed `ActivityInfo`, registered up
/// front. Good enough for scenario tests that only launch one component.
#[derive(Default)]
pub struct FixedResolver {
    pub info: Option<ActivityInfo>,
}

impl FixedResolver {
    pub fn new(info: ActivityInfo) -> Self {
        Self { info: Some(info) }
    }
}

impl PackageResolver for FixedResolver {
    fn resolve_intent(&self, intent: &mut Intent, _user: UserId) -> Option<ActivityInfo> {
        let info = self.info.clone()?;
        intent.resolved_component = Some(info.component.clone());
        Some(info)
    }
}

/// Records every call for assertion instead of doing anything.
#[derive(Default)]
pub struct RecordingWindowManager {
    pub visibility_calls: Mutex<Vec<(ActivityId, bool)>>,
    pub freezes: Mutex<u32>,
}

impl WindowManager for RecordingWindowManager {
    fn set_visibility(&self, activity: ActivityId, visible: bool) {
        self.visibility_calls.lock().unwrap().push((activity, visible));
    }
    fn defer_surface_layout(&self) {}
    fn continue_surface_layout(&self) {}
    fn dismiss_keyguard(&self) {}
    fn start_freezing_screen(&self) {
        *self.freezes.lock().unwrap() += 1;
    }
    fn stop_freezing_screen(&self) {}
    fn lock_now(&self) {}
    fn set_current_user(&self, _user: UserId, _profile_ids: &[UserId]) {}
}

/// Never actually spawns anything; `started` records every process name
/// asked for so tests can assert on launch counts.
#[derive(Default)]
pub struct FakeProcessLauncher {
    pub started: Mutex<Vec<String>>,
    pub fail_names: Mutex<Vec<String>>,
}

impl ProcessLauncher for FakeProcessLauncher {
    fn start_process(&self, process_name: &str, _uid: u32) -> Result<(), SupervisorError> {
        if self.fail_names.lock().unwrap().iter().any(|n| n == process_name) {
            return Err(SupervisorError::ProcessStartFailed);
        }
        self.started.lock().unwrap().push(process_name.to_string());
        Ok(())
    }

    fn kill_process(&self, _process: ProcessId, _pid: u32) {}
}

#[derive(Default)]
pub struct NoopApplicationThread;

impl ApplicationThread for NoopApplicationThread {
    fn schedule_launch_activity(&self, _activity: ActivityId) -> Result<(), ()> {
        Ok(())
    }
    fn schedule_pause_activity(&self, _activity: ActivityId, _finishing: bool) -> Result<(), ()> {
        Ok(())
    }
    fn schedule_stop_activity(&self, _activity: ActivityId) -> Result<(), ()> {
        Ok(())
    }
    fn schedule_destroy_activity(&self, _activity: ActivityId) -> Result<(), ()> {
        Ok(())
    }
    fn schedule_crash(&self, _message: &str) {}
}

/// Unlocks any user presented with a non-empty token.
#[derive(Default)]
pub struct FakeStorageService {
    pub unlocked: Mutex<Vec<UserId>>,
}

impl StorageService for FakeStorageService {
    fn unlock_user_key(&self, user: UserId, token: &[u8]) -> bool {
        if token.is_empty() {
            return false;
        }
        self.unlocked.lock().unwrap().push(user);
        true
    }

    fn is_user_key_unlocked(&self, user: UserId) -> bool {
        self.unlocked.lock().unwrap().contains(&user)
    }
}

#[derive(Default)]
pub struct RecordingBroadcastDispatcher {
    pub sent: Mutex<Vec<(String, UserId)>>,
}

impl BroadcastDispatcher for RecordingBroadcastDispatcher {
    fn broadcast_intent(&self, action: &str, user: UserId) {
        self.sent.lock().unwrap().push((action.to_string(), user));
    }
}

#[derive(Default)]
pub struct RecordingLowMemoryKiller {
    pub last_adj_minfree: Mutex<Option<(Vec<i32>, Vec<u64>)>>,
    pub last_extra_free_kbytes: Mutex<Option<u64>>,
}

impl LowMemoryKiller for RecordingLowMemoryKiller {
    fn write_adj_minfree(&self, adjustments: &[i32], minfree_pages: &[u64]) {
        *self.last_adj_minfree.lock().unwrap() = Some((adjustments.to_vec(), minfree_pages.to_vec()));
    }
    fn write_extra_free_kbytes(&self, kbytes: u64) {
        *self.last_extra_free_kbytes.lock().unwrap() = Some(kbytes);
    }
}

#[derive(Default)]
pub struct RecordingCrashReportSink {
    pub reports: Mutex<Vec<CrashReport>>,
}

impl CrashReportSink for RecordingCrashReportSink {
    fn report(&self, report: CrashReport) {
        self.reports.lock().unwrap().push(report);
    }
}

/// Always fails to acknowledge a pause, modeling a hung/ANR'd app for
/// `shutdown_locked` tests.
#[derive(Default)]
pub struct UnresponsiveApplicationThread;

impl ApplicationThread for UnresponsiveApplicationThread {
    fn schedule_launch_activity(&self, _activity: ActivityId) -> Result<(), ()> {
        Ok(())
    }
    fn schedule_pause_activity(&self, _activity: ActivityId, _finishing: bool) -> Result<(), ()> {
        Err(())
    }
    fn schedule_stop_activity(&self, _activity: ActivityId) -> Result<(), ()> {
        Ok(())
    }
    fn schedule_destroy_activity(&self, _activity: ActivityId) -> Result<(), ()> {
        Ok(())
    }
    fn schedule_crash(&self, _message: &str) {}
}

#[derive(Default)]
pub struct NoopDisplayListener;

impl DisplayListener for NoopDisplayListener {
    fn on_stack_order_changed(&self, _display: DisplayId) {}
    fn on_split_screen_mode_dismissed(&self, _display: DisplayId) {}
}

/// Records order-changed/split-dismissed notifications for assertion.
#[derive(Default)]
pub struct RecordingDisplayListener {
    pub order_changed: Mutex<Vec<DisplayId>>,
    pub split_dismissed: Mutex<Vec<DisplayId>>,
}

impl DisplayListener for RecordingDisplayListener {
    fn on_stack_order_changed(&self, display: DisplayId) {
        self.order_changed.lock().unwrap().push(display);
    }
    fn on_split_screen_mode_dismissed(&self, display: DisplayId) {
        self.split_dismissed.lock().unwrap().push(display);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_resolver_stamps_the_resolved_component_onto_the_intent() {
        let resolver = FixedResolver::new(ActivityInfo {
            component: "pkg/.Main".into(),
            process_name: "pkg".into(),
            uid: 1000,
            heavyweight: false,
            resizeable: true,
            activity_type: crate::stack::ActivityType::Standard,
        });
        let mut intent = Intent::default();
        let info = resolver.resolve_intent(&mut intent, UserId::SYSTEM).unwrap();
        assert_eq!(info.component, "pkg/.Main");
        assert_eq!(intent.resolved_component, Some("pkg/.Main".to_string()));
    }

    #[test]
    fn storage_service_refuses_empty_token() {
        let storage = FakeStorageService::default();
        assert!(!storage.unlock_user_key(UserId(10), &[]));
        assert!(storage.unlock_user_key(UserId(10), &[1, 2, 3]));
        assert!(storage.is_user_key_unlocked(UserId(10)));
    }
}
