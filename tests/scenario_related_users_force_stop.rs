//! A stop request blocked by the related-users rule must be escalated to
//! a forced stop once the caller decides to time out waiting for the
//! blocker to go away itself (§4.G, §8.4 scenario 6).

use std::sync::Arc;

use activity_supervisor::fakes::{
    FakeProcessLauncher, FakeStorageService, FixedResolver, NoopApplicationThread,
    NoopDisplayListener, RecordingBroadcastDispatcher, RecordingCrashReportSink,
    RecordingLowMemoryKiller, RecordingWindowManager,
};
use activity_supervisor::{ActivityInfo, ActivityType, Collaborators, SupervisorConfig, SystemClock, UserId};

fn supervisor() -> activity_supervisor::Supervisor {
    let collaborators = Collaborators {
        package_resolver: Arc::new(FixedResolver::new(ActivityInfo {
            component: "com.example/.Main".into(),
            process_name: "com.example".into(),
            uid: 10_050,
            heavyweight: false,
            resizeable: true,
            activity_type: ActivityType::Standard,
        })),
        window_manager: Arc::new(RecordingWindowManager::default()),
        process_launcher: Arc::new(FakeProcessLauncher::default()),
        application_thread: Arc::new(NoopApplicationThread::default()),
        storage_service: Arc::new(FakeStorageService::default()),
        broadcast_dispatcher: Arc::new(RecordingBroadcastDispatcher::default()),
        low_memory_killer: Arc::new(RecordingLowMemoryKiller::default()),
        crash_report_sink: Arc::new(RecordingCrashReportSink::default()),
        display_listener: Arc::new(NoopDisplayListener::default()),
    };
    activity_supervisor::Supervisor::new(SupervisorConfig::default(), Arc::new(SystemClock), collaborators)
}

#[test]
fn blocked_stop_escalates_to_forced_stop_after_timeout() {
    let sup = supervisor();
    sup.start_user(UserId(11)).unwrap();
    sup.start_user(UserId(12)).unwrap();
    sup.with_state(|s| {
        s.users.get_mut(UserId(12)).unwrap().profile_group = UserId(11);
        s.users.current_user = UserId(12);
    });
    // User 12 (the current user) is related to user 11 via a shared
    // profile group, so an unforced stop of 11 is refused (§4.G).

    let blocked = sup.stop_user(UserId(11), false);
    assert!(blocked.is_err());

    // Caller gave up waiting for the condition to clear on its own and
    // escalates to a forced stop, which always proceeds for a non-system,
    // non-current user.
    sup.stop_user(UserId(11), true).unwrap();

    sup.with_state(|s| {
        assert!(!s.users.running_lru.contains(&UserId(11)));
    });
}
