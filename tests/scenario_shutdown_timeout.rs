//! `shutdown_locked` pauses every RESUMED activity on the way down; an
//! `ApplicationThread` that never acknowledges the pause (a hung app) is
//! force-paused instead, and the result reports `timedout` (§4.D, §8.4).

use std::sync::Arc;
use std::time::Duration;

use activity_supervisor::fakes::{
    FakeProcessLauncher, FakeStorageService, FixedResolver, NoopDisplayListener,
    RecordingBroadcastDispatcher, RecordingCrashReportSink, RecordingLowMemoryKiller,
    RecordingWindowManager, UnresponsiveApplicationThread,
};
use activity_supervisor::{
    ActivityInfo, ActivityState, ActivityType, Collaborators, DeviceCapabilities, Intent,
    SupervisorConfig, SystemClock, UserId,
};

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
        application_thread: Arc::new(UnresponsiveApplicationThread::default()),
        storage_service: Arc::new(FakeStorageService::default()),
        broadcast_dispatcher: Arc::new(RecordingBroadcastDispatcher::default()),
        low_memory_killer: Arc::new(RecordingLowMemoryKiller::default()),
        crash_report_sink: Arc::new(RecordingCrashReportSink::default()),
        display_listener: Arc::new(NoopDisplayListener::default()),
    };
    activity_supervisor::Supervisor::new(SupervisorConfig::default(), Arc::new(SystemClock), collaborators)
}

#[test]
fn unresponsive_application_thread_forces_pause_and_reports_timeout() {
    let sup = Arc::new(supervisor());
    let display = sup.create_display(DeviceCapabilities::default());

    let launcher = sup.clone();
    let handle = std::thread::spawn(move || {
        launcher
            .start_activity_may_wait(display, UserId::SYSTEM, Intent::default())
            .unwrap()
    });
    std::thread::sleep(Duration::from_millis(20));
    sup.attach_application("com.example", 10_050, 4242).unwrap();
    let activity = handle.join().unwrap();
    sup.with_state(|s| {
        assert_eq!(s.activities.get(activity.0).unwrap().state, ActivityState::Resumed);
    });

    let result = sup.shutdown_locked(Duration::from_millis(50));

    assert!(result.timedout);
    sup.with_state(|s| {
        assert_eq!(s.activities.get(activity.0).unwrap().state, ActivityState::Paused);
        let task = s.activities.get(activity.0).unwrap().task;
        let stack_id = s.tasks.get(task.0).unwrap().stack;
        assert_eq!(s.stacks.get(stack_id.0).unwrap().resumed_activity, None);
    });
}
