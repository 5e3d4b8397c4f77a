//! Launching a second activity onto a stack that already has a RESUMED
//! activity must pause the incumbent first; the new activity only
//! resumes once that pause completes (§4.B, §8.4).

use std::sync::Arc;
use std::time::Duration;

use activity_supervisor::fakes::{
    FakeProcessLauncher, FakeStorageService, FixedResolver, NoopApplicationThread,
    NoopDisplayListener, RecordingBroadcastDispatcher, RecordingCrashReportSink,
    RecordingLowMemoryKiller, RecordingWindowManager,
};
use activity_supervisor::{
    ActivityInfo, ActivityState, ActivityType, Collaborators, DeviceCapabilities, Intent,
    SupervisorConfig, SystemClock, UserId,
};

fn supervisor(component: &str, process_name: &str) -> activity_supervisor::Supervisor {
    let mut config = SupervisorConfig::default();
    config.deadlines.launch = Duration::from_secs(5);
    let collaborators = Collaborators {
        package_resolver: Arc::new(FixedResolver::new(ActivityInfo {
            component: component.into(),
            process_name: process_name.into(),
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
    activity_supervisor::Supervisor::new(config, Arc::new(SystemClock), collaborators)
}

#[test]
fn second_launch_pauses_incumbent_before_resuming() {
    let sup = Arc::new(supervisor("com.example/.Main", "com.example"));
    let display = sup.create_display(DeviceCapabilities::default());

    let first_launcher = sup.clone();
    let first_handle = std::thread::spawn(move || {
        first_launcher
            .start_activity_may_wait(display, UserId::SYSTEM, Intent::default())
            .unwrap()
    });
    std::thread::sleep(Duration::from_millis(20));
    sup.attach_application("com.example", 10_050, 4242).unwrap();
    let first = first_handle.join().unwrap();
    sup.with_state(|s| {
        assert_eq!(s.activities.get(first.0).unwrap().state, ActivityState::Resumed);
    });

    let stack = sup.with_state(|s| {
        let task = s.activities.get(first.0).unwrap().task;
        s.tasks.get(task.0).unwrap().stack
    });

    let worker_sup = sup.clone();
    let handle = std::thread::spawn(move || {
        worker_sup
            .start_activity_may_wait(display, UserId::SYSTEM, Intent::default())
            .unwrap()
    });

    // Give the worker thread time to reach the blocking wait, then drive
    // the pause-completion edge the way a real `ApplicationThread` reply
    // would (§4.A `complete_pause`).
    std::thread::sleep(Duration::from_millis(50));
    sup.with_state(|s| {
        assert_eq!(s.activities.get(first.0).unwrap().state, ActivityState::Pausing);
    });
    sup.complete_pause(stack).unwrap();

    let second = handle.join().unwrap();
    sup.with_state(|s| {
        assert_eq!(s.activities.get(second.0).unwrap().state, ActivityState::Resumed);
        assert_eq!(s.activities.get(first.0).unwrap().state, ActivityState::Stopping);
        let stack = s.stacks.get(stack.0).unwrap();
        assert_eq!(stack.resumed_activity, Some(second));
        assert!(stack.check_single_resumed_invariant());
    });
}
