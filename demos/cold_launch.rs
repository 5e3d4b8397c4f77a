//! Manual smoke test for the cold-launch scenario (§8.4): build a
//! supervisor with the in-memory fakes, create a display and a
//! fullscreen stack, and launch one activity. Run with
//! `cargo run --features testing --example cold_launch` once this
//! directory is wired into `Cargo.toml`'s `[[example]]` table.

use std::sync::Arc;

use activity_supervisor::fakes::{
    FakeProcessLauncher, FakeStorageService, FixedResolver, NoopApplicationThread,
    NoopDisplayListener, RecordingBroadcastDispatcher, RecordingCrashReportSink,
    RecordingLowMemoryKiller, RecordingWindowManager,
};
use activity_supervisor::{
    ActivityInfo, ActivityType, Collaborators, DeviceCapabilities, Intent, Supervisor,
    SupervisorConfig, SystemClock, UserId,
};

fn main() {
    env_logger::init();

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

    let supervisor = Arc::new(Supervisor::new(
        SupervisorConfig::default(),
        Arc::new(SystemClock),
        collaborators,
    ));
    let display = supervisor.create_display(DeviceCapabilities::default());

    // `start_activity_may_wait` blocks until the activity resumes, which
    // only happens once the hosting process attaches (§4.B step 4) — so
    // it runs on its own thread while this one plays the role of the host
    // process starter calling back into `attach_application`.
    let launcher = supervisor.clone();
    let handle = std::thread::spawn(move || {
        launcher
            .start_activity_may_wait(display, UserId::SYSTEM, Intent::default())
            .expect("cold launch resolves and resumes")
    });

    loop {
        if supervisor.attach_application("com.example", 10_050, 4242).is_ok() {
            break;
        }
        std::thread::yield_now();
    }

    let activity = handle.join().expect("launch thread did not panic");
    println!("launched {:?} on display {:?}", activity, display);
}
