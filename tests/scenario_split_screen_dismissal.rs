//! Activating split-screen gives the primary stack the singleton
//! split-primary role and reflows a secondary; dismissing it returns both
//! to fullscreen, frees the singleton slot, repositions the home stack
//! behind the topmost fullscreen stack, and notifies the display listener
//! (§4.C, §8.4).

use std::sync::Arc;

use activity_supervisor::fakes::{
    FakeProcessLauncher, FakeStorageService, FixedResolver, NoopApplicationThread,
    RecordingBroadcastDispatcher, RecordingCrashReportSink, RecordingDisplayListener,
    RecordingLowMemoryKiller, RecordingWindowManager,
};
use activity_supervisor::{
    ActivityInfo, ActivityType, Collaborators, DeviceCapabilities, SupervisorConfig, SystemClock,
    WindowingMode,
};

fn supervisor(display_listener: Arc<RecordingDisplayListener>) -> activity_supervisor::Supervisor {
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
        display_listener,
    };
    activity_supervisor::Supervisor::new(SupervisorConfig::default(), Arc::new(SystemClock), collaborators)
}

#[test]
fn activation_then_dismissal_round_trips_windowing_modes() {
    let listener = Arc::new(RecordingDisplayListener::default());
    let sup = supervisor(listener.clone());
    let display = sup.create_display(DeviceCapabilities {
        split_screen: true,
        ..Default::default()
    });
    let primary = sup
        .create_stack(display, WindowingMode::Fullscreen, ActivityType::Standard)
        .unwrap();
    let secondary = sup
        .create_stack(display, WindowingMode::Fullscreen, ActivityType::Standard)
        .unwrap();

    sup.activate_split_screen(primary, Some(secondary)).unwrap();
    sup.with_state(|s| {
        assert_eq!(s.stacks.get(primary.0).unwrap().windowing_mode, WindowingMode::SplitPrimary);
        assert_eq!(s.stacks.get(secondary.0).unwrap().windowing_mode, WindowingMode::SplitSecondary);
        assert_eq!(s.displays.get(display.0).unwrap().split_primary_stack, Some(primary));
    });

    sup.dismiss_split_screen(primary).unwrap();
    sup.with_state(|s| {
        assert_eq!(s.stacks.get(primary.0).unwrap().windowing_mode, WindowingMode::Fullscreen);
        assert_eq!(s.stacks.get(secondary.0).unwrap().windowing_mode, WindowingMode::Fullscreen);
        assert_eq!(s.displays.get(display.0).unwrap().split_primary_stack, None);
    });

    assert!(listener.split_dismissed.lock().unwrap().contains(&display));
}

#[test]
fn dismissal_repositions_the_home_stack_behind_the_topmost_fullscreen_stack() {
    let listener = Arc::new(RecordingDisplayListener::default());
    let sup = supervisor(listener.clone());
    let display = sup.create_display(DeviceCapabilities {
        split_screen: true,
        ..Default::default()
    });
    let home = sup.create_stack(display, WindowingMode::Fullscreen, ActivityType::Home).unwrap();
    let primary = sup
        .create_stack(display, WindowingMode::Fullscreen, ActivityType::Standard)
        .unwrap();

    sup.with_state(|s| {
        assert_eq!(s.displays.get(display.0).unwrap().home_stack, Some(home));
    });

    sup.activate_split_screen(primary, None).unwrap();
    listener.order_changed.lock().unwrap().clear();

    sup.dismiss_split_screen(primary).unwrap();

    sup.with_state(|s| {
        let disp = s.displays.get(display.0).unwrap();
        let home_index = disp.stacks.iter().position(|s| *s == home).unwrap();
        let primary_index = disp.stacks.iter().position(|s| *s == primary).unwrap();
        assert!(home_index < primary_index, "home stack must sit behind the fullscreen stack");
    });
    assert!(listener.order_changed.lock().unwrap().contains(&display));
}
