//! Policy knobs collected in one place instead of left as magic numbers
//! (§10.3). `Default` gives the production values; a host embedding this
//! crate may override any field before constructing a `Supervisor`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Deadlines for every bounded wait in §5.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deadlines {
    /// Armed on `schedule_pause`; forces PAUSED on expiry (§4.A).
    pub pause: Duration,
    /// Armed on `schedule_stop`.
    pub stop: Duration,
    /// Armed on `schedule_destroy`; expiry kills the hosting process (§4.B).
    pub destroy: Duration,
    /// Bounds `start_activity_may_wait` (§4.D).
    pub launch: Duration,
    /// Bounds the `onUserSwitching` observer fan-out (§4.G).
    pub user_switch: Duration,
    /// Default bound passed to `shutdown_locked` if the caller doesn't
    /// supply one (§4.D).
    pub shutdown: Duration,
}

impl Default for Deadlines {
    fn default() -> Self {
        Self {
            pause: Duration::from_millis(500),
            stop: Duration::from_secs(20),
            destroy: Duration::from_secs(10),
            launch: Duration::from_secs(10),
            user_switch: Duration::from_secs(5),
            shutdown: Duration::from_secs(10),
        }
    }
}

/// Quick-crash policy (§4.F).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrashPolicy {
    /// A second crash within this interval of the last one is a "quick
    /// crash" regardless of the rolling count.
    pub min_crash_interval: Duration,
    /// Width of the rolling crash-count window.
    pub reset_interval: Duration,
    /// Crashes allowed within `reset_interval` before the process is bad.
    pub max_crashes_in_window: u32,
    /// Extra retry granted to a process in BOUND_FOREGROUND_SERVICE state.
    pub bound_foreground_service_extra_retry: u32,
}

impl Default for CrashPolicy {
    fn default() -> Self {
        Self {
            min_crash_interval: Duration::from_secs(60),
            reset_interval: Duration::from_secs(60 * 60),
            max_crashes_in_window: 2,
            bound_foreground_service_extra_retry: 1,
        }
    }
}

/// The six OOM buckets exported to the low-memory killer, highest
/// priority (least likely to be killed) first (§4.E).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OomBucket {
    Persistent,
    Foreground,
    Visible,
    Perceptible,
    Backup,
    Service,
    Home,
    Previous,
    ServiceB,
    CachedMin,
    CachedMax,
}

impl OomBucket {
    pub const ORDERED: [OomBucket; 11] = [
        OomBucket::Persistent,
        OomBucket::Foreground,
        OomBucket::Visible,
        OomBucket::Perceptible,
        OomBucket::Backup,
        OomBucket::Service,
        OomBucket::Home,
        OomBucket::Previous,
        OomBucket::ServiceB,
        OomBucket::CachedMin,
        OomBucket::CachedMax,
    ];

    /// Raw signed adjustment written to the kernel's `adj` sysfs node.
    /// Lower = more protected, matching the GLOSSARY's "OOM adjustment".
    pub fn adjustment(self) -> i32 {
        match self {
            OomBucket::Persistent => -100,
            OomBucket::Foreground => 0,
            OomBucket::Visible => 100,
            OomBucket::Perceptible => 200,
            OomBucket::Backup => 300,
            OomBucket::Service => 500,
            OomBucket::Home => 600,
            OomBucket::Previous => 700,
            OomBucket::ServiceB => 800,
            OomBucket::CachedMin => 900,
            OomBucket::CachedMax => 906,
        }
    }

    /// One bucket less protected, skipping reserved system levels,
    /// per the BIND_ABOVE_CLIENT rule (§4.E). Saturates at CachedMax.
    pub fn one_below(self) -> OomBucket {
        let idx = Self::ORDERED.iter().position(|b| *b == self).unwrap();
        Self::ORDERED[(idx + 1).min(Self::ORDERED.len() - 1)]
    }
}

/// Inputs to the low/high-RAM threshold interpolation (§4.E).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryProfile {
    pub low_ram_total_kb: u64,
    pub high_ram_total_kb: u64,
    pub low_ram_display_px: u64,
    pub high_ram_display_px: u64,
    /// Actual device total memory, in kB.
    pub device_total_kb: u64,
    /// Actual device display width x height, in pixels.
    pub device_display_px: u64,
}

impl Default for MemoryProfile {
    fn default() -> Self {
        Self {
            low_ram_total_kb: 300 * 1024,
            high_ram_total_kb: 700 * 1024,
            low_ram_display_px: 320 * 480,
            high_ram_display_px: 1280 * 800,
            device_total_kb: 700 * 1024,
            device_display_px: 1280 * 800,
        }
    }
}

impl MemoryProfile {
    /// The blend scalar used to interpolate between the low-RAM and
    /// high-RAM threshold tables (§4.E): "the larger of the two scales
    /// drives the mix".
    pub fn scale(&self) -> f64 {
        let mem_scale = normalize(
            self.device_total_kb as f64,
            self.low_ram_total_kb as f64,
            self.high_ram_total_kb as f64,
        );
        let display_scale = normalize(
            self.device_display_px as f64,
            self.low_ram_display_px as f64,
            self.high_ram_display_px as f64,
        );
        mem_scale.max(display_scale)
    }
}

fn normalize(value: f64, low: f64, high: f64) -> f64 {
    if high <= low {
        return 1.0;
    }
    ((value - low) / (high - low)).clamp(0.0, 1.0)
}

/// Bounded concurrency for the user controller (§4.G).
pub const MAX_RUNNING_USERS_DEFAULT: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    pub deadlines: Deadlines,
    pub crash_policy: CrashPolicy,
    pub memory_profile: MemoryProfile,
    pub max_running_users: usize,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            deadlines: Deadlines::default(),
            crash_policy: CrashPolicy::default(),
            memory_profile: MemoryProfile::default(),
            max_running_users: MAX_RUNNING_USERS_DEFAULT,
        }
    }
}
