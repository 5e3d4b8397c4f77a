//! ProcessRegistry and OOM-adjustment policy (§4.E).

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::config::{MemoryProfile, OomBucket};
use crate::ids::{ActivityId, ProcessId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Starting,
    Top,
    BoundForegroundService,
    Visible,
    Perceptible,
    Service,
    Home,
    Previous,
    Cached,
}

#[derive(Debug)]
pub struct ProcessRecord {
    pub id: ProcessId,
    pub process_name: String,
    pub uid: u32,
    pub pid: Option<u32>,
    pub attached: bool,
    pub activities: HashSet<ActivityId>,
    pub services: HashSet<String>,
    pub cur_adj: i32,
    pub raw_adj: i32,
    pub set_adj: i32,
    pub state: ProcessState,
    pub crashing: bool,
    pub not_responding: bool,
    pub persistent: bool,
    pub isolated: bool,
    pub bad: bool,
    pub killed: bool,
    pub lru_time: DateTime<Utc>,
}

impl ProcessRecord {
    pub fn new(id: ProcessId, process_name: String, uid: u32, now: DateTime<Utc>) -> Self {
        Self {
            id,
            process_name,
            uid,
            pid: None,
            attached: false,
            activities: HashSet::new(),
            services: HashSet::new(),
            cur_adj: OomBucket::CachedMax.adjustment(),
            raw_adj: OomBucket::CachedMax.adjustment(),
            set_adj: OomBucket::CachedMax.adjustment(),
            state: ProcessState::Starting,
            crashing: false,
            not_responding: false,
            persistent: false,
            isolated: false,
            bad: false,
            killed: false,
            lru_time: now,
        }
    }

    pub fn key(&self) -> (String, u32) {
        (self.process_name.clone(), self.uid)
    }

    pub fn bucket_for_state(&self) -> OomBucket {
        match self.state {
            ProcessState::Starting | ProcessState::Top => OomBucket::Foreground,
            ProcessState::BoundForegroundService => OomBucket::Perceptible,
            ProcessState::Visible => OomBucket::Visible,
            ProcessState::Perceptible => OomBucket::Perceptible,
            ProcessState::Service => OomBucket::Service,
            ProcessState::Home => OomBucket::Home,
            ProcessState::Previous => OomBucket::Previous,
            ProcessState::Cached => OomBucket::CachedMin,
        }
    }

    /// Recompute `raw_adj`/`cur_adj` from current state and persistence.
    /// Persistent processes are pinned to the PERSISTENT bucket
    /// regardless of activity state.
    pub fn recompute_adj(&mut self) {
        let bucket = if self.persistent {
            OomBucket::Persistent
        } else {
            self.bucket_for_state()
        };
        self.raw_adj = bucket.adjustment();
        self.cur_adj = self.raw_adj;
    }

    /// BIND_ABOVE_CLIENT: force this process's adjustment down by
    /// exactly one bucket (less protected), skipping reserved system
    /// levels (§4.E).
    pub fn apply_bind_above_client(&mut self, client_bucket: OomBucket) {
        let forced = client_bucket.one_below();
        self.cur_adj = self.cur_adj.max(forced.adjustment());
    }

    pub fn commit_set_adj(&mut self) {
        self.set_adj = self.cur_adj;
    }
}

/// Computes the six (adjustment, minfree-pages) pairs written to the
/// kernel sysfs nodes, via `MemoryProfile::scale()` blended between the
/// low-RAM and high-RAM tables (§4.E).
pub fn compute_minfree_table(profile: &MemoryProfile) -> [(i32, u64); 11] {
    // Per-bucket page counts at the low-RAM and high-RAM ends, roughly
    // matching the platform's own scheme of sparser reserves on bigger
    // devices for the protected buckets and richer caching headroom for
    // cached buckets.
    const LOW: [u64; 11] = [1024, 2048, 3072, 4096, 6144, 8192, 10240, 12288, 14336, 16384, 19456];
    const HIGH: [u64; 11] = [4096, 8192, 12288, 16384, 24576, 32768, 40960, 49152, 57344, 65536, 73728];

    let t = profile.scale();
    let mut table = [(0i32, 0u64); 11];
    for (i, bucket) in OomBucket::ORDERED.iter().enumerate() {
        let low = LOW[i] as f64;
        let high = HIGH[i] as f64;
        let pages = (low + (high - low) * t).round() as u64;
        table[i] = (bucket.adjustment(), pages);
    }
    table
}

/// "Extra free kbytes" reserve: 3x width*height*4 bytes for the screen
/// buffer (§4.E).
pub fn screen_buffer_reserve_kb(width: u32, height: u32) -> u64 {
    (3 * width as u64 * height as u64 * 4) / 1024
}

#[derive(Default)]
pub struct ProcessRegistry {
    pub processes: Vec<ProcessRecord>,
}

impl ProcessRegistry {
    pub fn find_by_key(&self, process_name: &str, uid: u32) -> Option<&ProcessRecord> {
        self.processes
            .iter()
            .find(|p| p.process_name == process_name && p.uid == uid)
    }

    pub fn find_by_key_mut(&mut self, process_name: &str, uid: u32) -> Option<&mut ProcessRecord> {
        self.processes
            .iter_mut()
            .find(|p| p.process_name == process_name && p.uid == uid)
    }

    pub fn get_mut(&mut self, id: ProcessId) -> Option<&mut ProcessRecord> {
        self.processes.iter_mut().find(|p| p.id == id)
    }

    pub fn get(&self, id: ProcessId) -> Option<&ProcessRecord> {
        self.processes.iter().find(|p| p.id == id)
    }

    pub fn touch(&mut self, id: ProcessId, now: DateTime<Utc>) {
        if let Some(p) = self.get_mut(id) {
            p.lru_time = now;
        }
    }

    /// LRU order within a bucket, oldest first — "decides kill victim
    /// selection by the external killer" (§4.E, §11).
    pub fn lru_order(&self, bucket: OomBucket) -> Vec<ProcessId> {
        let mut matching: Vec<&ProcessRecord> = self
            .processes
            .iter()
            .filter(|p| p.bucket_for_state() == bucket && !p.persistent)
            .collect();
        matching.sort_by_key(|p| p.lru_time);
        matching.into_iter().map(|p| p.id).collect()
    }
}
