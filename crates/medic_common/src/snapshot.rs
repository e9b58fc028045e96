//! Process snapshots for before/after repair comparison
//!
//! A snapshot is ephemeral: the executor captures one before and one after
//! applying a fix and hands both to the verifier. Nothing here is persisted.
//!
//! CPU usage is a delta between two sysinfo refreshes, so a CPU reading is
//! only reported when the previous refresh is at least
//! `sysinfo::MINIMUM_CPU_UPDATE_INTERVAL` old. A snapshot taken sooner has no
//! CPU reading and CPU verification over it is inconclusive.

use crate::types::MetricCategory;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use sysinfo::{System, MINIMUM_CPU_UPDATE_INTERVAL};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Point-in-time process vitals
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub captured_at: Option<DateTime<Utc>>,
    /// Resident set size of this process
    pub rss_bytes: u64,
    pub virtual_bytes: u64,
    /// Memory in use system-wide
    pub system_used_bytes: u64,
    pub uptime_secs: u64,
    /// Per-category readings compared by the verifier
    pub readings: BTreeMap<MetricCategory, f64>,
}

impl Snapshot {
    pub fn reading(&self, category: MetricCategory) -> Option<f64> {
        self.readings.get(&category).copied()
    }

    pub fn with_reading(mut self, category: MetricCategory, value: f64) -> Self {
        self.readings.insert(category, value);
        self
    }
}

/// Something that can read current vitals
pub trait SnapshotSource: Send + Sync {
    fn capture(&self) -> Snapshot;
}

/// What a capture may do with the CPU counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CpuPoll {
    /// First refresh; usage has no baseline yet
    Prime,
    /// Refresh and report usage
    Read,
    /// Previous refresh is too recent; leave the reading out
    TooSoon,
}

#[derive(Debug)]
struct CpuSampling {
    min_interval: Duration,
    last_refresh: Option<Instant>,
}

impl CpuSampling {
    fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_refresh: None,
        }
    }

    fn poll(&mut self, now: Instant) -> CpuPoll {
        let poll = match self.last_refresh {
            None => CpuPoll::Prime,
            Some(last) if now.saturating_duration_since(last) >= self.min_interval => CpuPoll::Read,
            Some(_) => return CpuPoll::TooSoon,
        };
        self.last_refresh = Some(now);
        poll
    }
}

struct SamplerState {
    sys: System,
    cpu: CpuSampling,
}

/// Reads vitals of the current process through sysinfo
pub struct SystemSnapshots {
    state: Mutex<SamplerState>,
}

impl SystemSnapshots {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SamplerState {
                sys: System::new(),
                cpu: CpuSampling::new(MINIMUM_CPU_UPDATE_INTERVAL),
            }),
        }
    }
}

impl Default for SystemSnapshots {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotSource for SystemSnapshots {
    fn capture(&self) -> Snapshot {
        let mut snapshot = Snapshot {
            captured_at: Some(Utc::now()),
            uptime_secs: System::uptime(),
            ..Default::default()
        };

        // A poisoned sampler still yields a timestamped, reading-less snapshot
        let Ok(mut state) = self.state.lock() else {
            return snapshot;
        };
        let SamplerState { sys, cpu } = &mut *state;

        sys.refresh_memory();
        snapshot.system_used_bytes = sys.used_memory();

        if let Ok(pid) = sysinfo::get_current_pid() {
            if sys.refresh_process(pid) {
                if let Some(process) = sys.process(pid) {
                    snapshot.rss_bytes = process.memory();
                    snapshot.virtual_bytes = process.virtual_memory();
                    snapshot
                        .readings
                        .insert(MetricCategory::Memory, process.memory() as f64 / BYTES_PER_MB);
                }
            }
        }

        match cpu.poll(Instant::now()) {
            CpuPoll::Prime => sys.refresh_cpu(),
            CpuPoll::Read => {
                sys.refresh_cpu();
                snapshot
                    .readings
                    .insert(MetricCategory::Cpu, sys.global_cpu_info().cpu_usage() as f64);
            }
            CpuPoll::TooSoon => {}
        }

        snapshot
    }
}
