//! Vitals sampler - the daemon's own metric producer
//!
//! Reads this process's resident memory and the global CPU usage on every
//! heartbeat tick and reports them under the canonical metric names.

use std::collections::HashMap;
use sysinfo::{Pid, System};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

pub struct VitalsSampler {
    sys: System,
    pid: Pid,
}

impl VitalsSampler {
    pub fn new() -> Self {
        let mut sys = System::new();
        // First CPU reading is always 0; prime it
        sys.refresh_cpu();
        Self {
            sys,
            pid: Pid::from_u32(std::process::id()),
        }
    }

    /// One reading per tracked metric; missing readings are omitted
    pub fn sample(&mut self) -> HashMap<String, f64> {
        let mut metrics = HashMap::new();

        self.sys.refresh_cpu();
        metrics.insert("cpu".to_string(), self.sys.global_cpu_info().cpu_usage() as f64);

        if self.sys.refresh_process(self.pid) {
            if let Some(process) = self.sys.process(self.pid) {
                metrics.insert("memory".to_string(), process.memory() as f64 / BYTES_PER_MB);
            }
        }

        metrics
    }
}

impl Default for VitalsSampler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_reports_canonical_names() {
        let mut sampler = VitalsSampler::new();
        let metrics = sampler.sample();
        assert!(metrics.contains_key("cpu"));
        assert!(metrics["memory"] > 0.0);
    }
}
