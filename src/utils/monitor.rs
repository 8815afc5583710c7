use std::fmt;
#[cfg(feature = "cli")]
use std::sync::Mutex;
#[cfg(feature = "cli")]
use std::time::{Duration, Instant};
#[cfg(feature = "cli")]
use sysinfo::{Pid, ProcessesToUpdate, System};

/// Points in a run where the process is sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    BeforeScan,
    AfterScan,
    Rendered,
}

impl fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScanPhase::BeforeScan => "Before scan",
            ScanPhase::AfterScan => "After scan",
            ScanPhase::Rendered => "Rendered",
        };
        f.write_str(name)
    }
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Copy)]
pub struct PhaseSample {
    pub phase: ScanPhase,
    pub cpu_usage: f32,
    pub memory_mb: u64,
    pub elapsed: Duration,
}

/// Samples this process around each scan phase when `--monitor` is set.
#[cfg(feature = "cli")]
pub struct SystemMonitor {
    system: Mutex<System>,
    pid: Option<Pid>,
    start_time: Instant,
    samples: Mutex<Vec<PhaseSample>>,
}

#[cfg(feature = "cli")]
impl SystemMonitor {
    pub fn new(enabled: bool) -> Self {
        // 停用時不取 PID，之後所有取樣都直接略過
        let pid = if enabled {
            sysinfo::get_current_pid().ok()
        } else {
            None
        };

        Self {
            system: Mutex::new(System::new()),
            pid,
            start_time: Instant::now(),
            samples: Mutex::new(Vec::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.pid.is_some()
    }

    /// Takes a sample, keeps it for the final summary and logs it.
    pub fn record(&self, phase: ScanPhase) -> Option<PhaseSample> {
        let pid = self.pid?;
        let sample = {
            let mut system = self.system.lock().ok()?;
            system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
            let process = system.process(pid)?;
            PhaseSample {
                phase,
                cpu_usage: process.cpu_usage(),
                memory_mb: process.memory() / 1024 / 1024,
                elapsed: self.start_time.elapsed(),
            }
        };

        tracing::info!(
            "📊 {} - CPU: {:.1}%, Memory: {}MB, Time: {:?}",
            sample.phase,
            sample.cpu_usage,
            sample.memory_mb,
            sample.elapsed
        );
        self.samples.lock().ok()?.push(sample);
        Some(sample)
    }

    pub fn peak_memory_mb(&self) -> u64 {
        self.samples
            .lock()
            .map(|samples| samples.iter().map(|s| s.memory_mb).max().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Logs throughput for the scan and memory growth between the first and
    /// last sample.
    pub fn log_summary(&self, records: usize) {
        if !self.is_enabled() {
            return;
        }
        let Ok(samples) = self.samples.lock() else {
            return;
        };
        let (Some(first), Some(last)) = (samples.first(), samples.last()) else {
            return;
        };

        let elapsed = self.start_time.elapsed();
        let rate = records as f64 / elapsed.as_secs_f64().max(f64::EPSILON);
        tracing::info!(
            "📊 Final Stats - {} records in {:?} ({:.0} records/s), Peak Memory: {}MB, Growth: {:+}MB",
            records,
            elapsed,
            rate,
            samples.iter().map(|s| s.memory_mb).max().unwrap_or(0),
            last.memory_mb as i64 - first.memory_mb as i64
        );
    }
}

#[cfg(feature = "cli")]
impl Default for SystemMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}

// 非 CLI 環境的空實現
#[cfg(not(feature = "cli"))]
#[derive(Default)]
pub struct SystemMonitor;

#[cfg(not(feature = "cli"))]
impl SystemMonitor {
    pub fn new(_enabled: bool) -> Self {
        Self
    }

    pub fn is_enabled(&self) -> bool {
        false
    }

    pub fn record(&self, _phase: ScanPhase) {}

    pub fn log_summary(&self, _records: usize) {}
}
