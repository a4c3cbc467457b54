use color_eyre::Result;
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System};

use crate::config::ProcessTarget;
use crate::metrics::TargetState;

/// System-wide counters read at one tick.
#[derive(Clone, Debug)]
pub struct SystemReading {
    pub per_core: Vec<f32>,
    pub load_1: f64,
    pub load_5: f64,
    pub load_15: f64,
}

/// Aggregated reading for one configured target at one tick.
#[derive(Clone, Copy, Debug)]
pub struct TargetReading {
    pub cpu_percent: f64,
    pub memory_rss: u64,
    pub state: TargetState,
}

impl TargetReading {
    pub fn not_found() -> Self {
        TargetReading {
            cpu_percent: 0.0,
            memory_rss: 0,
            state: TargetState::NotFound,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.state != TargetState::NotFound
    }
}

/// Point-in-time OS and process reads. The sampler calls `refresh` once per
/// tick, then pulls readings; implementations hold whatever OS handles they
/// need but no time-series state.
pub trait MetricSource {
    fn core_count(&self) -> usize;

    fn refresh(&mut self);

    fn system_reading(&mut self) -> Result<SystemReading>;

    fn target_reading(&mut self, target: &ProcessTarget) -> TargetReading;
}

pub struct SysinfoSource {
    sys: System,
}

impl Default for SysinfoSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoSource {
    /// CPU usage needs a prior refresh to diff against, so construction
    /// performs the first full refresh up front.
    pub fn new() -> Self {
        let mut sys = System::new();
        sys.refresh_memory();
        sys.refresh_cpu_all();
        sys.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::everything(),
        );
        SysinfoSource { sys }
    }
}

impl MetricSource for SysinfoSource {
    fn core_count(&self) -> usize {
        self.sys.cpus().len()
    }

    fn refresh(&mut self) {
        self.sys.refresh_memory();
        self.sys.refresh_cpu_all();
        self.sys.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing().with_memory().with_cpu(),
        );
    }

    fn system_reading(&mut self) -> Result<SystemReading> {
        let load = System::load_average();
        Ok(SystemReading {
            per_core: self.sys.cpus().iter().map(|cpu| cpu.cpu_usage()).collect(),
            load_1: load.one,
            load_5: load.five,
            load_15: load.fifteen,
        })
    }

    /// Aggregation over multiple matches: CPU% and RSS are summed, the last
    /// match's status wins. A target with no live match reads as not found.
    fn target_reading(&mut self, target: &ProcessTarget) -> TargetReading {
        let mut reading = TargetReading::not_found();
        for process in self.sys.processes().values() {
            let name = process.name().to_string_lossy();
            if !target.matches(&name) {
                continue;
            }
            reading.cpu_percent += f64::from(process.cpu_usage());
            reading.memory_rss += process.memory();
            reading.state = TargetState::from(process.status());
        }
        reading
    }
}
