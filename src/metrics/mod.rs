pub mod buffer;

use chrono::{DateTime, Local};

use crate::config::ProcessTarget;

/// Tick timestamps carry local time so exported reports read naturally.
pub type Timestamp = DateTime<Local>;

/// Format used for CSV cells and the live wire payload.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LoadWindow {
    One,
    Five,
    Fifteen,
}

impl LoadWindow {
    pub const ALL: [LoadWindow; 3] = [LoadWindow::One, LoadWindow::Five, LoadWindow::Fifteen];

    pub fn minutes(self) -> u32 {
        match self {
            LoadWindow::One => 1,
            LoadWindow::Five => 5,
            LoadWindow::Fifteen => 15,
        }
    }
}

/// Per-target measurement kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Measure {
    CpuPercent,
    MemoryRss,
    Status,
}

impl Measure {
    pub const ALL: [Measure; 3] = [Measure::CpuPercent, Measure::MemoryRss, Measure::Status];

    fn suffix(self) -> &'static str {
        match self {
            Measure::CpuPercent => "cpu_percent",
            Measure::MemoryRss => "memory_rss",
            Measure::Status => "status",
        }
    }
}

/// Identity of one time series. All internal logic dispatches on the
/// variants; the string form produced by [`MetricKey::field_name`] exists
/// only for the CSV header and the dashboard wire payload, where the names
/// are a compatibility contract (`cpu_<i>_percent`, `system_load_<n>`,
/// `<target>_<measure>`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum MetricKey {
    CpuCore(usize),
    LoadAvg(LoadWindow),
    Target { name: String, measure: Measure },
}

impl MetricKey {
    pub fn target(name: &str, measure: Measure) -> Self {
        MetricKey::Target {
            name: name.to_string(),
            measure,
        }
    }

    pub fn field_name(&self) -> String {
        match self {
            MetricKey::CpuCore(index) => format!("cpu_{index}_percent"),
            MetricKey::LoadAvg(window) => format!("system_load_{}", window.minutes()),
            MetricKey::Target { name, measure } => format!("{name}_{}", measure.suffix()),
        }
    }

    /// Target name for per-process keys, `None` for system-wide keys.
    pub fn target_name(&self) -> Option<&str> {
        match self {
            MetricKey::Target { name, .. } => Some(name),
            _ => None,
        }
    }
}

/// Lifecycle state of a monitored target, as observed at one tick.
/// `NotFound` is the sentinel recorded when no live process matched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetState {
    Running,
    Sleeping,
    Idle,
    Stopped,
    Zombie,
    Unknown,
    NotFound,
}

impl TargetState {
    pub fn as_str(self) -> &'static str {
        match self {
            TargetState::Running => "running",
            TargetState::Sleeping => "sleeping",
            TargetState::Idle => "idle",
            TargetState::Stopped => "stopped",
            TargetState::Zombie => "zombie",
            TargetState::Unknown => "unknown",
            TargetState::NotFound => "not_found",
        }
    }
}

impl From<sysinfo::ProcessStatus> for TargetState {
    fn from(status: sysinfo::ProcessStatus) -> Self {
        use sysinfo::ProcessStatus;
        match status {
            ProcessStatus::Run => TargetState::Running,
            ProcessStatus::Sleep => TargetState::Sleeping,
            ProcessStatus::Idle => TargetState::Idle,
            ProcessStatus::Stop => TargetState::Stopped,
            ProcessStatus::Zombie => TargetState::Zombie,
            _ => TargetState::Unknown,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Value {
    Num(f64),
    State(TargetState),
}

impl Value {
    /// CSV cell rendering. Integral numbers print without a fraction so
    /// repeated exports of one snapshot stay byte-identical.
    pub fn csv_cell(&self) -> String {
        match self {
            Value::Num(n) => format!("{n}"),
            Value::State(state) => state.as_str().to_string(),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Num(n) => serde_json::json!(n),
            Value::State(state) => serde_json::json!(state.as_str()),
        }
    }

    pub fn as_num(&self) -> Option<f64> {
        match self {
            Value::Num(n) => Some(*n),
            Value::State(_) => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    pub timestamp: Timestamp,
    pub value: Value,
}

/// Builds the full key set for a run. The set is fixed once the core count
/// and target list are known at startup; column order here is also the CSV
/// column order.
pub fn metric_keys(core_count: usize, targets: &[ProcessTarget]) -> Vec<MetricKey> {
    let mut keys = Vec::with_capacity(3 + core_count + targets.len() * 3);
    for window in LoadWindow::ALL {
        keys.push(MetricKey::LoadAvg(window));
    }
    for index in 0..core_count {
        keys.push(MetricKey::CpuCore(index));
    }
    for target in targets {
        for measure in Measure::ALL {
            keys.push(MetricKey::target(&target.name, measure));
        }
    }
    keys
}
