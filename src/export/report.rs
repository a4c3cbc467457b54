use std::path::{Path, PathBuf};

use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use serde_json::json;

use crate::metrics::buffer::Snapshot;
use crate::metrics::{LoadWindow, Measure, MetricKey, TIMESTAMP_FORMAT, Value};

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.32.0.min.js";
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Renders the two visual reports for one snapshot and returns their paths:
/// `<base>_system.html` (load, per-target CPU, per-target memory, status
/// table) and `<base>_cpu_cores.html` (every core overlaid in one chart).
pub fn write_reports(snapshot: &Snapshot, base_path: &Path) -> Result<Vec<PathBuf>> {
    let system_path = suffixed(base_path, "_system.html");
    let cpu_path = suffixed(base_path, "_cpu_cores.html");

    std::fs::write(&system_path, render_system_report(snapshot))
        .wrap_err_with(|| format!("failed to write report {}", system_path.display()))?;
    std::fs::write(&cpu_path, render_cpu_report(snapshot))
        .wrap_err_with(|| format!("failed to write report {}", cpu_path.display()))?;

    Ok(vec![system_path, cpu_path])
}

fn suffixed(base_path: &Path, suffix: &str) -> PathBuf {
    let mut name = base_path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// System overview: load averages, per-target CPU, per-target memory in MB,
/// and a latest-status table. Empty series are omitted rather than rendered
/// as broken traces, so a target that never resolved only shows up in the
/// status table.
pub fn render_system_report(snapshot: &Snapshot) -> String {
    let load_traces: Vec<serde_json::Value> = LoadWindow::ALL
        .iter()
        .filter_map(|window| {
            numeric_trace(
                snapshot,
                &MetricKey::LoadAvg(*window),
                &format!("{} min", window.minutes()),
                1.0,
            )
        })
        .collect();

    let mut cpu_traces = Vec::new();
    let mut mem_traces = Vec::new();
    for name in snapshot.target_names() {
        if let Some(trace) = numeric_trace(
            snapshot,
            &MetricKey::target(name, Measure::CpuPercent),
            name,
            1.0,
        ) {
            cpu_traces.push(trace);
        }
        if let Some(trace) = numeric_trace(
            snapshot,
            &MetricKey::target(name, Measure::MemoryRss),
            name,
            1.0 / BYTES_PER_MB,
        ) {
            mem_traces.push(trace);
        }
    }

    let mut body = String::new();
    body.push_str(&chart_section(
        "load",
        "System Load Average",
        "Load",
        &load_traces,
    ));
    body.push_str(&chart_section(
        "proc_cpu",
        "Process CPU Usage",
        "CPU %",
        &cpu_traces,
    ));
    body.push_str(&chart_section(
        "proc_mem",
        "Process Memory Usage (RSS)",
        "Memory (MB)",
        &mem_traces,
    ));
    body.push_str(&status_table(snapshot));

    html_page("System and Process Monitoring", &body)
}

/// Per-core CPU report: one trace per discovered core, overlaid in a single
/// chart area. The trace count is the startup core count, even when a core
/// never reported.
pub fn render_cpu_report(snapshot: &Snapshot) -> String {
    let traces: Vec<serde_json::Value> = (0..snapshot.core_count())
        .filter_map(|index| {
            numeric_trace(
                snapshot,
                &MetricKey::CpuCore(index),
                &format!("CPU {index}"),
                1.0,
            )
        })
        .collect();

    let body = chart_section("cpu_cores", "CPU Cores Usage", "CPU %", &traces);
    html_page("CPU Cores Usage", &body)
}

/// One plotly trace for a numeric series, with the series' own timestamps on
/// the x axis. Returns `None` for an empty series so callers can omit it.
fn numeric_trace(
    snapshot: &Snapshot,
    key: &MetricKey,
    name: &str,
    scale: f64,
) -> Option<serde_json::Value> {
    let mut x = Vec::new();
    let mut y = Vec::new();
    for sample in snapshot.series(key) {
        if let Some(value) = sample.value.as_num() {
            x.push(sample.timestamp.format(TIMESTAMP_FORMAT).to_string());
            y.push(value * scale);
        }
    }
    if y.is_empty() {
        return None;
    }
    Some(json!({
        "x": x,
        "y": y,
        "name": name,
        "type": "scatter",
        "mode": "lines",
    }))
}

fn chart_section(id: &str, title: &str, y_title: &str, traces: &[serde_json::Value]) -> String {
    let layout = json!({
        "title": { "text": title },
        "yaxis": { "title": { "text": y_title } },
        "margin": { "t": 48 },
    });
    format!(
        "<div class=\"chart\" id=\"{id}\"></div>\n<script>Plotly.newPlot(\"{id}\", {}, {});</script>\n",
        serde_json::Value::Array(traces.to_vec()),
        layout
    )
}

/// Latest status per target. Targets that never resolved still get a row,
/// with `not_found` carried through from their status series.
fn status_table(snapshot: &Snapshot) -> String {
    let mut rows = String::new();
    for name in snapshot.target_names() {
        let status = snapshot
            .latest(&MetricKey::target(name, Measure::Status))
            .map(|sample| match sample.value {
                Value::State(state) => state.as_str().to_string(),
                Value::Num(n) => n.to_string(),
            })
            .unwrap_or_else(|| "n/a".to_string());
        rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td></tr>\n",
            escape_html(name),
            escape_html(&status)
        ));
    }
    format!(
        "<h2>Process Status</h2>\n<table><thead><tr><th>Process</th><th>Latest Status</th></tr></thead><tbody>\n{rows}</tbody></table>\n"
    )
}

fn html_page(title: &str, body: &str) -> String {
    let mut page = String::new();
    page.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    page.push_str(&format!("<title>{}</title>\n", escape_html(title)));
    page.push_str(&format!("<script src=\"{PLOTLY_CDN}\"></script>\n"));
    page.push_str(
        "<style>\nbody { font-family: sans-serif; margin: 1.5rem; }\n.chart { height: 360px; margin-bottom: 1.5rem; }\ntable { border-collapse: collapse; }\nth, td { border: 1px solid #ccc; padding: 6px 12px; text-align: left; }\nth { background: #f2f2f2; }\n</style>\n",
    );
    page.push_str("</head>\n<body>\n");
    page.push_str(&format!("<h1>{}</h1>\n", escape_html(title)));
    page.push_str(body);
    page.push_str("</body>\n</html>\n");
    page
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use chrono::{Local, TimeZone};

    use super::*;
    use crate::metrics::buffer::{SeriesBuffer, TickBatch};
    use crate::metrics::{TargetState, metric_keys};

    fn snapshot_with_ghost() -> Snapshot {
        let targets = vec![
            crate::config::ProcessTarget::named("bash"),
            crate::config::ProcessTarget::named("ghost-proc"),
        ];
        let mut buffer = SeriesBuffer::new(metric_keys(2, &targets), None);
        for i in 0..3 {
            let ts = Local.timestamp_opt(1_700_000_000 + i * 10, 0).unwrap();
            let mut batch = TickBatch::new(ts);
            batch.push(MetricKey::LoadAvg(LoadWindow::One), Value::Num(0.4));
            batch.push(MetricKey::CpuCore(0), Value::Num(12.0));
            batch.push(MetricKey::CpuCore(1), Value::Num(8.0));
            batch.push(
                MetricKey::target("bash", Measure::CpuPercent),
                Value::Num(1.5),
            );
            batch.push(
                MetricKey::target("bash", Measure::MemoryRss),
                Value::Num(10.0 * BYTES_PER_MB),
            );
            batch.push(
                MetricKey::target("bash", Measure::Status),
                Value::State(TargetState::Running),
            );
            batch.push(
                MetricKey::target("ghost-proc", Measure::Status),
                Value::State(TargetState::NotFound),
            );
            buffer.append_batch(batch);
        }
        buffer.snapshot()
    }

    #[test]
    fn ghost_target_renders_with_placeholder_row() {
        let html = render_system_report(&snapshot_with_ghost());
        assert!(html.contains("<td>ghost-proc</td><td>not_found</td>"));
        assert!(html.contains("<td>bash</td><td>running</td>"));
        // No CPU/memory trace for the never-resolved target.
        assert!(!html.contains("\"name\":\"ghost-proc\""));
    }

    #[test]
    fn cpu_report_has_one_trace_per_core() {
        let html = render_cpu_report(&snapshot_with_ghost());
        assert!(html.contains("CPU 0"));
        assert!(html.contains("CPU 1"));
        assert!(!html.contains("CPU 2"));
    }

    #[test]
    fn empty_snapshot_still_renders() {
        let html = render_system_report(&Snapshot::default());
        assert!(html.contains("System Load Average"));
    }
}
