use chrono::{Local, TimeZone};
use procwatch::config::ProcessTarget;
use procwatch::export::csv::write_csv;
use procwatch::export::report::write_reports;
use procwatch::metrics::buffer::{SeriesBuffer, Snapshot, TickBatch};
use procwatch::metrics::{LoadWindow, Measure, MetricKey, TargetState, Value, metric_keys};

const CORES: usize = 2;

/// Three ticks: `bash` resolved throughout, `ghost-proc` never resolved,
/// system counters missing on the last tick.
fn sample_snapshot() -> Snapshot {
    let targets = vec![
        ProcessTarget::named("bash"),
        ProcessTarget::named("ghost-proc"),
    ];
    let mut buffer = SeriesBuffer::new(metric_keys(CORES, &targets), None);

    for i in 0..3 {
        let ts = Local.timestamp_opt(1_700_000_000 + i * 10, 0).unwrap();
        let mut batch = TickBatch::new(ts);
        if i < 2 {
            batch.push(MetricKey::LoadAvg(LoadWindow::One), Value::Num(0.51));
            batch.push(MetricKey::LoadAvg(LoadWindow::Five), Value::Num(0.42));
            batch.push(MetricKey::LoadAvg(LoadWindow::Fifteen), Value::Num(0.33));
            batch.push(MetricKey::CpuCore(0), Value::Num(25.0));
            batch.push(MetricKey::CpuCore(1), Value::Num(75.0));
        }
        batch.push(
            MetricKey::target("bash", Measure::CpuPercent),
            Value::Num(3.5),
        );
        batch.push(
            MetricKey::target("bash", Measure::MemoryRss),
            Value::Num(16_777_216.0),
        );
        batch.push(
            MetricKey::target("bash", Measure::Status),
            Value::State(TargetState::Running),
        );
        batch.push(
            MetricKey::target("ghost-proc", Measure::Status),
            Value::State(TargetState::NotFound),
        );
        assert!(buffer.append_batch(batch));
    }

    buffer.snapshot()
}

fn temp_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("procwatch_export_test_{name}"))
}

#[test]
fn csv_has_row_per_tick_and_column_per_key() {
    let snapshot = sample_snapshot();
    let path = temp_path("rows.csv");
    write_csv(&snapshot, &path).unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 4, "header plus three ticks");

    let header: Vec<&str> = lines[0].split(',').collect();
    // timestamp + 3 load + 2 cores + 2 targets x 3 measures
    assert_eq!(header.len(), 1 + 3 + CORES + 6);
    assert_eq!(header[0], "timestamp");
    assert_eq!(header[1], "system_load_1");
    assert_eq!(header[4], "cpu_0_percent");
    assert!(header.contains(&"ghost-proc_memory_rss"));

    for line in &lines[1..] {
        assert_eq!(line.split(',').count(), header.len());
        assert!(line.contains("not_found"));
    }
    // The degraded third tick has empty system cells but full bash cells.
    let last: Vec<&str> = lines[3].split(',').collect();
    assert_eq!(last[1], "");
    assert_eq!(last[4], "");
    assert!(lines[3].contains("running"));

    let _ = std::fs::remove_file(&path);
}

#[test]
fn csv_export_is_deterministic() {
    let snapshot = sample_snapshot();
    let first = temp_path("det_a.csv");
    let second = temp_path("det_b.csv");
    write_csv(&snapshot, &first).unwrap();
    write_csv(&snapshot, &second).unwrap();

    let a = std::fs::read(&first).unwrap();
    let b = std::fs::read(&second).unwrap();
    assert_eq!(a, b, "repeated export of one snapshot must be byte-identical");

    // Re-exporting to the same path is idempotent too.
    write_csv(&snapshot, &first).unwrap();
    assert_eq!(std::fs::read(&first).unwrap(), a);

    let _ = std::fs::remove_file(&first);
    let _ = std::fs::remove_file(&second);
}

#[test]
fn reports_write_two_files_and_tolerate_empty_series() {
    let snapshot = sample_snapshot();
    let base = temp_path("report_base");
    let paths = write_reports(&snapshot, &base).unwrap();
    assert_eq!(paths.len(), 2);
    assert!(paths[0].to_string_lossy().ends_with("_system.html"));
    assert!(paths[1].to_string_lossy().ends_with("_cpu_cores.html"));

    let system = std::fs::read_to_string(&paths[0]).unwrap();
    assert!(system.contains("ghost-proc"), "placeholder status row");
    assert!(system.contains("not_found"));

    let cpu = std::fs::read_to_string(&paths[1]).unwrap();
    assert!(cpu.contains("CPU 0"));
    assert!(cpu.contains("CPU 1"));

    for path in paths {
        let _ = std::fs::remove_file(path);
    }
}

#[test]
fn render_failure_is_reported_not_panicked() {
    let snapshot = sample_snapshot();
    let path = std::path::Path::new("/nonexistent-dir/procwatch.csv");
    assert!(write_csv(&snapshot, path).is_err());
}
