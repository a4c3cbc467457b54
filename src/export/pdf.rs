use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use printpdf::{BuiltinFont, Mm, PdfDocument, PdfDocumentReference};

use crate::metrics::buffer::Snapshot;
use crate::metrics::{LoadWindow, Measure, MetricKey, TIMESTAMP_FORMAT, Value};

const PAGE_WIDTH_MM: f64 = 210.0;
const PAGE_HEIGHT_MM: f64 = 297.0;
const MARGIN_MM: f64 = 18.0;
const LINE_MM: f64 = 7.0;
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Paginated summary documents for one snapshot: `<base>_system.pdf`
/// (load and per-target statistics) and `<base>_cpu_cores.pdf` (per-core
/// statistics). Same statistics the HTML reports chart, as min/avg/max rows.
pub fn write_pdf_reports(snapshot: &Snapshot, base_path: &Path) -> Result<Vec<PathBuf>> {
    let system_path = suffixed(base_path, "_system.pdf");
    let cpu_path = suffixed(base_path, "_cpu_cores.pdf");

    write_document(
        "System and Process Monitoring Report",
        &system_lines(snapshot),
        &system_path,
    )?;
    write_document("CPU Cores Usage Report", &cpu_lines(snapshot), &cpu_path)?;

    Ok(vec![system_path, cpu_path])
}

fn suffixed(base_path: &Path, suffix: &str) -> PathBuf {
    let mut name = base_path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

fn system_lines(snapshot: &Snapshot) -> Vec<String> {
    let mut lines = vec![monitoring_period(snapshot), String::new()];

    lines.push("System Load Average".to_string());
    for window in LoadWindow::ALL {
        let stats = numeric_stats(snapshot, &MetricKey::LoadAvg(window), 1.0);
        lines.push(format!(
            "  {:>2} min   {}",
            window.minutes(),
            stats_cell(stats, "")
        ));
    }
    lines.push(String::new());

    lines.push("Monitored Processes".to_string());
    for name in snapshot.target_names() {
        let cpu = numeric_stats(snapshot, &MetricKey::target(name, Measure::CpuPercent), 1.0);
        let mem = numeric_stats(
            snapshot,
            &MetricKey::target(name, Measure::MemoryRss),
            1.0 / BYTES_PER_MB,
        );
        let status = snapshot
            .latest(&MetricKey::target(name, Measure::Status))
            .map(|sample| match sample.value {
                Value::State(state) => state.as_str().to_string(),
                Value::Num(n) => n.to_string(),
            })
            .unwrap_or_else(|| "n/a".to_string());
        lines.push(format!("  {name}"));
        lines.push(format!("    cpu     {}", stats_cell(cpu, " %")));
        lines.push(format!("    memory  {}", stats_cell(mem, " MB")));
        lines.push(format!("    status  {status}"));
    }
    lines
}

fn cpu_lines(snapshot: &Snapshot) -> Vec<String> {
    let mut lines = vec![monitoring_period(snapshot), String::new()];
    for index in 0..snapshot.core_count() {
        let stats = numeric_stats(snapshot, &MetricKey::CpuCore(index), 1.0);
        lines.push(format!("  CPU {index:<3} {}", stats_cell(stats, " %")));
    }
    lines
}

fn monitoring_period(snapshot: &Snapshot) -> String {
    match (snapshot.ticks().first(), snapshot.ticks().last()) {
        (Some(start), Some(end)) => format!(
            "Monitoring period: {} to {}",
            start.format(TIMESTAMP_FORMAT),
            end.format(TIMESTAMP_FORMAT)
        ),
        _ => "Monitoring period: no data".to_string(),
    }
}

fn numeric_stats(snapshot: &Snapshot, key: &MetricKey, scale: f64) -> Option<(f64, f64, f64)> {
    let values: Vec<f64> = snapshot
        .series(key)
        .iter()
        .filter_map(|sample| sample.value.as_num())
        .map(|value| value * scale)
        .collect();
    if values.is_empty() {
        return None;
    }
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let avg = values.iter().sum::<f64>() / values.len() as f64;
    Some((min, avg, max))
}

fn stats_cell(stats: Option<(f64, f64, f64)>, unit: &str) -> String {
    match stats {
        Some((min, avg, max)) => {
            format!("min {min:.2}{unit}   avg {avg:.2}{unit}   max {max:.2}{unit}")
        }
        None => "no samples".to_string(),
    }
}

/// Writes lines into an A4 document, starting a fresh page whenever the
/// current one is full.
fn write_document(title: &str, lines: &[String], path: &Path) -> Result<()> {
    let (doc, page, layer) = PdfDocument::new(
        title,
        Mm(PAGE_WIDTH_MM as f32),
        Mm(PAGE_HEIGHT_MM as f32),
        "report",
    );
    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .wrap_err("failed to load builtin pdf font")?;

    let mut layer_ref = doc.get_page(page).get_layer(layer);
    let mut y = PAGE_HEIGHT_MM - MARGIN_MM;
    layer_ref.use_text(title, 14.0, Mm(MARGIN_MM as f32), Mm(y as f32), &font);
    y -= 2.0 * LINE_MM;

    for line in lines {
        if y < MARGIN_MM {
            layer_ref = new_page(&doc);
            y = PAGE_HEIGHT_MM - MARGIN_MM;
        }
        if !line.is_empty() {
            layer_ref.use_text(line, 10.0, Mm(MARGIN_MM as f32), Mm(y as f32), &font);
        }
        y -= LINE_MM;
    }

    let file = File::create(path)
        .wrap_err_with(|| format!("failed to create pdf file {}", path.display()))?;
    doc.save(&mut BufWriter::new(file))
        .wrap_err_with(|| format!("failed to write pdf file {}", path.display()))?;
    Ok(())
}

fn new_page(doc: &PdfDocumentReference) -> printpdf::PdfLayerReference {
    let (page, layer) =
        doc.add_page(Mm(PAGE_WIDTH_MM as f32), Mm(PAGE_HEIGHT_MM as f32), "report");
    doc.get_page(page).get_layer(layer)
}
