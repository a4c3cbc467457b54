use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use color_eyre::Result;
use color_eyre::eyre::WrapErr;

use crate::metrics::TIMESTAMP_FORMAT;
use crate::metrics::buffer::Snapshot;

/// Writes the snapshot as a flat table: one row per tick, `timestamp` first,
/// then one column per metric key in key-set order. Ticks where a series has
/// no sample produce an empty cell. Pure function of the snapshot, so
/// repeated exports of one snapshot are byte-identical.
pub fn write_csv(snapshot: &Snapshot, path: &Path) -> Result<()> {
    let file = File::create(path)
        .wrap_err_with(|| format!("failed to create csv file {}", path.display()))?;
    let mut out = BufWriter::new(file);

    let mut header = vec!["timestamp".to_string()];
    header.extend(snapshot.keys().iter().map(|key| key.field_name()));
    writeln!(out, "{}", join_row(&header))?;

    let columns: Vec<Vec<Option<crate::metrics::Value>>> = snapshot
        .keys()
        .iter()
        .map(|key| snapshot.aligned_column(key))
        .collect();

    for (row, tick) in snapshot.ticks().iter().enumerate() {
        let mut cells = vec![tick.format(TIMESTAMP_FORMAT).to_string()];
        for column in &columns {
            cells.push(match &column[row] {
                Some(value) => value.csv_cell(),
                None => String::new(),
            });
        }
        writeln!(out, "{}", join_row(&cells))?;
    }

    out.flush()
        .wrap_err_with(|| format!("failed to write csv file {}", path.display()))?;
    Ok(())
}

// Target names may contain commas or quotes; quote such cells per RFC 4180.
fn join_row(cells: &[String]) -> String {
    let escaped: Vec<String> = cells
        .iter()
        .map(|cell| {
            if cell.contains(',') || cell.contains('"') || cell.contains('\n') {
                format!("\"{}\"", cell.replace('"', "\"\""))
            } else {
                cell.clone()
            }
        })
        .collect();
    escaped.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_cells_pass_through() {
        let cells = vec!["a".to_string(), "1.5".to_string()];
        assert_eq!(join_row(&cells), "a,1.5");
    }

    #[test]
    fn cells_with_commas_are_quoted() {
        let cells = vec!["a,b".to_string(), "say \"hi\"".to_string()];
        assert_eq!(join_row(&cells), "\"a,b\",\"say \"\"hi\"\"\"");
    }
}
