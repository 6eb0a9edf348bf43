// Workbook loader: first row is the header, first column is the row key.

use std::collections::HashSet;
use std::path::PathBuf;

use calamine::DataType as Ct;
use polars::prelude::*;
use tracing::{debug, info};

use crate::models::{polars_err, Dataset};

/// One worksheet of an xlsx/xls/ods workbook.
pub struct SpreadsheetDataset {
    pub path: PathBuf,
    pub sheet: usize,
}

impl Dataset for SpreadsheetDataset {
    fn load(&self) -> PolarsResult<DataFrame> {
        use calamine::{open_workbook_auto, Reader};

        info!("Reading worksheet {} of {}", self.sheet, self.path.display());
        let mut wb = open_workbook_auto(&self.path).map_err(|e| polars_err(Box::new(e)))?;
        let range = wb
            .worksheet_range_at(self.sheet)
            .ok_or_else(|| polars_err(format!("worksheet {} missing", self.sheet).into()))?
            .map_err(|e| polars_err(Box::new(e)))?;

        frame_from_rows(range.rows())
    }
}

fn cell_to_string(cell: &Ct) -> String {
    match cell {
        Ct::String(s) => s.clone(),
        Ct::Empty => String::new(),
        Ct::Bool(b) => b.to_string(),
        Ct::Error(e) => format!("ERR({e:?})"),
        Ct::Float(n) | Ct::Duration(n) => n.to_string(),
        Ct::Int(i) => i.to_string(),
        Ct::DateTime(f) => f.to_string(),
        Ct::DateTimeIso(s) | Ct::DurationIso(s) => s.clone(),
    }
}

fn cell_to_f64(cell: &Ct) -> Option<f64> {
    match cell {
        Ct::Float(n) => Some(*n),
        Ct::Int(i) => Some(*i as f64),
        _ => None,
    }
}

/// Header names as pandas would produce them: an unnamed first column is
/// the index, other unnamed columns get a positional name, and repeated
/// names get `.1`, `.2`, ... suffixes.
fn normalize_headers(raw: &[Ct]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    raw.iter()
        .enumerate()
        .map(|(i, cell)| {
            let name = cell_to_string(cell).trim().to_string();
            let base = match (i, name.is_empty()) {
                (0, true) => "index".to_string(),
                (_, true) => format!("Unnamed: {i}"),
                _ => name,
            };
            let mut unique = base.clone();
            let mut n = 1;
            while seen.contains(&unique) {
                unique = format!("{base}.{n}");
                n += 1;
            }
            seen.insert(unique.clone());
            unique
        })
        .collect()
}

/// Build a frame from worksheet rows. A column whose non-empty cells are all
/// numeric becomes `Float64`, anything else is kept as text.
pub(crate) fn frame_from_rows<'a, I>(mut rows: I) -> PolarsResult<DataFrame>
where
    I: Iterator<Item = &'a [Ct]>,
{
    let headers = normalize_headers(
        rows.next()
            .ok_or_else(|| polars_err("empty sheet".into()))?,
    );
    debug!("Worksheet header = {:?}", headers);

    let mut cols: Vec<Vec<&Ct>> = vec![Vec::new(); headers.len()];
    for row in rows {
        if row.iter().all(|c| matches!(c, Ct::Empty)) {
            continue;
        }
        for (i, col) in cols.iter_mut().enumerate() {
            col.push(row.get(i).unwrap_or(&Ct::Empty));
        }
    }

    let columns: Vec<Column> = headers
        .into_iter()
        .zip(cols)
        .map(|(name, cells)| {
            let numeric = cells
                .iter()
                .all(|c| matches!(c, Ct::Empty | Ct::Float(_) | Ct::Int(_)));
            let name = PlSmallStr::from(name);
            let series = if numeric {
                let values: Vec<Option<f64>> = cells.iter().map(|c| cell_to_f64(c)).collect();
                Series::new(name, values)
            } else {
                let values: Vec<Option<String>> = cells
                    .iter()
                    .map(|c| match c {
                        Ct::Empty => None,
                        _ => Some(cell_to_string(c)),
                    })
                    .collect();
                Series::new(name, values)
            };
            series.into()
        })
        .collect();

    DataFrame::new(columns)
}
