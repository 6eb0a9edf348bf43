use std::fs::File;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::info;

use crate::models::polars_err;

/// Read a header-first delimited text file.
pub fn read_delimited(path: &Path, separator: u8) -> PolarsResult<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .map_parse_options(|mut o| {
            o.separator = separator;
            o.truncate_ragged_lines = true;
            o
        })
        .try_into_reader_with_file_path(Some(PathBuf::from(path)))?
        .finish()
}

/// Write `df` as CSV, creating parent directories as needed.
pub fn dataframe_to_csv(df: &mut DataFrame, path: &Path, include_header: bool) -> PolarsResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| polars_err(Box::new(e)))?;
    }
    let mut file = File::create(path).map_err(|e| polars_err(Box::new(e)))?;
    CsvWriter::new(&mut file)
        .include_header(include_header)
        .finish(df)?;
    info!("Wrote {} rows to {}", df.height(), path.display());
    Ok(())
}

/// Lower-cased file extension, or an empty string when there is none.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}
