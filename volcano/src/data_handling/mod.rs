pub mod delimited;
pub mod spreadsheet;

use std::path::Path;

use polars::prelude::*;
use tracing::info;

use crate::helper_functions::extension_of;
use crate::models::{polars_err, Dataset};
use delimited::DelimitedDataset;
use spreadsheet::SpreadsheetDataset;

/// Pick a loader from the file extension and read the dataset.
///
/// Workbooks go through calamine, `tsv`/`txt` are tab separated, anything
/// else is read as CSV. The result always has the row key first.
pub fn load_dataset(path: &Path, sheet: usize) -> PolarsResult<DataFrame> {
    let df = match extension_of(path).as_str() {
        "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => SpreadsheetDataset {
            path: path.to_path_buf(),
            sheet,
        }
        .load()?,
        "tsv" | "txt" => DelimitedDataset {
            path: path.to_path_buf(),
            separator: b'\t',
        }
        .load()?,
        _ => DelimitedDataset {
            path: path.to_path_buf(),
            separator: b',',
        }
        .load()?,
    };

    if df.width() < 2 {
        return Err(polars_err(
            format!(
                "{} has {} column(s); need a row key plus data columns",
                path.display(),
                df.width()
            )
            .into(),
        ));
    }
    info!("Loaded {} rows x {} columns", df.height(), df.width());
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn csv_is_loaded_with_key_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("de_results.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "gene,log2FoldChange,pvalue").unwrap();
        writeln!(file, "TP53,1.2,0.01").unwrap();
        writeln!(file, "MYC,-0.4,0.0001").unwrap();
        writeln!(file, "GAPDH,0.1,0.5").unwrap();

        let df = load_dataset(&path, 0).unwrap();
        assert_eq!(df.shape(), (3, 3));
        assert_eq!(df.get_column_names()[0].as_str(), "gene");
    }

    #[test]
    fn single_column_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("genes.tsv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "gene").unwrap();
        writeln!(file, "TP53").unwrap();

        assert!(load_dataset(&path, 0).is_err());
    }

    #[test]
    fn missing_workbook_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_dataset(&dir.path().join("absent.xlsx"), 0).is_err());
    }
}
