use std::path::PathBuf;

use polars::prelude::*;
use tracing::{error, info};

use crate::helper_functions::read_delimited;
use crate::models::Dataset;

/// CSV or TSV export of a results table.
pub struct DelimitedDataset {
    pub path: PathBuf,
    pub separator: u8,
}

impl Dataset for DelimitedDataset {
    fn load(&self) -> PolarsResult<DataFrame> {
        info!("Reading data from {}", self.path.display());
        match read_delimited(&self.path, self.separator) {
            Ok(df) => Ok(df),
            Err(e) => {
                error!("Failed to read {}: {}", self.path.display(), e);
                Err(e)
            }
        }
    }
}
