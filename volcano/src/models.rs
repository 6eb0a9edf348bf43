use polars::prelude::*;

/// Name of the column holding `-log10(p)` for every row.
pub const MINUS_LOG10_PVALUE: &str = "minus_log10_pvalue";

/// Wrap any foreign error (calamine, plotters, io) into the polars error type
/// used throughout the data and analysis layers.
pub fn polars_err(e: Box<dyn std::error::Error + Send + Sync>) -> PolarsError {
    PolarsError::ComputeError(e.to_string().into())
}

/// A source of differential-expression results.
///
/// Loaders return a frame whose first column is the row key (the gene or
/// spreadsheet index); every other column is a named field.
pub trait Dataset {
    fn load(&self) -> PolarsResult<DataFrame>;
}

/// One point of the volcano scatter.
#[derive(Debug, Clone, PartialEq)]
pub struct VolcanoPoint {
    pub label: String,
    pub log2_fold_change: f64,
    pub minus_log10_p: f64,
}

impl VolcanoPoint {
    pub fn is_finite(&self) -> bool {
        self.log2_fold_change.is_finite() && self.minus_log10_p.is_finite()
    }
}

/// Output of one volcano computation.
#[derive(Debug, Clone)]
pub struct VolcanoFrames {
    /// Input dataset with the derived column appended.
    pub derived: DataFrame,
    /// The top-N rows, ranked by descending derived value.
    pub top_hits: DataFrame,
}
