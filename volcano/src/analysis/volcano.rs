//! Volcano computation: the `-log10(p)` column and the top-N ranking.

use std::cmp::Ordering;

use polars::prelude::*;
use tracing::{debug, info, warn};

use crate::models::{polars_err, VolcanoFrames, VolcanoPoint, MINUS_LOG10_PVALUE};

/// Add `minus_log10_pvalue` to `df` and pick the `top_n` rows with the largest
/// value.
///
/// Both columns must exist and cast to `Float64`. Non-positive p-values are
/// kept: `0` gives `+inf` (ranked first) and negatives give `NaN` (never
/// ranked). Ties keep their input order. Calling this again on its own
/// output replaces the derived column instead of adding a second one.
pub fn compute(
    df: &DataFrame,
    pvalue_column: &str,
    fold_change_column: &str,
    top_n: usize,
) -> PolarsResult<VolcanoFrames> {
    if top_n == 0 {
        return Err(polars_err("top_n must be at least 1".into()));
    }

    let pvalues = numeric_column(df, pvalue_column)?;
    // Only checked here so a text fold-change column fails before plotting.
    numeric_column(df, fold_change_column)?;

    let derived: Float64Chunked = pvalues
        .into_iter()
        .map(|p| p.map(minus_log10))
        .collect();
    let derived = derived.with_name(PlSmallStr::from(MINUS_LOG10_PVALUE));

    let non_finite = derived
        .into_iter()
        .flatten()
        .filter(|v| !v.is_finite())
        .count();
    if non_finite > 0 {
        warn!(
            "{} row(s) of '{}' have a non-finite -log10 p-value",
            non_finite, pvalue_column
        );
    }

    let indices = top_n_indices(&derived, top_n);
    debug!("Top {} row positions: {:?}", top_n, indices);

    let mut derived_df = df.clone();
    derived_df.with_column(derived.into_series())?;

    let top_hits = derived_df.take(&IdxCa::from_vec(PlSmallStr::from("row"), indices))?;
    info!(
        "Ranked {} rows by {}; {} highlighted",
        derived_df.height(),
        MINUS_LOG10_PVALUE,
        top_hits.height()
    );

    Ok(VolcanoFrames {
        derived: derived_df,
        top_hits,
    })
}

pub fn minus_log10(p: f64) -> f64 {
    -p.log10()
}

/// Row positions of the `top_n` largest values, descending, input order on
/// ties. Nulls and NaN are skipped.
pub(crate) fn top_n_indices(values: &Float64Chunked, top_n: usize) -> Vec<IdxSize> {
    let mut ranked: Vec<(IdxSize, f64)> = values
        .into_iter()
        .enumerate()
        .filter_map(|(i, v)| v.filter(|x| !x.is_nan()).map(|x| (i as IdxSize, x)))
        .collect();

    // `sort_by` is stable, which gives first-come order on ties.
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    ranked.truncate(top_n);
    ranked.into_iter().map(|(i, _)| i).collect()
}

/// Scatter coordinates for every row of a frame produced by [`compute`].
///
/// The label is the row key (first column) rendered as text. Rows with a
/// null coordinate are dropped; non-finite ones are kept for the caller.
pub fn volcano_points(frame: &DataFrame, fold_change_column: &str) -> PolarsResult<Vec<VolcanoPoint>> {
    let key_name = frame
        .get_column_names()
        .first()
        .map(|n| n.to_string())
        .ok_or_else(|| polars_err("frame has no columns".into()))?;

    // Float keys print through f64 Display so an integral id reads `7157`.
    let key_column = frame.column(&key_name)?;
    let keys: Vec<Option<String>> = match key_column.dtype() {
        DataType::Float32 | DataType::Float64 => key_column
            .cast(&DataType::Float64)?
            .f64()?
            .into_iter()
            .map(|k| k.map(|v| v.to_string()))
            .collect(),
        _ => key_column
            .cast(&DataType::String)?
            .str()?
            .into_iter()
            .map(|k| k.map(str::to_string))
            .collect(),
    };
    let fold_changes = numeric_column(frame, fold_change_column)?;
    let significance = frame.column(MINUS_LOG10_PVALUE)?.f64()?;

    let points = keys
        .into_iter()
        .zip(fold_changes.into_iter())
        .zip(significance.into_iter())
        .enumerate()
        .filter_map(|(i, ((key, fc), y))| {
            Some(VolcanoPoint {
                label: key.unwrap_or_else(|| i.to_string()),
                log2_fold_change: fc?,
                minus_log10_p: y?,
            })
        })
        .collect();

    Ok(points)
}

fn numeric_column(df: &DataFrame, name: &str) -> PolarsResult<Float64Chunked> {
    let series = df
        .column(name)?
        .as_materialized_series()
        .strict_cast(&DataType::Float64)?;
    Ok(series.f64()?.clone())
}
