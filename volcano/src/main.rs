use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::analysis::plot::render_volcano;
use crate::analysis::volcano::{compute, volcano_points};
use crate::config::{CliArgs, PlotStyle};
use crate::data_handling::load_dataset;
use crate::helper_functions::dataframe_to_csv;

mod analysis;
mod config;
mod data_handling;
mod helper_functions;
mod models;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = CliArgs::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &CliArgs) -> Result<()> {
    info!("Starting the volcano plot generator");

    let df = load_dataset(&args.input, args.sheet)
        .with_context(|| format!("loading {}", args.input.display()))?;

    if args.list_columns {
        let names: Vec<&str> = df.get_column_names().iter().map(|n| n.as_str()).collect();
        info!("Row key: {}", names[0]);
        info!("Columns: {}", names[1..].join(", "));
        return Ok(());
    }

    // clap guarantees both unless --list-columns was given
    let (Some(pvalue_column), Some(fold_change_column)) =
        (&args.pvalue_column, &args.fold_change_column)
    else {
        anyhow::bail!("both --pvalue-column and --fold-change-column are required");
    };

    let style = PlotStyle::resolve(args)?;

    let mut frames = compute(&df, pvalue_column, fold_change_column, style.top_n)
        .context("computing -log10 p-values")?;
    info!("Top {} genes:\n{}", style.top_n, frames.top_hits);

    if let Some(path) = &args.derived_csv {
        dataframe_to_csv(&mut frames.derived, path, true)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    if let Some(path) = &args.top_hits_csv {
        dataframe_to_csv(&mut frames.top_hits, path, true)
            .with_context(|| format!("writing {}", path.display()))?;
    }

    if args.no_plot {
        return Ok(());
    }

    let all = volcano_points(&frames.derived, fold_change_column)?;
    let top = volcano_points(&frames.top_hits, fold_change_column)?;
    render_volcano(&all, &top, &style, &args.output)
        .with_context(|| format!("rendering {}", args.output.display()))?;

    Ok(())
}
