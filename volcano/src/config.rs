use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use clap::Parser;
use serde::Deserialize;

pub const DEFAULT_OUTPUT: &str = "volcano_plot.png";

#[derive(Parser, Debug)]
#[command(name = "volcano", about = "Render a volcano plot from differential-expression results")]
pub struct CliArgs {
    #[arg(
        value_name = "INPUT",
        help = "Results table (xlsx/xls/ods, csv or tsv). The first column is the row key."
    )]
    pub input: PathBuf,

    #[arg(long, value_name = "N", default_value_t = 0, help = "Worksheet index for workbook inputs.")]
    pub sheet: usize,

    #[arg(
        short = 'p',
        long = "pvalue-column",
        value_name = "COLUMN",
        required_unless_present = "list_columns",
        help = "Column holding p-values."
    )]
    pub pvalue_column: Option<String>,

    #[arg(
        short = 'f',
        long = "fold-change-column",
        value_name = "COLUMN",
        required_unless_present = "list_columns",
        help = "Column holding log2 fold changes."
    )]
    pub fold_change_column: Option<String>,

    #[arg(
        short = 'o',
        long,
        value_name = "IMAGE",
        default_value = DEFAULT_OUTPUT,
        help = "Output image; the extension picks the format (png, jpg, bmp, svg)."
    )]
    pub output: PathBuf,

    #[arg(long, value_name = "JSON", help = "Plot style file. Command-line values take precedence.")]
    pub style: Option<PathBuf>,

    #[arg(short = 'n', long = "top-n", value_name = "N", help = "Number of top genes to highlight [1-100].")]
    pub top_n: Option<usize>,

    #[arg(long, value_name = "TEXT")]
    pub title: Option<String>,

    #[arg(long = "dot-size", value_name = "AREA", help = "Marker area in pt^2 [1-100].")]
    pub dot_size: Option<u32>,

    #[arg(long, value_name = "ALPHA", help = "Dot transparency [0.1-1.0].")]
    pub alpha: Option<f64>,

    #[arg(long = "annotation-font-size", value_name = "PT", help = "Font size of top gene labels [4-20].")]
    pub annotation_font_size: Option<u32>,

    #[arg(
        long = "pvalue-threshold",
        value_name = "P",
        help = "Draw a significance line at this p-value [0.0001-0.05]."
    )]
    pub pvalue_threshold: Option<f64>,

    #[arg(long, value_name = "PX")]
    pub width: Option<u32>,

    #[arg(long, value_name = "PX")]
    pub height: Option<u32>,

    #[arg(long = "no-plot", default_value_t = false, help = "Skip rendering; only compute and export.")]
    pub no_plot: bool,

    #[arg(long = "top-hits-csv", value_name = "CSV")]
    pub top_hits_csv: Option<PathBuf>,

    #[arg(long = "derived-csv", value_name = "CSV", help = "Write the full table with the -log10 p-value column.")]
    pub derived_csv: Option<PathBuf>,

    #[arg(long = "list-columns", default_value_t = false, help = "Print the available columns and exit.")]
    pub list_columns: bool,
}

/// Everything that changes how the plot looks, plus the highlight count.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlotStyle {
    pub title: String,
    pub top_n: usize,
    pub dot_size: u32,
    pub alpha: f64,
    pub annotation_font_size: u32,
    pub pvalue_threshold: Option<f64>,
    pub width: u32,
    pub height: u32,
}

impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            title: "My Volcano Plot".to_string(),
            top_n: 20,
            dot_size: 20,
            alpha: 0.5,
            annotation_font_size: 7,
            pvalue_threshold: None,
            width: 1000,
            height: 600,
        }
    }
}

impl PlotStyle {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("opening style file {}", path.display()))?;
        serde_json::from_reader(file).with_context(|| format!("parsing style file {}", path.display()))
    }

    /// Defaults, then the style file, then explicit flags.
    pub fn resolve(args: &CliArgs) -> Result<Self> {
        let mut style = match &args.style {
            Some(path) => Self::from_json_file(path)?,
            None => Self::default(),
        };
        style.apply_overrides(args);
        style.validate()?;
        Ok(style)
    }

    pub fn apply_overrides(&mut self, args: &CliArgs) {
        if let Some(title) = &args.title {
            self.title = title.clone();
        }
        if let Some(n) = args.top_n {
            self.top_n = n;
        }
        if let Some(size) = args.dot_size {
            self.dot_size = size;
        }
        if let Some(alpha) = args.alpha {
            self.alpha = alpha;
        }
        if let Some(size) = args.annotation_font_size {
            self.annotation_font_size = size;
        }
        if args.pvalue_threshold.is_some() {
            self.pvalue_threshold = args.pvalue_threshold;
        }
        if let Some(w) = args.width {
            self.width = w;
        }
        if let Some(h) = args.height {
            self.height = h;
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure!((1..=100).contains(&self.top_n), "top_n must be in 1..=100, got {}", self.top_n);
        ensure!((1..=100).contains(&self.dot_size), "dot_size must be in 1..=100, got {}", self.dot_size);
        ensure!((0.1..=1.0).contains(&self.alpha), "alpha must be in 0.1..=1.0, got {}", self.alpha);
        ensure!(
            (4..=20).contains(&self.annotation_font_size),
            "annotation_font_size must be in 4..=20, got {}",
            self.annotation_font_size
        );
        if let Some(t) = self.pvalue_threshold {
            ensure!(
                (0.0001..=0.05).contains(&t),
                "pvalue_threshold must be in 0.0001..=0.05, got {}",
                t
            );
        }
        ensure!(
            self.width >= 200 && self.height >= 150,
            "canvas {}x{} is too small",
            self.width,
            self.height
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn args(extra: &[&str]) -> CliArgs {
        let mut argv = vec!["volcano", "results.xlsx", "-p", "padj", "-f", "log2FoldChange"];
        argv.extend_from_slice(extra);
        CliArgs::parse_from(argv)
    }

    #[test]
    fn defaults_match_the_generator_widgets() {
        let style = PlotStyle::resolve(&args(&[])).unwrap();
        assert_eq!(style, PlotStyle::default());
        assert_eq!(style.top_n, 20);
        assert_eq!(style.title, "My Volcano Plot");
    }

    #[test]
    fn columns_are_required_unless_listing() {
        assert!(CliArgs::try_parse_from(["volcano", "results.xlsx"]).is_err());
        let listing = CliArgs::try_parse_from(["volcano", "results.xlsx", "--list-columns"]).unwrap();
        assert!(listing.list_columns);
        assert_eq!(listing.output, PathBuf::from(DEFAULT_OUTPUT));
    }

    #[test]
    fn flags_override_style_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"title": "From file", "top_n": 5, "alpha": 0.8}}"#).unwrap();
        let path = file.path().to_str().unwrap().to_string();
        let path = path.as_str();

        let style = PlotStyle::resolve(&args(&["--style", path, "--top-n", "12"])).unwrap();
        assert_eq!(style.title, "From file");
        assert_eq!(style.top_n, 12);
        assert_eq!(style.alpha, 0.8);
        assert_eq!(style.dot_size, 20);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        assert!(PlotStyle::resolve(&args(&["--top-n", "0"])).is_err());
        assert!(PlotStyle::resolve(&args(&["--top-n", "101"])).is_err());
        assert!(PlotStyle::resolve(&args(&["--alpha", "0.05"])).is_err());
        assert!(PlotStyle::resolve(&args(&["--annotation-font-size", "30"])).is_err());
        assert!(PlotStyle::resolve(&args(&["--pvalue-threshold", "0.5"])).is_err());
        assert!(PlotStyle::resolve(&args(&["--pvalue-threshold", "0.01"])).is_ok());
        assert!(PlotStyle::resolve(&args(&["--width", "199"])).is_err());
        assert!(PlotStyle::resolve(&args(&["--width", "200", "--height", "150"])).is_ok());
    }

    #[test]
    fn malformed_style_file_is_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let path = file.path().to_str().unwrap().to_string();
        let path = path.as_str();

        let err = PlotStyle::resolve(&args(&["--style", path])).unwrap_err();
        assert!(format!("{err:#}").contains("parsing style file"));
    }
}
