use std::ops::Range;
use std::path::Path;

use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use polars::prelude::PolarsResult;
use tracing::{info, warn};

use crate::analysis::volcano::minus_log10;
use crate::config::PlotStyle;
use crate::helper_functions::extension_of;
use crate::models::{polars_err, VolcanoPoint};

/// matplotlib's default first colour (`tab:blue`).
const BASE_COLOUR: RGBColor = RGBColor(31, 119, 180);
const HIGHLIGHT_COLOUR: RGBColor = RED;
const DPI: f64 = 100.0;
const AXIS_DESC_PT: f64 = 16.0;
const TITLE_PT: f64 = 14.0;
const TICK_PT: f64 = 10.0;
const THRESHOLD_DASHES: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Bitmap,
    Svg,
}

impl ImageFormat {
    pub fn from_path(path: &Path) -> PolarsResult<Self> {
        match extension_of(path).as_str() {
            "svg" => Ok(Self::Svg),
            "png" | "jpg" | "jpeg" | "bmp" => Ok(Self::Bitmap),
            other => Err(polars_err(
                format!("unsupported image format '{other}' for {}", path.display()).into(),
            )),
        }
    }
}

fn pt_to_px(pt: f64) -> f64 {
    pt * DPI / 72.0
}

/// Pixel radius for a marker whose area is `dot_size` pt².
pub fn marker_radius(dot_size: u32) -> u32 {
    let diameter_px = pt_to_px((dot_size as f64).sqrt());
    (diameter_px / 2.0).round().max(1.0) as u32
}

/// Axis ranges covering every finite point (and the threshold line when
/// present), padded by 5% on each side.
pub fn axis_ranges(points: &[VolcanoPoint], extra_y: Option<f64>) -> Option<(Range<f64>, Range<f64>)> {
    let finite = || points.iter().filter(|p| p.is_finite());
    let (mut x_min, mut x_max) = finite()
        .map(|p| p.log2_fold_change)
        .fold(None, |acc: Option<(f64, f64)>, x| match acc {
            None => Some((x, x)),
            Some((lo, hi)) => Some((lo.min(x), hi.max(x))),
        })?;
    let mut y_max = finite().map(|p| p.minus_log10_p).fold(f64::NEG_INFINITY, f64::max);
    let mut y_min = finite().map(|p| p.minus_log10_p).fold(0.0, f64::min);
    if let Some(y) = extra_y.filter(|y| y.is_finite()) {
        y_max = y_max.max(y);
        y_min = y_min.min(y);
    }

    pad(&mut x_min, &mut x_max);
    pad(&mut y_min, &mut y_max);
    Some((x_min..x_max, y_min..y_max))
}

fn pad(lo: &mut f64, hi: &mut f64) {
    let span = *hi - *lo;
    if span <= f64::EPSILON {
        *lo -= 1.0;
        *hi += 1.0;
    } else {
        *lo -= span * 0.05;
        *hi += span * 0.05;
    }
}

/// Evenly spaced dash segments across `range`, each followed by a gap half
/// its length.
fn dash_segments(range: &Range<f64>, dashes: usize) -> Vec<(f64, f64)> {
    let step = (range.end - range.start) / dashes as f64;
    let dash = step * 2.0 / 3.0;
    (0..dashes)
        .map(|i| {
            let start = range.start + i as f64 * step;
            (start, (start + dash).min(range.end))
        })
        .collect()
}

/// Render the volcano scatter to `output_path`.
///
/// `all` is drawn in the base colour, `top` is overlaid in red and labelled
/// with each point's row key. Non-finite points cannot be placed and are
/// skipped.
pub fn render_volcano(
    all: &[VolcanoPoint],
    top: &[VolcanoPoint],
    style: &PlotStyle,
    output_path: &Path,
) -> PolarsResult<()> {
    let format = ImageFormat::from_path(output_path)?;

    let skipped = all.iter().filter(|p| !p.is_finite()).count();
    if skipped > 0 {
        warn!("{} point(s) have a non-finite coordinate and are not drawn", skipped);
    }

    let threshold_y = style.pvalue_threshold.map(minus_log10);
    let (x_range, y_range) = axis_ranges(all, threshold_y)
        .ok_or_else(|| polars_err("no finite points to plot".into()))?;

    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| polars_err(Box::new(e)))?;
    }

    let size = (style.width, style.height);
    match format {
        ImageFormat::Svg => {
            let root = SVGBackend::new(output_path, size).into_drawing_area();
            draw_volcano(&root, all, top, style, x_range, y_range)
                .map_err(|e| polars_err(Box::new(e)))?;
            root.present().map_err(|e| polars_err(Box::new(e)))?;
        }
        ImageFormat::Bitmap => {
            let root = BitMapBackend::new(output_path, size).into_drawing_area();
            draw_volcano(&root, all, top, style, x_range, y_range)
                .map_err(|e| polars_err(Box::new(e)))?;
            root.present().map_err(|e| polars_err(Box::new(e)))?;
        }
    }

    info!("Volcano plot saved to {}", output_path.display());
    Ok(())
}

fn font(pt: f64) -> TextStyle<'static> {
    FontDesc::new(FontFamily::SansSerif, pt_to_px(pt), FontStyle::Normal).into()
}

fn draw_volcano<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    all: &[VolcanoPoint],
    top: &[VolcanoPoint],
    style: &PlotStyle,
    x_range: Range<f64>,
    y_range: Range<f64>,
) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(root)
        .caption(&style.title, font(TITLE_PT))
        .margin(15)
        .x_label_area_size(60)
        .y_label_area_size(70)
        .build_cartesian_2d(x_range.clone(), y_range)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc("Log2 Fold Change")
        .y_desc("-Log10 p-value")
        .axis_desc_style(font(AXIS_DESC_PT))
        .label_style(font(TICK_PT))
        .draw()?;

    let radius = marker_radius(style.dot_size);
    let at = |p: &VolcanoPoint| (p.log2_fold_change, p.minus_log10_p);

    chart.draw_series(
        all.iter()
            .filter(|p| p.is_finite())
            .map(|p| Circle::new(at(p), radius, BASE_COLOUR.mix(style.alpha).filled())),
    )?;

    if let Some(t) = style.pvalue_threshold {
        let y = minus_log10(t);
        chart.draw_series(dash_segments(&x_range, THRESHOLD_DASHES).into_iter().map(|(x0, x1)| {
            PathElement::new(vec![(x0, y), (x1, y)], BLACK.mix(0.6).stroke_width(1))
        }))?;
    }

    // Highlights go on top of the base layer, labels on top of everything.
    chart.draw_series(
        top.iter()
            .filter(|p| p.is_finite())
            .map(|p| Circle::new(at(p), radius, HIGHLIGHT_COLOUR.mix(style.alpha).filled())),
    )?;

    let label_style = font(style.annotation_font_size as f64).pos(Pos::new(HPos::Left, VPos::Bottom));
    chart.draw_series(
        top.iter()
            .filter(|p| p.is_finite())
            .map(|p| Text::new(p.label.clone(), at(p), label_style.clone())),
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(x: f64, y: f64) -> VolcanoPoint {
        VolcanoPoint {
            label: "g".to_string(),
            log2_fold_change: x,
            minus_log10_p: y,
        }
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(ImageFormat::from_path(Path::new("out/plot.svg")).unwrap(), ImageFormat::Svg);
        assert_eq!(ImageFormat::from_path(Path::new("plot.PNG")).unwrap(), ImageFormat::Bitmap);
        assert_eq!(ImageFormat::from_path(Path::new("plot.jpeg")).unwrap(), ImageFormat::Bitmap);
        assert!(ImageFormat::from_path(Path::new("plot.pdf")).is_err());
        assert!(ImageFormat::from_path(Path::new("plot")).is_err());
    }

    #[test]
    fn marker_radius_grows_with_area() {
        assert_eq!(marker_radius(1), 1);
        assert_eq!(marker_radius(20), 3);
        assert_eq!(marker_radius(100), 7);
        assert!((1..100).all(|s| marker_radius(s) <= marker_radius(s + 1)));
    }

    #[test]
    fn ranges_ignore_non_finite_points() {
        let points = vec![
            point(-2.0, 1.0),
            point(3.0, 5.0),
            point(0.0, f64::INFINITY),
            point(f64::NAN, 2.0),
        ];

        let (x, y) = axis_ranges(&points, None).unwrap();
        assert!((x.start - -2.25).abs() < 1e-12);
        assert!((x.end - 3.25).abs() < 1e-12);
        assert!((y.start - -0.25).abs() < 1e-12);
        assert!((y.end - 5.25).abs() < 1e-12);
    }

    #[test]
    fn ranges_include_threshold_and_handle_single_point() {
        let (x, y) = axis_ranges(&[point(1.0, 1.0)], Some(3.0)).unwrap();
        assert_eq!(x, 0.0..2.0);
        assert!(y.end > 3.0);

        assert!(axis_ranges(&[point(f64::NAN, f64::INFINITY)], None).is_none());
        assert!(axis_ranges(&[], Some(2.0)).is_none());
    }

    #[test]
    fn dashes_stay_inside_range() {
        let segments = dash_segments(&(-3.0..3.0), 6);
        assert_eq!(segments.len(), 6);
        assert_eq!(segments[0].0, -3.0);
        assert!((segments[0].1 - -7.0 / 3.0).abs() < 1e-12);
        assert!(segments.iter().all(|&(a, b)| a < b && b <= 3.0));
    }

    #[test]
    fn missing_points_fail_before_drawing() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("empty.svg");
        let err = render_volcano(&[], &[], &PlotStyle::default(), &out);
        assert!(err.is_err());
        assert!(!out.exists());
    }
}
