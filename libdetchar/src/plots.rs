use std::ops::Range;
use std::path::{Path, PathBuf};

use ndarray::{Array1, ArrayView1};
use plotters::coord::cartesian::Cartesian2d;
use plotters::coord::types::RangedCoordf64;
use plotters::coord::Shift;
use plotters::drawing::DrawingAreaErrorKind;
use plotters::prelude::*;
use plotters_backend::DrawingErrorKind;

use super::error::PlotError;

const FONT: &str = "sans-serif";

/// Whether labels are drawn as given, reduced to plain ASCII, or left out entirely
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextMode {
    Raw,
    Sanitized,
    Unlabeled,
}

impl TextMode {
    pub fn apply(&self, text: &str) -> String {
        match self {
            Self::Raw => text.to_string(),
            Self::Sanitized | Self::Unlabeled => sanitize_label(text),
        }
    }

    pub fn draws_text(&self) -> bool {
        !matches!(self, Self::Unlabeled)
    }
}

/// Reduce a label to characters any font can draw
pub fn sanitize_label(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '_' => '-',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '?',
        })
        .collect()
}

/// Something that can be drawn on any plotters backend
pub trait Figure {
    fn size(&self) -> (u32, u32);

    fn draw<DB: DrawingBackend>(
        &self,
        root: &DrawingArea<DB, Shift>,
        text: TextMode,
    ) -> DrawResult<(), DB>;
}

fn classify<E: std::error::Error + Send + Sync>(err: DrawingAreaErrorKind<E>) -> PlotError {
    match err {
        DrawingAreaErrorKind::BackendError(DrawingErrorKind::FontError(e)) => {
            PlotError::Label(e.to_string())
        }
        other => PlotError::Backend(other.to_string()),
    }
}

fn draw_png<F: Figure>(figure: &F, path: &Path, text: TextMode) -> Result<(), PlotError> {
    let root = BitMapBackend::new(path, figure.size()).into_drawing_area();
    root.fill(&WHITE).map_err(classify)?;
    figure.draw(&root, text).map_err(classify)?;
    root.present().map_err(classify)
}

fn draw_svg<F: Figure>(figure: &F, path: &Path, text: TextMode) -> Result<(), PlotError> {
    let root = SVGBackend::new(path, figure.size()).into_drawing_area();
    root.fill(&WHITE).map_err(classify)?;
    figure.draw(&root, text).map_err(classify)?;
    root.present().map_err(classify)
}

/// Render a figure to a PNG at path.
///
/// A label failure is retried with sanitized text, and if that fails too the figure is
/// drawn without any text. A backend failure is retried once with the SVG backend,
/// written next to the requested path. Returns the path actually written.
pub fn render<F: Figure>(figure: &F, path: &Path) -> Result<PathBuf, PlotError> {
    match draw_png(figure, path, TextMode::Raw) {
        Ok(()) => Ok(path.to_path_buf()),
        Err(PlotError::Label(e)) => {
            log::warn!(
                "Label rendering failed for {}: {e}. Retrying with sanitized text...",
                path.display()
            );
            match draw_png(figure, path, TextMode::Sanitized) {
                Err(PlotError::Label(e)) => {
                    log::warn!(
                        "Label rendering failed again for {}: {e}. Drawing without labels",
                        path.display()
                    );
                    draw_png(figure, path, TextMode::Unlabeled)?;
                }
                result => result?,
            }
            Ok(path.to_path_buf())
        }
        Err(PlotError::Backend(e)) => {
            let fallback = path.with_extension("svg");
            log::warn!(
                "PNG backend failed for {}: {e}. Falling back to {}",
                path.display(),
                fallback.display()
            );
            draw_svg(figure, &fallback, TextMode::Raw)?;
            Ok(fallback)
        }
        Err(e) => Err(e),
    }
}

/// A file name for a channel's plot.
///
/// Channel names contain ':' and other separators which are replaced, so the channel's
/// position in the auxiliary list is prepended to keep names unique.
pub fn plot_file_name(order: usize, channel: &str) -> String {
    let stem: String = channel
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    format!("{order:04}_{stem}.png")
}

/// Axis range covering every value with a little padding
fn bounds<'a>(values: impl IntoIterator<Item = &'a f64>) -> Range<f64> {
    let (lo, hi) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(*v), hi.max(*v))
        });
    if !lo.is_finite() || !hi.is_finite() {
        return 0.0..1.0;
    }
    if lo == hi {
        return (lo - 1.0)..(hi + 1.0);
    }
    let pad = 0.05 * (hi - lo);
    (lo - pad)..(hi + pad)
}

type Chart<'a, DB> = ChartContext<'a, DB, Cartesian2d<RangedCoordf64, RangedCoordf64>>;

/// A captioned chart over the given ranges, with the caption left out of unlabeled figures
fn chart_on<'a, DB: DrawingBackend>(
    area: &'a DrawingArea<DB, Shift>,
    title: &str,
    x_range: Range<f64>,
    y_range: Range<f64>,
    text: TextMode,
) -> DrawResult<Chart<'a, DB>, DB> {
    let mut builder = ChartBuilder::on(area);
    builder.margin(10).x_label_area_size(40).y_label_area_size(60);
    if text.draws_text() {
        builder.caption(text.apply(title), (FONT, 20));
    }
    builder.build_cartesian_2d(x_range, y_range)
}

/// Axis labels and grid; unlabeled figures get neither
fn draw_mesh<DB: DrawingBackend>(
    chart: &mut Chart<'_, DB>,
    x_desc: &str,
    y_desc: &str,
    text: TextMode,
) -> DrawResult<(), DB> {
    if !text.draws_text() {
        return Ok(());
    }
    chart
        .configure_mesh()
        .x_desc(text.apply(x_desc))
        .y_desc(text.apply(y_desc))
        .draw()
}

/// One labelled line on a panel
pub struct Curve<'a> {
    pub label: String,
    pub values: ArrayView1<'a, f64>,
    pub color: RGBAColor,
}

impl<'a> Curve<'a> {
    pub fn new(label: &str, values: ArrayView1<'a, f64>, color: RGBAColor) -> Self {
        Self {
            label: label.to_string(),
            values,
            color,
        }
    }
}

fn line_panel<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    title: &str,
    y_desc: &str,
    x: ArrayView1<f64>,
    curves: &[Curve],
    text: TextMode,
) -> DrawResult<(), DB> {
    let x_range = bounds(x.iter());
    let y_range = bounds(curves.iter().flat_map(|c| c.values.iter()));
    let mut chart = chart_on(area, title, x_range, y_range, text)?;
    draw_mesh(&mut chart, "Time [s]", y_desc, text)?;

    for curve in curves {
        let color = curve.color;
        chart
            .draw_series(LineSeries::new(
                x.iter().copied().zip(curve.values.iter().copied()),
                color,
            ))?
            .label(text.apply(&curve.label))
            .legend(move |(lx, ly)| PathElement::new(vec![(lx, ly), (lx + 20, ly)], color));
    }

    if !curves.is_empty() && text.draws_text() {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
    }
    Ok(())
}

/// Diagnostic plot set for a single auxiliary channel
pub struct ChannelFigure<'a> {
    pub name: &'a str,
    pub reference_name: &'a str,
    pub coefficient: f64,
    pub t0: f64,
    pub times: ArrayView1<'a, f64>,
    /// Normalized reference
    pub reference: ArrayView1<'a, f64>,
    /// Normalized channel
    pub channel: ArrayView1<'a, f64>,
}

impl Figure for ChannelFigure<'_> {
    fn size(&self) -> (u32, u32) {
        (1200, 1500)
    }

    fn draw<DB: DrawingBackend>(
        &self,
        root: &DrawingArea<DB, Shift>,
        text: TextMode,
    ) -> DrawResult<(), DB> {
        let panels = root.split_evenly((3, 1));
        let t: Array1<f64> = self.times.mapv(|t| t - self.t0);

        // Flip anti-correlated channels so the overlay is readable
        let sign = if self.coefficient < 0.0 { -1.0 } else { 1.0 };
        let signed = self.channel.mapv(|v| v * sign);
        line_panel(
            &panels[0],
            &format!("{} (normalized)", self.name),
            "Normalized amplitude",
            t.view(),
            &[
                Curve::new(self.reference_name, self.reference.view(), BLACK.mix(0.8)),
                Curve::new(
                    if sign < 0.0 { "channel (inverted)" } else { "channel" },
                    signed.view(),
                    BLUE.mix(0.8),
                ),
            ],
            text,
        )?;

        let scaled = self.channel.mapv(|v| v * self.coefficient);
        line_panel(
            &panels[1],
            &format!("Scaled contribution (coefficient {:.4})", self.coefficient),
            "Normalized amplitude",
            t.view(),
            &[
                Curve::new(self.reference_name, self.reference.view(), BLACK.mix(0.8)),
                Curve::new("coefficient x channel", scaled.view(), RED.mix(0.8)),
            ],
            text,
        )?;

        let x_range = bounds(self.channel.iter());
        let y_range = bounds(self.reference.iter());
        let line_x = [x_range.start, x_range.end];
        let mut chart = chart_on(
            &panels[2],
            &format!("{} vs {}", self.reference_name, self.name),
            x_range,
            y_range,
            text,
        )?;
        draw_mesh(&mut chart, self.name, self.reference_name, text)?;
        chart.draw_series(
            self.channel
                .iter()
                .zip(self.reference.iter())
                .map(|(&px, &py)| Circle::new((px, py), 2, BLUE.mix(0.3).filled())),
        )?;
        chart.draw_series(LineSeries::new(
            line_x.iter().map(|x| (*x, x * self.coefficient)),
            RED.stroke_width(2),
        ))?;
        Ok(())
    }
}

/// The reference against the full model prediction, with the residual below
pub struct ModelFigure<'a> {
    pub reference_name: &'a str,
    pub t0: f64,
    pub times: ArrayView1<'a, f64>,
    pub reference: ArrayView1<'a, f64>,
    pub prediction: ArrayView1<'a, f64>,
    pub r_squared: f64,
}

impl Figure for ModelFigure<'_> {
    fn size(&self) -> (u32, u32) {
        (1200, 1000)
    }

    fn draw<DB: DrawingBackend>(
        &self,
        root: &DrawingArea<DB, Shift>,
        text: TextMode,
    ) -> DrawResult<(), DB> {
        let panels = root.split_evenly((2, 1));
        let t: Array1<f64> = self.times.mapv(|t| t - self.t0);
        let residual = &self.reference - &self.prediction;
        line_panel(
            &panels[0],
            &format!("Lasso model of {} (R^2 = {:.3})", self.reference_name, self.r_squared),
            "Normalized amplitude",
            t.view(),
            &[
                Curve::new(self.reference_name, self.reference.view(), BLACK.mix(0.8)),
                Curve::new("model", self.prediction.view(), RED.mix(0.8)),
            ],
            text,
        )?;
        line_panel(
            &panels[1],
            "Residual",
            "Normalized amplitude",
            t.view(),
            &[Curve::new("reference - model", residual.view(), BLUE.mix(0.8))],
            text,
        )
    }
}

/// A family of contribution curves over the reference
pub struct ContributionFigure<'a> {
    pub title: &'a str,
    pub reference_name: &'a str,
    pub t0: f64,
    pub times: ArrayView1<'a, f64>,
    pub reference: ArrayView1<'a, f64>,
    pub curves: Vec<(String, ArrayView1<'a, f64>)>,
}

impl Figure for ContributionFigure<'_> {
    fn size(&self) -> (u32, u32) {
        (1200, 700)
    }

    fn draw<DB: DrawingBackend>(
        &self,
        root: &DrawingArea<DB, Shift>,
        text: TextMode,
    ) -> DrawResult<(), DB> {
        let t: Array1<f64> = self.times.mapv(|t| t - self.t0);
        let mut curves = vec![Curve::new(self.reference_name, self.reference, BLACK.mix(0.8))];
        for (idx, (label, values)) in self.curves.iter().enumerate() {
            curves.push(Curve::new(label, *values, Palette99::pick(idx).to_rgba()));
        }
        line_panel(root, self.title, "Normalized amplitude", t.view(), &curves, text)
    }
}

/// A channel with its threshold and the crossings marked
pub struct CrossingFigure<'a> {
    pub name: &'a str,
    pub t0: f64,
    pub times: ArrayView1<'a, f64>,
    pub values: ArrayView1<'a, f64>,
    pub threshold: f64,
    pub crossings: Vec<(f64, f64)>,
}

impl Figure for CrossingFigure<'_> {
    fn size(&self) -> (u32, u32) {
        (1200, 600)
    }

    fn draw<DB: DrawingBackend>(
        &self,
        root: &DrawingArea<DB, Shift>,
        text: TextMode,
    ) -> DrawResult<(), DB> {
        let t: Array1<f64> = self.times.mapv(|t| t - self.t0);
        let x_range = bounds(t.iter());
        let y_range = bounds(self.values.iter().chain(std::iter::once(&self.threshold)));
        let mut chart = chart_on(
            root,
            &format!("{} crossings of {}", self.name, self.threshold),
            x_range.clone(),
            y_range,
            text,
        )?;
        draw_mesh(&mut chart, "Time [s]", self.name, text)?;
        chart.draw_series(LineSeries::new(
            t.iter().copied().zip(self.values.iter().copied()),
            BLUE,
        ))?;
        chart.draw_series(LineSeries::new(
            vec![(x_range.start, self.threshold), (x_range.end, self.threshold)],
            BLACK.mix(0.6),
        ))?;
        chart.draw_series(
            self.crossings
                .iter()
                .map(|(time, value)| Circle::new((time - self.t0, *value), 4, RED.filled())),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn test_sanitize_label() {
        assert_eq!(sanitize_label("L1:ASC-DHARD_P_OUT"), "L1:ASC-DHARD-P-OUT");
        assert_eq!(sanitize_label("R² fit"), "R? fit");
    }

    #[test]
    fn test_plot_file_name() {
        assert_eq!(
            plot_file_name(3, "L1:ASC-DHARD_P_OUT.mean"),
            "0003_L1_ASC-DHARD_P_OUT_mean.png"
        );
        assert_ne!(plot_file_name(0, "X1:A_B"), plot_file_name(1, "X1:A.B"));
    }

    #[derive(Debug, Clone, Copy)]
    enum Failure {
        Label,
        Layout,
    }

    /// Fails once per queued failure, then fills the canvas
    struct FlakyFigure {
        failures: RefCell<Vec<Failure>>,
        calls: RefCell<Vec<TextMode>>,
    }

    impl FlakyFigure {
        fn new(failures: Vec<Failure>) -> Self {
            Self {
                failures: RefCell::new(failures),
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl Figure for FlakyFigure {
        fn size(&self) -> (u32, u32) {
            (32, 24)
        }

        fn draw<DB: DrawingBackend>(
            &self,
            root: &DrawingArea<DB, Shift>,
            text: TextMode,
        ) -> DrawResult<(), DB> {
            self.calls.borrow_mut().push(text);
            let failure = {
                let mut failures = self.failures.borrow_mut();
                if failures.is_empty() {
                    None
                } else {
                    Some(failures.remove(0))
                }
            };
            match failure {
                Some(Failure::Label) => Err(DrawingAreaErrorKind::BackendError(
                    DrawingErrorKind::FontError(Box::new(std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        "no such font",
                    ))),
                )),
                Some(Failure::Layout) => Err(DrawingAreaErrorKind::LayoutError),
                None => root.fill(&BLUE),
            }
        }
    }

    fn plot_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("detchar_plots_{name}_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_label_failure_retries_sanitized() {
        let dir = plot_dir("label");
        let figure = FlakyFigure::new(vec![Failure::Label]);
        let path = render(&figure, &dir.join("figure.png")).unwrap();
        assert_eq!(path, dir.join("figure.png"));
        assert!(path.exists());
        assert_eq!(*figure.calls.borrow(), vec![TextMode::Raw, TextMode::Sanitized]);

        let figure = FlakyFigure::new(vec![Failure::Label, Failure::Label]);
        let path = render(&figure, &dir.join("bare.png")).unwrap();
        assert!(path.exists());
        assert_eq!(
            *figure.calls.borrow(),
            vec![TextMode::Raw, TextMode::Sanitized, TextMode::Unlabeled]
        );
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_backend_failure_falls_back_to_svg() {
        let dir = plot_dir("backend");
        let figure = FlakyFigure::new(vec![Failure::Layout]);
        let path = render(&figure, &dir.join("figure.png")).unwrap();
        assert_eq!(path, dir.join("figure.svg"));
        assert!(path.exists());
        assert_eq!(*figure.calls.borrow(), vec![TextMode::Raw, TextMode::Raw]);

        let figure = FlakyFigure::new(vec![Failure::Layout, Failure::Layout]);
        assert!(matches!(
            render(&figure, &dir.join("broken.png")),
            Err(PlotError::Backend(_))
        ));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_bounds() {
        assert_eq!(bounds([2.0, 2.0].iter()), 1.0..3.0);
        assert_eq!(bounds([].iter()), 0.0..1.0);
        let r = bounds([0.0, 10.0, f64::NAN].iter());
        assert_eq!(r, -0.5..10.5);
    }
}
