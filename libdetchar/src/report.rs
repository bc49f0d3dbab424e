//! Plain-text tables and the HTML summary pages.
//!
//! Everything here renders to a `String` first so it can be checked without touching the
//! file system; `write_text` puts a rendered page on disk.

use std::fmt::Write;
use std::path::{Path, PathBuf};

use super::crossings::Crossing;
use super::error::ReportError;
use super::gps::format_gps;
use super::lasso::{FitMode, LassoFit};
use super::overflow::OverflowEvents;
use super::ranking::Ranking;
use super::segments::SegmentList;

const STYLE: &str = r#"
body { font-family: sans-serif; margin: 2em; color: #222; }
table { border-collapse: collapse; margin-bottom: 1em; }
th, td { border: 1px solid #ccc; padding: 4px 10px; text-align: left; }
th { background: #eee; }
details { border: 1px solid #ccc; border-radius: 4px; margin: 6px 0; padding: 4px 8px; }
details summary { cursor: pointer; font-weight: bold; }
details.danger { border-left: 6px solid #d9534f; }
details.warning { border-left: 6px solid #f0ad4e; }
details.info { border-left: 6px solid #5bc0de; }
details.neutral { border-left: 6px solid #999; }
tr.danger { background: #f2dede; }
tr.warning { background: #fcf8e3; }
tr.info { background: #d9edf7; }
tr.neutral { color: #777; }
.notice { padding: 1em; background: #f5f5f5; border: 1px dashed #999; }
img { max-width: 100%; }
"#;

/// Parameters of a run shown at the top of every page
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub title: String,
    pub start: i64,
    pub end: i64,
    pub state_flag: Option<String>,
    pub cadence: String,
    pub segments: SegmentList,
}

/// Escape text for inclusion in HTML
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Path of an artifact relative to the report, so the output directory can be moved
fn relative_link(path: &Path, output_dir: &Path) -> String {
    let relative: PathBuf = path
        .strip_prefix(output_dir)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| path.to_path_buf());
    escape_html(&relative.to_string_lossy())
}

fn page_header(out: &mut String, summary: &RunSummary) -> Result<(), ReportError> {
    let title = escape_html(&summary.title);
    writeln!(out, "<!DOCTYPE html>")?;
    writeln!(out, "<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">")?;
    writeln!(out, "<title>{title}</title>\n<style>{STYLE}</style>\n</head>\n<body>")?;
    writeln!(out, "<h1>{title}</h1>")?;
    writeln!(out, "<h2>Parameters</h2>\n<table>")?;
    writeln!(
        out,
        "<tr><th>Start</th><td>{} ({})</td></tr>",
        summary.start,
        format_gps(summary.start as f64)
    )?;
    writeln!(
        out,
        "<tr><th>End</th><td>{} ({})</td></tr>",
        summary.end,
        format_gps(summary.end as f64)
    )?;
    writeln!(
        out,
        "<tr><th>State flag</th><td>{}</td></tr>",
        summary
            .state_flag
            .as_deref()
            .map(escape_html)
            .unwrap_or_else(|| String::from("none"))
    )?;
    writeln!(out, "<tr><th>Cadence</th><td>{}</td></tr>", escape_html(&summary.cadence))?;
    writeln!(
        out,
        "<tr><th>Segments</th><td>{} ({} s analyzed)</td></tr>",
        summary.segments.len(),
        summary.segments.livetime()
    )?;
    Ok(())
}

fn page_footer(out: &mut String) -> Result<(), ReportError> {
    writeln!(
        out,
        "<hr>\n<p><small>Generated by {} {}</small></p>\n</body>\n</html>",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    )?;
    Ok(())
}

/// The full channel table as aligned plain text, in ranked order
pub fn render_channel_table(ranking: &Ranking) -> Result<String, ReportError> {
    let width = ranking
        .channels
        .iter()
        .map(|c| c.name.len())
        .max()
        .unwrap_or(0)
        .max("channel".len());
    let mut out = String::new();
    writeln!(out, "# {:<width$}  {:>12}  flat", "channel", "coefficient")?;
    for channel in ranking.channels.iter() {
        writeln!(
            out,
            "{:<width$}    {:>12.6}  {}",
            channel.name,
            channel.coefficient,
            if channel.is_flat() { "yes" } else { "no" }
        )?;
    }
    Ok(out)
}

/// Plot paths of the lasso summary page; any may be absent
#[derive(Debug, Clone, Default)]
pub struct LassoPlots {
    pub model: Option<PathBuf>,
    pub cumulative: Option<PathBuf>,
    pub individual: Option<PathBuf>,
}

/// The lasso summary page
pub fn render_lasso_html(
    summary: &RunSummary,
    reference: &str,
    fit: &LassoFit,
    ranking: &Ranking,
    plots: &LassoPlots,
    output_dir: &Path,
) -> Result<String, ReportError> {
    let mut out = String::new();
    page_header(&mut out, summary)?;
    writeln!(out, "<tr><th>Reference</th><td>{}</td></tr>", escape_html(reference))?;
    writeln!(
        out,
        "<tr><th>Alpha</th><td>{:.4e} ({})</td></tr>",
        fit.result.alpha,
        fit.result.mode.label()
    )?;
    if let FitMode::CrossValidated(cv) = &fit.result.mode {
        writeln!(
            out,
            "<tr><th>Cross-validation</th><td>{} folds over {} alphas</td></tr>",
            cv.n_folds,
            cv.alphas.len()
        )?;
    }
    writeln!(out, "<tr><th>R<sup>2</sup></th><td>{:.4}</td></tr>", fit.r_squared)?;
    writeln!(out, "<tr><th>Threshold</th><td>{}</td></tr>", ranking.threshold)?;
    writeln!(
        out,
        "<tr><th>Channels</th><td>{} analyzed, {} selected, {} significant</td></tr>",
        ranking.channels.len(),
        fit.result.n_selected(),
        ranking.n_useful()
    )?;
    writeln!(out, "</table>")?;

    if let Some(model) = &plots.model {
        writeln!(out, "<h2>Model</h2>")?;
        writeln!(out, "<img src=\"{}\" alt=\"model\">", relative_link(model, output_dir))?;
    }

    writeln!(out, "<h2>Significant channels</h2>")?;
    if ranking.has_useful() {
        for (path, alt) in [(&plots.cumulative, "cumulative"), (&plots.individual, "individual")] {
            if let Some(path) = path {
                writeln!(out, "<img src=\"{}\" alt=\"{alt}\">", relative_link(path, output_dir))?;
            }
        }
        for (rank, channel) in ranking.useful().iter().enumerate() {
            let name = escape_html(&channel.name);
            writeln!(out, "<details class=\"{}\">", channel.severity.css_class())?;
            writeln!(
                out,
                "<summary>{}. {name} &mdash; {:+.4} ({})</summary>",
                rank + 1,
                channel.coefficient,
                channel.severity.label()
            )?;
            if let Some(plot) = &channel.plot {
                writeln!(
                    out,
                    "<img src=\"{}\" alt=\"{name}\">",
                    relative_link(plot, output_dir)
                )?;
            }
            writeln!(out, "</details>")?;
        }
    } else {
        writeln!(
            out,
            "<p class=\"notice\">No significant channels: no channel has |coefficient| &ge; {}.</p>",
            ranking.threshold
        )?;
    }

    writeln!(out, "<h2>All channels</h2>\n<table>")?;
    writeln!(out, "<tr><th>Rank</th><th>Channel</th><th>Coefficient</th><th>Severity</th></tr>")?;
    for (rank, channel) in ranking.channels.iter().enumerate() {
        let coefficient = if channel.is_flat() {
            String::from("flat")
        } else {
            format!("{:+.6}", channel.coefficient)
        };
        writeln!(
            out,
            "<tr class=\"{}\"><td>{}</td><td>{}</td><td>{coefficient}</td><td>{}</td></tr>",
            channel.severity.css_class(),
            rank + 1,
            escape_html(&channel.name),
            channel.severity.label()
        )?;
    }
    writeln!(out, "</table>")?;
    page_footer(&mut out)?;
    Ok(out)
}

/// Crossings as plain text, one per line
pub fn render_crossing_table(channel: &str, crossings: &[Crossing]) -> Result<String, ReportError> {
    let mut out = String::new();
    writeln!(out, "# {channel}")?;
    writeln!(out, "# gps_time  value  direction")?;
    for crossing in crossings {
        writeln!(
            out,
            "{:.6}  {}  {}",
            crossing.time,
            crossing.value,
            if crossing.rising { "rising" } else { "falling" }
        )?;
    }
    Ok(out)
}

/// The threshold crossing summary page
pub fn render_crossings_html(
    summary: &RunSummary,
    channel: &str,
    threshold: f64,
    crossings: &[Crossing],
    above: &SegmentList,
    plot: Option<&Path>,
    output_dir: &Path,
) -> Result<String, ReportError> {
    let mut out = String::new();
    page_header(&mut out, summary)?;
    writeln!(out, "<tr><th>Channel</th><td>{}</td></tr>", escape_html(channel))?;
    writeln!(out, "<tr><th>Threshold</th><td>{threshold}</td></tr>")?;
    writeln!(
        out,
        "<tr><th>Crossings</th><td>{} ({} s at or above threshold)</td></tr>",
        crossings.len(),
        above.livetime()
    )?;
    writeln!(out, "</table>")?;
    if let Some(plot) = plot {
        writeln!(out, "<img src=\"{}\" alt=\"crossings\">", relative_link(plot, output_dir))?;
    }
    if crossings.is_empty() {
        writeln!(out, "<p class=\"notice\">No crossings found.</p>")?;
    } else {
        writeln!(out, "<h2>Crossings</h2>\n<table>")?;
        writeln!(out, "<tr><th>GPS</th><th>UTC</th><th>Value</th><th>Direction</th></tr>")?;
        for crossing in crossings {
            writeln!(
                out,
                "<tr><td>{:.3}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                crossing.time,
                format_gps(crossing.time),
                crossing.value,
                if crossing.rising { "rising" } else { "falling" }
            )?;
        }
        writeln!(out, "</table>")?;
    }
    page_footer(&mut out)?;
    Ok(out)
}

/// Overflow counts as plain text, one channel per line
pub fn render_overflow_table(events: &[OverflowEvents]) -> Result<String, ReportError> {
    let mut out = String::new();
    writeln!(out, "# channel  overflows  segments")?;
    for event in events {
        writeln!(out, "{}  {}  {}", event.channel, event.n_overflows, event.segments.len())?;
    }
    Ok(out)
}

/// The overflow summary page; events are shown in the order given
pub fn render_overflow_html(
    summary: &RunSummary,
    events: &[OverflowEvents],
) -> Result<String, ReportError> {
    let mut out = String::new();
    page_header(&mut out, summary)?;
    let n_overflowing = events.iter().filter(|e| e.has_overflows()).count();
    writeln!(
        out,
        "<tr><th>Channels</th><td>{} checked, {n_overflowing} overflowing</td></tr>",
        events.len()
    )?;
    writeln!(out, "</table>")?;
    if n_overflowing == 0 {
        writeln!(out, "<p class=\"notice\">No overflows found.</p>")?;
    }
    for event in events.iter().filter(|e| e.has_overflows()) {
        writeln!(out, "<details class=\"danger\">")?;
        writeln!(
            out,
            "<summary>{} &mdash; {} overflows</summary>",
            escape_html(&event.channel),
            event.n_overflows
        )?;
        writeln!(out, "<table>\n<tr><th>Start</th><th>End</th><th>UTC</th></tr>")?;
        for segment in event.segments.iter() {
            writeln!(
                out,
                "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                segment.start,
                segment.end,
                format_gps(segment.start)
            )?;
        }
        writeln!(out, "</table>\n</details>")?;
    }
    page_footer(&mut out)?;
    Ok(out)
}

/// Write rendered text to path
pub fn write_text(path: &Path, text: &str) -> Result<(), ReportError> {
    std::fs::write(path, text)?;
    log::info!("Wrote {}", path.display());
    Ok(())
}
