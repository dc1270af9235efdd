//! Slide deck configuration consumed by the external report renderer.

use analysis::device::DeviceShare;
use analysis::summary::Summary;
use analysis::summary::SummaryRow;
use common::config::Config;
use common::funnel::Stage;
use common::types::impact_col;
use common::types::significance_col;
use serde::Serialize;

const LAYOUT_TITLE: &str = "Title Slide 2";
const LAYOUT_DIVIDER: &str = "Divider Slide 1";
const LAYOUT_LONG_FORM: &str = "Long Form Messaging 1";
const LAYOUT_CHART_AND_DATA: &str = "Chart and Data";
const ALL_USERS: &str = "All Users";
const MISSING: &str = "-";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportInfo {
    pub title: String,
    pub points: Vec<String>,
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Slide {
    #[serde(rename = "Title Slide")]
    Title {
        name: String,
        layout: String,
        title: String,
        subtitle: String,
    },
    #[serde(rename = "Divider Slide")]
    Divider {
        name: String,
        layout: String,
        title: String,
    },
    #[serde(rename = "Report Info Slide")]
    ReportInfo {
        name: String,
        layout: String,
        title: String,
        content: ReportInfo,
    },
    #[serde(rename = "Metric Slide")]
    Metric {
        name: String,
        layout: String,
        title: String,
        segment: String,
        data: Vec<Vec<String>>,
        image_path: String,
        footer: String,
    },
}

impl Slide {
    pub fn title(title: &str, subtitle: &str) -> Self {
        Slide::Title {
            name: title.to_string(),
            layout: LAYOUT_TITLE.to_string(),
            title: title.to_string(),
            subtitle: subtitle.to_string(),
        }
    }

    pub fn divider(title: &str) -> Self {
        Slide::Divider {
            name: title.to_string(),
            layout: LAYOUT_DIVIDER.to_string(),
            title: title.to_string(),
        }
    }

    pub fn report_info(title: &str, content: ReportInfo) -> Self {
        Slide::ReportInfo {
            name: title.to_string(),
            layout: LAYOUT_LONG_FORM.to_string(),
            title: title.to_string(),
            content,
        }
    }

    pub fn metric(title: &str, segment: &str, data: Vec<Vec<String>>, image_path: String) -> Self {
        Slide::Metric {
            name: title.to_string(),
            layout: LAYOUT_CHART_AND_DATA.to_string(),
            title: title.to_string(),
            segment: segment.to_string(),
            data,
            image_path,
            footer: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlideConfig {
    pub id: String,
    pub name: String,
    pub content: Vec<Slide>,
}

pub fn format_perc(x: f64) -> String {
    format!("{x:.2}%")
}

/// Two decimals with a thousands separator, e.g. `1,234.50`.
pub fn format_float(x: f64) -> String {
    group_thousands(&format!("{x:.2}"))
}

pub fn format_int(x: f64) -> String {
    group_thousands(&format!("{x:.0}"))
}

pub fn format_rev(x: f64) -> String {
    format!("£{}", format_float(x))
}

fn group_thousands(num: &str) -> String {
    let (sign, num) = match num.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", num),
    };
    let (int, frac) = match num.split_once('.') {
        Some((int, frac)) => (int, Some(frac)),
        None => (num, None),
    };

    let mut grouped = String::with_capacity(int.len() + int.len() / 3);
    for (idx, ch) in int.chars().enumerate() {
        if idx > 0 && (int.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    match frac {
        Some(frac) => format!("{sign}{grouped}.{frac}"),
        None => format!("{sign}{grouped}"),
    }
}

fn format_total(stage: &Stage, value: f64) -> String {
    if stage.is_revenue() {
        format_rev(value)
    } else {
        format_int(value)
    }
}

fn format_rate(stage: &Stage, value: Option<f64>) -> String {
    match value {
        None => MISSING.to_string(),
        Some(v) if stage.is_revenue() => format_rev(v),
        Some(v) => format_perc(v),
    }
}

fn format_opt_perc(value: Option<f64>) -> String {
    value.map(format_perc).unwrap_or_else(|| MISSING.to_string())
}

fn segment_name(dimensions: &[String]) -> String {
    if dimensions.is_empty() {
        ALL_USERS.to_string()
    } else {
        dimensions.join(" / ")
    }
}

fn image_path(stage: &Stage, dimensions: &[String]) -> String {
    let mut name = stage.name.clone();
    for dim in dimensions {
        name.push('_');
        name.push_str(&dim.to_lowercase().replace(' ', "_"));
    }

    format!("visualisations/{name}.png")
}

// One column per variant, one row per reported value of the stage
fn metric_table(summary: &Summary, rows: &[&SummaryRow], idx: usize, prev: usize) -> Vec<Vec<String>> {
    let stages = summary.funnel().stages();
    let stage = &stages[idx];
    let previous = &stages[prev];

    let mut header = vec![String::new()];
    header.extend(rows.iter().map(|r| r.variant.clone()));

    let line = |label: String, f: &dyn Fn(&SummaryRow) -> String| {
        let mut out = vec![label];
        out.extend(rows.iter().map(|r| f(*r)));
        out
    };

    let mut table = vec![
        header,
        line(previous.display_name.clone(), &|r| {
            format_total(previous, r.totals[prev])
        }),
        line(stage.display_name.clone(), &|r| {
            format_total(stage, r.totals[idx])
        }),
        line(stage.rate_label(), &|r| format_rate(stage, r.rates[idx])),
    ];
    if summary.has_significance() {
        table.push(line(impact_col(&stage.display_name), &|r| {
            format_opt_perc(r.impact(idx))
        }));
        table.push(line(significance_col(&stage.display_name), &|r| {
            format_opt_perc(r.significance(idx))
        }));
    }

    table
}

fn device_info(cfg: &Config, devices: &[DeviceShare]) -> ReportInfo {
    ReportInfo {
        title: "Device split".to_string(),
        points: devices
            .iter()
            .map(|d| {
                format!(
                    "{}: {} ({})",
                    d.device,
                    format_perc(d.share),
                    format_int(d.total)
                )
            })
            .collect(),
        start: cfg.experiment.start_date.to_string(),
        end: cfg.experiment.end_date.to_string(),
    }
}

/// Builds the deck: title, report info, then one chart and data slide per
/// stage with a predecessor and per dimension segment.
pub fn slide_config(cfg: &Config, summary: &Summary, devices: &[DeviceShare]) -> SlideConfig {
    let mut content = vec![
        Slide::title(
            &format!("{} - {}", cfg.experiment.id, cfg.experiment.name),
            "Post-Test Data Report",
        ),
        Slide::report_info("Report Info", device_info(cfg, devices)),
        Slide::divider("Results"),
    ];

    let mut segments: Vec<&[String]> = vec![];
    for row in summary.rows() {
        if !segments.contains(&row.dimensions.as_slice()) {
            segments.push(row.dimensions.as_slice());
        }
    }

    let funnel = summary.funnel();
    for (idx, stage) in funnel.stages().iter().enumerate() {
        let Some(prev) = funnel.previous_idx(idx) else {
            continue;
        };
        for segment in &segments {
            let rows = summary
                .rows()
                .iter()
                .filter(|r| r.dimensions.as_slice() == *segment)
                .collect::<Vec<_>>();
            content.push(Slide::metric(
                &stage.display_name,
                &segment_name(segment),
                metric_table(summary, &rows, idx, prev),
                image_path(stage, segment),
            ));
        }
    }

    SlideConfig {
        id: cfg.experiment.id.clone(),
        name: "Data Report".to_string(),
        content,
    }
}
