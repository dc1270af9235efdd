use std::fs;
use std::path::PathBuf;

use analysis::device::device_report;
use analysis::summary::summarise;
use anyhow::Context;
use clap::Parser;
use common::config::Config;
use tracing::info;

use crate::error::Result;
use crate::init_table;
use crate::report::slide_config;
use crate::report::SlideConfig;
use crate::summary_options;

#[derive(Parser, Clone)]
pub struct Report {
    #[arg(long)]
    pub config: PathBuf,
    #[arg(long)]
    pub data: PathBuf,
    /// Where to write the slide configuration
    #[arg(long, default_value = "slide_config.json")]
    pub output: PathBuf,
    /// Column the device split is computed over
    #[arg(long, default_value = "impressions")]
    pub device_metric: String,
}

pub fn build(args: &Report, cfg: &Config) -> Result<SlideConfig> {
    let batch = init_table(&args.data, cfg)?;
    let summary = summarise(&batch, &cfg.funnel, &summary_options(cfg))?;
    let devices = device_report(
        &batch,
        &args.device_metric,
        &cfg.experiment.device_column,
        cfg.experiment.start_date,
        cfg.experiment.end_date,
    )?;

    Ok(slide_config(cfg, &summary, &devices))
}

pub fn run(args: &Report, cfg: &Config) -> Result<()> {
    let slides = build(args, cfg)?;
    let json = serde_json::to_string(&slides)?;
    fs::write(&args.output, json)
        .with_context(|| format!("can't write slide config to {:?}", args.output))?;
    info!(
        "{} slides written to {:?}",
        slides.content.len(),
        args.output
    );

    Ok(())
}
