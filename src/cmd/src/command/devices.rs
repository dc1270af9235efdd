use std::path::PathBuf;

use analysis::device::device_report;
use analysis::device::DeviceShare;
use clap::Parser;
use common::config::Config;

use crate::error::Result;
use crate::init_table;

#[derive(Parser, Clone)]
pub struct Devices {
    #[arg(long)]
    pub config: PathBuf,
    #[arg(long)]
    pub data: PathBuf,
    /// Column the device split is computed over
    #[arg(long, default_value = "impressions")]
    pub metric: String,
}

pub fn devices(args: &Devices, cfg: &Config) -> Result<Vec<DeviceShare>> {
    let batch = init_table(&args.data, cfg)?;

    Ok(device_report(
        &batch,
        &args.metric,
        &cfg.experiment.device_column,
        cfg.experiment.start_date,
        cfg.experiment.end_date,
    )?)
}

pub fn run(args: &Devices, cfg: &Config) -> Result<()> {
    let report = devices(args, cfg)?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
