use std::path::PathBuf;

use analysis::summary::summarise;
use analysis::table::pretty;
use analysis::table::write_csv;
use clap::Parser;
use common::config::Config;
use tracing::info;

use crate::error::Result;
use crate::init_table;
use crate::summary_options;

#[derive(Parser, Clone)]
pub struct Summary {
    #[arg(long)]
    pub config: PathBuf,
    /// Experiment table in csv format
    #[arg(long)]
    pub data: PathBuf,
    /// Write the summary table to this csv file
    #[arg(long)]
    pub output: Option<PathBuf>,
}

pub fn run(args: &Summary, cfg: &Config) -> Result<()> {
    let batch = init_table(&args.data, cfg)?;
    let summary = summarise(&batch, &cfg.funnel, &summary_options(cfg))?;
    let out = summary.to_record_batch()?;

    println!("{}", pretty(&out)?);
    if let Some(path) = &args.output {
        write_csv(path, &out)?;
        info!("summary written to {path:?}");
    }

    Ok(())
}
