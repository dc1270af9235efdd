use analysis::bayes::Comparator;
use analysis::bayes::Comparison;
use analysis::bayes::Counts;
use analysis::bayes::Metric;
use clap::Parser;
use common::config::CountBasis;
use common::DEFAULT_PRECISION;

use crate::error::Result;
use crate::report::format_perc;

#[derive(Parser, Clone)]
pub struct Compare {
    #[arg(long)]
    pub control_impressions: f64,
    #[arg(long)]
    pub control_conversions: f64,
    #[arg(long)]
    pub variant_impressions: f64,
    #[arg(long)]
    pub variant_conversions: f64,
    /// Number of intervals the integral is split into
    #[arg(long, default_value_t = DEFAULT_PRECISION)]
    pub precision: usize,
}

pub fn compare(args: &Compare) -> Result<Comparison> {
    let comparator = Comparator::new(args.precision, CountBasis::Sum);
    let metric = Metric {
        goal: "conversions",
        impressions: "impressions",
    };

    Ok(comparator.compare(
        metric,
        &Counts::new(1, args.control_impressions, args.control_conversions),
        &Counts::new(1, args.variant_impressions, args.variant_conversions),
    )?)
}

pub fn run(args: &Compare) -> Result<()> {
    let comparison = compare(args)?;
    println!("Impact: {}", format_perc(comparison.lift * 100.0));
    println!(
        "Significance: {}",
        format_perc(comparison.probability_best * 100.0)
    );

    Ok(())
}
