use clap::Parser;
use clap::Subcommand;
use cmd::command::compare;
use cmd::command::compare::Compare;
use cmd::command::devices;
use cmd::command::devices::Devices;
use cmd::command::report;
use cmd::command::report::Report;
use cmd::command::summary;
use cmd::command::summary::Summary;
use cmd::config;
use cmd::config::LogLevel;
use cmd::error::Error;
use cmd::error::Result;
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::FmtSubscriber;

#[derive(Subcommand, Clone)]
enum Commands {
    /// Aggregate the experiment funnel and print the summary table
    Summary(Summary),
    /// Compare a variant against the control from raw counts
    Compare(Compare),
    /// Print the device split of the experiment
    Devices(Devices),
    /// Write the slide deck configuration
    Report(Report),
}

#[derive(Parser)]
#[command(propagate_version = true)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Overrides the level from the config file
    #[arg(long, global = true, value_enum)]
    log_level: Option<LogLevel>,
    #[command(subcommand)]
    command: Option<Commands>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    let Some(command) = &args.command else {
        return Err(Error::BadRequest("no command specified".to_string()));
    };

    let cfg = match command {
        Commands::Summary(args) => Some(config::load(&args.config)?),
        Commands::Devices(args) => Some(config::load(&args.config)?),
        Commands::Report(args) => Some(config::load(&args.config)?),
        Commands::Compare(_) => None,
    };

    let level = match (args.log_level, &cfg) {
        (Some(level), _) => level.into(),
        (None, Some(cfg)) => cfg.log.level,
        (None, None) => LevelFilter::INFO,
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).map_err(Error::SetGlobalDefaultError)?;

    let version = env!("CARGO_PKG_VERSION");
    let hash = option_env!("BUILD_HASH").unwrap_or("dev-build");

    info!("abtest v{version}-{hash}");

    match (command, cfg) {
        (Commands::Compare(args), _) => compare::run(args)?,
        (Commands::Summary(args), Some(cfg)) => summary::run(args, &cfg)?,
        (Commands::Devices(args), Some(cfg)) => devices::run(args, &cfg)?,
        (Commands::Report(args), Some(cfg)) => report::run(args, &cfg)?,
        _ => return Err(Error::BadRequest("config is required".to_string())),
    };

    Ok(())
}
