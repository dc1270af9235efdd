use std::path::Path;

use chrono::NaiveDate;
use clap::ValueEnum;
use common::config::CountBasis;
use common::error::CommonError;
use common::funnel::default_stages;
use common::funnel::Funnel;
use common::types::COLUMN_DEVICE;
use common::types::COLUMN_VARIANT;
use common::types::CONTROL_VARIANT;
use common::DEFAULT_PRECISION;
use serde_derive::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing::Level;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Deserialize, PartialEq, Eq)]
pub struct Log {
    pub level: LogLevel,
}

fn default_control() -> String {
    CONTROL_VARIANT.to_string()
}

fn default_variant_column() -> String {
    COLUMN_VARIANT.to_string()
}

fn default_device_column() -> String {
    COLUMN_DEVICE.to_string()
}

fn default_precision() -> usize {
    DEFAULT_PRECISION
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
pub struct Experiment {
    pub id: String,
    pub name: String,
    pub start_date: String,
    pub end_date: String,
    #[serde(default = "default_control")]
    pub control: String,
    #[serde(default = "default_variant_column")]
    pub variant_column: String,
    #[serde(default = "default_device_column")]
    pub device_column: String,
    #[serde(default)]
    pub dimensions: Vec<String>,
    #[serde(default)]
    pub derive_variant: bool,
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
pub struct Significance {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_precision")]
    pub precision: usize,
    #[serde(default)]
    pub basis: CountBasis,
}

impl Default for Significance {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            precision: default_precision(),
            basis: CountBasis::default(),
        }
    }
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
pub struct Stage {
    pub order: usize,
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub previous: Option<String>,
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub log: Log,
    pub experiment: Experiment,
    #[serde(default)]
    pub significance: Significance,
    #[serde(default)]
    pub stages: Vec<Stage>,
}

/// Reads a toml config file into the validated runtime config.
pub fn load(path: &Path) -> crate::error::Result<common::config::Config> {
    let config = ::config::Config::builder()
        .add_source(::config::File::from(path))
        .build()?;
    let cfg: Config = config.try_deserialize()?;

    cfg.try_into()
}

fn parse_date(s: &str) -> crate::error::Result<NaiveDate> {
    Ok(NaiveDate::parse_from_str(s, DATE_FORMAT)?)
}

impl TryInto<common::config::Config> for Config {
    type Error = crate::error::Error;

    fn try_into(self) -> Result<common::config::Config, Self::Error> {
        let start_date = parse_date(&self.experiment.start_date)?;
        let end_date = parse_date(&self.experiment.end_date)?;
        if start_date > end_date {
            return Err(CommonError::BadConfig(format!(
                "start date {start_date} is after end date {end_date}"
            ))
            .into());
        }
        if self.significance.precision == 0 {
            return Err(CommonError::BadConfig("precision must be at least 1".to_string()).into());
        }

        let stages = if self.stages.is_empty() {
            default_stages()
        } else {
            self.stages
                .iter()
                .map(|s| {
                    common::funnel::Stage::new(
                        s.order,
                        &s.name,
                        &s.display_name,
                        s.previous.as_deref(),
                    )
                })
                .collect()
        };

        Ok(common::config::Config {
            log: common::config::Log {
                level: self.log.level.into(),
            },
            experiment: common::config::Experiment {
                id: self.experiment.id,
                name: self.experiment.name,
                start_date,
                end_date,
                control: self.experiment.control,
                variant_column: self.experiment.variant_column,
                device_column: self.experiment.device_column,
                dimensions: self.experiment.dimensions,
                derive_variant: self.experiment.derive_variant,
            },
            significance: common::config::Significance {
                enabled: self.significance.enabled,
                precision: self.significance.precision,
                basis: self.significance.basis,
            },
            funnel: Funnel::try_new(stages)?,
        })
    }
}

#[derive(Deserialize, Copy, Debug, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum LogLevel {
    #[serde(rename = "trace")]
    Trace,
    #[serde(rename = "debug")]
    Debug,
    #[serde(rename = "info")]
    Info,
    #[serde(rename = "warn")]
    Warn,
    #[serde(rename = "error")]
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
        .into()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::Builder;

    use super::*;
    use crate::error::Error;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_defaults() {
        let file = write_config(
            r#"
[log]
level = "debug"

[experiment]
id = "PAH012"
name = "Checkout redesign"
start_date = "2023-04-24"
end_date = "2023-05-21"
"#,
        );

        let cfg = load(file.path()).unwrap();
        assert_eq!(cfg.log.level, LevelFilter::DEBUG);
        assert_eq!(cfg.experiment.control, "Control");
        assert_eq!(cfg.experiment.variant_column, "optimisation_variant");
        assert!(cfg.experiment.dimensions.is_empty());
        assert!(cfg.significance.enabled);
        assert_eq!(cfg.significance.precision, DEFAULT_PRECISION);
        assert_eq!(cfg.significance.basis, CountBasis::Mean);
        assert_eq!(cfg.funnel.len(), 11);
    }

    #[test]
    fn test_load_stages() {
        let file = write_config(
            r#"
[log]
level = "warn"

[experiment]
id = "PAH013"
name = "Basket"
start_date = "2023-04-24"
end_date = "2023-04-24"
dimensions = ["device_category"]
derive_variant = true

[significance]
precision = 500
basis = "sum"

[[stages]]
order = 1
name = "purchases"
display_name = "Purchases"
previous = "impressions"

[[stages]]
order = 0
name = "impressions"
display_name = "Impressions"
"#,
        );

        let cfg = load(file.path()).unwrap();
        assert_eq!(cfg.experiment.dimensions, vec!["device_category"]);
        assert!(cfg.experiment.derive_variant);
        assert_eq!(cfg.significance.precision, 500);
        assert_eq!(cfg.significance.basis, CountBasis::Sum);
        let names = cfg
            .funnel
            .stages()
            .iter()
            .map(|s| s.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["impressions", "purchases"]);
    }

    #[test]
    fn test_bad_config() {
        let file = write_config(
            r#"
[log]
level = "info"

[experiment]
id = "PAH012"
name = "Checkout redesign"
start_date = "2023-05-21"
end_date = "2023-04-24"
"#,
        );
        assert!(matches!(
            load(file.path()),
            Err(Error::Common(CommonError::BadConfig(_)))
        ));

        let file = write_config(
            r#"
[log]
level = "info"

[experiment]
id = "PAH012"
name = "Checkout redesign"
start_date = "24/04/2023"
end_date = "2023-04-24"
"#,
        );
        assert!(matches!(load(file.path()), Err(Error::Date(_))));

        let file = write_config(
            r#"
[log]
level = "info"

[experiment]
id = "PAH012"
name = "Checkout redesign"
start_date = "2023-04-24"
end_date = "2023-05-21"

[significance]
precision = 0
"#,
        );
        assert!(matches!(
            load(file.path()),
            Err(Error::Common(CommonError::BadConfig(_)))
        ));

        let file = write_config(
            r#"
[log]
level = "info"
"#,
        );
        assert!(matches!(load(file.path()), Err(Error::Config(_))));
    }
}
