pub const COLUMN_VARIANT: &str = "optimisation_variant";
pub const COLUMN_DEVICE: &str = "device_category";
pub const CONTROL_COLUMN_PREFIX: &str = "control_";
pub const CONTROL_VARIANT: &str = "Control";

pub const SIGNIFICANCE_SUFFIX: &str = "Significance";
pub const IMPACT_SUFFIX: &str = "Impact";
pub const RATE_SUFFIX: &str = "Rate";

// Riemann intervals for the probability-of-superiority integral
pub const DEFAULT_PRECISION: usize = 10_000;

pub fn control_col(stage: &str) -> String {
    format!("{CONTROL_COLUMN_PREFIX}{stage}")
}

pub fn significance_col(display_name: &str) -> String {
    format!("{display_name} {SIGNIFICANCE_SUFFIX}")
}

pub fn impact_col(display_name: &str) -> String {
    format!("{display_name} {IMPACT_SUFFIX}")
}
