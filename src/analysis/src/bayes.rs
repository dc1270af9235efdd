//! Bayesian comparison of two conversion rates.
//!
//! Each side's rate is modelled with the conjugate posterior
//! `Beta(conversions + 1, impressions - conversions + 1)` and the
//! probability that the variant beats the control is
//!
//! ```text
//! P(X_variant > X_control) = ∫ f_control(x) * (1 - F_variant(x)) dx
//! ```
//!
//! evaluated as a midpoint Riemann sum over the control's effective support.

use std::f64::consts::PI;

use common::config::CountBasis;
use common::DEFAULT_PRECISION;
use serde::Serialize;
use tracing::warn;

use crate::error::AnalysisError;
use crate::error::Result;

// Probability mass cut from each tail of the control posterior before integrating.
const SUPPORT_TAIL: f64 = 1e-10;
const QUANTILE_ITERATIONS: usize = 64;

/// Shape parameters of a Beta distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Posterior {
    pub alpha: f64,
    pub beta: f64,
}

impl Posterior {
    pub fn new(alpha: f64, beta: f64) -> Self {
        Self { alpha, beta }
    }

    /// Laplace-smoothed posterior of a conversion rate. Returns `None` when the
    /// counts can't describe a rate (negative, non-finite or more conversions
    /// than impressions).
    pub fn from_counts(impressions: f64, conversions: f64) -> Option<Self> {
        if !impressions.is_finite() || !conversions.is_finite() {
            return None;
        }
        if conversions < 0.0 || conversions > impressions {
            return None;
        }

        Some(Self::new(conversions + 1.0, impressions - conversions + 1.0))
    }

    pub fn mean(&self) -> f64 {
        self.alpha / (self.alpha + self.beta)
    }

    pub fn pdf(&self, x: f64) -> f64 {
        density(x, self.alpha, self.beta, ln_beta(self.alpha, self.beta))
    }

    pub fn cdf(&self, x: f64) -> f64 {
        regularized_ibeta(x, self.alpha, self.beta)
    }

    /// Survival function `1 - cdf(x)`, evaluated through the mirrored
    /// distribution to keep precision in the upper tail.
    pub fn sf(&self, x: f64) -> f64 {
        regularized_ibeta(1.0 - x, self.beta, self.alpha)
    }

    pub fn quantile(&self, p: f64) -> f64 {
        if p <= 0.0 {
            return 0.0;
        }
        if p >= 1.0 {
            return 1.0;
        }

        let mut lo = 0.0_f64;
        let mut hi = 1.0_f64;
        for _ in 0..QUANTILE_ITERATIONS {
            let mid = (lo + hi) / 2.0;
            if self.cdf(mid) < p {
                lo = mid;
            } else {
                hi = mid;
            }
        }

        (lo + hi) / 2.0
    }

    /// Interval holding all but `2 * SUPPORT_TAIL` of the probability mass.
    fn support(&self) -> (f64, f64) {
        (
            self.quantile(SUPPORT_TAIL),
            self.quantile(1.0 - SUPPORT_TAIL),
        )
    }
}

/// Probability that a draw from `variant` exceeds a draw from `control`.
///
/// The control's support is split into `intervals` equal slices; each slice
/// contributes the control density times the variant survival function at its
/// midpoint, scaled by the slice width. More intervals means a closer
/// approximation at a linear cost.
pub fn probability_of_superiority(
    variant: &Posterior,
    control: &Posterior,
    intervals: usize,
) -> f64 {
    let intervals = intervals.max(1);
    let (lo, hi) = control.support();
    let width = (hi - lo) / intervals as f64;
    let ln_norm = ln_beta(control.alpha, control.beta);

    let mut total = 0.0;
    for i in 0..intervals {
        let x = lo + (i as f64 + 0.5) * width;
        total += density(x, control.alpha, control.beta, ln_norm) * variant.sf(x);
    }

    (total * width).clamp(0.0, 1.0)
}

/// Closed form of [probability_of_superiority], defined when the variant's
/// alpha is a positive integer.
pub fn probability_of_superiority_exact(variant: &Posterior, control: &Posterior) -> Option<f64> {
    if variant.alpha < 1.0 || variant.alpha.fract() != 0.0 {
        return None;
    }

    let ln_control = ln_beta(control.alpha, control.beta);
    let total: f64 = (0..variant.alpha as usize)
        .map(|i| {
            let i = i as f64;
            (ln_beta(control.alpha + i, control.beta + variant.beta)
                - (variant.beta + i).ln()
                - ln_beta(1.0 + i, variant.beta)
                - ln_control)
                .exp()
        })
        .sum();

    Some(total.clamp(0.0, 1.0))
}

/// Relative change of `variant_rate` over `control_rate`. Equal rates or a zero
/// rate on either side give 0.
#[allow(clippy::float_cmp)]
pub fn lift(control_rate: f64, variant_rate: f64) -> f64 {
    if control_rate == variant_rate || control_rate == 0.0 || variant_rate == 0.0 {
        return 0.0;
    }

    (variant_rate - control_rate) / control_rate
}

/// Observed totals of one side of a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Counts {
    pub rows: usize,
    pub impressions: f64,
    pub conversions: f64,
}

impl Counts {
    pub fn new(rows: usize, impressions: f64, conversions: f64) -> Self {
        Self {
            rows,
            impressions,
            conversions,
        }
    }

    #[allow(clippy::float_cmp)]
    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.impressions == 0.0 || self.conversions == 0.0
    }

    fn with_basis(&self, basis: CountBasis) -> (f64, f64) {
        match basis {
            CountBasis::Sum => (self.impressions, self.conversions),
            CountBasis::Mean => (
                self.impressions / self.rows as f64,
                self.conversions / self.rows as f64,
            ),
        }
    }
}

/// Column names a comparison is computed for, used in diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct Metric<'a> {
    pub goal: &'a str,
    pub impressions: &'a str,
}

/// Result of comparing a variant against the control, both as fractions.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Comparison {
    pub lift: f64,
    pub probability_best: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Comparator {
    precision: usize,
    basis: CountBasis,
}

impl Default for Comparator {
    fn default() -> Self {
        Self::new(DEFAULT_PRECISION, CountBasis::default())
    }
}

impl Comparator {
    pub fn new(precision: usize, basis: CountBasis) -> Self {
        Self {
            precision: precision.max(1),
            basis,
        }
    }

    /// Compares `variant` against `control`. An empty side is not an error:
    /// it yields a zero comparison and a warning naming the side and metric.
    pub fn compare(
        &self,
        metric: Metric,
        control: &Counts,
        variant: &Counts,
    ) -> Result<Comparison> {
        if control.is_empty() {
            warn!(
                "no control data, goal: {}, impressions: {}",
                metric.goal, metric.impressions
            );
            return Ok(Comparison::default());
        }
        if variant.is_empty() {
            warn!(
                "no variant data, goal: {}, impressions: {}",
                metric.goal, metric.impressions
            );
            return Ok(Comparison::default());
        }

        let (control_impressions, control_conversions) = control.with_basis(self.basis);
        let (variant_impressions, variant_conversions) = variant.with_basis(self.basis);
        let control_posterior = posterior(metric, control_impressions, control_conversions)?;
        let variant_posterior = posterior(metric, variant_impressions, variant_conversions)?;

        Ok(Comparison {
            lift: lift(
                control_conversions / control_impressions,
                variant_conversions / variant_impressions,
            ),
            probability_best: probability_of_superiority(
                &variant_posterior,
                &control_posterior,
                self.precision,
            ),
        })
    }
}

fn posterior(metric: Metric, impressions: f64, conversions: f64) -> Result<Posterior> {
    Posterior::from_counts(impressions, conversions).ok_or_else(|| {
        AnalysisError::InvalidCounts {
            metric: metric.goal.to_string(),
            impressions,
            conversions,
        }
    })
}

fn density(x: f64, alpha: f64, beta: f64, ln_norm: f64) -> f64 {
    if x <= 0.0 || x >= 1.0 {
        return 0.0;
    }

    ((alpha - 1.0) * x.ln() + (beta - 1.0) * (-x).ln_1p() - ln_norm).exp()
}

// Lanczos approximation, g = 7, n = 9
#[allow(clippy::excessive_precision)]
fn ln_gamma(x: f64) -> f64 {
    const COEFFS: [f64; 9] = [
        0.999_999_999_999_809_93,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_13,
        -176.615_029_162_140_59,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_571_6e-6,
        1.505_632_735_149_311_6e-7,
    ];

    if x < 0.5 {
        return PI.ln() - (PI * x).sin().abs().ln() - ln_gamma(1.0 - x);
    }

    let x = x - 1.0;
    let series = COEFFS[1..]
        .iter()
        .enumerate()
        .fold(COEFFS[0], |acc, (i, c)| acc + c / (x + i as f64 + 1.0));
    let t = x + 7.5;

    0.5 * (2.0 * PI).ln() + (x + 0.5) * t.ln() - t + series.ln()
}

fn ln_beta(a: f64, b: f64) -> f64 {
    ln_gamma(a) + ln_gamma(b) - ln_gamma(a + b)
}

/// Regularized incomplete beta `I_x(a, b)`, continued fraction evaluated with
/// the modified Lentz method.
fn regularized_ibeta(x: f64, a: f64, b: f64) -> f64 {
    const EPS: f64 = 1e-15;
    const TINY: f64 = 1e-300;
    const MAX_ITERATIONS: usize = 10_000;

    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    // the fraction converges fast only below the mean
    if x > (a + 1.0) / (a + b + 2.0) {
        return 1.0 - regularized_ibeta(1.0 - x, b, a);
    }

    let front = (a * x.ln() + b * (-x).ln_1p() - ln_beta(a, b)).exp() / a;

    let clamp = |v: f64| if v.abs() < TINY { TINY } else { v };
    let mut c = 1.0;
    let mut d = 1.0 / clamp(1.0 - (a + b) * x / (a + 1.0));
    let mut h = d;

    for m in 1..=MAX_ITERATIONS {
        let m = m as f64;

        let even = m * (b - m) * x / ((a + 2.0 * m - 1.0) * (a + 2.0 * m));
        d = 1.0 / clamp(1.0 + even * d);
        c = clamp(1.0 + even / c);
        h *= d * c;

        let odd = -(a + m) * (a + b + m) * x / ((a + 2.0 * m) * (a + 2.0 * m + 1.0));
        d = 1.0 / clamp(1.0 + odd * d);
        c = clamp(1.0 + odd / c);
        let delta = d * c;
        h *= delta;

        if (delta - 1.0).abs() < EPS {
            break;
        }
    }

    front * h
}
