use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use arrow::array::Array;
use arrow::array::ArrayRef;
use arrow::array::Float64Array;
use arrow::array::StringArray;
use arrow::datatypes::DataType;
use arrow::datatypes::Field;
use arrow::datatypes::Schema;
use arrow::record_batch::RecordBatch;
use common::funnel::Funnel;
use common::types::control_col;
use common::types::impact_col;
use common::types::significance_col;
use common::types::COLUMN_VARIANT;
use common::types::CONTROL_VARIANT;
use indexmap::IndexMap;
use tracing::debug;
use tracing::warn;

use crate::bayes::Comparator;
use crate::bayes::Comparison;
use crate::bayes::Counts;
use crate::bayes::Metric;
use crate::error::AnalysisError;
use crate::error::Result;
use crate::table::number_column;
use crate::table::string_column;
use crate::table::value_or_zero;

#[derive(Debug, Clone)]
pub struct Options {
    pub variant_column: String,
    pub dimensions: Vec<String>,
    pub control: String,
    pub significance: bool,
    pub comparator: Comparator,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            variant_column: COLUMN_VARIANT.to_string(),
            dimensions: vec![],
            control: CONTROL_VARIANT.to_string(),
            significance: true,
            comparator: Comparator::default(),
        }
    }
}

/// Derived value of a stage: a percentage of the predecessor, or for revenue
/// stages the average value per predecessor. `None` when the predecessor is 0.
#[allow(clippy::float_cmp)]
pub fn derived_rate(stage_sum: f64, predecessor_sum: f64, is_revenue: bool) -> Option<f64> {
    if predecessor_sum == 0.0 {
        return None;
    }

    let rate = stage_sum / predecessor_sum;
    if is_revenue {
        Some(rate)
    } else {
        Some(rate * 100.0)
    }
}

/// One variant and dimension combination. Per-stage vectors are indexed like
/// the funnel stages.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub variant: String,
    pub dimensions: Vec<String>,
    pub totals: Vec<f64>,
    pub control_totals: Vec<Option<f64>>,
    pub rates: Vec<Option<f64>>,
    pub comparisons: Vec<Option<Comparison>>,
}

impl SummaryRow {
    /// Probability of being best, in percent.
    pub fn significance(&self, stage: usize) -> Option<f64> {
        self.comparisons[stage].map(|c| c.probability_best * 100.0)
    }

    /// Relative lift over the control, in percent.
    pub fn impact(&self, stage: usize) -> Option<f64> {
        self.comparisons[stage].map(|c| c.lift * 100.0)
    }
}

#[derive(Debug, Clone)]
pub struct Summary {
    variant_column: String,
    dimensions: Vec<String>,
    funnel: Funnel,
    significance: bool,
    rows: Vec<SummaryRow>,
}

impl Summary {
    pub fn rows(&self) -> &[SummaryRow] {
        &self.rows
    }

    pub fn funnel(&self) -> &Funnel {
        &self.funnel
    }

    pub fn has_significance(&self) -> bool {
        self.significance
    }

    pub fn row(&self, variant: &str, dimensions: &[&str]) -> Option<&SummaryRow> {
        self.rows
            .iter()
            .find(|r| r.variant == variant && r.dimensions == dimensions)
    }

    /// Distinct variants in order of first appearance.
    pub fn variants(&self) -> Vec<&str> {
        let mut out: Vec<&str> = vec![];
        for row in &self.rows {
            if !out.contains(&row.variant.as_str()) {
                out.push(row.variant.as_str());
            }
        }

        out
    }

    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let mut fields = vec![Field::new(&self.variant_column, DataType::Utf8, false)];
        let mut columns: Vec<ArrayRef> = vec![Arc::new(StringArray::from(
            self.rows
                .iter()
                .map(|r| r.variant.as_str())
                .collect::<Vec<_>>(),
        ))];

        for (idx, dim) in self.dimensions.iter().enumerate() {
            fields.push(Field::new(dim, DataType::Utf8, false));
            columns.push(Arc::new(StringArray::from(
                self.rows
                    .iter()
                    .map(|r| r.dimensions[idx].as_str())
                    .collect::<Vec<_>>(),
            )));
        }

        let mut push_values = |name: String, nullable: bool, vals: Vec<Option<f64>>| {
            fields.push(Field::new(name, DataType::Float64, nullable));
            columns.push(Arc::new(Float64Array::from(vals)) as ArrayRef);
        };
        for (idx, stage) in self.funnel.stages().iter().enumerate() {
            push_values(
                stage.display_name.clone(),
                false,
                self.rows.iter().map(|r| Some(r.totals[idx])).collect(),
            );
            if self.funnel.previous_idx(idx).is_none() {
                continue;
            }
            if self.significance {
                push_values(
                    significance_col(&stage.display_name),
                    true,
                    self.rows.iter().map(|r| r.significance(idx)).collect(),
                );
                push_values(
                    impact_col(&stage.display_name),
                    true,
                    self.rows.iter().map(|r| r.impact(idx)).collect(),
                );
            }
            push_values(
                stage.rate_label(),
                true,
                self.rows.iter().map(|r| r.rates[idx]).collect(),
            );
        }

        Ok(RecordBatch::try_new(
            Arc::new(Schema::new(fields)),
            columns,
        )?)
    }
}

#[derive(Debug, Clone)]
struct Group {
    totals: Vec<f64>,
    control_totals: Vec<Option<f64>>,
}

/// Groups experiment rows by variant and `opts.dimensions`, sums every stage,
/// derives stage-over-stage rates and, if requested, compares each variant
/// against the control for every stage that has a predecessor.
pub fn summarise(batch: &RecordBatch, funnel: &Funnel, opts: &Options) -> Result<Summary> {
    let start = Instant::now();

    let variants = string_column(batch, &opts.variant_column)?;
    let dimensions = opts
        .dimensions
        .iter()
        .map(|dim| string_column(batch, dim))
        .collect::<Result<Vec<_>>>()?;
    let stages = funnel
        .stages()
        .iter()
        .map(|stage| number_column(batch, &stage.name))
        .collect::<Result<Vec<_>>>()?;
    let control_stages = funnel
        .stages()
        .iter()
        .map(|stage| match number_column(batch, &control_col(&stage.name)) {
            Ok(col) => Ok(Some(col)),
            Err(AnalysisError::MissingColumn(_)) => Ok(None),
            Err(err) => Err(err),
        })
        .collect::<Result<Vec<_>>>()?;

    let mut groups: IndexMap<(String, Vec<String>), Group> = IndexMap::new();
    let mut skipped = 0;
    for row in 0..batch.num_rows() {
        if variants.is_null(row) || dimensions.iter().any(|d| d.is_null(row)) {
            skipped += 1;
            continue;
        }
        let key = (
            variants.value(row).to_string(),
            dimensions
                .iter()
                .map(|d| d.value(row).to_string())
                .collect::<Vec<_>>(),
        );
        let group = groups.entry(key).or_insert_with(|| Group {
            totals: vec![0.0; stages.len()],
            control_totals: control_stages
                .iter()
                .map(|c| c.as_ref().map(|_| 0.0))
                .collect(),
        });
        for (idx, col) in stages.iter().enumerate() {
            group.totals[idx] += value_or_zero(col, row);
        }
        for (idx, col) in control_stages.iter().enumerate() {
            if let (Some(col), Some(total)) = (col, group.control_totals[idx].as_mut()) {
                *total += value_or_zero(col, row);
            }
        }
    }
    if skipped > 0 {
        debug!("skipped {skipped} rows with empty variant or dimension");
    }

    let mut rows = groups
        .into_iter()
        .map(|((variant, dimensions), group)| {
            let rates = funnel
                .stages()
                .iter()
                .enumerate()
                .map(|(idx, stage)| {
                    funnel.previous_idx(idx).and_then(|prev| {
                        derived_rate(group.totals[idx], group.totals[prev], stage.is_revenue())
                    })
                })
                .collect();

            SummaryRow {
                variant,
                dimensions,
                totals: group.totals,
                control_totals: group.control_totals,
                rates,
                comparisons: vec![None; funnel.len()],
            }
        })
        .collect::<Vec<_>>();

    if opts.significance {
        compare_variants(&mut rows, funnel, opts)?;
    }

    debug!("elapsed: {:?}", start.elapsed());

    Ok(Summary {
        variant_column: opts.variant_column.clone(),
        dimensions: opts.dimensions.clone(),
        funnel: funnel.clone(),
        significance: opts.significance,
        rows,
    })
}

// Totals of `stage` and its predecessor across all rows of `variant`
fn variant_counts(rows: &[SummaryRow], variant: &str, stage: usize, prev: usize) -> Counts {
    rows.iter()
        .filter(|r| r.variant == variant)
        .fold(Counts::default(), |acc, r| Counts {
            rows: acc.rows + 1,
            impressions: acc.impressions + r.totals[prev],
            conversions: acc.conversions + r.totals[stage],
        })
}

fn compare_variants(rows: &mut [SummaryRow], funnel: &Funnel, opts: &Options) -> Result<()> {
    let mut variants: Vec<String> = vec![];
    for row in rows.iter() {
        if !variants.contains(&row.variant) {
            variants.push(row.variant.clone());
        }
    }

    let mut comparisons: HashMap<(&str, usize), Option<Comparison>> = HashMap::new();
    for (idx, stage) in funnel.stages().iter().enumerate() {
        let (Some(prev), Some(previous)) = (funnel.previous_idx(idx), funnel.previous(idx)) else {
            continue;
        };
        let metric = Metric {
            goal: &stage.name,
            impressions: &previous.name,
        };
        let control = variant_counts(rows, &opts.control, idx, prev);
        for variant in &variants {
            let counts = variant_counts(rows, variant, idx, prev);
            let comparison = compare_stage(&opts.comparator, metric, &control, &counts)?;
            comparisons.insert((variant.as_str(), idx), comparison);
        }
    }

    for row in rows.iter_mut() {
        for (idx, comparison) in row.comparisons.iter_mut().enumerate() {
            *comparison = comparisons
                .get(&(row.variant.as_str(), idx))
                .copied()
                .flatten();
        }
    }

    Ok(())
}

// Counts that can't form a posterior (more conversions than impressions, as
// revenue stages usually have) leave the stage's cells empty so the rest of
// the report still renders.
fn compare_stage(
    comparator: &Comparator,
    metric: Metric,
    control: &Counts,
    variant: &Counts,
) -> Result<Option<Comparison>> {
    match comparator.compare(metric, control, variant) {
        Ok(comparison) => Ok(Some(comparison)),
        Err(AnalysisError::InvalidCounts {
            impressions,
            conversions,
            ..
        }) => {
            warn!(
                "significance is undefined for {}, impressions: {}: {conversions} conversions out of {impressions}",
                metric.goal, metric.impressions
            );
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use common::funnel::Stage;
    use tracing_test::traced_test;

    use super::*;
    use crate::test_util::parse_markdown_table;

    fn funnel() -> Funnel {
        Funnel::try_new(vec![
            Stage::new(0, "impressions", "Impressions", None),
            Stage::new(1, "purchases", "Purchases", Some("impressions")),
        ])
        .unwrap()
    }

    #[test]
    fn test_derived_rate() {
        assert_eq!(derived_rate(50.0, 200.0, false), Some(25.0));
        assert_eq!(derived_rate(500.0, 1000.0, true), Some(0.5));
        assert_eq!(derived_rate(5.0, 0.0, false), None);
    }

    #[test]
    fn test_summarise_without_significance() {
        let batch = parse_markdown_table(
            r#"
| optimisation_variant | impressions(i64) | purchases(i64) | control_impressions(i64) |
|----------------------|------------------|----------------|--------------------------|
| Control              | 600              | 60             | 600                      |
| Variation 1          | 500              | 60             | 400                      |
| Control              | 400              | 40             | 400                      |
|                      | 100              | 100            | 100                      |
"#,
        )
        .unwrap();
        let opts = Options {
            significance: false,
            ..Default::default()
        };

        let summary = summarise(&batch, &funnel(), &opts).unwrap();
        assert_eq!(summary.variants(), vec!["Control", "Variation 1"]);

        let control = summary.row("Control", &[]).unwrap();
        assert_eq!(control.totals, vec![1000.0, 100.0]);
        assert_eq!(control.control_totals, vec![Some(1000.0), None]);
        assert_eq!(control.rates, vec![None, Some(10.0)]);
        assert_eq!(control.comparisons, vec![None, None]);

        let variant = summary.row("Variation 1", &[]).unwrap();
        assert_eq!(variant.rates[1], Some(12.0));

        let out = summary.to_record_batch().unwrap();
        let names = out
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect::<Vec<_>>();
        assert_eq!(names, vec![
            "optimisation_variant",
            "Impressions",
            "Purchases",
            "Purchases Rate"
        ]);
    }

    #[test]
    fn test_missing_columns() {
        let batch = parse_markdown_table(
            r#"
| optimisation_variant | impressions(i64) |
|----------------------|------------------|
| Control              | 600              |
"#,
        )
        .unwrap();

        assert!(matches!(
            summarise(&batch, &funnel(), &Options::default()),
            Err(AnalysisError::MissingColumn(name)) if name == "purchases"
        ));

        let opts = Options {
            dimensions: vec!["device_category".to_string()],
            ..Default::default()
        };
        let stages = Funnel::try_new(vec![Stage::new(0, "impressions", "Impressions", None)])
            .unwrap();
        assert!(matches!(
            summarise(&batch, &stages, &opts),
            Err(AnalysisError::MissingColumn(name)) if name == "device_category"
        ));
    }

    #[test]
    fn test_revenue_significance_is_empty() {
        let batch = parse_markdown_table(
            r#"
| optimisation_variant | purchases(i64) | transaction_revenue(f64) |
|----------------------|----------------|--------------------------|
| Control              | 100            | 5000.0                   |
| Variation 1          | 120            | 6600.0                   |
"#,
        )
        .unwrap();
        let funnel = Funnel::try_new(vec![
            Stage::new(0, "purchases", "Purchases", None),
            Stage::new(1, "transaction_revenue", "Revenue", Some("purchases")),
        ])
        .unwrap();

        let summary = summarise(&batch, &funnel, &Options::default()).unwrap();
        let variant = summary.row("Variation 1", &[]).unwrap();
        assert_eq!(variant.rates[1], Some(55.0));
        assert_eq!(variant.comparisons[1], None);

        let out = summary.to_record_batch().unwrap();
        assert!(out.column_by_name("Avg. Transaction Value").is_some());
        assert_eq!(out.column_by_name("Revenue Significance").unwrap().null_count(), 2);
    }

    #[traced_test]
    #[test]
    fn test_invalid_counts_leave_stage_empty() {
        let batch = parse_markdown_table(
            r#"
| optimisation_variant | impressions(i64) | purchases(i64) |
|----------------------|------------------|----------------|
| Control              | 10               | 20             |
| Variation 1          | 10               | 5              |
"#,
        )
        .unwrap();

        let summary = summarise(&batch, &funnel(), &Options::default()).unwrap();
        for row in summary.rows() {
            assert_eq!(row.comparisons[1], None);
        }
        assert_eq!(summary.row("Control", &[]).unwrap().rates[1], Some(200.0));
        assert!(logs_contain(
            "significance is undefined for purchases, impressions: impressions"
        ));

        let out = summary.to_record_batch().unwrap();
        assert_eq!(out.column_by_name("Purchases Impact").unwrap().null_count(), 2);
    }

    #[test]
    fn test_null_dimension_is_skipped() {
        let batch = parse_markdown_table(
            r#"
| optimisation_variant | device_category | impressions(i64) | purchases(i64) |
|----------------------|-----------------|------------------|----------------|
| Control              | mobile          | 600              | 60             |
| Control              | desktop         | 400              | 40             |
| Variation 1          | mobile          | 700              | 90             |
| Variation 1          | desktop         | 300              | 40             |
| Control              |                 | 5000             | 500            |
| Variation 1          |                 | 5000             | 900            |
"#,
        )
        .unwrap();
        let opts = Options {
            dimensions: vec!["device_category".to_string()],
            ..Default::default()
        };

        let summary = summarise(&batch, &funnel(), &opts).unwrap();
        assert_eq!(summary.rows().len(), 4);
        let total = summary
            .rows()
            .iter()
            .map(|r| r.totals[0])
            .sum::<f64>();
        assert_eq!(total, 2000.0);
        assert_eq!(
            summary.row("Control", &["mobile"]).unwrap().totals,
            vec![600.0, 60.0]
        );
        assert_eq!(
            summary.row("Variation 1", &["desktop"]).unwrap().totals,
            vec![300.0, 40.0]
        );
    }
}
