use std::sync::Arc;

use analysis::bayes::Comparator;
use analysis::summary::summarise;
use analysis::summary::Options;
use analysis::test_util::parse_markdown_table;
use analysis::variant::derive_variants;
use arrow::array::Int64Array;
use arrow::array::StringArray;
use arrow::datatypes::DataType;
use arrow::datatypes::Field;
use arrow::datatypes::Schema;
use arrow::record_batch::RecordBatch;
use common::config::CountBasis;
use common::funnel::default_stages;
use common::funnel::Funnel;
use common::funnel::Stage;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing_test::traced_test;

fn funnel() -> Funnel {
    Funnel::try_new(vec![
        Stage::new(0, "impressions", "Impressions", None),
        Stage::new(1, "purchases", "Purchases", Some("impressions")),
    ])
    .unwrap()
}

fn batch(rows: &[(&str, &str, i64, i64)]) -> RecordBatch {
    let schema = Schema::new(vec![
        Field::new("optimisation_variant", DataType::Utf8, true),
        Field::new("device_category", DataType::Utf8, true),
        Field::new("impressions", DataType::Int64, true),
        Field::new("purchases", DataType::Int64, true),
    ]);

    RecordBatch::try_new(Arc::new(schema), vec![
        Arc::new(StringArray::from(
            rows.iter().map(|r| r.0).collect::<Vec<_>>(),
        )),
        Arc::new(StringArray::from(
            rows.iter().map(|r| r.1).collect::<Vec<_>>(),
        )),
        Arc::new(Int64Array::from(rows.iter().map(|r| r.2).collect::<Vec<_>>())),
        Arc::new(Int64Array::from(rows.iter().map(|r| r.3).collect::<Vec<_>>())),
    ])
    .unwrap()
}

#[test]
fn test_variant_beats_control() {
    let data = batch(&[
        ("Control", "mobile", 1000, 100),
        ("Variation 1", "mobile", 1000, 130),
    ]);

    let summary = summarise(&data, &funnel(), &Options::default()).unwrap();

    let variant = summary.row("Variation 1", &[]).unwrap();
    assert!((variant.impact(1).unwrap() - 30.0).abs() < 1e-9);
    assert!(variant.significance(1).unwrap() > 97.0);
    assert_eq!(variant.rates[1], Some(13.0));
    assert_eq!(variant.significance(0), None);

    let control = summary.row("Control", &[]).unwrap();
    assert_eq!(control.impact(1), Some(0.0));
    assert!((control.significance(1).unwrap() - 50.0).abs() < 0.1);

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
        "Purchases Significance",
        "Purchases Impact",
        "Purchases Rate",
    ]);
}

#[test]
fn test_row_order_does_not_matter() {
    let mut rows = vec![];
    for day in 0..20i64 {
        rows.push(("Control", "mobile", 500 + day, 40 + day % 7));
        rows.push(("Control", "desktop", 300 + day, 35 + day % 5));
        rows.push(("Variation 1", "mobile", 510 + day, 48 + day % 3));
        rows.push(("Variation 1", "desktop", 290 + day, 30 + day % 4));
    }
    let opts = Options {
        comparator: Comparator::new(2_000, CountBasis::Sum),
        ..Default::default()
    };
    let expected = summarise(&batch(&rows), &funnel(), &opts).unwrap();

    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..5 {
        rows.shuffle(&mut rng);
        let summary = summarise(&batch(&rows), &funnel(), &opts).unwrap();
        for variant in ["Control", "Variation 1"] {
            assert_eq!(
                summary.row(variant, &[]).unwrap(),
                expected.row(variant, &[]).unwrap()
            );
        }
    }
}

#[test]
fn test_device_dimension() {
    let data = batch(&[
        ("Control", "mobile", 600, 60),
        ("Control", "desktop", 400, 40),
        ("Variation 1", "mobile", 700, 90),
        ("Variation 1", "desktop", 300, 40),
        ("Control", "mobile", 100, 10),
    ]);
    let opts = Options {
        dimensions: vec!["device_category".to_string()],
        ..Default::default()
    };

    let overall = summarise(&data, &funnel(), &Options::default()).unwrap();
    let by_device = summarise(&data, &funnel(), &opts).unwrap();
    assert_eq!(by_device.rows().len(), overall.rows().len() * 2);

    for variant in by_device.variants() {
        let total = overall.row(variant, &[]).unwrap();
        for stage in 0..2 {
            let sum: f64 = ["mobile", "desktop"]
                .iter()
                .map(|device| by_device.row(variant, &[*device]).unwrap().totals[stage])
                .sum();
            assert_eq!(sum, total.totals[stage]);
        }
    }
    assert_eq!(
        by_device.row("Control", &["mobile"]).unwrap().totals,
        vec![700.0, 70.0]
    );

    let out = by_device.to_record_batch().unwrap();
    assert_eq!(out.schema().field(1).name(), "device_category");
    assert_eq!(out.num_rows(), 4);
}

#[test]
fn test_default_funnel() {
    let data = parse_markdown_table(
        r#"
| optimisation_variant | impressions(i64) | page_views(i64) | view_search_results(i64) | view_item_lists(i64) | view_items(i64) | add_to_carts(i64) | view_carts(i64) | select_fulfillment(i64) | select_payment(i64) | purchases(i64) | transaction_revenue(f64) |
|----------------------|------------------|-----------------|--------------------------|----------------------|-----------------|-------------------|-----------------|-------------------------|---------------------|----------------|--------------------------|
| Control              | 10000            | 9000            | 3000                     | 4000                 | 5000            | 1500              | 1200            | 900                     | 800                 | 700            | 35000.0                  |
| Variation 1          | 10000            | 9100            | 3100                     | 4100                 | 5200            | 1700              | 1300            | 1000                    | 900                     | 800            | 41600.0                  |
"#,
    )
    .unwrap();
    let funnel = Funnel::try_new(default_stages()).unwrap();

    let summary = summarise(&data, &funnel, &Options::default()).unwrap();
    let variant = summary.row("Variation 1", &[]).unwrap();
    assert_eq!(variant.rates[1], Some(91.0));
    assert_eq!(variant.rates[10], Some(52.0));
    for stage in 1..10 {
        assert!(variant.comparisons[stage].is_some(), "stage {stage}");
    }
    assert_eq!(variant.comparisons[10], None);

    let out = summary.to_record_batch().unwrap();
    // variant, 11 totals, 10 rates, 10 significance and 10 impact columns
    assert_eq!(out.num_columns(), 42);
    assert!(out.column_by_name("Avg. Transaction Value").is_some());
    assert!(out.column_by_name("Add to cart rate Impact").is_some());
}

#[traced_test]
#[test]
fn test_missing_control() {
    let data = batch(&[
        ("Variation 1", "mobile", 1000, 130),
        ("Variation 2", "mobile", 1000, 90),
    ]);

    let summary = summarise(&data, &funnel(), &Options::default()).unwrap();
    for row in summary.rows() {
        assert_eq!(row.significance(1), Some(0.0));
        assert_eq!(row.impact(1), Some(0.0));
    }
    assert!(logs_contain(
        "no control data, goal: purchases, impressions: impressions"
    ));
}

#[test]
fn test_derived_variants() {
    let data = parse_markdown_table(
        r#"
| optimisation_variant          | impressions(i64) | purchases(i64) |
|-------------------------------|------------------|----------------|
| PAH012 - Control (mobile)     | 500              | 50             |
| PAH012 - Control (desktop)    | 500              | 50             |
| PAH012 - Variation 1 (mobile) | 1000             | 120            |
"#,
    )
    .unwrap();

    let data = derive_variants(&data, "optimisation_variant").unwrap();
    let summary = summarise(&data, &funnel(), &Options::default()).unwrap();
    assert_eq!(summary.variants(), vec!["Control", "Variation 1"]);
    assert_eq!(summary.row("Control", &[]).unwrap().totals, vec![1000.0, 100.0]);
}
