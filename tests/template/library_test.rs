//! The built-in library against a small Superstore fixture.

#[path = "../common/mod.rs"]
mod common;

use common::{date, engine_over, lookup, number_column, text_column, Fixture};
use dashq::filter::FilterSelection;
use dashq::template::library::{standard_templates, BASE_TABLE};
use dashq::template::SemanticType;
use dashq::Cell;

#[test]
fn test_library_registers_cleanly() {
    let registry = common::standard_registry();
    assert_eq!(registry.len(), standard_templates().len());
    for name in [
        "kpi_summary",
        "segment_dist",
        "category_dist",
        "region_perf",
        "shipmode_perf",
        "state_top5",
        "monthly_trend",
        "mom_revenue",
        "top_products_by_revenue",
        "discount_vs_profit",
        "customer_lifetime",
    ] {
        assert!(registry.contains(name), "missing {}", name);
    }
    for registered in registry.iter() {
        assert_eq!(registered.template().base_alias, BASE_TABLE);
    }
}

#[test]
fn test_every_template_executes_with_declared_types() {
    let fixture = Fixture::new();
    let engine = engine_over(fixture.store());
    let filters = [
        FilterSelection::all(),
        FilterSelection::builder()
            .date_range(date(2015, 3, 1), date(2016, 3, 31))
            .regions(["West", "South"])
            .build()
            .unwrap(),
    ];

    for registered in engine.registry().iter() {
        for filter in &filters {
            let result = engine
                .get_or_compute(registered.name(), filter)
                .unwrap_or_else(|e| panic!("{}: {}", registered.name(), e));
            assert_eq!(result.columns, registered.template().result_columns);
            for row in &result.rows {
                assert_eq!(row.len(), result.columns.len());
                for (cell, column) in row.iter().zip(&result.columns) {
                    if let Some(ty) = cell.semantic_type() {
                        assert_eq!(ty, column.semantic_type, "{}.{}", registered.name(), column.name);
                    }
                }
            }
        }
    }
}

#[test]
fn test_kpi_summary_matches_raw_totals() {
    let fixture = Fixture::new();
    let engine = engine_over(fixture.store());

    let result = engine
        .get_or_compute("kpi_summary", &FilterSelection::all())
        .unwrap();
    let total_sales = fixture.scalar("SELECT SUM(sales) FROM sales");
    assert!((number_column(&result, "total_sales")[0] - total_sales).abs() < 1e-6);
    assert_eq!(result.rows[0][2], Cell::Integer(common::ROWS as i64));
}

#[test]
fn test_state_top5_honours_limit_slot() {
    let fixture = Fixture::new();
    let engine = engine_over(fixture.store());

    let result = engine
        .get_or_compute("state_top5", &FilterSelection::all())
        .unwrap();
    assert_eq!(result.len(), 5);
    let sales = number_column(&result, "sales");
    assert!(sales.windows(2).all(|w| w[0] >= w[1]));
}

#[test]
fn test_monthly_trend_is_keyed_by_month_start() {
    let fixture = Fixture::new();
    let engine = engine_over(fixture.store());

    let result = engine
        .get_or_compute(
            "monthly_trend",
            &FilterSelection::builder()
                .date_range(date(2015, 1, 1), date(2015, 3, 31))
                .build()
                .unwrap(),
        )
        .unwrap();
    let months: Vec<&Cell> = result.column_values("ym").unwrap();
    assert_eq!(
        months,
        vec![
            &Cell::Date(date(2015, 1, 1)),
            &Cell::Date(date(2015, 2, 1)),
            &Cell::Date(date(2015, 3, 1)),
        ]
    );
}

#[test]
fn test_mom_revenue_first_month_has_no_change() {
    let fixture = Fixture::new();
    let engine = engine_over(fixture.store());

    let result = engine
        .get_or_compute("mom_revenue", &FilterSelection::all())
        .unwrap();
    assert!(result.len() > 1);
    assert!(result.rows[0][2].is_null());
    assert!(result.rows[1][2].as_f64().is_some());
}

#[test]
fn test_segment_dist_shares_sum_to_one_hundred() {
    let fixture = Fixture::new();
    let engine = engine_over(fixture.store());

    let result = engine
        .get_or_compute("segment_dist", &FilterSelection::all())
        .unwrap();
    let orders: f64 = number_column(&result, "pct_orders").iter().sum();
    assert!((orders - 100.0).abs() < 0.05, "{}", orders);
    assert_eq!(
        text_column(&result, "segment").len(),
        common::SEGMENTS.len()
    );
}

#[test]
fn test_customer_lifetime_dates() {
    let fixture = Fixture::new();
    let engine = engine_over(fixture.store());

    let result = engine
        .get_or_compute("customer_lifetime", &FilterSelection::all())
        .unwrap();
    let first = result.column_index("first_order_date").unwrap();
    let last = result.column_index("last_order_date").unwrap();
    let tenure = result.column_index("tenure_days").unwrap();
    for row in &result.rows {
        let (Cell::Date(a), Cell::Date(b), Cell::Integer(days)) = (&row[first], &row[last], &row[tenure])
        else {
            panic!("unexpected cells: {:?}", row);
        };
        assert_eq!((*b - *a).num_days(), *days);
    }
}

#[test]
fn test_region_perf_margin_is_profit_over_sales() {
    let fixture = Fixture::new();
    let engine = engine_over(fixture.store());

    let result = engine
        .get_or_compute("region_perf", &FilterSelection::all())
        .unwrap();
    let sales = lookup(&result, "region", "West", "sales").unwrap();
    let profit = lookup(&result, "region", "West", "profit").unwrap();
    let margin = lookup(&result, "region", "West", "margin_pct").unwrap();
    assert!((100.0 * profit / sales - margin).abs() < 0.05);
    assert_eq!(
        result.columns[4].semantic_type,
        SemanticType::Percentage
    );
}
