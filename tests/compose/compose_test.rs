//! Composition tests: staging relation, parameter numbering, rejections.

use chrono::NaiveDate;
use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::Parser;

use dashq::compose::{ComposeError, Composer, STAGING_RELATION};
use dashq::engine::build_registry;
use dashq::config::Settings;
use dashq::filter::FilterSelection;
use dashq::sql::SqlValue;
use dashq::template::{QueryTemplate, RegisteredTemplate, SemanticType, TemplateRegistry};

fn registry() -> TemplateRegistry {
    build_registry(&Settings::default()).unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn parses(sql: &str) {
    Parser::parse_sql(&SQLiteDialect {}, sql)
        .unwrap_or_else(|e| panic!("composed statement does not parse: {}\n{}", e, sql));
}

fn raw(body: &str) -> RegisteredTemplate {
    RegisteredTemplate::parse(
        QueryTemplate::new("adhoc", "sales", body).column("n", SemanticType::Integer),
    )
    .unwrap()
}

#[test]
fn test_every_template_composes_unfiltered() {
    let registry = registry();
    let composer = Composer::default();
    for registered in registry.iter() {
        let q = composer
            .compose(registered, &FilterSelection::all())
            .unwrap_or_else(|e| panic!("{}: {}", registered.name(), e));
        assert!(
            q.statement_text.starts_with(r#"WITH filtered_base AS (SELECT * FROM "sales")"#),
            "{}: {}",
            registered.name(),
            q.statement_text
        );
        assert_eq!(q.parameters.len(), registered.template().slots.len());
        parses(&q.statement_text);
    }
}

#[test]
fn test_every_template_composes_fully_filtered() {
    let filter = FilterSelection::builder()
        .date_range(date(2015, 1, 1), date(2016, 6, 30))
        .segments(["Consumer", "Corporate"])
        .regions(["West"])
        .categories(["Technology", "Furniture"])
        .build()
        .unwrap();

    let registry = registry();
    let composer = Composer::default();
    for registered in registry.iter() {
        let q = composer.compose(registered, &filter).unwrap();
        assert_eq!(q.parameters.len(), 7 + registered.template().slots.len());
        assert!(q.statement_text.contains(" WHERE "));
        parses(&q.statement_text);
    }
}

#[test]
fn test_parameter_order_is_date_segment_region_category() {
    let filter = FilterSelection::builder()
        .category("Technology")
        .region("West")
        .region("East")
        .segment("Consumer")
        .date_range(date(2015, 1, 1), date(2015, 12, 31))
        .build()
        .unwrap();

    let registry = registry();
    let q = Composer::default()
        .compose(registry.lookup("region_perf").unwrap(), &filter)
        .unwrap();

    assert_eq!(
        q.parameters,
        vec![
            SqlValue::Date(date(2015, 1, 1)),
            SqlValue::Date(date(2015, 12, 31)),
            SqlValue::text("Consumer"),
            SqlValue::text("East"),
            SqlValue::text("West"),
            SqlValue::text("Technology"),
        ]
    );
    assert!(q.statement_text.contains(
        r#"WHERE date("order_date") BETWEEN ?1 AND ?2 AND "segment" IN (?3) AND "region" IN (?4, ?5) AND "category" IN (?6)"#
    ));
}

#[test]
fn test_slots_follow_filter_parameters() {
    let registry = registry();
    let state_top5 = registry.lookup("state_top5").unwrap();

    let unfiltered = Composer::default()
        .compose(state_top5, &FilterSelection::all())
        .unwrap();
    assert!(unfiltered.statement_text.ends_with("LIMIT ?1"));
    assert_eq!(unfiltered.parameters, vec![SqlValue::Integer(5)]);

    let filter = FilterSelection::builder()
        .regions(["West", "East"])
        .build()
        .unwrap();
    let filtered = Composer::default().compose(state_top5, &filter).unwrap();
    assert!(filtered.statement_text.ends_with("LIMIT ?3"));
    assert_eq!(filtered.parameters[2], SqlValue::Integer(5));
}

#[test]
fn test_percent_denominator_is_redirected() {
    let registry = registry();
    let q = Composer::default()
        .compose(
            registry.lookup("region_perf").unwrap(),
            &FilterSelection::all(),
        )
        .unwrap();
    assert!(q
        .statement_text
        .contains("(SELECT SUM(sales) FROM filtered_base AS sales)"));
    // Only the staging CTE names the real table.
    assert_eq!(q.statement_text.matches(r#""sales""#).count(), 1);
}

#[test]
fn test_template_ctes_follow_staging() {
    let registry = registry();
    let q = Composer::default()
        .compose(
            registry.lookup("mom_revenue").unwrap(),
            &FilterSelection::all(),
        )
        .unwrap();
    let staging = q.statement_text.find(STAGING_RELATION).unwrap();
    let m = q.statement_text.find(", m AS (").unwrap();
    assert!(staging < m);
    assert_eq!(q.statement_text.matches("WITH").count(), 1);
}

#[test]
fn test_open_ended_date_ranges() {
    let registry = registry();
    let row_count = registry.lookup("row_count").unwrap();

    let from = FilterSelection::builder()
        .date_from(date(2016, 1, 1))
        .build()
        .unwrap();
    let q = Composer::default().compose(row_count, &from).unwrap();
    assert!(q.statement_text.contains(r#"date("order_date") >= ?1"#));

    let to = FilterSelection::builder()
        .date_to(date(2016, 1, 1))
        .build()
        .unwrap();
    let q = Composer::default().compose(row_count, &to).unwrap();
    assert!(q.statement_text.contains(r#"date("order_date") <= ?1"#));
}

#[test]
fn test_composition_is_deterministic() {
    let registry = registry();
    let template = registry.lookup("segment_dist").unwrap();
    let a = FilterSelection::builder()
        .regions(["South", "West", "East"])
        .build()
        .unwrap();
    let b = FilterSelection::builder()
        .regions(["East", "South", "West"])
        .build()
        .unwrap();

    let qa = Composer::default().compose(template, &a).unwrap();
    let qb = Composer::default().compose(template, &b).unwrap();
    assert_eq!(qa.statement_text, qb.statement_text);
    assert_eq!(qa.parameters, qb.parameters);
}

#[test]
fn test_no_top_level_reference_is_rejected() {
    let t = raw("SELECT COUNT(*) AS n FROM calendar WHERE EXISTS (SELECT 1 FROM sales)");
    let err = Composer::default()
        .compose(&t, &FilterSelection::all())
        .unwrap_err();
    assert_eq!(
        err,
        ComposeError::Rewrite {
            template: "adhoc".into(),
            base: "sales".into()
        }
    );
}

#[test]
fn test_shadowing_cte_is_rejected() {
    let t = raw("WITH sales AS (SELECT 1 AS x) SELECT COUNT(*) AS n FROM sales");
    assert!(matches!(
        Composer::default().compose(&t, &FilterSelection::all()),
        Err(ComposeError::UnsupportedConstruct(_))
    ));

    let t = raw("WITH filtered_base AS (SELECT * FROM sales) SELECT COUNT(*) AS n FROM filtered_base");
    assert!(matches!(
        Composer::default().compose(&t, &FilterSelection::all()),
        Err(ComposeError::UnsupportedConstruct(_))
    ));
}

#[test]
fn test_qualified_base_reference_is_rejected() {
    let t = raw("SELECT COUNT(*) AS n FROM sales JOIN main.sales AS s2 ON sales.row_id = s2.row_id");
    let err = Composer::default()
        .compose(&t, &FilterSelection::all())
        .unwrap_err();
    assert!(matches!(err, ComposeError::UnsupportedConstruct(msg) if msg.contains("main.sales")));
}

#[test]
fn test_undeclared_placeholder_is_rejected() {
    let t = raw("SELECT COUNT(*) AS n FROM sales LIMIT :top_n");
    assert!(matches!(
        Composer::default().compose(&t, &FilterSelection::all()),
        Err(ComposeError::UnsupportedConstruct(_))
    ));
}

#[test]
fn test_self_join_rewrites_both_sides() {
    let t = raw(
        "SELECT COUNT(*) AS n FROM sales a JOIN sales b ON a.customer_id = b.customer_id",
    );
    let q = Composer::default()
        .compose(&t, &FilterSelection::builder().region("West").build().unwrap())
        .unwrap();
    assert!(q.statement_text.contains("FROM filtered_base AS a JOIN filtered_base AS b"));
    assert_eq!(q.parameters, vec![SqlValue::text("West")]);
}
