//! Built-in Superstore analytics.
//!
//! These are the dashboard's saved queries. Every one reads the order-line
//! table [`BASE_TABLE`] and is written without any filter: the composer
//! narrows them. Percent-of-total columns divide by a scalar subquery over
//! the same table, which the composer redirects to the filtered rows.

use super::{QueryTemplate, SemanticType::*};

/// The order-line table every built-in template reads.
pub const BASE_TABLE: &str = "sales";

/// All built-in templates, in dashboard order.
pub fn standard_templates() -> Vec<QueryTemplate> {
    let mut templates = overview();
    templates.extend(distributions());
    templates.extend(states());
    templates.extend(trends());
    templates.extend(products());
    templates.extend(discounts());
    templates.extend(customers());
    templates
}

fn template(name: &str, description: &str, body: &str) -> QueryTemplate {
    QueryTemplate::new(name, BASE_TABLE, body.trim()).describe(description)
}

// =============================================================================
// Overview
// =============================================================================

fn overview() -> Vec<QueryTemplate> {
    vec![
        template(
            "kpi_summary",
            "Headline totals: sales, profit, order lines, average discount",
            r#"
SELECT
  SUM(sales)    AS total_sales,
  SUM(profit)   AS total_profit,
  COUNT(*)      AS total_orders,
  AVG(discount) AS avg_discount
FROM sales
"#,
        )
        .column("total_sales", Decimal)
        .column("total_profit", Decimal)
        .column("total_orders", Integer)
        .column("avg_discount", Decimal),
        template(
            "row_count",
            "Number of order lines",
            "SELECT COUNT(*) AS total_rows FROM sales",
        )
        .column("total_rows", Integer),
        template(
            "date_span",
            "First and last order date",
            "SELECT MIN(order_date) AS start_date, MAX(order_date) AS end_date FROM sales",
        )
        .column("start_date", Date)
        .column("end_date", Date),
    ]
}

// =============================================================================
// Distributions
// =============================================================================

/// The shared shape of the region and ship-mode breakdowns.
fn performance_by(name: &str, description: &str, dimension: &str) -> QueryTemplate {
    let body = format!(
        r#"
SELECT
  {dimension},
  COUNT(*)                                                      AS orders,
  ROUND(SUM(sales), 2)                                          AS sales,
  ROUND(SUM(profit), 2)                                         AS profit,
  ROUND(100.0 * SUM(sales) / (SELECT SUM(sales) FROM sales), 2)   AS pct_sales,
  ROUND(100.0 * SUM(profit) / (SELECT SUM(profit) FROM sales), 2) AS pct_profit,
  ROUND(100.0 * SUM(profit) / NULLIF(SUM(sales), 0), 2)         AS margin_pct,
  ROUND(AVG(discount), 2)                                       AS avg_discount
FROM sales
GROUP BY {dimension}
ORDER BY sales DESC
"#
    );
    template(name, description, &body)
        .column(dimension, Text)
        .column("orders", Integer)
        .column("sales", Decimal)
        .column("profit", Decimal)
        .column("pct_sales", Percentage)
        .column("pct_profit", Percentage)
        .column("margin_pct", Percentage)
        .column("avg_discount", Decimal)
}

fn distributions() -> Vec<QueryTemplate> {
    vec![
        template(
            "segment_dist",
            "Orders and sales per customer segment with shares of the total",
            r#"
SELECT
  segment,
  COUNT(*)                                                    AS orders,
  ROUND(SUM(sales), 2)                                        AS sales,
  ROUND(100.0 * COUNT(*) / (SELECT COUNT(*) FROM sales), 2)   AS pct_orders,
  ROUND(100.0 * SUM(sales) / (SELECT SUM(sales) FROM sales), 2) AS pct_sales
FROM sales
GROUP BY segment
ORDER BY sales DESC
"#,
        )
        .column("segment", Text)
        .column("orders", Integer)
        .column("sales", Decimal)
        .column("pct_orders", Percentage)
        .column("pct_sales", Percentage),
        performance_by(
            "category_dist",
            "Sales, profit and margin per product category",
            "category",
        ),
        performance_by(
            "region_perf",
            "Sales, profit and margin per region",
            "region",
        ),
        performance_by(
            "shipmode_perf",
            "Sales, profit and margin per ship mode",
            "ship_mode",
        ),
        template(
            "segment_rpm",
            "Revenue, profit and margin per segment",
            r#"
SELECT
  segment,
  COUNT(*)                                                      AS orders,
  ROUND(SUM(sales), 2)                                          AS sales,
  ROUND(SUM(profit), 2)                                         AS profit,
  ROUND(100.0 * SUM(profit) / NULLIF(SUM(sales), 0), 2)         AS margin_pct,
  ROUND(100.0 * SUM(sales) / (SELECT SUM(sales) FROM sales), 2)   AS pct_sales,
  ROUND(100.0 * SUM(profit) / (SELECT SUM(profit) FROM sales), 2) AS pct_profit,
  ROUND(AVG(discount), 3)                                       AS avg_discount
FROM sales
GROUP BY segment
ORDER BY sales DESC
"#,
        )
        .column("segment", Text)
        .column("orders", Integer)
        .column("sales", Decimal)
        .column("profit", Decimal)
        .column("margin_pct", Percentage)
        .column("pct_sales", Percentage)
        .column("pct_profit", Percentage)
        .column("avg_discount", Decimal),
        template(
            "category_sales",
            "Sales and profit per category",
            r#"
SELECT category, ROUND(SUM(sales), 2) AS sales, ROUND(SUM(profit), 2) AS profit
FROM sales
GROUP BY category
ORDER BY sales DESC
"#,
        )
        .column("category", Text)
        .column("sales", Decimal)
        .column("profit", Decimal),
        template(
            "ship_days_by_region",
            "Average days from order to shipment per region",
            r#"
SELECT
  region,
  ROUND(AVG(julianday(ship_date) - julianday(order_date)), 2) AS avg_ship_days,
  COUNT(*)                                                    AS orders,
  ROUND(SUM(sales), 2)                                        AS sales,
  ROUND(SUM(profit), 2)                                       AS profit,
  ROUND(100.0 * SUM(profit) / NULLIF(SUM(sales), 0), 2)       AS margin_pct
FROM sales
GROUP BY region
ORDER BY avg_ship_days
"#,
        )
        .column("region", Text)
        .column("avg_ship_days", Decimal)
        .column("orders", Integer)
        .column("sales", Decimal)
        .column("profit", Decimal)
        .column("margin_pct", Percentage),
    ]
}

// =============================================================================
// States
// =============================================================================

fn states() -> Vec<QueryTemplate> {
    vec![
        template(
            "state_sales",
            "State leaderboard by sales",
            r#"
SELECT
  state,
  COUNT(*)                                              AS orders,
  ROUND(SUM(sales), 2)                                  AS sales,
  ROUND(SUM(profit), 2)                                 AS profit,
  ROUND(100.0 * SUM(profit) / NULLIF(SUM(sales), 0), 2) AS margin_pct,
  ROUND(AVG(discount), 2)                               AS avg_discount
FROM sales
GROUP BY state
ORDER BY sales DESC
"#,
        )
        .column("state", Text)
        .column("orders", Integer)
        .column("sales", Decimal)
        .column("profit", Decimal)
        .column("margin_pct", Percentage)
        .column("avg_discount", Decimal),
        template(
            "state_top5",
            "Top states by sales",
            r#"
SELECT
  state,
  COUNT(*)                                              AS orders,
  ROUND(SUM(sales), 2)                                  AS sales,
  ROUND(SUM(profit), 2)                                 AS profit,
  ROUND(100.0 * SUM(profit) / NULLIF(SUM(sales), 0), 2) AS margin_pct
FROM sales
GROUP BY state
ORDER BY sales DESC
LIMIT :top_n
"#,
        )
        .column("state", Text)
        .column("orders", Integer)
        .column("sales", Decimal)
        .column("profit", Decimal)
        .column("margin_pct", Percentage)
        .slot("top_n", 5i64),
        template(
            "top_states",
            "Top states by sales, for the bar chart",
            r#"
SELECT state, ROUND(SUM(sales), 2) AS sales
FROM sales
GROUP BY state
ORDER BY sales DESC
LIMIT :top_n
"#,
        )
        .column("state", Text)
        .column("sales", Decimal)
        .slot("top_n", 10i64),
        template(
            "state_loss",
            "States with negative total profit",
            r#"
SELECT
  state,
  ROUND(SUM(profit), 2)                                 AS profit,
  ROUND(SUM(sales), 2)                                  AS sales,
  ROUND(100.0 * SUM(profit) / NULLIF(SUM(sales), 0), 2) AS margin_pct
FROM sales
GROUP BY state
HAVING SUM(profit) < 0
ORDER BY profit ASC
"#,
        )
        .column("state", Text)
        .column("profit", Decimal)
        .column("sales", Decimal)
        .column("margin_pct", Percentage),
    ]
}

// =============================================================================
// Trends
// =============================================================================

fn trends() -> Vec<QueryTemplate> {
    vec![
        template(
            "monthly_sales_profit",
            "Sales and profit per calendar month",
            r#"
SELECT
  strftime('%Y-%m', order_date) AS ym,
  ROUND(SUM(sales), 2)          AS sales,
  ROUND(SUM(profit), 2)         AS profit
FROM sales
GROUP BY ym
ORDER BY ym
"#,
        )
        .column("ym", Text)
        .column("sales", Decimal)
        .column("profit", Decimal),
        template(
            "monthly_trend",
            "Sales and profit per month, keyed by the first day of the month",
            r#"
SELECT
  strftime('%Y-%m-01', order_date) AS ym,
  SUM(sales)                       AS sales,
  SUM(profit)                      AS profit
FROM sales
GROUP BY ym
ORDER BY ym
"#,
        )
        .column("ym", Date)
        .column("sales", Decimal)
        .column("profit", Decimal),
        template(
            "mom_revenue",
            "Month-over-month revenue change",
            r#"
WITH m AS (
  SELECT strftime('%Y-%m', order_date) AS ym,
         SUM(sales) AS sales
  FROM sales
  GROUP BY ym
)
SELECT
  ym,
  ROUND(sales, 2) AS sales,
  ROUND((sales - LAG(sales) OVER (ORDER BY ym))
        / NULLIF(LAG(sales) OVER (ORDER BY ym), 0) * 100.0, 2) AS mom_pct
FROM m
ORDER BY ym
"#,
        )
        .column("ym", Text)
        .column("sales", Decimal)
        .column("mom_pct", Percentage),
        template(
            "monthly_avg_discount",
            "Average discount per calendar month",
            r#"
SELECT
  strftime('%Y-%m', order_date) AS ym,
  ROUND(AVG(discount), 3)       AS avg_discount
FROM sales
GROUP BY ym
ORDER BY ym
"#,
        )
        .column("ym", Text)
        .column("avg_discount", Decimal),
    ]
}

// =============================================================================
// Products
// =============================================================================

fn products() -> Vec<QueryTemplate> {
    vec![
        template(
            "top_products_by_revenue",
            "Best-selling products by revenue",
            r#"
SELECT
  product_name,
  COUNT(*)                                              AS order_lines,
  ROUND(SUM(sales), 2)                                  AS sales,
  ROUND(SUM(profit), 2)                                 AS profit,
  ROUND(100.0 * SUM(profit) / NULLIF(SUM(sales), 0), 2) AS margin_pct,
  ROUND(AVG(discount), 3)                               AS avg_discount
FROM sales
GROUP BY product_name
ORDER BY sales DESC
LIMIT :top_n
"#,
        )
        .column("product_name", Text)
        .column("order_lines", Integer)
        .column("sales", Decimal)
        .column("profit", Decimal)
        .column("margin_pct", Percentage)
        .column("avg_discount", Decimal)
        .slot("top_n", 10i64),
        template(
            "top_products_by_qty",
            "Best-selling products by units",
            r#"
SELECT
  product_name,
  SUM(quantity)                                         AS qty,
  ROUND(SUM(sales), 2)                                  AS sales,
  ROUND(SUM(profit), 2)                                 AS profit,
  ROUND(100.0 * SUM(profit) / NULLIF(SUM(sales), 0), 2) AS margin_pct,
  ROUND(AVG(discount), 3)                               AS avg_discount
FROM sales
GROUP BY product_name
ORDER BY qty DESC
LIMIT :top_n
"#,
        )
        .column("product_name", Text)
        .column("qty", Integer)
        .column("sales", Decimal)
        .column("profit", Decimal)
        .column("margin_pct", Percentage)
        .column("avg_discount", Decimal)
        .slot("top_n", 10i64),
        template(
            "high_sales_low_profit",
            "Products with large revenue and no profit",
            r#"
SELECT
  product_name,
  ROUND(SUM(sales), 2)    AS sales,
  ROUND(SUM(profit), 2)   AS profit,
  ROUND(AVG(discount), 3) AS avg_discount
FROM sales
GROUP BY product_name
HAVING SUM(sales) > :min_sales AND SUM(profit) <= 0
ORDER BY sales DESC
"#,
        )
        .column("product_name", Text)
        .column("sales", Decimal)
        .column("profit", Decimal)
        .column("avg_discount", Decimal)
        .slot("min_sales", 10000i64),
        template(
            "bottom_products_by_profit",
            "Least profitable products",
            r#"
SELECT
  product_name,
  ROUND(SUM(sales), 2)    AS sales,
  ROUND(SUM(profit), 2)   AS profit,
  ROUND(AVG(discount), 3) AS avg_discount
FROM sales
GROUP BY product_name
ORDER BY profit ASC
LIMIT :bottom_n
"#,
        )
        .column("product_name", Text)
        .column("sales", Decimal)
        .column("profit", Decimal)
        .column("avg_discount", Decimal)
        .slot("bottom_n", 10i64),
    ]
}

// =============================================================================
// Discounts
// =============================================================================

fn discount_by(name: &str, dimension: &str) -> QueryTemplate {
    let body = format!(
        r#"
SELECT
  {dimension},
  ROUND(AVG(discount), 3)                               AS avg_discount,
  ROUND(SUM(sales), 2)                                  AS sales,
  ROUND(SUM(profit), 2)                                 AS profit,
  ROUND(100.0 * SUM(profit) / NULLIF(SUM(sales), 0), 2) AS margin_pct
FROM sales
GROUP BY {dimension}
ORDER BY avg_discount DESC
"#
    );
    template(
        name,
        &format!("Average discount per {}", dimension.replace('_', "-")),
        &body,
    )
    .column(dimension, Text)
    .column("avg_discount", Decimal)
    .column("sales", Decimal)
    .column("profit", Decimal)
    .column("margin_pct", Percentage)
}

fn discounts() -> Vec<QueryTemplate> {
    vec![
        discount_by("avg_discount_by_category", "category"),
        discount_by("avg_discount_by_subcategory", "sub_category"),
        discount_by("avg_discount_by_segment", "segment"),
        template(
            "discount_vs_profit",
            "Discount and profit of every order line",
            "SELECT discount, profit FROM sales",
        )
        .column("discount", Decimal)
        .column("profit", Decimal),
    ]
}

// =============================================================================
// Customers
// =============================================================================

fn customers() -> Vec<QueryTemplate> {
    vec![
        template(
            "top_customers",
            "Customers with the highest lifetime sales",
            r#"
SELECT
  customer_id,
  customer_name,
  ROUND(SUM(sales), 2)                                  AS lifetime_sales,
  ROUND(SUM(profit), 2)                                 AS lifetime_profit,
  ROUND(100.0 * SUM(profit) / NULLIF(SUM(sales), 0), 2) AS margin_pct,
  COUNT(*)                                              AS order_lines
FROM sales
GROUP BY customer_id, customer_name
ORDER BY lifetime_sales DESC
LIMIT :top_n
"#,
        )
        .column("customer_id", Text)
        .column("customer_name", Text)
        .column("lifetime_sales", Decimal)
        .column("lifetime_profit", Decimal)
        .column("margin_pct", Percentage)
        .column("order_lines", Integer)
        .slot("top_n", 10i64),
        template(
            "negative_profit_customers",
            "Customers whose orders lose money overall",
            r#"
SELECT
  customer_id,
  customer_name,
  ROUND(SUM(sales), 2)    AS sales,
  ROUND(SUM(profit), 2)   AS profit,
  ROUND(AVG(discount), 3) AS avg_discount,
  COUNT(*)                AS order_lines
FROM sales
GROUP BY customer_id, customer_name
HAVING SUM(profit) < 0
ORDER BY profit ASC
"#,
        )
        .column("customer_id", Text)
        .column("customer_name", Text)
        .column("sales", Decimal)
        .column("profit", Decimal)
        .column("avg_discount", Decimal)
        .column("order_lines", Integer),
        template(
            "customer_lifetime",
            "First and last order, tenure and lifetime value per customer",
            r#"
SELECT
  customer_id,
  customer_name,
  MIN(order_date)                                                       AS first_order_date,
  MAX(order_date)                                                       AS last_order_date,
  CAST(julianday(MAX(order_date)) - julianday(MIN(order_date)) AS INT)  AS tenure_days,
  ROUND(SUM(sales), 2)                                                  AS lifetime_sales,
  ROUND(SUM(profit), 2)                                                 AS lifetime_profit
FROM sales
GROUP BY customer_id, customer_name
ORDER BY lifetime_sales DESC
"#,
        )
        .column("customer_id", Text)
        .column("customer_name", Text)
        .column("first_order_date", Date)
        .column("last_order_date", Date)
        .column("tenure_days", Integer)
        .column("lifetime_sales", Decimal)
        .column("lifetime_profit", Decimal),
    ]
}
