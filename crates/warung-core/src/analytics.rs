//! Sales reports over completed transactions.
//!
//! Every report is a pure function of a slice of carts plus the current catalog. Carts that
//! are still pending are ignored, and all date bucketing uses `completed_at` in UTC.
//!
//! Cost of goods sold uses each product's *current* `buy_price`, so profit figures move when
//! cost prices are edited. Lines whose product has been deleted contribute revenue but no
//! cost.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Days, Months, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::cart::{Cart, Direction, TransactionStatus};
use crate::error::CartError;
use crate::product::Product;
use crate::ProductId;

/// Default number of rows in the top products report.
pub const DEFAULT_TOP_PRODUCTS_LIMIT: usize = 10;

/// Days covered by the revenue report when no range is given.
pub const DEFAULT_REVENUE_DAYS: u64 = 30;

/// Catalog lookup used by the reports.
pub type Catalog = HashMap<ProductId, Product>;

/// Reporting window ending now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    /// Since midnight UTC.
    Today,
    /// The last seven days.
    Week,
    /// The last calendar month.
    Month,
}

impl Period {
    /// First instant included in the window.
    #[must_use]
    pub fn start(self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Self::Today => now
                .date_naive()
                .and_hms_opt(0, 0, 0)
                .map_or(now, |midnight| midnight.and_utc()),
            Self::Week => now - chrono::Duration::days(7),
            Self::Month => now.checked_sub_months(Months::new(1)).unwrap_or(now),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Today => "today",
            Self::Week => "week",
            Self::Month => "month",
        })
    }
}

impl FromStr for Period {
    type Err = CartError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "today" => Ok(Self::Today),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            other => Err(CartError::Validation(format!("unknown period: {other}"))),
        }
    }
}

/// Headline figures for a period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// Window the figures cover.
    pub period: Period,
    /// Sum of sale totals.
    pub total_sales: i64,
    /// Sum of purchase totals.
    pub total_purchases: i64,
    /// Sales minus cost of goods sold.
    pub net_profit: i64,
    /// Completed transactions of either direction.
    pub transaction_count: usize,
    /// Completed sales.
    pub sales_count: usize,
    /// Completed purchases.
    pub purchase_count: usize,
}

/// One day of the revenue report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenueRow {
    /// Calendar day (UTC).
    pub date: NaiveDate,
    /// Sale totals.
    pub revenue: i64,
    /// Purchase totals.
    pub purchases: i64,
    /// Cost of goods sold on that day's sales.
    pub cost: i64,
    /// `revenue - cost`.
    pub profit: i64,
    /// Completed transactions of either direction.
    pub transaction_count: usize,
}

/// Sales of one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSales {
    /// The product as it is now.
    pub product: Product,
    /// Units sold.
    pub total_quantity: u64,
    /// Revenue at captured line prices.
    pub total_revenue: i64,
}

/// Sales of one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySales {
    /// Category label.
    pub category: String,
    /// Revenue at captured line prices.
    pub total_revenue: i64,
    /// Units sold.
    pub total_quantity: u64,
}

/// Sales within one hour of a day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourlyBucket {
    /// Hour of day, 0 to 23 (UTC).
    pub hour: u32,
    /// Sale totals.
    pub revenue: i64,
    /// Number of sales.
    pub count: usize,
}

/// Best seller entry of the weekly report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BestSeller {
    /// Product name.
    pub name: String,
    /// Units sold.
    pub quantity: u64,
}

/// Last seven days compared with the seven before.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyReport {
    /// Sale totals in the last seven days.
    pub total_revenue: i64,
    /// Change against the previous seven days, in percent (0 when there is no baseline).
    pub revenue_change: f64,
    /// Completed sales in the last seven days.
    pub transaction_count: usize,
    /// Top five products by units sold.
    pub best_sellers: Vec<BestSeller>,
    /// Up to five low-stock products.
    pub low_stock_warnings: Vec<Product>,
}

fn completed_between(
    carts: &[Cart],
    from: DateTime<Utc>,
    to: Option<DateTime<Utc>>,
) -> impl Iterator<Item = (&Cart, DateTime<Utc>)> {
    carts.iter().filter_map(move |cart| {
        if cart.status() != TransactionStatus::Completed {
            return None;
        }
        let at = cart.transaction.completed_at?;
        let in_range = at >= from && to.map_or(true, |to| at < to);
        in_range.then_some((cart, at))
    })
}

fn cost_of_goods(cart: &Cart, catalog: &Catalog) -> i64 {
    cart.items
        .iter()
        .filter_map(|line| {
            catalog
                .get(&line.product_id)
                .map(|p| p.buy_price * i64::from(line.quantity))
        })
        .sum()
}

/// Headline figures since the start of `period`.
#[must_use]
pub fn summary(carts: &[Cart], catalog: &Catalog, period: Period, now: DateTime<Utc>) -> Summary {
    let mut report = Summary {
        period,
        total_sales: 0,
        total_purchases: 0,
        net_profit: 0,
        transaction_count: 0,
        sales_count: 0,
        purchase_count: 0,
    };
    let mut cost = 0;

    for (cart, _) in completed_between(carts, period.start(now), None) {
        report.transaction_count += 1;
        match cart.direction() {
            Direction::Out => {
                report.sales_count += 1;
                report.total_sales += cart.transaction.total_amount;
                cost += cost_of_goods(cart, catalog);
            }
            Direction::In => {
                report.purchase_count += 1;
                report.total_purchases += cart.transaction.total_amount;
            }
        }
    }

    report.net_profit = report.total_sales - cost;
    report
}

/// Per-day figures for every date from `from` to `to` inclusive, zero-filled.
#[must_use]
pub fn revenue(
    carts: &[Cart],
    catalog: &Catalog,
    from: NaiveDate,
    to: NaiveDate,
) -> Vec<RevenueRow> {
    let mut rows: BTreeMap<NaiveDate, RevenueRow> = BTreeMap::new();
    let mut day = from;
    while day <= to {
        rows.insert(
            day,
            RevenueRow {
                date: day,
                revenue: 0,
                purchases: 0,
                cost: 0,
                profit: 0,
                transaction_count: 0,
            },
        );
        match day.checked_add_days(Days::new(1)) {
            Some(next) => day = next,
            None => break,
        }
    }

    for cart in carts {
        if cart.status() != TransactionStatus::Completed {
            continue;
        }
        let Some(at) = cart.transaction.completed_at else {
            continue;
        };
        let Some(row) = rows.get_mut(&at.date_naive()) else {
            continue;
        };
        row.transaction_count += 1;
        match cart.direction() {
            Direction::Out => {
                row.revenue += cart.transaction.total_amount;
                row.cost += cost_of_goods(cart, catalog);
            }
            Direction::In => row.purchases += cart.transaction.total_amount,
        }
    }

    rows.into_values()
        .map(|mut row| {
            row.profit = row.revenue - row.cost;
            row
        })
        .collect()
}

/// Products ranked by units sold since `since`, best first.
#[must_use]
pub fn top_products(
    carts: &[Cart],
    catalog: &Catalog,
    since: DateTime<Utc>,
    limit: usize,
) -> Vec<ProductSales> {
    let mut stats: HashMap<ProductId, (u64, i64)> = HashMap::new();
    for (cart, _) in completed_between(carts, since, None) {
        if cart.direction() != Direction::Out {
            continue;
        }
        for line in &cart.items {
            let entry = stats.entry(line.product_id).or_insert((0, 0));
            entry.0 += u64::from(line.quantity);
            entry.1 += line.extension();
        }
    }

    let mut ranked: Vec<ProductSales> = stats
        .into_iter()
        .filter_map(|(id, (total_quantity, total_revenue))| {
            catalog.get(&id).map(|product| ProductSales {
                product: product.clone(),
                total_quantity,
                total_revenue,
            })
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.total_quantity
            .cmp(&a.total_quantity)
            .then_with(|| a.product.name.cmp(&b.product.name))
    });
    ranked.truncate(limit);
    ranked
}

/// Sale revenue and units per category since `since`, ordered by category name.
#[must_use]
pub fn categories(carts: &[Cart], catalog: &Catalog, since: DateTime<Utc>) -> Vec<CategorySales> {
    let mut stats: BTreeMap<String, CategorySales> = BTreeMap::new();
    for (cart, _) in completed_between(carts, since, None) {
        if cart.direction() != Direction::Out {
            continue;
        }
        for line in &cart.items {
            let Some(product) = catalog.get(&line.product_id) else {
                continue;
            };
            let entry = stats
                .entry(product.category.clone())
                .or_insert_with(|| CategorySales {
                    category: product.category.clone(),
                    total_revenue: 0,
                    total_quantity: 0,
                });
            entry.total_revenue += line.extension();
            entry.total_quantity += u64::from(line.quantity);
        }
    }
    stats.into_values().collect()
}

/// Sales on `date` bucketed by completion hour. Always 24 buckets.
#[must_use]
pub fn hourly_pattern(carts: &[Cart], date: NaiveDate) -> Vec<HourlyBucket> {
    let mut buckets: Vec<HourlyBucket> = (0..24)
        .map(|hour| HourlyBucket {
            hour,
            revenue: 0,
            count: 0,
        })
        .collect();

    let Some(start) = date.and_hms_opt(0, 0, 0).map(|t| t.and_utc()) else {
        return buckets;
    };
    let end = start + chrono::Duration::days(1);

    for (cart, at) in completed_between(carts, start, Some(end)) {
        if cart.direction() != Direction::Out {
            continue;
        }
        if let Some(bucket) = buckets.get_mut(at.hour() as usize) {
            bucket.revenue += cart.transaction.total_amount;
            bucket.count += 1;
        }
    }
    buckets
}

/// Products at or below their low-stock threshold, lowest stock first.
#[must_use]
pub fn low_stock(products: &[Product]) -> Vec<Product> {
    let mut low: Vec<Product> = products.iter().filter(|p| p.is_low_stock()).cloned().collect();
    low.sort_by(|a, b| a.stock.cmp(&b.stock).then_with(|| a.name.cmp(&b.name)));
    low
}

/// Compare the last seven days of sales with the seven days before.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn weekly_report(carts: &[Cart], catalog: &Catalog, now: DateTime<Utc>) -> WeeklyReport {
    let week_start = now - chrono::Duration::days(7);
    let prev_start = now - chrono::Duration::days(14);

    let sales = |from, to| {
        completed_between(carts, from, to).filter(|(cart, _)| cart.direction() == Direction::Out)
    };

    let current: Vec<&Cart> = sales(week_start, None).map(|(cart, _)| cart).collect();
    let total_revenue: i64 = current.iter().map(|c| c.transaction.total_amount).sum();
    let previous: i64 = sales(prev_start, Some(week_start))
        .map(|(cart, _)| cart.transaction.total_amount)
        .sum();

    let revenue_change = if previous > 0 {
        let change = (total_revenue - previous) as f64 / previous as f64 * 100.0;
        (change * 10.0).round() / 10.0
    } else {
        0.0
    };

    let mut by_name: HashMap<String, u64> = HashMap::new();
    for cart in &current {
        for line in &cart.items {
            if let Some(product) = catalog.get(&line.product_id) {
                *by_name.entry(product.name.clone()).or_insert(0) += u64::from(line.quantity);
            }
        }
    }
    let mut best_sellers: Vec<BestSeller> = by_name
        .into_iter()
        .map(|(name, quantity)| BestSeller { name, quantity })
        .collect();
    best_sellers.sort_by(|a, b| b.quantity.cmp(&a.quantity).then_with(|| a.name.cmp(&b.name)));
    best_sellers.truncate(5);

    let products: Vec<Product> = catalog.values().cloned().collect();
    let mut low_stock_warnings = low_stock(&products);
    low_stock_warnings.truncate(5);

    WeeklyReport {
        total_revenue,
        revenue_change,
        transaction_count: current.len(),
        best_sellers,
        low_stock_warnings,
    }
}
