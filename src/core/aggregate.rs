use crate::domain::model::{AnalysisRow, MarketShareRow};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregationSummary {
    pub input_rows: usize,
    pub output_rows: usize,
    /// Rows without a commuting zone or industry code; they belong to no group.
    pub ungrouped_rows: usize,
    /// Employee or sales values that were blank or not numeric, counted as zero.
    pub missing_amounts: usize,
    pub zero_employee_zones: usize,
    pub zero_sales_groups: usize,
}

/// Blank or malformed amounts are `None`.
pub fn parse_amount(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn share(value: f64, total: f64) -> Option<f64> {
    (total != 0.0).then(|| value / total)
}

#[derive(Default)]
struct GroupTotals {
    firms: usize,
    sales: f64,
}

/// Firm counts, totals and market shares per business.
///
/// Employee shares are relative to the commuting zone across all industries;
/// sales shares to the (zone, industry) group. A share whose denominator is zero
/// is left `None` and the group is counted in the summary.
pub fn market_shares(rows: &[AnalysisRow]) -> (Vec<MarketShareRow>, AggregationSummary) {
    let mut summary = AggregationSummary {
        input_rows: rows.len(),
        ..AggregationSummary::default()
    };

    let grouped: Vec<(&AnalysisRow, f64, f64)> = rows
        .iter()
        .filter(|r| !r.czone.is_empty() && !r.primary_sic.is_empty())
        .map(|r| {
            let employees = parse_amount(&r.employees_here);
            let sales = parse_amount(&r.sales_volume);
            summary.missing_amounts += usize::from(employees.is_none()) + usize::from(sales.is_none());
            (r, employees.unwrap_or(0.0), sales.unwrap_or(0.0))
        })
        .collect();
    summary.ungrouped_rows = rows.len() - grouped.len();

    let mut zone_employees: HashMap<&str, f64> = HashMap::new();
    let mut groups: HashMap<(&str, &str), GroupTotals> = HashMap::new();
    for &(row, employees, sales) in &grouped {
        *zone_employees.entry(row.czone.as_str()).or_default() += employees;
        let totals = groups
            .entry((row.czone.as_str(), row.primary_sic.as_str()))
            .or_default();
        totals.firms += 1;
        totals.sales += sales;
    }

    summary.zero_employee_zones = zone_employees.values().filter(|t| **t == 0.0).count();
    summary.zero_sales_groups = groups.values().filter(|g| g.sales == 0.0).count();
    if summary.zero_employee_zones > 0 || summary.zero_sales_groups > 0 {
        tracing::warn!(
            "⚠️ {} commuting zones have zero employees and {} zone-industry groups have zero sales; their shares are left empty",
            summary.zero_employee_zones,
            summary.zero_sales_groups
        );
    }

    let output: Vec<MarketShareRow> = grouped
        .into_iter()
        .filter_map(|(row, employees, sales)| {
            let zone_total = *zone_employees.get(row.czone.as_str())?;
            let group = groups.get(&(row.czone.as_str(), row.primary_sic.as_str()))?;
            Some(MarketShareRow {
                duns: row.duns.clone(),
                fips: row.fips.clone(),
                czone: row.czone.clone(),
                primary_sic: row.primary_sic.clone(),
                employees_here: employees,
                sales_volume: sales,
                firm_count: group.firms,
                zone_employee_total: zone_total,
                group_sales_total: group.sales,
                employee_share: share(employees, zone_total),
                sales_share: share(sales, group.sales),
            })
        })
        .collect();
    summary.output_rows = output.len();

    tracing::info!(
        "📈 Market shares: {} rows in, {} rows out ({} without zone or industry), {} groups",
        summary.input_rows,
        summary.output_rows,
        summary.ungrouped_rows,
        groups.len()
    );
    (output, summary)
}
