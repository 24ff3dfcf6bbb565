use crate::domain::model::{IndexRow, MarketShareRow};
use std::collections::BTreeMap;

/// `share * (1 / firm_count)` for one business.
pub fn weighted_contribution(share: Option<f64>, firm_count: usize) -> Option<f64> {
    if firm_count == 0 {
        return None;
    }
    share.map(|s| s * (1.0 / firm_count as f64))
}

fn add(total: Option<f64>, contribution: Option<f64>) -> Option<f64> {
    Some(total? + contribution?)
}

/// Share-weighted Herfindahl index per (commuting zone, industry).
///
/// Each business contributes its share times the reciprocal of its group's firm
/// count; contributions are summed per group. A group with any missing share
/// gets no index for that measure. Rows come out ordered by zone, then industry.
pub fn herfindahl_index(rows: &[MarketShareRow]) -> Vec<IndexRow> {
    let mut groups: BTreeMap<(&str, &str), (Option<f64>, Option<f64>)> = BTreeMap::new();

    for row in rows {
        let employment = weighted_contribution(row.employee_share, row.firm_count);
        let sales = weighted_contribution(row.sales_share, row.firm_count);

        let entry = groups
            .entry((row.czone.as_str(), row.primary_sic.as_str()))
            .or_insert((Some(0.0), Some(0.0)));
        entry.0 = add(entry.0, employment);
        entry.1 = add(entry.1, sales);
    }

    let index: Vec<IndexRow> = groups
        .into_iter()
        .map(|((czone, sic), (employment, sales))| IndexRow {
            czone: czone.to_string(),
            primary_sic: sic.to_string(),
            hhi_employment: employment,
            hhi_sales: sales,
        })
        .collect();

    tracing::info!(
        "📊 Herfindahl index computed for {} zone-industry groups",
        index.len()
    );
    index
}
