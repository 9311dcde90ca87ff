//! Reads listing cards into [`RawRow`]s.

use crate::driver::{FieldSpec, Page};
use crate::error::DriverError;
use crate::selectors::Selectors;
use crate::types::RawRow;

fn row_fields(sel: &Selectors) -> Vec<FieldSpec> {
    vec![
        FieldSpec::text(&sel.row_title),
        FieldSpec::text(&sel.row_shop),
        FieldSpec::text(&sel.row_price),
        FieldSpec::text(&sel.row_sold),
        FieldSpec::text(&sel.row_commission),
        FieldSpec::attr(Some(&sel.row_image), "src"),
        FieldSpec::attr(Some(&sel.row_image), "data-src"),
        FieldSpec::attr(None, &sel.row_identity_attr),
        FieldSpec::attr(Some(&sel.row_identity), &sel.row_identity_attr),
    ]
}

fn non_empty(value: Option<&Option<String>>) -> Option<String> {
    value
        .cloned()
        .flatten()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn to_raw_row(position: usize, values: &[Option<String>]) -> RawRow {
    let text = |i: usize| values.get(i).cloned().flatten();
    RawRow {
        position,
        title: text(0),
        shop_name: text(1),
        price_text: text(2),
        sold_text: text(3),
        commission_text: text(4),
        image_url: non_empty(values.get(5)).or_else(|| non_empty(values.get(6))),
        element_id: non_empty(values.get(7)).or_else(|| non_empty(values.get(8))),
    }
}

/// Snapshots up to `limit` rendered rows, in page order.
///
/// # Errors
///
/// Propagates the driver error if the page cannot be read.
pub async fn scan_rows(
    page: &dyn Page,
    selectors: &Selectors,
    limit: usize,
) -> Result<Vec<RawRow>, DriverError> {
    let rows = page.read_rows(&selectors.rows, &row_fields(selectors)).await?;
    Ok(rows
        .iter()
        .take(limit)
        .enumerate()
        .map(|(position, values)| to_raw_row(position, values))
        .collect())
}
