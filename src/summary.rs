//! Stock summary derivation: the pure join of the product master against the
//! sales and incoming ledgers.

use std::collections::HashMap;

use crate::models::{IncomingRecord, Product, ReorderItem, SalesRecord, StockSummary};

#[derive(Debug, Default, Clone, Copy)]
struct SalesTotals {
    sales: i64,
    returns: i64,
    delta: i64,
}

/// Derives one [`StockSummary`] per product.
///
/// Sales and incoming rows referencing codes absent from the master are
/// ignored. Returns count into `total_returns` (never `total_sales`) and add
/// back into `current_stock`, uncapped: a return larger than the recorded
/// sales for a product passes through as-is.
pub fn calculate_stock_summary(
    products: &[Product],
    sales: &[SalesRecord],
    incoming: &[IncomingRecord],
) -> Vec<StockSummary> {
    let mut sales_by_code: HashMap<&str, SalesTotals> = HashMap::new();
    for record in sales {
        let totals = sales_by_code.entry(record.product_id.as_str()).or_default();
        if record.is_return() {
            totals.returns += record.unsigned_quantity();
        } else {
            totals.sales += record.unsigned_quantity();
        }
        totals.delta += record.stock_delta();
    }

    let mut incoming_by_code: HashMap<&str, i64> = HashMap::new();
    for record in incoming {
        *incoming_by_code
            .entry(record.product_code.as_str())
            .or_default() += record.quantity;
    }

    products
        .iter()
        .map(|product| {
            let code = product.product_code.as_str();
            let totals = sales_by_code.get(code).copied().unwrap_or_default();
            let total_incoming = incoming_by_code.get(code).copied().unwrap_or(0);
            let current_stock = product.stock + total_incoming + totals.delta;
            StockSummary {
                product_code: product.product_code.clone(),
                product_name: product.product_name.clone(),
                initial_stock: product.stock,
                target_stock: product.target_stock,
                total_incoming,
                total_sales: totals.sales,
                total_returns: totals.returns,
                current_stock,
                gap: current_stock - product.target_stock,
            }
        })
        .collect()
}

/// Shortage list for the reorder view: products below target, with the
/// quantity needed to get back to it.
pub fn reorder_items(summaries: &[StockSummary]) -> Vec<ReorderItem> {
    summaries
        .iter()
        .filter(|summary| summary.gap < 0)
        .map(|summary| ReorderItem {
            summary: summary.clone(),
            reorder_qty: summary.target_stock - summary.current_stock,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SalesChannel;

    fn product(code: &str, stock: i64, target: i64) -> Product {
        Product {
            product_code: code.into(),
            product_name: format!("{code} name"),
            stock,
            target_stock: target,
            memo: String::new(),
        }
    }

    fn sale(code: &str, qty: i64, channel: SalesChannel) -> SalesRecord {
        SalesRecord {
            order_time: "2026-01-03 10:00".into(),
            product_id: code.into(),
            order_quantity: qty,
            channel,
        }
    }

    fn incoming(code: &str, qty: i64) -> IncomingRecord {
        IncomingRecord {
            incoming_date: "2026-01-02".into(),
            product_code: code.into(),
            quantity: qty,
        }
    }

    #[test]
    fn widget_scenario() {
        let products = vec![product("PROD-001", 100, 150)];
        let sales = vec![
            sale("PROD-001", 5, SalesChannel::Offline),
            sale("PROD-001", 3, SalesChannel::Return),
        ];
        let incoming = vec![incoming("PROD-001", 50)];

        let summary = calculate_stock_summary(&products, &sales, &incoming);
        assert_eq!(summary.len(), 1);
        let s = &summary[0];
        assert_eq!(s.total_incoming, 50);
        assert_eq!(s.total_sales, 5);
        assert_eq!(s.total_returns, 3);
        assert_eq!(s.current_stock, 148);
        assert_eq!(s.gap, -2);
    }

    #[test]
    fn arithmetic_invariant_holds_regardless_of_record_order() {
        let products = vec![product("A", 30, 10)];
        let mut sales = vec![
            sale("A", 4, SalesChannel::Offline),
            sale("A", 2, SalesChannel::Return),
            sale("A", 7, SalesChannel::Vendor),
            sale("A", 1, SalesChannel::Return),
        ];
        let mut incoming = vec![incoming("A", 5), incoming("A", 9)];

        let forward = calculate_stock_summary(&products, &sales, &incoming);
        sales.reverse();
        incoming.reverse();
        let backward = calculate_stock_summary(&products, &sales, &incoming);
        assert_eq!(forward, backward);

        let s = &forward[0];
        let delta: i64 = sales.iter().map(|r| r.stock_delta()).sum();
        assert_eq!(s.current_stock, 30 + s.total_incoming + delta);
        assert_eq!(s.gap, s.current_stock - 10);
    }

    #[test]
    fn returns_are_excluded_from_total_sales() {
        let products = vec![product("A", 0, 0)];
        let sales = vec![sale("A", 9, SalesChannel::Return)];
        let summary = calculate_stock_summary(&products, &sales, &[]);
        assert_eq!(summary[0].total_sales, 0);
        assert_eq!(summary[0].total_returns, 9);
        assert_eq!(summary[0].current_stock, 9);
    }

    #[test]
    fn returns_larger_than_sales_pass_through_uncapped() {
        let products = vec![product("A", 10, 0)];
        let sales = vec![
            sale("A", 2, SalesChannel::Offline),
            sale("A", 50, SalesChannel::Return),
        ];
        let summary = calculate_stock_summary(&products, &sales, &[]);
        assert_eq!(summary[0].current_stock, 10 - 2 + 50);
        assert_eq!(summary[0].total_returns, 50);
    }

    #[test]
    fn unmatched_ledger_rows_are_ignored() {
        let products = vec![product("A", 5, 0)];
        let sales = vec![sale("GHOST", 3, SalesChannel::Offline)];
        let incoming = vec![incoming("GHOST", 8)];
        let summary = calculate_stock_summary(&products, &sales, &incoming);
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].current_stock, 5);
        assert_eq!(summary[0].total_sales, 0);
        assert_eq!(summary[0].total_incoming, 0);
    }

    #[test]
    fn product_without_activity_keeps_its_initial_stock() {
        let products = vec![product("A", 42, 40)];
        let summary = calculate_stock_summary(&products, &[], &[]);
        let s = &summary[0];
        assert_eq!(s.total_sales, 0);
        assert_eq!(s.total_returns, 0);
        assert_eq!(s.total_incoming, 0);
        assert_eq!(s.current_stock, 42);
        assert_eq!(s.gap, 2);
    }

    #[test]
    fn reorder_items_cover_exactly_the_shortages() {
        let products = vec![product("A", 1, 10), product("B", 20, 10)];
        let summaries = calculate_stock_summary(&products, &[], &[]);
        let reorder = reorder_items(&summaries);
        assert_eq!(reorder.len(), 1);
        assert_eq!(reorder[0].summary.product_code, "A");
        assert_eq!(reorder[0].reorder_qty, 9);
    }
}
