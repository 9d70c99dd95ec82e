//! Upload flows: parsed record batches from the file collaborators go through
//! the relevant merge policy into the store, and each upload leaves one audit
//! trail entry behind.

use chrono::Utc;
use tracing::info;

use crate::error::Result;
use crate::merge::{merge_product_master, merge_products_by_code};
use crate::models::{
    ImportMode, IncomingRecord, Product, SalesChannel, SalesRecord, UploadHistoryRecord,
    UploadSource, UploadType,
};
use crate::store::Store;

/// Parsed multi-sheet upload: every sheet is optional.
#[derive(Debug, Clone, Default)]
pub struct WorkbookImport {
    pub products: Vec<Product>,
    pub sales: Vec<SalesRecord>,
    pub incoming: Vec<IncomingRecord>,
}

fn history_entry(
    source: UploadSource,
    kind: UploadType,
    count: usize,
    mode: Option<ImportMode>,
) -> UploadHistoryRecord {
    UploadHistoryRecord {
        uploaded_at: Utc::now().to_rfc3339(),
        source,
        kind,
        count: count as i64,
        mode,
    }
}

/// "Initial data" upload. `Overwrite` discards the prior master outright;
/// `Merge` keeps codes absent from the batch and replaces matching codes
/// wholesale.
pub fn import_products(
    store: &Store,
    records: &[Product],
    mode: ImportMode,
    source: UploadSource,
) -> Result<usize> {
    if records.is_empty() {
        return Ok(0);
    }
    apply_products(store, records, mode)?;
    store.record_upload(&history_entry(
        source,
        UploadType::Products,
        records.len(),
        Some(mode),
    ))?;
    info!(count = records.len(), mode = mode.as_str(), "imported products");
    Ok(records.len())
}

fn apply_products(store: &Store, records: &[Product], mode: ImportMode) -> Result<()> {
    match mode {
        ImportMode::Overwrite => store.replace_products(records),
        ImportMode::Merge => {
            let merged = merge_products_by_code(&store.products()?, records);
            store.replace_products(&merged)
        }
    }
}

/// Catalog sync: names only. Stock, target and memo of existing codes are
/// never disturbed by this flow.
pub fn import_product_master(
    store: &Store,
    records: &[Product],
    source: UploadSource,
) -> Result<usize> {
    if records.is_empty() {
        return Ok(0);
    }
    let merged = merge_product_master(&store.products()?, records);
    store.replace_products(&merged)?;
    store.record_upload(&history_entry(
        source,
        UploadType::ProductMaster,
        records.len(),
        None,
    ))?;
    info!(count = records.len(), "imported product master");
    Ok(records.len())
}

pub fn import_sales(store: &Store, records: &[SalesRecord], source: UploadSource) -> Result<usize> {
    if records.is_empty() {
        return Ok(0);
    }
    store.append_sales(records)?;
    store.record_upload(&history_entry(source, UploadType::Sales, records.len(), None))?;
    info!(count = records.len(), "imported sales records");
    Ok(records.len())
}

/// Returns upload: a sales batch with every record's channel forced to
/// `Return`, whatever tag the file carried.
pub fn import_returns(
    store: &Store,
    records: &[SalesRecord],
    source: UploadSource,
) -> Result<usize> {
    if records.is_empty() {
        return Ok(0);
    }
    let returns: Vec<SalesRecord> = records
        .iter()
        .map(|record| SalesRecord {
            channel: SalesChannel::Return,
            ..record.clone()
        })
        .collect();
    store.append_sales(&returns)?;
    store.record_upload(&history_entry(
        source,
        UploadType::Returns,
        returns.len(),
        None,
    ))?;
    info!(count = returns.len(), "imported return records");
    Ok(returns.len())
}

pub fn import_incoming(
    store: &Store,
    records: &[IncomingRecord],
    source: UploadSource,
) -> Result<usize> {
    if records.is_empty() {
        return Ok(0);
    }
    store.append_incoming(records)?;
    store.record_upload(&history_entry(
        source,
        UploadType::Incoming,
        records.len(),
        None,
    ))?;
    info!(count = records.len(), "imported incoming records");
    Ok(records.len())
}

/// Multi-sheet upload: products per the chosen mode, sales and incoming
/// appended, one audit entry for the whole workbook.
pub fn import_workbook(
    store: &Store,
    workbook: &WorkbookImport,
    mode: ImportMode,
    source: UploadSource,
) -> Result<usize> {
    let total = workbook.products.len() + workbook.sales.len() + workbook.incoming.len();
    if total == 0 {
        return Ok(0);
    }
    if !workbook.products.is_empty() {
        apply_products(store, &workbook.products, mode)?;
    }
    store.append_sales(&workbook.sales)?;
    store.append_incoming(&workbook.incoming)?;
    store.record_upload(&history_entry(source, UploadType::All, total, Some(mode)))?;
    info!(
        products = workbook.products.len(),
        sales = workbook.sales.len(),
        incoming = workbook.incoming.len(),
        "imported workbook"
    );
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Store {
        Store::open_in_memory().expect("open in-memory store")
    }

    fn product(code: &str, name: &str, stock: i64, target: i64) -> Product {
        Product {
            product_code: code.into(),
            product_name: name.into(),
            stock,
            target_stock: target,
            memo: String::new(),
        }
    }

    fn sale(code: &str, qty: i64) -> SalesRecord {
        SalesRecord {
            order_time: "2026-01-03 10:00".into(),
            product_id: code.into(),
            order_quantity: qty,
            channel: SalesChannel::Offline,
        }
    }

    #[test]
    fn overwrite_mode_discards_the_prior_master() {
        let store = store();
        store.add_product(&product("OLD", "old", 1, 1)).unwrap();

        let count = import_products(
            &store,
            &[product("NEW", "new", 2, 2)],
            ImportMode::Overwrite,
            UploadSource::Spreadsheet,
        )
        .unwrap();

        assert_eq!(count, 1);
        let products = store.products().unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].product_code, "NEW");
    }

    #[test]
    fn merge_mode_keeps_codes_absent_from_the_batch() {
        let store = store();
        store.add_product(&product("KEEP", "keep", 1, 1)).unwrap();
        store.add_product(&product("HIT", "old", 10, 5)).unwrap();

        import_products(
            &store,
            &[product("HIT", "new", 99, 99)],
            ImportMode::Merge,
            UploadSource::Json,
        )
        .unwrap();

        let products = store.products().unwrap();
        assert_eq!(products.len(), 2);
        let hit = products.iter().find(|p| p.product_code == "HIT").unwrap();
        assert_eq!(hit.stock, 99);
        assert!(products.iter().any(|p| p.product_code == "KEEP"));
    }

    #[test]
    fn product_master_import_never_touches_quantities() {
        let store = store();
        store.add_product(&product("X", "A", 10, 5)).unwrap();

        import_product_master(
            &store,
            &[product("X", "B", 99, 99)],
            UploadSource::Json,
        )
        .unwrap();

        let products = store.products().unwrap();
        assert_eq!(products[0].product_name, "B");
        assert_eq!(products[0].stock, 10);
        assert_eq!(products[0].target_stock, 5);
    }

    #[test]
    fn returns_upload_forces_the_return_channel() {
        let store = store();
        import_returns(&store, &[sale("A", 3)], UploadSource::Json).unwrap();

        let entries = store.sales_entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].record.is_return());
        assert_eq!(entries[0].record.stock_delta(), 3);
    }

    #[test]
    fn each_import_records_one_history_entry() {
        let store = store();
        import_products(
            &store,
            &[product("A", "a", 1, 1)],
            ImportMode::Overwrite,
            UploadSource::Spreadsheet,
        )
        .unwrap();
        import_sales(&store, &[sale("A", 1)], UploadSource::Json).unwrap();
        import_incoming(
            &store,
            &[IncomingRecord {
                incoming_date: "2026-01-02".into(),
                product_code: "A".into(),
                quantity: 2,
            }],
            UploadSource::Json,
        )
        .unwrap();

        let history = store.upload_history().unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].record.kind, UploadType::Products);
        assert_eq!(history[0].record.mode, Some(ImportMode::Overwrite));
        assert_eq!(history[1].record.kind, UploadType::Sales);
        assert_eq!(history[2].record.kind, UploadType::Incoming);
        assert!(history.iter().all(|e| e.record.count > 0));
    }

    #[test]
    fn empty_batches_do_nothing() {
        let store = store();
        assert_eq!(import_sales(&store, &[], UploadSource::Json).unwrap(), 0);
        assert_eq!(
            import_workbook(&store, &WorkbookImport::default(), ImportMode::Merge, UploadSource::Json)
                .unwrap(),
            0
        );
        assert!(store.upload_history().unwrap().is_empty());
    }

    #[test]
    fn workbook_import_lands_every_sheet_and_one_audit_entry() {
        let store = store();
        let workbook = WorkbookImport {
            products: vec![product("A", "a", 5, 5)],
            sales: vec![sale("A", 1)],
            incoming: vec![IncomingRecord {
                incoming_date: "2026-01-02".into(),
                product_code: "A".into(),
                quantity: 2,
            }],
        };
        let count =
            import_workbook(&store, &workbook, ImportMode::Overwrite, UploadSource::Spreadsheet)
                .unwrap();

        assert_eq!(count, 3);
        assert_eq!(store.products().unwrap().len(), 1);
        assert_eq!(store.sales_entries().unwrap().len(), 1);
        assert_eq!(store.incoming_entries().unwrap().len(), 1);

        let history = store.upload_history().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].record.kind, UploadType::All);
        assert_eq!(history[0].record.count, 3);
    }
}
