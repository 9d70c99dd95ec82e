//! Core of a local-first inventory tracker: a product master plus sales and
//! incoming ledgers persisted in embedded SQLite, pure stock-summary
//! derivation, import merge policies and a JSON backup codec.
//!
//! The [`Store`] handle owns the four collections; every other piece is a
//! pure function over what it reads. UI, charting and file parsing live
//! outside this crate and consume its outputs.

pub mod backup;
pub mod error;
pub mod import;
pub mod merge;
pub mod models;
pub mod store;
pub mod summary;

pub use backup::{export_snapshot, import_snapshot, RestoreCounts, Snapshot};
pub use error::{AppError, Result};
pub use import::{
    import_incoming, import_product_master, import_products, import_returns, import_sales,
    import_workbook, WorkbookImport,
};
pub use merge::{merge_product_master, merge_products_by_code};
pub use models::{
    ImportMode, IncomingEntry, IncomingRecord, Product, ReorderItem, SalesChannel, SalesEntry,
    SalesRecord, StockSummary, UploadHistoryEntry, UploadHistoryRecord, UploadSource, UploadType,
};
pub use store::Store;
pub use summary::{calculate_stock_summary, reorder_items};
