//! Durable record store over embedded SQLite: one table per collection,
//! stable integer keys for the ledgers, transactional bulk operations.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::backup::{RestoreCounts, Snapshot};
use crate::error::{AppError, Result};
use crate::models::{
    ImportMode, IncomingEntry, IncomingRecord, Product, SalesChannel, SalesEntry, SalesRecord,
    StockSummary, UploadHistoryEntry, UploadHistoryRecord, UploadSource, UploadType,
};
use crate::summary::calculate_stock_summary;

/// Handle to the four record collections.
///
/// An unavailable store (no storage backend in the current environment)
/// resolves every read to an empty list and every write to a no-op instead of
/// raising, so non-interactive contexts stay inert.
pub struct Store {
    conn: Option<Mutex<Connection>>,
}

impl Store {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA journal_mode = WAL;")?;
        Self::run_migrations(&conn)?;
        Ok(Self {
            conn: Some(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::run_migrations(&conn)?;
        Ok(Self {
            conn: Some(Mutex::new(conn)),
        })
    }

    /// Store for environments without a storage backend.
    pub fn unavailable() -> Self {
        Self { conn: None }
    }

    pub fn is_available(&self) -> bool {
        self.conn.is_some()
    }

    fn lock(&self) -> Option<MutexGuard<'_, Connection>> {
        self.conn
            .as_ref()
            .map(|conn| conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
    }

    fn run_migrations(conn: &Connection) -> Result<()> {
        // AUTOINCREMENT ledger keys are assigned once and never reused.
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS products (
                product_code TEXT PRIMARY KEY,
                product_name TEXT NOT NULL DEFAULT '',
                stock INTEGER NOT NULL DEFAULT 0,
                target_stock INTEGER NOT NULL DEFAULT 0,
                memo TEXT NOT NULL DEFAULT ''
            );

            CREATE TABLE IF NOT EXISTS sales_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                order_time TEXT NOT NULL,
                product_id TEXT NOT NULL,
                order_quantity INTEGER NOT NULL,
                channel TEXT NOT NULL DEFAULT 'offline'
            );

            CREATE TABLE IF NOT EXISTS incoming_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                incoming_date TEXT NOT NULL,
                product_code TEXT NOT NULL,
                quantity INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS upload_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                uploaded_at TEXT NOT NULL,
                source TEXT NOT NULL,
                kind TEXT NOT NULL,
                count INTEGER NOT NULL,
                mode TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_sales_product ON sales_records(product_id);
            CREATE INDEX IF NOT EXISTS idx_incoming_product ON incoming_records(product_code);
            ",
        )?;
        Ok(())
    }

    // ---- product master -------------------------------------------------

    pub fn products(&self) -> Result<Vec<Product>> {
        let Some(conn) = self.lock() else {
            return Ok(Vec::new());
        };
        Self::fetch_products(&conn)
    }

    fn fetch_products(conn: &Connection) -> Result<Vec<Product>> {
        let mut stmt = conn.prepare(
            "SELECT product_code, product_name, stock, target_stock, memo
             FROM products
             ORDER BY product_code",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Product {
                product_code: row.get(0)?,
                product_name: row.get(1)?,
                stock: row.get(2)?,
                target_stock: row.get(3)?,
                memo: row.get(4)?,
            })
        })?;

        let mut products = Vec::new();
        for row in rows {
            products.push(row?);
        }
        Ok(products)
    }

    /// Discards the whole master and inserts the given list in one
    /// transaction. Duplicate codes in the input upsert, last write winning.
    pub fn replace_products(&self, records: &[Product]) -> Result<()> {
        let Some(mut conn) = self.lock() else {
            return Ok(());
        };
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM products", [])?;
        for product in records {
            Self::upsert_product(&tx, product)?;
        }
        tx.commit()?;
        debug!(count = records.len(), "replaced product master");
        Ok(())
    }

    fn upsert_product(conn: &Connection, product: &Product) -> Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO products (product_code, product_name, stock, target_stock, memo)
             VALUES (?, ?, ?, ?, ?)",
            params![
                product.product_code,
                product.product_name,
                product.stock,
                product.target_stock,
                product.memo
            ],
        )?;
        Ok(())
    }

    /// Manual add. Rejects empty codes and, before any mutation, codes that
    /// already exist; edits to an existing code go through
    /// [`Store::update_product`] instead.
    pub fn add_product(&self, product: &Product) -> Result<()> {
        if product.product_code.trim().is_empty() {
            return Err(AppError::Validation("product code must not be empty".into()));
        }
        let Some(conn) = self.lock() else {
            return Ok(());
        };
        let exists = conn
            .query_row(
                "SELECT 1 FROM products WHERE product_code = ?",
                params![product.product_code],
                |_| Ok(()),
            )
            .optional()?;
        if exists.is_some() {
            return Err(AppError::DuplicateProduct(product.product_code.clone()));
        }
        Self::upsert_product(&conn, product)?;
        Ok(())
    }

    pub fn update_product(&self, product: &Product) -> Result<()> {
        let Some(conn) = self.lock() else {
            return Ok(());
        };
        let changed = conn.execute(
            "UPDATE products SET product_name = ?, stock = ?, target_stock = ?, memo = ?
             WHERE product_code = ?",
            params![
                product.product_name,
                product.stock,
                product.target_stock,
                product.memo,
                product.product_code
            ],
        )?;
        if changed == 0 {
            return Err(AppError::Validation(format!(
                "unknown product code: {}",
                product.product_code
            )));
        }
        Ok(())
    }

    pub fn update_memo(&self, product_code: &str, memo: &str) -> Result<()> {
        let Some(conn) = self.lock() else {
            return Ok(());
        };
        let changed = conn.execute(
            "UPDATE products SET memo = ? WHERE product_code = ?",
            params![memo, product_code],
        )?;
        if changed == 0 {
            return Err(AppError::Validation(format!(
                "unknown product code: {product_code}"
            )));
        }
        Ok(())
    }

    pub fn delete_product(&self, product_code: &str) -> Result<()> {
        let Some(conn) = self.lock() else {
            return Ok(());
        };
        conn.execute(
            "DELETE FROM products WHERE product_code = ?",
            params![product_code],
        )?;
        Ok(())
    }

    pub fn clear_products(&self) -> Result<()> {
        let Some(conn) = self.lock() else {
            return Ok(());
        };
        conn.execute("DELETE FROM products", [])?;
        Ok(())
    }

    // ---- sales ledger ---------------------------------------------------

    pub fn sales_entries(&self) -> Result<Vec<SalesEntry>> {
        let Some(conn) = self.lock() else {
            return Ok(Vec::new());
        };
        let mut stmt = conn.prepare(
            "SELECT id, order_time, product_id, order_quantity, channel
             FROM sales_records
             ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            let channel: String = row.get(4)?;
            Ok(SalesEntry {
                id: row.get(0)?,
                record: SalesRecord {
                    order_time: row.get(1)?,
                    product_id: row.get(2)?,
                    order_quantity: row.get(3)?,
                    channel: SalesChannel::normalize(&channel),
                },
            })
        })?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    pub fn append_sales(&self, records: &[SalesRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let Some(mut conn) = self.lock() else {
            return Ok(());
        };
        let tx = conn.transaction()?;
        for record in records {
            Self::insert_sales(&tx, record)?;
        }
        tx.commit()?;
        debug!(count = records.len(), "appended sales records");
        Ok(())
    }

    fn insert_sales(conn: &Connection, record: &SalesRecord) -> Result<()> {
        conn.execute(
            "INSERT INTO sales_records (order_time, product_id, order_quantity, channel)
             VALUES (?, ?, ?, ?)",
            params![
                record.order_time,
                record.product_id,
                record.order_quantity,
                record.channel.as_str()
            ],
        )?;
        Ok(())
    }

    pub fn replace_sales(&self, records: &[SalesRecord]) -> Result<()> {
        let Some(mut conn) = self.lock() else {
            return Ok(());
        };
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM sales_records", [])?;
        for record in records {
            Self::insert_sales(&tx, record)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Removes the row with the given stable id; absent ids are a no-op.
    pub fn delete_sales_record(&self, id: i64) -> Result<()> {
        let Some(conn) = self.lock() else {
            return Ok(());
        };
        conn.execute("DELETE FROM sales_records WHERE id = ?", params![id])?;
        Ok(())
    }

    pub fn clear_sales(&self) -> Result<()> {
        let Some(conn) = self.lock() else {
            return Ok(());
        };
        conn.execute("DELETE FROM sales_records", [])?;
        Ok(())
    }

    /// Removes exactly the return-channel rows, leaving ordinary and vendor
    /// sales untouched.
    pub fn clear_return_sales(&self) -> Result<()> {
        let Some(conn) = self.lock() else {
            return Ok(());
        };
        conn.execute(
            "DELETE FROM sales_records WHERE channel = ?",
            params![SalesChannel::Return.as_str()],
        )?;
        Ok(())
    }

    // ---- incoming ledger ------------------------------------------------

    pub fn incoming_entries(&self) -> Result<Vec<IncomingEntry>> {
        let Some(conn) = self.lock() else {
            return Ok(Vec::new());
        };
        let mut stmt = conn.prepare(
            "SELECT id, incoming_date, product_code, quantity
             FROM incoming_records
             ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(IncomingEntry {
                id: row.get(0)?,
                record: IncomingRecord {
                    incoming_date: row.get(1)?,
                    product_code: row.get(2)?,
                    quantity: row.get(3)?,
                },
            })
        })?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    /// Appends incoming rows and, in the same transaction, auto-creates bare
    /// master entries (zero stock and target) for codes the master does not
    /// know yet, so later summaries don't silently drop them.
    pub fn append_incoming(&self, records: &[IncomingRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let Some(mut conn) = self.lock() else {
            return Ok(());
        };
        let tx = conn.transaction()?;
        let mut created = 0usize;
        for record in records {
            if !record.product_code.is_empty() {
                created += tx.execute(
                    "INSERT OR IGNORE INTO products (product_code) VALUES (?)",
                    params![record.product_code],
                )?;
            }
            Self::insert_incoming(&tx, record)?;
        }
        tx.commit()?;
        if created > 0 {
            info!(created, "auto-created bare products for incoming codes");
        }
        debug!(count = records.len(), "appended incoming records");
        Ok(())
    }

    fn insert_incoming(conn: &Connection, record: &IncomingRecord) -> Result<()> {
        conn.execute(
            "INSERT INTO incoming_records (incoming_date, product_code, quantity)
             VALUES (?, ?, ?)",
            params![record.incoming_date, record.product_code, record.quantity],
        )?;
        Ok(())
    }

    pub fn replace_incoming(&self, records: &[IncomingRecord]) -> Result<()> {
        let Some(mut conn) = self.lock() else {
            return Ok(());
        };
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM incoming_records", [])?;
        for record in records {
            Self::insert_incoming(&tx, record)?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn delete_incoming_record(&self, id: i64) -> Result<()> {
        let Some(conn) = self.lock() else {
            return Ok(());
        };
        conn.execute("DELETE FROM incoming_records WHERE id = ?", params![id])?;
        Ok(())
    }

    pub fn clear_incoming(&self) -> Result<()> {
        let Some(conn) = self.lock() else {
            return Ok(());
        };
        conn.execute("DELETE FROM incoming_records", [])?;
        Ok(())
    }

    // ---- upload history -------------------------------------------------

    pub fn upload_history(&self) -> Result<Vec<UploadHistoryEntry>> {
        let Some(conn) = self.lock() else {
            return Ok(Vec::new());
        };
        let mut stmt = conn.prepare(
            "SELECT id, uploaded_at, source, kind, count, mode
             FROM upload_history
             ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            let source: String = row.get(2)?;
            let kind: String = row.get(3)?;
            let mode: Option<String> = row.get(5)?;
            Ok(UploadHistoryEntry {
                id: row.get(0)?,
                record: UploadHistoryRecord {
                    uploaded_at: row.get(1)?,
                    source: UploadSource::from_tag(&source),
                    kind: UploadType::from_tag(&kind),
                    count: row.get(4)?,
                    mode: mode.as_deref().and_then(ImportMode::from_tag),
                },
            })
        })?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    pub fn record_upload(&self, record: &UploadHistoryRecord) -> Result<()> {
        let Some(conn) = self.lock() else {
            return Ok(());
        };
        Self::insert_upload(&conn, record)
    }

    fn insert_upload(conn: &Connection, record: &UploadHistoryRecord) -> Result<()> {
        conn.execute(
            "INSERT INTO upload_history (uploaded_at, source, kind, count, mode)
             VALUES (?, ?, ?, ?, ?)",
            params![
                record.uploaded_at,
                record.source.as_str(),
                record.kind.as_str(),
                record.count,
                record.mode.map(|mode| mode.as_str())
            ],
        )?;
        Ok(())
    }

    pub fn clear_upload_history(&self) -> Result<()> {
        let Some(conn) = self.lock() else {
            return Ok(());
        };
        conn.execute("DELETE FROM upload_history", [])?;
        Ok(())
    }

    // ---- bulk -----------------------------------------------------------

    /// Empties all four collections in one transaction; a failure leaves no
    /// partial clear visible.
    pub fn clear_all(&self) -> Result<()> {
        let Some(mut conn) = self.lock() else {
            return Ok(());
        };
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM products", [])?;
        tx.execute("DELETE FROM sales_records", [])?;
        tx.execute("DELETE FROM incoming_records", [])?;
        tx.execute("DELETE FROM upload_history", [])?;
        tx.commit()?;
        info!("cleared all collections");
        Ok(())
    }

    /// Replaces all four collections with the snapshot contents in one
    /// transaction. A restore is a full state replacement, not a merge.
    pub fn restore(&self, snapshot: &Snapshot) -> Result<RestoreCounts> {
        let counts = RestoreCounts {
            products: snapshot.products.len(),
            sales: snapshot.sales_records.len(),
            incoming: snapshot.incoming_records.len(),
        };
        let Some(mut conn) = self.lock() else {
            return Ok(counts);
        };
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM products", [])?;
        tx.execute("DELETE FROM sales_records", [])?;
        tx.execute("DELETE FROM incoming_records", [])?;
        tx.execute("DELETE FROM upload_history", [])?;
        for product in &snapshot.products {
            Self::upsert_product(&tx, product)?;
        }
        for record in &snapshot.sales_records {
            Self::insert_sales(&tx, record)?;
        }
        for record in &snapshot.incoming_records {
            Self::insert_incoming(&tx, record)?;
        }
        for record in &snapshot.upload_history {
            Self::insert_upload(&tx, record)?;
        }
        tx.commit()?;
        info!(
            products = counts.products,
            sales = counts.sales,
            incoming = counts.incoming,
            "restored snapshot"
        );
        Ok(counts)
    }

    // ---- derived reads --------------------------------------------------

    pub fn stock_summary(&self) -> Result<Vec<StockSummary>> {
        let products = self.products()?;
        let sales: Vec<SalesRecord> = self
            .sales_entries()?
            .into_iter()
            .map(|entry| entry.record)
            .collect();
        let incoming: Vec<IncomingRecord> = self
            .incoming_entries()?
            .into_iter()
            .map(|entry| entry.record)
            .collect();
        Ok(calculate_stock_summary(&products, &sales, &incoming))
    }
}
