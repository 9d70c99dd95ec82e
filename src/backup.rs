//! Backup snapshot codec: one self-describing object carrying all four
//! collections, with per-field coercion on the way back in.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::{AppError, Result};
use crate::models::{
    ImportMode, IncomingRecord, Product, SalesChannel, SalesRecord, UploadHistoryRecord,
    UploadSource, UploadType,
};
use crate::store::Store;

/// Transferable snapshot of the whole store. Ledger rows are carried in their
/// plain record shape; storage ids are local to a store and never exported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub sales_records: Vec<SalesRecord>,
    #[serde(default)]
    pub incoming_records: Vec<IncomingRecord>,
    #[serde(default)]
    pub upload_history: Vec<UploadHistoryRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RestoreCounts {
    pub products: usize,
    pub sales: usize,
    pub incoming: usize,
}

pub fn export_snapshot(store: &Store) -> Result<Snapshot> {
    Ok(Snapshot {
        products: store.products()?,
        sales_records: store
            .sales_entries()?
            .into_iter()
            .map(|entry| entry.record)
            .collect(),
        incoming_records: store
            .incoming_entries()?
            .into_iter()
            .map(|entry| entry.record)
            .collect(),
        upload_history: store
            .upload_history()?
            .into_iter()
            .map(|entry| entry.record)
            .collect(),
    })
}

/// Parses and restores a snapshot, replacing all four collections. The store
/// is untouched when the input is not a recognizable backup.
pub fn import_snapshot(store: &Store, value: &Value) -> Result<RestoreCounts> {
    let snapshot = Snapshot::from_value(value)?;
    store.restore(&snapshot)
}

impl Snapshot {
    /// Lenient decoder for backup files.
    ///
    /// Fails with [`AppError::InvalidBackup`] when no recognized top-level key
    /// holds an array. Otherwise each candidate row is coerced field by field
    /// (missing or wrong-typed values fall back to empty string / zero) and
    /// rows below minimum validity are dropped, never aborting the batch:
    /// a product needs a code, a sale needs product id and order time, an
    /// incoming row needs product code and date.
    pub fn from_value(value: &Value) -> Result<Self> {
        let products = array_field(value, "products", None);
        let sales = array_field(value, "salesRecords", Some("sales"));
        let incoming = array_field(value, "incomingRecords", Some("incoming"));
        let history = array_field(value, "uploadHistory", None);

        if products.is_none() && sales.is_none() && incoming.is_none() && history.is_none() {
            return Err(AppError::InvalidBackup);
        }

        let mut dropped = 0usize;
        let snapshot = Snapshot {
            products: coerce_rows(products, coerce_product, &mut dropped),
            sales_records: coerce_rows(sales, coerce_sales, &mut dropped),
            incoming_records: coerce_rows(incoming, coerce_incoming, &mut dropped),
            upload_history: history
                .map(|rows| rows.iter().map(coerce_history).collect())
                .unwrap_or_default(),
        };
        if dropped > 0 {
            warn!(dropped, "dropped records below minimum validity from backup");
        }
        Ok(snapshot)
    }
}

fn array_field<'a>(value: &'a Value, key: &str, legacy: Option<&str>) -> Option<&'a Vec<Value>> {
    value
        .get(key)
        .and_then(Value::as_array)
        .or_else(|| legacy.and_then(|key| value.get(key).and_then(Value::as_array)))
}

fn coerce_rows<T>(
    rows: Option<&Vec<Value>>,
    coerce: impl Fn(&Value) -> Option<T>,
    dropped: &mut usize,
) -> Vec<T> {
    let Some(rows) = rows else {
        return Vec::new();
    };
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        match coerce(row) {
            Some(record) => out.push(record),
            None => *dropped += 1,
        }
    }
    out
}

fn str_field(value: &Value, key: &str) -> String {
    match value.get(key) {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Number(number)) => number.to_string(),
        _ => String::new(),
    }
}

fn int_field(value: &Value, key: &str) -> i64 {
    match value.get(key) {
        Some(Value::Number(number)) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|float| float as i64))
            .unwrap_or(0),
        Some(Value::String(text)) => text.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

fn coerce_product(value: &Value) -> Option<Product> {
    let product_code = str_field(value, "productCode");
    if product_code.is_empty() {
        return None;
    }
    Some(Product {
        product_code,
        product_name: str_field(value, "productName"),
        stock: int_field(value, "stock"),
        target_stock: int_field(value, "targetStock"),
        memo: str_field(value, "memo"),
    })
}

fn coerce_sales(value: &Value) -> Option<SalesRecord> {
    let order_time = str_field(value, "orderTime");
    let product_id = str_field(value, "productId");
    if order_time.is_empty() || product_id.is_empty() {
        return None;
    }
    Some(SalesRecord {
        order_time,
        product_id,
        order_quantity: int_field(value, "orderQuantity"),
        channel: SalesChannel::normalize(&str_field(value, "channel")),
    })
}

fn coerce_incoming(value: &Value) -> Option<IncomingRecord> {
    let incoming_date = str_field(value, "incomingDate");
    let product_code = str_field(value, "productCode");
    if incoming_date.is_empty() || product_code.is_empty() {
        return None;
    }
    Some(IncomingRecord {
        incoming_date,
        product_code,
        quantity: int_field(value, "quantity"),
    })
}

fn coerce_history(value: &Value) -> UploadHistoryRecord {
    UploadHistoryRecord {
        uploaded_at: str_field(value, "uploadedAt"),
        source: UploadSource::from_tag(&str_field(value, "source")),
        kind: UploadType::from_tag(&str_field(value, "type")),
        count: int_field(value, "count"),
        mode: ImportMode::from_tag(&str_field(value, "mode")),
    }
}
