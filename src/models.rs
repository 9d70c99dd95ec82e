use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Product master entry, keyed by `product_code`.
///
/// `stock` is the initial stock captured at creation; current stock is always
/// derived from it together with the ledgers, never written back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub product_code: String,
    #[serde(default)]
    pub product_name: String,
    #[serde(default)]
    pub stock: i64,
    #[serde(default)]
    pub target_stock: i64,
    #[serde(default)]
    pub memo: String,
}

impl Product {
    /// Bare master entry auto-created when a ledger references an unknown code.
    pub fn bare(product_code: &str) -> Self {
        Self {
            product_code: product_code.to_string(),
            product_name: String::new(),
            stock: 0,
            target_stock: 0,
            memo: String::new(),
        }
    }
}

/// Sales channel classification. Anything outside the closed set decodes to
/// `Offline`, so a record in memory can never hold an out-of-set tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SalesChannel {
    #[default]
    Offline,
    Vendor,
    Return,
}

impl SalesChannel {
    pub fn normalize(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "offline" => SalesChannel::Offline,
            "vendor" => SalesChannel::Vendor,
            "return" => SalesChannel::Return,
            _ => SalesChannel::Offline,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SalesChannel::Offline => "offline",
            SalesChannel::Vendor => "vendor",
            SalesChannel::Return => "return",
        }
    }
}

impl Serialize for SalesChannel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SalesChannel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = Option::<String>::deserialize(deserializer)?;
        Ok(SalesChannel::normalize(tag.as_deref().unwrap_or("")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesRecord {
    pub order_time: String,
    pub product_id: String,
    pub order_quantity: i64,
    #[serde(default)]
    pub channel: SalesChannel,
}

impl SalesRecord {
    pub fn is_return(&self) -> bool {
        self.channel == SalesChannel::Return
    }

    /// Display quantity, non-negative regardless of how the value was stored.
    pub fn unsigned_quantity(&self) -> i64 {
        self.order_quantity.abs()
    }

    /// Effect on current stock: returns add back, every other channel subtracts.
    pub fn stock_delta(&self) -> i64 {
        if self.is_return() {
            self.unsigned_quantity()
        } else {
            -self.unsigned_quantity()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingRecord {
    pub incoming_date: String,
    pub product_code: String,
    #[serde(default)]
    pub quantity: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UploadSource {
    Spreadsheet,
    #[default]
    Json,
}

impl UploadSource {
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "spreadsheet" => UploadSource::Spreadsheet,
            _ => UploadSource::Json,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UploadSource::Spreadsheet => "spreadsheet",
            UploadSource::Json => "json",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UploadType {
    #[default]
    All,
    Products,
    ProductMaster,
    Sales,
    Returns,
    Incoming,
}

impl UploadType {
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim() {
            "products" => UploadType::Products,
            "productMaster" => UploadType::ProductMaster,
            "sales" => UploadType::Sales,
            "returns" => UploadType::Returns,
            "incoming" => UploadType::Incoming,
            _ => UploadType::All,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UploadType::All => "all",
            UploadType::Products => "products",
            UploadType::ProductMaster => "productMaster",
            UploadType::Sales => "sales",
            UploadType::Returns => "returns",
            UploadType::Incoming => "incoming",
        }
    }
}

impl Serialize for UploadSource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for UploadSource {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = Option::<String>::deserialize(deserializer)?;
        Ok(UploadSource::from_tag(tag.as_deref().unwrap_or("")))
    }
}

impl Serialize for UploadType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for UploadType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = Option::<String>::deserialize(deserializer)?;
        Ok(UploadType::from_tag(tag.as_deref().unwrap_or("")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    Merge,
    Overwrite,
}

impl ImportMode {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "merge" => Some(ImportMode::Merge),
            "overwrite" => Some(ImportMode::Overwrite),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImportMode::Merge => "merge",
            ImportMode::Overwrite => "overwrite",
        }
    }
}

/// Append-only audit trail entry; informational, never read by the summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadHistoryRecord {
    #[serde(default)]
    pub uploaded_at: String,
    #[serde(default)]
    pub source: UploadSource,
    #[serde(rename = "type", default)]
    pub kind: UploadType,
    #[serde(default)]
    pub count: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<ImportMode>,
}

/// Stored ledger row: the record plus its stable key, assigned once at append
/// and never reused. Deletion targets the key, not a list position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SalesEntry {
    pub id: i64,
    #[serde(flatten)]
    pub record: SalesRecord,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IncomingEntry {
    pub id: i64,
    #[serde(flatten)]
    pub record: IncomingRecord,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadHistoryEntry {
    pub id: i64,
    #[serde(flatten)]
    pub record: UploadHistoryRecord,
}

/// Derived per-product stock view; computed fresh on every read, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockSummary {
    pub product_code: String,
    pub product_name: String,
    pub initial_stock: i64,
    pub target_stock: i64,
    pub total_incoming: i64,
    pub total_sales: i64,
    pub total_returns: i64,
    pub current_stock: i64,
    pub gap: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderItem {
    #[serde(flatten)]
    pub summary: StockSummary,
    pub reorder_qty: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sale(qty: i64, channel: SalesChannel) -> SalesRecord {
        SalesRecord {
            order_time: "2026-01-03 10:00".into(),
            product_id: "P1".into(),
            order_quantity: qty,
            channel,
        }
    }

    #[test]
    fn channel_tags_outside_the_set_normalize_to_offline() {
        assert_eq!(SalesChannel::normalize("offline"), SalesChannel::Offline);
        assert_eq!(SalesChannel::normalize(" Vendor "), SalesChannel::Vendor);
        assert_eq!(SalesChannel::normalize("RETURN"), SalesChannel::Return);
        assert_eq!(SalesChannel::normalize(""), SalesChannel::Offline);
        assert_eq!(SalesChannel::normalize("door-to-door"), SalesChannel::Offline);
    }

    #[test]
    fn sales_subtract_and_returns_add() {
        assert_eq!(sale(4, SalesChannel::Offline).stock_delta(), -4);
        assert_eq!(sale(4, SalesChannel::Vendor).stock_delta(), -4);
        assert_eq!(sale(4, SalesChannel::Return).stock_delta(), 4);
    }

    #[test]
    fn negative_stored_quantity_is_displayed_unsigned() {
        let record = sale(-7, SalesChannel::Offline);
        assert_eq!(record.unsigned_quantity(), 7);
        assert_eq!(record.stock_delta(), -7);
        assert_eq!(sale(-7, SalesChannel::Return).stock_delta(), 7);
    }

    #[test]
    fn missing_or_unknown_channel_decodes_to_offline() {
        let decoded: SalesRecord = serde_json::from_str(
            r#"{"orderTime":"2026-01-03","productId":"P1","orderQuantity":2}"#,
        )
        .unwrap();
        assert_eq!(decoded.channel, SalesChannel::Offline);

        let decoded: SalesRecord = serde_json::from_str(
            r#"{"orderTime":"2026-01-03","productId":"P1","orderQuantity":2,"channel":"phone"}"#,
        )
        .unwrap();
        assert_eq!(decoded.channel, SalesChannel::Offline);

        let decoded: SalesRecord = serde_json::from_str(
            r#"{"orderTime":"2026-01-03","productId":"P1","orderQuantity":2,"channel":"return"}"#,
        )
        .unwrap();
        assert_eq!(decoded.channel, SalesChannel::Return);
    }

    #[test]
    fn upload_history_round_trips_through_json() {
        let record = UploadHistoryRecord {
            uploaded_at: "2026-02-01T09:00:00Z".into(),
            source: UploadSource::Spreadsheet,
            kind: UploadType::Products,
            count: 12,
            mode: Some(ImportMode::Overwrite),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "products");
        assert_eq!(json["source"], "spreadsheet");
        let back: UploadHistoryRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
