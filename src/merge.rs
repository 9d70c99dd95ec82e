//! Product-master merge policies used during import.
//!
//! The two policies stay separate: replace-by-code swaps the whole record,
//! the master-only upsert touches nothing but the display name.

use std::collections::HashMap;

use crate::models::Product;

/// Merge for "initial data" uploads in merge mode: union of codes, the
/// incoming record winning wholesale on conflict. Existing rows keep their
/// relative order; unseen codes append in incoming order.
pub fn merge_products_by_code(existing: &[Product], incoming: &[Product]) -> Vec<Product> {
    let mut merged: Vec<Product> = existing.to_vec();
    let mut index_by_code: HashMap<String, usize> = merged
        .iter()
        .enumerate()
        .map(|(index, product)| (product.product_code.clone(), index))
        .collect();

    for product in incoming {
        match index_by_code.get(&product.product_code) {
            Some(&index) => merged[index] = product.clone(),
            None => {
                index_by_code.insert(product.product_code.clone(), merged.len());
                merged.push(product.clone());
            }
        }
    }
    merged
}

/// Merge for "product master" uploads: updates the name only (and only when
/// the incoming name is non-empty), preserving stock, target and memo. Codes
/// not seen before become bare products with zero stock and target.
pub fn merge_product_master(existing: &[Product], incoming: &[Product]) -> Vec<Product> {
    let mut merged: Vec<Product> = existing.to_vec();
    let mut index_by_code: HashMap<String, usize> = merged
        .iter()
        .enumerate()
        .map(|(index, product)| (product.product_code.clone(), index))
        .collect();

    for product in incoming {
        match index_by_code.get(&product.product_code) {
            Some(&index) => {
                if !product.product_name.is_empty() {
                    merged[index].product_name = product.product_name.clone();
                }
            }
            None => {
                let mut created = Product::bare(&product.product_code);
                created.product_name = product.product_name.clone();
                index_by_code.insert(product.product_code.clone(), merged.len());
                merged.push(created);
            }
        }
    }
    merged
}
