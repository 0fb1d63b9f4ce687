//! Application constants
//!
//! Centralized location for all domain-level constants used throughout the
//! application.

// Cache configuration
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;
pub const DEFAULT_CACHE_MAX_CAPACITY: u64 = 10_000;

// Cache key prefixes, joined with ':'
pub const STOCK_ITEM_KEY_PREFIX: &str = "stock_item";
pub const STOCK_ITEMS_LIST_KEY: &str = "stock_items:list";
pub const PRODUCT_KEY_PREFIX: &str = "product";
pub const STATS_PRODUCTS_KEY: &str = "stats:products";
pub const STATS_WAREHOUSES_KEY: &str = "stats:warehouses";

// Listing
pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 500;

// Background tasks
pub const UPDATE_PRODUCT_PRICE_TASK: &str = "update_product_price";

// Vendor defaults
pub const DEFAULT_VENDOR_BASE_URL: &str = "http://127.0.0.1:5000/vendor-mock";
pub const DEFAULT_VENDOR_NAME: &str = "vendor";

/// Build a cache key from a prefix and parts, `prefix:part:part`.
pub fn cache_key(prefix: &str, parts: &[&dyn std::fmt::Display]) -> String {
    let mut key = prefix.to_string();
    for part in parts {
        key.push(':');
        key.push_str(&part.to_string());
    }
    key
}

pub fn stock_item_key(id: i64) -> String {
    cache_key(STOCK_ITEM_KEY_PREFIX, &[&id])
}

pub fn product_key(id: i64) -> String {
    cache_key(PRODUCT_KEY_PREFIX, &[&id])
}
