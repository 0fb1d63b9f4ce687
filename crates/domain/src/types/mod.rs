//! Domain types and models

pub mod inventory;
pub mod product;

pub use inventory::{
    aggregate_transfers, NewStockItem, Page, ProductStockTotal, StockFilter, StockItem,
    TransferOperation, Version, Warehouse, WarehouseStockTotal,
};
pub use product::{validate_price, NewProduct, PriceQuote, PriceRefreshOutcome, Product};
