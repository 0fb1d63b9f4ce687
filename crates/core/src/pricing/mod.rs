//! Background product price refresh

mod service;

pub use service::{PriceRefreshRequest, PriceRefreshService};
