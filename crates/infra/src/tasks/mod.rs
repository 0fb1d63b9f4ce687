//! Background task execution

pub mod price_refresh;
pub mod queue;

pub use price_refresh::register_price_refresh;
pub use queue::InProcessTaskQueue;
