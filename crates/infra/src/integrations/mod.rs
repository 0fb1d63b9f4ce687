//! External service integrations

pub mod vendor;
