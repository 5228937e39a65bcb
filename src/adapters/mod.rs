//! Adapters implementing the domain ports.

pub mod geo;
pub mod notify;
pub mod sqlite;
