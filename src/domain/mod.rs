//! Domain layer for the peer validation engine
//!
//! This module contains core business logic, domain models, and the ports
//! that adapters implement.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
