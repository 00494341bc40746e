pub mod backend;
pub mod queries;
pub mod report_impl;
pub mod schema;
pub mod tenants;

pub use backend::{DuckDbBackend, NewVisit};

/// Re-export the `duckdb` crate so consumers (especially tests) can use
/// `trafficlens_duckdb::duckdb::params!` without an extra dependency.
pub use duckdb;
