pub mod dimensions;
pub mod health;
pub mod query;
pub mod records;
pub mod report;
