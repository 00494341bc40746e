pub mod config;
pub mod derived;
pub mod dimension;
pub mod engine;
pub mod error;
pub mod filter;
pub mod hierarchy;
pub mod links;
pub mod report;
