pub mod bot_filters;
pub mod facts;
pub mod records;
pub(crate) mod sql;
