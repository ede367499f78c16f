pub mod engine;
pub mod query;
