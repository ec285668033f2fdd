pub mod aggregator;
pub mod analyzer;
pub mod api;
pub mod config;
pub mod data_models;
pub mod error;
pub mod fetch_indexer;
pub mod index_store;
pub mod models;
pub mod page_source;
pub mod pipeline;
pub mod registry;
pub mod search;
pub mod stream;
