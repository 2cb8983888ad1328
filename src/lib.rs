//! Lead intelligence API library.
//!
//! Scores real-estate development leads, enriches them from external
//! sources, matches them to available properties and summarizes the deal
//! pipeline. Every service works against the `store::LeadStore` trait.
//!
//! # Modules
//!
//! - `engagement`: Website engagement aggregation.
//! - `scoring`: Lead scoring engine.
//! - `enrichment`: Enrichment, priority, auto-assignment and the background queue.
//! - `sources`: Enrichment lookup adapters (simulated and HTTP).
//! - `matching`: Lead preferences and property matching.
//! - `pipeline`: Deal stages and pipeline metrics.
//! - `budget`: Free-text budget parsing.
//! - `experience`: Development-experience classification.
//! - `store`: Data store trait.
//! - `db_storage`: Postgres store.
//! - `memory_store`: In-process store.
//! - `cache_validator`: Checksummed cache entries.
//! - `circuit_breaker`: Circuit breaker for external lookups.
//! - `config`: Configuration management.
//! - `db`: Database connection pool.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers.
//! - `models`: Domain models.

pub mod budget;
pub mod cache_validator;
pub mod circuit_breaker;
pub mod config;
pub mod db;
pub mod db_storage;
pub mod engagement;
pub mod enrichment;
pub mod errors;
pub mod experience;
pub mod handlers;
pub mod matching;
pub mod memory_store;
pub mod models;
pub mod pipeline;
pub mod scoring;
pub mod sources;
pub mod store;
