//! Email Validation Workflow Node Library
//!
//! Integration layer between a workflow-automation host and a third-party
//! email-validation API: request mapping, result enrichment, batch job
//! orchestration and retry handling.
//!
//! # Modules
//!
//! - `api_client`: Authenticated HTTP transport and the retrying call wrapper.
//! - `classifier`: Risk/quality/recommendation classification of results.
//! - `clock`: Injectable time source for sleeps and timestamps.
//! - `config`: Configuration management.
//! - `email_parser`: Free-text email list parsing and deduplication.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers.
//! - `jobs`: Batch job lifecycle and wait-for-completion loop.
//! - `models`: Core data models.
//! - `router`: (resource, operation) dispatch and per-item failure handling.
//! - `services`: Synchronous validation and account lookups.
//! - `statistics`: Batch statistics aggregation.

pub mod api_client;
pub mod classifier;
pub mod clock;
pub mod config;
pub mod email_parser;
pub mod errors;
pub mod handlers;
pub mod jobs;
pub mod models;
pub mod router;
pub mod services;
pub mod statistics;
