//! tablebridge - one-shot column transfers between ClickHouse tables and
//! delimited files, exposed as a small JSON API.

pub mod api;
pub mod config;
pub mod error;
pub mod identifier;
pub mod ingestion;
pub mod model;
pub mod service;
