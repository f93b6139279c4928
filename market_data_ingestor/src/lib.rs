//! Market data ingestion: the [`providers::DataProvider`] abstraction and the
//! vendor-agnostic bar and granularity models it speaks.

pub mod models;
pub mod providers;
