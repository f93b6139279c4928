//! Provider abstraction for market data sources.
//!
//! This module defines the [`DataProvider`] trait, which serves as a unified interface
//! for fetching time-series bar data from a market data vendor.
//!
//! Each concrete provider (currently the Yahoo chart endpoint) implements
//! [`DataProvider`] to handle vendor-specific API logic, throttling and validation.
//!
//! The trait is designed for async usage and supports dynamic dispatch (`dyn DataProvider`)
//! for runtime selection of providers, and for substituting a fake in tests.
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use market_data_ingestor::models::{
//!     bar::BarSeries,
//!     request_params::BarsRequestParams,
//! };
//! use market_data_ingestor::providers::{DataProvider, ProviderError};
//!
//! struct MyProvider;
//!
//! #[async_trait]
//! impl DataProvider for MyProvider {
//!     async fn fetch_bars(
//!         &self,
//!         params: BarsRequestParams,
//!     ) -> Result<BarSeries, ProviderError> {
//!         Ok(BarSeries::empty(params.symbol, params.granularity))
//!     }
//! }
//! ```

pub mod yahoo_chart;

use std::sync::Arc;

use async_trait::async_trait;
use shared_utils::env::InvalidEnvVarError;
use snafu::{Backtrace, Snafu};

use crate::models::{bar::BarSeries, request_params::BarsRequestParams, symbol::SymbolInfo};

/// Trait for fetching time-series bar data from a market data provider.
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Fetches bars for one symbol over the requested window.
    ///
    /// # Returns
    ///
    /// * `Ok(BarSeries)` - Bars oldest first, tagged with the request's granularity.
    ///   An empty series is a valid answer (e.g. a market holiday).
    /// * `Err(ProviderError)` - Transport, throttling or upstream failures.
    async fn fetch_bars(&self, params: BarsRequestParams) -> Result<BarSeries, ProviderError>;

    /// Looks up descriptive metadata for a symbol.
    ///
    /// Used to validate tickers before they enter the watchlist. Providers
    /// that have no such endpoint keep the default.
    async fn symbol_info(&self, symbol: &str) -> Result<SymbolInfo, ProviderError> {
        let _ = symbol;
        UnsupportedSnafu {
            operation: "symbol_info",
        }
        .fail()
    }
}

#[async_trait]
impl<P: DataProvider + ?Sized> DataProvider for Arc<P> {
    async fn fetch_bars(&self, params: BarsRequestParams) -> Result<BarSeries, ProviderError> {
        (**self).fetch_bars(params).await
    }

    async fn symbol_info(&self, symbol: &str) -> Result<SymbolInfo, ProviderError> {
        (**self).symbol_info(symbol).await
    }
}

/// Errors that can occur during the creation of a provider instance
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderInitError {
    /// An override in the environment could not be parsed.
    #[snafu(display("{source}"))]
    InvalidEnvVar {
        source: InvalidEnvVarError,
        backtrace: Backtrace,
    },

    /// failed to init reqwest client
    #[snafu(display("Failed to build HTTP client: {source}"))]
    ClientBuild {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// A configured value is out of range.
    #[snafu(display("Invalid provider configuration: {message}"))]
    InvalidConfig {
        message: String,
        backtrace: Backtrace,
    },
}

/// Errors that can occur within a `DataProvider` implementation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderError {
    /// An error during an API request (e.g., network failure, timeout).
    #[snafu(display("API request failed: {source}"))]
    Reqwest {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// The upstream answered 429.
    #[snafu(display("Rate limited by provider{}", retry_after_secs.map(|s| format!(" (retry after {s}s)")).unwrap_or_default()))]
    RateLimited {
        retry_after_secs: Option<u64>,
        backtrace: Backtrace,
    },

    /// The upstream does not know the symbol.
    #[snafu(display("Symbol not found: {symbol}"))]
    SymbolNotFound {
        symbol: String,
        backtrace: Backtrace,
    },

    /// The provider's API returned a specific error message.
    #[snafu(display("API error: {message}"))]
    Api {
        message: String,
        backtrace: Backtrace,
    },

    /// The request parameters were invalid for this specific provider.
    #[snafu(display("Invalid parameters for provider: {message}"))]
    Validation {
        message: String,
        backtrace: Backtrace,
    },

    /// The provider has no implementation for this operation.
    #[snafu(display("Operation not supported by provider: {operation}"))]
    Unsupported {
        operation: &'static str,
        backtrace: Backtrace,
    },

    /// An internal error occurred while processing data within the provider.
    #[snafu(display("Internal provider error: {message}"))]
    Internal {
        message: String,
        backtrace: Backtrace,
    },

    /// An error during provider configuration or initialization.
    #[snafu(display("Provider initialization error: {source}"))]
    Init {
        #[snafu(backtrace)]
        source: ProviderInitError,
    },
}

impl ProviderError {
    /// Whether retrying later could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::Reqwest { .. } | ProviderError::RateLimited { .. }
        )
    }
}
