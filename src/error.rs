//! Error taxonomy for the ETL pipeline.
//!
//! Most upstream failures never leave the component that hit them: the country
//! source degrades to an empty list, the transformer drops records it cannot
//! match, the weather resolver returns an all-null reading. Those outcomes are
//! carried as values ([`SourceUnavailable`], [`DropReason`], [`WeatherUnavailable`])
//! so they can be logged and tested. [`Error`] is for the hard failures:
//! storage, file export and configuration.

use thiserror::Error;

/// Transport-level failure of a single HTTP call.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} failed with HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("could not decode response from {url}: {reason}")]
    Decode { url: String, reason: String },

    /// Raised by the in-memory transport when no canned response is registered.
    #[error("no route for {0}")]
    NoRoute(String),
}

/// Every request the country source attempted failed.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("country source unavailable: {0}")]
pub struct SourceUnavailable(pub String);

/// All three weather tiers failed or did not apply.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("weather unavailable for {place}: {}", .reasons.join("; "))]
pub struct WeatherUnavailable {
    pub place: String,
    pub reasons: Vec<String>,
}

/// Why the transformer filtered a record out.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DropReason {
    #[error("'{query}' does not match '{candidate}'")]
    NoFuzzyMatch { query: String, candidate: String },

    #[error("record has no usable name")]
    MissingName,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("storage failure: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
