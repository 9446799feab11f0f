//! globe_etl
//!
//! Fetch country metadata from REST Countries, enrich every country with its
//! current weather, and keep the merged rows in a local SQLite table keyed by
//! country name. Pairs with the `globe-etl` CLI and the `globe-web` dashboard.
//!
//! ### Features
//! - Bulk (`all`) or targeted (name / ISO code) country queries with a bulk fallback
//! - Fuzzy matching of targeted queries against names, codes and alternate spellings
//! - Three-tier weather lookup: Open-Meteo by coordinates, Open-Meteo via
//!   geocoding, then wttr.in; all-null when nothing answers
//! - Idempotent upsert (`inserted` / `updated`) that never loses a row's creation time
//! - CSV summary, full CSV/JSON export, text grid, per-region temperature stats
//!
//! ### Example
//! ```no_run
//! use globe_etl::{Config, Pipeline, report::ConsoleReporter};
//!
//! let config = Config::from_env()?;
//! let pipeline = Pipeline::from_config(&config)?;
//! let mut reporter = ConsoleReporter::new(std::io::stdout()).with_summary_csv("data/summary.csv");
//! let summary = pipeline.run("gb", &mut reporter);
//! assert!(summary.processed() <= 1);
//! # Ok::<(), globe_etl::Error>(())
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod source;
pub mod stats;
pub mod storage;
pub mod transform;
pub mod weather;

pub use config::Config;
pub use db::Store;
pub use error::{Error, Result};
pub use models::{CountryRow, FetchMethod, UpsertStatus, WeatherReading};
pub use pipeline::{Pipeline, RunSummary};
