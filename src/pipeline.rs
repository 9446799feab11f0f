//! One ETL run: fetch → transform → enrich → persist → report.
//!
//! Nothing in a run is fatal. Source failures yield zero records, unmatched
//! records are dropped, missing weather becomes nulls, and a storage failure
//! only skips persisting the record it happened on.

use crate::config::Config;
use crate::db::Store;
use crate::error::{DropReason, Result, SourceUnavailable};
use crate::http::{HttpTransport, JsonTransport};
use crate::models::{CountryRow, FetchMethod, UpsertStatus};
use crate::report::Reporter;
use crate::source::{CountrySource, is_all};
use crate::transform::{CountryDraft, Transformed, transform};
use crate::weather::{Place, WeatherOutcome, WeatherResolver};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    Fetch,
    TransformEach,
    EnrichEach,
    PersistEach,
    Report,
    Done,
}

/// Everything a run produced, in source order.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub query: String,
    pub fetch_method: FetchMethod,
    /// Processed rows after enrichment, including any that failed to persist.
    pub rows: Vec<CountryRow>,
    /// Parallel to `rows`; `None` where the store rejected the write.
    pub statuses: Vec<Option<UpsertStatus>>,
    pub dropped: Vec<DropReason>,
    pub source_error: Option<SourceUnavailable>,
    pub weather_unavailable: usize,
    pub storage_failures: usize,
}

impl RunSummary {
    pub fn empty(query: &str, fetch_method: FetchMethod) -> Self {
        Self {
            query: query.to_string(),
            fetch_method,
            rows: Vec::new(),
            statuses: Vec::new(),
            dropped: Vec::new(),
            source_error: None,
            weather_unavailable: 0,
            storage_failures: 0,
        }
    }

    pub fn processed(&self) -> usize {
        self.rows.len()
    }

    pub fn count(&self, status: UpsertStatus) -> usize {
        self.statuses.iter().filter(|s| **s == Some(status)).count()
    }
}

pub struct Pipeline {
    source: CountrySource,
    weather: WeatherResolver,
    store: Store,
    limit: Option<usize>,
}

impl Pipeline {
    pub fn new(config: &Config, transport: Arc<dyn JsonTransport>, store: Store) -> Self {
        Self {
            source: CountrySource::new(Arc::clone(&transport), config),
            weather: WeatherResolver::new(transport, config),
            store,
            limit: None,
        }
    }

    /// Real HTTP providers and the database at `config.db_path`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport: Arc<dyn JsonTransport> = Arc::new(HttpTransport::new(config)?);
        let store = Store::open(&config.db_path)?;
        Ok(Self::new(config, transport, store))
    }

    /// Stop after this many kept records.
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit.filter(|n| *n > 0);
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn run(&self, query: &str, reporter: &mut dyn Reporter) -> RunSummary {
        let query = query.trim();
        let method = if is_all(query) {
            FetchMethod::All
        } else {
            FetchMethod::Single
        };
        let mut summary = RunSummary::empty(query, method);
        log::info!("ETL run started for '{query}'");

        stage(Stage::Init);
        if let Err(e) = self.store.init() {
            log::error!("could not ensure schema: {e}");
        }

        stage(Stage::Fetch);
        if query.is_empty() {
            log::warn!("empty query; nothing to fetch");
            return self.finish(summary, reporter);
        }
        let outcome = self.source.fetch(query);
        let api_used = outcome.api_used();
        summary.source_error = outcome.unavailable;
        log::info!("{} raw record(s) for '{query}'", outcome.records.len());

        for raw in &outcome.records {
            if self.limit.is_some_and(|n| summary.rows.len() >= n) {
                log::info!("limit of {} reached", summary.rows.len());
                break;
            }
            stage(Stage::TransformEach);
            match transform(raw, Some(query)) {
                Transformed::Kept(draft) => {
                    self.enrich_and_persist(draft, method, &api_used, &mut summary)
                }
                Transformed::Dropped(reason) => {
                    log::debug!("dropped record: {reason}");
                    summary.dropped.push(reason);
                }
            }
        }

        self.finish(summary, reporter)
    }

    /// Re-resolve weather for every stored row and write it back as `latest`.
    pub fn refresh(&self, reporter: &mut dyn Reporter) -> RunSummary {
        let mut summary = RunSummary::empty("latest", FetchMethod::Latest);
        stage(Stage::Init);
        stage(Stage::Fetch);
        let stored = match self.store.read_all() {
            Ok(rows) => rows,
            Err(e) => {
                log::error!("could not read stored rows: {e}");
                Vec::new()
            }
        };
        log::info!("refreshing {} stored row(s)", stored.len());
        for row in &stored {
            if self.limit.is_some_and(|n| summary.rows.len() >= n) {
                break;
            }
            let draft = CountryDraft::from(row);
            self.enrich_and_persist(draft, FetchMethod::Latest, &row.api_used, &mut summary);
        }
        self.finish(summary, reporter)
    }

    fn enrich_and_persist(
        &self,
        draft: CountryDraft,
        method: FetchMethod,
        api_used: &str,
        summary: &mut RunSummary,
    ) {
        stage(Stage::EnrichEach);
        let place = Place::new(Some(draft.name.clone()), draft.coordinates());
        let outcome = self.weather.resolve(&place);
        match &outcome {
            WeatherOutcome::Resolved { tier, .. } => {
                log::debug!("weather for {} via {}", draft.name, tier.as_str())
            }
            WeatherOutcome::Unavailable(why) => {
                log::warn!("{why}");
                summary.weather_unavailable += 1;
            }
        }
        let mut row = draft.into_row(outcome.into_reading(), method, api_used);

        stage(Stage::PersistEach);
        let status = match self.store.upsert(&mut row) {
            Ok(status) => {
                log::info!("{} {}", row.name, status);
                Some(status)
            }
            Err(e) => {
                log::error!("could not store {}: {e}", row.name);
                summary.storage_failures += 1;
                None
            }
        };
        summary.rows.push(row);
        summary.statuses.push(status);
    }

    fn finish(&self, summary: RunSummary, reporter: &mut dyn Reporter) -> RunSummary {
        stage(Stage::Report);
        if let Err(e) = reporter.report(&summary) {
            log::error!("reporting failed: {e}");
        }
        stage(Stage::Done);
        log::info!(
            "ETL run for '{}' finished: {} processed, {} inserted, {} updated, {} dropped",
            summary.query,
            summary.processed(),
            summary.count(UpsertStatus::Inserted),
            summary.count(UpsertStatus::Updated),
            summary.dropped.len()
        );
        summary
    }
}

fn stage(s: Stage) {
    log::debug!("stage {s:?}");
}

/// Reporter that keeps a copy of the last summary; handy for callers that
/// render the batch themselves.
#[derive(Debug, Default)]
pub struct CollectingReporter {
    pub last: Option<RunSummary>,
}

impl Reporter for CollectingReporter {
    fn report(&mut self, summary: &RunSummary) -> Result<()> {
        self.last = Some(summary.clone());
        Ok(())
    }
}
