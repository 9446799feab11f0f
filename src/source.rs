//! Country metadata from the REST Countries v3.1 API.
//!
//! `fetch("all")` hits the bulk endpoint. Any other query hits `/name/{query}`
//! first and, if that call fails, falls back to the bulk endpoint filtered on
//! the client side. Failures never escape: the outcome carries an empty record
//! list and the reason the source was unavailable.

use crate::config::Config;
use crate::error::{FetchError, SourceUnavailable};
use crate::http::{JsonTransport, enc};
use crate::models::RawCountry;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

pub const API_LABEL: &str = "restcountries.com v3.1";

/// `/all` refuses requests without a field list; ten fields is its maximum.
const FIELDS: &str = "name,cca2,cca3,altSpellings,region,subregion,capital,population,area,latlng";

/// `true` for the bulk sentinel query (`all`, any case, surrounding blanks ignored).
pub fn is_all(query: &str) -> bool {
    query.trim().eq_ignore_ascii_case("all")
}

/// Which request produced the records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourcePath {
    All,
    ByName,
    /// The bulk endpoint, filtered locally after `/name/` failed.
    BulkFallback,
}

impl SourcePath {
    pub fn api_used(&self) -> String {
        match self {
            SourcePath::All | SourcePath::ByName => API_LABEL.to_string(),
            SourcePath::BulkFallback => format!("{API_LABEL} (all, filtered)"),
        }
    }
}

#[derive(Debug, Default)]
pub struct SourceOutcome {
    pub records: Vec<RawCountry>,
    /// Set when some request succeeded, even if it yielded no records.
    pub path: Option<SourcePath>,
    /// Set when every attempted request failed.
    pub unavailable: Option<SourceUnavailable>,
}

impl SourceOutcome {
    fn unavailable(reason: String) -> Self {
        Self {
            records: Vec::new(),
            path: None,
            unavailable: Some(SourceUnavailable(reason)),
        }
    }

    fn delivered(path: SourcePath, records: Vec<RawCountry>) -> Self {
        Self {
            records,
            path: Some(path),
            unavailable: None,
        }
    }

    pub fn api_used(&self) -> String {
        self.path.map(|p| p.api_used()).unwrap_or_else(|| API_LABEL.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct CountrySource {
    transport: Arc<dyn JsonTransport>,
    base_url: String,
    timeout: Duration,
}

impl CountrySource {
    pub fn new(transport: Arc<dyn JsonTransport>, config: &Config) -> Self {
        Self {
            transport,
            base_url: config.countries_base_url.trim_end_matches('/').to_string(),
            timeout: config.country_timeout,
        }
    }

    pub fn fetch(&self, query: &str) -> SourceOutcome {
        let query = query.trim();
        if is_all(query) {
            return match self.fetch_all() {
                Ok(records) => SourceOutcome::delivered(SourcePath::All, records),
                Err(e) => {
                    log::warn!("Main API failed: {e}");
                    SourceOutcome::unavailable(e.to_string())
                }
            };
        }

        let primary = match self.fetch_by_name(query) {
            Ok(records) => return SourceOutcome::delivered(SourcePath::ByName, records),
            Err(e) => e,
        };
        log::warn!("Name search for '{query}' failed: {primary}; falling back to bulk list");

        match self.fetch_all() {
            Ok(all) => {
                let records: Vec<RawCountry> =
                    all.into_iter().filter(|r| matches_query(r, query)).collect();
                log::debug!("bulk fallback kept {} record(s) for '{query}'", records.len());
                SourceOutcome::delivered(SourcePath::BulkFallback, records)
            }
            Err(fallback) => {
                log::warn!("Fallback API failed: {fallback}");
                SourceOutcome::unavailable(format!("{primary}; fallback: {fallback}"))
            }
        }
    }

    fn fetch_all(&self) -> Result<Vec<RawCountry>, FetchError> {
        let url = format!("{}/all?fields={}", self.base_url, FIELDS);
        let v = self.transport.get_json(&url, self.timeout)?;
        normalize_records(&url, v)
    }

    fn fetch_by_name(&self, query: &str) -> Result<Vec<RawCountry>, FetchError> {
        let url = format!("{}/name/{}", self.base_url, enc(query));
        let v = self.transport.get_json(&url, self.timeout)?;
        normalize_records(&url, v)
    }
}

/// Normalize a provider payload into a list of records.
///
/// A single object becomes a one-element list. Array elements that do not
/// decode as a country are skipped.
pub fn normalize_records(url: &str, v: Value) -> Result<Vec<RawCountry>, FetchError> {
    let items = match v {
        Value::Array(items) => items,
        obj @ Value::Object(_) => vec![obj],
        other => {
            return Err(FetchError::Decode {
                url: url.to_string(),
                reason: format!("expected an array or object, got {other}"),
            });
        }
    };

    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        if !item.is_object() {
            log::warn!("skipping non-object element #{i} from {url}");
            continue;
        }
        match serde_json::from_value::<RawCountry>(item) {
            Ok(rec) => out.push(rec),
            Err(e) => log::warn!("skipping undecodable element #{i} from {url}: {e}"),
        }
    }
    Ok(out)
}

/// Client-side filter used on the bulk fallback: case-insensitive substring of
/// the common or official name, or an exact code / alternate spelling.
pub fn matches_query(rec: &RawCountry, query: &str) -> bool {
    let q = query.trim().to_lowercase();
    if q.is_empty() {
        return false;
    }
    let in_name = |s: Option<&str>| s.is_some_and(|n| n.to_lowercase().contains(&q));
    if in_name(rec.common_name()) || in_name(rec.official_name()) {
        return true;
    }
    rec.cca2
        .iter()
        .chain(rec.cca3.iter())
        .chain(rec.alt_spellings.iter())
        .any(|id| id.to_lowercase() == q)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn single_object_is_wrapped() {
        let v = json!({"name": {"common": "Iceland"}, "region": "Europe"});
        let recs = normalize_records("u", v).unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].common_name(), Some("Iceland"));
    }

    #[test]
    fn junk_elements_are_skipped() {
        let v = json!([
            {"name": {"common": "Chad"}},
            "not a country",
            {"name": {"common": "Peru"}, "population": "lots"},
            {"name": "Flatland"}
        ]);
        let recs = normalize_records("u", v).unwrap();
        let names: Vec<_> = recs.iter().filter_map(|r| r.common_name()).collect();
        assert_eq!(names, vec!["Chad", "Peru", "Flatland"]);
        assert_eq!(recs[1].population, None);
    }

    #[test]
    fn flat_record_with_scalar_capital_is_kept() {
        let v = json!([{
            "name": "Iceland",
            "region": "Europe",
            "capital": "Reykjavik",
            "latlng": [65.0, -18.0]
        }]);
        let recs = normalize_records("u", v).unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].capital, Some(vec!["Reykjavik".to_string()]));
    }

    #[test]
    fn float_population_is_kept() {
        let v = json!([{"name": {"common": "Chad"}, "population": 16425859.0}]);
        let recs = normalize_records("u", v).unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].population, Some(16_425_859));
    }

    #[test]
    fn scalar_payload_is_a_decode_error() {
        let err = normalize_records("u", json!("oops")).unwrap_err();
        assert!(matches!(err, FetchError::Decode { .. }));
    }

    #[test]
    fn bulk_filter_matches_substring_and_codes() {
        let rec: RawCountry = serde_json::from_value(json!({
            "name": {"common": "United Kingdom", "official": "United Kingdom of Great Britain and Northern Ireland"},
            "cca2": "GB", "cca3": "GBR", "altSpellings": ["GB", "UK", "Great Britain"]
        }))
        .unwrap();
        assert!(matches_query(&rec, "kingdom"));
        assert!(matches_query(&rec, "gb"));
        assert!(matches_query(&rec, "Northern Ireland"));
        assert!(matches_query(&rec, "uk"));
        assert!(!matches_query(&rec, "GBX"));
        assert!(!matches_query(&rec, "atlantis"));
        assert!(!matches_query(&rec, "  "));
    }

    #[test]
    fn all_sentinel_is_case_insensitive() {
        assert!(is_all("all"));
        assert!(is_all(" ALL "));
        assert!(!is_all("allemagne"));
    }
}
