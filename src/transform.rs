//! Raw country record → canonical row draft.

use crate::error::DropReason;
use crate::models::{CountryRow, FetchMethod, RawCountry, WeatherReading};
use crate::source::is_all;

/// Minimum Sørensen–Dice similarity for a query to keep a record.
pub const FUZZY_CUTOFF: f64 = 0.5;

/// A transformed record that still lacks weather and store timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct CountryDraft {
    pub name: String,
    pub region: String,
    pub state_province: String,
    pub capital: Option<String>,
    pub population: Option<u64>,
    pub area: Option<f64>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

impl CountryDraft {
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.lat.zip(self.lon)
    }

    pub fn into_row(
        self,
        weather: WeatherReading,
        fetch_method: FetchMethod,
        api_used: impl Into<String>,
    ) -> CountryRow {
        CountryRow {
            name: self.name,
            region: self.region,
            state_province: self.state_province,
            capital: self.capital,
            population: self.population,
            area: self.area,
            lat: self.lat,
            lon: self.lon,
            weather,
            timestamp: String::new(),
            last_updated: String::new(),
            fetch_method,
            api_used: api_used.into(),
        }
    }
}

impl From<&CountryRow> for CountryDraft {
    fn from(row: &CountryRow) -> Self {
        Self {
            name: row.name.clone(),
            region: row.region.clone(),
            state_province: row.state_province.clone(),
            capital: row.capital.clone(),
            population: row.population,
            area: row.area,
            lat: row.lat,
            lon: row.lon,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Transformed {
    Kept(CountryDraft),
    Dropped(DropReason),
}

/// Build a draft from `raw`. When `query` names a specific country the record
/// must fuzzy-match it or it is dropped.
pub fn transform(raw: &RawCountry, query: Option<&str>) -> Transformed {
    let Some(name) = raw.common_name() else {
        return Transformed::Dropped(DropReason::MissingName);
    };

    if let Some(q) = query.map(str::trim).filter(|q| !q.is_empty() && !is_all(q)) {
        if !fuzzy_matches(q, raw) {
            return Transformed::Dropped(DropReason::NoFuzzyMatch {
                query: q.to_string(),
                candidate: name.to_string(),
            });
        }
    }

    let capital = raw
        .capital
        .as_ref()
        .and_then(|c| c.first())
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());
    let (lat, lon) = match raw.latlng.as_deref() {
        Some([lat, lon, ..]) => (Some(*lat), Some(*lon)),
        _ => (None, None),
    };

    Transformed::Kept(CountryDraft {
        name: name.to_string(),
        region: raw.region.clone().unwrap_or_default(),
        state_province: raw.subregion.clone().unwrap_or_default(),
        capital,
        population: raw.population,
        area: raw.area,
        lat,
        lon,
    })
}

/// Case-insensitive Sørensen–Dice similarity in `0.0..=1.0`.
pub fn similarity(a: &str, b: &str) -> f64 {
    strsim::sorensen_dice(&a.trim().to_lowercase(), &b.trim().to_lowercase())
}

/// `query` matches if it clears [`FUZZY_CUTOFF`] against any identifier of the
/// record (names, ISO codes, alternate spellings) or is contained in its name.
pub fn fuzzy_matches(query: &str, raw: &RawCountry) -> bool {
    let q = query.trim().to_lowercase();
    if raw
        .common_name()
        .is_some_and(|n| n.to_lowercase().contains(&q))
    {
        return true;
    }
    raw.identifiers()
        .into_iter()
        .any(|id| similarity(&q, id) >= FUZZY_CUTOFF)
}
