use serde::{Deserialize, Serialize};
use std::fmt;

/// How a country's `name` arrives from the provider: REST Countries v3 nests it
/// (`{"common": .., "official": ..}`), older payloads use a flat string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawName {
    Nested {
        common: Option<String>,
        official: Option<String>,
    },
    Flat(String),
}

/// Raw country record as returned by the country provider.
///
/// Every field is optional and decoded leniently: a missing or ill-typed value
/// becomes `None` (or empty) and the rest of the record is kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCountry {
    #[serde(default, deserialize_with = "lenient::opt")]
    pub name: Option<RawName>,
    #[serde(default, deserialize_with = "lenient::opt")]
    pub cca2: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt")]
    pub cca3: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub alt_spellings: Vec<String>,
    #[serde(default, deserialize_with = "lenient::opt")]
    pub region: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt")]
    pub subregion: Option<String>,
    /// v3 sends a list; flat v2-style records send a single string.
    #[serde(default, deserialize_with = "lenient::opt_string_list")]
    pub capital: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient::opt_count")]
    pub population: Option<u64>,
    #[serde(default, deserialize_with = "lenient::opt_number")]
    pub area: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt")]
    pub latlng: Option<Vec<f64>>,
}

impl RawCountry {
    /// `name.common` when nested, otherwise the flat name.
    pub fn common_name(&self) -> Option<&str> {
        match self.name.as_ref()? {
            RawName::Nested { common, .. } => common.as_deref(),
            RawName::Flat(s) => Some(s.as_str()),
        }
        .map(str::trim)
        .filter(|s| !s.is_empty())
    }

    pub fn official_name(&self) -> Option<&str> {
        match self.name.as_ref()? {
            RawName::Nested { official, .. } => official.as_deref(),
            RawName::Flat(_) => None,
        }
    }

    /// Every identifier a query may legitimately refer to this country by.
    pub fn identifiers(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = Vec::new();
        ids.extend(self.common_name());
        ids.extend(self.official_name());
        ids.extend(self.cca2.as_deref());
        ids.extend(self.cca3.as_deref());
        ids.extend(self.alt_spellings.iter().map(String::as_str));
        ids
    }
}

/// How a row was obtained. Stored as lowercase text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMethod {
    /// Bulk `all` query.
    All,
    /// A named query.
    Single,
    /// Refresh of a row already in the store.
    Latest,
}

impl FetchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchMethod::All => "all",
            FetchMethod::Single => "single",
            FetchMethod::Latest => "latest",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Some(FetchMethod::All),
            "single" => Some(FetchMethod::Single),
            "latest" => Some(FetchMethod::Latest),
            _ => None,
        }
    }
}

impl fmt::Display for FetchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Round to one decimal place, the precision every temperature is kept at.
pub fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

pub fn celsius_to_fahrenheit(c: f64) -> f64 {
    round1(c * 9.0 / 5.0 + 32.0)
}

/// Best-effort current weather for a place.
///
/// Fahrenheit is not a field: it is derived from Celsius on read, so the two
/// are present or absent together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeatherReading {
    temperature_celsius: Option<f64>,
    pub conditions: Option<String>,
    pub observed_at: Option<String>,
    pub windspeed: Option<f64>,
}

impl WeatherReading {
    /// A reading with every field null.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_temperature(celsius: f64) -> Self {
        Self {
            temperature_celsius: Some(celsius).filter(|c| c.is_finite()),
            ..Self::default()
        }
    }

    pub fn conditions(mut self, conditions: impl Into<String>) -> Self {
        self.conditions = Some(conditions.into());
        self
    }

    pub fn observed_at(mut self, observed_at: Option<String>) -> Self {
        self.observed_at = observed_at;
        self
    }

    pub fn windspeed(mut self, windspeed: Option<f64>) -> Self {
        self.windspeed = windspeed;
        self
    }

    pub fn temperature_celsius(&self) -> Option<f64> {
        self.temperature_celsius
    }

    pub fn temperature_fahrenheit(&self) -> Option<f64> {
        self.temperature_celsius.map(celsius_to_fahrenheit)
    }

    pub fn is_empty(&self) -> bool {
        self.temperature_celsius.is_none()
            && self.conditions.is_none()
            && self.observed_at.is_none()
            && self.windspeed.is_none()
    }
}

/// Canonical row: one per country, keyed by `name`.
#[derive(Debug, Clone, PartialEq)]
pub struct CountryRow {
    pub name: String,
    pub region: String,
    pub state_province: String,
    pub capital: Option<String>,
    pub population: Option<u64>,
    pub area: Option<f64>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub weather: WeatherReading,
    /// Creation time; set by the store on first insert.
    pub timestamp: String,
    /// Time of the most recent write; set by the store.
    pub last_updated: String,
    pub fetch_method: FetchMethod,
    pub api_used: String,
}

/// Flat, serializable view of a [`CountryRow`]; used for JSON export and the web API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryRecordOut {
    pub name: String,
    pub region: String,
    pub state_province: String,
    pub capital: Option<String>,
    pub population: Option<u64>,
    pub area: Option<f64>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub temperature_c: Option<f64>,
    pub temperature_f: Option<f64>,
    pub conditions: Option<String>,
    pub observed_at: Option<String>,
    pub windspeed: Option<f64>,
    pub timestamp: String,
    pub last_updated: String,
    pub fetch_method: FetchMethod,
    pub api_used: String,
}

impl From<&CountryRow> for CountryRecordOut {
    fn from(r: &CountryRow) -> Self {
        Self {
            name: r.name.clone(),
            region: r.region.clone(),
            state_province: r.state_province.clone(),
            capital: r.capital.clone(),
            population: r.population,
            area: r.area,
            lat: r.lat,
            lon: r.lon,
            temperature_c: r.weather.temperature_celsius(),
            temperature_f: r.weather.temperature_fahrenheit(),
            conditions: r.weather.conditions.clone(),
            observed_at: r.weather.observed_at.clone(),
            windspeed: r.weather.windspeed,
            timestamp: r.timestamp.clone(),
            last_updated: r.last_updated.clone(),
            fetch_method: r.fetch_method,
            api_used: r.api_used.clone(),
        }
    }
}

/// Outcome of a single upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertStatus {
    Inserted,
    Updated,
}

impl UpsertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpsertStatus::Inserted => "inserted",
            UpsertStatus::Updated => "updated",
        }
    }
}

impl fmt::Display for UpsertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serde helper: parse an optional `f64` from a JSON number, a numeric string, or null.
///
/// wttr.in serializes every number as a string (`"temp_C": "12"`).
pub fn de_opt_f64_from_string_or_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{self, Visitor};
    struct F64Visitor;

    impl<'de> Visitor<'de> for F64Visitor {
        type Value = Option<f64>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            write!(f, "a number, a numeric string, or null")
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
            Ok(Some(v))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            Ok(Some(v as f64))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            Ok(Some(v as f64))
        }

        fn visit_str<E: de::Error>(self, s: &str) -> Result<Self::Value, E> {
            let s = s.trim();
            if s.is_empty() {
                return Ok(None);
            }
            s.parse::<f64>().map(Some).map_err(E::custom)
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }
    }

    deserializer.deserialize_any(F64Visitor)
}

/// Field decoders for provider payloads that never fail the enclosing record.
mod lenient {
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// Any `T`; a value of the wrong shape decodes as `None`.
    pub fn opt<'de, D, T>(d: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        let v = Option::<Value>::deserialize(d)?;
        Ok(v.and_then(|v| serde_json::from_value(v).ok()))
    }

    fn strings(v: Value) -> Option<Vec<String>> {
        match v {
            Value::String(s) => Some(vec![s]),
            Value::Array(items) => Some(
                items
                    .into_iter()
                    .filter_map(|i| match i {
                        Value::String(s) => Some(s),
                        _ => None,
                    })
                    .collect(),
            ),
            _ => None,
        }
    }

    pub fn string_list<'de, D>(d: D) -> Result<Vec<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v = Option::<Value>::deserialize(d)?;
        Ok(v.and_then(strings).unwrap_or_default())
    }

    /// A list of strings, or a single string as a one-element list.
    pub fn opt_string_list<'de, D>(d: D) -> Result<Option<Vec<String>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v = Option::<Value>::deserialize(d)?;
        Ok(v.and_then(strings))
    }

    fn number(v: &Value) -> Option<f64> {
        let x = match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        x.filter(|x| x.is_finite())
    }

    /// A finite number, or a numeric string.
    pub fn opt_number<'de, D>(d: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v = Option::<Value>::deserialize(d)?;
        Ok(v.as_ref().and_then(number))
    }

    /// A non-negative whole number; `16425859.0` is accepted, `12.5` is not.
    pub fn opt_count<'de, D>(d: D) -> Result<Option<u64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v = Option::<Value>::deserialize(d)?;
        Ok(v.and_then(|v| match &v {
            Value::Number(n) => n.as_u64().or_else(|| whole(n.as_f64()?)),
            Value::String(_) => whole(number(&v)?),
            _ => None,
        }))
    }

    fn whole(x: f64) -> Option<u64> {
        (x >= 0.0 && x.fract() == 0.0 && x <= u64::MAX as f64).then_some(x as u64)
    }
}
