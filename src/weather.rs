//! Current weather for a place, resolved through three providers in order:
//!
//! 1. Open-Meteo forecast at the given coordinates,
//! 2. Open-Meteo geocoding of the place name, then the forecast at the first hit,
//! 3. wttr.in free-text lookup by name.
//!
//! A tier that does not apply (no coordinates, no name) is skipped. A tier that
//! fails is recorded and the next one is tried. When nothing works the outcome
//! is [`WeatherOutcome::Unavailable`], which still yields an all-null reading.

use crate::config::Config;
use crate::error::WeatherUnavailable;
use crate::http::{JsonTransport, enc};
use crate::models::{WeatherReading, de_opt_f64_from_string_or_number};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Human-readable description of a WMO weather code as reported by Open-Meteo.
/// Total: undocumented codes map to `"Unknown"`.
pub fn describe_weather_code(code: i64) -> &'static str {
    match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 => "Fog",
        48 => "Depositing rime fog",
        51 => "Light drizzle",
        53 => "Moderate drizzle",
        55 => "Dense drizzle",
        61 => "Slight rain",
        63 => "Moderate rain",
        65 => "Heavy rain",
        71 => "Slight snow",
        73 => "Moderate snow",
        75 => "Heavy snow",
        95 => "Thunderstorm",
        96 => "Thunderstorm with hail",
        99 => "Severe thunderstorm with hail",
        _ => "Unknown",
    }
}

/// What to look up: a name, coordinates, or both.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Place {
    pub name: Option<String>,
    pub coords: Option<(f64, f64)>,
}

impl Place {
    pub fn new(name: Option<String>, coords: Option<(f64, f64)>) -> Self {
        Self {
            name: name.filter(|n| !n.trim().is_empty()),
            coords: coords.filter(|(lat, lon)| lat.is_finite() && lon.is_finite()),
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self::new(Some(name.into()), None)
    }

    pub fn at(lat: f64, lon: f64) -> Self {
        Self::new(None, Some((lat, lon)))
    }
}

impl fmt::Display for Place {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.name, self.coords) {
            (Some(n), Some((lat, lon))) => write!(f, "{n} ({lat}, {lon})"),
            (Some(n), None) => f.write_str(n),
            (None, Some((lat, lon))) => write!(f, "({lat}, {lon})"),
            (None, None) => f.write_str("<nowhere>"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeatherTier {
    Coordinates,
    Geocoded,
    TextWeather,
}

impl WeatherTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeatherTier::Coordinates => "open-meteo (coordinates)",
            WeatherTier::Geocoded => "open-meteo (geocoded)",
            WeatherTier::TextWeather => "wttr.in",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WeatherOutcome {
    Resolved {
        reading: WeatherReading,
        tier: WeatherTier,
    },
    Unavailable(WeatherUnavailable),
}

impl WeatherOutcome {
    pub fn tier(&self) -> Option<WeatherTier> {
        match self {
            WeatherOutcome::Resolved { tier, .. } => Some(*tier),
            WeatherOutcome::Unavailable(_) => None,
        }
    }

    /// The reading, or an all-null reading when unavailable.
    pub fn into_reading(self) -> WeatherReading {
        match self {
            WeatherOutcome::Resolved { reading, .. } => reading,
            WeatherOutcome::Unavailable(_) => WeatherReading::empty(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current_weather: Option<CurrentWeather>,
}

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    temperature: Option<f64>,
    weathercode: Option<i64>,
    windspeed: Option<f64>,
    time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    results: Vec<GeocodeHit>,
}

#[derive(Debug, Deserialize)]
struct GeocodeHit {
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct WttrResponse {
    #[serde(default)]
    current_condition: Vec<WttrCurrent>,
}

#[derive(Debug, Deserialize)]
struct WttrCurrent {
    #[serde(
        rename = "temp_C",
        default,
        deserialize_with = "de_opt_f64_from_string_or_number"
    )]
    temp_c: Option<f64>,
    #[serde(rename = "weatherDesc", default)]
    weather_desc: Vec<WttrText>,
    #[serde(rename = "localObsDateTime")]
    local_obs_date_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WttrText {
    value: String,
}

#[derive(Debug, Clone)]
pub struct WeatherResolver {
    transport: Arc<dyn JsonTransport>,
    forecast_url: String,
    geocoding_url: String,
    wttr_base_url: String,
    timeout: Duration,
}

impl WeatherResolver {
    pub fn new(transport: Arc<dyn JsonTransport>, config: &Config) -> Self {
        Self {
            transport,
            forecast_url: config.forecast_url.clone(),
            geocoding_url: config.geocoding_url.clone(),
            wttr_base_url: config.wttr_base_url.trim_end_matches('/').to_string(),
            timeout: config.weather_timeout,
        }
    }

    pub fn resolve(&self, place: &Place) -> WeatherOutcome {
        let mut reasons: Vec<String> = Vec::new();

        if let Some((lat, lon)) = place.coords {
            match self.forecast(lat, lon) {
                Ok(reading) => {
                    return WeatherOutcome::Resolved {
                        reading,
                        tier: WeatherTier::Coordinates,
                    };
                }
                Err(e) => reasons.push(format!("{}: {e}", WeatherTier::Coordinates.as_str())),
            }
        }

        if let Some(name) = place.name.as_deref() {
            match self.geocoded_forecast(name) {
                Ok(reading) => {
                    return WeatherOutcome::Resolved {
                        reading,
                        tier: WeatherTier::Geocoded,
                    };
                }
                Err(e) => reasons.push(format!("{}: {e}", WeatherTier::Geocoded.as_str())),
            }

            match self.text_weather(name) {
                Ok(reading) => {
                    return WeatherOutcome::Resolved {
                        reading,
                        tier: WeatherTier::TextWeather,
                    };
                }
                Err(e) => reasons.push(format!("{}: {e}", WeatherTier::TextWeather.as_str())),
            }
        }

        if reasons.is_empty() {
            reasons.push("no name or coordinates to look up".into());
        }
        for r in &reasons {
            log::debug!("weather tier failed for {place}: {r}");
        }
        WeatherOutcome::Unavailable(WeatherUnavailable {
            place: place.to_string(),
            reasons,
        })
    }

    fn get(&self, url: &str) -> Result<Value, String> {
        self.transport
            .get_json(url, self.timeout)
            .map_err(|e| e.to_string())
    }

    fn current_weather(&self, lat: f64, lon: f64) -> Result<CurrentWeather, String> {
        let url = format!(
            "{}?latitude={}&longitude={}&current_weather=true",
            self.forecast_url, lat, lon
        );
        let v = self.get(&url)?;
        let parsed: ForecastResponse =
            serde_json::from_value(v).map_err(|e| format!("parse forecast: {e}"))?;
        parsed
            .current_weather
            .ok_or_else(|| "response has no current_weather".to_string())
    }

    fn forecast(&self, lat: f64, lon: f64) -> Result<WeatherReading, String> {
        let cw = self.current_weather(lat, lon)?;
        let temp = cw
            .temperature
            .ok_or_else(|| "current_weather has no temperature".to_string())?;
        let mut reading = WeatherReading::with_temperature(temp)
            .observed_at(cw.time)
            .windspeed(cw.windspeed);
        if let Some(code) = cw.weathercode {
            reading = reading.conditions(describe_weather_code(code));
        }
        Ok(reading)
    }

    fn geocode(&self, name: &str) -> Result<Option<(f64, f64)>, String> {
        let url = format!("{}?name={}&count=1", self.geocoding_url, enc(name));
        let v = self.get(&url)?;
        let parsed: GeocodeResponse =
            serde_json::from_value(v).map_err(|e| format!("parse geocoding: {e}"))?;
        Ok(parsed.results.first().map(|h| (h.latitude, h.longitude)))
    }

    fn geocoded_forecast(&self, name: &str) -> Result<WeatherReading, String> {
        let (lat, lon) = self
            .geocode(name)?
            .ok_or_else(|| format!("no geocoding match for '{name}'"))?;
        // Same provider as the coordinate tier, minus windspeed.
        self.forecast(lat, lon).map(|r| r.windspeed(None))
    }

    fn text_weather(&self, name: &str) -> Result<WeatherReading, String> {
        let url = format!("{}/{}?format=j1", self.wttr_base_url, enc(name));
        let v = self.get(&url)?;
        let parsed: WttrResponse =
            serde_json::from_value(v).map_err(|e| format!("parse wttr.in: {e}"))?;
        let current = parsed
            .current_condition
            .into_iter()
            .next()
            .ok_or_else(|| "response has no current_condition".to_string())?;
        let temp = current
            .temp_c
            .ok_or_else(|| "current_condition has no temp_C".to_string())?;
        let mut reading =
            WeatherReading::with_temperature(temp).observed_at(current.local_obs_date_time);
        if let Some(desc) = current.weather_desc.into_iter().next() {
            let desc = desc.value.trim().to_string();
            if !desc.is_empty() {
                reading = reading.conditions(desc);
            }
        }
        Ok(reading)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documented_codes_have_descriptions() {
        for code in [0, 1, 2, 3, 45, 48, 51, 53, 55, 61, 63, 65, 71, 73, 75, 95, 96, 99] {
            assert_ne!(describe_weather_code(code), "Unknown", "code {code}");
        }
        assert_eq!(describe_weather_code(0), "Clear sky");
        assert_eq!(describe_weather_code(99), "Severe thunderstorm with hail");
    }

    #[test]
    fn weather_code_mapping_is_total() {
        for code in [-1, 4, 44, 50, 80, 100, i64::MIN, i64::MAX] {
            assert_eq!(describe_weather_code(code), "Unknown");
        }
    }

    #[test]
    fn place_discards_blank_names_and_bad_coordinates() {
        let p = Place::new(Some("  ".into()), Some((f64::NAN, 1.0)));
        assert_eq!(p, Place::default());
        assert_eq!(p.to_string(), "<nowhere>");
        assert_eq!(Place::at(1.5, -2.0).to_string(), "(1.5, -2)");
    }

    #[test]
    fn wttr_payload_with_string_numbers_parses() {
        let v = serde_json::json!({
            "current_condition": [{
                "temp_C": "14",
                "weatherDesc": [{"value": "Partly cloudy"}],
                "localObsDateTime": "2024-05-01 10:00 AM"
            }]
        });
        let parsed: WttrResponse = serde_json::from_value(v).unwrap();
        assert_eq!(parsed.current_condition[0].temp_c, Some(14.0));
        assert_eq!(parsed.current_condition[0].weather_desc[0].value, "Partly cloudy");
    }
}
