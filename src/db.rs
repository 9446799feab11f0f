//! SQLite store: one `countries` table keyed by country name.

use crate::error::Result;
use crate::models::{CountryRow, FetchMethod, UpsertStatus, WeatherReading};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::fs;
use std::path::Path;

/// Column name and declared type, in table order.
const COLUMNS: &[(&str, &str)] = &[
    ("name", "TEXT PRIMARY KEY"),
    ("region", "TEXT"),
    ("state_province", "TEXT"),
    ("capital", "TEXT"),
    ("population", "INTEGER"),
    ("area", "REAL"),
    ("lat", "REAL"),
    ("lon", "REAL"),
    ("temperature_c", "REAL"),
    ("temperature_f", "REAL"),
    ("conditions", "TEXT"),
    ("observed_at", "TEXT"),
    ("windspeed", "REAL"),
    ("timestamp", "TEXT"),
    ("last_updated", "TEXT"),
    ("fetch_method", "TEXT"),
    ("api_used", "TEXT"),
];

const SELECT_ALL: &str = "SELECT name, region, state_province, capital, population, area, lat, lon,
        temperature_c, conditions, observed_at, windspeed,
        timestamp, last_updated, fetch_method, api_used
    FROM countries";

pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open or create the database file and make sure the schema exists.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let store = Self {
            conn: Connection::open(path)?,
        };
        store.init()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.init()?;
        Ok(store)
    }

    /// Create the table if missing and add any columns an older database lacks.
    pub fn init(&self) -> Result<()> {
        let cols = COLUMNS
            .iter()
            .map(|(n, t)| format!("{n} {t}"))
            .collect::<Vec<_>>()
            .join(",\n    ");
        self.conn
            .execute_batch(&format!("CREATE TABLE IF NOT EXISTS countries (\n    {cols}\n);"))?;

        let existing: Vec<String> = self
            .conn
            .prepare("PRAGMA table_info(countries)")?
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<Vec<_>, _>>()?;
        for (name, ty) in COLUMNS.iter().skip(1) {
            if !existing.iter().any(|c| c == name) {
                log::info!("adding missing column countries.{name}");
                self.conn
                    .execute(&format!("ALTER TABLE countries ADD COLUMN {name} {ty}"), [])?;
            }
        }
        Ok(())
    }

    /// Insert or update `row` by name, stamping it with the current time.
    ///
    /// On return `row.timestamp` and `row.last_updated` hold the stored values.
    pub fn upsert(&self, row: &mut CountryRow) -> Result<UpsertStatus> {
        self.upsert_at(row, Utc::now())
    }

    pub fn upsert_at(&self, row: &mut CountryRow, now: DateTime<Utc>) -> Result<UpsertStatus> {
        let now = now.to_rfc3339_opts(SecondsFormat::Micros, true);
        let created: Option<Option<String>> = self
            .conn
            .query_row(
                "SELECT timestamp FROM countries WHERE name = ?1",
                params![row.name],
                |r| r.get(0),
            )
            .optional()?;

        let w = &row.weather;
        let population = row.population.map(|p| i64::try_from(p).unwrap_or(i64::MAX));

        let status = match created {
            Some(created) => {
                self.conn.execute(
                    "UPDATE countries
                     SET region = ?2, state_province = ?3, capital = ?4, population = ?5,
                         area = ?6, lat = ?7, lon = ?8, temperature_c = ?9, temperature_f = ?10,
                         conditions = ?11, observed_at = ?12, windspeed = ?13,
                         last_updated = ?14, fetch_method = ?15, api_used = ?16
                     WHERE name = ?1",
                    params![
                        row.name,
                        row.region,
                        row.state_province,
                        row.capital,
                        population,
                        row.area,
                        row.lat,
                        row.lon,
                        w.temperature_celsius(),
                        w.temperature_fahrenheit(),
                        w.conditions,
                        w.observed_at,
                        w.windspeed,
                        now,
                        row.fetch_method.as_str(),
                        row.api_used,
                    ],
                )?;
                row.timestamp = created.unwrap_or_default();
                UpsertStatus::Updated
            }
            None => {
                self.conn.execute(
                    "INSERT INTO countries (
                        name, region, state_province, capital, population, area, lat, lon,
                        temperature_c, temperature_f, conditions, observed_at, windspeed,
                        timestamp, last_updated, fetch_method, api_used
                     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?14, ?15, ?16)",
                    params![
                        row.name,
                        row.region,
                        row.state_province,
                        row.capital,
                        population,
                        row.area,
                        row.lat,
                        row.lon,
                        w.temperature_celsius(),
                        w.temperature_fahrenheit(),
                        w.conditions,
                        w.observed_at,
                        w.windspeed,
                        now,
                        row.fetch_method.as_str(),
                        row.api_used,
                    ],
                )?;
                row.timestamp = now.clone();
                UpsertStatus::Inserted
            }
        };
        row.last_updated = now;
        Ok(status)
    }

    pub fn get(&self, name: &str) -> Result<Option<CountryRow>> {
        let row = self
            .conn
            .query_row(
                &format!("{SELECT_ALL} WHERE name = ?1"),
                params![name],
                row_to_country,
            )
            .optional()?;
        Ok(row)
    }

    /// Every stored row, ordered by name.
    pub fn read_all(&self) -> Result<Vec<CountryRow>> {
        let mut stmt = self.conn.prepare(&format!("{SELECT_ALL} ORDER BY name"))?;
        let rows = stmt
            .query_map([], row_to_country)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn count(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM countries", [], |r| r.get(0))?;
        Ok(usize::try_from(n).unwrap_or(0))
    }

    /// Underlying connection, for ad-hoc queries and schema tweaks.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Delete every row by dropping and recreating the table. Irreversible.
    pub fn drop_all(&self) -> Result<()> {
        self.conn.execute_batch("DROP TABLE IF EXISTS countries;")?;
        self.init()
    }
}

/// Size of the database file in bytes, if it exists.
pub fn file_size(path: &Path) -> Option<u64> {
    fs::metadata(path).ok().map(|m| m.len())
}

fn row_to_country(r: &Row<'_>) -> rusqlite::Result<CountryRow> {
    let population: Option<i64> = r.get(4)?;
    let temperature_c: Option<f64> = r.get(8)?;
    let method: Option<String> = r.get(14)?;
    let fetch_method = match method.as_deref() {
        None => FetchMethod::Single,
        Some(s) => FetchMethod::parse(s).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                14,
                Type::Text,
                format!("unknown fetch_method '{s}'").into(),
            )
        })?,
    };

    let weather = match temperature_c {
        Some(c) => WeatherReading::with_temperature(c),
        None => WeatherReading::empty(),
    };
    let mut weather = weather
        .observed_at(r.get(10)?)
        .windspeed(r.get(11)?);
    weather.conditions = r.get(9)?;

    Ok(CountryRow {
        name: r.get(0)?,
        region: r.get::<_, Option<String>>(1)?.unwrap_or_default(),
        state_province: r.get::<_, Option<String>>(2)?.unwrap_or_default(),
        capital: r.get(3)?,
        population: population.and_then(|p| u64::try_from(p).ok()),
        area: r.get(5)?,
        lat: r.get(6)?,
        lon: r.get(7)?,
        weather,
        timestamp: r.get::<_, Option<String>>(12)?.unwrap_or_default(),
        last_updated: r.get::<_, Option<String>>(13)?.unwrap_or_default(),
        fetch_method,
        api_used: r.get::<_, Option<String>>(15)?.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row(name: &str, temp: Option<f64>) -> CountryRow {
        CountryRow {
            name: name.into(),
            region: "Europe".into(),
            state_province: "Northern Europe".into(),
            capital: Some("Reykjavik".into()),
            population: Some(366_425),
            area: Some(103_000.0),
            lat: Some(65.0),
            lon: Some(-18.0),
            weather: temp
                .map(|c| WeatherReading::with_temperature(c).conditions("Overcast"))
                .unwrap_or_default(),
            timestamp: String::new(),
            last_updated: String::new(),
            fetch_method: FetchMethod::Single,
            api_used: "test".into(),
        }
    }

    #[test]
    fn insert_then_update_keeps_creation_time() {
        let store = Store::open_in_memory().unwrap();
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();

        let mut first = row("Iceland", Some(-3.0));
        assert_eq!(store.upsert_at(&mut first, t0).unwrap(), UpsertStatus::Inserted);
        assert_eq!(first.timestamp, first.last_updated);

        let mut second = row("Iceland", Some(4.5));
        second.region = "Nordics".into();
        second.fetch_method = FetchMethod::Latest;
        assert_eq!(store.upsert_at(&mut second, t1).unwrap(), UpsertStatus::Updated);
        assert_eq!(second.timestamp, first.timestamp);
        assert_ne!(second.last_updated, first.last_updated);

        let stored = store.get("Iceland").unwrap().unwrap();
        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(stored.region, "Nordics");
        assert_eq!(stored.fetch_method, FetchMethod::Latest);
        assert_eq!(stored.weather.temperature_celsius(), Some(4.5));
        assert_eq!(stored.weather.temperature_fahrenheit(), Some(40.1));
        assert_eq!(stored.timestamp, "2024-01-01T00:00:00.000000Z");
        assert_eq!(stored.last_updated, "2024-01-02T00:00:00.000000Z");
    }

    #[test]
    fn null_weather_round_trips_as_null() {
        let store = Store::open_in_memory().unwrap();
        let mut r = row("Tuvalu", None);
        store.upsert(&mut r).unwrap();
        let stored = store.get("Tuvalu").unwrap().unwrap();
        assert!(stored.weather.is_empty());
        assert_eq!(stored.weather.temperature_fahrenheit(), None);
    }

    #[test]
    fn names_are_case_sensitive() {
        let store = Store::open_in_memory().unwrap();
        store.upsert(&mut row("Chad", None)).unwrap();
        assert_eq!(
            store.upsert(&mut row("chad", None)).unwrap(),
            UpsertStatus::Inserted
        );
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn drop_all_empties_and_keeps_schema() {
        let store = Store::open_in_memory().unwrap();
        store.upsert(&mut row("Chad", None)).unwrap();
        store.drop_all().unwrap();
        assert_eq!(store.count().unwrap(), 0);
        assert!(store.read_all().unwrap().is_empty());
        store.upsert(&mut row("Chad", None)).unwrap();
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn old_schema_gains_missing_columns() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE countries (name TEXT, region TEXT, state_province TEXT,
             temperature REAL, windspeed REAL, timestamp TEXT, fetch_method TEXT, api_used TEXT);",
        )
        .unwrap();
        let store = Store { conn };
        store.init().unwrap();
        let mut r = row("Peru", Some(18.0));
        assert_eq!(store.upsert(&mut r).unwrap(), UpsertStatus::Inserted);
        assert_eq!(store.read_all().unwrap().len(), 1);
    }
}
