//! File exports of country rows: the per-run CSV summary and full CSV/JSON dumps.

use crate::error::Result;
use crate::models::{CountryRecordOut, CountryRow};
use csv::WriterBuilder;
use std::borrow::Cow;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

/// Column order of the per-run summary CSV.
pub const SUMMARY_COLUMNS: [&str; 11] = [
    "name",
    "region",
    "population",
    "area",
    "capital",
    "lat",
    "lon",
    "temperature",
    "temperature_F",
    "windspeed",
    "timestamp",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    /// Infer from the file extension; `None` for anything but `.csv` / `.json`.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("csv") => Some(ExportFormat::Csv),
            Some("json") => Some(ExportFormat::Json),
            _ => None,
        }
    }

    pub fn default_file_name(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "countries_export.csv",
            ExportFormat::Json => "countries_export.json",
        }
    }
}

/// Neutralize spreadsheet formulas: text cells starting with `=`, `+`, `-` or `@`
/// get a leading single quote.
pub fn safe_cell(s: &str) -> Cow<'_, str> {
    if s.starts_with(['=', '+', '-', '@']) {
        Cow::Owned(format!("'{s}"))
    } else {
        Cow::Borrowed(s)
    }
}

fn safe_opt(s: &Option<String>) -> Option<Cow<'_, str>> {
    s.as_deref().map(safe_cell)
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Save the per-run summary (fixed [`SUMMARY_COLUMNS`] order) with header.
///
/// The `timestamp` column carries the weather observation time, empty when the
/// provider reported none.
pub fn save_summary_csv<P: AsRef<Path>>(rows: &[CountryRow], path: P) -> Result<()> {
    let path = path.as_ref();
    ensure_parent(path)?;
    let mut wtr = WriterBuilder::new().from_path(path)?;
    wtr.write_record(SUMMARY_COLUMNS)?;
    for r in rows {
        wtr.serialize((
            safe_cell(&r.name),
            safe_cell(&r.region),
            r.population,
            r.area,
            safe_opt(&r.capital),
            r.lat,
            r.lon,
            r.weather.temperature_celsius(),
            r.weather.temperature_fahrenheit(),
            r.weather.windspeed,
            &r.weather.observed_at,
        ))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Column order of the full CSV export; matches the fields of [`CountryRecordOut`].
pub const EXPORT_COLUMNS: [&str; 17] = [
    "name",
    "region",
    "state_province",
    "capital",
    "population",
    "area",
    "lat",
    "lon",
    "temperature_c",
    "temperature_f",
    "conditions",
    "observed_at",
    "windspeed",
    "timestamp",
    "last_updated",
    "fetch_method",
    "api_used",
];

fn owned_safe(s: &str) -> String {
    safe_cell(s).into_owned()
}

/// Save every stored column as CSV with header. The header is written even
/// when `rows` is empty.
pub fn save_csv<P: AsRef<Path>>(rows: &[CountryRow], path: P) -> Result<()> {
    let path = path.as_ref();
    ensure_parent(path)?;
    let mut wtr = WriterBuilder::new().has_headers(false).from_path(path)?;
    wtr.write_record(EXPORT_COLUMNS)?;
    for r in rows {
        let mut rec = CountryRecordOut::from(r);
        rec.name = owned_safe(&rec.name);
        rec.region = owned_safe(&rec.region);
        rec.state_province = owned_safe(&rec.state_province);
        rec.capital = rec.capital.as_deref().map(owned_safe);
        rec.conditions = rec.conditions.as_deref().map(owned_safe);
        rec.api_used = owned_safe(&rec.api_used);
        wtr.serialize(&rec)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Save rows as a pretty JSON array of flat records.
pub fn save_json<P: AsRef<Path>>(rows: &[CountryRow], path: P) -> Result<()> {
    let path = path.as_ref();
    ensure_parent(path)?;
    let out: Vec<CountryRecordOut> = rows.iter().map(CountryRecordOut::from).collect();
    let mut f = File::create(path)?;
    let s = serde_json::to_string_pretty(&out)?;
    f.write_all(s.as_bytes())?;
    Ok(())
}

pub fn export<P: AsRef<Path>>(rows: &[CountryRow], path: P, format: ExportFormat) -> Result<()> {
    match format {
        ExportFormat::Csv => save_csv(rows, path),
        ExportFormat::Json => save_json(rows, path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FetchMethod, WeatherReading};
    use tempfile::tempdir;

    fn sample() -> CountryRow {
        CountryRow {
            name: "Chile".into(),
            region: "Americas".into(),
            state_province: "South America".into(),
            capital: Some("Santiago".into()),
            population: Some(19_116_209),
            area: Some(756_102.0),
            lat: Some(-30.0),
            lon: Some(-71.0),
            weather: WeatherReading::with_temperature(12.0).conditions("Overcast"),
            timestamp: "2024-01-01T00:00:00Z".into(),
            last_updated: "2024-01-01T00:00:00Z".into(),
            fetch_method: FetchMethod::Single,
            api_used: "restcountries.com v3.1".into(),
        }
    }

    #[test]
    fn write_csv_and_json_into_new_directory() {
        let dir = tempdir().unwrap();
        let csvp = dir.path().join("nested/x.csv");
        let jsonp = dir.path().join("nested/x.json");
        let rows = vec![sample()];
        save_csv(&rows, &csvp).unwrap();
        save_json(&rows, &jsonp).unwrap();
        assert!(csvp.exists());
        assert!(jsonp.exists());
    }

    #[test]
    fn negative_numbers_are_not_quoted() {
        let dir = tempdir().unwrap();
        let p = dir.path().join("s.csv");
        save_summary_csv(&[sample()], &p).unwrap();
        let txt = fs::read_to_string(&p).unwrap();
        let line = txt.lines().nth(1).unwrap();
        assert!(line.contains(",-30.0,-71.0,"), "{line}");
    }

    #[test]
    fn empty_export_still_has_header() {
        let dir = tempdir().unwrap();
        let p = dir.path().join("empty.csv");
        save_csv(&[], &p).unwrap();
        let txt = fs::read_to_string(&p).unwrap();
        assert_eq!(txt.trim_end(), EXPORT_COLUMNS.join(","));
    }

    #[test]
    fn export_columns_line_up_with_values() {
        let dir = tempdir().unwrap();
        let p = dir.path().join("one.csv");
        save_csv(&[sample()], &p).unwrap();
        let mut rdr = csv::Reader::from_path(&p).unwrap();
        let headers = rdr.headers().unwrap().clone();
        assert_eq!(headers.iter().collect::<Vec<_>>(), EXPORT_COLUMNS);
        let rec = rdr.records().next().unwrap().unwrap();
        assert_eq!(rec.len(), EXPORT_COLUMNS.len());
        assert_eq!(&rec[0], "Chile");
        assert_eq!(&rec[3], "Santiago");
        assert_eq!(&rec[8], "12.0");
        assert_eq!(&rec[10], "Overcast");
        assert_eq!(&rec[11], "");
        assert_eq!(&rec[15], "single");
    }

    #[test]
    fn summary_timestamp_is_observation_time() {
        let dir = tempdir().unwrap();
        let p = dir.path().join("s.csv");
        let mut row = sample();
        row.weather = row.weather.observed_at(Some("2026-10-16T09:00".into()));
        save_summary_csv(&[row, sample()], &p).unwrap();
        let txt = fs::read_to_string(&p).unwrap();
        let mut lines = txt.lines().skip(1);
        assert!(lines.next().unwrap().ends_with(",2026-10-16T09:00"));
        assert!(lines.next().unwrap().ends_with(','));
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(ExportFormat::from_path(Path::new("a.CSV")), Some(ExportFormat::Csv));
        assert_eq!(ExportFormat::from_path(Path::new("a.json")), Some(ExportFormat::Json));
        assert_eq!(ExportFormat::from_path(Path::new("a.xlsx")), None);
        assert_eq!(ExportFormat::from_path(Path::new("noext")), None);
    }
}
