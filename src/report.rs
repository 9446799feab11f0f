//! Human-facing renderings of country rows: per-row console lines, a text grid,
//! grouped statistics, and health/system summaries.

use crate::config::Config;
use crate::db::{self, Store};
use crate::error::Result;
use crate::http::JsonTransport;
use crate::models::{CountryRow, UpsertStatus};
use crate::pipeline::RunSummary;
use crate::stats::Summary;
use crate::storage;
use num_format::{Locale, ToFormattedString};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;

/// Receives the batch of processed rows at the end of a run.
pub trait Reporter {
    fn report(&mut self, summary: &RunSummary) -> Result<()>;
}

/// Prints one line per row and the processed count, and optionally writes the
/// summary CSV.
pub struct ConsoleReporter<W: Write> {
    out: W,
    summary_csv: Option<PathBuf>,
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            summary_csv: None,
        }
    }

    pub fn with_summary_csv(mut self, path: impl Into<PathBuf>) -> Self {
        self.summary_csv = Some(path.into());
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Reporter for ConsoleReporter<W> {
    fn report(&mut self, summary: &RunSummary) -> Result<()> {
        for (row, status) in summary.rows.iter().zip(summary.statuses.iter()) {
            writeln!(self.out, "{}", row_line(row, *status))?;
        }
        if let Some(path) = &self.summary_csv {
            storage::save_summary_csv(&summary.rows, path)?;
            writeln!(self.out, "Summary saved to {}", path.display())?;
        }
        writeln!(self.out, "\nTotal countries processed: {}", summary.processed())?;
        Ok(())
    }
}

/// Format with up to two decimals, trailing zeros trimmed; blank when missing.
pub fn fmt_opt(v: Option<f64>) -> String {
    match v {
        Some(x) if x.is_finite() => {
            let s = format!("{:.2}", x);
            s.trim_end_matches('0').trim_end_matches('.').to_string()
        }
        _ => String::new(),
    }
}

fn fmt_count(v: Option<u64>) -> String {
    v.map(|n| n.to_formatted_string(&Locale::en))
        .unwrap_or_default()
}

/// One-line console summary of a processed row.
pub fn row_line(row: &CountryRow, status: Option<UpsertStatus>) -> String {
    let w = &row.weather;
    let temp = match (w.temperature_celsius(), w.temperature_fahrenheit()) {
        (Some(c), Some(f)) => format!("{} °C / {} °F", fmt_opt(Some(c)), fmt_opt(Some(f))),
        _ => "-".to_string(),
    };
    let mut line = format!(
        "{name} | {region} | pop {pop} | area {area} | capital {capital} | ({lat}, {lon}) | {temp}",
        name = row.name,
        region = row.region,
        pop = fmt_count(row.population),
        area = fmt_opt(row.area),
        capital = row.capital.as_deref().unwrap_or(""),
        lat = fmt_opt(row.lat),
        lon = fmt_opt(row.lon),
    );
    if let Some(ws) = w.windspeed {
        line.push_str(&format!(" | wind {} km/h", fmt_opt(Some(ws))));
    }
    if let Some(c) = &w.conditions {
        line.push_str(&format!(" | {c}"));
    }
    match status {
        Some(s) => line.push_str(&format!(" [{s}]")),
        None => line.push_str(" [not saved]"),
    }
    line
}

/// Widest a grid cell may get before it is truncated.
const MAX_CELL: usize = 28;

/// Truncate to `max` characters, ending with a single ellipsis when cut.
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// Box-drawn grid of stored rows, or `"Database is empty."`.
pub fn render_table(rows: &[CountryRow]) -> String {
    if rows.is_empty() {
        return "Database is empty.".to_string();
    }
    let headers = [
        "name",
        "region",
        "state_province",
        "temperature_c",
        "temperature_f",
        "conditions",
        "last_updated",
        "fetch_method",
    ];
    let body: Vec<Vec<String>> = rows
        .iter()
        .map(|r| {
            vec![
                r.name.clone(),
                r.region.clone(),
                r.state_province.clone(),
                fmt_opt(r.weather.temperature_celsius()),
                fmt_opt(r.weather.temperature_fahrenheit()),
                r.weather.conditions.clone().unwrap_or_default(),
                r.last_updated.clone(),
                r.fetch_method.to_string(),
            ]
            .into_iter()
            .map(|c| truncate_chars(&c, MAX_CELL))
            .collect()
        })
        .collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in &body {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let rule = |l: &str, m: &str, r: &str, fill: &str| {
        let segs: Vec<String> = widths.iter().map(|w| fill.repeat(w + 2)).collect();
        format!("{l}{}{r}", segs.join(m))
    };
    let line = |cells: &[String]| {
        let segs: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!(" {c}{} ", " ".repeat(w - c.chars().count())))
            .collect();
        format!("│{}│", segs.join("│"))
    };

    let header_cells: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    let mut out = vec![rule("╒", "╤", "╕", "═"), line(&header_cells), rule("╞", "╪", "╡", "═")];
    for (i, row) in body.iter().enumerate() {
        if i > 0 {
            out.push(rule("├", "┼", "┤", "─"));
        }
        out.push(line(row));
    }
    out.push(rule("╘", "╧", "╛", "═"));
    out.join("\n")
}

/// One line per region: `Europe  count=3 missing=1  min=.. max=.. mean=.. median=..`.
pub fn render_stats(summaries: &[Summary]) -> String {
    if summaries.is_empty() {
        return "No rows to summarize.".to_string();
    }
    let na = |v: Option<f64>| {
        let s = fmt_opt(v);
        if s.is_empty() { "NA".to_string() } else { s }
    };
    summaries
        .iter()
        .map(|s| {
            format!(
                "{}  count={} missing={}  min={} max={} mean={} median={}",
                s.region,
                s.count,
                s.missing,
                na(s.min),
                na(s.max),
                na(s.mean),
                na(s.median)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub api_available: bool,
    pub api_detail: String,
    pub db_path: PathBuf,
    pub db_size_bytes: Option<u64>,
    pub row_count: Option<usize>,
}

impl HealthReport {
    pub fn lines(&self) -> Vec<(String, String)> {
        vec![
            (
                "API Availability".into(),
                if self.api_available { "PASS" } else { "FAIL" }.into(),
            ),
            ("API Detail".into(), self.api_detail.clone()),
            ("Database".into(), self.db_path.display().to_string()),
            (
                "Database Size".into(),
                match self.db_size_bytes {
                    Some(b) => format!("{:.3} MB", b as f64 / (1024.0 * 1024.0)),
                    None => "No database found".into(),
                },
            ),
            (
                "Rows".into(),
                self.row_count.map(|n| n.to_string()).unwrap_or_else(|| "-".into()),
            ),
        ]
    }
}

/// Check the country API and inspect the database file.
pub fn health_check(
    transport: &dyn JsonTransport,
    config: &Config,
    store: Option<&Store>,
) -> HealthReport {
    let url = format!(
        "{}/all?fields=name",
        config.countries_base_url.trim_end_matches('/')
    );
    let (api_available, api_detail) = match transport.get_json(&url, config.country_timeout) {
        Ok(_) => (true, "ok".to_string()),
        Err(e) => (false, e.to_string()),
    };
    let row_count = store.and_then(|s| match s.count() {
        Ok(n) => Some(n),
        Err(e) => {
            log::warn!("health check could not count rows: {e}");
            None
        }
    });
    HealthReport {
        api_available,
        api_detail,
        db_path: config.db_path.clone(),
        db_size_bytes: db::file_size(&config.db_path),
        row_count,
    }
}

pub fn system_info(config: &Config) -> Vec<(String, String)> {
    vec![
        ("Version".into(), env!("CARGO_PKG_VERSION").into()),
        ("OS".into(), std::env::consts::OS.into()),
        ("Arch".into(), std::env::consts::ARCH.into()),
        ("Database".into(), config.db_path.display().to_string()),
        ("Countries API".into(), config.countries_base_url.clone()),
        ("Forecast API".into(), config.forecast_url.clone()),
        ("Geocoding API".into(), config.geocoding_url.clone()),
        ("Text weather API".into(), config.wttr_base_url.clone()),
        (
            "Timeouts".into(),
            format!(
                "country {}s, weather {}s",
                config.country_timeout.as_secs(),
                config.weather_timeout.as_secs()
            ),
        ),
    ]
}

/// `key: value` lines, keys padded to a common width.
pub fn render_pairs(pairs: &[(String, String)]) -> String {
    let w = pairs.iter().map(|(k, _)| k.chars().count()).max().unwrap_or(0);
    pairs
        .iter()
        .map(|(k, v)| format!("{k:<w$}  {v}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FetchMethod, WeatherReading};

    fn row(name: &str, temp: Option<f64>) -> CountryRow {
        CountryRow {
            name: name.into(),
            region: "Europe".into(),
            state_province: "Western Europe".into(),
            capital: Some("Paris".into()),
            population: Some(67_391_582),
            area: Some(551_695.0),
            lat: Some(46.0),
            lon: Some(2.0),
            weather: temp
                .map(|c| WeatherReading::with_temperature(c).windspeed(Some(7.2)))
                .unwrap_or_default(),
            timestamp: "t0".into(),
            last_updated: "t1".into(),
            fetch_method: FetchMethod::All,
            api_used: "x".into(),
        }
    }

    #[test]
    fn fmt_opt_trims_and_blanks() {
        assert_eq!(fmt_opt(Some(12.0)), "12");
        assert_eq!(fmt_opt(Some(12.346)), "12.35");
        assert_eq!(fmt_opt(Some(-0.5)), "-0.5");
        assert_eq!(fmt_opt(None), "");
        assert_eq!(fmt_opt(Some(f64::NAN)), "");
    }

    #[test]
    fn row_line_shows_weather_or_dash() {
        let line = row_line(&row("France", Some(20.0)), Some(UpsertStatus::Inserted));
        assert!(line.contains("pop 67,391,582"), "{line}");
        assert!(line.contains("20 °C / 68 °F"), "{line}");
        assert!(line.contains("wind 7.2 km/h"), "{line}");
        assert!(line.ends_with("[inserted]"), "{line}");

        let line = row_line(&row("France", None), None);
        assert!(line.contains("| - "), "{line}");
        assert!(line.ends_with("[not saved]"), "{line}");
    }

    #[test]
    fn table_has_header_and_one_line_per_row() {
        let t = render_table(&[row("France", Some(20.0)), row("Spain", None)]);
        let lines: Vec<&str> = t.lines().collect();
        // top, header, header rule, row, separator, row, bottom
        assert_eq!(lines.len(), 7);
        assert!(lines[1].contains("temperature_f"));
        assert!(lines[3].contains("France"));
        assert!(lines[5].contains("Spain"));
        let width = lines[0].chars().count();
        assert!(lines.iter().all(|l| l.chars().count() == width));
    }

    #[test]
    fn empty_table_message() {
        assert_eq!(render_table(&[]), "Database is empty.");
    }

    #[test]
    fn truncate_adds_single_ellipsis() {
        assert_eq!(truncate_chars("abc", 5), "abc");
        assert_eq!(truncate_chars("abcdefgh", 5), "abcd…");
    }

    #[test]
    fn console_reporter_prints_total() {
        let summary = RunSummary {
            rows: vec![row("France", Some(20.0))],
            statuses: vec![Some(UpsertStatus::Updated)],
            ..RunSummary::empty("france", FetchMethod::Single)
        };
        let mut rep = ConsoleReporter::new(Vec::new());
        rep.report(&summary).unwrap();
        let out = String::from_utf8(rep.into_inner()).unwrap();
        assert!(out.contains("France"));
        assert!(out.contains("[updated]"));
        assert!(out.trim_end().ends_with("Total countries processed: 1"));
    }

    #[test]
    fn health_reports_api_and_row_count() {
        use crate::http::MapTransport;
        let config = Config {
            countries_base_url: "http://countries.test/v3.1".into(),
            db_path: PathBuf::from("does/not/exist.db"),
            ..Config::default()
        };
        let store = Store::open_in_memory().unwrap();
        let up = MapTransport::new().route("http://countries.test/v3.1/all", serde_json::json!([]));
        let h = health_check(&up, &config, Some(&store));
        assert!(h.api_available);
        assert_eq!(h.row_count, Some(0));
        assert_eq!(h.db_size_bytes, None);
        assert!(h.lines().iter().any(|(k, v)| k == "Database Size" && v == "No database found"));

        let down = MapTransport::new().status("http://countries.test", 503);
        let h = health_check(&down, &config, None);
        assert!(!h.api_available);
        assert!(h.api_detail.contains("503"));
        assert_eq!(h.row_count, None);
    }
}
