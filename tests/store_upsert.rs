use globe_etl::models::{CountryRow, FetchMethod, WeatherReading};
use globe_etl::{Store, UpsertStatus};
use tempfile::tempdir;

fn iceland(temp: f64, method: FetchMethod) -> CountryRow {
    CountryRow {
        name: "Iceland".into(),
        region: "Europe".into(),
        state_province: "Northern Europe".into(),
        capital: Some("Reykjavik".into()),
        population: Some(366_425),
        area: Some(103_000.0),
        lat: Some(65.0),
        lon: Some(-18.0),
        weather: WeatherReading::with_temperature(temp)
            .conditions("Overcast")
            .observed_at(Some("2026-10-16T09:00".into()))
            .windspeed(Some(20.1)),
        timestamp: String::new(),
        last_updated: String::new(),
        fetch_method: method,
        api_used: "restcountries.com v3.1".into(),
    }
}

#[test]
fn rows_survive_reopening_and_update_in_place() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested/global_data.db");

    let mut first = iceland(3.0, FetchMethod::Single);
    {
        let store = Store::open(&path).unwrap();
        assert_eq!(store.upsert(&mut first).unwrap(), UpsertStatus::Inserted);
    }
    assert!(!first.timestamp.is_empty());
    assert_eq!(first.timestamp, first.last_updated);

    let store = Store::open(&path).unwrap();
    let stored = store.get("Iceland").unwrap().unwrap();
    assert_eq!(stored, first);
    assert_eq!(stored.weather.temperature_fahrenheit(), Some(37.4));

    let mut second = iceland(-1.5, FetchMethod::Latest);
    assert_eq!(store.upsert(&mut second).unwrap(), UpsertStatus::Updated);
    assert_eq!(second.timestamp, first.timestamp);
    assert_eq!(store.count().unwrap(), 1);

    let stored = store.get("Iceland").unwrap().unwrap();
    assert_eq!(stored.weather.temperature_celsius(), Some(-1.5));
    assert_eq!(stored.fetch_method, FetchMethod::Latest);
    assert_eq!(stored.timestamp, first.timestamp);
}

#[test]
fn read_all_orders_by_name() {
    let store = Store::open_in_memory().unwrap();
    for name in ["Peru", "Chad", "Mali"] {
        let mut row = iceland(20.0, FetchMethod::All);
        row.name = name.into();
        store.upsert(&mut row).unwrap();
    }
    let names: Vec<String> = store
        .read_all()
        .unwrap()
        .into_iter()
        .map(|r| r.name)
        .collect();
    assert_eq!(names, ["Chad", "Mali", "Peru"]);
}
