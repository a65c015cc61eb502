use aqi_forecast::{aggregate_pollutants, build_features, WeatherFrame};
use chrono::{Duration, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use polars::prelude::*;

fn hourly_frame(hours: i64, value: impl Fn(i64) -> f64, name: &str) -> DataFrame {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let times: Vec<String> = (0..hours)
        .map(|h| (start + Duration::hours(h)).to_string())
        .collect();
    let values: Vec<f64> = (0..hours).map(value).collect();
    DataFrame::new(vec![
        Series::new("time".into(), times).into(),
        Series::new(name.into(), values).into(),
    ])
    .unwrap()
}

fn bench_features(c: &mut Criterion) {
    // Two weeks of history, the default feature window.
    let hours = 14 * 24;
    let raw = hourly_frame(hours, |h| 20.0 + (h % 24) as f64, "pm2_5");
    let weather =
        WeatherFrame::from_raw(hourly_frame(hours, |h| 15.0 + (h % 12) as f64, "temperature_2m"))
            .unwrap();

    c.bench_function("aggregate_pollutants", |b| {
        b.iter(|| aggregate_pollutants(black_box(raw.clone())))
    });

    let pollutants = aggregate_pollutants(raw.clone()).unwrap();
    c.bench_function("build_features", |b| {
        b.iter(|| build_features(black_box(&pollutants), None))
    });
    c.bench_function("build_features_with_weather", |b| {
        b.iter(|| build_features(black_box(&pollutants), Some(&weather)))
    });
}

criterion_group!(benches, bench_features);
criterion_main!(benches);
