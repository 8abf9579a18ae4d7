//! End-to-end scenarios: raw tables through preparation into each component.

use approx::assert_relative_eq;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use energy_analytics::cache::{CacheKey, ResultCache};
use energy_analytics::config::AnalysisDefaults;
use energy_analytics::core::TimeSeries;
use energy_analytics::correlation::{sliding_correlation, CorrelationConfig};
use energy_analytics::data::{
    energy_series, filter_date_range, EnergyRecord, RawTable, WeatherField, WeatherFrame,
    WeatherRecord,
};
use energy_analytics::detection::{AnomalyDetector, OutlierSummary, SpcConfig};
use energy_analytics::error::AnalysisError;
use energy_analytics::forecast::{forecast, ForecastResult, SarimaxConfig, SarimaxOrder};
use energy_analytics::prepare::{resample_hourly, RawValue};
use energy_analytics::seasonality::Stl;
use energy_analytics::snow::{ControlRegime, SnowTransportModel, SnowTransportParams};
use energy_analytics::spectral::{spectrogram, SpectrogramConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap()
}

fn text(s: &str) -> RawValue {
    RawValue::Text(s.to_string())
}

fn hourly_frame(start: DateTime<Utc>, hours: usize, temp: f64, precip: f64, wind: f64, dir: f64) -> WeatherFrame {
    let timestamps = (0..hours as i64).map(|h| start + Duration::hours(h)).collect();
    WeatherFrame::new(
        timestamps,
        vec![temp; hours],
        vec![precip; hours],
        vec![wind; hours],
        vec![dir; hours],
    )
    .unwrap()
}

#[test]
fn constant_year_decomposes_into_flat_components() {
    let ts = TimeSeries::hourly(t0(), vec![100.0; 8760]).unwrap();
    let result = Stl::new(24)
        .with_seasonal_window(13)
        .with_trend_window(365)
        .decompose(&ts)
        .unwrap();

    for i in 0..ts.len() {
        assert_relative_eq!(result.seasonal.values()[i], 0.0, epsilon = 1e-6);
        assert_relative_eq!(result.trend.values()[i], 100.0, epsilon = 1e-6);
        assert_relative_eq!(result.residual.values()[i], 0.0, epsilon = 1e-6);
    }
}

#[test]
fn constant_wind_matches_closed_form() {
    let n = 100;
    let u: f64 = 5.0;
    let frame = hourly_frame(Utc.with_ymd_and_hms(2021, 11, 1, 0, 0, 0).unwrap(), n, -3.0, 0.2, u, 90.0);
    let report = SnowTransportModel::new(SnowTransportParams::default()).compute(&frame).unwrap();

    let expected = n as f64 * u.powf(3.8) * 3600.0 / 233_847.0;
    let season = &report.seasons[0];
    assert_relative_eq!(season.qupot, expected, max_relative = 1e-12);

    let rose = &report.season_sectors[0];
    assert_relative_eq!(rose.total(), expected, max_relative = 1e-12);
    assert_relative_eq!(rose.values[4], expected, max_relative = 1e-12);
    assert_eq!(rose.values.iter().filter(|v| **v > 0.0).count(), 1);
}

#[test]
fn calm_season_has_no_transport() {
    let calm = hourly_frame(Utc.with_ymd_and_hms(2020, 12, 1, 0, 0, 0).unwrap(), 500, -8.0, 0.5, 0.0, 180.0);
    let windy = hourly_frame(Utc.with_ymd_and_hms(2021, 12, 1, 0, 0, 0).unwrap(), 500, -8.0, 0.5, 12.0, 270.0);

    let mut timestamps = calm.timestamps().to_vec();
    timestamps.extend_from_slice(windy.timestamps());
    let join = |field| {
        let mut v = calm.column(field).to_vec();
        v.extend_from_slice(windy.column(field));
        v
    };
    let frame = WeatherFrame::new(
        timestamps,
        join(WeatherField::Temperature),
        join(WeatherField::Precipitation),
        join(WeatherField::WindSpeed),
        join(WeatherField::WindDirection),
    )
    .unwrap();

    let report = SnowTransportModel::default().compute(&frame).unwrap();
    assert_eq!(report.season_count(), 2);
    let (a, b) = (&report.seasons[0], &report.seasons[1]);
    assert_eq!(a.label(), "2020-2021");
    assert_eq!(a.qupot, 0.0);
    assert_eq!(a.qt, 0.0);
    assert!(a.swe > 0.0);
    assert_eq!(a.regime, ControlRegime::Wind);
    assert!(b.qt > 0.0);
    assert_eq!(report.max_qt(), b.qt);
}

#[test]
fn spc_flags_spike_for_every_width_up_to_ten() {
    let mut rng = StdRng::seed_from_u64(99);
    let values: Vec<f64> = (0..1000)
        .map(|i| 5.0 * (2.0 * PI * i as f64 / 1000.0).sin() + rng.gen_range(-1.0..1.0))
        .collect();
    let baseline = SpcConfig::default().detect(&TimeSeries::hourly(t0(), values.clone()).unwrap()).unwrap();
    let OutlierSummary::Spc(summary) = baseline.summary else {
        panic!("expected spc summary");
    };

    let mut spiked = values;
    spiked[600] += 100.0 * summary.mad_satv;
    let ts = TimeSeries::hourly(t0(), spiked).unwrap();
    for k in 1..=10 {
        let report = SpcConfig::new(10, k as f64).detect(&ts).unwrap();
        assert!(report.is_flagged(600), "spike missed for k = {k}");
    }
}

#[test]
fn spc_flags_spike_in_flat_series() {
    for n in [50usize, 200, 1000] {
        let spike = n / 2;
        let mut values = vec![5.0; n];
        values[spike] += 100.0;
        let ts = TimeSeries::hourly(t0(), values).unwrap();

        for k in 1..=10 {
            let report = SpcConfig::new(10, k as f64).detect(&ts).unwrap();
            assert!(report.is_flagged(spike), "spike missed for n = {n}, k = {k}");
            if k >= 7 {
                assert_eq!(report.flagged_indices(), vec![spike], "n = {n}, k = {k}");
            }
        }
    }
}

#[test]
fn ar1_forecast_stays_near_history() {
    let mut rng = StdRng::seed_from_u64(8);
    let mut prev = 0.0;
    let values: Vec<f64> = (0..500)
        .map(|_| {
            prev = 0.8 * prev + rng.gen_range(-1.0..1.0);
            prev
        })
        .collect();
    let (lo, hi) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(a, b), v| (a.min(*v), b.max(*v)));

    let config = SarimaxConfig::new(SarimaxOrder::new(1, 0, 0));
    let result = forecast(&TimeSeries::hourly(t0(), values).unwrap(), &[], &config, 24).unwrap();

    let sigma = result.model.sigma2().sqrt();
    let first = result.point.values()[0];
    assert!(first >= lo - sigma && first <= hi + sigma);
    assert!(result.lower.values()[0] < first && first < result.upper.values()[0]);
}

#[test]
fn production_table_flows_into_decomposition_and_spectrogram() {
    let columns = ["startTime", "priceArea", "productionGroup", "quantityKwh"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let mut rows = Vec::new();
    for h in 0..24 * 21 {
        let t = t0() + Duration::hours(h);
        let value = 1000.0 + 200.0 * (2.0 * PI * h as f64 / 24.0).sin();
        // Hour 100 is missing from the source.
        if h == 100 {
            continue;
        }
        rows.push(vec![
            text(&t.to_rfc3339()),
            text("NO 1"),
            text("Hydro"),
            RawValue::Number(value),
        ]);
    }
    // A duplicated hour, a non-numeric quantity and an unparseable timestamp.
    rows.push(vec![text(&t0().to_rfc3339()), text("NO1"), text("hydro"), RawValue::Number(1000.0)]);
    rows.push(vec![text(&(t0() + Duration::hours(5)).to_rfc3339()), text("NO1"), text("hydro"), text("n/a")]);
    rows.push(vec![text("not a time"), text("NO1"), text("hydro"), RawValue::Number(1.0)]);

    let table = RawTable::new(columns, rows).unwrap();
    let records = EnergyRecord::from_table(&table).unwrap();
    let series = energy_series(&records, "NO1", "HYDRO").unwrap();
    let hourly = resample_hourly(&series).unwrap();

    assert_eq!(hourly.len(), 24 * 21);
    assert!(!hourly.has_missing_values());
    assert_relative_eq!(hourly.values()[0], 1000.0, epsilon = 1e-9);

    let decomposition = Stl::new(24).decompose(&hourly).unwrap();
    assert!(decomposition.seasonal_strength() > 0.9);

    let spec = spectrogram(&hourly, &SpectrogramConfig::new(96, 48)).unwrap();
    for f in spec.dominant_frequencies() {
        assert_relative_eq!(f, 4.0 / 96.0, epsilon = 1e-12);
    }

    let week = filter_date_range(
        &hourly,
        NaiveDate::from_ymd_opt(2021, 1, 4).unwrap(),
        NaiveDate::from_ymd_opt(2021, 1, 10).unwrap(),
    );
    assert_eq!(week.len(), 24 * 7);
}

#[test]
fn weather_table_feeds_correlation() {
    let columns = [
        "time",
        "temperature_2m (°C)",
        "precipitation (mm)",
        "windspeed_10m (m/s)",
        "wind_direction_10m (°)",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    let rows = (0..200)
        .map(|h| {
            let t = t0() + Duration::hours(h);
            vec![
                text(&t.to_rfc3339()),
                RawValue::Number((2.0 * PI * h as f64 / 24.0).sin()),
                RawValue::Number(0.0),
                RawValue::Number(5.0 + (2.0 * PI * (h as f64 - 3.0) / 24.0).sin()),
                RawValue::Number(200.0),
            ]
        })
        .collect();
    let records = WeatherRecord::from_table(&RawTable::new(columns, rows).unwrap()).unwrap();
    let frame = WeatherFrame::from_records(&records).unwrap();

    let temperature = frame.series(WeatherField::Temperature).unwrap();
    let wind = frame.series(WeatherField::WindSpeed).unwrap();
    let corr = sliding_correlation(&temperature, &wind, &CorrelationConfig::new(3, 48)).unwrap();
    let summary = corr.summary().unwrap();
    assert_relative_eq!(summary.min, 1.0, epsilon = 1e-9);
    assert_relative_eq!(summary.max, 1.0, epsilon = 1e-9);
}

#[test]
fn forecast_results_are_memoized_by_the_caller() {
    let values: Vec<f64> = (0..300).map(|i| (i as f64 * 0.3).sin() * 3.0 + (i as f64 * 0.07).cos()).collect();
    let ts = TimeSeries::hourly(t0(), values).unwrap();
    let config = SarimaxConfig::new(SarimaxOrder::new(2, 0, 0));
    let key = CacheKey::builder("forecast")
        .series(&ts)
        .param("order", &config.order.p)
        .param("horizon", &12usize)
        .finish();

    let cache: ResultCache<ForecastResult> = ResultCache::new(8);
    let mut fits = 0;
    for _ in 0..3 {
        let result = cache
            .get_or_try_insert_with(key, || {
                fits += 1;
                forecast(&ts, &[], &config, 12)
            })
            .unwrap();
        assert_eq!(result.horizon(), 12);
    }
    assert_eq!(fits, 1);
    assert_eq!(cache.stats().hits, 2);
}

#[test]
fn typed_failures_surface_to_the_caller() {
    let empty = TimeSeries::new(vec![], vec![]).unwrap();
    assert!(matches!(
        forecast(&empty, &[], &SarimaxConfig::default(), 24),
        Err(AnalysisError::InsufficientData { .. })
    ));

    let short = TimeSeries::hourly(t0(), vec![1.0; 30]).unwrap();
    assert!(matches!(
        Stl::new(24).decompose(&short),
        Err(AnalysisError::InsufficientData { needed: 48, got: 30 })
    ));
    assert!(matches!(
        spectrogram(&short, &SpectrogramConfig::default()),
        Err(AnalysisError::InsufficientData { .. })
    ));

    let empty_frame = WeatherFrame::new(vec![], vec![], vec![], vec![], vec![]).unwrap();
    assert!(matches!(
        SnowTransportModel::default().compute(&empty_frame),
        Err(AnalysisError::NoData(_))
    ));

    let records: Vec<EnergyRecord> = Vec::new();
    assert!(matches!(
        energy_series(&records, "NO1", "hydro"),
        Err(AnalysisError::NoData(_))
    ));
}

#[test]
fn dashboard_defaults_drive_every_component() {
    let defaults = AnalysisDefaults::default();
    let values: Vec<f64> = (0..24 * 40)
        .map(|i| 10.0 + 4.0 * (2.0 * PI * i as f64 / 24.0).sin() + (i as f64 * 0.013).sin())
        .collect();
    let ts = TimeSeries::hourly(t0(), values).unwrap();

    let decomposition = defaults.decomposition.decompose(&ts).unwrap();
    assert_eq!(decomposition.trend.len(), ts.len());
    let spec = spectrogram(&ts, &defaults.spectrogram).unwrap();
    assert_eq!(spec.shape().0, 129);
    let report = defaults.spc.detect(&ts).unwrap();
    assert!(report.proportion() < 0.05);
}
