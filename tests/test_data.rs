use chrono::NaiveDate;
use stock_forecast::data::{DataLoader, PricePoint, TimeSeries};
use std::io::Write;
use tempfile::NamedTempFile;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn test_data_loader_from_csv() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "Date,Price").unwrap();
    writeln!(file, "2023-01-01,100.0").unwrap();
    writeln!(file, "2023-01-02,103.5").unwrap();
    writeln!(file, "2023-01-03,101.25").unwrap();

    let series = DataLoader::from_csv(file.path()).unwrap();

    assert_eq!(series.len(), 3);
    assert_eq!(series.prices(), vec![100.0, 103.5, 101.25]);
    assert_eq!(series.last_date(), date(2023, 1, 3));
}

#[test]
fn test_data_loader_detects_alternative_column_names() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "timestamp,close,volume").unwrap();
    writeln!(file, "2023-06-01,250.0,10").unwrap();
    writeln!(file, "2023-06-02,251.5,12").unwrap();

    let series = DataLoader::from_csv(file.path()).unwrap();

    assert_eq!(series.len(), 2);
    assert_eq!(series.last_price(), 251.5);
}

#[test]
fn test_data_loader_rejects_missing_price_column() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "date,volume").unwrap();
    writeln!(file, "2023-01-01,1000").unwrap();

    assert!(DataLoader::from_csv(file.path()).is_err());
}

#[test]
fn test_time_series_validation() {
    // Empty series
    assert!(TimeSeries::new(vec![]).is_err());

    // Non-positive price
    let points = vec![
        PricePoint::new(date(2023, 1, 1), 100.0),
        PricePoint::new(date(2023, 1, 2), 0.0),
    ];
    assert!(TimeSeries::new(points).is_err());

    // Dates out of order
    let points = vec![
        PricePoint::new(date(2023, 1, 2), 100.0),
        PricePoint::new(date(2023, 1, 1), 101.0),
    ];
    assert!(TimeSeries::new(points).is_err());

    // Duplicate dates
    let points = vec![
        PricePoint::new(date(2023, 1, 1), 100.0),
        PricePoint::new(date(2023, 1, 1), 101.0),
    ];
    assert!(TimeSeries::new(points).is_err());
}

#[test]
fn test_time_series_accessors() {
    let series =
        TimeSeries::from_daily_prices(date(2023, 1, 1), &[100.0, 102.0, 104.0]).unwrap();

    assert_eq!(series.len(), 3);
    assert!(!series.is_empty());
    assert_eq!(series.last_price(), 104.0);
    assert_eq!(series.last_date(), date(2023, 1, 3));
    assert_eq!(series.points()[1].price, 102.0);
}

#[test]
fn test_data_loader_accepts_pre_epoch_dates() {
    use polars::prelude::{DataFrame, DataType, NamedFrom, Series};

    let dates = Series::new("date", &[-3i32, -2, -1, 0])
        .cast(&DataType::Date)
        .unwrap();
    let prices = Series::new("close", &[10.0, 10.5, 10.25, 11.0]);
    let df = DataFrame::new(vec![dates, prices]).unwrap();

    let series = DataLoader::from_dataframe(df).unwrap();

    assert_eq!(series.len(), 4);
    assert_eq!(series.points()[0].date, date(1969, 12, 29));
    assert_eq!(series.last_date(), date(1970, 1, 1));
}
