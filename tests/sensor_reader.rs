// Integration tests for the sensor read protocol and 1-Wire discovery

mod common;

use common::{ScriptedSource, w1_not_ready, w1_valid};
use std::fs;
use std::sync::Arc;
use tempfile::tempdir;
use thermo_rs::config::SensorConfig;
use thermo_rs::hardware::{SensorError, SensorReader, W1Sensor};
use tokio::time::{Duration, Instant};
use tokio_test::{assert_err, assert_ok};

fn reader(source: Arc<ScriptedSource>) -> SensorReader {
    SensorReader::new(source, &SensorConfig::default())
}

#[tokio::test(start_paused = true)]
async fn test_retries_until_crc_is_valid() {
    let source = ScriptedSource::new(vec![
        w1_not_ready(),
        w1_not_ready(),
        w1_not_ready(),
        w1_valid(21250),
    ]);
    let start = Instant::now();

    let reading = assert_ok!(reader(source.clone()).read().await);

    assert_eq!(reading.celsius(), 21.25);
    assert_eq!(source.reads(), 4);
    // three 200 ms backoffs
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(600), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(800), "elapsed {:?}", elapsed);
}

#[tokio::test(start_paused = true)]
async fn test_valid_first_read_does_not_wait() {
    let source = ScriptedSource::new(vec![w1_valid(19875)]);
    let start = Instant::now();

    let reading = assert_ok!(reader(source.clone()).read().await);

    assert_eq!(reading.celsius(), 19.875);
    assert_eq!(source.reads(), 1);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_times_out_after_max_attempts() {
    let source = ScriptedSource::new(vec![w1_not_ready(); 10]);
    let start = Instant::now();

    let err = assert_err!(reader(source.clone()).read().await);

    assert!(matches!(err, SensorError::Timeout { attempts: 10 }), "got {:?}", err);
    assert_eq!(source.reads(), 10);
    assert!(start.elapsed() <= Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn test_respects_configured_attempts() {
    let source = ScriptedSource::new(vec![w1_not_ready()]);
    let config = SensorConfig { max_attempts: 3, ..SensorConfig::default() };

    let err = assert_err!(SensorReader::new(source.clone(), &config).read().await);

    assert!(matches!(err, SensorError::Timeout { attempts: 3 }));
    assert_eq!(source.reads(), 3);
}

#[tokio::test]
async fn test_missing_value_marker_is_format_error() {
    let source = ScriptedSource::new(vec![
        "54 01 4b 46 7f ff 0c 10 fd : crc=fd YES\n54 01 4b 46 7f ff 0c 10 fd\n".to_string(),
    ]);

    let err = assert_err!(reader(source.clone()).read().await);

    assert!(matches!(err, SensorError::Format(_)));
    assert_eq!(source.reads(), 1, "format errors are not retried");
}

#[tokio::test]
async fn test_source_failure_propagates() {
    let err = assert_err!(reader(ScriptedSource::failing()).read().await);
    assert!(matches!(err, SensorError::Io(_)));
}

#[tokio::test]
async fn test_every_read_is_fresh() {
    let source = ScriptedSource::readings(&[20.0, 20.5]);
    let reader = reader(source.clone());

    assert_eq!(reader.read().await.unwrap().celsius(), 20.0);
    assert_eq!(reader.read().await.unwrap().celsius(), 20.5);
    assert_eq!(source.reads(), 2);
}

#[tokio::test]
async fn test_discover_and_read_w1_device() {
    let base = tempdir().unwrap();
    fs::create_dir(base.path().join("w1_bus_master1")).unwrap();
    let device = base.path().join("28-0000075a1b2c");
    fs::create_dir(&device).unwrap();
    fs::write(device.join("w1_slave"), w1_valid(22437)).unwrap();

    let sensor = W1Sensor::discover(base.path(), "28").unwrap();
    assert_eq!(sensor.device_file(), device.join("w1_slave"));

    let reader = SensorReader::new(Arc::new(sensor), &SensorConfig::default());
    let reading = reader.read().await.unwrap();
    assert_eq!(reading.celsius(), 22.437);
}

#[test]
fn test_discover_picks_first_device_by_name() {
    let base = tempdir().unwrap();
    fs::create_dir(base.path().join("28-bbbb")).unwrap();
    fs::create_dir(base.path().join("28-aaaa")).unwrap();

    let sensor = W1Sensor::discover(base.path(), "28").unwrap();
    assert_eq!(sensor.device_file(), base.path().join("28-aaaa").join("w1_slave"));
}

#[test]
fn test_discover_without_device_is_unavailable() {
    let base = tempdir().unwrap();
    fs::create_dir(base.path().join("w1_bus_master1")).unwrap();

    let result = W1Sensor::discover(base.path(), "28");
    assert!(matches!(result, Err(SensorError::Unavailable(_))));
}

#[test]
fn test_discover_missing_bus_is_unavailable() {
    let base = tempdir().unwrap();
    let result = W1Sensor::discover(&base.path().join("devices"), "28");
    assert!(matches!(result, Err(SensorError::Unavailable(_))));
}
