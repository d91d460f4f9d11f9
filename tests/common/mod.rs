// Shared test doubles for the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use thermo_rs::alerts::{AlertError, AlertTransport};
use thermo_rs::config::{ControlConfig, SensorConfig};
use thermo_rs::hardware::{Actuator, ActuatorError, SensorError, SensorReader, SensorSource};
use thermo_rs::telemetry::{LogSink, StorageError, TelemetryRecord, WeatherError, WeatherProvider};
use thermo_rs::thermostat::ThermostatController;

pub fn w1_valid(millidegrees: i64) -> String {
    format!(
        "54 01 4b 46 7f ff 0c 10 fd : crc=fd YES\n54 01 4b 46 7f ff 0c 10 fd t={}\n",
        millidegrees
    )
}

pub fn w1_not_ready() -> String {
    "54 01 4b 46 7f ff 0c 10 fd : crc=00 NO\n54 01 4b 46 7f ff 0c 10 fd t=85000\n".to_string()
}

/// Plays back canned sensor responses. Once one response is left it is
/// repeated forever; an empty script fails every read.
pub struct ScriptedSource {
    responses: Mutex<VecDeque<String>>,
    reads: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(responses: Vec<String>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            reads: AtomicUsize::new(0),
        })
    }

    pub fn readings(celsius: &[f64]) -> Arc<Self> {
        Self::new(
            celsius
                .iter()
                .map(|c| w1_valid((c * 1000.0).round() as i64))
                .collect(),
        )
    }

    pub fn failing() -> Arc<Self> {
        Self::new(Vec::new())
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SensorSource for ScriptedSource {
    async fn read_raw(&self) -> Result<String, SensorError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let mut responses = self.responses.lock().unwrap();
        match responses.len() {
            0 => Err(SensorError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "w1_slave vanished",
            ))),
            1 => Ok(responses[0].clone()),
            _ => Ok(responses.pop_front().unwrap()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    On,
    Off,
    Cleanup,
}

/// Records every command and tracks the relay state like real hardware would.
#[derive(Default)]
pub struct RecordingActuator {
    active: AtomicBool,
    fail_turn_on: AtomicBool,
    commands: Mutex<Vec<Command>>,
}

impl RecordingActuator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn commands(&self) -> Vec<Command> {
        self.commands.lock().unwrap().clone()
    }

    pub fn count(&self, command: Command) -> usize {
        self.commands().iter().filter(|c| **c == command).count()
    }

    /// Flip the relay without going through the controller.
    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }

    pub fn fail_turn_on(&self) {
        self.fail_turn_on.store(true, Ordering::SeqCst);
    }
}

impl Actuator for RecordingActuator {
    fn is_active(&self) -> Result<bool, ActuatorError> {
        Ok(self.active.load(Ordering::SeqCst))
    }

    fn turn_on(&self) -> Result<(), ActuatorError> {
        if self.fail_turn_on.load(Ordering::SeqCst) {
            return Err(ActuatorError::InvalidState("relay stuck".to_string()));
        }
        self.commands.lock().unwrap().push(Command::On);
        self.active.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn turn_off(&self) -> Result<(), ActuatorError> {
        self.commands.lock().unwrap().push(Command::Off);
        self.active.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn cleanup(&self) -> Result<(), ActuatorError> {
        self.commands.lock().unwrap().push(Command::Cleanup);
        Ok(())
    }
}

pub fn controller_with(
    source: Arc<ScriptedSource>,
    actuator: Arc<RecordingActuator>,
) -> ThermostatController {
    let sensor = Arc::new(SensorReader::new(source, &SensorConfig::default()));
    ThermostatController::new(sensor, actuator, &ControlConfig::default()).unwrap()
}

#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<(String, String)>>,
    fail: AtomicBool,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        let transport = Self::default();
        transport.fail.store(true, Ordering::SeqCst);
        Arc::new(transport)
    }

    pub fn bodies(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(_, body)| body.clone()).collect()
    }

    pub fn attempts(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl AlertTransport for RecordingTransport {
    async fn send(&self, subject: &str, body: &str) -> Result<(), AlertError> {
        self.sent.lock().unwrap().push((subject.to_string(), body.to_string()));
        if self.fail.load(Ordering::SeqCst) {
            return Err(AlertError::Rejected(503));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingSink {
    records: Mutex<Vec<TelemetryRecord>>,
    fail: AtomicBool,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        let sink = Self::default();
        sink.fail.store(true, Ordering::SeqCst);
        Arc::new(sink)
    }

    pub fn records(&self) -> Vec<TelemetryRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl LogSink for RecordingSink {
    async fn insert(&self, record: &TelemetryRecord) -> Result<(), StorageError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("database write failed".to_string()));
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

pub struct FixedWeather(pub f64);

#[async_trait]
impl WeatherProvider for FixedWeather {
    async fn outdoor_temperature(&self) -> Result<f64, WeatherError> {
        Ok(self.0)
    }
}

pub struct FailingWeather;

#[async_trait]
impl WeatherProvider for FailingWeather {
    async fn outdoor_temperature(&self) -> Result<f64, WeatherError> {
        Err(WeatherError::MissingField("temperature"))
    }
}
