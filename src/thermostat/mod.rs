// src/thermostat/mod.rs - Hysteresis control loop
pub mod mode;
pub mod observer;

pub use mode::{HeatingMode, UnknownModeError};
pub use observer::TemperatureObserver;

use crate::config::ControlConfig;
use crate::hardware::{Actuator, ActuatorError, SensorError, SensorReader, TemperatureReading};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("Sensor error: {0}")]
    Sensor(#[from] SensorError),
    #[error("Actuator fault: {0}")]
    Actuator(#[from] ActuatorError),
    #[error("Target temperature must be finite, got {0}")]
    InvalidTarget(f64),
    #[error("Invalid controller settings: {0}")]
    InvalidSettings(String),
    #[error("Thermostat has been shut down")]
    ShutDown,
    #[error("Control loop panicked: {0}")]
    LoopPanicked(String),
}

/// What one control tick decided to do with the actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actuation {
    TurnOn,
    TurnOff,
    Hold,
}

/// Hysteresis decision for a single reading.
///
/// Comparisons are strict: a reading exactly on either edge of the band holds.
pub fn decide(reading: f64, target: f64, hysteresis: f64, active: bool) -> Actuation {
    if !active && reading < target - hysteresis {
        Actuation::TurnOn
    } else if active && reading > target + hysteresis {
        Actuation::TurnOff
    } else {
        Actuation::Hold
    }
}

/// Target temperature shared between the control loop and command handlers.
#[derive(Debug)]
pub struct Setpoint(AtomicU64);

impl Setpoint {
    pub fn new(celsius: f64) -> Self {
        Self(AtomicU64::new(celsius.to_bits()))
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::SeqCst))
    }

    pub fn set(&self, celsius: f64) {
        self.0.store(celsius.to_bits(), Ordering::SeqCst);
    }
}

/// State the control loop task needs; shared with the controller handle.
struct ControlCore {
    sensor: Arc<SensorReader>,
    actuator: Arc<dyn Actuator>,
    target: Setpoint,
    hysteresis: f64,
    interval: Duration,
    observer: TemperatureObserver,
}

impl ControlCore {
    async fn tick(&self) -> Result<Actuation, ControlError> {
        let reading = self.sensor.read().await?;
        tracing::debug!("Current temperature: {:.2}°C", reading.celsius());
        self.observer.notify(reading);

        // Always ask the hardware; a cached flag would drift after a manual switch.
        let active = self.actuator.is_active()?;
        let target = self.target.get();
        let action = decide(reading.celsius(), target, self.hysteresis, active);
        match action {
            Actuation::TurnOn => {
                tracing::info!(
                    "Current temperature ({:.2}°C) below target ({:.2}°C). Turning heating ON.",
                    reading.celsius(),
                    target
                );
                self.actuator.turn_on()?;
            }
            Actuation::TurnOff => {
                tracing::info!(
                    "Current temperature ({:.2}°C) above target ({:.2}°C). Turning heating OFF.",
                    reading.celsius(),
                    target
                );
                self.actuator.turn_off()?;
            }
            Actuation::Hold => {}
        }
        Ok(action)
    }
}

async fn run_control_loop(
    core: Arc<ControlCore>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), ControlError> {
    tracing::info!("Control loop started");
    let mut interval = tokio::time::interval(core.interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.recv() => break,
            _ = interval.tick() => {}
        }
        tokio::select! {
            biased;
            _ = shutdown_rx.recv() => break,
            result = core.tick() => match result {
                Ok(_) => {}
                Err(ControlError::Sensor(e)) => {
                    tracing::warn!("Skipping control tick: {}", e);
                }
                Err(e) => {
                    tracing::error!("Control loop stopped: {}", e);
                    return Err(e);
                }
            }
        }
    }
    tracing::info!("Control loop shutting down");
    Ok(())
}

struct ControlLoop {
    shutdown_tx: broadcast::Sender<()>,
    handle: JoinHandle<Result<(), ControlError>>,
}

impl ControlLoop {
    /// Signal the loop and wait until it has actually finished.
    async fn terminate(self) -> Result<(), ControlError> {
        // The loop may already have exited on a fault; nobody left to receive.
        let _ = self.shutdown_tx.send(());
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(ControlError::LoopPanicked(e.to_string())),
        }
    }
}

/// Drives the heating actuator from sensor readings.
///
/// At most one control loop runs at a time. Heating state is never shadowed
/// here; it is always read back from the actuator.
pub struct ThermostatController {
    core: Arc<ControlCore>,
    control_loop: Mutex<Option<ControlLoop>>,
    mode: AtomicU8,
    shut_down: AtomicBool,
}

impl ThermostatController {
    pub fn new(
        sensor: Arc<SensorReader>,
        actuator: Arc<dyn Actuator>,
        config: &ControlConfig,
    ) -> Result<Self, ControlError> {
        if !config.initial_target.is_finite() {
            return Err(ControlError::InvalidTarget(config.initial_target));
        }
        if !config.hysteresis.is_finite() || config.hysteresis <= 0.0 {
            return Err(ControlError::InvalidSettings(format!(
                "hysteresis must be > 0, got {}",
                config.hysteresis
            )));
        }
        if config.interval_secs == 0 {
            return Err(ControlError::InvalidSettings("control interval must be > 0".to_string()));
        }
        Ok(Self {
            core: Arc::new(ControlCore {
                sensor,
                actuator,
                target: Setpoint::new(config.initial_target),
                hysteresis: config.hysteresis,
                interval: config.interval(),
                observer: TemperatureObserver::new(),
            }),
            control_loop: Mutex::new(None),
            mode: AtomicU8::new(HeatingMode::Off as u8),
            shut_down: AtomicBool::new(false),
        })
    }

    /// Change the target. Picked up by the next control tick.
    pub fn set_target(&self, celsius: f64) -> Result<(), ControlError> {
        if !celsius.is_finite() {
            return Err(ControlError::InvalidTarget(celsius));
        }
        tracing::info!("Setting target temperature: {:.1}°C", celsius);
        self.core.target.set(celsius);
        Ok(())
    }

    pub fn target(&self) -> f64 {
        self.core.target.get()
    }

    pub fn hysteresis(&self) -> f64 {
        self.core.hysteresis
    }

    /// Live heating state, read from the actuator.
    pub fn is_active(&self) -> Result<bool, ActuatorError> {
        self.core.actuator.is_active()
    }

    /// Take a fresh reading outside the control loop.
    pub async fn current_temperature(&self) -> Result<TemperatureReading, SensorError> {
        self.core.sensor.read().await
    }

    /// Install the temperature-changed callback, replacing any earlier one.
    pub fn register_temperature_changed<F>(&self, callback: F)
    where
        F: Fn(TemperatureReading) + Send + Sync + 'static,
    {
        if self.core.observer.register(callback) {
            tracing::debug!("Replaced temperature-changed callback");
        }
    }

    pub fn mode(&self) -> HeatingMode {
        HeatingMode::try_from(self.mode.load(Ordering::SeqCst)).unwrap_or_default()
    }

    pub async fn is_running(&self) -> bool {
        self.control_loop
            .lock()
            .await
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished())
    }

    /// Start the control loop, first stopping and awaiting any loop already running.
    pub async fn start(&self) -> Result<(), ControlError> {
        let mut slot = self.control_loop.lock().await;
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(ControlError::ShutDown);
        }
        if let Some(previous) = slot.take() {
            tracing::info!("Replacing running control loop");
            previous.terminate().await?;
        }

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(run_control_loop(self.core.clone(), shutdown_rx));
        *slot = Some(ControlLoop { shutdown_tx, handle });
        Ok(())
    }

    /// Stop the control loop and switch the heating off.
    ///
    /// The off command is issued even if no loop was running. A fault that
    /// ended the previous loop is returned after the heating is off.
    pub async fn stop(&self) -> Result<(), ControlError> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(ControlError::ShutDown);
        }
        self.halt().await
    }

    async fn halt(&self) -> Result<(), ControlError> {
        let mut slot = self.control_loop.lock().await;
        let loop_result = match slot.take() {
            Some(running) => running.terminate().await,
            None => Ok(()),
        };
        tracing::info!("Heating stopped; turning actuator off");
        self.core.actuator.turn_off()?;
        loop_result
    }

    /// Stop for good and release the actuator. The controller cannot be restarted.
    pub async fn shutdown(&self) -> Result<(), ControlError> {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        tracing::info!("Shutting down thermostat");
        let halted = self.halt().await;
        self.core.actuator.cleanup()?;
        halted
    }

    /// Run `work` with the controller in `mode`, then shut down.
    ///
    /// Shutdown happens however `work` ends, so an early error never leaves
    /// the relay energised with no loop driving it. An error from `work`
    /// takes precedence over one from shutdown.
    pub async fn operate<F, T, E>(&self, mode: HeatingMode, work: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: From<ControlError>,
    {
        let outcome = match self.apply_mode(mode).await {
            Ok(()) => work.await,
            Err(e) => Err(E::from(e)),
        };
        let shutdown = self.shutdown().await;
        match outcome {
            Ok(value) => {
                shutdown?;
                Ok(value)
            }
            Err(e) => {
                if let Err(shutdown_err) = shutdown {
                    tracing::error!("Shutdown after failure also failed: {}", shutdown_err);
                }
                Err(e)
            }
        }
    }

    /// Apply a mode command: HEAT and AUTO start the loop, OFF and COOL stop it.
    ///
    /// The reported mode only changes once the command has taken effect.
    pub async fn apply_mode(&self, mode: HeatingMode) -> Result<(), ControlError> {
        if mode.runs_control_loop() {
            self.start().await?;
        } else {
            self.stop().await?;
        }
        tracing::info!("Heating mode changed to {}", mode);
        self.mode.store(mode as u8, Ordering::SeqCst);
        Ok(())
    }
}
