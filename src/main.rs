// src/main.rs - Thermostat host entry point
use clap::Parser;
use std::sync::Arc;
use thermo_rs::alerts::{AlertThrottle, AlertTransport, LogTransport, WebhookTransport};
use thermo_rs::config::{self, Config};
use thermo_rs::hardware::{GpioRelay, SensorReader, W1Sensor};
use thermo_rs::telemetry::{
    JsonlSink, NoWeather, TelemetryLogger, TelemetrySources, TomorrowIoClient, WeatherProvider,
};
use thermo_rs::thermostat::{HeatingMode, ThermostatController};
use thermo_rs::web::api::{AppState, create_router};
use tokio::sync::broadcast;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Parser)]
#[command(name = "thermostat-host", version, about = "Hysteresis thermostat for a heating relay")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(default_value = "thermostat.toml")]
    config: String,

    /// Maximum log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: tracing::Level,
}

fn alert_transport(config: &Config) -> Result<Arc<dyn AlertTransport>, BoxError> {
    match &config.alerts.webhook_url {
        Some(url) => {
            tracing::info!("Alerts will be posted to {}", url);
            let timeout = std::time::Duration::from_secs(config.weather.timeout_secs);
            Ok(Arc::new(WebhookTransport::new(url.clone(), timeout)?))
        }
        None => {
            tracing::info!("No alert webhook configured; alerts go to the log");
            Ok(Arc::new(LogTransport))
        }
    }
}

fn weather_provider(config: &Config) -> Result<Arc<dyn WeatherProvider>, BoxError> {
    match (&config.weather.location, config.weather.resolved_api_key()) {
        (Some(location), Some(api_key)) => {
            let timeout = std::time::Duration::from_secs(config.weather.timeout_secs);
            Ok(Arc::new(TomorrowIoClient::new(location.clone(), api_key, timeout)?))
        }
        _ => {
            tracing::warn!("Weather lookup not configured; outdoor temperature will be logged as null");
            Ok(Arc::new(NoWeather))
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt().with_max_level(args.log_level).init();

    tracing::info!("Starting thermostat host");
    tracing::info!("Loading configuration from: {}", args.config);
    let config = config::load_config(&args.config).map_err(|e| {
        tracing::error!("Failed to load config from '{}': {}", args.config, e);
        Box::new(e) as BoxError
    })?;

    // Everything fallible that does not need hardware comes first.
    let listener = tokio::net::TcpListener::bind(&config.api.bind).await?;
    let local_addr = listener.local_addr()?;
    let transport = alert_transport(&config)?;
    let weather = weather_provider(&config)?;

    // A missing sensor is fatal: there is nothing to regulate against.
    let source = W1Sensor::discover(&config.sensor.base_dir, &config.sensor.device_prefix)?;
    let sensor = Arc::new(SensorReader::new(Arc::new(source), &config.sensor));
    let relay = Arc::new(GpioRelay::new(&config.relay)?);
    let controller = Arc::new(ThermostatController::new(sensor, relay, &config.control)?);
    tracing::info!(
        "Target {:.1}°C ± {:.1}°C, checking every {:?}",
        controller.target(),
        controller.hysteresis(),
        config.control.interval()
    );

    let alerts = Arc::new(AlertThrottle::new(transport, config.alerts.cooldown()));
    let logger = TelemetryLogger::new(
        &config.telemetry,
        TelemetrySources::from_controller(controller.clone()),
        weather,
        Arc::new(JsonlSink::new(&config.telemetry.log_path)),
        alerts,
    );

    let app = create_router(AppState::attach(controller.clone()));

    controller
        .operate(HeatingMode::Heat, async move {
            let (shutdown_tx, _) = broadcast::channel::<()>(1);

            let telemetry_rx = shutdown_tx.subscribe();
            let telemetry_task = tokio::spawn(async move { logger.run(telemetry_rx).await });

            tracing::info!("Web API listening on http://{}", local_addr);
            let mut server_shutdown = shutdown_tx.subscribe();
            let server_task = tokio::spawn(async move {
                axum::serve(listener, app)
                    .with_graceful_shutdown(async move {
                        let _ = server_shutdown.recv().await;
                    })
                    .await
            });

            shutdown_signal().await;
            tracing::info!("Shutting down gracefully...");
            let _ = shutdown_tx.send(());

            if let Err(e) = telemetry_task.await {
                tracing::error!("Telemetry task ended abnormally: {}", e);
            }
            match server_task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!("Web server error: {}", e),
                Err(e) => tracing::error!("Web server task ended abnormally: {}", e),
            }
            Ok::<(), BoxError>(())
        })
        .await?;
    tracing::info!("Thermostat stopped");
    Ok(())
}
