//! Sentra daemon - samples physical sensors and forwards telemetry.
//!
//! Two cadences drive the system: a fast pass polls every sensor, collects
//! due snapshots and records them into the sink buffer; a slow pass force-
//! reads everything for the local log and flushes the sink. Everything runs
//! on one logical thread of control.

mod config;
mod hw;
mod sink;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info, warn, Level};

use sentra_core::clock::{system_clock, SharedClock};
use sentra_core::registry::SensorRegistry;
use sentra_core::sensors::{AnalogInputSensor, GasSensor, MotionConfig, MotionSensor, SoundLevelSensor};
use sentra_core::sink::TelemetrySink;

use config::Config;
use hw::{IioAdcChannel, IioMotionBus};
use sink::InfluxSink;

const DEFAULT_CONFIG_PATH: &str = "/etc/sentra/config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    info!("sentrad v{} starting", env!("CARGO_PKG_VERSION"));

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(Path::new(&config_path))?;

    let clock = system_clock();
    let mut registry = build_registry(&config, &clock);
    if registry.is_empty() {
        warn!("no sensors configured, nothing to sample");
    }
    info!(sensors = registry.len(), device = %config.device, "registry built");

    let mut sink = InfluxSink::new(config.sink.clone());
    sink.check_connection()
        .await
        .context("telemetry sink unreachable")?;

    // Fail fast: an escalated init failure halts the daemon before the
    // first cycle.
    registry
        .initialize_all()
        .context("sensor initialization failed")?;

    // Initial forced pass so every sensor shows up downstream right away,
    // without consuming anyone's due timer.
    for snapshot in registry.collect_all(true, false)? {
        if let Err(e) = sink.record(&config.device, &snapshot) {
            error!(sensor = snapshot.sensor_name(), error = %e, "sink record failed");
        }
    }

    let mut fast = tokio::time::interval(config.poll_period());
    let mut slow = tokio::time::interval(config.log_period());

    info!(
        poll_ms = config.poll_period_ms,
        log_ms = config.log_period_ms,
        "sentrad ready"
    );

    loop {
        tokio::select! {
            _ = fast.tick() => {
                run_cycle(&mut registry, &mut sink, &config.device)
                    .context("escalated sensor failure in sampling cycle")?;
            }
            _ = slow.tick() => {
                registry.log_all()
                    .context("escalated sensor failure in logging pass")?;
                if let Err(e) = sink.flush().await {
                    error!(error = %e, "sink flush failed");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
        }
    }

    if let Err(e) = sink.flush().await {
        error!(error = %e, "final sink flush failed");
    }
    Ok(())
}

/// One fast cycle: advance state machines, collect due snapshots, buffer
/// them into the sink. Sink failures never abort the cycle; escalated
/// sensor failures propagate to the caller.
fn run_cycle(
    registry: &mut SensorRegistry,
    sink: &mut InfluxSink,
    device: &str,
) -> Result<()> {
    registry.poll_all()?;
    for snapshot in registry.collect_all(false, true)? {
        if let Err(e) = sink.record(device, &snapshot) {
            error!(sensor = snapshot.sensor_name(), error = %e, "sink record failed");
        }
    }
    Ok(())
}

/// Wire the configured sensor families to their IIO backends. The set of
/// families is static; config only enables and parameterizes them.
fn build_registry(config: &Config, clock: &SharedClock) -> SensorRegistry {
    let mut registry = SensorRegistry::new();

    for analog in &config.analog_inputs {
        let sensor = AnalogInputSensor::new(
            &analog.name,
            IioAdcChannel::new(&analog.channel),
            analog.vref,
            Duration::from_millis(analog.interval_ms),
            clock.clone(),
        );
        registry.register(
            Box::new(sensor),
            analog.escalate_on_init,
            analog.escalate_on_update,
        );
    }

    if let Some(sound) = &config.sound {
        let sensor = SoundLevelSensor::new(
            &sound.name,
            IioAdcChannel::new(&sound.channel),
            sound.vref,
            sound.gain,
            Duration::from_millis(sound.window_ms),
            clock.clone(),
        );
        registry.register(
            Box::new(sensor),
            sound.escalate_on_init,
            sound.escalate_on_update,
        );
    }

    if let Some(motion) = &config.motion {
        let motion_config = MotionConfig {
            interval: Duration::from_millis(motion.interval_ms),
            ..MotionConfig::default()
        };
        let sensor = MotionSensor::new(
            &motion.name,
            IioMotionBus::new(&motion.device),
            motion_config,
            clock.clone(),
        );
        registry.register(
            Box::new(sensor),
            motion.escalate_on_init,
            motion.escalate_on_update,
        );
    }

    for gas in &config.gas_sensors {
        let sensor = GasSensor::new(
            &gas.name,
            IioAdcChannel::new(&gas.channel),
            gas.vref,
            Duration::from_millis(gas.interval_ms),
            clock.clone(),
        )
        .with_r0(gas.r0);
        registry.register(
            Box::new(sensor),
            gas.escalate_on_init,
            gas.escalate_on_update,
        );
    }

    registry
}
