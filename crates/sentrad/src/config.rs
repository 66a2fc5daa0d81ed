//! Daemon configuration.
//!
//! Loaded from a TOML file at startup. The sensor set itself is static
//! (known families wired in `main`); the config only enables and
//! parameterizes them, and carries the sink connection.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Device tag attached to every record.
    pub device: String,
    /// Fast cadence: poll + collect + forward, milliseconds.
    pub poll_period_ms: u64,
    /// Slow cadence: log-everything pass + sink flush, milliseconds.
    pub log_period_ms: u64,
    pub sink: SinkConfig,
    #[serde(rename = "analog")]
    pub analog_inputs: Vec<AnalogConfig>,
    pub sound: Option<SoundConfig>,
    pub motion: Option<MotionSectionConfig>,
    #[serde(rename = "gas")]
    pub gas_sensors: Vec<GasConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: "sentra".to_string(),
            poll_period_ms: 100,
            log_period_ms: 5000,
            sink: SinkConfig::default(),
            analog_inputs: Vec::new(),
            sound: None,
            motion: None,
            gas_sensors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SinkConfig {
    /// "console" logs records locally; "influx" ships them over HTTP.
    pub mode: SinkMode,
    pub url: String,
    pub org: String,
    pub bucket: String,
    pub token: String,
    /// Lines buffered before flush complains.
    pub batch_size: usize,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            mode: SinkMode::Console,
            url: String::new(),
            org: String::new(),
            bucket: String::new(),
            token: String::new(),
            batch_size: 500,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkMode {
    Console,
    Influx,
}

/// Escalation policy shared by all sensor sections.
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalogConfig {
    pub name: String,
    /// sysfs path of the raw ADC channel, e.g.
    /// `/sys/bus/iio/devices/iio:device0/in_voltage0_raw`.
    pub channel: String,
    #[serde(default = "default_vref")]
    pub vref: f32,
    #[serde(default = "default_analog_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_true")]
    pub escalate_on_init: bool,
    #[serde(default = "default_true")]
    pub escalate_on_update: bool,
}

fn default_vref() -> f32 {
    3.3
}

fn default_analog_interval_ms() -> u64 {
    60_000
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SoundConfig {
    pub name: String,
    pub channel: String,
    #[serde(default = "default_vref")]
    pub vref: f32,
    #[serde(default = "default_mic_gain")]
    pub gain: f32,
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
    #[serde(default = "default_true")]
    pub escalate_on_init: bool,
    #[serde(default = "default_true")]
    pub escalate_on_update: bool,
}

fn default_mic_gain() -> f32 {
    75.0
}

fn default_window_ms() -> u64 {
    50
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MotionSectionConfig {
    pub name: String,
    /// IIO device directory, e.g. `/sys/bus/iio/devices/iio:device1`.
    pub device: String,
    #[serde(default = "default_motion_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_true")]
    pub escalate_on_init: bool,
    #[serde(default = "default_true")]
    pub escalate_on_update: bool,
}

fn default_motion_interval_ms() -> u64 {
    200
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GasConfig {
    pub name: String,
    pub channel: String,
    #[serde(default = "default_vref")]
    pub vref: f32,
    #[serde(default = "default_analog_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_r0")]
    pub r0: f32,
    #[serde(default = "default_true")]
    pub escalate_on_init: bool,
    #[serde(default = "default_true")]
    pub escalate_on_update: bool,
}

fn default_r0() -> f32 {
    10.0
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config =
            toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    pub fn poll_period(&self) -> Duration {
        Duration::from_millis(self.poll_period_ms)
    }

    pub fn log_period(&self) -> Duration {
        Duration::from_millis(self.log_period_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.device, "sentra");
        assert_eq!(config.sink.mode, SinkMode::Console);
        assert!(config.analog_inputs.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let raw = r#"
device = "attic-node"
poll_period_ms = 50
log_period_ms = 10000

[sink]
mode = "influx"
url = "https://influx.example.com"
org = "home"
bucket = "sensors"
token = "secret"

[[analog]]
name = "vin"
channel = "/sys/bus/iio/devices/iio:device0/in_voltage0_raw"
interval_ms = 30000

[sound]
name = "mic"
channel = "/sys/bus/iio/devices/iio:device0/in_voltage1_raw"
gain = 60.0

[motion]
name = "imu"
device = "/sys/bus/iio/devices/iio:device1"
escalate_on_update = false

[[gas]]
name = "air"
channel = "/sys/bus/iio/devices/iio:device0/in_voltage2_raw"
r0 = 12.5
"#;
        let config: Config = toml::from_str(raw).unwrap();
        assert_eq!(config.device, "attic-node");
        assert_eq!(config.sink.mode, SinkMode::Influx);
        assert_eq!(config.analog_inputs.len(), 1);
        assert_eq!(config.analog_inputs[0].interval_ms, 30_000);
        assert_eq!(config.analog_inputs[0].vref, 3.3);
        assert!(config.analog_inputs[0].escalate_on_init);

        let sound = config.sound.unwrap();
        assert_eq!(sound.gain, 60.0);
        assert_eq!(sound.window_ms, 50);

        let motion = config.motion.unwrap();
        assert!(motion.escalate_on_init);
        assert!(!motion.escalate_on_update);

        assert_eq!(config.gas_sensors[0].r0, 12.5);
    }

    #[test]
    fn test_load_missing_file_fails() {
        assert!(Config::load(Path::new("/nonexistent/sentra.toml")).is_err());
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "device = \"bench\"\n").unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.device, "bench");
        assert_eq!(config.poll_period(), Duration::from_millis(100));
    }
}
