//! InfluxDB line-protocol sink.
//!
//! `record` is cheap and synchronous: it formats one line per snapshot into
//! an in-memory buffer. The slow cadence calls `flush`, which ships the
//! whole batch in one HTTP write. Console mode keeps the same pipeline but
//! logs the lines instead of sending them.

use anyhow::{bail, Result};
use chrono::Utc;
use tracing::{debug, info, warn};

use sentra_core::error::SinkError;
use sentra_core::sink::TelemetrySink;
use sentra_core::snapshot::Snapshot;

use crate::config::{SinkConfig, SinkMode};

/// Point where a single batch is suspiciously large.
const BATCH_WARN_FACTOR: usize = 2;

pub struct InfluxSink {
    config: SinkConfig,
    client: Option<reqwest::Client>,
    buffer: Vec<String>,
}

impl InfluxSink {
    pub fn new(config: SinkConfig) -> Self {
        let client = match config.mode {
            SinkMode::Influx => Some(reqwest::Client::new()),
            SinkMode::Console => None,
        };
        if client.is_none() {
            info!("sink in console mode, records will be logged locally");
        }
        Self {
            config,
            client,
            buffer: Vec::new(),
        }
    }

    /// Verify the write endpoint is reachable. Console mode always passes.
    pub async fn check_connection(&self) -> Result<()> {
        let Some(client) = &self.client else {
            return Ok(());
        };
        let url = format!("{}/ping", self.config.url.trim_end_matches('/'));
        let response = client.get(&url).send().await?;
        if !response.status().is_success() && response.status().as_u16() != 204 {
            bail!("sink ping failed: HTTP {}", response.status());
        }
        info!(url = %self.config.url, "sink connection validated");
        Ok(())
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Ship the buffered batch. The buffer is drained even on failure so a
    /// dead sink cannot grow without bound; lost lines are reported.
    pub async fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let lines = std::mem::take(&mut self.buffer);

        let Some(client) = &self.client else {
            for line in &lines {
                info!(line = %line, "telemetry");
            }
            return Ok(());
        };

        let url = format!(
            "{}/api/v2/write?org={}&bucket={}&precision=ms",
            self.config.url.trim_end_matches('/'),
            self.config.org,
            self.config.bucket
        );
        let body = lines.join("\n");
        debug!(lines = lines.len(), bytes = body.len(), "flushing sink batch");

        let response = client
            .post(&url)
            .header("Authorization", format!("Token {}", self.config.token))
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            bail!("sink write failed ({} lines lost): HTTP {} {}", lines.len(), status, detail);
        }
        Ok(())
    }
}

impl TelemetrySink for InfluxSink {
    fn record(&mut self, device: &str, snapshot: &Snapshot) -> Result<(), SinkError> {
        if snapshot.is_empty() {
            return Ok(());
        }
        let line = line_protocol(device, snapshot, Utc::now().timestamp_millis());
        self.buffer.push(line);
        if self.buffer.len() >= self.config.batch_size * BATCH_WARN_FACTOR {
            warn!(
                buffered = self.buffer.len(),
                batch_size = self.config.batch_size,
                "sink buffer well past batch size, is the flush cadence running?"
            );
        }
        Ok(())
    }
}

/// Escape measurement/tag characters that are significant in line protocol.
fn escape(part: &str) -> String {
    part.replace(' ', "\\ ").replace(',', "\\,").replace('=', "\\=")
}

/// One snapshot as one line: measurement, device tag, fields in insertion
/// order, millisecond timestamp.
fn line_protocol(device: &str, snapshot: &Snapshot, timestamp_ms: i64) -> String {
    let fields: Vec<String> = snapshot
        .iter()
        .map(|e| format!("{}={}", escape(&e.key), e.value))
        .collect();
    format!(
        "{},device={} {} {}",
        escape(snapshot.sensor_name()),
        escape(device),
        fields.join(","),
        timestamp_ms
    )
}
