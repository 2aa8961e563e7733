//! Where historical sensor samples come from

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Duration;
use serde::Deserialize;
use std::path::PathBuf;

use crate::domain::{parse_timestamp, Location, OperationState, TrainingSample};

/// Which samples of one sensor to train on
#[derive(Debug, Clone, PartialEq)]
pub struct SampleQuery {
    pub location: Location,
    pub sensor_id: Option<i64>,
    /// Keep only the last `days_back` days; `None` keeps everything
    pub days_back: Option<u32>,
}

impl SampleQuery {
    pub fn new(location: Location, sensor_id: Option<i64>, days_back: Option<u32>) -> Self {
        Self {
            location,
            sensor_id,
            days_back,
        }
    }
}

/// Capability to fetch a time-ordered sample stream
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SampleSource: Send + Sync {
    async fn fetch_training_samples(&self, query: &SampleQuery) -> Result<Vec<TrainingSample>>;
}

/// Sort by timestamp and drop everything older than `days_back` days before
/// the newest sample
pub fn apply_lookback(
    mut samples: Vec<TrainingSample>,
    days_back: Option<u32>,
) -> Vec<TrainingSample> {
    samples.sort_by_key(|sample| sample.timestamp);

    let (Some(days), Some(newest)) = (days_back, samples.last().map(|s| s.timestamp)) else {
        return samples;
    };
    let cutoff = newest - Duration::days(i64::from(days));
    samples.retain(|sample| sample.timestamp >= cutoff);
    samples
}

/// Fixed in-memory sample set
#[derive(Debug, Clone, Default)]
pub struct MemorySampleSource {
    samples: Vec<TrainingSample>,
}

impl MemorySampleSource {
    pub fn new(samples: Vec<TrainingSample>) -> Self {
        Self { samples }
    }
}

#[async_trait]
impl SampleSource for MemorySampleSource {
    async fn fetch_training_samples(&self, query: &SampleQuery) -> Result<Vec<TrainingSample>> {
        Ok(apply_lookback(self.samples.clone(), query.days_back))
    }
}

/// Column order: date, indoor, operation, outdoor, energy, setpoint, outlet, inlet
#[derive(Debug, Deserialize)]
struct CsvRow {
    date: String,
    indoor: f64,
    operation: u8,
    outdoor: f64,
    energy: f64,
    setpoint: Option<f64>,
    outlet: Option<f64>,
    inlet: Option<f64>,
}

impl CsvRow {
    fn into_sample(self) -> Result<TrainingSample> {
        Ok(TrainingSample {
            timestamp: parse_timestamp(&self.date)?,
            indoor_temp: self.indoor,
            outdoor_temp: self.outdoor,
            operation: OperationState::try_from(self.operation)?,
            energy_consumption: self.energy,
            setpoint: self.setpoint,
            inlet_temp: self.inlet,
            outlet_temp: self.outlet,
        })
    }
}

/// Samples exported as CSV with a header row, timestamps `DD/MM/YYYY HH:MM`
#[derive(Debug, Clone)]
pub struct CsvSampleSource {
    path: PathBuf,
}

impl CsvSampleSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn parse(bytes: &[u8]) -> Result<Vec<TrainingSample>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(bytes);

        reader
            .records()
            .enumerate()
            .map(|(index, record)| {
                let line = index + 2;
                let record =
                    record.with_context(|| format!("malformed CSV record at line {line}"))?;
                let row: CsvRow = record
                    .deserialize(None)
                    .with_context(|| format!("invalid sample at line {line}"))?;
                row.into_sample()
                    .with_context(|| format!("invalid sample at line {line}"))
            })
            .collect()
    }
}

#[async_trait]
impl SampleSource for CsvSampleSource {
    async fn fetch_training_samples(&self, query: &SampleQuery) -> Result<Vec<TrainingSample>> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("failed to read samples from {}", self.path.display()))?;
        let samples = Self::parse(&bytes)?;
        Ok(apply_lookback(samples, query.days_back))
    }
}

#[cfg(feature = "db")]
pub use pg::PgSampleSource;

#[cfg(feature = "db")]
mod pg {
    use super::*;
    use chrono::{NaiveDateTime, Utc};
    use sqlx::{PgPool, Row};

    /// Sensor readings stored in Postgres
    pub struct PgSampleSource {
        pool: PgPool,
    }

    impl PgSampleSource {
        pub fn new(pool: PgPool) -> Self {
            Self { pool }
        }
    }

    #[async_trait]
    impl SampleSource for PgSampleSource {
        async fn fetch_training_samples(&self, query: &SampleQuery) -> Result<Vec<TrainingSample>> {
            let since = query
                .days_back
                .map(|days| Utc::now().naive_utc() - Duration::days(i64::from(days)));

            let rows = sqlx::query(
                r#"
                SELECT recorded_at, indoor_temp, outdoor_temp, operation, energy,
                       setpoint, inlet_temp, outlet_temp
                FROM sensor_readings
                WHERE ($1::BIGINT IS NULL OR sensor_id = $1)
                  AND ($2::TIMESTAMP IS NULL OR recorded_at >= $2)
                ORDER BY recorded_at ASC
                "#,
            )
            .bind(query.sensor_id)
            .bind(since)
            .fetch_all(&self.pool)
            .await
            .context("failed to fetch sensor readings")?;

            rows.into_iter()
                .map(|row| {
                    let operation: i16 = row.try_get("operation")?;
                    let operation = u8::try_from(operation)
                        .map_err(|_| anyhow::anyhow!("operation flag out of range: {operation}"))?;
                    Ok(TrainingSample {
                        timestamp: row.try_get::<NaiveDateTime, _>("recorded_at")?,
                        indoor_temp: row.try_get("indoor_temp")?,
                        outdoor_temp: row.try_get("outdoor_temp")?,
                        operation: OperationState::try_from(operation)?,
                        energy_consumption: row.try_get("energy")?,
                        setpoint: row.try_get("setpoint")?,
                        inlet_temp: row.try_get("inlet_temp")?,
                        outlet_temp: row.try_get("outlet_temp")?,
                    })
                })
                .collect()
        }
    }
}
