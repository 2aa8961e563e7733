#![cfg(feature = "db")]

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use sqlx::{
    postgres::{PgPoolOptions, PgRow},
    types::Json,
    PgPool, Row,
};
use uuid::Uuid;

use super::{HistoryStore, ModelRecord, ModelStore};
use crate::domain::{
    BoundingBox, Location, ModelParameters, TrainingHistory, TrainingMetrics, TrainingStatus,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS hvac_models (
    seq BIGSERIAL PRIMARY KEY,
    id UUID NOT NULL UNIQUE,
    latitude DOUBLE PRECISION NOT NULL,
    longitude DOUBLE PRECISION NOT NULL,
    a_coefficient DOUBLE PRECISION,
    avg_consumption_off DOUBLE PRECISION,
    artifact TEXT,
    metrics JSONB,
    data_hash TEXT NOT NULL,
    knowledge_id BIGINT,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
);
CREATE INDEX IF NOT EXISTS hvac_models_location_idx ON hvac_models (latitude, longitude);

CREATE TABLE IF NOT EXISTS hvac_training_history (
    seq BIGSERIAL PRIMARY KEY,
    id UUID NOT NULL UNIQUE,
    latitude DOUBLE PRECISION NOT NULL,
    longitude DOUBLE PRECISION NOT NULL,
    sensor_id BIGINT,
    status TEXT NOT NULL,
    started_at TIMESTAMPTZ NOT NULL,
    completed_at TIMESTAMPTZ,
    metrics JSONB,
    data_size BIGINT,
    model_parameters JSONB,
    model_id UUID,
    notes TEXT
);
"#;

const MODEL_COLUMNS: &str = "id, latitude, longitude, a_coefficient, avg_consumption_off, artifact, \
     metrics, data_hash, knowledge_id, created_at, updated_at";

const HISTORY_COLUMNS: &str = "id, latitude, longitude, sensor_id, status, started_at, completed_at, \
     metrics, data_size, model_parameters, model_id, notes";

pub struct PgStore {
    pub pool: PgPool,
}

impl PgStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await
            .context("failed to connect to Postgres")?;
        Ok(Self { pool })
    }

    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .context("failed to create schema")?;
        Ok(())
    }
}

fn model_from_row(row: &PgRow) -> Result<ModelRecord> {
    Ok(ModelRecord {
        id: row.try_get("id")?,
        location: Location::new(row.try_get("latitude")?, row.try_get("longitude")?),
        a_coefficient: row.try_get("a_coefficient")?,
        avg_consumption_off: row.try_get("avg_consumption_off")?,
        artifact: row.try_get("artifact")?,
        metrics: row.try_get::<Option<Json<TrainingMetrics>>, _>("metrics")?.map(|m| m.0),
        data_hash: row.try_get("data_hash")?,
        knowledge_id: row.try_get("knowledge_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn history_from_row(row: &PgRow) -> Result<TrainingHistory> {
    let status: String = row.try_get("status")?;
    let data_size: Option<i64> = row.try_get("data_size")?;
    Ok(TrainingHistory {
        id: row.try_get("id")?,
        location: Location::new(row.try_get("latitude")?, row.try_get("longitude")?),
        sensor_id: row.try_get("sensor_id")?,
        status: status
            .parse::<TrainingStatus>()
            .with_context(|| format!("unknown training status '{status}'"))?,
        started_at: row.try_get("started_at")?,
        completed_at: row.try_get("completed_at")?,
        metrics: row.try_get::<Option<Json<TrainingMetrics>>, _>("metrics")?.map(|m| m.0),
        data_size: data_size.map(|n| n as usize),
        model_parameters: row
            .try_get::<Option<Json<ModelParameters>>, _>("model_parameters")?
            .map(|p| p.0),
        model_id: row.try_get("model_id")?,
        notes: row.try_get("notes")?,
    })
}

#[async_trait]
impl ModelStore for PgStore {
    async fn insert_model(&self, record: &ModelRecord) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO hvac_models ({MODEL_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
        ))
        .bind(record.id)
        .bind(record.location.latitude)
        .bind(record.location.longitude)
        .bind(record.a_coefficient)
        .bind(record.avg_consumption_off)
        .bind(&record.artifact)
        .bind(record.metrics.map(Json))
        .bind(&record.data_hash)
        .bind(record.knowledge_id)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .context("failed to insert model")?;
        Ok(())
    }

    async fn latest_model(&self, bounds: &BoundingBox) -> Result<Option<ModelRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {MODEL_COLUMNS} FROM hvac_models \
             WHERE latitude BETWEEN $1 AND $2 AND longitude BETWEEN $3 AND $4 \
             ORDER BY updated_at DESC, seq DESC LIMIT 1"
        ))
        .bind(bounds.min_latitude)
        .bind(bounds.max_latitude)
        .bind(bounds.min_longitude)
        .bind(bounds.max_longitude)
        .fetch_optional(&self.pool)
        .await
        .context("failed to look up model")?;
        row.as_ref().map(model_from_row).transpose()
    }

    async fn find_model(&self, id: Uuid) -> Result<Option<ModelRecord>> {
        let row = sqlx::query(&format!("SELECT {MODEL_COLUMNS} FROM hvac_models WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(model_from_row).transpose()
    }

    async fn delete_model(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM hvac_models WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("failed to delete model")?;
        Ok(())
    }

    async fn list_models(&self) -> Result<Vec<ModelRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {MODEL_COLUMNS} FROM hvac_models ORDER BY updated_at DESC, seq DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(model_from_row).collect()
    }
}

#[async_trait]
impl HistoryStore for PgStore {
    async fn insert_history(&self, history: &TrainingHistory) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO hvac_training_history ({HISTORY_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"
        ))
        .bind(history.id)
        .bind(history.location.latitude)
        .bind(history.location.longitude)
        .bind(history.sensor_id)
        .bind(history.status.to_string())
        .bind(history.started_at)
        .bind(history.completed_at)
        .bind(history.metrics.map(Json))
        .bind(history.data_size.map(|n| n as i64))
        .bind(history.model_parameters.map(Json))
        .bind(history.model_id)
        .bind(&history.notes)
        .execute(&self.pool)
        .await
        .context("failed to insert training history")?;
        Ok(())
    }

    async fn update_history(&self, history: &TrainingHistory) -> Result<()> {
        let result = sqlx::query(
            "UPDATE hvac_training_history SET status = $2, completed_at = $3, metrics = $4, \
             data_size = $5, model_parameters = $6, model_id = $7, notes = $8 WHERE id = $1",
        )
        .bind(history.id)
        .bind(history.status.to_string())
        .bind(history.completed_at)
        .bind(history.metrics.map(Json))
        .bind(history.data_size.map(|n| n as i64))
        .bind(history.model_parameters.map(Json))
        .bind(history.model_id)
        .bind(&history.notes)
        .execute(&self.pool)
        .await
        .context("failed to update training history")?;

        if result.rows_affected() == 0 {
            bail!("training history {} not found", history.id);
        }
        Ok(())
    }

    async fn find_history(&self, id: Uuid) -> Result<Option<TrainingHistory>> {
        let row = sqlx::query(&format!(
            "SELECT {HISTORY_COLUMNS} FROM hvac_training_history WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(history_from_row).transpose()
    }

    async fn history_in(&self, bounds: &BoundingBox) -> Result<Vec<TrainingHistory>> {
        let rows = sqlx::query(&format!(
            "SELECT {HISTORY_COLUMNS} FROM hvac_training_history \
             WHERE latitude BETWEEN $1 AND $2 AND longitude BETWEEN $3 AND $4 \
             ORDER BY started_at DESC, seq DESC"
        ))
        .bind(bounds.min_latitude)
        .bind(bounds.max_latitude)
        .bind(bounds.min_longitude)
        .bind(bounds.max_longitude)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(history_from_row).collect()
    }
}
