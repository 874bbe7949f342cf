use std::collections::VecDeque;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;
use wayfare_core::{
    BudgetPlan, BudgetRequest, RequestType, ResponseEnvelope, TravelEstimate, TripParameters,
};

const MAX_MEMORY_RECORDS: usize = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    TravelEstimate,
    BudgetPlan,
}

impl RecordKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TravelEstimate => "travel_estimate",
            Self::BudgetPlan => "budget_plan",
        }
    }

    fn from_db(value: &str) -> Self {
        match value {
            "budget_plan" => Self::BudgetPlan,
            _ => Self::TravelEstimate,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimateRecord {
    pub id: String,
    pub kind: RecordKind,
    pub label: String,
    pub request: Value,
    pub response: Value,
    pub created_at: DateTime<Utc>,
}

impl EstimateRecord {
    pub fn travel(
        request_type: RequestType,
        params: &TripParameters,
        envelope: &ResponseEnvelope<TravelEstimate>,
    ) -> Result<Self> {
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            kind: RecordKind::TravelEstimate,
            label: format!("{} {}", request_type.as_str(), params.country),
            request: serde_json::to_value(params)?,
            response: serde_json::to_value(envelope)?,
            created_at: envelope.timestamp,
        })
    }

    pub fn budget(request: &BudgetRequest, plan: &BudgetPlan) -> Result<Self> {
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            kind: RecordKind::BudgetPlan,
            label: format!(
                "budget {:.0} for {} days",
                request.total_budget, request.duration
            ),
            request: serde_json::to_value(request)?,
            response: serde_json::to_value(plan)?,
            created_at: Utc::now(),
        })
    }
}

pub trait EstimateRepository: Send + Sync {
    async fn record_estimate(&self, record: &EstimateRecord) -> Result<()>;
    async fn recent_estimates(&self, limit: usize) -> Result<Vec<EstimateRecord>>;
    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    records: Arc<RwLock<VecDeque<EstimateRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EstimateRepository for MemoryStore {
    async fn record_estimate(&self, record: &EstimateRecord) -> Result<()> {
        let mut records = self.records.write();
        records.push_front(record.clone());
        records.truncate(MAX_MEMORY_RECORDS);
        Ok(())
    }

    async fn recent_estimates(&self, limit: usize) -> Result<Vec<EstimateRecord>> {
        Ok(self.records.read().iter().take(limit).cloned().collect())
    }

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut removed = 0_u64;
        self.records.write().retain(|record| {
            let keep = record.created_at >= cutoff;
            if !keep {
                removed += 1;
            }
            keep
        });

        Ok(removed)
    }
}

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .with_context(|| format!("failed connecting to sqlite at {}", database_url))?;

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS estimate_records (
              id TEXT PRIMARY KEY,
              kind TEXT NOT NULL,
              label TEXT NOT NULL,
              request_json TEXT NOT NULL,
              response_json TEXT NOT NULL,
              created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS estimate_records_created_at ON estimate_records (created_at)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

impl EstimateRepository for SqliteStore {
    async fn record_estimate(&self, record: &EstimateRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO estimate_records (id, kind, label, request_json, response_json, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&record.id)
        .bind(record.kind.as_str())
        .bind(&record.label)
        .bind(serde_json::to_string(&record.request)?)
        .bind(serde_json::to_string(&record.response)?)
        .bind(record.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn recent_estimates(&self, limit: usize) -> Result<Vec<EstimateRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, kind, label, request_json, response_json, created_at
            FROM estimate_records
            ORDER BY created_at DESC
            LIMIT ?1
            "#,
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        let records = rows
            .into_iter()
            .map(|row| EstimateRecord {
                id: row.get("id"),
                kind: RecordKind::from_db(row.get::<String, _>("kind").as_str()),
                label: row.get("label"),
                request: serde_json::from_str(&row.get::<String, _>("request_json"))
                    .unwrap_or_default(),
                response: serde_json::from_str(&row.get::<String, _>("response_json"))
                    .unwrap_or_default(),
                created_at: row
                    .get::<String, _>("created_at")
                    .parse()
                    .unwrap_or_else(|_| Utc::now()),
            })
            .collect();

        Ok(records)
    }

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM estimate_records WHERE created_at < ?1")
            .bind(cutoff.to_rfc3339())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[derive(Clone)]
pub enum Store {
    Memory(MemoryStore),
    Sqlite(SqliteStore),
}

impl Store {
    pub fn memory() -> Self {
        Self::Memory(MemoryStore::new())
    }

    pub async fn sqlite(database_url: &str) -> Result<Self> {
        let sqlite = SqliteStore::connect(database_url).await?;
        Ok(Self::Sqlite(sqlite))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Store::Memory(_) => "memory",
            Store::Sqlite(_) => "sqlite",
        }
    }
}

impl EstimateRepository for Store {
    async fn record_estimate(&self, record: &EstimateRecord) -> Result<()> {
        match self {
            Store::Memory(store) => store.record_estimate(record).await,
            Store::Sqlite(store) => store.record_estimate(record).await,
        }
    }

    async fn recent_estimates(&self, limit: usize) -> Result<Vec<EstimateRecord>> {
        match self {
            Store::Memory(store) => store.recent_estimates(limit).await,
            Store::Sqlite(store) => store.recent_estimates(limit).await,
        }
    }

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        match self {
            Store::Memory(store) => store.purge_before(cutoff).await,
            Store::Sqlite(store) => store.purge_before(cutoff).await,
        }
    }
}
