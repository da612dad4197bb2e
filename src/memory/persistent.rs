// Persistent store - the authoritative incident record at rest

//! # Persistent Store
//!
//! Postgres-backed durable storage with five logical tables: `incidents`
//! (one row per incident), `incident_history` (append-only change events),
//! `incident_analytics` (date-bucketed aggregates), `compliance_events` and
//! `performance_metrics`.
//!
//! History details, metric details and everything else that leaves the trust
//! boundary is sanitized before it is written. The only place raw content
//! survives is the incident row's own state blob, keyed by incident id and
//! readable by resume logic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::{debug, info};

use crate::models::{HistoryRecord, IncidentState};
use crate::tools::safety::SafetyGuardrails;
use crate::Result;

const CREATE_TABLES: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS incidents (
        incident_id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        description TEXT NOT NULL,
        category TEXT,
        priority TEXT,
        status TEXT NOT NULL,
        risk_score DOUBLE PRECISION,
        classification_confidence DOUBLE PRECISION,
        requires_human_intervention BOOLEAN NOT NULL DEFAULT FALSE,
        quality_overall DOUBLE PRECISION,
        metadata JSONB NOT NULL DEFAULT '{}'::jsonb,
        state_blob JSONB NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL,
        resolved_at TIMESTAMPTZ
    )"#,
    r#"CREATE TABLE IF NOT EXISTS incident_history (
        id BIGSERIAL PRIMARY KEY,
        incident_id TEXT NOT NULL,
        timestamp TIMESTAMPTZ NOT NULL,
        change_type TEXT NOT NULL,
        detail JSONB NOT NULL DEFAULT '{}'::jsonb
    )"#,
    r#"CREATE TABLE IF NOT EXISTS incident_analytics (
        date_bucket DATE NOT NULL,
        category TEXT NOT NULL,
        priority TEXT NOT NULL,
        incident_count BIGINT NOT NULL,
        avg_risk_score DOUBLE PRECISION,
        avg_processing_seconds DOUBLE PRECISION,
        human_intervention_count BIGINT NOT NULL DEFAULT 0,
        PRIMARY KEY (date_bucket, category, priority)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS compliance_events (
        id BIGSERIAL PRIMARY KEY,
        incident_id TEXT NOT NULL,
        framework TEXT NOT NULL,
        event_type TEXT NOT NULL,
        event_timestamp TIMESTAMPTZ NOT NULL,
        details JSONB NOT NULL DEFAULT '{}'::jsonb
    )"#,
    r#"CREATE TABLE IF NOT EXISTS performance_metrics (
        id BIGSERIAL PRIMARY KEY,
        incident_id TEXT,
        metric_name TEXT NOT NULL,
        metric_value DOUBLE PRECISION NOT NULL,
        metric_timestamp TIMESTAMPTZ NOT NULL,
        details JSONB NOT NULL DEFAULT '{}'::jsonb
    )"#,
];

const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_incidents_category ON incidents (category)",
    "CREATE INDEX IF NOT EXISTS idx_incidents_priority ON incidents (priority)",
    "CREATE INDEX IF NOT EXISTS idx_incidents_status ON incidents (status)",
    "CREATE INDEX IF NOT EXISTS idx_incidents_created_at ON incidents (created_at)",
    "CREATE INDEX IF NOT EXISTS idx_incidents_risk_score ON incidents (risk_score)",
    "CREATE INDEX IF NOT EXISTS idx_history_incident_id ON incident_history (incident_id, timestamp)",
    "CREATE INDEX IF NOT EXISTS idx_compliance_incident ON compliance_events (incident_id, event_timestamp)",
    "CREATE INDEX IF NOT EXISTS idx_metrics_incident ON performance_metrics (incident_id, metric_timestamp)",
];

/// Flat incident row, as returned by search and lookup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentRecord {
    pub incident_id: String,
    pub title: String,
    pub description: String,
    pub category: Option<String>,
    pub priority: Option<String>,
    pub status: String,
    pub risk_score: Option<f64>,
    pub requires_human_intervention: bool,
    pub quality_overall: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// One analytics bucket: date x category x priority
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsBucket {
    pub date_bucket: chrono::NaiveDate,
    pub category: String,
    pub priority: String,
    pub incident_count: i64,
    pub avg_risk_score: Option<f64>,
    pub avg_processing_seconds: Option<f64>,
    pub human_intervention_count: i64,
}

/// Sort column whitelist for incident search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchOrder {
    CreatedAt,
    UpdatedAt,
    RiskScore,
    Priority,
    Category,
}

impl SearchOrder {
    fn column(&self) -> &'static str {
        match self {
            SearchOrder::CreatedAt => "created_at",
            SearchOrder::UpdatedAt => "updated_at",
            SearchOrder::RiskScore => "risk_score",
            SearchOrder::Priority => "priority",
            SearchOrder::Category => "category",
        }
    }
}

/// Search filters for incident queries
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchFilters {
    pub category: Option<String>,
    pub priority: Option<String>,
    pub status: Option<String>,
    pub min_risk_score: Option<f64>,
    pub created_after: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub order_by: Option<SearchOrder>,
    pub descending: bool,
}

/// Build the search SQL and its bind order. Kept separate from execution so
/// the column whitelist and clause assembly are testable without a database.
fn build_search_query(filters: &SearchFilters) -> (String, Vec<SearchBind>) {
    let mut sql = String::from(
        "SELECT incident_id, title, description, category, priority, status, risk_score, \
         requires_human_intervention, quality_overall, created_at, updated_at, resolved_at \
         FROM incidents",
    );
    let mut binds = Vec::new();
    let mut clauses = Vec::new();

    if let Some(category) = &filters.category {
        binds.push(SearchBind::Text(category.clone()));
        clauses.push(format!("category = ${}", binds.len()));
    }
    if let Some(priority) = &filters.priority {
        binds.push(SearchBind::Text(priority.clone()));
        clauses.push(format!("priority = ${}", binds.len()));
    }
    if let Some(status) = &filters.status {
        binds.push(SearchBind::Text(status.clone()));
        clauses.push(format!("status = ${}", binds.len()));
    }
    if let Some(min_risk) = filters.min_risk_score {
        binds.push(SearchBind::Float(min_risk));
        clauses.push(format!("risk_score >= ${}", binds.len()));
    }
    if let Some(after) = filters.created_after {
        binds.push(SearchBind::Timestamp(after));
        clauses.push(format!("created_at >= ${}", binds.len()));
    }
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }

    let order = filters.order_by.unwrap_or(SearchOrder::CreatedAt);
    sql.push_str(" ORDER BY ");
    sql.push_str(order.column());
    sql.push_str(if filters.descending { " DESC" } else { " ASC" });

    sql.push_str(&format!(" LIMIT {}", filters.limit.unwrap_or(50).clamp(1, 500)));
    sql.push_str(&format!(" OFFSET {}", filters.offset.unwrap_or(0).max(0)));

    (sql, binds)
}

#[derive(Debug, Clone, PartialEq)]
enum SearchBind {
    Text(String),
    Float(f64),
    Timestamp(DateTime<Utc>),
}

/// Recursively sanitize every string value in a JSON tree. Keys and numbers
/// are untouched, so the result is always valid JSON of the same shape.
fn sanitize_json(sanitizer: &SafetyGuardrails, value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::String(s) => serde_json::Value::String(sanitizer.sanitize_text(s)),
        serde_json::Value::Array(items) => serde_json::Value::Array(
            items.iter().map(|i| sanitize_json(sanitizer, i)).collect(),
        ),
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), sanitize_json(sanitizer, v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Postgres-backed durable incident store
pub struct PersistentStore {
    pool: PgPool,
    sanitizer: SafetyGuardrails,
    retention_days: i64,
    audit_retention_days: i64,
}

impl PersistentStore {
    pub async fn connect(
        database_url: &str,
        retention_days: i64,
        audit_retention_days: i64,
    ) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(8)
            .connect(database_url)
            .await?;
        let store = Self {
            pool,
            sanitizer: SafetyGuardrails::new(),
            retention_days,
            audit_retention_days,
        };
        store.initialize().await?;
        Ok(store)
    }

    async fn initialize(&self) -> Result<()> {
        for statement in CREATE_TABLES.iter().chain(CREATE_INDEXES.iter()) {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!("persistent store schema ready");
        Ok(())
    }

    /// Upsert the incident row and append a history event. One short-lived
    /// transaction per call, matching the one-transaction-per-checkpoint
    /// policy.
    pub async fn store_incident(&self, state: &IncidentState, change_type: &str) -> Result<()> {
        let state_blob = serde_json::to_value(state)?;
        let metadata = serde_json::to_value(&state.metadata)?;
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"INSERT INTO incidents (
                incident_id, title, description, category, priority, status, risk_score,
                classification_confidence, requires_human_intervention, quality_overall,
                metadata, state_blob, created_at, updated_at, resolved_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (incident_id) DO UPDATE SET
                title = EXCLUDED.title,
                description = EXCLUDED.description,
                category = EXCLUDED.category,
                priority = EXCLUDED.priority,
                status = EXCLUDED.status,
                risk_score = EXCLUDED.risk_score,
                classification_confidence = EXCLUDED.classification_confidence,
                requires_human_intervention = EXCLUDED.requires_human_intervention,
                quality_overall = EXCLUDED.quality_overall,
                metadata = EXCLUDED.metadata,
                state_blob = EXCLUDED.state_blob,
                updated_at = EXCLUDED.updated_at,
                resolved_at = EXCLUDED.resolved_at"#,
        )
        .bind(&state.incident_id)
        .bind(&state.title)
        .bind(&state.description)
        .bind(state.category.map(|c| c.as_str()))
        .bind(state.priority.map(|p| p.as_str()))
        .bind(state.status.as_str())
        .bind(state.risk_assessment.as_ref().map(|r| r.risk_score))
        .bind(state.classification_confidence)
        .bind(state.requires_human_intervention)
        .bind(state.quality_scores.get("overall").copied())
        .bind(metadata)
        .bind(state_blob)
        .bind(state.created_at)
        .bind(state.updated_at)
        .bind(state.resolved_at)
        .execute(&mut *tx)
        .await?;

        let detail = sanitize_json(
            &self.sanitizer,
            &serde_json::json!({
                "step": state.current_step,
                "completed_steps": state.completed_steps.len(),
                "failed_steps": state.failed_steps.len(),
                "priority": state.priority,
                "title": state.title,
            }),
        );
        sqlx::query(
            "INSERT INTO incident_history (incident_id, timestamp, change_type, detail) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(&state.incident_id)
        .bind(state.updated_at)
        .bind(change_type)
        .bind(detail)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!(incident_id = %state.incident_id, change_type, "incident persisted");
        Ok(())
    }

    pub async fn get_incident(&self, incident_id: &str) -> Result<Option<IncidentRecord>> {
        let row = sqlx::query(
            "SELECT incident_id, title, description, category, priority, status, risk_score, \
             requires_human_intervention, quality_overall, created_at, updated_at, resolved_at \
             FROM incidents WHERE incident_id = $1",
        )
        .bind(incident_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(record_from_row).transpose()
    }

    /// Load the full state blob; the resume path and approval handler use
    /// this when the session cache has expired.
    pub async fn load_state(&self, incident_id: &str) -> Result<Option<IncidentState>> {
        let row = sqlx::query("SELECT state_blob FROM incidents WHERE incident_id = $1")
            .bind(incident_id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let blob: serde_json::Value = row.try_get("state_blob")?;
                Ok(Some(serde_json::from_value(blob)?))
            }
            None => Ok(None),
        }
    }

    pub async fn search_incidents(&self, filters: &SearchFilters) -> Result<Vec<IncidentRecord>> {
        let (sql, binds) = build_search_query(filters);
        let mut query = sqlx::query(&sql);
        for bind in binds {
            query = match bind {
                SearchBind::Text(t) => query.bind(t),
                SearchBind::Float(f) => query.bind(f),
                SearchBind::Timestamp(ts) => query.bind(ts),
            };
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.into_iter().map(record_from_row).collect()
    }

    pub async fn incident_history(&self, incident_id: &str) -> Result<Vec<HistoryRecord>> {
        let rows = sqlx::query(
            "SELECT incident_id, timestamp, change_type, detail FROM incident_history \
             WHERE incident_id = $1 ORDER BY timestamp ASC, id ASC",
        )
        .bind(incident_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|row| {
                Ok(HistoryRecord {
                    incident_id: row.try_get("incident_id")?,
                    timestamp: row.try_get("timestamp")?,
                    change_type: row.try_get("change_type")?,
                    detail: row.try_get("detail")?,
                })
            })
            .collect()
    }

    pub async fn record_compliance_event(
        &self,
        incident_id: &str,
        framework: &str,
        event_type: &str,
        details: serde_json::Value,
    ) -> Result<()> {
        let details = sanitize_json(&self.sanitizer, &details);
        sqlx::query(
            "INSERT INTO compliance_events (incident_id, framework, event_type, event_timestamp, details) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(incident_id)
        .bind(framework)
        .bind(event_type)
        .bind(Utc::now())
        .bind(details)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn record_performance_metric(
        &self,
        incident_id: Option<&str>,
        metric_name: &str,
        metric_value: f64,
        details: serde_json::Value,
    ) -> Result<()> {
        let details = sanitize_json(&self.sanitizer, &details);
        sqlx::query(
            "INSERT INTO performance_metrics (incident_id, metric_name, metric_value, metric_timestamp, details) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(incident_id)
        .bind(metric_name)
        .bind(metric_value)
        .bind(Utc::now())
        .bind(details)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Aggregated counts and means by date bucket x category x priority,
    /// computed on demand from the incident rows.
    pub async fn analytics(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<AnalyticsBucket>> {
        let rows = sqlx::query(
            r#"SELECT created_at::date AS date_bucket,
                      COALESCE(category, 'unclassified') AS category,
                      COALESCE(priority, 'unprioritized') AS priority,
                      COUNT(*) AS incident_count,
                      AVG(risk_score) AS avg_risk_score,
                      AVG(EXTRACT(EPOCH FROM (updated_at - created_at)))::float8 AS avg_processing_seconds,
                      COUNT(*) FILTER (WHERE requires_human_intervention) AS human_intervention_count
               FROM incidents
               WHERE created_at >= $1 AND created_at < $2
               GROUP BY 1, 2, 3
               ORDER BY 1, 2, 3"#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|row| {
                Ok(AnalyticsBucket {
                    date_bucket: row.try_get("date_bucket")?,
                    category: row.try_get("category")?,
                    priority: row.try_get("priority")?,
                    incident_count: row.try_get("incident_count")?,
                    avg_risk_score: row.try_get("avg_risk_score")?,
                    avg_processing_seconds: row.try_get("avg_processing_seconds")?,
                    human_intervention_count: row.try_get("human_intervention_count")?,
                })
            })
            .collect()
    }

    /// Fraction of incidents in a category whose overall quality reached the
    /// success threshold. Input to the autonomy assessment's historical
    /// criterion; computed per category only.
    pub async fn category_success_rate(&self, category: &str) -> Result<Option<f64>> {
        let row = sqlx::query(
            r#"SELECT COUNT(*) AS total,
                      COUNT(*) FILTER (WHERE quality_overall >= 0.7) AS successes
               FROM incidents
               WHERE category = $1 AND quality_overall IS NOT NULL"#,
        )
        .bind(category)
        .fetch_one(&self.pool)
        .await?;
        let total: i64 = row.try_get("total")?;
        if total == 0 {
            return Ok(None);
        }
        let successes: i64 = row.try_get("successes")?;
        Ok(Some(successes as f64 / total as f64))
    }

    /// Incidents created since `since`, for the retriever's corpus refresh.
    pub async fn recent_incidents(&self, since: DateTime<Utc>) -> Result<Vec<IncidentRecord>> {
        self.search_incidents(&SearchFilters {
            created_after: Some(since),
            limit: Some(500),
            order_by: Some(SearchOrder::CreatedAt),
            descending: true,
            ..Default::default()
        })
        .await
    }

    /// Apply the two retention policies: incident rows expire
    /// `retention_days` after resolution, history rows survive independently
    /// for `audit_retention_days`. Returns rows deleted.
    pub async fn cleanup_old_records(&self) -> Result<u64> {
        let incident_cutoff = Utc::now() - chrono::Duration::days(self.retention_days);
        let audit_cutoff = Utc::now() - chrono::Duration::days(self.audit_retention_days);

        let incidents = sqlx::query(
            "DELETE FROM incidents WHERE status IN ('resolved', 'closed') AND resolved_at < $1",
        )
        .bind(incident_cutoff)
        .execute(&self.pool)
        .await?
        .rows_affected();

        let history = sqlx::query("DELETE FROM incident_history WHERE timestamp < $1")
            .bind(audit_cutoff)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if incidents + history > 0 {
            info!(incidents, history, "retention cleanup removed rows");
        }
        Ok(incidents + history)
    }
}

fn record_from_row(row: sqlx::postgres::PgRow) -> Result<IncidentRecord> {
    Ok(IncidentRecord {
        incident_id: row.try_get("incident_id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        category: row.try_get("category")?,
        priority: row.try_get("priority")?,
        status: row.try_get("status")?,
        risk_score: row.try_get("risk_score")?,
        requires_human_intervention: row.try_get("requires_human_intervention")?,
        quality_overall: row.try_get("quality_overall")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        resolved_at: row.try_get("resolved_at")?,
    })
}
