use chrono::{Duration, Utc};
use serde_json::Value;
use sqlx::postgres::{PgListener, PgRow};
use sqlx::{PgPool, Row};
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

use crate::ingest;
use crate::models::MaterialRecord;
use crate::source::{DeleteError, FetchError, RecordSource, Subscription};

const NOTIFY_CHANNEL: &str = "weconnect_materials";

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::query("CREATE SCHEMA IF NOT EXISTS weconnect")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS weconnect.materials (
            id TEXT PRIMARY KEY,
            owner_id UUID NOT NULL,
            title TEXT,
            category TEXT,
            school TEXT,
            course TEXT,
            views BIGINT,
            downloads BIGINT,
            diamonds BIGINT,
            earnings DOUBLE PRECISION,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS materials_owner_created_idx \
         ON weconnect.materials (owner_id, created_at DESC)",
    )
    .execute(pool)
    .await?;

    // Row changes fan out to dashboard subscribers over LISTEN/NOTIFY.
    sqlx::query(
        r#"
        CREATE OR REPLACE FUNCTION weconnect.notify_material_change() RETURNS trigger AS $$
        DECLARE
            payload TEXT;
        BEGIN
            IF TG_OP = 'DELETE' THEN
                payload := json_build_object(
                    'eventType', 'DELETE',
                    'old', json_build_object('id', OLD.id, 'owner_id', OLD.owner_id)
                )::text;
            ELSIF TG_OP = 'UPDATE' THEN
                payload := json_build_object('eventType', 'UPDATE', 'new', row_to_json(NEW))::text;
            ELSE
                payload := json_build_object('eventType', 'INSERT', 'new', row_to_json(NEW))::text;
            END IF;
            PERFORM pg_notify('weconnect_materials', payload);
            RETURN NULL;
        END;
        $$ LANGUAGE plpgsql
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("DROP TRIGGER IF EXISTS materials_notify ON weconnect.materials")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE TRIGGER materials_notify \
         AFTER INSERT OR UPDATE OR DELETE ON weconnect.materials \
         FOR EACH ROW EXECUTE FUNCTION weconnect.notify_material_change()",
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<Uuid> {
    let owner = Uuid::parse_str("9f2c61ac-48f1-4f5e-9c83-5b2d3f6a1e04")?;
    let materials = vec![
        ("MTH 202 Past Questions (2019-2024)", "Past Questions", "UNILAG", "MTH 202", 182, 44, 12, 6.0, 2),
        ("Organic Chemistry Lecture Notes", "Lecture Notes", "UI", "CHM 231", 95, 18, 5, 2.5, 9),
        ("GST 103 Summary Sheet", "Summaries", "FUTA", "GST 103", 230, 71, 20, 10.0, 16),
        ("Thermodynamics Solved Problems", "Assignments", "UNILAG", "MEE 301", 41, 9, 2, 1.0, 35),
    ];

    for (title, category, school, course, views, downloads, diamonds, earnings, days_ago) in materials {
        sqlx::query(
            r#"
            INSERT INTO weconnect.materials
            (id, owner_id, title, category, school, course, views, downloads, diamonds, earnings, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(format!("seed-{}", title.to_lowercase().replace(' ', "-")))
        .bind(owner)
        .bind(title)
        .bind(category)
        .bind(school)
        .bind(course)
        .bind(views as i64)
        .bind(downloads as i64)
        .bind(diamonds as i64)
        .bind(earnings)
        .bind(Utc::now() - Duration::days(days_ago))
        .execute(pool)
        .await?;
    }

    Ok(owner)
}

pub async fn insert_material(
    pool: &PgPool,
    owner: Uuid,
    title: &str,
    category: &str,
    school: &str,
    course: &str,
) -> anyhow::Result<String> {
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        r#"
        INSERT INTO weconnect.materials
        (id, owner_id, title, category, school, course, views, downloads, diamonds, earnings)
        VALUES ($1, $2, $3, $4, $5, $6, 0, 0, 0, 0.0)
        "#,
    )
    .bind(&id)
    .bind(owner)
    .bind(title)
    .bind(category)
    .bind(school)
    .bind(course)
    .execute(pool)
    .await?;
    Ok(id)
}

pub struct PgRecordSource {
    pool: PgPool,
}

impl PgRecordSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl RecordSource for PgRecordSource {
    async fn fetch_all(&self, owner: Uuid) -> Result<Vec<MaterialRecord>, FetchError> {
        let rows = sqlx::query(
            "SELECT id, owner_id, title, category, school, course, \
             views, downloads, diamonds, earnings, created_at \
             FROM weconnect.materials WHERE owner_id = $1 \
             ORDER BY created_at DESC",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(record_from_row).collect())
    }

    async fn subscribe(&self, owner: Uuid) -> Result<Subscription, FetchError> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(NOTIFY_CHANNEL).await?;

        let (sender, deltas) = mpsc::channel(64);
        let task = tokio::spawn(async move {
            loop {
                let notification = match listener.recv().await {
                    Ok(notification) => notification,
                    Err(err) => {
                        warn!(error = %err, "materials listener lost its connection");
                        break;
                    }
                };

                let value: Value = match serde_json::from_str(notification.payload()) {
                    Ok(value) => value,
                    Err(err) => {
                        warn!(error = %err, "skipping unreadable notification payload");
                        continue;
                    }
                };

                // Deltas for other owners never reach the store.
                if ingest::delta_owner(&value).is_some_and(|delta_owner| delta_owner != owner) {
                    continue;
                }

                match ingest::delta_from_value(&value) {
                    Ok(delta) => {
                        if sender.send(delta).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => warn!(error = %err, "skipping malformed delta"),
                }
            }
        });

        Ok(Subscription::new(deltas, task))
    }

    async fn delete_record(&self, id: &str) -> Result<(), DeleteError> {
        sqlx::query("DELETE FROM weconnect.materials WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|source| DeleteError::Backend {
                id: id.to_string(),
                source,
            })?;
        Ok(())
    }
}

fn record_from_row(row: &PgRow) -> MaterialRecord {
    MaterialRecord {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        title: row
            .get::<Option<String>, _>("title")
            .unwrap_or_else(|| "Untitled".to_string()),
        category: row.get::<Option<String>, _>("category").unwrap_or_default(),
        school: row.get::<Option<String>, _>("school").unwrap_or_default(),
        course: row.get::<Option<String>, _>("course").unwrap_or_default(),
        views: row.get::<Option<i64>, _>("views").unwrap_or(0).max(0),
        downloads: row.get::<Option<i64>, _>("downloads").unwrap_or(0).max(0),
        diamonds: row.get::<Option<i64>, _>("diamonds").unwrap_or(0).max(0),
        earnings: row.get::<Option<f64>, _>("earnings").unwrap_or(0.0).max(0.0),
        created_at: row.get("created_at"),
    }
}
