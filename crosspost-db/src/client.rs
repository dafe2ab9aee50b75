use crate::record::{self, PostRow};
use async_trait::async_trait;
use crosspost_common::{
    model::{id::RecordId, post::PostRecord},
    remote::{PostStore, RemoteError},
};
use sqlx::{PgPool, migrate::MigrateError, postgres::PgPoolOptions, query, query_as};
use thiserror::Error;
use tracing::debug;

pub type Result<T, E = DbError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error("Running migrations failed: {0}")]
    Migrate(#[from] MigrateError),
}

impl From<DbError> for RemoteError {
    fn from(value: DbError) -> Self {
        RemoteError::new("datastore", value)
    }
}

#[derive(Clone, Debug)]
pub struct DbClient {
    pool: PgPool,
}

impl DbClient {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new().connect(database_url).await?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub async fn upsert_record(&self, record: &PostRecord) -> Result<()> {
        let row = PostRow::from(record);

        query(
            "
            INSERT INTO posts.records
                (record_id, content, platform, images, scheduled_at, status,
                created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (record_id) DO UPDATE SET
                content = EXCLUDED.content,
                platform = EXCLUDED.platform,
                images = EXCLUDED.images,
                scheduled_at = EXCLUDED.scheduled_at,
                status = EXCLUDED.status,
                updated_at = EXCLUDED.updated_at
            ",
        )
        .bind(&row.record_id)
        .bind(&row.content)
        .bind(&row.platform)
        .bind(&row.images)
        .bind(&row.scheduled_at)
        .bind(&row.status)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&self.pool)
        .await?;

        debug!(record_id = %row.record_id, "Upserted post record");
        Ok(())
    }

    /// Rows that do not map to a [`PostRecord`] are skipped with a warning.
    pub async fn fetch_records(&self) -> Result<Vec<PostRecord>> {
        let rows = query_as::<_, PostRow>(
            "
            SELECT
                records.record_id,
                records.content,
                records.platform,
                records.images,
                records.scheduled_at,
                records.status,
                records.created_at,
                records.updated_at
            FROM
                posts.records
            ORDER BY
                records.created_at DESC,
                records.record_id
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(record::rows_to_records(rows))
    }

    pub async fn delete_record(&self, record_id: &RecordId) -> Result<bool> {
        let result = query(
            "
            DELETE FROM posts.records
            WHERE record_id = $1
            ",
        )
        .bind(record_id.get())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl PostStore for DbClient {
    async fn append(&self, record: &PostRecord) -> Result<(), RemoteError> {
        Ok(self.upsert_record(record).await?)
    }

    async fn fetch_all(&self) -> Result<Vec<PostRecord>, RemoteError> {
        Ok(self.fetch_records().await?)
    }

    async fn delete(&self, id: &RecordId) -> Result<bool, RemoteError> {
        Ok(self.delete_record(id).await?)
    }
}
