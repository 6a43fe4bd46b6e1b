use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::listing::Listing;
use crate::models::published::{PublishOutcome, PublishedListing};
use crate::models::region_cache::RegionCacheEntry;
use crate::store::{PublishSink, RegionCache};

/// Rows per INSERT statement; keeps bind parameters well under the
/// Postgres limit of 65535.
const INSERT_CHUNK: usize = 500;

#[derive(sqlx::FromRow)]
struct RegionCacheRow {
    region: String,
    batch_number: i32,
    listings: Json<Vec<Listing>>,
    source: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl From<RegionCacheRow> for RegionCacheEntry {
    fn from(row: RegionCacheRow) -> Self {
        Self {
            region: row.region,
            batch_number: row.batch_number,
            listings: row.listings.0,
            source: row.source,
            created_at: row.created_at,
            expires_at: row.expires_at,
        }
    }
}

#[derive(Clone)]
pub struct PgRegionCache {
    pool: PgPool,
}

impl PgRegionCache {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RegionCache for PgRegionCache {
    async fn get(&self, region: &str) -> Result<Option<RegionCacheEntry>, AppError> {
        let row = sqlx::query_as::<_, RegionCacheRow>(
            "SELECT * FROM region_cache WHERE region = $1 AND expires_at > NOW()",
        )
        .bind(region)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn put(&self, entry: RegionCacheEntry) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM region_cache WHERE region = $1")
            .bind(&entry.region)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO region_cache (region, batch_number, listings, source, created_at, expires_at) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&entry.region)
        .bind(entry.batch_number)
        .bind(Json(&entry.listings))
        .bind(&entry.source)
        .bind(entry.created_at)
        .bind(entry.expires_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn list_all_fresh(&self) -> Result<Vec<RegionCacheEntry>, AppError> {
        let rows = sqlx::query_as::<_, RegionCacheRow>(
            "SELECT * FROM region_cache WHERE expires_at > NOW() ORDER BY batch_number, region",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_all(&self) -> Result<Vec<RegionCacheEntry>, AppError> {
        let rows = sqlx::query_as::<_, RegionCacheRow>(
            "SELECT * FROM region_cache ORDER BY batch_number, region",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

/// Publishes into the `listings` table under a generation marker.
///
/// New rows, the `publish_state` pointer flip, and removal of older external
/// generations commit together, so readers never see an empty external set.
#[derive(Clone)]
pub struct PgPublishSink {
    pool: PgPool,
}

impl PgPublishSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PublishSink for PgPublishSink {
    async fn replace_external(
        &self,
        listings: &[PublishedListing],
    ) -> Result<PublishOutcome, AppError> {
        let generation = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;

        for chunk in listings.chunks(INSERT_CHUNK) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO listings (id, title, company, location, salary, employment_type, description, posted_date, external_url, source, is_external, generation) ",
            );
            builder.push_values(chunk, |mut row, l| {
                row.push_bind(l.id)
                    .push_bind(&l.title)
                    .push_bind(&l.company)
                    .push_bind(&l.location)
                    .push_bind(&l.salary)
                    .push_bind(&l.kind)
                    .push_bind(&l.description)
                    .push_bind(l.posted_date)
                    .push_bind(&l.external_url)
                    .push_bind(&l.source)
                    .push_bind(true)
                    .push_bind(generation);
            });
            builder.build().execute(&mut *tx).await?;
        }

        sqlx::query(
            "INSERT INTO publish_state (id, current_generation, published_at) VALUES (TRUE, $1, NOW())
             ON CONFLICT (id) DO UPDATE SET current_generation = EXCLUDED.current_generation, published_at = EXCLUDED.published_at",
        )
        .bind(generation)
        .execute(&mut *tx)
        .await?;

        let removed = sqlx::query(
            "DELETE FROM listings WHERE is_external AND generation IS DISTINCT FROM $1",
        )
        .bind(generation)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;

        Ok(PublishOutcome {
            generation,
            inserted: listings.len(),
            removed,
        })
    }
}
