use crate::config::DatabaseSettings;
use crate::core::Cohort;
use crate::models::{
    CandidateId, CandidateRecord, CohortId, CohortRow, MutationKind, PendingMutation,
    RatingChange, VoteRecord,
};
use crate::services::store::{CandidateStore, StoreError};
use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use std::time::Duration;

const CANDIDATE_COLUMNS: &str = r#"
    c.id, c.name, c.external_id, cc.rating, cc.wins, cc.losses, cc.rank,
    c.picture, c.picture_author, c.picture_license, c.known_for, c.desc_url
"#;

/// PostgreSQL-backed candidate store
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect and run migrations
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout: Duration,
        idle_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(acquire_timeout)
            .idle_timeout(idle_timeout)
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        // Run migrations on startup
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    pub async fn from_settings(settings: &DatabaseSettings) -> Result<Self, StoreError> {
        tracing::info!(
            max_connections = settings.max_connections,
            "Connecting to PostgreSQL"
        );

        Self::new(
            &settings.url,
            settings.max_connections,
            settings.min_connections,
            Duration::from_secs(settings.acquire_timeout_secs),
            Duration::from_secs(settings.idle_timeout_secs),
        )
        .await
    }

    /// Wrap an existing pool (migrations are the caller's concern)
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn candidate_from_row(row: &PgRow) -> Result<CandidateRecord, sqlx::Error> {
    Ok(CandidateRecord {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        external_id: row.try_get("external_id")?,
        rating: row.try_get("rating")?,
        wins: row.try_get("wins")?,
        losses: row.try_get("losses")?,
        rank: row.try_get("rank")?,
        picture: row.try_get("picture")?,
        picture_author: row.try_get("picture_author")?,
        picture_license: row.try_get("picture_license")?,
        known_for: row.try_get("known_for")?,
        desc_url: row.try_get("desc_url")?,
    })
}

fn to_rank(position: u64) -> Result<i64, StoreError> {
    i64::try_from(position)
        .map_err(|_| StoreError::InvalidData(format!("position {} out of range", position)))
}

#[async_trait]
impl CandidateStore for PostgresStore {
    async fn fetch_cohort_rows(&self) -> Result<Vec<CohortRow>, StoreError> {
        let query = r#"
            SELECT id, category, country, gender, active, predefined
            FROM cohorts
            ORDER BY id
        "#;

        let rows = sqlx::query(query).fetch_all(&self.pool).await?;

        let cohorts = rows
            .iter()
            .map(|row| -> Result<CohortRow, sqlx::Error> {
                Ok(CohortRow {
                    id: row.try_get("id")?,
                    category: row.try_get("category")?,
                    country: row.try_get("country")?,
                    gender: row.try_get("gender")?,
                    active: row.try_get("active")?,
                    predefined: row.try_get("predefined")?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(cohorts)
    }

    async fn fetch_candidates_at_positions(
        &self,
        cohort: &Cohort,
        positions: &[u64],
    ) -> Result<Vec<CandidateRecord>, StoreError> {
        let ranks = positions
            .iter()
            .map(|&p| to_rank(p))
            .collect::<Result<Vec<i64>, _>>()?;

        let query = format!(
            r#"
            SELECT {}
            FROM cohort_candidates cc
            INNER JOIN candidates c ON c.id = cc.candidate_id
            WHERE cc.cohort_id = $1
              AND cc.rank = ANY($2)
            ORDER BY array_position($2, cc.rank)
            LIMIT $3
            "#,
            CANDIDATE_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(cohort.id())
            .bind(&ranks)
            .bind(ranks.len() as i64)
            .fetch_all(&self.pool)
            .await?;

        let records = rows
            .iter()
            .map(candidate_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    async fn apply_rating_changes(
        &self,
        cohort: &Cohort,
        changes: &[RatingChange],
    ) -> Result<(), StoreError> {
        if changes.is_empty() {
            return Ok(());
        }

        let query = r#"
            UPDATE cohort_candidates
            SET rating = rating + $1,
                wins = wins + $2,
                losses = losses + $3
            WHERE cohort_id = $4 AND candidate_id = $5
        "#;

        let mut tx = self.pool.begin().await?;
        for change in changes {
            let (wins, losses) = if change.won { (1, 0) } else { (0, 1) };
            sqlx::query(query)
                .bind(change.delta)
                .bind(wins)
                .bind(losses)
                .bind(cohort.id())
                .bind(change.candidate_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        tracing::debug!(
            cohort = cohort.key(),
            "Applied {} rating change(s)",
            changes.len()
        );

        Ok(())
    }

    async fn record_vote(&self, vote: &VoteRecord) -> Result<(), StoreError> {
        let query = r#"
            INSERT INTO votes (cohort_id, first_id, second_id, winner_id, voter_id)
            VALUES ($1, $2, $3, $4, $5)
        "#;

        sqlx::query(query)
            .bind(vote.cohort_id)
            .bind(vote.first_id)
            .bind(vote.second_id)
            .bind(vote.winner_or_sentinel())
            .bind(vote.voter_or_sentinel())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn pending_mutations(&self) -> Result<Vec<PendingMutation>, StoreError> {
        let query = r#"
            SELECT id, candidate_id, kind, cohort_ids
            FROM pending_mutations
            ORDER BY id
        "#;

        let rows = sqlx::query(query).fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| -> Result<PendingMutation, StoreError> {
                let kind: String = row.try_get("kind")?;
                let Json(cohort_ids): Json<Vec<CohortId>> = row.try_get("cohort_ids")?;
                Ok(PendingMutation {
                    id: row.try_get("id")?,
                    candidate_id: row.try_get("candidate_id")?,
                    kind: kind.parse().map_err(StoreError::InvalidData)?,
                    cohort_ids,
                })
            })
            .collect()
    }

    async fn apply_mutation(
        &self,
        mutation: &PendingMutation,
    ) -> Result<Vec<CohortId>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let consumed = sqlx::query("DELETE FROM pending_mutations WHERE id = $1")
            .bind(mutation.id)
            .execute(&mut *tx)
            .await?;
        if consumed.rows_affected() == 0 {
            return Err(StoreError::InvalidData(format!(
                "pending mutation {} was already consumed",
                mutation.id
            )));
        }

        let mut affected: Vec<CohortId> = Vec::new();
        match mutation.kind {
            MutationKind::Add => {
                let query = r#"
                    INSERT INTO cohort_candidates (cohort_id, candidate_id)
                    VALUES ($1, $2)
                    ON CONFLICT (cohort_id, candidate_id) DO NOTHING
                "#;
                for &cohort_id in &mutation.cohort_ids {
                    let result = sqlx::query(query)
                        .bind(cohort_id)
                        .bind(mutation.candidate_id)
                        .execute(&mut *tx)
                        .await?;
                    if result.rows_affected() > 0 {
                        affected.push(cohort_id);
                    }
                }
            }
            MutationKind::Remove => {
                let rows = sqlx::query(
                    "DELETE FROM cohort_candidates WHERE candidate_id = $1 RETURNING cohort_id, rank",
                )
                .bind(mutation.candidate_id)
                .fetch_all(&mut *tx)
                .await?;
                for row in &rows {
                    let cohort_id: CohortId = row.try_get("cohort_id")?;
                    let rank: Option<i64> = row.try_get("rank")?;

                    // Keep ranks 1..n contiguous until the next recount
                    if let Some(rank) = rank {
                        sqlx::query(
                            "UPDATE cohort_candidates SET rank = rank - 1 WHERE cohort_id = $1 AND rank > $2",
                        )
                        .bind(cohort_id)
                        .bind(rank)
                        .execute(&mut *tx)
                        .await?;
                    }
                    affected.push(cohort_id);
                }

                sqlx::query("DELETE FROM candidates WHERE id = $1")
                    .bind(mutation.candidate_id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;

        tracing::debug!(
            mutation = mutation.id,
            candidate = mutation.candidate_id,
            "Applied '{}' mutation to {} cohort(s)",
            mutation.kind.as_str(),
            affected.len()
        );

        Ok(affected)
    }

    async fn enqueue_mutation(
        &self,
        candidate_id: CandidateId,
        kind: MutationKind,
        cohort_ids: &[CohortId],
    ) -> Result<bool, StoreError> {
        let query = r#"
            INSERT INTO pending_mutations (candidate_id, kind, cohort_ids)
            SELECT $1, $2, $3
            WHERE NOT EXISTS (
                SELECT 1 FROM pending_mutations
                WHERE candidate_id = $1 AND kind = $2
            )
        "#;

        let result = sqlx::query(query)
            .bind(candidate_id)
            .bind(kind.as_str())
            .bind(Json(cohort_ids))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_ranks(&self, cohort: &Cohort) -> Result<(), StoreError> {
        let query = r#"
            UPDATE cohort_candidates cc
            SET rank = ranked.position
            FROM (
                SELECT candidate_id,
                       ROW_NUMBER() OVER (ORDER BY rating DESC, candidate_id ASC) AS position
                FROM cohort_candidates
                WHERE cohort_id = $1
            ) ranked
            WHERE cc.cohort_id = $1
              AND cc.candidate_id = ranked.candidate_id
        "#;

        sqlx::query(query)
            .bind(cohort.id())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn count_candidates(&self, cohort: &Cohort) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM cohort_candidates WHERE cohort_id = $1")
            .bind(cohort.id())
            .fetch_one(&self.pool)
            .await?;

        let count: i64 = row.try_get("count")?;
        u64::try_from(count)
            .map_err(|_| StoreError::InvalidData(format!("negative candidate count {}", count)))
    }

    async fn fetch_leaderboard(
        &self,
        cohort: &Cohort,
        limit: u32,
    ) -> Result<Vec<CandidateRecord>, StoreError> {
        let query = format!(
            r#"
            SELECT {}
            FROM cohort_candidates cc
            INNER JOIN candidates c ON c.id = cc.candidate_id
            WHERE cc.cohort_id = $1
              AND cc.rank <= $2
            ORDER BY cc.rank
            LIMIT $2
            "#,
            CANDIDATE_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(cohort.id())
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        let records = rows
            .iter()
            .map(candidate_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    async fn fetch_candidate(
        &self,
        cohort: &Cohort,
        candidate_id: CandidateId,
    ) -> Result<Option<CandidateRecord>, StoreError> {
        let query = format!(
            r#"
            SELECT {}
            FROM cohort_candidates cc
            INNER JOIN candidates c ON c.id = cc.candidate_id
            WHERE cc.cohort_id = $1
              AND cc.candidate_id = $2
            "#,
            CANDIDATE_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(cohort.id())
            .bind(candidate_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(candidate_from_row).transpose()?)
    }

    /// Health check for the database connection
    async fn health_check(&self) -> Result<bool, StoreError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(Into::into)
    }
}
