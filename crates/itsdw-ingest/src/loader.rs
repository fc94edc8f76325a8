//! Conflict-ignoring batch loader
//!
//! Each call to [`BatchLoader::load`] inserts one table's rows inside its own
//! transaction. Rows whose key already exists are skipped by
//! `ON CONFLICT DO NOTHING`; a database error rolls the whole call back and
//! is reported in the returned [`LoadReport`] instead of being propagated,
//! so one failing table never stops the run or touches another table.

use sqlx::query_builder::Separated;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use tracing::{error, info, warn};

/// Default rows per INSERT statement
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// PostgreSQL accepts at most this many bind parameters per statement
const MAX_BIND_PARAMS: usize = u16::MAX as usize;

/// A typed row of one target table
pub trait TableRow: Send + Sync {
    /// Target table name
    const TABLE: &'static str;

    /// Inserted columns, in bind order
    const COLUMNS: &'static [&'static str];

    /// Bind exactly one value per entry of [`Self::COLUMNS`], in order
    fn push_binds<'args>(&'args self, row: &mut Separated<'_, 'args, Postgres, &'static str>);
}

/// Result of one load call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Nothing to insert
    Skipped,
    /// Committed; `inserted` excludes rows dropped as conflicts
    Loaded { inserted: u64 },
    /// Rolled back after a database error
    RolledBack { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub table: &'static str,
    pub attempted: usize,
    pub outcome: LoadOutcome,
}

impl LoadReport {
    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, LoadOutcome::RolledBack { .. })
    }

    pub fn inserted(&self) -> u64 {
        match self.outcome {
            LoadOutcome::Loaded { inserted } => inserted,
            _ => 0,
        }
    }

    /// Rows that were offered but not stored (key conflicts)
    pub fn ignored(&self) -> u64 {
        match self.outcome {
            LoadOutcome::Loaded { inserted } => (self.attempted as u64).saturating_sub(inserted),
            _ => 0,
        }
    }
}

/// Rows per statement for `R`, capped by the bind parameter limit
pub fn rows_per_statement<R: TableRow>(batch_size: usize) -> usize {
    let by_params = MAX_BIND_PARAMS / R::COLUMNS.len().max(1);
    batch_size.clamp(1, by_params.max(1))
}

/// `INSERT INTO <table> (<columns>) VALUES (...), ... ON CONFLICT DO NOTHING`
pub fn insert_statement<R: TableRow>(rows: &[R]) -> QueryBuilder<'_, Postgres> {
    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("INSERT INTO {} ({}) ", R::TABLE, R::COLUMNS.join(", ")));

    query_builder.push_values(rows, |mut b, row| row.push_binds(&mut b));
    query_builder.push(" ON CONFLICT DO NOTHING");
    query_builder
}

/// Inserts typed rows in batches, one transaction per call
#[derive(Clone)]
pub struct BatchLoader {
    db: PgPool,
    batch_size: usize,
}

impl BatchLoader {
    pub fn new(db: PgPool, batch_size: usize) -> Self {
        Self { db, batch_size }
    }

    /// Insert `rows` into `R::TABLE`. Never returns an error: failures are
    /// logged, rolled back, and described in the report.
    pub async fn load<R: TableRow>(&self, rows: &[R]) -> LoadReport {
        let attempted = rows.len();

        if rows.is_empty() {
            info!(table = %R::TABLE, "No rows to insert");
            return LoadReport {
                table: R::TABLE,
                attempted,
                outcome: LoadOutcome::Skipped,
            };
        }

        let outcome = match self.try_load(rows).await {
            Ok(inserted) => {
                info!(
                    table = %R::TABLE,
                    attempted,
                    inserted,
                    ignored = (attempted as u64).saturating_sub(inserted),
                    "Rows loaded"
                );
                LoadOutcome::Loaded { inserted }
            },
            Err(e) => {
                error!(
                    table = %R::TABLE,
                    attempted,
                    error = %e,
                    "Batch insert failed, transaction rolled back"
                );
                LoadOutcome::RolledBack {
                    error: e.to_string(),
                }
            },
        };

        LoadReport {
            table: R::TABLE,
            attempted,
            outcome,
        }
    }

    async fn try_load<R: TableRow>(&self, rows: &[R]) -> Result<u64, sqlx::Error> {
        let mut tx = self.db.begin().await?;

        match self.insert_chunks(&mut tx, rows).await {
            Ok(inserted) => {
                tx.commit().await?;
                Ok(inserted)
            },
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(
                        table = %R::TABLE,
                        error = %rollback_err,
                        "Rollback failed; connection will discard the transaction"
                    );
                }
                Err(e)
            },
        }
    }

    async fn insert_chunks<R: TableRow>(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        rows: &[R],
    ) -> Result<u64, sqlx::Error> {
        let mut inserted = 0;

        for chunk in rows.chunks(rows_per_statement::<R>(self.batch_size)) {
            let result = insert_statement(chunk).build().execute(&mut **tx).await?;
            inserted += result.rows_affected();
        }

        Ok(inserted)
    }
}
