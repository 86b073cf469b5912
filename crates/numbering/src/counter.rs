//! Counter store: one row per scope holding the next number to issue
//!
//! Every change to `current_sequence_value` happens inside a transaction
//! that reads the row with an exclusive lock, so two callers racing on the
//! same scope can never observe the same value. Conflicts reported by the
//! engine are retried a bounded number of times before giving up.
//!
//! SQLite has no row locks and refuses to upgrade a read lock while another
//! writer is active, so on SQLite the transaction opens with a write to the
//! counter row. Callers then queue on the busy timeout instead of failing.

use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{entity::*, query::*, ConnectionTrait, DatabaseTransaction, DbBackend};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::assignment::AssignmentLog;
use crate::database::{is_transient, DatabaseManager};
use crate::entity::{assignments, counters};
use crate::error::{NumberingError, Result};
use crate::format::DisplayFormat;
use crate::scope::Scope;

/// How often a conflicting transaction is attempted before giving up
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Duration::from_millis(50),
        }
    }
}

/// A number taken from a counter
#[derive(Debug, Clone)]
pub struct Reservation {
    pub issued_value: i64,
    /// Counter state after the increment was committed
    pub counter: counters::Model,
    /// Present only when the audit record was written in the same transaction
    pub assignment: Option<assignments::Model>,
}

pub struct CounterStore {
    db: DatabaseManager,
    retry: RetryPolicy,
}

impl CounterStore {
    pub fn new(db: DatabaseManager, retry: RetryPolicy) -> Self {
        Self { db, retry }
    }

    /// Take the next number for `scope`.
    ///
    /// With `record_with` set, the assignment record is inserted before the
    /// commit, so the counter never advances without its audit row.
    pub async fn reserve(&self, scope: &Scope, record_with: Option<&DisplayFormat>) -> Result<Reservation> {
        let key = scope.key();
        self.with_retries("reserve", &key, move || self.try_reserve(scope, record_with))
            .await
    }

    async fn try_reserve(&self, scope: &Scope, record_with: Option<&DisplayFormat>) -> Result<Reservation> {
        let txn = self.db.begin_transaction().await?;
        claim_write_lock(&txn, &scope.key()).await?;

        let (issued_value, counter) = advance(&txn, scope).await?;
        let assignment = match record_with {
            Some(format) => Some(AssignmentLog::insert(&txn, scope, issued_value, format).await?),
            None => None,
        };

        txn.commit().await?;

        debug!(
            "Committed counter {} at {} (next {}, total {})",
            counter.scope_key, issued_value, counter.current_sequence_value, counter.total_issued
        );

        Ok(Reservation {
            issued_value,
            counter,
            assignment,
        })
    }

    /// Set the next value to issue for `scope`, creating the counter if needed.
    /// `total_issued` is left untouched.
    pub async fn reset(&self, scope: &Scope, reset_to: i64) -> Result<counters::Model> {
        if reset_to < 1 {
            return Err(NumberingError::InvalidInput(format!(
                "counter can only be reset to a positive value, got {}",
                reset_to
            )));
        }

        let key = scope.key();
        let counter = self
            .with_retries("reset", &key, move || self.try_reset(scope, reset_to))
            .await?;

        info!("Counter {} reset to {}", counter.scope_key, reset_to);
        Ok(counter)
    }

    async fn try_reset(&self, scope: &Scope, reset_to: i64) -> Result<counters::Model> {
        let txn = self.db.begin_transaction().await?;
        let key = scope.key();
        let now = Utc::now();
        claim_write_lock(&txn, &key).await?;

        let counter = match find_for_update(&txn, &key).await? {
            Some(counter) => {
                let mut active: counters::ActiveModel = counter.into();
                active.current_sequence_value = Set(reset_to);
                active.updated_at = Set(now);
                active.update(&txn).await?
            }
            None => new_counter(scope, &key, reset_to, 0, now).insert(&txn).await?,
        };

        txn.commit().await?;
        Ok(counter)
    }

    pub async fn find(&self, scope_key: &str) -> Result<Option<counters::Model>> {
        Ok(counters::Entity::find_by_id(scope_key.to_string())
            .one(self.db.connection())
            .await?)
    }

    /// Every counter of a class, with or without subject
    pub async fn list_for_class(&self, class_id: &str) -> Result<Vec<counters::Model>> {
        Ok(counters::Entity::find()
            .filter(counters::Column::ClassId.eq(class_id))
            .order_by_asc(counters::Column::ScopeKey)
            .all(self.db.connection())
            .await?)
    }

    /// Point the counter's "last" fields at a completed assignment.
    /// Returns false when the counter does not exist.
    pub async fn record_last_entity(
        &self,
        scope_key: &str,
        entity_id: &str,
        entity_title: &str,
        issued_at: DateTime<Utc>,
    ) -> Result<bool> {
        let Some(counter) = self.find(scope_key).await? else {
            return Ok(false);
        };

        let mut active: counters::ActiveModel = counter.into();
        active.last_entity_id = Set(Some(entity_id.to_string()));
        active.last_entity_title = Set(Some(entity_title.to_string()));
        active.last_issued_at = Set(Some(issued_at));
        active.updated_at = Set(Utc::now());
        active.update(self.db.connection()).await?;

        Ok(true)
    }

    /// Rename the denormalized title on counters that point at `entity_id`
    pub async fn rename_last_entity(&self, entity_id: &str, title: &str) -> Result<u64> {
        let result = counters::Entity::update_many()
            .col_expr(counters::Column::LastEntityTitle, Expr::value(title.to_string()))
            .filter(counters::Column::LastEntityId.eq(entity_id))
            .exec(self.db.connection())
            .await?;
        Ok(result.rows_affected)
    }

    async fn with_retries<T, F, Fut>(&self, operation: &str, scope_key: &str, mut attempt_fn: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;
            match attempt_fn().await {
                Ok(value) => return Ok(value),
                Err(NumberingError::Database(e)) if is_transient(&e) && attempt < self.retry.max_attempts => {
                    warn!(
                        "Conflict during {} on counter {}, retrying ({}/{}): {}",
                        operation, scope_key, attempt, self.retry.max_attempts, e
                    );
                    tokio::time::sleep(self.retry.backoff * attempt).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Take the database write lock before anything is read (SQLite only)
async fn claim_write_lock(txn: &DatabaseTransaction, scope_key: &str) -> Result<()> {
    if txn.get_database_backend() != DbBackend::Sqlite {
        return Ok(());
    }

    counters::Entity::update_many()
        .col_expr(counters::Column::UpdatedAt, Expr::col(counters::Column::UpdatedAt).into())
        .filter(counters::Column::ScopeKey.eq(scope_key))
        .exec(txn)
        .await?;
    Ok(())
}

async fn find_for_update(txn: &DatabaseTransaction, scope_key: &str) -> Result<Option<counters::Model>> {
    Ok(counters::Entity::find_by_id(scope_key.to_string())
        .lock_exclusive()
        .one(txn)
        .await?)
}

/// Read-increment-write of one counter row. Returns the issued value and the
/// updated row.
async fn advance(txn: &DatabaseTransaction, scope: &Scope) -> Result<(i64, counters::Model)> {
    let key = scope.key();
    let now = Utc::now();

    match find_for_update(txn, &key).await? {
        Some(counter) => {
            let issued = counter.current_sequence_value;
            let total = counter.total_issued;

            let mut active: counters::ActiveModel = counter.into();
            active.current_sequence_value = Set(issued + 1);
            active.total_issued = Set(total + 1);
            active.updated_at = Set(now);
            let updated = active.update(txn).await?;

            Ok((issued, updated))
        }
        None => {
            debug!("Creating counter {}", key);
            let created = new_counter(scope, &key, 2, 1, now).insert(txn).await?;
            Ok((1, created))
        }
    }
}

fn new_counter(
    scope: &Scope,
    key: &str,
    current_sequence_value: i64,
    total_issued: i64,
    now: DateTime<Utc>,
) -> counters::ActiveModel {
    counters::ActiveModel {
        scope_key: Set(key.to_string()),
        class_id: Set(scope.class_id.clone()),
        class_name: Set(scope.class_name.clone()),
        subject_id: Set(scope.subject().map(str::to_string)),
        subject_name: Set(scope.subject_name.clone()),
        teacher_id: Set(scope.teacher_id.clone()),
        teacher_name: Set(scope.teacher_name.clone()),
        current_sequence_value: Set(current_sequence_value),
        total_issued: Set(total_issued),
        last_entity_id: Set(None),
        last_entity_title: Set(None),
        last_issued_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
}

