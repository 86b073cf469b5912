//! Numbering service: the public operations over counters and assignments
//!
//! Write paths (issue, complete, rename, reset) return errors to the caller.
//! Read paths (status, suggestion, listings) log failures and fall back to an
//! empty or default answer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::assignment::AssignmentLog;
use crate::config::NumberingConfig;
use crate::counter::{CounterStore, RetryPolicy};
use crate::database::DatabaseManager;
use crate::entity::{assignments, counters};
use crate::error::{NumberingError, Result};
use crate::format::{DisplayFormat, NumberStyle};
use crate::scope::{scope_key, Scope};
use crate::suggest::Suggestion;

/// Result of a successful issuance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedNumber {
    pub scope_key: String,
    pub issued_value: i64,
    pub display_label: String,
    /// `None` when the audit record could not be written after the commit
    pub assignment_id: Option<String>,
}

/// Snapshot of a counter, or defaults when the scope has none yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterStatus {
    pub scope_key: String,
    pub exists: bool,
    pub current_sequence_value: i64,
    pub total_issued: i64,
    pub last_entity_id: Option<String>,
    pub last_entity_title: Option<String>,
    pub last_issued_at: Option<DateTime<Utc>>,
}

impl CounterStatus {
    fn missing(scope_key: String) -> Self {
        Self {
            scope_key,
            exists: false,
            current_sequence_value: 1,
            total_issued: 0,
            last_entity_id: None,
            last_entity_title: None,
            last_issued_at: None,
        }
    }
}

impl From<counters::Model> for CounterStatus {
    fn from(counter: counters::Model) -> Self {
        Self {
            scope_key: counter.scope_key,
            exists: true,
            current_sequence_value: counter.current_sequence_value,
            total_issued: counter.total_issued,
            last_entity_id: counter.last_entity_id,
            last_entity_title: counter.last_entity_title,
            last_issued_at: counter.last_issued_at,
        }
    }
}

pub struct NumberingService {
    db: DatabaseManager,
    counters: CounterStore,
    assignments: AssignmentLog,
    format: DisplayFormat,
    record_in_transaction: bool,
}

impl NumberingService {
    /// Connect to the configured database and build the service
    pub async fn connect(config: &NumberingConfig) -> Result<Self> {
        let db = DatabaseManager::new(config).await?;
        Ok(Self::new(db, config))
    }

    pub fn new(db: DatabaseManager, config: &NumberingConfig) -> Self {
        let retry = RetryPolicy {
            max_attempts: config.max_transaction_retries.max(1),
            backoff: Duration::from_millis(config.retry_backoff_ms),
        };

        Self {
            counters: CounterStore::new(db.clone(), retry),
            assignments: AssignmentLog::new(db.clone()),
            db,
            format: config.display_format(),
            record_in_transaction: config.record_in_transaction,
        }
    }

    pub fn database(&self) -> &DatabaseManager {
        &self.db
    }

    /// Issue the next number for `scope` and record it.
    ///
    /// The audit record is written after the counter commit unless
    /// `record_in_transaction` is set. A failure at that point is logged and
    /// reported as `assignment_id: None`; the number still counts as issued.
    pub async fn issue(&self, scope: &Scope) -> Result<IssuedNumber> {
        scope.validate()?;
        let key = scope.key();

        let record_with = self.record_in_transaction.then_some(&self.format);
        let reservation = self.counters.reserve(scope, record_with).await.map_err(|e| {
            error!("Failed to issue number for {}: {}", key, e);
            e
        })?;
        let issued_value = reservation.issued_value;

        let issued = match reservation.assignment {
            Some(record) => IssuedNumber {
                scope_key: key,
                issued_value,
                display_label: record.display_label,
                assignment_id: Some(record.id),
            },
            None => match self.assignments.record(scope, issued_value, &self.format).await {
                Ok(record) => IssuedNumber {
                    scope_key: key,
                    issued_value,
                    display_label: record.display_label,
                    assignment_id: Some(record.id),
                },
                Err(e) => {
                    error!(
                        "Counter {} advanced to {} but the assignment record was not written: {}",
                        key, issued_value, e
                    );
                    let format = self.format.clone().with_subject(scope.subject_name.clone());
                    let display_label = format
                        .label(issued_value)
                        .or_else(|_| format.clone().with_style(NumberStyle::Simple).label(issued_value))?;
                    IssuedNumber {
                        scope_key: key,
                        issued_value,
                        display_label,
                        assignment_id: None,
                    }
                }
            },
        };

        info!(
            "Issued {} ({}) for scope {}",
            issued.issued_value, issued.display_label, issued.scope_key
        );
        Ok(issued)
    }

    /// Link an assignment to the entity created for it, then refresh the
    /// counter's "last" fields. Unknown assignment ids return `Ok(None)`.
    pub async fn complete(
        &self,
        assignment_id: &str,
        entity_id: &str,
        entity_title: &str,
    ) -> Result<Option<assignments::Model>> {
        if entity_id.trim().is_empty() {
            return Err(NumberingError::InvalidInput("entity_id must not be empty".to_string()));
        }

        let linked = self
            .assignments
            .link(assignment_id, entity_id, entity_title)
            .await
            .map_err(|e| {
                error!("Failed to complete assignment {}: {}", assignment_id, e);
                e
            })?;

        let Some(record) = linked else {
            warn!("Assignment {} not found, nothing to complete", assignment_id);
            return Ok(None);
        };

        let title = record.linked_entity_title.as_deref().unwrap_or(entity_title);
        match self
            .counters
            .record_last_entity(&record.scope_key, entity_id, title, Utc::now())
            .await
        {
            Ok(true) => {}
            Ok(false) => debug!("No counter {} to update for assignment {}", record.scope_key, record.id),
            Err(e) => warn!(
                "Assignment {} completed but counter {} last fields not updated: {}",
                record.id, record.scope_key, e
            ),
        }

        info!(
            "Completed assignment {} ({}) -> entity {}",
            record.id, record.display_label, entity_id
        );
        Ok(Some(record))
    }

    /// Propagate a renamed entity onto its assignment records and counters.
    /// Returns the number of assignment records touched.
    pub async fn update_entity_title(&self, entity_id: &str, title: &str) -> Result<u64> {
        if entity_id.trim().is_empty() {
            return Err(NumberingError::InvalidInput("entity_id must not be empty".to_string()));
        }

        let renamed = self.assignments.rename_entity(entity_id, title).await.map_err(|e| {
            error!("Failed to rename entity {} on assignments: {}", entity_id, e);
            e
        })?;
        let counters = self.counters.rename_last_entity(entity_id, title).await.map_err(|e| {
            error!("Failed to rename entity {} on counters: {}", entity_id, e);
            e
        })?;

        debug!(
            "Renamed entity {} on {} assignments and {} counters",
            entity_id, renamed, counters
        );
        Ok(renamed)
    }

    /// Make the next issuance for `scope` return `reset_to`
    pub async fn reset_counter(&self, scope: &Scope, reset_to: i64) -> Result<counters::Model> {
        scope.validate()?;
        self.counters.reset(scope, reset_to).await.map_err(|e| {
            error!("Failed to reset counter {}: {}", scope.key(), e);
            e
        })
    }

    pub async fn counter_status(&self, class_id: &str, subject_id: Option<&str>) -> CounterStatus {
        let key = scope_key(class_id, subject_id);
        match self.counters.find(&key).await {
            Ok(Some(counter)) => counter.into(),
            Ok(None) => CounterStatus::missing(key),
            Err(e) => {
                error!("Failed to read counter {}: {}", key, e);
                CounterStatus::missing(key)
            }
        }
    }

    /// Advisory next number; see [`Suggestion`]
    pub async fn suggest(&self, class_id: &str, subject_id: Option<&str>) -> Suggestion {
        let key = scope_key(class_id, subject_id);

        let current = match self.counters.find(&key).await {
            Ok(counter) => counter.map(|c| c.current_sequence_value).unwrap_or(1),
            Err(e) => {
                error!("Failed to read counter {} for suggestion: {}", key, e);
                return Suggestion::empty(key);
            }
        };

        match self.assignments.issued_values(&key).await {
            Ok(used) => Suggestion::new(key, current, &used),
            Err(e) => {
                error!("Failed to read issued numbers for {}: {}", key, e);
                Suggestion::empty(key)
            }
        }
    }

    pub async fn list_assignments(&self, class_id: &str, subject_id: Option<&str>) -> Vec<assignments::Model> {
        let key = scope_key(class_id, subject_id);
        self.assignments.list(&key).await.unwrap_or_else(|e| {
            error!("Failed to list assignments for {}: {}", key, e);
            Vec::new()
        })
    }

    /// Assignments that were issued but never linked to an entity
    pub async fn pending_assignments(&self, class_id: &str, subject_id: Option<&str>) -> Vec<assignments::Model> {
        let key = scope_key(class_id, subject_id);
        self.assignments.pending(&key).await.unwrap_or_else(|e| {
            error!("Failed to list pending assignments for {}: {}", key, e);
            Vec::new()
        })
    }

    pub async fn list_counters(&self, class_id: &str) -> Vec<counters::Model> {
        self.counters.list_for_class(class_id).await.unwrap_or_else(|e| {
            error!("Failed to list counters for class {}: {}", class_id, e);
            Vec::new()
        })
    }
}
