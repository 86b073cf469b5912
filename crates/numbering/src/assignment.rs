//! Assignment log: the audit record of every issued number

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{entity::*, query::*, ConnectionTrait};
use std::collections::HashSet;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::database::DatabaseManager;
use crate::entity::assignments;
use crate::error::{NumberingError, Result};
use crate::format::DisplayFormat;
use crate::scope::Scope;

pub struct AssignmentLog {
    db: DatabaseManager,
}

impl AssignmentLog {
    pub fn new(db: DatabaseManager) -> Self {
        Self { db }
    }

    /// Insert a pending record for `issued_value` on any connection or
    /// transaction. The label is rendered here, once.
    pub async fn insert<C>(conn: &C, scope: &Scope, issued_value: i64, format: &DisplayFormat) -> Result<assignments::Model>
    where
        C: ConnectionTrait,
    {
        let display_label = format
            .clone()
            .with_subject(scope.subject_name.clone())
            .label(issued_value)?;

        let record = assignments::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            scope_key: Set(scope.key()),
            class_id: Set(scope.class_id.clone()),
            class_name: Set(scope.class_name.clone()),
            subject_id: Set(scope.subject().map(str::to_string)),
            subject_name: Set(scope.subject_name.clone()),
            teacher_id: Set(scope.teacher_id.clone()),
            teacher_name: Set(scope.teacher_name.clone()),
            issued_value: Set(issued_value),
            display_label: Set(display_label),
            linked_entity_id: Set(None),
            linked_entity_title: Set(None),
            issued_at: Set(Utc::now()),
        };

        let record = record.insert(conn).await?;
        debug!("Recorded assignment {} ({})", record.id, record.display_label);
        Ok(record)
    }

    pub async fn record(&self, scope: &Scope, issued_value: i64, format: &DisplayFormat) -> Result<assignments::Model> {
        Self::insert(self.db.connection(), scope, issued_value, format).await
    }

    pub async fn find(&self, id: &str) -> Result<Option<assignments::Model>> {
        Ok(assignments::Entity::find_by_id(id.to_string())
            .one(self.db.connection())
            .await?)
    }

    /// Attach the created entity to a record. Returns `None` for unknown ids.
    ///
    /// A record is linked once. Linking again with the same entity returns the
    /// stored record unchanged; titles change through `rename_entity`. Linking
    /// to a different entity is refused with `InvalidInput`.
    pub async fn link(&self, id: &str, entity_id: &str, entity_title: &str) -> Result<Option<assignments::Model>> {
        let Some(record) = self.find(id).await? else {
            return Ok(None);
        };

        match record.linked_entity_id.as_deref() {
            Some(linked) if linked == entity_id => return Ok(Some(record)),
            Some(linked) => {
                warn!(
                    "Assignment {} is already linked to entity {}, refusing to link {}",
                    id, linked, entity_id
                );
                return Err(NumberingError::InvalidInput(format!(
                    "assignment {} is already linked to entity {}",
                    id, linked
                )));
            }
            None => {}
        }

        let mut active: assignments::ActiveModel = record.into();
        active.linked_entity_id = Set(Some(entity_id.to_string()));
        active.linked_entity_title = Set(Some(entity_title.to_string()));
        Ok(Some(active.update(self.db.connection()).await?))
    }

    /// Rename the linked title on every record pointing at `entity_id`
    pub async fn rename_entity(&self, entity_id: &str, title: &str) -> Result<u64> {
        let result = assignments::Entity::update_many()
            .col_expr(assignments::Column::LinkedEntityTitle, Expr::value(title.to_string()))
            .filter(assignments::Column::LinkedEntityId.eq(entity_id))
            .exec(self.db.connection())
            .await?;
        Ok(result.rows_affected)
    }

    /// All records of a scope in issue order
    pub async fn list(&self, scope_key: &str) -> Result<Vec<assignments::Model>> {
        Ok(assignments::Entity::find()
            .filter(assignments::Column::ScopeKey.eq(scope_key))
            .order_by_asc(assignments::Column::IssuedValue)
            .order_by_asc(assignments::Column::IssuedAt)
            .all(self.db.connection())
            .await?)
    }

    /// Records that were never linked to an entity
    pub async fn pending(&self, scope_key: &str) -> Result<Vec<assignments::Model>> {
        Ok(assignments::Entity::find()
            .filter(assignments::Column::ScopeKey.eq(scope_key))
            .filter(assignments::Column::LinkedEntityId.is_null())
            .order_by_asc(assignments::Column::IssuedValue)
            .all(self.db.connection())
            .await?)
    }

    pub async fn issued_values(&self, scope_key: &str) -> Result<HashSet<i64>> {
        let values: Vec<i64> = assignments::Entity::find()
            .select_only()
            .column(assignments::Column::IssuedValue)
            .filter(assignments::Column::ScopeKey.eq(scope_key))
            .into_tuple::<i64>()
            .all(self.db.connection())
            .await?;
        Ok(values.into_iter().collect())
    }
}
