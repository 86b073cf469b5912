//! test_number_assignments entity
//! Audit trail of every issued number, linked to its test once it exists

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "test_number_assignments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String, // UUID v4
    #[sea_orm(indexed)]
    pub scope_key: String,
    pub class_id: String,
    pub class_name: String,
    pub subject_id: Option<String>,
    pub subject_name: Option<String>,
    pub teacher_id: String,
    pub teacher_name: String,

    pub issued_value: i64,
    pub display_label: String, // Rendered once at issuance

    // NULL while pending
    pub linked_entity_id: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub linked_entity_title: Option<String>,

    pub issued_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// True until the completion step has linked a real entity
    pub fn is_pending(&self) -> bool {
        self.linked_entity_id.is_none()
    }
}
