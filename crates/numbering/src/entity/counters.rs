//! class_test_counters entity
//! Counter table for generating gapless test numbers per class/subject scope

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "class_test_counters")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub scope_key: String, // class_id or class_id_subject_id
    #[sea_orm(indexed)]
    pub class_id: String,
    pub class_name: String,
    pub subject_id: Option<String>,
    pub subject_name: Option<String>,
    pub teacher_id: String,
    pub teacher_name: String,

    /// Next value to be issued, never below 1
    pub current_sequence_value: i64,
    pub total_issued: i64,

    // Denormalized from the most recently completed assignment, informational only
    pub last_entity_id: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub last_entity_title: Option<String>,
    pub last_issued_at: Option<DateTimeUtc>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
