//! Counter scopes: a class, or a class narrowed to one subject

use serde::{Deserialize, Serialize};

use crate::error::{NumberingError, Result};

/// Build the counter key for a class and optional subject.
///
/// An empty subject id is treated the same as no subject.
pub fn scope_key(class_id: &str, subject_id: Option<&str>) -> String {
    match subject_id.filter(|s| !s.is_empty()) {
        Some(subject_id) => format!("{}_{}", class_id, subject_id),
        None => class_id.to_string(),
    }
}

/// A numbering scope together with the display metadata copied onto
/// counters and assignment records when a number is issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    pub class_id: String,
    pub class_name: String,
    pub subject_id: Option<String>,
    pub subject_name: Option<String>,
    pub teacher_id: String,
    pub teacher_name: String,
}

impl Scope {
    pub fn new(class_id: impl Into<String>, class_name: impl Into<String>) -> Self {
        Self {
            class_id: class_id.into(),
            class_name: class_name.into(),
            subject_id: None,
            subject_name: None,
            teacher_id: String::new(),
            teacher_name: String::new(),
        }
    }

    pub fn with_subject(mut self, subject_id: impl Into<String>, subject_name: impl Into<String>) -> Self {
        self.subject_id = Some(subject_id.into());
        self.subject_name = Some(subject_name.into());
        self
    }

    pub fn with_teacher(mut self, teacher_id: impl Into<String>, teacher_name: impl Into<String>) -> Self {
        self.teacher_id = teacher_id.into();
        self.teacher_name = teacher_name.into();
        self
    }

    pub fn key(&self) -> String {
        scope_key(&self.class_id, self.subject_id.as_deref())
    }

    /// Subject id with empty strings folded to `None`
    pub fn subject(&self) -> Option<&str> {
        self.subject_id.as_deref().filter(|s| !s.is_empty())
    }

    pub fn validate(&self) -> Result<()> {
        if self.class_id.trim().is_empty() {
            return Err(NumberingError::InvalidInput("class_id must not be empty".to_string()));
        }
        Ok(())
    }
}
