use numbering::entity::assignments;
use numbering::{NumberStyle, NumberingConfig, NumberingError, NumberingService, Scope};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use std::collections::HashSet;
use std::sync::Arc;

async fn service_with(config: NumberingConfig) -> NumberingService {
    NumberingService::connect(&config)
        .await
        .expect("in-memory database should open")
}

async fn service() -> NumberingService {
    service_with(NumberingConfig::in_memory()).await
}

fn class_scope() -> Scope {
    Scope::new("c1", "Grade 7 Blue").with_teacher("t1", "Ms. Okafor")
}

fn subject_scope(subject_id: &str, subject_name: &str) -> Scope {
    class_scope().with_subject(subject_id, subject_name)
}

#[tokio::test]
async fn test_sequential_issuance() {
    let service = service().await;
    let scope = class_scope();

    let mut values = Vec::new();
    for _ in 0..3 {
        values.push(service.issue(&scope).await.unwrap().issued_value);
    }
    assert_eq!(values, vec![1, 2, 3]);

    let status = service.counter_status("c1", None).await;
    assert!(status.exists);
    assert_eq!(status.current_sequence_value, 4);
    assert_eq!(status.total_issued, 3);
}

#[tokio::test]
async fn test_issue_records_assignment() {
    let service = service().await;

    let issued = service.issue(&subject_scope("s1", "Mathematics")).await.unwrap();
    assert_eq!(issued.scope_key, "c1_s1");
    assert_eq!(issued.display_label, "Mathematics Test #1");

    let records = service.list_assignments("c1", Some("s1")).await;
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(Some(record.id.clone()), issued.assignment_id);
    assert_eq!(record.issued_value, 1);
    assert_eq!(record.class_name, "Grade 7 Blue");
    assert_eq!(record.teacher_name, "Ms. Okafor");
    assert!(record.is_pending());
}

#[tokio::test]
async fn test_subject_scopes_are_independent() {
    let service = service().await;
    let physics = subject_scope("s1", "Physics");
    let chemistry = subject_scope("s2", "Chemistry");

    assert_eq!(service.issue(&physics).await.unwrap().issued_value, 1);
    assert_eq!(service.issue(&physics).await.unwrap().issued_value, 2);
    assert_eq!(service.issue(&chemistry).await.unwrap().issued_value, 1);
    assert_eq!(service.issue(&class_scope()).await.unwrap().issued_value, 1);
    assert_eq!(service.issue(&physics).await.unwrap().issued_value, 3);

    let keys: Vec<String> = service
        .list_counters("c1")
        .await
        .into_iter()
        .map(|c| c.scope_key)
        .collect();
    assert_eq!(keys, vec!["c1", "c1_s1", "c1_s2"]);
}

#[tokio::test]
async fn test_empty_subject_uses_class_counter() {
    let service = service().await;
    let mut scope = class_scope();
    scope.subject_id = Some(String::new());

    service.issue(&class_scope()).await.unwrap();
    let issued = service.issue(&scope).await.unwrap();
    assert_eq!(issued.scope_key, "c1");
    assert_eq!(issued.issued_value, 2);
}

#[tokio::test]
async fn test_concurrent_issuance_has_no_duplicates() {
    let service = Arc::new(service().await);
    let scope = subject_scope("s1", "History");

    let handles: Vec<_> = (0..20)
        .map(|_| {
            let service = service.clone();
            let scope = scope.clone();
            tokio::spawn(async move { service.issue(&scope).await })
        })
        .collect();

    let mut values = Vec::new();
    for handle in handles {
        values.push(handle.await.unwrap().unwrap().issued_value);
    }
    values.sort_unstable();
    assert_eq!(values, (1..=20).collect::<Vec<i64>>());

    let status = service.counter_status("c1", Some("s1")).await;
    assert_eq!(status.current_sequence_value, 21);
    assert_eq!(status.total_issued, 20);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_issuance_on_shared_file() {
    let path = std::env::temp_dir().join(format!("numbering-{}.db", uuid::Uuid::new_v4()));
    let mut config = NumberingConfig::new(format!("sqlite://{}?mode=rwc", path.display()));
    config.max_connections = 8;
    let service = Arc::new(service_with(config).await);
    let scope = subject_scope("s1", "Geography");

    let handles: Vec<_> = (0..40)
        .map(|_| {
            let service = service.clone();
            let scope = scope.clone();
            tokio::spawn(async move { service.issue(&scope).await })
        })
        .collect();

    let mut values = Vec::new();
    let mut failures = Vec::new();
    for handle in handles {
        match handle.await.unwrap() {
            Ok(issued) => values.push(issued.issued_value),
            Err(e) => failures.push(e),
        }
    }

    // Whatever fails must fail as a database error, never with a number
    for err in &failures {
        assert!(matches!(err, NumberingError::Database(_)), "unexpected error {:?}", err);
    }

    values.sort_unstable();
    let unique: HashSet<i64> = values.iter().copied().collect();
    assert_eq!(unique.len(), values.len());
    assert_eq!(values, (1..=values.len() as i64).collect::<Vec<i64>>());

    let status = service.counter_status("c1", Some("s1")).await;
    assert_eq!(status.total_issued, values.len() as i64);
    assert_eq!(status.current_sequence_value, values.len() as i64 + 1);

    // Writers queue on the database lock instead of exhausting retries
    assert!(failures.is_empty(), "{} issuances failed", failures.len());

    drop(service);
    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn test_reset_counter() {
    let service = service().await;
    let scope = class_scope();

    // Reset before anything was issued creates the counter
    let counter = service.reset_counter(&scope, 5).await.unwrap();
    assert_eq!(counter.current_sequence_value, 5);
    assert_eq!(counter.total_issued, 0);

    assert_eq!(service.issue(&scope).await.unwrap().issued_value, 5);
    assert_eq!(service.issue(&scope).await.unwrap().issued_value, 6);

    let counter = service.reset_counter(&scope, 2).await.unwrap();
    assert_eq!(counter.total_issued, 2);
    assert_eq!(service.issue(&scope).await.unwrap().issued_value, 2);
}

#[tokio::test]
async fn test_reset_rejects_non_positive() {
    let service = service().await;

    let err = service.reset_counter(&class_scope(), 0).await.unwrap_err();
    assert!(matches!(err, NumberingError::InvalidInput(_)));
    assert!(!service.counter_status("c1", None).await.exists);
}

#[tokio::test]
async fn test_empty_class_is_rejected() {
    let service = service().await;

    let err = service.issue(&Scope::new("", "nobody")).await.unwrap_err();
    assert!(matches!(err, NumberingError::InvalidInput(_)));
}

#[tokio::test]
async fn test_completion_links_entity() {
    let service = service().await;
    let issued = service.issue(&subject_scope("s1", "Biology")).await.unwrap();
    let assignment_id = issued.assignment_id.unwrap();

    let record = service
        .complete(&assignment_id, "test-42", "Cells and tissues")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.linked_entity_id.as_deref(), Some("test-42"));
    assert_eq!(record.linked_entity_title.as_deref(), Some("Cells and tissues"));
    assert_eq!(record.display_label, "Biology Test #1");

    let status = service.counter_status("c1", Some("s1")).await;
    assert_eq!(status.last_entity_id.as_deref(), Some("test-42"));
    assert_eq!(status.last_entity_title.as_deref(), Some("Cells and tissues"));
    assert!(status.last_issued_at.is_some());
}

#[tokio::test]
async fn test_completion_is_idempotent() {
    let service = service().await;
    let issued = service.issue(&class_scope()).await.unwrap();
    let assignment_id = issued.assignment_id.unwrap();

    let first = service
        .complete(&assignment_id, "test-1", "Fractions quiz")
        .await
        .unwrap();
    let second = service
        .complete(&assignment_id, "test-1", "Fractions quiz")
        .await
        .unwrap();
    assert_eq!(first, second);

    let records = service.list_assignments("c1", None).await;
    assert_eq!(records.len(), 1);
    assert_eq!(Some(&records[0]), first.as_ref());
}

#[tokio::test]
async fn test_completion_cannot_relink() {
    let service = service().await;
    let issued = service.issue(&class_scope()).await.unwrap();
    let assignment_id = issued.assignment_id.unwrap();

    service
        .complete(&assignment_id, "test-1", "Fractions quiz")
        .await
        .unwrap();

    let err = service
        .complete(&assignment_id, "test-2", "Decimals quiz")
        .await
        .unwrap_err();
    assert!(matches!(err, NumberingError::InvalidInput(_)));

    // Same entity with another title keeps the stored record
    let record = service
        .complete(&assignment_id, "test-1", "Renamed elsewhere")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.linked_entity_id.as_deref(), Some("test-1"));
    assert_eq!(record.linked_entity_title.as_deref(), Some("Fractions quiz"));

    let status = service.counter_status("c1", None).await;
    assert_eq!(status.last_entity_id.as_deref(), Some("test-1"));
    assert_eq!(status.last_entity_title.as_deref(), Some("Fractions quiz"));
}

#[tokio::test]
async fn test_roman_labels_past_the_limit() {
    let mut config = NumberingConfig::in_memory();
    config.label.style = NumberStyle::Roman;
    let service = service_with(config).await;
    let scope = class_scope();

    service.reset_counter(&scope, 3999).await.unwrap();
    let issued = service.issue(&scope).await.unwrap();
    assert_eq!(issued.display_label, "Test #MMMCMXCIX");

    // The number is still issued, with a decimal label and no record
    let issued = service.issue(&scope).await.unwrap();
    assert_eq!(issued.issued_value, 4000);
    assert_eq!(issued.display_label, "Test #4000");
    assert!(issued.assignment_id.is_none());
    assert_eq!(service.counter_status("c1", None).await.current_sequence_value, 4001);
}

#[tokio::test]
async fn test_completion_of_unknown_assignment() {
    let service = service().await;

    let result = service.complete("missing", "test-1", "Nothing").await.unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn test_pending_assignments() {
    let service = service().await;
    let scope = class_scope();

    let first = service.issue(&scope).await.unwrap();
    service.issue(&scope).await.unwrap();
    service
        .complete(first.assignment_id.as_deref().unwrap(), "test-1", "Algebra")
        .await
        .unwrap();

    let pending = service.pending_assignments("c1", None).await;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].issued_value, 2);
}

#[tokio::test]
async fn test_update_entity_title() {
    let service = service().await;
    let issued = service.issue(&class_scope()).await.unwrap();
    service
        .complete(issued.assignment_id.as_deref().unwrap(), "test-7", "Draft")
        .await
        .unwrap();

    let renamed = service.update_entity_title("test-7", "Final exam").await.unwrap();
    assert_eq!(renamed, 1);

    let records = service.list_assignments("c1", None).await;
    assert_eq!(records[0].linked_entity_title.as_deref(), Some("Final exam"));
    // The label is fixed at issuance
    assert_eq!(records[0].display_label, "Test #1");

    let status = service.counter_status("c1", None).await;
    assert_eq!(status.last_entity_title.as_deref(), Some("Final exam"));

    assert_eq!(service.update_entity_title("unknown", "x").await.unwrap(), 0);
}

#[tokio::test]
async fn test_suggestion_fills_gaps() {
    let service = service().await;
    let scope = class_scope();
    for _ in 0..4 {
        service.issue(&scope).await.unwrap();
    }

    // Drop the record for #3 to open a gap in the log
    assignments::Entity::delete_many()
        .filter(assignments::Column::ScopeKey.eq("c1"))
        .filter(assignments::Column::IssuedValue.eq(3))
        .exec(service.database().connection())
        .await
        .unwrap();

    let suggestion = service.suggest("c1", None).await;
    assert_eq!(suggestion.next_available, 3);
    assert_eq!(suggestion.current_sequence_value, 5);
    assert_eq!(suggestion.suggested, 5);

    service.reset_counter(&scope, 1).await.unwrap();
    let suggestion = service.suggest("c1", None).await;
    assert_eq!(suggestion.suggested, 3);

    // Advisory only: issuance still follows the counter
    assert_eq!(service.issue(&scope).await.unwrap().issued_value, 1);
}

#[tokio::test]
async fn test_suggestion_for_unknown_scope() {
    let service = service().await;

    let suggestion = service.suggest("nowhere", Some("s9")).await;
    assert_eq!(suggestion.scope_key, "nowhere_s9");
    assert_eq!(suggestion.suggested, 1);

    let status = service.counter_status("nowhere", None).await;
    assert!(!status.exists);
    assert_eq!(status.current_sequence_value, 1);
    assert_eq!(status.total_issued, 0);
}

#[tokio::test]
async fn test_record_in_transaction() {
    let mut config = NumberingConfig::in_memory();
    config.record_in_transaction = true;
    config.label.style = NumberStyle::Roman;
    let service = service_with(config).await;
    let scope = subject_scope("s1", "Latin");

    service.issue(&scope).await.unwrap();
    let issued = service.issue(&scope).await.unwrap();
    assert_eq!(issued.display_label, "Latin Test #II");

    let labels: Vec<String> = service
        .list_assignments("c1", Some("s1"))
        .await
        .into_iter()
        .map(|r| r.display_label)
        .collect();
    assert_eq!(labels, vec!["Latin Test #I", "Latin Test #II"]);
}

#[tokio::test]
async fn test_padded_labels() {
    let mut config = NumberingConfig::in_memory();
    config.label.style = NumberStyle::Padded;
    config.label.suffix = Some("(Term 1)".to_string());
    let service = service_with(config).await;

    let issued = service.issue(&class_scope()).await.unwrap();
    assert_eq!(issued.display_label, "Test #001 (Term 1)");
}

#[tokio::test]
async fn test_lost_audit_write_keeps_number() {
    let service = service().await;
    let scope = class_scope();
    service.issue(&scope).await.unwrap();

    service
        .database()
        .connection()
        .execute_unprepared("DROP TABLE test_number_assignments")
        .await
        .unwrap();

    // The counter still advances; only the audit record is missing
    let issued = service.issue(&scope).await.unwrap();
    assert_eq!(issued.issued_value, 2);
    assert_eq!(issued.display_label, "Test #2");
    assert!(issued.assignment_id.is_none());
    assert_eq!(service.counter_status("c1", None).await.current_sequence_value, 3);

    // Read paths degrade instead of failing
    assert!(service.list_assignments("c1", None).await.is_empty());
    assert_eq!(service.suggest("c1", None).await.suggested, 1);
}

#[tokio::test]
async fn test_schema_creation_is_idempotent() {
    let service = service().await;
    service.issue(&class_scope()).await.unwrap();

    service.database().ensure_schema().await.unwrap();

    let values: HashSet<i64> = service
        .list_assignments("c1", None)
        .await
        .into_iter()
        .map(|r| r.issued_value)
        .collect();
    assert_eq!(values, HashSet::from([1]));
}
