use llm_eval_core::domain::*;
use pretty_assertions::assert_eq;
use serde_json::json;
use uuid::Uuid;

// ===== ID Tests =====

#[test]
fn test_ids_serialize_transparently() {
    let uuid = Uuid::new_v4();
    let id = DatasetId::from_uuid(uuid);

    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, format!("\"{}\"", uuid));

    let parsed: DatasetId = json.trim_matches('"').parse().unwrap();
    assert_eq!(parsed, id);

    let back: Uuid = id.into();
    assert_eq!(back, uuid);
}

#[test]
fn test_id_parse_rejects_garbage() {
    assert!("not-a-uuid".parse::<ExperimentId>().is_err());
}

// ===== Dataset Tests =====

#[test]
fn test_dataset_from_backend_payload() {
    let payload = json!({
        "id": Uuid::new_v4(),
        "name": "support",
        "project_id": Uuid::new_v4(),
        "created_at": "2024-05-01T10:00:00Z",
        "conversations": [
            {
                "id": Uuid::new_v4(),
                "messages": [
                    {"role": "user", "content": "Where is my order?"},
                    {"role": "assistant", "content": "Let me check."}
                ]
            }
        ]
    });

    let dataset: Dataset = serde_json::from_value(payload).unwrap();
    assert!(dataset.is_generated());
    assert_eq!(dataset.conversations[0].messages[1].role, Role::Assistant);
}

#[test]
fn test_dataset_without_conversations_is_pending() {
    let payload = json!({
        "id": Uuid::new_v4(),
        "name": "pending",
        "project_id": Uuid::new_v4(),
        "created_at": "2024-05-01T10:00:00Z"
    });

    let dataset: Dataset = serde_json::from_value(payload).unwrap();
    assert!(!dataset.is_generated());
}

// ===== Experiment Tests =====

#[test]
fn test_experiment_status_is_derived_from_results() {
    let mut payload = json!({
        "id": Uuid::new_v4(),
        "name": "nightly",
        "project_id": Uuid::new_v4(),
        "dataset_id": Uuid::new_v4(),
        "parameter_ids": [Uuid::new_v4()],
        "worker_count": 4,
        "created_at": "2024-05-01T10:00:00Z",
        "results": []
    });

    let running: Experiment = serde_json::from_value(payload.clone()).unwrap();
    assert_eq!(running.status(), ExperimentStatus::Running);

    payload["results"] = json!([
        {"response_time": 1.2, "evaluations": [{"name": "Accuracy", "score": 0.9, "comment": "ok"}]}
    ]);
    let completed: Experiment = serde_json::from_value(payload).unwrap();
    assert_eq!(completed.status(), ExperimentStatus::Completed);

    // Re-deriving never changes the answer
    for _ in 0..3 {
        assert_eq!(completed.status(), ExperimentStatus::Completed);
        assert_eq!(running.status(), ExperimentStatus::Running);
    }
}

#[test]
fn test_experiment_without_results_field_is_running() {
    let payload = json!({
        "id": Uuid::new_v4(),
        "name": "fresh",
        "project_id": Uuid::new_v4(),
        "dataset_id": Uuid::new_v4(),
        "created_at": "2024-05-01T10:00:00Z"
    });

    let experiment: Experiment = serde_json::from_value(payload).unwrap();
    assert_eq!(experiment.status(), ExperimentStatus::Running);
    assert_eq!(experiment.worker_count, 1);
    assert!(experiment.results().is_empty());
}

// ===== Parameter Tests =====

#[test]
fn test_parameter_with_invalid_tolerance_fails_to_parse() {
    let payload = json!({
        "id": Uuid::new_v4(),
        "name": "Accuracy",
        "description": "",
        "tolerance": 1.5,
        "project_id": Uuid::new_v4(),
        "created_at": "2024-05-01T10:00:00Z"
    });

    assert!(serde_json::from_value::<Parameter>(payload).is_err());
}

#[test]
fn test_project_labrat_roundtrip() {
    let project = Project::new("demo", "key", "https://bot.example.com").with_labrat(LabratConfig {
        endpoint: "https://labrat.example.com".to_string(),
        headers: [("X-Token".to_string(), "t".to_string())].into_iter().collect(),
    });

    let json = serde_json::to_string(&project).unwrap();
    let back: Project = serde_json::from_str(&json).unwrap();
    assert_eq!(back, project);
}
