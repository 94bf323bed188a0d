//! Integration tests for agent-handoff
//!
//! These tests exercise the full workflow from request construction through
//! routing, lifecycle transitions, events and persistence.

use agent_handoff::config::HandoffConfig;
use agent_handoff::handoff::{
    ConcurrentHandoffManager, HandoffEvent, HandoffManager, HandoffRequest, HandoffStatus, Payload,
    ACCEPT_REASON,
};
use agent_handoff::routing::{CapabilityRegistry, Router, SmartRouter};
use agent_handoff::storage::{self, HandoffRepository, HandoffSnapshot, SqliteHandoffStore};
use agent_handoff::HandoffError;
use serde_json::json;
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use tempfile::TempDir;

/// Helper to create a request between two agents
fn request(from: &str, to: &str, task: &str) -> HandoffRequest {
    HandoffRequest::new(from, to, task).unwrap()
}

fn payload(value: serde_json::Value) -> Payload {
    serde_json::from_value(value).unwrap()
}

mod lifecycle_tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut manager = HandoffManager::new();
        let id = manager
            .create(request("agent-a", "agent-b", "Analyze the dataset"))
            .record_id;

        let accepted = manager.accept(&id).unwrap();
        assert_eq!(accepted.status, HandoffStatus::Accepted);
        let response = accepted.response.unwrap();
        assert!(response.accepted);
        assert_eq!(response.reason, ACCEPT_REASON);

        manager.start(&id).unwrap();
        let done = manager.complete(&id, payload(json!({"rows": 42}))).unwrap();
        assert_eq!(done.status, HandoffStatus::Completed);
        assert_eq!(done.result, payload(json!({"rows": 42})));
        assert!(done.updated_at >= done.created_at);
    }

    #[test]
    fn test_reject_then_accept_fails() {
        let mut manager = HandoffManager::new();
        let id = manager.create(request("a", "b", "Task")).record_id;

        let rejected = manager.reject(&id, "Too busy").unwrap();
        assert_eq!(rejected.status, HandoffStatus::Rejected);
        assert_eq!(rejected.response.unwrap().reason, "Too busy");

        let err = manager.accept(&id).unwrap_err();
        assert_eq!(err.to_string(), "Cannot accept handoff in state 'rejected'.");
        assert_eq!(manager.get(&id).unwrap().status, HandoffStatus::Rejected);
    }

    #[test]
    fn test_complete_pending_fails_and_leaves_record() {
        let mut manager = HandoffManager::new();
        let record = manager.create(request("a", "b", "Task"));

        let err = manager.complete(&record.record_id, Payload::new()).unwrap_err();
        assert!(err.is_invalid_transition());
        assert_eq!(manager.get(&record.record_id).unwrap(), &record);
    }

    #[test]
    fn test_fail_from_accepted() {
        let mut manager = HandoffManager::new();
        let id = manager.create(request("a", "b", "Task")).record_id;
        manager.accept(&id).unwrap();

        let failed = manager.fail(&id, "Out of memory").unwrap();
        assert_eq!(failed.status, HandoffStatus::Failed);
        let response = failed.response.unwrap();
        assert!(!response.accepted);
        assert_eq!(response.reason, "Out of memory");
    }

    #[test]
    fn test_unknown_id() {
        let mut manager = HandoffManager::new();
        assert!(matches!(manager.accept("ghost"), Err(HandoffError::NotFound(_))));
        assert!(manager.get("ghost").unwrap_err().is_not_found());
    }

    #[test]
    fn test_list_filters_by_status() {
        let mut manager = HandoffManager::new();
        let first = manager.create(request("a", "b", "One")).record_id;
        manager.create(request("a", "b", "Two"));
        manager.accept(&first).unwrap();

        assert_eq!(manager.list(None).len(), 2);
        assert_eq!(manager.list(Some(HandoffStatus::Pending)).len(), 1);
        assert_eq!(manager.list(Some(HandoffStatus::Accepted))[0].record_id, first);
    }
}

mod routing_tests {
    use super::*;

    fn registry() -> CapabilityRegistry {
        let mut registry = CapabilityRegistry::new();
        registry.register("agent-alpha", ["python", "data-analysis"]);
        registry.register("agent-beta", ["java", "reporting"]);
        registry
    }

    #[test]
    fn test_route_then_create() {
        let router = Router::new(registry());
        let req = request("planner", "", "Build the reporting dashboard");
        let preferred = vec!["reporting".to_string()];
        let target = router.route(&req, Some(preferred.as_slice())).unwrap();
        assert_eq!(target, "agent-beta");

        let mut manager = HandoffManager::new();
        let record = manager.create(req.with_target(target));
        assert_eq!(record.request.to_agent, "agent-beta");
    }

    #[test]
    fn test_route_falls_back_to_first_non_source() {
        let router = Router::new(registry());
        let req = request("agent-alpha", "", "tiny");
        let preferred = vec!["quantum".to_string()];
        assert_eq!(
            router.route(&req, Some(preferred.as_slice())).as_deref(),
            Some("agent-beta")
        );
    }

    #[tokio::test]
    async fn test_smart_router_uses_config_registry() {
        let config = HandoffConfig::new()
            .with_agent("agent-alpha", ["python", "data-analysis"])
            .with_agent("agent-beta", ["java"]);
        let router = SmartRouter::new(config.registry()).with_timeout(config.decision_timeout());

        let decision = router
            .route(&request("agent-beta", "", "Need python"), Some(["python".to_string()].as_slice()))
            .await
            .unwrap();
        assert_eq!(decision.target_agent, "agent-alpha");
        assert!(decision.validate().is_ok());
    }

    #[tokio::test]
    async fn test_smart_router_never_hands_back_to_sender() {
        agent_handoff::logging::init_test();
        let config = HandoffConfig::new()
            .with_agent("agent-alpha", ["python", "write"])
            .with_agent("agent-beta", ["java"]);
        let router = SmartRouter::new(config.registry());

        let req = request("agent-alpha", "", "write python");
        let decision = router.route(&req, None).await.unwrap();
        assert_eq!(decision.target_agent, "agent-beta");

        let empty: Vec<String> = Vec::new();
        let decision = router.route(&req, Some(empty.as_slice())).await.unwrap();
        assert_ne!(decision.target_agent, req.from_agent);
    }
}

mod serialization_tests {
    use super::*;

    fn populated() -> HandoffManager {
        let mut manager = HandoffManager::new();
        let deadline = chrono::DateTime::parse_from_rfc3339("2030-01-01T12:00:00.123456Z")
            .unwrap()
            .with_timezone(&chrono::Utc);
        let a = manager
            .create(
                request("a", "b", "Nested payload")
                    .with_priority(9)
                    .unwrap()
                    .with_context(payload(json!({"list": [1, 2.5, null, {"k": true}]})))
                    .with_deadline(deadline),
            )
            .record_id;
        let b = manager.create(request("a", "", "Unassigned")).record_id;
        manager.accept(&a).unwrap();
        manager.complete(&a, payload(json!({"rows": 42}))).unwrap();
        manager.reject(&b, "No capacity").unwrap();
        manager.create(request("c", "d", "Still pending"));
        manager
    }

    #[test]
    fn test_export_import_round_trip() {
        let source = populated();
        let values = storage::encode_all(&source.export()).unwrap();

        let mut restored = HandoffManager::new();
        restored.import(storage::decode_all(values).unwrap()).unwrap();

        assert_eq!(restored.export(), source.export());
        assert_eq!(restored.store(), source.store());
    }

    #[test]
    fn test_import_upserts_in_full() {
        let source = populated();
        let mut target = populated();
        let snapshots = source.export();
        let existing = target.export().len();

        target.import(snapshots.clone()).unwrap();
        target.import(snapshots).unwrap();
        assert_eq!(target.export().len(), existing + source.export().len());
    }

    #[test]
    fn test_malformed_import_changes_nothing() {
        let mut manager = populated();
        let before = manager.export();

        let mut values = storage::encode_all(&before).unwrap();
        values.push(json!({"record_id": "broken"}));
        let err = storage::decode_all(values).unwrap_err();
        assert!(matches!(err, HandoffError::Serialization(_)));

        let mut bad = before.clone();
        bad[0].record.request.from_agent = String::new();
        let changed = HandoffSnapshot::new(bad[0].record.clone());
        assert!(manager.import(vec![before[1].clone(), changed]).is_err());
        assert_eq!(manager.export(), before);
    }

    #[test]
    fn test_invalid_priority_rejected_on_import() {
        let mut value = storage::encode_all(&populated().export()).unwrap().remove(0);
        value["request"]["priority"] = json!(11);
        assert!(HandoffSnapshot::from_value(value).is_err());
    }
}

mod repository_tests {
    use super::*;

    #[test]
    fn test_file_backends_survive_reopen() {
        let dir = TempDir::new().unwrap();
        for name in ["handoffs.json", "handoffs.jsonl", "handoffs.sqlite"] {
            let path = dir.path().join(name);
            let mut manager = HandoffManager::new();
            let id = manager.create(request("a", "b", "Persisted")).record_id;
            manager.accept(&id).unwrap();

            {
                let mut repo = storage::open_repository(&path).unwrap();
                manager.save_to(repo.as_mut()).unwrap();
            }

            let repo = storage::open_repository(&path).unwrap();
            let mut reloaded = HandoffManager::new();
            reloaded.load_from(repo.as_ref()).unwrap();
            assert_eq!(reloaded.get(&id).unwrap().status, HandoffStatus::Accepted, "{}", name);

            reloaded.start(&id).unwrap();
        }
    }

    #[test]
    fn test_sqlite_history_and_metrics() {
        let mut manager = HandoffManager::new();
        let done = manager.create(request("planner", "coder", "Write code")).record_id;
        let failed = manager.create(request("planner", "tester", "Run tests")).record_id;
        manager.accept(&done).unwrap();
        manager.complete(&done, Payload::new()).unwrap();
        manager.accept(&failed).unwrap();
        manager.start(&failed).unwrap();
        manager.fail(&failed, "Flaky").unwrap();

        let mut store = SqliteHandoffStore::in_memory().unwrap();
        manager.save_to(&mut store).unwrap();

        let history = store.history(Some("planner"), None, 1).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].record_id(), failed);

        let metrics = store.metrics().unwrap();
        assert_eq!(metrics.total, 2);
        assert_eq!(metrics.completion_rate, Some(0.5));
    }
}

mod config_tests {
    use super::*;

    #[test]
    fn test_config_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        HandoffConfig::new()
            .with_store_path(dir.path().join("h.db"))
            .with_agent("coder", ["rust", "testing"])
            .save(&path)
            .unwrap();

        let config = HandoffConfig::load_or_default(Some(path.as_path())).unwrap();
        assert!(config.registry().contains("coder"));
        assert_eq!(config.store.path, dir.path().join("h.db"));
    }

    #[test]
    fn test_configured_defaults_take_effect() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "events:\n  channel_capacity: 8\ndefaults:\n  priority: 9\n").unwrap();

        let config = HandoffConfig::load(&path).unwrap();
        let manager = ConcurrentHandoffManager::from_config(&config);
        assert_eq!(manager.event_capacity(), 8);

        let req = request("a", "b", "Configured priority")
            .with_priority(config.default_priority().value())
            .unwrap();
        assert_eq!(manager.create(req).request.priority.value(), 9);
    }

    #[test]
    fn test_invalid_yaml_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "events:\n  channel_capacity: 0\n").unwrap();
        assert!(matches!(HandoffConfig::load(&path), Err(HandoffError::Config(_))));
    }
}

mod concurrency_tests {
    use super::*;

    #[test]
    fn test_concurrent_accepts_exactly_one_wins() {
        for _ in 0..20 {
            let manager = Arc::new(ConcurrentHandoffManager::new());
            let id = manager.create(request("a", "b", "Race")).record_id;
            let threads = 8;
            let barrier = Arc::new(Barrier::new(threads));

            let handles: Vec<_> = (0..threads)
                .map(|_| {
                    let manager = Arc::clone(&manager);
                    let barrier = Arc::clone(&barrier);
                    let id = id.clone();
                    thread::spawn(move || {
                        barrier.wait();
                        manager.accept(&id).is_ok()
                    })
                })
                .collect();

            let wins = handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|ok| *ok)
                .count();
            assert_eq!(wins, 1);
            assert_eq!(manager.get(&id).unwrap().status, HandoffStatus::Accepted);
        }
    }

    #[test]
    fn test_listener_sees_every_committed_transition() {
        let manager = ConcurrentHandoffManager::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        manager.add_listener(move |event: &HandoffEvent| -> anyhow::Result<()> {
            sink.lock().unwrap().push(event.name());
            Ok(())
        });

        let id = manager.create(request("a", "b", "Observed")).record_id;
        manager.accept(&id).unwrap();
        assert!(manager.reject(&id, "late").is_err());
        manager.start(&id).unwrap();
        manager.complete(&id, Payload::new()).unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                "handoff.created",
                "handoff.accepted",
                "handoff.started",
                "handoff.completed"
            ]
        );
    }

    #[tokio::test]
    async fn test_broadcast_subscriber_receives_events() {
        let manager = ConcurrentHandoffManager::new();
        let mut rx = manager.subscribe();

        let id = manager.create(request("a", "b", "Broadcast")).record_id;
        manager.reject(&id, "Busy").unwrap();

        let created = rx.recv().await.unwrap();
        assert_eq!(created.name(), "handoff.created");
        let rejected = rx.recv().await.unwrap();
        assert_eq!(rejected.name(), "handoff.rejected");
        assert_eq!(rejected.data["reason"], json!("Busy"));
        assert_eq!(rejected.record_id, id);
    }

    #[test]
    fn test_concurrent_export_matches_sequential_import() {
        let manager = ConcurrentHandoffManager::new();
        let id = manager.create(request("a", "b", "Shared")).record_id;
        manager.accept(&id).unwrap();

        let mut sequential = HandoffManager::new();
        sequential.import(manager.export()).unwrap();
        assert_eq!(sequential.export(), manager.export());
    }
}
