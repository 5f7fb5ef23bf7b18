//! Tests for the HTTP engine client against a mock server.

use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use strictly_rpg::{
    CURRENT_SESSION_KEY, DurableStore, EngineErrorKind, GameEngine, HttpEngine, MemoryStore,
    TurnCoordinator, TurnRequest,
};
use tokio::sync::mpsc;

async fn setup() -> (MockServer, HttpEngine) {
    let server = MockServer::start().await;
    // Trailing slash is dropped from the base URL.
    let engine = HttpEngine::new(format!("{}/", server.uri()));
    (server, engine)
}

#[tokio::test]
async fn test_create_session_posts_context() {
    let (server, engine) = setup().await;
    Mock::given(method("POST"))
        .and(path("/api/new_game"))
        .and(body_json(json!({ "initial_context": "a foggy harbor" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "session_id": "abc",
            "message": "Welcome to the harbor",
            "created_at": "2026-10-18T09:30:00.5",
            "initial_scene": "Gulls cry overhead."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let created = engine
        .create_session(Some("a foggy harbor".to_string()))
        .await
        .expect("Create failed");
    assert_eq!(created.session_id, "abc");
    assert_eq!(created.initial_scene.as_deref(), Some("Gulls cry overhead."));
}

#[tokio::test]
async fn test_create_session_omits_absent_context() {
    let (server, engine) = setup().await;
    Mock::given(method("POST"))
        .and(path("/api/new_game"))
        .and(body_json(json!({})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "session_id": "s", "message": "Welcome" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let created = engine.create_session(None).await.expect("Create failed");
    assert_eq!(created.created_at, None);
}

#[tokio::test]
async fn test_unknown_session_maps_404() {
    let (server, engine) = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/state/missing"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({ "detail": "Session missing not found" })),
        )
        .mount(&server)
        .await;

    let err = engine
        .get_session_state("missing")
        .await
        .expect_err("Should fail");
    assert_eq!(err.kind, EngineErrorKind::UnknownSession);
    assert!(err.is_unknown_session());
    assert_eq!(err.message, "Session missing not found");
}

#[tokio::test]
async fn test_server_error_is_transport() {
    let (server, engine) = setup().await;
    Mock::given(method("POST"))
        .and(path("/api/turn"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({ "detail": "Engine not initialized" })),
        )
        .mount(&server)
        .await;

    let err = engine
        .submit_turn(TurnRequest {
            session_id: "s".to_string(),
            player_command: "look".to_string(),
        })
        .await
        .expect_err("Should fail");
    assert_eq!(err.kind, EngineErrorKind::Transport);
    assert_eq!(err.message, "Engine not initialized");
}

#[tokio::test]
async fn test_error_without_detail_uses_status() {
    let (server, engine) = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/progress/s"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&server)
        .await;

    let err = engine.get_progress("s").await.expect_err("Should fail");
    assert_eq!(err.kind, EngineErrorKind::Transport);
    assert!(err.message.contains("503"));
}

#[tokio::test]
async fn test_submit_turn_decodes_full_result() {
    let (server, engine) = setup().await;
    Mock::given(method("POST"))
        .and(path("/api/turn"))
        .and(body_json(json!({ "session_id": "s", "player_command": "ask the smith" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "turn_number": 3,
            "player_command": "ask the smith",
            "narrator_output": {
                "content": "The smith looks up.",
                "citations": ["12", "40"],
                "error": null,
                "metadata": null
            },
            "npc_output": {
                "content": "Aye?",
                "citations": null,
                "error": true,
                "error_message": "tool timeout",
                "metadata": { "npc_name": "Smith" }
            },
            "user_validation": { "approved": true, "reason": null, "suggestions": null },
            "agent_validation": { "reason": "fine" },
            "player_wins": false,
            "player_loses": null,
            "metadata": { "original_agent_response": "" }
        })))
        .mount(&server)
        .await;

    let result = engine
        .submit_turn(TurnRequest {
            session_id: "s".to_string(),
            player_command: "ask the smith".to_string(),
        })
        .await
        .expect("Submit failed");

    assert_eq!(result.turn_number, 3);
    let narrator = result.narrator_output.as_ref().expect("No narrator");
    assert_eq!(narrator.citations, ["12", "40"]);
    assert_eq!(narrator.error, None);

    let npc = result.npc_output.as_ref().expect("No npc");
    assert_eq!(npc.npc_name(), Some("Smith"));
    assert_eq!(npc.error_text(), Some("tool timeout"));
    assert!(npc.citations.is_empty());

    assert!(!result.player_loses);
    assert!(result.agent_validation.as_ref().is_some_and(|v| v.approved));
    assert_eq!(result.metadata_str("original_agent_response"), None);
}

#[tokio::test]
async fn test_progress_accepts_phase_alias() {
    let (server, engine) = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/progress/s"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "progress": 0.4,
            "phase": "retrieval",
            "current_agent": "narrator"
        })))
        .mount(&server)
        .await;

    let snapshot = engine.get_progress("s").await.expect("Progress failed");
    assert_eq!(snapshot.percent(), 40);
    assert_eq!(snapshot.status_line(), "retrieval - narrator");
    assert_eq!(
        strictly_rpg::render_progress(&snapshot),
        "[ 40%] retrieval - narrator"
    );
}

#[tokio::test]
async fn test_delete_session() {
    let (server, engine) = setup().await;
    Mock::given(method("DELETE"))
        .and(path("/api/session/s"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "Session s deleted successfully",
            "session_id": "s"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let ack = engine.delete_session("s").await.expect("Delete failed");
    assert_eq!(ack.session_id.as_deref(), Some("s"));
}

#[tokio::test]
async fn test_invalid_body_is_transport() {
    let (server, engine) = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/state/s"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let err = engine.get_session_state("s").await.expect_err("Should fail");
    assert_eq!(err.kind, EngineErrorKind::Transport);
    assert!(err.message.starts_with("Invalid engine response"));
}

#[tokio::test]
async fn test_connection_refused_is_transport() {
    let engine = HttpEngine::new("http://127.0.0.1:9");
    let err = engine.get_progress("s").await.expect_err("Should fail");
    assert_eq!(err.kind, EngineErrorKind::Transport);
}

#[tokio::test]
async fn test_session_id_is_one_encoded_path_segment() {
    let (server, engine) = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/progress/a%2Fb%3Fc%23d"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "progress": 0.5 })))
        .expect(1)
        .mount(&server)
        .await;

    let snapshot = engine.get_progress("a/b?c#d").await.expect("Progress failed");
    assert_eq!(snapshot.percent(), 50);
}

#[tokio::test]
async fn test_base_url_path_prefix_is_kept() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/rpg/api/session/s"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "ok" })))
        .expect(1)
        .mount(&server)
        .await;

    let engine = HttpEngine::new(format!("{}/rpg", server.uri()));
    engine.delete_session("s").await.expect("Delete failed");
}

#[tokio::test]
async fn test_invalid_base_url_is_transport() {
    let engine = HttpEngine::new("not a url");
    let err = engine.get_progress("s").await.expect_err("Should fail");
    assert_eq!(err.kind, EngineErrorKind::Transport);
    assert!(err.message.starts_with("Invalid engine URL"));
}

/// Coordinator over the HTTP engine, plus the store it persists into.
fn coordinator_for(engine: HttpEngine) -> (TurnCoordinator, MemoryStore) {
    let store = MemoryStore::new();
    let (events_tx, _events_rx) = mpsc::unbounded_channel();
    let (progress_tx, _progress_rx) = mpsc::unbounded_channel();
    let coordinator =
        TurnCoordinator::new(Arc::new(engine), Arc::new(store.clone()), events_tx, progress_tx);
    (coordinator, store)
}

fn state_body(session_id: &str) -> serde_json::Value {
    json!({
        "session_id": session_id,
        "turn_count": 2,
        "created_at": "2026-10-18T08:00:00Z"
    })
}

#[tokio::test]
async fn test_load_with_fragment_in_id_does_not_install_it() {
    let (server, engine) = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/state/abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(state_body("abc")))
        .expect(0)
        .mount(&server)
        .await;

    let (coordinator, store) = coordinator_for(engine);
    let err = coordinator
        .load_session("abc#junk")
        .await
        .expect_err("Should not resolve to abc");
    assert!(err.is_unknown_session());
    assert!(coordinator.current_session().is_none());
    assert_eq!(store.get(CURRENT_SESSION_KEY).expect("Get failed"), None);
}

#[tokio::test]
async fn test_load_rejects_state_for_another_session() {
    let (server, engine) = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/state/abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(state_body("xyz")))
        .mount(&server)
        .await;

    let (coordinator, store) = coordinator_for(engine);
    let err = coordinator.load_session("abc").await.expect_err("Should fail");
    assert!(err.is_unknown_session());
    assert!(coordinator.current_session().is_none());
    assert_eq!(store.get(CURRENT_SESSION_KEY).expect("Get failed"), None);
}

#[tokio::test]
async fn test_load_matching_session_is_installed() {
    let (server, engine) = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/state/abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(state_body("abc")))
        .expect(1)
        .mount(&server)
        .await;

    let (coordinator, store) = coordinator_for(engine);
    let loaded = coordinator.load_session("abc").await.expect("Load failed");
    assert_eq!(*loaded.session().turn_count(), 2);
    assert_eq!(
        store.get(CURRENT_SESSION_KEY).expect("Get failed"),
        Some(json!("abc"))
    );
}
