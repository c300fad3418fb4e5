// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET  /health
// - POST /api/chat  (path header, validation, conversation logging)
// - GET  /api/history/{user_id}
// - POST /api/history/{user_id}/watched
// - GET  /api/analytics/user/{user_id}/insights

use std::path::Path;
use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::json;
use serde_json::Value as Json;
use tower::ServiceExt as _; // for `oneshot`

use mood_recommender::api::{self, AppState, RECOMMEND_PATH_HEADER};
use mood_recommender::catalog::Catalog;
use mood_recommender::config::RecommenderConfig;
use mood_recommender::mood::RuleMoodExtractor;
use mood_recommender::precomputed::PrecomputedCache;
use mood_recommender::store::{ConversationLog, HistorySource, JsonHistoryStore, UserProfiles};
use mood_recommender::{Recommender, RecommenderState};

const BODY_LIMIT: usize = 1024 * 1024;

/// In-memory state: nothing in these tests touches disk.
fn test_router() -> Router {
    router_with(
        Arc::new(JsonHistoryStore::in_memory()),
        Arc::new(ConversationLog::in_memory()),
    )
}

fn router_with(watch_history: Arc<JsonHistoryStore>, conversations: Arc<ConversationLog>) -> Router {
    let root = Path::new(env!("CARGO_MANIFEST_DIR"));
    let catalog = Catalog::load(&root.join("data/catalog.json")).expect("catalog");
    let cache = PrecomputedCache::load(&root.join("data/precomputed"));
    let mut cfg = RecommenderConfig::default();
    cfg.scoring.weights_path = "/no/such/weights.json".into();
    let state = RecommenderState::from_parts(catalog, None, UserProfiles::default(), cache, &cfg);

    let history: Arc<dyn HistorySource> = watch_history.clone();
    let recommender = Recommender::new(
        Arc::new(state),
        Arc::new(RuleMoodExtractor::builtin()),
        history,
    );
    api::router(
        AppState {
            recommender,
            watch_history,
            conversations,
        },
        None,
    )
}

fn post_json(uri: &str, payload: Json) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("build POST")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build GET")
}

async fn json_body(resp: Response) -> Json {
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("parse json")
}

#[tokio::test]
async fn api_health_returns_200_and_ok_body() {
    let resp = test_router().oneshot(get("/health")).await.expect("oneshot /health");
    assert_eq!(resp.status(), StatusCode::OK, "health should be 200");
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.expect("read body");
    assert_eq!(String::from_utf8_lossy(&bytes).trim(), "OK");
}

#[tokio::test]
async fn chat_live_path_returns_contract_fields() {
    let app = test_router();
    let resp = app
        .oneshot(post_json(
            "/api/chat",
            json!({ "user_id": "u1", "message": "a heist with dreams", "top_n": 3 }),
        ))
        .await
        .expect("oneshot /api/chat");
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get(RECOMMEND_PATH_HEADER).and_then(|h| h.to_str().ok()),
        Some("live")
    );

    let v = json_body(resp).await;
    assert_eq!(v["user_id"], "u1");
    assert!(v["extracted_mood"]["mood"].is_string());
    assert!(v["extracted_mood"]["tone"].is_string());
    let recs = v["recommendations"].as_array().expect("recommendations array");
    assert_eq!(recs.len(), 3);
    assert_eq!(recs[0]["title"], "Inception");
    for r in recs {
        for field in ["id", "title", "genre", "rating", "tags", "hybrid_score"] {
            assert!(r.get(field).is_some(), "missing '{field}'");
        }
    }
}

#[tokio::test]
async fn chat_precomputed_hit_sets_header() {
    let resp = test_router()
        .oneshot(post_json(
            "/api/chat",
            json!({ "user_id": "u9", "message": "I want comedy movies" }),
        ))
        .await
        .expect("oneshot /api/chat");
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get(RECOMMEND_PATH_HEADER).and_then(|h| h.to_str().ok()),
        Some("precomputed")
    );
    let v = json_body(resp).await;
    assert_eq!(v["user_id"], "u9");
    assert_eq!(v["query_key"], "comedy");
}

#[tokio::test]
async fn chat_rejects_blank_input() {
    let app = test_router();
    for payload in [
        json!({ "user_id": "u1", "message": "   " }),
        json!({ "user_id": "", "message": "comedy" }),
    ] {
        let resp = app
            .clone()
            .oneshot(post_json("/api/chat", payload))
            .await
            .expect("oneshot /api/chat");
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let v = json_body(resp).await;
        assert!(v["error"].is_string());
    }
}

#[tokio::test]
async fn chat_is_logged_to_history_and_insights() {
    let app = test_router();
    for message in ["I'm sad and need something uplifting", "I'm so sad today"] {
        let resp = app
            .clone()
            .oneshot(post_json("/api/chat", json!({ "user_id": "u5", "message": message })))
            .await
            .expect("oneshot /api/chat");
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let resp = app
        .clone()
        .oneshot(get("/api/history/u5?limit=1"))
        .await
        .expect("oneshot history");
    assert_eq!(resp.status(), StatusCode::OK);
    let v = json_body(resp).await;
    let entries = v.as_array().expect("history array");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["message"], "I'm so sad today");
    assert_eq!(entries[0]["recommendations"].as_array().map(Vec::len), Some(3));

    let resp = app
        .oneshot(get("/api/analytics/user/u5/insights"))
        .await
        .expect("oneshot insights");
    let v = json_body(resp).await;
    assert_eq!(v["user_id"], "u5");
    assert_eq!(v["conversation_count"], 2);
    assert_eq!(v["top_mood"], "happy");
    assert_eq!(v["watch_history_count"], 0);
}

#[tokio::test]
async fn watched_endpoint_dedups_and_feeds_ranking() {
    let app = test_router();
    let first = json_body(
        app.clone()
            .oneshot(post_json("/api/history/u7/watched", json!({ "title": "The Notebook" })))
            .await
            .expect("oneshot watched"),
    )
    .await;
    assert_eq!(first["added"], true);
    assert_eq!(first["watch_history_count"], 1);

    let again = json_body(
        app.clone()
            .oneshot(post_json("/api/history/u7/watched", json!({ "title": " the notebook " })))
            .await
            .expect("oneshot watched"),
    )
    .await;
    assert_eq!(again["added"], false);
    assert_eq!(again["watch_history_count"], 1);

    let resp = app
        .oneshot(post_json(
            "/api/chat",
            json!({
                "user_id": "u7",
                "message": "anything at all",
                "top_n": 1,
                "weights": { "mood_weight": 0.0, "history_weight": 1.0, "ml_weight": 0.0 }
            }),
        ))
        .await
        .expect("oneshot /api/chat");
    let v = json_body(resp).await;
    assert_eq!(v["recommendations"][0]["title"], "The Notebook");
}

#[tokio::test]
async fn watched_rejects_blank_title() {
    let resp = test_router()
        .oneshot(post_json("/api/history/u7/watched", json!({ "title": "" })))
        .await
        .expect("oneshot watched");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn file_backed_stores_persist_across_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let history_path = dir.path().join("watch_history.json");
    let log_path = dir.path().join("conversations.json");
    let app = router_with(
        Arc::new(JsonHistoryStore::open(&history_path)),
        Arc::new(ConversationLog::open(&log_path)),
    );

    let resp = app
        .clone()
        .oneshot(post_json("/api/history/u8/watched", json!({ "title": "Heat" })))
        .await
        .expect("oneshot watched");
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = app
        .oneshot(post_json(
            "/api/chat",
            json!({ "user_id": "u8", "message": "I want comedy movies", "watched_title": "Alien" }),
        ))
        .await
        .expect("oneshot /api/chat");
    assert_eq!(resp.status(), StatusCode::OK);

    let reopened = JsonHistoryStore::open(&history_path);
    assert_eq!(reopened.watched("u8"), vec!["Heat", "Alien"]);
    assert_eq!(ConversationLog::open(&log_path).count("u8"), 1);
}

#[tokio::test]
async fn unwritable_history_is_a_server_error_and_not_remembered() {
    let dir = tempfile::tempdir().expect("tempdir");
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "x").expect("write blocker");
    let store = Arc::new(JsonHistoryStore::open(&blocker.join("watch_history.json")));
    let app = router_with(store.clone(), Arc::new(ConversationLog::in_memory()));

    let resp = app
        .oneshot(post_json("/api/history/u8/watched", json!({ "title": "Heat" })))
        .await
        .expect("oneshot watched");
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(store.count("u8"), 0);
}
