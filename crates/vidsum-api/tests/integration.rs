//! API integration tests.
//!
//! Drives the full router against real stores in a temp directory, with a
//! mock LLM endpoint standing in for the summarizer.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use tempfile::TempDir;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vidsum_api::{ApiConfig, AppState};
use vidsum_cache::{CacheConfig, CacheCoordinator};
use vidsum_engines::{Summarizer, SummarizerConfig};
use vidsum_queue::{CancelRegistry, JobQueue, QueueConfig};
use vidsum_store::MetadataStore;
use vidsum_storage::{BundleStore, UploadConfig, UploadStore};
use vidsum_worker::{ProcessingContext, WorkerConfig, WorkerPool};

const SAMPLE_SRT: &str = "1\n00:00:00,000 --> 00:00:02,000\nHello there.\n\n2\n00:00:02,000 --> 00:00:04,000\nGeneral Kenobi.\n";

struct TestApp {
    app: Router,
    pool: WorkerPool,
    _dir: TempDir,
    _llm: Option<MockServer>,
}

async fn spawn_app(summary_text: Option<&str>) -> TestApp {
    let dir = TempDir::new().unwrap();
    let store = MetadataStore::open(dir.path().join("metadata.db"))
        .await
        .unwrap();

    let mut upload_config = UploadConfig::new(dir.path());
    upload_config.max_file_size = 1024 * 1024;
    let uploads = UploadStore::new(upload_config, store.clone());
    let bundles = BundleStore::new(dir.path());

    let queue = Arc::new(JobQueue::new(QueueConfig::default()));
    let cancels = CancelRegistry::new();
    let coordinator = CacheCoordinator::new(
        store.clone(),
        bundles.clone(),
        uploads.clone(),
        Arc::clone(&queue),
        cancels.clone(),
        CacheConfig::default(),
    );

    let llm = match summary_text {
        Some(text) => {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/chat/completions"))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "choices": [{"message": {"role": "assistant", "content": text}}]
                })))
                .mount(&server)
                .await;
            Some(server)
        }
        None => None,
    };
    let summarizer = llm.as_ref().map(|server| {
        Arc::new(Summarizer::new(SummarizerConfig {
            base_url: server.uri(),
            api_key: None,
            model: "test-model".into(),
            timeout: std::time::Duration::from_secs(5),
        }))
    });

    let processing = Arc::new(ProcessingContext::new(
        WorkerConfig::default(),
        store.clone(),
        uploads.clone(),
        bundles,
        None,
        summarizer,
    ));
    let pool = WorkerPool::new(processing, Arc::clone(&queue), cancels);

    let state = AppState::new(ApiConfig::default(), store, uploads, coordinator);
    let app = vidsum_api::create_router(state, None);

    TestApp {
        app,
        pool,
        _dir: dir,
        _llm: llm,
    }
}

fn multipart_upload(file_name: &str, content_type: &str, content: &[u8]) -> Request<Body> {
    let boundary = "X-TEST-BOUNDARY";
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
            file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/uploads")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap()
}

fn json_post(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn wait_for_terminal_job(app: &Router, job_id: &str) -> serde_json::Value {
    for _ in 0..200 {
        let response = app
            .clone()
            .oneshot(get(&format!("/api/jobs/{}", job_id)))
            .await
            .unwrap();
        let json = body_json(response).await;
        let status = json["status"].as_str().unwrap_or_default().to_string();
        if status == "completed" || status == "failed" {
            return json;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    panic!("job {} never reached a terminal state", job_id);
}

#[tokio::test]
async fn test_health_endpoint() {
    let test = spawn_app(None).await;
    let response = test.app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_error_envelope_shape_and_request_id_echo() {
    let test = spawn_app(None).await;

    let request = Request::builder()
        .uri("/api/jobs/not-a-job-id")
        .header("x-request-id", "test-req-42")
        .body(Body::empty())
        .unwrap();
    let response = test.app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.headers().get("x-request-id").unwrap(),
        "test-req-42"
    );

    let json = body_json(response).await;
    assert_eq!(json["code"], "invalid-argument");
    assert_eq!(json["status"], 400);
    assert_eq!(json["request_id"], "test-req-42");
    assert!(json["message"].is_string());
}

#[tokio::test]
async fn test_unknown_ids_return_404_envelope() {
    let test = spawn_app(None).await;

    let job_id = format!("j_{}", "0".repeat(32));
    let response = test
        .app
        .clone()
        .oneshot(get(&format!("/api/jobs/{}", job_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["code"], "not-found");

    let cache_key = "0".repeat(64);
    let response = test
        .app
        .oneshot(get(&format!("/api/cache/{}", cache_key)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_source_combination_is_422_without_side_effects() {
    let test = spawn_app(None).await;

    let response = test
        .app
        .oneshot(json_post(
            "/api/summaries",
            serde_json::json!({
                "source_type": "url",
                "file_id": format!("f_{}", "0".repeat(32))
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert_eq!(json["code"], "invalid-argument");
}

#[tokio::test]
async fn test_upload_validations() {
    let test = spawn_app(None).await;

    // Unsupported extension
    let response = test
        .app
        .clone()
        .oneshot(multipart_upload("tool.exe", "application/octet-stream", b"x"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body_json(response).await["code"], "unsupported-type");

    // MIME/extension disagreement
    let response = test
        .app
        .clone()
        .oneshot(multipart_upload("song.mp3", "video/mp4", b"x"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

    // Over the 1MB test cap by one byte
    let big = vec![b'a'; 1024 * 1024 + 1];
    let response = test
        .app
        .clone()
        .oneshot(multipart_upload("big.mp4", "video/mp4", &big))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body_json(response).await["code"], "too-large");
}

#[tokio::test]
async fn test_upload_then_summarize_local_subtitle() {
    let test = spawn_app(Some("Two Jedi exchange greetings.")).await;
    let app = test.app.clone();

    // Upload a small valid SRT
    let response = app
        .clone()
        .oneshot(multipart_upload(
            "sample.srt",
            "application/x-subrip",
            SAMPLE_SRT.as_bytes(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let upload = body_json(response).await;
    let file_id = upload["file_id"].as_str().unwrap().to_string();
    assert!(file_id.starts_with("f_") && file_id.len() == 34);
    assert_eq!(upload["file_type"], "subtitle");

    // Request a summary: accepted with a job id
    let response = app
        .clone()
        .oneshot(json_post(
            "/api/summaries",
            serde_json::json!({"source_type": "local", "file_id": file_id.as_str()}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let accepted = body_json(response).await;
    let job_id = accepted["job_id"].as_str().unwrap().to_string();
    let cache_key = accepted["cache_key"].as_str().unwrap().to_string();
    assert!(job_id.starts_with("j_") && job_id.len() == 34);

    // A second identical request adopts the same job
    let response = app
        .clone()
        .oneshot(json_post(
            "/api/summaries",
            serde_json::json!({"source_type": "local", "file_id": file_id.as_str()}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let adopted = body_json(response).await;
    assert_eq!(adopted["job_id"], job_id.as_str());
    assert_eq!(adopted["cache_key"], cache_key.as_str());

    // Let the workers at it
    let handles = test.pool.start();
    let job = wait_for_terminal_job(&app, &job_id).await;
    assert_eq!(job["status"], "completed");

    // Full entry exposes the summary and the current profile version
    let response = app
        .clone()
        .oneshot(get(&format!("/api/cache/{}", cache_key)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let entry = body_json(response).await;
    assert_eq!(entry["summary_text"], "Two Jedi exchange greetings.");
    assert_eq!(entry["profile_version"], "v1");
    assert_eq!(entry["status"], "completed");

    // Cache hit short-circuit: same request now returns 200, no job id
    let response = app
        .clone()
        .oneshot(json_post(
            "/api/summaries",
            serde_json::json!({"source_type": "local", "file_id": file_id.as_str()}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let hit = body_json(response).await;
    assert_eq!(hit["cache_key"], cache_key.as_str());
    assert_eq!(hit["summary_text"], "Two Jedi exchange greetings.");
    assert!(hit["job_id"].is_null());

    // Lookup agrees without creating anything
    let response = app
        .clone()
        .oneshot(json_post(
            "/api/cache/lookup",
            serde_json::json!({"source_type": "local", "file_id": file_id.as_str()}),
        ))
        .await
        .unwrap();
    let lookup = body_json(response).await;
    assert_eq!(lookup["found"], true);
    assert_eq!(lookup["valid"], true);

    // Refresh creates a new job and eventually replaces the bundle
    let response = app
        .clone()
        .oneshot(json_post(
            "/api/summaries",
            serde_json::json!({"source_type": "local", "file_id": file_id.as_str(), "refresh": true}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let refreshed = body_json(response).await;
    let new_job_id = refreshed["job_id"].as_str().unwrap().to_string();
    assert_ne!(new_job_id, job_id);

    let job = wait_for_terminal_job(&app, &new_job_id).await;
    assert_eq!(job["status"], "completed");

    // No orphan staging remains
    let tmp = test._dir.path().join("tmp");
    if tmp.exists() {
        let mut entries = tokio::fs::read_dir(&tmp).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }

    test.pool.shutdown();
    for handle in handles {
        let _ = tokio::time::timeout(std::time::Duration::from_secs(5), handle).await;
    }
}

#[tokio::test]
async fn test_delete_cache_entry() {
    let test = spawn_app(Some("A summary.")).await;
    let app = test.app.clone();

    let response = app
        .clone()
        .oneshot(multipart_upload(
            "sample.srt",
            "application/x-subrip",
            SAMPLE_SRT.as_bytes(),
        ))
        .await
        .unwrap();
    let upload = body_json(response).await;
    let file_id = upload["file_id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(json_post(
            "/api/summaries",
            serde_json::json!({"source_type": "local", "file_id": file_id.as_str()}),
        ))
        .await
        .unwrap();
    let accepted = body_json(response).await;
    let cache_key = accepted["cache_key"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/cache/{}", cache_key))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["deleted"], true);

    // Gone now
    let response = app
        .oneshot(get(&format!("/api/cache/{}", cache_key)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
