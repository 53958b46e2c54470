//! HTTP surface tests driven through `tower::ServiceExt::oneshot` against an
//! app wired to the in-process broker.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tower::ServiceExt;

use archlens_api::{AppState, build_app};
use archlens_auth::{JwtDecoder, JwtEncoder, Role};
use archlens_broker::BrokerManager;
use archlens_core::config::{AppConfig, DatabaseConfig};
use archlens_core::messages::{JobMessage, SourceType};
use archlens_core::error::AppError;
use archlens_core::result::AppResult;
use archlens_core::traits::{DatabaseHealth, DiagramIndex, JobLedger, QuotaStore};
use archlens_core::types::{AnalysisId, JobId, UserId};
use archlens_realtime::{ProgressSubscriber, RealtimeEngine};
use archlens_worker::jobs::{CleanupJob, QuotaResetJob};
use archlens_worker::{JobDispatcher, JobQueue, Scheduler};

#[derive(Debug, Default)]
struct CountingQuotaStore {
    resets: Mutex<Vec<DateTime<Utc>>>,
}

#[async_trait]
impl QuotaStore for CountingQuotaStore {
    async fn reset_daily_usage(&self, next_reset: DateTime<Utc>) -> AppResult<u64> {
        self.resets.lock().unwrap().push(next_reset);
        Ok(3)
    }
}

#[derive(Debug)]
struct NoDiagrams;

#[async_trait]
impl DiagramIndex for NoDiagrams {
    async fn migrated_analysis_ids(&self) -> AppResult<Vec<AnalysisId>> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Default)]
struct RecordingLedger {
    compensated: Mutex<Vec<(JobId, String)>>,
}

#[async_trait]
impl JobLedger for RecordingLedger {
    async fn compensate_enqueue_failure(&self, job: &JobMessage, reason: &str) -> AppResult<()> {
        self.compensated
            .lock()
            .unwrap()
            .push((job.job_id, reason.to_string()));
        Ok(())
    }
}

/// Database stand-in answering health checks with a fixed outcome.
#[derive(Debug)]
struct StubDatabase {
    up: bool,
}

#[async_trait]
impl DatabaseHealth for StubDatabase {
    async fn health_check(&self) -> AppResult<bool> {
        if self.up {
            Ok(true)
        } else {
            Err(AppError::database("connection refused"))
        }
    }
}

struct TestApp {
    router: Router,
    encoder: JwtEncoder,
    queue: Arc<JobQueue>,
    quota: Arc<CountingQuotaStore>,
    ledger: Arc<RecordingLedger>,
}

fn test_config() -> AppConfig {
    AppConfig {
        server: Default::default(),
        database: DatabaseConfig {
            url: "postgres://localhost/archlens_test".to_string(),
            max_connections: 1,
            min_connections: 0,
            connect_timeout_seconds: 1,
            idle_timeout_seconds: 1,
        },
        broker: Default::default(),
        queue: Default::default(),
        auth: Default::default(),
        realtime: Default::default(),
        scheduler: Default::default(),
        logging: Default::default(),
    }
}

fn test_app() -> TestApp {
    test_app_with_database(true)
}

fn test_app_with_database(up: bool) -> TestApp {
    let config = test_config();
    let broker = BrokerManager::memory(16);

    let queue = Arc::new(JobQueue::new(broker.queue(), &config.queue));
    let subscriber = ProgressSubscriber::new(
        broker.pubsub(),
        config.broker.progress_channel.clone(),
        Duration::from_millis(10),
    );
    let realtime = RealtimeEngine::new(&config.realtime, subscriber);

    let quota = Arc::new(CountingQuotaStore::default());
    let scheduler = Arc::new(Scheduler::new(
        &config.scheduler,
        QuotaResetJob::new(quota.clone()),
        CleanupJob::new(&config.scheduler, Arc::new(NoDiagrams)),
    ));

    let ledger = Arc::new(RecordingLedger::default());
    let dispatcher = Arc::new(JobDispatcher::new(queue.clone(), ledger.clone()));

    let state = AppState {
        jwt_decoder: Arc::new(JwtDecoder::new(&config.auth)),
        realtime,
        job_queue: queue.clone(),
        dispatcher,
        scheduler,
        database: Arc::new(StubDatabase { up }),
        config: Arc::new(config.clone()),
    };

    TestApp {
        router: build_app(state),
        encoder: JwtEncoder::new(&config.auth),
        queue,
        quota,
        ledger,
    }
}

fn token(app: &TestApp, user: i64, role: Role) -> String {
    app.encoder
        .issue(UserId(user), role, chrono::Duration::hours(1))
        .unwrap()
}

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn get(uri: &str, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

fn post(uri: &str, bearer: Option<&str>) -> Request<Body> {
    post_json(uri, bearer, None)
}

fn post_json(uri: &str, bearer: Option<&str>, body: Option<&JobMessage>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    match body {
        Some(job) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(job).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn github_job(id: i64) -> JobMessage {
    JobMessage {
        job_id: JobId(id),
        analysis_id: AnalysisId(200),
        user_id: UserId(20),
        source_type: SourceType::Github,
        repo_url: Some("https://github.com/test/repo".to_string()),
        upload_id: None,
        start_file: None,
        start_struct: "pkg.Struct".to_string(),
        depth: 5,
        model_name: "claude-3".to_string(),
    }
}

// ----------------------------------------------------------------------------
// WebSocket upgrade
// ----------------------------------------------------------------------------

#[tokio::test]
async fn ws_without_token_is_unauthorized() {
    let app = test_app();

    let (status, body) = send(&app, get("/ws", None)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "UNAUTHORIZED");

    let (status, _) = send(&app, get("/ws?token=", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn ws_with_invalid_token_is_unauthorized() {
    let app = test_app();

    let (status, _) = send(&app, get("/ws?token=not-a-jwt", None)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn ws_with_valid_token_but_no_upgrade_is_rejected_by_axum() {
    let app = test_app();
    let token = token(&app, 123, Role::User);

    let response = app
        .router
        .clone()
        .oneshot(get(&format!("/ws?token={token}"), None))
        .await
        .unwrap();

    assert!(response.status().is_client_error());
    assert_ne!(response.status(), StatusCode::UNAUTHORIZED);
}

// ----------------------------------------------------------------------------
// Health
// ----------------------------------------------------------------------------

#[tokio::test]
async fn health_reports_broker_and_connections() {
    let app = test_app();

    let (status, body) = send(&app, get("/api/health", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["broker"], true);
    assert_eq!(body["database"], true);
    assert_eq!(body["ws_connections"], 0);
    assert_eq!(body["online_users"], 0);
}

#[tokio::test]
async fn health_is_degraded_when_database_is_down() {
    let app = test_app_with_database(false);

    let (status, body) = send(&app, get("/api/health", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["broker"], true);
    assert_eq!(body["database"], false);
}

// ----------------------------------------------------------------------------
// Admin
// ----------------------------------------------------------------------------

#[tokio::test]
async fn admin_routes_require_a_token() {
    let app = test_app();

    let (status, _) = send(&app, get("/api/admin/queue", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, post("/api/admin/quota/reset", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(app.quota.resets.lock().unwrap().is_empty());
}

#[tokio::test]
async fn admin_routes_refuse_regular_users() {
    let app = test_app();
    let token = token(&app, 5, Role::User);

    let (status, body) = send(&app, post("/api/admin/quota/reset", Some(&token))).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "FORBIDDEN");
    assert!(app.quota.resets.lock().unwrap().is_empty());
}

#[tokio::test]
async fn admin_can_reset_quotas() {
    let app = test_app();
    let token = token(&app, 1, Role::Admin);

    let (status, body) = send(&app, post("/api/admin/quota/reset", Some(&token))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["users_reset"], 3);
    assert_eq!(app.quota.resets.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn admin_sees_queue_stats() {
    let app = test_app();
    let token = token(&app, 1, Role::Admin);
    let job = github_job(42);
    app.queue.push(&job).await.unwrap();
    app.queue.push(&job).await.unwrap();

    let (status, body) = send(&app, get("/api/admin/queue", Some(&token))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["queue"], "analysis");
    assert_eq!(body["pending"], 2);
    assert_eq!(body["in_flight"], 0);
}

#[tokio::test]
async fn admin_dispatch_enqueues_job() {
    let app = test_app();
    let token = token(&app, 1, Role::Admin);

    let request = post_json("/api/admin/jobs", Some(&token), Some(&github_job(42)));
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["job_id"], 42);
    assert_eq!(body["queue"], "analysis");
    let delivery = app.queue.pop(Duration::from_millis(10)).await.unwrap().unwrap();
    assert_eq!(delivery.job, github_job(42));
    assert!(app.ledger.compensated.lock().unwrap().is_empty());
}

#[tokio::test]
async fn admin_dispatch_of_invalid_job_is_compensated() {
    let app = test_app();
    let token = token(&app, 1, Role::Admin);
    let mut job = github_job(43);
    job.repo_url = None;

    let request = post_json("/api/admin/jobs", Some(&token), Some(&job));
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "VALIDATION_ERROR");
    assert_eq!(app.queue.length().await.unwrap(), 0);
    let compensated = app.ledger.compensated.lock().unwrap();
    assert_eq!(compensated.len(), 1);
    assert_eq!(compensated[0].0, JobId(43));
}
