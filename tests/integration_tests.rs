use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use base64::Engine;
use serde_json::{json, Map, Value};
use tokio::sync::broadcast;
use tower::ServiceExt;

use healthlink::config::{AppConfig, Collections};
use healthlink::db;
use healthlink::handlers;
use healthlink::services::messaging::{MessagingProvider, SmsMessage, SmsRequest};
use healthlink::services::notifications::{notification_channel, NotificationWorker, RetryPolicy};
use healthlink::state::AppState;
use healthlink::store::sqlite::SqliteStore;
use healthlink::store::{Document, DocumentList, DocumentStore, FileStorage, Query};

const PASSKEY: &str = "test-passkey";

// ── Mock Providers ──

struct MockMessaging {
    sent: Arc<Mutex<Vec<SmsRequest>>>,
}

#[async_trait]
impl MessagingProvider for MockMessaging {
    async fn create_sms(&self, request: &SmsRequest) -> anyhow::Result<SmsMessage> {
        let mut sent = self.sent.lock().unwrap();
        sent.push(request.clone());
        Ok(SmsMessage {
            id: request.message_id.clone(),
            status: "queued".to_string(),
            provider_message_id: Some(format!("SM{}", sent.len())),
        })
    }
}

struct FailingMessaging;

#[async_trait]
impl MessagingProvider for FailingMessaging {
    async fn create_sms(&self, _request: &SmsRequest) -> anyhow::Result<SmsMessage> {
        anyhow::bail!("provider unavailable")
    }
}

// ── Store Wrappers ──

/// Accepts everything except updates, which fail as if the backend were down.
struct FailingUpdateStore {
    inner: SqliteStore,
}

#[async_trait]
impl DocumentStore for FailingUpdateStore {
    async fn create_document(
        &self,
        collection_id: &str,
        document_id: &str,
        data: Map<String, Value>,
    ) -> anyhow::Result<Document> {
        self.inner.create_document(collection_id, document_id, data).await
    }

    async fn get_document(
        &self,
        collection_id: &str,
        document_id: &str,
    ) -> anyhow::Result<Option<Document>> {
        self.inner.get_document(collection_id, document_id).await
    }

    async fn list_documents(
        &self,
        collection_id: &str,
        queries: &[Query],
    ) -> anyhow::Result<DocumentList> {
        self.inner.list_documents(collection_id, queries).await
    }

    async fn update_document(
        &self,
        _collection_id: &str,
        _document_id: &str,
        _patch: Map<String, Value>,
    ) -> anyhow::Result<Option<Document>> {
        anyhow::bail!("document store unavailable")
    }
}

/// Creates a cancelled appointment right before the second appointments listing,
/// the way a patient booking mid-walk would.
struct InsertBetweenPagesStore {
    inner: SqliteStore,
    listings: Mutex<usize>,
}

#[async_trait]
impl DocumentStore for InsertBetweenPagesStore {
    async fn create_document(
        &self,
        collection_id: &str,
        document_id: &str,
        data: Map<String, Value>,
    ) -> anyhow::Result<Document> {
        self.inner.create_document(collection_id, document_id, data).await
    }

    async fn get_document(
        &self,
        collection_id: &str,
        document_id: &str,
    ) -> anyhow::Result<Option<Document>> {
        self.inner.get_document(collection_id, document_id).await
    }

    async fn list_documents(
        &self,
        collection_id: &str,
        queries: &[Query],
    ) -> anyhow::Result<DocumentList> {
        if collection_id == "appointments" {
            let listing = {
                let mut listings = self.listings.lock().unwrap();
                *listings += 1;
                *listings
            };
            if listing == 2 {
                self.inner
                    .create_document(collection_id, "late", appointment_data("cancelled"))
                    .await?;
            }
        }
        self.inner.list_documents(collection_id, queries).await
    }

    async fn update_document(
        &self,
        collection_id: &str,
        document_id: &str,
        patch: Map<String, Value>,
    ) -> anyhow::Result<Option<Document>> {
        self.inner.update_document(collection_id, document_id, patch).await
    }
}

fn appointment_data(status: &str) -> Map<String, Value> {
    json!({
        "userId": "u1",
        "schedule": "2024-06-15T14:00:00Z",
        "status": status,
        "primaryPhysician": "John Green",
        "reason": "Annual check-up"
    })
    .as_object()
    .cloned()
    .unwrap()
}

fn sqlite() -> SqliteStore {
    SqliteStore::new(db::init_db(":memory:").unwrap())
}

// ── Helpers ──

fn test_config() -> AppConfig {
    AppConfig {
        port: 3000,
        database_url: ":memory:".to_string(),
        admin_passkey: PASSKEY.to_string(),
        store_backend: "sqlite".to_string(),
        appwrite_endpoint: "".to_string(),
        appwrite_project_id: "".to_string(),
        appwrite_api_key: "".to_string(),
        appwrite_database_id: "".to_string(),
        collections: Collections::default(),
        sms_provider: "log".to_string(),
        twilio_account_sid: "".to_string(),
        twilio_auth_token: "".to_string(), // empty = skip signature validation
        twilio_phone_number: "+15551234567".to_string(),
        public_url: "".to_string(),
        clinic_name: "Health Link".to_string(),
        sms_max_attempts: 2,
        sms_queue_capacity: 16,
        list_page_size: 2,
    }
}

struct TestApp {
    state: Arc<AppState>,
    worker: NotificationWorker,
}

fn test_app_with(messaging: Arc<dyn MessagingProvider>) -> TestApp {
    let store = Arc::new(sqlite());
    test_app_with_store(store.clone(), store, messaging)
}

fn test_app_with_store(
    store: Arc<dyn DocumentStore>,
    files: Arc<dyn FileStorage>,
    messaging: Arc<dyn MessagingProvider>,
) -> TestApp {
    let config = test_config();
    let (events_tx, _) = broadcast::channel(64);
    let (notifications, rx) = notification_channel(config.sms_queue_capacity);

    let worker = NotificationWorker::new(
        rx,
        store.clone(),
        messaging.clone(),
        events_tx.clone(),
        config.collections.notifications.clone(),
        RetryPolicy {
            max_attempts: config.sms_max_attempts,
            base_delay: Duration::ZERO,
        },
    );

    let state = Arc::new(AppState {
        config,
        store,
        files,
        messaging,
        notifications,
        events_tx,
    });
    TestApp { state, worker }
}

fn test_app() -> (TestApp, Arc<Mutex<Vec<SmsRequest>>>) {
    let sent = Arc::new(Mutex::new(vec![]));
    let app = test_app_with(Arc::new(MockMessaging {
        sent: Arc::clone(&sent),
    }));
    (app, sent)
}

async fn call(state: &Arc<AppState>, req: Request<Body>) -> (StatusCode, Value) {
    let res = handlers::router(state.clone()).oneshot(req).await.unwrap();
    let status = res.status();
    let body = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn admin_get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("Authorization", format!("Bearer {PASSKEY}"))
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn admin_post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .header("Authorization", format!("Bearer {PASSKEY}"))
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn registration() -> Value {
    json!({
        "name": "Jane Doe",
        "email": "jane@example.com",
        "phone": "+15551234567",
        "birthDate": "1990-05-01",
        "gender": "female",
        "address": "14th Street, New York",
        "occupation": "Engineer",
        "emergencyContactName": "John Doe",
        "emergencyContactNumber": "+15557654321",
        "primaryPhysician": "Leila Cameron",
        "insuranceProvider": "BlueCross",
        "insurancePolicyNumber": "ABC123",
        "treatmentConsent": true,
        "disclosureConsent": true,
        "privacyConsent": true
    })
}

async fn create_user(state: &Arc<AppState>) -> String {
    let (status, json) = call(
        state,
        post_json(
            "/api/users",
            json!({"name": "Jane Doe", "email": "jane@example.com", "phone": "+15551234567"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    json["user"]["$id"].as_str().unwrap().to_string()
}

async fn register_patient(state: &Arc<AppState>, user_id: &str) {
    let (status, json) = call(
        state,
        post_json(&format!("/api/patients/{user_id}/register"), registration()),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{json}");
}

async fn request_appointment(state: &Arc<AppState>, user_id: &str, reason: &str) -> String {
    let (status, json) = call(
        state,
        post_json(
            &format!("/api/patients/{user_id}/appointments"),
            json!({
                "primaryPhysician": "John Green",
                "schedule": "2024-06-15T14:00:00Z",
                "reason": reason,
                "note": "Prefer afternoon"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    json["appointment"]["$id"].as_str().unwrap().to_string()
}

/// User, registered patient, and one pending appointment.
async fn seed(state: &Arc<AppState>) -> (String, String) {
    let user_id = create_user(state).await;
    register_patient(state, &user_id).await;
    let appointment_id = request_appointment(state, &user_id, "Annual check-up").await;
    (user_id, appointment_id)
}

fn schedule_body() -> Value {
    json!({
        "primaryPhysician": "John Green",
        "schedule": "2024-06-15T14:00:00Z",
        "timeZone": "America/New_York"
    })
}

// ── Health Check ──

#[tokio::test]
async fn test_health() {
    let (app, _) = test_app();
    let (status, json) = call(&app.state, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

// ── Forms ──

#[tokio::test]
async fn test_get_form_renders_fields() {
    let (app, _) = test_app();
    let (status, json) = call(&app.state, get("/api/forms/register")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["name"], "register");

    let fields = json["fields"].as_array().unwrap();
    let gender = fields.iter().find(|f| f["name"] == "gender").unwrap();
    assert_eq!(gender["field_type"], "SKELETON");
    assert_eq!(gender["control"], "radio_group");

    let consent = fields.iter().find(|f| f["name"] == "privacyConsent").unwrap();
    assert_eq!(consent["field_type"], "CHECKBOX");
}

#[tokio::test]
async fn test_unknown_form_not_found() {
    let (app, _) = test_app();
    let (status, _) = call(&app.state, get("/api/forms/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ── Patient Intake ──

#[tokio::test]
async fn test_create_user_redirects_to_registration() {
    let (app, _) = test_app();
    let (status, json) = call(
        &app.state,
        post_json(
            "/api/users",
            json!({"name": "Jane Doe", "email": "jane@example.com", "phone": "+15551234567"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let id = json["user"]["$id"].as_str().unwrap();
    assert_eq!(json["redirect"], format!("/patients/{id}/register"));
    assert_eq!(json["user"]["email"], "jane@example.com");
}

#[tokio::test]
async fn test_create_user_returns_existing_by_email() {
    let (app, _) = test_app();
    let first = create_user(&app.state).await;
    let second = create_user(&app.state).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_create_user_invalid_input() {
    let (app, _) = test_app();
    let (status, json) = call(
        &app.state,
        post_json("/api/users", json!({"name": "J", "email": "nope", "phone": "555"})),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["fields"]["name"], "Name must be at least 2 characters");
    assert!(json["fields"]["email"].is_string());
    assert!(json["fields"]["phone"].is_string());
}

#[tokio::test]
async fn test_register_requires_consent() {
    let (app, _) = test_app();
    let user_id = create_user(&app.state).await;

    let mut body = registration();
    body["privacyConsent"] = json!(false);
    let (status, json) = call(
        &app.state,
        post_json(&format!("/api/patients/{user_id}/register"), body),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        json["fields"]["privacyConsent"],
        "You must consent to privacy in order to proceed"
    );

    let (status, _) = call(&app.state, get(&format!("/api/patients/{user_id}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_register_unknown_user() {
    let (app, _) = test_app();
    let (status, _) = call(
        &app.state,
        post_json("/api/patients/missing/register", registration()),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_register_stores_identification_document() {
    let (app, _) = test_app();
    let user_id = create_user(&app.state).await;

    let mut body = registration();
    body["identificationType"] = json!("Passport");
    body["identificationDocument"] = json!([{
        "fileName": "passport.png",
        "content": base64::engine::general_purpose::STANDARD.encode(b"fake image bytes"),
    }]);
    let (status, json) = call(
        &app.state,
        post_json(&format!("/api/patients/{user_id}/register"), body),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["redirect"], format!("/patients/{user_id}/new-appointment"));
    let url = json["patient"]["identificationDocumentUrl"].as_str().unwrap();

    let res = handlers::router(app.state.clone())
        .oneshot(get(url))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()[header::CONTENT_TYPE], "image/png");
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"fake image bytes");
}

#[tokio::test]
async fn test_get_patient_after_registration() {
    let (app, _) = test_app();
    let user_id = create_user(&app.state).await;
    register_patient(&app.state, &user_id).await;

    let (status, json) = call(&app.state, get(&format!("/api/patients/{user_id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["userId"], user_id);
    assert_eq!(json["gender"], "female");
    assert_eq!(json["treatmentConsent"], true);
}

// ── Appointments ──

#[tokio::test]
async fn test_new_appointment_is_pending() {
    let (app, _) = test_app();
    let user_id = create_user(&app.state).await;
    register_patient(&app.state, &user_id).await;

    let (status, json) = call(
        &app.state,
        post_json(
            &format!("/api/patients/{user_id}/appointments"),
            json!({
                "primaryPhysician": "John Green",
                "schedule": "2024-06-15T14:00:00Z",
                "reason": "Annual check-up"
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{json}");
    let id = json["appointment"]["$id"].as_str().unwrap();
    assert_eq!(json["appointment"]["status"], "pending");
    assert_eq!(
        json["redirect"],
        format!("/patients/{user_id}/new-appointment/success?appointmentId={id}")
    );
}

#[tokio::test]
async fn test_appointment_requires_registered_patient() {
    let (app, _) = test_app();
    let user_id = create_user(&app.state).await;

    let (status, _) = call(
        &app.state,
        post_json(
            &format!("/api/patients/{user_id}/appointments"),
            json!({
                "primaryPhysician": "John Green",
                "schedule": "2024-06-15T14:00:00Z",
                "reason": "Annual check-up"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_appointment_rejects_unknown_physician() {
    let (app, _) = test_app();
    let user_id = create_user(&app.state).await;
    register_patient(&app.state, &user_id).await;

    let (status, json) = call(
        &app.state,
        post_json(
            &format!("/api/patients/{user_id}/appointments"),
            json!({
                "primaryPhysician": "Dr. Nobody",
                "schedule": "2024-06-15T14:00:00Z",
                "reason": "Annual check-up"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(json["fields"]["primaryPhysician"].is_string());
}

#[tokio::test]
async fn test_get_appointment_is_repeatable() {
    let (app, _) = test_app();
    let (_, appointment_id) = seed(&app.state).await;

    let uri = format!("/api/appointments/{appointment_id}");
    let (status, first) = call(&app.state, get(&uri)).await;
    assert_eq!(status, StatusCode::OK);
    let (_, second) = call(&app.state, get(&uri)).await;
    assert_eq!(first, second);
    assert_eq!(first["reason"], "Annual check-up");
}

#[tokio::test]
async fn test_get_missing_appointment() {
    let (app, _) = test_app();
    let (status, _) = call(&app.state, get("/api/appointments/missing")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ── Admin API ──

#[tokio::test]
async fn test_admin_requires_auth() {
    let (app, _) = test_app();

    let (status, _) = call(&app.state, get("/api/admin/appointments")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let wrong = Request::builder()
        .uri("/api/admin/appointments")
        .header("Authorization", "Bearer wrong")
        .body(Body::empty())
        .unwrap();
    let (status, _) = call(&app.state, wrong).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(&app.state, get("/api/admin/events")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_event_stream_opens_with_passkey() {
    let (app, _) = test_app();
    let res = handlers::router(app.state.clone())
        .oneshot(get(&format!("/api/admin/events?token={PASSKEY}")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()[header::CONTENT_TYPE], "text/event-stream");
}

#[tokio::test]
async fn test_admin_summary_counts() {
    let (app, _) = test_app();
    let (user_id, first) = seed(&app.state).await;
    let second = request_appointment(&app.state, &user_id, "Follow-up").await;
    request_appointment(&app.state, &user_id, "Blood test").await;

    let (status, _) = call(
        &app.state,
        admin_post(&format!("/api/admin/appointments/{first}/schedule"), schedule_body()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(
        &app.state,
        admin_post(
            &format!("/api/admin/appointments/{second}/cancel"),
            json!({"cancellationReason": "Doctor unavailable"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Page size is 2, so three appointments take two pages.
    let (status, json) = call(&app.state, admin_get("/api/admin/appointments")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["totalCount"], 3);
    assert_eq!(json["scheduledCount"], 1);
    assert_eq!(json["pendingCount"], 1);
    assert_eq!(json["cancelledCount"], 1);
    assert_eq!(json["unrecognizedCount"], 0);
    assert_eq!(json["documents"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_admin_summary_ignores_appointments_created_while_paging() {
    let store = Arc::new(InsertBetweenPagesStore {
        inner: sqlite(),
        listings: Mutex::new(0),
    });
    for i in 0..4 {
        store
            .inner
            .create_document("appointments", &format!("a{i}"), appointment_data("pending"))
            .await
            .unwrap();
    }
    let app = test_app_with_store(
        store,
        Arc::new(sqlite()),
        Arc::new(MockMessaging {
            sent: Arc::new(Mutex::new(vec![])),
        }),
    );

    // Page size is 2: the late appointment lands between the first and second page.
    let (status, json) = call(&app.state, admin_get("/api/admin/appointments")).await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["totalCount"], 4);
    assert_eq!(json["pendingCount"], 4);
    assert_eq!(json["cancelledCount"], 0);

    let ids: Vec<&str> = json["documents"]
        .as_array()
        .unwrap()
        .iter()
        .map(|doc| doc["$id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["a3", "a2", "a1", "a0"]);
}

#[tokio::test]
async fn test_admin_summary_empty() {
    let (app, _) = test_app();
    let (status, json) = call(&app.state, admin_get("/api/admin/appointments")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["totalCount"], 0);
    assert_eq!(json["pendingCount"], 0);
    assert!(json["documents"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_schedule_sends_confirmation_sms() {
    let (mut app, sent) = test_app();
    let (user_id, appointment_id) = seed(&app.state).await;

    let (status, json) = call(
        &app.state,
        admin_post(
            &format!("/api/admin/appointments/{appointment_id}/schedule"),
            schedule_body(),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["appointment"]["status"], "scheduled");
    assert_eq!(json["redirect"], "/admin");

    assert_eq!(app.worker.process_pending().await, 1);
    let sent = sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].users, vec![user_id]);
    assert_eq!(
        sent[0].content,
        "Greetings from Health Link. Your appointment is confirmed for Jun 15, 2024, 10:00 AM with Dr. John Green."
    );
}

#[tokio::test]
async fn test_cancel_sends_reason() {
    let (mut app, sent) = test_app();
    let (_, appointment_id) = seed(&app.state).await;

    let (status, json) = call(
        &app.state,
        admin_post(
            &format!("/api/admin/appointments/{appointment_id}/cancel"),
            json!({"cancellationReason": "Doctor unavailable", "timeZone": "UTC"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["appointment"]["status"], "cancelled");
    assert_eq!(json["appointment"]["cancellationReason"], "Doctor unavailable");

    app.worker.process_pending().await;
    let sent = sent.lock().unwrap();
    assert!(sent[0].content.contains("is cancelled"));
    assert!(sent[0].content.contains("Reason: Doctor unavailable"));
    assert!(sent[0].content.contains("Jun 15, 2024, 2:00 PM"));
}

#[tokio::test]
async fn test_cancel_requires_reason() {
    let (app, _) = test_app();
    let (_, appointment_id) = seed(&app.state).await;

    let (status, json) = call(
        &app.state,
        admin_post(&format!("/api/admin/appointments/{appointment_id}/cancel"), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(json["fields"]["cancellationReason"].is_string());
}

#[tokio::test]
async fn test_update_missing_appointment() {
    let (mut app, sent) = test_app();
    let (status, _) = call(
        &app.state,
        admin_post("/api/admin/appointments/missing/schedule", schedule_body()),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    assert_eq!(app.worker.process_pending().await, 0);
    assert!(sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_bad_time_zone_rejected() {
    let (app, _) = test_app();
    let (_, appointment_id) = seed(&app.state).await;

    let mut body = schedule_body();
    body["timeZone"] = json!("Mars/Olympus_Mons");
    let (status, _) = call(
        &app.state,
        admin_post(&format!("/api/admin/appointments/{appointment_id}/schedule"), body),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, json) = call(&app.state, get(&format!("/api/appointments/{appointment_id}"))).await;
    assert_eq!(json["status"], "pending");
}

#[tokio::test]
async fn test_failed_sms_keeps_update() {
    let mut app = test_app_with(Arc::new(FailingMessaging));
    let (_, appointment_id) = seed(&app.state).await;

    let (status, _) = call(
        &app.state,
        admin_post(
            &format!("/api/admin/appointments/{appointment_id}/schedule"),
            schedule_body(),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    app.worker.process_pending().await;

    let (_, json) = call(&app.state, get(&format!("/api/appointments/{appointment_id}"))).await;
    assert_eq!(json["status"], "scheduled");

    let (status, json) = call(&app.state, admin_get("/api/admin/notifications")).await;
    assert_eq!(status, StatusCode::OK);
    let outbox = json.as_array().unwrap();
    assert_eq!(outbox.len(), 1);
    assert_eq!(outbox[0]["status"], "failed");
    assert_eq!(outbox[0]["attempts"], 2);
    assert!(outbox[0]["lastError"]
        .as_str()
        .unwrap()
        .contains("provider unavailable"));
}

#[tokio::test]
async fn test_failed_update_reports_store_error() {
    let store = Arc::new(FailingUpdateStore { inner: sqlite() });
    let files = Arc::new(sqlite());
    let sent = Arc::new(Mutex::new(vec![]));
    let mut app = test_app_with_store(
        store,
        files,
        Arc::new(MockMessaging {
            sent: Arc::clone(&sent),
        }),
    );
    let (_, appointment_id) = seed(&app.state).await;

    let (status, json) = call(
        &app.state,
        admin_post(
            &format!("/api/admin/appointments/{appointment_id}/schedule"),
            schedule_body(),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(json["error"].is_string(), "{json}");

    // Nothing is queued when the update never happened.
    assert_eq!(app.worker.process_pending().await, 0);
    assert!(sent.lock().unwrap().is_empty());

    let (_, json) = call(&app.state, get(&format!("/api/appointments/{appointment_id}"))).await;
    assert_eq!(json["status"], "pending");
}

#[tokio::test]
async fn test_admin_send_sms() {
    let (app, sent) = test_app();
    let (status, json) = call(
        &app.state,
        admin_post("/api/admin/sms", json!({"userId": "u1", "content": "Hello"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["providerMessageId"], "SM1");
    assert_eq!(sent.lock().unwrap()[0].content, "Hello");

    let (status, _) = call(
        &app.state,
        admin_post("/api/admin/sms", json!({"userId": "u1", "content": "  "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_send_sms_provider_failure() {
    let app = test_app_with(Arc::new(FailingMessaging));
    let (status, _) = call(
        &app.state,
        admin_post("/api/admin/sms", json!({"userId": "u1", "content": "Hello"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

// ── Webhook Tests ──

#[tokio::test]
async fn test_status_callback_records_delivery() {
    let (mut app, _) = test_app();
    let (_, appointment_id) = seed(&app.state).await;
    call(
        &app.state,
        admin_post(
            &format!("/api/admin/appointments/{appointment_id}/schedule"),
            schedule_body(),
        ),
    )
    .await;
    app.worker.process_pending().await;

    let req = Request::builder()
        .method("POST")
        .uri("/webhook/sms/status")
        .header("Content-Type", "application/x-www-form-urlencoded")
        .body(Body::from("MessageSid=SM1&MessageStatus=delivered"))
        .unwrap();
    let (status, _) = call(&app.state, req).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, json) = call(&app.state, admin_get("/api/admin/notifications")).await;
    assert_eq!(json[0]["status"], "sent");
    assert_eq!(json[0]["deliveryStatus"], "delivered");
}

#[tokio::test]
async fn test_status_callback_missing_fields() {
    let (app, _) = test_app();
    let req = Request::builder()
        .method("POST")
        .uri("/webhook/sms/status")
        .header("Content-Type", "application/x-www-form-urlencoded")
        .body(Body::from("MessageSid=SM1"))
        .unwrap();
    let (status, _) = call(&app.state, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
