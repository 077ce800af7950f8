use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    response::Response,
    routing::get,
    Router,
};
use chrono::NaiveDate;
use serde_json::{json, Value};
use sqlx::PgPool;
use tower::ServiceExt;
use tower_sessions::{MemoryStore, Session, SessionManagerLayer};

use easyvol::api::middleware::session::{AppState, SESSION_KEY_USER_ID};
use easyvol::sanctions::{InMemorySanctionStore, MemberCategory, SanctionStore, SanctionType};
use easyvol::services::{access::StaticAccessControl, csrf};

const OPERATOR_ID: i64 = 7;

// Signs the operator in and hands back the session CSRF token
async fn sign_in(session: Session) -> String {
    session.insert(SESSION_KEY_USER_ID, OPERATOR_ID).await.unwrap();
    csrf::session_token(&session).await.unwrap()
}

fn app_with(store: Arc<InMemorySanctionStore>, access: StaticAccessControl) -> Router {
    // Only the login path touches the pool, and no test here reaches it
    let pool = PgPool::connect_lazy("postgres://localhost/easyvol_test").unwrap();

    Router::new()
        .route("/test/sign-in", get(sign_in))
        .merge(easyvol::api::auth::router())
        .merge(easyvol::api::sanctions::router())
        .layer(SessionManagerLayer::new(MemoryStore::default()).with_secure(false))
        .with_state(AppState {
            pool,
            sanctions: store,
            access: Arc::new(access),
        })
}

fn app() -> Router {
    app_with(
        Arc::new(InMemorySanctionStore::new()),
        StaticAccessControl::new(),
    )
}

fn editor() -> StaticAccessControl {
    StaticAccessControl::new()
        .with_user(OPERATOR_ID, "segreteria")
        .grant(OPERATOR_ID, "members", "view")
        .grant(OPERATOR_ID, "members", "edit")
        .grant(OPERATOR_ID, "junior_members", "view")
        .grant(OPERATOR_ID, "junior_members", "edit")
}

async fn seeded_store() -> Arc<InMemorySanctionStore> {
    let store = Arc::new(InMemorySanctionStore::new());
    store
        .insert_member(MemberCategory::Adult, 1, "MARIO", "ROSSI", "attivo")
        .await;
    store
        .insert_member(MemberCategory::Junior, 42, "LUCA", "BIANCHI", "sospeso")
        .await;
    store
        .insert_sanction(
            MemberCategory::Junior,
            42,
            NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            SanctionType::Sospeso,
        )
        .await;
    store
}

/// Returns the session cookie and CSRF token of a signed-in operator
async fn signed_in(app: &Router) -> (String, String) {
    let response = app
        .clone()
        .oneshot(Request::get("/test/sign-in").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let cookie = response.headers()[header::SET_COOKIE]
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string();
    let token = body_text(response).await;
    (cookie, token)
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

fn json_post(uri: &str, cookie: &str, token: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::COOKIE, cookie)
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-csrf-token", token)
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_login_form_carries_csrf_token() {
    let response = app()
        .oneshot(Request::get("/login").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key(header::SET_COOKIE));
    let html = body_text(response).await;
    assert!(html.contains("name=\"csrf_token\""));
}

#[tokio::test]
async fn test_login_with_bad_csrf_token_rerenders_form() {
    let response = app()
        .oneshot(
            Request::post("/login")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("username=mario&password=secret&csrf_token=forged"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("Token di sicurezza non valido"));
}

#[tokio::test]
async fn test_sanction_pages_require_login() {
    for uri in [
        "/members/1/sanctions",
        "/members/1/sanctions/new",
        "/junior-members/42/sanctions",
        "/junior-members/42/sanctions/3/edit",
    ] {
        let response = app()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{}", uri);
        assert_eq!(response.headers()[header::LOCATION], "/login");
    }
}

#[tokio::test]
async fn test_json_endpoint_answers_401_without_login() {
    let response = app()
        .oneshot(
            Request::post("/api/junior-members/42/sanctions")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    r#"{"sanction_date":"2024-03-01","sanction_type":"operativo"}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(response).await,
        json!({ "success": false, "error": "Autenticazione richiesta" })
    );
}

#[tokio::test]
async fn test_form_post_with_bad_csrf_token_writes_nothing() {
    let store = seeded_store().await;
    let app = app_with(store.clone(), editor());
    let (cookie, _) = signed_in(&app).await;

    let response = app
        .oneshot(
            Request::post("/members/1/sanctions")
                .header(header::COOKIE, &cookie)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(
                    "sanction_date=2024-03-01&sanction_type=sospeso&reason=&csrf_token=forged",
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("Token di sicurezza non valido"));

    assert!(store
        .list_sanctions(MemberCategory::Adult, 1)
        .await
        .unwrap()
        .is_empty());
    let member = store.find_member(MemberCategory::Adult, 1).await.unwrap().unwrap();
    assert_eq!(member.member_status, "attivo");
    assert!(store.audit_entries().await.is_empty());
}

#[tokio::test]
async fn test_form_post_saves_and_redirects_to_list() {
    let store = seeded_store().await;
    let app = app_with(store.clone(), editor());
    let (cookie, token) = signed_in(&app).await;

    let response = app
        .oneshot(
            Request::post("/members/1/sanctions")
                .header(header::COOKIE, &cookie)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(format!(
                    "sanction_date=2024-03-01&sanction_type=in_aspettativa&reason=&csrf_token={}",
                    token
                )))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers()[header::LOCATION],
        "/members/1/sanctions?success=1"
    );
    let member = store.find_member(MemberCategory::Adult, 1).await.unwrap().unwrap();
    assert_eq!(member.member_status, "sospeso");
}

#[tokio::test]
async fn test_list_shows_status_label() {
    let store = seeded_store().await;
    store
        .insert_member(
            MemberCategory::Adult,
            2,
            "SARA",
            "VERDI",
            "approvazione_consiglio_direttivo",
        )
        .await;
    let app = app_with(store, editor());
    let (cookie, _) = signed_in(&app).await;

    let response = app
        .oneshot(
            Request::get("/members/2/sanctions")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("Approvazione del Consiglio Direttivo"));
    assert!(!html.contains("approvazione_consiglio_direttivo"));
}

#[tokio::test]
async fn test_json_save_reactivates_junior_member() {
    let store = seeded_store().await;
    let app = app_with(store.clone(), editor());
    let (cookie, token) = signed_in(&app).await;

    let response = app
        .oneshot(json_post(
            "/api/junior-members/42/sanctions",
            &cookie,
            &token,
            json!({ "sanction_date": "2024-03-01", "sanction_type": "operativo" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({ "success": true, "new_status": "attivo" })
    );
    let member = store.find_member(MemberCategory::Junior, 42).await.unwrap().unwrap();
    assert_eq!(member.member_status, "attivo");
}

#[tokio::test]
async fn test_json_save_with_bad_csrf_token_is_forbidden() {
    let store = seeded_store().await;
    let app = app_with(store.clone(), editor());
    let (cookie, _) = signed_in(&app).await;

    let response = app
        .oneshot(json_post(
            "/api/junior-members/42/sanctions",
            &cookie,
            "forged",
            json!({ "sanction_date": "2024-03-01", "sanction_type": "operativo" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        body_json(response).await,
        json!({ "success": false, "error": "Token di sicurezza non valido" })
    );
    let sanctions = store.list_sanctions(MemberCategory::Junior, 42).await.unwrap();
    assert_eq!(sanctions.len(), 1);
}

#[tokio::test]
async fn test_json_save_rejects_type_outside_category() {
    let store = seeded_store().await;
    let app = app_with(store.clone(), editor());
    let (cookie, token) = signed_in(&app).await;

    let response = app
        .oneshot(json_post(
            "/api/junior-members/42/sanctions",
            &cookie,
            &token,
            json!({ "sanction_date": "2024-03-01", "sanction_type": "escluso" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body_json(response).await,
        json!({ "success": false, "error": "Tipo di provvedimento non valido" })
    );
    let member = store.find_member(MemberCategory::Junior, 42).await.unwrap().unwrap();
    assert_eq!(member.member_status, "sospeso");
}

#[tokio::test]
async fn test_json_save_for_unknown_member_is_not_found() {
    let app = app_with(seeded_store().await, editor());
    let (cookie, token) = signed_in(&app).await;

    let response = app
        .oneshot(json_post(
            "/api/members/999/sanctions",
            &cookie,
            &token,
            json!({ "sanction_date": "2024-03-01", "sanction_type": "dimesso" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        body_json(response).await,
        json!({ "success": false, "error": "Socio non trovato" })
    );
}

#[tokio::test]
async fn test_json_save_hides_persistence_failure() {
    let store = seeded_store().await;
    store.fail_status_writes(true).await;
    let app = app_with(store.clone(), editor());
    let (cookie, token) = signed_in(&app).await;

    let response = app
        .oneshot(json_post(
            "/api/members/1/sanctions",
            &cookie,
            &token,
            json!({ "sanction_date": "2024-03-01", "sanction_type": "dimesso" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await,
        json!({ "success": false, "error": "Errore durante il salvataggio del provvedimento" })
    );
    assert!(store
        .list_sanctions(MemberCategory::Adult, 1)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_json_save_with_missing_field_answers_in_json() {
    let app = app_with(seeded_store().await, editor());
    let (cookie, token) = signed_in(&app).await;

    let response = app
        .oneshot(json_post(
            "/api/members/1/sanctions",
            &cookie,
            &token,
            json!({ "sanction_date": "2024-03-01" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body_json(response).await,
        json!({ "success": false, "error": "Richiesta non valida" })
    );
}

#[tokio::test]
async fn test_json_save_without_edit_grant_is_forbidden() {
    let store = seeded_store().await;
    let viewer = StaticAccessControl::new()
        .with_user(OPERATOR_ID, "consultazione")
        .grant(OPERATOR_ID, "members", "view");
    let app = app_with(store.clone(), viewer);
    let (cookie, token) = signed_in(&app).await;

    let response = app
        .oneshot(json_post(
            "/api/members/1/sanctions",
            &cookie,
            &token,
            json!({ "sanction_date": "2024-03-01", "sanction_type": "sospeso" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        body_json(response).await,
        json!({ "success": false, "error": "Accesso negato" })
    );
    assert!(store.audit_entries().await.is_empty());
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let response = app()
        .oneshot(Request::get("/cards").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
