use askama::Template;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Extension, Form, Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use tower_sessions::Session;

use crate::api::middleware::{
    auth::{
        require_api_auth, require_auth, require_permission, AuthError, AuthenticatedUser,
        MSG_FORBIDDEN, MSG_LOGIN_REQUIRED,
    },
    session::AppState,
};
use crate::models::{member::Member, sanction::Sanction};
use crate::sanctions::{
    engine::{self, SanctionApplied, SanctionError, SanctionInput, SanctionOutcome},
    policy::{status_label, MemberCategory},
    store::{SanctionStore, StoreError},
};
use crate::services::csrf;

const MSG_INVALID_CSRF: &str = "Token di sicurezza non valido";
const MSG_BAD_REQUEST: &str = "Richiesta non valida";
const MSG_SYSTEM_ERROR: &str = "Errore di sistema. Riprova più tardi.";
const RECENT_ACTIVITY_LIMIT: i64 = 10;

#[derive(Debug)]
pub enum SanctionsApiError {
    AuthError(AuthError),
    StoreError(StoreError),
    CsrfError(csrf::CsrfError),
    DatabaseError(sqlx::Error),
    MemberNotFound,
    SanctionNotFound,
}

impl IntoResponse for SanctionsApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            SanctionsApiError::AuthError(e) => return e.into_response(),
            SanctionsApiError::StoreError(e) => {
                tracing::error!(error = %e, "Sanction store failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    engine::MSG_SAVE_FAILED.to_string(),
                )
            }
            SanctionsApiError::CsrfError(e) => {
                tracing::error!(error = %e, "CSRF token failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Session error occurred.".to_string(),
                )
            }
            SanctionsApiError::DatabaseError(e) => {
                tracing::error!(error = %e, "Database failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }
            SanctionsApiError::MemberNotFound => {
                (StatusCode::NOT_FOUND, "Socio non trovato".to_string())
            }
            SanctionsApiError::SanctionNotFound => {
                (StatusCode::NOT_FOUND, "Provvedimento non trovato".to_string())
            }
        };

        (status, message).into_response()
    }
}

impl From<AuthError> for SanctionsApiError {
    fn from(e: AuthError) -> Self {
        SanctionsApiError::AuthError(e)
    }
}

impl From<StoreError> for SanctionsApiError {
    fn from(e: StoreError) -> Self {
        SanctionsApiError::StoreError(e)
    }
}

impl From<csrf::CsrfError> for SanctionsApiError {
    fn from(e: csrf::CsrfError) -> Self {
        SanctionsApiError::CsrfError(e)
    }
}

// Templates

struct TypeOption {
    value: &'static str,
    label: &'static str,
    selected: bool,
}

#[derive(Template)]
#[template(path = "sanctions/form.html")]
struct SanctionFormTemplate {
    category_name: &'static str,
    member_name: String,
    back_url: String,
    action_url: String,
    is_edit: bool,
    csrf_token: String,
    sanction_date: String,
    reason: String,
    options: Vec<TypeOption>,
    rules: Vec<String>,
    errors: Vec<String>,
}

struct SanctionRow {
    id: i64,
    date: String,
    label: String,
    reason: String,
}

struct ActivityRow {
    when: String,
    action: String,
    description: String,
}

#[derive(Template)]
#[template(path = "sanctions/list.html")]
struct SanctionListTemplate {
    category_name: &'static str,
    member_name: String,
    registration_number: String,
    member_status: String,
    base_url: String,
    sanctions: Vec<SanctionRow>,
    activity: Vec<ActivityRow>,
    can_edit: bool,
    success: bool,
}

/// Values shown in the form, either from a stored sanction or a rejected post
struct FormValues {
    sanction_date: String,
    sanction_type: String,
    reason: String,
}

impl FormValues {
    fn blank() -> Self {
        Self {
            sanction_date: Utc::now().date_naive().format("%Y-%m-%d").to_string(),
            sanction_type: String::new(),
            reason: String::new(),
        }
    }

    fn from_sanction(sanction: &Sanction) -> Self {
        Self {
            sanction_date: sanction.sanction_date.format("%Y-%m-%d").to_string(),
            sanction_type: sanction.sanction_type.clone(),
            reason: sanction.reason.clone().unwrap_or_default(),
        }
    }
}

fn members_url(category: MemberCategory, member_id: i64) -> String {
    format!("{}/{}/sanctions", category.path_prefix(), member_id)
}

fn render_form(
    category: MemberCategory,
    member: &Member,
    sanction_id: Option<i64>,
    csrf_token: String,
    values: FormValues,
    errors: Vec<String>,
) -> SanctionFormTemplate {
    let policy = category.policy();
    let back_url = members_url(category, member.id);
    let action_url = match sanction_id {
        Some(id) => format!("{}/{}", back_url, id),
        None => back_url.clone(),
    };

    SanctionFormTemplate {
        category_name: category.display_name(),
        member_name: member.full_name(),
        back_url,
        action_url,
        is_edit: sanction_id.is_some(),
        csrf_token,
        sanction_date: values.sanction_date,
        reason: values.reason,
        options: policy
            .allowed
            .iter()
            .map(|t| TypeOption {
                value: t.as_str(),
                label: t.label(),
                selected: t.as_str() == values.sanction_type,
            })
            .collect(),
        rules: policy.rules_summary(),
        errors,
    }
}

async fn load_member(
    store: &dyn SanctionStore,
    category: MemberCategory,
    member_id: i64,
) -> Result<Member, SanctionsApiError> {
    store
        .find_member(category, member_id)
        .await?
        .ok_or(SanctionsApiError::MemberNotFound)
}

async fn load_member_sanction(
    store: &dyn SanctionStore,
    category: MemberCategory,
    member_id: i64,
    sanction_id: i64,
) -> Result<Sanction, SanctionsApiError> {
    store
        .find_sanction(category, sanction_id)
        .await?
        .filter(|s| s.member_id == member_id)
        .ok_or(SanctionsApiError::SanctionNotFound)
}

#[derive(Deserialize)]
struct ListQuery {
    success: Option<u8>,
}

/// Sanction history and current status of a member
async fn list_sanctions(
    State(state): State<AppState>,
    Extension(category): Extension<MemberCategory>,
    session: Session,
    Path(member_id): Path<i64>,
    Query(query): Query<ListQuery>,
) -> Result<SanctionListTemplate, SanctionsApiError> {
    let access = state.access.as_ref();
    let user = require_permission(access, &session, category.module(), "view").await?;
    let can_edit = access
        .has_permission(user.user_id, category.module(), "edit")
        .await
        .map_err(SanctionsApiError::DatabaseError)?;

    let store = state.sanctions.as_ref();
    let member = load_member(store, category, member_id).await?;
    let sanctions = store.list_sanctions(category, member_id).await?;
    let activity = store
        .recent_activity(category, member_id, RECENT_ACTIVITY_LIMIT)
        .await?;

    Ok(SanctionListTemplate {
        category_name: category.display_name(),
        member_name: member.full_name(),
        registration_number: member.registration_number.clone().unwrap_or_default(),
        member_status: status_label(&member.member_status).to_string(),
        base_url: members_url(category, member_id),
        sanctions: sanctions
            .iter()
            .map(|s| SanctionRow {
                id: s.id,
                date: s.sanction_date.format("%d/%m/%Y").to_string(),
                label: s.label().to_string(),
                reason: s.reason.clone().unwrap_or_default(),
            })
            .collect(),
        activity: activity
            .into_iter()
            .map(|entry| ActivityRow {
                when: entry.created_at.format("%d/%m/%Y %H:%M").to_string(),
                action: entry.action,
                description: entry.description.unwrap_or_default(),
            })
            .collect(),
        can_edit,
        success: query.success == Some(1),
    })
}

/// Shows the add form
async fn new_sanction_form(
    State(state): State<AppState>,
    Extension(category): Extension<MemberCategory>,
    session: Session,
    Path(member_id): Path<i64>,
) -> Result<SanctionFormTemplate, SanctionsApiError> {
    require_permission(state.access.as_ref(), &session, category.module(), "edit").await?;

    let member = load_member(state.sanctions.as_ref(), category, member_id).await?;
    let csrf_token = csrf::session_token(&session).await?;

    Ok(render_form(
        category,
        &member,
        None,
        csrf_token,
        FormValues::blank(),
        Vec::new(),
    ))
}

/// Shows the edit form
async fn edit_sanction_form(
    State(state): State<AppState>,
    Extension(category): Extension<MemberCategory>,
    session: Session,
    Path((member_id, sanction_id)): Path<(i64, i64)>,
) -> Result<SanctionFormTemplate, SanctionsApiError> {
    require_permission(state.access.as_ref(), &session, category.module(), "edit").await?;

    let store = state.sanctions.as_ref();
    let member = load_member(store, category, member_id).await?;
    let sanction = load_member_sanction(store, category, member_id, sanction_id).await?;
    let csrf_token = csrf::session_token(&session).await?;

    Ok(render_form(
        category,
        &member,
        Some(sanction_id),
        csrf_token,
        FormValues::from_sanction(&sanction),
        Vec::new(),
    ))
}

#[derive(Deserialize)]
struct SanctionForm {
    #[serde(default)]
    sanction_date: String,
    #[serde(default)]
    sanction_type: String,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    csrf_token: String,
}

/// Shared create/update path of the HTML form
async fn submit_sanction(
    state: AppState,
    category: MemberCategory,
    session: Session,
    member_id: i64,
    sanction_id: Option<i64>,
    form: SanctionForm,
) -> Result<Response, SanctionsApiError> {
    let user = require_permission(state.access.as_ref(), &session, category.module(), "edit").await?;

    let store = state.sanctions.as_ref();
    let member = load_member(store, category, member_id).await?;

    let values = FormValues {
        sanction_date: form.sanction_date.clone(),
        sanction_type: form.sanction_type.clone(),
        reason: form.reason.clone(),
    };

    if !csrf::validate(&session, &form.csrf_token).await? {
        let csrf_token = csrf::session_token(&session).await?;
        return Ok(render_form(
            category,
            &member,
            sanction_id,
            csrf_token,
            values,
            vec![MSG_INVALID_CSRF.to_string()],
        )
        .into_response());
    }

    let input = SanctionInput {
        sanction_date: form.sanction_date,
        sanction_type: form.sanction_type,
        reason: Some(form.reason),
        created_by: user.user_id,
    };

    let errors = match engine::apply_sanction(store, category, member_id, sanction_id, &input).await {
        Ok(_) => {
            let target = format!("{}?success=1", members_url(category, member_id));
            return Ok(Redirect::to(&target).into_response());
        }
        Err(SanctionError::Validation(errors)) => errors,
        Err(SanctionError::MemberNotFound(_)) => return Err(SanctionsApiError::MemberNotFound),
        Err(SanctionError::SanctionNotFound(_)) => {
            return Err(SanctionsApiError::SanctionNotFound)
        }
        Err(e @ SanctionError::Persistence(_)) => vec![e.user_message()],
    };

    let csrf_token = csrf::session_token(&session).await?;
    Ok(render_form(category, &member, sanction_id, csrf_token, values, errors).into_response())
}

async fn create_sanction(
    State(state): State<AppState>,
    Extension(category): Extension<MemberCategory>,
    session: Session,
    Path(member_id): Path<i64>,
    Form(form): Form<SanctionForm>,
) -> Result<Response, SanctionsApiError> {
    submit_sanction(state, category, session, member_id, None, form).await
}

async fn update_sanction(
    State(state): State<AppState>,
    Extension(category): Extension<MemberCategory>,
    session: Session,
    Path((member_id, sanction_id)): Path<(i64, i64)>,
    Form(form): Form<SanctionForm>,
) -> Result<Response, SanctionsApiError> {
    submit_sanction(state, category, session, member_id, Some(sanction_id), form).await
}

#[derive(Deserialize)]
struct SanctionJsonRequest {
    #[serde(default)]
    sanction_id: i64,
    sanction_date: String,
    sanction_type: String,
    #[serde(default)]
    reason: Option<String>,
}

fn json_failure(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(SanctionOutcome::failed(message))).into_response()
}

/// JSON variant of the sanction save; `sanction_id` 0 or absent creates.
///
/// Every answer, including auth and body errors, is a `SanctionOutcome`.
async fn save_sanction_json(
    State(state): State<AppState>,
    Extension(category): Extension<MemberCategory>,
    session: Session,
    headers: HeaderMap,
    Path(member_id): Path<i64>,
    payload: Result<Json<SanctionJsonRequest>, JsonRejection>,
) -> Response {
    let user_id =
        match require_permission(state.access.as_ref(), &session, category.module(), "edit").await {
            Ok(AuthenticatedUser { user_id }) => user_id,
            Err(AuthError::Unauthorized) => {
                return json_failure(StatusCode::UNAUTHORIZED, MSG_LOGIN_REQUIRED)
            }
            Err(AuthError::Forbidden) => return json_failure(StatusCode::FORBIDDEN, MSG_FORBIDDEN),
            Err(e) => {
                tracing::error!(error = ?e, "Permission check failed");
                return json_failure(StatusCode::INTERNAL_SERVER_ERROR, MSG_SYSTEM_ERROR);
            }
        };

    let provided = headers
        .get("x-csrf-token")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    match csrf::validate(&session, provided).await {
        Ok(true) => {}
        Ok(false) => return json_failure(StatusCode::FORBIDDEN, MSG_INVALID_CSRF),
        Err(e) => {
            tracing::error!(error = %e, "CSRF token failure");
            return json_failure(StatusCode::INTERNAL_SERVER_ERROR, MSG_SYSTEM_ERROR);
        }
    }

    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            tracing::debug!(error = %rejection.body_text(), "Rejected sanction request body");
            return json_failure(rejection.status(), MSG_BAD_REQUEST);
        }
    };

    let input = SanctionInput {
        sanction_date: payload.sanction_date,
        sanction_type: payload.sanction_type,
        reason: payload.reason,
        created_by: user_id,
    };
    let sanction_id = (payload.sanction_id > 0).then_some(payload.sanction_id);

    let result =
        engine::apply_sanction(state.sanctions.as_ref(), category, member_id, sanction_id, &input)
            .await;
    let status = match &result {
        Ok(_) => StatusCode::OK,
        Err(SanctionError::Validation(_)) => StatusCode::UNPROCESSABLE_ENTITY,
        Err(SanctionError::MemberNotFound(_)) | Err(SanctionError::SanctionNotFound(_)) => {
            StatusCode::NOT_FOUND
        }
        Err(SanctionError::Persistence(_)) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let outcome = match result {
        Ok(SanctionApplied { new_status, .. }) => SanctionOutcome::applied(new_status),
        Err(e) => SanctionOutcome::failed(e.user_message()),
    };

    (status, Json(outcome)).into_response()
}

fn registry_routes(category: MemberCategory) -> Router<AppState> {
    Router::new()
        .route(
            "/:member_id/sanctions",
            get(list_sanctions).post(create_sanction),
        )
        .route("/:member_id/sanctions/new", get(new_sanction_form))
        .route(
            "/:member_id/sanctions/:sanction_id/edit",
            get(edit_sanction_form),
        )
        .route("/:member_id/sanctions/:sanction_id", post(update_sanction))
        .layer(Extension(category))
}

fn json_routes(category: MemberCategory) -> Router<AppState> {
    Router::new()
        .route("/:member_id/sanctions", post(save_sanction_json))
        .layer(Extension(category))
}

pub fn router() -> Router<AppState> {
    let pages = Router::new()
        .nest("/members", registry_routes(MemberCategory::Adult))
        .nest("/junior-members", registry_routes(MemberCategory::Junior))
        .route_layer(middleware::from_fn(require_auth));

    let api = Router::new()
        .nest("/api/members", json_routes(MemberCategory::Adult))
        .nest("/api/junior-members", json_routes(MemberCategory::Junior))
        .route_layer(middleware::from_fn(require_api_auth));

    pages.merge(api)
}
