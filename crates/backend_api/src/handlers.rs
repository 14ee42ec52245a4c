use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{NaiveDate, Utc};
use dashboard_engine::{build_dashboard, DashboardSnapshot, ReportingWindow};
use metrics_parser::{MetricsPreview, MetricsTextParser};
use models::{
    Client, ClientPatch, DashboardView, MetricRecord, NewClient, ReportingPeriod, Role, Settings,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    error::ApiError,
    identity::{IdentityProvider, Session, User},
    repository::StorageRepository,
    Result,
};

pub const MAX_EMAIL_LEN: usize = 255;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn StorageRepository>,
    pub identity: Arc<dyn IdentityProvider>,
    pub settings: Arc<Settings>,
}

/// The authenticated user behind a request.
pub struct Caller {
    pub user: User,
    pub role: Option<Role>,
    pub token: String,
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Caller> {
    let token = bearer_token(headers)
        .ok_or_else(|| ApiError::Unauthorized("no token provided".to_string()))?;
    let user = state
        .identity
        .user_for_token(token)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("invalid or expired token".to_string()))?;
    let role = state.identity.role_of(&user.id).await?;
    Ok(Caller {
        user,
        role,
        token: token.to_string(),
    })
}

async fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<Caller> {
    let caller = authenticate(state, headers).await?;
    if caller.role != Some(Role::Admin) {
        tracing::warn!(user_id = %caller.user.id, "admin access denied");
        return Err(ApiError::Forbidden("admin access required".to_string()));
    }
    Ok(caller)
}

#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    pub view: Option<String>,
    pub period: Option<String>,
}

impl DashboardQuery {
    fn view(&self, fallback: DashboardView) -> Result<DashboardView> {
        match &self.view {
            Some(v) => v.parse().map_err(ApiError::BadRequest),
            None => Ok(fallback),
        }
    }

    fn period(&self) -> Result<Option<ReportingPeriod>> {
        self.period
            .as_deref()
            .map(|p| {
                p.parse::<ReportingPeriod>()
                    .map_err(|e| ApiError::BadRequest(e.to_string()))
            })
            .transpose()
    }
}

async fn dashboard_for(
    state: &AppState,
    client_id: &str,
    query: &DashboardQuery,
) -> Result<DashboardSnapshot> {
    let view = query.view(state.settings.default_view)?;
    let requested = query.period()?;
    let reference = settings_loader::reference_period(&state.settings, Utc::now().date_naive());
    let window = ReportingWindow::resolve(view, reference, requested);
    let rows = state.storage.list_metrics(client_id, &window).await?;
    Ok(build_dashboard(
        &rows,
        view,
        reference,
        requested,
        &state.settings.currency_symbol,
    ))
}

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "assistant-analytics-api"
    }))
}

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// POST /api/auth/sign-in
pub async fn sign_in(
    State(state): State<AppState>,
    Json(req): Json<SignInRequest>,
) -> Result<Json<Session>> {
    let session = state.identity.sign_in(&req.email, &req.password).await?;
    Ok(Json(session))
}

#[derive(Debug, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

/// POST /api/auth/sign-up
/// Creates an account without a role and signs it in
pub async fn sign_up(
    State(state): State<AppState>,
    Json(req): Json<SignUpRequest>,
) -> Result<impl IntoResponse> {
    validate_email(req.email.trim())?;
    if req.password.is_empty() {
        return Err(ApiError::BadRequest("password is required".to_string()));
    }
    let user_id = state
        .identity
        .sign_up(&req.email, &req.password, req.full_name.as_deref())
        .await?;
    tracing::info!(user_id = %user_id, "account created");
    let session = state.identity.sign_in(&req.email, &req.password).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: Role,
}

/// POST /api/auth/role
/// One-time role choice for an account that has none yet
pub async fn select_role(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RoleRequest>,
) -> Result<Json<Session>> {
    let caller = authenticate(&state, &headers).await?;
    if caller.role.is_some() {
        return Err(ApiError::Forbidden("role already selected".to_string()));
    }
    if req.role == Role::Admin && !state.settings.allow_admin_self_select {
        tracing::warn!(user_id = %caller.user.id, "admin self-selection refused");
        return Err(ApiError::Forbidden(
            "admin role is assigned by an administrator".to_string(),
        ));
    }
    state.identity.assign_role(&caller.user.id, req.role).await?;
    Ok(Json(Session {
        access_token: caller.token,
        user_id: caller.user.id,
        email: caller.user.email,
        role: Some(req.role),
    }))
}

/// POST /api/auth/sign-out
pub async fn sign_out(State(state): State<AppState>, headers: HeaderMap) -> Result<StatusCode> {
    let caller = authenticate(&state, &headers).await?;
    state.identity.sign_out(&caller.token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/me/dashboard
/// Dashboard of the client account bound to the signed-in user
pub async fn my_dashboard(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<DashboardSnapshot>> {
    let caller = authenticate(&state, &headers).await?;
    if caller.role != Some(Role::Client) {
        return Err(ApiError::Forbidden("client access required".to_string()));
    }
    let client = state
        .storage
        .client_by_user(&caller.user.id)
        .await?
        .ok_or_else(|| ApiError::ClientNotFound(format!("user {}", caller.user.id)))?;
    Ok(Json(dashboard_for(&state, &client.id, &query).await?))
}

/// GET /api/clients
pub async fn list_clients(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Client>>> {
    require_admin(&state, &headers).await?;
    Ok(Json(state.storage.list_clients().await?))
}

/// POST /api/clients
/// With an e-mail a client login is created and bound to the record;
/// without one the record is bound to the creating administrator.
pub async fn create_client(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(new): Json<NewClient>,
) -> Result<impl IntoResponse> {
    let caller = require_admin(&state, &headers).await?;
    let user_id = match new.email.as_deref() {
        Some(email) => {
            validate_email(email)?;
            let temp_password = uuid::Uuid::new_v4().simple().to_string();
            let user_id = state
                .identity
                .sign_up(email, &temp_password, Some(&new.client_name))
                .await?;
            state.identity.assign_role(&user_id, Role::Client).await?;
            user_id
        }
        None => caller.user.id.clone(),
    };
    let client = state.storage.create_client(new, &user_id).await?;
    Ok((StatusCode::CREATED, Json(client)))
}

/// PATCH /api/clients/:id
pub async fn update_client(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(patch): Json<ClientPatch>,
) -> Result<Json<Client>> {
    require_admin(&state, &headers).await?;
    if patch.is_empty() {
        return Err(ApiError::BadRequest("nothing to update".to_string()));
    }
    Ok(Json(state.storage.update_client(&id, patch).await?))
}

#[derive(Debug, Deserialize)]
pub struct EmailUpdateRequest {
    pub user_id: String,
    pub new_email: String,
}

fn validate_email(email: &str) -> Result<()> {
    if email.chars().count() > MAX_EMAIL_LEN {
        return Err(ApiError::BadRequest("email too long".to_string()));
    }
    if !EMAIL_RE.is_match(email) {
        return Err(ApiError::BadRequest("invalid email format".to_string()));
    }
    Ok(())
}

/// PUT /api/clients/:id/email
/// Changes the login e-mail and the contact e-mail together
pub async fn update_client_email(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<EmailUpdateRequest>,
) -> Result<Json<Client>> {
    let caller = require_admin(&state, &headers).await?;
    uuid::Uuid::parse_str(&req.user_id)
        .map_err(|_| ApiError::BadRequest("invalid user ID format".to_string()))?;
    validate_email(&req.new_email)?;

    let client = state.storage.get_client(&id).await?;
    if client.user_id != req.user_id {
        return Err(ApiError::BadRequest(
            "user does not belong to this client".to_string(),
        ));
    }
    let previous = state
        .identity
        .user(&req.user_id)
        .await?
        .ok_or_else(|| ApiError::BadRequest(format!("unknown user {}", req.user_id)))?;
    state
        .identity
        .update_email(&req.user_id, &req.new_email)
        .await?;
    let patch = ClientPatch {
        email: Some(req.new_email),
        ..ClientPatch::default()
    };
    match state.storage.update_client(&id, patch).await {
        Ok(updated) => {
            tracing::info!(admin = %caller.user.id, client_id = %id, "client email updated");
            Ok(Json(updated))
        }
        Err(e) => {
            // login and contact e-mail must not diverge
            if let Err(rollback) = state
                .identity
                .update_email(&req.user_id, &previous.email)
                .await
            {
                tracing::error!(user_id = %req.user_id, "login email rollback failed: {}", rollback);
            }
            Err(e)
        }
    }
}

/// GET /api/clients/:id/dashboard
pub async fn client_dashboard(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<DashboardSnapshot>> {
    require_admin(&state, &headers).await?;
    state.storage.get_client(&id).await?;
    Ok(Json(dashboard_for(&state, &id, &query).await?))
}

#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    pub text: String,
    #[serde(default)]
    pub period: Option<ReportingPeriod>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

/// POST /api/clients/:id/metrics/preview
/// Parses pasted text into a candidate record without storing it
pub async fn preview_metrics(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<PreviewRequest>,
) -> Result<Json<MetricsPreview>> {
    require_admin(&state, &headers).await?;
    state.storage.get_client(&id).await?;
    let today = Utc::now().date_naive();
    let date = req.date.unwrap_or(today);
    let period = req
        .period
        .unwrap_or_else(|| settings_loader::reference_period(&state.settings, today));
    let parser = MetricsTextParser::new(state.settings.max_input_chars);
    Ok(Json(parser.parse_for_review(&req.text, &id, period, date)?))
}

/// POST /api/clients/:id/metrics
/// Stores a reviewed record for the client in the path
pub async fn create_metric(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(mut record): Json<MetricRecord>,
) -> Result<impl IntoResponse> {
    require_admin(&state, &headers).await?;
    record.client_id = id;
    record.id = None;
    let stored = state.storage.create_metric(record).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

/// GET /api/managers
pub async fn list_managers(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse> {
    require_admin(&state, &headers).await?;
    Ok(Json(state.storage.list_managers().await?))
}
