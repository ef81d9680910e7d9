use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};

use super::session::{Session, SessionStore, expired_cookie, session_cookie, session_id};
use crate::checklist::{Checklist, ChecklistRef, GitHubUser};
use crate::context::RequestContext;
use crate::errors::ChecklistError;
use crate::github::GitHubGateway;
use crate::usecase::Usecase;

const HTML_SHELL: &str = r#"<!DOCTYPE html>
<meta name=viewport content="width=device-width">
<body><div id="main"></div></body>
<script src="/js/bundle.js"></script>
"#;

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub usecase: Usecase,
    pub github: Arc<dyn GitHubGateway>,
    pub sessions: SessionStore,
    /// Trust `X-Forwarded-*` headers when building absolute URLs.
    pub behind_proxy: bool,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    /// Logged-in user for this request, if the session carries one with a token.
    fn current_user(&self, headers: &HeaderMap) -> Option<GitHubUser> {
        let id = session_id(headers)?;
        self.sessions
            .get(&id)?
            .user
            .filter(|user| user.token.is_some())
    }

    fn require_user(&self, headers: &HeaderMap) -> Result<GitHubUser, ApiError> {
        self.current_user(headers).ok_or(ApiError::Forbidden)
    }
}

// ── Request / response payload types ──────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ChecklistQuery {
    pub owner: String,
    pub repo: String,
    pub number: u64,
    #[serde(default)]
    pub stage: String,
}

impl ChecklistQuery {
    fn checklist_ref(&self) -> ChecklistRef {
        ChecklistRef::new(&self.owner, &self.repo, self.number).with_stage(&self.stage)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckForm {
    pub owner: String,
    pub repo: String,
    pub number: u64,
    #[serde(default)]
    pub stage: String,
    pub feature_number: u64,
}

impl CheckForm {
    fn checklist_ref(&self) -> ChecklistRef {
        ChecklistRef::new(&self.owner, &self.repo, self.number).with_stage(&self.stage)
    }
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChecklistResponse {
    #[serde(rename = "Checklist")]
    pub checklist: Checklist,
    #[serde(rename = "Me")]
    pub me: GitHubUser,
}

// ── Error type ────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Forbidden,
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "Login required".to_string()),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

impl From<ChecklistError> for ApiError {
    fn from(err: ChecklistError) -> Self {
        match err {
            ChecklistError::ItemNotFound { .. } => ApiError::NotFound(err.to_string()),
            ChecklistError::GitHub(e) => ApiError::Internal(format!("GitHub API error: {:#}", e)),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/auth", get(auth))
        .route("/auth/callback", get(auth_callback))
        .route("/auth/clear", get(auth_clear))
        .route("/api/me", get(api_me))
        .route("/api/checklist", get(api_checklist))
        .route("/api/check", axum::routing::put(add_check).delete(remove_check))
        .route("/{owner}/{repo}/pull/{number}", get(index))
        .route("/{owner}/{repo}/pull/{number}/{stage}", get(index))
}

fn redirect(location: &str, cookie: String) -> Response {
    (
        StatusCode::FOUND,
        [(header::LOCATION, location.to_string()), (header::SET_COOKIE, cookie)],
    )
        .into_response()
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn index() -> Html<&'static str> {
    Html(HTML_SHELL)
}

async fn health() -> &'static str {
    "ok"
}

async fn auth(State(state): State<SharedState>, headers: HeaderMap) -> Result<Response, ApiError> {
    let oauth_state = uuid::Uuid::new_v4().simple().to_string();
    let url = state
        .github
        .auth_code_url(&oauth_state)
        .map_err(|e| ApiError::Internal(format!("{:#}", e)))?;

    let existing = session_id(&headers).and_then(|id| state.sessions.get(&id).map(|s| (id, s)));
    let id = match existing {
        Some((id, mut session)) => {
            session.oauth_state = Some(oauth_state);
            state.sessions.save(&id, session);
            id
        }
        None => state.sessions.create(Session {
            oauth_state: Some(oauth_state),
            user: None,
        }),
    };

    Ok(redirect(&url, session_cookie(&id)))
}

async fn auth_callback(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, ApiError> {
    let id = session_id(&headers).ok_or_else(|| ApiError::BadRequest("No session".to_string()))?;
    let mut session = state
        .sessions
        .get(&id)
        .ok_or_else(|| ApiError::BadRequest("No session".to_string()))?;

    let expected = session.oauth_state.take();
    if expected.is_none() || query.state != expected {
        tracing::warn!("OAuth state mismatch");
        return Err(ApiError::BadRequest("OAuth state mismatch".to_string()));
    }

    let code = query
        .code
        .ok_or_else(|| ApiError::BadRequest("Missing code".to_string()))?;
    let user = state
        .github
        .authenticate_user(&code)
        .await
        .map_err(|e| ApiError::Internal(format!("{:#}", e)))?;

    state.usecase.add_user(&user)?;
    tracing::info!(user = %user.login, "User logged in");

    session.user = Some(user);
    state.sessions.save(&id, session);

    Ok(redirect("/", session_cookie(&id)))
}

async fn auth_clear(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    if let Some(id) = session_id(&headers) {
        state.sessions.remove(&id);
    }
    redirect("/", expired_cookie())
}

async fn api_me(State(state): State<SharedState>, headers: HeaderMap) -> Json<Option<GitHubUser>> {
    Json(state.current_user(&headers))
}

async fn api_checklist(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(query): Query<ChecklistQuery>,
) -> Result<Json<ChecklistResponse>, ApiError> {
    let me = state.require_user(&headers)?;
    let checklist = state
        .usecase
        .get_checklist(&me, &query.checklist_ref())
        .await?;
    Ok(Json(ChecklistResponse { checklist, me }))
}

async fn add_check(
    State(state): State<SharedState>,
    headers: HeaderMap,
    axum::Form(form): axum::Form<CheckForm>,
) -> Result<Json<ChecklistResponse>, ApiError> {
    let me = state.require_user(&headers)?;
    let ctx = RequestContext::from_headers(&headers, state.behind_proxy);
    let checklist = state
        .usecase
        .add_check(&ctx, &form.checklist_ref(), form.feature_number, &me)
        .await?;
    Ok(Json(ChecklistResponse { checklist, me }))
}

async fn remove_check(
    State(state): State<SharedState>,
    headers: HeaderMap,
    axum::Form(form): axum::Form<CheckForm>,
) -> Result<Json<ChecklistResponse>, ApiError> {
    let me = state.require_user(&headers)?;
    let checklist = state
        .usecase
        .remove_check(&form.checklist_ref(), form.feature_number, &me)
        .await?;
    Ok(Json(ChecklistResponse { checklist, me }))
}
