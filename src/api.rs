//! HTTP API for the mediashelf server

use axum::{
    Extension, Json, Router,
    extract::{
        Path, Query, Request, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};
use chrono::{FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::Identity;
use crate::config::Config;
use crate::db::Database;
use crate::error::{StoreError, StoreResult};
use crate::models::{MediaItem, MediaType, MediaUpdate, NewMediaItem, Session, User};
use crate::query::{self, QuerySpec, SortKey, SortOrder, StatusFilter};
use crate::stats::Statistics;

/// Application state shared across handlers
pub struct AppState {
    pub db: Database,
    pub config: Config,
}

impl AppState {
    pub fn new(db: Database, config: Config) -> Arc<Self> {
        Arc::new(Self { db, config })
    }

    fn identity(&self) -> Identity<'_> {
        Identity::new(&self.db, &self.config.auth)
    }
}

/// Signed-in caller, inserted by [`auth_middleware`]
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub token: String,
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/api/v1/auth/signout", post(sign_out))
        .route("/api/v1/auth/me", get(me))
        .route("/api/v1/items", get(list_items).post(create_item))
        .route("/api/v1/items/{id}", patch(update_item).delete(delete_item))
        .route("/api/v1/items/{id}/bookmark", post(toggle_bookmark))
        .route("/api/v1/items/{id}/share", post(share_item).delete(unshare_item))
        .route("/api/v1/stats", get(stats))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let public = Router::new()
        .route("/health", get(health))
        .route("/api/v1/auth/signup", post(sign_up))
        .route("/api/v1/auth/signin", post(sign_in))
        .route("/shared/{token}", get(shared_item));

    let mut router = public
        .merge(protected)
        .layer(TraceLayer::new_for_http());

    if state.config.server.cors_permissive {
        router = router.layer(CorsLayer::permissive());
    }

    router.with_state(state)
}

/// Health check endpoint (no auth required)
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "mediashelf",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Auth middleware - resolves the Bearer session token to a user
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = match bearer_token(&request) {
        Some(token) => token.to_string(),
        None => {
            return ApiError(StoreError::auth("Missing or invalid Authorization header"))
                .into_response();
        }
    };

    match state.identity().current_user(&token) {
        Ok(Some(user)) => {
            request
                .extensions_mut()
                .insert(CurrentUser { user, token });
            next.run(request).await
        }
        Ok(None) => ApiError(StoreError::auth("Invalid or expired session")).into_response(),
        Err(err) => ApiError(err).into_response(),
    }
}

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
}

#[derive(Debug, Deserialize)]
struct Credentials {
    email: String,
    password: String,
}

async fn sign_up(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<(StatusCode, Json<Session>), ApiError> {
    let Json(credentials) = payload?;
    let session = state
        .identity()
        .sign_up(&credentials.email, &credentials.password)?;
    Ok((StatusCode::CREATED, Json(session)))
}

async fn sign_in(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<Session>, ApiError> {
    let Json(credentials) = payload?;
    let session = state
        .identity()
        .sign_in(&credentials.email, &credentials.password)?;
    Ok(Json(session))
}

async fn sign_out(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<StatusCode, ApiError> {
    state.identity().sign_out(&current.token)?;
    tracing::info!(user_id = %current.user.id, "User signed out");
    Ok(StatusCode::NO_CONTENT)
}

async fn me(Extension(current): Extension<CurrentUser>) -> Json<User> {
    Json(current.user)
}

/// Query string of the list endpoint; missing values use the list defaults
#[derive(Debug, Default, Deserialize)]
pub struct ItemsQuery {
    #[serde(rename = "type")]
    pub media_type: Option<MediaType>,
    pub status: Option<String>,
    pub q: Option<String>,
    pub sort: Option<SortKey>,
    pub order: Option<SortOrder>,
}

impl From<ItemsQuery> for QuerySpec {
    fn from(params: ItemsQuery) -> Self {
        QuerySpec {
            media_type: params.media_type.unwrap_or_default(),
            status_filter: params
                .status
                .as_deref()
                .map(StatusFilter::parse)
                .unwrap_or_default(),
            search_text: params.q.unwrap_or_default(),
            sort_key: params.sort.unwrap_or_default(),
            sort_order: params.order.unwrap_or_default(),
        }
    }
}

async fn list_items(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    params: Result<Query<ItemsQuery>, QueryRejection>,
) -> Result<Json<Vec<MediaItem>>, ApiError> {
    let Query(params) = params?;
    let items = state.db.fetch_all(&current.user.id)?;
    let spec = QuerySpec::from(params);
    let view: Vec<MediaItem> = query::run(&items, &spec).into_iter().cloned().collect();

    tracing::debug!(
        user_id = %current.user.id,
        media_type = %spec.media_type,
        status = %spec.status_filter,
        total = items.len(),
        shown = view.len(),
        "Items listed"
    );

    Ok(Json(view))
}

async fn create_item(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    payload: Result<Json<NewMediaItem>, JsonRejection>,
) -> Result<(StatusCode, Json<MediaItem>), ApiError> {
    let Json(new) = payload?;
    let item = state.db.create(&current.user.id, new)?;
    Ok((StatusCode::CREATED, Json(item)))
}

async fn update_item(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
    payload: Result<Json<MediaUpdate>, JsonRejection>,
) -> Result<Json<MediaItem>, ApiError> {
    let Json(update) = payload?;
    state.db.update(&id, &current.user.id, update)?;
    Ok(Json(state.db.fetch_one(&id, &current.user.id)?))
}

async fn delete_item(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.db.delete(&id, &current.user.id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn toggle_bookmark(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let is_bookmarked = state.db.toggle_bookmark(&id, &current.user.id)?;
    Ok(Json(serde_json::json!({ "is_bookmarked": is_bookmarked })))
}

#[derive(Debug, Serialize)]
struct ShareLink {
    token: String,
    path: String,
}

async fn share_item(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<ShareLink>, ApiError> {
    let token = state.db.generate_share_link(&id, &current.user.id)?;
    Ok(Json(ShareLink {
        path: format!("/shared/{token}"),
        token,
    }))
}

async fn unshare_item(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.db.revoke_share_link(&id, &current.user.id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Query string of the stats endpoint
#[derive(Debug, Default, Deserialize)]
pub struct StatsQuery {
    /// Caller's UTC offset in minutes east of UTC (UTC-8 is `-480`).
    /// Without it the server's local zone decides "this month".
    pub tz_offset: Option<i32>,
}

impl StatsQuery {
    fn offset(&self) -> StoreResult<Option<FixedOffset>> {
        self.tz_offset
            .map(|minutes| {
                minutes
                    .checked_mul(60)
                    .and_then(FixedOffset::east_opt)
                    .ok_or_else(|| {
                        StoreError::validation(format!("tz_offset out of range: {minutes}"))
                    })
            })
            .transpose()
    }
}

async fn stats(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    params: Result<Query<StatsQuery>, QueryRejection>,
) -> Result<Json<Statistics>, ApiError> {
    let Query(params) = params?;
    let offset = params.offset()?;
    let items = state.db.fetch_all(&current.user.id)?;

    let stats = match offset {
        Some(offset) => Statistics::compute_at(&items, &Utc::now().with_timezone(&offset)),
        None => Statistics::compute(&items),
    };
    Ok(Json(stats))
}

/// Public view of a shared item (no auth required)
async fn shared_item(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<Json<MediaItem>, ApiError> {
    Ok(Json(state.db.fetch_by_share_token(&token)?))
}

/// API error type
#[derive(Debug)]
pub struct ApiError(StoreError);

impl ApiError {
    fn status(&self) -> StatusCode {
        match self.0 {
            StoreError::Validation(_) => StatusCode::BAD_REQUEST,
            StoreError::Auth(_) => StatusCode::UNAUTHORIZED,
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            StoreError::Connection(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "API error");
        } else {
            tracing::warn!(error = %self.0, status = status.as_u16(), "Request rejected");
        }
        (
            status,
            Json(serde_json::json!({ "error": self.0.to_string() })),
        )
            .into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(StoreError::validation(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self(StoreError::validation(rejection.body_text()))
    }
}
