//! Axum-based HTTP/JSON gateway in front of the inventory handlers.
//!
//! Every `/api` route is bound to one RPC operation name. A route layer
//! resolves the matched route to its operation and runs the shared
//! [`AuthGate`] before the handler; the resulting [`AuthenticatedCall`]
//! travels as a request extension and handlers extract it by type.
//!
//! Also applies:
//! - Request body size limits
//! - Request timeouts
//! - CORS for browser clients

pub mod docs;

use crate::auth::{AuthGate, AuthenticatedCall, DEVICE_SECRET_KEY};
use crate::config::HttpConfig;
use crate::error::Status;
use crate::inventory::{ops, AuthGrant, HealthReport, InventoryService};
use crate::store::{Card, Library, NewCard};
use anyhow::Result;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        FromRequestParts, MatchedPath, Path, Request, State,
    },
    http::{header, request::Parts, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tracing::Instrument;
use uuid::Uuid;

/// Every gated route: (method, path, operation).
pub const GATEWAY_ROUTES: &[(&str, &str, &str)] = &[
    ("GET", "/api/health", ops::HEALTH_CHECK),
    ("POST", "/api/users", ops::CREATE_USER),
    ("POST", "/api/login", ops::LOGIN),
    ("POST", "/api/libraries", ops::CREATE_LIBRARY),
    ("GET", "/api/libraries", ops::GET_LIBRARIES),
    ("GET", "/api/libraries/{library_id}", ops::GET_LIBRARY),
    ("DELETE", "/api/libraries/{library_id}", ops::DELETE_LIBRARY),
    ("POST", "/api/libraries/{library_id}/cards", ops::CREATE_CARD),
    ("GET", "/api/libraries/{library_id}/cards", ops::GET_CARDS),
    ("GET", "/api/cards/{card_id}", ops::GET_CARD),
    ("DELETE", "/api/cards/{card_id}", ops::DELETE_CARD),
    ("POST", "/api/cards/{card_id}/move", ops::MOVE_CARD),
];

/// Operation bound to `method` + matched route path, if any.
///
/// axum answers HEAD through the GET handler, so HEAD resolves like GET.
pub fn operation_for(method: &Method, path: &str) -> Option<&'static str> {
    let method = if *method == Method::HEAD {
        "GET"
    } else {
        method.as_str()
    };
    GATEWAY_ROUTES
        .iter()
        .find(|(m, p, _)| method == *m && path == *p)
        .map(|(_, _, op)| *op)
}

/// Correlates a response with the `http` log span of its request.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Shared state for all axum handlers
#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<AuthGate>,
    pub service: Arc<InventoryService>,
}

/// Build the full router: gated `/api` tree plus the public docs.
pub fn router(state: AppState, http: &HttpConfig) -> Router {
    // ── CORS: allow browser clients from any origin ──
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::HeaderName::from_static(DEVICE_SECRET_KEY),
        ])
        .max_age(Duration::from_secs(3600));

    let api = Router::new()
        .route("/api/health", get(handle_health))
        .route("/api/users", post(handle_create_user))
        .route("/api/login", post(handle_login))
        .route(
            "/api/libraries",
            post(handle_create_library).get(handle_get_libraries),
        )
        .route(
            "/api/libraries/{library_id}",
            get(handle_get_library).delete(handle_delete_library),
        )
        .route(
            "/api/libraries/{library_id}/cards",
            post(handle_create_card).get(handle_get_cards),
        )
        .route(
            "/api/cards/{card_id}",
            get(handle_get_card).delete(handle_delete_card),
        )
        .route("/api/cards/{card_id}/move", post(handle_move_card))
        .route_layer(middleware::from_fn_with_state(state.clone(), authenticate))
        .with_state(state);

    Router::new()
        .merge(api)
        .merge(docs::router())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(http.max_body_bytes))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(http.request_timeout_secs),
        ))
}

/// Serve `app` on `listener` until `shutdown` resolves.
pub async fn run_gateway(
    listener: TcpListener,
    app: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    tracing::info!(addr = %listener.local_addr()?, "http gateway started");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    tracing::info!("http gateway stopped");
    Ok(())
}

// ══════════════════════════════════════════════════════════════════════════════
// AUTH MIDDLEWARE
// ══════════════════════════════════════════════════════════════════════════════

/// Route layer: resolve the matched route to its operation and run [`AuthGate::authorize`].
async fn authenticate(
    State(state): State<AppState>,
    matched: MatchedPath,
    mut req: Request,
    next: Next,
) -> Response {
    let request_id = Uuid::new_v4();
    let method = req.method().clone();
    let Some(operation) = operation_for(&method, matched.as_str()) else {
        // a route was added to the router but not to GATEWAY_ROUTES
        tracing::error!(%method, path = matched.as_str(), "route has no operation binding");
        return Status::internal().into_response();
    };

    let span = tracing::info_span!("http", %request_id, operation);
    let mut response = async move {
        match state.gate.authorize(operation, req.headers()) {
            Ok(call) => {
                req.extensions_mut().insert(call);
                next.run(req).await
            }
            Err(status) => status.into_response(),
        }
    }
    .instrument(span)
    .await;

    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

impl<S: Send + Sync> FromRequestParts<S> for AuthenticatedCall {
    type Rejection = Status;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedCall>()
            .cloned()
            .ok_or_else(|| {
                tracing::error!(
                    uri = %parts.uri,
                    "handler reached without passing the auth gate"
                );
                Status::unauthenticated()
            })
    }
}

impl IntoResponse for Status {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code().http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = serde_json::json!({
            "code": self.code().as_str(),
            "message": self.message(),
        });
        (status, Json(body)).into_response()
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// REQUEST BODIES
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
pub struct CredentialsBody {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateLibraryBody {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateCardBody {
    pub name: String,
    #[serde(default)]
    pub set_name: String,
    #[serde(default)]
    pub condition: String,
    #[serde(default)]
    pub foil: bool,
    #[serde(default)]
    pub collector_number: String,
    /// US cents.
    #[serde(default)]
    pub usd_price: i32,
    #[serde(default = "default_qty")]
    pub qty: i32,
}

fn default_qty() -> i32 {
    1
}

impl From<CreateCardBody> for NewCard {
    fn from(body: CreateCardBody) -> Self {
        Self {
            name: body.name,
            set_name: body.set_name,
            condition: body.condition,
            foil: body.foil,
            collector_number: body.collector_number,
            usd_price: body.usd_price,
            qty: body.qty,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MoveCardBody {
    pub source_library_id: i64,
    pub dest_library_id: i64,
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, Status> {
    body.map(|Json(b)| b)
        .map_err(|e| Status::invalid_argument(format!("invalid request body: {}", e.body_text())))
}

fn path_id(path: Result<Path<i64>, PathRejection>) -> Result<i64, Status> {
    path.map(|Path(id)| id)
        .map_err(|e| Status::invalid_argument(format!("invalid path: {}", e.body_text())))
}

// ══════════════════════════════════════════════════════════════════════════════
// AXUM HANDLERS
// ══════════════════════════════════════════════════════════════════════════════

/// GET /api/health (public)
async fn handle_health(State(state): State<AppState>) -> Json<HealthReport> {
    Json(state.service.health())
}

/// POST /api/users (device secret required)
async fn handle_create_user(
    State(state): State<AppState>,
    call: AuthenticatedCall,
    body: Result<Json<CredentialsBody>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthGrant>), Status> {
    let body = json_body(body)?;
    let grant = state
        .service
        .create_user(&call, &body.email, &body.password)
        .await?;
    Ok((StatusCode::CREATED, Json(grant)))
}

/// POST /api/login
async fn handle_login(
    State(state): State<AppState>,
    body: Result<Json<CredentialsBody>, JsonRejection>,
) -> Result<Json<AuthGrant>, Status> {
    let body = json_body(body)?;
    Ok(Json(state.service.login(&body.email, &body.password).await?))
}

/// POST /api/libraries
async fn handle_create_library(
    State(state): State<AppState>,
    call: AuthenticatedCall,
    body: Result<Json<CreateLibraryBody>, JsonRejection>,
) -> Result<(StatusCode, Json<Library>), Status> {
    let body = json_body(body)?;
    let library = state.service.create_library(&call, &body.name).await?;
    Ok((StatusCode::CREATED, Json(library)))
}

/// GET /api/libraries
async fn handle_get_libraries(
    State(state): State<AppState>,
    call: AuthenticatedCall,
) -> Result<Json<Vec<Library>>, Status> {
    Ok(Json(state.service.get_libraries(&call).await?))
}

/// GET /api/libraries/{library_id}
async fn handle_get_library(
    State(state): State<AppState>,
    call: AuthenticatedCall,
    library_id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Library>, Status> {
    let library_id = path_id(library_id)?;
    Ok(Json(state.service.get_library(&call, library_id).await?))
}

/// DELETE /api/libraries/{library_id}
async fn handle_delete_library(
    State(state): State<AppState>,
    call: AuthenticatedCall,
    library_id: Result<Path<i64>, PathRejection>,
) -> Result<StatusCode, Status> {
    let library_id = path_id(library_id)?;
    state.service.delete_library(&call, library_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/libraries/{library_id}/cards
async fn handle_create_card(
    State(state): State<AppState>,
    call: AuthenticatedCall,
    library_id: Result<Path<i64>, PathRejection>,
    body: Result<Json<CreateCardBody>, JsonRejection>,
) -> Result<(StatusCode, Json<Card>), Status> {
    let library_id = path_id(library_id)?;
    let body = json_body(body)?;
    let card = state
        .service
        .create_card(&call, library_id, body.into())
        .await?;
    Ok((StatusCode::CREATED, Json(card)))
}

/// GET /api/libraries/{library_id}/cards
async fn handle_get_cards(
    State(state): State<AppState>,
    call: AuthenticatedCall,
    library_id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Vec<Card>>, Status> {
    let library_id = path_id(library_id)?;
    Ok(Json(state.service.get_cards(&call, library_id).await?))
}

/// GET /api/cards/{card_id}
async fn handle_get_card(
    State(state): State<AppState>,
    call: AuthenticatedCall,
    card_id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Card>, Status> {
    let card_id = path_id(card_id)?;
    Ok(Json(state.service.get_card(&call, card_id).await?))
}

/// DELETE /api/cards/{card_id}
async fn handle_delete_card(
    State(state): State<AppState>,
    call: AuthenticatedCall,
    card_id: Result<Path<i64>, PathRejection>,
) -> Result<StatusCode, Status> {
    let card_id = path_id(card_id)?;
    state.service.delete_card(&call, card_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/cards/{card_id}/move
async fn handle_move_card(
    State(state): State<AppState>,
    call: AuthenticatedCall,
    card_id: Result<Path<i64>, PathRejection>,
    body: Result<Json<MoveCardBody>, JsonRejection>,
) -> Result<Json<Card>, Status> {
    let card_id = path_id(card_id)?;
    let body = json_body(body)?;
    let card = state
        .service
        .move_card(&call, card_id, body.source_library_id, body.dest_library_id)
        .await?;
    Ok(Json(card))
}
