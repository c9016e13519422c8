use axum::{
    Router,
    extract::{DefaultBodyLimit, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, Error as AxumError, Header, authorization::Bearer},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
};

use std::sync::Arc;

use crate::{auth, bill, members, records, tokens, users};
use engine::{DeepSeekClient, Engine};

static API_TOKEN_HEADER: axum::http::HeaderName = axum::http::HeaderName::from_static("x-api-token");

/// Uploaded bills are capped at 10 MB.
const UPLOAD_LIMIT_BYTES: usize = 10 * 1024 * 1024;

#[derive(Clone)]
pub struct AiConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

#[derive(Clone)]
pub struct ServerConfig {
    pub jwt_secret: String,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
    pub ai: Option<AiConfig>,
    pub proxy_url: Option<String>,
}

#[derive(Clone)]
pub struct ServerState {
    pub engine: Arc<Engine>,
    pub db: DatabaseConnection,
    pub config: Arc<ServerConfig>,
    pub ai: Option<Arc<DeepSeekClient>>,
    pub http: reqwest::Client,
}

impl ServerState {
    pub fn new(engine: Engine, db: DatabaseConnection, config: ServerConfig) -> Self {
        let ai = config
            .ai
            .as_ref()
            .map(|ai| Arc::new(DeepSeekClient::new(&ai.base_url, &ai.api_key, &ai.model)));
        Self {
            engine: Arc::new(engine),
            db,
            config: Arc::new(config),
            ai,
            http: reqwest::Client::new(),
        }
    }
}

/// Who a request is acting as, attached by the auth middleware.
#[derive(Clone)]
pub enum AuthIdentity {
    User(users::Model),
    ApiToken(tokens::Model),
}

/// `TypedHeader` for the programmatic access header.
///
/// Non-interactive clients send an `X-API-Token` entry instead of a JWT.
#[derive(Debug)]
struct ApiTokenHeader(String);

impl Header for ApiTokenHeader {
    fn name() -> &'static axum::http::HeaderName {
        &API_TOKEN_HEADER
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, AxumError>
    where
        Self: Sized,
        I: Iterator<Item = &'i axum::http::HeaderValue>,
    {
        let value = values.next().ok_or_else(AxumError::invalid)?;
        let Ok(value) = value.to_str() else {
            return Err(AxumError::invalid());
        };
        Ok(ApiTokenHeader(value.to_string()))
    }

    fn encode<E: Extend<axum::http::HeaderValue>>(&self, values: &mut E) {
        match axum::http::HeaderValue::from_str(&self.0) {
            Ok(value) => values.extend(std::iter::once(value)),
            Err(_) => tracing::error!("failed to encode x-api-token header"),
        }
    }
}

async fn auth_middleware(
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    api_token: Option<TypedHeader<ApiTokenHeader>>,
    State(state): State<ServerState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let identity = if let Some(TypedHeader(Authorization(bearer))) = bearer {
        let claims = auth::verify_jwt(&state.config.jwt_secret, bearer.token())
            .ok_or(StatusCode::UNAUTHORIZED)?;
        let user = users::Entity::find_by_id(claims.sub)
            .one(&state.db)
            .await
            .map_err(|_| StatusCode::UNAUTHORIZED)?
            .ok_or(StatusCode::UNAUTHORIZED)?;
        AuthIdentity::User(user)
    } else if let Some(TypedHeader(ApiTokenHeader(token))) = api_token {
        let model = tokens::Entity::find()
            .filter(tokens::Column::Token.eq(token))
            .filter(tokens::Column::IsActive.eq(true))
            .one(&state.db)
            .await
            .map_err(|_| StatusCode::UNAUTHORIZED)?
            .ok_or(StatusCode::UNAUTHORIZED)?;

        let mut bump: tokens::ActiveModel = model.clone().into();
        bump.last_used_at = ActiveValue::Set(Some(Utc::now()));
        if let Err(err) = bump.update(&state.db).await {
            tracing::warn!("failed to bump token last_used_at: {err}");
        }
        AuthIdentity::ApiToken(model)
    } else {
        return Err(StatusCode::UNAUTHORIZED);
    };

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/api/auth/me", get(auth::me))
        .route(
            "/api/auth/tokens",
            get(tokens::list).post(tokens::create),
        )
        .route(
            "/api/auth/tokens/{id}",
            axum::routing::put(tokens::toggle).delete(tokens::delete),
        )
        .route(
            "/api/records",
            get(records::report).post(records::create),
        )
        .route("/api/records/batch", post(records::batch))
        .route(
            "/api/members",
            get(members::list).post(members::create),
        )
        .route(
            "/api/members/{id}",
            axum::routing::put(members::update).delete(members::delete),
        )
        .route("/api/bill/analyze", post(bill::analyze))
        .route("/api/bill/parse-pdf", post(bill::parse_pdf))
        .route("/api/bill/import", post(bill::import))
        .route("/api/bill/parse-proxy", post(bill::parse_proxy))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .route("/api/auth/login", post(auth::login))
        .layer(DefaultBodyLimit::max(UPLOAD_LIMIT_BYTES))
        .with_state(state)
}

pub async fn run(engine: Engine, db: DatabaseConnection, config: ServerConfig, bind: &str) {
    let listener = match tokio::net::TcpListener::bind(bind).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("failed to bind server listener: {err}");
            return;
        }
    };
    if let Err(err) = run_with_listener(engine, db, config, listener).await {
        tracing::error!("server failed: {err}");
    }
}

pub async fn run_with_listener(
    engine: Engine,
    db: DatabaseConnection,
    config: ServerConfig,
    listener: tokio::net::TcpListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    let state = ServerState::new(engine, db, config);
    axum::serve(listener, router(state)).await
}

pub fn spawn_with_listener(
    engine: Engine,
    db: DatabaseConnection,
    config: ServerConfig,
    listener: tokio::net::TcpListener,
) -> Result<std::net::SocketAddr, std::io::Error> {
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(err) = run_with_listener(engine, db, config, listener).await {
            tracing::error!("server failed: {err}");
        }
    });

    Ok(addr)
}
