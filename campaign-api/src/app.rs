/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use campaign_api::{app::{build_router, AppState}, config::Config};
/// use campaign_shared::payment::{XenditConfig, XenditGateway};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let gateway = XenditGateway::new(XenditConfig::new(config.payment.xendit_secret_key.clone()))?;
/// let state = AppState::new(pool, config, Arc::new(gateway));
/// let app = build_router(state);
/// # Ok(())
/// # }
/// ```

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, HeaderValue, Method},
    middleware,
    routing::{delete, get, post},
    Router,
};
use campaign_shared::{
    auth::{callback::CALLBACK_TOKEN_HEADER, middleware::create_jwt_middleware},
    donations::DonationService,
    payment::PaymentGateway,
    uploads::{UploadPolicy, UploadStore},
    validation::Validator,
};
use sqlx::PgPool;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::{
    config::Config,
    middleware::{
        rate_limit::{rate_limit_middleware, RateLimiterState},
        security::SecurityHeadersLayer,
    },
    routes,
};

/// Body limit for JSON endpoints
pub const JSON_BODY_LIMIT: usize = 1024 * 1024;

/// Most files accepted in one upload request
pub const MAX_UPLOAD_FILES: usize = 5;

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor; every
/// member is a cheap handle.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,
    pub validator: Validator,
    pub donations: DonationService,
    pub uploads: UploadStore,
    pub rate_limiter: Arc<RateLimiterState>,
}

impl AppState {
    pub fn new(db: PgPool, config: Config, gateway: Arc<dyn PaymentGateway>) -> Self {
        let validator = Validator::new(Arc::new(db.clone()));
        let donations = DonationService::new(db.clone(), gateway);
        let uploads = UploadStore::new(&config.storage.upload_dir, &config.storage.base_file_url);
        let rate_limiter = Arc::new(RateLimiterState::per_minute(config.api.rate_limit_per_minute));

        Self {
            db,
            config: Arc::new(config),
            validator,
            donations,
            uploads,
            rate_limiter,
        }
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Largest multipart body any upload module can need
fn upload_body_limit() -> usize {
    UploadPolicy::CAMPAIGN
        .body_limit(MAX_UPLOAD_FILES)
        .max(UploadPolicy::DEFAULT.body_limit(MAX_UPLOAD_FILES))
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.api.cors_origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(CALLBACK_TOKEN_HEADER),
        ])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}

/// Builds the complete Axum router with all routes and middleware
///
/// ```text
/// /
/// ├── GET /health
/// ├── /uploads/*                          static files from UPLOAD_DIR
/// └── /api/v1/
///     ├── /auth/                          register, login (public), logout (auth)
///     ├── /user/campaigns[/:id]           owner CRUD (auth)
///     ├── /campaigns                      public listing
///     │   ├── GET  /:slug
///     │   ├── GET  /:slug/donors
///     │   └── POST /:slug/donate          (auth)
///     ├── POST /payments/webhook          provider callback
///     └── /images                         POST /:module, DELETE / (auth)
/// ```
///
/// Layers, outermost first: security headers, CORS, tracing, compression,
/// rate limiting, request body limit.
pub fn build_router(state: AppState) -> Router {
    let require_auth = middleware::from_fn(create_jwt_middleware(state.jwt_secret().to_owned()));

    let auth_routes = Router::new()
        .route("/logout", post(routes::auth::logout))
        .route_layer(require_auth.clone())
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login));

    let user_campaign_routes = Router::new()
        .route(
            "/",
            get(routes::campaigns::index).post(routes::campaigns::store),
        )
        .route(
            "/:id",
            get(routes::campaigns::show)
                .put(routes::campaigns::update)
                .delete(routes::campaigns::destroy),
        )
        .route_layer(require_auth.clone());

    let campaign_routes = Router::new()
        .route("/:slug/donate", post(routes::public::donate))
        .route_layer(require_auth.clone())
        .route("/", get(routes::public::index))
        .route("/:slug", get(routes::public::show))
        .route("/:slug/donors", get(routes::public::donors));

    let image_routes = Router::new()
        .route("/", delete(routes::images::destroy))
        .route(
            "/:module",
            post(routes::images::upload).layer(DefaultBodyLimit::max(upload_body_limit())),
        )
        .route_layer(require_auth);

    let payment_routes = Router::new().route("/webhook", post(routes::payments::xendit_webhook));

    let v1_routes = Router::new()
        .nest("/auth", auth_routes)
        .nest("/user/campaigns", user_campaign_routes)
        .nest("/campaigns", campaign_routes)
        .nest("/payments", payment_routes)
        .nest("/images", image_routes);

    let cors = cors_layer(&state.config);
    let production = state.config.api.production;

    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/api/v1", v1_routes)
        .nest_service("/uploads", ServeDir::new(state.uploads.root()))
        .layer(DefaultBodyLimit::max(JSON_BODY_LIMIT))
        .layer(RequestBodyLimitLayer::new(upload_body_limit()))
        .layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ))
        .layer(CompressionLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(production))
        .with_state(state)
}
