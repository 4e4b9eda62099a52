//! bookbar API server
//!
//! Serves every procedure against PostgreSQL. Collaborators without
//! configuration fall back to local stand-ins: email is written to the log
//! and avatar uploads are refused.

use std::sync::Arc;

use axum::{extract::DefaultBodyLimit, http::HeaderValue};
use chrono::Duration;
use dotenv::dotenv;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use bookbar::{
    api::{AppState, RouterBuilder, SessionAuth},
    config::{AppConfig, ServerConfig},
    database::{DynStore, PgStore},
    service::{
        BookCatalog, CloudinaryCdn, CollectionService, EmailService, GoogleBooksCatalog,
        IdentityService, ImageCdn, JwtService, LogMailer, MailTransport, OAuthService,
        SmtpMailer, UnconfiguredCdn, UserService,
    },
};

fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = server
        .cors_origins
        .iter()
        .filter(|origin| origin.as_str() != "*")
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let allow_origin = if origins.is_empty() || server.cors_origins.iter().any(|o| o == "*") {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenv().ok();

    env_logger::init();

    log::info!("🚀 Starting bookbar v{}", bookbar::VERSION);

    let config = AppConfig::from_env()?;
    config.validate()?;

    log::info!("✅ Configuration loaded and validated");

    let database_pool = config.database.create_pool().await?;

    log::info!("🔄 Running database migrations...");
    sqlx::migrate!("./migrations").run(&database_pool).await?;
    log::info!("✅ Database migrations completed");

    let store: DynStore = Arc::new(PgStore::new(database_pool));

    let jwt_service = Arc::new(JwtService::with_expiration(
        config.jwt.secret.clone(),
        Duration::days(config.jwt.session_days),
    ));

    // External collaborators
    let mail_transport: Arc<dyn MailTransport> = match &config.email {
        Some(email_config) => {
            log::info!("✅ SMTP delivery via {}", email_config.smtp_host);
            Arc::new(SmtpMailer::new(email_config)?)
        }
        None => {
            log::warn!("⚠️  SMTP not configured, outgoing email will be logged");
            Arc::new(LogMailer)
        }
    };
    let email_service = Arc::new(EmailService::new(mail_transport, &config.app_base_url)?);

    let image_cdn: Arc<dyn ImageCdn> = match &config.cdn {
        Some(cdn_config) => {
            log::info!("✅ Image CDN configured for cloud {}", cdn_config.cloud_name);
            Arc::new(CloudinaryCdn::new(cdn_config.clone())?)
        }
        None => {
            log::warn!("⚠️  Image CDN not configured, avatar uploads will fail");
            Arc::new(UnconfiguredCdn)
        }
    };

    let book_catalog: Arc<dyn BookCatalog> =
        Arc::new(GoogleBooksCatalog::new(config.book_catalog.clone())?);

    let oauth_service = match &config.google_oauth {
        Some(google_config) => {
            let service = OAuthService::new(store.clone(), google_config.clone())?;
            log::info!("✅ Google OAuth initialized");
            Some(Arc::new(service))
        }
        None => {
            log::warn!("⚠️  Google OAuth not configured");
            None
        }
    };

    let app_state = AppState {
        store: store.clone(),
        jwt_service: jwt_service.clone(),
        collection_service: Arc::new(CollectionService::new(store.clone())),
        user_service: Arc::new(UserService::new(
            store.clone(),
            email_service.clone(),
            image_cdn,
        )),
        identity_service: Arc::new(IdentityService::new(
            store.clone(),
            jwt_service.clone(),
            email_service,
        )),
        oauth_service,
        book_catalog,
        app_base_url: config.app_base_url.clone(),
    };

    log::info!("✅ Services initialized");

    let app = RouterBuilder::with_all_routes()
        .build(SessionAuth::new(jwt_service, store))
        .with_state(app_state)
        .layer(DefaultBodyLimit::max(config.server.max_request_size))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&config.server))
                .into_inner(),
        );

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    log::info!("🌐 Listening on {}", bind_addr);

    log::info!("📋 Procedures:");
    log::info!("   GET  /health");
    log::info!("   GET  /rpc/collection.getAll, collection.getAllByUserSlug, collection.getById");
    log::info!("   GET  /rpc/collection.search, collection.getAverageRating");
    log::info!("   GET  /rpc/collection.isFavourited, collection.getUserRating 🔒");
    log::info!("   POST /rpc/collection.create, collection.delete, collection.rate, collection.toggleFavourite 🔒");
    log::info!("   GET  /rpc/book.search");
    log::info!("   GET  /rpc/user.getUser 🔒");
    log::info!("   POST /rpc/user.updateProfile, user.verifyEmail, user.delete 🔒");
    log::info!("   GET  /auth/signin/google, /auth/callback/google");
    log::info!("   POST /auth/signin/email, /auth/callback/email");

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
