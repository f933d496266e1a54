//! Application factory and server lifecycle.
//!
//! [`create_app`] performs initialization in a fixed order: configuration,
//! extensions, template filters, the user loader, the layout context, route
//! groupings, logging and finally schema migration.

use std::{future::IntoFuture, sync::Arc, time::Duration};

use axum::Router;
use tokio::{net::TcpListener, sync::Notify};
use tracing::{error, info, warn};

use crate::{
    application::{
        auth::AuthService, csrf::CsrfGuard, error::AppError, mail::Mailer, repos::UsersRepo,
    },
    config::{DatabaseSettings, Settings},
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, AppState, session_store::SessionRegistry},
        mail::build_mailer,
        telemetry::{self, TelemetryOutcome},
    },
};

/// A fully wired application, ready to serve.
pub struct Application {
    pub router: Router,
    pub settings: Settings,
    pub state: AppState,
    pub telemetry: TelemetryOutcome,
}

/// Services registered with the application before any route is mounted.
struct Extensions {
    repositories: Arc<PostgresRepositories>,
    sessions: SessionRegistry,
    mailer: Arc<dyn Mailer>,
    csrf: CsrfGuard,
}

impl Extensions {
    async fn init(settings: &Settings) -> Result<Self, AppError> {
        let pool = connect_pool(&settings.database).await?;
        let mailer = build_mailer(&settings.mail).map_err(InfraError::from)?;

        Ok(Self {
            repositories: Arc::new(PostgresRepositories::new(pool)),
            sessions: SessionRegistry::new(),
            mailer,
            csrf: CsrfGuard::new(settings.csrf.enabled),
        })
    }
}

async fn connect_pool(database: &DatabaseSettings) -> Result<sqlx::PgPool, AppError> {
    let database_url = database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))?;

    PostgresRepositories::connect(database_url, database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))
}

/// Build the application for an already resolved profile.
pub async fn create_app(settings: Settings) -> Result<Application, AppError> {
    let extensions = Extensions::init(&settings).await?;

    // Template filters are bound at compile time through `presentation::filters`.

    let users: Arc<dyn UsersRepo> = extensions.repositories.clone();
    let auth = Arc::new(AuthService::new(users, extensions.mailer));

    let state = AppState {
        auth,
        csrf: extensions.csrf,
        sessions: extensions.sessions,
        db: Some(extensions.repositories.clone()),
    };
    let router = http::build_router(state.clone(), &settings.session);

    let telemetry = telemetry::init(&settings.logging, settings.mode)?;

    PostgresRepositories::run_migrations(extensions.repositories.pool())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    info!(
        target = "storefront::startup",
        profile = settings.profile.as_str(),
        debug = settings.mode.debug,
        testing = settings.mode.testing,
        csrf = state.csrf.is_enabled(),
        mail_suppressed = settings.mail.suppress_send,
        "application initialized"
    );

    Ok(Application {
        router,
        settings,
        state,
        telemetry,
    })
}

/// Serve until Ctrl-C, then drain in-flight requests for the configured grace period.
pub async fn serve(app: Application) -> Result<(), AppError> {
    let listener = TcpListener::bind(app.settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "storefront::startup",
        addr = %app.settings.server.addr,
        "listening"
    );

    let sweeper = app
        .state
        .sessions
        .spawn_sweeper(app.settings.session.sweep_interval);

    let shutdown = Arc::new(Notify::new());
    let server = axum::serve(listener, app.router.into_make_service())
        .with_graceful_shutdown({
            let shutdown = shutdown.clone();
            async move { shutdown.notified().await }
        })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            sweeper.abort();
            return result.map_err(|err| AppError::unexpected(format!("server error: {err}")));
        }
        () = shutdown_signal() => {
            info!(target = "storefront::shutdown", "shutdown requested; draining connections");
            shutdown.notify_one();
        }
    }

    let outcome = drain(server, app.settings.server.graceful_shutdown).await;
    sweeper.abort();
    outcome
}

async fn drain<F>(server: F, grace: Duration) -> Result<(), AppError>
where
    F: std::future::Future<Output = std::io::Result<()>>,
{
    match tokio::time::timeout(grace, server).await {
        Ok(result) => result.map_err(|err| AppError::unexpected(format!("server error: {err}"))),
        Err(_) => {
            warn!(
                target = "storefront::shutdown",
                grace_seconds = grace.as_secs(),
                "graceful shutdown timed out; dropping remaining connections"
            );
            Ok(())
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(
            target = "storefront::shutdown",
            error = %err,
            "failed to listen for shutdown signal"
        );
        std::future::pending::<()>().await;
    }
}

/// Apply the embedded migrations and exit.
pub async fn migrate(settings: &Settings) -> Result<(), AppError> {
    telemetry::init(&settings.logging, settings.mode)?;

    let pool = connect_pool(&settings.database).await?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    info!(target = "storefront::migrate", "migrations applied");
    Ok(())
}
