use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use session_guard::config;
use session_guard::counters::EventCounters;
use session_guard::device::{DeviceClassifier, HeuristicClassifier};
use session_guard::geo::{CountryResolver, StaticCountryResolver};
use session_guard::handlers::{self, AppState};
use session_guard::policy::ConfigPolicyStore;
use session_guard::session::{SessionLimiter, SessionSweeper};
use session_guard::store::memory::{MemorySessionStore, MemorySweepStateStore};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "session_guard=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let config = match config::load_config_with_fallback() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Cannot start without a valid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let sessions = Arc::new(MemorySessionStore::new());
    let sweep_state = Arc::new(MemorySweepStateStore::new());
    let policies = Arc::new(ConfigPolicyStore::new(
        config.global_mode,
        config.roles.clone(),
    ));
    let counters = Arc::new(EventCounters::new());

    let classifier: Option<Arc<dyn DeviceClassifier>> = config
        .device_detection
        .then(|| Arc::new(HeuristicClassifier::new()) as Arc<dyn DeviceClassifier>);
    let countries: Option<Arc<dyn CountryResolver>> = (!config.country_table.is_empty()).then(|| {
        Arc::new(StaticCountryResolver::new(config.country_table.clone()))
            as Arc<dyn CountryResolver>
    });

    let limiter = Arc::new(SessionLimiter::new(
        sessions.clone(),
        policies.clone(),
        classifier,
        countries,
        counters.clone(),
    ));
    let sweeper = Arc::new(SessionSweeper::new(
        sessions.clone(),
        sweep_state,
        counters.clone(),
        config.sweep.clone(),
    ));

    // Periodic sweep trigger; the sweeper rate-limits itself, so the tick
    // only has to be at least as frequent as the cycle interval
    {
        let sweeper = sweeper.clone();
        let tick_secs = config.sweep.cycle_interval_secs.clamp(1, 60);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(tick_secs));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = sweeper.maybe_run_sweep().await {
                    tracing::warn!("Scheduled sweep failed: {}", e);
                }
            }
        });
    }

    let state = AppState {
        limiter,
        sweeper,
        sessions,
        policies,
        counters,
        defaults: config.defaults.clone(),
    };

    let app = Router::new()
        // Health check routes (always available)
        .route("/", get(handlers::health::health_check))
        .route("/health", get(handlers::health::health_check))
        // Login admission boundary
        .route(
            "/api/v1/login/evaluate",
            post(handlers::login::evaluate_login),
        )
        // Session glue for the admin surface and activity hooks
        .route(
            "/api/v1/accounts/:account_id/sessions",
            get(handlers::sessions::list_sessions).delete(handlers::sessions::destroy_sessions),
        )
        .route(
            "/api/v1/sessions/touch",
            post(handlers::sessions::touch_session),
        )
        // Lifecycle notifications
        .route("/api/v1/events/logout", post(handlers::events::logout))
        .route(
            "/api/v1/events/login-failed",
            post(handlers::events::login_failed),
        )
        .route(
            "/api/v1/events/login-blocked",
            post(handlers::events::login_blocked),
        )
        .route(
            "/api/v1/events/account-registered",
            post(handlers::events::account_registered),
        )
        .route(
            "/api/v1/events/account-deleted",
            post(handlers::events::account_deleted),
        )
        .route(
            "/api/v1/events/password-reset",
            post(handlers::events::password_reset),
        )
        // Reporting and manual sweep trigger
        .route("/stats", get(handlers::stats::stats))
        .route("/api/v1/sweep", post(handlers::stats::run_sweep))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = config
        .bind_addr
        .parse()
        .expect("bind_addr validated at config load");
    tracing::info!("Starting session-guard on {}", addr);
    tracing::info!(
        "Mode: {:?}, {} role policy(ies)",
        config.global_mode,
        config.roles.len()
    );

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
