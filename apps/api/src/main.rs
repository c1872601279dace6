use std::sync::Arc;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::{self, TraceLayer};
use tracing::{Level, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use appointment_cell::{BookingService, FileStore, SchedulingStore, SupabaseStore};
use learning_cell::{handlers::LearningState, OutcomeLearner};
use shared_config::AppConfig;
use shared_database::{JsonSnapshot, SupabaseClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting clinic scheduler");

    // Load configuration
    let config = AppConfig::from_env();

    let store: Arc<dyn SchedulingStore> = if config.is_supabase_configured() {
        info!("Using Supabase scheduling store at {}", config.supabase_url);
        Arc::new(SupabaseStore::new(Arc::new(SupabaseClient::new(&config))))
    } else {
        info!("Using file scheduling store at {}", config.store_path().display());
        Arc::new(FileStore::open(JsonSnapshot::new(config.store_path())).await?)
    };

    let learner = Arc::new(OutcomeLearner::load(JsonSnapshot::new(config.training_data_path())).await);
    info!(
        "Outcome learner ready ({} examples, trained: {})",
        learner.example_count().await,
        learner.is_trained()
    );

    // Create shared state
    let booking = Arc::new(BookingService::new(config.scheduling.clone(), store, learner.clone()));
    let learning = Arc::new(LearningState::new(learner));

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the application router
    let app = router::create_router(booking, learning)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new()
                    .level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new()
                    .level(Level::INFO)),
        )
        .layer(cors);

    // Run the server
    let listener = TcpListener::bind(config.bind_addr.as_str()).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
