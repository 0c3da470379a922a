use std::sync::Arc;
use std::time::Duration;

use easyfind::config::Config;
use easyfind::db::{create_pool, PgItemStore};
use easyfind::poll::spawn_poller;
use easyfind::routes::router;
use easyfind::services::ItemService;
use easyfind::storage::{CloudinaryStore, MediaStore};

use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "easyfind=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env().expect("Failed to load configuration");

    tracing::info!("Starting easyfind server...");
    tracing::info!("Connecting to database...");

    let pool = create_pool(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database connection established");

    // Media host is optional: without credentials the server still serves
    // everything except image attachments.
    let media: Option<Arc<dyn MediaStore>> = match &config.cloudinary {
        Some(cloudinary) => {
            tracing::info!("Media storage enabled: cloud={}", cloudinary.cloud_name);
            match CloudinaryStore::new(cloudinary.clone()) {
                Ok(store) => Some(Arc::new(store)),
                Err(e) => {
                    tracing::error!("Failed to create media client: {}", e);
                    None
                }
            }
        }
        None => {
            tracing::info!("Media storage disabled, image uploads will be rejected");
            None
        }
    };

    let service = Arc::new(ItemService::new(Arc::new(PgItemStore::new(pool)), media));

    // New-item activity feed: the same polling contract the browser client
    // uses, surfaced into the server log.
    if config.poll_interval_secs > 0 {
        let (poller, mut notifications) = spawn_poller(
            service.clone(),
            Duration::from_secs(config.poll_interval_secs),
        );
        tokio::spawn(async move {
            // Dropping the handle stops the loop, so it lives here with
            // the feed.
            let _poller = poller;
            while let Some(item) = notifications.recv().await {
                tracing::info!(
                    "new item reported: title={}, found at {}",
                    item.title,
                    item.found_location
                );
            }
        });
    }

    // CORS wide open: the browser front-end is served elsewhere.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods(Any);

    let app = router(service)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = config.server_addr();
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
