use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use watchtower::{
    AppState,
    config::Config,
    create_router,
    detection::{DetectorParams, HaarDetector},
    store::SessionStore,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    tracing::debug!(?config, "configuration loaded");

    #[cfg(debug_assertions)]
    tracing::info!("Running in debug mode with CORS enabled");

    #[cfg(not(debug_assertions))]
    tracing::info!("Running in production mode with CORS disabled");

    let params = DetectorParams {
        scale_factor: config.face_scale_factor,
        min_neighbors: config.face_min_neighbors,
    };
    let detector = match HaarDetector::from_file(&config.face_cascade_path, params) {
        Ok(detector) => detector,
        Err(e) => {
            tracing::error!(
                path = %config.face_cascade_path.display(),
                "Failed to load face cascade: {}",
                e
            );
            std::process::exit(1);
        }
    };
    tracing::info!(
        stages = detector.cascade().stages.len(),
        window = ?(detector.cascade().window_width, detector.cascade().window_height),
        "Face cascade loaded"
    );

    let state = AppState::new(config.clone(), Arc::new(detector));
    spawn_session_purger(state.sessions.clone(), &config);

    let app = create_router(state);

    let addr = SocketAddr::new(
        config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid SERVER_HOST, falling back to dual-stack default");
            IpAddr::V6(Ipv6Addr::UNSPECIFIED)
        }),
        config.server_port,
    );

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    tracing::info!("Server listening on {}", addr);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
    tracing::info!("Server stopped");
}

fn spawn_session_purger(sessions: Arc<SessionStore>, config: &Config) {
    let period = config.session_purge_interval();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let purged = sessions.purge_expired();
            if purged > 0 {
                tracing::debug!(purged, remaining = sessions.len(), "expired sessions purged");
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
