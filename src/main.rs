use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use segments::{
    AppState, build_router,
    config::Config,
    database::repositories::{InMemoryRepository, PgRepository, Repository},
    lifecycle::ExpirySweeper,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Config::from_env().expect("Failed to load configuration");

    // 设置存储
    let repo: Arc<dyn Repository> = match config.database_url.as_deref() {
        Some(url) => {
            let repo = PgRepository::connect(url, &config)
                .await
                .expect("Failed to connect to Postgres");
            repo.migrate().await.expect("Failed to run migrations");
            tracing::info!("Connected to Postgres, migrations applied");
            Arc::new(repo)
        }
        None => {
            tracing::warn!("DATABASE_URL is not set, using in-memory storage");
            Arc::new(InMemoryRepository::new())
        }
    };

    // 设置应用状态
    let state = AppState::new(config.clone(), repo);

    // 启动过期分段清理任务
    let sweeper = config.ttl_sweep_interval().map(|period| {
        let sweeper = Arc::new(ExpirySweeper::new(state.lifecycle.clone(), period));
        tokio::spawn({
            let sweeper = Arc::clone(&sweeper);
            async move { sweeper.start().await }
        });
        sweeper
    });
    if sweeper.is_none() {
        tracing::info!("Expiry sweeper disabled");
    }

    let app = build_router(state);

    // 启动服务器
    let addr = SocketAddr::new(
        config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        app,
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Failed to start server");

    if let Some(sweeper) = sweeper {
        sweeper.stop().await;
    }
    tracing::info!("Server stopped");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
