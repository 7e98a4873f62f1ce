//! 用户认证服务主入口

use catalog_api::{
    auth::secret::{SecretGenerator, DEFAULT_SECRET_BYTES, MIN_SECRET_BYTES},
    config::AppConfig,
    db,
    handlers::health,
    middleware::AppState,
    repository::PgAuthStore,
    routes, telemetry,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ===== CLI 参数处理 =====
    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 {
        match args[1].as_str() {
            "--version" => {
                println!("catalog-api {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" => {
                print_help();
                return Ok(());
            }
            "--generate-secret" => {
                let bytes = match args.get(2) {
                    Some(raw) => raw
                        .parse::<usize>()
                        .ok()
                        .filter(|n| *n >= MIN_SECRET_BYTES)
                        .ok_or_else(|| {
                            anyhow::anyhow!(
                                "BYTES must be an integer of at least {}",
                                MIN_SECRET_BYTES
                            )
                        })?,
                    None => DEFAULT_SECRET_BYTES,
                };
                println!("{}", SecretGenerator::generate(bytes));
                return Ok(());
            }
            _ => {
                eprintln!("Unknown argument: {}", args[1]);
                print_help();
                std::process::exit(1);
            }
        }
    }

    // 加载 .env 文件（开发环境）
    // 生产环境应该直接设置环境变量
    if let Ok(env) = std::env::var("CATALOG_ENV") {
        dotenv::from_filename(format!(".env.{}", env)).ok();
    } else {
        dotenv::from_filename(".env.local").ok();
        dotenv::from_filename(".env.development").ok();
        dotenv::dotenv().ok();
    }

    health::set_start_time();

    // 1. 加载配置
    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        anyhow::anyhow!("Failed to load configuration: {}", e)
    })?;

    // 2. 初始化日志与指标
    telemetry::init_telemetry(&config.logging);
    telemetry::init_metrics();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "catalog-api starting...");

    // 3. 数据库连接池 + 迁移
    let db_pool = db::connect_and_migrate(&config.database).await?;

    tracing::info!("Database initialized");

    // 4. 构建应用状态
    let store = Arc::new(PgAuthStore::new(db_pool.clone()));
    let app_state = Arc::new(AppState::new(config.clone(), store)?);

    // 5. 构建路由
    let app = routes::create_router(app_state);

    // 6. 启动服务器
    let addr = &config.server.addr;
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(addr = %addr, "Server listening");

    // 7. 优雅关闭
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(config.server.graceful_shutdown_timeout_secs))
        .await?;

    db_pool.close().await;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// 优雅关闭信号处理
///
/// 收到信号后立即开始排空连接，超时仍未结束则强制退出。
async fn shutdown_signal(timeout_secs: u64) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Ctrl+C received, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Terminate signal received, starting graceful shutdown");
        },
    }

    // 超时后强制关闭
    tokio::spawn(async move {
        tokio::time::sleep(tokio::time::Duration::from_secs(timeout_secs)).await;
        tracing::warn!("Graceful shutdown timeout reached, forcing exit");
        std::process::exit(1);
    });
}

/// 打印帮助信息
fn print_help() {
    println!("catalog-api {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Usage: catalog-api [OPTION]");
    println!();
    println!("Options:");
    println!("  --version                  Print version and exit");
    println!("  --help                     Print this help and exit");
    println!(
        "  --generate-secret [BYTES]  Print a random signing secret (default {} bytes, min {})",
        DEFAULT_SECRET_BYTES, MIN_SECRET_BYTES
    );
    println!();
    println!("Environment:");
    println!("  All settings come from CATALOG_* variables, plus JWT_SECRET_KEY");
    println!("  and JWT_REFRESH_SECRET_KEY. See .env.example.");
}
