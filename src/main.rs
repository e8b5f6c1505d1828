use actix_multipart::form::MultipartFormConfig;
use actix_web::{web, App, HttpServer};
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{
    filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt, Layer,
};

use srs_agent::api::health::health_config;
use srs_agent::api::project::{project_config, ProjectService, StreamSettings};
use srs_agent::api::validation;
use srs_agent::config::Config;
use srs_agent::progress::ProgressRegistry;
use srs_agent::shutdown::ShutdownCoordinator;
use srs_agent::store::{MemoryProjectStore, ProjectStore};
use srs_agent::worker::{DispatchSettings, Generator, SimulatedGenerator};

/// SRS to technical documentation service
#[derive(Parser, Debug)]
#[command(name = "srs-agent", version)]
struct Args {
    /// Override the bind address, e.g. 0.0.0.0:9000
    #[arg(long)]
    bind: Option<String>,

    /// Override the log directory
    #[arg(long)]
    log_dir: Option<String>,

    /// Override the simulated generation failure rate (percent)
    #[arg(long)]
    failure_percent: Option<u8>,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let args = Args::parse();

    let mut config = Config::from_env().expect("Failed to load configuration");
    if let Some(bind) = &args.bind {
        config.bind_addr = parse_bind(bind).expect("Invalid --bind value");
    }
    if let Some(log_dir) = args.log_dir {
        config.log_dir = log_dir;
    }
    if let Some(rate) = args.failure_percent {
        config.simulated_failure_percent = rate;
    }

    // Create logs directory if it doesn't exist
    std::fs::create_dir_all(&config.log_dir).expect("Failed to create logs directory");

    // File-based logging with daily rotation and level separation, plus
    // console output. Files land as e.g. logs/info.log.2024-12-22.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());

    let info_file = tracing_appender::rolling::daily(&config.log_dir, "info.log");
    let warn_file = tracing_appender::rolling::daily(&config.log_dir, "warn.log");
    let error_file = tracing_appender::rolling::daily(&config.log_dir, "error.log");
    let debug_file = tracing_appender::rolling::daily(&config.log_dir, "debug.log");

    let info_layer = tracing_subscriber::fmt::layer()
        .with_writer(info_file)
        .with_ansi(false)
        .with_filter(LevelFilter::INFO);

    let warn_layer = tracing_subscriber::fmt::layer()
        .with_writer(warn_file)
        .with_ansi(false)
        .with_filter(LevelFilter::WARN);

    let error_layer = tracing_subscriber::fmt::layer()
        .with_writer(error_file)
        .with_ansi(false)
        .with_filter(LevelFilter::ERROR);

    let debug_layer = tracing_subscriber::fmt::layer()
        .with_writer(debug_file)
        .with_ansi(false)
        .with_filter(LevelFilter::DEBUG);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(info_layer)
        .with(warn_layer)
        .with(error_layer)
        .with(debug_layer)
        .init();

    info!("Starting srs-agent");
    info!("Configuration loaded successfully:");
    info!("  - Bind address: {}:{}", config.bind_addr.0, config.bind_addr.1);
    info!("  - Max payload size: {} bytes", config.max_payload_size);
    info!("  - Worker timeout: {}s, attempts: {}", config.worker_timeout_secs, config.worker_attempts);
    info!("  - Stream heartbeat: {}ms, max lifetime: {}s", config.stream_heartbeat_ms, config.stream_max_lifetime_secs);

    let store: Arc<dyn ProjectStore> = Arc::new(MemoryProjectStore::new());
    let registry = Arc::new(ProgressRegistry::new());
    let generator: Arc<dyn Generator> = Arc::new(SimulatedGenerator::new(
        (200, 1200),
        config.simulated_failure_percent,
    ));

    let service = ProjectService::new(
        Arc::clone(&store),
        Arc::clone(&registry),
        generator,
        DispatchSettings {
            attempts: config.worker_attempts,
            timeout_secs: config.worker_timeout_secs,
            jitter_ms: config.worker_jitter_ms,
        },
        StreamSettings {
            heartbeat_ms: config.stream_heartbeat_ms,
            max_lifetime_secs: config.stream_max_lifetime_secs,
        },
    );

    // Crash-restart policy: anything still marked processing was interrupted
    // and is never resumed.
    let recovered = service.recover_interrupted();
    if recovered > 0 {
        info!("Reset {} stuck project(s) on startup", recovered);
    }

    let service_data = web::Data::new(service);
    let store_data = web::Data::new(store);
    let max_payload_size = config.max_payload_size;

    let server = HttpServer::new(move || {
        let payload_config = web::PayloadConfig::default().limit(max_payload_size);
        let multipart_config = MultipartFormConfig::default()
            .total_limit(max_payload_size)
            .memory_limit(max_payload_size);

        App::new()
            .app_data(service_data.clone())
            .app_data(store_data.clone())
            .app_data(payload_config)
            .app_data(multipart_config)
            .app_data(validation::json_config())
            .configure(health_config)
            .configure(project_config)
    });

    info!(
        "Server starting on http://{}:{}",
        config.bind_addr.0, config.bind_addr.1
    );

    let server = server
        .bind((config.bind_addr.0.as_str(), config.bind_addr.1))?
        .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    let coordinator = ShutdownCoordinator::new(server_handle, server_task);
    coordinator.wait_for_shutdown().await
}

fn parse_bind(raw: &str) -> Option<(String, u16)> {
    let (host, port) = raw.rsplit_once(':')?;
    Some((host.to_string(), port.parse().ok()?))
}
