// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Tradechat WebSocket server - Real-time chat between connected traders.
//!
//! This server exposes a WebSocket endpoint that allows web clients to:
//! - Broadcast chat messages to every connected trader
//! - Send direct messages with `/to <trader> <text>`
//!
//! # Usage
//!
//! ```bash
//! # Start on default port 9090
//! tradechat-ws
//!
//! # Custom port and delivery timeout
//! tradechat-ws --port 8080 --delivery-timeout-ms 2000
//!
//! # Using configuration file
//! tradechat-ws --config tradechat.toml
//! ```
//!
//! # Protocol
//!
//! Messages are JSON-encoded:
//!
//! ```json
//! // Send a message (broadcast)
//! {"type": "chat", "sender_id": "trader1", "body": "hello"}
//!
//! // Send a direct message
//! {"type": "chat", "sender_id": "trader1", "body": "/to trader2 buy 100"}
//!
//! // Receive a message
//! {"type": "chat", "sender_id": "trader1", "body": "hello", "timestamp": "..."}
//! ```

mod config;
mod protocol;
mod session;

use axum::{
    extract::{ws::WebSocket, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
    Router,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tradechat_router::{ConfigError, MessageRouter, RouterConfig, RouterStatsSnapshot};

use config::ServerConfig;
use session::ClientSession;

/// Tradechat WebSocket server
#[derive(Parser, Debug, Clone)]
#[command(name = "tradechat-ws")]
#[command(about = "Tradechat WebSocket server - Real-time chat message routing")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// WebSocket server port
    #[arg(short, long, default_value = "9090")]
    port: u16,

    /// Bind address
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    /// Router name
    #[arg(long, default_value = "tradechat")]
    name: String,

    /// Per-recipient delivery timeout (milliseconds)
    #[arg(long, default_value = "5000")]
    delivery_timeout_ms: u64,

    /// Maximum concurrent WebSocket connections
    #[arg(long, default_value = "100")]
    max_clients: usize,

    /// Per-connection outbound queue depth
    #[arg(long, default_value = "256")]
    outbound_buffer: usize,

    /// Statistics reporting interval (seconds, 0 to disable)
    #[arg(long, default_value = "30")]
    stats_interval: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone)]
enum Commands {
    /// Generate example configuration file
    GenConfig {
        /// Output file path
        #[arg(short, long, default_value = "tradechat.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file
    Validate {
        /// Configuration file path
        #[arg(short, long)]
        config: PathBuf,
    },
}

/// Shared application state
pub struct AppState {
    router: MessageRouter,
    config: ServerConfig,
    /// One permit per connection slot
    client_slots: Arc<Semaphore>,
    shutdown: CancellationToken,
}

impl AppState {
    fn new(config: ServerConfig, shutdown: CancellationToken) -> Self {
        Self {
            router: MessageRouter::new(config.router.clone()),
            client_slots: Arc::new(Semaphore::new(config.max_clients)),
            config,
            shutdown,
        }
    }

    /// Reserve a connection slot; released when the permit drops.
    fn try_reserve_client(&self) -> Option<OwnedSemaphorePermit> {
        self.client_slots.clone().try_acquire_owned().ok()
    }

    fn client_count(&self) -> usize {
        self.config
            .max_clients
            .saturating_sub(self.client_slots.available_permits())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Handle subcommands
    if let Some(cmd) = args.command.clone() {
        return match cmd {
            Commands::GenConfig { output } => cmd_gen_config(output),
            Commands::Validate { config } => cmd_validate(config),
        };
    }

    let config = build_config(&args)?;

    // Setup logging
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("Tradechat WebSocket server v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Router '{}', delivery timeout {:?}",
        config.router.name,
        config.router.delivery_timeout()
    );

    let addr = config.addr();
    let shutdown = CancellationToken::new();
    let state = Arc::new(AppState::new(config, shutdown.clone()));

    // Build router
    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    // Stats reporting task
    let stats_interval = state.config.stats_interval_secs;
    if stats_interval > 0 {
        let stats_router = state.router.clone();
        let stats_shutdown = shutdown.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(stats_interval));
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = stats_shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        log_stats(&stats_router.stats(), stats_router.registry().len());
                    }
                }
            }
        });
    }

    // Wait for Ctrl+C
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutting down..."),
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
        signal_shutdown.cancel();
    });

    info!("WebSocket endpoint: ws://{}/ws", addr);
    info!("Health check: http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("Final statistics:");
    log_stats(&state.router.stats(), state.router.registry().len());

    Ok(())
}

fn build_config(args: &Args) -> Result<ServerConfig, ConfigError> {
    // Load from file if specified
    if let Some(ref config_path) = args.config {
        return ServerConfig::from_file(config_path);
    }

    let config = ServerConfig {
        bind_address: args.bind.clone(),
        port: args.port,
        max_clients: args.max_clients,
        outbound_buffer: args.outbound_buffer,
        stats_interval_secs: args.stats_interval,
        log_level: args.log_level.clone(),
        router: RouterConfig {
            name: args.name.clone(),
            delivery_timeout_ms: args.delivery_timeout_ms,
        },
    };
    config.validate()?;

    Ok(config)
}

fn cmd_gen_config(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig {
        port: 9090,
        max_clients: 250,
        stats_interval_secs: 60,
        router: RouterConfig {
            name: "trading-desk".into(),
            delivery_timeout_ms: 2000,
        },
        ..ServerConfig::default()
    };

    let toml_str = toml::to_string_pretty(&config)?;

    // Add comments
    let content = format!(
        r#"# Tradechat Server Configuration
# Generated by tradechat-ws gen-config

{}
"#,
        toml_str
    );

    std::fs::write(&output, content)?;
    println!("Generated configuration file: {}", output.display());
    Ok(())
}

fn cmd_validate(config_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    match ServerConfig::from_file(&config_path) {
        Ok(config) => {
            println!("Configuration valid!");
            println!();
            println!("Router: {}", config.router.name);
            println!("Listen: {}", config.addr());
            println!("Max clients: {}", config.max_clients);
            println!(
                "Delivery timeout: {} ms, outbound buffer: {}",
                config.router.delivery_timeout_ms, config.outbound_buffer
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("Configuration invalid: {}", e);
            std::process::exit(1);
        }
    }
}

fn log_stats(stats: &RouterStatsSnapshot, peers: usize) {
    info!(
        "--- Router Statistics --- peers: {}, routed: {} ({:.1} msg/s), broadcasts: {}, direct: {}, deliveries: {}, failures: {}, evictions: {}",
        peers,
        stats.messages_routed,
        stats.messages_per_second(),
        stats.broadcasts,
        stats.direct_messages,
        stats.deliveries,
        stats.delivery_failures,
        stats.evictions
    );
}

/// WebSocket upgrade handler
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let Some(slot) = state.try_reserve_client() else {
        warn!("Connection rejected: max clients reached");
        return (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            "Too many connections",
        )
            .into_response();
    };

    // A failed upgrade drops the callback, and the slot with it.
    ws.on_upgrade(move |socket| handle_socket(socket, state, slot))
        .into_response()
}

/// Handle WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>, slot: OwnedSemaphorePermit) {
    info!("Client connected. Total: {}", state.client_count());

    let session = ClientSession::new(state.router.clone(), state.config.outbound_buffer);

    if let Err(e) = session.run(socket, state.shutdown.child_token()).await {
        error!("Session error: {}", e);
    }

    drop(slot);
    info!("Client disconnected. Total: {}", state.client_count());
}

/// Health check endpoint
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let count = state.client_count();

    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "name": state.router.config().name,
        "clients": count,
        "max_clients": state.config.max_clients,
        "peers": state.router.registry().len(),
        "stats": state.router.stats(),
    }))
}
