//! Waypost demo server.
//!
//! Serves a handful of routes showing the request lifecycle: request ids,
//! access logging, path and query parameters, strict JSON binding, errors and
//! Basic authentication on a route group.

use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

use waypost::config::{load_config, WaypostConfig};
use waypost::observability::init_logging;
use waypost::{middleware, Engine, HttpError, Shutdown};

#[derive(Debug, Parser)]
#[command(name = "waypost", version, about = "Waypost demo server")]
struct Args {
    /// Path to a TOML config file; defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Serialize)]
struct Echo {
    message: String,
    #[serde(default)]
    repeat: u8,
}

fn build_engine(config: &WaypostConfig) -> Engine {
    let mut engine = Engine::with_config(&config.engine);
    engine.use_middleware([middleware::request_id(), middleware::request_logger()]);

    engine.get("/", |c| {
        Box::pin(async move { c.string(axum::http::StatusCode::OK, "waypost\n") })
    });

    engine.get("/hello/{name}", |c| {
        Box::pin(async move {
            let greeting = c.query_param("greeting", "Hello").to_owned();
            let text = format!("{}, {}!\n", greeting, c.path_value("name"));
            c.string(axum::http::StatusCode::OK, &text)
        })
    });

    engine.post("/echo", |c| {
        Box::pin(async move {
            let mut echo: Echo = c.bind_json().await?;
            echo.message = echo.message.repeat(usize::from(echo.repeat.max(1)));
            c.json(&echo)
        })
    });

    engine.get("/teapot", |_c| {
        Box::pin(async move {
            Err(HttpError::new(axum::http::StatusCode::IM_A_TEAPOT)
                .with_message("short and stout")
                .into())
        })
    });

    let admin = engine.group(
        "/admin",
        [middleware::basic_auth("waypost admin", |user, password| {
            user == "admin" && password == "admin"
        })],
    );
    admin.get("/stats", |c| {
        Box::pin(async move {
            let id = c.request_id().to_owned();
            c.json(&serde_json::json!({ "request_id": id }))
        })
    });

    engine
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => WaypostConfig::default(),
    };

    init_logging(&config.observability)?;

    tracing::info!(
        bind_address = %config.server.bind_address,
        request_timeout_secs = config.server.request_timeout_secs,
        pool_capacity = config.engine.pool_capacity,
        "Configuration loaded"
    );

    let engine = build_engine(&config);

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    tokio::spawn(async move { shutdown.trigger_on_ctrl_c().await });

    engine.serve(listener, config.server.clone(), receiver).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
