use super::handlers::{
    handle_create, handle_delete, handle_get_task, handle_health, handle_hold, handle_list,
};
use super::{AppState, MAX_BODY_SIZE, REQUEST_TIMEOUT_SECS};

use crate::diagnostics::health;
use crate::platform::tasks::TaskService;
use anyhow::{Context, Result};
use axum::{
    Router,
    http::StatusCode,
    routing::{delete, get, post},
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::watch;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Run the HTTP gateway using axum with proper HTTP/1.1 compliance. Stops
/// accepting connections once `shutdown` reads `true` and drains in-flight
/// requests.
pub async fn run_gateway(
    host: &str,
    port: u16,
    service: TaskService,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .context("parse gateway bind address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("bind gateway socket")?;

    run_gateway_with_listener(host, listener, service, shutdown).await
}

/// Run the HTTP gateway from a pre-bound listener.
pub async fn run_gateway_with_listener(
    host: &str,
    listener: tokio::net::TcpListener,
    service: TaskService,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let actual_port = listener
        .local_addr()
        .context("get gateway listener local address")?
        .port();
    let display_addr = format!("{host}:{actual_port}");

    print_gateway_banner(&display_addr);
    health::mark_component_ok("gateway");

    let app = build_app(AppState { service });
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            while shutdown.changed().await.is_ok() {
                let stopping = *shutdown.borrow();
                if stopping {
                    break;
                }
            }
        })
        .await
        .context("serve HTTP gateway")?;

    Ok(())
}

fn print_gateway_banner(display_addr: &str) {
    println!("Gateway listening on {display_addr}");
    println!("  POST   /task/create");
    println!("  POST   /task/hold?taskId=..&onHold=..&onlyDb=..");
    println!("  DELETE /task/delete?taskId=..");
    println!("  GET    /task?taskId=..");
    println!("  GET    /tasks");
    println!("  GET    /health");
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/task/create", post(handle_create))
        .route("/task/hold", post(handle_hold))
        .route("/task/delete", delete(handle_delete))
        .route("/task", get(handle_get_task))
        .route("/tasks", get(handle_list))
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        ))
}
