//! Development server.
//!
//! - `GET /_kiln/live`: WebSocket, one text frame per broadcast
//! - `POST /_kiln/graphql`: `{ query, variables }` in, `{ data, errors? }` out
//! - `GET /_kiln/route?path=/blog/hello`: page query data for a path
//! - `POST /_kiln/regenerate`: rebuild routes and artifacts

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tokio::net::TcpListener;
use tracing::{debug, error, info};
use uuid::Uuid;

use kiln_lib::App;
use kiln_lib::consts::LIVE_ENDPOINT;

pub fn router(app: Arc<App>) -> Router {
  Router::new()
    .route(LIVE_ENDPOINT, get(live_handler))
    .route("/_kiln/graphql", post(graphql_handler))
    .route("/_kiln/route", get(route_handler))
    .route("/_kiln/regenerate", post(regenerate_handler))
    .with_state(app)
}

pub async fn bind(host: &str, port: u16) -> anyhow::Result<(TcpListener, SocketAddr)> {
  let listener = TcpListener::bind((host, port))
    .await
    .with_context(|| format!("failed to bind {}:{}", host, port))?;
  let addr = listener.local_addr().context("failed to read bound address")?;
  Ok((listener, addr))
}

/// Serve until `shutdown` resolves.
pub async fn serve(
  app: Arc<App>,
  listener: TcpListener,
  shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
  if let Ok(addr) = listener.local_addr() {
    info!(%addr, "dev server listening");
  }
  axum::serve(listener, router(app))
    .with_graceful_shutdown(shutdown)
    .await
    .context("dev server failed")?;
  Ok(())
}

async fn live_handler(ws: WebSocketUpgrade, State(app): State<Arc<App>>) -> impl IntoResponse {
  ws.on_upgrade(move |socket| handle_socket(socket, app))
}

/// Forward broadcasts to the socket until either side goes away.
async fn handle_socket(socket: WebSocket, app: Arc<App>) {
  let id = Uuid::new_v4().to_string();
  let mut messages = app.clients().register(id.clone());
  let (mut sink, mut stream) = socket.split();

  let mut send_task = tokio::spawn(async move {
    while let Some(message) = messages.recv().await {
      if sink.send(Message::Text(message)).await.is_err() {
        break;
      }
    }
  });

  let mut recv_task = tokio::spawn(async move {
    while let Some(frame) = stream.next().await {
      match frame {
        Ok(Message::Close(_)) | Err(_) => break,
        Ok(_) => {}
      }
    }
  });

  tokio::select! {
    _ = &mut send_task => recv_task.abort(),
    _ = &mut recv_task => send_task.abort(),
  }

  app.clients().unregister(&id);
  debug!(client = %id, "live socket closed");
}

#[derive(Debug, Deserialize)]
struct GraphqlRequest {
  query: String,
  #[serde(default)]
  variables: Option<Map<String, Value>>,
}

async fn graphql_handler(State(app): State<Arc<App>>, Json(request): Json<GraphqlRequest>) -> impl IntoResponse {
  let variables = request.variables.unwrap_or_default();
  Json(app.graphql(request.query.as_str(), &variables))
}

#[derive(Debug, Deserialize)]
struct RouteParams {
  path: String,
}

async fn route_handler(State(app): State<Arc<App>>, Query(params): Query<RouteParams>) -> impl IntoResponse {
  let route = app.resolve_route(&params.path);
  Json(app.query_route_data(&route))
}

async fn regenerate_handler(State(app): State<Arc<App>>) -> Response {
  match app.regenerate_routes().await {
    Ok(result) => Json(result).into_response(),
    Err(err) => {
      error!(error = %err, "regeneration failed");
      (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": err.to_string() })),
      )
        .into_response()
    }
  }
}
