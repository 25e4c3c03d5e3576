use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{State, WebSocketUpgrade},
    response::{Html, IntoResponse},
    routing::get,
    Router,
};
use chrono::Utc;
use shared::protocol::BackendFrame;
use tokio::{
    sync::{broadcast, watch},
    time::{Instant, MissedTickBehavior},
};
use tracing::{debug, info};

mod app_state;
mod config;
mod feed;

use app_state::AppState;
use config::load_settings;
use feed::{run_feed, SyntheticDetector};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let settings = load_settings();
    let (stats_tx, stats_rx) = watch::channel(Default::default());
    let (commands, _) = broadcast::channel(256);

    let detector = SyntheticDetector::new(
        settings.gesture_probability,
        settings.confidence,
        None,
        Instant::now(),
    );
    tokio::spawn(run_feed(
        detector,
        settings.frame_interval(),
        stats_tx,
        commands.clone(),
    ));

    let state = AppState {
        stats: stats_rx,
        commands,
        stats_interval: settings.stats_interval(),
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/healthz", get(healthz))
        .route("/ws", get(ws_handler))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn index() -> Html<&'static str> {
    Html(
        "<html><body>\
         <h3>Eye backend</h3>\
         <ul><li>WebSocket endpoint: <code>/ws</code> (stats and gesture_command frames)</li></ul>\
         </body></html>",
    )
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws_connection(state, socket))
}

async fn ws_connection(state: Arc<AppState>, socket: axum::extract::ws::WebSocket) {
    use axum::extract::ws::Message;
    use futures::{SinkExt, StreamExt};

    let (mut sender, mut receiver) = socket.split();
    let mut commands_rx = state.commands.subscribe();
    let stats = state.stats.clone();
    let stats_interval = state.stats_interval;
    debug!("ws: client attached");

    let send_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(stats_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            let frame = tokio::select! {
                _ = ticker.tick() => {
                    let snapshot = stats.borrow().clone();
                    BackendFrame::stats(snapshot, Utc::now())
                }
                command = commands_rx.recv() => match command {
                    Ok(frame) => frame,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "ws: client lagging, gesture commands skipped");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            };
            let text = match serde_json::to_string(&frame) {
                Ok(v) => v,
                Err(_) => continue,
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(_msg)) = receiver.next().await {}

    send_task.abort();
    debug!("ws: client detached");
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
