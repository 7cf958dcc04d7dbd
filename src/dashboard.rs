use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::{Html, IntoResponse},
    routing::get,
    Router,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::settings::Settings;
use crate::status::SharedStatus;

#[derive(Clone)]
pub struct DashboardState {
    pub status: SharedStatus,
    /// Page-visibility notifications from the browser, consumed by the
    /// wake-lock session in the main loop.
    pub visibility_tx: mpsc::Sender<bool>,
    /// Settings submitted through the page's settings form. The main loop
    /// persists them; the page never writes state directly.
    pub settings_tx: mpsc::Sender<Settings>,
}

pub async fn start_dashboard(state: DashboardState, port: u16) {
    let app = Router::new()
        .route("/", get(index_handler))
        .route("/ws", get(ws_handler))
        .with_state(state);

    let addr = format!("0.0.0.0:{}", port);
    eprintln!("[DASHBOARD] Serving speedometer at http://{}", addr);

    let listener = TcpListener::bind(&addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

async fn index_handler() -> Html<&'static str> {
    Html(include_str!("dashboard_static.html"))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<DashboardState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

#[derive(Deserialize, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    Visibility {
        visible: bool,
    },
    Settings {
        speed_limit_kmh: u32,
        geo_timeout_ms: u64,
        sound_enabled: bool,
    },
}

async fn handle_socket(socket: WebSocket, state: DashboardState) {
    let (mut sender, mut receiver) = socket.split();
    // 2 Hz push (matches the live-status write rate)
    let mut ticker = tokio::time::interval(Duration::from_millis(500));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let json = {
                    let status = state.status.read().await;
                    serde_json::to_string(&*status).unwrap()
                };
                if sender.send(Message::Text(json)).await.is_err() {
                    // Client disconnected
                    break;
                }
            }
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match parse_client_message(&text) {
                            Some(ClientMessage::Visibility { visible }) => {
                                let _ = state.visibility_tx.send(visible).await;
                            }
                            Some(ClientMessage::Settings {
                                speed_limit_kmh,
                                geo_timeout_ms,
                                sound_enabled,
                            }) => {
                                let _ = state
                                    .settings_tx
                                    .send(Settings {
                                        speed_limit_kmh,
                                        geo_timeout_ms,
                                        sound_enabled,
                                    })
                                    .await;
                            }
                            None => {}
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}

fn parse_client_message(text: &str) -> Option<ClientMessage> {
    serde_json::from_str(text).ok()
}
