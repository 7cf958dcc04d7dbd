use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::{Html, IntoResponse},
    routing::get,
    Router,
};
use clap::Parser;
use std::{net::SocketAddr, path::PathBuf, time::Duration};
use tokio::net::TcpListener;
use tokio::time::sleep;

use speedometer_rs::status::LiveStatus;

/// Standalone dashboard: serves the speedometer page against the
/// live_status.json written by a running (or finished) speedometer,
/// without owning any of the tracking itself.
#[derive(Parser, Debug)]
#[command(name = "dashboard")]
struct Args {
    /// Path to the speedometer data directory
    #[arg(long, default_value = "speedometer_data")]
    data_dir: PathBuf,

    /// Port to serve on
    #[arg(long, default_value = "8081")]
    port: u16,
}

#[derive(Clone)]
struct AppState {
    data_dir: PathBuf,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if !args.data_dir.exists() {
        eprintln!("Warning: Data directory {:?} does not exist", args.data_dir);
    }

    let state = AppState {
        data_dir: args.data_dir.clone(),
    };

    let app = Router::new()
        .route("/", get(index_handler))
        .route("/ws", get(ws_handler))
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    println!("Standalone dashboard listening on http://{}", addr);
    println!("Watching directory: {:?}", args.data_dir);

    let listener = TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

async fn index_handler() -> Html<&'static str> {
    Html(include_str!("../dashboard_static.html"))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let status_file = state.data_dir.join("live_status.json");
    let mut last_mtime = std::time::SystemTime::UNIX_EPOCH;

    loop {
        // Forward the file whenever it changes
        if let Ok(metadata) = std::fs::metadata(&status_file) {
            if let Ok(mtime) = metadata.modified() {
                if mtime > last_mtime {
                    last_mtime = mtime;

                    if let Ok(content) = tokio::fs::read_to_string(&status_file).await {
                        if let Ok(status) = serde_json::from_str::<LiveStatus>(&content) {
                            let json = serde_json::to_string(&status).unwrap();
                            if socket.send(Message::Text(json)).await.is_err() {
                                break;
                            }
                        }
                    }
                }
            }
        }

        // 2Hz polling (matches the speedometer write rate)
        sleep(Duration::from_millis(500)).await;
    }
}
