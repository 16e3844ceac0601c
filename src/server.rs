use std::net::SocketAddr;
use std::sync::{Arc, RwLock};
use std::thread;

use axum::Router;
use axum::extract::State;
use axum::http::header;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use tracing::{info, warn};

/// Latest rendered chart, shared between the telemetry sink and the
/// status server.
#[derive(Clone, Default)]
pub struct StatusBoard {
    image: Arc<RwLock<Vec<u8>>>,
}

impl StatusBoard {
    pub fn publish(&self, image: Vec<u8>) {
        // A poisoned lock still holds a usable image.
        let mut guard = self.image.write().unwrap_or_else(|e| e.into_inner());
        *guard = image;
    }

    pub fn snapshot(&self) -> Vec<u8> {
        self.image.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

const VIEWER_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8" />
    <title>evotrans</title>
    <style>
        body, html {
            background-color: #000;
            margin: 0;
            height: 100%;
            display: flex;
            align-items: center;
            justify-content: center;
        }
        img {
            max-width: 100vw;
            height: auto;
        }
    </style>
    <script>
        function updateImage() {
            document.getElementById("image").src = "/image?time=" + new Date().getTime();
        }
        setInterval(updateImage, 250);
    </script>
</head>
<body>
    <img id="image" src="/image" />
</body>
</html>
"#;

/// `/image` serves the chart; every other path serves the viewer page.
pub fn router(board: StatusBoard) -> Router {
    Router::new()
        .route("/image", get(image))
        .fallback(viewer)
        .with_state(board)
}

async fn image(State(board): State<StatusBoard>) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "image/svg+xml"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        board.snapshot(),
    )
}

async fn viewer() -> Html<&'static str> {
    Html(VIEWER_HTML)
}

/// Serve `board` on `addr` from a dedicated thread.
///
/// Runtime, bind and serve failures are logged and end the thread; they
/// never reach the caller.
pub fn spawn(addr: SocketAddr, board: StatusBoard) -> Option<thread::JoinHandle<()>> {
    let spawned = thread::Builder::new().name("status-server".into()).spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
            Ok(runtime) => runtime,
            Err(err) => {
                warn!("status server runtime failed to start: {err}");
                return;
            }
        };
        runtime.block_on(async move {
            let listener = match tokio::net::TcpListener::bind(addr).await {
                Ok(listener) => listener,
                Err(err) => {
                    warn!("status server failed to bind {addr}: {err}");
                    return;
                }
            };
            info!("status server listening on http://{addr}");
            if let Err(err) = axum::serve(listener, router(board)).await {
                warn!("status server exited: {err}");
            }
        });
    });
    match spawned {
        Ok(handle) => Some(handle),
        Err(err) => {
            warn!("failed to spawn status server thread: {err}");
            None
        }
    }
}
