//! HTTP handlers for the barrier
//!
//! | Path             | Bodies          |
//! |------------------|-----------------|
//! | `/gotime/start`  | `GO` / `NOGO`   |
//! | `/`              | same as start   |
//! | `/gotime/finish` | `OK` / `KO`     |
//!
//! Any other path goes to the file fallback. All methods are accepted.

use axum::{
    extract::{connect_info::ConnectInfo, Request, State},
    http::{header, HeaderValue, StatusCode, Uri, Version},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use std::sync::atomic::Ordering;
use tower_http::services::ServeDir;

use super::server::AppState;
use super::transport::ConnectionHandle;

/// Path of the admission endpoint
pub const START_PATH: &str = "/gotime/start";

/// Path of the completion endpoint
pub const FINISH_PATH: &str = "/gotime/finish";

// ============================================================================
// API Routes
// ============================================================================

/// Create the barrier router
pub fn create_router(state: AppState) -> Router {
    let document_root = state.config.document_root.clone();

    let router = Router::new()
        // Bare root kept for older clients of the protocol
        .route("/", any(start))
        .route(START_PATH, any(start))
        .route(FINISH_PATH, any(finish))
        .with_state(state);

    match document_root {
        Some(root) => router.fallback_service(ServeDir::new(root)),
        None => router.fallback(not_found),
    }
}

/// Plain-text response with an exact content length
fn text_response(body: &'static str) -> Response {
    (
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; charset=utf-8"),
            ),
            (header::CONTENT_LENGTH, HeaderValue::from(body.len())),
        ],
        body,
    )
        .into_response()
}

// ============================================================================
// Barrier Handlers
// ============================================================================

/// Admission endpoint
async fn start(State(state): State<AppState>, uri: Uri) -> Response {
    let seq = state.requests.fetch_add(1, Ordering::SeqCst) + 1;
    let admission = state.barrier.start().await;

    if state.config.verbose {
        tracing::info!(
            request = seq,
            path = %uri.path(),
            decision = admission.body(),
            "Received {}. request {:?}",
            seq,
            uri.path()
        );
    }

    text_response(admission.body())
}

/// Completion endpoint
///
/// The completion that reaches the quota is answered with
/// `Connection: close`, and the process exits once that connection has been
/// shut down.
async fn finish(State(state): State<AppState>, request: Request) -> Response {
    let seq = state.requests.fetch_add(1, Ordering::SeqCst) + 1;
    let completion = state.barrier.finish().await;

    if state.config.verbose {
        tracing::info!(
            request = seq,
            path = %request.uri().path(),
            decision = completion.body(),
            "Received {}. request {:?}",
            seq,
            request.uri().path()
        );
    }

    let mut response = text_response(completion.body());

    if completion.reached_quorum() {
        tracing::info!(
            quota = state.config.quota,
            elapsed_ms = state.start_time.elapsed().as_millis() as u64,
            "Quorum reached"
        );

        // Closing after the response is an HTTP/1 mechanism; HTTP/2 forbids
        // the header and the exit then waits for the peer to hang up
        if request.version() < Version::HTTP_2 {
            response
                .headers_mut()
                .insert(header::CONNECTION, HeaderValue::from_static("close"));
        } else {
            tracing::warn!(
                version = ?request.version(),
                "Final completion over HTTP/2, exit waits for the client to disconnect"
            );
        }

        let connection = request
            .extensions()
            .get::<ConnectInfo<ConnectionHandle>>()
            .map(|ConnectInfo(handle)| handle);
        state.sequencer.trigger(connection);
    }

    response
}

/// Fallback without a document root
async fn not_found() -> impl IntoResponse {
    StatusCode::NOT_FOUND
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::config::CoordinatorConfig;
    use crate::coordinator::probe::testing::ScriptedProbe;
    use crate::coordinator::server::CoordinatorServer;
    use crate::coordinator::shutdown::testing::RecordingExit;
    use axum::body::Body;
    use axum::http::Method;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn server(quota: u64, probe: ScriptedProbe, exit: Arc<RecordingExit>) -> CoordinatorServer {
        let config = CoordinatorConfig::builder()
            .quota(quota)
            .verbose(true)
            .readiness_command(["true"])
            .build()
            .unwrap();
        CoordinatorServer::with_parts(config, Arc::new(probe), exit).unwrap()
    }

    async fn call(router: &Router, method: Method, path: &str) -> (StatusCode, String) {
        let request = axum::http::Request::builder()
            .method(method)
            .uri(path)
            .body(Body::empty())
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_start_and_finish_bodies() {
        let exit = Arc::new(RecordingExit::default());
        let router = server(0, ScriptedProbe::always(true), exit.clone()).build_router();

        assert_eq!(call(&router, Method::GET, "/gotime/finish").await.1, "KO");
        assert_eq!(call(&router, Method::GET, "/gotime/start").await.1, "GO");
        assert_eq!(call(&router, Method::POST, "/gotime/finish").await.1, "OK");
        assert_eq!(call(&router, Method::GET, "/gotime/finish").await.1, "KO");
        assert!(exit.codes().is_empty());
    }

    #[tokio::test]
    async fn test_root_is_start() {
        let exit = Arc::new(RecordingExit::default());
        let router = server(0, ScriptedProbe::always(true), exit).build_router();

        let (status, body) = call(&router, Method::GET, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "GO");
    }

    #[tokio::test]
    async fn test_headers() {
        let exit = Arc::new(RecordingExit::default());
        let router = server(0, ScriptedProbe::always(false), exit).build_router();

        let request = axum::http::Request::builder()
            .uri("/gotime/start")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "4");
    }

    #[tokio::test]
    async fn test_not_ready_then_ready() {
        let exit = Arc::new(RecordingExit::default());
        let router = server(1, ScriptedProbe::new([false, false, true]), exit).build_router();

        assert_eq!(call(&router, Method::GET, "/gotime/start").await.1, "NOGO");
        assert_eq!(call(&router, Method::GET, "/gotime/start").await.1, "NOGO");
        assert_eq!(call(&router, Method::GET, "/gotime/start").await.1, "GO");
        assert_eq!(call(&router, Method::GET, "/gotime/start").await.1, "NOGO");
    }

    #[tokio::test]
    async fn test_quorum_sets_connection_close() {
        let exit = Arc::new(RecordingExit::default());
        let router = server(1, ScriptedProbe::always(true), exit.clone()).build_router();

        call(&router, Method::GET, "/gotime/start").await;

        let request = axum::http::Request::builder()
            .uri("/gotime/finish")
            .body(Body::empty())
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.headers()[header::CONNECTION], "close");

        // No tracked connection in-process, so the exit is immediate
        assert_eq!(exit.codes(), vec![0]);
        assert_eq!(call(&router, Method::GET, "/gotime/start").await.1, "NOGO");
        assert_eq!(call(&router, Method::GET, "/gotime/finish").await.1, "KO");
    }

    #[tokio::test]
    async fn test_quorum_over_http2_omits_connection_header() {
        let exit = Arc::new(RecordingExit::default());
        let router = server(1, ScriptedProbe::always(true), exit.clone()).build_router();

        call(&router, Method::GET, "/gotime/start").await;

        let request = axum::http::Request::builder()
            .uri("/gotime/finish")
            .version(Version::HTTP_2)
            .body(Body::empty())
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        assert!(response.headers().get(header::CONNECTION).is_none());

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"OK");
        assert_eq!(exit.codes(), vec![0]);
    }

    #[tokio::test]
    async fn test_unknown_path_without_root() {
        let exit = Arc::new(RecordingExit::default());
        let router = server(0, ScriptedProbe::always(true), exit).build_router();

        let (status, body) = call(&router, Method::GET, "/index.html").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_path_served_from_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hello.txt"), "hello").unwrap();

        let config = CoordinatorConfig::builder()
            .readiness_command(["true"])
            .document_root(dir.path())
            .build()
            .unwrap();
        let exit = Arc::new(RecordingExit::default());
        let router = CoordinatorServer::with_parts(config, Arc::new(ScriptedProbe::always(true)), exit)
            .unwrap()
            .build_router();

        let (status, body) = call(&router, Method::GET, "/hello.txt").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "hello");

        let (status, body) = call(&router, Method::GET, "/missing.txt").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.is_empty());

        // Barrier paths win over files
        assert_eq!(call(&router, Method::GET, "/gotime/start").await.1, "GO");
    }
}
