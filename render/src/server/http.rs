//! HTTP server for the rendered views, the raw profile, health and metrics

use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server, StatusCode};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::dispatch::{View, WebUi};
use crate::metrics;
use crate::server::access;

/// What a request path is served by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    View(View),
    Download,
    Healthz,
    Metrics,
}

impl Route {
    pub fn from_path(path: &str) -> Option<Self> {
        let route = match path {
            "/" => Route::View(View::Graph),
            "/top" => Route::View(View::Top),
            "/flamegraph" => Route::View(View::FlameGraph),
            "/peek" => Route::View(View::Peek),
            "/source" => Route::View(View::Source),
            "/disasm" => Route::View(View::Disasm),
            "/download" => Route::Download,
            "/healthz" => Route::Healthz,
            "/metrics" => Route::Metrics,
            _ => return None,
        };
        Some(route)
    }
}

/// Serve every view of `ui` on `addr`.
pub async fn serve(addr: SocketAddr, ui: Arc<WebUi>) -> Result<(), hyper::Error> {
    let make_svc = make_service_fn(move |_| {
        let ui = ui.clone();
        async move {
            Ok::<_, hyper::Error>(service_fn(move |req: Request<Body>| {
                let ui = ui.clone();
                async move { handle(req, ui).await }
            }))
        }
    });

    tracing::info!("Sightline web server listening on http://{}", addr);
    Server::bind(&addr).serve(make_svc).await
}

fn respond(status: StatusCode, content_type: &'static str, body: impl Into<Body>) -> Response<Body> {
    let mut response = Response::new(body.into());
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

/// Answer one request.
pub async fn handle(req: Request<Body>, ui: Arc<WebUi>) -> Result<Response<Body>, hyper::Error> {
    let path = req.uri().path().to_string();
    let query = req.uri().query().unwrap_or_default().to_string();

    let response = match Route::from_path(&path) {
        Some(Route::View(view)) => {
            let rendered = tokio::task::spawn_blocking(move || ui.render(view, &query)).await;
            match rendered {
                Ok(Ok(view)) => {
                    let mut response = respond(StatusCode::OK, view.content_type, view.body);
                    response
                        .headers_mut()
                        .insert("x-sightline-template", HeaderValue::from_static(view.template));
                    response
                }
                Ok(Err(e)) => respond(e.status_code(), "text/plain", format!("{}\n", e)),
                Err(e) => respond(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "text/plain",
                    format!("render task failed: {}\n", e),
                ),
            }
        }
        Some(Route::Download) => match serde_json::to_vec(ui.profile().as_ref()) {
            Ok(body) => {
                let mut response = respond(StatusCode::OK, "application/json", body);
                response.headers_mut().insert(
                    "content-disposition",
                    HeaderValue::from_static("attachment; filename=\"profile.json\""),
                );
                response
            }
            Err(e) => respond(
                StatusCode::INTERNAL_SERVER_ERROR,
                "text/plain",
                format!("failed to serialize profile: {}\n", e),
            ),
        },
        Some(Route::Healthz) => respond(StatusCode::OK, "text/plain", "ok\n"),
        Some(Route::Metrics) => respond(
            StatusCode::OK,
            "text/plain; version=0.0.4",
            metrics::encode_metrics(),
        ),
        None => respond(StatusCode::NOT_FOUND, "text/plain", "not found\n"),
    };

    access::http_request(&path, response.status().as_u16());
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerSettings;
    use crate::context::AppContext;
    use crate::views::{DiagramEngine, DiagramError};
    use sightline_shared::{Profile, Stack, ValueType};

    struct MissingDot;

    impl DiagramEngine for MissingDot {
        fn to_diagram(&self, _dot: &[u8]) -> Result<Vec<u8>, DiagramError> {
            Err(DiagramError::ToolMissing {
                tool: "dot".to_string(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            })
        }
    }

    fn ui() -> Arc<WebUi> {
        let mut p = Profile::new(vec![ValueType::new("cpu", "nanoseconds")]);
        p.add_sample(Stack::from_call_path(&["main", "work"]), vec![10])
            .unwrap();
        let ctx = AppContext::new(ServerSettings::default()).with_diagram(Arc::new(MissingDot));
        Arc::new(WebUi::new(p, &ctx))
    }

    async fn get(uri: &str) -> Response<Body> {
        let req = Request::get(uri).body(Body::empty()).unwrap();
        handle(req, ui()).await.unwrap()
    }

    async fn body_text(response: Response<Body>) -> String {
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_routes() {
        assert_eq!(Route::from_path("/"), Some(Route::View(View::Graph)));
        assert_eq!(Route::from_path("/peek"), Some(Route::View(View::Peek)));
        assert_eq!(Route::from_path("/download"), Some(Route::Download));
        assert_eq!(Route::from_path("/graph/extra"), None);
    }

    #[tokio::test]
    async fn test_top_view() {
        let response = get("/top?si=cpu").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-sightline-template"], "top");
        assert!(body_text(response).await.contains("\"total\":10"));
    }

    #[tokio::test]
    async fn test_errors_are_plain_text() {
        let response = get("/top?f=(").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/plain");

        let response = get("/").await;
        assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
        assert_eq!(
            body_text(response).await,
            "Could not execute dot; may need to install graphviz.\n"
        );
    }

    #[tokio::test]
    async fn test_download_healthz_and_unknown() {
        let response = get("/download").await;
        assert_eq!(response.status(), StatusCode::OK);
        let profile: Profile = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(profile.samples.len(), 1);

        assert_eq!(get("/healthz").await.status(), StatusCode::OK);
        assert_eq!(get("/nope").await.status(), StatusCode::NOT_FOUND);
    }
}
