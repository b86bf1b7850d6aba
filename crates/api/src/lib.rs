//! Read-only JSON endpoints over the tracker.

use std::convert::Infallible;
use std::net::SocketAddr;

use anyhow::Result;
use hyper::{
    header,
    service::{make_service_fn, service_fn},
    Body, Method, Request, Response, Server, StatusCode,
};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};
use tracker::query::iso_date;
use tracker::QueryService;

pub async fn serve(queries: QueryService, addr: SocketAddr) -> Result<()> {
    let make_svc = make_service_fn(move |_| {
        let queries = queries.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req: Request<Body>| {
                let queries = queries.clone();
                async move { Ok::<_, Infallible>(route(&queries, req).await) }
            }))
        }
    });

    let server = Server::bind(&addr).serve(make_svc);
    info!(%addr, "http api listening");
    server.await?;
    Ok(())
}

pub async fn route(queries: &QueryService, req: Request<Body>) -> Response<Body> {
    if req.method() != Method::GET {
        return error_response(StatusCode::METHOD_NOT_ALLOWED, "method not allowed");
    }

    let path = req.uri().path().to_owned();
    let hours = query_param(req.uri().query(), "hours");
    drop(req);

    let path = path.as_str();
    match path {
        "/health" => json_response(
            StatusCode::OK,
            &json!({
                "status": "ok",
                "timestamp": iso_date(chrono::Utc::now().timestamp_millis()),
            }),
        ),
        "/api/stats" => respond(path, queries.current_stats().await),
        "/api/history" => respond(path, queries.history(hours.as_deref()).await),
        "/api/activity" => respond(path, queries.activity().await),
        _ => error_response(StatusCode::NOT_FOUND, "not found"),
    }
}

fn query_param(query: Option<&str>, name: &str) -> Option<String> {
    url::form_urlencoded::parse(query?.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

fn respond<T, E>(path: &str, result: std::result::Result<T, E>) -> Response<Body>
where
    T: Serialize,
    E: std::fmt::Display,
{
    match result {
        Ok(body) => json_response(StatusCode::OK, &body),
        Err(err) => {
            warn!(path, error = %err, "request failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string())
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> Response<Body> {
    json_response(status, &json!({ "error": message }))
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Body> {
    let (status, bytes) = match serde_json::to_vec(body) {
        Ok(bytes) => (status, bytes),
        Err(err) => {
            warn!(error = %err, "failed to serialize response");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                br#"{"error":"serialization failed"}"#.to_vec(),
            )
        }
    };
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );
    response
}
