//! Liveness listener for the hosting platform's health probe.

use anyhow::{Context, Result};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server, StatusCode};
use std::convert::Infallible;
use std::net::SocketAddr;
use tokio::sync::watch;
use tracing::info;

const BODY: &str = "Perp signal engine running";

async fn handle(_req: Request<Body>) -> Result<Response<Body>, Infallible> {
    let mut response = Response::new(Body::from(BODY));
    *response.status_mut() = StatusCode::OK;
    Ok(response)
}

/// Answer every request with 200 until shutdown is signaled.
pub async fn serve(port: u16, mut shutdown: watch::Receiver<bool>) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let make_svc = make_service_fn(|_conn| async { Ok::<_, Infallible>(service_fn(handle)) });

    let server = Server::try_bind(&addr)
        .with_context(|| format!("Failed to bind liveness listener on {}", addr))?
        .serve(make_svc);
    info!("🩺 Liveness listener on http://{}", addr);

    server
        .with_graceful_shutdown(async move {
            while !*shutdown.borrow() {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
        })
        .await
        .context("Liveness listener failed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_any_path_is_ok() {
        let req = Request::builder()
            .uri("/whatever")
            .body(Body::empty())
            .unwrap();
        let response = handle(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
        assert_eq!(&body[..], BODY.as_bytes());
    }

    #[tokio::test]
    async fn test_shutdown_stops_listener() {
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(serve(0, rx));
        tokio::task::yield_now().await;
        tx.send(true).unwrap();
        tokio_test::assert_ok!(task.await.unwrap());
    }
}
