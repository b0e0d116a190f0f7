use super::*;
use axum::{body, body::Body, http::Request};
use tower::ServiceExt;

async fn get_healthz(app: Router) -> (StatusCode, String) {
    let request = Request::get("/healthz")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    let status = response.status();
    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    (status, String::from_utf8_lossy(&body).into_owned())
}

#[tokio::test]
async fn healthz_reports_ok_when_store_is_ready() {
    let store = FavoritesStore::new("sqlite::memory:").await.expect("db");

    let (status, body) = get_healthz(build_router(store)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn healthz_reports_unavailable_when_store_is_closed() {
    let store = FavoritesStore::new("sqlite::memory:").await.expect("db");
    store.pool().close().await;

    let (status, _) = get_healthz(build_router(store)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}
