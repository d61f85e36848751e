//! E2E tests for health check and basic server functionality

mod common;

use common::TestServer;

#[tokio::test]
async fn test_health_check() {
    let server = TestServer::new().await;

    let response = server.get("/health", None).await;

    assert_eq!(response.status(), 200);
    let body = response.text().await.unwrap();
    assert_eq!(body, "OK");
}

#[tokio::test]
async fn test_metrics_endpoint_exposes_counters() {
    let server = TestServer::new().await;

    // Generate at least one counted request and one counted error
    server.get("/health", None).await;
    server.get("/invites/token", None).await;

    let response = server.get("/metrics", None).await;

    assert_eq!(response.status(), 200);
    let body = response.text().await.unwrap();
    assert!(body.contains("connix_http_requests_total"));
    assert!(body.contains("connix_errors_total"));
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let server = TestServer::new().await;

    let response = server.get("/this/does/not/exist", None).await;

    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_static_files_are_served() {
    let server = TestServer::new().await;
    let static_dir = server.static_dir();
    std::fs::create_dir_all(&static_dir).unwrap();
    std::fs::write(static_dir.join("app.css"), "body { margin: 0; }").unwrap();

    let response = server.get("/static/app.css", None).await;

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "body { margin: 0; }");
}
