use reqwest::StatusCode;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(admin_token: &str) -> Self {
        // Build app (same router as prod), but bind to an ephemeral port.
        let app = promoforge_api::app::build_app(admin_token.to_string()).await;
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[tokio::test]
async fn health_is_public() {
    let server = TestServer::spawn("secret").await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/health", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn monitoring_requires_the_admin_token() {
    let server = TestServer::spawn("secret").await;
    let client = reqwest::Client::new();

    let url = format!("{}/monitoring/health/queue", server.base_url);

    let resp = client.get(&url).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = client
        .get(&url)
        .header("x-admin-token", "wrong")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = client
        .get(&url)
        .header("x-admin-token", "secret")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["healthy"], true);
}

#[tokio::test]
async fn stuck_scan_is_empty_on_a_fresh_system() {
    let server = TestServer::spawn("secret").await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/monitoring/campaigns/stuck", server.base_url))
        .header("x-admin-token", "secret")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["summary"]["overdue_close"], 0);
    assert!(body["data"]["campaigns"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn monitor_of_unknown_campaign_is_not_found() {
    let server = TestServer::spawn("secret").await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/campaigns/12345/monitor", server.base_url))
        .header("x-admin-token", "secret")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = client
        .get(format!("{}/campaigns/not-a-number/monitor", server.base_url))
        .header("x-admin-token", "secret")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn retry_of_unknown_event_is_not_found() {
    let server = TestServer::spawn("secret").await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/campaigns/events/999/retry", server.base_url))
        .header("x-admin-token", "secret")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = client
        .post(format!("{}/campaigns/77/resume", server.base_url))
        .header("x-admin-token", "secret")
        .send()
        .await
        .unwrap();
    // Unknown campaign: nothing parked, nothing replayed.
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["retried"], 0);
    assert_eq!(body["failed"], 0);
}
