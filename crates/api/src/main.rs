#[tokio::main]
async fn main() {
    promoforge_observability::init();

    let admin_token = std::env::var("ADMIN_TOKEN").unwrap_or_else(|_| {
        tracing::warn!("ADMIN_TOKEN not set; using insecure dev default");
        "dev-admin".to_string()
    });

    let app = promoforge_api::app::build_app(admin_token).await;

    let listener = tokio::net::TcpListener::bind("0.0.0.0:8080")
        .await
        .expect("failed to bind 0.0.0.0:8080");

    tracing::info!("listening on {}", listener.local_addr().unwrap());

    axum::serve(listener, app).await.unwrap();
}
