//! Local HTTP servers standing in for the price pages and the Lark webhook.

use axum::extract::Json;
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::{get, post};
use axum::Router;
use serde_json::Value;
use std::sync::{Arc, Mutex};

/// Serve `app` on an ephemeral port and return its base URL.
pub async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// Markets pages for `(slug, displayed price)` pairs. Other slugs get 404.
pub async fn price_pages(pages: &[(&str, &str)]) -> String {
    let mut app = Router::new();
    for (slug, price) in pages {
        let body = format!(
            r#"<html><body><div class="sc-16r8icm"><div class="priceValue "><span>{price}</span></div></div></body></html>"#
        );
        app = app.route(
            &format!("/currencies/{slug}/markets/"),
            get(move || {
                let body = body.clone();
                async move { Html(body) }
            }),
        );
    }
    spawn(app).await
}

/// Webhook answering `status` and recording every JSON body it receives.
pub async fn webhook(status: StatusCode) -> (String, Arc<Mutex<Vec<Value>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorded = seen.clone();
    let app = Router::new().route(
        "/hook",
        post(move |Json(body): Json<Value>| {
            let recorded = recorded.clone();
            async move {
                recorded.lock().unwrap().push(body);
                status
            }
        }),
    );
    let base = spawn(app).await;
    (format!("{base}/hook"), seen)
}
