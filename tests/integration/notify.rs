//! Notifier delivery against a local webhook.

use axum::http::StatusCode;
use std::time::Duration;

use np_autodeploy::notify::{LarkNotifier, Notifier, NotifierSet};

use crate::servers::webhook;

fn lark(url: &str) -> LarkNotifier {
    LarkNotifier::new(url, "https://accounts.google.com/", Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_success_card_delivered() {
    let (url, seen) = webhook(StatusCode::OK).await;
    assert!(lark(&url).notify("Token BTC deployed", false).await);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0]["msg_type"], "post");
    assert_eq!(seen[0]["content"]["post"]["en_us"]["title"], "New update on auto deployment");
}

#[tokio::test]
async fn test_alert_delivered_as_text() {
    let (url, seen) = webhook(StatusCode::OK).await;
    assert!(lark(&url).notify("Pool stage failed", true).await);

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0]["msg_type"], "text");
    assert_eq!(seen[0]["content"]["text"], "Pool stage failed");
}

#[tokio::test]
async fn test_non_200_is_not_delivered() {
    let (url, seen) = webhook(StatusCode::INTERNAL_SERVER_ERROR).await;
    assert!(!lark(&url).notify("hello", false).await);
    // The request still reached the server.
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_set_requires_every_channel() {
    let (ok_url, _) = webhook(StatusCode::OK).await;
    let (bad_url, _) = webhook(StatusCode::BAD_GATEWAY).await;

    let set = NotifierSet::new()
        .with(Box::new(lark(&ok_url)))
        .with(Box::new(lark(&bad_url)));
    assert_eq!(set.len(), 2);
    assert!(!set.success("partial").await);

    let ok_only = NotifierSet::new().with(Box::new(lark(&ok_url)));
    assert!(ok_only.alert("all good").await);
}
