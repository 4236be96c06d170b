//! Deployment notifications.
//!
//! A `Notifier` delivers a message either as a success update or as an
//! alert. Delivery failures are logged and reported through the returned
//! flag; they never turn into errors for the caller.

pub mod lark;
pub mod mail;

pub use lark::LarkNotifier;
pub use mail::MailNotifier;

use async_trait::async_trait;
use tracing::debug;

/// A notification channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `message`; `alert` selects the failure presentation.
    /// Returns whether the channel accepted it.
    async fn notify(&self, message: &str, alert: bool) -> bool;

    /// Channel name for logging.
    fn channel(&self) -> &str;
}

/// Fans a message out to every configured channel.
#[derive(Default)]
pub struct NotifierSet {
    channels: Vec<Box<dyn Notifier>>,
}

impl NotifierSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, channel: Box<dyn Notifier>) -> Self {
        self.channels.push(channel);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub async fn success(&self, message: &str) -> bool {
        self.notify(message, false).await
    }

    pub async fn alert(&self, message: &str) -> bool {
        self.notify(message, true).await
    }
}

#[async_trait]
impl Notifier for NotifierSet {
    /// True when every channel accepted the message (vacuously for none).
    async fn notify(&self, message: &str, alert: bool) -> bool {
        let mut all_sent = true;
        for channel in &self.channels {
            let sent = channel.notify(message, alert).await;
            debug!(channel = channel.channel(), sent, alert, "Notification dispatched");
            all_sent &= sent;
        }
        all_sent
    }

    fn channel(&self) -> &str {
        "all"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct Recording {
        name: &'static str,
        accept: bool,
        seen: Arc<Mutex<Vec<(String, bool)>>>,
    }

    #[async_trait]
    impl Notifier for Recording {
        async fn notify(&self, message: &str, alert: bool) -> bool {
            self.seen.lock().unwrap().push((message.to_string(), alert));
            self.accept
        }

        fn channel(&self) -> &str {
            self.name
        }
    }

    #[tokio::test]
    async fn test_fan_out_reaches_every_channel() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let set = NotifierSet::new()
            .with(Box::new(Recording { name: "a", accept: true, seen: seen.clone() }))
            .with(Box::new(Recording { name: "b", accept: false, seen: seen.clone() }));

        assert!(!set.alert("leg failed").await);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen.iter().all(|(m, alert)| m == "leg failed" && *alert));
    }

    #[tokio::test]
    async fn test_all_accepting_is_success() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let set = NotifierSet::new()
            .with(Box::new(Recording { name: "a", accept: true, seen: seen.clone() }));
        assert!(set.success("deployed").await);
        assert_eq!(seen.lock().unwrap()[0], ("deployed".to_string(), false));
    }

    #[tokio::test]
    async fn test_empty_set() {
        let set = NotifierSet::new();
        assert!(set.is_empty());
        assert!(set.success("nobody listens").await);
    }
}
