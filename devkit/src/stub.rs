use futures::future::BoxFuture;
use homelink_bridge::error::BridgeError;
use homelink_bridge::transport::MessagePublisher;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// One recorded publish, for test assertions.
#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl PublishedMessage {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.payload).unwrap_or(serde_json::Value::Null)
    }
}

/// Stands in for the MQTT client: records everything published through it
/// and can be told to fail the next N publishes.
#[derive(Default)]
pub struct StubPublisher {
    published: Mutex<Vec<PublishedMessage>>,
    failures: AtomicUsize,
}

impl StubPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `count` publishes return a transport error instead of
    /// being recorded.
    pub fn fail_next(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published.lock().unwrap().clone()
    }

    pub fn published_count(&self) -> usize {
        self.published.lock().unwrap().len()
    }

    pub fn messages_on(&self, topic: &str) -> Vec<PublishedMessage> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.topic == topic)
            .cloned()
            .collect()
    }

    /// Parses the most recent message on a topic as JSON.
    pub fn last_json_on(&self, topic: &str) -> Option<serde_json::Value> {
        self.messages_on(topic).last().map(PublishedMessage::json)
    }
}

impl MessagePublisher for StubPublisher {
    fn publish(&self, topic: String, payload: Vec<u8>) -> BoxFuture<'_, Result<(), BridgeError>> {
        Box::pin(async move {
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(BridgeError::Transport("injected stub failure".into()));
            }
            self.published
                .lock()
                .unwrap()
                .push(PublishedMessage { topic, payload });
            Ok(())
        })
    }
}
