//! Test utilities and fixtures shared by unit tests.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::mpsc;

use crate::model::{Actor, NewPackage, Party};
use crate::sync::{FeedSignal, InsertHandler};

/// Handler that forwards every signal into an unbounded channel.
pub struct RecordingHandler {
    sender: mpsc::UnboundedSender<FeedSignal>,
}

impl RecordingHandler {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<FeedSignal>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Arc::new(Self { sender }), receiver)
    }
}

impl InsertHandler for RecordingHandler {
    fn on_signal(&self, signal: FeedSignal) -> BoxFuture<'static, ()> {
        let _ = self.sender.send(signal);
        Box::pin(async {})
    }
}

/// Wait up to one second for the next recorded signal.
pub async fn next_signal(receiver: &mut mpsc::UnboundedReceiver<FeedSignal>) -> Option<FeedSignal> {
    tokio::time::timeout(Duration::from_secs(1), receiver.recv())
        .await
        .ok()
        .flatten()
}

/// Assert that nothing arrives within a short window.
pub async fn assert_quiet(receiver: &mut mpsc::UnboundedReceiver<FeedSignal>) {
    let waited = tokio::time::timeout(Duration::from_millis(50), receiver.recv()).await;
    assert!(waited.is_err(), "unexpected signal: {:?}", waited);
}

pub fn manager() -> Actor {
    Actor::new("mgr-1", "manager@example.com")
}

pub fn new_package(package_id: &str) -> NewPackage {
    NewPackage::new(
        package_id,
        Party::new("Alice", "1 Main St"),
        Party::new("Bob", "2 Oak St"),
    )
}
