//! Progress lines shown while a command runs.
//!
//! Reporting is best-effort: failures are logged and never affect the
//! command itself.

use std::sync::Arc;

use tracing::{debug, warn};

use switchboard_core::types::MessageId;
use switchboard_store::CommandStore;

pub trait ProgressReporter: Send + Sync {
    fn report(&self, message_id: &MessageId, step: &str);
}

/// Discards every step.
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _message_id: &MessageId, _step: &str) {}
}

/// Appends steps to the pending message's `metadata.steps`.
pub struct StoreReporter {
    store: Arc<dyn CommandStore>,
}

impl StoreReporter {
    pub fn new(store: Arc<dyn CommandStore>) -> Self {
        Self { store }
    }
}

impl ProgressReporter for StoreReporter {
    fn report(&self, message_id: &MessageId, step: &str) {
        let message = match self.store.get_chat_message(message_id) {
            Ok(Some(m)) => m,
            Ok(None) => {
                debug!(%message_id, "progress for unknown message dropped");
                return;
            }
            Err(e) => {
                warn!(%message_id, error = %e, "progress: message lookup failed");
                return;
            }
        };
        let mut metadata = message.metadata;
        metadata.steps.push(step.to_string());
        if let Err(e) = self
            .store
            .update_chat_message(message_id, &message.content, &metadata)
        {
            warn!(%message_id, error = %e, "progress: failed to record step");
        }
    }
}

/// Sends every step to each inner reporter in order.
pub struct CompositeReporter {
    reporters: Vec<Arc<dyn ProgressReporter>>,
}

impl CompositeReporter {
    pub fn new(reporters: Vec<Arc<dyn ProgressReporter>>) -> Self {
        Self { reporters }
    }
}

impl ProgressReporter for CompositeReporter {
    fn report(&self, message_id: &MessageId, step: &str) {
        for r in &self.reporters {
            r.report(message_id, step);
        }
    }
}

/// A reporter bound to one message, handed down the pipeline.
#[derive(Clone)]
pub struct Progress {
    reporter: Arc<dyn ProgressReporter>,
    message_id: MessageId,
}

impl Progress {
    pub fn new(reporter: Arc<dyn ProgressReporter>, message_id: MessageId) -> Self {
        Self {
            reporter,
            message_id,
        }
    }

    /// Progress that goes nowhere.
    pub fn silent() -> Self {
        Self::new(Arc::new(NoopReporter), MessageId::new())
    }

    pub fn step(&self, step: &str) {
        debug!(message_id = %self.message_id, step, "progress");
        self.reporter.report(&self.message_id, step);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use switchboard_core::types::MessageRole;
    use switchboard_store::{ChatMessage, MessageMetadata, SqliteStore};

    struct Collect(Mutex<Vec<String>>);

    impl ProgressReporter for Collect {
        fn report(&self, _message_id: &MessageId, step: &str) {
            self.0.lock().unwrap().push(step.to_string());
        }
    }

    #[test]
    fn store_reporter_appends_steps() {
        let store: Arc<dyn CommandStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
        let msg = ChatMessage::new(MessageRole::Assistant, "", MessageMetadata::default());
        store.create_chat_message(&msg).unwrap();

        let reporter = StoreReporter::new(Arc::clone(&store));
        reporter.report(&msg.id, "Classifying");
        reporter.report(&msg.id, "Querying Shopify");
        // Unknown ids are ignored.
        reporter.report(&MessageId::from("missing"), "x");

        let stored = store.get_chat_message(&msg.id).unwrap().unwrap();
        assert_eq!(stored.metadata.steps, vec!["Classifying", "Querying Shopify"]);
    }

    #[test]
    fn composite_fans_out_in_order() {
        let a = Arc::new(Collect(Mutex::new(Vec::new())));
        let b = Arc::new(Collect(Mutex::new(Vec::new())));
        let composite = CompositeReporter::new(vec![
            a.clone() as Arc<dyn ProgressReporter>,
            b.clone() as Arc<dyn ProgressReporter>,
        ]);
        let progress = Progress::new(Arc::new(composite), MessageId::from("m"));
        progress.step("one");
        progress.step("two");
        assert_eq!(*a.0.lock().unwrap(), vec!["one", "two"]);
        assert_eq!(*b.0.lock().unwrap(), vec!["one", "two"]);
    }
}
