//! Action tag to processor dispatch
use super::error::ProcessError;
use super::message::{ActionMessage, ActionType};
use super::processor::{MessageProcessor, Processed};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Routes each message to the processor registered for its action tag.
///
/// Built once at startup. When `verify_hashes` is set every message has its
/// declared hash recomputed before it reaches a processor.
pub struct DispatchRouter {
    processors: HashMap<ActionType, Arc<dyn MessageProcessor>>,
    verify_hashes: bool,
}

impl DispatchRouter {
    pub fn new(verify_hashes: bool) -> Self {
        Self {
            processors: HashMap::new(),
            verify_hashes,
        }
    }

    /// Register `processor` under its own action tag, returning whatever was
    /// registered there before.
    pub fn register(
        &mut self,
        processor: Arc<dyn MessageProcessor>,
    ) -> Option<Arc<dyn MessageProcessor>> {
        self.processors.insert(processor.action(), processor)
    }

    pub fn route(&self, action: ActionType) -> Result<&dyn MessageProcessor, ProcessError> {
        self.processors
            .get(&action)
            .map(|processor| processor.as_ref())
            .ok_or_else(|| ProcessError::UnsupportedAction(action.to_string()))
    }

    /// Registered tags, in a stable order.
    pub fn actions(&self) -> Vec<ActionType> {
        let mut actions: Vec<_> = self.processors.keys().copied().collect();
        actions.sort();
        actions
    }

    pub async fn dispatch(&self, message: &ActionMessage) -> Result<Processed, ProcessError> {
        let action = message.action();

        if self.verify_hashes {
            if let Err(e) = message.verify_hash() {
                warn!(action = %action, hash = %message.hash(), error = %e, "rejected message");
                return Err(e);
            }
        }

        let processor = self.route(action)?;
        debug!(action = %action, hash = %message.hash(), item = ?message.item(), "dispatching");

        let result = processor.process(message).await;
        if let Err(e) = &result {
            warn!(action = %action, hash = %message.hash(), error = %e, "message not applied");
        }
        result
    }
}
