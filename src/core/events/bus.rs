use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use super::base::{EXECUTION_COMPLETED, EXECUTION_FAILED, Event, PLAN_READY};


pub type EventHandler = Arc<dyn Fn(Event) + Send + Sync>;


/// Fan-out of deletion lifecycle events to the notification layer.
#[derive(Clone, Default)]
pub struct EventBus {
    handlers: Arc<RwLock<HashMap<String, Vec<EventHandler>>>>,
}

impl EventBus {

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }


    pub async fn register(&self, event_type: &str, handler: EventHandler) {
        self.handlers
            .write()
            .await
            .entry(event_type.to_string())
            .or_default()
            .push(handler);
        debug!("Registered deletion handler for {}", event_type);
    }


    pub async fn on_plan_ready(&self, handler: EventHandler) {
        self.register(PLAN_READY, handler).await;
    }

    /// One handler for both outcomes; `event.event_type` tells them apart.
    pub async fn on_execution_finished(&self, handler: EventHandler) {
        self.register(EXECUTION_COMPLETED, Arc::clone(&handler)).await;
        self.register(EXECUTION_FAILED, handler).await;
    }


    pub async fn handler_count(&self, event_type: &str) -> usize {
        self.handlers.read().await.get(event_type).map_or(0, Vec::len)
    }

    /// Handlers run on spawned tasks so a slow notification never holds up
    /// a deletion. Returns how many handlers were dispatched.
    pub async fn emit(&self, event: Event) -> usize {
        let handlers = self.handlers.read().await;
        let Some(targets) = handlers.get(&event.event_type) else {
            debug!("Nobody listens to {}", event.event_type);
            return 0;
        };

        for handler in targets {
            let handler = Arc::clone(handler);
            let event = event.clone();
            tokio::spawn(async move { handler(event) });
        }
        debug!(
            "Dispatched {} to {} handler(s), correlation {:?}",
            event.event_type,
            targets.len(),
            event.correlation_id
        );
        targets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_plan_ready_dispatches_by_type() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = Arc::clone(&counter);

        bus.on_plan_ready(Arc::new(move |_event: Event| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        }))
        .await;

        assert_eq!(bus.emit(Event::new(PLAN_READY, json!({"target": "E1"}))).await, 1);
        assert_eq!(bus.emit(Event::new("deletion.other", json!({}))).await, 0);

        tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_execution_finished_sees_both_outcomes() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        bus.on_execution_finished(Arc::new(move |event: Event| {
            sink.lock().push(event.event_type);
        }))
        .await;
        assert_eq!(bus.handler_count(EXECUTION_COMPLETED).await, 1);
        assert_eq!(bus.handler_count(EXECUTION_FAILED).await, 1);
        assert_eq!(bus.handler_count(PLAN_READY).await, 0);

        bus.emit(Event::new(EXECUTION_COMPLETED, json!({}))).await;
        bus.emit(Event::new(EXECUTION_FAILED, json!({}))).await;

        tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
        let mut seen = seen.lock().clone();
        seen.sort();
        assert_eq!(seen, vec![EXECUTION_COMPLETED.to_string(), EXECUTION_FAILED.to_string()]);
    }
}
