use crate::dispatcher::Dispatcher;
use async_trait::async_trait;
use events::{DomainEvent, EventHandler};
use log::*;

/// Handles domain events by routing them to live connections.
///
/// The request layer publishes an event after its mutation commits; this
/// handler hands it to the `Dispatcher`, which resolves the destination groups.
/// Delivery is best effort, so nothing is reported back to the publisher.
pub struct NotificationEventHandler {
    dispatcher: Dispatcher,
}

impl NotificationEventHandler {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }
}

#[async_trait]
impl EventHandler for NotificationEventHandler {
    async fn handle(&self, event: &DomainEvent) {
        debug!("Handling {} event", event.kind());
        let report = self.dispatcher.dispatch(event);
        if report.failed > 0 {
            warn!(
                "{} event reached {} connection(s), {} failed",
                event.kind(),
                report.delivered,
                report.failed
            );
        }
    }
}
