use config::Config;
use events::EventPublisher;
use log::info;
use realtime::{ConnectionRegistry, Lifecycle, NotificationEventHandler};
use std::sync::Arc;

pub mod config;
pub mod logging;

// Service-level state containing only infrastructure concerns
// Needs to implement Clone to be able to be passed into Router as State
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub lifecycle: Lifecycle,
    pub event_publisher: EventPublisher,
}

impl AppState {
    /// Wires the notification core: request handlers publish through
    /// `event_publisher`, which feeds the same registry the lifecycle joins.
    pub fn new(app_config: Config, lifecycle: Lifecycle) -> Self {
        let handler = NotificationEventHandler::new(lifecycle.dispatcher().clone());
        let event_publisher = EventPublisher::new().with_handler(Arc::new(handler));

        info!(
            "Notification core ready with {} event handler(s)",
            event_publisher.handler_count()
        );

        Self {
            config: app_config,
            lifecycle,
            event_publisher,
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        self.lifecycle.registry()
    }
}
