use contracts::system::onboarding::{OnboardingStatusEvent, ONBOARDING_STATUS_UPDATED};
use tokio::sync::broadcast;

use crate::shared::logger;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnboardingEvent {
    pub name: String,
    pub payload: OnboardingStatusEvent,
}

/// In-process event bus. Emitting with no subscribers is not an error.
#[derive(Clone)]
pub struct OnboardingEvents {
    sender: broadcast::Sender<OnboardingEvent>,
}

impl OnboardingEvents {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn emit(&self, name: &str, payload: OnboardingStatusEvent) {
        let event = OnboardingEvent {
            name: name.to_string(),
            payload,
        };
        // Err only means nobody is listening
        let _ = self.sender.send(event);
    }

    pub fn emit_status_updated(&self, payload: OnboardingStatusEvent) {
        self.emit(ONBOARDING_STATUS_UPDATED, payload);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OnboardingEvent> {
        self.sender.subscribe()
    }
}

impl Default for OnboardingEvents {
    fn default() -> Self {
        Self::new()
    }
}

/// Записывать каждое событие в tracing и в system_log
pub fn spawn_audit_listener(events: &OnboardingEvents) -> tokio::task::JoinHandle<()> {
    let mut receiver = events.subscribe();
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    tracing::info!(
                        "{}: status={} step={} setup_done={}",
                        event.name,
                        event.payload.status,
                        event.payload.step,
                        event.payload.setup_done
                    );
                    match serde_json::to_string(&event.payload) {
                        Ok(payload) => logger::log(
                            logger::CATEGORY_ONBOARDING_STATUS,
                            &format!("{} {}", event.name, payload),
                        ),
                        Err(e) => tracing::error!("Failed to serialize {}: {}", event.name, e),
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Onboarding audit listener skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
