use std::sync::Arc;

use async_trait::async_trait;
use cqrs_es::{EventEnvelope, Query};
use serde_json::json;
use tokio::sync::broadcast;

use crate::activity::{self, ActivityLog};
use crate::event::DomainEvent;

use super::{Event, Prescription};

/// Turns committed transitions into `*_success` activity entries.
pub struct ActivityQuery {
    log: Arc<ActivityLog>,
}

impl ActivityQuery {
    pub fn new(log: Arc<ActivityLog>) -> Self {
        Self { log }
    }
}

#[async_trait]
impl Query<Prescription> for ActivityQuery {
    async fn dispatch(&self, prescription_id: &str, events: &[EventEnvelope<Prescription>]) {
        for envelope in events {
            let user_id = envelope.metadata.get("user_id").cloned();
            match &envelope.payload {
                Event::PrescriptionFulfilled { .. } => {
                    self.log
                        .track(
                            activity::FULFILL_SUCCESS,
                            activity::properties([("prescription_id", json!(prescription_id))]),
                            user_id,
                        )
                        .await;
                }
                Event::DispenseDetailsUploaded { dispense_id, .. } => {
                    self.log
                        .track(
                            activity::DISPENSE_UPLOAD_SUCCESS,
                            activity::properties([
                                ("prescription_id", json!(prescription_id)),
                                ("dispense_id", json!(dispense_id)),
                            ]),
                            user_id,
                        )
                        .await;
                }
            }
        }
    }
}

/// Fans committed events out to in-process subscribers.
#[derive(Clone)]
pub struct EventBroadcast {
    sender: broadcast::Sender<DomainEvent>,
}

impl EventBroadcast {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl Query<Prescription> for EventBroadcast {
    async fn dispatch(&self, prescription_id: &str, events: &[EventEnvelope<Prescription>]) {
        for envelope in events {
            match DomainEvent::from_envelope(envelope) {
                // No subscribers is not an error.
                Ok(event) => {
                    let _ = self.sender.send(event);
                }
                Err(err) => {
                    tracing::error!("EventBroadcast error for {}: {}", prescription_id, err)
                }
            }
        }
    }
}
