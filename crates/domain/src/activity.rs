//! Pharmacy activity trail.
//!
//! Mirrors what the dashboard reports about each submission (request, success,
//! failure) and keeps the most recent entries in a durable slot.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::errors::Error;
use crate::persistence::PersistencePort;

pub const ACTIVITY_KEY: &str = "analytics_events";
pub const DEFAULT_RETENTION: usize = 100;

pub const FULFILL_REQUEST: &str = "fulfill_request";
pub const FULFILL_SUCCESS: &str = "fulfill_success";
pub const FULFILL_FAILURE: &str = "fulfill_failure";
pub const DISPENSE_UPLOAD_START: &str = "dispense_upload_start";
pub const DISPENSE_UPLOAD_SUCCESS: &str = "dispense_upload_success";
pub const DISPENSE_UPLOAD_FAILURE: &str = "dispense_upload_failure";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ActivityEvent {
    pub event_name: String,
    pub properties: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

pub struct ActivityLog {
    port: Arc<dyn PersistencePort>,
    retention: usize,
    events: Mutex<Vec<ActivityEvent>>,
}

impl ActivityLog {
    pub async fn open(port: Arc<dyn PersistencePort>, retention: usize) -> Result<Self, Error> {
        let events = match port.load(ACTIVITY_KEY).await? {
            Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                tracing::warn!("Discarding unreadable activity log: {}", err);
                Vec::new()
            }),
            None => Vec::new(),
        };

        Ok(Self {
            port,
            retention: retention.max(1),
            events: Mutex::new(events),
        })
    }

    /// Records an event. Storage failures are logged, never returned.
    pub async fn track(
        &self,
        event_name: &str,
        properties: Map<String, Value>,
        user_id: Option<String>,
    ) {
        let event = ActivityEvent {
            event_name: event_name.to_string(),
            properties,
            timestamp: Utc::now(),
            user_id,
        };
        tracing::info!(event = %event.event_name, "Activity recorded");

        let mut events = self.events.lock().await;
        events.push(event);
        let overflow = events.len().saturating_sub(self.retention);
        events.drain(..overflow);

        match serde_json::to_string(&*events) {
            Ok(raw) => {
                if let Err(err) = self.port.save(ACTIVITY_KEY, &raw).await {
                    tracing::error!("Failed to persist activity log: {}", err);
                }
            }
            Err(err) => tracing::error!("Failed to encode activity log: {}", err),
        }
    }

    /// Most recent first.
    pub async fn recent(&self, limit: usize) -> Vec<ActivityEvent> {
        self.events
            .lock()
            .await
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    pub async fn clear(&self) -> Result<(), Error> {
        let mut events = self.events.lock().await;
        events.clear();
        self.port.save(ACTIVITY_KEY, "[]").await
    }
}

/// Builds a property map from `(name, value)` pairs.
pub fn properties<const N: usize>(pairs: [(&str, Value); N]) -> Map<String, Value> {
    pairs
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}
